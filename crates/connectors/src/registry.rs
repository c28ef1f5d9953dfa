//! In-memory map from application tag to connector.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, PoisonError, RwLock};

use tracing::{debug, info};

use crate::{Application, Connector, RegistryError};

/// Maps [`Application`] tags to shared [`Connector`] implementations.
///
/// Populated at startup, but registration takes `&self` so an engine that
/// is already shared can still accept plugins.
#[derive(Default)]
pub struct ConnectorRegistry {
    connectors: RwLock<HashMap<Application, Arc<dyn Connector>>>,
}

impl ConnectorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `connector` under its own application tag. The last
    /// registration for a tag wins.
    pub fn register(&self, connector: Arc<dyn Connector>) {
        let application = connector.application();
        let mut connectors = self
            .connectors
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        match connectors.insert(application.clone(), Arc::clone(&connector)) {
            Some(previous) if Arc::ptr_eq(&previous, &connector) => {
                debug!("connector '{}' re-registered (same instance)", application);
            }
            Some(_) => info!("connector '{}' replaced", application),
            None => info!("connector '{}' registered", application),
        }
    }

    /// Resolve the connector for `application`.
    ///
    /// # Errors
    /// [`RegistryError::NotFound`] when nothing is registered for the tag.
    pub fn lookup(&self, application: &Application) -> Result<Arc<dyn Connector>, RegistryError> {
        self.connectors
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(application)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(application.to_string()))
    }

    pub fn contains(&self, application: &Application) -> bool {
        self.connectors
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(application)
    }

    /// Registered application tags, sorted.
    pub fn applications(&self) -> Vec<Application> {
        let mut apps: Vec<Application> = self
            .connectors
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        apps.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        apps
    }

    /// Application tag → supported operations, for discovery and UI population.
    pub fn catalog(&self) -> BTreeMap<String, Vec<String>> {
        self.connectors
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(app, connector)| (app.to_string(), connector.operations()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.connectors
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for ConnectorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectorRegistry")
            .field("applications", &self.applications())
            .finish()
    }
}
