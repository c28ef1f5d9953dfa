//! `MockConnector`: a test double for `Connector`.
//!
//! Useful in unit and integration tests where a real connector is either
//! unavailable or irrelevant.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::Notify;

use crate::traits::{has_all, Config, ConnectorContext};
use crate::{Application, Connector, ConnectorError};

/// Behaviour injected into `MockConnector` at construction time.
pub enum MockBehaviour {
    /// Return a specific JSON value.
    Return(Value),
    /// Fail with an `Execution` error.
    Fail(String),
    /// Wait for `release` to be notified, then return `value`.
    Gated { release: Arc<Notify>, value: Value },
}

/// A mock connector that records every input it receives and returns a
/// programmer-specified result for its single `mock` operation.
pub struct MockConnector {
    /// Tag the mock registers under.
    pub application: Application,
    /// Config keys `validate` insists on.
    pub required: Vec<String>,
    /// What the connector will do when `execute` is called.
    pub behaviour: MockBehaviour,
    /// All inputs seen by this connector (in call order).
    pub calls: Arc<Mutex<Vec<Option<Value>>>>,
}

impl MockConnector {
    fn with_behaviour(application: Application, behaviour: MockBehaviour) -> Self {
        Self {
            application,
            required: Vec::new(),
            behaviour,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Create a mock that always succeeds with the given value.
    pub fn returning(application: Application, value: Value) -> Self {
        Self::with_behaviour(application, MockBehaviour::Return(value))
    }

    /// Create a mock that always fails with the given message.
    pub fn failing(application: Application, msg: impl Into<String>) -> Self {
        Self::with_behaviour(application, MockBehaviour::Fail(msg.into()))
    }

    /// Create a mock that blocks until `release` is notified.
    pub fn gated(application: Application, release: Arc<Notify>, value: Value) -> Self {
        Self::with_behaviour(application, MockBehaviour::Gated { release, value })
    }

    /// Require `keys` to be present for `validate` to pass.
    pub fn requiring(mut self, keys: &[&str]) -> Self {
        self.required = keys.iter().map(|k| (*k).to_owned()).collect();
        self
    }

    /// Number of times this connector has been executed.
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Inputs seen so far, in call order.
    pub fn inputs(&self) -> Vec<Option<Value>> {
        self.calls.lock().unwrap().clone()
    }

    fn tagged(&self, value: &Value) -> Value {
        // Merge the connector tag into object outputs so tests can trace
        // the data flowing through the graph.
        match value.as_object() {
            Some(fields) => {
                let mut out = json!({ "connector": self.application.as_str() });
                if let Some(out_obj) = out.as_object_mut() {
                    for (k, v) in fields {
                        out_obj.insert(k.clone(), v.clone());
                    }
                }
                out
            }
            None => value.clone(),
        }
    }
}

#[async_trait]
impl Connector for MockConnector {
    fn application(&self) -> Application {
        self.application.clone()
    }

    fn operations(&self) -> Vec<String> {
        vec!["mock".to_string()]
    }

    fn validate(&self, operation: &str, config: &Config) -> bool {
        let required: Vec<&str> = self.required.iter().map(String::as_str).collect();
        operation == "mock" && has_all(config, &required)
    }

    async fn execute(
        &self,
        _operation: &str,
        _config: &Config,
        input: Option<Value>,
        ctx: &ConnectorContext,
    ) -> Result<Value, ConnectorError> {
        self.calls.lock().unwrap().push(input);

        match &self.behaviour {
            MockBehaviour::Return(v) => Ok(self.tagged(v)),
            MockBehaviour::Fail(msg) => Err(ConnectorError::execution(msg.clone())),
            MockBehaviour::Gated { release, value } => {
                tokio::select! {
                    _ = ctx.cancel.cancelled() => Err(ConnectorError::Cancelled),
                    _ = release.notified() => Ok(self.tagged(value)),
                }
            }
        }
    }
}
