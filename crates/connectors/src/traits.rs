//! The `Connector` trait: the contract every external application adapter fulfils.

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::{Application, ConnectorError};

/// Operation parameters as they appear in a block's `action.config`.
pub type Config = Map<String, Value>;

/// Per-call context handed to [`Connector::execute`].
///
/// Defined here (in the connectors crate) so both the engine and individual
/// connector implementations can import it without a circular dependency.
#[derive(Debug, Clone)]
pub struct ConnectorContext {
    /// The block being executed.
    pub block_id: String,
    /// The workflow run this call belongs to, if any.
    pub run_id: Option<Uuid>,
    /// Cancelled when the user cancels the run; long calls must observe it.
    pub cancel: CancellationToken,
}

impl ConnectorContext {
    /// Context for a call made outside of any workflow run.
    pub fn detached(block_id: impl Into<String>) -> Self {
        Self {
            block_id: block_id.into(),
            run_id: None,
            cancel: CancellationToken::new(),
        }
    }
}

/// The core connector trait.
///
/// One implementation exists per external application. Implementations are
/// stateless per call and shared behind an `Arc`.
#[async_trait]
pub trait Connector: Send + Sync {
    /// The application tag this connector serves.
    fn application(&self) -> Application;

    /// Operations this connector supports. Stable across calls.
    fn operations(&self) -> Vec<String>;

    /// Pre-flight check of `config` for `operation`.
    ///
    /// Pure and synchronous: never performs I/O, never panics. Unknown
    /// operations are invalid.
    fn validate(&self, operation: &str, config: &Config) -> bool;

    /// Perform `operation`, receiving the upstream block's output as `input`.
    async fn execute(
        &self,
        operation: &str,
        config: &Config,
        input: Option<Value>,
        ctx: &ConnectorContext,
    ) -> Result<Value, ConnectorError>;
}

/// Whether `key` holds a usable value: present, not `null`, not a blank
/// string and not an empty array.
pub fn has_value(config: &Config, key: &str) -> bool {
    match config.get(key) {
        None | Some(Value::Null) => false,
        Some(Value::String(s)) => !s.trim().is_empty(),
        Some(Value::Array(items)) => !items.is_empty(),
        Some(_) => true,
    }
}

/// `true` when every key in `keys` satisfies [`has_value`].
pub fn has_all(config: &Config, keys: &[&str]) -> bool {
    keys.iter().all(|key| has_value(config, key))
}

/// Fetch a string config value, trimmed.
pub fn str_value<'a>(config: &'a Config, key: &str) -> Option<&'a str> {
    config.get(key).and_then(Value::as_str).map(str::trim)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config(value: Value) -> Config {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn blank_and_empty_values_count_as_missing() {
        let cfg = config(json!({
            "blank": "   ",
            "null": null,
            "empty": [],
            "ok": "page-1",
            "zero": 0,
            "list": ["a"],
        }));

        assert!(!has_value(&cfg, "missing"));
        assert!(!has_value(&cfg, "blank"));
        assert!(!has_value(&cfg, "null"));
        assert!(!has_value(&cfg, "empty"));
        assert!(has_value(&cfg, "ok"));
        assert!(has_value(&cfg, "zero"));
        assert!(has_value(&cfg, "list"));
        assert!(has_all(&cfg, &["ok", "zero"]));
        assert!(!has_all(&cfg, &["ok", "blank"]));
    }
}
