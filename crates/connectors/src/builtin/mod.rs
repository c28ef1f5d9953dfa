//! Built-in connectors for the applications blockflow ships with.
//!
//! Connectors that front a remote API take a [`RemoteSettings`]; the rest
//! (timer, webhook receive, transform, filter) compute locally.

pub mod ai_text;
pub mod design_file;
pub mod filter;
pub mod notes;
pub mod timer;
pub mod transform;
pub mod webhook;

use std::sync::Arc;

use serde_json::Value;

pub use ai_text::AiTextConnector;
pub use design_file::DesignFileConnector;
pub use filter::FilterConnector;
pub use notes::NotesConnector;
pub use timer::TimerConnector;
pub use transform::TransformConnector;
pub use webhook::WebhookConnector;

use crate::remote::RemoteSettings;
use crate::traits::{has_all, Config};
use crate::ConnectorRegistry;

/// Remote settings for every built-in connector that talks HTTP.
#[derive(Debug, Clone, Default)]
pub struct BuiltinSettings {
    pub notes: RemoteSettings,
    pub ai_text: RemoteSettings,
    pub design_file: RemoteSettings,
    /// Only `timeout` and `fallback` apply; webhook targets come from block config.
    pub webhook: RemoteSettings,
}

/// A registry with every built-in connector registered.
pub fn builtin_registry(settings: BuiltinSettings) -> ConnectorRegistry {
    let registry = ConnectorRegistry::new();
    registry.register(Arc::new(NotesConnector::new(settings.notes)));
    registry.register(Arc::new(AiTextConnector::new(settings.ai_text)));
    registry.register(Arc::new(DesignFileConnector::new(settings.design_file)));
    registry.register(Arc::new(TimerConnector));
    registry.register(Arc::new(WebhookConnector::new(settings.webhook)));
    registry.register(Arc::new(TransformConnector));
    registry.register(Arc::new(FilterConnector));
    registry
}

/// Operation name → required config keys.
pub(crate) type OperationTable = &'static [(&'static str, &'static [&'static str])];

pub(crate) fn table_operations(table: OperationTable) -> Vec<String> {
    table.iter().map(|(op, _)| (*op).to_owned()).collect()
}

pub(crate) fn table_validate(table: OperationTable, operation: &str, config: &Config) -> bool {
    table
        .iter()
        .find(|(op, _)| *op == operation)
        .is_some_and(|(_, required)| has_all(config, required))
}

/// Text to operate on: `config.text`, else a string input, else an input
/// object's `text` field, else the input rendered as JSON.
pub(crate) fn text_source(config: &Config, input: Option<&Value>) -> String {
    if let Some(text) = config.get("text").and_then(Value::as_str) {
        return text.to_owned();
    }
    match input {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Object(obj)) => match obj.get("text").and_then(Value::as_str) {
            Some(text) => text.to_owned(),
            None => Value::Object(obj.clone()).to_string(),
        },
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

/// Lowercase, dash-separated identifier fragment.
pub(crate) fn slug(text: &str) -> String {
    text.split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|part| !part.is_empty())
        .map(str::to_ascii_lowercase)
        .collect::<Vec<_>>()
        .join("-")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Application;
    use serde_json::json;

    #[test]
    fn builtin_registry_covers_every_known_application() {
        let registry = builtin_registry(BuiltinSettings::default());
        for app in [
            Application::NotesService,
            Application::AiTextService,
            Application::DesignFileService,
            Application::Timer,
            Application::Webhook,
            Application::Transform,
            Application::Filter,
        ] {
            let connector = registry.lookup(&app).expect("registered");
            assert_eq!(connector.application(), app);
        }
    }

    #[test]
    fn every_builtin_lists_stable_non_empty_operations() {
        let registry = builtin_registry(BuiltinSettings::default());
        for app in registry.applications() {
            let connector = registry.lookup(&app).expect("registered");
            let first = connector.operations();
            assert!(!first.is_empty(), "{app} lists no operations");
            assert_eq!(first, connector.operations(), "{app} operations changed");
        }
    }

    #[test]
    fn unknown_operations_never_validate() {
        let registry = builtin_registry(BuiltinSettings::default());
        let config = json!({ "page_id": "p", "file_key": "f", "prompt": "x" })
            .as_object()
            .cloned()
            .unwrap_or_default();
        for app in registry.applications() {
            let connector = registry.lookup(&app).expect("registered");
            assert!(!connector.validate("no_such_operation", &config));
        }
    }

    #[test]
    fn text_source_prefers_config_then_input() {
        let config = json!({ "text": "from config" }).as_object().cloned().unwrap_or_default();
        assert_eq!(text_source(&config, Some(&json!("ignored"))), "from config");

        let empty = Config::new();
        assert_eq!(text_source(&empty, Some(&json!("plain"))), "plain");
        assert_eq!(text_source(&empty, Some(&json!({ "text": "field" }))), "field");
        assert_eq!(text_source(&empty, None), "");
    }

    #[test]
    fn slug_normalises_titles() {
        assert_eq!(slug("Weekly Review: Q3!"), "weekly-review-q3");
    }
}
