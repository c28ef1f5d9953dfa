//! Connector for the AI text service.
//!
//! Simulated outputs are deterministic functions of the config and input so
//! demos and tests behave the same on every run.

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{table_operations, table_validate, text_source, OperationTable};
use crate::remote::{RemoteClient, RemoteSettings};
use crate::traits::{str_value, Config};
use crate::{Application, Connector, ConnectorContext, ConnectorError};

const OPERATIONS: OperationTable = &[
    ("generate_text", &["prompt"]),
    ("summarize", &[]),
    ("classify", &["categories"]),
    ("translate", &["target_language"]),
];

const SUMMARY_CHARS: usize = 200;

pub struct AiTextConnector {
    remote: RemoteClient,
}

impl AiTextConnector {
    pub fn new(settings: RemoteSettings) -> Self {
        Self {
            remote: RemoteClient::new(settings),
        }
    }
}

#[async_trait]
impl Connector for AiTextConnector {
    fn application(&self) -> Application {
        Application::AiTextService
    }

    fn operations(&self) -> Vec<String> {
        table_operations(OPERATIONS)
    }

    fn validate(&self, operation: &str, config: &Config) -> bool {
        if !table_validate(OPERATIONS, operation, config) {
            return false;
        }
        // Categories must be strings to be usable as labels.
        operation != "classify"
            || config
                .get("categories")
                .and_then(Value::as_array)
                .is_some_and(|cats| cats.iter().all(Value::is_string))
    }

    async fn execute(
        &self,
        operation: &str,
        config: &Config,
        input: Option<Value>,
        ctx: &ConnectorContext,
    ) -> Result<Value, ConnectorError> {
        let text = text_source(config, input.as_ref());
        let model = str_value(config, "model").unwrap_or("default");
        let body = json!({ "model": model, "config": config, "input": input });

        match operation {
            "generate_text" => {
                let prompt = str_value(config, "prompt").unwrap_or_default();
                self.remote
                    .post_or_simulate("generate", &body, ctx, || {
                        json!({
                            "text": format!("Response to: {prompt}"),
                            "model": model,
                            "context": input.clone().unwrap_or(Value::Null),
                        })
                    })
                    .await
            }
            "summarize" => {
                self.remote
                    .post_or_simulate("summarize", &body, ctx, || {
                        json!({ "summary": summarize(&text), "model": model })
                    })
                    .await
            }
            "classify" => {
                let categories: Vec<&str> = config
                    .get("categories")
                    .and_then(Value::as_array)
                    .map(|cats| cats.iter().filter_map(Value::as_str).collect())
                    .unwrap_or_default();
                self.remote
                    .post_or_simulate("classify", &body, ctx, || classify(&text, &categories))
                    .await
            }
            "translate" => {
                let language = str_value(config, "target_language").unwrap_or_default();
                self.remote
                    .post_or_simulate("translate", &body, ctx, || {
                        json!({
                            "translated_text": format!("[{language}] {text}"),
                            "target_language": language,
                        })
                    })
                    .await
            }
            other => Err(ConnectorError::UnsupportedOperation(other.to_owned())),
        }
    }
}

/// First sentence, capped at `SUMMARY_CHARS` characters.
fn summarize(text: &str) -> String {
    let first = text
        .split_inclusive(['.', '!', '?'])
        .next()
        .unwrap_or_default()
        .trim();
    first.chars().take(SUMMARY_CHARS).collect()
}

/// Pick the first category mentioned in `text`, else the first category.
fn classify(text: &str, categories: &[&str]) -> Value {
    let haystack = text.to_lowercase();
    match categories
        .iter()
        .find(|cat| haystack.contains(&cat.to_lowercase()))
    {
        Some(cat) => json!({ "category": cat, "confidence": 1.0 }),
        None => json!({
            "category": categories.first().copied().unwrap_or_default(),
            "confidence": 0.0,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(value: Value) -> Config {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn validation_table() {
        let ai = AiTextConnector::new(RemoteSettings::default());
        let cases = [
            ("generate_text", json!({ "prompt": "hello" }), true),
            ("generate_text", json!({ "prompt": "" }), false),
            ("summarize", json!({}), true),
            ("classify", json!({ "categories": ["bug", "feature"] }), true),
            ("classify", json!({ "categories": [] }), false),
            ("classify", json!({ "categories": [1, 2] }), false),
            ("translate", json!({ "target_language": "de" }), true),
            ("translate", json!({}), false),
        ];
        for (op, cfg, expected) in cases {
            assert_eq!(ai.validate(op, &config(cfg.clone())), expected, "{op} {cfg}");
        }
    }

    #[tokio::test]
    async fn classify_picks_the_mentioned_category() {
        let ai = AiTextConnector::new(RemoteSettings::default());
        let cfg = config(json!({ "categories": ["billing", "outage"] }));
        let ctx = ConnectorContext::detached("c1");

        let out = ai
            .execute("classify", &cfg, Some(json!("Total OUTAGE in eu-west")), &ctx)
            .await
            .expect("simulated");

        assert_eq!(out["category"], json!("outage"));
        assert_eq!(out["simulated"], json!(true));
    }

    #[test]
    fn summarize_keeps_first_sentence() {
        assert_eq!(summarize("One thing. Another thing."), "One thing.");
        assert_eq!(summarize(""), "");
    }
}
