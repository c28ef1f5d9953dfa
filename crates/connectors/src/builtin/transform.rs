//! Local JSON reshaping for `transformer` blocks.

use async_trait::async_trait;
use serde_json::{Map, Value};

use super::{table_operations, table_validate, OperationTable};
use crate::traits::Config;
use crate::{Application, Connector, ConnectorContext, ConnectorError};

const OPERATIONS: OperationTable = &[
    ("passthrough", &[]),
    ("pick", &["fields"]),
    ("merge", &["values"]),
];

pub struct TransformConnector;

#[async_trait]
impl Connector for TransformConnector {
    fn application(&self) -> Application {
        Application::Transform
    }

    fn operations(&self) -> Vec<String> {
        table_operations(OPERATIONS)
    }

    fn validate(&self, operation: &str, config: &Config) -> bool {
        table_validate(OPERATIONS, operation, config)
            && match operation {
                "pick" => config
                    .get("fields")
                    .and_then(Value::as_array)
                    .is_some_and(|f| f.iter().all(Value::is_string)),
                "merge" => config.get("values").is_some_and(Value::is_object),
                _ => true,
            }
    }

    async fn execute(
        &self,
        operation: &str,
        config: &Config,
        input: Option<Value>,
        _ctx: &ConnectorContext,
    ) -> Result<Value, ConnectorError> {
        let input = input.unwrap_or(Value::Null);
        match operation {
            "passthrough" => Ok(input),
            "pick" => {
                let Value::Object(fields) = input else {
                    return Err(ConnectorError::execution("pick needs an object input"));
                };
                let wanted = config.get("fields").and_then(Value::as_array);
                let picked: Map<String, Value> = wanted
                    .into_iter()
                    .flatten()
                    .filter_map(Value::as_str)
                    .filter_map(|name| fields.get(name).map(|v| (name.to_owned(), v.clone())))
                    .collect();
                Ok(Value::Object(picked))
            }
            "merge" => {
                let mut merged = match input {
                    Value::Object(obj) => obj,
                    Value::Null => Map::new(),
                    _ => return Err(ConnectorError::execution("merge needs an object input")),
                };
                if let Some(values) = config.get("values").and_then(Value::as_object) {
                    merged.extend(values.iter().map(|(k, v)| (k.clone(), v.clone())));
                }
                Ok(Value::Object(merged))
            }
            other => Err(ConnectorError::UnsupportedOperation(other.to_owned())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config(value: Value) -> Config {
        value.as_object().cloned().unwrap_or_default()
    }

    #[tokio::test]
    async fn pick_keeps_only_listed_fields() {
        let ctx = ConnectorContext::detached("x");
        let out = TransformConnector
            .execute(
                "pick",
                &config(json!({ "fields": ["a", "missing"] })),
                Some(json!({ "a": 1, "b": 2 })),
                &ctx,
            )
            .await;
        assert_eq!(out, Ok(json!({ "a": 1 })));
    }

    #[tokio::test]
    async fn merge_overlays_values_on_null_input() {
        let ctx = ConnectorContext::detached("x");
        let out = TransformConnector
            .execute("merge", &config(json!({ "values": { "k": true } })), None, &ctx)
            .await;
        assert_eq!(out, Ok(json!({ "k": true })));
    }

    #[test]
    fn validation_table() {
        let cases = [
            ("passthrough", json!({}), true),
            ("pick", json!({ "fields": ["a"] }), true),
            ("pick", json!({ "fields": [] }), false),
            ("merge", json!({ "values": { "a": 1 } }), true),
            ("merge", json!({ "values": "nope" }), false),
        ];
        for (op, cfg, expected) in cases {
            assert_eq!(TransformConnector.validate(op, &config(cfg.clone())), expected, "{op} {cfg}");
        }
    }
}
