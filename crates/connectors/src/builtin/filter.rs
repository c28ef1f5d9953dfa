//! Predicate connector for `condition` blocks.
//!
//! A predicate that does not hold fails the call, which halts the branch
//! below a condition block.

use async_trait::async_trait;
use serde_json::Value;

use super::{table_operations, table_validate, OperationTable};
use crate::traits::{str_value, Config};
use crate::{Application, Connector, ConnectorContext, ConnectorError};

/// `equals` also needs a `value` key, which may legitimately be `null`.
const OPERATIONS: OperationTable = &[("equals", &["field"]), ("exists", &["field"])];

pub struct FilterConnector;

/// Resolve a dotted path (`order.total`) inside `value`.
fn lookup<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .try_fold(value, |current, key| match current {
            Value::Object(obj) => obj.get(key),
            Value::Array(items) => key.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        })
        .filter(|v| !v.is_null())
}

#[async_trait]
impl Connector for FilterConnector {
    fn application(&self) -> Application {
        Application::Filter
    }

    fn operations(&self) -> Vec<String> {
        table_operations(OPERATIONS)
    }

    fn validate(&self, operation: &str, config: &Config) -> bool {
        table_validate(OPERATIONS, operation, config)
            && (operation != "equals" || config.contains_key("value"))
    }

    async fn execute(
        &self,
        operation: &str,
        config: &Config,
        input: Option<Value>,
        _ctx: &ConnectorContext,
    ) -> Result<Value, ConnectorError> {
        let field = str_value(config, "field").unwrap_or_default();
        let input = input.unwrap_or(Value::Null);
        let actual = lookup(&input, field);

        match operation {
            "equals" => {
                let expected = config.get("value").unwrap_or(&Value::Null);
                // A missing field compares equal to `null`.
                if actual.unwrap_or(&Value::Null) == expected {
                    Ok(input)
                } else {
                    Err(ConnectorError::execution(format!(
                        "condition not met: '{field}' is {}, expected {expected}",
                        actual.map_or_else(|| "missing".to_owned(), Value::to_string)
                    )))
                }
            }
            "exists" => match actual {
                Some(_) => Ok(input),
                None => Err(ConnectorError::execution(format!(
                    "condition not met: '{field}' is missing"
                ))),
            },
            other => Err(ConnectorError::UnsupportedOperation(other.to_owned())),
        }
    }
}
