//! Timer connector: schedule triggers and cancellable delays.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};
use tracing::debug;

use crate::traits::{has_value, Config};
use crate::{Application, Connector, ConnectorContext, ConnectorError};

/// Local connector; never calls out.
pub struct TimerConnector;

/// The `seconds` key as a `Duration`; rejects negative, NaN and out-of-range values.
fn delay_duration(config: &Config) -> Result<Duration, ConnectorError> {
    let seconds = config
        .get("seconds")
        .and_then(Value::as_f64)
        .ok_or_else(|| ConnectorError::execution("delay needs a numeric 'seconds'"))?;
    Duration::try_from_secs_f64(seconds)
        .map_err(|e| ConnectorError::execution(format!("invalid delay of {seconds} seconds: {e}")))
}

#[async_trait]
impl Connector for TimerConnector {
    fn application(&self) -> Application {
        Application::Timer
    }

    fn operations(&self) -> Vec<String> {
        vec!["schedule".to_owned(), "delay".to_owned()]
    }

    fn validate(&self, operation: &str, config: &Config) -> bool {
        match operation {
            "schedule" => has_value(config, "cron") || has_value(config, "interval_seconds"),
            "delay" => delay_duration(config).is_ok(),
            _ => false,
        }
    }

    async fn execute(
        &self,
        operation: &str,
        config: &Config,
        input: Option<Value>,
        ctx: &ConnectorContext,
    ) -> Result<Value, ConnectorError> {
        match operation {
            "schedule" => Ok(json!({
                "triggered_at": Utc::now().to_rfc3339(),
                "cron": config.get("cron").cloned().unwrap_or(Value::Null),
                "interval_seconds": config.get("interval_seconds").cloned().unwrap_or(Value::Null),
            })),
            "delay" => {
                let delay = delay_duration(config)?;
                debug!(block_id = %ctx.block_id, ?delay, "delaying");
                tokio::select! {
                    _ = ctx.cancel.cancelled() => Err(ConnectorError::Cancelled),
                    _ = tokio::time::sleep(delay) => {
                        Ok(input.unwrap_or(Value::Null))
                    }
                }
            }
            other => Err(ConnectorError::UnsupportedOperation(other.to_owned())),
        }
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
        let cases = [
            ("schedule", json!({ "cron": "0 7 * * *" }), true),
            ("schedule", json!({ "interval_seconds": 60 }), true),
            ("schedule", json!({ "cron": "" }), false),
            ("delay", json!({ "seconds": 1.5 }), true),
            ("delay", json!({ "seconds": -1 }), false),
            ("delay", json!({ "seconds": 1e20 }), false),
            ("delay", json!({ "seconds": "soon" }), false),
            ("delay", json!({}), false),
        ];
        for (op, cfg, expected) in cases {
            assert_eq!(TimerConnector.validate(op, &config(cfg.clone())), expected, "{op} {cfg}");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn delay_passes_input_through() {
        let ctx = ConnectorContext::detached("t1");
        let out = TimerConnector
            .execute("delay", &config(json!({ "seconds": 30 })), Some(json!({ "n": 1 })), &ctx)
            .await;
        assert_eq!(out, Ok(json!({ "n": 1 })));
    }

    #[tokio::test]
    async fn out_of_range_delay_fails_instead_of_panicking() {
        let ctx = ConnectorContext::detached("t1");
        let out = TimerConnector
            .execute("delay", &config(json!({ "seconds": 1e20 })), None, &ctx)
            .await;
        match out {
            Err(ConnectorError::Execution { message }) => {
                assert!(message.starts_with("invalid delay"), "got: {message}")
            }
            other => panic!("expected an execution error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn cancelled_delay_stops_early() {
        let ctx = ConnectorContext::detached("t1");
        ctx.cancel.cancel();
        let out = TimerConnector
            .execute("delay", &config(json!({ "seconds": 3600 })), None, &ctx)
            .await;
        assert_eq!(out, Err(ConnectorError::Cancelled));
    }
}
