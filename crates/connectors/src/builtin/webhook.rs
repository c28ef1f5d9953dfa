//! Webhook connector: inbound trigger payloads and outbound POSTs.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};

use super::{table_operations, table_validate, OperationTable};
use crate::remote::{RemoteClient, RemoteSettings};
use crate::traits::{has_value, str_value, Config};
use crate::{Application, Connector, ConnectorContext, ConnectorError};

const OPERATIONS: OperationTable = &[("receive", &["path"]), ("send", &["url"])];

pub struct WebhookConnector {
    remote: RemoteClient,
}

impl WebhookConnector {
    pub fn new(settings: RemoteSettings) -> Self {
        Self {
            remote: RemoteClient::new(settings),
        }
    }
}

#[async_trait]
impl Connector for WebhookConnector {
    fn application(&self) -> Application {
        Application::Webhook
    }

    fn operations(&self) -> Vec<String> {
        table_operations(OPERATIONS)
    }

    fn validate(&self, operation: &str, config: &Config) -> bool {
        if !table_validate(OPERATIONS, operation, config) {
            return false;
        }
        operation != "send"
            || str_value(config, "url")
                .is_some_and(|url| url.starts_with("http://") || url.starts_with("https://"))
    }

    async fn execute(
        &self,
        operation: &str,
        config: &Config,
        input: Option<Value>,
        ctx: &ConnectorContext,
    ) -> Result<Value, ConnectorError> {
        match operation {
            // The payload arrives through the caller; a configured payload
            // stands in for it when the block is fired by hand.
            "receive" => {
                if has_value(config, "payload") {
                    return Ok(config.get("payload").cloned().unwrap_or(Value::Null));
                }
                Ok(match input {
                    Some(payload) => payload,
                    None => json!({
                        "path": str_value(config, "path").unwrap_or_default(),
                        "received_at": Utc::now().to_rfc3339(),
                    }),
                })
            }
            "send" => {
                let url = str_value(config, "url").unwrap_or_default();
                let body = input.unwrap_or(Value::Null);
                self.remote
                    .post_url_or_simulate(url, &body, ctx, || {
                        json!({ "url": url, "delivered": false })
                    })
                    .await
            }
            other => Err(ConnectorError::UnsupportedOperation(other.to_owned())),
        }
    }
}
