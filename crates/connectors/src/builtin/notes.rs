//! Connector for the notes service (pages inside databases).

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{slug, table_operations, table_validate, OperationTable};
use crate::remote::{RemoteClient, RemoteSettings};
use crate::traits::{str_value, Config};
use crate::{Application, Connector, ConnectorContext, ConnectorError};

const OPERATIONS: OperationTable = &[
    ("create_page", &["database_id", "title"]),
    ("update_page", &["page_id"]),
    ("query_database", &["database_id"]),
    ("append_content", &["page_id", "content"]),
];

pub struct NotesConnector {
    remote: RemoteClient,
}

impl NotesConnector {
    pub fn new(settings: RemoteSettings) -> Self {
        Self {
            remote: RemoteClient::new(settings),
        }
    }
}

#[async_trait]
impl Connector for NotesConnector {
    fn application(&self) -> Application {
        Application::NotesService
    }

    fn operations(&self) -> Vec<String> {
        table_operations(OPERATIONS)
    }

    fn validate(&self, operation: &str, config: &Config) -> bool {
        table_validate(OPERATIONS, operation, config)
    }

    async fn execute(
        &self,
        operation: &str,
        config: &Config,
        input: Option<Value>,
        ctx: &ConnectorContext,
    ) -> Result<Value, ConnectorError> {
        let body = json!({ "config": config, "input": input });

        match operation {
            "create_page" => {
                let database_id = str_value(config, "database_id").unwrap_or_default();
                let title = str_value(config, "title").unwrap_or_default();
                let path = format!("databases/{database_id}/pages");
                self.remote
                    .post_or_simulate(&path, &body, ctx, || {
                        json!({
                            "page_id": format!("{database_id}-{}", slug(title)),
                            "database_id": database_id,
                            "title": title,
                            "properties": input.clone().unwrap_or(Value::Null),
                        })
                    })
                    .await
            }
            "update_page" => {
                let page_id = str_value(config, "page_id").unwrap_or_default();
                let path = format!("pages/{page_id}");
                self.remote
                    .post_or_simulate(&path, &body, ctx, || {
                        json!({
                            "page_id": page_id,
                            "updated": true,
                            "properties": config.get("properties").cloned().unwrap_or(Value::Null),
                        })
                    })
                    .await
            }
            "query_database" => {
                let database_id = str_value(config, "database_id").unwrap_or_default();
                let path = format!("databases/{database_id}/query");
                self.remote
                    .post_or_simulate(&path, &body, ctx, || {
                        json!({
                            "database_id": database_id,
                            "filter": config.get("filter").cloned().unwrap_or(Value::Null),
                            "results": [],
                        })
                    })
                    .await
            }
            "append_content" => {
                let page_id = str_value(config, "page_id").unwrap_or_default();
                let path = format!("pages/{page_id}/children");
                self.remote
                    .post_or_simulate(&path, &body, ctx, || {
                        json!({
                            "page_id": page_id,
                            "appended": config.get("content").cloned().unwrap_or(Value::Null),
                        })
                    })
                    .await
            }
            other => Err(ConnectorError::UnsupportedOperation(other.to_owned())),
        }
    }
}
