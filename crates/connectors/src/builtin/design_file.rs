//! Connector for the design-file service (files, frames, comments).

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{table_operations, table_validate, OperationTable};
use crate::remote::{RemoteClient, RemoteSettings};
use crate::traits::{str_value, Config};
use crate::{Application, Connector, ConnectorContext, ConnectorError};

const OPERATIONS: OperationTable = &[
    ("get_file", &["file_key"]),
    ("export_frames", &["file_key"]),
    ("get_comments", &["file_key"]),
    ("post_comment", &["file_key", "message"]),
];

pub struct DesignFileConnector {
    remote: RemoteClient,
}

impl DesignFileConnector {
    pub fn new(settings: RemoteSettings) -> Self {
        Self {
            remote: RemoteClient::new(settings),
        }
    }
}

#[async_trait]
impl Connector for DesignFileConnector {
    fn application(&self) -> Application {
        Application::DesignFileService
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
        let file_key = str_value(config, "file_key").unwrap_or_default();
        let body = json!({ "config": config, "input": input });

        match operation {
            "get_file" => {
                self.remote
                    .post_or_simulate(&format!("files/{file_key}"), &body, ctx, || {
                        json!({
                            "file_key": file_key,
                            "name": format!("Design {file_key}"),
                            "pages": [{ "id": "0:1", "name": "Page 1" }],
                        })
                    })
                    .await
            }
            "export_frames" => {
                let format = str_value(config, "format").unwrap_or("png");
                let frame_ids: Vec<String> = config
                    .get("frame_ids")
                    .and_then(Value::as_array)
                    .map(|ids| ids.iter().filter_map(Value::as_str).map(str::to_owned).collect())
                    .unwrap_or_else(|| vec!["0:1".to_owned()]);
                self.remote
                    .post_or_simulate(&format!("files/{file_key}/export"), &body, ctx, || {
                        let exports: Vec<Value> = frame_ids
                            .iter()
                            .map(|id| {
                                json!({
                                    "frame_id": id,
                                    "url": format!("simulated://{file_key}/{id}.{format}"),
                                })
                            })
                            .collect();
                        json!({ "file_key": file_key, "format": format, "exports": exports })
                    })
                    .await
            }
            "get_comments" => {
                self.remote
                    .post_or_simulate(&format!("files/{file_key}/comments"), &body, ctx, || {
                        json!({ "file_key": file_key, "comments": [] })
                    })
                    .await
            }
            "post_comment" => {
                let message = str_value(config, "message").unwrap_or_default();
                self.remote
                    .post_or_simulate(&format!("files/{file_key}/comments/new"), &body, ctx, || {
                        json!({
                            "file_key": file_key,
                            "comment": { "id": format!("{file_key}-comment"), "message": message },
                        })
                    })
                    .await
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
    fn every_operation_needs_a_file_key() {
        let design = DesignFileConnector::new(RemoteSettings::default());
        for op in design.operations() {
            let mut cfg = config(json!({ "message": "looks good" }));
            assert!(!design.validate(&op, &cfg), "{op} without file_key");
            cfg.insert("file_key".into(), json!(""));
            assert!(!design.validate(&op, &cfg), "{op} with blank file_key");
            cfg.insert("file_key".into(), json!("abc123"));
            assert!(design.validate(&op, &cfg), "{op} with file_key");
        }
        assert!(!design.validate("post_comment", &config(json!({ "file_key": "abc" }))));
    }

    #[tokio::test]
    async fn export_frames_lists_one_export_per_frame() {
        let design = DesignFileConnector::new(RemoteSettings::default());
        let cfg = config(json!({ "file_key": "k1", "frame_ids": ["1:2", "1:3"], "format": "svg" }));
        let ctx = ConnectorContext::detached("d1");

        let out = design.execute("export_frames", &cfg, None, &ctx).await.expect("simulated");

        assert_eq!(out["exports"].as_array().map(Vec::len), Some(2));
        assert_eq!(out["exports"][1]["url"], json!("simulated://k1/1:3.svg"));
    }
}
