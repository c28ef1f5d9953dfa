//! HTTP access to live application APIs, with an explicit simulation fallback.
//!
//! Connectors never fall back silently: when a remote API is unconfigured or
//! unreachable the decision is governed by [`FallbackMode`] and logged.

use std::time::Duration;

use reqwest::RequestBuilder;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::{ConnectorContext, ConnectorError};

/// What a connector does when its remote API cannot be reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackMode {
    /// Log a warning and return a deterministic simulated output.
    #[default]
    Simulate,
    /// Fail the call with [`ConnectorError::Unavailable`].
    Fail,
}

/// Connection settings for one remote application.
#[derive(Debug, Clone)]
pub struct RemoteSettings {
    /// API root, e.g. `https://api.notes.example/v1`. `None` means unconfigured.
    pub base_url: Option<String>,
    /// Sent as a bearer token when present.
    pub api_token: Option<String>,
    /// Per-request timeout.
    pub timeout: Duration,
    pub fallback: FallbackMode,
}

impl Default for RemoteSettings {
    fn default() -> Self {
        Self {
            base_url: None,
            api_token: None,
            timeout: Duration::from_secs(30),
            fallback: FallbackMode::Simulate,
        }
    }
}

impl RemoteSettings {
    /// Settings pointing at `base_url`.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_api_token(mut self, token: impl Into<String>) -> Self {
        self.api_token = Some(token.into());
        self
    }

    pub fn with_fallback(mut self, fallback: FallbackMode) -> Self {
        self.fallback = fallback;
        self
    }
}

/// Thin JSON-over-HTTP client shared by the built-in connectors.
#[derive(Debug, Clone)]
pub struct RemoteClient {
    http: reqwest::Client,
    settings: RemoteSettings,
}

impl RemoteClient {
    pub fn new(settings: RemoteSettings) -> Self {
        Self {
            http: reqwest::Client::new(),
            settings,
        }
    }

    pub fn settings(&self) -> &RemoteSettings {
        &self.settings
    }

    /// POST `body` to `path` under the configured base URL.
    ///
    /// # Errors
    /// [`ConnectorError::Unavailable`] when no base URL is configured or the
    /// transport fails, [`ConnectorError::Remote`] for non-2xx answers and
    /// [`ConnectorError::Cancelled`] if the context is cancelled first.
    pub async fn post(
        &self,
        path: &str,
        body: &Value,
        ctx: &ConnectorContext,
    ) -> Result<Value, ConnectorError> {
        let Some(base) = self.settings.base_url.as_deref() else {
            return Err(ConnectorError::Unavailable("no base URL configured".into()));
        };
        let url = format!(
            "{}/{}",
            base.trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        self.post_url(&url, body, ctx).await
    }

    /// POST `body` to an absolute `url`.
    pub async fn post_url(
        &self,
        url: &str,
        body: &Value,
        ctx: &ConnectorContext,
    ) -> Result<Value, ConnectorError> {
        debug!(block_id = %ctx.block_id, url, "remote call");
        self.send(self.http.post(url).json(body), ctx).await
    }

    /// Like [`RemoteClient::post`], but turn an unavailable remote into
    /// `simulate()`'s output when the fallback mode allows it.
    pub async fn post_or_simulate<F>(
        &self,
        path: &str,
        body: &Value,
        ctx: &ConnectorContext,
        simulate: F,
    ) -> Result<Value, ConnectorError>
    where
        F: FnOnce() -> Value + Send,
    {
        let result = self.post(path, body, ctx).await;
        self.fall_back(result, ctx, path, simulate)
    }

    /// Like [`RemoteClient::post_url`], with the same fallback rule as
    /// [`RemoteClient::post_or_simulate`].
    pub async fn post_url_or_simulate<F>(
        &self,
        url: &str,
        body: &Value,
        ctx: &ConnectorContext,
        simulate: F,
    ) -> Result<Value, ConnectorError>
    where
        F: FnOnce() -> Value + Send,
    {
        let result = self.post_url(url, body, ctx).await;
        self.fall_back(result, ctx, url, simulate)
    }

    fn fall_back<F>(
        &self,
        result: Result<Value, ConnectorError>,
        ctx: &ConnectorContext,
        target: &str,
        simulate: F,
    ) -> Result<Value, ConnectorError>
    where
        F: FnOnce() -> Value,
    {
        match result {
            Err(ConnectorError::Unavailable(reason))
                if self.settings.fallback == FallbackMode::Simulate =>
            {
                warn!(
                    block_id = %ctx.block_id,
                    target,
                    %reason,
                    "remote API unavailable, returning simulated output"
                );
                Ok(simulated(simulate()))
            }
            other => other,
        }
    }

    async fn send(
        &self,
        request: RequestBuilder,
        ctx: &ConnectorContext,
    ) -> Result<Value, ConnectorError> {
        let mut request = request.timeout(self.settings.timeout);
        if let Some(token) = &self.settings.api_token {
            request = request.bearer_auth(token);
        }

        let response = tokio::select! {
            _ = ctx.cancel.cancelled() => return Err(ConnectorError::Cancelled),
            sent = request.send() => sent.map_err(|e| ConnectorError::Unavailable(e.to_string()))?,
        };

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ConnectorError::Remote {
                status: Some(status.as_u16()),
                message,
            });
        }

        response.json::<Value>().await.map_err(|e| ConnectorError::Remote {
            status: None,
            message: e.to_string(),
        })
    }
}

/// Mark `value` as simulated so downstream consumers can tell.
pub fn simulated(mut value: Value) -> Value {
    if let Some(obj) = value.as_object_mut() {
        obj.insert("simulated".into(), Value::Bool(true));
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn unconfigured_remote_simulates_by_default() {
        let client = RemoteClient::new(RemoteSettings::default());
        let ctx = ConnectorContext::detached("b1");

        let out = client
            .post_or_simulate("pages", &json!({}), &ctx, || json!({ "id": "page-1" }))
            .await
            .expect("simulated");

        assert_eq!(out, json!({ "id": "page-1", "simulated": true }));
    }

    #[tokio::test]
    async fn unconfigured_remote_fails_when_simulation_disabled() {
        let client = RemoteClient::new(RemoteSettings::default().with_fallback(FallbackMode::Fail));
        let ctx = ConnectorContext::detached("b1");

        let result = client
            .post_or_simulate("pages", &json!({}), &ctx, || json!({}))
            .await;

        assert!(matches!(result, Err(ConnectorError::Unavailable(_))));
    }

    #[tokio::test]
    async fn unreachable_remote_falls_back_to_simulation() {
        // Port 9 (discard) on localhost is not expected to speak HTTP.
        let settings = RemoteSettings {
            timeout: Duration::from_millis(500),
            ..RemoteSettings::default()
        }
        .with_base_url("http://127.0.0.1:9");
        let client = RemoteClient::new(settings);
        let ctx = ConnectorContext::detached("b1");

        let out = client
            .post_or_simulate("files", &json!({}), &ctx, || json!({ "ok": true }))
            .await
            .expect("falls back");
        assert_eq!(out["simulated"], json!(true));
    }
}
