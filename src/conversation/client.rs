//! Client for the same-origin proxy endpoints.
//!
//! This is what the conversation store calls. It distinguishes a proxy that
//! answered with an error status from one that could not be reached at all;
//! the store shows different fallback text for each.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::config::{ClientConfig, normalize_base_url};
use crate::error::{ClientError, ConfigError};
use crate::onboarding::{DayCompletion, Message, UserStatus};
use crate::proxy::routes::{ChatResponse, MARK_DAY_COMPLETE};

/// Operations the proxy exposes to the client.
#[async_trait]
pub trait ProxyApi: Send + Sync {
    /// `POST /api/chat`. `memory` is the history before `message`.
    async fn chat(&self, message: &str, memory: &[Message]) -> Result<String, ClientError>;

    /// `GET /api/user`
    async fn user_status(&self) -> Result<UserStatus, ClientError>;

    /// `POST /api/user` with `action = "mark-day-complete"`.
    async fn mark_day_complete(&self) -> Result<DayCompletion, ClientError>;

    /// `GET /api/user/export`
    async fn export_data(&self) -> Result<serde_json::Value, ClientError>;
}

/// reqwest-backed [`ProxyApi`].
pub struct HttpProxyClient {
    base_url: String,
    auth_token: Option<SecretString>,
    client: reqwest::Client,
}

impl HttpProxyClient {
    pub fn new(
        base_url: &str,
        auth_token: Option<SecretString>,
        timeout: Duration,
    ) -> Result<Self, ConfigError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;
        Ok(Self {
            base_url: normalize_base_url(base_url),
            auth_token,
            client,
        })
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self, ConfigError> {
        Self::new(
            &config.proxy_url,
            config.auth_token.clone(),
            config.request_timeout,
        )
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let request = self
            .client
            .request(method, format!("{}{path}", self.base_url));
        match &self.auth_token {
            Some(token) => request.bearer_auth(token.expose_secret()),
            None => request,
        }
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, ClientError> {
        let resp = request.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let message = resp
                .json::<serde_json::Value>()
                .await
                .ok()
                .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(String::from))
                .unwrap_or_else(|| status.to_string());
            debug!(status = status.as_u16(), %message, "Proxy returned an error");
            return Err(ClientError::Status {
                status: status.as_u16(),
                message,
            });
        }
        resp.json::<T>()
            .await
            .map_err(|e| ClientError::Decode(e.to_string()))
    }
}

#[async_trait]
impl ProxyApi for HttpProxyClient {
    async fn chat(&self, message: &str, memory: &[Message]) -> Result<String, ClientError> {
        let body = serde_json::json!({ "message": message, "memory": memory });
        let request = self.request(reqwest::Method::POST, "/api/chat").json(&body);
        let resp: ChatResponse = self.execute(request).await?;
        Ok(resp.response)
    }

    async fn user_status(&self) -> Result<UserStatus, ClientError> {
        self.execute(self.request(reqwest::Method::GET, "/api/user"))
            .await
    }

    async fn mark_day_complete(&self) -> Result<DayCompletion, ClientError> {
        let body = serde_json::json!({ "action": MARK_DAY_COMPLETE });
        let request = self.request(reqwest::Method::POST, "/api/user").json(&body);
        self.execute(request).await
    }

    async fn export_data(&self) -> Result<serde_json::Value, ClientError> {
        self.execute(self.request(reqwest::Method::GET, "/api/user/export"))
            .await
    }
}
