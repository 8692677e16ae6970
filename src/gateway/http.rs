//! HTTP implementation of the backend gateway.

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::BackendGateway;
use crate::config::{ProxyConfig, normalize_base_url};
use crate::error::{ConfigError, GatewayError};
use crate::onboarding::Message;

/// Longest backend error body kept for logs.
const MAX_ERROR_BODY: usize = 512;

/// Talks to the backend over JSON/HTTP.
pub struct HttpGateway {
    base_url: String,
    timeout: Duration,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    user_input: &'a str,
    memory: &'a [Message],
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

impl HttpGateway {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ConfigError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;
        Ok(Self {
            base_url: normalize_base_url(base_url),
            timeout,
            client,
        })
    }

    pub fn from_config(config: &ProxyConfig) -> Result<Self, ConfigError> {
        Self::new(&config.backend_url, config.request_timeout)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn authorize(
        request: reqwest::RequestBuilder,
        auth_token: Option<&str>,
    ) -> reqwest::RequestBuilder {
        match auth_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Send a request and decode a successful JSON body.
    async fn execute<T: DeserializeOwned>(
        &self,
        operation: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<T, GatewayError> {
        let resp = request
            .send()
            .await
            .map_err(|e| GatewayError::from_reqwest(operation, self.timeout, e))?;

        let status = resp.status();
        if !status.is_success() {
            let mut body = resp.text().await.unwrap_or_default();
            if body.len() > MAX_ERROR_BODY {
                let cut = (0..=MAX_ERROR_BODY)
                    .rev()
                    .find(|&i| body.is_char_boundary(i))
                    .unwrap_or(0);
                body.truncate(cut);
            }
            return Err(GatewayError::Status {
                operation: operation.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        debug!(operation, status = status.as_u16(), "Backend call succeeded");

        resp.json::<T>().await.map_err(|e| GatewayError::Decode {
            operation: operation.to_string(),
            reason: e.to_string(),
        })
    }
}

#[async_trait]
impl BackendGateway for HttpGateway {
    async fn generate_reply(
        &self,
        user_input: &str,
        memory: &[Message],
    ) -> Result<String, GatewayError> {
        let body = GenerateRequest { user_input, memory };
        let request = self.client.post(self.url("/api/generate")).json(&body);
        let resp: GenerateResponse = self.execute("generate", request).await?;
        Ok(resp.response)
    }

    async fn fetch_status(
        &self,
        auth_token: Option<&str>,
    ) -> Result<serde_json::Value, GatewayError> {
        let request = Self::authorize(self.client.get(self.url("/api/user/status")), auth_token);
        self.execute("user status", request).await
    }

    async fn mark_day_complete(
        &self,
        auth_token: Option<&str>,
    ) -> Result<serde_json::Value, GatewayError> {
        let request = Self::authorize(
            self.client.post(self.url("/api/user/mark-complete")),
            auth_token,
        );
        self.execute("mark complete", request).await
    }

    async fn export_data(
        &self,
        auth_token: Option<&str>,
    ) -> Result<serde_json::Value, GatewayError> {
        let request = Self::authorize(self.client.post(self.url("/api/user/export")), auth_token);
        self.execute("export", request).await
    }
}
