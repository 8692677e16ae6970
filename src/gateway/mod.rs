//! Backend gateway: the external service that generates replies and owns
//! onboarding state.
//!
//! The proxy talks to the backend only through [`BackendGateway`], so tests
//! can substitute a stub. [`HttpGateway`] is the production implementation.
//!
//! Status and day-completion bodies stay as raw JSON here; the proxy hands
//! them to its caller unchanged. Typed decoding happens on the client side.

mod http;

pub use http::HttpGateway;

use async_trait::async_trait;

use crate::error::GatewayError;
use crate::onboarding::Message;

/// Operations the backend offers. Each call is a single attempt.
#[async_trait]
pub trait BackendGateway: Send + Sync {
    /// Generate the assistant's reply to `user_input` given prior history.
    async fn generate_reply(
        &self,
        user_input: &str,
        memory: &[Message],
    ) -> Result<String, GatewayError>;

    /// Fetch the caller's onboarding status, exactly as the backend sent it.
    async fn fetch_status(
        &self,
        auth_token: Option<&str>,
    ) -> Result<serde_json::Value, GatewayError>;

    /// Mark the caller's current onboarding day complete. The backend's
    /// reply is returned untouched.
    async fn mark_day_complete(
        &self,
        auth_token: Option<&str>,
    ) -> Result<serde_json::Value, GatewayError>;

    /// Export everything the backend holds about the caller.
    async fn export_data(
        &self,
        auth_token: Option<&str>,
    ) -> Result<serde_json::Value, GatewayError>;
}
