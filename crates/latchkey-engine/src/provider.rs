//! HTTP client for the provider's session endpoints.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use latchkey_keys::DelegationChain;

use crate::coordinator::CallbackPayload;
use crate::error::{AuthError, AuthResult};

/// The identity provider's completion endpoints.
///
/// One implementation speaks HTTP to the real provider; tests script
/// their own.
#[async_trait]
pub trait ProviderClient: Send + Sync {
    /// Asks whether the session for this public key has completed.
    /// `false` means "not yet", errors mean the question could not be
    /// asked at all.
    async fn poll_status(&self, public_key: &str) -> AuthResult<bool>;

    /// Redeems a callback payload from return navigation for the
    /// delegation chain it references.
    async fn redeem_callback(&self, payload: &CallbackPayload) -> AuthResult<DelegationChain>;

    /// Fetches the delegation chain for a completed session. Used on the
    /// polling path, where no callback payload exists.
    async fn fetch_delegation(&self, public_key: &str) -> AuthResult<DelegationChain>;
}

#[derive(Debug, Deserialize)]
struct SessionStatusResponse {
    completed: bool,
}

#[derive(Debug, Deserialize)]
struct DelegationResponse {
    delegation_chain: DelegationChain,
}

/// HTTP client for the hosted identity provider.
pub struct HttpProviderClient {
    http_client: reqwest::Client,
    base_url: String,
}

impl HttpProviderClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl ProviderClient for HttpProviderClient {
    async fn poll_status(&self, public_key: &str) -> AuthResult<bool> {
        let url = format!("{}/api/session-status", self.base_url);
        let response = self
            .http_client
            .get(&url)
            .query(&[("pubkey", public_key)])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(AuthError::Provider(format!(
                "Status poll failed: HTTP {}",
                response.status()
            )));
        }
        let status: SessionStatusResponse = response.json().await?;
        debug!(completed = status.completed, "Polled session status");
        Ok(status.completed)
    }

    async fn redeem_callback(&self, payload: &CallbackPayload) -> AuthResult<DelegationChain> {
        let url = format!("{}/api/session/redeem", self.base_url);
        let response = self
            .http_client
            .post(&url)
            .json(&serde_json::json!({ "payload": payload.raw }))
            .send()
            .await?;
        let status = response.status();
        if status.is_client_error() {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::InvalidDelegation(format!(
                "Provider rejected the callback payload: HTTP {}: {}",
                status, body
            )));
        }
        if !status.is_success() {
            return Err(AuthError::Provider(format!(
                "Callback redemption failed: HTTP {}",
                status
            )));
        }
        let data: DelegationResponse = response.json().await?;
        Ok(data.delegation_chain)
    }

    async fn fetch_delegation(&self, public_key: &str) -> AuthResult<DelegationChain> {
        let url = format!("{}/api/session/delegation", self.base_url);
        let response = self
            .http_client
            .get(&url)
            .query(&[("pubkey", public_key)])
            .send()
            .await?;
        let status = response.status();
        if status.is_client_error() {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::InvalidDelegation(format!(
                "Provider holds no delegation for this key: HTTP {}: {}",
                status, body
            )));
        }
        if !status.is_success() {
            return Err(AuthError::Provider(format!(
                "Delegation fetch failed: HTTP {}",
                status
            )));
        }
        let data: DelegationResponse = response.json().await?;
        Ok(data.delegation_chain)
    }
}
