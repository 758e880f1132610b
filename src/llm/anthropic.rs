//! Anthropic Messages API client
//!
//! A thin `reqwest` wrapper: one non-streaming POST per model round trip.
//! The agent backend drives the tool loop on top of it.

use anyhow::{Context, Result};
use reqwest::Client;

use super::auth::Credential;
use super::types::{ErrorEnvelope, MessageRequest, MessageResponse};

const DEFAULT_API_BASE: &str = "https://api.anthropic.com";
const API_VERSION: &str = "2023-06-01";

/// HTTP client for the Messages endpoint
#[derive(Clone)]
pub struct AnthropicClient {
    client: Client,
    api_base: String,
}

impl AnthropicClient {
    /// Create a client against the public API
    pub fn new() -> Self {
        Self::with_base(DEFAULT_API_BASE)
    }

    /// Create a client against a different base URL
    pub fn with_base(api_base: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
        }
    }

    /// Send one request and wait for the full response
    pub async fn send(
        &self,
        credential: &Credential,
        request: &MessageRequest,
    ) -> Result<MessageResponse> {
        let url = format!("{}/v1/messages", self.api_base);

        tracing::debug!(
            "[Anthropic] POST {} model={} messages={} auth={}",
            url,
            request.model,
            request.messages.len(),
            credential.kind()
        );

        let builder = self
            .client
            .post(&url)
            .header("anthropic-version", API_VERSION)
            .json(request);

        let response = credential
            .apply(builder)
            .send()
            .await
            .context("Failed to send request to Anthropic API")?;

        let status = response.status();
        let body = response
            .text()
            .await
            .context("Failed to read Anthropic response body")?;

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorEnvelope>(&body)
                .map(|e| e.error.to_string())
                .unwrap_or(body);
            tracing::error!("[Anthropic] API error: {} - {}", status, message);
            anyhow::bail!("Anthropic API error ({}): {}", status, message);
        }

        let parsed: MessageResponse =
            serde_json::from_str(&body).context("Failed to parse Anthropic API response")?;

        tracing::debug!(
            "[Anthropic] Response {} stop={:?} in={} out={}",
            parsed.id,
            parsed.stop_reason,
            parsed.usage.input_tokens,
            parsed.usage.output_tokens
        );

        Ok(parsed)
    }
}

impl Default for AnthropicClient {
    fn default() -> Self {
        Self::new()
    }
}
