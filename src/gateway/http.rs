//! HTTP implementation of [`ModelGateway`] for the Gemini
//! `generateContent` API.
//!
//! One network call per completion with a bounded timeout; transient
//! failures (connect errors, timeouts, 5xx) are retried with exponential
//! backoff through [`super::with_retries`]. HTTP 429 comes back as
//! [`GatewayError::RateLimited`] without an in-place retry so the
//! orchestrator can fail over to an alternate model.

use async_trait::async_trait;
use serde::Deserialize;

use crate::cancel::CancelToken;

use super::{GatewayError, ModelGateway, REQUEST_TIMEOUT, strip_code_fence, with_retries};

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Gemini-backed model gateway.
pub struct HttpGateway {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

impl HttpGateway {
    /// Create a gateway with a model API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_base_url(API_BASE, api_key)
    }

    /// Create a gateway against a specific base URL (stub server in tests).
    pub fn with_base_url(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }

    /// One request/response round-trip, classified into the error taxonomy.
    async fn call_once(&self, prompt: &str, model: &str) -> Result<String, GatewayError> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, model, self.api_key
        );
        let payload = serde_json::json!({
            "contents": [{ "parts": [{ "text": prompt }] }],
            "generationConfig": { "temperature": 0.4 },
        });

        let response = self
            .client
            .post(&url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() || e.is_connect() {
                    GatewayError::Transient(e.to_string())
                } else {
                    GatewayError::Api(e.to_string())
                }
            })?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(GatewayError::RateLimited);
        }
        if status.is_server_error() {
            return Err(GatewayError::Transient(format!("HTTP {status}")));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Api(format!("HTTP {status}: {body}")));
        }

        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::Api(format!("malformed response body: {e}")))?;

        let text: String = body
            .candidates
            .first()
            .map(|c| {
                c.content
                    .parts
                    .iter()
                    .map(|p| p.text.as_str())
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(GatewayError::Api("empty model response".to_string()));
        }

        Ok(strip_code_fence(&text))
    }
}

#[async_trait]
impl ModelGateway for HttpGateway {
    async fn complete(
        &self,
        prompt: &str,
        model: &str,
        cancel: &CancelToken,
    ) -> Result<String, GatewayError> {
        with_retries(
            |_attempt| async {
                tokio::select! {
                    result = self.call_once(prompt, model) => result,
                    _ = cancel.cancelled() => Err(GatewayError::Cancelled),
                }
            },
            cancel,
        )
        .await
    }
}
