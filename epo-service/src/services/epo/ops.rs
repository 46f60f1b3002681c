//! EPO Open Patent Services (OPS) client.
//!
//! Exchanges the consumer key/secret for an OAuth bearer token, then runs
//! bibliographic searches against `published-data/search`.

use super::token::MAX_TOKEN_LIFETIME;
use super::{AccessToken, PatentSearch, TokenCache, UpstreamError, UpstreamPayload};
use crate::config::OpsConfig;
use async_trait::async_trait;
use axum::body::Bytes;
use reqwest::{header, Client, StatusCode};
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Deserializer};
use service_core::observability::TraceContextExt;
use std::time::{Duration, Instant};

const TOKEN_PATH: &str = "/auth/accesstoken";
const SEARCH_PATH: &str = "/rest-services/published-data/search";

/// Upstream error bodies are cut to this many bytes before logging.
const MAX_ERROR_BODY_LEN: usize = 512;

/// Largest search payload relayed to the caller.
pub const MAX_PAYLOAD_LEN: usize = 8 * 1024 * 1024;

/// Token response from `/auth/accesstoken`.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    /// OPS sends this as a string ("1199"); accept numbers too.
    #[serde(deserialize_with = "seconds_from_str_or_number")]
    expires_in: u64,
}

fn seconds_from_str_or_number<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Seconds {
        Number(u64),
        Text(String),
    }

    match Seconds::deserialize(deserializer)? {
        Seconds::Number(n) => Ok(n),
        Seconds::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

/// Client for EPO Open Patent Services.
pub struct OpsClient {
    client: Client,
    base_url: String,
    consumer_key: String,
    consumer_secret: Secret<String>,
    tokens: TokenCache,
}

impl OpsClient {
    pub fn new(config: &OpsConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .user_agent(concat!("epo-service/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to create HTTP client: {}", e))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            consumer_key: config.consumer_key.expose_secret().clone(),
            consumer_secret: config.consumer_secret.clone(),
            tokens: TokenCache::default(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Exchange the consumer credentials for a bearer token.
    async fn fetch_token(&self) -> Result<AccessToken, UpstreamError> {
        let url = self.url(TOKEN_PATH);

        let response = self
            .client
            .post(&url)
            .basic_auth(&self.consumer_key, Some(self.consumer_secret.expose_secret()))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(UpstreamError::from_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            let body = truncated_body(response).await;
            tracing::error!(status = %status, body = %body, "EPO token exchange failed");
            return Err(UpstreamError::Authentication(format!(
                "token endpoint returned {}",
                status
            )));
        }

        let token: TokenResponse = response.json().await.map_err(|e| {
            UpstreamError::Authentication(format!("Failed to parse token response: {}", e))
        })?;

        let expires_in = Duration::from_secs(token.expires_in);
        if expires_in > MAX_TOKEN_LIFETIME {
            tracing::warn!(
                expires_in = token.expires_in,
                "EPO token lifetime out of range, clamping"
            );
        }

        Ok(AccessToken::new(token.access_token, expires_in))
    }
}

#[async_trait]
impl PatentSearch for OpsClient {
    async fn search(
        &self,
        query: &str,
        request_id: Option<&str>,
    ) -> Result<UpstreamPayload, UpstreamError> {
        let token = self.tokens.get_or_refresh(|| self.fetch_token()).await?;

        let url = self.url(SEARCH_PATH);
        let started = Instant::now();

        tracing::debug!(query_len = query.len(), "Sending search request to EPO");

        let response = self
            .client
            .get(&url)
            .query(&[("q", query)])
            .bearer_auth(token.value())
            .header(header::ACCEPT, "application/json")
            .with_trace_context(request_id)
            .send()
            .await
            .map_err(UpstreamError::from_reqwest)?;

        let status = response.status();
        tracing::debug!(
            status = %status,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "EPO search responded"
        );

        if !status.is_success() {
            if status == StatusCode::UNAUTHORIZED {
                // Revoked or expired early; the next call will re-authenticate.
                self.tokens.invalidate().await;
            }

            let body = truncated_body(response).await;
            tracing::warn!(status = %status, body = %body, "EPO search failed");
            return Err(UpstreamError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        let body = capped_body(response, MAX_PAYLOAD_LEN).await?;

        UpstreamPayload::json(body, content_type)
    }

    fn name(&self) -> &'static str {
        "ops"
    }
}

/// Read the whole body, refusing anything over `limit` bytes.
async fn capped_body(
    mut response: reqwest::Response,
    limit: usize,
) -> Result<Bytes, UpstreamError> {
    let too_large = || {
        UpstreamError::MalformedPayload(format!("response body exceeds {} bytes", limit))
    };

    if response.content_length().is_some_and(|len| len > limit as u64) {
        return Err(too_large());
    }

    let mut body = Vec::new();
    while let Some(chunk) = response.chunk().await.map_err(UpstreamError::from_reqwest)? {
        if body.len() + chunk.len() > limit {
            return Err(too_large());
        }
        body.extend_from_slice(&chunk);
    }

    Ok(Bytes::from(body))
}

async fn truncated_body(response: reqwest::Response) -> String {
    let mut body = response.text().await.unwrap_or_default();
    if body.len() > MAX_ERROR_BODY_LEN {
        let mut cut = MAX_ERROR_BODY_LEN;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
        body.push('…');
    }
    body
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_lifetime_accepts_string_and_number() {
        let from_text: TokenResponse =
            serde_json::from_str(r#"{"access_token":"abc","expires_in":"1199"}"#).unwrap();
        assert_eq!(from_text.expires_in, 1199);

        let from_number: TokenResponse =
            serde_json::from_str(r#"{"access_token":"abc","expires_in":600}"#).unwrap();
        assert_eq!(from_number.expires_in, 600);

        assert!(
            serde_json::from_str::<TokenResponse>(r#"{"access_token":"abc","expires_in":"soon"}"#)
                .is_err()
        );
    }
}
