//! Delivery client for the downstream recipe API
//!
//! Posts JSON to `base_url + endpoint`. Anything but a 2xx is a failure; the
//! client never retries. Retrying is "try again next pass".

use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

use crate::normalizer::Event;

const USER_AGENT: &str = concat!("prato-sync/", env!("CARGO_PKG_VERSION"));

/// Delivery client errors
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// Timeout, DNS failure, connection refused, ...
    #[error("Network error: {0}")]
    Network(String),

    /// Downstream answered with a non-2xx status
    #[error("API returned {status}")]
    Status { status: u16, body: String },

    /// 2xx response whose body is not the expected JSON
    #[error("Invalid API response: {0}")]
    Parse(String),
}

/// Parsed JSON body of a successful delivery
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteResult(pub Value);

impl RemoteResult {
    /// Identifier assigned to a single record (`recipe_id`)
    ///
    /// Numeric ids are accepted and rendered as text.
    pub fn recipe_id(&self) -> Option<String> {
        match self.0.get("recipe_id")? {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// Number of events the batch endpoint accepted (`processed`)
    pub fn processed(&self) -> Option<u64> {
        self.0.get("processed")?.as_u64()
    }
}

/// HTTP client bound to one downstream base URL
#[derive(Debug, Clone)]
pub struct DeliveryClient {
    http_client: reqwest::Client,
    base_url: String,
}

impl DeliveryClient {
    /// Create a client; `timeout` of `None` keeps the reqwest default
    pub fn new(base_url: &str, timeout: Option<Duration>) -> Result<Self, DeliveryError> {
        let mut builder = reqwest::Client::builder().user_agent(USER_AGENT);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let http_client = builder
            .build()
            .map_err(|e| DeliveryError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// POST `body` as JSON to `base_url + endpoint`
    pub async fn deliver<T: Serialize + ?Sized>(
        &self,
        endpoint: &str,
        body: &T,
    ) -> Result<RemoteResult, DeliveryError> {
        let url = format!("{}{}", self.base_url, endpoint);

        tracing::debug!(url = %url, "Delivering to API");

        let response = self
            .http_client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| DeliveryError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DeliveryError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let value: Value = response
            .json()
            .await
            .map_err(|e| DeliveryError::Parse(e.to_string()))?;

        Ok(RemoteResult(value))
    }

    /// POST a normalized event to its endpoint
    pub async fn send(&self, event: &Event) -> Result<RemoteResult, DeliveryError> {
        self.deliver(event.endpoint(), event).await
    }
}
