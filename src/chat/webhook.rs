//! Webhook transport

use async_trait::async_trait;
use serde::Serialize;

use super::reply::Reply;
use crate::{Error, Result};

/// Request body posted to the webhook
#[derive(Debug, Serialize)]
struct Query<'a> {
    query: &'a str,
}

/// Something that can answer a question
#[async_trait]
pub trait Webhook: Send + Sync {
    /// Send one question and interpret the answer
    ///
    /// # Errors
    ///
    /// Returns error on transport failure, non-success status or an
    /// unreadable body
    async fn ask(&self, endpoint: &str, query: &str) -> Result<Reply>;
}

/// Webhook reached over HTTP with a JSON round trip
#[derive(Debug, Clone, Default)]
pub struct HttpWebhook {
    client: reqwest::Client,
}

impl HttpWebhook {
    /// Create a webhook client
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a webhook client sharing an existing HTTP client
    #[must_use]
    pub const fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Webhook for HttpWebhook {
    async fn ask(&self, endpoint: &str, query: &str) -> Result<Reply> {
        if endpoint.is_empty() {
            return Err(Error::Webhook("no webhook URL configured".to_string()));
        }

        tracing::debug!(endpoint, query_len = query.len(), "posting query to webhook");

        let response = self
            .client
            .post(endpoint)
            .json(&Query { query })
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, "webhook request failed");
                e
            })?;

        let status = response.status();
        tracing::debug!(status = %status, "received webhook response");

        if !status.is_success() {
            return Err(Error::Webhook(format!("server responded with {status}")));
        }

        let body = response.bytes().await?;
        Reply::from_slice(&body)
    }
}
