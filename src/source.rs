//! HTTP access for catalog documents and image bytes.
//!
//! Every stage talks to the network through [`HttpSource`], so tests can swap in
//! an in-memory implementation. [`ReqwestSource`] is the production client: built
//! once per run from the [`Config`] and shared by reference.

use crate::config::Config;
use crate::error::{RequestError, Result};
use std::time::Duration;

/// Abstraction over "fetch URL -> JSON" and "fetch URL -> bytes"
#[async_trait::async_trait]
pub trait HttpSource: Send + Sync {
    /// GET a JSON document; non-success statuses are errors
    async fn get_json(&self, url: &str) -> std::result::Result<serde_json::Value, RequestError>;

    /// GET a raw body; non-success statuses are errors
    async fn get_bytes(&self, url: &str) -> std::result::Result<Vec<u8>, RequestError>;
}

/// Production [`HttpSource`] backed by a single `reqwest::Client`
#[derive(Clone)]
pub struct ReqwestSource {
    client: reqwest::Client,
    api_timeout: Duration,
    image_timeout: Duration,
}

impl ReqwestSource {
    /// Build the client with the timeouts configured for each request kind
    pub fn new(config: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("catalog-harvest/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            api_timeout: config.api.request_timeout,
            image_timeout: config.download.request_timeout,
        })
    }

    async fn get(
        &self,
        url: &str,
        timeout: Duration,
    ) -> std::result::Result<reqwest::Response, RequestError> {
        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|source| RequestError::Transport {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(RequestError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        Ok(response)
    }
}

#[async_trait::async_trait]
impl HttpSource for ReqwestSource {
    async fn get_json(&self, url: &str) -> std::result::Result<serde_json::Value, RequestError> {
        let response = self.get(url, self.api_timeout).await?;
        let body = response
            .bytes()
            .await
            .map_err(|source| RequestError::Transport {
                url: url.to_string(),
                source,
            })?;

        serde_json::from_slice(&body).map_err(|source| RequestError::Decode {
            url: url.to_string(),
            source,
        })
    }

    async fn get_bytes(&self, url: &str) -> std::result::Result<Vec<u8>, RequestError> {
        let response = self.get(url, self.image_timeout).await?;
        let body = response
            .bytes()
            .await
            .map_err(|source| RequestError::Transport {
                url: url.to_string(),
                source,
            })?;
        Ok(body.to_vec())
    }
}
