//! Byte-size probes.

use async_trait::async_trait;
use reqwest::header::CONTENT_LENGTH;
use tracing::debug;

use crate::error::{CollectError, Result};

/// Reads the transfer size of a URL.
#[async_trait]
pub trait SizeProbe: Send + Sync {
    async fn size_of(&self, url: &str) -> Result<u64>;
}

/// Probe over HTTP: `HEAD` first, a full `GET` when no length is advertised.
pub struct HttpSizeProbe {
    client: reqwest::Client,
}

impl HttpSizeProbe {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn head_length(&self, url: &str) -> Result<Option<u64>> {
        let response = self.client.head(url).send().await?;

        if !response.status().is_success() {
            return Ok(None);
        }

        Ok(response
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse::<u64>().ok()))
    }
}

#[async_trait]
impl SizeProbe for HttpSizeProbe {
    async fn size_of(&self, url: &str) -> Result<u64> {
        if let Some(length) = self.head_length(url).await? {
            return Ok(length);
        }

        debug!(url, "No Content-Length on HEAD, downloading body");
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(CollectError::Probe(format!("{} returned {}", url, status)));
        }

        let body = response.bytes().await?;
        Ok(body.len() as u64)
    }
}
