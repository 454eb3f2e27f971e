//! Green hosting lookups.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use crate::error::Result;

/// Green Web Foundation greencheck endpoint.
pub const GREENCHECK_ENDPOINT: &str = "https://api.thegreenwebfoundation.org/api/v3/greencheck";

/// A directory of hosts known to run on renewable energy.
#[async_trait]
pub trait HostingDirectory: Send + Sync {
    /// Returns whether `host` is green.
    async fn is_green(&self, host: &str) -> Result<bool>;
}

/// Lookups against the Green Web Foundation API.
pub struct GreenWebFoundation {
    client: reqwest::Client,
    endpoint: String,
}

impl GreenWebFoundation {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            endpoint: GREENCHECK_ENDPOINT.to_string(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[derive(Debug, Deserialize)]
struct GreenCheck {
    #[serde(default)]
    green: bool,
}

#[async_trait]
impl HostingDirectory for GreenWebFoundation {
    async fn is_green(&self, host: &str) -> Result<bool> {
        let url = format!("{}/{}", self.endpoint.trim_end_matches('/'), host);
        let check: GreenCheck = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(check.green)
    }
}

/// Host memo for a single collection run.
///
/// Each distinct host is looked up at most once, even when many images on
/// that host ask at the same time. Failed lookups count as not green.
pub struct GreenHostResolver {
    directory: Arc<dyn HostingDirectory>,
    memo: Mutex<HashMap<String, Arc<OnceCell<bool>>>>,
}

impl GreenHostResolver {
    pub fn new(directory: Arc<dyn HostingDirectory>) -> Self {
        Self {
            directory,
            memo: Mutex::new(HashMap::new()),
        }
    }

    /// Returns whether `host` is green, consulting the directory once per host.
    pub async fn is_green(&self, host: &str) -> bool {
        let host = host.to_lowercase();
        let cell = {
            let mut memo = self.memo.lock().unwrap_or_else(|e| e.into_inner());
            memo.entry(host.clone()).or_default().clone()
        };

        *cell
            .get_or_init(|| async {
                match self.directory.is_green(&host).await {
                    Ok(green) => {
                        debug!(host = %host, green, "Resolved hosting");
                        green
                    }
                    Err(e) => {
                        warn!(host = %host, error = %e, "Green hosting lookup failed");
                        false
                    }
                }
            })
            .await
    }

    /// Number of distinct hosts seen so far.
    pub fn len(&self) -> usize {
        self.memo.lock().map(|memo| memo.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
