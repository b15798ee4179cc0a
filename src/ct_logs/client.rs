// CT Log API Client
//
// RFC 6962 get-sth and get-entries over HTTP. Rate limiting (429) and server
// errors are retried here with a short exponential backoff; a call that
// still fails counts as one failure against the source.

use crate::{Result, tls_bail};
use crate::error::TlsError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

const MAX_RETRIES: u32 = 3;
const INITIAL_BACKOFF: Duration = Duration::from_millis(100);
const MAX_BACKOFF: Duration = Duration::from_secs(5);

/// One entry as returned by get-entries
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RawLogEntry {
    /// base64 MerkleTreeLeaf
    pub leaf_input: String,
    /// base64 chain data; holds the full precertificate for precert entries
    pub extra_data: String,
}

/// Read access to a CT log
#[async_trait]
pub trait CtLogClient: Send + Sync {
    /// Current tree size from the signed tree head
    async fn tree_size(&self, log_url: &str) -> Result<u64>;

    /// Entries `start..=end`. Logs may return fewer than requested.
    async fn entries(&self, log_url: &str, start: u64, end: u64) -> Result<Vec<RawLogEntry>>;
}

pub struct HttpCtClient {
    client: reqwest::Client,
}

impl HttpCtClient {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(10)
            .build()?;
        Ok(Self { client })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn get(&self, url: &str) -> Result<reqwest::Response> {
        let mut backoff = INITIAL_BACKOFF;
        let mut last_error = String::new();

        for attempt in 1..=MAX_RETRIES {
            match self.client.get(url).send().await {
                Ok(response) if response.status().is_success() => return Ok(response),
                Ok(response)
                    if response.status().as_u16() == 429 || response.status().is_server_error() =>
                {
                    last_error = format!("status {}", response.status());
                }
                Ok(response) => {
                    return Err(TlsError::HttpError {
                        status: response.status().as_u16(),
                        details: format!("GET {} rejected", url),
                    });
                }
                Err(e) => last_error = e.to_string(),
            }

            if attempt < MAX_RETRIES {
                warn!(
                    "CT request {} failed ({}), retrying in {:?} (attempt {}/{})",
                    url, last_error, backoff, attempt, MAX_RETRIES
                );
                tokio::time::sleep(backoff).await;
                backoff = (backoff * 2).min(MAX_BACKOFF);
            }
        }

        tls_bail!(
            "GET {} failed after {} attempts: {}",
            url,
            MAX_RETRIES,
            last_error
        )
    }
}

#[async_trait]
impl CtLogClient for HttpCtClient {
    async fn tree_size(&self, log_url: &str) -> Result<u64> {
        let url = format!("{}/ct/v1/get-sth", log_url.trim_end_matches('/'));
        let sth: SignedTreeHead = self.get(&url).await?.json().await?;
        Ok(sth.tree_size)
    }

    async fn entries(&self, log_url: &str, start: u64, end: u64) -> Result<Vec<RawLogEntry>> {
        let url = format!(
            "{}/ct/v1/get-entries?start={}&end={}",
            log_url.trim_end_matches('/'),
            start,
            end
        );
        debug!("Fetching entries {}-{} from {}", start, end, log_url);
        let response: EntriesResponse = self.get(&url).await?.json().await?;
        Ok(response.entries)
    }
}

#[derive(Debug, Deserialize)]
struct SignedTreeHead {
    tree_size: u64,
}

#[derive(Debug, Deserialize)]
struct EntriesResponse {
    entries: Vec<RawLogEntry>,
}
