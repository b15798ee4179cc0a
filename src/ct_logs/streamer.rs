// CT Log Streamer - one independent poller per log source
//
// Each poller owns its cursor. Polling moves the cursor forward by the number
// of entries actually returned; a failed poll keeps it where it was. Every new
// certificate is reduced to its hostnames and pushed into the scan queue as
// synthetic host specs.

use super::client::{CtLogClient, RawLogEntry};
use super::deduplicator::Deduplicator;
use super::parser::CtLogEntry;
use super::sources::{LogSource, SourceState};
use crate::constants::{
    CT_DEFAULT_POLL_INTERVAL, CT_DEFAULT_RECENT_OFFSET, CT_LOG_LIST_URL, CT_MAX_BATCH_SIZE,
    DEFAULT_PORT,
};
use crate::resolver::HostSpec;
use crate::utils::Shutdown;
use futures::future::join_all;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

/// Where a source's cursor starts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartPosition {
    /// Explicit `source=index` override
    Index(u64),
    Beginning,
    /// This many entries behind the current tree head
    Recent(u64),
}

#[derive(Debug, Clone)]
pub struct CtConfig {
    pub start_from_beginning: bool,
    /// Per-source start index, keyed by source id
    pub start_indices: HashMap<String, u64>,
    pub recent_offset: u64,
    /// Source selectors (id or description substring); empty means all
    pub sources: Vec<String>,
    pub log_list_url: String,
    pub poll_interval: Duration,
    /// Base pause after a failed poll, scaled by the failure count
    pub error_backoff: Duration,
    pub batch_size: u64,
    /// Ports each discovered hostname is queued with
    pub ports: Vec<u16>,
    pub expected_unique_certs: usize,
    pub bloom_fp_rate: f64,
}

impl Default for CtConfig {
    fn default() -> Self {
        Self {
            start_from_beginning: false,
            start_indices: HashMap::new(),
            recent_offset: CT_DEFAULT_RECENT_OFFSET,
            sources: Vec::new(),
            log_list_url: CT_LOG_LIST_URL.to_string(),
            poll_interval: CT_DEFAULT_POLL_INTERVAL,
            error_backoff: Duration::from_secs(5),
            batch_size: CT_MAX_BATCH_SIZE,
            ports: vec![DEFAULT_PORT],
            expected_unique_certs: 1_000_000,
            bloom_fp_rate: 0.0001,
        }
    }
}

impl CtConfig {
    /// Explicit index beats the beginning flag, which beats the recent offset
    pub fn start_for(&self, source_id: &str) -> StartPosition {
        if let Some(index) = self.start_indices.get(source_id) {
            StartPosition::Index(*index)
        } else if self.start_from_beginning {
            StartPosition::Beginning
        } else {
            StartPosition::Recent(self.recent_offset)
        }
    }

    /// Parse one `source=index` mapping
    pub fn parse_index(entry: &str) -> Option<(String, u64)> {
        let (id, index) = entry.split_once('=')?;
        let id = id.trim();
        if id.is_empty() {
            return None;
        }
        Some((id.to_string(), index.trim().parse().ok()?))
    }
}

enum Poll {
    Entries(Vec<RawLogEntry>),
    CaughtUp,
}

pub struct CtStreamer {
    client: Arc<dyn CtLogClient>,
    sources: Vec<LogSource>,
    config: Arc<CtConfig>,
    shutdown: Shutdown,
}

impl CtStreamer {
    pub fn new(
        client: Arc<dyn CtLogClient>,
        sources: Vec<LogSource>,
        config: CtConfig,
        shutdown: Shutdown,
    ) -> Self {
        Self {
            client,
            sources,
            config: Arc::new(config),
            shutdown,
        }
    }

    /// Poll every source until shutdown or until all of them have failed.
    /// Returns the final state of each source.
    pub async fn run(self, tx: mpsc::Sender<HostSpec>) -> Vec<LogSource> {
        info!("Streaming from {} CT log sources", self.sources.len());
        let dedup = Arc::new(Mutex::new(Deduplicator::new(
            self.config.expected_unique_certs,
            self.config.bloom_fp_rate,
        )));

        let pollers: Vec<_> = self
            .sources
            .into_iter()
            .map(|source| {
                let poller = SourcePoller {
                    source,
                    client: Arc::clone(&self.client),
                    config: Arc::clone(&self.config),
                    dedup: Arc::clone(&dedup),
                    tx: tx.clone(),
                    shutdown: self.shutdown.clone(),
                };
                tokio::spawn(poller.run())
            })
            .collect();
        drop(tx);

        let mut finished = Vec::new();
        for joined in join_all(pollers).await {
            match joined {
                Ok(source) => finished.push(source),
                Err(e) => error!("CT poller task failed: {}", e),
            }
        }

        if let Ok(dedup) = dedup.lock() {
            info!(
                "CT streaming stopped: {} certificates seen, {} duplicates dropped",
                dedup.total_seen(),
                dedup.duplicates()
            );
        }
        finished
    }
}

struct SourcePoller {
    source: LogSource,
    client: Arc<dyn CtLogClient>,
    config: Arc<CtConfig>,
    dedup: Arc<Mutex<Deduplicator>>,
    tx: mpsc::Sender<HostSpec>,
    shutdown: Shutdown,
}

impl SourcePoller {
    async fn run(mut self) -> LogSource {
        let Some(mut cursor) = self.initial_cursor().await else {
            return self.source;
        };
        info!("CT source {} starting at index {}", self.source.id, cursor);

        loop {
            self.source.state = SourceState::Polling;
            let polled = tokio::select! {
                _ = self.shutdown.cancelled() => break,
                polled = self.poll_once(cursor) => polled,
            };

            let pause = match polled {
                Ok(Poll::Entries(entries)) => {
                    self.source.mark_success();
                    let count = entries.len() as u64;
                    if !self.emit(cursor, &entries).await {
                        debug!("Scan queue closed, stopping CT source {}", self.source.id);
                        break;
                    }
                    cursor += count;
                    debug!("CT source {} cursor advanced to {}", self.source.id, cursor);
                    continue;
                }
                Ok(Poll::CaughtUp) => {
                    self.source.mark_success();
                    self.source.state = SourceState::Idle;
                    self.config.poll_interval
                }
                Err(e) => {
                    if self.source.mark_failed(e.to_string()) {
                        error!(
                            "CT source {} failed after {} consecutive errors: {}",
                            self.source.id, self.source.failure_count, e
                        );
                        break;
                    }
                    warn!(
                        "CT source {} poll at {} failed ({}), keeping cursor",
                        self.source.id, cursor, e
                    );
                    self.source.state = SourceState::Idle;
                    self.config.error_backoff * self.source.failure_count
                }
            };

            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                _ = sleep(pause) => {}
            }
        }

        if !self.source.is_failed() {
            self.source.state = SourceState::Idle;
        }
        self.source
    }

    async fn initial_cursor(&mut self) -> Option<u64> {
        match self.config.start_for(&self.source.id) {
            StartPosition::Index(index) => Some(index),
            StartPosition::Beginning => Some(0),
            StartPosition::Recent(offset) => {
                let size = tokio::select! {
                    _ = self.shutdown.cancelled() => return None,
                    size = self.client.tree_size(&self.source.url) => size,
                };
                match size {
                    Ok(size) => Some(size.saturating_sub(offset)),
                    Err(e) => {
                        error!("CT source {}: initial tree size failed: {}", self.source.id, e);
                        self.source.last_error = Some(e.to_string());
                        self.source.state = SourceState::Failed;
                        None
                    }
                }
            }
        }
    }

    async fn poll_once(&self, cursor: u64) -> crate::Result<Poll> {
        let tree_size = self.client.tree_size(&self.source.url).await?;
        if cursor >= tree_size {
            return Ok(Poll::CaughtUp);
        }

        let end = (cursor + self.config.batch_size.max(1)).min(tree_size) - 1;
        let entries = self.client.entries(&self.source.url, cursor, end).await?;
        if entries.is_empty() {
            return Ok(Poll::CaughtUp);
        }
        Ok(Poll::Entries(entries))
    }

    /// Queue the hostnames of new certificates; false once the queue is closed
    async fn emit(&self, start: u64, entries: &[RawLogEntry]) -> bool {
        for (offset, raw) in entries.iter().enumerate() {
            let index = start + offset as u64;
            let entry = match CtLogEntry::parse(&self.source.id, index, raw) {
                Ok(entry) => entry,
                Err(e) => {
                    debug!("Skipping entry {} of {}: {}", index, self.source.id, e);
                    continue;
                }
            };

            let hosts = dialable_hosts(&entry.certificate.hostnames());
            if hosts.is_empty() {
                continue;
            }
            let fresh = match self.dedup.lock() {
                Ok(mut dedup) => dedup.first_sighting(&hosts),
                Err(_) => true,
            };
            if !fresh {
                continue;
            }

            for host in &hosts {
                for port in &self.config.ports {
                    if self.tx.send(HostSpec::new(host, *port)).await.is_err() {
                        return false;
                    }
                }
            }
        }
        true
    }
}

/// Wildcard names are queued as their parent domain
fn dialable_hosts(names: &[String]) -> Vec<String> {
    let mut hosts: Vec<String> = Vec::new();
    for name in names {
        let host = name.strip_prefix("*.").unwrap_or(name);
        if host.is_empty() || host.contains('*') {
            continue;
        }
        if !hosts.iter().any(|h| h == host) {
            hosts.push(host.to_string());
        }
    }
    hosts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::certificates::parser::testutil::{TestCert, self_signed};
    use crate::ct_logs::parser::testutil::x509_entry;
    use crate::error::TlsError;
    use async_trait::async_trait;

    #[derive(Default)]
    struct FakeLog {
        /// url -> entries; the tree size is the entry count
        logs: HashMap<String, Vec<RawLogEntry>>,
        /// urls whose every call fails
        broken: Vec<String>,
        requests: Mutex<Vec<(String, u64, u64)>>,
    }

    #[async_trait]
    impl CtLogClient for FakeLog {
        async fn tree_size(&self, url: &str) -> crate::Result<u64> {
            if self.broken.iter().any(|b| b == url) {
                return Err(TlsError::Other("log down".into()));
            }
            Ok(self.logs.get(url).map_or(0, |e| e.len() as u64))
        }

        async fn entries(&self, url: &str, start: u64, end: u64) -> crate::Result<Vec<RawLogEntry>> {
            self.requests.lock().unwrap().push((url.to_string(), start, end));
            let entries = self.logs.get(url).cloned().unwrap_or_default();
            // return at most two entries per call, like a log with a small page size
            Ok(entries
                .into_iter()
                .skip(start as usize)
                .take(((end - start + 1) as usize).min(2))
                .collect())
        }
    }

    fn cert_entry(host: &'static str) -> RawLogEntry {
        let der = self_signed(&TestCert::leaf(host, vec![host])).to_der().unwrap();
        x509_entry(&der, 1_700_000_000_000)
    }

    fn log_of(hosts: &[&'static str]) -> Vec<RawLogEntry> {
        hosts.iter().map(|h| cert_entry(h)).collect()
    }

    fn first_start(fake: &FakeLog, url: &str) -> Option<u64> {
        fake.requests
            .lock()
            .unwrap()
            .iter()
            .find(|(u, _, _)| u == url)
            .map(|(_, start, _)| *start)
    }

    async fn collect(
        fake: Arc<FakeLog>,
        sources: Vec<LogSource>,
        config: CtConfig,
        want: usize,
    ) -> (Vec<HostSpec>, Vec<LogSource>) {
        let shutdown = Shutdown::new();
        let (tx, mut rx) = mpsc::channel(64);
        let streamer = CtStreamer::new(fake, sources, config, shutdown.clone());
        let handle = tokio::spawn(streamer.run(tx));

        let mut specs = Vec::new();
        while specs.len() < want {
            match rx.recv().await {
                Some(spec) => specs.push(spec),
                None => break,
            }
        }
        shutdown.trigger();
        let finished = handle.await.unwrap();
        (specs, finished)
    }

    #[test]
    fn test_start_precedence() {
        let mut config = CtConfig {
            start_from_beginning: true,
            recent_offset: 50,
            ..Default::default()
        };
        config.start_indices.insert("a".into(), 5000);

        assert_eq!(config.start_for("a"), StartPosition::Index(5000));
        assert_eq!(config.start_for("b"), StartPosition::Beginning);

        config.start_from_beginning = false;
        assert_eq!(config.start_for("b"), StartPosition::Recent(50));
    }

    #[test]
    fn test_parse_index() {
        assert_eq!(CtConfig::parse_index("argon=5000"), Some(("argon".into(), 5000)));
        assert_eq!(CtConfig::parse_index("argon"), None);
        assert_eq!(CtConfig::parse_index("=5"), None);
        assert_eq!(CtConfig::parse_index("argon=-1"), None);
    }

    #[test]
    fn test_dialable_hosts() {
        let names = vec!["*.example.com".to_string(), "example.com".to_string(), "a.*.bad".to_string()];
        assert_eq!(dialable_hosts(&names), vec!["example.com".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_beginning_and_explicit_index() {
        let mut logs = HashMap::new();
        logs.insert("https://a/".to_string(), log_of(&["a0.example", "a1.example", "a2.example"]));
        logs.insert("https://b/".to_string(), log_of(&["b0.example", "b1.example"]));
        let fake = Arc::new(FakeLog {
            logs,
            ..Default::default()
        });

        let mut config = CtConfig {
            start_from_beginning: true,
            ..Default::default()
        };
        config.start_indices.insert("a".into(), 2);
        let sources = vec![LogSource::new("a", "https://a/"), LogSource::new("b", "https://b/")];

        let (specs, _) = collect(Arc::clone(&fake), sources, config, 3).await;

        assert_eq!(first_start(&fake, "https://a/"), Some(2));
        assert_eq!(first_start(&fake, "https://b/"), Some(0));
        let mut hosts: Vec<String> = specs.into_iter().map(|s| s.host).collect();
        hosts.sort();
        assert_eq!(hosts, vec!["a2.example", "b0.example", "b1.example"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recent_offset_and_cursor_advance() {
        let mut logs = HashMap::new();
        logs.insert(
            "https://a/".to_string(),
            log_of(&["h0.example", "h1.example", "h2.example", "h3.example", "h4.example"]),
        );
        let fake = Arc::new(FakeLog {
            logs,
            ..Default::default()
        });
        let config = CtConfig {
            recent_offset: 3,
            ports: vec![443, 8443],
            ..Default::default()
        };

        let (specs, _) = collect(Arc::clone(&fake), vec![LogSource::new("a", "https://a/")], config, 6).await;

        let starts: Vec<u64> = fake.requests.lock().unwrap().iter().map(|r| r.1).collect();
        // two entries per page: 2..=3 then 4
        assert_eq!(&starts[..2], &[2, 4]);
        assert_eq!(specs[0], HostSpec::new("h2.example", 443));
        assert_eq!(specs[1], HostSpec::new("h2.example", 8443));
        assert_eq!(specs[5], HostSpec::new("h4.example", 8443));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_source_does_not_block_others() {
        let mut logs = HashMap::new();
        logs.insert("https://good/".to_string(), log_of(&["g0.example", "g1.example"]));
        let fake = Arc::new(FakeLog {
            logs,
            broken: vec!["https://bad/".to_string()],
            ..Default::default()
        });
        let config = CtConfig {
            start_from_beginning: true,
            ..Default::default()
        };
        let sources = vec![LogSource::new("bad", "https://bad/"), LogSource::new("good", "https://good/")];

        let shutdown = Shutdown::new();
        let (tx, mut rx) = mpsc::channel(64);
        let handle = tokio::spawn(CtStreamer::new(fake, sources, config, shutdown.clone()).run(tx));

        let mut hosts = Vec::new();
        for _ in 0..2 {
            hosts.push(rx.recv().await.unwrap().host);
        }
        // let the bad source burn through its failures
        sleep(Duration::from_secs(120)).await;
        shutdown.trigger();
        let finished = handle.await.unwrap();

        assert_eq!(hosts, vec!["g0.example", "g1.example"]);
        let bad = finished.iter().find(|s| s.id == "bad").unwrap();
        assert_eq!(bad.state, SourceState::Failed);
        assert_eq!(bad.failure_count, 3);
        let good = finished.iter().find(|s| s.id == "good").unwrap();
        assert_ne!(good.state, SourceState::Failed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_duplicate_certificates_dropped() {
        let mut logs = HashMap::new();
        logs.insert("https://a/".to_string(), log_of(&["dup.example", "dup.example", "new.example"]));
        let fake = Arc::new(FakeLog {
            logs,
            ..Default::default()
        });
        let config = CtConfig {
            start_from_beginning: true,
            ..Default::default()
        };

        let (specs, _) = collect(fake, vec![LogSource::new("a", "https://a/")], config, 2).await;
        assert_eq!(specs[0].host, "dup.example");
        assert_eq!(specs[1].host, "new.example");
    }
}
