// Scheduler - bounded worker pool over the target queue
//
// `concurrency` workers share one receiver. A worker owns a host spec from
// resolution until its last record is submitted; enumeration for a target
// runs inside that slot and drains before the worker pulls the next host.

use super::aggregator::{Record, ResultSink};
use super::config::ScanConfig;
use crate::certificates::{
    Certificate, CertificateEvaluator, RevocationChecker, RevocationOutcome,
};
use crate::data::CIPHER_DB;
use crate::enumeration::{CipherEnumerator, EnumerationResult, VersionEnumerator};
use crate::error::{ProbeError, ProbeErrorKind};
use crate::fingerprint::{CertificateHashes, Ja3Fingerprint, Ja3sFingerprint, JarmFingerprinter};
use crate::probe::{ProbeExecutor, ProbeResult};
use crate::resolver::{HostSpec, Target, TargetResolver};
use crate::utils::{RateLimiter, Shutdown, retry_with_backoff};
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, error, info, warn};

#[derive(Clone)]
pub struct Scanner {
    resolver: Arc<TargetResolver>,
    executor: ProbeExecutor,
    evaluator: Arc<CertificateEvaluator>,
    revocation: Option<Arc<dyn RevocationChecker>>,
    jarm: Option<Arc<JarmFingerprinter>>,
    config: Arc<ScanConfig>,
    shutdown: Shutdown,
}

impl Scanner {
    pub fn new(
        resolver: Arc<TargetResolver>,
        executor: ProbeExecutor,
        evaluator: Arc<CertificateEvaluator>,
        config: ScanConfig,
        shutdown: Shutdown,
    ) -> Self {
        Self {
            resolver,
            executor,
            evaluator,
            revocation: None,
            jarm: None,
            config: Arc::new(config),
            shutdown,
        }
    }

    /// Checker used when revocation is requested
    pub fn with_revocation(mut self, checker: Arc<dyn RevocationChecker>) -> Self {
        self.revocation = Some(checker);
        self
    }

    pub fn with_jarm(mut self, jarm: Arc<JarmFingerprinter>) -> Self {
        self.jarm = Some(jarm);
        self
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Drain `queue` with the worker pool. Returns once the queue is closed
    /// and empty, the sink is gone, or the run is cancelled.
    pub async fn run(&self, queue: mpsc::Receiver<HostSpec>, sink: Arc<ResultSink>) {
        let queue = Arc::new(Mutex::new(queue));
        let concurrency = self.config.pool.concurrency.max(1);
        info!("Starting {} workers", concurrency);

        let workers: Vec<_> = (0..concurrency)
            .map(|id| {
                let scanner = self.clone();
                let queue = queue.clone();
                let sink = sink.clone();
                tokio::spawn(async move { scanner.worker(id, queue, sink).await })
            })
            .collect();

        for worker in workers {
            if let Err(e) = worker.await {
                error!("Worker task failed: {}", e);
            }
        }

        let summary = sink.summary();
        info!(
            "Scan finished: {} succeeded, {} failed ({} suppressed)",
            summary.succeeded, summary.failed, summary.suppressed
        );
    }

    async fn worker(
        self,
        id: usize,
        queue: Arc<Mutex<mpsc::Receiver<HostSpec>>>,
        sink: Arc<ResultSink>,
    ) {
        let pacer = RateLimiter::new(self.config.pool.delay);

        loop {
            let next = tokio::select! {
                _ = self.shutdown.cancelled() => break,
                spec = async { queue.lock().await.recv().await } => spec,
            };
            let Some(spec) = next else { break };

            if !self.scan_host(&spec, &pacer, &sink).await {
                debug!("Worker {}: output closed, stopping", id);
                break;
            }
        }
        debug!("Worker {} done", id);
    }

    /// Resolve and probe every target of one host spec. False once the sink
    /// stops accepting records.
    async fn scan_host(&self, spec: &HostSpec, pacer: &RateLimiter, sink: &ResultSink) -> bool {
        let targets = match self.resolver.resolve(spec).await {
            Ok(targets) => targets,
            Err(e) => {
                debug!("{}: {}", spec, e);
                return sink.submit(Record::unresolved(spec, &e)).await;
            }
        };

        for target in &targets {
            if self.shutdown.is_triggered() {
                break;
            }
            if let Some(record) = self.scan_target(target, pacer).await
                && !sink.submit(record).await
            {
                return false;
            }
        }
        true
    }

    /// One record for one dial target, or None when the run was cancelled
    pub async fn scan_target(&self, target: &Target, pacer: &RateLimiter) -> Option<Record> {
        let attempt_target = target.clone();
        let executor = self.executor.clone();
        let request = self.config.request.clone();
        let pacer = pacer.clone();

        let outcome = tokio::select! {
            _ = self.shutdown.cancelled() => return None,
            outcome = retry_with_backoff(&self.config.pool.retry, move |attempt| {
                let target = attempt_target.clone();
                let executor = executor.clone();
                let request = request.clone();
                let pacer = pacer.clone();
                async move {
                    pacer.wait().await;
                    if attempt > 1 {
                        debug!("{}: attempt {}", target, attempt);
                    }
                    executor.probe(&target, &request).await
                }
            }) => outcome,
        };

        match outcome.result {
            Ok(result) => Some(self.complete(result, outcome.attempts).await),
            Err(e) if e.kind == ProbeErrorKind::Cancelled => None,
            Err(e) => {
                if outcome.exhausted {
                    warn!("{}: unreachable after {} attempts: {}", target, outcome.attempts, e);
                } else {
                    debug!("{}: {}", target, e);
                }
                let mut record = Record::failure(target, &e, outcome.attempts, outcome.exhausted);
                if self.config.enumeration.enabled() && enumerable_after(&e) {
                    record.enumeration = self.enumerate(target).await;
                }
                Some(record)
            }
        }
    }

    /// Evaluate and fingerprint a completed handshake
    async fn complete(&self, result: ProbeResult, attempts: usize) -> Record {
        let target = &result.target;
        let mut record = Record::success(&result, attempts);
        let certs = &self.config.certificates;

        let chain = Certificate::parse_chain(&result.certificates);
        if let Some(leaf) = chain.first() {
            if !certs.hashes.is_empty() {
                record.hash = Some(CertificateHashes::compute(&leaf.der, &certs.hashes));
            }
            if certs.include_pem {
                record.certificate_pem = Some(leaf.to_pem());
            }
            if certs.evaluates() {
                let revocation = self.revocation_outcome(&chain).await;
                record.misconfig = Some(self.evaluator.evaluate(
                    &chain,
                    Some(target.expected_hostname()),
                    Utc::now(),
                    revocation.as_ref(),
                ));
            }
        } else if !result.certificates.is_empty() {
            warn!("{}: no parseable certificate in chain", target);
        }
        if certs.include_chain {
            record.chain = chain.clone();
        }
        record.certificate = chain.into_iter().next();

        self.fingerprint(&result, &mut record).await;

        if self.config.enumeration.enabled() {
            record.enumeration = self.enumerate(target).await;
        }
        record
    }

    async fn revocation_outcome(&self, chain: &[Certificate]) -> Option<RevocationOutcome> {
        if !self.config.certificates.revoked {
            return None;
        }
        let checker = self.revocation.as_ref()?;
        let leaf = chain.first()?;
        let outcome = RevocationOutcome::from(checker.is_revoked(leaf, chain.get(1)).await);
        if let RevocationOutcome::Error(e) = &outcome {
            debug!("revocation lookup for {} failed: {}", leaf.subject_dn, e);
        }
        Some(outcome)
    }

    async fn fingerprint(&self, result: &ProbeResult, record: &mut Record) {
        let fp = &self.config.fingerprints;

        if let Some(hello) = &result.client_hello {
            if fp.ja3 {
                match Ja3Fingerprint::from_record(hello) {
                    Ok(ja3) => record.ja3 = Some(ja3),
                    Err(e) => debug!("{}: JA3 unavailable: {}", result.target, e),
                }
            }
            if fp.client_hello {
                record.client_hello = Some(hex::encode(hello));
            }
        } else if fp.ja3 || fp.client_hello {
            debug!("{}: {} captured no ClientHello", result.target, result.backend);
        }

        if let Some(hello) = &result.server_hello {
            if fp.ja3s {
                match Ja3sFingerprint::from_message(hello) {
                    Ok(ja3s) => record.ja3s = Some(ja3s),
                    Err(e) => debug!("{}: JA3S unavailable: {}", result.target, e),
                }
            }
            if fp.server_hello {
                record.server_hello = Some(hex::encode(hello));
            }
        }

        if fp.jarm
            && let Some(jarm) = &self.jarm
        {
            record.jarm = Some(jarm.fingerprint(&result.target).await);
        }
    }

    /// Versions, then ciphers; both bounded by the inner concurrency
    async fn enumerate(&self, target: &Target) -> EnumerationResult {
        let cfg = &self.config.enumeration;
        let mut result = EnumerationResult::default();

        if cfg.versions {
            result.versions = VersionEnumerator::new(
                self.executor.clone(),
                cfg.min_version,
                cfg.max_version,
                cfg.concurrency,
            )
            .enumerate(target)
            .await;
            debug!("{}: {} versions supported", target, result.versions.len());
        }

        if cfg.ciphers && !self.shutdown.is_triggered() {
            result.ciphers = CipherEnumerator::new(
                self.executor.clone(),
                &CIPHER_DB,
                &cfg.cipher_filters,
                cfg.min_version,
                cfg.max_version,
                cfg.concurrency,
            )
            .enumerate(target)
            .await;
            debug!("{}: {} ciphers supported", target, result.ciphers.len());
        }

        result
    }
}

/// A server that refused the default offer may still accept forced ones
fn enumerable_after(error: &ProbeError) -> bool {
    error.allows_fallback()
}
