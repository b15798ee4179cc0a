// Result Aggregator - one record per target, handed to the output writer
//
// Records are self-contained: every field the run asked for is filled in
// before the record leaves the worker, so the writer never needs a fix-up pass.

use crate::backend::BackendKind;
use crate::certificates::{Certificate, MisconfigFlags};
use crate::enumeration::EnumerationResult;
use crate::error::{ProbeError, ProbeErrorKind};
use crate::fingerprint::{CertificateHashes, Ja3Fingerprint, Ja3sFingerprint};
use crate::probe::ProbeResult;
use crate::protocols::Protocol;
use crate::resolver::{HostSpec, Target};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    Success,
    /// Retryable failures used up the attempt budget
    Unreachable,
    /// Terminal failure (resolution, handshake, capability gap)
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct Record {
    pub timestamp: DateTime<Utc>,
    pub host: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    pub port: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sni: Option<String>,
    pub status: RecordStatus,
    /// Mirrors `status == Success` for consumers of the probe-status field
    pub probe_status: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ProbeErrorKind>,
    pub attempts: usize,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend: Option<BackendKind>,
    #[serde(rename = "tls_version", skip_serializing_if = "Option::is_none")]
    pub version: Option<Protocol>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cipher: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alpn: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elapsed_ms: Option<u64>,

    /// Leaf certificate fields
    #[serde(flatten)]
    pub certificate: Option<Certificate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub certificate_pem: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub chain: Vec<Certificate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hash: Option<CertificateHashes>,
    #[serde(flatten)]
    pub misconfig: Option<MisconfigFlags>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub ja3: Option<Ja3Fingerprint>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ja3s: Option<Ja3sFingerprint>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jarm: Option<String>,
    /// Hex of the raw ClientHello record
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_hello: Option<String>,
    /// Hex of the raw ServerHello message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_hello: Option<String>,

    #[serde(flatten)]
    pub enumeration: EnumerationResult,
}

impl Record {
    fn empty(host: &str, port: u16, status: RecordStatus) -> Self {
        Self {
            timestamp: Utc::now(),
            host: host.to_string(),
            ip: None,
            port,
            sni: None,
            status,
            probe_status: status == RecordStatus::Success,
            error: None,
            error_kind: None,
            attempts: 0,
            backend: None,
            version: None,
            cipher: None,
            alpn: None,
            elapsed_ms: None,
            certificate: None,
            certificate_pem: None,
            chain: Vec::new(),
            hash: None,
            misconfig: None,
            ja3: None,
            ja3s: None,
            jarm: None,
            client_hello: None,
            server_hello: None,
            enumeration: EnumerationResult::default(),
        }
    }

    fn with_target(mut self, target: &Target) -> Self {
        self.ip = Some(target.ip.to_string());
        self.sni = target.sni.clone();
        self
    }

    /// Successful primary handshake; certificate and fingerprint fields are
    /// filled in by the caller
    pub fn success(result: &ProbeResult, attempts: usize) -> Self {
        let mut record = Self::empty(&result.target.host, result.target.port, RecordStatus::Success)
            .with_target(&result.target);
        record.attempts = attempts;
        record.backend = Some(result.backend);
        record.version = Some(result.version);
        record.cipher = Some(result.cipher_name.clone());
        record.alpn = result.alpn.clone();
        record.elapsed_ms = Some(result.elapsed.as_millis() as u64);
        record
    }

    /// Every attempt against a resolved target failed
    pub fn failure(target: &Target, error: &ProbeError, attempts: usize, exhausted: bool) -> Self {
        let status = if exhausted {
            RecordStatus::Unreachable
        } else {
            RecordStatus::Failed
        };
        let mut record = Self::empty(&target.host, target.port, status).with_target(target);
        record.attempts = attempts;
        record.error = Some(error.message.clone());
        record.error_kind = Some(error.kind);
        record
    }

    /// The host spec never produced a dial target
    pub fn unresolved(spec: &HostSpec, error: &ProbeError) -> Self {
        let mut record = Self::empty(&spec.host, spec.port, RecordStatus::Failed);
        record.error = Some(error.message.clone());
        record.error_kind = Some(error.kind);
        record
    }

    pub fn is_success(&self) -> bool {
        self.status == RecordStatus::Success
    }

    /// Unique names from the leaf (SAN then CN)
    pub fn hostnames(&self) -> Vec<String> {
        self.certificate
            .as_ref()
            .map(Certificate::hostnames)
            .unwrap_or_default()
    }
}

/// Counters reported at the end of a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub succeeded: u64,
    pub failed: u64,
    /// Failure records dropped because errors are silenced
    pub suppressed: u64,
}

/// Consumer side of the worker pool. Cheap to share behind an `Arc`.
pub struct ResultSink {
    tx: mpsc::Sender<Record>,
    silent_errors: bool,
    succeeded: AtomicU64,
    failed: AtomicU64,
    suppressed: AtomicU64,
}

impl ResultSink {
    pub fn new(tx: mpsc::Sender<Record>, silent_errors: bool) -> Self {
        Self {
            tx,
            silent_errors,
            succeeded: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            suppressed: AtomicU64::new(0),
        }
    }

    /// Forward a record; false once the writer has gone away
    pub async fn submit(&self, record: Record) -> bool {
        if record.is_success() {
            self.succeeded.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failed.fetch_add(1, Ordering::Relaxed);
            if self.silent_errors {
                self.suppressed.fetch_add(1, Ordering::Relaxed);
                return true;
            }
        }
        self.tx.send(record).await.is_ok()
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary {
            succeeded: self.succeeded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            suppressed: self.suppressed.load(Ordering::Relaxed),
        }
    }
}
