// Cipher Enumerator - offers each candidate suite alone
//
// A suite counts as supported only when the handshake completes and the
// server picked exactly the suite that was offered.

use super::SupportedCipher;
use crate::backend::HandshakeRequest;
use crate::ciphers::{CipherLevelFilter, CipherSuite};
use crate::data::CipherDatabase;
use crate::probe::ProbeExecutor;
use crate::protocols::Protocol;
use crate::resolver::Target;
use futures::stream::{self, StreamExt};
use std::collections::BTreeSet;
use tracing::debug;

pub struct CipherEnumerator {
    executor: ProbeExecutor,
    candidates: Vec<CipherSuite>,
    min_version: Protocol,
    max_version: Protocol,
    concurrency: usize,
}

impl CipherEnumerator {
    /// Candidates are the registry suites in any of the selected level groups
    pub fn new(
        executor: ProbeExecutor,
        db: &CipherDatabase,
        filters: &[CipherLevelFilter],
        min_version: Option<Protocol>,
        max_version: Option<Protocol>,
        concurrency: usize,
    ) -> Self {
        let candidates = db
            .all_ciphers()
            .iter()
            .filter(|c| CipherLevelFilter::any_matches(filters, c.level()))
            .cloned()
            .collect();
        Self::with_candidates(executor, candidates, min_version, max_version, concurrency)
    }

    pub fn with_candidates(
        executor: ProbeExecutor,
        candidates: Vec<CipherSuite>,
        min_version: Option<Protocol>,
        max_version: Option<Protocol>,
        concurrency: usize,
    ) -> Self {
        Self {
            executor,
            candidates,
            min_version: min_version.unwrap_or(Protocol::SSLv3),
            max_version: max_version.unwrap_or(Protocol::TLS13),
            concurrency: concurrency.max(1),
        }
    }

    /// Version window a suite is offered in, if it overlaps the configured bounds
    fn window(&self, suite: &CipherSuite) -> Option<(Protocol, Protocol)> {
        let lo = suite.min_protocol().max(self.min_version);
        let hi = suite.max_protocol().min(self.max_version);
        (lo <= hi).then_some((lo, hi))
    }

    pub fn candidate_count(&self) -> usize {
        self.candidates
            .iter()
            .filter(|c| self.window(c).is_some())
            .count()
    }

    pub async fn enumerate(&self, target: &Target) -> BTreeSet<SupportedCipher> {
        let jobs: Vec<(CipherSuite, HandshakeRequest)> = self
            .candidates
            .iter()
            .filter_map(|suite| {
                self.window(suite).map(|(lo, hi)| {
                    let request = HandshakeRequest::single_cipher(suite.code(), lo, hi);
                    (suite.clone(), request)
                })
            })
            .collect();

        debug!(
            "{}: enumerating {} suites, {} at a time",
            target,
            jobs.len(),
            self.concurrency
        );

        stream::iter(jobs)
            .map(|(suite, request)| async move {
                match self.executor.probe(target, &request).await {
                    Ok(result) if result.cipher == suite.code() => Some(SupportedCipher {
                        name: suite.iana_name.clone(),
                        level: suite.level(),
                    }),
                    Ok(result) => {
                        debug!(
                            "{}: offered {} but server chose 0x{:04x}",
                            target, suite.iana_name, result.cipher
                        );
                        None
                    }
                    Err(_) => None,
                }
            })
            .buffer_unordered(self.concurrency)
            .filter_map(|supported| async move { supported })
            .collect()
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendKind, Capabilities, HandshakeOutcome, TlsBackend};
    use crate::ciphers::CipherLevel;
    use crate::data::CIPHER_DB;
    use crate::error::ProbeError;
    use crate::resolver::IpVersion;
    use crate::utils::Shutdown;
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Accepts a fixed set of suites and tracks peak parallelism
    struct CipherServer {
        accepted: Vec<u16>,
        /// Answers this suite whatever is offered
        stubborn: Option<u16>,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    impl CipherServer {
        fn new(accepted: Vec<u16>, stubborn: Option<u16>) -> Arc<Self> {
            Arc::new(Self {
                accepted,
                stubborn,
                in_flight: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl TlsBackend for CipherServer {
        fn kind(&self) -> BackendKind {
            BackendKind::Permissive
        }
        fn capabilities(&self) -> Capabilities {
            Capabilities::default()
        }
        async fn connect(
            &self,
            _target: &Target,
            request: &HandshakeRequest,
        ) -> Result<HandshakeOutcome, ProbeError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(5)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            let offered = request.ciphers[0];
            let chosen = match self.stubborn {
                Some(code) => code,
                None if self.accepted.contains(&offered) => offered,
                None => return Err(ProbeError::handshake("handshake_failure alert")),
            };
            Ok(HandshakeOutcome {
                version: request.max_version.unwrap_or(Protocol::TLS12),
                cipher: chosen,
                certificates: vec![],
                client_hello: None,
                server_hello: None,
                alpn: None,
            })
        }
    }

    fn target() -> Target {
        Target {
            host: "ciphers.example".to_string(),
            ip: "192.0.2.40".parse().unwrap(),
            port: 443,
            sni: Some("ciphers.example".to_string()),
            random_sni: false,
            ip_version: IpVersion::V4,
        }
    }

    fn executor(server: Arc<CipherServer>) -> ProbeExecutor {
        ProbeExecutor::new(server, Duration::from_secs(1), Shutdown::new())
    }

    #[tokio::test]
    async fn test_supported_set_and_levels() {
        let server = CipherServer::new(vec![0xc02f, 0x1301, 0x000a], None);
        let enumerator = CipherEnumerator::new(
            executor(server.clone()),
            CIPHER_DB.as_ref(),
            &[CipherLevelFilter::All],
            None,
            None,
            3,
        );

        let found = enumerator.enumerate(&target()).await;
        let names: Vec<&str> = found.iter().map(|c| c.name.as_str()).collect();

        assert_eq!(found.len(), 3);
        assert!(names.contains(&"TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256"));
        assert!(names.contains(&"TLS_AES_128_GCM_SHA256"));
        let des = found
            .iter()
            .find(|c| c.name == "TLS_RSA_WITH_3DES_EDE_CBC_SHA")
            .unwrap();
        assert_eq!(des.level, CipherLevel::Weak);
        assert!(server.peak.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn test_level_filter_restricts_candidates() {
        let server = CipherServer::new(vec![0xc02f, 0x0005], None);
        let enumerator = CipherEnumerator::new(
            executor(server),
            CIPHER_DB.as_ref(),
            &[CipherLevelFilter::Insecure],
            None,
            None,
            4,
        );

        let found = enumerator.enumerate(&target()).await;
        assert_eq!(found.len(), 1);
        assert_eq!(found.iter().next().unwrap().level, CipherLevel::Insecure);
    }

    #[tokio::test]
    async fn test_two_level_groups_are_combined() {
        // ECDHE-RSA-AES128-GCM (secure), DES-CBC3-SHA (weak), RC4-SHA (insecure)
        let server = CipherServer::new(vec![0xc02f, 0x000a, 0x0005], None);
        let enumerator = CipherEnumerator::new(
            executor(server),
            CIPHER_DB.as_ref(),
            &[CipherLevelFilter::Weak, CipherLevelFilter::Insecure],
            None,
            None,
            4,
        );

        let levels: Vec<CipherLevel> = enumerator
            .enumerate(&target())
            .await
            .iter()
            .map(|c| c.level)
            .collect();
        assert_eq!(levels.len(), 2);
        assert!(levels.contains(&CipherLevel::Weak));
        assert!(levels.contains(&CipherLevel::Insecure));
        assert!(!levels.contains(&CipherLevel::Secure));
    }

    #[tokio::test]
    async fn test_server_choice_must_match_offer() {
        // A broken server answering one suite regardless of the offer
        let server = CipherServer::new(vec![], Some(0xc02f));
        let candidates = vec![
            CIPHER_DB.get_by_code(0xc02f).unwrap().clone(),
            CIPHER_DB.get_by_code(0xc030).unwrap().clone(),
        ];
        let enumerator = CipherEnumerator::with_candidates(executor(server), candidates, None, None, 2);

        let found = enumerator.enumerate(&target()).await;
        assert_eq!(found.len(), 1);
        assert_eq!(found.iter().next().unwrap().name, "TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256");
    }

    #[test]
    fn test_version_window() {
        let server = CipherServer::new(vec![], None);
        let enumerator = CipherEnumerator::with_candidates(
            executor(server),
            vec![
                CIPHER_DB.get_by_code(0x1301).unwrap().clone(),
                CIPHER_DB.get_by_code(0x002f).unwrap().clone(),
            ],
            None,
            Some(Protocol::TLS12),
            1,
        );
        // TLS 1.3 suite is out of bounds
        assert_eq!(enumerator.candidate_count(), 1);
    }
}
