// Version Enumerator - forces each candidate version in turn
//
// Every candidate is tried regardless of earlier failures; a server refusing
// TLS 1.3 says nothing about TLS 1.0.

use crate::backend::HandshakeRequest;
use crate::probe::ProbeExecutor;
use crate::protocols::Protocol;
use crate::resolver::Target;
use futures::stream::{self, StreamExt};
use std::collections::BTreeSet;
use tracing::debug;

pub struct VersionEnumerator {
    executor: ProbeExecutor,
    min_version: Protocol,
    max_version: Protocol,
    concurrency: usize,
}

impl VersionEnumerator {
    pub fn new(
        executor: ProbeExecutor,
        min_version: Option<Protocol>,
        max_version: Option<Protocol>,
        concurrency: usize,
    ) -> Self {
        Self {
            executor,
            min_version: min_version.unwrap_or(Protocol::SSLv3),
            max_version: max_version.unwrap_or(Protocol::TLS13),
            concurrency: concurrency.max(1),
        }
    }

    /// Candidate list, highest first
    pub fn candidates(&self) -> Vec<Protocol> {
        Protocol::range_descending(self.min_version, self.max_version)
    }

    /// The full set of versions that each succeeded a forced-version handshake
    pub async fn enumerate(&self, target: &Target) -> BTreeSet<Protocol> {
        let results: Vec<(Protocol, bool)> = stream::iter(self.candidates())
            .map(|version| async move {
                let request = HandshakeRequest::forced_version(version);
                match self.executor.probe(target, &request).await {
                    Ok(result) if result.version == version => (version, true),
                    Ok(result) => {
                        debug!("{}: forced {} but got {}", target, version, result.version);
                        (version, false)
                    }
                    Err(e) => {
                        debug!("{}: {} rejected ({})", target, version, e);
                        (version, false)
                    }
                }
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        results
            .into_iter()
            .filter_map(|(version, ok)| ok.then_some(version))
            .collect()
    }
}
