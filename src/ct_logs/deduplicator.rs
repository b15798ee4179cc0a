// Certificate deduplication across CT sources
//
// The same certificate is logged to several logs, and a precertificate and
// its final certificate name the same hosts. Both are keyed on the sorted
// hostname set so a host is only queued once per issuance burst.

use bloomfilter::Bloom;
use sha2::{Digest, Sha256};

pub struct Deduplicator {
    bloom: Bloom<[u8; 32]>,
    total_seen: u64,
    duplicates: u64,
}

impl Deduplicator {
    /// Sized for `expected_items` with the given false-positive rate
    pub fn new(expected_items: usize, false_positive_rate: f64) -> Self {
        Self {
            bloom: Bloom::new_for_fp_rate(expected_items.max(1), false_positive_rate),
            total_seen: 0,
            duplicates: 0,
        }
    }

    /// True the first time this hostname set is seen
    pub fn first_sighting(&mut self, hostnames: &[String]) -> bool {
        self.total_seen += 1;
        let key = Self::key(hostnames);
        if self.bloom.check_and_set(&key) {
            self.duplicates += 1;
            false
        } else {
            true
        }
    }

    fn key(hostnames: &[String]) -> [u8; 32] {
        let mut sorted: Vec<&str> = hostnames.iter().map(String::as_str).collect();
        sorted.sort_unstable();
        sorted.dedup();
        let mut hasher = Sha256::new();
        for name in sorted {
            hasher.update(name.as_bytes());
            hasher.update([0]);
        }
        hasher.finalize().into()
    }

    pub fn total_seen(&self) -> u64 {
        self.total_seen
    }

    pub fn duplicates(&self) -> u64 {
        self.duplicates
    }
}

impl Default for Deduplicator {
    fn default() -> Self {
        Self::new(1_000_000, 0.0001)
    }
}
