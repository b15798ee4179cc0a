/// DNS-Only Output Mode - unique hostnames from certificates
///
/// Names come from the leaf SAN and CN. Wildcards are reduced to their parent
/// domain, and a name printed once is never printed again in the same run.
use crate::scanner::Record;
use std::collections::HashSet;

#[derive(Debug, Default)]
pub struct DnsCollector {
    seen: HashSet<String>,
}

impl DnsCollector {
    /// Names from `record` not printed before, sorted
    pub fn new_names(&mut self, record: &Record) -> Vec<String> {
        let mut names: Vec<String> = record
            .hostnames()
            .iter()
            .map(|name| normalize_domain(name))
            .filter(|name| !name.is_empty() && self.seen.insert(name.clone()))
            .collect();
        names.sort();
        names
    }

    pub fn unique_count(&self) -> usize {
        self.seen.len()
    }
}

/// `*.example.com` -> `example.com`, lowercased, trailing dot removed
pub fn normalize_domain(domain: &str) -> String {
    let domain = domain.trim().trim_end_matches('.');
    domain
        .strip_prefix("*.")
        .unwrap_or(domain)
        .to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::super::testutil::*;
    use super::*;

    #[test]
    fn test_normalize_domain() {
        assert_eq!(normalize_domain("*.Example.com"), "example.com");
        assert_eq!(normalize_domain("www.example.com."), "www.example.com");
    }

    #[test]
    fn test_wildcard_collapses_into_parent() {
        let mut dns = DnsCollector::default();
        let names = dns.new_names(&success(vec!["*.out.example", "api.out.example"]));
        assert_eq!(names, vec!["api.out.example", "out.example"]);
        assert_eq!(dns.unique_count(), 2);
    }

    #[test]
    fn test_failed_record_has_no_names() {
        let mut record = success(vec!["x.example"]);
        record.certificate = None;
        assert!(DnsCollector::default().new_names(&record).is_empty());
    }
}
