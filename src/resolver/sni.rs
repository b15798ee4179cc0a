// Random SNI generation for targets that have no hostname of their own

use crate::security::validate_hostname;
use rand::Rng;
use std::net::IpAddr;

const LABEL_CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

const TLDS: &[&str] = &[
    "com", "net", "org", "io", "co", "dev", "app", "cloud", "tech", "online", "site", "info",
];

/// Random valid-looking hostname, e.g. `k3v9x2ab.q8dz7m1c0p.net`
pub fn random_sni() -> String {
    let mut rng = rand::thread_rng();
    let sub = random_label(&mut rng, 8);
    let domain = random_label(&mut rng, 10);
    let tld = TLDS[rng.gen_range(0..TLDS.len())];
    format!("{}.{}.{}", sub, domain, tld)
}

/// DNS-valid label of `min_len..min_len + 7` characters, no edge hyphens
fn random_label(rng: &mut impl Rng, min_len: usize) -> String {
    let length = rng.gen_range(min_len..min_len + 7);
    (0..length)
        .map(|i| {
            if i > 0 && i + 1 < length && rng.gen_bool(0.1) {
                '-'
            } else {
                LABEL_CHARSET[rng.gen_range(0..LABEL_CHARSET.len())] as char
            }
        })
        .collect()
}

/// Whether `name` may be sent as server_name (RFC 6066 forbids IP literals)
pub fn is_valid_sni(name: &str) -> bool {
    name.parse::<IpAddr>().is_err() && !name.starts_with("*.") && validate_hostname(name).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_sni_is_valid_and_varies() {
        let a = random_sni();
        let b = random_sni();
        assert!(is_valid_sni(&a), "{}", a);
        assert_eq!(a.split('.').count(), 3);
        assert_ne!(a, b);
    }

    #[test]
    fn test_sni_rejects_ip_and_wildcard() {
        assert!(!is_valid_sni("192.0.2.1"));
        assert!(!is_valid_sni("*.example.com"));
        assert!(is_valid_sni("www.example.com"));
    }
}
