// CLI module - Command line interface and argument parsing
// Copyright (C) 2025 tlsprobe contributors
// Licensed under GPL-3.0

use crate::Result;
use crate::backend::{BackendSettings, ScanMode, external};
use crate::certificates::RevocationPolicy;
use crate::ciphers::parser::parse_cipher_list;
use crate::ct_logs::CtConfig;
use crate::data::CIPHER_DB;
use crate::error::TlsError;
use crate::resolver::ResolverOptions;
use crate::utils::{Dialer, ProxyConfig, parse_delay};
use clap::Parser;
use std::collections::HashMap;
use std::io::{BufRead, IsTerminal};
use std::path::Path;
use std::time::Duration;

mod ct_logs_args;
mod enumeration_args;
mod input_args;
mod misconfig_args;
mod network_args;
mod output_args;
mod probe_args;

pub use ct_logs_args::CtLogsArgs;
pub use enumeration_args::EnumerationArgs;
pub use input_args::InputArgs;
pub use misconfig_args::MisconfigArgs;
pub use network_args::NetworkArgs;
pub use output_args::OutputArgs;
pub use probe_args::ProbeArgs;

/// tlsprobe - TLS reconnaissance and certificate hygiene toolkit
///
/// The options are grouped by domain and flattened into one flag surface:
/// - Target input (InputArgs)
/// - Record fields and fingerprints (ProbeArgs)
/// - Certificate misconfiguration checks (MisconfigArgs)
/// - Version and cipher enumeration (EnumerationArgs)
/// - Connection, resolution and backend settings (NetworkArgs)
/// - CT log streaming (CtLogsArgs)
/// - Output format (OutputArgs)
#[derive(Parser, Debug, Clone, Default)]
#[command(author, version, long_about = None)]
#[command(name = "tlsprobe")]
#[command(about = "TLS reconnaissance and certificate hygiene toolkit", long_about = None)]
pub struct Options {
    // ============ Target Input ============
    #[command(flatten)]
    pub input: InputArgs,

    // ============ Record Fields ============
    #[command(flatten)]
    pub probes: ProbeArgs,

    // ============ Misconfigurations ============
    #[command(flatten)]
    pub misconfig: MisconfigArgs,

    // ============ Enumeration ============
    #[command(flatten)]
    pub enumeration: EnumerationArgs,

    // ============ Network and Backends ============
    #[command(flatten)]
    pub network: NetworkArgs,

    // ============ Certificate Transparency Logs ============
    #[command(flatten)]
    pub ct_logs: CtLogsArgs,

    // ============ Output ============
    #[command(flatten)]
    pub output: OutputArgs,
}

/// The two mutually exclusive ways a run is fed
#[derive(Debug, Clone)]
pub enum InputMode {
    /// Finite list of raw target strings
    Targets(Vec<String>),
    /// Unbounded stream of hosts from CT logs
    CtLogs(CtConfig),
}

impl Options {
    /// Validate the options and decide the input mode
    ///
    /// Stdin is read only when it is piped and no other input was given.
    pub fn validate(&mut self) -> Result<InputMode> {
        let piped = if self.input.has_explicit_input() || self.ct_logs.enable {
            None
        } else {
            read_stdin_targets()?
        };
        self.validate_with(piped)
    }

    pub(crate) fn validate_with(&mut self, piped: Option<Vec<String>>) -> Result<InputMode> {
        self.check_settings()?;

        let mut targets: Vec<String> = self
            .input
            .hosts
            .iter()
            .map(|h| h.trim().to_string())
            .filter(|h| !h.is_empty())
            .collect();
        if let Some(path) = &self.input.list {
            targets.extend(read_target_file(path)?);
        }
        let has_input = self.input.has_explicit_input() || piped.is_some();
        if let Some(lines) = piped {
            targets.extend(lines);
        }

        if self.ct_logs.enable && has_input {
            return Err(config_error(
                "CT log streaming cannot be combined with host, list or stdin input",
            ));
        }

        if !has_input {
            // CT entries carry no host of their own, names come from the SAN
            self.probes.san = true;
            return Ok(InputMode::CtLogs(self.ct_config()?));
        }

        Ok(InputMode::Targets(targets))
    }

    fn check_settings(&self) -> Result<()> {
        if let (Some(min), Some(max)) = (self.network.min_version, self.network.max_version)
            && min > max
        {
            return Err(config_error(format!(
                "--min-version {} is above --max-version {}",
                min, max
            )));
        }

        if self.network.concurrency == 0 {
            return Err(config_error("--concurrency must be at least 1"));
        }

        if self.network.scan_mode == ScanMode::Openssl
            && !external::check_tool_available(&self.network.openssl_binary)
        {
            return Err(config_error(format!(
                "scan mode openssl requested but '{}' is not available",
                self.network.openssl_binary
            )));
        }

        self.delay()?;
        self.cipher_codes()?;
        if let Some(proxy) = &self.network.proxy {
            ProxyConfig::parse(proxy)?;
        }
        self.start_indices()?;
        Ok(())
    }

    /// Pause between attempts of one worker
    pub fn delay(&self) -> Result<Duration> {
        match &self.network.delay {
            Some(delay) => parse_delay(delay),
            None => Ok(Duration::ZERO),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.network.timeout.max(1))
    }

    /// `--cipher-input` resolved to wire codes; accepts IANA, OpenSSL or hex names
    pub fn cipher_codes(&self) -> Result<Vec<u16>> {
        let suites = parse_cipher_list(&CIPHER_DB, &self.network.cipher_input)?;
        Ok(suites.iter().map(|suite| suite.code()).collect())
    }

    fn start_indices(&self) -> Result<HashMap<String, u64>> {
        self.ct_logs
            .index
            .iter()
            .map(|entry| {
                CtConfig::parse_index(entry).ok_or_else(|| {
                    config_error(format!(
                        "invalid --ctl-index '{}', expected sourceID=index",
                        entry
                    ))
                })
            })
            .collect()
    }

    pub fn ct_config(&self) -> Result<CtConfig> {
        Ok(CtConfig {
            start_from_beginning: self.ct_logs.beginning,
            start_indices: self.start_indices()?,
            sources: self.ct_logs.sources.clone(),
            log_list_url: self.ct_logs.log_list_url.clone(),
            poll_interval: Duration::from_secs(self.ct_logs.poll_interval.max(1)),
            batch_size: self.ct_logs.batch_size.clamp(1, crate::constants::CT_MAX_BATCH_SIZE),
            ports: self.input.ports.clone(),
            ..CtConfig::default()
        })
    }

    pub fn backend_settings(&self) -> Result<BackendSettings> {
        let proxy = self
            .network
            .proxy
            .as_deref()
            .map(ProxyConfig::parse)
            .transpose()?;
        Ok(BackendSettings {
            dialer: Dialer::new(self.timeout(), proxy),
            verify_server_cert: self.network.verify_cert,
            ca_cert: self.network.cacert.clone(),
            openssl_binary: self.network.openssl_binary.clone(),
        })
    }

    pub fn resolver_options(&self) -> ResolverOptions {
        ResolverOptions {
            ip_versions: self.network.ip_version.clone(),
            scan_all_ips: self.network.scan_all_ips,
            sni: self.network.sni.clone(),
            reverse_ptr_sni: self.network.rev_ptr_sni,
            random_sni: self.network.random_sni,
        }
    }

    pub fn revocation_policy(&self) -> RevocationPolicy {
        if self.misconfig.hardfail {
            RevocationPolicy::HardFail
        } else {
            RevocationPolicy::SoftFail
        }
    }
}

fn config_error(message: impl Into<String>) -> TlsError {
    TlsError::ConfigError {
        message: message.into(),
    }
}

/// Non-empty, non-comment lines
fn parse_target_lines<R: BufRead>(reader: R) -> Result<Vec<String>> {
    let mut targets = Vec::new();
    for line in reader.lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        targets.push(line.to_string());
    }
    Ok(targets)
}

fn read_target_file(path: &Path) -> Result<Vec<String>> {
    let file = std::fs::File::open(path).map_err(|e| TlsError::InvalidInput {
        message: format!("cannot open target list {}: {}", path.display(), e),
    })?;
    parse_target_lines(std::io::BufReader::new(file))
}

/// Targets piped on stdin; None for a terminal or an empty pipe
fn read_stdin_targets() -> Result<Option<Vec<String>>> {
    let stdin = std::io::stdin();
    if stdin.is_terminal() {
        return Ok(None);
    }
    let targets = parse_target_lines(stdin.lock())?;
    Ok((!targets.is_empty()).then_some(targets))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ciphers::CipherLevelFilter;
    use crate::ct_logs::StartPosition;
    use crate::fingerprint::HashAlgorithm;
    use crate::protocols::Protocol;
    use crate::resolver::IpVersion;

    fn parse(args: &[&str]) -> Options {
        let mut argv = vec!["tlsprobe"];
        argv.extend_from_slice(args);
        Options::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_defaults() {
        let opts = parse(&[]);
        assert_eq!(opts.network.concurrency, 300);
        assert_eq!(opts.enumeration.cipher_concurrency, 10);
        assert_eq!(opts.network.retries, 3);
        assert_eq!(opts.timeout(), Duration::from_secs(5));
        assert_eq!(opts.network.scan_mode, ScanMode::Auto);
        assert_eq!(opts.network.ip_version, vec![IpVersion::V4]);
        assert_eq!(opts.input.ports, vec![443]);
        assert_eq!(opts.enumeration.cipher_type, vec![CipherLevelFilter::All]);
        assert_eq!(opts.delay().unwrap(), Duration::ZERO);
    }

    #[test]
    fn test_hosts_are_targets() {
        let mut opts = parse(&["-u", "a.example,b.example:8443", "-u", "c.example"]);
        match opts.validate_with(None).unwrap() {
            InputMode::Targets(t) => assert_eq!(t, vec!["a.example", "b.example:8443", "c.example"]),
            other => panic!("unexpected mode {:?}", other),
        }
        assert!(!opts.probes.san);
    }

    #[test]
    fn test_no_input_means_ct_logs() {
        let mut opts = parse(&["--ctl-index", "argon=5000", "--ctl-beginning"]);
        let InputMode::CtLogs(config) = opts.validate_with(None).unwrap() else {
            panic!("expected CT mode");
        };
        assert!(opts.probes.san);
        assert_eq!(config.start_for("argon"), StartPosition::Index(5000));
        assert_eq!(config.start_for("xenon"), StartPosition::Beginning);
    }

    #[test]
    fn test_ct_logs_with_input_is_rejected() {
        let mut opts = parse(&["--ctl", "-u", "a.example"]);
        let err = opts.validate_with(None).unwrap_err();
        assert!(matches!(err, TlsError::ConfigError { .. }));

        let mut piped = parse(&["--ctl"]);
        assert!(piped.validate_with(Some(vec!["a.example".into()])).is_err());
    }

    #[test]
    fn test_piped_targets() {
        let mut opts = parse(&[]);
        match opts.validate_with(Some(vec!["x.example".into()])).unwrap() {
            InputMode::Targets(t) => assert_eq!(t, vec!["x.example"]),
            other => panic!("unexpected mode {:?}", other),
        }
    }

    #[test]
    fn test_version_bounds_checked() {
        let mut opts = parse(&["-u", "a.example", "--min-version", "tls13", "--max-version", "tls12"]);
        assert!(opts.validate_with(None).is_err());

        let mut ok = parse(&["-u", "a.example", "--min-version", "tls12", "--max-version", "tls13"]);
        assert!(ok.validate_with(None).is_ok());
        assert_eq!(ok.network.min_version, Some(Protocol::TLS12));
    }

    #[test]
    fn test_malformed_ctl_index() {
        for bad in ["argon", "argon=", "=5", "argon=-1"] {
            let mut opts = parse(&["--ctl-index", bad]);
            assert!(opts.validate_with(None).is_err(), "{} accepted", bad);
        }
    }

    #[test]
    fn test_delay_forms() {
        for (input, expected) in [
            ("500ms", Duration::from_millis(500)),
            ("2s", Duration::from_secs(2)),
            ("1.5s", Duration::from_millis(1500)),
            ("1m", Duration::from_secs(60)),
        ] {
            assert_eq!(parse(&["--delay", input]).delay().unwrap(), expected);
        }

        let mut bad = parse(&["-u", "a.example", "--delay", "soon"]);
        assert!(bad.validate_with(None).is_err());
    }

    #[test]
    fn test_cipher_input_resolution() {
        let opts = parse(&[
            "--cipher-input",
            "TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256,0x1301",
        ]);
        assert_eq!(opts.cipher_codes().unwrap(), vec![0xc02f, 0x1301]);

        let bad = parse(&["--cipher-input", "NOT_A_CIPHER"]);
        assert!(bad.cipher_codes().is_err());
    }

    #[test]
    fn test_hash_and_enumeration_flags() {
        let opts = parse(&["--hash", "md5,sha256", "--ve", "--ce", "--cipher-type", "weak"]);
        assert_eq!(opts.probes.hash, vec![HashAlgorithm::Md5, HashAlgorithm::Sha256]);
        assert!(opts.enumeration.versions);
        assert!(opts.enumeration.ciphers);
        assert_eq!(opts.enumeration.cipher_type, vec![CipherLevelFilter::Weak]);
    }

    #[test]
    fn test_cipher_type_accepts_several_groups() {
        let opts = parse(&["--ce", "--cipher-type", "weak,insecure"]);
        assert_eq!(
            opts.enumeration.cipher_type,
            vec![CipherLevelFilter::Weak, CipherLevelFilter::Insecure]
        );
    }

    #[test]
    fn test_list_file_skips_comments() {
        let path = std::env::temp_dir().join(format!("tlsprobe-list-{}.txt", std::process::id()));
        std::fs::write(&path, "# targets\na.example\n\n  b.example:8443  \n#c.example\n").unwrap();

        let mut opts = parse(&["-l", path.to_str().unwrap()]);
        let mode = opts.validate_with(None);
        std::fs::remove_file(&path).ok();

        match mode.unwrap() {
            InputMode::Targets(t) => assert_eq!(t, vec!["a.example", "b.example:8443"]),
            other => panic!("unexpected mode {:?}", other),
        }
    }

    #[test]
    fn test_hardfail_requires_revoked() {
        assert!(Options::try_parse_from(["tlsprobe", "--hardfail"]).is_err());
        let opts = parse(&["--revoked", "--hardfail"]);
        assert_eq!(opts.revocation_policy(), RevocationPolicy::HardFail);
    }
}
