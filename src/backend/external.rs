// External-process backend - delegates the handshake to `openssl s_client`
//
// One process per attempt. A spawn failure or a local build lacking the
// requested version/cipher is a capability gap, not a server verdict.

use super::{
    BackendKind, BackendSettings, Capabilities, HandshakeOutcome, HandshakeRequest, TlsBackend,
    check_request,
};
use crate::data::CIPHER_DB;
use crate::error::ProbeError;
use crate::protocols::Protocol;
use crate::resolver::Target;
use crate::security::{validate_cipher, validate_hostname, validate_port};
use async_trait::async_trait;
use std::net::IpAddr;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

/// Whether `binary` can be executed
pub fn check_tool_available(binary: &str) -> bool {
    std::process::Command::new(binary)
        .arg("version")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

pub struct ExternalBackend {
    binary: String,
    ca_cert: Option<PathBuf>,
    verify_server_cert: bool,
    proxied: bool,
}

impl ExternalBackend {
    pub fn new(settings: &BackendSettings) -> Self {
        Self {
            binary: settings.openssl_binary.clone(),
            ca_cert: settings.ca_cert.clone(),
            verify_server_cert: settings.verify_server_cert,
            proxied: settings.dialer.proxy().is_some(),
        }
    }

    /// s_client arguments for one attempt
    pub fn build_args(
        &self,
        target: &Target,
        request: &HandshakeRequest,
    ) -> Result<Vec<String>, ProbeError> {
        validate_port(target.port).map_err(|e| ProbeError::handshake(e.to_string()))?;

        let connect = match target.ip {
            IpAddr::V4(ip) => format!("{}:{}", ip, target.port),
            IpAddr::V6(ip) => format!("[{}]:{}", ip, target.port),
        };
        let mut args = vec![
            "s_client".to_string(),
            "-connect".to_string(),
            connect,
            "-showcerts".to_string(),
        ];

        if let Some(sni) = &target.sni {
            validate_hostname(sni).map_err(|e| ProbeError::handshake(e.to_string()))?;
            args.push("-servername".to_string());
            args.push(sni.clone());
        } else {
            args.push("-noservername".to_string());
        }

        let caps = self.capabilities();
        let (min, max) = request.bounds(&caps);
        if let Some(forced) = request.forced() {
            args.push(forced.openssl_flag().to_string());
        } else if max < Protocol::TLS13 {
            args.push("-no_tls1_3".to_string());
        }

        if !request.ciphers.is_empty() {
            let (tls13, legacy): (Vec<_>, Vec<_>) = request
                .ciphers
                .iter()
                .map(|code| {
                    CIPHER_DB.get_by_code(*code).ok_or_else(|| {
                        ProbeError::unsupported(format!("no OpenSSL name for suite 0x{:04x}", code))
                    })
                })
                .collect::<Result<Vec<_>, _>>()?
                .into_iter()
                .partition(|c| c.is_tls13());

            if !legacy.is_empty() {
                let names: Vec<&str> = legacy.iter().map(|c| c.openssl_name.as_str()).collect();
                // Legacy suites are filtered out at the default security level
                let list = format!("{}:@SECLEVEL=0", names.join(":"));
                validate_cipher(&list).map_err(|e| ProbeError::unsupported(e.to_string()))?;
                args.push("-cipher".to_string());
                args.push(list);
            }
            if max >= Protocol::TLS13 || min >= Protocol::TLS13 {
                let names: Vec<&str> = tls13.iter().map(|c| c.iana_name.as_str()).collect();
                if !names.is_empty() {
                    let list = names.join(":");
                    validate_cipher(&list).map_err(|e| ProbeError::unsupported(e.to_string()))?;
                    args.push("-ciphersuites".to_string());
                    args.push(list);
                } else if min < Protocol::TLS13 {
                    args.push("-no_tls1_3".to_string());
                }
            }
        }

        if let Some(ca) = &self.ca_cert {
            args.push("-CAfile".to_string());
            args.push(ca.display().to_string());
        }
        if self.verify_server_cert {
            args.push("-verify_return_error".to_string());
        }

        Ok(args)
    }
}

/// Negotiated version and cipher name from s_client output
pub fn parse_session(stdout: &str) -> Option<(Protocol, String)> {
    let mut protocol = None;
    let mut cipher = None;

    for line in stdout.lines() {
        let line = line.trim();
        // "New, TLSv1.3, Cipher is TLS_AES_256_GCM_SHA384"
        if let Some(rest) = line.strip_prefix("New, ")
            && let Some((version, name)) = rest.split_once(", Cipher is ")
        {
            protocol = version.parse::<Protocol>().ok();
            cipher = Some(name.trim().to_string());
        } else if let Some((key, value)) = line.split_once(':') {
            match key.trim() {
                "Protocol" if protocol.is_none() => protocol = value.trim().parse().ok(),
                "Cipher" if cipher.is_none() => cipher = Some(value.trim().to_string()),
                _ => {}
            }
        }
    }

    let cipher = cipher.filter(|c| c != "(NONE)" && c != "0000")?;
    Some((protocol?, cipher))
}

/// DER certificates from the -showcerts dump, leaf first
pub fn extract_certificates(stdout: &str) -> Vec<Vec<u8>> {
    let mut certificates = Vec::new();
    let mut current = String::new();
    let mut in_cert = false;

    for line in stdout.lines() {
        if line.contains("-----BEGIN CERTIFICATE-----") {
            in_cert = true;
            current.clear();
        }
        if in_cert {
            current.push_str(line.trim());
            current.push('\n');
        }
        if line.contains("-----END CERTIFICATE-----") && in_cert {
            in_cert = false;
            match pem::parse(current.as_bytes()) {
                Ok(block) => certificates.push(block.into_contents()),
                Err(e) => debug!("skipping unparsable PEM block: {}", e),
            }
        }
    }

    certificates
}

/// The `verify error:` line of a run aborted by `-verify_return_error`
pub fn verification_failure(stdout: &str, stderr: &str) -> Option<String> {
    let aborted = stderr.contains("certificate verify failed")
        || (stdout.contains("Verify return code: ") && !stdout.contains("Verify return code: 0 "));
    if !aborted {
        return None;
    }
    stdout
        .lines()
        .chain(stderr.lines())
        .find(|l| l.starts_with("verify error:"))
        .map(|l| l.trim().to_string())
        .or_else(|| Some("certificate verify failed".to_string()))
}

/// Map a failed run to the error taxonomy
pub fn classify_failure(stdout: &str, stderr: &str) -> ProbeError {
    let output = format!("{}\n{}", stderr, stdout).to_ascii_lowercase();
    let first_line = stderr
        .lines()
        .find(|l| !l.trim().is_empty())
        .unwrap_or("s_client failed")
        .trim()
        .to_string();

    if output.contains("connection refused") || output.contains("errno=111") {
        ProbeError::new(crate::error::ProbeErrorKind::ConnectionRefused, first_line)
    } else if output.contains("connection reset") || output.contains("errno=104") {
        ProbeError::new(crate::error::ProbeErrorKind::ConnectionReset, first_line)
    } else if output.contains("no ciphers available")
        || output.contains("no cipher match")
        || output.contains("unknown option")
        || output.contains("no protocols available")
    {
        // The local build cannot offer what was asked for
        ProbeError::unsupported(first_line)
    } else if output.contains("wrong version number")
        || output.contains("alert protocol version")
        || output.contains("unsupported protocol")
        || output.contains("inappropriate fallback")
    {
        ProbeError::mismatch(first_line)
    } else {
        ProbeError::handshake(first_line)
    }
}

#[async_trait]
impl TlsBackend for ExternalBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::ExternalProcess
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            supports_ja3: false,
            supports_pre_handshake: false,
            supports_cipher_override: true,
            requires_external_process: true,
            min_version: Some(Protocol::SSLv3),
            max_version: Some(Protocol::TLS13),
        }
    }

    async fn connect(
        &self,
        target: &Target,
        request: &HandshakeRequest,
    ) -> Result<HandshakeOutcome, ProbeError> {
        check_request(self.kind(), &self.capabilities(), request)?;
        if self.proxied {
            return Err(ProbeError::unsupported("s_client cannot tunnel through SOCKS5"));
        }

        let args = self.build_args(target, request)?;
        debug!("running {} {}", self.binary, args.join(" "));

        let output = Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| ProbeError::unsupported(format!("cannot run {}: {}", self.binary, e)))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        if self.verify_server_cert
            && !output.status.success()
            && let Some(reason) = verification_failure(&stdout, &stderr)
        {
            return Err(ProbeError::untrusted(reason));
        }
        let Some((version, cipher_name)) = parse_session(&stdout) else {
            return Err(classify_failure(&stdout, &stderr));
        };
        if !output.status.success() && self.verify_server_cert {
            return Err(classify_failure(&stdout, &stderr));
        }

        let cipher = CIPHER_DB
            .get_by_openssl_name(&cipher_name)
            .or_else(|| CIPHER_DB.get_by_iana_name(&cipher_name))
            .map(|c| c.code())
            .ok_or_else(|| ProbeError::handshake(format!("unknown negotiated cipher {}", cipher_name)))?;

        if let Some(forced) = request.forced()
            && forced != version
        {
            return Err(ProbeError::mismatch(format!("forced {} but negotiated {}", forced, version)));
        }
        if !request.ciphers.is_empty() && !request.ciphers.contains(&cipher) {
            return Err(ProbeError::mismatch(format!("negotiated unoffered suite {}", cipher_name)));
        }

        Ok(HandshakeOutcome {
            version,
            cipher,
            certificates: extract_certificates(&stdout),
            client_hello: None,
            server_hello: None,
            alpn: None,
        })
    }
}
