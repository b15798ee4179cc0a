// Text output - one colored line per record
//
// `host:port [value] [value] ...`, with the selected fields in a fixed order.
// Misconfiguration fields only appear when the flag is raised.

use super::FieldSelection;
use crate::scanner::{Record, RecordStatus};
use colored::{Color, Colorize};

/// One selected field of a record, ready to print
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldValue {
    pub values: Vec<String>,
    pub color: Option<Color>,
}

impl FieldValue {
    fn new(values: Vec<String>, color: Option<Color>) -> Option<Self> {
        (!values.is_empty()).then_some(Self { values, color })
    }

    fn single(value: impl Into<String>, color: Option<Color>) -> Option<Self> {
        Self::new(vec![value.into()], color)
    }
}

/// Selected fields in display order, skipping empty ones
pub fn field_values(record: &Record, fields: &FieldSelection) -> Vec<FieldValue> {
    let mut out = Vec::new();
    let mut push = |value: Option<FieldValue>| {
        if let Some(v) = value {
            out.push(v);
        }
    };

    if fields.probe_status {
        let color = match record.status {
            RecordStatus::Success => Color::Green,
            RecordStatus::Unreachable => Color::Yellow,
            RecordStatus::Failed => Color::Red,
        };
        push(FieldValue::single(status_label(record.status), Some(color)));
    }

    if !record.is_success() {
        push(record.error.clone().and_then(|e| FieldValue::single(e, Some(Color::Red))));
    }

    if fields.tls_version {
        push(record.version.and_then(|v| FieldValue::single(v.to_string(), Some(Color::Blue))));
    }
    if fields.cipher {
        push(record.cipher.clone().and_then(|c| FieldValue::single(c, Some(Color::Cyan))));
    }

    if let Some(cert) = &record.certificate {
        if fields.san {
            push(FieldValue::new(cert.subject_an.clone(), Some(Color::Magenta)));
        }
        if fields.cn {
            push(cert.subject_cn.clone().and_then(|cn| FieldValue::single(cn, Some(Color::Magenta))));
        }
        if fields.so {
            push(FieldValue::new(cert.subject_org.clone(), Some(Color::Magenta)));
        }
        if fields.serial {
            push(FieldValue::single(cert.serial.clone(), None));
        }
    }

    if fields.hash
        && let Some(hash) = &record.hash
    {
        let digests = [&hash.md5, &hash.sha1, &hash.sha256]
            .into_iter()
            .flatten()
            .cloned()
            .collect();
        push(FieldValue::new(digests, None));
    }

    if fields.jarm {
        push(record.jarm.clone().and_then(|j| FieldValue::single(j, None)));
    }
    if fields.ja3 {
        push(record.ja3.as_ref().and_then(|j| FieldValue::single(j.ja3_hash.clone(), None)));
    }
    if fields.ja3s {
        push(record.ja3s.as_ref().and_then(|j| FieldValue::single(j.ja3s_hash.clone(), None)));
    }

    if let Some(flags) = &record.misconfig {
        let raised = [
            (fields.wildcard && flags.wildcard_certificate, "wildcard", Color::Yellow),
            (fields.expired && flags.expired, "expired", Color::Red),
            (fields.self_signed && flags.self_signed, "self-signed", Color::Red),
            (fields.mismatched && flags.mismatched, "mismatched", Color::Red),
            (fields.revoked && flags.revoked, "revoked", Color::Red),
            (fields.untrusted && flags.untrusted, "untrusted", Color::Red),
        ];
        for (set, label, color) in raised {
            if set {
                push(FieldValue::single(label, Some(color)));
            }
        }
    }

    if fields.versions {
        push(FieldValue::new(record.enumeration.version_names(), Some(Color::Blue)));
    }
    if fields.ciphers {
        let ciphers = record
            .enumeration
            .ciphers
            .iter()
            .map(|c| c.name.clone())
            .collect();
        push(FieldValue::new(ciphers, Some(Color::Cyan)));
    }

    out
}

pub fn status_label(status: RecordStatus) -> &'static str {
    match status {
        RecordStatus::Success => "success",
        RecordStatus::Unreachable => "unreachable",
        RecordStatus::Failed => "failed",
    }
}

pub fn render_line(record: &Record, fields: &FieldSelection, color: bool) -> String {
    let mut line = format!("{}:{}", record.host, record.port);
    if color {
        line = line.bold().to_string();
    }
    for field in field_values(record, fields) {
        let text = field.values.join(",");
        let text = match field.color {
            Some(c) if color => text.color(c).to_string(),
            _ => text,
        };
        line.push_str(" [");
        line.push_str(&text);
        line.push(']');
    }
    line
}

#[cfg(test)]
mod tests {
    use super::super::testutil::*;
    use super::*;
    use crate::certificates::MisconfigFlags;
    use crate::error::ProbeError;

    #[test]
    fn test_selected_fields_in_order() {
        let fields = FieldSelection {
            tls_version: true,
            cipher: true,
            san: true,
            ..Default::default()
        };
        let line = render_line(&success(vec!["out.example", "www.out.example"]), &fields, false);
        assert_eq!(
            line,
            "out.example:443 [tls13] [TLS_AES_128_GCM_SHA256] [out.example,www.out.example]"
        );
    }

    #[test]
    fn test_only_raised_flags_are_shown() {
        let mut record = success(vec!["out.example"]);
        record.misconfig = Some(MisconfigFlags {
            expired: true,
            ..Default::default()
        });
        let fields = FieldSelection {
            expired: true,
            self_signed: true,
            ..Default::default()
        };
        assert_eq!(render_line(&record, &fields, false), "out.example:443 [expired]");
    }

    #[test]
    fn test_failure_line() {
        let record = crate::scanner::Record::failure(
            &target(),
            &ProbeError::handshake("handshake_failure alert"),
            1,
            false,
        );
        let fields = FieldSelection {
            probe_status: true,
            tls_version: true,
            ..Default::default()
        };
        assert_eq!(
            render_line(&record, &fields, false),
            "out.example:443 [failed] [handshake_failure alert]"
        );
    }
}
