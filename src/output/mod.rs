// Output module - Record rendering (JSON lines, text, DNS, response-only)
//
// The writer is the only consumer of the record channel. It renders each
// record as it arrives; nothing is buffered across records except the set of
// hostnames already printed in DNS mode.

pub mod dns_only;
pub mod json;
pub mod response_only;
pub mod text;

use crate::Result;
use crate::cli::Options;
use crate::scanner::Record;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use tokio::sync::mpsc;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Fields shown in text and response-only output. JSON always carries the
/// whole record.
#[derive(Debug, Clone, Default)]
pub struct FieldSelection {
    pub probe_status: bool,
    pub tls_version: bool,
    pub cipher: bool,
    pub san: bool,
    pub cn: bool,
    pub so: bool,
    pub serial: bool,
    pub hash: bool,
    pub jarm: bool,
    pub ja3: bool,
    pub ja3s: bool,
    pub wildcard: bool,
    pub expired: bool,
    pub self_signed: bool,
    pub mismatched: bool,
    pub revoked: bool,
    pub untrusted: bool,
    pub versions: bool,
    pub ciphers: bool,
    pub cert: bool,
}

impl FieldSelection {
    pub fn from_options(opts: &Options) -> Self {
        Self {
            probe_status: opts.probes.probe_status,
            tls_version: opts.probes.tls_version,
            cipher: opts.probes.cipher,
            san: opts.probes.san,
            cn: opts.probes.cn,
            so: opts.probes.so,
            serial: opts.probes.serial,
            hash: !opts.probes.hash.is_empty(),
            jarm: opts.probes.jarm,
            ja3: opts.probes.ja3,
            ja3s: opts.probes.ja3s,
            wildcard: opts.probes.wildcard_cert,
            expired: opts.misconfig.expired,
            self_signed: opts.misconfig.self_signed,
            mismatched: opts.misconfig.mismatched,
            revoked: opts.misconfig.revoked,
            untrusted: opts.misconfig.untrusted,
            versions: opts.enumeration.versions,
            ciphers: opts.enumeration.ciphers,
            cert: opts.probes.cert,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct OutputConfig {
    pub format: OutputFormat,
    /// Unique certificate hostnames only
    pub dns: bool,
    /// Field values only, no host prefix
    pub resp_only: bool,
    pub color: bool,
    pub fields: FieldSelection,
    pub file: Option<PathBuf>,
}

impl OutputConfig {
    pub fn from_options(opts: &Options) -> Self {
        Self {
            format: if opts.output.json {
                OutputFormat::Json
            } else {
                OutputFormat::Text
            },
            dns: opts.output.dns,
            resp_only: opts.output.resp_only,
            color: !opts.output.no_color && opts.output.output.is_none(),
            fields: FieldSelection::from_options(opts),
            file: opts.output.output.clone(),
        }
    }
}

/// Renders records to stdout and, optionally, a file
pub struct RecordWriter {
    config: OutputConfig,
    out: Box<dyn Write + Send>,
    file: Option<BufWriter<File>>,
    dns: dns_only::DnsCollector,
    written: u64,
}

impl RecordWriter {
    pub fn new(config: OutputConfig) -> Result<Self> {
        let file = match &config.file {
            Some(path) => Some(BufWriter::new(File::create(path)?)),
            None => None,
        };
        let mut writer = Self::with_output(config, Box::new(std::io::stdout()));
        writer.file = file;
        Ok(writer)
    }

    /// Write to `out` instead of stdout
    pub fn with_output(config: OutputConfig, out: Box<dyn Write + Send>) -> Self {
        Self {
            config,
            out,
            file: None,
            dns: dns_only::DnsCollector::default(),
            written: 0,
        }
    }

    /// Lines for one record; may be empty
    pub fn render(&mut self, record: &Record) -> Result<Vec<String>> {
        if self.config.dns {
            return Ok(self.dns.new_names(record));
        }
        match self.config.format {
            OutputFormat::Json => Ok(vec![json::to_line(record)?]),
            OutputFormat::Text if self.config.resp_only => {
                Ok(response_only::values(record, &self.config.fields))
            }
            OutputFormat::Text => Ok(vec![text::render_line(
                record,
                &self.config.fields,
                self.config.color,
            )]),
        }
    }

    pub fn write(&mut self, record: &Record) -> Result<()> {
        for line in self.render(record)? {
            writeln!(self.out, "{}", line)?;
            if let Some(file) = &mut self.file {
                writeln!(file, "{}", line)?;
            }
            self.written += 1;
        }
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.out.flush()?;
        if let Some(file) = &mut self.file {
            file.flush()?;
        }
        Ok(())
    }

    /// Lines written so far
    pub fn written(&self) -> u64 {
        self.written
    }
}

/// Consume the record channel until every producer is gone
pub async fn run_writer(mut writer: RecordWriter, mut rx: mpsc::Receiver<Record>) -> Result<u64> {
    while let Some(record) = rx.recv().await {
        writer.write(&record)?;
        if rx.is_empty() {
            writer.flush()?;
        }
    }
    writer.flush()?;
    debug!("Output closed after {} lines", writer.written());
    Ok(writer.written())
}
