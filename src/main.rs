// tlsprobe - TLS reconnaissance and certificate hygiene toolkit
// Copyright (C) 2025 tlsprobe contributors
// Licensed under GPL-3.0
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, version 3.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU General Public License for more details.

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tlsprobe::backend::build_backend;
use tlsprobe::certificates::{
    CertificateEvaluator, ChainVerifier, HttpRevocationChecker, TrustStore,
};
use tlsprobe::constants::{DEFAULT_PORT, QUEUE_CAPACITY};
use tlsprobe::ct_logs::{CtConfig, CtStreamer, HttpCtClient, fetch_log_list, select_sources};
use tlsprobe::error::ProbeError;
use tlsprobe::fingerprint::JarmFingerprinter;
use tlsprobe::output::{OutputConfig, RecordWriter, run_writer};
use tlsprobe::probe::ProbeExecutor;
use tlsprobe::resolver::{HickoryLookup, HostSpec, TargetResolver};
use tlsprobe::scanner::{Record, ResultSink, ScanConfig, Scanner};
use tlsprobe::utils::Shutdown;
use tlsprobe::{InputMode, Options};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Another provider may already be installed; either is fine
    let _ = rustls::crypto::ring::default_provider().install_default();

    let mut opts = Options::parse();
    init_logging(&opts);

    let mode = opts.validate().context("invalid options")?;

    let shutdown = Shutdown::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted, finishing in-flight probes");
                shutdown.trigger();
            }
        });
    }

    let scanner = build_scanner(&opts, shutdown.clone())?;

    let (record_tx, record_rx) = mpsc::channel::<Record>(QUEUE_CAPACITY);
    let writer = RecordWriter::new(OutputConfig::from_options(&opts))
        .context("failed to open output")?;
    let writer_task = tokio::spawn(run_writer(writer, record_rx));
    let sink = Arc::new(ResultSink::new(record_tx, opts.output.silent_errors));

    let (queue_tx, queue_rx) = mpsc::channel::<HostSpec>(QUEUE_CAPACITY);
    let producer = match mode {
        InputMode::Targets(targets) => {
            info!("Loaded {} targets", targets.len());
            spawn_target_feed(targets, opts.input.ports.clone(), queue_tx, sink.clone())
        }
        InputMode::CtLogs(config) => spawn_ct_feed(config, opts.timeout(), queue_tx, shutdown.clone()).await?,
    };

    scanner.run(queue_rx, sink.clone()).await;

    // The queue is closed or the run was cancelled; stop feeding it
    shutdown.trigger();
    if let Err(e) = producer.await {
        error!("Input task failed: {}", e);
    }

    drop(sink);
    let lines = writer_task.await??;
    debug!("{} output lines written", lines);
    Ok(())
}

fn init_logging(opts: &Options) {
    if opts.output.no_color {
        colored::control::set_override(false);
    }

    let filter = if opts.output.verbose {
        EnvFilter::new("debug")
    } else if opts.output.silent {
        EnvFilter::new("error")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(!opts.output.no_color)
        .with_target(false)
        .init();
}

fn build_scanner(opts: &Options, shutdown: Shutdown) -> Result<Scanner> {
    let timeout = opts.timeout();
    let settings = opts.backend_settings()?;

    let backend = build_backend(opts.network.scan_mode, &settings)?;
    let executor = ProbeExecutor::new(backend, timeout, shutdown.clone());

    let dns = HickoryLookup::new(&opts.network.resolvers, timeout)?;
    let resolver = Arc::new(TargetResolver::new(Arc::new(dns), opts.resolver_options()));

    let verifier: Option<Arc<dyn ChainVerifier>> = if opts.misconfig.untrusted {
        Some(Arc::new(TrustStore::new(opts.network.cacert.as_deref())?))
    } else {
        None
    };
    let evaluator = Arc::new(CertificateEvaluator::new(verifier, opts.revocation_policy()));

    let mut scanner = Scanner::new(
        resolver,
        executor,
        evaluator,
        ScanConfig::from_options(opts)?,
        shutdown,
    );
    if opts.misconfig.revoked {
        scanner = scanner.with_revocation(Arc::new(HttpRevocationChecker::new(timeout)?));
    }
    if opts.probes.jarm {
        scanner = scanner.with_jarm(Arc::new(JarmFingerprinter::new(settings.dialer.clone(), timeout)));
    }
    Ok(scanner)
}

/// Expand raw target lines into host specs. Lines that do not parse are
/// reported as failed records instead of aborting the run.
fn spawn_target_feed(
    targets: Vec<String>,
    ports: Vec<u16>,
    queue: mpsc::Sender<HostSpec>,
    sink: Arc<ResultSink>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        for raw in targets {
            match HostSpec::parse(&raw, &ports) {
                Ok(specs) => {
                    for spec in specs {
                        if queue.send(spec).await.is_err() {
                            return;
                        }
                    }
                }
                Err(e) => {
                    warn!("Skipping target '{}': {}", raw, e);
                    let spec = HostSpec::new(raw.as_str(), DEFAULT_PORT);
                    let record = Record::unresolved(&spec, &ProbeError::resolution(&raw, e));
                    if !sink.submit(record).await {
                        return;
                    }
                }
            }
        }
    })
}

async fn spawn_ct_feed(
    config: CtConfig,
    timeout: std::time::Duration,
    queue: mpsc::Sender<HostSpec>,
    shutdown: Shutdown,
) -> Result<JoinHandle<()>> {
    let http = reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .context("failed to build HTTP client")?;
    let available = fetch_log_list(&http, &config.log_list_url).await?;
    let sources = select_sources(available, &config.sources)?;
    info!("Streaming hostnames from {} CT logs", sources.len());

    let client = Arc::new(HttpCtClient::with_client(http));
    let streamer = CtStreamer::new(client, sources, config, shutdown);
    Ok(tokio::spawn(async move {
        let finished = streamer.run(queue).await;
        debug!("CT streaming stopped with {} sources", finished.len());
    }))
}
