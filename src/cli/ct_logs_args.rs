// Certificate Transparency logs streaming configuration arguments
// Copyright (C) 2025 tlsprobe contributors
// Licensed under GPL-3.0

use crate::constants::{CT_LOG_LIST_URL, CT_MAX_BATCH_SIZE};
use clap::Args;

/// Certificate Transparency logs streaming options
///
/// Streaming is enabled explicitly with `--ctl` or implicitly when no other
/// input is given.
#[derive(Args, Debug, Clone)]
pub struct CtLogsArgs {
    /// Stream hosts from Certificate Transparency logs
    #[arg(long = "ct-logs", alias = "ctl", id = "ct_logs_enable")]
    pub enable: bool,

    /// Start every source at index 0
    #[arg(long = "ctl-beginning", alias = "cb")]
    pub beginning: bool,

    /// Start index for one source (format: sourceID=index)
    #[arg(long = "ctl-index", alias = "cti", value_name = "SOURCE=INDEX")]
    pub index: Vec<String>,

    /// Restrict streaming to these sources (id or description substring)
    #[arg(long = "ctl-source", alias = "cts", value_name = "SOURCE")]
    pub sources: Vec<String>,

    /// Poll interval in seconds once a source is caught up
    #[arg(long = "ctl-poll-interval", value_name = "SECONDS", default_value = "60")]
    pub poll_interval: u64,

    /// Entries requested per get-entries call
    #[arg(long = "ctl-batch-size", default_value_t = CT_MAX_BATCH_SIZE)]
    pub batch_size: u64,

    /// Log list to discover sources from
    #[arg(long = "ctl-log-list", value_name = "URL", default_value = CT_LOG_LIST_URL)]
    pub log_list_url: String,
}

impl Default for CtLogsArgs {
    fn default() -> Self {
        Self {
            enable: false,
            beginning: false,
            index: Vec::new(),
            sources: Vec::new(),
            poll_interval: crate::constants::CT_DEFAULT_POLL_INTERVAL.as_secs(),
            batch_size: CT_MAX_BATCH_SIZE,
            log_list_url: CT_LOG_LIST_URL.to_string(),
        }
    }
}
