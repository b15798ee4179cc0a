// Output format configuration arguments
// Copyright (C) 2025 tlsprobe contributors
// Licensed under GPL-3.0

use clap::Args;
use std::path::PathBuf;

/// Output format and display options
#[derive(Args, Debug, Clone, Default)]
pub struct OutputArgs {
    /// Write records as JSON lines
    #[arg(short = 'j', long = "json")]
    pub json: bool,

    /// Also write records to this file
    #[arg(short = 'o', long = "output", value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Only write unique hostnames found in certificates
    #[arg(long = "dns")]
    pub dns: bool,

    /// Only write the values of the selected field, without the host prefix
    #[arg(long = "resp-only", alias = "ro")]
    pub resp_only: bool,

    /// Drop records for targets that failed
    #[arg(long = "silent-errors", alias = "se")]
    pub silent_errors: bool,

    /// Disable colored text output
    #[arg(long = "no-color", alias = "nc")]
    pub no_color: bool,

    /// Show only results on stdout, errors only on stderr
    #[arg(long = "silent")]
    pub silent: bool,

    /// Debug logging
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,
}
