// Scanner module - Scheduling, per-target probing and record assembly

pub mod aggregator;
pub mod config;
pub mod scheduler;

pub use aggregator::{Record, RecordStatus, ResultSink, RunSummary};
pub use config::{CertificateConfig, EnumerationConfig, FingerprintConfig, PoolConfig, ScanConfig};
pub use scheduler::Scanner;
