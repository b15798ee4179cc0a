// Certificate Transparency log streaming
//
// Feeds the scan queue with hostnames taken from newly logged certificates.

pub mod client;
pub mod deduplicator;
pub mod parser;
pub mod sources;
pub mod streamer;

pub use client::{CtLogClient, HttpCtClient, RawLogEntry};
pub use deduplicator::Deduplicator;
pub use parser::{CtLogEntry, EntryType};
pub use sources::{LogSource, SourceState, fetch_log_list, parse_log_list, select_sources};
pub use streamer::{CtConfig, CtStreamer, StartPosition};
