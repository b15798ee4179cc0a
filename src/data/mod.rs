// Data module - Embedded data tables

pub mod cipher_mapping;

pub use cipher_mapping::{CIPHER_DB, CipherDatabase};
