/*
 * tlsprobe - TLS reconnaissance and certificate hygiene toolkit
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 */

//! Security Module
//!
//! Validation of values that end up on an external process command line or
//! in a TLS server_name extension.

pub mod input_validation;

pub use input_validation::{ValidationError, validate_cipher, validate_hostname, validate_port};
