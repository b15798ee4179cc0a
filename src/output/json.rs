// JSON Output Module

use crate::Result;
use crate::scanner::Record;

/// One record as a single JSON line
pub fn to_line(record: &Record) -> Result<String> {
    Ok(serde_json::to_string(record)?)
}
