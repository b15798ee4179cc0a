// CT Log Sources
//
// Source metadata comes from the public log list (v3 format). Only logs in the
// "usable" state are kept.

use crate::Result;
use crate::constants::CT_MAX_SOURCE_FAILURES;
use crate::error::TlsError;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Lifecycle of one source's poller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceState {
    Idle,
    Polling,
    /// Terminal; the source is skipped for the rest of the run
    Failed,
}

/// CT log source metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogSource {
    /// Log ID as published in the log list (base64 of the key hash)
    pub id: String,
    pub description: String,
    pub operator: String,
    /// Base URL for the RFC 6962 API
    pub url: String,
    pub state: SourceState,
    pub last_error: Option<String>,
    /// Consecutive failures since the last success
    pub failure_count: u32,
}

impl LogSource {
    pub fn new(id: impl Into<String>, url: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            description: id.clone(),
            id,
            operator: String::new(),
            url: url.into(),
            state: SourceState::Idle,
            last_error: None,
            failure_count: 0,
        }
    }

    pub fn is_failed(&self) -> bool {
        self.state == SourceState::Failed
    }

    /// Record a failure; returns true once the source has been marked Failed
    pub fn mark_failed(&mut self, error: String) -> bool {
        self.failure_count += 1;
        self.last_error = Some(error);
        if self.failure_count >= CT_MAX_SOURCE_FAILURES {
            self.state = SourceState::Failed;
        }
        self.is_failed()
    }

    pub fn mark_success(&mut self) {
        self.failure_count = 0;
        self.last_error = None;
    }

    /// Whether `selector` names this source, by exact id or description substring
    pub fn matches(&self, selector: &str) -> bool {
        let selector = selector.trim();
        !selector.is_empty()
            && (self.id == selector
                || self
                    .description
                    .to_ascii_lowercase()
                    .contains(&selector.to_ascii_lowercase()))
    }
}

/// Parse a v3 log list document into its usable sources
pub fn parse_log_list(json: &str) -> Result<Vec<LogSource>> {
    let list: LogList = serde_json::from_str(json)?;
    let mut sources = Vec::new();

    for operator in list.operators {
        for log in operator.logs {
            let usable = log.state.as_ref().is_some_and(|s| s.usable.is_some());
            if !usable {
                debug!("Skipping CT log {} (not usable)", log.log_id);
                continue;
            }
            sources.push(LogSource {
                description: log
                    .description
                    .unwrap_or_else(|| format!("{} CT Log", operator.name)),
                operator: operator.name.clone(),
                url: log.url,
                id: log.log_id,
                state: SourceState::Idle,
                last_error: None,
                failure_count: 0,
            });
        }
    }

    Ok(sources)
}

/// Download the log list from `url`
pub async fn fetch_log_list(client: &reqwest::Client, url: &str) -> Result<Vec<LogSource>> {
    info!("Fetching CT log sources from {}", url);

    let response = client.get(url).send().await?;
    if !response.status().is_success() {
        return Err(TlsError::HttpError {
            status: response.status().as_u16(),
            details: format!("CT log list request to {} failed", url),
        });
    }

    let sources = parse_log_list(&response.text().await?)?;
    info!("Loaded {} usable CT log sources", sources.len());
    Ok(sources)
}

/// Keep the sources named by `selectors`; an empty selector list keeps all
pub fn select_sources(sources: Vec<LogSource>, selectors: &[String]) -> Result<Vec<LogSource>> {
    if selectors.is_empty() {
        return Ok(sources);
    }

    for selector in selectors {
        if !sources.iter().any(|s| s.matches(selector)) {
            warn!("CT source selector '{}' matched no usable log", selector);
        }
    }

    let selected: Vec<LogSource> = sources
        .into_iter()
        .filter(|s| selectors.iter().any(|sel| s.matches(sel)))
        .collect();

    if selected.is_empty() {
        return Err(TlsError::ConfigError {
            message: format!("no CT log source matches {}", selectors.join(", ")),
        });
    }
    Ok(selected)
}

// v3 log list document
#[derive(Debug, Deserialize)]
struct LogList {
    operators: Vec<Operator>,
}

#[derive(Debug, Deserialize)]
struct Operator {
    name: String,
    #[serde(default)]
    logs: Vec<Log>,
}

#[derive(Debug, Deserialize)]
struct Log {
    log_id: String,
    description: Option<String>,
    url: String,
    state: Option<LogState>,
}

#[derive(Debug, Deserialize)]
struct LogState {
    usable: Option<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOG_LIST: &str = r#"{
        "version": "36.1",
        "operators": [
            {
                "name": "Google",
                "email": ["ct@example.com"],
                "logs": [
                    {
                        "description": "Google 'Argon2025h1' log",
                        "log_id": "argon-id",
                        "key": "AAAA",
                        "url": "https://ct.googleapis.com/logs/us1/argon2025h1/",
                        "mmd": 86400,
                        "state": { "usable": { "timestamp": "2024-01-01T00:00:00Z" } }
                    },
                    {
                        "description": "Google 'Old' log",
                        "log_id": "old-id",
                        "url": "https://ct.googleapis.com/logs/old/",
                        "state": { "retired": { "timestamp": "2020-01-01T00:00:00Z" } }
                    }
                ]
            },
            {
                "name": "Cloudflare",
                "logs": [
                    {
                        "log_id": "nimbus-id",
                        "url": "https://ct.cloudflare.com/logs/nimbus2025/",
                        "state": { "usable": {} }
                    }
                ]
            }
        ]
    }"#;

    #[test]
    fn test_parse_keeps_usable_logs() {
        let sources = parse_log_list(LOG_LIST).unwrap();
        let ids: Vec<&str> = sources.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["argon-id", "nimbus-id"]);
        assert_eq!(sources[1].description, "Cloudflare CT Log");
        assert!(sources.iter().all(|s| s.state == SourceState::Idle));
    }

    #[test]
    fn test_failed_after_consecutive_errors() {
        let mut source = LogSource::new("a", "https://ct.example/");
        assert!(!source.mark_failed("one".into()));
        assert!(!source.mark_failed("two".into()));
        source.mark_success();
        assert_eq!(source.failure_count, 0);

        assert!(!source.mark_failed("one".into()));
        assert!(!source.mark_failed("two".into()));
        assert!(source.mark_failed("three".into()));
        assert_eq!(source.last_error.as_deref(), Some("three"));
    }

    #[test]
    fn test_select_sources() {
        let sources = parse_log_list(LOG_LIST).unwrap();
        let selected = select_sources(sources.clone(), &["argon2025".to_string()]).unwrap();
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].id, "argon-id");

        assert_eq!(select_sources(sources.clone(), &[]).unwrap().len(), 2);
        assert!(select_sources(sources, &["missing".to_string()]).is_err());
    }
}
