use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use humanize_client::PollConfig;
use humanize_pipeline::history::DEFAULT_HISTORY_CAPACITY;
use humanize_pipeline::{BatchConfig, TimeoutPolicy};

/// A configuration variable held a value that could not be used.
#[derive(Debug, thiserror::Error)]
#[error("{var} must be {expected}, got '{value}'")]
pub struct ConfigError {
    pub var: &'static str,
    pub expected: &'static str,
    pub value: String,
}

/// Client configuration loaded from environment variables.
///
/// All fields have defaults suitable for a backend running locally.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Backend base URL (default: `http://localhost:8000`).
    pub api_url: String,
    /// Bearer token sent with every request, if set.
    pub api_token: Option<String>,
    /// Per-request HTTP timeout (default: 30 s).
    pub http_timeout: Duration,
    /// Poll cadence and deadline (default: every 2 s for 60 s).
    pub poll: PollConfig,
    /// Batch concurrency and timeout policy.
    pub batch: BatchConfig,
    /// Recent results file (default: `.humanize_history.json`).
    pub history_path: PathBuf,
    /// Number of saved results kept (default: `10`).
    pub history_capacity: usize,
}

impl ClientConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                 | Default                  |
    /// |-------------------------|--------------------------|
    /// | `HUMANIZE_API_URL`      | `http://localhost:8000`  |
    /// | `HUMANIZE_API_TOKEN`    | unset                    |
    /// | `HTTP_TIMEOUT_SECS`     | `30`                     |
    /// | `POLL_INTERVAL_MS`      | `2000`                   |
    /// | `POLL_TIMEOUT_MS`       | `60000`                  |
    /// | `BATCH_MAX_CONCURRENCY` | `1`                      |
    /// | `BATCH_TIMEOUT_POLICY`  | `per_item` (or `shared`) |
    /// | `HISTORY_PATH`          | `.humanize_history.json` |
    /// | `HISTORY_CAPACITY`      | `10`                     |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Same as [`from_env`](Self::from_env) with a custom variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let api_url = lookup("HUMANIZE_API_URL")
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| "http://localhost:8000".into());

        let api_token = lookup("HUMANIZE_API_TOKEN").filter(|s| !s.trim().is_empty());

        let http_timeout_secs: u64 =
            parse_var(&lookup, "HTTP_TIMEOUT_SECS", 30, "a positive integer")?;
        let interval_ms: u64 = parse_var(&lookup, "POLL_INTERVAL_MS", 2000, "a positive integer")?;
        let timeout_ms: u64 = parse_var(&lookup, "POLL_TIMEOUT_MS", 60_000, "a positive integer")?;
        let max_concurrency: usize =
            parse_var(&lookup, "BATCH_MAX_CONCURRENCY", 1, "a positive integer")?;
        let timeout_policy: TimeoutPolicy = parse_var(
            &lookup,
            "BATCH_TIMEOUT_POLICY",
            TimeoutPolicy::PerItem,
            "per_item or shared",
        )?;
        let history_capacity: usize =
            parse_var(&lookup, "HISTORY_CAPACITY", DEFAULT_HISTORY_CAPACITY, "a positive integer")?;

        for (var, value) in [
            ("HTTP_TIMEOUT_SECS", http_timeout_secs),
            ("POLL_INTERVAL_MS", interval_ms),
            ("POLL_TIMEOUT_MS", timeout_ms),
            ("BATCH_MAX_CONCURRENCY", max_concurrency as u64),
            ("HISTORY_CAPACITY", history_capacity as u64),
        ] {
            if value == 0 {
                return Err(ConfigError {
                    var,
                    expected: "a positive integer",
                    value: "0".into(),
                });
            }
        }

        let poll = PollConfig {
            interval: Duration::from_millis(interval_ms),
            timeout: Duration::from_millis(timeout_ms),
        };

        Ok(Self {
            api_url,
            api_token,
            http_timeout: Duration::from_secs(http_timeout_secs),
            poll,
            batch: BatchConfig {
                poll,
                max_concurrency,
                timeout_policy,
            },
            history_path: lookup("HISTORY_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(".humanize_history.json")),
            history_capacity,
        })
    }
}

fn parse_var<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: T,
    expected: &'static str,
) -> Result<T, ConfigError> {
    match lookup(var) {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|_| ConfigError {
            var,
            expected,
            value,
        }),
    }
}
