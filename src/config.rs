use std::path::PathBuf;
use std::time::Duration;

use chrono_tz::Tz;

use crate::recording::types::{OrderKey, OrderTerm};

pub const DATABASE_URL_ENV: &str = "RECORDINGS_DATABASE_URL";
pub const TIMEZONE_ENV: &str = "RECORDINGS_TIMEZONE";
pub const MAX_CONNECTIONS_ENV: &str = "RECORDINGS_MAX_CONNECTIONS";

/// Settings for the recording store and query engine.
#[derive(Debug, Clone)]
pub struct AccessConfig {
    /// SQLite connection string
    pub database_url: String,
    pub max_connections: u32,
    pub connect_timeout: Duration,

    /// Timezone recording file names are rendered in
    pub display_timezone: Tz,

    /// Order used when a query does not name one: newest capture first,
    /// undated recordings as of the epoch, then newest id.
    pub default_order: Vec<OrderTerm>,
    /// Page size when a query does not name one; `None` is unbounded
    pub default_limit: Option<i64>,
    /// Upper bound applied to any requested page size
    pub max_limit: Option<i64>,

    /// When set, [`RecordingService::open`](crate::RecordingService::open)
    /// installs a fmt subscriber with this directive (`RUST_LOG` wins).
    /// Left unset, subscriber setup belongs to the embedding binary.
    pub log_directive: Option<String>,
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            database_url: std::env::var(DATABASE_URL_ENV)
                .unwrap_or_else(|_| default_database_url()),
            max_connections: std::env::var(MAX_CONNECTIONS_ENV)
                .ok()
                .and_then(|value| value.parse().ok())
                .unwrap_or(10),
            connect_timeout: Duration::from_secs(8),
            display_timezone: std::env::var(TIMEZONE_ENV)
                .ok()
                .and_then(|value| value.parse::<Tz>().ok())
                .unwrap_or(chrono_tz::Pacific::Auckland),
            default_order: vec![
                OrderTerm::desc(OrderKey::RecordingDateTime),
                OrderTerm::desc(OrderKey::Id),
            ],
            default_limit: None,
            max_limit: None,
            log_directive: None,
        }
    }
}

impl AccessConfig {
    /// Configuration backed by a private in-memory database.
    pub fn in_memory() -> Self {
        Self {
            database_url: "sqlite::memory:".to_string(),
            max_connections: 1,
            ..Default::default()
        }
    }

    /// Effective limit for a requested page size. A negative request counts
    /// as no request, so it cannot slip past `max_limit`.
    pub fn effective_limit(&self, requested: Option<i64>) -> Option<i64> {
        let limit = requested.filter(|limit| *limit >= 0).or(self.default_limit);
        match (limit, self.max_limit) {
            (Some(limit), Some(max)) => Some(limit.min(max)),
            (None, Some(max)) => Some(max),
            (limit, None) => limit,
        }
    }
}

fn default_database_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("recording-vault")
        .join("recordings.db")
}

fn default_database_url() -> String {
    format!("sqlite:{}?mode=rwc", default_database_path().display())
}
