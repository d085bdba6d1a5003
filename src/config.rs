//! Runtime configuration from environment variables.
//!
//! Credentials are the exception: they arrive as CLI arguments and are never
//! read from the environment or disk.

use chrono::{Duration, NaiveDate, Utc};

/// Metric fields expected inside each node's `instantaneous` map.
pub const DEFAULT_METRICS: [&str; 7] = [
    "power",
    "ber",
    "snr",
    "dgd",
    "qfactor",
    "chromatic_dispersion",
    "carrier_offset",
];

#[derive(Clone, Debug)]
pub struct Config {
    /// Base URL of the data host, e.g. `https://lambda1.cs.cornell.edu/adva-performance-monitoring`.
    pub base_url: String,
    /// Daily file name with a `{date}` placeholder (formatted `%Y-%m-%d`).
    pub file_pattern: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// Metric field names to extract; the daily schema is externally owned.
    pub metrics: Vec<String>,
    /// Also emit low/median/high records from the fifteen-minute bins.
    pub include_bins: bool,
    pub dashboard_port: u16,
    /// Hard cap on files fetched in one run.
    pub fetch_cap: usize,
    /// Politeness delay between requests to a shared host.
    pub fetch_delay_ms: u64,
    pub request_timeout_secs: u64,
    /// Raw bytes of each fetched day land here when set.
    pub cache_dir: Option<String>,
    pub retry_max: u32,
    pub retry_base_delay_ms: u64,
    pub retry_max_delay_ms: u64,
}

impl Config {
    pub fn from_env() -> Self {
        let today = Utc::now().date_naive();
        Self {
            base_url: std::env::var("SIGNALQ_BASE_URL")
                .unwrap_or_else(|_| "https://lambda1.cs.cornell.edu/adva-performance-monitoring".to_string()),
            file_pattern: std::env::var("SIGNALQ_FILE_PATTERN")
                .unwrap_or_else(|_| "{date}.json".to_string()),
            start_date: env_date("SIGNALQ_START_DATE").unwrap_or(today - Duration::days(30)),
            end_date: env_date("SIGNALQ_END_DATE").unwrap_or(today),
            metrics: std::env::var("SIGNALQ_METRICS")
                .map(|v| v.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect())
                .unwrap_or_else(|_| DEFAULT_METRICS.iter().map(|s| s.to_string()).collect()),
            include_bins: std::env::var("SIGNALQ_INCLUDE_BINS")
                .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(false),
            dashboard_port: std::env::var("SIGNALQ_PORT").ok().and_then(|v| v.parse().ok()).unwrap_or(8050),
            fetch_cap: std::env::var("SIGNALQ_FETCH_CAP").ok().and_then(|v| v.parse().ok()).unwrap_or(5000),
            fetch_delay_ms: std::env::var("SIGNALQ_FETCH_DELAY_MS").ok().and_then(|v| v.parse().ok()).unwrap_or(0),
            request_timeout_secs: std::env::var("SIGNALQ_TIMEOUT_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(90),
            cache_dir: std::env::var("SIGNALQ_CACHE_DIR").ok(),
            retry_max: std::env::var("SIGNALQ_RETRY_MAX").ok().and_then(|v| v.parse().ok()).unwrap_or(3),
            retry_base_delay_ms: std::env::var("SIGNALQ_RETRY_BASE_MS").ok().and_then(|v| v.parse().ok()).unwrap_or(100),
            retry_max_delay_ms: std::env::var("SIGNALQ_RETRY_MAX_MS").ok().and_then(|v| v.parse().ok()).unwrap_or(5000),
        }
    }

    /// Inclusive list of days to fetch, oldest first.
    pub fn date_range(&self) -> Vec<NaiveDate> {
        let mut days = Vec::new();
        let mut d = self.start_date;
        while d <= self.end_date {
            days.push(d);
            d += Duration::days(1);
        }
        days
    }
}

fn env_date(key: &str) -> Option<NaiveDate> {
    std::env::var(key).ok().and_then(|v| NaiveDate::parse_from_str(v.trim(), "%Y-%m-%d").ok())
}

/// Canonical day key used in URLs, logs, and the manifest.
pub fn day_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}
