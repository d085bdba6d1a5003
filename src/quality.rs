//! Per-run data-quality accounting.
//!
//! The manifest records what a run actually retrieved: each fetched day with
//! its content hash and record count, the days that were requested but never
//! materialized (gaps), and the files that failed to parse. The dashboard
//! serves the condensed report alongside the charts.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::config::day_key;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DayGap {
    pub start: String,
    pub end: String,
    pub missing_days: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchedDay {
    pub date: String,
    pub bytes: u64,
    pub hash_sha256: String,
    pub records: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchManifest {
    pub host: String,
    pub days_requested: u64,
    pub fetched: Vec<FetchedDay>,
    pub gaps: Vec<DayGap>,
    pub bad_files: Vec<String>,
    pub warnings: Vec<String>,
    pub generated_at_epoch: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityReport {
    pub days_requested: u64,
    pub days_fetched: u64,
    pub bad_files: u64,
    pub gaps: u64,
    pub records: u64,
    pub warnings: Vec<String>,
}

impl FetchManifest {
    pub fn new(host: &str, days_requested: u64, generated_at_epoch: u64) -> Self {
        Self {
            host: host.to_string(),
            days_requested,
            fetched: Vec::new(),
            gaps: Vec::new(),
            bad_files: Vec::new(),
            warnings: Vec::new(),
            generated_at_epoch,
        }
    }

    pub fn record_day(&mut self, date: NaiveDate, raw: &[u8], records: u64) {
        self.fetched.push(FetchedDay {
            date: day_key(date),
            bytes: raw.len() as u64,
            hash_sha256: sha256_hex(raw),
            records,
        });
    }

    pub fn record_bad_file(&mut self, date: NaiveDate, reason: &str) {
        self.bad_files.push(format!("{}: {}", day_key(date), reason));
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    /// Compute gaps: runs of requested days that produced no usable data.
    /// `requested` must be the run's ordered date range.
    pub fn finalize_gaps(&mut self, requested: &[NaiveDate], usable: &[NaiveDate]) {
        let have: std::collections::BTreeSet<NaiveDate> = usable.iter().copied().collect();
        self.gaps.clear();

        let mut run_start: Option<NaiveDate> = None;
        let mut run_end: Option<NaiveDate> = None;
        for &day in requested {
            if have.contains(&day) {
                if let (Some(s), Some(e)) = (run_start.take(), run_end.take()) {
                    self.gaps.push(gap(s, e));
                }
            } else {
                if run_start.is_none() {
                    run_start = Some(day);
                }
                run_end = Some(day);
            }
        }
        if let (Some(s), Some(e)) = (run_start, run_end) {
            self.gaps.push(gap(s, e));
        }
    }

    pub fn report(&self, records: u64) -> QualityReport {
        QualityReport {
            days_requested: self.days_requested,
            days_fetched: self.fetched.len() as u64,
            bad_files: self.bad_files.len() as u64,
            gaps: self.gaps.len() as u64,
            records,
            warnings: self.warnings.clone(),
        }
    }
}

fn gap(start: NaiveDate, end: NaiveDate) -> DayGap {
    DayGap {
        start: day_key(start),
        end: day_key(end),
        missing_days: (end - start).num_days() as u64 + 1,
    }
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}
