//! Fetch manifest, raw cache, and quality accounting.

use async_trait::async_trait;
use chrono::NaiveDate;
use tempfile::TempDir;

use signalq::config::day_key;
use signalq::error::RemoteAccessError;
use signalq::quality::{sha256_hex, FetchManifest};
use signalq::remote::{fetch_range, RemoteSource};

fn d(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

struct EchoSource;

#[async_trait]
impl RemoteSource for EchoSource {
    fn host(&self) -> &str {
        "echo.test"
    }

    async fn preflight(&self) -> Result<(), RemoteAccessError> {
        Ok(())
    }

    async fn fetch_day(&self, date: NaiveDate) -> Result<Vec<u8>, RemoteAccessError> {
        Ok(day_key(date).into_bytes())
    }
}

#[tokio::test]
async fn raw_bytes_are_cached_per_day() {
    let dir = TempDir::new().unwrap();
    let dates = [d("2024-03-01"), d("2024-03-02")];

    let run = fetch_range(&EchoSource, &dates, 100, 0, Some(dir.path())).await.unwrap();
    assert_eq!(run.files.len(), 2);

    let cached = std::fs::read(dir.path().join("2024-03-01.json")).unwrap();
    assert_eq!(cached, b"2024-03-01");
    assert!(dir.path().join("2024-03-02.json").exists());
}

#[tokio::test]
async fn cache_survives_reruns_with_identical_content() {
    let dir = TempDir::new().unwrap();
    let dates = [d("2024-03-01")];

    fetch_range(&EchoSource, &dates, 100, 0, Some(dir.path())).await.unwrap();
    let first = std::fs::read(dir.path().join("2024-03-01.json")).unwrap();
    fetch_range(&EchoSource, &dates, 100, 0, Some(dir.path())).await.unwrap();
    let second = std::fs::read(dir.path().join("2024-03-01.json")).unwrap();
    assert_eq!(first, second);
}

#[test]
fn manifest_hashes_match_content() {
    let mut manifest = FetchManifest::new("echo.test", 1, 0);
    let body = br#"{"100": []}"#;
    manifest.record_day(d("2024-03-01"), body, 0);

    assert_eq!(manifest.fetched.len(), 1);
    let entry = &manifest.fetched[0];
    assert_eq!(entry.date, "2024-03-01");
    assert_eq!(entry.bytes, body.len() as u64);
    assert_eq!(entry.hash_sha256, sha256_hex(body));
}

#[test]
fn manifest_serializes_round_trip() {
    let mut manifest = FetchManifest::new("echo.test", 3, 42);
    manifest.record_day(d("2024-03-01"), b"x", 5);
    manifest.record_bad_file(d("2024-03-02"), "invalid json");
    manifest.finalize_gaps(
        &[d("2024-03-01"), d("2024-03-02"), d("2024-03-03")],
        &[d("2024-03-01")],
    );

    let text = serde_json::to_string(&manifest).unwrap();
    let back: FetchManifest = serde_json::from_str(&text).unwrap();
    assert_eq!(back.days_requested, 3);
    assert_eq!(back.fetched.len(), 1);
    assert_eq!(back.bad_files.len(), 1);
    assert_eq!(back.gaps.len(), 1);
    assert_eq!(back.gaps[0].start, "2024-03-02");
    assert_eq!(back.gaps[0].missing_days, 2);
}
