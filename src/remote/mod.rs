//! Remote retrieval of daily files over an authenticated HTTP session.
//!
//! [`RemoteSource`] is the seam in front of the network: the real
//! [`HttpSource`] speaks basic-auth HTTP to the data host, tests substitute
//! an in-memory source. The driver [`fetch_range`] applies the failure
//! policy: auth or reachability failures abort the run, a single missing or
//! failing day is reported and skipped.

use std::path::Path;

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::{Client, StatusCode};
use tokio::time::{sleep, Duration};
use url::Url;

use crate::config::{day_key, Config};
use crate::error::RemoteAccessError;
use crate::logging::{self, obj, v_num, v_str, Domain};

pub mod retry;

use retry::{is_retryable_http_error, is_retryable_network_error, retry_async, RetryConfig};

/// One retrieved daily file, still raw.
#[derive(Debug, Clone)]
pub struct DailyFile {
    pub date: NaiveDate,
    pub bytes: Vec<u8>,
}

#[async_trait]
pub trait RemoteSource: Send + Sync {
    /// Host name for logs and the manifest.
    fn host(&self) -> &str;

    /// Verify the session before the per-day loop: credentials accepted,
    /// host reachable.
    async fn preflight(&self) -> Result<(), RemoteAccessError>;

    /// Raw bytes of one day's file.
    async fn fetch_day(&self, date: NaiveDate) -> Result<Vec<u8>, RemoteAccessError>;
}

/// Outcome of a single HTTP attempt. Transient failures stay `Err` so the
/// retry loop sees them; everything here is final.
enum Attempt {
    Bytes(Vec<u8>),
    Absent,
    AuthRejected,
    Failed(String),
}

pub struct HttpSource {
    client: Client,
    base: Url,
    file_pattern: String,
    username: String,
    password: String,
    retry: RetryConfig,
    host: String,
}

impl HttpSource {
    pub fn new(cfg: &Config, username: &str, password: &str) -> anyhow::Result<Self> {
        // A trailing slash keeps Url::join from eating the last path segment.
        let mut base_url = cfg.base_url.clone();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        let base = Url::parse(&base_url).with_context(|| format!("bad base url {}", cfg.base_url))?;
        let host = base.host_str().unwrap_or("").to_string();
        let client = Client::builder()
            .timeout(Duration::from_secs(cfg.request_timeout_secs))
            .build()
            .context("building http client")?;
        Ok(Self {
            client,
            base,
            file_pattern: cfg.file_pattern.clone(),
            username: username.to_string(),
            password: password.to_string(),
            retry: RetryConfig {
                max_retries: cfg.retry_max,
                base_delay_ms: cfg.retry_base_delay_ms,
                max_delay_ms: cfg.retry_max_delay_ms,
                ..RetryConfig::default()
            },
            host,
        })
    }

    fn day_url(&self, date: NaiveDate) -> Result<Url, RemoteAccessError> {
        let name = self.file_pattern.replace("{date}", &day_key(date));
        self.base.join(&name).map_err(|e| RemoteAccessError::Transfer {
            date: day_key(date),
            reason: format!("bad file url {}: {}", name, e),
        })
    }
}

#[async_trait]
impl RemoteSource for HttpSource {
    fn host(&self) -> &str {
        &self.host
    }

    async fn preflight(&self) -> Result<(), RemoteAccessError> {
        let resp = self
            .client
            .get(self.base.clone())
            .basic_auth(&self.username, Some(&self.password))
            .send()
            .await
            .map_err(|e| RemoteAccessError::HostUnreachable {
                host: self.host.clone(),
                reason: e.to_string(),
            })?;
        match resp.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                Err(RemoteAccessError::AuthFailed { host: self.host.clone() })
            }
            // Any other status proves the host is up and the credentials
            // were not rejected; the base path itself may well 404.
            _ => Ok(()),
        }
    }

    async fn fetch_day(&self, date: NaiveDate) -> Result<Vec<u8>, RemoteAccessError> {
        let url = self.day_url(date)?;
        let day = day_key(date);

        let attempt = retry_async(&self.retry, &format!("fetch {}", day), || {
            let client = self.client.clone();
            let url = url.clone();
            let username = self.username.clone();
            let password = self.password.clone();
            async move {
                let resp = match client
                    .get(url)
                    .basic_auth(&username, Some(&password))
                    .send()
                    .await
                {
                    Ok(resp) => resp,
                    Err(e) if is_retryable_network_error(&e) => {
                        return Err(anyhow!("network: {}", e))
                    }
                    Err(e) => return Ok(Attempt::Failed(e.to_string())),
                };
                let status = resp.status();
                if status == StatusCode::NOT_FOUND {
                    return Ok(Attempt::Absent);
                }
                if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
                    return Ok(Attempt::AuthRejected);
                }
                if is_retryable_http_error(status.as_u16()) {
                    return Err(anyhow!("http {}", status));
                }
                if !status.is_success() {
                    return Ok(Attempt::Failed(format!("http {}", status)));
                }
                match resp.bytes().await {
                    Ok(bytes) => Ok(Attempt::Bytes(bytes.to_vec())),
                    // A body cut short mid-transfer is worth another attempt.
                    Err(e) => Err(anyhow!("body: {}", e)),
                }
            }
        })
        .await;

        match attempt {
            Ok(Attempt::Bytes(bytes)) => Ok(bytes),
            Ok(Attempt::Absent) => Err(RemoteAccessError::FileAbsent { date: day }),
            Ok(Attempt::AuthRejected) => {
                Err(RemoteAccessError::AuthFailed { host: self.host.clone() })
            }
            Ok(Attempt::Failed(reason)) => Err(RemoteAccessError::Transfer { date: day, reason }),
            Err(e) => Err(RemoteAccessError::Transfer { date: day, reason: e.to_string() }),
        }
    }
}

/// Everything one run retrieved, plus what it could not.
#[derive(Debug, Default)]
pub struct FetchRun {
    pub files: Vec<DailyFile>,
    pub missing: Vec<NaiveDate>,
    pub failed: Vec<(NaiveDate, String)>,
}

/// Fetch every day in `dates`, oldest first. Fatal errors propagate; a
/// missing or failing day is logged and recorded. Raw bytes are mirrored
/// into `cache_dir` when set.
pub async fn fetch_range(
    source: &dyn RemoteSource,
    dates: &[NaiveDate],
    cap: usize,
    delay_ms: u64,
    cache_dir: Option<&Path>,
) -> Result<FetchRun, RemoteAccessError> {
    source.preflight().await?;
    logging::info(
        Domain::Fetch,
        "session_open",
        obj(&[("host", v_str(source.host())), ("days", v_num(dates.len() as f64))]),
    );

    let mut run = FetchRun::default();
    for (i, &date) in dates.iter().enumerate() {
        if i >= cap {
            logging::warn(
                Domain::Fetch,
                "fetch_cap_reached",
                obj(&[("cap", v_num(cap as f64)), ("skipped", v_num((dates.len() - i) as f64))]),
            );
            break;
        }
        if delay_ms > 0 && i > 0 {
            sleep(Duration::from_millis(delay_ms)).await;
        }

        match source.fetch_day(date).await {
            Ok(bytes) => {
                if let Some(dir) = cache_dir {
                    cache_raw(dir, date, &bytes);
                }
                logging::debug(
                    Domain::Fetch,
                    "day_fetched",
                    obj(&[
                        ("date", v_str(&day_key(date))),
                        ("bytes", v_num(bytes.len() as f64)),
                    ]),
                );
                run.files.push(DailyFile { date, bytes });
            }
            Err(e) if e.is_fatal() => return Err(e),
            Err(RemoteAccessError::FileAbsent { .. }) => {
                logging::warn(
                    Domain::Fetch,
                    "day_absent",
                    obj(&[("date", v_str(&day_key(date)))]),
                );
                run.missing.push(date);
            }
            Err(e) => {
                logging::warn(
                    Domain::Fetch,
                    "day_failed",
                    obj(&[("date", v_str(&day_key(date))), ("reason", v_str(&e.to_string()))]),
                );
                run.failed.push((date, e.to_string()));
            }
        }
    }

    logging::info(
        Domain::Fetch,
        "session_close",
        obj(&[
            ("fetched", v_num(run.files.len() as f64)),
            ("missing", v_num(run.missing.len() as f64)),
            ("failed", v_num(run.failed.len() as f64)),
        ]),
    );
    Ok(run)
}

fn cache_raw(dir: &Path, date: NaiveDate, bytes: &[u8]) {
    if let Err(e) = std::fs::create_dir_all(dir) {
        logging::warn(
            Domain::Fetch,
            "cache_dir_failed",
            obj(&[("reason", v_str(&e.to_string()))]),
        );
        return;
    }
    let path = dir.join(format!("{}.json", day_key(date)));
    if let Err(e) = std::fs::write(&path, bytes) {
        logging::warn(
            Domain::Fetch,
            "cache_write_failed",
            obj(&[
                ("path", v_str(&path.display().to_string())),
                ("reason", v_str(&e.to_string())),
            ]),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg_with_base(base: &str, pattern: &str) -> Config {
        let mut cfg = Config::from_env();
        cfg.base_url = base.to_string();
        cfg.file_pattern = pattern.to_string();
        cfg
    }

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn day_url_substitutes_date() {
        let cfg = cfg_with_base("https://data.example.edu/optical", "{date}.json");
        let src = HttpSource::new(&cfg, "user", "pass").unwrap();
        let url = src.day_url(d("2024-03-01")).unwrap();
        assert_eq!(url.as_str(), "https://data.example.edu/optical/2024-03-01.json");
    }

    #[test]
    fn day_url_keeps_prefixes() {
        let cfg = cfg_with_base("https://data.example.edu/optical/", "adva-{date}.json");
        let src = HttpSource::new(&cfg, "user", "pass").unwrap();
        let url = src.day_url(d("2024-12-31")).unwrap();
        assert_eq!(url.as_str(), "https://data.example.edu/optical/adva-2024-12-31.json");
    }

    struct ScriptedSource;

    #[async_trait]
    impl RemoteSource for ScriptedSource {
        fn host(&self) -> &str {
            "scripted"
        }

        async fn preflight(&self) -> Result<(), RemoteAccessError> {
            Ok(())
        }

        async fn fetch_day(&self, date: NaiveDate) -> Result<Vec<u8>, RemoteAccessError> {
            match day_key(date).as_str() {
                "2024-03-01" => Ok(b"{}".to_vec()),
                "2024-03-02" => Err(RemoteAccessError::FileAbsent { date: day_key(date) }),
                _ => Err(RemoteAccessError::Transfer {
                    date: day_key(date),
                    reason: "http 500 Internal Server Error".to_string(),
                }),
            }
        }
    }

    #[tokio::test]
    async fn range_skips_absent_and_failed_days() {
        let dates = [d("2024-03-01"), d("2024-03-02"), d("2024-03-03")];
        let run = fetch_range(&ScriptedSource, &dates, 100, 0, None).await.unwrap();
        assert_eq!(run.files.len(), 1);
        assert_eq!(run.missing, vec![d("2024-03-02")]);
        assert_eq!(run.failed.len(), 1);
    }

    #[tokio::test]
    async fn cap_bounds_the_run() {
        let dates = [d("2024-03-01"), d("2024-03-02"), d("2024-03-03")];
        let run = fetch_range(&ScriptedSource, &dates, 1, 0, None).await.unwrap();
        assert_eq!(run.files.len(), 1);
        assert!(run.missing.is_empty());
    }

    struct LockedOut;

    #[async_trait]
    impl RemoteSource for LockedOut {
        fn host(&self) -> &str {
            "locked"
        }

        async fn preflight(&self) -> Result<(), RemoteAccessError> {
            Err(RemoteAccessError::AuthFailed { host: "locked".to_string() })
        }

        async fn fetch_day(&self, _date: NaiveDate) -> Result<Vec<u8>, RemoteAccessError> {
            unreachable!("preflight fails first")
        }
    }

    #[tokio::test]
    async fn auth_failure_aborts_before_any_fetch() {
        let err = fetch_range(&LockedOut, &[d("2024-03-01")], 100, 0, None).await.unwrap_err();
        assert!(err.is_fatal());
    }
}
