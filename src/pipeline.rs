//! The run itself: fetch, parse, aggregate, fit.
//!
//! Strictly sequential; each stage consumes the previous stage's complete
//! output. Per-day and per-series failures are contained here so one bad
//! day never takes down the run.

use anyhow::{bail, Result};

use crate::config::{day_key, Config};
use crate::logging::{self, obj, v_num, v_str, Domain};
use crate::parse::{parse_daily, SchemaConfig};
use crate::quality::{FetchManifest, QualityReport};
use crate::remote::{fetch_range, RemoteSource};
use crate::series::{SeriesKey, SeriesTable};
use crate::trend::{fit_series, TrendResult};

#[derive(Debug)]
pub struct PipelineOutput {
    pub table: SeriesTable,
    pub trends: Vec<(SeriesKey, Option<TrendResult>)>,
    pub manifest: FetchManifest,
    pub report: QualityReport,
}

pub async fn run(cfg: &Config, source: &dyn RemoteSource) -> Result<PipelineOutput> {
    let dates = cfg.date_range();
    if dates.is_empty() {
        bail!("empty date range: start {} is after end {}", cfg.start_date, cfg.end_date);
    }

    let mut manifest =
        FetchManifest::new(source.host(), dates.len() as u64, logging::ts_epoch());

    let fetched = fetch_range(
        source,
        &dates,
        cfg.fetch_cap,
        cfg.fetch_delay_ms,
        cfg.cache_dir.as_deref().map(std::path::Path::new),
    )
    .await?;
    for (date, reason) in &fetched.failed {
        manifest.warn(format!("{}: {}", day_key(*date), reason));
    }

    let schema = SchemaConfig::new(cfg.metrics.clone(), cfg.include_bins);
    let mut table = SeriesTable::new();
    let mut usable_days = Vec::new();
    let mut total_records = 0u64;

    for file in &fetched.files {
        let day = day_key(file.date);
        match parse_daily(&day, &file.bytes, &schema) {
            Ok(parsed) => {
                for warning in &parsed.warnings {
                    logging::warn(
                        Domain::Parse,
                        "record_skipped",
                        obj(&[("day", v_str(&day)), ("reason", v_str(warning))]),
                    );
                    manifest.warn(format!("{}: {}", day, warning));
                }
                let count = parsed.records.len() as u64;
                manifest.record_day(file.date, &file.bytes, count);
                if count > 0 {
                    usable_days.push(file.date);
                }
                total_records += count;
                logging::info(
                    Domain::Parse,
                    "day_parsed",
                    obj(&[("day", v_str(&day)), ("records", v_num(count as f64))]),
                );
                table.merge_batch(parsed.records);
            }
            Err(err) => {
                logging::error(
                    Domain::Parse,
                    "day_malformed",
                    obj(&[("day", v_str(&day)), ("reason", v_str(&err.reason))]),
                );
                manifest.record_bad_file(file.date, &err.reason);
            }
        }
    }

    if table.is_empty() {
        bail!(
            "no measurement records parsed from {} fetched day(s); nothing to display",
            fetched.files.len()
        );
    }

    // A gap is any requested day that contributed no records, whether it was
    // absent, failed to transfer, was malformed, or was simply empty.
    manifest.finalize_gaps(&dates, &usable_days);

    logging::info(
        Domain::Series,
        "table_built",
        obj(&[
            ("series", v_num(table.len() as f64)),
            ("points", v_num(table.point_count() as f64)),
        ]),
    );

    let mut trends = Vec::with_capacity(table.len());
    for (key, _) in table.iter() {
        let points = table.points(key).unwrap_or_default();
        match fit_series(&points) {
            Ok(fit) => {
                logging::debug(
                    Domain::Trend,
                    "series_fitted",
                    obj(&[
                        ("lab_id", v_str(&key.lab_id)),
                        ("metric", v_str(&key.metric_name)),
                        ("slope", v_num(fit.slope)),
                        ("r_value", v_num(fit.r_value)),
                    ]),
                );
                trends.push((key.clone(), Some(fit)));
            }
            Err(err) => {
                // Shown as raw data only.
                logging::warn(
                    Domain::Trend,
                    "series_unfittable",
                    obj(&[
                        ("lab_id", v_str(&key.lab_id)),
                        ("metric", v_str(&key.metric_name)),
                        ("points", v_num(err.points as f64)),
                    ]),
                );
                trends.push((key.clone(), None));
            }
        }
    }

    let report = manifest.report(total_records);
    Ok(PipelineOutput { table, trends, manifest, report })
}
