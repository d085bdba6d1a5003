//! Daily file parsing.
//!
//! A daily document is a JSON object keyed by unix timestamp. Each timestamp
//! maps to a list of single-key lab objects, each lab to a list of single-key
//! node objects, and each node to its measurement groups:
//!
//! ```json
//! { "1676923200": [ { "ithaca": [ { "node-01": {
//!     "instantaneous":      { "power": -13.2, "qfactor": 11.4, ... },
//!     "fifteen_minute_bin": { "power": { "low": -13.4, "median": -13.2, "high": -13.0 }, ... }
//! } } ] } ] }
//! ```
//!
//! Metric field names are configuration; the schema is owned by the data
//! host, not by this crate. A record missing a metric is omitted, never
//! fatal. Structural violations fail the whole file with
//! [`MalformedDataError`].

use serde::Deserialize;
use serde_json::Value;

use crate::error::MalformedDataError;

/// One flat measurement, the unit everything downstream consumes.
#[derive(Debug, Clone, PartialEq)]
pub struct MeasurementRecord {
    /// Unix seconds.
    pub timestamp: u64,
    /// Composite site id, `"<lab>/<node>"`.
    pub lab_id: String,
    pub metric_name: String,
    pub value: f64,
}

/// Low/median/high triple from a fifteen-minute bin.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct RangeSample {
    pub low: f64,
    pub median: f64,
    pub high: f64,
}

/// Which fields to pull out of each node object.
#[derive(Debug, Clone)]
pub struct SchemaConfig {
    pub metrics: Vec<String>,
    pub include_bins: bool,
}

impl SchemaConfig {
    pub fn new(metrics: Vec<String>, include_bins: bool) -> Self {
        Self { metrics, include_bins }
    }
}

/// Everything extracted from one daily file.
#[derive(Debug, Default)]
pub struct ParsedDay {
    pub records: Vec<MeasurementRecord>,
    pub warnings: Vec<String>,
}

/// Parse one daily file. `day` is the calendar key, used only for error
/// context. An empty document yields zero records.
pub fn parse_daily(
    day: &str,
    raw: &[u8],
    schema: &SchemaConfig,
) -> Result<ParsedDay, MalformedDataError> {
    let text = std::str::from_utf8(raw)
        .map_err(|e| MalformedDataError::new(day, format!("not utf-8: {}", e)))?;
    if text.trim().is_empty() {
        return Ok(ParsedDay::default());
    }

    let root: Value = serde_json::from_str(text)
        .map_err(|e| MalformedDataError::new(day, format!("invalid json: {}", e)))?;
    let by_timestamp = root
        .as_object()
        .ok_or_else(|| MalformedDataError::new(day, "top level is not an object"))?;

    let mut out = ParsedDay::default();

    for (ts_key, labs) in by_timestamp {
        // Timestamp keys arrive as decimal strings, occasionally fractional.
        let timestamp = match ts_key.trim().parse::<f64>() {
            Ok(v) if v >= 0.0 => v as u64,
            _ => {
                out.warnings.push(format!("unparsable timestamp key {:?}", ts_key));
                continue;
            }
        };

        let labs = labs.as_array().ok_or_else(|| {
            MalformedDataError::new(day, format!("timestamp {} does not map to a lab list", ts_key))
        })?;

        for lab in labs {
            let (lab_name, nodes) = single_key(lab)
                .ok_or_else(|| MalformedDataError::new(day, "lab entry is not a single-key object"))?;
            let nodes = nodes.as_array().ok_or_else(|| {
                MalformedDataError::new(day, format!("lab {} does not map to a node list", lab_name))
            })?;

            for node in nodes {
                let (node_name, body) = single_key(node).ok_or_else(|| {
                    MalformedDataError::new(day, "node entry is not a single-key object")
                })?;
                let body = body.as_object().ok_or_else(|| {
                    MalformedDataError::new(day, format!("node {} body is not an object", node_name))
                })?;

                let lab_id = format!("{}/{}", lab_name, node_name);

                let instantaneous = body
                    .get("instantaneous")
                    .and_then(Value::as_object)
                    .ok_or_else(|| {
                        MalformedDataError::new(
                            day,
                            format!("node {} has no instantaneous map", lab_id),
                        )
                    })?;

                for metric in &schema.metrics {
                    match instantaneous.get(metric) {
                        Some(v) => match v.as_f64() {
                            Some(value) => out.records.push(MeasurementRecord {
                                timestamp,
                                lab_id: lab_id.clone(),
                                metric_name: metric.clone(),
                                value,
                            }),
                            None => out.warnings.push(format!(
                                "{} {} {}: non-numeric value",
                                ts_key, lab_id, metric
                            )),
                        },
                        // Missing metric: omit the record, keep the file.
                        None => {}
                    }
                }

                if schema.include_bins {
                    match body.get("fifteen_minute_bin").and_then(Value::as_object) {
                        Some(bins) => {
                            for metric in &schema.metrics {
                                let Some(bin) = bins.get(metric) else { continue };
                                match serde_json::from_value::<RangeSample>(bin.clone()) {
                                    Ok(range) => {
                                        for (suffix, value) in [
                                            ("15m.low", range.low),
                                            ("15m.median", range.median),
                                            ("15m.high", range.high),
                                        ] {
                                            out.records.push(MeasurementRecord {
                                                timestamp,
                                                lab_id: lab_id.clone(),
                                                metric_name: format!("{}.{}", metric, suffix),
                                                value,
                                            });
                                        }
                                    }
                                    Err(_) => out.warnings.push(format!(
                                        "{} {} {}: bin is not a low/median/high triple",
                                        ts_key, lab_id, metric
                                    )),
                                }
                            }
                        }
                        None => out
                            .warnings
                            .push(format!("{} {}: no fifteen_minute_bin map", ts_key, lab_id)),
                    }
                }
            }
        }
    }

    Ok(out)
}

fn single_key(value: &Value) -> Option<(&String, &Value)> {
    let map = value.as_object()?;
    if map.len() != 1 {
        return None;
    }
    map.iter().next()
}
