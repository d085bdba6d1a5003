//! Aggregation of daily record batches into ordered time series.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::parse::MeasurementRecord;

/// Identity of one series on the dashboard.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct SeriesKey {
    pub lab_id: String,
    pub metric_name: String,
}

impl SeriesKey {
    pub fn new(lab_id: impl Into<String>, metric_name: impl Into<String>) -> Self {
        Self { lab_id: lab_id.into(), metric_name: metric_name.into() }
    }
}

/// All series for a run, keyed by (lab_id, metric_name).
///
/// The inner map keeps timestamps strictly increasing and unique; inserting
/// an existing (key, timestamp) overwrites, so the last write wins and
/// duplicate days can never double a point. Merge order does not matter.
#[derive(Debug, Default)]
pub struct SeriesTable {
    series: BTreeMap<SeriesKey, BTreeMap<u64, f64>>,
}

impl SeriesTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, record: MeasurementRecord) {
        self.series
            .entry(SeriesKey::new(record.lab_id, record.metric_name))
            .or_default()
            .insert(record.timestamp, record.value);
    }

    /// Merge one day's batch.
    pub fn merge_batch(&mut self, records: Vec<MeasurementRecord>) {
        for record in records {
            self.insert(record);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    /// Number of series.
    pub fn len(&self) -> usize {
        self.series.len()
    }

    /// Total points across all series.
    pub fn point_count(&self) -> usize {
        self.series.values().map(|s| s.len()).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&SeriesKey, &BTreeMap<u64, f64>)> {
        self.series.iter()
    }

    /// Ordered (timestamp, value) pairs for one series.
    pub fn points(&self, key: &SeriesKey) -> Option<Vec<(u64, f64)>> {
        self.series.get(key).map(|s| s.iter().map(|(&ts, &v)| (ts, v)).collect())
    }

    /// Lab inventory: lab name to its sorted node names, split back out of
    /// the composite `"<lab>/<node>"` id.
    pub fn labs(&self) -> BTreeMap<String, BTreeSet<String>> {
        let mut out: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for key in self.series.keys() {
            match key.lab_id.split_once('/') {
                Some((lab, node)) => {
                    out.entry(lab.to_string()).or_default().insert(node.to_string());
                }
                None => {
                    out.entry(key.lab_id.clone()).or_default();
                }
            }
        }
        out
    }

    /// Sorted metric names present in the table.
    pub fn metric_names(&self) -> BTreeSet<String> {
        self.series.keys().map(|k| k.metric_name.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(ts: u64, lab: &str, metric: &str, value: f64) -> MeasurementRecord {
        MeasurementRecord {
            timestamp: ts,
            lab_id: lab.to_string(),
            metric_name: metric.to_string(),
            value,
        }
    }

    #[test]
    fn points_come_back_ordered_and_unique() {
        let mut table = SeriesTable::new();
        table.merge_batch(vec![
            rec(300, "a/n1", "power", 3.0),
            rec(100, "a/n1", "power", 1.0),
            rec(200, "a/n1", "power", 2.0),
        ]);
        let pts = table.points(&SeriesKey::new("a/n1", "power")).unwrap();
        assert_eq!(pts, vec![(100, 1.0), (200, 2.0), (300, 3.0)]);
    }

    #[test]
    fn duplicate_timestamp_last_write_wins() {
        let mut table = SeriesTable::new();
        table.insert(rec(100, "a/n1", "power", 1.0));
        table.insert(rec(100, "a/n1", "power", 9.0));
        let pts = table.points(&SeriesKey::new("a/n1", "power")).unwrap();
        assert_eq!(pts, vec![(100, 9.0)]);
    }

    #[test]
    fn merge_is_order_independent() {
        let day1 = vec![rec(100, "a/n1", "power", 1.0), rec(100, "b/n1", "snr", 19.0)];
        let day2 = vec![rec(200, "a/n1", "power", 2.0)];
        let day3 = vec![rec(300, "a/n1", "power", 3.0)];

        let mut forward = SeriesTable::new();
        for batch in [day1.clone(), day2.clone(), day3.clone()] {
            forward.merge_batch(batch);
        }
        let mut backward = SeriesTable::new();
        for batch in [day3, day2, day1] {
            backward.merge_batch(batch);
        }

        let key = SeriesKey::new("a/n1", "power");
        assert_eq!(forward.points(&key), backward.points(&key));
        assert_eq!(forward.len(), backward.len());
    }

    #[test]
    fn lab_inventory_splits_composite_ids() {
        let mut table = SeriesTable::new();
        table.insert(rec(1, "ithaca/node-01", "power", 0.0));
        table.insert(rec(1, "ithaca/node-02", "power", 0.0));
        table.insert(rec(1, "rochester/node-01", "snr", 0.0));
        let labs = table.labs();
        assert_eq!(labs.len(), 2);
        assert_eq!(labs["ithaca"].len(), 2);
        assert!(labs["rochester"].contains("node-01"));
    }

    #[test]
    fn missing_days_leave_gaps_not_duplicates() {
        let mut table = SeriesTable::new();
        table.merge_batch(vec![rec(86400, "a/n1", "power", 1.0)]);
        // day 2 absent
        table.merge_batch(vec![rec(3 * 86400, "a/n1", "power", 3.0)]);
        let pts = table.points(&SeriesKey::new("a/n1", "power")).unwrap();
        assert_eq!(pts.len(), 2);
        assert!(pts.windows(2).all(|w| w[0].0 < w[1].0));
    }
}
