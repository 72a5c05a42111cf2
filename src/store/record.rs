use std::collections::BTreeMap;

use chrono::NaiveDate;
use indexmap::IndexMap;
use serde_json::Value;

/// One stored performance-test observation.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultRow {
    pub date: String,
    pub build: String,
    pub test_name: String,
    pub bandwidth: f64,
    pub iops: f64,
    pub latency: f64,
    pub cluster: String,
    pub uniq: String,
}

/// Per-uniq record synthesized from result rows.
///
/// Key order is a presentation contract: the scalar fields first, in exactly
/// `date, build, cluster, uniq`, then every metric key lexicographically.
pub type ResultRecord = IndexMap<String, Value>;

/// Reshapes result rows into one ordered record per uniq id, preserving the
/// order in which uniq ids first appear.
///
/// Metric rule: a test whose name contains "4K" contributes its iops value;
/// every other test contributes its bandwidth value.
pub fn to_records(rows: &[ResultRow]) -> Vec<ResultRecord> {
    let mut groups: IndexMap<&str, Vec<&ResultRow>> = IndexMap::new();
    for row in rows {
        groups.entry(row.uniq.as_str()).or_default().push(row);
    }

    groups
        .into_iter()
        .map(|(_, group)| record_for_group(&group))
        .collect()
}

fn record_for_group(rows: &[&ResultRow]) -> ResultRecord {
    let mut record = ResultRecord::new();

    if let Some(first) = rows.first() {
        record.insert("date".to_string(), Value::from(format_date(&first.date)));
        record.insert("build".to_string(), Value::from(first.build.clone()));
        record.insert("cluster".to_string(), Value::from(first.cluster.clone()));
        record.insert("uniq".to_string(), Value::from(first.uniq.clone()));
    }

    let mut metrics: BTreeMap<String, f64> = BTreeMap::new();
    for row in rows {
        let value = if row.test_name.contains("4K") {
            row.iops
        } else {
            row.bandwidth
        };
        metrics.insert(row.test_name.clone(), value);
    }

    for (name, value) in metrics {
        record.insert(name, Value::from(value));
    }

    record
}

/// Renders an ISO `YYYY-MM-DD` date as "Month DD, YYYY". Dates stored in any
/// other shape pass through unchanged rather than failing the record.
fn format_date(date: &str) -> String {
    match NaiveDate::parse_from_str(date, "%Y-%m-%d") {
        Ok(parsed) => parsed.format("%B %d, %Y").to_string(),
        Err(_) => date.to_string(),
    }
}
