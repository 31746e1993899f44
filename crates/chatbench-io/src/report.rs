// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::collections::BTreeMap;
use std::path::Path;

use chatbench_core::{AggregatedReport, Describe};
use serde::Serialize;

/// The `{mean, p50, p75, p95, p99, max, min}` shape, in the field order the
/// output artifact is expected to carry.
#[derive(Debug, Serialize)]
pub struct DescribeReport {
    pub mean: f64,
    pub p50: f64,
    pub p75: f64,
    pub p95: f64,
    pub p99: f64,
    pub max: f64,
    pub min: f64,
}

impl From<Describe> for DescribeReport {
    fn from(d: Describe) -> Self {
        Self { mean: d.mean, p50: d.p50, p75: d.p75, p95: d.p95, p99: d.p99, max: d.max, min: d.min }
    }
}

/// The output artifact: `{E2E, TTFT, ITL, "Output tokens", "Status codes"}`.
/// Field declaration order here fixes the serialized key order, since
/// `serde_json` preserves struct field order by default.
#[derive(Debug, Serialize)]
pub struct OutputReport {
    #[serde(rename = "E2E")]
    pub e2e: DescribeReport,
    #[serde(rename = "TTFT")]
    pub ttft: DescribeReport,
    #[serde(rename = "ITL")]
    pub itl: DescribeReport,
    #[serde(rename = "Output tokens")]
    pub output_tokens: DescribeReport,
    #[serde(rename = "Status codes")]
    pub status_codes: BTreeMap<String, usize>,
}

impl From<AggregatedReport> for OutputReport {
    fn from(r: AggregatedReport) -> Self {
        Self {
            e2e: r.e2e.into(),
            ttft: r.ttft.into(),
            itl: r.itl.into(),
            output_tokens: r.output_tokens.into(),
            status_codes: r.status_codes.into_iter().collect(),
        }
    }
}

/// Serializes `report` as pretty-printed JSON and writes it to `path` with
/// stable key ordering.
pub fn save_to_json(report: &OutputReport, path: impl AsRef<Path>) -> std::io::Result<()> {
    let json = serde_json::to_string_pretty(report).expect("OutputReport always serializes");
    std::fs::write(path, json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatbench_core::aggregate;
    use chatbench_core::RequestStatistics;

    fn rec(e2e: f64, ttft: Option<f64>, token_num: Option<u32>, status: u16) -> RequestStatistics {
        RequestStatistics { e2e, ttft, itl: None, token_num, status_code: Some(status) }
    }

    #[test]
    fn key_order_matches_the_documented_schema() {
        let records = vec![rec(1.0, Some(0.4), Some(3), 200)];
        let report: OutputReport = aggregate(&records).into();
        let value = serde_json::to_value(&report).unwrap();
        let keys: Vec<&String> = value.as_object().unwrap().keys().collect();
        assert_eq!(keys, vec!["E2E", "TTFT", "ITL", "Output tokens", "Status codes"]);
    }

    #[test]
    fn round_trips_through_json_parse() {
        let records = vec![rec(1.0, Some(0.4), Some(3), 200), rec(2.0, None, None, 429)];
        let report: OutputReport = aggregate(&records).into();
        let serialized = serde_json::to_string_pretty(&report).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&serialized).unwrap();
        assert_eq!(parsed["Status codes"]["429"], 1);
        assert!(parsed["E2E"]["mean"].is_number());
    }

    #[test]
    fn save_to_json_writes_a_readable_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");
        let records = vec![rec(1.0, Some(0.4), Some(3), 200)];
        let report: OutputReport = aggregate(&records).into();
        save_to_json(&report, &path).unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("\"E2E\""));
    }
}
