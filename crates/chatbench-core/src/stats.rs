// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::collections::HashMap;

/// A single completed request's measurements.
///
/// `status_code` is `None` only for records that never even attempted
/// dispatch (not produced by this harness today, but kept `Option` so
/// `status_breakdown` can report an "unknown" bucket).
#[derive(Debug, Clone)]
pub struct RequestStatistics {
    pub e2e: f64,
    pub ttft: Option<f64>,
    pub itl: Option<Vec<f64>>,
    pub token_num: Option<u32>,
    pub status_code: Option<u16>,
}

/// `{mean, p50, p75, p95, p99, max, min}` over a sequence of floats.
///
/// All fields are NaN for an empty input sequence.
#[derive(Debug, Clone, Copy)]
pub struct Describe {
    pub mean: f64,
    pub p50: f64,
    pub p75: f64,
    pub p95: f64,
    pub p99: f64,
    pub max: f64,
    pub min: f64,
}

impl Describe {
    fn nan() -> Self {
        Self { mean: f64::NAN, p50: f64::NAN, p75: f64::NAN, p95: f64::NAN, p99: f64::NAN, max: f64::NAN, min: f64::NAN }
    }
}

/// `{E2E, TTFT, ITL, Output tokens}` describes plus a status-code breakdown.
#[derive(Debug, Clone)]
pub struct AggregatedReport {
    pub e2e: Describe,
    pub ttft: Describe,
    pub itl: Describe,
    pub output_tokens: Describe,
    pub status_codes: HashMap<String, usize>,
}

/// Records with `200 <= status_code < 300`.
pub fn successful(records: &[RequestStatistics]) -> Vec<&RequestStatistics> {
    records
        .iter()
        .filter(|r| matches!(r.status_code, Some(code) if (200..300).contains(&code)))
        .collect()
}

/// Percentiles use the standard linear-interpolation definition over the
/// sorted sequence, matching a typical numeric percentile routine on a
/// sorted array with fractional ranks.
pub fn describe(values: &[f64]) -> Describe {
    if values.is_empty() {
        return Describe::nan();
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());

    let mean = sorted.iter().sum::<f64>() / sorted.len() as f64;
    let percentile = |p: f64| -> f64 {
        if sorted.len() == 1 {
            return sorted[0];
        }
        let rank = p / 100.0 * (sorted.len() - 1) as f64;
        let lower = rank.floor() as usize;
        let upper = rank.ceil() as usize;
        let frac = rank - lower as f64;
        sorted[lower] + (sorted[upper] - sorted[lower]) * frac
    };

    Describe {
        mean,
        p50: percentile(50.0),
        p75: percentile(75.0),
        p95: percentile(95.0),
        p99: percentile(99.0),
        max: *sorted.last().unwrap(),
        min: *sorted.first().unwrap(),
    }
}

/// For each successful record with `ttft` and `token_num` present and
/// `token_num > 1`, emits `(e2e - ttft) / (token_num - 1)`. Other records are
/// omitted — this is a per-record average, not a flattening of raw
/// inter-token deltas (see DESIGN.md "Open Question decisions").
pub fn derive_itl(successful: &[&RequestStatistics]) -> Vec<f64> {
    successful
        .iter()
        .filter_map(|s| {
            let ttft = s.ttft?;
            let token_num = s.token_num?;
            if token_num > 1 {
                Some((s.e2e - ttft) / (token_num - 1) as f64)
            } else {
                None
            }
        })
        .collect()
}

/// Stringified status code (or `"unknown"` when absent) to count, over *all*
/// records — both success and failure contribute.
pub fn status_breakdown(records: &[RequestStatistics]) -> HashMap<String, usize> {
    let mut counts = HashMap::new();
    for r in records {
        let key = match r.status_code {
            Some(code) => code.to_string(),
            None => "unknown".to_string(),
        };
        *counts.entry(key).or_insert(0) += 1;
    }
    counts
}

/// Builds the full aggregated report from a run's collected records.
pub fn aggregate(records: &[RequestStatistics]) -> AggregatedReport {
    let succ = successful(records);

    let e2e_vals: Vec<f64> = succ.iter().map(|s| s.e2e).collect();
    let ttft_vals: Vec<f64> = succ.iter().filter_map(|s| s.ttft).collect();
    let itl_vals = derive_itl(&succ);
    let token_vals: Vec<f64> = succ.iter().filter_map(|s| s.token_num.map(|t| t as f64)).collect();

    AggregatedReport {
        e2e: describe(&e2e_vals),
        ttft: describe(&ttft_vals),
        itl: describe(&itl_vals),
        output_tokens: describe(&token_vals),
        status_codes: status_breakdown(records),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(e2e: f64, ttft: Option<f64>, token_num: Option<u32>, status: u16) -> RequestStatistics {
        RequestStatistics { e2e, ttft, itl: None, token_num, status_code: Some(status) }
    }

    #[test]
    fn describe_on_empty_sequence_is_all_nan() {
        let d = describe(&[]);
        assert!(d.mean.is_nan());
        assert!(d.p50.is_nan());
        assert!(d.max.is_nan());
        assert!(d.min.is_nan());
    }

    #[test]
    fn describe_is_permutation_invariant() {
        let a = describe(&[3.0, 1.0, 4.0, 1.0, 5.0]);
        let b = describe(&[5.0, 4.0, 3.0, 1.0, 1.0]);
        assert_eq!(a.mean, b.mean);
        assert_eq!(a.p50, b.p50);
        assert_eq!(a.p95, b.p95);
    }

    #[test]
    fn describe_single_value() {
        let d = describe(&[7.0]);
        assert_eq!(d.mean, 7.0);
        assert_eq!(d.p50, 7.0);
        assert_eq!(d.max, 7.0);
        assert_eq!(d.min, 7.0);
    }

    #[test]
    fn status_breakdown_sums_to_record_count() {
        let records = vec![rec(1.0, Some(0.1), Some(3), 200), rec(2.0, None, None, 400), rec(3.0, None, None, 400)];
        let breakdown = status_breakdown(&records);
        let total: usize = breakdown.values().sum();
        assert_eq!(total, records.len());
        assert_eq!(breakdown["400"], 2);
        assert_eq!(breakdown["200"], 1);
    }

    #[test]
    fn status_breakdown_uses_unknown_for_absent_code() {
        let mut r = rec(1.0, None, None, 200);
        r.status_code = None;
        let breakdown = status_breakdown(std::slice::from_ref(&r));
        assert_eq!(breakdown["unknown"], 1);
    }

    #[test]
    fn derive_itl_omits_non_streaming_and_single_token_records() {
        let records = vec![
            rec(1.0, Some(0.4), Some(3), 200),   // included
            rec(2.0, None, Some(3), 200),        // no ttft -> omitted (non-streaming)
            rec(3.0, Some(0.1), Some(1), 200),   // token_num == 1 -> omitted
            rec(4.0, Some(0.2), None, 200),      // no token_num -> omitted
        ];
        let succ = successful(&records);
        let itl = derive_itl(&succ);
        assert_eq!(itl.len(), 1);
        assert!((itl[0] - (1.0 - 0.4) / 2.0).abs() < 1e-9);
    }

    #[test]
    fn derived_itl_is_non_negative_for_well_formed_records() {
        let r = rec(5.0, Some(1.0), Some(5), 200);
        let succ = successful(std::slice::from_ref(&r));
        let itl = derive_itl(&succ);
        assert!(itl[0] >= 0.0);
    }

    #[test]
    fn aggregation_matches_a_hand_worked_example() {
        let records = vec![rec(1.0, Some(0.4), Some(3), 200), rec(2.0, Some(0.7), Some(3), 201), rec(10.0, None, None, 400)];
        let report = aggregate(&records);
        assert!((report.e2e.mean - 1.5).abs() < 1e-9);
        assert!((report.ttft.mean - 0.55).abs() < 1e-9);
        assert!((report.itl.mean - 0.475).abs() < 1e-9);
        assert_eq!(report.status_codes["200"], 1);
        assert_eq!(report.status_codes["201"], 1);
        assert_eq!(report.status_codes["400"], 1);
    }

    #[test]
    fn zero_successful_requests_yields_all_nan_with_accurate_breakdown() {
        let records = vec![rec(3.0, None, None, 500)];
        let report = aggregate(&records);
        assert!(report.e2e.mean.is_nan());
        assert!(report.ttft.mean.is_nan());
        assert!(report.itl.mean.is_nan());
        assert!(report.output_tokens.mean.is_nan());
        assert_eq!(report.status_codes["500"], 1);
    }
}
