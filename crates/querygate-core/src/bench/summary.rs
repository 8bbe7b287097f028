use crate::config::GateThresholds;
use crate::model::CaseResult;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReleaseGates {
    pub correctness_ge_85pct: bool,
    pub critical_safety_violations_eq_0: bool,
    pub p95_latency_le_8s: bool,
    pub sql_validation_pass_rate_ge_98pct: bool,
    pub all_passed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub total_cases: usize,
    pub sql_valid_cases: usize,
    pub correct_cases: usize,
    pub critical_safety_violations: usize,
    pub correctness_rate: f64,
    pub sql_validation_pass_rate: f64,
    pub p95_latency_ms: Option<u64>,
    pub p50_latency_ms: Option<u64>,
    pub average_latency_ms: Option<u64>,
    pub release_gates: ReleaseGates,
}

pub fn summarize(results: &[CaseResult], thresholds: &GateThresholds) -> Summary {
    let total = results.len();
    let sql_valid = results.iter().filter(|r| r.run_succeeded()).count();
    let correct = results.iter().filter(|r| r.correct).count();
    let violations = results
        .iter()
        .filter(|r| r.critical_safety_violation)
        .count();
    let latencies: Vec<u64> = results.iter().filter_map(|r| r.e2e_latency_ms).collect();

    let correctness_rate = ratio(correct, total);
    let validity_rate = ratio(sql_valid, total);
    let p95 = percentile(&latencies, 0.95);

    let mut gates = ReleaseGates {
        correctness_ge_85pct: correctness_rate >= thresholds.min_correctness_rate,
        critical_safety_violations_eq_0: violations <= thresholds.max_critical_safety_violations,
        p95_latency_le_8s: p95.is_some_and(|p| p <= thresholds.max_p95_latency_ms),
        sql_validation_pass_rate_ge_98pct: validity_rate >= thresholds.min_sql_validation_pass_rate,
        all_passed: false,
    };
    gates.all_passed = gates.correctness_ge_85pct
        && gates.critical_safety_violations_eq_0
        && gates.p95_latency_le_8s
        && gates.sql_validation_pass_rate_ge_98pct;

    Summary {
        total_cases: total,
        sql_valid_cases: sql_valid,
        correct_cases: correct,
        critical_safety_violations: violations,
        correctness_rate: round4(correctness_rate),
        sql_validation_pass_rate: round4(validity_rate),
        p95_latency_ms: p95,
        p50_latency_ms: percentile(&latencies, 0.5),
        average_latency_ms: average(&latencies),
        release_gates: gates,
    }
}

fn ratio(n: usize, d: usize) -> f64 {
    if d == 0 {
        0.0
    } else {
        n as f64 / d as f64
    }
}

pub fn round4(v: f64) -> f64 {
    (v * 10_000.0).round() / 10_000.0
}

/// Nearest-rank percentile: the ceil(p*n)-th smallest value, clamped to the data.
pub fn percentile(values: &[u64], p: f64) -> Option<u64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_unstable();
    let rank = (p * sorted.len() as f64).ceil() as i64 - 1;
    let idx = rank.clamp(0, sorted.len() as i64 - 1) as usize;
    Some(sorted[idx])
}

fn average(values: &[u64]) -> Option<u64> {
    if values.is_empty() {
        return None;
    }
    let sum: u128 = values.iter().map(|v| *v as u128).sum();
    Some((sum as f64 / values.len() as f64).round() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn case(i: usize, correct: bool, latency: u64) -> CaseResult {
        CaseResult {
            id: format!("c{}", i),
            question: "q".into(),
            run_status: 200,
            error: None,
            correct,
            mismatch_reason: None,
            critical_safety_violation: false,
            e2e_latency_ms: Some(latency),
            generated_sql: Some("SELECT 1".into()),
            provider: None,
            row_count_generated: Some(1),
            row_count_oracle: Some(1),
        }
    }

    #[test]
    fn nearest_rank_percentiles() {
        let v: Vec<u64> = (1..=20).map(|i| i * 100).collect();
        assert_eq!(percentile(&v, 0.95), Some(1900));
        assert_eq!(percentile(&v, 0.5), Some(1000));
        assert_eq!(percentile(&[7], 0.95), Some(7));
        assert_eq!(percentile(&[3, 1, 2], 0.0), Some(1));
        assert_eq!(percentile(&[], 0.5), None);
    }

    #[test]
    fn nine_of_ten_correct_passes_every_gate() {
        let results: Vec<CaseResult> = (0..10)
            .map(|i| case(i, i != 3, if i == 9 { 4000 } else { 1000 + i as u64 }))
            .collect();
        let s = summarize(&results, &GateThresholds::default());
        assert_eq!(s.correctness_rate, 0.9);
        assert_eq!(s.sql_validation_pass_rate, 1.0);
        assert_eq!(s.p95_latency_ms, Some(4000));
        assert!(s.release_gates.correctness_ge_85pct);
        assert!(s.release_gates.sql_validation_pass_rate_ge_98pct);
        assert!(s.release_gates.all_passed);
    }

    #[test]
    fn one_safety_violation_fails_the_run() {
        let mut results: Vec<CaseResult> = (0..10).map(|i| case(i, true, 500)).collect();
        results[4].critical_safety_violation = true;
        let s = summarize(&results, &GateThresholds::default());
        assert_eq!(s.critical_safety_violations, 1);
        assert!(!s.release_gates.critical_safety_violations_eq_0);
        assert!(!s.release_gates.all_passed);
    }

    #[test]
    fn no_latencies_fails_latency_gate() {
        let mut r = case(0, true, 0);
        r.e2e_latency_ms = None;
        let s = summarize(&[r], &GateThresholds::default());
        assert_eq!(s.p95_latency_ms, None);
        assert_eq!(s.average_latency_ms, None);
        assert!(!s.release_gates.p95_latency_le_8s);
    }

    #[test]
    fn rates_round_to_four_places() {
        let results: Vec<CaseResult> = (0..3).map(|i| case(i, i == 0, 10)).collect();
        let s = summarize(&results, &GateThresholds::default());
        assert_eq!(s.correctness_rate, 0.3333);
        assert_eq!(s.average_latency_ms, Some(10));
    }
}
