use crate::bench::summary::Summary;
use crate::model::CaseResult;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Machine-readable record of one benchmark run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkReport {
    pub run_date: String,
    pub dataset_file: String,
    pub data_source_id: String,
    pub provider: Option<String>,
    pub model: Option<String>,
    pub summary: Summary,
    pub observability: serde_json::Value,
    pub cases: Vec<CaseResult>,
}

impl BenchmarkReport {
    /// Cases that missed, in dataset order.
    pub fn failures(&self) -> impl Iterator<Item = &CaseResult> {
        self.cases.iter().filter(|c| !c.correct)
    }
}

pub fn write_json(report: &BenchmarkReport, out: &Path) -> anyhow::Result<()> {
    let body = serde_json::to_string_pretty(report)?;
    std::fs::write(out, body + "\n")?;
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::bench::summary::summarize;
    use crate::config::GateThresholds;

    pub(crate) fn case(id: &str, correct: bool, latency: Option<u64>) -> CaseResult {
        CaseResult {
            id: id.into(),
            question: format!("question {id}"),
            run_status: 200,
            error: None,
            correct,
            mismatch_reason: (!correct).then(|| "row_count_mismatch: generated=1 oracle=2".into()),
            critical_safety_violation: false,
            e2e_latency_ms: latency,
            generated_sql: Some("SELECT 1 LIMIT 1;".into()),
            provider: Some("openai".into()),
            row_count_generated: Some(1),
            row_count_oracle: Some(if correct { 1 } else { 2 }),
        }
    }

    pub(crate) fn sample_report() -> BenchmarkReport {
        let cases = vec![case("c1", true, Some(120)), case("c2", false, Some(340))];
        BenchmarkReport {
            run_date: "2026-03-04T05:06:07.000Z".into(),
            dataset_file: "bench/cases.json".into(),
            data_source_id: "ds-1".into(),
            provider: None,
            model: Some("gpt-4.1-mini".into()),
            summary: summarize(&cases, &GateThresholds::default()),
            observability: serde_json::json!({"runs": 2}),
            cases,
        }
    }

    #[test]
    fn failures_keep_dataset_order() {
        let mut r = sample_report();
        r.cases.push(case("c3", false, None));
        let ids: Vec<&str> = r.failures().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["c2", "c3"]);
    }

    #[test]
    fn report_fields_are_snake_case() {
        let v = serde_json::to_value(sample_report()).unwrap();
        assert_eq!(v["data_source_id"], "ds-1");
        assert!(v["provider"].is_null());
        assert_eq!(v["summary"]["release_gates"]["all_passed"], false);
        assert_eq!(v["cases"][1]["mismatch_reason"], "row_count_mismatch: generated=1 oracle=2");
    }
}
