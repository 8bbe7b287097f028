use super::json::BenchmarkReport;

const TOP_FAILURES: usize = 10;

pub fn render_markdown(report: &BenchmarkReport) -> String {
    let s = &report.summary;
    let g = &s.release_gates;

    let mut lines = vec![
        "# MVP Benchmark Report".to_string(),
        String::new(),
        format!("- Run date: {}", report.run_date),
        format!("- Dataset: {}", report.dataset_file),
        format!("- Cases executed: {}", s.total_cases),
        format!("- Data source id: {}", report.data_source_id),
        format!("- Provider override: {}", or_none(report.provider.as_deref())),
        format!("- Model override: {}", or_none(report.model.as_deref())),
        String::new(),
        "## Results".into(),
        format!("- Correctness: {:.2}%", s.correctness_rate * 100.0),
        format!(
            "- SQL validation pass rate: {:.2}%",
            s.sql_validation_pass_rate * 100.0
        ),
        format!("- Critical safety violations: {}", s.critical_safety_violations),
        format!("- P95 latency: {}", millis(s.p95_latency_ms)),
        format!("- P50 latency: {}", millis(s.p50_latency_ms)),
        format!("- Average latency: {}", millis(s.average_latency_ms)),
        String::new(),
        "## Release Gates".into(),
        format!("- Correctness >= 85%: {}", mark(g.correctness_ge_85pct)),
        format!(
            "- Critical safety violations = 0: {}",
            mark(g.critical_safety_violations_eq_0)
        ),
        format!("- P95 latency <= 8s: {}", mark(g.p95_latency_le_8s)),
        format!(
            "- SQL validation pass rate >= 98%: {}",
            mark(g.sql_validation_pass_rate_ge_98pct)
        ),
        format!("- All gates passed: {}", mark(g.all_passed)),
        String::new(),
        "## Observability Snapshot".into(),
    ];

    match &report.observability {
        serde_json::Value::Null => lines.push("- unavailable".into()),
        snapshot => {
            let pretty = serde_json::to_string_pretty(snapshot).unwrap_or_default();
            lines.push(format!("\n```json\n{}\n```", pretty));
        }
    }

    lines.push(String::new());
    lines.push("## Top Failures".into());
    let failures: Vec<String> = report
        .failures()
        .take(TOP_FAILURES)
        .map(|c| {
            let why = c
                .mismatch_reason
                .as_deref()
                .or(c.error.as_deref())
                .filter(|s| !s.is_empty())
                .unwrap_or("incorrect");
            format!("- {}: {}", c.id, why)
        })
        .collect();
    if failures.is_empty() {
        lines.push("- none".into());
    } else {
        lines.extend(failures);
    }

    let mut out = lines.join("\n");
    out.push('\n');
    out
}

fn mark(ok: bool) -> &'static str {
    if ok {
        "PASS"
    } else {
        "FAIL"
    }
}

fn millis(v: Option<u64>) -> String {
    v.map(|ms| format!("{} ms", ms))
        .unwrap_or_else(|| "n/a".into())
}

fn or_none(v: Option<&str>) -> &str {
    v.filter(|s| !s.is_empty()).unwrap_or("(none)")
}
