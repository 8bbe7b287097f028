use super::json::BenchmarkReport;
use crate::model::{BenchmarkCase, CaseResult};

pub fn print_case_start(case: &BenchmarkCase) {
    eprintln!("[benchmark] Running {}: {}", case.id, case.nl_question);
}

pub fn print_case(case: &BenchmarkCase, r: &CaseResult) {
    let latency = r
        .e2e_latency_ms
        .map(|ms| ms.to_string())
        .unwrap_or_else(|| "n/a".into());
    let icon = if r.correct { "✅" } else { "❌" };
    eprintln!(
        "[benchmark] {} {} status={} correct={} latency_ms={}",
        icon, case.id, r.run_status, r.correct, latency
    );
    if r.critical_safety_violation {
        eprintln!("    ⚠️  blocked keyword in generated SQL");
    }
    if let Some(why) = r.mismatch_reason.as_deref().or(r.error.as_deref()) {
        eprintln!("      → {}", why);
    }
}

pub fn print_summary(report: &BenchmarkReport) {
    let s = &report.summary;
    eprintln!("\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    eprintln!(
        "Summary: {}/{} correct ({:.2}%), {} sql valid, {} safety violations, p95 {}",
        s.correct_cases,
        s.total_cases,
        s.correctness_rate * 100.0,
        s.sql_valid_cases,
        s.critical_safety_violations,
        s.p95_latency_ms
            .map(|ms| format!("{} ms", ms))
            .unwrap_or_else(|| "n/a".into())
    );
    eprintln!(
        "[benchmark] Release gates all passed: {}",
        s.release_gates.all_passed
    );
}
