use crate::model::BenchmarkCase;
use anyhow::Context;
use serde_json::Value;
use std::path::Path;

/// Load the labeled case list, dropping entries without an id, question or
/// oracle query. `max_cases == 0` keeps every valid case.
pub fn load_cases(path: &Path, max_cases: usize) -> anyhow::Result<Vec<BenchmarkCase>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read benchmark dataset {}", path.display()))?;
    parse_cases(&raw, max_cases)
        .with_context(|| format!("invalid benchmark dataset {}", path.display()))
}

pub fn parse_cases(raw: &str, max_cases: usize) -> anyhow::Result<Vec<BenchmarkCase>> {
    let parsed: Value = serde_json::from_str(raw).context("dataset is not valid JSON")?;
    let items = parsed
        .as_array()
        .filter(|a| !a.is_empty())
        .ok_or_else(|| anyhow::anyhow!("Benchmark dataset must be a non-empty JSON array"))?;

    let mut cases: Vec<BenchmarkCase> = Vec::new();
    let mut dropped = 0usize;
    for item in items {
        match case_from_value(item) {
            Some(c) => cases.push(c),
            None => dropped += 1,
        }
    }
    if dropped > 0 {
        tracing::warn!(event = "bench.cases_dropped", dropped);
    }
    if cases.is_empty() {
        anyhow::bail!("Benchmark dataset does not include valid cases");
    }
    if max_cases > 0 {
        cases.truncate(max_cases);
    }
    Ok(cases)
}

fn case_from_value(v: &Value) -> Option<BenchmarkCase> {
    let id = match v.get("id")? {
        Value::String(s) if !s.trim().is_empty() => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    let text = |key: &str| {
        v.get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
            .map(str::to_string)
    };
    Some(BenchmarkCase {
        id,
        nl_question: text("nl_question")?,
        oracle_sql: text("oracle_sql")?,
        result_assertion: text("result_assertion"),
    })
}
