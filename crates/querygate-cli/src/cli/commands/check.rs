use super::{exit_codes, load_config};
use crate::cli::args::CheckArgs;
use anyhow::Context;
use async_trait::async_trait;
use querygate_core::budget::QueryBudgetEvaluator;
use querygate_core::catalog::load_catalog;
use querygate_core::model::QueryCandidate;
use querygate_core::pipeline::{apply_budget, govern, PlanSource};
use querygate_core::sql::{Allowlist, SqlValidator};
use querygate_core::GateResult;
use serde_json::Value;

/// Planner output captured ahead of time.
struct RecordedPlan(Value);

#[async_trait]
impl PlanSource for RecordedPlan {
    async fn explain(&self, _sql: &str) -> GateResult<Value> {
        Ok(self.0.clone())
    }
}

pub async fn run(args: CheckArgs) -> anyhow::Result<i32> {
    let cfg = load_config(&args.config)?;
    let sql = read_sql(&args.sql)?;
    let objects = load_catalog(&args.catalog, &cfg.validator.default_schema)?;
    let max_rows = args.max_rows.unwrap_or(cfg.validator.max_rows);

    let validator = SqlValidator::new(cfg.validator.default_schema.clone(), max_rows);
    let mut candidate = govern(&sql, &Allowlist::new(&objects), &validator);

    let budget = match &args.plan {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read plan {}", path.display()))?;
            let explain: Value = serde_json::from_str(&raw)
                .with_context(|| format!("plan {} is not JSON", path.display()))?;
            let evaluator = QueryBudgetEvaluator::new(cfg.budget.budget());
            apply_budget(&mut candidate, &evaluator, Some(&RecordedPlan(explain))).await
        }
        None => None,
    };

    let accepted = candidate.accepted_sql().is_some();
    if args.format == "text" {
        print_text(&candidate);
    } else {
        let out = serde_json::json!({
            "accepted": accepted,
            "candidate": candidate,
            "budget": budget,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    }

    Ok(if accepted {
        exit_codes::OK
    } else {
        exit_codes::REJECTED
    })
}

pub(crate) fn print_text(candidate: &QueryCandidate) {
    match candidate.accepted_sql() {
        Some(sql) => {
            println!("ACCEPTED");
            println!("{}", sql);
        }
        None => {
            println!("REJECTED");
            for e in &candidate.errors {
                println!("- {}", e);
            }
        }
    }
}

/// `@path` reads the statement from a file; anything else is the statement.
fn read_sql(arg: &str) -> anyhow::Result<String> {
    match arg.strip_prefix('@') {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read SQL file {}", path)),
        None => Ok(arg.to_string()),
    }
}
