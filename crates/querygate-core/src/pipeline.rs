//! Question to governed candidate: retrieve, generate, sanitize, validate, budget.

use crate::budget::{BudgetOutcome, QueryBudgetEvaluator};
use crate::context::PipelineContext;
use crate::errors::GateResult;
use crate::model::{GenerateInput, QueryCandidate, SchemaObject, ScoredDocument};
use crate::rag::retrieval::format_context;
use crate::sql::heuristic::quote_ident;
use crate::sql::{sanitize, Allowlist, HeuristicSqlGenerator, SqlValidator};
use async_trait::async_trait;
use serde::Serialize;

pub const HEURISTIC_PROVIDER: &str = "heuristic";

/// Produces planner output (e.g. `EXPLAIN (FORMAT JSON)` rows) for a statement.
#[async_trait]
pub trait PlanSource: Send + Sync {
    async fn explain(&self, sql: &str) -> GateResult<serde_json::Value>;
}

#[derive(Debug, Clone, Default)]
pub struct GenerateRequest {
    pub data_source_id: String,
    pub question: String,
    pub provider: Option<String>,
    pub model: Option<String>,
    pub max_rows: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GenerationOutcome {
    pub candidate: QueryCandidate,
    pub provider: String,
    pub model: Option<String>,
    /// Set when the model call failed and the heuristic answered instead.
    pub provider_error: Option<String>,
    pub context_document_ids: Vec<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub budget: Option<BudgetOutcome>,
}

impl GenerationOutcome {
    pub fn accepted(&self) -> bool {
        self.candidate.accepted_sql().is_some()
    }
}

/// Sanitize and validate raw text into a candidate; never executes anything.
pub fn govern(raw: &str, allowlist: &Allowlist, validator: &SqlValidator) -> QueryCandidate {
    let sanitized = sanitize(raw);
    let outcome = validator.validate(&sanitized, allowlist);
    QueryCandidate {
        raw_text: raw.to_string(),
        sanitized_text: sanitized,
        sql: outcome.sql,
        referenced_objects: outcome.referenced_objects,
        errors: outcome.errors,
    }
}

/// Check an accepted candidate against the plan budget, recording any rejection on it.
pub async fn apply_budget(
    candidate: &mut QueryCandidate,
    evaluator: &QueryBudgetEvaluator,
    plans: Option<&dyn PlanSource>,
) -> Option<BudgetOutcome> {
    let sql = candidate.accepted_sql()?.to_string();
    let Some(plans) = plans else {
        candidate
            .errors
            .push("Plan budgeting is enabled but no plan source is configured".into());
        return None;
    };
    match plans.explain(&sql).await {
        Ok(explain) => {
            let outcome = evaluator.evaluate(&explain);
            candidate.errors.extend(outcome.errors.iter().cloned());
            Some(outcome)
        }
        Err(e) => {
            candidate.errors.push(e.to_string());
            None
        }
    }
}

pub fn build_prompt(question: &str, objects: &[SchemaObject], context: &[ScoredDocument]) -> String {
    let mut prompt = String::from(
        "Write exactly one read-only PostgreSQL SELECT statement that answers the question.\n",
    );
    prompt.push_str("Use only these tables and views:\n");
    for o in objects {
        prompt.push_str(&format!(
            "- {}.{}\n",
            quote_ident(&o.schema_name),
            quote_ident(&o.object_name)
        ));
    }
    if !context.is_empty() {
        prompt.push_str("\nContext:\n");
        prompt.push_str(&format_context(context));
        prompt.push('\n');
    }
    prompt.push_str(&format!("\nQuestion: {}\nReturn only the SQL.", question.trim()));
    prompt
}

pub struct Pipeline<'a> {
    ctx: &'a PipelineContext,
    plans: Option<&'a dyn PlanSource>,
}

impl<'a> Pipeline<'a> {
    pub fn new(ctx: &'a PipelineContext) -> Self {
        Self { ctx, plans: None }
    }

    pub fn with_plan_source(mut self, plans: &'a dyn PlanSource) -> Self {
        self.plans = Some(plans);
        self
    }

    pub async fn generate(&self, req: &GenerateRequest) -> anyhow::Result<GenerationOutcome> {
        let cfg = &self.ctx.config;
        let objects = self.ctx.store.list_schema_objects(&req.data_source_id)?;
        let context = self.ctx.retrieval().retrieve(
            &self.ctx.store,
            &req.data_source_id,
            &req.question,
            cfg.rag.limit,
        )?;
        let max_rows = req.max_rows.unwrap_or(cfg.validator.max_rows);

        let client = self.ctx.providers.resolve(req.provider.as_deref())?;
        let mut provider_error = None;
        let mut generated = None;
        if let Some(client) = &client {
            let mut input = GenerateInput::new(build_prompt(&req.question, &objects, &context));
            input.model = req.model.clone();
            match client.generate(&input).await {
                Ok(resp) => generated = Some((resp.text, resp.provider, Some(resp.model))),
                Err(e) => {
                    tracing::warn!(
                        event = "pipeline.provider_failed",
                        provider = client.provider_name(),
                        kind = e.kind(),
                        error = %e
                    );
                    provider_error = Some(e.to_string());
                }
            }
        }

        let (raw, provider, model) = match generated {
            Some(g) => g,
            None => (
                HeuristicSqlGenerator.generate(&req.question, &objects, max_rows)?,
                HEURISTIC_PROVIDER.to_string(),
                None,
            ),
        };

        let validator = SqlValidator::new(cfg.validator.default_schema.clone(), max_rows);
        let mut candidate = govern(&raw, &Allowlist::new(&objects), &validator);

        let budget = if cfg.budget.enabled {
            let evaluator = QueryBudgetEvaluator::new(cfg.budget.budget());
            apply_budget(&mut candidate, &evaluator, self.plans).await
        } else {
            None
        };

        if candidate.errors.is_empty() {
            tracing::info!(
                event = "pipeline.accepted",
                data_source_id = %req.data_source_id,
                provider = %provider,
                references = candidate.referenced_objects.len()
            );
        } else {
            tracing::warn!(
                event = "pipeline.rejected",
                data_source_id = %req.data_source_id,
                provider = %provider,
                errors = ?candidate.errors
            );
        }

        Ok(GenerationOutcome {
            candidate,
            provider,
            model,
            provider_error,
            context_document_ids: context.iter().map(|d| d.document.id).collect(),
            budget,
        })
    }
}
