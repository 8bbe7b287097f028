use super::client::{ApiResponse, PipelineClient, RunOptions};
use super::dataset::load_cases;
use super::oracle::{self, ReferenceDb};
use super::summary::summarize;
use crate::config::GateThresholds;
use crate::errors::{GateError, GateResult};
use crate::metrics_api::ResultAssertion;
use crate::model::{rows_from_json, BenchmarkCase, CaseResult};
use crate::report::{self, BenchmarkReport};
use crate::sql::keywords::contains_blocked_keyword;
use crate::storage::Store;
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

pub const DEFAULT_ASSERTION: &str = "row_set_equivalent";
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, PartialEq)]
pub struct HarnessSettings {
    pub max_rows: u64,
    pub timeout_ms: u64,
    pub provider: Option<String>,
    pub model: Option<String>,
}

impl Default for HarnessSettings {
    fn default() -> Self {
        Self {
            max_rows: 2000,
            timeout_ms: 30_000,
            provider: None,
            model: None,
        }
    }
}

impl HarnessSettings {
    fn run_options(&self) -> RunOptions {
        RunOptions {
            max_rows: self.max_rows,
            timeout_ms: self.timeout_ms,
            provider: self.provider.clone().filter(|p| !p.is_empty()),
            model: self.model.clone().filter(|m| !m.is_empty()),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub enum Progress<'a> {
    Started(&'a BenchmarkCase),
    Finished(&'a BenchmarkCase, &'a CaseResult),
}

/// Runs cases one at a time, in dataset order, against a held reference connection.
pub struct BenchmarkHarness<'a> {
    client: &'a dyn PipelineClient,
    reference: &'a dyn ReferenceDb,
    assertions: HashMap<&'static str, Arc<dyn ResultAssertion>>,
    settings: HarnessSettings,
}

impl<'a> BenchmarkHarness<'a> {
    pub fn new(
        client: &'a dyn PipelineClient,
        reference: &'a dyn ReferenceDb,
        assertions: Vec<Arc<dyn ResultAssertion>>,
        settings: HarnessSettings,
    ) -> Self {
        Self {
            client,
            reference,
            assertions: assertions.into_iter().map(|a| (a.name(), a)).collect(),
            settings,
        }
    }

    pub async fn run_all<F>(
        &self,
        data_source_id: &str,
        cases: &[BenchmarkCase],
        mut observe: F,
    ) -> Vec<CaseResult>
    where
        F: FnMut(Progress<'_>),
    {
        let mut results = Vec::with_capacity(cases.len());
        for case in cases {
            tracing::info!(event = "bench.case_start", case_id = %case.id);
            observe(Progress::Started(case));
            let result = self.run_case(data_source_id, case).await;
            tracing::info!(
                event = "bench.case_done",
                case_id = %case.id,
                status = result.run_status,
                correct = result.correct,
                latency_ms = ?result.e2e_latency_ms
            );
            observe(Progress::Finished(case, &result));
            results.push(result);
        }
        results
    }

    /// Never fails: every problem becomes a reason on the case result.
    pub async fn run_case(&self, data_source_id: &str, case: &BenchmarkCase) -> CaseResult {
        let started = Instant::now();

        let session = match self
            .client
            .create_session(data_source_id, &case.nl_question)
            .await
        {
            Ok(r) => r,
            Err(e) => return CaseResult::failed(case, 0, format!("create_session_failed: {}", e)),
        };
        if !session.ok() {
            return CaseResult::failed(
                case,
                session.status,
                format!("create_session_failed: {}", stringify(&session.payload)),
            );
        }
        let Some(session_id) = id_of(&session.payload, "session_id") else {
            return CaseResult::failed(case, 500, "create_session_failed: missing session_id");
        };

        let run = self
            .client
            .run_session(&session_id, &self.settings.run_options())
            .await;
        let latency = started.elapsed().as_millis() as u64;

        let run = match run {
            Ok(r) => r,
            Err(e) => {
                let mut r = CaseResult::failed(case, 0, format!("run_session_failed: {}", e));
                r.e2e_latency_ms = Some(latency);
                return r;
            }
        };
        let generated_sql = run
            .payload
            .get("sql")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        if !run.ok() {
            let mut r = CaseResult::failed(case, run.status, stringify(&run.payload));
            r.e2e_latency_ms = Some(latency);
            r.generated_sql = (!generated_sql.is_empty()).then_some(generated_sql);
            return r;
        }

        let generated_rows = rows_from_json(run.payload.get("rows").unwrap_or(&Value::Null));
        let violation = contains_blocked_keyword(&generated_sql);
        if violation {
            tracing::warn!(event = "bench.safety_violation", case_id = %case.id, sql = %generated_sql);
        }

        let mut result = CaseResult {
            id: case.id.clone(),
            question: case.nl_question.clone(),
            run_status: run.status,
            error: None,
            correct: false,
            mismatch_reason: None,
            critical_safety_violation: violation,
            e2e_latency_ms: Some(latency),
            generated_sql: Some(generated_sql),
            provider: run
                .payload
                .get("provider")
                .and_then(Value::as_str)
                .map(str::to_string),
            row_count_generated: Some(generated_rows.len()),
            row_count_oracle: None,
        };

        let oracle_rows = match self.reference.query(&case.oracle_sql).await {
            Ok(rows) => rows,
            Err(e) => {
                tracing::warn!(event = "bench.oracle_failed", case_id = %case.id, error = %e);
                result.run_status = 500;
                result.error = Some(format!("oracle_sql_failed: {}", e));
                return result;
            }
        };
        result.row_count_oracle = Some(oracle_rows.len());

        match self.assertion_for(case) {
            Some(assertion) => {
                let verdict = assertion.evaluate(&generated_rows, &oracle_rows);
                result.correct = verdict.passed;
                result.mismatch_reason = verdict.reason;
            }
            None => {
                result.error = Some(format!(
                    "unknown result assertion: {}",
                    case.assertion_name()
                ));
            }
        }
        result
    }

    fn assertion_for(&self, case: &BenchmarkCase) -> Option<&Arc<dyn ResultAssertion>> {
        self.assertions
            .get(case.assertion_name())
            .or_else(|| self.assertions.get(DEFAULT_ASSERTION))
    }
}

/// Resolve the data source to benchmark, creating it by name when absent.
pub async fn ensure_data_source_id(
    client: &dyn PipelineClient,
    configured: Option<&str>,
    name: &str,
    connection_ref: &str,
) -> GateResult<String> {
    if let Some(id) = configured.filter(|s| !s.trim().is_empty()) {
        return Ok(id.to_string());
    }

    let listed = client
        .list_data_sources()
        .await
        .map_err(|e| GateError::Configuration(format!("Failed to list data sources: {}", e)))?;
    if listed.ok() {
        let found = listed.items().and_then(|items| {
            items
                .iter()
                .find(|i| i.get("name").and_then(Value::as_str) == Some(name))
                .and_then(|i| id_of(i, "id"))
        });
        if let Some(id) = found {
            return Ok(id);
        }
    }

    let created = client
        .create_data_source(name, connection_ref)
        .await
        .map_err(|e| GateError::Configuration(format!("Failed to create data source: {}", e)))?;
    if !created.ok() {
        return Err(GateError::Configuration(format!(
            "Failed to create data source: HTTP {} {}",
            created.status,
            stringify(&created.payload)
        )));
    }
    id_of(&created.payload, "id").ok_or_else(|| {
        GateError::Configuration("Failed to create data source: response has no id".into())
    })
}

/// Trigger introspection and wait until the catalog lists at least one object.
pub async fn ensure_introspection_ready(
    client: &dyn PipelineClient,
    data_source_id: &str,
    timeout: Duration,
    poll_interval: Duration,
) -> GateResult<usize> {
    let triggered = client
        .trigger_introspection(data_source_id)
        .await
        .map_err(|e| GateError::Configuration(format!("Failed to trigger introspection: {}", e)))?;
    if triggered.status != 200 && triggered.status != 202 {
        return Err(GateError::Configuration(format!(
            "Failed to trigger introspection: HTTP {} {}",
            triggered.status,
            stringify(&triggered.payload)
        )));
    }

    let started = Instant::now();
    while started.elapsed() < timeout {
        match client.list_schema_objects(data_source_id).await {
            Ok(resp) if resp.ok() => {
                if let Some(n) = resp.items().map(Vec::len).filter(|n| *n > 0) {
                    tracing::info!(event = "bench.catalog_ready", data_source_id, objects = n);
                    return Ok(n);
                }
            }
            Ok(resp) => {
                tracing::debug!(event = "bench.catalog_poll", status = resp.status);
            }
            Err(e) => {
                tracing::debug!(event = "bench.catalog_poll", error = %e);
            }
        }
        tokio::time::sleep(poll_interval).await;
    }

    Err(GateError::Configuration(format!(
        "Timed out waiting for schema introspection after {}ms",
        timeout.as_millis()
    )))
}

#[derive(Debug, Clone)]
pub struct BenchOptions {
    pub dataset_file: PathBuf,
    pub report_dir: PathBuf,
    pub data_source_id: Option<String>,
    pub data_source_name: String,
    pub connection_ref: String,
    pub oracle_conn: String,
    pub max_cases: usize,
    pub introspection_timeout: Duration,
    pub poll_interval: Duration,
    pub settings: HarnessSettings,
    pub thresholds: GateThresholds,
    pub publish: bool,
    pub progress: bool,
}

#[derive(Debug, Clone)]
pub enum PublishStatus {
    Published { id: Option<String> },
    Skipped,
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct BenchOutcome {
    pub report: BenchmarkReport,
    pub json_path: PathBuf,
    pub markdown_path: PathBuf,
    pub publish: PublishStatus,
    pub history_run_id: Option<i64>,
}

impl BenchOutcome {
    /// 0 when every release gate holds, 2 otherwise.
    pub fn exit_code(&self) -> i32 {
        if self.report.summary.release_gates.all_passed {
            0
        } else {
            2
        }
    }
}

/// Full harness run. `Err` means a fatal setup failure; gate failures are
/// reported through [`BenchOutcome::exit_code`].
pub async fn run_benchmark(
    opts: &BenchOptions,
    client: &dyn PipelineClient,
    assertions: Vec<Arc<dyn ResultAssertion>>,
    store: Option<&Store>,
) -> anyhow::Result<BenchOutcome> {
    let cases = load_cases(&opts.dataset_file, opts.max_cases)?;
    tracing::info!(event = "bench.cases_loaded", cases = cases.len());

    let data_source_id = ensure_data_source_id(
        client,
        opts.data_source_id.as_deref(),
        &opts.data_source_name,
        &opts.connection_ref,
    )
    .await?;
    ensure_introspection_ready(
        client,
        &data_source_id,
        opts.introspection_timeout,
        opts.poll_interval,
    )
    .await?;

    let reference = oracle::connect(&opts.oracle_conn).await?;
    let run_date = chrono::Utc::now();
    let dataset_file = opts.dataset_file.display().to_string();

    let history_run_id = match store {
        Some(s) => record(s.create_bench_run(
            &dataset_file,
            Some(&data_source_id),
            opts.settings.provider.as_deref(),
            opts.settings.model.as_deref(),
        )),
        None => None,
    };

    let results = {
        let harness =
            BenchmarkHarness::new(client, reference.as_ref(), assertions, opts.settings.clone());
        harness
            .run_all(&data_source_id, &cases, |progress| match progress {
                Progress::Started(case) if opts.progress => {
                    report::console::print_case_start(case);
                }
                Progress::Started(_) => {}
                Progress::Finished(case, result) => {
                    if opts.progress {
                        report::console::print_case(case, result);
                    }
                    if let (Some(s), Some(run_id)) = (store, history_run_id) {
                        record(s.insert_bench_result(run_id, result));
                    }
                }
            })
            .await
    };
    if let Err(e) = reference.close().await {
        tracing::warn!(event = "bench.reference_close_failed", error = %e);
    }

    let summary = summarize(&results, &opts.thresholds);
    let observability = fetch_observability(client).await;

    let report = BenchmarkReport {
        run_date: run_date.to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
        dataset_file,
        data_source_id,
        provider: opts.settings.provider.clone().filter(|p| !p.is_empty()),
        model: opts.settings.model.clone().filter(|m| !m.is_empty()),
        summary,
        observability,
        cases: results,
    };

    let (json_path, markdown_path) = report::write_artifacts(&opts.report_dir, &report, run_date)?;

    let publish = if opts.publish {
        publish_report(client, &report).await
    } else {
        PublishStatus::Skipped
    };

    if let (Some(s), Some(run_id)) = (store, history_run_id) {
        let status = if report.summary.release_gates.all_passed {
            "passed"
        } else {
            "failed"
        };
        record(s.finalize_bench_run(run_id, status, &serde_json::to_value(&report.summary)?));
    }

    Ok(BenchOutcome {
        report,
        json_path,
        markdown_path,
        publish,
        history_run_id,
    })
}

async fn fetch_observability(client: &dyn PipelineClient) -> Value {
    match client.fetch_metrics().await {
        Ok(resp) if resp.ok() => resp.payload,
        Ok(resp) => serde_json::json!({
            "error": format!("metrics_endpoint_failed: HTTP {}", resp.status)
        }),
        Err(e) => serde_json::json!({ "error": e.to_string() }),
    }
}

async fn publish_report(client: &dyn PipelineClient, report: &BenchmarkReport) -> PublishStatus {
    let body = match serde_json::to_value(report) {
        Ok(v) => v,
        Err(e) => return publish_failed(GateError::Publish(e.to_string())),
    };
    match client.publish_report(&body).await {
        Ok(resp) if resp.ok() => {
            let id = id_of(&resp.payload, "id");
            tracing::info!(event = "bench.report_published", id = ?id);
            PublishStatus::Published { id }
        }
        Ok(ApiResponse { status, payload }) => publish_failed(GateError::Publish(format!(
            "HTTP {} {}",
            status,
            stringify(&payload)
        ))),
        Err(e) => publish_failed(GateError::Publish(e.to_string())),
    }
}

fn publish_failed(e: GateError) -> PublishStatus {
    tracing::warn!(event = "bench.report_publish_failed", error = %e);
    PublishStatus::Failed(e.to_string())
}

/// History is best-effort; a store failure never changes the run's verdict.
fn record<T>(r: anyhow::Result<T>) -> Option<T> {
    match r {
        Ok(v) => Some(v),
        Err(e) => {
            tracing::warn!(event = "bench.history_write_failed", error = %e);
            None
        }
    }
}

fn id_of(v: &Value, key: &str) -> Option<String> {
    match v.get(key)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn stringify(payload: &Value) -> String {
    if payload.is_null() {
        String::new()
    } else {
        payload.to_string()
    }
}
