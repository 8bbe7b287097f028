use super::{exit_codes, load_config};
use crate::cli::args::{BenchArgs, HistoryArgs};
use querygate_core::bench::{
    run_benchmark, BenchOptions, HarnessSettings, HttpPipelineClient, PublishStatus,
};
use querygate_core::bench::runner::DEFAULT_POLL_INTERVAL;
use querygate_core::report::console;
use querygate_core::storage::Store;
use std::time::Duration;

/// Added on top of the per-run timeout the pipeline enforces itself.
const REQUEST_SLACK_MS: u64 = 10_000;

pub async fn run(args: BenchArgs) -> anyhow::Result<i32> {
    let cfg = load_config(&args.config)?;

    let store = if args.no_history {
        None
    } else {
        let s = Store::open(&cfg.store.path)?;
        s.init_schema()?;
        Some(s)
    };

    let client = HttpPipelineClient::new(
        &args.base_url,
        Duration::from_millis(args.timeout_ms + REQUEST_SLACK_MS),
    )?;

    let opts = BenchOptions {
        dataset_file: args.dataset_file.clone(),
        report_dir: args.report_dir.clone(),
        data_source_id: args.data_source_id.clone(),
        data_source_name: args.data_source_name.clone(),
        connection_ref: args
            .connection_ref
            .clone()
            .unwrap_or_else(|| args.data_source_conn.clone()),
        oracle_conn: args
            .oracle_conn
            .clone()
            .unwrap_or_else(|| args.data_source_conn.clone()),
        max_cases: args.max_cases,
        introspection_timeout: Duration::from_millis(args.introspection_timeout_ms),
        poll_interval: DEFAULT_POLL_INTERVAL,
        settings: HarnessSettings {
            max_rows: args.max_rows,
            timeout_ms: args.timeout_ms,
            provider: args.provider.clone(),
            model: args.model.clone(),
        },
        thresholds: cfg.gates.clone(),
        publish: !args.no_publish,
        progress: !args.quiet,
    };

    let outcome = run_benchmark(
        &opts,
        &client,
        querygate_metrics::default_assertions(),
        store.as_ref(),
    )
    .await?;

    match &outcome.publish {
        PublishStatus::Published { id } => eprintln!(
            "[benchmark] Published report to API with id={}",
            id.as_deref().unwrap_or("unknown")
        ),
        PublishStatus::Failed(e) => eprintln!("[benchmark] Could not publish report to API: {}", e),
        PublishStatus::Skipped => {}
    }
    eprintln!("[benchmark] Report written to {}", outcome.json_path.display());
    eprintln!("[benchmark] Report written to {}", outcome.markdown_path.display());
    console::print_summary(&outcome.report);

    Ok(outcome.exit_code())
}

pub fn history(args: HistoryArgs) -> anyhow::Result<i32> {
    let cfg = load_config(&args.config)?;
    let store = Store::open(&cfg.store.path)?;
    store.init_schema()?;

    for run in store.list_bench_runs(args.limit)? {
        let correctness = run
            .summary
            .as_ref()
            .and_then(|s| s.get("correctness_rate"))
            .and_then(|v| v.as_f64())
            .map(|r| format!("{:.2}%", r * 100.0))
            .unwrap_or_else(|| "n/a".into());
        let cases = store.count_bench_results(run.id)?;
        println!(
            "#{:<4} {}  {:<8} cases={:<4} correctness={:<8} provider={} dataset={}",
            run.id,
            run.started_at,
            run.status,
            cases,
            correctness,
            run.provider.as_deref().unwrap_or("(none)"),
            run.dataset_file.as_deref().unwrap_or("")
        );
    }
    Ok(exit_codes::OK)
}
