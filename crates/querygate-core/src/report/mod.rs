pub mod console;
pub mod json;
pub mod markdown;

pub use json::BenchmarkReport;
pub use markdown::render_markdown;

use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

pub const REPORT_PREFIX: &str = "mvp-benchmark";

/// `YYYYMMDD-HHMMSS` in UTC, shared by both artifacts of one run.
pub fn timestamp_suffix(at: DateTime<Utc>) -> String {
    at.format("%Y%m%d-%H%M%S").to_string()
}

/// Write the JSON and Markdown artifacts; returns their paths in that order.
pub fn write_artifacts(
    dir: &Path,
    report: &BenchmarkReport,
    at: DateTime<Utc>,
) -> anyhow::Result<(PathBuf, PathBuf)> {
    use anyhow::Context;

    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create report dir {}", dir.display()))?;

    let stem = format!("{}-{}", REPORT_PREFIX, timestamp_suffix(at));
    let json_path = dir.join(format!("{stem}.json"));
    let md_path = dir.join(format!("{stem}.md"));

    json::write_json(report, &json_path)?;
    std::fs::write(&md_path, render_markdown(report))
        .with_context(|| format!("failed to write {}", md_path.display()))?;

    tracing::info!(
        event = "bench.report_written",
        json = %json_path.display(),
        markdown = %md_path.display()
    );
    Ok((json_path, md_path))
}
