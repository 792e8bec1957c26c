use crate::aggregator::AggregatedTelemetry;
use anyhow::Result;
use std::fmt::Write as _;
use std::path::Path;
use topn_config::PlanResult;
use tracing::debug;

pub struct MarkdownExporter;

impl MarkdownExporter {
    pub async fn export(
        result: &PlanResult,
        telemetry: &AggregatedTelemetry,
        path: impl AsRef<Path>,
    ) -> Result<()> {
        let path = path.as_ref();
        let markdown = Self::format(result, telemetry);
        tokio::fs::write(path, markdown).await?;
        debug!("Wrote markdown report for '{}' to {}", result.plan_name, path.display());
        Ok(())
    }

    pub fn format(result: &PlanResult, telemetry: &AggregatedTelemetry) -> String {
        let mut out = format!(
            r#"# Top-N Query Report: {}

## Summary Statistics

| Metric | Value |
|--------|-------|
| Total Queries | {} |
| Successful Queries | {} |
| Failed Queries | {} |
| Error Rate | {:.2}% |
| Rows Returned | {} |
| Plan Duration | {:?} |

## Latency Distribution

| Percentile | Latency |
|------------|---------|
| P50 | {:?} |
| P95 | {:?} |
| P99 | {:?} |
| P99.9 | {:?} |
| Average | {:?} |
| Min | {:?} |
| Max | {:?} |
"#,
            result.plan_name,
            telemetry.total_queries,
            telemetry.successful_queries,
            telemetry.failed_queries,
            telemetry.error_rate * 100.0,
            telemetry.total_rows,
            result.total_duration,
            telemetry.latency_p50,
            telemetry.latency_p95,
            telemetry.latency_p99,
            telemetry.latency_p999,
            telemetry.average_latency,
            telemetry.min_latency,
            telemetry.max_latency,
        );

        for outcome in &result.outcomes {
            let _ = write!(out, "\n## {}\n\n", outcome.label);
            if let Some(error) = &outcome.error {
                let _ = writeln!(out, "Failed: {}", error);
                continue;
            }
            let _ = writeln!(out, "{}", crate::report::outcome_table(outcome));
        }

        out
    }
}
