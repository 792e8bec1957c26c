use crate::ui;
use anyhow::{Context, Result};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use topn_config::{parse_config_from_file, parse_plan_from_file, PlanRunner};
use topn_telemetry::{
    outcome_table, summary_table, JsonExporter, MarkdownExporter, QueryTelemetryCollector,
    SloTracker, TelemetryAggregator,
};
use tracing::info;

const INTERACTIVE_LATENCY_SLO: Duration = Duration::from_millis(500);

pub async fn execute(
    plan_file: PathBuf,
    config_file: PathBuf,
    output_json: Option<PathBuf>,
    output_markdown: Option<PathBuf>,
    prometheus_port: Option<u16>,
) -> Result<()> {
    ui::print_header("Top-N Query Plan");
    println!("Loading plan: {}", plan_file.display());

    let config = parse_config_from_file(&config_file).await?;
    let plan = parse_plan_from_file(&plan_file).await?;

    if let Some(port) = prometheus_port {
        let addr = SocketAddr::from(([0, 0, 0, 0], port));
        PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
            .context("Installing Prometheus exporter")?;
        info!("Prometheus metrics available on {}", addr);
    }

    println!("\n{}", "Plan Details:".bold());
    println!("  Name: {}", plan.name.green());
    if let Some(desc) = &plan.description {
        println!("  Description: {}", desc);
    }
    println!("  Engine: {} ({} storage)", config.name, config.storage.kind());
    println!("  Queries: {}", plan.queries.len());
    println!("  Parallel: {}", plan.parallel);

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.enable_steady_tick(Duration::from_millis(100));
    pb.set_message(format!("Running {} queries", plan.queries.len()));

    let runner = PlanRunner::load(&config).await?;
    let result = runner.run(&plan).await?;

    pb.finish_and_clear();

    println!("\n{}", "=== Plan Results ===".bold().green());
    println!("Plan: {}", result.plan_name.cyan());
    println!("Total Duration: {:?}", result.total_duration);
    println!("Success Rate: {:.2}%", result.success_rate() * 100.0);
    println!("\n{}", summary_table(&result));

    for outcome in &result.outcomes {
        println!("\n{}", outcome.label.yellow().bold());
        match &outcome.error {
            Some(error) => ui::print_error(error),
            None if outcome.row_count() == 0 => ui::print_info("No rows"),
            None => println!("{}", outcome_table(outcome)),
        }
    }

    let mut slo = SloTracker::new();
    slo.add_slo("interactive", INTERACTIVE_LATENCY_SLO);
    for outcome in &result.outcomes {
        slo.check_outcome(outcome);
    }
    if slo.violation_count() > 0 {
        ui::print_warning(&format!(
            "{} queries exceeded the {:?} latency objective",
            slo.violation_count(),
            INTERACTIVE_LATENCY_SLO
        ));
    }

    if let Some(json_path) = output_json {
        println!("\nSaving JSON result to: {}", json_path.display());
        JsonExporter::export(&result, &json_path).await?;
    }

    if let Some(md_path) = output_markdown {
        println!("Generating Markdown report to: {}", md_path.display());
        let collector = QueryTelemetryCollector::new();
        collector.record_plan(&result).await;
        let telemetry = TelemetryAggregator::aggregate(&collector.get_events().await);
        MarkdownExporter::export(&result, &telemetry, &md_path).await?;
    }

    if result.failure_count() > 0 {
        anyhow::bail!(
            "{} of {} queries failed",
            result.failure_count(),
            result.outcomes.len()
        );
    }

    ui::print_success("Plan completed successfully");
    Ok(())
}
