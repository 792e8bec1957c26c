use crate::{ui, ReportFormat};
use anyhow::Result;
use colored::Colorize;
use std::path::PathBuf;
use topn_config::PlanResult;
use topn_telemetry::{
    outcome_table, summary_table, AggregatedTelemetry, JsonExporter, MarkdownExporter,
    PrometheusExporter, QueryTelemetryCollector, TelemetryAggregator,
};

pub async fn execute(
    result_file: PathBuf,
    format: ReportFormat,
    output: Option<PathBuf>,
) -> Result<()> {
    let result = JsonExporter::load(&result_file).await?;

    match format {
        ReportFormat::Cli => {
            print_cli_report(&result);
        }
        ReportFormat::Json => {
            let json = JsonExporter::to_string(&result)?;
            write_or_print(json, output).await?;
        }
        ReportFormat::Markdown => {
            let telemetry = aggregate(&result).await;
            write_or_print(MarkdownExporter::format(&result, &telemetry), output).await?;
        }
        ReportFormat::Prometheus => {
            let telemetry = aggregate(&result).await;
            write_or_print(PrometheusExporter::format(&result, &telemetry), output).await?;
        }
    }

    Ok(())
}

async fn aggregate(result: &PlanResult) -> AggregatedTelemetry {
    let collector = QueryTelemetryCollector::new();
    collector.record_plan(result).await;
    TelemetryAggregator::aggregate(&collector.get_events().await)
}

async fn write_or_print(content: String, output: Option<PathBuf>) -> Result<()> {
    match output {
        Some(path) => tokio::fs::write(path, content).await?,
        None => println!("{}", content),
    }
    Ok(())
}

fn print_cli_report(result: &PlanResult) {
    ui::print_header("Plan Report");
    println!("Plan: {}", result.plan_name.cyan());
    println!("Total Duration: {:?}", result.total_duration);
    println!("Average Query Duration: {:?}", result.average_query_duration());
    println!("Success Rate: {:.2}%", result.success_rate() * 100.0);
    println!("\n{}", summary_table(result));

    for outcome in result.outcomes.iter().filter(|o| o.is_success()) {
        println!("\n{}", outcome.label.yellow().bold());
        println!("{}", outcome_table(outcome));
    }
}
