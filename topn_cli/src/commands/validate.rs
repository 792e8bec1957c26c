use crate::{ui, FileKind};
use anyhow::Result;
use colored::Colorize;
use std::path::PathBuf;
use topn_config::{parse_config_from_file, parse_plan_from_file};

pub async fn execute(file: PathBuf, kind: FileKind) -> Result<()> {
    ui::print_header("Validating File");
    println!("File: {}", file.display());

    match kind {
        FileKind::Config => match parse_config_from_file(&file).await {
            Ok(config) => {
                ui::print_success("Engine configuration is valid!");
                println!("\nEngine Details:");
                println!("  Name: {}", config.name);
                println!("  Storage: {}", config.storage.kind());
                println!("  Default Top-N: {}", config.default_top_n);
                println!("  Metrics: {}", config.metrics.len());

                if config.metrics.is_empty() {
                    ui::print_warning("No metrics defined; every sort query will be rejected");
                }
                Ok(())
            }
            Err(e) => {
                println!("\n{}", "✗ Engine configuration is invalid!".red().bold());
                println!("\nError: {:#}", e);
                Err(e)
            }
        },
        FileKind::Plan => match parse_plan_from_file(&file).await {
            Ok(plan) => {
                ui::print_success("Plan is valid!");
                println!("\nPlan Details:");
                println!("  Name: {}", plan.name);
                println!("  Parallel: {}", plan.parallel);
                println!("  Queries: {}", plan.queries.len());

                for (i, query) in plan.queries.iter().enumerate() {
                    let duration = query.duration.to_query_duration();
                    println!(
                        "    {}: {} ({}, {}..={})",
                        i + 1,
                        query.display_name(),
                        duration.step,
                        duration.start_tb,
                        duration.end_tb
                    );
                }
                Ok(())
            }
            Err(e) => {
                println!("\n{}", "✗ Plan is invalid!".red().bold());
                println!("\nError: {:#}", e);
                Err(e)
            }
        },
    }
}
