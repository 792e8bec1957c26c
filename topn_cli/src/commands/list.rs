use crate::ui;
use anyhow::Result;
use colored::Colorize;
use std::path::PathBuf;
use topn_config::{build_locator, parse_config_from_file};

pub async fn execute(config_file: PathBuf) -> Result<()> {
    let config = parse_config_from_file(&config_file).await?;
    let locator = build_locator(&config, None)?;

    ui::print_header(&format!("Engine '{}'", config.name));
    println!("Storage: {}", config.storage.kind());

    let services = locator.list();
    println!("\nRegistered services: {}\n", services.len());
    for service in services {
        println!("  {} {}", "•".green(), service);
    }

    println!("\nMetrics: {}\n", config.metrics.len());
    for metric in &config.metrics {
        println!(
            "  {} {} ({:?}, column '{}')",
            "•".green(),
            metric.name.cyan(),
            metric.scope,
            metric.value_column
        );
    }

    println!("\n{}", "Use 'topn query' to rank entities of a metric".yellow());

    Ok(())
}
