use crate::ui;
use anyhow::Result;
use colored::Colorize;
use std::path::PathBuf;
use topn_config::{parse_config_from_file, BucketBound, DurationSpec, PlanRunner};
use topn_core::{DownSampling, Order, TopNCondition};

pub struct QueryArgs {
    pub metric: String,
    pub top_n: Option<usize>,
    pub order: Order,
    pub parent_service: Option<String>,
    pub start: BucketBound,
    pub end: BucketBound,
    pub step: DownSampling,
}

pub async fn execute(config_file: PathBuf, args: QueryArgs) -> Result<()> {
    let config = parse_config_from_file(&config_file).await?;
    let runner = PlanRunner::load(&config).await?;

    let duration = DurationSpec {
        start: args.start,
        end: args.end,
        step: args.step,
    }
    .to_query_duration();

    let mut condition = TopNCondition::new(
        args.metric,
        args.top_n.unwrap_or(config.default_top_n),
        args.order,
    );
    condition.parent_service = args.parent_service;

    let entities = runner.query().sort_metrics(&condition, &duration).await?;

    ui::print_header(&format!("Top {} {}", condition.top_n, condition.name));
    println!(
        "Range: {}..={} ({})",
        duration.start_tb, duration.end_tb, duration.step
    );
    if let Some(service) = &condition.parent_service {
        println!("Service: {}", service.cyan());
    }
    println!();

    if entities.is_empty() {
        ui::print_info("No entities in range");
        return Ok(());
    }

    for (rank, entity) in entities.iter().enumerate() {
        println!("  {:>3}. {:<40} {}", rank + 1, entity.id.green(), entity.value);
    }

    Ok(())
}
