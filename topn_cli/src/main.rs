mod commands;
mod ui;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use topn_config::BucketBound;
use topn_core::{DownSampling, Order};
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;

#[derive(Parser)]
#[command(name = "topn")]
#[command(about = "Top-N aggregation queries over telemetry metrics", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable quiet mode (errors only)
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Also write logs to this file
    #[arg(long, global = true, env = "TOPN_LOG_FILE")]
    log_file: Option<PathBuf>,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum FileKind {
    Config,
    Plan,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum ReportFormat {
    Cli,
    Json,
    Markdown,
    Prometheus,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a query plan against an engine
    Run {
        /// Path to plan file (YAML, TOML, or JSON)
        plan_file: PathBuf,

        /// Engine configuration file
        #[arg(short, long, env = "TOPN_CONFIG")]
        config: PathBuf,

        /// Write the plan result as JSON
        #[arg(short, long)]
        output_json: Option<PathBuf>,

        /// Write a Markdown report
        #[arg(short = 'm', long)]
        output_markdown: Option<PathBuf>,

        /// Expose Prometheus metrics on port
        #[arg(short, long)]
        prometheus_port: Option<u16>,
    },

    /// Run a single Top-N query
    Query {
        /// Engine configuration file
        #[arg(short, long, env = "TOPN_CONFIG")]
        config: PathBuf,

        /// Metric name
        #[arg(long)]
        metric: String,

        /// Number of entities to return
        #[arg(short = 'n', long)]
        top_n: Option<usize>,

        /// Sort direction (asc or desc)
        #[arg(long, default_value = "desc")]
        order: Order,

        /// Restrict to entities of this service
        #[arg(long)]
        parent_service: Option<String>,

        /// Start time bucket or RFC 3339 timestamp
        #[arg(long)]
        start: BucketBound,

        /// End time bucket or RFC 3339 timestamp
        #[arg(long)]
        end: BucketBound,

        /// Downsampling (minute, hour or day)
        #[arg(long, default_value = "minute")]
        step: DownSampling,
    },

    /// Validate an engine configuration or plan file
    Validate {
        /// Path to the file
        file: PathBuf,

        /// What the file contains
        #[arg(short, long, value_enum, default_value = "plan")]
        kind: FileKind,
    },

    /// List the services and metrics an engine provides
    List {
        /// Engine configuration file
        #[arg(short, long, env = "TOPN_CONFIG")]
        config: PathBuf,
    },

    /// Render a report from a plan result file
    Report {
        /// Path to plan result JSON
        result_file: PathBuf,

        /// Output format
        #[arg(short, long, value_enum, default_value = "cli")]
        format: ReportFormat,

        /// Output file path
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn init_logging(cli: &Cli) -> anyhow::Result<Option<WorkerGuard>> {
    let log_level = if cli.verbose {
        Level::DEBUG
    } else if cli.quiet {
        Level::ERROR
    } else {
        Level::INFO
    };

    match &cli.log_file {
        Some(path) => {
            let directory = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| std::path::Path::new("."));
            let file_name = path
                .file_name()
                .ok_or_else(|| anyhow::anyhow!("Invalid log file: {}", path.display()))?;

            let appender = tracing_appender::rolling::never(directory, file_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt()
                .with_max_level(log_level)
                .with_target(false)
                .with_ansi(false)
                .with_writer(writer)
                .init();
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::fmt()
                .with_max_level(log_level)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
            Ok(None)
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let _guard = init_logging(&cli)?;

    match cli.command {
        Commands::Run {
            plan_file,
            config,
            output_json,
            output_markdown,
            prometheus_port,
        } => {
            commands::run::execute(plan_file, config, output_json, output_markdown, prometheus_port)
                .await?;
        }

        Commands::Query {
            config,
            metric,
            top_n,
            order,
            parent_service,
            start,
            end,
            step,
        } => {
            let args = commands::query::QueryArgs {
                metric,
                top_n,
                order,
                parent_service,
                start,
                end,
                step,
            };
            commands::query::execute(config, args).await?;
        }

        Commands::Validate { file, kind } => {
            commands::validate::execute(file, kind).await?;
        }

        Commands::List { config } => {
            commands::list::execute(config).await?;
        }

        Commands::Report {
            result_file,
            format,
            output,
        } => {
            commands::report::execute(result_file, format, output).await?;
        }
    }

    Ok(())
}
