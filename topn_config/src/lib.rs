pub mod config;
pub mod parser;
pub mod runner;

pub use config::{
    BucketBound, ConfigError, DurationSpec, EngineConfig, QueryKind, QueryPlan, QuerySpec,
    StorageConfig,
};
pub use parser::{
    load_dataset_from_file, parse_config_from_file, parse_config_from_str, parse_plan_from_file,
    parse_plan_from_str,
};
pub use runner::{build_locator, run_plan, PlanResult, PlanRunner, QueryOutcome};
