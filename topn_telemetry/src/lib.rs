pub mod aggregator;
pub mod collector;
pub mod exporters;
pub mod report;
pub mod slo;

pub use aggregator::{AggregatedTelemetry, TelemetryAggregator};
pub use collector::{QueryEvent, QueryEventType, QueryTelemetryCollector};
pub use exporters::{JsonExporter, MarkdownExporter, PrometheusExporter};
pub use report::{outcome_table, summary_table};
pub use slo::{SloTracker, SloViolation};
