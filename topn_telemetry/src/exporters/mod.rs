pub mod json;
pub mod markdown;
pub mod prometheus;

pub use json::JsonExporter;
pub use markdown::MarkdownExporter;
pub use prometheus::PrometheusExporter;
