pub mod backends;
pub mod engine;
pub mod error;
pub mod facade;
pub mod locator;
pub mod predicate;
pub mod records;
pub mod services;
pub mod types;

pub use backends::{
    AggregateBucket, AggregationQueryBackend, AggregationRequest, Dataset, DynBackend,
    ElasticsearchBackend, InMemoryColumnStore, IndexData, StoredRow,
};
pub use engine::{TopNAggregationEngine, TopNQuery};
pub use error::{QueryError, Result};
pub use facade::MetricsQuery;
pub use locator::ServiceLocator;
pub use predicate::{CompositePredicate, Predicate, ScopeFilterBuilder};
pub use records::{SampledRecord, SampledRecordStore};
pub use services::{
    AggregationQueryService, MetricDefinition, SampledRecordsService, TopNQueryService,
    TopNRecordsQueryService, ValueColumnMetadata,
};
pub use types::*;

// Re-export commonly used types
pub use async_trait::async_trait;
