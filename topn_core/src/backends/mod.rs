pub mod elasticsearch;
pub mod memory;

use crate::{
    error::Result,
    predicate::CompositePredicate,
    types::{DownSampling, Order},
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub use elasticsearch::ElasticsearchBackend;
pub use memory::{Dataset, IndexData, InMemoryColumnStore, StoredRow};

/// One grouped-mean request. Grouping, averaging, ordering and truncation
/// all happen inside the storage engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AggregationRequest {
    pub index_name: String,
    pub downsampling: DownSampling,
    pub value_column: String,
    pub group_column: String,
    pub predicate: CompositePredicate,
    pub limit: usize,
    pub order: Order,
}

/// A group key and the mean of the value column within that group.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AggregateBucket {
    pub key: String,
    pub value: f64,
}

impl AggregateBucket {
    pub fn new(key: impl Into<String>, value: f64) -> Self {
        Self {
            key: key.into(),
            value,
        }
    }
}

/// Storage-engine specific translation of an [`AggregationRequest`].
///
/// Implementations must return buckets already ranked by mean in the
/// requested order, at most `limit` of them, with ties broken by group key
/// ascending.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AggregationQueryBackend: Send + Sync {
    /// Get the name of this backend
    fn name(&self) -> &str;

    /// Run the grouped aggregation and return ranked buckets
    async fn aggregate(&self, request: &AggregationRequest) -> Result<Vec<AggregateBucket>>;
}

pub type DynBackend = Arc<dyn AggregationQueryBackend>;
