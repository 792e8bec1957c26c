use crate::{
    engine::{TopNAggregationEngine, TopNQuery},
    error::{QueryError, Result},
    records::SampledRecordStore,
    types::{QueryDuration, Scope, SelectedRecord, TopNCondition, TopNEntity},
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Ranks entities of one metric.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AggregationQueryService: Send + Sync {
    async fn sort_metrics(
        &self,
        condition: &TopNCondition,
        duration: &QueryDuration,
    ) -> Result<Vec<TopNEntity>>;
}

/// Reads sampled records such as the slowest statements.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TopNRecordsQueryService: Send + Sync {
    async fn read_sampled_records(
        &self,
        condition: &TopNCondition,
        duration: &QueryDuration,
    ) -> Result<Vec<SelectedRecord>>;
}

fn default_value_column() -> String {
    "value".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MetricDefinition {
    pub name: String,
    #[serde(default = "default_value_column")]
    pub value_column: String,
    #[serde(default)]
    pub scope: Scope,
}

impl MetricDefinition {
    pub fn new(name: impl Into<String>, scope: Scope) -> Self {
        Self {
            name: name.into(),
            value_column: default_value_column(),
            scope,
        }
    }

    pub fn with_value_column(mut self, column: impl Into<String>) -> Self {
        self.value_column = column.into();
        self
    }
}

/// Maps a metric name to its value column and entity taxonomy.
#[derive(Debug, Clone, Default)]
pub struct ValueColumnMetadata {
    metrics: HashMap<String, MetricDefinition>,
}

impl ValueColumnMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, definition: MetricDefinition) {
        self.metrics.insert(definition.name.clone(), definition);
    }

    pub fn get(&self, name: &str) -> Option<&MetricDefinition> {
        self.metrics.get(name)
    }

    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }
}

impl FromIterator<MetricDefinition> for ValueColumnMetadata {
    fn from_iter<I: IntoIterator<Item = MetricDefinition>>(iter: I) -> Self {
        let mut metadata = Self::new();
        for definition in iter {
            metadata.register(definition);
        }
        metadata
    }
}

pub struct TopNQueryService {
    engine: TopNAggregationEngine,
    metadata: ValueColumnMetadata,
}

impl TopNQueryService {
    pub fn new(engine: TopNAggregationEngine, metadata: ValueColumnMetadata) -> Self {
        Self { engine, metadata }
    }
}

#[async_trait]
impl AggregationQueryService for TopNQueryService {
    async fn sort_metrics(
        &self,
        condition: &TopNCondition,
        duration: &QueryDuration,
    ) -> Result<Vec<TopNEntity>> {
        let definition = self.metadata.get(&condition.name).ok_or_else(|| {
            QueryError::InvalidCondition(format!("Unknown metric '{}'", condition.name))
        })?;

        let query = TopNQuery::new(
            &definition.name,
            &definition.value_column,
            condition.top_n,
            duration,
            condition.order,
        )?;

        match condition.parent_service.as_deref() {
            Some(parent_id) => {
                let column = definition.scope.parent_column().ok_or_else(|| {
                    QueryError::InvalidCondition(format!(
                        "Metric '{}' is recorded per {:?} and cannot be scoped to a parent",
                        definition.name, definition.scope
                    ))
                })?;
                debug!("Scoping '{}' to {}={}", definition.name, column, parent_id);
                self.engine
                    .topn_by_time_range_and_parent(column, parent_id, &query)
                    .await
            }
            None => self.engine.topn_by_time_range(&query).await,
        }
    }
}

pub struct SampledRecordsService {
    store: Arc<SampledRecordStore>,
}

impl SampledRecordsService {
    pub fn new(store: Arc<SampledRecordStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl TopNRecordsQueryService for SampledRecordsService {
    async fn read_sampled_records(
        &self,
        condition: &TopNCondition,
        duration: &QueryDuration,
    ) -> Result<Vec<SelectedRecord>> {
        if condition.top_n == 0 {
            return Err(QueryError::InvalidCondition(
                "Top-N limit must be greater than zero".to_string(),
            ));
        }
        let range = duration.time_bucket_range()?;

        Ok(self
            .store
            .read(
                &condition.name,
                range,
                condition.parent_service.as_deref(),
                condition.top_n,
                condition.order,
            )
            .await)
    }
}
