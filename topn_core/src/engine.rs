//! Top-N aggregation engine.
//!
//! Builds the scoping filter and the grouped-mean request, hands it to the
//! configured [`AggregationQueryBackend`] and narrows the ranked buckets
//! into [`TopNEntity`] values. Ranking and truncation are pushed into the
//! storage engine; the order it returns is preserved as is.

use crate::{
    backends::{AggregationRequest, DynBackend},
    error::{QueryError, Result},
    predicate::ScopeFilterBuilder,
    types::{DownSampling, Order, QueryDuration, TimeBucketRange, TopNEntity, ENTITY_ID, SERVICE_ID},
};
use tracing::{debug, info, warn};

/// Parameters shared by every Top-N read.
#[derive(Debug, Clone, PartialEq)]
pub struct TopNQuery {
    pub index_name: String,
    pub value_column: String,
    pub limit: usize,
    pub downsampling: DownSampling,
    pub time_range: TimeBucketRange,
    pub order: Order,
}

impl TopNQuery {
    pub fn new(
        index_name: impl Into<String>,
        value_column: impl Into<String>,
        limit: usize,
        duration: &QueryDuration,
        order: Order,
    ) -> Result<Self> {
        if limit == 0 {
            return Err(QueryError::InvalidCondition(
                "Top-N limit must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            index_name: index_name.into(),
            value_column: value_column.into(),
            limit,
            downsampling: duration.step,
            time_range: duration.time_bucket_range()?,
            order,
        })
    }
}

pub struct TopNAggregationEngine {
    backend: DynBackend,
}

impl TopNAggregationEngine {
    pub fn new(backend: DynBackend) -> Self {
        Self { backend }
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Ranks every entity stored in `query.index_name`.
    pub async fn topn_by_time_range(&self, query: &TopNQuery) -> Result<Vec<TopNEntity>> {
        self.aggregate(query, None).await
    }

    /// Ranks only the entities whose `parent_column` equals `parent_id`.
    pub async fn topn_by_time_range_and_parent(
        &self,
        parent_column: &str,
        parent_id: &str,
        query: &TopNQuery,
    ) -> Result<Vec<TopNEntity>> {
        self.aggregate(query, Some((parent_column, parent_id))).await
    }

    pub async fn service_top_n(&self, query: &TopNQuery) -> Result<Vec<TopNEntity>> {
        self.topn_by_time_range(query).await
    }

    pub async fn all_service_instance_top_n(&self, query: &TopNQuery) -> Result<Vec<TopNEntity>> {
        self.topn_by_time_range(query).await
    }

    pub async fn service_instance_top_n(
        &self,
        service_id: &str,
        query: &TopNQuery,
    ) -> Result<Vec<TopNEntity>> {
        self.topn_by_time_range_and_parent(SERVICE_ID, service_id, query)
            .await
    }

    pub async fn all_endpoint_top_n(&self, query: &TopNQuery) -> Result<Vec<TopNEntity>> {
        self.topn_by_time_range(query).await
    }

    pub async fn endpoint_top_n(
        &self,
        service_id: &str,
        query: &TopNQuery,
    ) -> Result<Vec<TopNEntity>> {
        self.topn_by_time_range_and_parent(SERVICE_ID, service_id, query)
            .await
    }

    async fn aggregate(
        &self,
        query: &TopNQuery,
        parent: Option<(&str, &str)>,
    ) -> Result<Vec<TopNEntity>> {
        let mut filter = ScopeFilterBuilder::new(query.time_range);
        if let Some((column, id)) = parent {
            filter = filter.parent(column, id);
        }

        let request = AggregationRequest {
            index_name: query.index_name.clone(),
            downsampling: query.downsampling,
            value_column: query.value_column.clone(),
            group_column: ENTITY_ID.to_string(),
            predicate: filter.build(),
            limit: query.limit,
            order: query.order,
        };

        info!(
            "Top-{} {:?} of '{}.{}' over [{}, {}] via {}",
            query.limit,
            query.order,
            query.index_name,
            query.value_column,
            query.time_range.start_tb(),
            query.time_range.end_tb(),
            self.backend.name()
        );
        debug!("Aggregation request: {:?}", request);

        let buckets = self.backend.aggregate(&request).await.map_err(|e| {
            warn!("Aggregation on '{}' failed: {}", request.index_name, e);
            e
        })?;

        if buckets.len() > query.limit {
            warn!(
                "Backend '{}' returned {} buckets for limit {}",
                self.backend.name(),
                buckets.len(),
                query.limit
            );
        }

        // `as` truncates toward zero and maps NaN to 0.
        Ok(buckets
            .into_iter()
            .take(query.limit)
            .map(|bucket| TopNEntity::new(bucket.key, bucket.value as i64))
            .collect())
    }
}
