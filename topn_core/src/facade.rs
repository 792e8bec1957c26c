//! Public query surface for metric reads.
//!
//! Only `sort_metrics` and `read_sampled_records` do real work; the other
//! reads are placeholders that answer with well-typed empty values.

use crate::{
    error::Result,
    locator::ServiceLocator,
    services::{AggregationQueryService, TopNRecordsQueryService},
    types::{
        HeatMap, MetricsCondition, MetricsType, MetricsValues, QueryDuration, SelectedRecord,
        TopNCondition, TopNEntity,
    },
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::OnceCell;
use tracing::{debug, error};

pub struct MetricsQuery {
    locator: Arc<ServiceLocator>,
    query_service: OnceCell<Arc<dyn AggregationQueryService>>,
    records_service: OnceCell<Arc<dyn TopNRecordsQueryService>>,
    lookups: AtomicUsize,
}

impl MetricsQuery {
    /// Services are resolved from `locator` on first use and kept for the
    /// lifetime of this facade.
    pub fn new(locator: Arc<ServiceLocator>) -> Self {
        Self {
            locator,
            query_service: OnceCell::new(),
            records_service: OnceCell::new(),
            lookups: AtomicUsize::new(0),
        }
    }

    /// Resolves every service up front so a missing registration fails at
    /// start-up instead of on the first request.
    pub fn with_services(locator: Arc<ServiceLocator>) -> Result<Self> {
        let query_service = locator.find::<dyn AggregationQueryService>()?;
        let records_service = locator.find::<dyn TopNRecordsQueryService>()?;

        Ok(Self {
            locator,
            query_service: OnceCell::new_with(Some(query_service)),
            records_service: OnceCell::new_with(Some(records_service)),
            lookups: AtomicUsize::new(2),
        })
    }

    /// Number of locator lookups performed so far. Each service is looked up
    /// until the first successful resolution and never again.
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::Acquire)
    }

    async fn query_service(&self) -> Result<&Arc<dyn AggregationQueryService>> {
        self.query_service
            .get_or_try_init(|| async {
                self.lookups.fetch_add(1, Ordering::AcqRel);
                self.locator
                    .find::<dyn AggregationQueryService>()
                    .map_err(|e| {
                        error!("Cannot resolve aggregation query service: {}", e);
                        e
                    })
            })
            .await
    }

    async fn records_service(&self) -> Result<&Arc<dyn TopNRecordsQueryService>> {
        self.records_service
            .get_or_try_init(|| async {
                self.lookups.fetch_add(1, Ordering::AcqRel);
                self.locator
                    .find::<dyn TopNRecordsQueryService>()
                    .map_err(|e| {
                        error!("Cannot resolve sampled records service: {}", e);
                        e
                    })
            })
            .await
    }

    /// Metric type metadata. Not implemented yet, always `Unknown`.
    pub async fn type_of_metrics(&self, name: &str) -> Result<MetricsType> {
        debug!("type_of_metrics('{}') is not implemented", name);
        Ok(MetricsType::Unknown)
    }

    /// Single value read. Not implemented yet, always zero.
    pub async fn read_metrics_value(
        &self,
        condition: &MetricsCondition,
        _duration: &QueryDuration,
    ) -> Result<i64> {
        debug!("read_metrics_value('{}') is not implemented", condition.name);
        Ok(0)
    }

    /// Time-series read. Not implemented yet, always empty.
    pub async fn read_metrics_values(
        &self,
        condition: &MetricsCondition,
        _duration: &QueryDuration,
    ) -> Result<Vec<MetricsValues>> {
        debug!("read_metrics_values('{}') is not implemented", condition.name);
        Ok(Vec::new())
    }

    /// Labeled time-series read. Not implemented yet, always empty.
    pub async fn read_labeled_metrics_values(
        &self,
        condition: &MetricsCondition,
        labels: &[String],
        _duration: &QueryDuration,
    ) -> Result<Vec<MetricsValues>> {
        debug!(
            "read_labeled_metrics_values('{}', {:?}) is not implemented",
            condition.name, labels
        );
        Ok(Vec::new())
    }

    /// Heatmap read. Not implemented yet, always an empty heatmap.
    pub async fn read_heat_map(
        &self,
        condition: &MetricsCondition,
        _duration: &QueryDuration,
    ) -> Result<HeatMap> {
        debug!("read_heat_map('{}') is not implemented", condition.name);
        Ok(HeatMap::default())
    }

    /// Ranks the entities of `condition.name`, scoped to the parent service
    /// when the condition carries one.
    pub async fn sort_metrics(
        &self,
        condition: &TopNCondition,
        duration: &QueryDuration,
    ) -> Result<Vec<TopNEntity>> {
        let started = Instant::now();
        let result = async {
            self.query_service()
                .await?
                .sort_metrics(condition, duration)
                .await
        }
        .await;

        record_outcome("sort_metrics", started, result.as_ref().map(Vec::len));
        result
    }

    pub async fn read_sampled_records(
        &self,
        condition: &TopNCondition,
        duration: &QueryDuration,
    ) -> Result<Vec<SelectedRecord>> {
        let started = Instant::now();
        let result = async {
            self.records_service()
                .await?
                .read_sampled_records(condition, duration)
                .await
        }
        .await;

        record_outcome("read_sampled_records", started, result.as_ref().map(Vec::len));
        result
    }
}

fn record_outcome(
    operation: &'static str,
    started: Instant,
    outcome: std::result::Result<usize, &crate::error::QueryError>,
) {
    metrics::histogram!("topn_query_duration_seconds", "operation" => operation)
        .record(started.elapsed().as_secs_f64());

    match outcome {
        Ok(rows) => {
            metrics::counter!("topn_queries_total", "operation" => operation, "outcome" => "ok")
                .increment(1);
            metrics::histogram!("topn_query_rows", "operation" => operation).record(rows as f64);
        }
        Err(e) => {
            metrics::counter!(
                "topn_queries_total",
                "operation" => operation,
                "outcome" => e.kind()
            )
            .increment(1);
        }
    }
}
