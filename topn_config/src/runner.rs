use crate::{
    config::{EngineConfig, QueryKind, QueryPlan, QuerySpec, StorageConfig},
    parser::load_dataset_from_file,
};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use topn_core::{
    AggregationQueryService, Dataset, ElasticsearchBackend, InMemoryColumnStore, MetricsQuery,
    SampledRecordStore, SampledRecordsService, SelectedRecord, ServiceLocator,
    TopNAggregationEngine, TopNCondition, TopNEntity, TopNQueryService, TopNRecordsQueryService,
    ValueColumnMetadata,
};
use tracing::{info, warn};
use uuid::Uuid;

/// Wires the services described by `config` into a locator.
///
/// The in-memory storage also serves sampled records; Elasticsearch only
/// provides the aggregation service.
pub fn build_locator(config: &EngineConfig, dataset: Option<&Dataset>) -> anyhow::Result<ServiceLocator> {
    let metadata: ValueColumnMetadata = config.metrics.iter().cloned().collect();
    let mut locator = ServiceLocator::new();

    match &config.storage {
        StorageConfig::Memory { .. } => {
            let empty = Dataset::default();
            let dataset = dataset.unwrap_or(&empty);

            let store = InMemoryColumnStore::from_dataset(dataset);
            let engine = TopNAggregationEngine::new(Arc::new(store));
            locator.register::<dyn AggregationQueryService>(Arc::new(TopNQueryService::new(
                engine, metadata,
            )));

            let records = SampledRecordStore::from_records(dataset.records.clone());
            locator.register::<dyn TopNRecordsQueryService>(Arc::new(
                SampledRecordsService::new(Arc::new(records)),
            ));
        }
        StorageConfig::Elasticsearch {
            url,
            timeout,
            namespace,
        } => {
            let backend = ElasticsearchBackend::new(url.as_str(), *timeout, namespace.clone())?;
            let engine = TopNAggregationEngine::new(Arc::new(backend));
            locator.register::<dyn AggregationQueryService>(Arc::new(TopNQueryService::new(
                engine, metadata,
            )));
        }
    }

    info!(
        "Engine '{}' wired with {} storage ({} services)",
        config.name,
        config.storage.kind(),
        locator.list().len()
    );

    Ok(locator)
}

pub struct PlanRunner {
    query: Arc<MetricsQuery>,
    default_top_n: usize,
}

impl PlanRunner {
    pub fn new(query: MetricsQuery, default_top_n: usize) -> Self {
        Self {
            query: Arc::new(query),
            default_top_n,
        }
    }

    pub fn from_config(config: &EngineConfig, dataset: Option<&Dataset>) -> anyhow::Result<Self> {
        config.validate()?;
        let locator = build_locator(config, dataset)?;
        Ok(Self::new(
            MetricsQuery::new(Arc::new(locator)),
            config.default_top_n,
        ))
    }

    /// Like [`PlanRunner::from_config`], reading the dataset fixture the
    /// configuration points at.
    pub async fn load(config: &EngineConfig) -> anyhow::Result<Self> {
        let dataset = match &config.storage {
            StorageConfig::Memory {
                dataset: Some(path),
            } => Some(
                load_dataset_from_file(path)
                    .await
                    .with_context(|| format!("Loading dataset for engine '{}'", config.name))?,
            ),
            _ => None,
        };

        Self::from_config(config, dataset.as_ref())
    }

    pub fn query(&self) -> &MetricsQuery {
        &self.query
    }

    pub async fn run(&self, plan: &QueryPlan) -> anyhow::Result<PlanResult> {
        info!("Starting plan: {}", plan.name);
        plan.validate()?;

        let start_time = Instant::now();

        let outcomes = if plan.parallel {
            let handles: Vec<_> = plan
                .queries
                .iter()
                .cloned()
                .map(|spec| {
                    let query = self.query.clone();
                    let default_top_n = self.default_top_n;
                    tokio::spawn(async move { execute(&query, &spec, default_top_n).await })
                })
                .collect();

            let mut outcomes = Vec::with_capacity(handles.len());
            for joined in futures::future::join_all(handles).await {
                outcomes.push(joined.context("Query task panicked")?);
            }
            outcomes
        } else {
            let mut outcomes = Vec::with_capacity(plan.queries.len());
            for spec in &plan.queries {
                outcomes.push(execute(&self.query, spec, self.default_top_n).await);
            }
            outcomes
        };

        let total_duration = start_time.elapsed();
        info!(
            "Plan '{}' completed in {:?} ({} queries)",
            plan.name,
            total_duration,
            outcomes.len()
        );

        Ok(PlanResult {
            plan_name: plan.name.clone(),
            total_duration,
            outcomes,
        })
    }
}

async fn execute(query: &MetricsQuery, spec: &QuerySpec, default_top_n: usize) -> QueryOutcome {
    let mut condition = TopNCondition::new(
        spec.metric.clone(),
        spec.top_n.unwrap_or(default_top_n),
        spec.order,
    );
    condition.parent_service = spec.parent_service.clone();
    let duration = spec.duration.to_query_duration();

    let started = Instant::now();
    let mut outcome = QueryOutcome {
        id: Uuid::new_v4(),
        label: spec.display_name().to_string(),
        kind: spec.kind,
        metric: spec.metric.clone(),
        duration: Duration::ZERO,
        entities: Vec::new(),
        records: Vec::new(),
        error: None,
    };

    let result = match spec.kind {
        QueryKind::SortMetrics => query
            .sort_metrics(&condition, &duration)
            .await
            .map(|entities| outcome.entities = entities),
        QueryKind::SampledRecords => query
            .read_sampled_records(&condition, &duration)
            .await
            .map(|records| outcome.records = records),
    };

    outcome.duration = started.elapsed();
    if let Err(e) = result {
        warn!("Query '{}' failed: {}", outcome.label, e);
        outcome.error = Some(e.to_string());
    }

    outcome
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryOutcome {
    pub id: Uuid,
    pub label: String,
    pub kind: QueryKind,
    pub metric: String,
    #[serde(with = "crate::config::humantime_serde")]
    pub duration: Duration,
    #[serde(default)]
    pub entities: Vec<TopNEntity>,
    #[serde(default)]
    pub records: Vec<SelectedRecord>,
    #[serde(default)]
    pub error: Option<String>,
}

impl QueryOutcome {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    pub fn row_count(&self) -> usize {
        self.entities.len() + self.records.len()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanResult {
    pub plan_name: String,
    #[serde(with = "crate::config::humantime_serde")]
    pub total_duration: Duration,
    pub outcomes: Vec<QueryOutcome>,
}

impl PlanResult {
    pub fn success_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    pub fn failure_count(&self) -> usize {
        self.outcomes.len() - self.success_count()
    }

    pub fn success_rate(&self) -> f64 {
        if self.outcomes.is_empty() {
            return 0.0;
        }
        self.success_count() as f64 / self.outcomes.len() as f64
    }

    pub fn average_query_duration(&self) -> Duration {
        if self.outcomes.is_empty() {
            return Duration::ZERO;
        }

        let total: Duration = self.outcomes.iter().map(|o| o.duration).sum();
        total / self.outcomes.len() as u32
    }
}

pub async fn run_plan(config: &EngineConfig, plan: &QueryPlan) -> anyhow::Result<PlanResult> {
    let runner = PlanRunner::load(config).await?;
    runner.run(plan).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use topn_core::{DownSampling, IndexData, Order, Scope, StoredRow};

    fn dataset() -> Dataset {
        Dataset {
            indices: vec![IndexData {
                name: "service_cpm".to_string(),
                step: DownSampling::Minute,
                rows: vec![
                    StoredRow::new("a", 100, 10.0),
                    StoredRow::new("b", 150, 30.0),
                    StoredRow::new("c", 200, 20.0),
                ],
            }],
            records: Vec::new(),
        }
    }

    fn config() -> EngineConfig {
        EngineConfig::builder()
            .name("test")
            .metric("service_cpm", Scope::Service)
            .default_top_n(2)
            .build()
    }

    #[tokio::test]
    async fn test_sequential_plan() {
        let runner = PlanRunner::from_config(&config(), Some(&dataset())).unwrap();
        let plan = QueryPlan::builder()
            .name("plan")
            .add_query(QuerySpec::sort_metrics("service_cpm", 100, 200))
            .add_query(QuerySpec::sort_metrics("service_cpm", 100, 200).order(Order::Asc).top_n(1))
            .add_query(QuerySpec::sort_metrics("missing_metric", 100, 200))
            .build();

        let result = runner.run(&plan).await.unwrap();

        assert_eq!(result.outcomes.len(), 3);
        assert_eq!(result.success_count(), 2);
        assert_eq!(result.failure_count(), 1);

        let ids: Vec<&str> = result.outcomes[0].entities.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c"]);
        assert_eq!(result.outcomes[1].entities, vec![TopNEntity::new("a", 10)]);
        assert!(result.outcomes[2].error.as_deref().unwrap().contains("missing_metric"));
    }

    #[tokio::test]
    async fn test_parallel_plan_keeps_query_order() {
        let runner = PlanRunner::from_config(&config(), Some(&dataset())).unwrap();
        let plan = QueryPlan::builder()
            .name("parallel")
            .parallel(true)
            .add_query(QuerySpec::sort_metrics("service_cpm", 100, 100))
            .add_query(QuerySpec::sort_metrics("service_cpm", 150, 150))
            .add_query(QuerySpec::sort_metrics("service_cpm", 200, 200))
            .build();

        let result = runner.run(&plan).await.unwrap();
        let firsts: Vec<&str> = result
            .outcomes
            .iter()
            .map(|o| o.entities[0].id.as_str())
            .collect();
        assert_eq!(firsts, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_elasticsearch_wiring_has_no_records_service() {
        let config = EngineConfig::builder()
            .name("remote")
            .storage(StorageConfig::Elasticsearch {
                url: "http://127.0.0.1:1".to_string(),
                timeout: Duration::from_secs(1),
                namespace: None,
            })
            .build();

        let locator = build_locator(&config, None).unwrap();
        assert!(locator.contains::<dyn AggregationQueryService>());
        assert!(!locator.contains::<dyn TopNRecordsQueryService>());
    }

    #[test]
    fn test_plan_result_serialization() {
        let result = PlanResult {
            plan_name: "plan".to_string(),
            total_duration: Duration::from_millis(1500),
            outcomes: vec![QueryOutcome {
                id: Uuid::new_v4(),
                label: "cpu".to_string(),
                kind: QueryKind::SortMetrics,
                metric: "cpu".to_string(),
                duration: Duration::from_millis(20),
                entities: vec![TopNEntity::new("a", 1)],
                records: Vec::new(),
                error: None,
            }],
        };

        let json = serde_json::to_string(&result).unwrap();
        let parsed: PlanResult = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.total_duration, Duration::from_millis(1500));
        assert_eq!(parsed.average_query_duration(), Duration::from_millis(20));
        assert_eq!(parsed.success_rate(), 1.0);
    }
}
