use std::sync::Arc;
use std::time::Duration;

use topn_core::{
    AggregationQueryService, DownSampling, ElasticsearchBackend, InMemoryColumnStore,
    MetricDefinition, MetricsQuery, Order, QueryDuration, SampledRecord, SampledRecordStore,
    SampledRecordsService, Scope, ServiceLocator, StoredRow, TopNAggregationEngine, TopNCondition,
    TopNEntity, TopNQueryService, TopNRecordsQueryService, ValueColumnMetadata,
};

fn metadata() -> ValueColumnMetadata {
    vec![
        MetricDefinition::new("cpu", Scope::Service),
        MetricDefinition::new("instance_cpu", Scope::ServiceInstance),
    ]
    .into_iter()
    .collect()
}

async fn facade() -> MetricsQuery {
    let store = InMemoryColumnStore::new();
    store
        .insert_all(
            "cpu",
            DownSampling::Minute,
            vec![
                StoredRow::new("a", 100, 10.0),
                StoredRow::new("b", 150, 30.0),
                StoredRow::new("c", 200, 20.0),
            ],
        )
        .await;
    store
        .insert_all(
            "instance_cpu",
            DownSampling::Minute,
            vec![
                StoredRow::new("x", 120, 5.0).with_service("parent-1"),
                StoredRow::new("y", 120, 70.0).with_service("parent-2"),
                StoredRow::new("z", 130, 40.0).with_service("parent-2"),
            ],
        )
        .await;

    let records = SampledRecordStore::from_records(vec![SampledRecord {
        name: "slow_statements".to_string(),
        entity_id: "stmt-1".to_string(),
        service_id: Some("parent-1".to_string()),
        statement: "SELECT * FROM orders".to_string(),
        trace_id: Some("trace-1".to_string()),
        value: 1200,
        time_bucket: 150,
    }]);

    let engine = TopNAggregationEngine::new(Arc::new(store));
    let locator = ServiceLocator::new()
        .with::<dyn AggregationQueryService>(Arc::new(TopNQueryService::new(engine, metadata())))
        .with::<dyn TopNRecordsQueryService>(Arc::new(SampledRecordsService::new(Arc::new(
            records,
        ))));

    MetricsQuery::new(Arc::new(locator))
}

fn window() -> QueryDuration {
    QueryDuration::new(100, 200, DownSampling::Minute)
}

#[tokio::test]
async fn top_two_descending() {
    let facade = facade().await;
    let result = facade
        .sort_metrics(&TopNCondition::new("cpu", 2, Order::Desc), &window())
        .await
        .unwrap();

    assert_eq!(result, vec![TopNEntity::new("b", 30), TopNEntity::new("c", 20)]);
}

#[tokio::test]
async fn bottom_two_ascending() {
    let facade = facade().await;
    let result = facade
        .sort_metrics(&TopNCondition::new("cpu", 2, Order::Asc), &window())
        .await
        .unwrap();

    assert_eq!(result, vec![TopNEntity::new("a", 10), TopNEntity::new("c", 20)]);
}

#[tokio::test]
async fn scoped_result_is_not_padded() {
    let facade = facade().await;
    let result = facade
        .sort_metrics(
            &TopNCondition::new("instance_cpu", 10, Order::Desc).with_parent_service("parent-1"),
            &window(),
        )
        .await
        .unwrap();

    assert_eq!(result, vec![TopNEntity::new("x", 5)]);
}

#[tokio::test]
async fn empty_window_is_empty_result() {
    let facade = facade().await;
    let result = facade
        .sort_metrics(
            &TopNCondition::new("cpu", 5, Order::Desc),
            &QueryDuration::new(500, 600, DownSampling::Minute),
        )
        .await
        .unwrap();

    assert!(result.is_empty());
}

#[tokio::test]
async fn single_bucket_window() {
    let facade = facade().await;
    let result = facade
        .sort_metrics(
            &TopNCondition::new("cpu", 5, Order::Desc),
            &QueryDuration::new(150, 150, DownSampling::Minute),
        )
        .await
        .unwrap();

    assert_eq!(result, vec![TopNEntity::new("b", 30)]);
}

#[tokio::test]
async fn other_granularity_is_a_missing_index() {
    let facade = facade().await;
    let err = facade
        .sort_metrics(
            &TopNCondition::new("cpu", 5, Order::Desc),
            &QueryDuration::new(100, 200, DownSampling::Hour),
        )
        .await
        .unwrap_err();

    assert!(err.is_storage());
}

#[tokio::test]
async fn sampled_records_are_delegated() {
    let facade = facade().await;
    let records = facade
        .read_sampled_records(
            &TopNCondition::new("slow_statements", 5, Order::Desc).with_parent_service("parent-1"),
            &window(),
        )
        .await
        .unwrap();

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].name, "SELECT * FROM orders");
    assert_eq!(records[0].value, "1200");
}

#[tokio::test]
async fn unreachable_storage_fails_without_partial_result() {
    let backend =
        ElasticsearchBackend::new("http://127.0.0.1:1", Duration::from_secs(2), None).unwrap();
    let engine = TopNAggregationEngine::new(Arc::new(backend));
    let locator = ServiceLocator::new()
        .with::<dyn AggregationQueryService>(Arc::new(TopNQueryService::new(engine, metadata())));
    let facade = MetricsQuery::with_services(Arc::new(
        locator.with::<dyn TopNRecordsQueryService>(Arc::new(SampledRecordsService::new(
            Arc::new(SampledRecordStore::new()),
        ))),
    ))
    .unwrap();

    let result = facade
        .sort_metrics(&TopNCondition::new("cpu", 2, Order::Desc), &window())
        .await;

    match result {
        Err(err) => assert!(err.is_storage(), "unexpected error: {}", err),
        Ok(entities) => panic!("expected a storage failure, got {:?}", entities),
    }
}

#[tokio::test]
async fn concurrent_queries_share_one_facade() {
    let facade = Arc::new(facade().await);

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let facade = facade.clone();
            tokio::spawn(async move {
                let order = if i % 2 == 0 { Order::Desc } else { Order::Asc };
                facade
                    .sort_metrics(&TopNCondition::new("cpu", 3, order), &window())
                    .await
            })
        })
        .collect();

    for handle in handles {
        let result = handle.await.unwrap().unwrap();
        assert_eq!(result.len(), 3);
    }
}
