//! Property-based checks of the ranking contract against the in-memory store.

use proptest::prelude::*;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::runtime::Runtime;
use topn_core::{
    Dataset, DownSampling, IndexData, InMemoryColumnStore, Order, QueryDuration, StoredRow,
    TopNAggregationEngine, TopNEntity, TopNQuery, SERVICE_ID,
};

const SERVICES: usize = 3;

fn service_of(entity: usize) -> String {
    format!("svc-{}", entity % SERVICES)
}

fn engine(rows: &[(usize, i64, u32)]) -> TopNAggregationEngine {
    let dataset = Dataset {
        indices: vec![IndexData {
            name: "metric".to_string(),
            step: DownSampling::Minute,
            rows: rows
                .iter()
                .map(|(entity, bucket, value)| {
                    StoredRow::new(format!("e{}", entity), *bucket, *value as f64)
                        .with_service(service_of(*entity))
                })
                .collect(),
        }],
        records: Vec::new(),
    };
    TopNAggregationEngine::new(Arc::new(InMemoryColumnStore::from_dataset(&dataset)))
}

fn rows_strategy() -> impl Strategy<Value = Vec<(usize, i64, u32)>> {
    prop::collection::vec((0usize..10, 0i64..20, 0u32..1000), 0..60)
}

fn is_ordered(result: &[TopNEntity], order: Order) -> bool {
    result.windows(2).all(|pair| match order {
        Order::Desc => pair[0].value >= pair[1].value,
        Order::Asc => pair[0].value <= pair[1].value,
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn result_is_bounded_and_ordered(
        rows in rows_strategy(),
        limit in 1usize..12,
        start in 0i64..20,
        span in 0i64..20,
        asc in any::<bool>(),
    ) {
        let rt = Runtime::new().unwrap();
        let engine = engine(&rows);
        let order = if asc { Order::Asc } else { Order::Desc };
        let duration = QueryDuration::new(start, start + span, DownSampling::Minute);
        let query = TopNQuery::new("metric", "value", limit, &duration, order).unwrap();

        let first = rt.block_on(engine.topn_by_time_range(&query)).unwrap();
        let second = rt.block_on(engine.topn_by_time_range(&query)).unwrap();

        prop_assert!(first.len() <= limit);
        prop_assert!(is_ordered(&first, order));
        prop_assert_eq!(first, second);
    }

    #[test]
    fn scoped_result_is_the_parent_slice_of_unscoped(
        rows in rows_strategy(),
        service in 0usize..SERVICES,
        asc in any::<bool>(),
    ) {
        let rt = Runtime::new().unwrap();
        let engine = engine(&rows);
        let order = if asc { Order::Asc } else { Order::Desc };
        let duration = QueryDuration::new(0, 19, DownSampling::Minute);
        // Larger than the number of distinct entities, so nothing is cut.
        let query = TopNQuery::new("metric", "value", 100, &duration, order).unwrap();
        let parent = format!("svc-{}", service);

        let unscoped = rt.block_on(engine.topn_by_time_range(&query)).unwrap();
        let scoped = rt
            .block_on(engine.topn_by_time_range_and_parent(SERVICE_ID, &parent, &query))
            .unwrap();

        let expected: Vec<TopNEntity> = unscoped
            .iter()
            .filter(|entity| {
                let index: usize = entity.id[1..].parse().unwrap();
                service_of(index) == parent
            })
            .cloned()
            .collect();
        prop_assert_eq!(scoped, expected);
    }

    #[test]
    fn single_bucket_only_returns_entities_with_data_there(
        rows in rows_strategy(),
        bucket in 0i64..20,
    ) {
        let rt = Runtime::new().unwrap();
        let engine = engine(&rows);
        let duration = QueryDuration::new(bucket, bucket, DownSampling::Minute);
        let query = TopNQuery::new("metric", "value", 100, &duration, Order::Desc).unwrap();

        let result = rt.block_on(engine.topn_by_time_range(&query)).unwrap();
        let present: HashSet<String> = rows
            .iter()
            .filter(|(_, b, _)| *b == bucket)
            .map(|(entity, _, _)| format!("e{}", entity))
            .collect();

        prop_assert_eq!(result.len(), present.len());
        for entity in &result {
            prop_assert!(present.contains(&entity.id));
        }
    }
}
