use topn_config::{parse_config_from_file, parse_plan_from_file, run_plan, QueryKind};
use topn_core::TopNEntity;

#[tokio::test]
async fn plan_from_fixture_files() {
    let config = parse_config_from_file("tests/fixtures/engine.yaml").await.unwrap();
    let plan = parse_plan_from_file("tests/fixtures/plan.toml").await.unwrap();

    let result = run_plan(&config, &plan).await.unwrap();
    assert_eq!(result.plan_name, "incident-review");
    assert_eq!(result.failure_count(), 0);

    let busiest = &result.outcomes[0];
    assert_eq!(
        busiest.entities,
        vec![TopNEntity::new("orders", 300), TopNEntity::new("gateway", 130)]
    );

    let slowest = &result.outcomes[1];
    assert_eq!(
        slowest.entities,
        vec![TopNEntity::new("orders-2", 410), TopNEntity::new("orders-1", 85)]
    );

    let fastest = &result.outcomes[2];
    let ids: Vec<&str> = fastest.entities.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, vec!["GET /health", "GET /orders", "POST /orders"]);

    let statements = &result.outcomes[3];
    assert_eq!(statements.kind, QueryKind::SampledRecords);
    assert_eq!(statements.records.len(), 2);
    assert_eq!(statements.records[0].ref_id.as_deref(), Some("4f2a"));
}

#[tokio::test]
async fn missing_dataset_file_is_reported() {
    let mut config = parse_config_from_file("tests/fixtures/engine.yaml").await.unwrap();
    config.storage = topn_config::StorageConfig::Memory {
        dataset: Some("tests/fixtures/does-not-exist.json".into()),
    };
    let plan = parse_plan_from_file("tests/fixtures/plan.toml").await.unwrap();

    assert!(run_plan(&config, &plan).await.is_err());
}
