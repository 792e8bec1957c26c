use super::{AggregateBucket, AggregationQueryBackend, AggregationRequest};
use crate::{
    error::{QueryError, Result},
    predicate::Predicate,
    types::DownSampling,
};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, warn};

/// Grouped aggregation over an Elasticsearch cluster using a `terms`
/// aggregation with an `avg` sub-aggregation.
pub struct ElasticsearchBackend {
    client: reqwest::Client,
    base_url: String,
    namespace: Option<String>,
}

impl ElasticsearchBackend {
    pub fn new(
        base_url: impl Into<String>,
        timeout: Duration,
        namespace: Option<String>,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                QueryError::Configuration(format!("Cannot build Elasticsearch client: {}", e))
            })?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            namespace: namespace.filter(|ns| !ns.is_empty()),
        })
    }

    /// Physical index holding `index_name` at the given granularity.
    pub fn physical_index(&self, index_name: &str, downsampling: DownSampling) -> String {
        match &self.namespace {
            Some(ns) => format!("{}_{}_{}", ns, index_name, downsampling.name()),
            None => format!("{}_{}", index_name, downsampling.name()),
        }
    }

    pub fn search_body(request: &AggregationRequest) -> Value {
        let must: Vec<Value> = request
            .predicate
            .predicates()
            .iter()
            .map(|predicate| match predicate {
                Predicate::Range {
                    column,
                    lower,
                    upper,
                } => json!({ "range": { column.as_str(): { "gte": lower, "lte": upper } } }),
                Predicate::Equals { column, value } => {
                    json!({ "term": { column.as_str(): value } })
                }
            })
            .collect();

        let direction = if request.order.is_asc() { "asc" } else { "desc" };
        let value_column = request.value_column.as_str();

        json!({
            "size": 0,
            "query": { "bool": { "must": must } },
            "aggregations": {
                request.group_column.as_str(): {
                    "terms": {
                        "field": request.group_column,
                        "size": request.limit,
                        "order": [
                            { value_column: direction },
                            { "_key": "asc" }
                        ]
                    },
                    "aggregations": {
                        value_column: { "avg": { "field": value_column } }
                    }
                }
            }
        })
    }

    pub fn parse_response(request: &AggregationRequest, body: &Value) -> Result<Vec<AggregateBucket>> {
        let buckets = body
            .get("aggregations")
            .and_then(|aggs| aggs.get(&request.group_column))
            .and_then(|terms| terms.get("buckets"))
            .and_then(Value::as_array)
            .ok_or_else(|| {
                QueryError::StorageIo(format!(
                    "Response for '{}' has no '{}' aggregation",
                    request.index_name, request.group_column
                ))
            })?;

        buckets
            .iter()
            .map(|bucket| {
                let key = match bucket.get("key") {
                    Some(Value::String(key)) => key.clone(),
                    Some(Value::Number(key)) => key.to_string(),
                    _ => {
                        return Err(QueryError::StorageIo(
                            "Aggregation bucket without a key".to_string(),
                        ))
                    }
                };
                // An average over no values comes back as null.
                let value = bucket
                    .get(&request.value_column)
                    .and_then(|avg| avg.get("value"))
                    .and_then(Value::as_f64)
                    .unwrap_or(0.0);
                Ok(AggregateBucket { key, value })
            })
            .collect()
    }
}

#[async_trait]
impl AggregationQueryBackend for ElasticsearchBackend {
    fn name(&self) -> &str {
        "elasticsearch"
    }

    async fn aggregate(&self, request: &AggregationRequest) -> Result<Vec<AggregateBucket>> {
        let index = self.physical_index(&request.index_name, request.downsampling);
        let url = format!("{}/{}/_search", self.base_url, index);
        let body = Self::search_body(request);

        debug!("Searching {} with {}", url, body);

        let response = self.client.post(&url).json(&body).send().await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            warn!("Search on '{}' failed with {}: {}", index, status, text);
            return Err(QueryError::StorageIo(format!(
                "Search on '{}' failed with status {}",
                index, status
            )));
        }

        let body: Value = response.json().await?;
        Self::parse_response(request, &body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predicate::ScopeFilterBuilder;
    use crate::types::{Order, TimeBucketRange, ENTITY_ID, SERVICE_ID};

    fn request(parent: Option<&str>) -> AggregationRequest {
        AggregationRequest {
            index_name: "service_instance_cpm".to_string(),
            downsampling: DownSampling::Hour,
            value_column: "value".to_string(),
            group_column: ENTITY_ID.to_string(),
            predicate: ScopeFilterBuilder::new(TimeBucketRange::new(100, 200).unwrap())
                .maybe_parent(SERVICE_ID, parent)
                .build(),
            limit: 5,
            order: Order::Asc,
        }
    }

    #[test]
    fn test_search_body_translation() {
        let body = ElasticsearchBackend::search_body(&request(Some("svc")));

        assert_eq!(body["size"], 0);
        let must = body["query"]["bool"]["must"].as_array().unwrap();
        assert_eq!(must.len(), 2);
        assert_eq!(must[0]["range"]["time_bucket"]["gte"], 100);
        assert_eq!(must[0]["range"]["time_bucket"]["lte"], 200);
        assert_eq!(must[1]["term"]["service_id"], "svc");

        let terms = &body["aggregations"]["entity_id"]["terms"];
        assert_eq!(terms["field"], "entity_id");
        assert_eq!(terms["size"], 5);
        assert_eq!(terms["order"][0]["value"], "asc");
        assert_eq!(terms["order"][1]["_key"], "asc");
        assert_eq!(
            body["aggregations"]["entity_id"]["aggregations"]["value"]["avg"]["field"],
            "value"
        );
    }

    #[test]
    fn test_parse_response() {
        let body = json!({
            "aggregations": {
                "entity_id": {
                    "buckets": [
                        { "key": "b", "doc_count": 2, "value": { "value": 30.7 } },
                        { "key": "c", "doc_count": 1, "value": { "value": null } }
                    ]
                }
            }
        });

        let buckets = ElasticsearchBackend::parse_response(&request(None), &body).unwrap();
        assert_eq!(
            buckets,
            vec![AggregateBucket::new("b", 30.7), AggregateBucket::new("c", 0.0)]
        );
    }

    #[test]
    fn test_parse_response_without_aggregation() {
        let body = json!({ "hits": { "total": 0 } });
        let err = ElasticsearchBackend::parse_response(&request(None), &body).unwrap_err();
        assert!(err.is_storage());
    }

    #[test]
    fn test_physical_index_naming() {
        let backend =
            ElasticsearchBackend::new("http://localhost:9200/", Duration::from_secs(1), None)
                .unwrap();
        assert_eq!(
            backend.physical_index("service_cpm", DownSampling::Minute),
            "service_cpm_minute"
        );

        let backend = ElasticsearchBackend::new(
            "http://localhost:9200",
            Duration::from_secs(1),
            Some("prod".to_string()),
        )
        .unwrap();
        assert_eq!(
            backend.physical_index("service_cpm", DownSampling::Day),
            "prod_service_cpm_day"
        );
    }

    #[tokio::test]
    async fn test_unreachable_cluster_is_storage_error() {
        let backend =
            ElasticsearchBackend::new("http://127.0.0.1:1", Duration::from_secs(2), None).unwrap();
        let err = backend.aggregate(&request(None)).await.unwrap_err();
        assert!(err.is_storage());
    }
}
