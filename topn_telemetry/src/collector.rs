use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use topn_config::{PlanResult, QueryOutcome};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum QueryEventType {
    Latency(Duration),
    Success { rows: usize },
    Error { error_type: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryEvent {
    pub event_type: QueryEventType,
    pub timestamp: DateTime<Utc>,
    pub labels: HashMap<String, String>,
}

impl QueryEvent {
    fn new(event_type: QueryEventType, labels: HashMap<String, String>) -> Self {
        Self {
            event_type,
            timestamp: Utc::now(),
            labels,
        }
    }
}

pub struct QueryTelemetryCollector {
    events: Arc<RwLock<Vec<QueryEvent>>>,
}

impl QueryTelemetryCollector {
    pub fn new() -> Self {
        Self {
            events: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub async fn record(&self, event: QueryEvent) {
        self.events.write().await.push(event);
    }

    pub async fn record_latency(&self, latency: Duration) {
        self.record(QueryEvent::new(QueryEventType::Latency(latency), HashMap::new()))
            .await;
    }

    pub async fn record_success(&self, rows: usize) {
        self.record(QueryEvent::new(QueryEventType::Success { rows }, HashMap::new()))
            .await;
    }

    pub async fn record_error(&self, error_type: impl Into<String>) {
        self.record(QueryEvent::new(
            QueryEventType::Error {
                error_type: error_type.into(),
            },
            HashMap::new(),
        ))
        .await;
    }

    /// Records latency plus success or error of one executed plan query,
    /// labelled with its metric and label.
    pub async fn record_outcome(&self, outcome: &QueryOutcome) {
        let mut labels = HashMap::new();
        labels.insert("metric".to_string(), outcome.metric.clone());
        labels.insert("label".to_string(), outcome.label.clone());

        let mut events = self.events.write().await;
        events.push(QueryEvent::new(
            QueryEventType::Latency(outcome.duration),
            labels.clone(),
        ));
        let event_type = match &outcome.error {
            None => QueryEventType::Success {
                rows: outcome.row_count(),
            },
            Some(error) => QueryEventType::Error {
                error_type: error.clone(),
            },
        };
        events.push(QueryEvent::new(event_type, labels));
    }

    pub async fn record_plan(&self, result: &PlanResult) {
        for outcome in &result.outcomes {
            self.record_outcome(outcome).await;
        }
    }

    pub async fn get_events(&self) -> Vec<QueryEvent> {
        self.events.read().await.clone()
    }

    pub async fn clear(&self) {
        self.events.write().await.clear();
    }
}

impl Default for QueryTelemetryCollector {
    fn default() -> Self {
        Self::new()
    }
}
