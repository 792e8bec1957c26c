//! Sampled records: individual slow or notable events kept alongside the
//! aggregated metrics, e.g. the slowest database statements of a service.

use crate::types::{Order, SelectedRecord, TimeBucketRange};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SampledRecord {
    /// Name of the record stream, e.g. `top_n_database_statement`.
    pub name: String,
    pub entity_id: String,
    #[serde(default)]
    pub service_id: Option<String>,
    pub statement: String,
    #[serde(default)]
    pub trace_id: Option<String>,
    pub value: i64,
    pub time_bucket: i64,
}

impl SampledRecord {
    fn to_selected(&self) -> SelectedRecord {
        SelectedRecord {
            name: self.statement.clone(),
            id: self.entity_id.clone(),
            value: self.value.to_string(),
            ref_id: self.trace_id.clone(),
        }
    }
}

/// In-memory record store answering ranked, filtered reads.
#[derive(Default)]
pub struct SampledRecordStore {
    records: Arc<RwLock<Vec<SampledRecord>>>,
}

impl SampledRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records(records: Vec<SampledRecord>) -> Self {
        Self {
            records: Arc::new(RwLock::new(records)),
        }
    }

    pub async fn record(&self, record: SampledRecord) {
        self.records.write().await.push(record);
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    pub async fn read(
        &self,
        name: &str,
        range: TimeBucketRange,
        service_id: Option<&str>,
        limit: usize,
        order: Order,
    ) -> Vec<SelectedRecord> {
        let records = self.records.read().await;

        let mut selected: Vec<&SampledRecord> = records
            .iter()
            .filter(|r| r.name == name && range.contains(r.time_bucket))
            .filter(|r| match service_id {
                Some(id) => r.service_id.as_deref() == Some(id),
                None => true,
            })
            .collect();

        selected.sort_by(|a, b| {
            let by_value = if order.is_asc() {
                a.value.cmp(&b.value)
            } else {
                b.value.cmp(&a.value)
            };
            by_value.then_with(|| a.entity_id.cmp(&b.entity_id))
        });

        selected
            .into_iter()
            .take(limit)
            .map(SampledRecord::to_selected)
            .collect()
    }
}
