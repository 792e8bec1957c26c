use super::{AggregateBucket, AggregationQueryBackend, AggregationRequest};
use crate::{
    error::{QueryError, Result},
    predicate::Predicate,
    records::SampledRecord,
    types::{DownSampling, ENTITY_ID, SERVICE_ID, TIME_BUCKET},
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Row as it is written by the ingestion side: one entity in one bucket.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoredRow {
    pub entity_id: String,
    pub time_bucket: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_id: Option<String>,
    /// Numeric value columns, e.g. `value`, `summation`, `count`.
    #[serde(flatten)]
    pub values: BTreeMap<String, f64>,
}

impl StoredRow {
    pub fn new(entity_id: impl Into<String>, time_bucket: i64, value: f64) -> Self {
        let mut values = BTreeMap::new();
        values.insert("value".to_string(), value);
        Self {
            entity_id: entity_id.into(),
            time_bucket,
            service_id: None,
            values,
        }
    }

    pub fn with_service(mut self, service_id: impl Into<String>) -> Self {
        self.service_id = Some(service_id.into());
        self
    }

    pub fn with_value(mut self, column: impl Into<String>, value: f64) -> Self {
        self.values.insert(column.into(), value);
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexData {
    pub name: String,
    #[serde(default)]
    pub step: DownSampling,
    #[serde(default)]
    pub rows: Vec<StoredRow>,
}

/// Fixture contents for the in-memory store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Dataset {
    #[serde(default)]
    pub indices: Vec<IndexData>,
    #[serde(default)]
    pub records: Vec<SampledRecord>,
}

/// Column-oriented storage of a single (index, downsampling) partition.
#[derive(Debug, Default)]
struct ColumnPartition {
    entity_ids: Vec<String>,
    time_buckets: Vec<i64>,
    service_ids: Vec<Option<String>>,
    values: HashMap<String, Vec<Option<f64>>>,
}

impl ColumnPartition {
    fn len(&self) -> usize {
        self.entity_ids.len()
    }

    fn push(&mut self, row: StoredRow) {
        let position = self.len();

        for (column, value) in row.values {
            let cells = self
                .values
                .entry(column)
                .or_insert_with(|| vec![None; position]);
            cells.push(Some(value));
        }
        for cells in self.values.values_mut() {
            if cells.len() == position {
                cells.push(None);
            }
        }

        self.entity_ids.push(row.entity_id);
        self.time_buckets.push(row.time_bucket);
        self.service_ids.push(row.service_id);
    }

    fn string_cell(&self, column: &str, row: usize) -> Option<&str> {
        match column {
            ENTITY_ID => Some(self.entity_ids[row].as_str()),
            SERVICE_ID => self.service_ids[row].as_deref(),
            _ => None,
        }
    }

    fn matches(&self, predicates: &[Predicate], row: usize) -> bool {
        predicates.iter().all(|predicate| match predicate {
            Predicate::Range {
                column,
                lower,
                upper,
            } => {
                debug_assert_eq!(column, TIME_BUCKET);
                self.time_buckets[row] >= *lower && self.time_buckets[row] <= *upper
            }
            Predicate::Equals { column, value } => {
                self.string_cell(column, row) == Some(value.as_str())
            }
        })
    }

    fn grouped_mean(&self, request: &AggregationRequest) -> Result<Vec<AggregateBucket>> {
        if request.group_column != ENTITY_ID && request.group_column != SERVICE_ID {
            return Err(QueryError::StorageIo(format!(
                "Cannot group by unknown column '{}'",
                request.group_column
            )));
        }
        for predicate in request.predicate.predicates() {
            let known = match predicate {
                Predicate::Range { column, .. } => column == TIME_BUCKET,
                Predicate::Equals { column, .. } => column == ENTITY_ID || column == SERVICE_ID,
            };
            if !known {
                return Err(QueryError::StorageIo(format!(
                    "Cannot filter on unknown column '{}'",
                    predicate.column()
                )));
            }
        }

        let cells = match self.values.get(&request.value_column) {
            Some(cells) => cells,
            None => return Ok(Vec::new()),
        };

        let predicates = request.predicate.predicates();
        let mut groups: HashMap<&str, (f64, u64)> = HashMap::new();

        for row in 0..self.len() {
            let value = match cells[row] {
                Some(value) => value,
                None => continue,
            };
            if !self.matches(predicates, row) {
                continue;
            }
            if let Some(key) = self.string_cell(&request.group_column, row) {
                let group = groups.entry(key).or_insert((0.0, 0));
                group.0 += value;
                group.1 += 1;
            }
        }

        let mut buckets: Vec<AggregateBucket> = groups
            .into_iter()
            .map(|(key, (sum, count))| AggregateBucket::new(key, sum / count as f64))
            .collect();

        buckets.sort_by(|a, b| {
            let by_value = if request.order.is_asc() {
                a.value.total_cmp(&b.value)
            } else {
                b.value.total_cmp(&a.value)
            };
            by_value.then_with(|| a.key.cmp(&b.key))
        });
        buckets.truncate(request.limit);

        Ok(buckets)
    }
}

type PartitionKey = (String, DownSampling);

/// In-process columnar store with grouping and aggregation pushdown.
pub struct InMemoryColumnStore {
    partitions: Arc<RwLock<HashMap<PartitionKey, ColumnPartition>>>,
}

impl InMemoryColumnStore {
    pub fn new() -> Self {
        Self {
            partitions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn from_dataset(dataset: &Dataset) -> Self {
        let mut partitions: HashMap<PartitionKey, ColumnPartition> = HashMap::new();

        for index in &dataset.indices {
            let partition = partitions
                .entry((index.name.clone(), index.step))
                .or_default();
            for row in &index.rows {
                partition.push(row.clone());
            }
        }

        Self {
            partitions: Arc::new(RwLock::new(partitions)),
        }
    }

    pub async fn insert(&self, index_name: &str, downsampling: DownSampling, row: StoredRow) {
        self.partitions
            .write()
            .await
            .entry((index_name.to_string(), downsampling))
            .or_default()
            .push(row);
    }

    pub async fn insert_all(
        &self,
        index_name: &str,
        downsampling: DownSampling,
        rows: impl IntoIterator<Item = StoredRow>,
    ) {
        let mut partitions = self.partitions.write().await;
        let partition = partitions
            .entry((index_name.to_string(), downsampling))
            .or_default();
        for row in rows {
            partition.push(row);
        }
    }

    pub async fn row_count(&self, index_name: &str, downsampling: DownSampling) -> usize {
        self.partitions
            .read()
            .await
            .get(&(index_name.to_string(), downsampling))
            .map(|p| p.len())
            .unwrap_or(0)
    }
}

impl Default for InMemoryColumnStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AggregationQueryBackend for InMemoryColumnStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn aggregate(&self, request: &AggregationRequest) -> Result<Vec<AggregateBucket>> {
        let partitions = self.partitions.read().await;
        let partition = partitions
            .get(&(request.index_name.clone(), request.downsampling))
            .ok_or_else(|| {
                QueryError::StorageIo(format!(
                    "Index '{}' ({}) not found",
                    request.index_name, request.downsampling
                ))
            })?;

        let buckets = partition.grouped_mean(request)?;
        debug!(
            "Aggregated {} rows of '{}' into {} buckets",
            partition.len(),
            request.index_name,
            buckets.len()
        );

        Ok(buckets)
    }
}
