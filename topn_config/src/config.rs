use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use topn_core::{DownSampling, MetricDefinition, Order, QueryDuration, Scope};

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} cannot be empty")]
    Empty(&'static str),

    #[error("Metric '{0}' is defined more than once")]
    DuplicateMetric(String),

    #[error("default_top_n must be > 0")]
    ZeroTopN,

    #[error("Query {index}: {reason}")]
    InvalidQuery { index: usize, reason: String },
}

fn default_top_n() -> usize {
    10
}

fn default_timeout() -> Duration {
    Duration::from_secs(10)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub name: String,
    pub storage: StorageConfig,
    #[serde(default)]
    pub metrics: Vec<MetricDefinition>,
    #[serde(default = "default_top_n")]
    pub default_top_n: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StorageConfig {
    Memory {
        #[serde(default)]
        dataset: Option<PathBuf>,
    },
    Elasticsearch {
        url: String,
        #[serde(with = "humantime_serde", default = "default_timeout")]
        timeout: Duration,
        #[serde(default)]
        namespace: Option<String>,
    },
}

impl StorageConfig {
    /// Anchors a relative dataset path at `base`, the directory of the file
    /// the configuration was read from.
    pub fn resolve_relative_to(&mut self, base: &Path) {
        if let StorageConfig::Memory {
            dataset: Some(path),
        } = self
        {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            StorageConfig::Memory { .. } => "memory",
            StorageConfig::Elasticsearch { .. } => "elasticsearch",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfigFile {
    pub engine: EngineConfig,
}

impl EngineConfig {
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::default()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.is_empty() {
            return Err(ConfigError::Empty("Engine name"));
        }

        if self.default_top_n == 0 {
            return Err(ConfigError::ZeroTopN);
        }

        if let StorageConfig::Elasticsearch { url, .. } = &self.storage {
            if url.is_empty() {
                return Err(ConfigError::Empty("Elasticsearch url"));
            }
        }

        let mut seen = HashSet::new();
        for metric in &self.metrics {
            if metric.name.is_empty() {
                return Err(ConfigError::Empty("Metric name"));
            }
            if metric.value_column.is_empty() {
                return Err(ConfigError::Empty("Metric value column"));
            }
            if !seen.insert(metric.name.as_str()) {
                return Err(ConfigError::DuplicateMetric(metric.name.clone()));
            }
        }

        Ok(())
    }
}

#[derive(Default)]
pub struct EngineConfigBuilder {
    name: Option<String>,
    storage: Option<StorageConfig>,
    metrics: Vec<MetricDefinition>,
    default_top_n: Option<usize>,
}

impl EngineConfigBuilder {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn storage(mut self, storage: StorageConfig) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn metric(mut self, name: impl Into<String>, scope: Scope) -> Self {
        self.metrics.push(MetricDefinition::new(name, scope));
        self
    }

    pub fn add_metric(mut self, definition: MetricDefinition) -> Self {
        self.metrics.push(definition);
        self
    }

    pub fn default_top_n(mut self, top_n: usize) -> Self {
        self.default_top_n = Some(top_n);
        self
    }

    pub fn build(self) -> EngineConfig {
        EngineConfig {
            name: self.name.unwrap_or_else(|| "unnamed".to_string()),
            storage: self
                .storage
                .unwrap_or(StorageConfig::Memory { dataset: None }),
            metrics: self.metrics,
            default_top_n: self.default_top_n.unwrap_or_else(default_top_n),
        }
    }
}

/// Either a ready-made time bucket or a timestamp to be truncated.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum BucketBound {
    Bucket(i64),
    Timestamp(DateTime<Utc>),
}

impl BucketBound {
    pub fn to_time_bucket(&self, step: DownSampling) -> i64 {
        match self {
            BucketBound::Bucket(tb) => *tb,
            BucketBound::Timestamp(at) => step.time_bucket(*at),
        }
    }
}

impl FromStr for BucketBound {
    type Err = chrono::ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.parse::<i64>() {
            Ok(tb) => Ok(BucketBound::Bucket(tb)),
            Err(_) => s.parse::<DateTime<Utc>>().map(BucketBound::Timestamp),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct DurationSpec {
    pub start: BucketBound,
    pub end: BucketBound,
    #[serde(default)]
    pub step: DownSampling,
}

impl DurationSpec {
    pub fn to_query_duration(&self) -> QueryDuration {
        QueryDuration::new(
            self.start.to_time_bucket(self.step),
            self.end.to_time_bucket(self.step),
            self.step,
        )
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum QueryKind {
    #[default]
    SortMetrics,
    SampledRecords,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QuerySpec {
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub kind: QueryKind,
    pub metric: String,
    #[serde(default)]
    pub top_n: Option<usize>,
    #[serde(default)]
    pub order: Order,
    #[serde(default)]
    pub parent_service: Option<String>,
    pub duration: DurationSpec,
}

impl QuerySpec {
    pub fn display_name(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.metric)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryPlan {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub parallel: bool,
    #[serde(default)]
    pub queries: Vec<QuerySpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryPlanFile {
    pub plan: QueryPlan,
}

impl QueryPlan {
    pub fn builder() -> QueryPlanBuilder {
        QueryPlanBuilder::default()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.is_empty() {
            return Err(ConfigError::Empty("Plan name"));
        }

        if self.queries.is_empty() {
            return Err(ConfigError::Empty("Plan queries"));
        }

        for (index, query) in self.queries.iter().enumerate() {
            if query.metric.is_empty() {
                return Err(ConfigError::InvalidQuery {
                    index,
                    reason: "metric must be set".to_string(),
                });
            }

            if query.top_n == Some(0) {
                return Err(ConfigError::InvalidQuery {
                    index,
                    reason: "top_n must be > 0".to_string(),
                });
            }

            let duration = query.duration.to_query_duration();
            if let Err(e) = duration.time_bucket_range() {
                return Err(ConfigError::InvalidQuery {
                    index,
                    reason: e.to_string(),
                });
            }
        }

        Ok(())
    }
}

#[derive(Default)]
pub struct QueryPlanBuilder {
    name: Option<String>,
    description: Option<String>,
    parallel: bool,
    queries: Vec<QuerySpec>,
}

impl QueryPlanBuilder {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn add_query(mut self, query: QuerySpec) -> Self {
        self.queries.push(query);
        self
    }

    pub fn build(self) -> QueryPlan {
        QueryPlan {
            name: self.name.unwrap_or_else(|| "unnamed".to_string()),
            description: self.description,
            parallel: self.parallel,
            queries: self.queries,
        }
    }
}

impl QuerySpec {
    pub fn sort_metrics(metric: impl Into<String>, start_tb: i64, end_tb: i64) -> Self {
        Self {
            label: None,
            kind: QueryKind::SortMetrics,
            metric: metric.into(),
            top_n: None,
            order: Order::Desc,
            parent_service: None,
            duration: DurationSpec {
                start: BucketBound::Bucket(start_tb),
                end: BucketBound::Bucket(end_tb),
                step: DownSampling::Minute,
            },
        }
    }

    pub fn top_n(mut self, top_n: usize) -> Self {
        self.top_n = Some(top_n);
        self
    }

    pub fn order(mut self, order: Order) -> Self {
        self.order = order;
        self
    }

    pub fn parent_service(mut self, service_id: impl Into<String>) -> Self {
        self.parent_service = Some(service_id.into());
        self
    }

    pub fn step(mut self, step: DownSampling) -> Self {
        self.duration.step = step;
        self
    }

    pub fn kind(mut self, kind: QueryKind) -> Self {
        self.kind = kind;
        self
    }
}

pub(crate) mod humantime_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&humantime::format_duration(*duration).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        humantime::parse_duration(&s).map_err(serde::de::Error::custom)
    }
}
