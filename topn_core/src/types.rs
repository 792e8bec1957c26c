//! Value objects shared by the engine, the services and the facade.

use crate::error::{QueryError, Result};
use chrono::{DateTime, Datelike, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Column holding the truncated timestamp of each stored row.
pub const TIME_BUCKET: &str = "time_bucket";
/// Column holding the opaque id of the entity a row belongs to.
pub const ENTITY_ID: &str = "entity_id";
/// Parent column carried by service instances and endpoints.
pub const SERVICE_ID: &str = "service_id";

/// Granularity the stored buckets were truncated to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum DownSampling {
    #[default]
    Minute,
    Hour,
    Day,
}

impl DownSampling {
    pub fn name(&self) -> &'static str {
        match self {
            DownSampling::Minute => "minute",
            DownSampling::Hour => "hour",
            DownSampling::Day => "day",
        }
    }

    /// Encodes a timestamp as `yyyyMMddHHmm`, `yyyyMMddHH` or `yyyyMMdd`.
    pub fn time_bucket(&self, at: DateTime<Utc>) -> i64 {
        let day = at.year() as i64 * 10_000 + at.month() as i64 * 100 + at.day() as i64;
        match self {
            DownSampling::Day => day,
            DownSampling::Hour => day * 100 + at.hour() as i64,
            DownSampling::Minute => (day * 100 + at.hour() as i64) * 100 + at.minute() as i64,
        }
    }
}

impl fmt::Display for DownSampling {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DownSampling {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "minute" => Ok(DownSampling::Minute),
            "hour" => Ok(DownSampling::Hour),
            "day" => Ok(DownSampling::Day),
            other => Err(QueryError::InvalidCondition(format!(
                "Unknown downsampling '{}'",
                other
            ))),
        }
    }
}

/// Ranking direction. `Desc` is "top", `Asc` is "bottom".
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum Order {
    Asc,
    #[default]
    Desc,
}

impl Order {
    pub fn is_asc(&self) -> bool {
        matches!(self, Order::Asc)
    }
}

impl FromStr for Order {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "asc" => Ok(Order::Asc),
            "desc" => Ok(Order::Desc),
            other => Err(QueryError::InvalidCondition(format!("Unknown order '{}'", other))),
        }
    }
}

/// Inclusive `[start_tb, end_tb]` interval of time buckets.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimeBucketRange {
    start_tb: i64,
    end_tb: i64,
}

impl TimeBucketRange {
    pub fn new(start_tb: i64, end_tb: i64) -> Result<Self> {
        if start_tb < 0 || end_tb < 0 {
            return Err(QueryError::InvalidCondition(format!(
                "Time buckets must be non-negative, got [{}, {}]",
                start_tb, end_tb
            )));
        }
        if start_tb > end_tb {
            return Err(QueryError::InvalidCondition(format!(
                "Start bucket {} is after end bucket {}",
                start_tb, end_tb
            )));
        }
        Ok(Self { start_tb, end_tb })
    }

    pub fn start_tb(&self) -> i64 {
        self.start_tb
    }

    pub fn end_tb(&self) -> i64 {
        self.end_tb
    }

    pub fn contains(&self, time_bucket: i64) -> bool {
        time_bucket >= self.start_tb && time_bucket <= self.end_tb
    }
}

/// Caller supplied query window.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct QueryDuration {
    pub start_tb: i64,
    pub end_tb: i64,
    #[serde(default)]
    pub step: DownSampling,
}

impl QueryDuration {
    pub fn new(start_tb: i64, end_tb: i64, step: DownSampling) -> Self {
        Self {
            start_tb,
            end_tb,
            step,
        }
    }

    pub fn from_datetimes(
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        step: DownSampling,
    ) -> Result<Self> {
        let duration = Self::new(step.time_bucket(start), step.time_bucket(end), step);
        duration.time_bucket_range()?;
        Ok(duration)
    }

    pub fn time_bucket_range(&self) -> Result<TimeBucketRange> {
        TimeBucketRange::new(self.start_tb, self.end_tb)
    }
}

/// Entity taxonomy a metric is recorded against.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    #[default]
    Service,
    ServiceInstance,
    Endpoint,
}

impl Scope {
    /// Column a scoping filter applies to, if this taxonomy has a parent.
    pub fn parent_column(&self) -> Option<&'static str> {
        match self {
            Scope::Service => None,
            Scope::ServiceInstance | Scope::Endpoint => Some(SERVICE_ID),
        }
    }
}

/// One ranked entity in a Top-N answer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TopNEntity {
    pub id: String,
    pub value: i64,
}

impl TopNEntity {
    pub fn new(id: impl Into<String>, value: i64) -> Self {
        Self {
            id: id.into(),
            value,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TopNCondition {
    pub name: String,
    #[serde(default)]
    pub parent_service: Option<String>,
    pub top_n: usize,
    #[serde(default)]
    pub order: Order,
}

impl TopNCondition {
    pub fn new(name: impl Into<String>, top_n: usize, order: Order) -> Self {
        Self {
            name: name.into(),
            parent_service: None,
            top_n,
            order,
        }
    }

    pub fn with_parent_service(mut self, service_id: impl Into<String>) -> Self {
        self.parent_service = Some(service_id.into());
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MetricsCondition {
    pub name: String,
    #[serde(default)]
    pub entity_id: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MetricsType {
    Unknown,
    RegularValue,
    LabeledValue,
    HeatMap,
    SampledRecord,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimeSeriesPoint {
    pub time_bucket: i64,
    pub value: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct MetricsValues {
    pub label: Option<String>,
    pub values: Vec<TimeSeriesPoint>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HeatMapBucket {
    pub min: i64,
    pub max: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HeatMapColumn {
    pub time_bucket: i64,
    pub values: Vec<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct HeatMap {
    pub columns: Vec<HeatMapColumn>,
    pub buckets: Vec<HeatMapBucket>,
}

impl HeatMap {
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty() && self.buckets.is_empty()
    }
}

/// A sampled record, e.g. one slow statement with the trace that produced it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SelectedRecord {
    pub name: String,
    pub id: String,
    pub value: String,
    #[serde(default)]
    pub ref_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_time_bucket_encoding() {
        let at = Utc.with_ymd_and_hms(2020, 3, 7, 14, 5, 59).unwrap();

        assert_eq!(DownSampling::Minute.time_bucket(at), 202003071405);
        assert_eq!(DownSampling::Hour.time_bucket(at), 2020030714);
        assert_eq!(DownSampling::Day.time_bucket(at), 20200307);
    }

    #[test]
    fn test_time_bucket_range_validation() {
        let range = TimeBucketRange::new(100, 200).unwrap();
        assert!(range.contains(100));
        assert!(range.contains(200));
        assert!(!range.contains(201));

        assert!(TimeBucketRange::new(5, 5).is_ok());
        assert!(TimeBucketRange::new(200, 100).is_err());
        assert!(TimeBucketRange::new(-1, 100).is_err());
    }

    #[test]
    fn test_duration_from_datetimes() {
        let start = Utc.with_ymd_and_hms(2020, 3, 7, 14, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2020, 3, 7, 16, 30, 0).unwrap();

        let duration = QueryDuration::from_datetimes(start, end, DownSampling::Hour).unwrap();
        assert_eq!(duration.start_tb, 2020030714);
        assert_eq!(duration.end_tb, 2020030716);

        assert!(QueryDuration::from_datetimes(end, start, DownSampling::Minute).is_err());
    }

    #[test]
    fn test_parse_enums() {
        assert_eq!("ASC".parse::<Order>().unwrap(), Order::Asc);
        assert_eq!("desc".parse::<Order>().unwrap(), Order::Desc);
        assert!("up".parse::<Order>().is_err());
        assert_eq!("Hour".parse::<DownSampling>().unwrap(), DownSampling::Hour);
    }

    #[test]
    fn test_scope_parent_column() {
        assert_eq!(Scope::Service.parent_column(), None);
        assert_eq!(Scope::ServiceInstance.parent_column(), Some(SERVICE_ID));
        assert_eq!(Scope::Endpoint.parent_column(), Some(SERVICE_ID));
    }
}
