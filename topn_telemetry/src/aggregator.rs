use crate::collector::{QueryEvent, QueryEventType};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatedTelemetry {
    pub total_queries: usize,
    pub successful_queries: usize,
    pub failed_queries: usize,
    pub error_rate: f64,
    pub total_rows: usize,
    pub average_rows: f64,
    pub latency_p50: Duration,
    pub latency_p95: Duration,
    pub latency_p99: Duration,
    pub latency_p999: Duration,
    pub average_latency: Duration,
    pub min_latency: Duration,
    pub max_latency: Duration,
}

pub struct TelemetryAggregator;

impl TelemetryAggregator {
    pub fn aggregate(events: &[QueryEvent]) -> AggregatedTelemetry {
        let mut latencies: Vec<Duration> = Vec::new();
        let mut success_count = 0;
        let mut error_count = 0;
        let mut total_rows = 0;

        for event in events {
            match &event.event_type {
                QueryEventType::Latency(duration) => {
                    latencies.push(*duration);
                }
                QueryEventType::Success { rows } => {
                    success_count += 1;
                    total_rows += rows;
                }
                QueryEventType::Error { .. } => {
                    error_count += 1;
                }
            }
        }

        latencies.sort();

        let total_queries = success_count + error_count;
        let error_rate = if total_queries > 0 {
            error_count as f64 / total_queries as f64
        } else {
            0.0
        };
        let average_rows = if success_count > 0 {
            total_rows as f64 / success_count as f64
        } else {
            0.0
        };

        let (min, max) = match (latencies.first(), latencies.last()) {
            (Some(min), Some(max)) => (*min, *max),
            _ => (Duration::ZERO, Duration::ZERO),
        };

        AggregatedTelemetry {
            total_queries,
            successful_queries: success_count,
            failed_queries: error_count,
            error_rate,
            total_rows,
            average_rows,
            latency_p50: Self::percentile(&latencies, 0.50),
            latency_p95: Self::percentile(&latencies, 0.95),
            latency_p99: Self::percentile(&latencies, 0.99),
            latency_p999: Self::percentile(&latencies, 0.999),
            average_latency: Self::average(&latencies),
            min_latency: min,
            max_latency: max,
        }
    }

    fn percentile(sorted: &[Duration], percentile: f64) -> Duration {
        if sorted.is_empty() {
            return Duration::ZERO;
        }

        let index = ((sorted.len() as f64) * percentile) as usize;
        let index = index.min(sorted.len() - 1);
        sorted[index]
    }

    fn average(durations: &[Duration]) -> Duration {
        if durations.is_empty() {
            return Duration::ZERO;
        }

        let sum: Duration = durations.iter().sum();
        sum / durations.len() as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::QueryTelemetryCollector;

    #[tokio::test]
    async fn test_aggregation() {
        let collector = QueryTelemetryCollector::new();
        collector.record_latency(Duration::from_millis(100)).await;
        collector.record_latency(Duration::from_millis(200)).await;
        collector.record_success(4).await;
        collector.record_error("storage_io").await;

        let aggregated = TelemetryAggregator::aggregate(&collector.get_events().await);

        assert_eq!(aggregated.total_queries, 2);
        assert_eq!(aggregated.successful_queries, 1);
        assert_eq!(aggregated.failed_queries, 1);
        assert_eq!(aggregated.error_rate, 0.5);
        assert_eq!(aggregated.total_rows, 4);
        assert_eq!(aggregated.average_rows, 4.0);
        assert_eq!(aggregated.min_latency, Duration::from_millis(100));
        assert_eq!(aggregated.max_latency, Duration::from_millis(200));
        assert_eq!(aggregated.average_latency, Duration::from_millis(150));
    }

    #[test]
    fn test_empty_aggregation() {
        let aggregated = TelemetryAggregator::aggregate(&[]);
        assert_eq!(aggregated.total_queries, 0);
        assert_eq!(aggregated.error_rate, 0.0);
        assert_eq!(aggregated.latency_p99, Duration::ZERO);
    }
}
