use crate::aggregator::AggregatedTelemetry;
use std::fmt::Write as _;
use topn_config::PlanResult;

/// Renders plan telemetry in the Prometheus text exposition format, for
/// scraping through a textfile collector.
pub struct PrometheusExporter;

impl PrometheusExporter {
    pub fn format(result: &PlanResult, telemetry: &AggregatedTelemetry) -> String {
        let mut out = String::new();
        let plan = escape(&result.plan_name);

        let gauges = [
            ("topn_plan_queries", "Queries executed by the plan", telemetry.total_queries as f64),
            ("topn_plan_failed_queries", "Queries that returned an error", telemetry.failed_queries as f64),
            ("topn_plan_error_rate", "Share of failed queries", telemetry.error_rate),
            ("topn_plan_rows", "Rows returned by successful queries", telemetry.total_rows as f64),
            ("topn_plan_duration_seconds", "Wall time of the whole plan", result.total_duration.as_secs_f64()),
        ];
        for (name, help, value) in gauges {
            write_header(&mut out, name, help);
            let _ = writeln!(out, "{}{{plan=\"{}\"}} {}", name, plan, value);
        }

        write_header(
            &mut out,
            "topn_plan_latency_seconds",
            "Query latency percentiles",
        );
        for (quantile, latency) in [
            ("0.5", telemetry.latency_p50),
            ("0.95", telemetry.latency_p95),
            ("0.99", telemetry.latency_p99),
            ("0.999", telemetry.latency_p999),
        ] {
            let _ = writeln!(
                out,
                "topn_plan_latency_seconds{{plan=\"{}\",quantile=\"{}\"}} {}",
                plan,
                quantile,
                latency.as_secs_f64()
            );
        }

        write_header(
            &mut out,
            "topn_query_duration_seconds",
            "Latency of each plan query",
        );
        for outcome in &result.outcomes {
            let _ = writeln!(
                out,
                "topn_query_duration_seconds{{plan=\"{}\",query=\"{}\",metric=\"{}\",outcome=\"{}\"}} {}",
                plan,
                escape(&outcome.label),
                escape(&outcome.metric),
                if outcome.is_success() { "ok" } else { "error" },
                outcome.duration.as_secs_f64()
            );
        }

        out
    }
}

fn write_header(out: &mut String, name: &str, help: &str) {
    let _ = writeln!(out, "# HELP {} {}", name, help);
    let _ = writeln!(out, "# TYPE {} gauge", name);
}

fn escape(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::TelemetryAggregator;
    use crate::collector::QueryTelemetryCollector;
    use std::time::Duration;
    use topn_config::{QueryKind, QueryOutcome};

    #[tokio::test]
    async fn test_format_plan_series() {
        let result = PlanResult {
            plan_name: "nightly".to_string(),
            total_duration: Duration::from_millis(250),
            outcomes: vec![QueryOutcome {
                id: Default::default(),
                label: "say \"hi\"".to_string(),
                kind: QueryKind::SortMetrics,
                metric: "service_cpm".to_string(),
                duration: Duration::from_millis(100),
                entities: Vec::new(),
                records: Vec::new(),
                error: Some("Storage I/O error: down".to_string()),
            }],
        };
        let collector = QueryTelemetryCollector::new();
        collector.record_plan(&result).await;
        let telemetry = TelemetryAggregator::aggregate(&collector.get_events().await);

        let text = PrometheusExporter::format(&result, &telemetry);

        assert!(text.contains("# TYPE topn_plan_error_rate gauge"));
        assert!(text.contains("topn_plan_failed_queries{plan=\"nightly\"} 1"));
        assert!(text.contains("topn_plan_duration_seconds{plan=\"nightly\"} 0.25"));
        assert!(text.contains("quantile=\"0.99\"} 0.1"));
        assert!(text.contains(
            "query=\"say \\\"hi\\\"\",metric=\"service_cpm\",outcome=\"error\"} 0.1"
        ));
    }
}
