use serde::{Deserialize, Serialize};
use std::time::Duration;
use topn_config::QueryOutcome;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SloViolation {
    pub slo_name: String,
    pub query: String,
    pub threshold: Duration,
    pub actual: Duration,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Tracks query latency objectives.
pub struct SloTracker {
    slos: Vec<Slo>,
    violations: Vec<SloViolation>,
}

#[derive(Debug, Clone)]
struct Slo {
    name: String,
    threshold: Duration,
}

impl SloTracker {
    pub fn new() -> Self {
        Self {
            slos: Vec::new(),
            violations: Vec::new(),
        }
    }

    pub fn add_slo(&mut self, name: impl Into<String>, threshold: Duration) {
        self.slos.push(Slo {
            name: name.into(),
            threshold,
        });
    }

    pub fn check_latency(&mut self, query: &str, latency: Duration) {
        for slo in &self.slos {
            if latency > slo.threshold {
                self.violations.push(SloViolation {
                    slo_name: slo.name.clone(),
                    query: query.to_string(),
                    threshold: slo.threshold,
                    actual: latency,
                    timestamp: chrono::Utc::now(),
                });
            }
        }
    }

    pub fn check_outcome(&mut self, outcome: &QueryOutcome) {
        self.check_latency(&outcome.label, outcome.duration);
    }

    pub fn violations(&self) -> &[SloViolation] {
        &self.violations
    }

    pub fn violation_count(&self) -> usize {
        self.violations.len()
    }

    pub fn violation_rate(&self, total_queries: usize) -> f64 {
        if total_queries == 0 {
            return 0.0;
        }
        self.violations.len() as f64 / total_queries as f64
    }
}

impl Default for SloTracker {
    fn default() -> Self {
        Self::new()
    }
}
