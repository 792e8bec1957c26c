use tabled::{settings::Style, Table, Tabled};
use topn_config::{PlanResult, QueryOutcome};

#[derive(Tabled)]
struct EntityRow {
    #[tabled(rename = "#")]
    rank: usize,
    #[tabled(rename = "Entity")]
    id: String,
    #[tabled(rename = "Value")]
    value: i64,
}

#[derive(Tabled)]
struct RecordRow {
    #[tabled(rename = "Statement")]
    name: String,
    #[tabled(rename = "Entity")]
    id: String,
    #[tabled(rename = "Value")]
    value: String,
    #[tabled(rename = "Trace")]
    ref_id: String,
}

#[derive(Tabled)]
struct SummaryRow {
    #[tabled(rename = "Query")]
    label: String,
    #[tabled(rename = "Metric")]
    metric: String,
    #[tabled(rename = "Rows")]
    rows: usize,
    #[tabled(rename = "Duration")]
    duration: String,
    #[tabled(rename = "Status")]
    status: String,
}

/// Renders the rows of one query as a markdown table. Sampled record
/// queries list records, everything else lists ranked entities.
pub fn outcome_table(outcome: &QueryOutcome) -> String {
    if !outcome.records.is_empty() {
        let rows = outcome.records.iter().map(|r| RecordRow {
            name: r.name.clone(),
            id: r.id.clone(),
            value: r.value.clone(),
            ref_id: r.ref_id.clone().unwrap_or_default(),
        });
        return Table::new(rows).with(Style::markdown()).to_string();
    }

    let rows = outcome
        .entities
        .iter()
        .enumerate()
        .map(|(i, e)| EntityRow {
            rank: i + 1,
            id: e.id.clone(),
            value: e.value,
        });
    Table::new(rows).with(Style::markdown()).to_string()
}

pub fn summary_table(result: &PlanResult) -> String {
    let rows = result.outcomes.iter().map(|o| SummaryRow {
        label: o.label.clone(),
        metric: o.metric.clone(),
        rows: o.row_count(),
        duration: format!("{:?}", o.duration),
        status: match &o.error {
            None => "ok".to_string(),
            Some(e) => format!("failed: {}", e),
        },
    });
    Table::new(rows).with(Style::markdown()).to_string()
}
