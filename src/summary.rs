//! One summary row per record, for the flat export formats.

use crate::output::{RelatedQueryItem, TrendRecord};
use itertools::Itertools;

/// Column headers, in export order.
pub const HEADERS: [&str; 9] = [
    "input",
    "searchTerm",
    "geo",
    "timeframe",
    "avgInterest",
    "topRelatedQuery",
    "topRelatedQueryValue",
    "risingRelatedQuery",
    "risingRelatedQueryValue",
];

#[derive(Clone, Debug, PartialEq)]
pub struct SummaryRow {
    pub input: String,
    pub search_term: String,
    pub geo: String,
    pub timeframe: String,
    /// Mean of all timeline values of all keywords, two decimals.
    pub avg_interest: f64,
    pub top_related_query: String,
    pub top_related_query_value: Option<u64>,
    pub rising_related_query: String,
    pub rising_related_query_value: Option<u64>,
}

/// A cell of a flat export.
#[derive(Clone, Debug, PartialEq)]
pub enum Cell {
    Text(String),
    Number(f64),
    Blank,
}

impl Cell {
    pub fn render(&self) -> String {
        match self {
            Cell::Text(s) => s.clone(),
            Cell::Number(x) => format!("{x}"),
            Cell::Blank => String::new(),
        }
    }
}

impl SummaryRow {
    /// The row's cells, in the order of [HEADERS].
    pub fn cells(&self) -> [Cell; 9] {
        let count = |v: Option<u64>| v.map_or(Cell::Blank, |v| Cell::Number(v as f64));
        [
            Cell::Text(self.input.clone()),
            Cell::Text(self.search_term.clone()),
            Cell::Text(self.geo.clone()),
            Cell::Text(self.timeframe.clone()),
            Cell::Number(self.avg_interest),
            Cell::Text(self.top_related_query.clone()),
            count(self.top_related_query_value),
            Cell::Text(self.rising_related_query.clone()),
            count(self.rising_related_query_value),
        ]
    }
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

fn average_interest(r: &TrendRecord) -> f64 {
    let values = r.timeline.iter().flat_map(|p| &p.value).collect_vec();
    if values.is_empty() {
        return 0.0;
    }
    let sum: f64 = values.iter().map(|&&v| v as f64).sum();
    round2(sum / values.len() as f64)
}

fn best(items: &[RelatedQueryItem]) -> (String, Option<u64>) {
    let mut top: Option<&RelatedQueryItem> = None;
    for q in items {
        if top.is_none_or(|t| q.value > t.value) {
            top = Some(q);
        }
    }
    match top {
        Some(q) => (q.query.clone(), Some(q.value)),
        None => (String::new(), None),
    }
}

pub fn summary_row(r: &TrendRecord) -> SummaryRow {
    let (top_related_query, top_related_query_value) = best(&r.queries_top);
    let (rising_related_query, rising_related_query_value) = best(&r.queries_rising);
    SummaryRow {
        input: r.input.clone(),
        search_term: r.search_term.clone(),
        geo: r.options.region.clone(),
        timeframe: r.options.timeframe.clone(),
        avg_interest: average_interest(r),
        top_related_query,
        top_related_query_value,
        rising_related_query,
        rising_related_query_value,
    }
}

/// Flatten all records; an empty input gives an empty table.
pub fn summarize(records: &[TrendRecord]) -> Vec<SummaryRow> {
    records.iter().map(summary_row).collect_vec()
}
