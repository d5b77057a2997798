//! Data structures for representing the output.

use crate::options::OptionSet;
use itertools::Itertools;
use serde::{Deserialize, Serialize};

#[derive(Clone, PartialEq, Eq, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelinePoint {
    /// Start of the period, epoch seconds.
    pub time: i64,
    pub formatted_time: String,
    /// One value per keyword, in keyword order.
    pub value: Vec<u64>,
    pub formatted_value: Vec<String>,
}

#[derive(Clone, PartialEq, Eq, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionPoint {
    pub geo_code: Option<String>,
    pub geo_name: String,
    pub value: Vec<u64>,
    pub formatted_value: Vec<String>,
}

#[derive(Clone, PartialEq, Eq, Hash, Debug, Deserialize, Serialize)]
pub struct Topic {
    pub title: String,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Clone, PartialEq, Eq, Debug, Deserialize, Serialize)]
pub struct RelatedTopicItem {
    pub topic: Topic,
    pub value: u64,
    /// The keyword this topic is related to.
    pub term: String,
}

#[derive(Clone, PartialEq, Eq, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RelatedQueryItem {
    pub query: String,
    pub value: u64,
    pub formatted_value: String,
    pub term: String,
}

/// Everything fetched for one input.
#[derive(Clone, PartialEq, Debug, Deserialize, Serialize)]
pub struct TrendRecord {
    #[serde(rename = "inputUrlOrTerm")]
    pub input: String,
    #[serde(rename = "searchTerm")]
    pub search_term: String,
    pub options: OptionSet,
    #[serde(rename = "interestOverTime_timelineData")]
    pub timeline: Vec<TimelinePoint>,
    #[serde(rename = "interestBySubregion")]
    pub subregions: Vec<RegionPoint>,
    #[serde(rename = "interestByCity")]
    pub cities: Vec<RegionPoint>,
    #[serde(rename = "relatedTopics_top")]
    pub topics_top: Vec<RelatedTopicItem>,
    #[serde(rename = "relatedTopics_rising")]
    pub topics_rising: Vec<RelatedTopicItem>,
    #[serde(rename = "relatedQueries_top")]
    pub queries_top: Vec<RelatedQueryItem>,
    #[serde(rename = "relatedQueries_rising")]
    pub queries_rising: Vec<RelatedQueryItem>,
}

/// Diagnostic written in place of results when a run fails.
#[derive(Serialize)]
pub struct OError {
    pub error: String,
}

/// Render a sequence of values the same way in every `formattedValue`.
pub fn formatted(values: &[u64]) -> Vec<String> {
    values.iter().map(u64::to_string).collect_vec()
}

/// Join resolved keywords into the single search term of a record.
pub fn search_term(keywords: &[String]) -> String {
    keywords.join(", ")
}

/// One-line description of a record, for logging.
pub fn pretty_record(r: &TrendRecord) -> String {
    format!(
        "{}: {} points, {} subregions, {} cities, {}+{} topics, {}+{} queries",
        r.search_term,
        r.timeline.len(),
        r.subregions.len(),
        r.cities.len(),
        r.topics_top.len(),
        r.topics_rising.len(),
        r.queries_top.len(),
        r.queries_rising.len(),
    )
}
