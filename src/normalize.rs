//! Reshaping raw provider tables into the record schema.
//!
//! None of these transforms fail: absent tables, missing columns and
//! unreadable cells degrade to empty collections or zero values.

use crate::output::{self, RegionPoint, RelatedQueryItem, RelatedTopicItem, TimelinePoint, Topic};
use crate::tables::{self, COORDINATES, DATE, GEO_CODE, GEO_NAME, IS_PARTIAL, RelatedTables, Row, Table, VALUES};
use chrono::{DateTime, NaiveDate};
use indexmap::IndexMap;
use indexmap::map::Entry::{Occupied, Vacant};
use itertools::Itertools;
use log::{debug, trace};
use serde_json::Value;
use std::hash::Hash;

fn timestamp(cell: Option<&Value>) -> Option<i64> {
    match cell? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|x| x.trunc() as i64)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| DateTime::parse_from_rfc3339(s).ok().map(|d| d.timestamp()))
                .or_else(|| {
                    let day = NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()?;
                    Some(day.and_hms_opt(0, 0, 0)?.and_utc().timestamp())
                })
        }
        _ => None,
    }
}

/// One value per keyword: the [VALUES] array when the row has one, otherwise
/// every column not `reserved`, in column order.
fn keyword_values(row: &Row, reserved: impl Fn(&str) -> bool) -> Vec<u64> {
    match row.get(VALUES) {
        Some(Value::Array(values)) => values.iter().map(|v| tables::count(Some(v))).collect_vec(),
        _ => row
            .iter()
            .filter(|(k, _)| !reserved(k.as_str()))
            .map(|(_, v)| tables::count(Some(v)))
            .collect_vec(),
    }
}

/// Render epoch seconds as e.g. `Jan 07, 2024` (UTC).
pub fn format_time(time: i64) -> String {
    DateTime::from_timestamp(time, 0)
        .map(|d| d.format("%b %d, %Y").to_string())
        .unwrap_or_default()
}

/// Interest over time. Rows without a readable date are dropped.
pub fn timeline(table: &Table) -> Vec<TimelinePoint> {
    let points = table
        .iter()
        .filter_map(|row| {
            let Some(time) = timestamp(row.get(DATE)) else {
                trace!("timeline row without a date: {:?}", row);
                return None;
            };
            let value = keyword_values(row, |k| k == DATE || k == IS_PARTIAL);
            Some(TimelinePoint {
                time,
                formatted_time: format_time(time),
                formatted_value: output::formatted(&value),
                value,
            })
        })
        .collect_vec();
    debug!("timeline: {} rows -> {} points", table.len(), points.len());
    points
}

fn region_point(row: &Row) -> RegionPoint {
    let name_key = if row.contains_key(GEO_NAME) {
        GEO_NAME
    } else {
        row.keys().next().map(String::as_str).unwrap_or(GEO_NAME)
    };
    let geo_code = match row.get(GEO_CODE) {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        _ => None,
    };
    let value = keyword_values(row, |k| k == name_key || k == GEO_CODE || k == COORDINATES);
    RegionPoint {
        geo_code,
        geo_name: tables::text(row.get(name_key)),
        formatted_value: output::formatted(&value),
        value,
    }
}

/// Interest by sub-region or by city.
pub fn regions(table: &Table) -> Vec<RegionPoint> {
    let points = table.iter().map(region_point).collect_vec();
    debug!("regions: {} points", points.len());
    points
}

/// Items that are deduplicated and ranked by value.
pub trait Ranked {
    type Key: Hash + Eq;

    fn key(&self) -> Self::Key;

    fn value(&self) -> u64;
}

impl Ranked for RelatedTopicItem {
    type Key = (String, Topic);

    fn key(&self) -> Self::Key {
        (self.term.clone(), self.topic.clone())
    }

    fn value(&self) -> u64 {
        self.value
    }
}

impl Ranked for RelatedQueryItem {
    type Key = (String, String);

    fn key(&self) -> Self::Key {
        (self.term.clone(), self.query.clone())
    }

    fn value(&self) -> u64 {
        self.value
    }
}

/// Keep the highest-valued item per key, then sort by value, highest first.
///
/// Among items with equal values the one seen first is kept, and the sort is
/// stable, so applying this twice gives the same result as applying it once.
pub fn dedupe<T: Ranked>(items: Vec<T>) -> Vec<T> {
    let mut best: IndexMap<T::Key, T> = IndexMap::new();
    for item in items {
        match best.entry(item.key()) {
            Occupied(mut e) => {
                if item.value() > e.get().value() {
                    e.insert(item);
                }
            }
            Vacant(e) => {
                e.insert(item);
            }
        }
    }
    let mut items = best.into_values().collect_vec();
    items.sort_by(|a, b| b.value().cmp(&a.value()));
    items
}

/// Both buckets of related topics or queries, merged across keywords.
#[derive(Clone, Debug, PartialEq)]
pub struct TopRising<T> {
    pub top: Vec<T>,
    pub rising: Vec<T>,
}

impl<T> Default for TopRising<T> {
    fn default() -> Self {
        TopRising {
            top: vec![],
            rising: vec![],
        }
    }
}

fn related<T: Ranked>(tables: &RelatedTables, item: impl Fn(&str, &Row) -> T) -> TopRising<T> {
    let mut top = vec![];
    let mut rising = vec![];
    for (term, buckets) in tables {
        for row in buckets.top.iter().flatten() {
            top.push(item(term, row));
        }
        for row in buckets.rising.iter().flatten() {
            rising.push(item(term, row));
        }
    }
    TopRising {
        top: dedupe(top),
        rising: dedupe(rising),
    }
}

fn first<'a>(row: &'a Row, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|k| row.get(*k))
}

fn topic_item(term: &str, row: &Row) -> RelatedTopicItem {
    let nested = row.get("topic").and_then(Value::as_object);
    let field = |flat: &str, short: &str| match nested {
        Some(topic) => tables::text(topic.get(short)),
        None => tables::text(first(row, &[flat, short])),
    };
    RelatedTopicItem {
        topic: Topic {
            title: field("topic_title", "title"),
            kind: field("topic_type", "type"),
        },
        value: tables::count(row.get("value")),
        term: term.to_owned(),
    }
}

fn query_item(term: &str, row: &Row) -> RelatedQueryItem {
    let value = tables::count(row.get("value"));
    RelatedQueryItem {
        query: tables::text(row.get("query")),
        value,
        formatted_value: value.to_string(),
        term: term.to_owned(),
    }
}

/// Related topics of all keywords.
pub fn related_topics(tables: &RelatedTables) -> TopRising<RelatedTopicItem> {
    let r = related(tables, topic_item);
    debug!("related topics: {} top, {} rising", r.top.len(), r.rising.len());
    r
}

/// Related queries of all keywords.
pub fn related_queries(tables: &RelatedTables) -> TopRising<RelatedQueryItem> {
    let r = related(tables, query_item);
    debug!("related queries: {} top, {} rising", r.top.len(), r.rising.len());
    r
}
