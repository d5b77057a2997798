//! Raw tabular data as delivered by a data provider.
//!
//! A table is an ordered sequence of rows, and a row is a JSON object whose
//! keys keep their insertion order. Column order is therefore the key order
//! of the rows, which is what the normalizers rely on when they turn keyword
//! columns into value sequences.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Column holding the timestamp (epoch seconds) of a timeline row.
pub const DATE: &str = "date";
/// Column flagging an incomplete last period of a timeline.
pub const IS_PARTIAL: &str = "isPartial";
/// Column holding the place name of a region row.
pub const GEO_NAME: &str = "geoName";
/// Column holding the place code of a region row, if the provider sent one.
pub const GEO_CODE: &str = "geoCode";
/// Column holding map coordinates of a city row.
pub const COORDINATES: &str = "coordinates";
/// Column holding one value per keyword, in keyword order.
///
/// Tables without it carry one column per keyword instead.
pub const VALUES: &str = "value";

pub type Row = Map<String, Value>;
pub type Table = Vec<Row>;

/// The "top" and "rising" tables of one keyword.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RelatedBuckets {
    pub top: Option<Table>,
    pub rising: Option<Table>,
}

/// Related topics or queries, keyed by the keyword they were requested for.
pub type RelatedTables = IndexMap<String, RelatedBuckets>;

/// Everything one provider round trip yields for a set of keywords.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RawResponse {
    pub timeline: Table,
    pub subregion: Table,
    pub city: Table,
    pub related_topics: RelatedTables,
    pub related_queries: RelatedTables,
}

/// Coerce a cell to a non-negative integer.
///
/// Numbers are truncated towards zero, numeric strings are parsed, booleans
/// count as 0 or 1. Missing, null, non-numeric and negative values become 0.
pub fn count(cell: Option<&Value>) -> u64 {
    let x = match cell {
        Some(Value::Number(n)) => match n.as_u64() {
            Some(u) => return u,
            None => n.as_f64().unwrap_or(0.0),
        },
        Some(Value::String(s)) => s.trim().parse::<f64>().unwrap_or(0.0),
        Some(Value::Bool(b)) => return u64::from(*b),
        _ => 0.0,
    };
    if x.is_finite() && x > 0.0 {
        x.trunc() as u64
    } else {
        0
    }
}

/// Render a cell as plain text; null and missing cells become empty.
pub fn text(cell: Option<&Value>) -> String {
    match cell {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    #[test]
    fn count_coercion() {
        assert_eq!(count(Some(&json!(42))), 42);
        assert_eq!(count(Some(&json!(42.9))), 42);
        assert_eq!(count(Some(&json!("17"))), 17);
        assert_eq!(count(Some(&json!(-3))), 0);
        assert_eq!(count(Some(&json!(null))), 0);
        assert_eq!(count(Some(&json!("n/a"))), 0);
        assert_eq!(count(Some(&json!(true))), 1);
        assert_eq!(count(None), 0);
    }

    #[test]
    fn text_rendering() {
        assert_eq!(text(Some(&json!("a"))), "a");
        assert_eq!(text(Some(&json!(5))), "5");
        assert_eq!(text(Some(&json!(null))), "");
        assert_eq!(text(None), "");
    }

    #[test]
    fn rows_keep_column_order() {
        let row: Row = serde_json::from_str(r#"{"date": 1, "zeta": 2, "alpha": 3}"#).unwrap();
        let keys: Vec<&str> = row.keys().map(String::as_str).collect();
        assert_eq!(keys, ["date", "zeta", "alpha"]);
    }
}
