//! The search-trends data provider.
//!
//! [Provider] is the seam between the pipeline and the network. The
//! [GoogleTrends] implementation talks to the public trends web API: it opens
//! a session to get cookies, asks the explore endpoint for one token per
//! widget, and then fetches each widget's data. Every response starts with a
//! few junk characters before the JSON payload.

use crate::errors::{self, Result};
use crate::resolver::Query;
use crate::tables::{
    self, COORDINATES, DATE, GEO_CODE, GEO_NAME, IS_PARTIAL, RawResponse, RelatedBuckets, RelatedTables, Row, Table,
    VALUES,
};
use itertools::Itertools;
use log::{debug, trace, warn};
use reqwest::blocking::{Client, Response};
use reqwest::{Method, StatusCode};
use serde::Deserialize;
use serde_json::{Value, json};
use std::thread;
use std::time::Duration;

const HOME_URL: &str = "https://trends.google.com/";
const EXPLORE_URL: &str = "https://trends.google.com/trends/api/explore";
const TIMELINE_URL: &str = "https://trends.google.com/trends/api/widgetdata/multiline";
const REGION_URL: &str = "https://trends.google.com/trends/api/widgetdata/comparedgeo";
const RELATED_URL: &str = "https://trends.google.com/trends/api/widgetdata/relatedsearches";

/// Retries after the first attempt of each request.
const RETRIES: u32 = 2;
const TIMEOUT_SECS: u64 = 30;

/// Anything that can answer a [Query] with raw tables.
pub trait Provider {
    /// One round trip for one query. Errors are reported as they are.
    fn fetch(&self, query: &Query) -> Result<RawResponse>;
}

/// Granularity of interest-by-region data.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Resolution {
    Region,
    City,
}

impl Resolution {
    fn as_str(&self) -> &'static str {
        match self {
            Resolution::Region => "REGION",
            Resolution::City => "CITY",
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
struct Widget {
    id: String,
    token: String,
    request: Value,
}

/// Parse a response body, skipping everything before the JSON payload.
fn parse_body(body: &str) -> Result<Value> {
    let start = body
        .find(['{', '['])
        .ok_or_else(|| errors::provider_error_ref("response does not contain JSON"))?;
    serde_json::from_str(&body[start..])
        .map_err(|e| errors::provider_error(format!("malformed response: {e}")))
}

fn widgets(explore: &Value) -> Result<Vec<Widget>> {
    let widgets = explore
        .get("widgets")
        .ok_or_else(|| errors::provider_error_ref("explore response has no widgets"))?;
    serde_json::from_value(widgets.clone())
        .map_err(|e| errors::provider_error(format!("malformed widgets: {e}")))
}

/// The keyword a related-topics or related-queries widget belongs to.
fn related_keyword(widget: &Widget) -> String {
    widget
        .request
        .pointer("/restriction/complexKeywordsRestriction/keyword/0/value")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_owned()
}

fn explore_request(query: &Query) -> Value {
    let o = &query.options;
    let items = query
        .keywords
        .iter()
        .map(|k| json!({"keyword": k, "time": o.timeframe, "geo": o.region}))
        .collect_vec();
    json!({
        "comparisonItem": items,
        "category": o.category,
        "property": o.property.as_str(),
    })
}

/// One value per keyword, in keyword order; missing values are null.
fn keyword_values(keywords: &[String], values: Option<&Value>) -> Value {
    let values = values.and_then(Value::as_array);
    (0..keywords.len())
        .map(|i| values.and_then(|v| v.get(i)).cloned().unwrap_or(Value::Null))
        .collect()
}

/// Timeline rows: date, keyword values, partial-period flag.
fn timeline_table(keywords: &[String], data: &Value) -> Table {
    let Some(points) = data.pointer("/default/timelineData").and_then(Value::as_array) else {
        return vec![];
    };
    points
        .iter()
        .map(|p| {
            let mut row = Row::new();
            let time = tables::text(p.get("time"));
            let date = time.parse::<i64>().map(Value::from).unwrap_or(Value::String(time));
            row.insert(DATE.to_owned(), date);
            row.insert(VALUES.to_owned(), keyword_values(keywords, p.get("value")));
            let partial = p.get("isPartial").and_then(Value::as_bool).unwrap_or(false);
            row.insert(IS_PARTIAL.to_owned(), Value::Bool(partial));
            row
        })
        .collect_vec()
}

/// Region rows, sorted by place name.
fn region_table(keywords: &[String], data: &Value) -> Table {
    let Some(places) = data.pointer("/default/geoMapData").and_then(Value::as_array) else {
        return vec![];
    };
    let mut rows = places
        .iter()
        .map(|p| {
            let mut row = Row::new();
            row.insert(GEO_NAME.to_owned(), Value::String(tables::text(p.get("geoName"))));
            if let Some(code) = p.get("geoCode") {
                row.insert(GEO_CODE.to_owned(), code.clone());
            }
            if let Some(c) = p.get("coordinates") {
                row.insert(COORDINATES.to_owned(), c.clone());
            }
            row.insert(VALUES.to_owned(), keyword_values(keywords, p.get("value")));
            row
        })
        .collect_vec();
    rows.sort_by_key(|r| tables::text(r.get(GEO_NAME)));
    rows
}

fn topic_row(item: &Value) -> Row {
    let mut row = Row::new();
    let topic = item.get("topic");
    for (k, v) in [("title", "title"), ("type", "type"), ("mid", "mid")] {
        let cell = topic.and_then(|t| t.get(v)).cloned().unwrap_or(Value::Null);
        row.insert(k.to_owned(), cell);
    }
    row.insert("value".to_owned(), item.get("value").cloned().unwrap_or(Value::Null));
    row.insert(
        "formattedValue".to_owned(),
        item.get("formattedValue").cloned().unwrap_or(Value::Null),
    );
    row
}

fn query_row(item: &Value) -> Row {
    let mut row = Row::new();
    for k in ["query", "value", "formattedValue"] {
        row.insert(k.to_owned(), item.get(k).cloned().unwrap_or(Value::Null));
    }
    row
}

/// `rankedList[0]` holds the top items and `rankedList[1]` the rising ones.
fn ranked_buckets(data: &Value, to_row: fn(&Value) -> Row) -> RelatedBuckets {
    let bucket = |i: usize| -> Option<Table> {
        let items = data
            .pointer(&format!("/default/rankedList/{i}/rankedKeyword"))?
            .as_array()?;
        Some(items.iter().map(to_row).collect_vec())
    };
    RelatedBuckets {
        top: bucket(0),
        rising: bucket(1),
    }
}

fn backoff(delay: Duration, attempt: u32) -> Duration {
    delay.saturating_mul(1 << attempt.min(16))
}

fn retryable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

/// How one HTTP attempt ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Outcome {
    Status(StatusCode),
    Transport,
}

impl Outcome {
    fn of(response: &reqwest::Result<Response>) -> Outcome {
        match response {
            Ok(resp) => Outcome::Status(resp.status()),
            Err(_) => Outcome::Transport,
        }
    }
}

/// What to do after an attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Next {
    Done,
    Retry(Duration),
    GiveUp,
}

/// `attempt` counts from 0; `retries` attempts may follow the first one.
fn next_step(outcome: Outcome, attempt: u32, retries: u32, delay: Duration) -> Next {
    match outcome {
        Outcome::Status(s) if s.is_success() => Next::Done,
        Outcome::Status(s) if !retryable(s) => Next::GiveUp,
        _ if attempt >= retries => Next::GiveUp,
        _ => Next::Retry(backoff(delay, attempt + 1)),
    }
}

fn describe(response: &reqwest::Result<Response>) -> String {
    match response {
        Ok(resp) => format!("HTTP {}", resp.status()),
        Err(e) => e.to_string(),
    }
}

/// Client for the public trends web API.
pub struct GoogleTrends {
    client: Client,
    retries: u32,
}

impl GoogleTrends {
    pub fn new() -> Result<GoogleTrends> {
        let client = Client::builder()
            .cookie_store(true)
            .timeout(Duration::from_secs(TIMEOUT_SECS))
            .user_agent(concat!("trendfetch/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(GoogleTrends {
            client,
            retries: RETRIES,
        })
    }
}

/// State of one round trip: pacing and the parameters shared by every call.
struct Session<'a> {
    client: &'a Client,
    retries: u32,
    delay: Duration,
    tz: String,
    requests: u32,
}

impl Session<'_> {
    fn send(&mut self, method: Method, url: &str, params: &[(&str, String)]) -> Result<String> {
        if self.requests > 0 {
            thread::sleep(self.delay);
        }
        self.requests += 1;
        let mut attempt = 0;
        loop {
            debug!("{method} {url}");
            trace!("parameters: {:?}", params);
            let response = self.client.request(method.clone(), url).query(params).send();
            match (next_step(Outcome::of(&response), attempt, self.retries, self.delay), response) {
                (Next::Done, Ok(resp)) => {
                    return resp
                        .text()
                        .map_err(|e| errors::provider_error(format!("{url}: {e}")));
                }
                (Next::Retry(wait), response) => {
                    attempt += 1;
                    warn!(
                        "{url}: {}, retry {attempt}/{} in {:?}",
                        describe(&response),
                        self.retries,
                        wait
                    );
                    thread::sleep(wait);
                }
                (_, response) => {
                    return Err(errors::provider_error(format!("{url}: {}", describe(&response))));
                }
            }
        }
    }

    fn widget_data(&mut self, url: &str, request: &Value, token: &str) -> Result<Value> {
        let params = [
            ("req", request.to_string()),
            ("token", token.to_owned()),
            ("tz", self.tz.clone()),
        ];
        let body = self.send(Method::GET, url, &params)?;
        parse_body(&body)
    }

    fn regions(&mut self, widget: Option<&Widget>, keywords: &[String], resolution: Resolution) -> Result<Table> {
        let Some(widget) = widget else {
            debug!("no region widget");
            return Ok(vec![]);
        };
        let mut request = widget.request.clone();
        if let Some(r) = request.as_object_mut() {
            r.insert("resolution".to_owned(), json!(resolution.as_str()));
            r.insert("includeLowSearchVolumeGeos".to_owned(), json!(false));
        }
        let data = self.widget_data(REGION_URL, &request, &widget.token)?;
        Ok(region_table(keywords, &data))
    }

    fn related(&mut self, widgets: &[Widget], id: &str, to_row: fn(&Value) -> Row) -> Result<RelatedTables> {
        let mut tables = RelatedTables::new();
        for widget in widgets.iter().filter(|w| w.id == id) {
            let data = self.widget_data(RELATED_URL, &widget.request, &widget.token)?;
            tables.insert(related_keyword(widget), ranked_buckets(&data, to_row));
        }
        Ok(tables)
    }
}

impl Provider for GoogleTrends {
    fn fetch(&self, query: &Query) -> Result<RawResponse> {
        let o = &query.options;
        let mut session = Session {
            client: &self.client,
            retries: self.retries,
            delay: Duration::try_from_secs_f64(o.request_delay).unwrap_or_default(),
            tz: o.timezone_offset.to_string(),
            requests: 0,
        };

        let geo = o.language.get(o.language.len().saturating_sub(2)..).unwrap_or_default();
        session.send(Method::GET, HOME_URL, &[("geo", geo.to_owned())])?;

        let params = [
            ("hl", o.language.clone()),
            ("tz", session.tz.clone()),
            ("req", explore_request(query).to_string()),
        ];
        let body = session.send(Method::POST, EXPLORE_URL, &params)?;
        let widgets = widgets(&parse_body(&body)?)?;
        debug!(
            "widgets: {}",
            widgets.iter().map(|w| w.id.as_str()).join(", ")
        );
        let find = |id: &str| widgets.iter().find(|w| w.id == id);

        let timeline = match find("TIMESERIES") {
            Some(w) => {
                let data = session.widget_data(TIMELINE_URL, &w.request, &w.token)?;
                timeline_table(&query.keywords, &data)
            }
            None => vec![],
        };
        let subregion = session.regions(find("GEO_MAP"), &query.keywords, Resolution::Region)?;
        let city = session.regions(find("GEO_MAP"), &query.keywords, Resolution::City)?;
        let related_topics = session.related(&widgets, "RELATED_TOPICS", topic_row)?;
        let related_queries = session.related(&widgets, "RELATED_QUERIES", query_row)?;

        Ok(RawResponse {
            timeline,
            subregion,
            city,
            related_topics,
            related_queries,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::normalize;
    use crate::options::{OptionSet, Property};

    fn keywords() -> Vec<String> {
        vec!["coffee".to_owned(), "tea".to_owned()]
    }

    #[test]
    fn body_prefix_is_skipped() {
        let v = parse_body(")]}',\n{\"default\": {}}").unwrap();
        assert_eq!(v, json!({"default": {}}));
        let v = parse_body(")]}'\n{\"widgets\": []}").unwrap();
        assert_eq!(v, json!({"widgets": []}));
        assert!(parse_body("<html>rate limited</html>").is_err());
    }

    #[test]
    fn explore_request_shape() {
        let q = Query {
            keywords: keywords(),
            options: OptionSet {
                region: "US".to_owned(),
                property: Property::News,
                category: 71,
                ..OptionSet::default()
            },
        };
        assert_eq!(
            explore_request(&q),
            json!({
                "comparisonItem": [
                    {"keyword": "coffee", "time": "today 12-m", "geo": "US"},
                    {"keyword": "tea", "time": "today 12-m", "geo": "US"},
                ],
                "category": 71,
                "property": "news",
            })
        );
    }

    #[test]
    fn widget_selection() {
        let explore = json!({"widgets": [
            {"id": "TIMESERIES", "token": "t1", "request": {}},
            {"id": "RELATED_QUERIES", "token": "t2", "request": {
                "restriction": {"complexKeywordsRestriction": {"keyword": [{"type": "BROAD", "value": "tea"}]}}
            }},
            {"id": "RELATED_TOPICS", "token": "t3", "request": {}},
        ]});
        let w = widgets(&explore).unwrap();
        assert_eq!(w.len(), 3);
        assert_eq!(related_keyword(&w[1]), "tea");
        assert_eq!(related_keyword(&w[2]), "");
        assert!(widgets(&json!({"error": 1})).is_err());
    }

    #[test]
    fn timeline_rows() {
        let data = json!({"default": {"timelineData": [
            {"time": "1704585600", "formattedTime": "Jan 7 – 13, 2024", "value": [55, 30]},
            {"time": "1705190400", "value": [60], "isPartial": true},
        ]}});
        let t = timeline_table(&keywords(), &data);
        assert_eq!(
            serde_json::to_value(&t).unwrap(),
            json!([
                {"date": 1704585600, "value": [55, 30], "isPartial": false},
                {"date": 1705190400, "value": [60, null], "isPartial": true},
            ])
        );
        assert!(timeline_table(&keywords(), &json!({"default": {}})).is_empty());
    }

    #[test]
    fn keywords_named_like_columns() {
        let data = json!({"default": {"timelineData": [
            {"time": "1704585600", "value": [55, 30], "isPartial": true},
        ]}});
        let keywords = vec!["date".to_owned(), "isPartial".to_owned()];
        let points = normalize::timeline(&timeline_table(&keywords, &data));
        assert_eq!(points[0].time, 1704585600);
        assert_eq!(points[0].formatted_time, "Jan 07, 2024");
        assert_eq!(points[0].value, [55, 30]);

        let data = json!({"default": {"geoMapData": [
            {"geoCode": "US-TX", "geoName": "Texas", "value": [100, 40]},
        ]}});
        let keywords = vec!["geoName".to_owned(), "geoCode".to_owned()];
        let places = normalize::regions(&region_table(&keywords, &data));
        assert_eq!(places[0].geo_name, "Texas");
        assert_eq!(places[0].geo_code.as_deref(), Some("US-TX"));
        assert_eq!(places[0].value, [100, 40]);
    }

    #[test]
    fn repeated_keywords_keep_every_value() {
        let data = json!({"default": {"timelineData": [
            {"time": "1704585600", "value": [1, 2]},
        ]}});
        let keywords = vec!["a".to_owned(), "a".to_owned()];
        let points = normalize::timeline(&timeline_table(&keywords, &data));
        assert_eq!(points[0].value, [1, 2]);
        assert_eq!(points[0].formatted_value, ["1", "2"]);
    }

    #[test]
    fn region_rows_sorted() {
        let data = json!({"default": {"geoMapData": [
            {"geoCode": "US-TX", "geoName": "Texas", "value": [100, 20]},
            {"geoCode": "US-AL", "geoName": "Alabama", "value": [70, 10]},
        ]}});
        let t = region_table(&keywords(), &data);
        assert_eq!(
            serde_json::to_value(&t).unwrap(),
            json!([
                {"geoName": "Alabama", "geoCode": "US-AL", "value": [70, 10]},
                {"geoName": "Texas", "geoCode": "US-TX", "value": [100, 20]},
            ])
        );
    }

    #[test]
    fn ranked_lists() {
        let data = json!({"default": {"rankedList": [
            {"rankedKeyword": [{"topic": {"mid": "/m/02vqfm", "title": "Coffee", "type": "Drink"}, "value": 100, "formattedValue": "100"}]},
            {"rankedKeyword": []},
        ]}});
        let b = ranked_buckets(&data, topic_row);
        assert_eq!(
            serde_json::to_value(b.top.unwrap()).unwrap(),
            json!([{"title": "Coffee", "type": "Drink", "mid": "/m/02vqfm", "value": 100, "formattedValue": "100"}])
        );
        assert_eq!(b.rising, Some(vec![]));

        let data = json!({"default": {"rankedList": [
            {"rankedKeyword": [{"query": "iced coffee", "value": 40, "formattedValue": "40", "link": "/x"}]},
        ]}});
        let b = ranked_buckets(&data, query_row);
        assert_eq!(
            serde_json::to_value(b.top.unwrap()).unwrap(),
            json!([{"query": "iced coffee", "value": 40, "formattedValue": "40"}])
        );
        assert_eq!(b.rising, None);
    }

    #[test]
    fn backoff_doubles() {
        let d = Duration::from_secs(1);
        assert_eq!(backoff(d, 1), Duration::from_secs(2));
        assert_eq!(backoff(d, 2), Duration::from_secs(4));
        assert_eq!(backoff(Duration::ZERO, 2), Duration::ZERO);
    }

    #[test]
    fn retry_decisions() {
        let d = Duration::from_secs(1);
        let status = |code: u16| Outcome::Status(StatusCode::from_u16(code).unwrap());
        assert_eq!(next_step(status(200), 0, RETRIES, d), Next::Done);
        assert_eq!(next_step(status(200), 2, RETRIES, d), Next::Done);
        assert_eq!(next_step(status(404), 0, RETRIES, d), Next::GiveUp);
        assert_eq!(next_step(status(400), 1, RETRIES, d), Next::GiveUp);
        assert_eq!(next_step(status(429), 0, RETRIES, d), Next::Retry(Duration::from_secs(2)));
        assert_eq!(next_step(status(503), 1, RETRIES, d), Next::Retry(Duration::from_secs(4)));
        assert_eq!(next_step(Outcome::Transport, 0, RETRIES, d), Next::Retry(Duration::from_secs(2)));
    }

    #[test]
    fn third_failure_gives_up() {
        let d = Duration::from_millis(10);
        let mut attempt = 0;
        let mut waits = vec![];
        loop {
            match next_step(Outcome::Status(StatusCode::TOO_MANY_REQUESTS), attempt, RETRIES, d) {
                Next::Retry(wait) => {
                    waits.push(wait);
                    attempt += 1;
                }
                other => {
                    assert_eq!(other, Next::GiveUp);
                    break;
                }
            }
        }
        assert_eq!(attempt, 2);
        assert_eq!(waits, [Duration::from_millis(20), Duration::from_millis(40)]);
        assert_eq!(next_step(Outcome::Transport, 2, RETRIES, d), Next::GiveUp);
        assert_eq!(next_step(Outcome::Transport, 0, 0, d), Next::GiveUp);
    }
}
