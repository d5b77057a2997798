//! Turning one raw input into search keywords and an effective [OptionSet].
//!
//! An input is either a plain search term or a link copied from the trends
//! explorer. Links carry their own query parameters, which sit between the
//! base options and the caller's overrides:
//!
//! base options < parameters embedded in the link < overrides
//!
//! Layering is field by field, so an override that only names a region keeps
//! the timeframe taken from the link.

use crate::errors::{self, Result};
use crate::options::{OptionSet, OptionsPatch, Property};
use log::debug;
use std::collections::HashMap;
use url::Url;

/// Inputs containing this are treated as explorer links.
pub const TRENDS_HOST: &str = "trends.google";

/// What to ask the provider for.
#[derive(Clone, Debug, PartialEq)]
pub struct Query {
    pub keywords: Vec<String>,
    pub options: OptionSet,
}

pub fn is_trends_url(raw: &str) -> bool {
    raw.contains(TRENDS_HOST)
}

fn is_unsigned(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

fn is_integer(s: &str) -> bool {
    is_unsigned(s.strip_prefix('-').unwrap_or(s))
}

fn parse_url(raw: &str) -> Result<Url> {
    let raw = raw.trim();
    Url::parse(raw)
        .or_else(|_| Url::parse(&format!("https://{raw}")))
        .map_err(|e| errors::invalid_input(format!("cannot parse link '{raw}': {e}")))
}

/// Query parameters of a link; the first non-blank value of each key wins.
fn query_params(url: &Url) -> HashMap<String, String> {
    let mut params = HashMap::new();
    for (k, v) in url.query_pairs() {
        if v.is_empty() {
            continue;
        }
        params.entry(k.into_owned()).or_insert_with(|| v.into_owned());
    }
    params
}

/// Keywords and options embedded in an explorer link.
///
/// Parameters that are missing or malformed leave the corresponding field of
/// `base` untouched.
pub fn from_url(raw: &str, base: &OptionSet) -> Result<(Vec<String>, OptionSet)> {
    let url = parse_url(raw)?;
    let params = query_params(&url);
    let get = |k: &str| params.get(k).map(String::as_str);

    let mut keywords: Vec<String> = get("q")
        .map(|q| {
            q.split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_owned)
                .collect()
        })
        .unwrap_or_default();
    if keywords.is_empty() {
        keywords.push(get("q").unwrap_or_default().to_owned());
    }

    let mut options = base.clone();
    if let Some(hl) = get("hl") {
        options.language = hl.to_owned();
    }
    if let Some(tz) = get("tz").filter(|s| is_integer(s)).and_then(|s| s.parse().ok()) {
        options.timezone_offset = tz;
    }
    if let Some(geo) = get("geo") {
        options.region = geo.to_owned();
    }
    if let Some(date) = get("date") {
        options.timeframe = date.to_owned();
    }
    if let Some(gprop) = get("gprop").and_then(|s| s.parse::<Property>().ok()) {
        options.property = gprop;
    }
    if let Some(cat) = get("cat").filter(|s| is_unsigned(s)).and_then(|s| s.parse().ok()) {
        options.category = cat;
    }
    Ok((keywords, options))
}

/// Resolve one raw input against the base options and the caller's overrides.
pub fn resolve(raw: &str, base: &OptionSet, overrides: &OptionsPatch) -> Result<Query> {
    let (keywords, options) = if is_trends_url(raw) {
        let (keywords, from_link) = from_url(raw, base)?;
        debug!("link parameters: {:?}", from_link);
        (keywords, overrides.apply(&from_link))
    } else {
        (vec![raw.to_owned()], overrides.apply(base))
    };
    let keywords: Vec<String> = keywords
        .into_iter()
        .filter(|k| !k.trim().is_empty())
        .collect();
    if keywords.is_empty() {
        return Err(errors::invalid_input(format!(
            "no valid search term in '{raw}'"
        )));
    }
    Ok(Query { keywords, options })
}

#[cfg(test)]
mod test {
    use super::*;

    const LINK: &str = "https://trends.google.com/trends/explore?date=now%207-d&geo=US&q=a,b";

    #[test]
    fn plain_keyword() {
        let q = resolve("coffee", &OptionSet::default(), &OptionsPatch::default()).unwrap();
        assert_eq!(q.keywords, ["coffee"]);
        assert_eq!(q.options.timeframe, "today 12-m");
    }

    #[test]
    fn plain_keyword_takes_overrides() {
        let overrides = OptionsPatch {
            region: Some("PK".to_owned()),
            ..OptionsPatch::default()
        };
        let q = resolve("tea", &OptionSet::default(), &overrides).unwrap();
        assert_eq!(q.options.region, "PK");
        assert_eq!(q.options.timeframe, "today 12-m");
    }

    #[test]
    fn link_parameters() {
        let q = resolve(LINK, &OptionSet::default(), &OptionsPatch::default()).unwrap();
        assert_eq!(q.keywords, ["a", "b"]);
        assert_eq!(q.options.timeframe, "now 7-d");
        assert_eq!(q.options.region, "US");
        assert_eq!(q.options.language, "en-US");
    }

    #[test]
    fn link_without_scheme() {
        let q = resolve(
            "trends.google.com/trends/explore?q=web%20scraping&hl=de",
            &OptionSet::default(),
            &OptionsPatch::default(),
        )
        .unwrap();
        assert_eq!(q.keywords, ["web scraping"]);
        assert_eq!(q.options.language, "de");
    }

    #[test]
    fn overrides_win_per_field() {
        let overrides = OptionsPatch {
            region: Some("GB".to_owned()),
            ..OptionsPatch::default()
        };
        let q = resolve(LINK, &OptionSet::default(), &overrides).unwrap();
        assert_eq!(q.options.region, "GB");
        assert_eq!(q.options.timeframe, "now 7-d");
    }

    #[test]
    fn absent_overrides_keep_link_values() {
        let overrides = OptionsPatch {
            region: Some(String::new()),
            timeframe: None,
            ..OptionsPatch::default()
        };
        let base = OptionSet {
            timeframe: "today 5-y".to_owned(),
            ..OptionSet::default()
        };
        let q = resolve(LINK, &base, &overrides).unwrap();
        assert_eq!(q.options.region, "US");
        assert_eq!(q.options.timeframe, "now 7-d");
    }

    #[test]
    fn zero_category_override_wins_over_link() {
        let overrides = OptionsPatch {
            category: Some(0),
            ..OptionsPatch::default()
        };
        let q = resolve(
            "https://trends.google.com/trends/explore?q=x&cat=71",
            &OptionSet::default(),
            &overrides,
        )
        .unwrap();
        assert_eq!(q.options.category, 0);
    }

    #[test]
    fn tz_and_cat_patterns() {
        let base = OptionSet {
            timezone_offset: 60,
            category: 5,
            ..OptionSet::default()
        };
        let (_, o) = from_url("https://trends.google.com/explore?q=x&tz=-120&cat=71", &base).unwrap();
        assert_eq!(o.timezone_offset, -120);
        assert_eq!(o.category, 71);
        let (_, o) = from_url("https://trends.google.com/explore?q=x&tz=abc&cat=-3", &base).unwrap();
        assert_eq!(o.timezone_offset, 60);
        assert_eq!(o.category, 5);
        let (_, o) = from_url("https://trends.google.com/explore?q=x&tz=%2B5&cat=1.5", &base).unwrap();
        assert_eq!(o.timezone_offset, 60);
        assert_eq!(o.category, 5);
    }

    #[test]
    fn unknown_gprop_is_ignored() {
        let (_, o) = from_url(
            "https://trends.google.com/explore?q=x&gprop=radio",
            &OptionSet::default(),
        )
        .unwrap();
        assert_eq!(o.property, Property::All);
        let (_, o) = from_url(
            "https://trends.google.com/explore?q=x&gprop=youtube",
            &OptionSet::default(),
        )
        .unwrap();
        assert_eq!(o.property, Property::Youtube);
    }

    #[test]
    fn blank_keywords_are_dropped() {
        let (k, _) = from_url(
            "https://trends.google.com/explore?q=a,%20,b,,",
            &OptionSet::default(),
        )
        .unwrap();
        assert_eq!(k, ["a", "b"]);
    }

    #[test]
    fn link_without_keywords_fails() {
        let r = resolve(
            "https://trends.google.com/trends/explore?geo=US",
            &OptionSet::default(),
            &OptionsPatch::default(),
        );
        assert!(r.is_err());
        let r = resolve(
            "https://trends.google.com/trends/explore?q=&geo=US",
            &OptionSet::default(),
            &OptionsPatch::default(),
        );
        assert!(r.is_err());
    }

    #[test]
    fn blank_input_fails() {
        let r = resolve("   ", &OptionSet::default(), &OptionsPatch::default());
        let e = r.unwrap_err();
        assert!(e.to_string().starts_with("invalid input"));
    }
}
