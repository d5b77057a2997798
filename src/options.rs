//! Query options and the partial overrides that are layered on top of them.

use crate::errors::InvalidArgument;
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::{fmt, result};

pub const DEFAULT_LANGUAGE: &str = "en-US";
pub const DEFAULT_TIMEFRAME: &str = "today 12-m";
pub const DEFAULT_REQUEST_DELAY: f64 = 1.0;

/// Provider sub-vertical that the search interest is restricted to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Property {
    /// Web search.
    #[default]
    #[serde(rename = "")]
    All,
    Images,
    News,
    Youtube,
    Froogle,
}

impl Property {
    pub fn as_str(&self) -> &'static str {
        match self {
            Property::All => "",
            Property::Images => "images",
            Property::News => "news",
            Property::Youtube => "youtube",
            Property::Froogle => "froogle",
        }
    }
}

impl fmt::Display for Property {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Property::All => write!(f, "web"),
            other => write!(f, "{}", other.as_str()),
        }
    }
}

impl FromStr for Property {
    type Err = InvalidArgument;

    fn from_str(s: &str) -> result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "web" => Ok(Property::All),
            "images" => Ok(Property::Images),
            "news" => Ok(Property::News),
            "youtube" => Ok(Property::Youtube),
            "froogle" => Ok(Property::Froogle),
            other => Err(InvalidArgument(format!(
                "unknown property '{other}', expected one of: images, news, youtube, froogle"
            ))),
        }
    }
}

/// Files accept the same spellings as the command line, `web` included.
impl<'de> Deserialize<'de> for Property {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrText<T> {
    Number(T),
    Text(String),
}

/// A number, or a string holding one. A blank string counts as absent.
fn lenient<'de, D, T>(deserializer: D) -> result::Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + FromStr,
    T::Err: fmt::Display,
{
    match Option::<NumberOrText<T>>::deserialize(deserializer)? {
        None => Ok(None),
        Some(NumberOrText::Number(x)) => Ok(Some(x)),
        Some(NumberOrText::Text(s)) if s.trim().is_empty() => Ok(None),
        Some(NumberOrText::Text(s)) => s
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| de::Error::custom(format!("'{s}' is not a number: {e}"))),
    }
}

/// A fully populated set of query parameters.
///
/// Serialized with the provider's parameter names, which is also the shape
/// echoed back in every exported record.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct OptionSet {
    /// Interface language, e.g. `en-US`.
    #[serde(rename = "hl")]
    pub language: String,
    /// Timezone offset in minutes.
    #[serde(rename = "tz")]
    pub timezone_offset: i32,
    /// Region code, empty for worldwide.
    #[serde(rename = "geo")]
    pub region: String,
    /// Either a relative window such as `now 7-d` or `YYYY-MM-DD YYYY-MM-DD`.
    pub timeframe: String,
    #[serde(rename = "gprop")]
    pub property: Property,
    /// Category id, 0 for all categories.
    pub category: u32,
    /// Pause between consecutive provider requests, in seconds.
    /// Not echoed in exported records.
    #[serde(rename = "sleep", default = "default_request_delay", skip_serializing)]
    pub request_delay: f64,
}

fn default_request_delay() -> f64 {
    DEFAULT_REQUEST_DELAY
}

impl Default for OptionSet {
    fn default() -> Self {
        OptionSet {
            language: DEFAULT_LANGUAGE.to_owned(),
            timezone_offset: 0,
            region: String::new(),
            timeframe: DEFAULT_TIMEFRAME.to_owned(),
            property: Property::All,
            category: 0,
            request_delay: DEFAULT_REQUEST_DELAY,
        }
    }
}

/// A partial [OptionSet]: only the fields that some layer actually provided.
///
/// Numeric fields count as provided whenever they are present, so an explicit
/// `category = 0` or `tz = 0` does override. Empty strings and the empty
/// property filter count as absent.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct OptionsPatch {
    #[serde(rename = "hl")]
    pub language: Option<String>,
    #[serde(rename = "tz", deserialize_with = "lenient")]
    pub timezone_offset: Option<i32>,
    #[serde(rename = "geo")]
    pub region: Option<String>,
    pub timeframe: Option<String>,
    #[serde(rename = "gprop")]
    pub property: Option<Property>,
    #[serde(deserialize_with = "lenient")]
    pub category: Option<u32>,
    #[serde(rename = "sleep", deserialize_with = "lenient")]
    pub request_delay: Option<f64>,
}

fn provided(s: &Option<String>) -> Option<&str> {
    s.as_deref().filter(|s| !s.is_empty())
}

impl OptionsPatch {
    fn language(&self) -> Option<&str> {
        provided(&self.language)
    }

    fn region(&self) -> Option<&str> {
        provided(&self.region)
    }

    fn timeframe(&self) -> Option<&str> {
        provided(&self.timeframe)
    }

    fn property(&self) -> Option<Property> {
        self.property.filter(|p| *p != Property::All)
    }

    fn request_delay(&self) -> Option<f64> {
        self.request_delay.filter(|d| d.is_finite() && *d >= 0.0)
    }

    /// Does this patch provide nothing at all?
    pub fn is_empty(&self) -> bool {
        self.language().is_none()
            && self.timezone_offset.is_none()
            && self.region().is_none()
            && self.timeframe().is_none()
            && self.property().is_none()
            && self.category.is_none()
            && self.request_delay().is_none()
    }

    /// Overwrite the provided fields of `base`, leaving every other field alone.
    pub fn apply(&self, base: &OptionSet) -> OptionSet {
        OptionSet {
            language: self.language().unwrap_or(&base.language).to_owned(),
            timezone_offset: self.timezone_offset.unwrap_or(base.timezone_offset),
            region: self.region().unwrap_or(&base.region).to_owned(),
            timeframe: self.timeframe().unwrap_or(&base.timeframe).to_owned(),
            property: self.property().unwrap_or(base.property),
            category: self.category.unwrap_or(base.category),
            request_delay: self.request_delay().unwrap_or(base.request_delay),
        }
    }

    /// Combine two patches; fields provided by `top` win.
    pub fn overlay(&self, top: &OptionsPatch) -> OptionsPatch {
        fn pick_str(top: &Option<String>, below: &Option<String>) -> Option<String> {
            provided(top).or(provided(below)).map(str::to_owned)
        }
        OptionsPatch {
            language: pick_str(&top.language, &self.language),
            timezone_offset: top.timezone_offset.or(self.timezone_offset),
            region: pick_str(&top.region, &self.region),
            timeframe: pick_str(&top.timeframe, &self.timeframe),
            property: top.property().or(self.property()),
            category: top.category.or(self.category),
            request_delay: top.request_delay().or(self.request_delay()),
        }
    }
}
