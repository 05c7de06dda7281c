//! API response type definitions.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::store::PostKind;

/// Generic `{"kind": ..., "data": ...}` envelope the API wraps everything in.
#[derive(Debug, Clone, Deserialize)]
pub struct Thing<T> {
    pub kind: String,
    pub data: T,
}

/// Listing page payload.
#[derive(Debug, Clone, Deserialize)]
pub struct ListingData {
    /// Continuation token for the next page.
    pub after: Option<String>,
    #[serde(default)]
    pub children: Vec<Thing<Map<String, Value>>>,
}

/// Identity of the authenticated account.
#[derive(Debug, Clone, Deserialize)]
pub struct AccountInfo {
    pub name: String,
}

/// OAuth token endpoint response.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: Option<String>,
    #[serde(default)]
    pub expires_in: i64,
    pub error: Option<String>,
}

/// A remote item as returned by the API, possibly missing fields.
#[derive(Debug, Clone, PartialEq)]
pub struct RawItem {
    pub kind: PostKind,
    pub data: Map<String, Value>,
}

impl RawItem {
    /// Build from an API envelope, rejecting kinds that are not posts or comments.
    pub fn from_thing(thing: Thing<Map<String, Value>>) -> Result<Self> {
        let kind = match thing.kind.as_str() {
            "t3" => PostKind::Submission,
            "t1" => PostKind::Comment,
            other => {
                return Err(Error::Api(format!("Unexpected item kind '{}'", other)));
            }
        };
        Ok(Self {
            kind,
            data: thing.data,
        })
    }

    /// The fullname (`t3_...`/`t1_...`) of this item.
    pub fn name(&self) -> Option<&str> {
        self.data.get("name").and_then(Value::as_str)
    }

    /// Field lookup. `Some(Value::Null)` means the API sent an explicit null.
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    pub fn has_field(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }
}

/// Subreddit listing sort mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubredditSort {
    #[default]
    Hot,
    New,
    Top,
    Rising,
}

impl fmt::Display for SubredditSort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubredditSort::Hot => write!(f, "hot"),
            SubredditSort::New => write!(f, "new"),
            SubredditSort::Top => write!(f, "top"),
            SubredditSort::Rising => write!(f, "rising"),
        }
    }
}

impl FromStr for SubredditSort {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "hot" => Ok(SubredditSort::Hot),
            "new" => Ok(SubredditSort::New),
            "top" => Ok(SubredditSort::Top),
            "rising" => Ok(SubredditSort::Rising),
            _ => Err(format!("Unknown sort mode: {}", s)),
        }
    }
}

/// Time range for `top` listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeRange {
    Hour,
    Day,
    Week,
    Month,
    Year,
    #[default]
    All,
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeRange::Hour => write!(f, "hour"),
            TimeRange::Day => write!(f, "day"),
            TimeRange::Week => write!(f, "week"),
            TimeRange::Month => write!(f, "month"),
            TimeRange::Year => write!(f, "year"),
            TimeRange::All => write!(f, "all"),
        }
    }
}

impl FromStr for TimeRange {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "hour" => Ok(TimeRange::Hour),
            "day" => Ok(TimeRange::Day),
            "week" => Ok(TimeRange::Week),
            "month" => Ok(TimeRange::Month),
            "year" => Ok(TimeRange::Year),
            "all" => Ok(TimeRange::All),
            _ => Err(format!("Unknown time range: {}", s)),
        }
    }
}

/// The shape of listing to start.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ListingKind {
    /// Items saved by the authenticated account.
    Saved,
    /// Items upvoted by the authenticated account.
    Upvoted,
    Subreddit {
        name: String,
        sort: SubredditSort,
        time: TimeRange,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listing_page_parses() {
        let json = r#"{"kind":"Listing","data":{"after":"t3_b","children":[
            {"kind":"t3","data":{"name":"t3_a","title":"hello"}},
            {"kind":"t1","data":{"name":"t1_c","body":"hi"}}
        ]}}"#;
        let page: Thing<ListingData> = serde_json::from_str(json).unwrap();
        assert_eq!(page.data.after.as_deref(), Some("t3_b"));

        let items: Vec<RawItem> = page
            .data
            .children
            .into_iter()
            .map(RawItem::from_thing)
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(items[0].kind, PostKind::Submission);
        assert_eq!(items[0].name(), Some("t3_a"));
        assert_eq!(items[1].kind, PostKind::Comment);
    }

    #[test]
    fn test_unknown_kind_rejected() {
        let thing = Thing {
            kind: "t5".to_string(),
            data: Map::new(),
        };
        assert!(RawItem::from_thing(thing).is_err());
    }

    #[test]
    fn test_sort_and_time_parse() {
        assert_eq!("TOP".parse::<SubredditSort>().unwrap(), SubredditSort::Top);
        assert!("best".parse::<SubredditSort>().is_err());
        assert_eq!("week".parse::<TimeRange>().unwrap(), TimeRange::Week);
        assert_eq!(TimeRange::All.to_string(), "all");
    }
}
