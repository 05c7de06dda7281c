//! Post filtering.
//!
//! Provides:
//! - `FilterField` and `Comparator` parsed from stored filter rows
//! - `CompiledFilter`, a type-checked filter with precompiled regexes
//! - `FilterSet`, the AND-combination applied by a source group

use std::fmt;
use std::str::FromStr;

use regex::{Regex, RegexBuilder};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::store::{FilterRecord, Post, PostKind};

/// Value type a field compares as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Text,
    Number,
    Bool,
}

/// Post attribute a filter inspects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterField {
    Title,
    /// Self text for submissions, body for comments.
    Text,
    Url,
    Author,
    Subreddit,
    Flair,
    Score,
    CreatedUtc,
    Nsfw,
    IsSelf,
}

impl FilterField {
    pub fn value_kind(self) -> ValueKind {
        match self {
            FilterField::Score | FilterField::CreatedUtc => ValueKind::Number,
            FilterField::Nsfw | FilterField::IsSelf => ValueKind::Bool,
            _ => ValueKind::Text,
        }
    }

    /// Whether posts of `kind` carry this field.
    pub fn applies_to(self, kind: PostKind) -> bool {
        match kind {
            PostKind::Submission => true,
            PostKind::Comment => !matches!(
                self,
                FilterField::Title
                    | FilterField::Url
                    | FilterField::Flair
                    | FilterField::Nsfw
                    | FilterField::IsSelf
            ),
        }
    }
}

impl fmt::Display for FilterField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FilterField::Title => "title",
            FilterField::Text => "self_text",
            FilterField::Url => "url",
            FilterField::Author => "author",
            FilterField::Subreddit => "subreddit",
            FilterField::Flair => "flair",
            FilterField::Score => "score",
            FilterField::CreatedUtc => "created_utc",
            FilterField::Nsfw => "nsfw",
            FilterField::IsSelf => "is_self",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for FilterField {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "title" => Ok(FilterField::Title),
            "self_text" | "selftext" | "body" | "text" => Ok(FilterField::Text),
            "url" => Ok(FilterField::Url),
            "author" => Ok(FilterField::Author),
            "subreddit" => Ok(FilterField::Subreddit),
            "flair" | "flair_text" | "flairtext" => Ok(FilterField::Flair),
            "score" => Ok(FilterField::Score),
            "created_utc" | "createdutc" => Ok(FilterField::CreatedUtc),
            "nsfw" | "over_18" => Ok(FilterField::Nsfw),
            "is_self" | "isself" => Ok(FilterField::IsSelf),
            _ => Err(format!("Unknown filter field: {}", s)),
        }
    }
}

/// Comparison applied between a field and the filter value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparator {
    Equal,
    NotEqual,
    Contains,
    Regex,
    Greater,
    GreaterOrEqual,
    Less,
    LessOrEqual,
}

impl Comparator {
    fn is_ordering(self) -> bool {
        matches!(
            self,
            Comparator::Greater
                | Comparator::GreaterOrEqual
                | Comparator::Less
                | Comparator::LessOrEqual
        )
    }
}

impl fmt::Display for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Comparator::Equal => "==",
            Comparator::NotEqual => "!=",
            Comparator::Contains => "c",
            Comparator::Regex => "re",
            Comparator::Greater => ">",
            Comparator::GreaterOrEqual => ">=",
            Comparator::Less => "<",
            Comparator::LessOrEqual => "<=",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for Comparator {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim() {
            "==" | "=" => Ok(Comparator::Equal),
            "!=" => Ok(Comparator::NotEqual),
            "c" => Ok(Comparator::Contains),
            "re" => Ok(Comparator::Regex),
            ">" => Ok(Comparator::Greater),
            ">=" => Ok(Comparator::GreaterOrEqual),
            "<" => Ok(Comparator::Less),
            "<=" => Ok(Comparator::LessOrEqual),
            _ => Err(format!("Unknown comparator: {}", s)),
        }
    }
}

/// Typed filter operand.
#[derive(Debug, Clone)]
enum Operand {
    Text(String),
    Pattern(Regex),
    Number(f64),
    Bool(bool),
}

/// Field value read from a post.
enum FieldValue<'a> {
    Text(&'a str),
    Number(f64),
    Bool(bool),
}

/// A filter row checked against its field type, ready to match posts.
#[derive(Debug, Clone)]
pub struct CompiledFilter {
    kind: PostKind,
    field: FilterField,
    comparator: Comparator,
    operand: Operand,
    negative_match: bool,
}

fn invalid(field: &str, message: impl Into<String>) -> Error {
    Error::InvalidFilter {
        field: field.to_string(),
        message: message.into(),
    }
}

impl CompiledFilter {
    pub fn compile(record: &FilterRecord) -> Result<Self> {
        let field: FilterField = record
            .field
            .parse()
            .map_err(|e: String| invalid(&record.field, e))?;
        let comparator: Comparator = record
            .comparator
            .parse()
            .map_err(|e: String| invalid(&record.field, e))?;
        let kind = if record.for_submissions {
            PostKind::Submission
        } else {
            PostKind::Comment
        };

        if !field.applies_to(kind) {
            return Err(invalid(
                &record.field,
                format!("field is not available on {:?} posts", kind),
            ));
        }

        let value: Value = serde_json::from_str(&record.value_json)
            .map_err(|e| invalid(&record.field, format!("value is not valid JSON: {}", e)))?;

        let operand = match (field.value_kind(), comparator) {
            (ValueKind::Text, Comparator::Regex) => {
                let pattern = value
                    .as_str()
                    .ok_or_else(|| invalid(&record.field, "regex value must be a string"))?;
                let regex = RegexBuilder::new(pattern)
                    .case_insensitive(true)
                    .build()
                    .map_err(|e| invalid(&record.field, e.to_string()))?;
                Operand::Pattern(regex)
            }
            (ValueKind::Text, c) if c.is_ordering() => {
                return Err(invalid(
                    &record.field,
                    format!("comparator '{}' needs a numeric field", c),
                ));
            }
            (ValueKind::Text, _) => match value {
                Value::String(s) => Operand::Text(s.to_lowercase()),
                Value::Number(n) => Operand::Text(n.to_string()),
                other => {
                    return Err(invalid(
                        &record.field,
                        format!("expected a string value, got {}", other),
                    ))
                }
            },
            (ValueKind::Number, Comparator::Contains | Comparator::Regex) => {
                return Err(invalid(
                    &record.field,
                    format!("comparator '{}' needs a text field", comparator),
                ));
            }
            (ValueKind::Number, _) => {
                let number = match &value {
                    Value::Number(n) => n.as_f64(),
                    Value::String(s) => s.trim().parse::<f64>().ok(),
                    _ => None,
                };
                Operand::Number(number.ok_or_else(|| {
                    invalid(&record.field, format!("expected a number, got {}", value))
                })?)
            }
            (ValueKind::Bool, Comparator::Equal | Comparator::NotEqual) => {
                let flag = match &value {
                    Value::Bool(b) => Some(*b),
                    Value::String(s) => s.trim().parse::<bool>().ok(),
                    _ => None,
                };
                Operand::Bool(flag.ok_or_else(|| {
                    invalid(&record.field, format!("expected a boolean, got {}", value))
                })?)
            }
            (ValueKind::Bool, c) => {
                return Err(invalid(
                    &record.field,
                    format!("comparator '{}' cannot be used on a boolean field", c),
                ));
            }
        };

        Ok(Self {
            kind,
            field,
            comparator,
            operand,
            negative_match: record.negative_match,
        })
    }

    /// Kind of post this filter applies to.
    pub fn kind(&self) -> PostKind {
        self.kind
    }

    pub fn field(&self) -> FilterField {
        self.field
    }

    /// Evaluate against a post of the matching kind. The negation flag is applied here.
    pub fn matches(&self, post: &Post) -> bool {
        self.raw_match(post) != self.negative_match
    }

    fn read<'a>(&self, post: &'a Post) -> FieldValue<'a> {
        match (self.field, post) {
            (FilterField::Title, Post::Submission(s)) => FieldValue::Text(&s.title),
            (FilterField::Url, Post::Submission(s)) => FieldValue::Text(&s.url),
            (FilterField::Flair, Post::Submission(s)) => {
                FieldValue::Text(s.flair_text.as_deref().unwrap_or(""))
            }
            (FilterField::Nsfw, Post::Submission(s)) => FieldValue::Bool(s.nsfw),
            (FilterField::IsSelf, Post::Submission(s)) => FieldValue::Bool(s.is_self),
            (FilterField::Text, p) => FieldValue::Text(p.text()),
            (FilterField::Author, p) => FieldValue::Text(p.author()),
            (FilterField::Subreddit, p) => FieldValue::Text(p.subreddit()),
            (FilterField::Score, p) => FieldValue::Number(p.score() as f64),
            (FilterField::CreatedUtc, p) => FieldValue::Number(p.created_utc() as f64),
            // Submission-only fields read as empty on comments.
            (_, Post::Comment(_)) => FieldValue::Text(""),
        }
    }

    fn raw_match(&self, post: &Post) -> bool {
        match (self.read(post), &self.operand) {
            (FieldValue::Text(text), Operand::Pattern(re)) => re.is_match(text),
            (FieldValue::Text(text), Operand::Text(expected)) => {
                let text = text.to_lowercase();
                match self.comparator {
                    Comparator::Equal => text == *expected,
                    Comparator::NotEqual => text != *expected,
                    Comparator::Contains => text.contains(expected.as_str()),
                    _ => false,
                }
            }
            (FieldValue::Number(n), Operand::Number(expected)) => match self.comparator {
                Comparator::Equal => n == *expected,
                Comparator::NotEqual => n != *expected,
                Comparator::Greater => n > *expected,
                Comparator::GreaterOrEqual => n >= *expected,
                Comparator::Less => n < *expected,
                Comparator::LessOrEqual => n <= *expected,
                _ => false,
            },
            (FieldValue::Bool(b), Operand::Bool(expected)) => match self.comparator {
                Comparator::Equal => b == *expected,
                Comparator::NotEqual => b != *expected,
                _ => false,
            },
            _ => false,
        }
    }
}

/// All filters of a group. A post passes when every filter for its kind matches.
#[derive(Debug, Clone, Default)]
pub struct FilterSet {
    filters: Vec<CompiledFilter>,
}

impl FilterSet {
    pub fn compile(records: &[FilterRecord]) -> Result<Self> {
        let filters = records
            .iter()
            .map(CompiledFilter::compile)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { filters })
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    pub fn admits(&self, post: &Post) -> bool {
        let kind = post.kind();
        self.filters
            .iter()
            .filter(|f| f.kind() == kind)
            .all(|f| f.matches(post))
    }
}
