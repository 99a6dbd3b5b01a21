use std::collections::HashMap;

use serde_json::Value;

use crate::{error::ApiError, models::Record};

/// How free-text query parameters compare against record fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextMatch {
    /// Case-insensitive substring; the default.
    #[default]
    Substring,
    /// Case-insensitive whole-value equality.
    Exact,
}

/// Matcher
///
/// One comparison a predicate performs against a single record field.
#[derive(Debug, Clone, PartialEq)]
pub enum Matcher {
    /// Case-insensitive substring (title, name, director).
    Contains(String),
    /// Case-insensitive equality (campus, category, or free text in exact mode).
    Equals(String),
    /// Numeric equality (year).
    NumberEq(f64),
    /// `field >= n` (creditPointsMin).
    AtLeast(f64),
    /// `field <= n` (prepTime).
    AtMost(f64),
}

impl Matcher {
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            Matcher::Contains(needle) => value
                .as_str()
                .is_some_and(|s| s.to_lowercase().contains(&needle.to_lowercase())),
            Matcher::Equals(expected) => value
                .as_str()
                .is_some_and(|s| s.to_lowercase() == expected.to_lowercase()),
            Matcher::NumberEq(n) => value.as_f64().is_some_and(|v| v == *n),
            Matcher::AtLeast(n) => value.as_f64().is_some_and(|v| v >= *n),
            Matcher::AtMost(n) => value.as_f64().is_some_and(|v| v <= *n),
        }
    }
}

/// Predicate
///
/// A matcher bound to a record field. A record missing the field never satisfies it.
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    pub field: String,
    pub matcher: Matcher,
}

impl Predicate {
    pub fn new(field: impl Into<String>, matcher: Matcher) -> Self {
        Self {
            field: field.into(),
            matcher,
        }
    }

    pub fn matches(&self, record: &Record) -> bool {
        record
            .get(&self.field)
            .is_some_and(|value| self.matcher.matches(value))
    }
}

/// apply
///
/// Returns the records that satisfy every predicate (AND semantics), in source order.
/// The source slice is left untouched and an empty result is a normal outcome.
pub fn apply(records: &[Record], predicates: &[Predicate]) -> Vec<Record> {
    records
        .iter()
        .filter(|record| predicates.iter().all(|p| p.matches(record)))
        .cloned()
        .collect()
}

/// The kind of comparison a query parameter drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryKind {
    /// Free text; follows the deployment's [`TextMatch`].
    Text,
    /// Enum value, always case-insensitive equality.
    Enum,
    NumberEq,
    AtLeast,
    AtMost,
}

/// QueryParam
///
/// Declares that the query string parameter `param` filters on record field `field`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryParam {
    pub param: &'static str,
    pub field: &'static str,
    pub kind: QueryKind,
}

impl QueryParam {
    pub const fn new(param: &'static str, field: &'static str, kind: QueryKind) -> Self {
        Self { param, field, kind }
    }
}

/// predicates_from_query
///
/// Turns raw query parameters into predicates using the resource's declarations. Parameters
/// that are not declared are ignored; an empty value imposes no constraint. A numeric
/// parameter that does not parse is rejected as `InvalidInput`.
pub fn predicates_from_query(
    query: &HashMap<String, String>,
    params: &[QueryParam],
    text_match: TextMatch,
) -> Result<Vec<Predicate>, ApiError> {
    let mut predicates = Vec::new();

    for declared in params {
        let Some(raw) = query.get(declared.param).map(|s| s.trim()) else {
            continue;
        };
        if raw.is_empty() {
            continue;
        }

        let matcher = match declared.kind {
            QueryKind::Text => match text_match {
                TextMatch::Substring => Matcher::Contains(raw.to_string()),
                TextMatch::Exact => Matcher::Equals(raw.to_string()),
            },
            QueryKind::Enum => Matcher::Equals(raw.to_string()),
            QueryKind::NumberEq => Matcher::NumberEq(parse_number(declared, raw)?),
            QueryKind::AtLeast => Matcher::AtLeast(parse_number(declared, raw)?),
            QueryKind::AtMost => Matcher::AtMost(parse_number(declared, raw)?),
        };
        predicates.push(Predicate::new(declared.field, matcher));
    }

    Ok(predicates)
}

fn parse_number(declared: &QueryParam, raw: &str) -> Result<f64, ApiError> {
    raw.parse::<f64>()
        .ok()
        .filter(|n| n.is_finite())
        .ok_or_else(|| {
            ApiError::InvalidInput(format!("Invalid {} in the query parameter", declared.param))
        })
}
