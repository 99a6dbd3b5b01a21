use serde_json::{Map, Value};
use thiserror::Error;

use crate::schema::{FieldRule, FieldType, Schema};

/// The single reason a candidate was rejected. Only the first violation is ever reported.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct ValidationError(pub String);

/// Candidate
///
/// A record body that passed validation. It holds only the fields the schema declares, and
/// the only way to build one is [`validate`], so nothing downstream ever reads an unchecked
/// request field.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate(Map<String, Value>);

impl Candidate {
    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.0.get(field).and_then(Value::as_str)
    }

    pub fn into_fields(self) -> Map<String, Value> {
        self.0
    }
}

/// validate
///
/// Checks `candidate` against `schema` without touching it. Rules run in a fixed order, each
/// one over every field before the next rule starts:
///
/// 1. required fields present and non-empty
/// 2. runtime types
/// 3. numeric bounds
/// 4. length bounds
/// 5. enum membership
///
/// Explicit `null` counts as absent. Keys the schema does not declare are dropped from the
/// returned [`Candidate`].
pub fn validate(candidate: &Map<String, Value>, schema: &Schema) -> Result<Candidate, ValidationError> {
    let present = |rule: &FieldRule| candidate.get(rule.name).filter(|v| !v.is_null());

    for rule in schema.fields.iter().filter(|r| r.required) {
        match present(rule) {
            None => return Err(invalid(rule, "is required")),
            Some(Value::String(s)) if s.trim().is_empty() => {
                return Err(invalid(rule, "is not allowed to be empty"));
            }
            Some(_) => {}
        }
    }

    for rule in &schema.fields {
        if let Some(value) = present(rule) {
            check_type(rule, value)?;
        }
    }

    for rule in &schema.fields {
        if let Some(n) = present(rule).and_then(Value::as_f64) {
            if let Some(min) = rule.min.filter(|min| n < *min) {
                return Err(invalid(rule, &format!("must be greater than or equal to {}", min)));
            }
            if let Some(max) = rule.max.filter(|max| n > *max) {
                return Err(invalid(rule, &format!("must be less than or equal to {}", max)));
            }
        }
    }

    for rule in &schema.fields {
        match present(rule) {
            Some(Value::String(s)) => check_length(rule, s.chars().count(), "characters long")?,
            Some(Value::Array(items)) => check_length(rule, items.len(), "items")?,
            _ => {}
        }
    }

    for rule in &schema.fields {
        if let (Some(allowed), Some(Value::String(s))) = (rule.allowed, present(rule)) {
            if !allowed.contains(&s.as_str()) {
                return Err(invalid(
                    rule,
                    &format!("must be one of [{}]", allowed.join(", ")),
                ));
            }
        }
    }

    let fields = schema
        .fields
        .iter()
        .filter_map(|rule| present(rule).map(|v| (rule.name.to_string(), normalize(rule, v))))
        .collect();
    Ok(Candidate(fields))
}

/// Integer fields are stored as JSON integers even when sent as `2021.0`.
fn normalize(rule: &FieldRule, value: &Value) -> Value {
    match (rule.ty, value.as_f64()) {
        (FieldType::Integer, Some(n)) if !value.is_i64() && !value.is_u64() => Value::from(n as i64),
        _ => value.clone(),
    }
}

fn check_type(rule: &FieldRule, value: &Value) -> Result<(), ValidationError> {
    let ok = match rule.ty {
        FieldType::String => value.is_string(),
        FieldType::Integer => value.as_f64().is_some_and(|n| n.fract() == 0.0),
        FieldType::Number => value.is_number(),
        FieldType::Boolean => value.is_boolean(),
        FieldType::StringList => value.as_array().is_some_and(|items| {
            items
                .iter()
                .all(|item| item.as_str().is_some_and(|s| !s.trim().is_empty()))
        }),
    };
    if ok {
        Ok(())
    } else {
        Err(invalid(rule, &format!("must be {}", rule.ty)))
    }
}

fn check_length(rule: &FieldRule, len: usize, unit: &str) -> Result<(), ValidationError> {
    if let Some(min) = rule.min_len.filter(|min| len < *min) {
        return Err(invalid(rule, &format!("length must be at least {} {}", min, unit)));
    }
    if let Some(max) = rule.max_len.filter(|max| len > *max) {
        return Err(invalid(
            rule,
            &format!("length must be less than or equal to {} {}", max, unit),
        ));
    }
    Ok(())
}

fn invalid(rule: &FieldRule, what: &str) -> ValidationError {
    ValidationError(format!("\"{}\" {}", rule.name, what))
}
