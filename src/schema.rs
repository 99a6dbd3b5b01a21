use std::fmt;

/// FieldType
///
/// The runtime JSON type a field must carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    String,
    /// A JSON number with no fractional part.
    Integer,
    Number,
    Boolean,
    /// An array whose items are all non-blank strings.
    StringList,
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FieldType::String => "a string",
            FieldType::Integer => "an integer",
            FieldType::Number => "a number",
            FieldType::Boolean => "a boolean",
            FieldType::StringList => "an array of strings",
        };
        f.write_str(name)
    }
}

/// FieldRule
///
/// Constraints for one named field. Built with the chained constructors below, e.g.
/// `FieldRule::integer("year").required().range(1900, 2030)`.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldRule {
    pub name: &'static str,
    pub ty: FieldType,
    pub required: bool,
    /// Inclusive numeric bounds (Integer / Number fields).
    pub min: Option<f64>,
    pub max: Option<f64>,
    /// Inclusive length bounds: characters for strings, items for lists.
    pub min_len: Option<usize>,
    pub max_len: Option<usize>,
    /// Allowed values for enum-like string fields.
    pub allowed: Option<&'static [&'static str]>,
}

impl FieldRule {
    fn of(name: &'static str, ty: FieldType) -> Self {
        Self {
            name,
            ty,
            required: false,
            min: None,
            max: None,
            min_len: None,
            max_len: None,
            allowed: None,
        }
    }

    pub fn string(name: &'static str) -> Self {
        Self::of(name, FieldType::String)
    }

    pub fn integer(name: &'static str) -> Self {
        Self::of(name, FieldType::Integer)
    }

    pub fn number(name: &'static str) -> Self {
        Self::of(name, FieldType::Number)
    }

    pub fn boolean(name: &'static str) -> Self {
        Self::of(name, FieldType::Boolean)
    }

    pub fn string_list(name: &'static str) -> Self {
        Self::of(name, FieldType::StringList)
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn range(mut self, min: impl Into<f64>, max: impl Into<f64>) -> Self {
        self.min = Some(min.into());
        self.max = Some(max.into());
        self
    }

    pub fn at_least(mut self, min: impl Into<f64>) -> Self {
        self.min = Some(min.into());
        self
    }

    pub fn length(mut self, min: usize, max: usize) -> Self {
        self.min_len = Some(min);
        self.max_len = Some(max);
        self
    }

    pub fn min_length(mut self, min: usize) -> Self {
        self.min_len = Some(min);
        self
    }

    pub fn one_of(mut self, allowed: &'static [&'static str]) -> Self {
        self.allowed = Some(allowed);
        self
    }
}

/// Schema
///
/// Ordered field constraints for one resource (or one auth payload). Declaration order is
/// the order the validator visits fields, which keeps error messages deterministic.
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    pub fields: Vec<FieldRule>,
}

impl Schema {
    pub fn new(fields: Vec<FieldRule>) -> Self {
        Self { fields }
    }

    pub fn field(&self, name: &str) -> Option<&FieldRule> {
        self.fields.iter().find(|rule| rule.name == name)
    }
}
