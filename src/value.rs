use std::{
    fmt,
    hash::{Hash, Hasher},
    sync::LazyLock,
};

use chrono::{Local, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use regex::Regex;
use uuid::Uuid;

use crate::error::{Error, Result};

/// Every date/time value in a criteria's display form uses this format.
pub const DATE_TIME_FORMAT: &str = "%d %b %Y %H:%M:%S";

// Accepted when a text literal is compared against a date/time property.
const DATE_TIME_INPUT_FORMATS: [&str; 5] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y/%m/%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    DATE_TIME_FORMAT,
];
const DATE_INPUT_FORMATS: [&str; 3] = ["%Y-%m-%d", "%Y/%m/%d", "%d %b %Y"];

static INTEGER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[+-]?\d+$").unwrap());
static DECIMAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[+-]?(\d+\.\d*|\.\d+)([eE][+-]?\d+)?$").unwrap());
static GUID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\{?[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}\}?$",
    )
    .unwrap()
});

/// A date/time that is only known when a criteria is evaluated or rendered.
/// Criteria store the marker, never the resolved instant, so a tree built once
///  keeps tracking the current day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RelativeDate {
    /// Local midnight of the current day
    Today,
    /// Local wall-clock time
    Now,
    UtcNow,
}

impl RelativeDate {
    pub fn resolve(self) -> NaiveDateTime {
        match self {
            Self::Today => Local::now().date_naive().and_time(NaiveTime::MIN),
            Self::Now => Local::now().naive_local(),
            Self::UtcNow => Utc::now().naive_utc(),
        }
    }

    /// Recognizes `Today`, `Now` and `UtcNow` (ASCII case-insensitive).
    pub fn from_token(token: &str) -> Option<Self> {
        [Self::Today, Self::Now, Self::UtcNow]
            .into_iter()
            .find(|marker| marker.name().eq_ignore_ascii_case(token))
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Today => "Today",
            Self::Now => "Now",
            Self::UtcNow => "UtcNow",
        }
    }
}

/// A literal on the right-hand side of a comparison, or a property value read
///  from a target object.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Value {
    Null,
    Bool(bool),
    Integer(i64),
    Decimal(f64),
    Text(String),
    DateTime(NaiveDateTime),
    Guid(Uuid),
    /// Opaque binary content (images and the like). Supports equality only.
    Bytes(Vec<u8>),
    Relative(RelativeDate),
    List(CriteriaValues),
}

impl Value {
    /// Classifies an unquoted literal from criteria text.
    pub fn from_literal(token: &str) -> Self {
        if token.eq_ignore_ascii_case("null") {
            Self::Null
        } else if token.eq_ignore_ascii_case("true") {
            Self::Bool(true)
        } else if token.eq_ignore_ascii_case("false") {
            Self::Bool(false)
        } else if let Some(marker) = RelativeDate::from_token(token) {
            Self::Relative(marker)
        } else if INTEGER.is_match(token)
            && let Ok(i) = token.parse::<i64>()
        {
            Self::Integer(i)
        } else if (INTEGER.is_match(token) || DECIMAL.is_match(token))
            && let Ok(d) = token.parse::<f64>()
        {
            Self::Decimal(d)
        } else if GUID.is_match(token)
            && let Ok(guid) = Uuid::parse_str(trim_braces(token))
        {
            Self::Guid(guid)
        } else {
            Self::Text(token.to_string())
        }
    }

    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// True for `Null` and for the text `NULL` in any case, which is how the
    ///  IS / IS NOT operand arrives from criteria text.
    pub fn is_null_token(&self) -> bool {
        match self {
            Self::Null => true,
            Self::Text(s) => s.eq_ignore_ascii_case("null"),
            _ => false,
        }
    }

    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Integer(_) => "integer",
            Self::Decimal(_) => "decimal",
            Self::Text(_) => "text",
            Self::DateTime(_) => "datetime",
            Self::Guid(_) => "guid",
            Self::Bytes(_) => "bytes",
            Self::Relative(_) => "relative date",
            Self::List(_) => "list",
        }
    }

    /// Replaces relative date markers (including those inside lists) with the
    ///  current instant.
    #[must_use]
    pub fn resolved(&self) -> Self {
        match self {
            Self::Relative(marker) => Self::DateTime(marker.resolve()),
            Self::List(items) => Self::List(items.iter().map(Self::resolved).collect()),
            other => other.clone(),
        }
    }

    /// Converts this (comparison) value into the type of `like`, which is
    ///  normally the property value it will be compared with. Relative dates
    ///  are resolved here, so each call sees the current time.
    pub fn normalize_for(&self, like: &Self) -> Result<Self> {
        let value = self.resolved();
        if value.is_null() {
            return Ok(value);
        }
        if let Self::List(items) = &value {
            return items
                .iter()
                .map(|item| item.normalize_for(like))
                .collect::<Result<CriteriaValues>>()
                .map(Self::List);
        }

        match like {
            Self::Null | Self::Relative(_) | Self::List(_) => Ok(value),
            Self::Text(_) => Ok(match value {
                Self::Text(_) => value,
                other => Self::Text(other.to_string()),
            }),
            Self::Integer(_) | Self::Decimal(_) => match value {
                Self::Integer(_) | Self::Decimal(_) => Ok(value),
                Self::Bool(b) => Ok(Self::Integer(i64::from(b))),
                Self::Text(s) => parse_number(&s),
                other => Err(conversion(&other, like.type_name())),
            },
            Self::Bool(_) => match value {
                Self::Bool(_) => Ok(value),
                Self::Integer(0) => Ok(Self::Bool(false)),
                Self::Integer(1) => Ok(Self::Bool(true)),
                Self::Text(s) => parse_bool(&s),
                other => Err(conversion(&other, "bool")),
            },
            Self::DateTime(_) => match value {
                Self::DateTime(_) => Ok(value),
                Self::Text(s) => parse_date_time(&s).map(Self::DateTime),
                other => Err(conversion(&other, "datetime")),
            },
            Self::Guid(_) => match value {
                Self::Guid(_) => Ok(value),
                Self::Text(s) => Uuid::parse_str(trim_braces(s.trim()))
                    .map(Self::Guid)
                    .map_err(|_| Error::Conversion {
                        value: s,
                        target: "guid",
                    }),
                other => Err(conversion(&other, "guid")),
            },
            Self::Bytes(_) => match value {
                Self::Bytes(_) => Ok(value),
                other => Err(conversion(&other, "bytes")),
            },
        }
    }
}

fn trim_braces(s: &str) -> &str {
    s.strip_prefix('{')
        .and_then(|s| s.strip_suffix('}'))
        .unwrap_or(s)
}

fn conversion(value: &Value, target: &'static str) -> Error {
    Error::Conversion {
        value: value.to_string(),
        target,
    }
}

fn parse_number(s: &str) -> Result<Value> {
    let trimmed = s.trim();
    if let Ok(i) = trimmed.parse::<i64>() {
        Ok(Value::Integer(i))
    } else if let Ok(d) = trimmed.parse::<f64>() {
        Ok(Value::Decimal(d))
    } else {
        Err(Error::Conversion {
            value: s.to_string(),
            target: "number",
        })
    }
}

fn parse_bool(s: &str) -> Result<Value> {
    match s.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "y" | "t" => Ok(Value::Bool(true)),
        "false" | "0" | "no" | "n" | "f" => Ok(Value::Bool(false)),
        _ => Err(Error::Conversion {
            value: s.to_string(),
            target: "bool",
        }),
    }
}

fn parse_date_time(s: &str) -> Result<NaiveDateTime> {
    let trimmed = s.trim();
    if let Some(marker) = RelativeDate::from_token(trimmed) {
        return Ok(marker.resolve());
    }
    DATE_TIME_INPUT_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(trimmed, fmt).ok())
        .or_else(|| {
            DATE_INPUT_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(trimmed, fmt).ok())
                .map(|d| d.and_time(NaiveTime::MIN))
        })
        .ok_or_else(|| Error::Conversion {
            value: s.to_string(),
            target: "datetime",
        })
}

// Structural equality: decimals compare by bit pattern so that Eq and Hash
//  agree.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Integer(a), Self::Integer(b)) => a == b,
            (Self::Decimal(a), Self::Decimal(b)) => a.to_bits() == b.to_bits(),
            (Self::Text(a), Self::Text(b)) => a == b,
            (Self::DateTime(a), Self::DateTime(b)) => a == b,
            (Self::Guid(a), Self::Guid(b)) => a == b,
            (Self::Bytes(a), Self::Bytes(b)) => a == b,
            (Self::Relative(a), Self::Relative(b)) => a == b,
            (Self::List(a), Self::List(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Self::Null => {}
            Self::Bool(b) => b.hash(state),
            Self::Integer(i) => i.hash(state),
            Self::Decimal(d) => d.to_bits().hash(state),
            Self::Text(s) => s.hash(state),
            Self::DateTime(dt) => dt.hash(state),
            Self::Guid(g) => g.hash(state),
            Self::Bytes(b) => b.hash(state),
            Self::Relative(r) => r.hash(state),
            Self::List(l) => l.hash(state),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "NULL"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Decimal(d) => write!(f, "{d}"),
            Self::Text(s) => f.write_str(s),
            Self::DateTime(dt) => write!(f, "{}", dt.format(DATE_TIME_FORMAT)),
            Self::Guid(g) => write!(f, "{}", g.braced()),
            Self::Bytes(b) => write!(f, "<{} bytes>", b.len()),
            Self::Relative(r) => f.write_str(r.name()),
            Self::List(items) => {
                let mut first = true;
                for item in items {
                    if first {
                        first = false;
                    } else {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                Ok(())
            }
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}
impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Self::Integer(i64::from(i))
    }
}
impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Integer(i)
    }
}
impl From<f64> for Value {
    fn from(d: f64) -> Self {
        Self::Decimal(d)
    }
}
impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}
impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}
impl From<NaiveDateTime> for Value {
    fn from(dt: NaiveDateTime) -> Self {
        Self::DateTime(dt)
    }
}
impl From<NaiveDate> for Value {
    fn from(d: NaiveDate) -> Self {
        Self::DateTime(d.and_time(NaiveTime::MIN))
    }
}
impl From<Uuid> for Value {
    fn from(g: Uuid) -> Self {
        Self::Guid(g)
    }
}
impl From<RelativeDate> for Value {
    fn from(r: RelativeDate) -> Self {
        Self::Relative(r)
    }
}
impl From<CriteriaValues> for Value {
    fn from(values: CriteriaValues) -> Self {
        Self::List(values)
    }
}
impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

/// The ordered literal set on the right of IN / NOT IN.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CriteriaValues(Vec<Value>);

impl CriteriaValues {
    pub fn new(values: impl IntoIterator<Item = impl Into<Value>>) -> Self {
        Self(values.into_iter().map(Into::into).collect())
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Value> {
        self.0.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<Value> for CriteriaValues {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a CriteriaValues {
    type Item = &'a Value;
    type IntoIter = std::slice::Iter<'a, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
