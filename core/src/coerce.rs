//! Conversion of raw resolver text into canonical typed values.
//!
//! Everything in this module is pure: no I/O, no logging, no shared state.
//! The engine and the multi-instance generator both route untrusted text
//! through [`coerce`] before anything reaches a [`crate::extraction::FieldResult`].

use std::fmt;
use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use serde::{Serialize, Serializer};
use thiserror::Error;

use crate::schema::FieldType;

/// Canonical output format for every coerced date.
pub const DATE_FORMAT: &str = "%d/%m/%Y";

static NUMERIC_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[-+]?(?:\d|[.,]\d)[\d.,]*").unwrap_or_else(|_| unreachable!("static pattern"))
});

/// Errors produced while coercing a single value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoercionError {
    /// No digits were found in the input.
    #[error("no numeric token in {0:?}")]
    NoNumericToken(String),

    /// Several numbers, or separators that cannot be read one way only.
    #[error("ambiguous number {0:?}")]
    AmbiguousNumber(String),

    /// Not one of the accepted date shapes, or not a calendar date.
    #[error("unparseable date {0:?}")]
    InvalidDate(String),

    /// Not one of `true`, `false`, `yes`, `no`, `1`, `0`.
    #[error("unparseable boolean {0:?}")]
    InvalidBoolean(String),

    /// A required field produced an empty value.
    #[error("required value is empty")]
    Empty,

    /// A JSON value of the wrong shape (array, object) where a scalar was expected.
    #[error("expected a scalar, got {0}")]
    NotScalar(String),
}

/// A value after coercion to its declared [`FieldType`].
#[derive(Debug, Clone, PartialEq)]
pub enum TypedValue {
    /// Trimmed text.
    String(String),
    /// Finite number.
    Number(f64),
    /// Calendar date, rendered as `DD/MM/YYYY`.
    Date(NaiveDate),
    /// Boolean.
    Boolean(bool),
}

impl TypedValue {
    /// The [`FieldType`] this value satisfies.
    #[must_use]
    pub const fn field_type(&self) -> FieldType {
        match self {
            Self::String(_) => FieldType::String,
            Self::Number(_) => FieldType::Number,
            Self::Date(_) => FieldType::Date,
            Self::Boolean(_) => FieldType::Boolean,
        }
    }

    /// Returns the number if this is a [`TypedValue::Number`].
    #[must_use]
    pub const fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the text if this is a [`TypedValue::String`].
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for TypedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => f.write_str(s),
            Self::Number(n) => write!(f, "{n}"),
            Self::Date(d) => write!(f, "{}", d.format(DATE_FORMAT)),
            Self::Boolean(b) => write!(f, "{b}"),
        }
    }
}

impl Serialize for TypedValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::String(s) => serializer.serialize_str(s),
            Self::Number(n) => serializer.serialize_f64(*n),
            Self::Date(d) => serializer.collect_str(&d.format(DATE_FORMAT)),
            Self::Boolean(b) => serializer.serialize_bool(*b),
        }
    }
}

/// Coerces raw resolver text into a value of `target` type.
///
/// # Examples
///
/// ```
/// use docfield_core::coerce::{coerce, TypedValue};
/// use docfield_core::schema::FieldType;
///
/// assert_eq!(coerce("1,234.56", FieldType::Number), Ok(TypedValue::Number(1234.56)));
/// assert_eq!(coerce("2023-02-01", FieldType::Date).unwrap().to_string(), "01/02/2023");
/// assert!(coerce("abc", FieldType::Number).is_err());
/// ```
pub fn coerce(raw: &str, target: FieldType) -> Result<TypedValue, CoercionError> {
    match target {
        FieldType::String => Ok(TypedValue::String(raw.trim().to_string())),
        FieldType::Number => coerce_number(raw).map(TypedValue::Number),
        FieldType::Date => coerce_date(raw).map(TypedValue::Date),
        FieldType::Boolean => coerce_boolean(raw).map(TypedValue::Boolean),
    }
}

/// Coerces a decoded JSON value, as found inside generated records.
///
/// Strings go through [`coerce`]; JSON numbers and booleans are taken as-is
/// when the target type agrees, and rendered to text otherwise.
pub fn coerce_json(value: &serde_json::Value, target: FieldType) -> Result<TypedValue, CoercionError> {
    use serde_json::Value;

    match (value, target) {
        (Value::String(s), _) => coerce(s, target),
        (Value::Number(n), FieldType::Number) => n
            .as_f64()
            .filter(|f| f.is_finite())
            .map(TypedValue::Number)
            .ok_or_else(|| CoercionError::NoNumericToken(n.to_string())),
        (Value::Bool(b), FieldType::Boolean) => Ok(TypedValue::Boolean(*b)),
        (Value::Number(_) | Value::Bool(_), _) => coerce(&value.to_string(), target),
        (Value::Null, _) => Err(CoercionError::NotScalar("null".to_string())),
        (Value::Array(_), _) => Err(CoercionError::NotScalar("array".to_string())),
        (Value::Object(_), _) => Err(CoercionError::NotScalar("object".to_string())),
    }
}

/// Keeps a decoded JSON scalar as the value it already is, for record keys
/// without a declared type. Strings are trimmed; nothing else is converted.
pub fn keep_json_scalar(value: &serde_json::Value) -> Result<TypedValue, CoercionError> {
    use serde_json::Value;

    match value {
        Value::String(s) => Ok(TypedValue::String(s.trim().to_string())),
        Value::Number(n) => n
            .as_f64()
            .filter(|f| f.is_finite())
            .map(TypedValue::Number)
            .ok_or_else(|| CoercionError::NoNumericToken(n.to_string())),
        Value::Bool(b) => Ok(TypedValue::Boolean(*b)),
        Value::Null => Err(CoercionError::NotScalar("null".to_string())),
        Value::Array(_) => Err(CoercionError::NotScalar("array".to_string())),
        Value::Object(_) => Err(CoercionError::NotScalar("object".to_string())),
    }
}

fn coerce_number(raw: &str) -> Result<f64, CoercionError> {
    let mut tokens = NUMERIC_TOKEN.find_iter(raw).map(|m| m.as_str());
    let token = tokens
        .next()
        .ok_or_else(|| CoercionError::NoNumericToken(raw.to_string()))?;
    if tokens.next().is_some() {
        return Err(CoercionError::AmbiguousNumber(raw.to_string()));
    }

    // A trailing separator belongs to the prose ("150.5, then ..."), not the number.
    let token = token.trim_end_matches(['.', ',']);
    let normalized = normalize_separators(token)
        .ok_or_else(|| CoercionError::AmbiguousNumber(raw.to_string()))?;

    normalized
        .parse::<f64>()
        .ok()
        .filter(|n| n.is_finite())
        .ok_or_else(|| CoercionError::NoNumericToken(raw.to_string()))
}

/// Rewrites `token` into a plain `[-+]digits[.digits]` literal, or `None` when
/// the separators admit more than one reading.
fn normalize_separators(token: &str) -> Option<String> {
    let (sign, digits) = match token.strip_prefix(['-', '+']) {
        Some(rest) => (&token[..1], rest),
        None => ("", token),
    };

    // A leading separator can only be a decimal point: ".50", "-,5".
    if let Some(frac) = digits.strip_prefix(['.', ',']) {
        return frac
            .bytes()
            .all(|b| b.is_ascii_digit())
            .then(|| format!("{sign}0.{frac}"));
    }

    let commas = digits.matches(',').count();
    let dots = digits.matches('.').count();

    let body = match (commas, dots) {
        (0, 0 | 1) => digits.to_string(),
        (0, _) => strip_grouping(digits, '.')?,
        (1, 0) => {
            let (int, frac) = digits.split_once(',')?;
            if (1..=2).contains(&frac.len()) && !int.is_empty() {
                format!("{int}.{frac}")
            } else {
                strip_grouping(digits, ',')?
            }
        }
        (_, 0) => strip_grouping(digits, ',')?,
        _ => {
            let last_comma = digits.rfind(',')?;
            let last_dot = digits.rfind('.')?;
            let (decimal, grouping) = if last_dot > last_comma { ('.', ',') } else { (',', '.') };
            let decimal_count = if decimal == '.' { dots } else { commas };
            if decimal_count != 1 {
                return None;
            }
            let (int, frac) = digits.split_once(decimal)?;
            if frac.contains(grouping) || frac.is_empty() {
                return None;
            }
            format!("{}.{frac}", strip_grouping(int, grouping)?)
        }
    };

    Some(format!("{sign}{body}"))
}

/// Removes `sep` from `digits` when it is used as a thousands separator: a
/// leading group of one to three digits followed by groups of exactly three.
fn strip_grouping(digits: &str, sep: char) -> Option<String> {
    let mut groups = digits.split(sep);
    let head = groups.next()?;
    if head.is_empty() || head.len() > 3 {
        return None;
    }
    let mut out = head.to_string();
    for group in groups {
        if group.len() != 3 {
            return None;
        }
        out.push_str(group);
    }
    Some(out)
}

fn coerce_date(raw: &str) -> Result<NaiveDate, CoercionError> {
    let invalid = || CoercionError::InvalidDate(raw.to_string());
    let text = raw.trim();

    let parts: Vec<&str> = text.split(['/', '-', '.']).collect();
    let [a, b, c] = parts.as_slice() else {
        return Err(invalid());
    };
    if ![a, b, c].iter().all(|p| !p.is_empty() && p.bytes().all(|c| c.is_ascii_digit())) {
        return Err(invalid());
    }
    let num = |s: &str| s.parse::<u32>().map_err(|_| invalid());

    let (year, month, day) = if a.len() == 4 {
        // YYYY-MM-DD (or YYYY/MM/DD)
        (num(a)?, num(b)?, num(c)?)
    } else if c.len() == 4 {
        let (first, second) = (num(a)?, num(b)?);
        if second > 12 && first <= 12 {
            // MM/DD/YYYY, recognisable only when the day cannot be a month.
            (num(c)?, first, second)
        } else {
            (num(c)?, second, first)
        }
    } else {
        return Err(invalid());
    };

    let year = i32::try_from(year).map_err(|_| invalid())?;
    NaiveDate::from_ymd_opt(year, month, day).ok_or_else(invalid)
}

fn coerce_boolean(raw: &str) -> Result<bool, CoercionError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" => Ok(true),
        "false" | "no" | "0" => Ok(false),
        _ => Err(CoercionError::InvalidBoolean(raw.to_string())),
    }
}
