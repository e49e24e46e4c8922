//! Item-schemas for `generate` fields.
//!
//! A generate field produces a JSON array of records. The record shape is
//! either declared explicitly in the field's `itemSchema` entry or read once
//! from the structural example embedded in the field description, e.g.
//! `[{"period": "DD/MM/YYYY", "consumption": number}]`. An elided example
//! value (`"..."`) takes its type from the prose around the key instead, as in
//! `period (DD/MM/YYYY) and consumption (number)`.

use std::sync::LazyLock;

use regex::Regex;

use super::FieldType;
use crate::coerce::coerce;
use crate::scan::{balanced_span, balanced_spans, split_top_level};

static DATE_FORMAT_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(dd|mm|yyyy)[/.\-](dd|mm|yyyy)[/.\-](dd|mm|yyyy)$")
        .unwrap_or_else(|_| unreachable!("static pattern"))
});

/// Record shape expected from each element of a generated array.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemSchema {
    /// Keys every element must carry, in declaration order, with their types.
    /// An untyped key accepts any JSON scalar and keeps it as decoded.
    Declared(Vec<(String, Option<FieldType>)>),
    /// No usable shape; elements are passed through without validation.
    Opaque,
}

impl ItemSchema {
    /// Declared keys in order; empty for [`ItemSchema::Opaque`].
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        let entries: &[(String, Option<FieldType>)] = match self {
            Self::Declared(entries) => entries,
            Self::Opaque => &[],
        };
        entries.iter().map(|(key, _)| key.as_str())
    }

    /// Whether elements are passed through unvalidated.
    #[must_use]
    pub const fn is_opaque(&self) -> bool {
        matches!(self, Self::Opaque)
    }

    /// Declared type of `key`; `None` for unknown and untyped keys.
    #[must_use]
    pub fn type_of(&self, key: &str) -> Option<FieldType> {
        match self {
            Self::Declared(entries) => entries.iter().find(|(k, _)| k == key).and_then(|(_, t)| *t),
            Self::Opaque => None,
        }
    }

    /// Reads the first structural example in `description`.
    ///
    /// Falls back to [`ItemSchema::Opaque`] when the description holds no
    /// bracketed array whose first object yields at least one key.
    #[must_use]
    pub fn derive(description: &str) -> Self {
        balanced_spans(description, b'[', b']')
            .find_map(|array| example_entries(array, description))
            .map_or(Self::Opaque, Self::Declared)
    }
}

fn example_entries(array: &str, description: &str) -> Option<Vec<(String, Option<FieldType>)>> {
    let start = array.find('{')?;
    let object = balanced_span(array, start, b'{', b'}')?;
    let body = &object[1..object.len() - 1];

    let mut entries: Vec<(String, Option<FieldType>)> = Vec::new();
    for pair in split_top_level(body, b',') {
        let Some((key, value)) = split_pair(pair) else {
            continue;
        };
        if entries.iter().any(|(k, _)| *k == key) {
            continue;
        }
        let field_type = infer_type(value).or_else(|| described_type(description, &key));
        entries.push((key, field_type));
    }

    (!entries.is_empty()).then_some(entries)
}

fn split_pair(pair: &str) -> Option<(String, &str)> {
    let parts = split_top_level(pair, b':');
    let (key, value) = match parts.as_slice() {
        [key, rest @ ..] if !rest.is_empty() => (key.trim(), pair[key.len() + 1..].trim()),
        _ => return None,
    };
    let key = key.trim_matches('"').trim();
    let valid = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_alphanumeric() || c == '_' || c == '-' || c == ' ');
    valid.then(|| (key.to_string(), value))
}

fn type_word(word: &str) -> Option<FieldType> {
    match word {
        "string" | "str" | "text" => Some(FieldType::String),
        "number" | "float" | "int" | "integer" | "decimal" | "double" => Some(FieldType::Number),
        "date" => Some(FieldType::Date),
        "boolean" | "bool" | "true" | "false" => Some(FieldType::Boolean),
        _ => None,
    }
}

/// Type of one example value; `None` when the value is elided.
fn infer_type(value: &str) -> Option<FieldType> {
    let quoted = value.len() >= 2 && value.starts_with('"') && value.ends_with('"');
    let text = if quoted { &value[1..value.len() - 1] } else { value }.trim();
    if is_elided(text) {
        return None;
    }
    if let Some(annotated) = annotation_type(text) {
        return Some(annotated);
    }

    Some(if coerce(text, FieldType::Date).is_ok() {
        FieldType::Date
    } else if !quoted && text.parse::<f64>().is_ok() {
        FieldType::Number
    } else {
        FieldType::String
    })
}

fn is_elided(text: &str) -> bool {
    text.chars().all(|c| c == '.' || c == '\u{2026}' || c.is_whitespace())
}

/// Type words or a date format token in a short annotation such as
/// `number`, `string (DD/MM/YYYY)` or `DD/MM/YYYY`.
fn annotation_type(text: &str) -> Option<FieldType> {
    let lower = text.to_ascii_lowercase();
    let words: Vec<&str> = lower
        .split(char::is_whitespace)
        .map(|w| w.trim_matches(|c: char| !c.is_ascii_alphanumeric()))
        .filter(|w| !w.is_empty())
        .collect();

    if words.iter().any(|w| DATE_FORMAT_TOKEN.is_match(w)) {
        return Some(FieldType::Date);
    }
    let (first, _) = words.split_first()?;
    type_word(first)
}

/// Looks for `key (annotation)` or `key: annotation` in the description prose.
fn described_type(description: &str, key: &str) -> Option<FieldType> {
    let is_word = |c: char| c.is_alphanumeric() || c == '_';

    description.match_indices(key).find_map(|(at, _)| {
        let before = description[..at].chars().next_back();
        let rest = &description[at + key.len()..];
        if before.is_some_and(is_word) || rest.chars().next().is_some_and(is_word) {
            return None;
        }

        let rest = rest.trim_start_matches(|c: char| c == '"' || c.is_whitespace());
        let annotation = if let Some(inner) = rest.strip_prefix('(') {
            inner.split(')').next()?
        } else if let Some(after) = rest.strip_prefix(':') {
            after.split([',', ';', '}', ']', '\n']).next()?
        } else {
            return None;
        };
        annotation_type(annotation)
    })
}
