use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

/// One failed field check, addressed by its JSON path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub path: String,
    pub message: String,
}

impl FieldError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Reads typed values out of a JSON object while collecting every failure.
///
/// Readers return `None` when a key is absent. The `nullable_*` variants
/// return `Some(None)` for `null` or blank strings so callers can tell
/// "leave unchanged" apart from "clear".
pub(crate) struct FieldReader<'a> {
    object: &'a Map<String, Value>,
    errors: Vec<FieldError>,
}

impl<'a> FieldReader<'a> {
    pub(crate) fn new(data: &'a Value) -> Result<Self, Vec<FieldError>> {
        match data.as_object() {
            Some(object) => Ok(Self {
                object,
                errors: Vec::new(),
            }),
            None => Err(vec![FieldError::new("", "payload must be a JSON object")]),
        }
    }

    pub(crate) fn reject(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.errors.push(FieldError::new(path, message));
    }

    /// Record `message` for `path` unless the path already failed a type check.
    pub(crate) fn require(&mut self, path: &str, message: impl Into<String>) {
        if !self.errors.iter().any(|error| error.path == path) {
            self.reject(path, message);
        }
    }

    pub(crate) fn finish<T>(self, value: T) -> Result<T, Vec<FieldError>> {
        if self.errors.is_empty() {
            Ok(value)
        } else {
            Err(self.errors)
        }
    }

    fn present(&self, key: &str) -> Option<&'a Value> {
        self.object.get(key).filter(|value| !is_blank(value))
    }

    fn nullable<T>(
        &mut self,
        key: &str,
        parse: impl FnOnce(&mut Self, &'a Value) -> Option<T>,
    ) -> Option<Option<T>> {
        let value = self.object.get(key)?;
        if is_blank(value) {
            return Some(None);
        }
        parse(self, value).map(Some)
    }

    pub(crate) fn text(&mut self, key: &str) -> Option<String> {
        let value = self.present(key)?;
        self.parse_text(key, value)
    }

    pub(crate) fn nullable_text(&mut self, key: &str) -> Option<Option<String>> {
        self.nullable(key, |reader, value| reader.parse_text(key, value))
    }

    pub(crate) fn integer(&mut self, key: &str) -> Option<i64> {
        let value = self.present(key)?;
        self.parse_integer(key, value)
    }

    pub(crate) fn nullable_integer(&mut self, key: &str) -> Option<Option<i64>> {
        self.nullable(key, |reader, value| reader.parse_integer(key, value))
    }

    pub(crate) fn flag(&mut self, key: &str) -> Option<bool> {
        let value = self.present(key)?;
        match value.as_bool() {
            Some(flag) => Some(flag),
            None => {
                self.reject(key, "must be true or false");
                None
            }
        }
    }

    pub(crate) fn code<T>(
        &mut self,
        key: &str,
        parse: fn(&str) -> Option<T>,
        allowed: &[&str],
    ) -> Option<T> {
        let value = self.present(key)?;
        self.parse_code(key, value, parse, allowed)
    }

    pub(crate) fn nullable_code<T>(
        &mut self,
        key: &str,
        parse: fn(&str) -> Option<T>,
        allowed: &[&str],
    ) -> Option<Option<T>> {
        self.nullable(key, |reader, value| {
            reader.parse_code(key, value, parse, allowed)
        })
    }

    pub(crate) fn nullable_timestamp(&mut self, key: &str) -> Option<Option<DateTime<Utc>>> {
        self.nullable(key, |reader, value| reader.parse_timestamp(key, value))
    }

    pub(crate) fn timestamp(&mut self, key: &str) -> Option<DateTime<Utc>> {
        let value = self.present(key)?;
        self.parse_timestamp(key, value)
    }

    /// Array of known codes; duplicates collapse, order is preserved.
    pub(crate) fn code_list(&mut self, key: &str, allowed: &[&str]) -> Option<Vec<String>> {
        let value = self.object.get(key)?;
        if value.is_null() {
            return Some(Vec::new());
        }
        let Some(items) = value.as_array() else {
            self.reject(key, "must be a list of codes");
            return None;
        };

        let mut codes: Vec<String> = Vec::with_capacity(items.len());
        let mut failed = false;
        for (position, item) in items.iter().enumerate() {
            let path = format!("{key}[{position}]");
            match item.as_str() {
                Some(code) if allowed.contains(&code) => {
                    if !codes.iter().any(|existing| existing == code) {
                        codes.push(code.to_string());
                    }
                }
                Some(code) => {
                    failed = true;
                    self.reject(path, format!("unknown code '{code}'"));
                }
                None => {
                    failed = true;
                    self.reject(path, "must be a string code");
                }
            }
        }

        (!failed).then_some(codes)
    }

    /// Object mapping codes to non-negative whole numbers.
    pub(crate) fn count_map(&mut self, key: &str) -> Option<BTreeMap<String, u32>> {
        let value = self.object.get(key)?;
        if value.is_null() {
            return Some(BTreeMap::new());
        }
        let Some(entries) = value.as_object() else {
            self.reject(key, "must be an object of counts");
            return None;
        };

        let mut counts = BTreeMap::new();
        let mut failed = false;
        for (code, count) in entries {
            let path = format!("{key}.{code}");
            match count.as_i64() {
                Some(count) if count < 0 => {
                    failed = true;
                    self.reject(path, "must be zero or more");
                }
                Some(count) => match u32::try_from(count) {
                    Ok(count) => {
                        counts.insert(code.clone(), count);
                    }
                    Err(_) => {
                        failed = true;
                        self.reject(path, "is too large");
                    }
                },
                None => {
                    failed = true;
                    self.reject(path, "must be a whole number");
                }
            }
        }

        (!failed).then_some(counts)
    }

    fn parse_text(&mut self, key: &str, value: &Value) -> Option<String> {
        match value.as_str() {
            Some(text) => Some(text.trim().to_string()),
            None => {
                self.reject(key, "must be a string");
                None
            }
        }
    }

    fn parse_integer(&mut self, key: &str, value: &Value) -> Option<i64> {
        match value.as_i64() {
            Some(number) => Some(number),
            None => {
                self.reject(key, "must be a whole number");
                None
            }
        }
    }

    fn parse_code<T>(
        &mut self,
        key: &str,
        value: &Value,
        parse: fn(&str) -> Option<T>,
        allowed: &[&str],
    ) -> Option<T> {
        let raw = self.parse_text(key, value)?;
        match parse(&raw) {
            Some(code) => Some(code),
            None => {
                self.reject(key, format!("must be one of: {}", allowed.join(", ")));
                None
            }
        }
    }

    fn parse_timestamp(&mut self, key: &str, value: &Value) -> Option<DateTime<Utc>> {
        let raw = self.parse_text(key, value)?;
        match parse_timestamp(&raw) {
            Some(timestamp) => Some(timestamp),
            None => {
                self.reject(key, "must be an RFC 3339 timestamp or YYYY-MM-DD date");
                None
            }
        }
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(text) => text.trim().is_empty(),
        _ => false,
    }
}

/// Accepts full timestamps or bare dates, which are taken as midnight UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(raw) {
        return Some(timestamp.with_timezone(&Utc));
    }

    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()?;
    let midnight = date.and_hms_opt(0, 0, 0)?;
    Some(Utc.from_utc_datetime(&midnight))
}
