//! Request validation
//!
//! Raw input is resolved into typed, per-endpoint input structs before any
//! repository call. Each field stops at its first failing rule; all failing
//! fields are reported together.

pub mod input;
pub mod messages;
pub mod requests;

pub use input::{InputValue, RawInput, UploadedFile};
pub use messages::Locale;
pub use requests::*;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Field-keyed validation messages
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(BTreeMap<String, Vec<String>>);

impl ValidationErrors {
    pub fn add(&mut self, field: &str, message: String) {
        self.0.entry(field.to_string()).or_default().push(message);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    pub fn single(field: &str, message: String) -> Self {
        let mut errors = Self::default();
        errors.add(field, message);
        errors
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields: Vec<&str> = self.0.keys().map(String::as_str).collect();
        write!(f, "invalid fields: {}", fields.join(", "))
    }
}

/// Presence of an optional request field
#[derive(Debug, Clone, PartialEq)]
pub enum Field<T> {
    Missing,
    Null,
    Value(T),
}

impl<T> Field<T> {
    pub fn value(self) -> Option<T> {
        match self {
            Field::Value(v) => Some(v),
            _ => None,
        }
    }

    /// `None` when absent, `Some(None)` when explicitly null.
    pub fn into_change(self) -> Option<Option<T>> {
        match self {
            Field::Missing => None,
            Field::Null => Some(None),
            Field::Value(v) => Some(Some(v)),
        }
    }
}

/// Rule helpers over a `RawInput`
pub struct Validator<'a> {
    input: &'a RawInput,
    locale: Locale,
    errors: ValidationErrors,
}

impl<'a> Validator<'a> {
    pub fn new(input: &'a RawInput, locale: Locale) -> Self {
        Self {
            input,
            locale,
            errors: ValidationErrors::default(),
        }
    }

    pub fn locale(&self) -> Locale {
        self.locale
    }

    /// Record a failure; only the first message per field is kept.
    pub fn fail(&mut self, field: &str, message: String) {
        if !self.errors.contains(field) {
            self.errors.add(field, message);
        }
    }

    pub fn has_error(&self, field: &str) -> bool {
        self.errors.contains(field)
    }

    pub fn finish(self) -> Result<(), ValidationErrors> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self.errors)
        }
    }

    /// Raw JSON-like value with empty strings folded into null.
    fn scalar(&mut self, field: &str, required: bool) -> Option<Field<&'a Value>> {
        let value = match self.input.get(field) {
            None => Field::Missing,
            Some(InputValue::File(_)) => return None,
            Some(InputValue::Value(Value::Null)) => Field::Null,
            Some(InputValue::Value(Value::String(s))) if s.is_empty() => Field::Null,
            Some(InputValue::Value(v)) => Field::Value(v),
        };

        if required && !matches!(value, Field::Value(_)) {
            let message = self.locale.required(field);
            self.fail(field, message);
            return None;
        }
        Some(value)
    }

    pub fn string(&mut self, field: &str, required: bool, max: usize) -> Field<String> {
        let value = match self.scalar(field, required) {
            Some(Field::Value(v)) => v,
            Some(Field::Null) => return Field::Null,
            Some(Field::Missing) => return Field::Missing,
            None => {
                if !self.has_error(field) {
                    let message = self.locale.string(field);
                    self.fail(field, message);
                }
                return Field::Missing;
            }
        };

        let Value::String(s) = value else {
            let message = self.locale.string(field);
            self.fail(field, message);
            return Field::Missing;
        };

        if s.chars().count() > max {
            let message = self.locale.max_length(field, max);
            self.fail(field, message);
            return Field::Missing;
        }
        Field::Value(s.clone())
    }

    pub fn integer(&mut self, field: &str, required: bool) -> Field<i64> {
        let value = match self.scalar(field, required) {
            Some(Field::Value(v)) => v,
            Some(Field::Null) => return Field::Null,
            Some(Field::Missing) => return Field::Missing,
            None => {
                if !self.has_error(field) {
                    let message = self.locale.integer(field);
                    self.fail(field, message);
                }
                return Field::Missing;
            }
        };

        let parsed = match value {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse::<i64>().ok(),
            _ => None,
        };

        match parsed {
            Some(n) => Field::Value(n),
            None => {
                let message = self.locale.integer(field);
                self.fail(field, message);
                Field::Missing
            }
        }
    }

    /// Integer with an inclusive lower bound.
    pub fn integer_min(&mut self, field: &str, required: bool, min: i64) -> Field<i64> {
        let value = self.integer(field, required);
        if let Field::Value(n) = value {
            if n < min {
                let message = self.locale.min_value(field, min);
                self.fail(field, message);
                return Field::Missing;
            }
        }
        value
    }

    pub fn boolean(&mut self, field: &str) -> Field<bool> {
        let value = match self.scalar(field, false) {
            Some(Field::Value(v)) => v,
            Some(Field::Null) => return Field::Null,
            Some(Field::Missing) => return Field::Missing,
            None => {
                let message = self.locale.boolean(field);
                self.fail(field, message);
                return Field::Missing;
            }
        };

        let parsed = match value {
            Value::Bool(b) => Some(*b),
            Value::Number(n) => match n.as_i64() {
                Some(0) => Some(false),
                Some(1) => Some(true),
                _ => None,
            },
            Value::String(s) => parse_bool(s),
            _ => None,
        };

        match parsed {
            Some(b) => Field::Value(b),
            None => {
                let message = self.locale.boolean(field);
                self.fail(field, message);
                Field::Missing
            }
        }
    }

    pub fn datetime(&mut self, field: &str) -> Field<DateTime<Utc>> {
        let value = match self.scalar(field, false) {
            Some(Field::Value(v)) => v,
            Some(Field::Null) => return Field::Null,
            Some(Field::Missing) => return Field::Missing,
            None => {
                let message = self.locale.date(field);
                self.fail(field, message);
                return Field::Missing;
            }
        };

        match value.as_str().and_then(parse_datetime) {
            Some(dt) => Field::Value(dt),
            None => {
                let message = self.locale.date(field);
                self.fail(field, message);
                Field::Missing
            }
        }
    }

    /// Array of non-empty strings, trimmed and de-duplicated in order.
    pub fn string_list(&mut self, field: &str, max: usize) -> Field<Vec<String>> {
        let value = match self.scalar(field, false) {
            Some(Field::Value(v)) => v,
            Some(Field::Null) => return Field::Null,
            Some(Field::Missing) => return Field::Missing,
            None => {
                let message = self.locale.array(field);
                self.fail(field, message);
                return Field::Missing;
            }
        };

        let Value::Array(items) = value else {
            let message = self.locale.array(field);
            self.fail(field, message);
            return Field::Missing;
        };

        let mut names: Vec<String> = Vec::with_capacity(items.len());
        for item in items {
            let Some(name) = item.as_str().map(str::trim) else {
                let message = self.locale.array(field);
                self.fail(field, message);
                return Field::Missing;
            };
            if name.chars().count() > max {
                let message = self.locale.max_length(field, max);
                self.fail(field, message);
                return Field::Missing;
            }
            if !name.is_empty() && !names.iter().any(|n| n == name) {
                names.push(name.to_string());
            }
        }
        Field::Value(names)
    }

    /// Uploaded image file. Anything that is not a file with an image
    /// content type and image signature fails.
    pub fn image(&mut self, field: &str) -> Field<UploadedFile> {
        match self.input.get(field) {
            None => Field::Missing,
            Some(InputValue::Value(Value::Null)) => Field::Null,
            Some(InputValue::Value(Value::String(s))) if s.is_empty() => Field::Null,
            Some(InputValue::File(file)) if is_image(file) => Field::Value(file.clone()),
            Some(_) => {
                let message = self.locale.not_image();
                self.fail(field, message);
                Field::Missing
            }
        }
    }
}

pub fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim() {
        "1" | "true" | "on" | "yes" => Some(true),
        "0" | "false" | "off" | "no" => Some(false),
        _ => None,
    }
}

/// Accepts `YYYY-MM-DD`, `YYYY-MM-DD HH:MM:SS` and RFC 3339.
pub fn parse_datetime(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Some(dt.and_utc());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

fn is_image(file: &UploadedFile) -> bool {
    let declared = file
        .content_type
        .as_deref()
        .map(|ct| ct.trim().to_ascii_lowercase().starts_with("image/"))
        .unwrap_or(false);

    declared && has_image_signature(&file.data)
}

fn has_image_signature(data: &[u8]) -> bool {
    data.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A])
        || data.starts_with(&[0xFF, 0xD8, 0xFF])
        || data.starts_with(b"GIF87a")
        || data.starts_with(b"GIF89a")
        || (data.len() >= 12 && &data[0..4] == b"RIFF" && &data[8..12] == b"WEBP")
        || data.starts_with(b"BM")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0];

    fn input(value: Value) -> RawInput {
        RawInput::from_json(value).unwrap()
    }

    #[test]
    fn test_first_failure_per_field_wins() {
        let raw = input(json!({ "total": "abc" }));
        let mut v = Validator::new(&raw, Locale::En);
        v.integer_min("total", true, 1);
        v.fail("total", "second".to_string());

        let errors = v.finish().unwrap_err();
        assert_eq!(errors.get("total").unwrap().len(), 1);
        assert_eq!(errors.get("total").unwrap()[0], "The total must be an integer.");
    }

    #[test]
    fn test_numeric_strings_and_empty_strings() {
        let raw = input(json!({ "read": "12", "started_at": "" }));
        let mut v = Validator::new(&raw, Locale::En);
        assert_eq!(v.integer("read", false), Field::Value(12));
        assert_eq!(v.datetime("started_at"), Field::Null);
        assert_eq!(v.integer("total", false), Field::Missing);
        assert!(v.finish().is_ok());
    }

    #[test]
    fn test_boolean_forms() {
        let raw = input(json!({ "a": true, "b": "0", "c": 1, "d": "maybe" }));
        let mut v = Validator::new(&raw, Locale::En);
        assert_eq!(v.boolean("a"), Field::Value(true));
        assert_eq!(v.boolean("b"), Field::Value(false));
        assert_eq!(v.boolean("c"), Field::Value(true));
        assert_eq!(v.boolean("d"), Field::Missing);
        assert!(v.finish().unwrap_err().contains("d"));
    }

    #[test]
    fn test_string_list_dedups() {
        let raw = input(json!({ "tags": [" rust ", "rust", "", "books"] }));
        let mut v = Validator::new(&raw, Locale::En);
        assert_eq!(
            v.string_list("tags", 255),
            Field::Value(vec!["rust".to_string(), "books".to_string()])
        );

        let raw = input(json!({ "tags": "rust" }));
        let mut v = Validator::new(&raw, Locale::ZhCn);
        v.string_list("tags", 255);
        assert_eq!(v.finish().unwrap_err().get("tags").unwrap()[0], "标签数据格式不对");
    }

    #[test]
    fn test_image_rule() {
        let mut raw = input(json!({ "text_cover": "not a file" }));
        raw.insert_file(
            "cover",
            UploadedFile {
                filename: Some("cover.png".to_string()),
                content_type: Some("image/png".to_string()),
                data: PNG.to_vec(),
            },
        );
        raw.insert_file(
            "fake",
            UploadedFile {
                filename: Some("cover.png".to_string()),
                content_type: Some("image/png".to_string()),
                data: b"plain text".to_vec(),
            },
        );

        let mut v = Validator::new(&raw, Locale::ZhCn);
        assert!(matches!(v.image("cover"), Field::Value(_)));
        assert_eq!(v.image("text_cover"), Field::Missing);
        assert_eq!(v.image("fake"), Field::Missing);

        let errors = v.finish().unwrap_err();
        assert_eq!(errors.get("text_cover").unwrap()[0], "封面不是图片不行的");
        assert!(errors.contains("fake"));
    }

    #[test]
    fn test_parse_datetime_forms() {
        assert!(parse_datetime("2024-03-01").is_some());
        assert!(parse_datetime("2024-03-01 10:20:30").is_some());
        assert!(parse_datetime("2024-03-01T10:20:30+08:00").is_some());
        assert!(parse_datetime("yesterday").is_none());
    }
}
