//! Raw request input
//!
//! A field map gathered from either a JSON object or a multipart form,
//! before any typed validation happens.

use crate::error::{AppError, Result};
use serde_json::Value;
use std::collections::BTreeMap;

/// A file part of a multipart request
#[derive(Debug, Clone, PartialEq)]
pub struct UploadedFile {
    pub filename: Option<String>,
    pub content_type: Option<String>,
    pub data: Vec<u8>,
}

impl UploadedFile {
    /// Extension for the stored copy: taken from the original filename,
    /// falling back to the MIME subtype.
    pub fn extension(&self) -> Option<String> {
        let from_name = self
            .filename
            .as_deref()
            .and_then(|name| name.rsplit_once('.'))
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .filter(|ext| is_safe_extension(ext));

        from_name.or_else(|| {
            let subtype = self.content_type.as_deref()?.split_once('/')?.1;
            let subtype = subtype.split(';').next()?.trim().to_ascii_lowercase();
            let ext = match subtype.as_str() {
                "jpeg" | "pjpeg" => "jpg".to_string(),
                "svg+xml" => "svg".to_string(),
                other => other.to_string(),
            };
            is_safe_extension(&ext).then_some(ext)
        })
    }
}

fn is_safe_extension(ext: &str) -> bool {
    !ext.is_empty() && ext.len() <= 10 && ext.chars().all(|c| c.is_ascii_alphanumeric())
}

#[derive(Debug, Clone)]
pub enum InputValue {
    Value(Value),
    File(UploadedFile),
}

/// Request fields keyed by name
#[derive(Debug, Clone, Default)]
pub struct RawInput {
    fields: BTreeMap<String, InputValue>,
}

impl RawInput {
    /// Build from a JSON request body; anything other than an object is rejected.
    pub fn from_json(value: Value) -> Result<Self> {
        match value {
            Value::Object(map) => Ok(Self {
                fields: map
                    .into_iter()
                    .map(|(k, v)| (k, InputValue::Value(v)))
                    .collect(),
            }),
            Value::Null => Ok(Self::default()),
            _ => Err(AppError::BadRequest(
                "request body must be a JSON object".to_string(),
            )),
        }
    }

    /// Insert a text form field. Names ending in `[]` accumulate into an array.
    pub fn insert_text(&mut self, name: &str, text: String) {
        if let Some(base) = name.strip_suffix("[]") {
            let entry = self
                .fields
                .entry(base.to_string())
                .or_insert_with(|| InputValue::Value(Value::Array(Vec::new())));
            if let InputValue::Value(Value::Array(items)) = entry {
                items.push(Value::String(text));
            }
            return;
        }
        self.fields
            .insert(name.to_string(), InputValue::Value(Value::String(text)));
    }

    pub fn insert_file(&mut self, name: &str, file: UploadedFile) {
        self.fields.insert(name.to_string(), InputValue::File(file));
    }

    pub fn get(&self, field: &str) -> Option<&InputValue> {
        self.fields.get(field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }
}
