//! Response shaping
//!
//! Entities are serialized once, then trimmed per endpoint. Guests never
//! see the `hidden` and `deleted_at` fields at any depth.

use crate::error::Result;
use axum::Json;
use serde::Serialize;
use serde_json::{Map, Value};

const PRIVATE_FIELDS: &[&str] = &["hidden", "deleted_at"];

/// A serialized entity or list of entities
#[derive(Debug, Clone)]
pub struct Resource(Value);

impl Resource {
    pub fn new<T: Serialize>(item: &T) -> Result<Self> {
        Ok(Self(serde_json::to_value(item)?))
    }

    /// Drop fields from the entity, or from every entity of a list.
    pub fn except(mut self, fields: &[&str]) -> Self {
        for_each_object(&mut self.0, &mut |obj: &mut Map<String, Value>| {
            remove_fields(obj, fields)
        });
        self
    }

    /// Drop fields from the entities nested under `key`.
    pub fn except_nested(mut self, key: &str, fields: &[&str]) -> Self {
        for_each_object(&mut self.0, &mut |obj: &mut Map<String, Value>| {
            if let Some(nested) = obj.get_mut(key) {
                for_each_object(nested, &mut |inner: &mut Map<String, Value>| {
                    remove_fields(inner, fields)
                });
            }
        });
        self
    }

    /// Strip private fields everywhere unless the caller is authenticated.
    pub fn for_viewer(mut self, authenticated: bool) -> Self {
        if !authenticated {
            strip_private(&mut self.0);
        }
        self
    }

    pub fn into_json(self) -> Json<Value> {
        Json(self.0)
    }

    pub fn into_value(self) -> Value {
        self.0
    }
}

fn for_each_object(value: &mut Value, f: &mut dyn FnMut(&mut Map<String, Value>)) {
    match value {
        Value::Object(obj) => f(obj),
        Value::Array(items) => {
            for item in items {
                if let Value::Object(obj) = item {
                    f(obj);
                }
            }
        }
        _ => {}
    }
}

fn remove_fields(obj: &mut Map<String, Value>, fields: &[&str]) {
    for field in fields {
        obj.remove(*field);
    }
}

fn strip_private(value: &mut Value) {
    match value {
        Value::Object(obj) => {
            remove_fields(obj, PRIVATE_FIELDS);
            for nested in obj.values_mut() {
                strip_private(nested);
            }
        }
        Value::Array(items) => items.iter_mut().for_each(strip_private),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_guest_never_sees_private_fields() {
        let value = json!({
            "id": 1,
            "hidden": false,
            "deleted_at": null,
            "book": { "id": 2, "hidden": true, "deleted_at": null }
        });

        let guest = Resource::new(&value).unwrap().for_viewer(false).into_value();
        assert_eq!(guest, json!({ "id": 1, "book": { "id": 2 } }));

        let owner = Resource::new(&value).unwrap().for_viewer(true).into_value();
        assert_eq!(owner, value);
    }

    #[test]
    fn test_except_on_lists_and_nested() {
        let value = json!([{ "id": 1, "content": "x", "notes": [{ "id": 2, "content": "y" }] }]);

        let shaped = Resource::new(&value)
            .unwrap()
            .except(&["content"])
            .except_nested("notes", &["content"])
            .into_value();
        assert_eq!(shaped, json!([{ "id": 1, "notes": [{ "id": 2 }] }]));
    }
}
