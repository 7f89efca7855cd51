// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Property schemas and validated property sets.
//!
//! The host collects and validates properties against a schema before
//! invoking an adapter; the adapter itself trusts what it receives.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ResourceError, Result};

/// Declared type of a property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyType {
    String,
    Integer,
    Number,
}

/// Default value of an optional property.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PropertyDefault {
    Str(&'static str),
    Int(i64),
}

impl PropertyDefault {
    fn to_value(self) -> Value {
        match self {
            PropertyDefault::Str(s) => Value::String(s.to_string()),
            PropertyDefault::Int(i) => Value::from(i),
        }
    }
}

/// One row of a resource type's property table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PropertySchema {
    pub name: &'static str,
    pub kind: PropertyType,
    pub description: &'static str,
    pub required: bool,
    pub default: Option<PropertyDefault>,
    /// Whether the host may change this property in place.
    pub update_allowed: bool,
}

impl PropertySchema {
    pub const fn string(name: &'static str, description: &'static str) -> Self {
        Self {
            name,
            kind: PropertyType::String,
            description,
            required: false,
            default: None,
            update_allowed: false,
        }
    }

    pub const fn integer(name: &'static str, description: &'static str) -> Self {
        Self {
            kind: PropertyType::Integer,
            ..Self::string(name, description)
        }
    }

    pub const fn required(self) -> Self {
        Self {
            required: true,
            ..self
        }
    }

    pub const fn default_str(self, value: &'static str) -> Self {
        Self {
            default: Some(PropertyDefault::Str(value)),
            ..self
        }
    }

    pub const fn default_int(self, value: i64) -> Self {
        Self {
            default: Some(PropertyDefault::Int(value)),
            ..self
        }
    }

    pub const fn update_allowed(self) -> Self {
        Self {
            update_allowed: true,
            ..self
        }
    }

    fn coerce(&self, value: Value) -> Result<Value> {
        let invalid = |reason: &str| ResourceError::InvalidProperty {
            name: self.name.to_string(),
            reason: reason.to_string(),
        };

        match (self.kind, value) {
            (PropertyType::String, Value::String(s)) => Ok(Value::String(s)),
            // Hosts commonly hand numbers through for string-typed ids.
            (PropertyType::String, Value::Number(n)) => Ok(Value::String(n.to_string())),
            (PropertyType::Integer, Value::Number(n)) if n.is_i64() => Ok(Value::Number(n)),
            (PropertyType::Integer, Value::String(s)) => s
                .trim()
                .parse::<i64>()
                .map(Value::from)
                .map_err(|_| invalid("expected an integer")),
            (PropertyType::Number, Value::Number(n)) => Ok(Value::Number(n)),
            (PropertyType::Number, Value::String(s)) => s
                .trim()
                .parse::<f64>()
                .ok()
                .and_then(serde_json::Number::from_f64)
                .map(Value::Number)
                .ok_or_else(|| invalid("expected a number")),
            (PropertyType::String, _) => Err(invalid("expected a string")),
            (PropertyType::Integer, _) => Err(invalid("expected an integer")),
            (PropertyType::Number, _) => Err(invalid("expected a number")),
        }
    }
}

/// A validated property set, keyed by property name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Properties(BTreeMap<String, Value>);

impl Properties {
    /// Wrap values without validation (changed-property sets, tests).
    pub fn from_values<K, I>(values: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        Self(values.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Validate supplied values against a schema and fill in defaults.
    pub fn resolve(schema: &[PropertySchema], supplied: BTreeMap<String, Value>) -> Result<Self> {
        if let Some(unknown) = supplied
            .keys()
            .find(|name| !schema.iter().any(|p| p.name == name.as_str()))
        {
            return Err(ResourceError::UnknownProperty(unknown.clone()));
        }

        let mut supplied = supplied;
        let mut values = BTreeMap::new();
        for property in schema {
            match supplied.remove(property.name) {
                Some(Value::Null) | None => {
                    if let Some(default) = property.default {
                        values.insert(property.name.to_string(), default.to_value());
                    } else if property.required {
                        return Err(ResourceError::MissingProperty(property.name.to_string()));
                    }
                }
                Some(value) => {
                    values.insert(property.name.to_string(), property.coerce(value)?);
                }
            }
        }

        Ok(Self(values))
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    /// String value of a property, or `""` when absent.
    pub fn str(&self, name: &str) -> &str {
        self.0.get(name).and_then(Value::as_str).unwrap_or("")
    }

    /// Integer value of a property.
    pub fn int(&self, name: &str) -> Option<i64> {
        self.0.get(name).and_then(Value::as_i64)
    }

    pub(crate) fn set(&mut self, name: &str, value: Value) {
        self.0.insert(name.to_string(), value);
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SCHEMA: &[PropertySchema] = &[
        PropertySchema::string("image", "Image UUID").required(),
        PropertySchema::string("alias", "Alias").default_str(""),
        PropertySchema::integer("vlan_id", "VLAN").default_int(0),
        PropertySchema::string("script", "Script").update_allowed(),
    ];

    fn supplied(value: Value) -> BTreeMap<String, Value> {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_resolve_fills_defaults() {
        let props = Properties::resolve(SCHEMA, supplied(json!({"image": "img-1"}))).unwrap();
        assert_eq!(props.str("image"), "img-1");
        assert_eq!(props.str("alias"), "");
        assert_eq!(props.int("vlan_id"), Some(0));
        assert!(!props.contains("script"));
    }

    #[test]
    fn test_resolve_missing_required() {
        let err = Properties::resolve(SCHEMA, supplied(json!({}))).unwrap_err();
        assert!(matches!(err, ResourceError::MissingProperty(ref n) if n == "image"));
    }

    #[test]
    fn test_resolve_null_counts_as_missing() {
        let err = Properties::resolve(SCHEMA, supplied(json!({"image": null}))).unwrap_err();
        assert!(matches!(err, ResourceError::MissingProperty(_)));
    }

    #[test]
    fn test_resolve_unknown_property() {
        let err =
            Properties::resolve(SCHEMA, supplied(json!({"image": "i", "colour": "red"})))
                .unwrap_err();
        assert!(matches!(err, ResourceError::UnknownProperty(ref n) if n == "colour"));
    }

    #[test]
    fn test_resolve_coerces_integer_strings() {
        let props =
            Properties::resolve(SCHEMA, supplied(json!({"image": "i", "vlan_id": "42"}))).unwrap();
        assert_eq!(props.int("vlan_id"), Some(42));
    }

    #[test]
    fn test_resolve_rejects_bad_integer() {
        let err =
            Properties::resolve(SCHEMA, supplied(json!({"image": "i", "vlan_id": "forty"})))
                .unwrap_err();
        assert!(matches!(err, ResourceError::InvalidProperty { ref name, .. } if name == "vlan_id"));
    }

    #[test]
    fn test_resolve_numeric_string_property() {
        let props = Properties::resolve(SCHEMA, supplied(json!({"image": 256}))).unwrap();
        assert_eq!(props.str("image"), "256");
    }

    #[test]
    fn test_resolve_rejects_object_for_string() {
        let err =
            Properties::resolve(SCHEMA, supplied(json!({"image": {"id": 1}}))).unwrap_err();
        assert!(matches!(err, ResourceError::InvalidProperty { .. }));
    }

    #[test]
    fn test_from_values_is_unchecked() {
        let props = Properties::from_values([("anything", json!(true))]);
        assert!(props.contains("anything"));
        assert_eq!(props.str("anything"), "");
        assert_eq!(props.names().collect::<Vec<_>>(), vec!["anything"]);
    }
}
