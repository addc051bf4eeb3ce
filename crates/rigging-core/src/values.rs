//! Values handling with deep merge support

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::error::{CoreError, Result};

/// Configuration tree with deep merge capability
///
/// Keys keep their document order (`serde_json` is built with `preserve_order`),
/// so serializing a tree yields keys in the order they were first defined.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Values(pub JsonValue);

impl Values {
    /// Create empty values
    pub fn new() -> Self {
        Self(JsonValue::Object(serde_json::Map::new()))
    }

    /// Parse values from YAML string
    ///
    /// `<<` merge keys are expanded before the tree is built.
    pub fn from_yaml(yaml: &str) -> std::result::Result<Self, serde_yaml::Error> {
        let mut value: serde_yaml::Value = serde_yaml::from_str(yaml)?;
        value.apply_merge()?;
        Ok(Self(serde_yaml::from_value(value)?))
    }

    /// Deep merge another Values into this one
    ///
    /// Rules:
    /// - Scalars: overlay replaces base
    /// - Objects: recursive merge
    /// - Arrays: overlay replaces base (not appended)
    pub fn merge(&mut self, overlay: &Values) {
        deep_merge(&mut self.0, &overlay.0);
    }

    /// Get a value by dotted path (e.g. "image.tag")
    pub fn get(&self, path: &str) -> Option<&JsonValue> {
        let parts: Vec<&str> = path.split('.').collect();
        get_nested(&self.0, &parts)
    }

    /// Get the inner JSON value
    pub fn inner(&self) -> &JsonValue {
        &self.0
    }

    /// Convert to JSON value
    pub fn into_inner(self) -> JsonValue {
        self.0
    }

    /// Top-level mapping, if the tree is map-rooted
    pub fn as_map(&self) -> Option<&serde_json::Map<String, JsonValue>> {
        self.0.as_object()
    }

    /// Check if values are empty
    pub fn is_empty(&self) -> bool {
        match &self.0 {
            JsonValue::Object(map) => map.is_empty(),
            JsonValue::Null => true,
            _ => false,
        }
    }

    /// Serialize as a YAML document
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(&self.0).map_err(CoreError::serialization)
    }

    /// Serialize as pretty JSON
    ///
    /// The tree is rendered to YAML first and the YAML is converted, so the
    /// JSON output always describes exactly what the YAML output would.
    pub fn to_json(&self) -> Result<String> {
        let yaml = self.to_yaml()?;
        let reparsed: JsonValue = serde_yaml::from_str(&yaml).map_err(CoreError::serialization)?;
        serde_json::to_string_pretty(&reparsed).map_err(CoreError::serialization)
    }
}

impl Default for Values {
    fn default() -> Self {
        Self::new()
    }
}

impl From<JsonValue> for Values {
    fn from(value: JsonValue) -> Self {
        Self(value)
    }
}

/// Deep merge two JSON values
fn deep_merge(base: &mut JsonValue, overlay: &JsonValue) {
    match (base, overlay) {
        (JsonValue::Object(base_map), JsonValue::Object(overlay_map)) => {
            for (key, overlay_value) in overlay_map {
                match base_map.get_mut(key) {
                    Some(base_value) => deep_merge(base_value, overlay_value),
                    None => {
                        base_map.insert(key.clone(), overlay_value.clone());
                    }
                }
            }
        }
        (base, overlay) => {
            *base = overlay.clone();
        }
    }
}

/// Get a nested value by path
fn get_nested<'a>(value: &'a JsonValue, path: &[&str]) -> Option<&'a JsonValue> {
    if path.is_empty() {
        return Some(value);
    }

    let key = path[0];
    let remaining = &path[1..];

    match value {
        JsonValue::Object(map) => map.get(key).and_then(|v| get_nested(v, remaining)),
        _ => None,
    }
}
