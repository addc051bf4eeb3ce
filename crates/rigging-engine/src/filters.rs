//! Filters available to value templates

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use minijinja::{Error, ErrorKind, Value};
use sha2::{Digest, Sha256};

fn invalid(message: impl std::fmt::Display) -> Error {
    Error::new(ErrorKind::InvalidOperation, message.to_string())
}

/// Render a value as a YAML block
///
/// Usage: {{ database | toyaml }}
pub fn toyaml(value: Value) -> Result<String, Error> {
    let json: serde_json::Value = serde_json::to_value(&value).map_err(invalid)?;
    let yaml = serde_yaml::to_string(&json).map_err(invalid)?;

    Ok(yaml.trim_start_matches("---\n").trim_end().to_string())
}

/// Render a value as compact JSON
///
/// Usage: {{ endpoints | tojson }}
pub fn tojson(value: Value) -> Result<String, Error> {
    let json: serde_json::Value = serde_json::to_value(&value).map_err(invalid)?;
    serde_json::to_string(&json).map_err(invalid)
}

/// Usage: {{ password | b64encode }}
#[must_use]
pub fn b64encode(value: String) -> String {
    BASE64.encode(value.as_bytes())
}

/// Usage: {{ encoded | b64decode }}
pub fn b64decode(value: String) -> Result<String, Error> {
    let decoded = BASE64
        .decode(value.trim().as_bytes())
        .map_err(|e| invalid(format!("base64 decode error: {e}")))?;

    String::from_utf8(decoded).map_err(|e| invalid(format!("UTF-8 decode error: {e}")))
}

/// Wrap a value in double quotes, escaping as needed
///
/// Usage: {{ cluster.name | quote }}
#[must_use]
pub fn quote(value: Value) -> String {
    let s = match value.as_str() {
        Some(s) => s.to_string(),
        None => value.to_string(),
    };
    format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Fail unless the value is defined and non-empty
///
/// A missing value is reported as undefined, so a fragment that can't see
/// the value yet is left for the merged pass.
///
/// Usage: {{ db.password | required("db.password must be set") }}
pub fn required(value: Value, message: Option<String>) -> Result<Value, Error> {
    if value.is_undefined() {
        let msg = message.unwrap_or_else(|| "required value is missing".to_string());
        return Err(Error::new(ErrorKind::UndefinedError, msg));
    }

    let empty = value.is_none() || value.as_str().is_some_and(str::is_empty);
    if empty {
        let msg = message.unwrap_or_else(|| "required value is empty".to_string());
        return Err(invalid(msg));
    }

    Ok(value)
}

/// Hex-encoded SHA-256 digest
///
/// Usage: {{ config | tojson | sha256 }}
pub fn sha256(value: String) -> String {
    format!("{:x}", Sha256::digest(value.as_bytes()))
}
