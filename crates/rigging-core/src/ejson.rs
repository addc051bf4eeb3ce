//! EJSON secret decryption
//!
//! An EJSON document is a JSON object carrying a `_public_key` (64 hex chars)
//! and string values boxed as `EJ[1:<ephemeral pub>:<nonce>:<ciphertext>]`,
//! each part standard base64. Boxes use NaCl Curve25519-XSalsa20-Poly1305.

use std::path::Path;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use crypto_box::aead::Aead;
use crypto_box::aead::generic_array::GenericArray;
use crypto_box::{PublicKey, SalsaBox, SecretKey};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value as JsonValue;

use crate::error::{CoreError, Result};

/// Key holding the recipient public key
pub const PUBLIC_KEY_FIELD: &str = "_public_key";

const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 24;

static BOXED_MESSAGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^EJ\[1:([A-Za-z0-9+/=]+):([A-Za-z0-9+/=]+):([A-Za-z0-9+/=]+)\]$")
        .expect("boxed message pattern is valid")
});

/// Decrypt every boxed value of an EJSON document
///
/// The private key is `private_key` when given, otherwise the trimmed
/// contents of `<key_dir>/<public key hex>`. Returns the decrypted document
/// serialized as pretty JSON.
pub fn decrypt(data: &[u8], key_dir: &Path, private_key: Option<&str>) -> Result<Vec<u8>> {
    let mut doc: JsonValue = serde_json::from_slice(data)
        .map_err(|e| CoreError::ejson(format!("invalid JSON document: {e}")))?;

    let public_hex = doc
        .get(PUBLIC_KEY_FIELD)
        .and_then(JsonValue::as_str)
        .ok_or_else(|| CoreError::ejson(format!("missing or invalid {PUBLIC_KEY_FIELD}")))?
        .to_string();
    // Validates the public key even though decryption only needs the
    // ephemeral keys embedded in each box.
    parse_key(&public_hex, "public")?;

    let private_hex = match private_key.map(str::trim).filter(|k| !k.is_empty()) {
        Some(key) => key.to_string(),
        None => read_private_key(key_dir, &public_hex)?,
    };
    let secret = SecretKey::from(parse_key(&private_hex, "private")?);

    decrypt_tree(&mut doc, &secret)?;

    serde_json::to_vec_pretty(&doc).map_err(CoreError::serialization)
}

fn read_private_key(key_dir: &Path, public_hex: &str) -> Result<String> {
    let key_path = key_dir.join(public_hex);
    let content = std::fs::read_to_string(&key_path).map_err(|e| {
        CoreError::ejson(format!(
            "couldn't read private key {}: {e}",
            key_path.display()
        ))
    })?;
    Ok(content.trim().to_string())
}

fn parse_key(hex_key: &str, kind: &str) -> Result<[u8; KEY_LEN]> {
    let bytes = hex::decode(hex_key)
        .map_err(|e| CoreError::ejson(format!("invalid {kind} key: {e}")))?;
    <[u8; KEY_LEN]>::try_from(bytes.as_slice()).map_err(|_| {
        CoreError::ejson(format!(
            "invalid {kind} key: expected {} hex characters",
            KEY_LEN * 2
        ))
    })
}

/// Walk the document and open every boxed string
///
/// A string directly under a `_`-prefixed key is left alone. Nested
/// containers are still walked.
fn decrypt_tree(value: &mut JsonValue, secret: &SecretKey) -> Result<()> {
    match value {
        JsonValue::Object(map) => {
            for (key, child) in map.iter_mut() {
                if key.starts_with('_') && child.is_string() {
                    continue;
                }
                decrypt_tree(child, secret)?;
            }
        }
        JsonValue::Array(items) => {
            for item in items {
                decrypt_tree(item, secret)?;
            }
        }
        JsonValue::String(s) => {
            if let Some(plain) = open_box(s, secret)? {
                *s = plain;
            }
        }
        _ => {}
    }
    Ok(())
}

/// Open one boxed message; `Ok(None)` if the string is not a box
fn open_box(message: &str, secret: &SecretKey) -> Result<Option<String>> {
    let Some(caps) = BOXED_MESSAGE.captures(message) else {
        return Ok(None);
    };

    let decode = |idx: usize, what: &str| {
        BASE64
            .decode(&caps[idx])
            .map_err(|e| CoreError::ejson(format!("invalid {what} encoding: {e}")))
    };
    let ephemeral = decode(1, "public key")?;
    let nonce = decode(2, "nonce")?;
    let ciphertext = decode(3, "ciphertext")?;

    let ephemeral = <[u8; KEY_LEN]>::try_from(ephemeral.as_slice())
        .map_err(|_| CoreError::ejson("invalid ephemeral public key length"))?;
    if nonce.len() != NONCE_LEN {
        return Err(CoreError::ejson("invalid nonce length"));
    }

    let cipher = SalsaBox::new(&PublicKey::from(ephemeral), secret);
    let plain = cipher
        .decrypt(GenericArray::from_slice(&nonce), ciphertext.as_slice())
        .map_err(|_| CoreError::ejson("couldn't decrypt message"))?;

    String::from_utf8(plain)
        .map(Some)
        .map_err(|_| CoreError::ejson("decrypted message is not valid UTF-8"))
}
