//! Global functions available to value templates

use minijinja::{Error, ErrorKind, Value};

/// Abort evaluation with a message
///
/// Usage: {{ fail("region must be set for production clusters") }}
pub fn fail(message: String) -> Result<Value, Error> {
    Err(Error::new(ErrorKind::InvalidOperation, message))
}
