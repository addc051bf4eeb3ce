//! Standard exit codes for CLI operations
//!
//! These exit codes follow Unix conventions and sysexits.h where applicable.

/// General error - unspecified failure (decryption, download...)
pub const ERROR: i32 = 1;

/// Validation error - invalid inventory, values, playbook or filter
pub const VALIDATION_ERROR: i32 = 2;

/// Template error - evaluation of group-vars or playbook failed
pub const TEMPLATE_ERROR: i32 = 3;

/// IO error - file not found, permission denied, etc.
pub const IO_ERROR: i32 = 5;
