//! Rigging Engine - MiniJinja evaluation of value trees
//!
//! This crate provides the evaluator used when compiling group-vars:
//! - Templates embedded anywhere in a value tree, rendered against the tree
//! - Type-preserving single expressions (`"{{ db }}"` copies a mapping)
//! - Repeated passes with reference cycle detection
//! - Filters for YAML/JSON/base64 conversion and validation

pub mod error;
pub mod evaluator;
pub mod filters;
pub mod functions;

pub use error::{EngineError, Result, TemplateError, TemplateErrorKind};
pub use evaluator::{DEFAULT_MAX_PASSES, TreeEvaluator, TreeEvaluatorBuilder};
