//! Evaluator error types

use miette::{Diagnostic, NamedSource};
use thiserror::Error;

#[derive(Error, Debug, Diagnostic)]
pub enum EngineError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Template(#[from] TemplateError),

    #[error("Values keep changing after {passes} evaluation passes, check for circular references")]
    #[diagnostic(
        code(rigging::evaluate::cycle),
        help("a value that refers to itself, directly or through other values, never settles")
    )]
    ReferenceCycle { passes: usize },

    #[error("Failed to convert template result: {0}")]
    Conversion(#[from] serde_json::Error),
}

/// Error kind for categorizing template errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum TemplateErrorKind {
    UndefinedVariable,
    UnknownFilter,
    UnknownFunction,
    SyntaxError,
    TypeError,
    InvalidOperation,
    Other,
}

impl TemplateErrorKind {
    fn from_minijinja(kind: minijinja::ErrorKind) -> Self {
        match kind {
            minijinja::ErrorKind::UndefinedError => Self::UndefinedVariable,
            minijinja::ErrorKind::UnknownFilter => Self::UnknownFilter,
            minijinja::ErrorKind::UnknownFunction => Self::UnknownFunction,
            minijinja::ErrorKind::SyntaxError => Self::SyntaxError,
            minijinja::ErrorKind::InvalidOperation => Self::InvalidOperation,
            minijinja::ErrorKind::NonPrimitive | minijinja::ErrorKind::NonKey => Self::TypeError,
            _ => Self::Other,
        }
    }
}

/// A template inside the tree that failed to evaluate
#[derive(Error, Debug, Diagnostic)]
#[error("{location}: {message}")]
#[diagnostic(code(rigging::evaluate::template))]
pub struct TemplateError {
    /// Dotted path of the value holding the template
    pub location: String,

    pub message: String,

    pub kind: TemplateErrorKind,

    #[source_code]
    pub src: NamedSource<String>,

    #[help]
    pub suggestion: Option<String>,
}

impl TemplateError {
    pub fn from_minijinja(
        err: &minijinja::Error,
        location: &str,
        template: &str,
        top_level_keys: &[&str],
    ) -> Self {
        let kind = TemplateErrorKind::from_minijinja(err.kind());

        let description = kind_description(err.kind());
        let message = match err.detail().filter(|d| !d.is_empty()) {
            Some(detail) => format!("{description}: {detail}"),
            None if kind == TemplateErrorKind::UndefinedVariable => {
                format!("undefined value in `{}`", template.trim())
            }
            None => description.to_string(),
        };

        let suggestion = match kind {
            TemplateErrorKind::UndefinedVariable if !top_level_keys.is_empty() => Some(format!(
                "available top-level keys: {}",
                top_level_keys.join(", ")
            )),
            TemplateErrorKind::UnknownFilter => Some(
                "available filters: toyaml, tojson, b64encode, b64decode, quote, required, sha256 \
                 and the MiniJinja builtins"
                    .to_string(),
            ),
            _ => None,
        };

        Self {
            location: location.to_string(),
            message,
            kind,
            src: NamedSource::new(location, template.to_string()),
            suggestion,
        }
    }

    pub fn kind(&self) -> TemplateErrorKind {
        self.kind
    }
}

fn kind_description(kind: minijinja::ErrorKind) -> &'static str {
    match kind {
        minijinja::ErrorKind::UndefinedError => "undefined value",
        minijinja::ErrorKind::UnknownFilter => "unknown filter",
        minijinja::ErrorKind::UnknownFunction => "unknown function",
        minijinja::ErrorKind::SyntaxError => "syntax error",
        minijinja::ErrorKind::NonPrimitive | minijinja::ErrorKind::NonKey => "type error",
        minijinja::ErrorKind::InvalidOperation => "invalid operation",
        _ => "template error",
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_undefined_error_lists_keys() {
        let err = minijinja::Error::new(minijinja::ErrorKind::UndefinedError, "");
        let err =
            TemplateError::from_minijinja(&err, "db.url", "{{ cluster.name }}", &["db", "env"]);

        assert_eq!(err.kind(), TemplateErrorKind::UndefinedVariable);
        assert_eq!(err.suggestion.as_deref(), Some("available top-level keys: db, env"));
        assert!(err.to_string().starts_with("db.url: "));
    }

    #[test]
    fn test_invalid_operation_keeps_detail() {
        let err = minijinja::Error::new(minijinja::ErrorKind::InvalidOperation, "no region");
        let err = TemplateError::from_minijinja(&err, "region", "{{ fail('no region') }}", &[]);

        assert_eq!(err.to_string(), "region: invalid operation: no region");
        assert!(err.suggestion.is_none());
    }
}
