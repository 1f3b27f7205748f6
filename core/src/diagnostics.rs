//! Error kinds and diagnostics (spec.md §7).

use std::fmt;

/// Severity of a non-fatal diagnostic (SPEC_FULL.md §4 — the distilled spec
/// only implies fatal/non-fatal; this labels the non-fatal ones so callers
/// can filter without changing any classification from spec.md §7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Info,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
}

impl Diagnostic {
    pub fn warning(message: impl Into<String>) -> Self {
        let message = message.into();
        log::warn!("{message}");
        Diagnostic {
            severity: Severity::Warning,
            message,
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        let message = message.into();
        log::debug!("{message}");
        Diagnostic {
            severity: Severity::Info,
            message,
        }
    }
}

/// Fatal error kinds (spec.md §7 table).
#[derive(Debug, Clone, PartialEq)]
pub enum TranspileError {
    ParseError(String),
    UnsupportedConstruct(String),
    SemanticViolation(String),
    TransformationBug(String),
}

impl fmt::Display for TranspileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TranspileError::ParseError(msg) => write!(f, "parse error: {msg}"),
            TranspileError::UnsupportedConstruct(msg) => {
                write!(f, "unsupported construct: {msg}")
            }
            TranspileError::SemanticViolation(msg) => write!(f, "semantic violation: {msg}"),
            TranspileError::TransformationBug(msg) => write!(f, "internal error: {msg}"),
        }
    }
}

impl std::error::Error for TranspileError {}

pub type Result<T> = std::result::Result<T, TranspileError>;

/// Construct an `UnsupportedConstruct` error with the explanatory-message +
/// workaround shape spec.md §7 requires for that kind.
pub fn unsupported(construct: &str, workaround: &str) -> TranspileError {
    TranspileError::UnsupportedConstruct(format!(
        "{construct} is not supported by the transpiler. {workaround}"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages_are_prefixed_by_kind() {
        assert!(TranspileError::ParseError("x".into())
            .to_string()
            .starts_with("parse error"));
        assert!(unsupported("BULK COLLECT", "rewrite using a cursor FOR loop")
            .to_string()
            .contains("BULK COLLECT"));
    }
}
