use std::fmt;

use blc_common::{Diagnostic, Phase, Span};
use thiserror::Error;

use super::attribute::Attribute;

/// A user-facing semantic error: a message anchored to a source range.
#[derive(Debug, Clone, PartialEq)]
pub struct SemanticError {
    pub span: Span,
    pub message: String,
}

impl SemanticError {
    pub fn new(span: Span, message: impl Into<String>) -> Self {
        Self {
            span,
            message: message.into(),
        }
    }
}

impl fmt::Display for SemanticError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}", self.message, self.span)
    }
}

impl From<SemanticError> for Diagnostic {
    fn from(error: SemanticError) -> Self {
        Diagnostic::error(error.message).with_span(error.span)
    }
}

/// Misuse of the attribute engine.
///
/// These never describe a mistake in the analyzed program; they mean a
/// pass registered rules inconsistently.
#[derive(Debug, Error)]
pub enum ReactorError {
    #[error("cannot pre-seed attributes while the reactor is running")]
    AlreadyRunning,

    #[error("attempting to redefine {attribute}")]
    Redefined { attribute: Attribute },

    #[error("rule '{rule}' did not export {}", list(.attributes))]
    MissingExports {
        rule: &'static str,
        attributes: Vec<Attribute>,
    },

    #[error("rule '{rule}' read undeclared dependency {attribute}")]
    UndeclaredDependency {
        rule: &'static str,
        attribute: Attribute,
    },

    #[error("rule '{rule}' wrote undeclared export {attribute}")]
    UndeclaredExport {
        rule: &'static str,
        attribute: Attribute,
    },

    #[error("{attribute} does not hold a {expected}")]
    UnexpectedValue {
        attribute: Attribute,
        expected: &'static str,
    },
}

fn list(attributes: &[Attribute]) -> String {
    attributes
        .iter()
        .map(|a| a.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Why `analyze` gave up.
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// The first phase that found problems, with all of its root errors.
    #[error("{phase} rejected the program with {} error(s)", .errors.len())]
    Rejected {
        phase: Phase,
        errors: Vec<SemanticError>,
    },

    #[error("internal analysis error: {0}")]
    Internal(#[from] ReactorError),
}

impl AnalysisError {
    /// Render as diagnostics, one per root error.
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        match self {
            AnalysisError::Rejected { errors, .. } => {
                errors.iter().cloned().map(Diagnostic::from).collect()
            }
            AnalysisError::Internal(err) => vec![Diagnostic::error(err.to_string())],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::NodeId;
    use crate::semantic::attribute::AttrName;

    #[test]
    fn semantic_error_to_diagnostic() {
        let diag: Diagnostic = SemanticError::new(Span::new(3, 7), "missing return").into();
        assert!(diag.is_error());
        assert_eq!(diag.message, "missing return");
        assert_eq!(diag.span, Some(Span::new(3, 7)));
    }

    #[test]
    fn reactor_error_messages() {
        let attr = Attribute::node(NodeId(4), AttrName::Type);
        let err = ReactorError::MissingExports {
            rule: "type call",
            attributes: vec![attr],
        };
        assert_eq!(err.to_string(), "rule 'type call' did not export (node#4 :: type)");
    }

    #[test]
    fn rejected_lists_every_root_error() {
        let err = AnalysisError::Rejected {
            phase: Phase::CheckTypes,
            errors: vec![
                SemanticError::new(Span::new(0, 1), "a"),
                SemanticError::new(Span::new(2, 3), "b"),
            ],
        };
        assert_eq!(err.to_string(), "check-types rejected the program with 2 error(s)");
        assert_eq!(err.diagnostics().len(), 2);
    }
}
