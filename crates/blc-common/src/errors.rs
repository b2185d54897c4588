use serde::Serialize;

use crate::span::{LineMap, Span};

/// Severity level of a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// A related source location providing additional context for a diagnostic.
#[derive(Debug, Clone, Serialize)]
pub struct RelatedSpan {
    pub span: Span,
    pub message: String,
}

/// A compiler diagnostic (error, warning, or info).
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    pub span: Option<Span>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub related: Vec<RelatedSpan>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl Diagnostic {
    fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            severity,
            message: message.into(),
            span: None,
            related: Vec::new(),
            suggestion: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(Severity::Error, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, message)
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    pub fn with_related(mut self, span: Span, message: impl Into<String>) -> Self {
        self.related.push(RelatedSpan {
            span,
            message: message.into(),
        });
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    fn prefix(&self) -> &'static str {
        match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        }
    }

    /// Plain-text rendering with `file:line:col` locations.
    pub fn render(&self, lines: &LineMap, file_name: &str) -> String {
        let mut out = format!("{}: {}", self.prefix(), self.message);
        if let Some(span) = self.span {
            out.push_str(&format!("\n  --> {}", lines.describe(file_name, span)));
        }
        for related in &self.related {
            out.push_str(&format!(
                "\n  note: {} at {}",
                related.message,
                lines.describe(file_name, related.span)
            ));
        }
        if let Some(ref suggestion) = self.suggestion {
            out.push_str(&format!("\n   = help: {}", suggestion));
        }
        out
    }
}

/// Without a `LineMap` the location is the byte range; see [`Diagnostic::render`].
impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.prefix(), self.message)?;
        if let Some(span) = self.span {
            write!(f, "\n  --> {}", span)?;
        }
        Ok(())
    }
}

/// Convenience collector for diagnostics during lexing and parsing.
#[derive(Debug, Default)]
pub struct DiagnosticBag {
    diagnostics: Vec<Diagnostic>,
}

impl DiagnosticBag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn report(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    pub fn error(&mut self, message: impl Into<String>, span: Span) {
        self.report(Diagnostic::error(message).with_span(span));
    }

    pub fn warning(&mut self, message: impl Into<String>, span: Span) {
        self.report(Diagnostic::warning(message).with_span(span));
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(|d| d.is_error())
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics
    }
}

impl Extend<Diagnostic> for DiagnosticBag {
    fn extend<T: IntoIterator<Item = Diagnostic>>(&mut self, iter: T) {
        self.diagnostics.extend(iter);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_with_span() {
        let diag = Diagnostic::error("unknown identifier: x").with_span(Span::new(3, 4));
        assert_eq!(diag.to_string(), "error: unknown identifier: x\n  --> 3..4");
    }

    #[test]
    fn render_resolves_line_and_column() {
        let lines = LineMap::new("var a = 1;\nvar b = x;\n");
        let diag = Diagnostic::error("unknown identifier: x").with_span(Span::new(19, 20));
        assert_eq!(
            diag.render(&lines, "main.bl"),
            "error: unknown identifier: x\n  --> main.bl:2:9"
        );

        let warning = Diagnostic::warning("unreachable statement")
            .with_span(Span::new(11, 21))
            .with_related(Span::new(0, 10), "return is here")
            .with_suggestion("remove the statement");
        assert_eq!(
            warning.render(&lines, "main.bl"),
            "warning: unreachable statement\n  --> main.bl:2:1\n  note: return is here at main.bl:1:1\n   = help: remove the statement"
        );
    }

    #[test]
    fn bag_tracks_errors_only() {
        let mut bag = DiagnosticBag::new();
        bag.warning("unused", Span::dummy());
        assert!(!bag.has_errors());
        bag.error("broken", Span::new(0, 1));
        assert!(bag.has_errors());
        assert_eq!(bag.diagnostics().len(), 2);
    }

    #[test]
    fn serializes_without_empty_extras() {
        let diag = Diagnostic::error("missing return").with_span(Span::new(10, 12));
        let json = serde_json::to_value(&diag).unwrap();
        assert_eq!(json["severity"], "error");
        assert_eq!(json["span"]["start"], 10);
        assert!(json.get("related").is_none());
        assert!(json.get("suggestion").is_none());
    }
}
