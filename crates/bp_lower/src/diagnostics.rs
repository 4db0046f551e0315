//! Source-semantic problems found while lowering.
//!
//! Passes never fail on bad input; they record a [`Diagnostic`] and carry
//! on so one run surfaces as many problems as possible.

use bp_ast::Span;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    Error,
    Warning,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub span: Span,
    pub message: String,
}

impl Diagnostic {
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    /// `file:line:col: message`
    pub fn render(&self, filename: &str) -> String {
        format!("{filename}:{}: {}", self.span, self.message)
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}: {}", self.span, self.severity, self.message)
    }
}

/// Collects diagnostics in the order they are reported.
#[derive(Debug, Default)]
pub struct Reporter {
    diagnostics: Vec<Diagnostic>,
}

impl Reporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn error(&mut self, span: Span, message: impl Into<String>) {
        self.report(Severity::Error, span, message.into());
    }

    pub fn warning(&mut self, span: Span, message: impl Into<String>) {
        self.report(Severity::Warning, span, message.into());
    }

    fn report(&mut self, severity: Severity, span: Span, message: String) {
        tracing::debug!(%severity, %span, %message, "diagnostic");
        self.diagnostics.push(Diagnostic {
            severity,
            span,
            message,
        });
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }

    pub fn error_count(&self) -> usize {
        self.errors().count()
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| d.is_error())
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn warnings_are_not_errors() {
        let mut reporter = Reporter::new();
        reporter.warning(Span::DUMMY, "loop closure skipped");
        assert!(!reporter.has_errors());
        reporter.error(Span::new(4, 5, 2, 3), "x is not defined");
        assert!(reporter.has_errors());
        assert_eq!(reporter.error_count(), 1);
        assert_eq!(reporter.diagnostics().len(), 2);
    }

    #[test]
    fn renders_with_location() {
        let mut reporter = Reporter::new();
        reporter.error(Span::new(4, 5, 2, 3), "x is not defined");
        let diag = &reporter.into_diagnostics()[0];
        assert_eq!(diag.render("a.js"), "a.js:2:3: x is not defined");
        assert_eq!(diag.to_string(), "2:3: error: x is not defined");
    }
}
