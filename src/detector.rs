// Host-independent diagnostics handling: the host environment feeds a
// diagnostics snapshot in, and gets back the text to analyze, if any.
use regex::RegexSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
    Info,
    Hint,
}

#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub message: String,
    pub severity: Severity,
}

impl Diagnostic {
    pub fn new(message: impl Into<String>, severity: Severity) -> Self {
        Self {
            message: message.into(),
            severity,
        }
    }
}

pub struct ErrorDetector {
    patterns: RegexSet,
    auto_explain: bool,
}

impl ErrorDetector {
    pub fn new(auto_explain: bool) -> Self {
        let patterns = RegexSet::new([
            r"(?i)error:",
            r"(?i)exception:",
            r"(?i)failed:",
            r"(?i)cannot find",
            r"(?i)undefined",
            r"(?i)null reference",
            r"(?i)syntax error",
        ])
        .expect("detector patterns are valid");
        Self {
            patterns,
            auto_explain,
        }
    }

    /// Entry point for the host's diagnostics feed. Returns the combined
    /// error text to auto-analyze, or None when there is nothing to do.
    pub fn scan(&self, diagnostics: &[Diagnostic]) -> Option<String> {
        if !self.auto_explain {
            return None;
        }
        let errors: Vec<&str> = diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Error)
            .map(|d| d.message.as_str())
            .collect();
        if errors.is_empty() {
            return None;
        }
        Some(errors.join("\n"))
    }

    /// Heuristic for free-form text without severity information.
    pub fn looks_like_error(&self, text: &str) -> bool {
        self.patterns.is_match(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scan_joins_error_messages() {
        let detector = ErrorDetector::new(true);
        let diags = vec![
            Diagnostic::new("cannot find value `x` in this scope", Severity::Error),
            Diagnostic::new("unused variable `y`", Severity::Warning),
            Diagnostic::new("mismatched types", Severity::Error),
        ];
        let text = detector.scan(&diags).unwrap();
        assert_eq!(text, "cannot find value `x` in this scope\nmismatched types");
    }

    #[test]
    fn scan_ignores_non_errors() {
        let detector = ErrorDetector::new(true);
        let diags = vec![
            Diagnostic::new("unused import", Severity::Warning),
            Diagnostic::new("consider renaming", Severity::Hint),
        ];
        assert!(detector.scan(&diags).is_none());
    }

    #[test]
    fn scan_respects_auto_explain_gate() {
        let detector = ErrorDetector::new(false);
        let diags = vec![Diagnostic::new("mismatched types", Severity::Error)];
        assert!(detector.scan(&diags).is_none());
    }

    #[test]
    fn scan_of_empty_set_is_none() {
        let detector = ErrorDetector::new(true);
        assert!(detector.scan(&[]).is_none());
    }

    #[test]
    fn recognizes_common_error_shapes() {
        let detector = ErrorDetector::new(true);
        assert!(detector.looks_like_error("Error: ENOENT no such file"));
        assert!(detector.looks_like_error("Unhandled exception: stack overflow"));
        assert!(detector.looks_like_error("TypeError: x is undefined"));
        assert!(detector.looks_like_error("SYNTAX ERROR near line 3"));
        assert!(!detector.looks_like_error("all tests passed"));
    }
}
