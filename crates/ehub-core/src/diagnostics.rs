//! Diagnostics collected while checking a case before model construction.
//!
//! Construction itself fails fast (see [`crate::EhubError`]); diagnostics are
//! the softer pre-flight layer used by `ehub validate`, where every problem in
//! a case file should be reported at once instead of one error per run.
//!
//! # Example
//!
//! ```
//! use ehub_core::diagnostics::Diagnostics;
//!
//! let mut diag = Diagnostics::new();
//! diag.add_warning_with_entity("range", "capacity factor above 1", "technology 'PV' at node 'onshore'");
//! diag.add_error_with_entity("series", "demand has 23 values, expected 24", "node 'onshore'");
//!
//! assert_eq!(diag.warning_count(), 1);
//! assert!(diag.has_errors());
//! ```

use serde::Serialize;

/// Severity level for diagnostic issues
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Suspicious but buildable (e.g. capacity factor slightly above 1)
    Warning,
    /// Construction would fail on this input
    Error,
}

/// A single diagnostic issue
#[derive(Debug, Clone, Serialize)]
pub struct DiagnosticIssue {
    pub severity: Severity,
    /// Category for grouping (e.g. "series", "range", "reference", "carrier")
    pub category: String,
    pub message: String,
    /// Optional entity reference (e.g. "node 'onshore'")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity: Option<String>,
}

impl DiagnosticIssue {
    pub fn new(
        severity: Severity,
        category: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            category: category.into(),
            message: message.into(),
            entity: None,
        }
    }

    pub fn with_entity(mut self, entity: impl Into<String>) -> Self {
        self.entity = Some(entity.into());
        self
    }
}

impl std::fmt::Display for DiagnosticIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let severity = match self.severity {
            Severity::Warning => "warning",
            Severity::Error => "error",
        };

        write!(f, "[{}:{}] {}", severity, self.category, self.message)?;

        if let Some(entity) = &self.entity {
            write!(f, " ({})", entity)?;
        }

        Ok(())
    }
}

/// Collection of diagnostic issues for one validation run
#[derive(Debug, Clone, Default, Serialize)]
pub struct Diagnostics {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub issues: Vec<DiagnosticIssue>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, issue: DiagnosticIssue) {
        self.issues.push(issue);
    }

    pub fn add_warning_with_entity(&mut self, category: &str, message: &str, entity: &str) {
        self.issues
            .push(DiagnosticIssue::new(Severity::Warning, category, message).with_entity(entity));
    }

    pub fn add_error(&mut self, category: &str, message: &str) {
        self.issues
            .push(DiagnosticIssue::new(Severity::Error, category, message));
    }

    pub fn add_error_with_entity(&mut self, category: &str, message: &str, entity: &str) {
        self.issues
            .push(DiagnosticIssue::new(Severity::Error, category, message).with_entity(entity));
    }

    pub fn warning_count(&self) -> usize {
        self.issues
            .iter()
            .filter(|i| i.severity == Severity::Warning)
            .count()
    }

    pub fn error_count(&self) -> usize {
        self.issues
            .iter()
            .filter(|i| i.severity == Severity::Error)
            .count()
    }

    pub fn has_errors(&self) -> bool {
        self.issues.iter().any(|i| i.severity == Severity::Error)
    }

    pub fn issues_by_category<'a>(
        &'a self,
        category: &'a str,
    ) -> impl Iterator<Item = &'a DiagnosticIssue> {
        self.issues.iter().filter(move |i| i.category == category)
    }

    pub fn summary(&self) -> String {
        let warnings = self.warning_count();
        let errors = self.error_count();
        let plural = |n: usize| if n == 1 { "" } else { "s" };

        match (warnings, errors) {
            (0, 0) => "No issues".to_string(),
            (w, 0) => format!("{} warning{}", w, plural(w)),
            (0, e) => format!("{} error{}", e, plural(e)),
            (w, e) => format!("{} warning{}, {} error{}", w, plural(w), e, plural(e)),
        }
    }
}

impl std::fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Diagnostics: {}", self.summary())?;
        for issue in &self.issues {
            writeln!(f, "  {}", issue)?;
        }
        Ok(())
    }
}
