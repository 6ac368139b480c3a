use atfile_outline::Gnx;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Severity level of a diagnostic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiagnosticLevel {
    Error,
    Warning,
}

/// What kind of authoring problem the writer found
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DiagnosticKind {
    UndefinedSection,
    /// The definition is not a direct child of the node referencing it
    IndirectSection,
    MultipleOthers,
    Orphan,
    NestedFileNode,
    MisplacedAll,
    UnmatchedEndRaw,
    MisplacedFirstLast,
    DelimsClash,
    BadDelims,
    DelimsFallback,
}

/// A problem found while writing a derived file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// The severity level
    pub level: DiagnosticLevel,

    pub kind: DiagnosticKind,

    /// Human-readable message
    pub message: String,

    /// Headline of the node the problem was found in
    pub headline: String,

    pub gnx: Option<Gnx>,
}

impl Diagnostic {
    pub fn error(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            level: DiagnosticLevel::Error,
            kind,
            message: message.into(),
            headline: String::new(),
            gnx: None,
        }
    }

    pub fn warning(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            level: DiagnosticLevel::Warning,
            kind,
            message: message.into(),
            headline: String::new(),
            gnx: None,
        }
    }

    pub fn in_node(mut self, gnx: &Gnx, headline: impl Into<String>) -> Self {
        self.gnx = Some(gnx.clone());
        self.headline = headline.into();
        self
    }

    pub fn is_error(&self) -> bool {
        self.level == DiagnosticLevel::Error
    }
}

/// Result of writing one derived file
#[derive(Debug, Clone, Default)]
pub struct WriteOutcome {
    pub text: String,
    pub diagnostics: Vec<Diagnostic>,
    /// Vnodes whose sentinels were written
    pub visited: HashSet<Gnx>,
}

impl WriteOutcome {
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }

    pub fn error_count(&self) -> usize {
        self.diagnostics.iter().filter(|d| d.is_error()).count()
    }

    pub fn diagnostics_of(&self, kind: DiagnosticKind) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(move |d| d.kind == kind)
    }
}
