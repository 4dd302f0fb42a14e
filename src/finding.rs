//! Findings reported by the script validator, plus the port declarations
//! the validator checks a script against.

use serde::{Deserialize, Serialize};

/// Which rule family produced a finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingKind {
    MissingFunction,
    OutputMismatch,
    SyntaxError,
    Security,
    BestPractice,
}

impl FindingKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FindingKind::MissingFunction => "missing_function",
            FindingKind::OutputMismatch => "output_mismatch",
            FindingKind::SyntaxError => "syntax_error",
            FindingKind::Security => "security",
            FindingKind::BestPractice => "best_practice",
        }
    }
}

impl std::fmt::Display for FindingKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered most to least severe. Only `Error` blocks saving or running a script.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl Severity {
    /// Report grouping order.
    pub const ALL: [Severity; 3] = [Severity::Error, Severity::Warning, Severity::Info];

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "info",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A severity that never blocks acceptance. Best-practice rules are typed
/// with this so they cannot produce an `Error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advisory {
    Warning,
    Info,
}

impl From<Advisory> for Severity {
    fn from(a: Advisory) -> Self {
        match a {
            Advisory::Warning => Severity::Warning,
            Advisory::Info => Severity::Info,
        }
    }
}

/// 1-based source position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Location {
    pub line: usize,
    pub column: usize,
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    /// Stable rule code, e.g. `S001`.
    pub code: String,
    pub kind: FindingKind,
    pub severity: Severity,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
}

impl std::fmt::Display for Finding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.location {
            Some(loc) => write!(
                f,
                "[{}:{}] {} ({})",
                self.kind, self.code, self.message, loc
            ),
            None => write!(f, "[{}:{}] {}", self.kind, self.code, self.message),
        }
    }
}

impl Finding {
    pub fn new(
        code: &str,
        kind: FindingKind,
        severity: Severity,
        message: impl Into<String>,
        location: Option<Location>,
    ) -> Self {
        Finding {
            code: code.into(),
            kind,
            severity,
            message: message.into(),
            location,
        }
    }

    pub fn syntax_error(message: impl Into<String>, location: Option<Location>) -> Self {
        Finding::new(
            "P001",
            FindingKind::SyntaxError,
            Severity::Error,
            message,
            location,
        )
    }

    pub fn missing_function(
        code: &str,
        severity: Severity,
        message: impl Into<String>,
        location: Option<Location>,
    ) -> Self {
        Finding::new(code, FindingKind::MissingFunction, severity, message, location)
    }

    pub fn output_mismatch(
        code: &str,
        severity: Severity,
        message: impl Into<String>,
        location: Option<Location>,
    ) -> Self {
        Finding::new(code, FindingKind::OutputMismatch, severity, message, location)
    }

    pub fn best_practice(
        code: &str,
        severity: Advisory,
        message: impl Into<String>,
        location: Option<Location>,
    ) -> Self {
        Finding::new(
            code,
            FindingKind::BestPractice,
            severity.into(),
            message,
            location,
        )
    }

    /// True when this finding must block saving/running the script.
    pub fn is_blocking(&self) -> bool {
        self.severity == Severity::Error
    }
}

/// A declared input, output or property of a custom node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Port {
    #[serde(alias = "key")]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_type: Option<String>,
}

impl Port {
    pub fn new(name: impl Into<String>) -> Self {
        Port {
            name: name.into(),
            data_type: None,
        }
    }

    pub fn typed(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Port {
            name: name.into(),
            data_type: Some(data_type.into()),
        }
    }
}
