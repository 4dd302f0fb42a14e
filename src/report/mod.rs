//! Human-readable rendering of a finding list.
//!
//! Findings are grouped by severity (errors, warnings, info); inside a group
//! they keep the order the validator produced them in.

pub mod writer;

use crate::finding::{Finding, Severity};

pub use writer::ReportWriter;

pub const NO_ISSUES: &str = "No issues found: the script passed all validation checks.";

pub fn format_report(findings: &[Finding]) -> String {
    if findings.is_empty() {
        return NO_ISSUES.to_string();
    }

    let mut w = ReportWriter::new();
    w.line(&summary(findings));

    for severity in Severity::ALL {
        let mut group = findings.iter().filter(|f| f.severity == severity).peekable();
        if group.peek().is_none() {
            continue;
        }
        w.blank();
        w.section(heading(severity));
        for finding in group {
            w.item(&finding.to_string());
        }
        w.end_section();
    }

    w.finish()
}

fn heading(severity: Severity) -> &'static str {
    match severity {
        Severity::Error => "Errors:",
        Severity::Warning => "Warnings:",
        Severity::Info => "Info:",
    }
}

fn summary(findings: &[Finding]) -> String {
    let count = |s: Severity| findings.iter().filter(|f| f.severity == s).count();
    let errors = count(Severity::Error);
    let warnings = count(Severity::Warning);
    let infos = count(Severity::Info);

    let verdict = if errors > 0 {
        "Validation failed"
    } else {
        "Validation passed"
    };
    format!(
        "{}: {} {}, {} {}, {} info.",
        verdict,
        errors,
        if errors == 1 { "error" } else { "errors" },
        warnings,
        if warnings == 1 { "warning" } else { "warnings" },
        infos
    )
}
