#![allow(dead_code)]

use node_validator::{Finding, FindingKind, Port, Severity};

// =============================================================================
// Port builders
// =============================================================================

pub fn ports(names: &[&str]) -> Vec<Port> {
    names.iter().map(|n| Port::new(*n)).collect()
}

pub fn typed_ports(pairs: &[(&str, &str)]) -> Vec<Port> {
    pairs.iter().map(|(n, t)| Port::typed(*n, *t)).collect()
}

// =============================================================================
// Finding queries
// =============================================================================

pub fn codes(findings: &[Finding]) -> Vec<&str> {
    findings.iter().map(|f| f.code.as_str()).collect()
}

pub fn with_code<'a>(findings: &'a [Finding], code: &str) -> Vec<&'a Finding> {
    findings.iter().filter(|f| f.code == code).collect()
}

pub fn errors(findings: &[Finding]) -> Vec<&Finding> {
    findings.iter().filter(|f| f.severity == Severity::Error).collect()
}

// =============================================================================
// Assertions
// =============================================================================

/// Assert exactly one finding with `code` exists and return it.
pub fn assert_single(findings: &[Finding], code: &str) -> Finding {
    let matching = with_code(findings, code);
    assert_eq!(
        matching.len(),
        1,
        "Expected exactly one {} finding, got: {:#?}",
        code,
        findings
    );
    matching[0].clone()
}

pub fn assert_has(findings: &[Finding], code: &str, kind: FindingKind, severity: Severity) {
    assert!(
        findings
            .iter()
            .any(|f| f.code == code && f.kind == kind && f.severity == severity),
        "Expected a {} {:?}/{:?} finding, got: {:#?}",
        code,
        kind,
        severity,
        findings
    );
}

pub fn assert_no_errors(findings: &[Finding]) {
    let errs = errors(findings);
    assert!(errs.is_empty(), "Expected no errors, got: {:#?}", errs);
}
