//! Integration tests for the security pattern scan (S001–S010).

mod helpers;

use helpers::*;
use node_validator::{FindingKind, Severity, validate};

#[test]
fn eval_is_always_blocked() {
    let src = include_str!("fixtures/eval_node.js");
    let findings = validate(src, &ports(&["result"]), &ports(&["expression"])).unwrap();
    let f = assert_single(&findings, "S001");
    assert_eq!(f.kind, FindingKind::Security);
    assert_eq!(f.severity, Severity::Error);
    assert_eq!(f.location.map(|l| (l.line, l.column)), Some((3, 20)));
}

#[test]
fn eval_is_blocked_whatever_else_is_wrong() {
    for src in [
        "eval('1');",
        "function processData() { window.eval(code); }",
        "function processData(inputs) { if (false) { outputs.x = eval(inputs.s); } }",
    ] {
        let findings = validate(src, &ports(&["x", "y"]), &[]).unwrap();
        assert_has(&findings, "S001", FindingKind::Security, Severity::Error);
    }
}

#[test]
fn sandbox_escapes_reported_in_source_order() {
    let src = include_str!("fixtures/sandbox_escape.js");
    let findings = validate(src, &ports(&["body", "config"]), &[]).unwrap();
    assert_eq!(
        codes(&findings),
        vec!["S004", "S008", "S007", "S006", "S006", "S010"]
    );

    let lines: Vec<usize> = findings
        .iter()
        .map(|f| f.location.map(|l| l.line).unwrap_or(0))
        .collect();
    assert_eq!(lines, vec![1, 4, 5, 7, 7, 9]);

    assert_eq!(errors(&findings).len(), 5);
    assert_eq!(with_code(&findings, "S010")[0].severity, Severity::Warning);
}

#[test]
fn timers_with_functions_are_fine() {
    let src = "function processData(inputs) { setTimeout(() => {}, 10); outputs.x = 1; }";
    let findings = validate(src, &ports(&["x"]), &[]).unwrap();
    assert!(findings.is_empty(), "{:#?}", findings);
}

#[test]
fn every_route_to_dynamic_code_is_an_error() {
    let scripts = [
        ("function processData(inputs) { outputs.x = eval?.(inputs.c); }", "S001"),
        ("function processData(inputs) { outputs.x = (0, eval)(inputs.c); }", "S001"),
        ("function processData(inputs) { const e = eval; outputs.x = e(inputs.c); }", "S001"),
        ("function processData(inputs) { outputs.x = (() => {}).constructor(inputs.c)(); }", "S002"),
        ("function processData(inputs) { const r = require; outputs.x = r('fs'); }", "S004"),
        ("function processData(inputs) { outputs.x = window.process.env.SECRET; }", "S008"),
    ];
    for (src, code) in scripts {
        let findings = validate(src, &ports(&["x"]), &ports(&["c"])).unwrap();
        assert_has(&findings, code, FindingKind::Security, Severity::Error);
    }
}
