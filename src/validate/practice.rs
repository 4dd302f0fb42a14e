//! Best-practice heuristics (B001–B006).
//!
//! Advisory only: everything here is a warning or an info, never an error.

use std::collections::HashSet;

use swc_common::Span;
use swc_ecma_ast::{CallExpr, Callee, Expr, Script, TryStmt};
use swc_ecma_visit::{Visit, VisitWith, noop_visit_type};

use crate::config::ValidatorConfig;
use crate::finding::{Advisory, Finding};
use crate::parse::ParsedScript;
use crate::validate::NodeScript;
use crate::validate::catalogue::{Matcher, PatternRule, member_prop, scan};
use crate::validate::entry::EntryFunction;
use crate::validate::flow::FlowGraph;
use crate::validate::outputs::OutputWrites;
use crate::validate::params::param_usage;

pub static DEPRECATED_RULES: &[PatternRule<Advisory>] = &[
    PatternRule {
        code: "B003",
        matcher: Matcher::Call(&["escape", "unescape"]),
        severity: Advisory::Info,
        message: "`{target}` is deprecated; use encodeURIComponent()/decodeURIComponent() instead",
    },
    PatternRule {
        code: "B003",
        matcher: Matcher::MethodCall(&["substr"]),
        severity: Advisory::Info,
        message: "`{target}` is deprecated; use .slice() or .substring() instead",
    },
    PatternRule {
        code: "B003",
        matcher: Matcher::MethodCall(&["getYear"]),
        severity: Advisory::Info,
        message: "`{target}` is deprecated; use .getFullYear() instead",
    },
    PatternRule {
        code: "B003",
        matcher: Matcher::Member(&[("arguments", "callee")]),
        severity: Advisory::Info,
        message: "`{target}` is deprecated and forbidden in strict mode",
    },
    PatternRule {
        code: "B003",
        matcher: Matcher::Property(&["__proto__"]),
        severity: Advisory::Info,
        message: "`{target}` is deprecated; use Object.getPrototypeOf()/Object.setPrototypeOf() instead",
    },
    PatternRule {
        code: "B003",
        matcher: Matcher::New(&["Buffer"]),
        severity: Advisory::Info,
        message: "`{target}` is deprecated; use Buffer.from() or Buffer.alloc() instead",
    },
    PatternRule {
        code: "B003",
        matcher: Matcher::WithStatement,
        severity: Advisory::Info,
        message: "`{target}` statements are deprecated and forbidden in strict mode",
    },
];

/// Run every heuristic. `entry` and `writes` are `None` when the entry
/// function is missing; only whole-script heuristics run then.
pub fn check_practice(
    parsed: &ParsedScript,
    entry: Option<&EntryFunction<'_>>,
    writes: Option<&OutputWrites>,
    node: &NodeScript<'_>,
    config: &ValidatorConfig,
    findings: &mut Vec<Finding>,
) {
    if let Some(entry) = entry {
        unused_inputs(entry, node, config, findings);
        if let Some(writes) = writes {
            partial_output_paths(entry, writes, node, config, findings);
        }
    }
    deprecated_apis(parsed, findings);
    unguarded_json_parse(parsed, findings);
    if let Some(entry) = entry {
        disabled_llm(parsed, entry, node, config, findings);
        undeclared_properties(parsed, entry, node, config, findings);
    }
}

fn unused_inputs(
    entry: &EntryFunction<'_>,
    node: &NodeScript<'_>,
    config: &ValidatorConfig,
    findings: &mut Vec<Finding>,
) {
    if node.inputs.is_empty() {
        return;
    }
    // No inputs parameter at all: nothing can be read.
    let usage = param_usage(entry, config.inputs_param).unwrap_or_default();
    if usage.escapes {
        return;
    }
    for port in node.inputs {
        if !usage.reads(&port.name) {
            findings.push(Finding::best_practice(
                "B001",
                Advisory::Info,
                format!(
                    "Declared input '{}' is never read by '{}'",
                    port.name, config.entry_function
                ),
                None,
            ));
        }
    }
}

fn partial_output_paths(
    entry: &EntryFunction<'_>,
    writes: &OutputWrites,
    node: &NodeScript<'_>,
    config: &ValidatorConfig,
    findings: &mut Vec<Finding>,
) {
    if node.outputs.is_empty() || !writes.sets_any() {
        return;
    }
    let flow = FlowGraph::build(entry, &config.result_identifier);
    if flow.has_path_without_output() {
        findings.push(Finding::best_practice(
            "B002",
            Advisory::Warning,
            format!(
                "Some paths through '{}' finish without setting any output; \
                 downstream nodes will receive no values on those paths",
                config.entry_function
            ),
            None,
        ));
    }
}

fn deprecated_apis(parsed: &ParsedScript, findings: &mut Vec<Finding>) {
    for hit in scan(DEPRECATED_RULES, &parsed.script) {
        let rule = &DEPRECATED_RULES[hit.rule];
        findings.push(Finding::best_practice(
            rule.code,
            rule.severity,
            rule.render(&hit.target),
            parsed.locate(hit.span),
        ));
    }
}

fn unguarded_json_parse(parsed: &ParsedScript, findings: &mut Vec<Finding>) {
    for span in json_parse_outside_try(&parsed.script) {
        findings.push(Finding::best_practice(
            "B004",
            Advisory::Info,
            "`JSON.parse()` throws on malformed input; wrap it in try/catch to handle bad data",
            parsed.locate(span),
        ));
    }
}

fn disabled_llm(
    parsed: &ParsedScript,
    entry: &EntryFunction<'_>,
    node: &NodeScript<'_>,
    config: &ValidatorConfig,
    findings: &mut Vec<Finding>,
) {
    if node.llm_enabled != Some(false) {
        return;
    }
    let Some(first_use) = param_usage(entry, config.llm_param).and_then(|u| u.first_use) else {
        return;
    };
    findings.push(Finding::best_practice(
        "B005",
        Advisory::Warning,
        "Script uses the `llm` parameter but LLM access is disabled for this node; \
         the call will fail at runtime",
        parsed.locate(first_use),
    ));
}

fn undeclared_properties(
    parsed: &ParsedScript,
    entry: &EntryFunction<'_>,
    node: &NodeScript<'_>,
    config: &ValidatorConfig,
    findings: &mut Vec<Finding>,
) {
    let Some(declared) = node.properties else {
        return;
    };
    let Some(usage) = param_usage(entry, config.properties_param) else {
        return;
    };
    let declared: HashSet<&str> = declared.iter().map(|p| p.name.as_str()).collect();
    let mut reported = HashSet::new();
    for (key, span) in &usage.keys {
        if declared.contains(key.as_str()) || !reported.insert(key.as_str()) {
            continue;
        }
        findings.push(Finding::best_practice(
            "B006",
            Advisory::Info,
            format!("Script reads property '{}' which is not declared on the node", key),
            parsed.locate(*span),
        ));
    }
}

/// `JSON.parse(...)` calls not lexically inside a `try` block. Calls in the
/// `catch` or `finally` clause are unguarded.
fn json_parse_outside_try(script: &Script) -> Vec<Span> {
    let mut finder = UnguardedParse {
        try_depth: 0,
        spans: Vec::new(),
    };
    script.visit_with(&mut finder);
    finder.spans
}

struct UnguardedParse {
    try_depth: usize,
    spans: Vec<Span>,
}

impl Visit for UnguardedParse {
    fn visit_try_stmt(&mut self, n: &TryStmt) {
        self.try_depth += 1;
        n.block.visit_with(self);
        self.try_depth -= 1;
        if let Some(handler) = &n.handler {
            handler.visit_with(self);
        }
        if let Some(finalizer) = &n.finalizer {
            finalizer.visit_with(self);
        }
    }

    fn visit_call_expr(&mut self, n: &CallExpr) {
        if self.try_depth == 0 && is_json_parse(&n.callee) {
            self.spans.push(n.span);
        }
        n.visit_children_with(self);
    }

    noop_visit_type!();
}

fn is_json_parse(callee: &Callee) -> bool {
    let Callee::Expr(expr) = callee else {
        return false;
    };
    let Expr::Member(member) = &**expr else {
        return false;
    };
    matches!(&*member.obj, Expr::Ident(obj) if obj.sym.as_ref() == "JSON")
        && member_prop(member).as_deref() == Some("parse")
}
