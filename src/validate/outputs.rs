//! Output-binding rules (O001–O003).
//!
//! Collects every output name the entry function writes and diffs it against
//! the declared outputs. Any write anywhere in the body counts as "set",
//! including writes inside branches that can never run and inside callbacks.
//! Writes performed by helper functions outside the entry are not seen.

use std::collections::HashSet;

use swc_common::{Span, Spanned};
use swc_ecma_ast::{
    ArrowExpr, AssignExpr, AssignTarget, CallExpr, Callee, Expr, Function, Ident, Lit, MemberExpr,
    MemberProp, ObjectLit, Pat, Prop, PropName, PropOrSpread, ReturnStmt, SimpleAssignTarget,
    UpdateExpr, VarDeclarator,
};
use swc_ecma_visit::{Visit, VisitWith, noop_visit_type};

use crate::config::ValidatorConfig;
use crate::finding::{Finding, Port, Severity};
use crate::parse::ParsedScript;
use crate::validate::entry::{EntryBody, EntryFunction};

#[derive(Debug, Default)]
pub struct OutputWrites {
    /// Every written name with the span of the write, in source order.
    pub names: Vec<(String, Span)>,
    /// A write whose name cannot be known statically (`outputs[k] = v`, spreads).
    pub dynamic: bool,
    /// The result identifier appears somewhere.
    pub result_referenced: bool,
    /// The function returns an object literal directly.
    pub returns_object: bool,
}

impl OutputWrites {
    pub fn sets_any(&self) -> bool {
        !self.names.is_empty() || self.dynamic
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|(n, _)| n == name)
    }
}

/// Collect output writes inside `node`. Returns at nested-function depth do
/// not count as returning from the entry.
pub fn writes_in<'r, N>(node: &N, result: &'r str) -> OutputWrites
where
    N: VisitWith<OutputCollector<'r>> + ?Sized,
{
    let mut collector = OutputCollector {
        result,
        fn_depth: 0,
        writes: OutputWrites::default(),
    };
    node.visit_with(&mut collector);
    collector.writes
}

/// Output writes of a whole entry function, including a concise arrow body
/// that evaluates to an object literal.
pub fn entry_writes(entry: &EntryFunction<'_>, result: &str) -> OutputWrites {
    let mut collector = OutputCollector {
        result,
        fn_depth: 0,
        writes: OutputWrites::default(),
    };
    if let Some(EntryBody::Expr(expr)) = &entry.body {
        if let Some(obj) = object_literal(expr) {
            collector.writes.returns_object = true;
            collector.object_keys(obj);
        }
    }
    entry.visit_body(&mut collector);
    collector.writes
}

pub struct OutputCollector<'r> {
    result: &'r str,
    fn_depth: usize,
    writes: OutputWrites,
}

impl OutputCollector<'_> {
    fn is_result(&self, expr: &Expr) -> bool {
        matches!(expr, Expr::Ident(id) if id.sym.as_ref() == self.result)
    }

    /// `outputs.a = v` and `outputs.a.b.c = v` both set `a`.
    fn member_write(&mut self, target: &MemberExpr) {
        let mut member = target;
        while let Expr::Member(inner) = &*member.obj {
            member = inner;
        }
        if !self.is_result(&member.obj) {
            return;
        }
        match &member.prop {
            MemberProp::Ident(id) => self.writes.names.push((id.sym.to_string(), member.span)),
            MemberProp::Computed(c) => match &*c.expr {
                Expr::Lit(Lit::Str(s)) => self
                    .writes
                    .names
                    .push((s.value.to_string_lossy().into_owned(), member.span)),
                _ => self.writes.dynamic = true,
            },
            MemberProp::PrivateName(_) => {}
        }
    }

    fn object_keys(&mut self, obj: &ObjectLit) {
        for prop in &obj.props {
            match prop {
                PropOrSpread::Spread(_) => self.writes.dynamic = true,
                PropOrSpread::Prop(p) => match prop_key(p) {
                    Some(key) => self.writes.names.push((key, p.span())),
                    None => self.writes.dynamic = true,
                },
            }
        }
    }

    fn assigned_value(&mut self, value: &Expr) {
        match object_literal(value) {
            Some(obj) => self.object_keys(obj),
            None => self.writes.dynamic = true,
        }
    }
}

impl Visit for OutputCollector<'_> {
    fn visit_function(&mut self, n: &Function) {
        self.fn_depth += 1;
        n.visit_children_with(self);
        self.fn_depth -= 1;
    }

    fn visit_arrow_expr(&mut self, n: &ArrowExpr) {
        self.fn_depth += 1;
        n.visit_children_with(self);
        self.fn_depth -= 1;
    }

    fn visit_assign_expr(&mut self, n: &AssignExpr) {
        match &n.left {
            AssignTarget::Simple(SimpleAssignTarget::Member(member)) => self.member_write(member),
            AssignTarget::Simple(SimpleAssignTarget::Ident(id))
                if id.id.sym.as_ref() == self.result =>
            {
                self.assigned_value(&n.right)
            }
            _ => {}
        }
        n.visit_children_with(self);
    }

    fn visit_update_expr(&mut self, n: &UpdateExpr) {
        if let Expr::Member(member) = &*n.arg {
            self.member_write(member);
        }
        n.visit_children_with(self);
    }

    fn visit_var_declarator(&mut self, n: &VarDeclarator) {
        if let (Pat::Ident(binding), Some(init)) = (&n.name, &n.init) {
            if binding.id.sym.as_ref() == self.result {
                self.assigned_value(init);
            }
        }
        n.visit_children_with(self);
    }

    fn visit_call_expr(&mut self, n: &CallExpr) {
        // Object.assign(outputs, { ... })
        if is_object_assign(&n.callee) {
            if let Some(target) = n.args.first() {
                if target.spread.is_none() && self.is_result(&target.expr) {
                    for source in &n.args[1..] {
                        if source.spread.is_some() {
                            self.writes.dynamic = true;
                        } else {
                            self.assigned_value(&source.expr);
                        }
                    }
                }
            }
        }
        n.visit_children_with(self);
    }

    fn visit_return_stmt(&mut self, n: &ReturnStmt) {
        if self.fn_depth == 0 {
            if let Some(obj) = n.arg.as_deref().and_then(object_literal) {
                self.writes.returns_object = true;
                self.object_keys(obj);
            }
        }
        n.visit_children_with(self);
    }

    fn visit_ident(&mut self, n: &Ident) {
        if n.sym.as_ref() == self.result {
            self.writes.result_referenced = true;
        }
    }

    noop_visit_type!();
}

fn object_literal(expr: &Expr) -> Option<&ObjectLit> {
    match expr {
        Expr::Object(obj) => Some(obj),
        Expr::Paren(p) => object_literal(&p.expr),
        _ => None,
    }
}

fn is_object_assign(callee: &Callee) -> bool {
    let Callee::Expr(expr) = callee else {
        return false;
    };
    let Expr::Member(member) = &**expr else {
        return false;
    };
    matches!(&*member.obj, Expr::Ident(obj) if obj.sym.as_ref() == "Object")
        && matches!(&member.prop, MemberProp::Ident(p) if p.sym.as_ref() == "assign")
}

pub(crate) fn prop_key(prop: &Prop) -> Option<String> {
    match prop {
        Prop::Shorthand(id) => Some(id.sym.to_string()),
        Prop::KeyValue(kv) => prop_name(&kv.key),
        Prop::Method(m) => prop_name(&m.key),
        Prop::Getter(g) => prop_name(&g.key),
        Prop::Setter(s) => prop_name(&s.key),
        _ => None,
    }
}

pub(crate) fn prop_name(name: &PropName) -> Option<String> {
    match name {
        PropName::Ident(id) => Some(id.sym.to_string()),
        PropName::Str(s) => Some(s.value.to_string_lossy().into_owned()),
        PropName::Num(n) => Some(n.value.to_string()),
        _ => None,
    }
}

/// Run the output-binding rules against the declared outputs. Returns the
/// collected writes for the best-practice pass.
pub fn check_outputs(
    entry: &EntryFunction<'_>,
    parsed: &ParsedScript,
    declared: &[Port],
    config: &ValidatorConfig,
    findings: &mut Vec<Finding>,
) -> OutputWrites {
    let result = config.result_identifier.as_str();
    let writes = entry_writes(entry, result);

    if !writes.result_referenced && !writes.returns_object && !declared.is_empty() {
        let names: Vec<String> = declared.iter().map(|p| format!("'{}'", p.name)).collect();
        findings.push(Finding::output_mismatch(
            "O003",
            Severity::Error,
            format!(
                "No outputs will ever be returned: '{}' never uses '{}' or returns an object, \
                 so the declared output(s) {} are never set",
                config.entry_function,
                result,
                names.join(", ")
            ),
            None,
        ));
        return writes;
    }

    let declared_names: HashSet<&str> = declared.iter().map(|p| p.name.as_str()).collect();
    let mut reported = HashSet::new();
    for (name, span) in &writes.names {
        if declared_names.contains(name.as_str()) || !reported.insert(name.as_str()) {
            continue;
        }
        findings.push(Finding::output_mismatch(
            "O001",
            Severity::Warning,
            format!("Script sets output '{}' which is not declared", name),
            parsed.locate(*span),
        ));
    }

    if !writes.dynamic {
        for port in declared {
            if !writes.contains(&port.name) {
                findings.push(Finding::output_mismatch(
                    "O002",
                    Severity::Warning,
                    format!("Declared output '{}' is never set", port.name),
                    None,
                ));
            }
        }
    }

    writes
}
