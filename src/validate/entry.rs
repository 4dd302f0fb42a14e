//! Entry-point rules (E001–E003).
//!
//! The platform calls one reserved top-level function. It may be declared as
//! a function declaration or as a top-level binding to a function/arrow
//! expression.

use swc_common::Span;
use swc_ecma_ast::{BlockStmt, BlockStmtOrExpr, Decl, Expr, Pat, Script, Stmt};
use swc_ecma_visit::{Visit, VisitWith};

use crate::config::ValidatorConfig;
use crate::finding::{Finding, Severity};
use crate::parse::ParsedScript;

pub enum EntryBody<'a> {
    Block(&'a BlockStmt),
    /// Concise arrow body: `(inputs) => ({ ... })`.
    Expr(&'a Expr),
}

pub struct EntryFunction<'a> {
    pub params: Vec<&'a Pat>,
    pub body: Option<EntryBody<'a>>,
    pub span: Span,
}

impl<'a> EntryFunction<'a> {
    pub fn param(&self, index: usize) -> Option<&'a Pat> {
        self.params.get(index).copied()
    }

    /// Run a visitor over the function body only (not the parameter list).
    pub fn visit_body<V: Visit>(&self, visitor: &mut V) {
        match &self.body {
            Some(EntryBody::Block(block)) => block.visit_with(visitor),
            Some(EntryBody::Expr(expr)) => expr.visit_with(visitor),
            None => {}
        }
    }
}

/// All top-level declarations of `name`, in source order.
pub fn find_entry_functions<'a>(script: &'a Script, name: &str) -> Vec<EntryFunction<'a>> {
    let mut found = Vec::new();

    for stmt in &script.body {
        let Stmt::Decl(decl) = stmt else { continue };
        match decl {
            Decl::Fn(f) if f.ident.sym.as_ref() == name => {
                found.push(EntryFunction {
                    params: f.function.params.iter().map(|p| &p.pat).collect(),
                    body: f.function.body.as_ref().map(EntryBody::Block),
                    span: f.function.span,
                });
            }
            Decl::Var(var) => {
                for declarator in &var.decls {
                    let Pat::Ident(binding) = &declarator.name else {
                        continue;
                    };
                    if binding.id.sym.as_ref() != name {
                        continue;
                    }
                    if let Some(entry) = declarator.init.as_deref().and_then(function_expr) {
                        found.push(entry);
                    }
                }
            }
            _ => {}
        }
    }

    found
}

fn function_expr(expr: &Expr) -> Option<EntryFunction<'_>> {
    match expr {
        Expr::Paren(p) => function_expr(&p.expr),
        Expr::Fn(f) => Some(EntryFunction {
            params: f.function.params.iter().map(|p| &p.pat).collect(),
            body: f.function.body.as_ref().map(EntryBody::Block),
            span: f.function.span,
        }),
        Expr::Arrow(a) => Some(EntryFunction {
            params: a.params.iter().collect(),
            body: Some(match &*a.body {
                BlockStmtOrExpr::BlockStmt(block) => EntryBody::Block(block),
                BlockStmtOrExpr::Expr(expr) => EntryBody::Expr(expr),
            }),
            span: a.span,
        }),
        _ => None,
    }
}

/// Run the entry-point rules. Returns the declaration the platform will
/// actually call (the last one), if any.
pub fn check_entry<'a>(
    parsed: &'a ParsedScript,
    config: &ValidatorConfig,
    findings: &mut Vec<Finding>,
) -> Option<EntryFunction<'a>> {
    let name = config.entry_function.as_str();
    let mut declarations = find_entry_functions(&parsed.script, name);

    let Some(entry) = declarations.pop() else {
        findings.push(Finding::missing_function(
            "E001",
            Severity::Error,
            format!(
                "Required function '{}' is not defined at the top level of the script. \
                 Expected: function {}(inputs, properties, llm) {{ ... }}, where `inputs` \
                 is an object carrying the named input values",
                name, name
            ),
            None,
        ));
        return None;
    };

    if !declarations.is_empty() {
        findings.push(Finding::missing_function(
            "E003",
            Severity::Warning,
            format!(
                "Function '{}' is declared {} times at the top level; only the last declaration is used",
                name,
                declarations.len() + 1
            ),
            parsed.locate(entry.span),
        ));
    }

    if entry.params.len() < config.min_entry_params {
        findings.push(Finding::missing_function(
            "E002",
            Severity::Warning,
            format!(
                "Function '{}' declares {} parameter(s), but the platform passes the inputs \
                 object as its first argument. Expected: function {}(inputs, properties, llm)",
                name,
                entry.params.len(),
                name
            ),
            parsed.locate(entry.span),
        ));
    }

    Some(entry)
}
