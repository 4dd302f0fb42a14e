//! How the entry function uses one of its positional parameters.

use swc_common::{Span, Spanned};
use swc_ecma_ast::{
    ArrowExpr, BlockStmt, BlockStmtOrExpr, CatchClause, Decl, Expr, ForHead, ForInStmt, ForOfStmt,
    ForStmt, Function, Ident, MemberExpr, MemberProp, ObjectPatProp, Pat, Stmt, VarDeclKind,
    VarDeclOrExpr, VarDeclarator,
};
use swc_ecma_visit::{Visit, VisitWith, noop_visit_type};

use crate::validate::catalogue::member_prop;
use crate::validate::entry::EntryFunction;
use crate::validate::outputs::prop_name;

#[derive(Debug, Default)]
pub struct ParamUsage {
    /// Statically known keys read from the parameter, in source order.
    pub keys: Vec<(String, Span)>,
    /// The parameter is used in a way that may read any key.
    pub escapes: bool,
    /// First place the parameter is used at all.
    pub first_use: Option<Span>,
}

impl ParamUsage {
    pub fn reads(&self, key: &str) -> bool {
        self.keys.iter().any(|(k, _)| k == key)
    }

    fn touch(&mut self, span: Span) {
        if self.first_use.is_none() {
            self.first_use = Some(span);
        }
    }

    fn object_pattern(&mut self, pat: &Pat) {
        let Pat::Object(obj) = pat else {
            self.escapes = true;
            return;
        };
        for prop in &obj.props {
            match prop {
                ObjectPatProp::KeyValue(kv) => match prop_name(&kv.key) {
                    Some(key) => self.keys.push((key, kv.key.span())),
                    None => self.escapes = true,
                },
                ObjectPatProp::Assign(assign) => {
                    self.keys.push((assign.key.sym.to_string(), assign.key.span))
                }
                ObjectPatProp::Rest(_) => self.escapes = true,
            }
        }
    }
}

/// Usage of parameter `index`, or `None` when the entry declares no such
/// parameter.
pub fn param_usage(entry: &EntryFunction<'_>, index: usize) -> Option<ParamUsage> {
    let mut pat = entry.param(index)?;
    if let Pat::Assign(assign) = pat {
        pat = &*assign.left;
    }

    match pat {
        Pat::Ident(binding) => {
            let mut collector = ParamCollector {
                name: binding.id.sym.as_ref(),
                usage: ParamUsage::default(),
                blocks: 0,
            };
            entry.visit_body(&mut collector);
            Some(collector.usage)
        }
        Pat::Object(_) => {
            let mut usage = ParamUsage::default();
            usage.object_pattern(pat);
            usage.touch(pat.span());
            Some(usage)
        }
        _ => Some(ParamUsage {
            escapes: true,
            first_use: Some(pat.span()),
            ..ParamUsage::default()
        }),
    }
}

/// Scopes that rebind the parameter's name are skipped entirely.
struct ParamCollector<'n> {
    name: &'n str,
    usage: ParamUsage,
    /// Blocks entered so far; the entry body itself is block zero.
    blocks: usize,
}

impl ParamCollector<'_> {
    fn is_param(&self, expr: &Expr) -> bool {
        matches!(expr, Expr::Ident(id) if id.sym.as_ref() == self.name)
    }
}

impl Visit for ParamCollector<'_> {
    fn visit_member_expr(&mut self, n: &MemberExpr) {
        if !self.is_param(&n.obj) {
            n.visit_children_with(self);
            return;
        }
        self.usage.touch(n.span);
        match member_prop(n) {
            Some(key) => self.usage.keys.push((key.into_owned(), n.span)),
            None => self.usage.escapes = true,
        }
        if let MemberProp::Computed(c) = &n.prop {
            c.visit_with(self);
        }
    }

    fn visit_var_declarator(&mut self, n: &VarDeclarator) {
        // const { a, b } = inputs;
        match &n.init {
            Some(init) if self.is_param(init) => {
                self.usage.touch(init.span());
                self.usage.object_pattern(&n.name);
                n.name.visit_with(self);
            }
            _ => n.visit_children_with(self),
        }
    }

    fn visit_ident(&mut self, n: &Ident) {
        if n.sym.as_ref() == self.name {
            self.usage.touch(n.span);
            self.usage.escapes = true;
        }
    }

    fn visit_function(&mut self, n: &Function) {
        let rebinds = n.params.iter().any(|p| binds(&p.pat, self.name))
            || n.body
                .as_ref()
                .is_some_and(|body| declares(&body.stmts, self.name, false));
        if !rebinds {
            n.visit_children_with(self);
        }
    }

    fn visit_arrow_expr(&mut self, n: &ArrowExpr) {
        if n.params.iter().any(|p| binds(p, self.name)) {
            return;
        }
        if let BlockStmtOrExpr::BlockStmt(body) = &*n.body {
            if declares(&body.stmts, self.name, false) {
                return;
            }
        }
        n.visit_children_with(self);
    }

    fn visit_block_stmt(&mut self, n: &BlockStmt) {
        if self.blocks > 0 && declares(&n.stmts, self.name, true) {
            return;
        }
        self.blocks += 1;
        n.visit_children_with(self);
        self.blocks -= 1;
    }

    fn visit_catch_clause(&mut self, n: &CatchClause) {
        if !n.param.as_ref().is_some_and(|p| binds(p, self.name)) {
            n.visit_children_with(self);
        }
    }

    fn visit_for_stmt(&mut self, n: &ForStmt) {
        if let Some(VarDeclOrExpr::VarDecl(decl)) = &n.init {
            if decl.kind != VarDeclKind::Var && decl.decls.iter().any(|d| binds(&d.name, self.name)) {
                return;
            }
        }
        n.visit_children_with(self);
    }

    fn visit_for_of_stmt(&mut self, n: &ForOfStmt) {
        if !head_rebinds(&n.left, self.name) {
            n.visit_children_with(self);
        }
    }

    fn visit_for_in_stmt(&mut self, n: &ForInStmt) {
        if !head_rebinds(&n.left, self.name) {
            n.visit_children_with(self);
        }
    }

    noop_visit_type!();
}

/// Whether a binding pattern introduces `name`.
fn binds(pat: &Pat, name: &str) -> bool {
    match pat {
        Pat::Ident(binding) => binding.id.sym.as_ref() == name,
        Pat::Array(array) => array.elems.iter().flatten().any(|p| binds(p, name)),
        Pat::Object(obj) => obj.props.iter().any(|prop| match prop {
            ObjectPatProp::KeyValue(kv) => binds(&kv.value, name),
            ObjectPatProp::Assign(assign) => assign.key.sym.as_ref() == name,
            ObjectPatProp::Rest(rest) => binds(&rest.arg, name),
        }),
        Pat::Assign(assign) => binds(&assign.left, name),
        Pat::Rest(rest) => binds(&rest.arg, name),
        Pat::Expr(_) | Pat::Invalid(_) => false,
    }
}

/// Whether `stmts` declare `name` directly. `var` is only considered when
/// `lexical_only` is false.
fn declares(stmts: &[Stmt], name: &str, lexical_only: bool) -> bool {
    stmts.iter().any(|stmt| match stmt {
        Stmt::Decl(Decl::Var(var)) => {
            (!lexical_only || var.kind != VarDeclKind::Var)
                && var.decls.iter().any(|d| binds(&d.name, name))
        }
        Stmt::Decl(Decl::Fn(f)) => f.ident.sym.as_ref() == name,
        Stmt::Decl(Decl::Class(c)) => c.ident.sym.as_ref() == name,
        _ => false,
    })
}

fn head_rebinds(head: &ForHead, name: &str) -> bool {
    match head {
        ForHead::VarDecl(decl) => {
            decl.kind != VarDeclKind::Var && decl.decls.iter().any(|d| binds(&d.name, name))
        }
        _ => false,
    }
}
