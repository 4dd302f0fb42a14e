//! Declarative pattern rules and the tree scanner that applies them.
//!
//! A rule is data: a matcher over one node shape, a severity and a message
//! template. Adding a rule never touches the scanner. Hits are ordered by
//! source position, then by the rule's position in its catalogue.

use std::borrow::Cow;
use std::collections::HashSet;

use swc_common::{BytePos, Span, Spanned};
use swc_ecma_ast::{
    CallExpr, Callee, DoWhileStmt, Expr, ExprOrSpread, ForStmt, Ident, Lit, MemberExpr,
    MemberProp, NewExpr, OptCall, OptChainBase, Script, Stmt, WhileStmt, WithStmt,
};
use swc_ecma_visit::{Visit, VisitWith, noop_visit_type};

/// Objects through which a global function can also be reached.
const GLOBAL_OBJECTS: &[&str] = &["window", "globalThis", "global", "self"];

#[derive(Debug, Clone, Copy)]
pub enum Matcher {
    /// `name(...)`, also via a global object (`window.name(...)`).
    Call(&'static [&'static str]),
    /// `<any>.name(...)`.
    MethodCall(&'static [&'static str]),
    /// `object.property(...)`.
    MemberCall(&'static [(&'static str, &'static str)]),
    /// `new Name(...)`.
    New(&'static [&'static str]),
    /// `name(...)` whose first argument is a string or template literal.
    CallWithCodeString(&'static [&'static str]),
    /// `import(...)`.
    DynamicImport,
    /// Any `object.<prop>` access on one of these identifiers.
    MemberOf(&'static [&'static str]),
    /// Exactly `object.property`.
    Member(&'static [(&'static str, &'static str)]),
    /// `<any>.name`.
    Property(&'static [&'static str]),
    /// A bare identifier.
    Ident(&'static [&'static str]),
    /// `name` or `<global>.name` used as a value rather than called in place:
    /// aliased, passed along, tested with `typeof`.
    Reference(&'static [&'static str]),
    /// `<any>.constructor.constructor`.
    ConstructorChain,
    /// `.constructor` of a function, arrow or class literal, directly or via
    /// `getPrototypeOf(...)`.
    FunctionConstructor,
    /// A loop with an empty body whose condition reads the clock.
    BusyWait,
    /// A `with (...)` statement.
    WithStatement,
}

#[derive(Debug, Clone, Copy)]
pub struct PatternRule<S> {
    pub code: &'static str,
    pub matcher: Matcher,
    pub severity: S,
    /// `{target}` is replaced with the matched construct.
    pub message: &'static str,
}

impl<S> PatternRule<S> {
    pub fn render(&self, target: &str) -> String {
        self.message.replace("{target}", target)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hit {
    /// Index into the catalogue that was scanned.
    pub rule: usize,
    pub span: Span,
    pub target: String,
}

/// Apply every rule to the whole script.
pub fn scan<S>(rules: &[PatternRule<S>], script: &Script) -> Vec<Hit> {
    let matchers: Vec<Matcher> = rules.iter().map(|r| r.matcher).collect();
    let mut scanner = Scanner {
        matchers: &matchers,
        hits: Vec::new(),
        direct_callees: HashSet::new(),
    };
    script.visit_with(&mut scanner);

    let mut hits = scanner.hits;
    hits.sort_by_key(|h| (h.span.lo(), h.rule));
    hits
}

struct Scanner<'m> {
    matchers: &'m [Matcher],
    hits: Vec<Hit>,
    /// Start of every callee already matched as a call, so `Reference`
    /// rules skip it.
    direct_callees: HashSet<BytePos>,
}

impl Scanner<'_> {
    fn hit(&mut self, rule: usize, span: Span, target: String) {
        self.hits.push(Hit { rule, span, target });
    }

    fn mark_callee(&mut self, callee: &Expr) {
        if let Some(pos) = callee_start(callee) {
            self.direct_callees.insert(pos);
        }
    }

    fn check_call(&mut self, span: Span, callee: Option<&Expr>, args: &[ExprOrSpread]) {
        if let Some(expr) = callee {
            self.mark_callee(expr);
        }
        let first_arg_is_code = args
            .first()
            .map(|a| matches!(&*a.expr, Expr::Lit(Lit::Str(_)) | Expr::Tpl(_)))
            .unwrap_or(false);

        for (i, m) in self.matchers.iter().enumerate() {
            let target = match (m, callee) {
                (Matcher::Call(names), Some(expr)) => global_function(expr)
                    .filter(|(_, name)| names.contains(&name.as_str()))
                    .map(|(path, _)| format!("{}()", path)),
                (Matcher::CallWithCodeString(names), Some(expr)) if first_arg_is_code => {
                    global_function(expr)
                        .filter(|(_, name)| names.contains(&name.as_str()))
                        .map(|(path, _)| format!("{}() with a string argument", path))
                }
                (Matcher::MethodCall(names), Some(expr)) => as_member(expr)
                    .and_then(member_prop)
                    .filter(|prop| names.contains(&prop.as_ref()))
                    .map(|prop| format!(".{}()", prop)),
                (Matcher::MemberCall(pairs), Some(expr)) => as_member(expr)
                    .and_then(|member| member_pair(member, pairs))
                    .map(|(o, p)| format!("{}.{}()", o, p)),
                (Matcher::DynamicImport, None) => Some("import()".to_string()),
                _ => None,
            };
            if let Some(target) = target {
                self.hit(i, span, target);
            }
        }
    }

    fn check_loop(&mut self, span: Span, body: &Stmt, test: Option<&Expr>, keyword: &str) {
        let Some(test) = test else { return };
        if !is_empty_body(body) || !reads_clock(test) {
            return;
        }
        for (i, m) in self.matchers.iter().enumerate() {
            if let Matcher::BusyWait = m {
                self.hit(i, span, format!("{} loop", keyword));
            }
        }
    }
}

impl Visit for Scanner<'_> {
    fn visit_call_expr(&mut self, n: &CallExpr) {
        match &n.callee {
            Callee::Expr(expr) => self.check_call(n.span, Some(&**expr), &n.args),
            Callee::Import(_) => self.check_call(n.span, None, &n.args),
            Callee::Super(_) => {}
        }
        n.visit_children_with(self);
    }

    fn visit_opt_call(&mut self, n: &OptCall) {
        self.check_call(n.span, Some(&*n.callee), &n.args);
        n.visit_children_with(self);
    }

    fn visit_new_expr(&mut self, n: &NewExpr) {
        self.mark_callee(&n.callee);
        if let Some((path, name)) = global_function(&n.callee) {
            for (i, m) in self.matchers.iter().enumerate() {
                if let Matcher::New(names) = m {
                    if names.contains(&name.as_str()) {
                        self.hit(i, n.span, format!("new {}()", path));
                    }
                }
            }
        }
        n.visit_children_with(self);
    }

    fn visit_member_expr(&mut self, n: &MemberExpr) {
        for (i, m) in self.matchers.iter().enumerate() {
            let target = match m {
                Matcher::MemberOf(objects) => global_function(&n.obj)
                    .filter(|(_, name)| objects.contains(&name.as_str()))
                    .map(|(path, _)| match member_prop(n) {
                        Some(prop) => format!("{}.{}", path, prop),
                        None => format!("{}[...]", path),
                    }),
                Matcher::Reference(names) => global_member(n)
                    .filter(|(_, name)| names.contains(&name.as_str()))
                    .filter(|_| !self.direct_callees.contains(&n.span.lo))
                    .map(|(path, _)| path),
                Matcher::Member(pairs) => member_pair(n, pairs).map(|(o, p)| format!("{}.{}", o, p)),
                Matcher::Property(names) => member_prop(n)
                    .filter(|prop| names.contains(&prop.as_ref()))
                    .map(|prop| format!(".{}", prop)),
                Matcher::ConstructorChain => {
                    let outer = member_prop(n).as_deref() == Some("constructor");
                    let inner = matches!(&*n.obj, Expr::Member(inner)
                        if member_prop(inner).as_deref() == Some("constructor"));
                    (outer && inner).then(|| ".constructor.constructor".to_string())
                }
                Matcher::FunctionConstructor => {
                    let on_function = member_prop(n).as_deref() == Some("constructor")
                        && is_function_value(&n.obj);
                    on_function.then(|| "<function>.constructor".to_string())
                }
                _ => None,
            };
            if let Some(target) = target {
                self.hit(i, n.span, target);
            }
        }
        n.visit_children_with(self);
    }

    fn visit_ident(&mut self, n: &Ident) {
        for (i, m) in self.matchers.iter().enumerate() {
            let matched = match m {
                Matcher::Ident(names) => names.contains(&n.sym.as_ref()),
                Matcher::Reference(names) => {
                    names.contains(&n.sym.as_ref()) && !self.direct_callees.contains(&n.span.lo)
                }
                _ => false,
            };
            if matched {
                self.hit(i, n.span, n.sym.to_string());
            }
        }
    }

    fn visit_while_stmt(&mut self, n: &WhileStmt) {
        self.check_loop(n.span, &n.body, Some(&*n.test), "while");
        n.visit_children_with(self);
    }

    fn visit_do_while_stmt(&mut self, n: &DoWhileStmt) {
        self.check_loop(n.span, &n.body, Some(&*n.test), "do-while");
        n.visit_children_with(self);
    }

    fn visit_for_stmt(&mut self, n: &ForStmt) {
        self.check_loop(n.span, &n.body, n.test.as_deref(), "for");
        n.visit_children_with(self);
    }

    fn visit_with_stmt(&mut self, n: &WithStmt) {
        for (i, m) in self.matchers.iter().enumerate() {
            if let Matcher::WithStatement = m {
                self.hit(i, n.span, "with".to_string());
            }
        }
        n.visit_children_with(self);
    }

    noop_visit_type!();
}

/// `name` or `<global>.name`: returns the printed path and the bare name.
///
/// Parentheses, optional chaining and comma sequences (`(0, eval)`) are
/// looked through.
fn global_function(expr: &Expr) -> Option<(String, String)> {
    match expr {
        Expr::Ident(id) => Some((id.sym.to_string(), id.sym.to_string())),
        Expr::Paren(p) => global_function(&p.expr),
        Expr::Seq(seq) => seq.exprs.last().and_then(|last| global_function(last)),
        _ => as_member(expr).and_then(global_member),
    }
}

fn global_member(member: &MemberExpr) -> Option<(String, String)> {
    let Expr::Ident(obj) = &*member.obj else {
        return None;
    };
    if !GLOBAL_OBJECTS.contains(&obj.sym.as_ref()) {
        return None;
    }
    member_prop(member).map(|prop| (format!("{}.{}", obj.sym, prop), prop.to_string()))
}

fn as_member(expr: &Expr) -> Option<&MemberExpr> {
    match expr {
        Expr::Member(member) => Some(member),
        Expr::OptChain(chain) => match &*chain.base {
            OptChainBase::Member(member) => Some(member),
            OptChainBase::Call(_) => None,
        },
        _ => None,
    }
}

/// Where the callee that `global_function` resolves actually starts.
fn callee_start(expr: &Expr) -> Option<BytePos> {
    match expr {
        Expr::Paren(p) => callee_start(&p.expr),
        Expr::Seq(seq) => seq.exprs.last().and_then(|last| callee_start(last)),
        Expr::Ident(_) | Expr::Member(_) | Expr::OptChain(_) => Some(expr.span().lo),
        _ => None,
    }
}

fn is_function_value(expr: &Expr) -> bool {
    match expr {
        Expr::Fn(_) | Expr::Arrow(_) | Expr::Class(_) => true,
        Expr::Paren(p) => is_function_value(&p.expr),
        Expr::Seq(seq) => seq.exprs.last().is_some_and(|last| is_function_value(last)),
        Expr::Call(call) => {
            let Callee::Expr(callee) = &call.callee else {
                return false;
            };
            let reflective = as_member(callee)
                .and_then(member_prop)
                .is_some_and(|prop| prop == "getPrototypeOf");
            reflective && call.args.first().is_some_and(|a| is_function_value(&a.expr))
        }
        _ => false,
    }
}

/// Static property name of a member access, if it has one.
pub(crate) fn member_prop(member: &MemberExpr) -> Option<Cow<'_, str>> {
    match &member.prop {
        MemberProp::Ident(id) => Some(Cow::Borrowed(id.sym.as_ref())),
        MemberProp::Computed(c) => match &*c.expr {
            Expr::Lit(Lit::Str(s)) => Some(s.value.to_string_lossy()),
            _ => None,
        },
        MemberProp::PrivateName(_) => None,
    }
}

fn member_pair(
    member: &MemberExpr,
    pairs: &[(&'static str, &'static str)],
) -> Option<(&'static str, &'static str)> {
    let Expr::Ident(obj) = &*member.obj else {
        return None;
    };
    let prop = member_prop(member)?;
    pairs
        .iter()
        .find(|(o, p)| obj.sym.as_ref() == *o && &*prop == *p)
        .copied()
}

fn is_empty_body(body: &Stmt) -> bool {
    match body {
        Stmt::Empty(_) => true,
        Stmt::Block(block) => block.stmts.is_empty(),
        _ => false,
    }
}

fn reads_clock(expr: &Expr) -> bool {
    let mut finder = ClockReads { found: false };
    expr.visit_with(&mut finder);
    finder.found
}

/// `Date.now()`, `performance.now()` or `new Date()`.
struct ClockReads {
    found: bool,
}

impl Visit for ClockReads {
    fn visit_member_expr(&mut self, n: &MemberExpr) {
        if member_pair(n, &[("Date", "now"), ("performance", "now")]).is_some() {
            self.found = true;
        }
        n.visit_children_with(self);
    }

    fn visit_new_expr(&mut self, n: &NewExpr) {
        if matches!(&*n.callee, Expr::Ident(id) if id.sym.as_ref() == "Date") {
            self.found = true;
        }
        n.visit_children_with(self);
    }

    noop_visit_type!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::{ParseResult, parse_script};

    const RULES: &[PatternRule<()>] = &[
        PatternRule {
            code: "T001",
            matcher: Matcher::Call(&["eval"]),
            severity: (),
            message: "{target} evaluates code",
        },
        PatternRule {
            code: "T002",
            matcher: Matcher::Ident(&["eval"]),
            severity: (),
            message: "{target} referenced",
        },
        PatternRule {
            code: "T003",
            matcher: Matcher::MemberOf(&["process"]),
            severity: (),
            message: "{target} used",
        },
        PatternRule {
            code: "T004",
            matcher: Matcher::BusyWait,
            severity: (),
            message: "{target} spins",
        },
        PatternRule {
            code: "T005",
            matcher: Matcher::Reference(&["eval"]),
            severity: (),
            message: "{target} aliased",
        },
        PatternRule {
            code: "T006",
            matcher: Matcher::FunctionConstructor,
            severity: (),
            message: "{target} reached",
        },
    ];

    fn hits(source: &str) -> Vec<(usize, String)> {
        let parsed = match parse_script(source).unwrap() {
            ParseResult::Script(p) => p,
            ParseResult::SyntaxError(f) => panic!("{}", f),
        };
        scan(RULES, &parsed.script)
            .into_iter()
            .map(|h| (h.rule, h.target))
            .collect()
    }

    #[test]
    fn render_substitutes_target() {
        assert_eq!(RULES[0].render("eval()"), "eval() evaluates code");
    }

    #[test]
    fn same_position_ties_break_by_catalogue_order() {
        // The call and the callee identifier start at the same byte.
        assert_eq!(
            hits("eval(x);"),
            vec![(0, "eval()".to_string()), (1, "eval".to_string())]
        );
    }

    #[test]
    fn hits_are_in_source_order_and_not_deduplicated() {
        assert_eq!(
            hits("process.env.A; eval(x); process.exit(1);"),
            vec![
                (2, "process.env".to_string()),
                (0, "eval()".to_string()),
                (1, "eval".to_string()),
                (2, "process.exit".to_string()),
            ]
        );
    }

    #[test]
    fn call_through_global_object_matches() {
        assert_eq!(hits("window.eval('1');")[0], (0, "window.eval()".to_string()));
    }

    #[test]
    fn busy_wait_needs_empty_body_and_clock() {
        assert_eq!(
            hits("while (Date.now() < end) {}"),
            vec![(3, "while loop".to_string())]
        );
        assert!(hits("while (Date.now() < end) { tick(); }").is_empty());
        assert!(hits("while (i < 10) {}").is_empty());
    }

    #[test]
    fn optional_and_comma_callees_resolve() {
        assert_eq!(hits("eval?.(x);")[0], (0, "eval()".to_string()));
        assert_eq!(hits("(0, eval)(x);")[0], (0, "eval()".to_string()));
        assert_eq!(hits("self?.eval(x);")[0], (0, "self.eval()".to_string()));
    }

    #[test]
    fn reference_skips_the_callee_it_already_matched() {
        let found: Vec<usize> = hits("eval(x); (eval)(y); const e = eval; globalThis.eval;")
            .into_iter()
            .map(|(rule, _)| rule)
            .filter(|rule| *rule != 1)
            .collect();
        assert_eq!(found, vec![0, 0, 4, 4]);
    }

    #[test]
    fn member_of_resolves_through_global_objects() {
        assert_eq!(
            hits("window.process.env; process[key];"),
            vec![
                (2, "window.process.env".to_string()),
                (2, "process[...]".to_string()),
            ]
        );
    }

    #[test]
    fn constructor_of_function_literals_only() {
        assert_eq!(
            hits("(function () {}).constructor; (() => 1).constructor;"),
            vec![
                (5, "<function>.constructor".to_string()),
                (5, "<function>.constructor".to_string()),
            ]
        );
        assert!(hits("[].constructor; value.constructor;").is_empty());
    }
}
