//! Statement-level control-flow graph of the entry body.
//!
//! Used to answer one question: can the function finish normally without
//! passing a statement that sets an output? Throws are not exits. Loop
//! bodies may run zero times. A `catch` block is entered as if nothing in
//! its `try` block ran. A `return` leaves through every enclosing `finally`.

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::{Bfs, NodeFiltered};
use swc_ecma_ast::{BlockStmt, Decl, ForHead, Stmt, VarDeclOrExpr};
use swc_ecma_visit::VisitWith;

use crate::validate::entry::{EntryBody, EntryFunction};
use crate::validate::outputs::{OutputCollector, entry_writes, writes_in};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowNode {
    Entry,
    Exit,
    Step { sets_output: bool },
}

pub struct FlowGraph {
    pub graph: DiGraph<FlowNode, ()>,
    pub entry: NodeIndex,
    pub exit: NodeIndex,
}

impl FlowGraph {
    pub fn build(entry: &EntryFunction<'_>, result: &str) -> Self {
        let mut graph = DiGraph::new();
        let start = graph.add_node(FlowNode::Entry);
        let exit = graph.add_node(FlowNode::Exit);

        let mut builder = Builder {
            graph,
            exit,
            result,
            frames: Vec::new(),
            finalizers: Vec::new(),
            pending_label: None,
        };

        let tail = match &entry.body {
            Some(EntryBody::Block(block)) => builder.stmts(&block.stmts, vec![start]),
            Some(EntryBody::Expr(_)) => {
                let sets = entry_writes(entry, result).sets_any();
                vec![builder.step(sets, &[start])]
            }
            None => vec![start],
        };
        for node in tail {
            builder.graph.add_edge(node, exit, ());
        }

        FlowGraph {
            graph: builder.graph,
            entry: start,
            exit,
        }
    }

    /// True when the exit is reachable without crossing an output-setting step.
    pub fn has_path_without_output(&self) -> bool {
        let graph = &self.graph;
        let unset = NodeFiltered::from_fn(graph, |n: NodeIndex| {
            !matches!(graph[n], FlowNode::Step { sets_output: true })
        });
        let mut bfs = Bfs::new(&unset, self.entry);
        while let Some(node) = bfs.next(&unset) {
            if node == self.exit {
                return true;
            }
        }
        false
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum FrameKind {
    Loop,
    Switch,
    Label,
}

struct Frame {
    kind: FrameKind,
    label: Option<String>,
    breaks: Vec<NodeIndex>,
    continues: Vec<NodeIndex>,
}

struct Builder<'a, 'r> {
    graph: DiGraph<FlowNode, ()>,
    exit: NodeIndex,
    result: &'r str,
    frames: Vec<Frame>,
    /// `finally` blocks enclosing the statement being built, innermost last.
    finalizers: Vec<&'a BlockStmt>,
    /// Label of a labeled statement whose body is the loop about to be built.
    pending_label: Option<String>,
}

impl<'a, 'r> Builder<'a, 'r> {
    fn sets<N>(&self, node: &N) -> bool
    where
        N: VisitWith<OutputCollector<'r>> + ?Sized,
    {
        writes_in(node, self.result).sets_any()
    }

    fn step(&mut self, sets_output: bool, preds: &[NodeIndex]) -> NodeIndex {
        let node = self.graph.add_node(FlowNode::Step { sets_output });
        for &p in preds {
            self.graph.add_edge(p, node, ());
        }
        node
    }

    fn stmts(&mut self, stmts: &'a [Stmt], mut preds: Vec<NodeIndex>) -> Vec<NodeIndex> {
        for stmt in stmts {
            preds = self.stmt(stmt, preds);
        }
        preds
    }

    fn framed(
        &mut self,
        kind: FrameKind,
        label: Option<String>,
        build: impl FnOnce(&mut Self) -> Vec<NodeIndex>,
    ) -> (Vec<NodeIndex>, Frame) {
        self.frames.push(Frame {
            kind,
            label,
            breaks: Vec::new(),
            continues: Vec::new(),
        });
        let out = build(self);
        // Every push above is matched by this pop.
        let frame = self.frames.pop().unwrap_or_else(|| Frame {
            kind,
            label: None,
            breaks: Vec::new(),
            continues: Vec::new(),
        });
        (out, frame)
    }

    /// Connect `tail` to the exit, running every enclosing `finally` first.
    fn leave(&mut self, mut tail: Vec<NodeIndex>) {
        let enclosing = self.finalizers.clone();
        for (depth, fin) in enclosing.iter().copied().enumerate().rev() {
            let outer = std::mem::replace(&mut self.finalizers, enclosing[..depth].to_vec());
            tail = self.stmts(&fin.stmts, tail);
            self.finalizers = outer;
        }
        for node in tail {
            self.graph.add_edge(node, self.exit, ());
        }
    }

    fn stmt(&mut self, stmt: &'a Stmt, preds: Vec<NodeIndex>) -> Vec<NodeIndex> {
        match stmt {
            Stmt::Block(block) => self.stmts(&block.stmts, preds),
            Stmt::Empty(_) | Stmt::Debugger(_) => preds,
            // Hoisted declarations do not execute where they appear.
            Stmt::Decl(Decl::Fn(_)) => preds,

            Stmt::Return(ret) => {
                let sets = self.sets(ret);
                let node = self.step(sets, &preds);
                self.leave(vec![node]);
                Vec::new()
            }
            Stmt::Throw(throw) => {
                let sets = self.sets(throw);
                self.step(sets, &preds);
                Vec::new()
            }

            Stmt::If(s) => {
                let sets = self.sets(&*s.test);
                let test = self.step(sets, &preds);
                let mut out = self.stmt(&s.cons, vec![test]);
                match &s.alt {
                    Some(alt) => out.extend(self.stmt(alt, vec![test])),
                    None => out.push(test),
                }
                out
            }

            Stmt::While(s) => {
                let sets = self.sets(&*s.test);
                let head = self.step(sets, &preds);
                self.loop_body(head, &s.body)
            }
            Stmt::For(s) => {
                let sets = s.init.as_ref().is_some_and(|i| match i {
                    VarDeclOrExpr::VarDecl(v) => self.sets(&**v),
                    VarDeclOrExpr::Expr(e) => self.sets(&**e),
                }) || s.test.as_deref().is_some_and(|e| self.sets(e))
                    || s.update.as_deref().is_some_and(|e| self.sets(e));
                let head = self.step(sets, &preds);
                self.loop_body(head, &s.body)
            }
            Stmt::ForIn(s) => {
                let sets = self.sets(&*s.right) || self.for_head_sets(&s.left);
                let head = self.step(sets, &preds);
                self.loop_body(head, &s.body)
            }
            Stmt::ForOf(s) => {
                let sets = self.sets(&*s.right) || self.for_head_sets(&s.left);
                let head = self.step(sets, &preds);
                self.loop_body(head, &s.body)
            }
            Stmt::DoWhile(s) => {
                let label = self.pending_label.take();
                let (body_out, frame) =
                    self.framed(FrameKind::Loop, label, |b| b.stmt(&s.body, preds));
                let mut into_test = body_out;
                into_test.extend(frame.continues);
                let sets = self.sets(&*s.test);
                let test = self.step(sets, &into_test);
                let mut out = vec![test];
                out.extend(frame.breaks);
                out
            }

            Stmt::Switch(s) => {
                let sets = self.sets(&*s.discriminant);
                let disc = self.step(sets, &preds);
                let has_default = s.cases.iter().any(|c| c.test.is_none());
                let (fall, frame) = self.framed(FrameKind::Switch, None, |b| {
                    let mut fall: Vec<NodeIndex> = Vec::new();
                    for case in &s.cases {
                        let mut entry = fall;
                        entry.push(disc);
                        fall = b.stmts(&case.cons, entry);
                    }
                    fall
                });
                let mut out = fall;
                out.extend(frame.breaks);
                if !has_default {
                    out.push(disc);
                }
                out
            }

            Stmt::Try(s) => {
                if let Some(fin) = &s.finalizer {
                    self.finalizers.push(fin);
                }
                let mut out = self.stmts(&s.block.stmts, preds.clone());
                if let Some(handler) = &s.handler {
                    out.extend(self.stmts(&handler.body.stmts, preds));
                }
                match &s.finalizer {
                    Some(fin) => {
                        self.finalizers.pop();
                        self.stmts(&fin.stmts, out)
                    }
                    None => out,
                }
            }

            Stmt::Labeled(s) => {
                let label = s.label.sym.to_string();
                if is_loop(&s.body) {
                    self.pending_label = Some(label);
                    return self.stmt(&s.body, preds);
                }
                let (mut out, frame) =
                    self.framed(FrameKind::Label, Some(label), |b| b.stmt(&s.body, preds));
                out.extend(frame.breaks);
                out
            }

            Stmt::Break(b) => {
                let target = match &b.label {
                    Some(label) => self
                        .frames
                        .iter_mut()
                        .rev()
                        .find(|f| f.label.as_deref() == Some(label.sym.as_ref())),
                    None => self.frames.iter_mut().rev().find(|f| f.kind != FrameKind::Label),
                };
                if let Some(frame) = target {
                    frame.breaks.extend(preds);
                }
                Vec::new()
            }
            Stmt::Continue(c) => {
                let target = self.frames.iter_mut().rev().find(|f| {
                    f.kind == FrameKind::Loop
                        && c.label
                            .as_ref()
                            .is_none_or(|label| f.label.as_deref() == Some(label.sym.as_ref()))
                });
                if let Some(frame) = target {
                    frame.continues.extend(preds);
                }
                Vec::new()
            }

            other => {
                let sets = self.sets(other);
                vec![self.step(sets, &preds)]
            }
        }
    }

    /// Body runs zero or more times; the loop is left through its head or a
    /// `break`.
    fn loop_body(&mut self, head: NodeIndex, body: &'a Stmt) -> Vec<NodeIndex> {
        let label = self.pending_label.take();
        let (body_out, frame) = self.framed(FrameKind::Loop, label, |b| b.stmt(body, vec![head]));
        for node in body_out.into_iter().chain(frame.continues) {
            self.graph.add_edge(node, head, ());
        }
        let mut out = vec![head];
        out.extend(frame.breaks);
        out
    }

    fn for_head_sets(&self, head: &ForHead) -> bool {
        match head {
            ForHead::VarDecl(v) => self.sets(&**v),
            ForHead::Pat(p) => self.sets(&**p),
            ForHead::UsingDecl(_) => false,
        }
    }
}

fn is_loop(stmt: &Stmt) -> bool {
    matches!(
        stmt,
        Stmt::While(_) | Stmt::DoWhile(_) | Stmt::For(_) | Stmt::ForIn(_) | Stmt::ForOf(_)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::{ParseResult, parse_script};
    use crate::validate::entry::find_entry_functions;

    fn unset_path(source: &str) -> bool {
        let parsed = match parse_script(source).unwrap() {
            ParseResult::Script(p) => p,
            ParseResult::SyntaxError(f) => panic!("{}", f),
        };
        let entry = find_entry_functions(&parsed.script, "processData")
            .pop()
            .expect("entry function");
        FlowGraph::build(&entry, "outputs").has_path_without_output()
    }

    #[test]
    fn straight_line_write_covers_every_path() {
        assert!(!unset_path("function processData(inputs) { outputs.a = 1; return outputs; }"));
    }

    #[test]
    fn write_in_one_branch_leaves_a_gap() {
        assert!(unset_path(
            "function processData(inputs) { if (inputs.x) { outputs.a = 1; } return outputs; }"
        ));
    }

    #[test]
    fn both_branches_writing_covers_every_path() {
        assert!(!unset_path(
            "function processData(inputs) { if (inputs.x) { outputs.a = 1; } else { outputs.a = 2; } }"
        ));
    }

    #[test]
    fn early_return_without_write() {
        assert!(unset_path(
            "function processData(inputs) { if (!inputs.x) return; outputs.a = 1; }"
        ));
        assert!(!unset_path(
            "function processData(inputs) { if (!inputs.x) return { a: 0 }; return { a: 1 }; }"
        ));
    }

    #[test]
    fn throw_is_not_an_exit() {
        assert!(!unset_path(
            "function processData(inputs) { if (!inputs.x) throw new Error('x'); outputs.a = 1; }"
        ));
    }

    #[test]
    fn loop_body_may_not_run() {
        assert!(unset_path(
            "function processData(inputs) { for (const v of inputs.list) { outputs.a = v; } }"
        ));
    }

    #[test]
    fn switch_without_default_has_a_gap() {
        assert!(unset_path(
            "function processData(inputs) { switch (inputs.k) { case 1: outputs.a = 1; break; } }"
        ));
        assert!(!unset_path(
            "function processData(inputs) { switch (inputs.k) { case 1: outputs.a = 1; break; default: outputs.a = 0; } }"
        ));
    }

    #[test]
    fn catch_without_write_has_a_gap() {
        assert!(unset_path(
            "function processData(inputs) { try { outputs.a = JSON.parse(inputs.s); } catch (e) { console.log(e); } }"
        ));
        assert!(!unset_path(
            "function processData(inputs) { try { outputs.a = JSON.parse(inputs.s); } catch (e) { outputs.a = null; } }"
        ));
    }

    #[test]
    fn concise_arrow_object_body_sets_outputs() {
        assert!(!unset_path("const processData = (inputs) => ({ a: 1 });"));
    }

    #[test]
    fn labeled_break_leaves_the_labeled_statement() {
        // `break done` skips the write after the loop.
        assert!(unset_path(
            "function processData(inputs) { done: { for (;;) { if (inputs.x) break done; outputs.a = 1; break; } outputs.b = 2; } }"
        ));
        assert!(!unset_path(
            "function processData(inputs) { done: { for (;;) { if (inputs.x) break; outputs.a = 1; break; } outputs.b = 2; } }"
        ));
    }

    #[test]
    fn labeled_continue_targets_the_outer_loop() {
        // `continue outer` skips the write that follows the inner loop.
        assert!(unset_path(
            "function processData(inputs) { outer: do { for (const v of inputs.list) { continue outer; } outputs.a = 1; } while (inputs.again); }"
        ));
        assert!(!unset_path(
            "function processData(inputs) { outer: do { for (const v of inputs.list) { continue; } outputs.a = 1; } while (inputs.again); }"
        ));
    }

    #[test]
    fn return_runs_the_finally_block() {
        assert!(!unset_path(
            "function processData(inputs) { try { if (inputs.x) return; outputs.a = 1; } finally { outputs.done = true; } }"
        ));
        assert!(unset_path(
            "function processData(inputs) { try { if (inputs.x) return; outputs.a = 1; } catch (e) { outputs.a = 0; } }"
        ));
    }

    #[test]
    fn return_inside_nested_finally_blocks_runs_each() {
        assert!(!unset_path(
            "function processData(inputs) { try { try { return; } finally { log(); } } finally { outputs.done = 1; } }"
        ));
    }
}
