//! Variable hoisting.
//!
//! Peacock branches and loops do not open a scope, but JavaScript blocks do.
//! Names that are reassigned, or bound inside a branch or loop, are therefore
//! declared once with `let` at the top of the enclosing function (or program)
//! and assigned without a declaration keyword afterwards.

use rustc_hash::FxHashSet;

use crate::ast::{Expr, ExprKind};

/// Names bound by the scopes around the one being hoisted.
#[derive(Debug, Clone, Default)]
pub struct Enclosing {
    /// Bound by any outer scope. `=` assigns to these.
    pub all: FxHashSet<String>,
    /// Bound by outer scopes of the same function. `:=` reuses these, and
    /// declares a fresh local for anything else.
    pub function: FxHashSet<String>,
}

/// Names in `body` that need a `let` at the top of the scope.
pub fn hoist(body: &[Expr], params: &[String]) -> Vec<String> {
    hoist_in_scope(body, params, &Enclosing::default())
}

/// Like [`hoist`], also skipping names an enclosing scope already declared,
/// so closures assign to the outer binding.
pub fn hoist_in_scope(body: &[Expr], params: &[String], enclosing: &Enclosing) -> Vec<String> {
    let mut collector = Collector::default();
    collector.scan(body, false);

    let Collector {
        names,
        declared,
        bound,
        ..
    } = collector;
    names
        .into_iter()
        .filter(|name| {
            let outer = if bound.contains(name) {
                &enclosing.function
            } else {
                &enclosing.all
            };
            !params.contains(name) && !outer.contains(name) && !declared.contains(name)
        })
        .collect()
}

/// `body` with a `Declare` of its hoisted names in front. Applying it to its
/// own output changes nothing.
pub fn hoist_block(body: &[Expr], params: &[String]) -> Vec<Expr> {
    hoist_block_in_scope(body, params, &Enclosing::default())
}

pub fn hoist_block_in_scope(body: &[Expr], params: &[String], enclosing: &Enclosing) -> Vec<Expr> {
    let names = hoist_in_scope(body, params, enclosing);
    if names.is_empty() {
        return body.to_vec();
    }
    let span = body.first().map(|e| e.span).unwrap_or_default();
    let mut out = Vec::with_capacity(body.len() + 1);
    out.push(Expr::new(ExprKind::Declare(names), span));
    out.extend_from_slice(body);
    out
}

#[derive(Default)]
struct Collector {
    /// Hoisted names in first-seen order.
    names: Vec<String>,
    seen: FxHashSet<String>,
    /// `Assign` targets seen at the top level of the scope.
    top_level: FxHashSet<String>,
    /// Names already covered by a `Declare`.
    declared: FxHashSet<String>,
    /// Every `Assign` target in the scope.
    bound: FxHashSet<String>,
}

impl Collector {
    fn push(&mut self, name: &str) {
        if self.seen.insert(name.to_string()) {
            self.names.push(name.to_string());
        }
    }

    fn scan(&mut self, body: &[Expr], nested: bool) {
        for expr in body {
            self.visit(expr, nested);
        }
    }

    fn visit(&mut self, expr: &Expr, nested: bool) {
        match &expr.kind {
            ExprKind::Declare(names) => self.declared.extend(names.iter().cloned()),
            ExprKind::SimpleAssignment(assign) => self.push(&assign.name),
            ExprKind::Assign(assign) => {
                self.bound.insert(assign.name.clone());
                if nested || !self.top_level.insert(assign.name.clone()) {
                    self.push(&assign.name);
                }
            }
            ExprKind::Seq(items) => self.scan(items, nested),
            ExprKind::If(node) | ExprKind::ElseIf(node) => {
                self.scan(&node.pass, true);
                if let Some(fail) = &node.fail {
                    self.visit(fail, true);
                }
            }
            ExprKind::Else(body) | ExprKind::CaseElse(body) => self.scan(body, true),
            ExprKind::EmptyCaseExpr(clauses) => self.scan(clauses, true),
            ExprKind::SimpleWhen(when) => self.scan(&when.body, true),
            ExprKind::CaseExpr(case) => {
                for clause in &case.clauses {
                    self.scan(&clause.body, true);
                }
                if let Some(fallback) = &case.fallback {
                    self.scan(fallback, true);
                }
            }
            ExprKind::While(node) => self.scan(&node.body, true),
            ExprKind::SimpleForOfLoop(node) | ExprKind::SimpleForInLoop(node) => {
                self.scan(&node.body, true);
            }
            ExprKind::ForOfObjDeconstructLoop(node) => self.scan(&node.body, true),
            _ => {}
        }
    }
}
