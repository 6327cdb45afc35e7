//! Pass 5 — box captured parameters.
//!
//! A captured parameter must live on the heap so inner closures share one
//! cell with the enclosing function.  For each parameter `p: T` listed in
//! its function's captured set:
//!
//! 1. the parameter itself is renamed `{p}_raw`, and
//! 2. `var p T; p = p_raw;` is prepended to the body.
//!
//! After this pass `p` names the boxed slot — code generation emits the
//! box allocation for the `var` spec and a store through the box for the
//! prologue assignment — while `{p}_raw` carries the raw argument value.

use crate::ast::{Assign, Expr, Function, Ident, Program, Stmt, VarSpec};

pub fn box_captured_params(program: &mut Program) {
    for f in &mut program.functions {
        fix_function(f);
    }
}

fn fix_function(f: &mut Function) {
    let mut prologue = Vec::new();
    for p in f.params.iter_mut() {
        if !f.varset.captured.iter().any(|c| c == &p.name) {
            continue;
        }
        let boxed = p.name.clone();
        p.name = format!("{boxed}_raw");
        prologue.push(Stmt::VarSpec(VarSpec {
            var: Ident::typed(boxed.clone(), p.ty.clone()),
            init: None,
        }));
        prologue.push(Stmt::Assign(Assign {
            var: Ident::typed(boxed, p.ty.clone()),
            expr: Expr::Ident(Ident::typed(p.name.clone(), p.ty.clone())),
        }));
    }
    if !prologue.is_empty() {
        let old = std::mem::take(&mut f.body);
        prologue.extend(old);
        f.body = prologue;
    }
    for s in &mut f.body {
        fix_stmt(s);
    }
}

fn fix_stmt(stmt: &mut Stmt) {
    match stmt {
        Stmt::VarSpec(vs) => {
            if let Some(init) = &mut vs.init {
                fix_expr(init);
            }
        }
        Stmt::Assign(a) => fix_expr(&mut a.expr),
        Stmt::Return(e) => {
            if let Some(e) = e {
                fix_expr(e);
            }
        }
        Stmt::Expr(e) => fix_expr(e),
        Stmt::Block(b) => {
            for s in &mut b.stmts {
                fix_stmt(s);
            }
        }
    }
}

fn fix_expr(expr: &mut Expr) {
    match expr {
        Expr::Int(_) | Expr::Float(_) | Expr::Ident(_) => {}
        Expr::Unary(u) => fix_expr(&mut u.expr),
        Expr::Binary(b) => {
            fix_expr(&mut b.lhs);
            fix_expr(&mut b.rhs);
        }
        Expr::Call(c) => {
            for a in &mut c.args {
                fix_expr(a);
            }
            fix_expr(&mut c.func);
        }
        Expr::FuncLit(lit) => fix_function(lit),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
