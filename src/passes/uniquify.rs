//! Pass 3 — uniquify variable names.
//!
//! Every variable (declaration, parameter, reference) is renamed so that no
//! two bindings in the program share a name.  A shared per-source-name
//! counter mints the fresh names: the first occurrence of a name keeps the
//! bare name, the n-th becomes `{name}_uniq{n}`.  Keeping the first
//! occurrence bare makes the pass idempotent — a second run finds every
//! name at occurrence zero and changes nothing.
//!
//! Function names are preinstalled as identity mappings in the root frame
//! and pass through unchanged; they are reserved.
//!
//! Re-declaring a name in the same scope shadows the earlier binding (the
//! flatten pass legitimately mints the same temporary name twice in one
//! scope, e.g. two `x_rhs` lifts for two assignments to `x`).
//!
//! On an assignment the RHS is visited before the LHS: the LHS refers to
//! an already-declared variable and must not pick up a fresh suffix.

use crate::ast::{Expr, Function, Program, Stmt};
use crate::context::Context;
use crate::env::ScopedEnv;
use crate::error::CompileError;
use std::collections::HashMap;

pub fn uniquify(program: &mut Program, ctx: &Context) -> Result<(), CompileError> {
    let mut root = RenameFrame::default();
    for name in ctx.functions.keys() {
        root.map.insert(name.clone(), name.clone());
    }
    let mut pass = Uniquify {
        env: ScopedEnv::with_root(root),
        counts: HashMap::new(),
    };
    for f in &mut program.functions {
        pass.function(f)?;
    }
    Ok(())
}

// ── Rename frame ─────────────────────────────────────────────────────────────

#[derive(Default)]
struct RenameFrame {
    /// Source name → unique name, for bindings introduced in this scope.
    map: HashMap<String, String>,
}

// ── Visitor ──────────────────────────────────────────────────────────────────

struct Uniquify {
    env: ScopedEnv<RenameFrame>,
    /// Shared counter table keyed by source name.
    counts: HashMap<String, u32>,
}

impl Uniquify {
    /// Bind `name` in the top frame to a fresh unique name and return it.
    fn declare(&mut self, name: &str) -> Result<String, CompileError> {
        let count = self.counts.entry(name.to_string()).or_insert(0);
        let unique = if *count == 0 {
            name.to_string()
        } else {
            format!("{name}_uniq{count}")
        };
        *count += 1;
        self.env
            .expect_top_mut()?
            .map
            .insert(name.to_string(), unique.clone());
        Ok(unique)
    }

    /// Nearest enclosing binding for `name`.
    fn resolve(&self, name: &str) -> Result<String, CompileError> {
        for frame in self.env.frames().iter().rev() {
            if let Some(unique) = frame.map.get(name) {
                return Ok(unique.clone());
            }
        }
        Err(CompileError::Unbound(name.to_string()))
    }

    fn function(&mut self, f: &mut Function) -> Result<(), CompileError> {
        self.env.push(RenameFrame::default());
        let res = self.function_inner(f);
        self.env.pop();
        res
    }

    fn function_inner(&mut self, f: &mut Function) -> Result<(), CompileError> {
        for p in &mut f.params {
            p.name = self.declare(&p.name)?;
        }
        f.body.iter_mut().try_for_each(|s| self.stmt(s))
    }

    fn stmt(&mut self, stmt: &mut Stmt) -> Result<(), CompileError> {
        match stmt {
            Stmt::VarSpec(vs) => {
                if let Some(init) = &mut vs.init {
                    self.expr(init)?;
                }
                vs.var.name = self.declare(&vs.var.name)?;
                Ok(())
            }
            Stmt::Assign(a) => {
                self.expr(&mut a.expr)?;
                a.var.name = self.resolve(&a.var.name)?;
                Ok(())
            }
            Stmt::Return(e) => e.as_mut().map_or(Ok(()), |e| self.expr(e)),
            Stmt::Expr(e) => self.expr(e),
            Stmt::Block(b) => {
                self.env.push(RenameFrame::default());
                let res = b.stmts.iter_mut().try_for_each(|s| self.stmt(s));
                self.env.pop();
                res
            }
        }
    }

    fn expr(&mut self, expr: &mut Expr) -> Result<(), CompileError> {
        match expr {
            Expr::Int(_) | Expr::Float(_) => Ok(()),
            Expr::Ident(id) => {
                id.name = self.resolve(&id.name)?;
                Ok(())
            }
            Expr::Unary(u) => self.expr(&mut u.expr),
            Expr::Binary(b) => {
                self.expr(&mut b.lhs)?;
                self.expr(&mut b.rhs)
            }
            Expr::Call(c) => {
                c.args.iter_mut().try_for_each(|a| self.expr(a))?;
                self.expr(&mut c.func)
            }
            Expr::FuncLit(lit) => self.function(lit),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
