//! Pass 6 — iterative type propagation.
//!
//! Repeatedly traverses the program, filling placeholder-typed positions
//! from whatever is already known: declared parameter types, literal
//! types, the function table, and the variable-type map accumulated in
//! the context.  Each traversal counts the positions still unresolved;
//! the loop ends when the count reaches zero.
//!
//! The count is monotonically non-increasing, so an iteration that fails
//! to shrink it proves the remaining placeholders are irreducible (e.g. a
//! declaration cycle with no concrete type anywhere) and the pass aborts
//! with an unresolved-type diagnostic rather than spinning.
//!
//! Conflicts — a binary expression whose sides disagree, or a variable
//! assigned two incompatible types — abort the compilation.

use crate::ast::{Expr, Function, Ident, Program, Stmt};
use crate::context::Context;
use crate::error::CompileError;

pub fn propagate_types(program: &mut Program, ctx: &mut Context) -> Result<(), CompileError> {
    ctx.var_types.clear();
    let mut prev = usize::MAX;
    loop {
        let mut pass = Infer {
            ctx: &mut *ctx,
            unresolved: 0,
        };
        for f in &mut program.functions {
            pass.function(f)?;
        }
        let unresolved = pass.unresolved;
        if unresolved == 0 {
            return Ok(());
        }
        if unresolved >= prev {
            return Err(CompileError::Unresolved { unresolved });
        }
        prev = unresolved;
    }
}

// ── One traversal ────────────────────────────────────────────────────────────

struct Infer<'a> {
    ctx: &'a mut Context,
    unresolved: usize,
}

impl Infer<'_> {
    fn function(&mut self, f: &mut Function) -> Result<(), CompileError> {
        for p in &f.params {
            self.ctx.add_var_type(&p.name, p.ty.clone())?;
        }
        f.body.iter_mut().try_for_each(|s| self.stmt(s))
    }

    fn stmt(&mut self, stmt: &mut Stmt) -> Result<(), CompileError> {
        match stmt {
            Stmt::VarSpec(vs) => {
                if let Some(init) = &mut vs.init {
                    self.expr(init)?;
                    if let Some(t) = init.valid_ty() {
                        self.ctx.add_var_type(&vs.var.name, t)?;
                    }
                }
                self.ident(&mut vs.var)
            }
            Stmt::Assign(a) => {
                self.expr(&mut a.expr)?;
                if let Some(t) = a.expr.valid_ty() {
                    self.ctx.add_var_type(&a.var.name, t)?;
                }
                self.ident(&mut a.var)
            }
            Stmt::Return(e) => e.as_mut().map_or(Ok(()), |e| self.expr(e)),
            Stmt::Expr(e) => self.expr(e),
            Stmt::Block(b) => b.stmts.iter_mut().try_for_each(|s| self.stmt(s)),
        }
    }

    fn expr(&mut self, expr: &mut Expr) -> Result<(), CompileError> {
        match expr {
            Expr::Int(_) | Expr::Float(_) => Ok(()),
            Expr::Ident(id) => self.ident(id),
            Expr::Unary(u) => {
                self.expr(&mut u.expr)?;
                match u.expr.valid_ty() {
                    Some(t) => u.ty = Some(t),
                    None => self.unresolved += 1,
                }
                Ok(())
            }
            Expr::Binary(b) => {
                self.expr(&mut b.lhs)?;
                self.expr(&mut b.rhs)?;
                match (b.lhs.valid_ty(), b.rhs.valid_ty()) {
                    (Some(lt), Some(rt)) => {
                        if lt != rt {
                            return Err(CompileError::TypeMismatch { lhs: lt, rhs: rt });
                        }
                        b.ty = Some(lt);
                    }
                    _ => self.unresolved += 1,
                }
                Ok(())
            }
            Expr::Call(c) => {
                c.args.iter_mut().try_for_each(|a| self.expr(a))?;
                let Expr::Ident(callee) = &mut c.func else {
                    return Err(CompileError::internal(
                        "call target is not an identifier after flattening",
                    ));
                };
                if let Some(info) = self.ctx.function(&callee.name) {
                    callee.ty = Some(info.ty.clone());
                }
                self.ident(callee)
            }
            Expr::FuncLit(lit) => self.function(lit),
        }
    }

    fn ident(&mut self, id: &mut Ident) -> Result<(), CompileError> {
        if let Some(t) = id.valid_ty().cloned() {
            // Known type: record it (and surface a conflict with any
            // previously stored type).
            self.ctx.add_var_type(&id.name, t)
        } else if let Some(stored) = self.ctx.var_type(&id.name) {
            // Back-patch from the context.
            id.ty = Some(stored.clone());
            Ok(())
        } else if let Some(info) = self.ctx.function(&id.name) {
            // A bare reference to a declared function (e.g. the RHS of
            // `var f func() int = helper;`) types as the function itself.
            id.ty = Some(info.ty.clone());
            Ok(())
        } else {
            self.unresolved += 1;
            Ok(())
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
