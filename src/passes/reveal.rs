//! Pass 4 — reveal free and captured variables.
//!
//! For every function this pass determines which locally declared names
//! (including parameters) are captured by nested functions, and which
//! identifier references escape the current function and need closure
//! environment slots.
//!
//! On a reference that crosses a function boundary, the name is added to
//! `free` of every intermediate *function* frame and to `captured` of its
//! defining scope — which may be a block.  The same name is typically
//! referenced many times, so both additions are insert-if-absent.
//!
//! Frames own the varsets while the traversal runs and write them back to
//! their AST nodes (and, for functions, into the context's function table)
//! when the scope exits.

use crate::ast::{Expr, Function, Program, ScopeVarset, Stmt};
use crate::context::Context;
use crate::env::ScopedEnv;
use crate::error::CompileError;

pub fn reveal_captures(program: &mut Program, ctx: &mut Context) -> Result<(), CompileError> {
    let mut pass = Reveal {
        env: ScopedEnv::new(),
        ctx,
    };
    for f in &mut program.functions {
        pass.function(f)?;
    }
    Ok(())
}

// ── Scope frame ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScopeKind {
    Function,
    Block,
}

struct RevealFrame {
    /// Name of the function this scope belongs to.
    func_name: String,
    kind: ScopeKind,
    /// Parameters and declared variables of this scope, in order.
    locals: Vec<String>,
    /// The varset being built; written back to the AST node on exit.
    varset: ScopeVarset,
}

impl RevealFrame {
    fn function(func_name: String) -> Self {
        Self {
            func_name,
            kind: ScopeKind::Function,
            locals: Vec::new(),
            varset: ScopeVarset::default(),
        }
    }

    fn block(func_name: String) -> Self {
        Self {
            func_name,
            kind: ScopeKind::Block,
            locals: Vec::new(),
            varset: ScopeVarset::default(),
        }
    }

    fn binds(&self, name: &str) -> bool {
        self.locals.iter().any(|v| v == name)
    }

    /// Uniquify guarantees program-wide unique names, so a duplicate here
    /// is a compiler bug.
    fn bind_local(&mut self, name: &str) -> Result<(), CompileError> {
        if self.binds(name) {
            return Err(CompileError::DuplicateVar(name.to_string()));
        }
        self.locals.push(name.to_string());
        Ok(())
    }
}

// ── Visitor ──────────────────────────────────────────────────────────────────

struct Reveal<'a> {
    env: ScopedEnv<RevealFrame>,
    ctx: &'a mut Context,
}

impl Reveal<'_> {
    fn function(&mut self, f: &mut Function) -> Result<(), CompileError> {
        let name = f.named()?.to_string();
        let mut frame = RevealFrame::function(name.clone());
        for p in &f.params {
            frame.bind_local(&p.name)?;
        }
        self.env.push(frame);
        let res = f.body.iter_mut().try_for_each(|s| self.stmt(s));
        let frame = self.env.pop().expect("function frame pushed above");
        res?;
        self.ctx
            .record_capture_sets(&name, frame.varset.free.clone(), frame.varset.captured.clone());
        f.varset = frame.varset;
        Ok(())
    }

    fn stmt(&mut self, stmt: &mut Stmt) -> Result<(), CompileError> {
        match stmt {
            Stmt::VarSpec(vs) => {
                if let Some(init) = &mut vs.init {
                    self.expr(init)?;
                }
                let top = self.env.expect_top_mut()?;
                top.bind_local(&vs.var.name)?;
                top.varset.add_declared(&vs.var.name)?;
                Ok(())
            }
            Stmt::Assign(a) => {
                self.expr(&mut a.expr)?;
                self.identifier(&a.var.name)
            }
            Stmt::Return(e) => e.as_mut().map_or(Ok(()), |e| self.expr(e)),
            Stmt::Expr(e) => self.expr(e),
            Stmt::Block(b) => {
                let func_name = self
                    .env
                    .top()
                    .map(|f| f.func_name.clone())
                    .ok_or_else(|| CompileError::internal("block outside any function"))?;
                self.env.push(RevealFrame::block(func_name));
                let res = b.stmts.iter_mut().try_for_each(|s| self.stmt(s));
                let frame = self.env.pop().expect("block frame pushed above");
                res?;
                b.varset = frame.varset;
                Ok(())
            }
        }
    }

    fn expr(&mut self, expr: &mut Expr) -> Result<(), CompileError> {
        match expr {
            Expr::Int(_) | Expr::Float(_) => Ok(()),
            Expr::Ident(id) => self.identifier(&id.name),
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

    /// The heart of the pass: classify one identifier reference.
    fn identifier(&mut self, name: &str) -> Result<(), CompileError> {
        // Functions lower to direct C symbols; they are never captured.
        if self.ctx.is_function(name) {
            return Ok(());
        }
        let current_fn = self
            .env
            .top()
            .map(|f| f.func_name.clone())
            .ok_or_else(|| CompileError::internal("identifier outside any scope"))?;

        let Some(def_idx) = self.env.find_index(|f| f.binds(name)) else {
            // Uniquify resolved every reference, so this cannot happen.
            return Err(CompileError::internal(format!(
                "unbound reference `{name}` in capture analysis"
            )));
        };

        let frames = self.env.frames_mut();
        if frames[def_idx].func_name == current_fn {
            return Ok(());
        }

        // The reference crosses at least one function boundary.  Every
        // function between the reference and the defining scope needs an
        // environment slot; the defining scope records the capture.
        for frame in frames[def_idx + 1..].iter_mut() {
            if frame.kind == ScopeKind::Function {
                frame.varset.note_free(name);
            }
        }
        frames[def_idx].varset.note_captured(name);
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
