//! Pass 1 — name anonymous function literals.
//!
//! After this pass every callable has a program-unique name usable as a C
//! identifier, and the compilation context's function table maps every such
//! name to its kind and type.  Literals are named `{enclosing}_c{n}` with a
//! per-function counter; declarations keep their source names untouched.
//!
//! Literals that already carry a name are left alone, so running the pass
//! twice is a no-op.

use crate::ast::{Expr, Function, Program, Stmt};
use crate::context::{Context, FuncKind};
use crate::env::ScopedEnv;
use crate::error::CompileError;

pub fn assign_literal_names(
    program: &mut Program,
    ctx: &mut Context,
) -> Result<(), CompileError> {
    let mut pass = NameLits {
        env: ScopedEnv::new(),
        ctx,
    };
    for f in &mut program.functions {
        pass.function_decl(f)?;
    }
    Ok(())
}

// ── Naming frame ─────────────────────────────────────────────────────────────

/// One frame per enclosing function, keyed by its name, with the counter
/// that mints `{name}_c{n}` literal names.
struct NameFrame {
    name: String,
    counter: u32,
}

impl NameFrame {
    fn new(name: String) -> Self {
        Self { name, counter: 0 }
    }

    fn alloc_name(&mut self) -> String {
        let name = format!("{}_c{}", self.name, self.counter);
        self.counter += 1;
        name
    }
}

// ── Visitor ──────────────────────────────────────────────────────────────────

struct NameLits<'a> {
    env: ScopedEnv<NameFrame>,
    ctx: &'a mut Context,
}

impl NameLits<'_> {
    fn function_decl(&mut self, f: &mut Function) -> Result<(), CompileError> {
        let name = f.named()?.to_string();
        self.ctx.register_function(&name, FuncKind::Decl, f.ty());
        self.scoped_body(name, &mut f.body)
    }

    fn function_lit(&mut self, lit: &mut Function) -> Result<(), CompileError> {
        if lit.name.is_none() {
            let name = self.env.expect_top_mut()?.alloc_name();
            lit.name = Some(name);
        }
        let name = lit.named()?.to_string();
        self.ctx.register_function(&name, FuncKind::Lit, lit.ty());
        self.scoped_body(name, &mut lit.body)
    }

    fn scoped_body(&mut self, name: String, body: &mut [Stmt]) -> Result<(), CompileError> {
        self.env.push(NameFrame::new(name));
        let res = body.iter_mut().try_for_each(|s| self.stmt(s));
        self.env.pop();
        res
    }

    fn stmt(&mut self, stmt: &mut Stmt) -> Result<(), CompileError> {
        match stmt {
            Stmt::VarSpec(vs) => vs.init.as_mut().map_or(Ok(()), |e| self.expr(e)),
            Stmt::Assign(a) => self.expr(&mut a.expr),
            Stmt::Return(e) => e.as_mut().map_or(Ok(()), |e| self.expr(e)),
            Stmt::Expr(e) => self.expr(e),
            Stmt::Block(b) => b.stmts.iter_mut().try_for_each(|s| self.stmt(s)),
        }
    }

    fn expr(&mut self, expr: &mut Expr) -> Result<(), CompileError> {
        match expr {
            Expr::Int(_) | Expr::Float(_) | Expr::Ident(_) => Ok(()),
            Expr::Unary(u) => self.expr(&mut u.expr),
            Expr::Binary(b) => {
                self.expr(&mut b.lhs)?;
                self.expr(&mut b.rhs)
            }
            Expr::Call(c) => {
                c.args.iter_mut().try_for_each(|a| self.expr(a))?;
                self.expr(&mut c.func)
            }
            Expr::FuncLit(lit) => self.function_lit(lit),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
