//! Pass 2 — flatten nested expressions into three-address statements.
//!
//! After this pass every statement performs at most one operation: the
//! operands of every assignment RHS, return, expression statement, call
//! argument, callee slot, and unary/binary operand are primitive
//! (a literal or an identifier).  Compound sub-expressions are lifted into
//! placeholder-typed temporaries:
//!
//! - `{assigned}_lhs` / `{assigned}_rhs` / `{assigned}_unary` for operator
//!   operands,
//! - `{scope}_{info}_flat{n}` for call arguments (`arg`), lifted callees
//!   (`func_call`) and expression statements (`tmp`),
//! - `{scope}_retarg` for lifted return expressions.
//!
//! Names minted here may repeat across sibling statements; the uniquify
//! pass makes them program-unique.
//!
//! Frames come in two flavours: function/block frames own the statement
//! list being built, lowering frames carry the current assignment target.
//! Emission always goes to the nearest list-owning frame.

use crate::ast::{Assign, Binary, Block, Call, Expr, Function, Ident, Program, Stmt, Unary, VarSpec};
use crate::env::ScopedEnv;
use crate::error::CompileError;
use crate::types::Type;

pub fn flatten(program: &mut Program) -> Result<(), CompileError> {
    let mut pass = Flatten {
        env: ScopedEnv::new(),
    };
    for f in &mut program.functions {
        pass.function(f)?;
    }
    Ok(())
}

// ── Statement-output frame ───────────────────────────────────────────────────

struct FlattenFrame {
    /// The destination variable of the value currently being lowered.
    assigned: Option<String>,
    /// Name of the enclosing function — the prefix for minted temporaries.
    scope_name: String,
    counter: u32,
    /// `Some` on function and block frames, `None` on lowering frames.
    stmts: Option<Vec<Stmt>>,
}

impl FlattenFrame {
    fn function(scope_name: String) -> Self {
        Self {
            assigned: None,
            scope_name,
            counter: 0,
            stmts: Some(Vec::new()),
        }
    }

    fn block(scope_name: String) -> Self {
        Self::function(scope_name)
    }

    fn lowering(assigned: String, scope_name: String) -> Self {
        Self {
            assigned: Some(assigned),
            scope_name,
            counter: 0,
            stmts: None,
        }
    }

    fn alloc_temp(&mut self, info: &str) -> String {
        let name = format!("{}_{}_flat{}", self.scope_name, info, self.counter);
        self.counter += 1;
        name
    }
}

// ── Visitor ──────────────────────────────────────────────────────────────────

struct Flatten {
    env: ScopedEnv<FlattenFrame>,
}

impl Flatten {
    fn function(&mut self, f: &mut Function) -> Result<(), CompileError> {
        let name = f.named()?.to_string();
        let body = std::mem::take(&mut f.body);
        self.env.push(FlattenFrame::function(name));
        let res = body.into_iter().try_for_each(|s| self.stmt(s));
        let frame = self.env.pop().expect("function frame pushed above");
        res?;
        f.body = frame
            .stmts
            .ok_or_else(|| CompileError::internal("function frame lost its statement list"))?;
        Ok(())
    }

    fn stmt(&mut self, stmt: Stmt) -> Result<(), CompileError> {
        match stmt {
            // `var v T = init;` splits into `var v T;` plus `v = init;`.
            Stmt::VarSpec(vs) => {
                let VarSpec { var, init } = vs;
                self.emit(Stmt::VarSpec(VarSpec {
                    var: var.clone(),
                    init: None,
                }))?;
                if let Some(init) = init {
                    self.assign(Assign { var, expr: init })?;
                }
                Ok(())
            }
            Stmt::Assign(a) => self.assign(a),
            Stmt::Return(None) => self.emit(Stmt::Return(None)),
            Stmt::Return(Some(e)) if e.is_primitive() => self.emit(Stmt::Return(Some(e))),
            Stmt::Return(Some(e)) => {
                let name = format!("{}_retarg", self.scope_name()?);
                self.stmt(Stmt::VarSpec(VarSpec {
                    var: Ident::typed(name.clone(), Type::Placeholder),
                    init: Some(e),
                }))?;
                self.emit(Stmt::Return(Some(Expr::ident(name))))
            }
            Stmt::Expr(e) if e.is_primitive() => self.emit(Stmt::Expr(e)),
            // A compound expression statement is kept only for its effect;
            // lifting it into a temporary is the whole lowering.
            Stmt::Expr(e) => {
                let name = self.alloc_temp("tmp")?;
                self.stmt(Stmt::VarSpec(VarSpec {
                    var: Ident::typed(name, Type::Placeholder),
                    init: Some(e),
                }))
            }
            Stmt::Block(b) => {
                let Block { stmts, varset } = b;
                let scope_name = self.scope_name()?;
                self.env.push(FlattenFrame::block(scope_name));
                let res = stmts.into_iter().try_for_each(|s| self.stmt(s));
                let frame = self.env.pop().expect("block frame pushed above");
                res?;
                let stmts = frame
                    .stmts
                    .ok_or_else(|| CompileError::internal("block frame lost its statement list"))?;
                self.emit(Stmt::Block(Block { stmts, varset }))
            }
        }
    }

    fn assign(&mut self, a: Assign) -> Result<(), CompileError> {
        if a.expr.is_primitive() {
            return self.emit(Stmt::Assign(a));
        }
        let Assign { var, expr } = a;
        let scope_name = self.scope_name()?;
        self.env.push(FlattenFrame::lowering(var.name, scope_name));
        let res = self.lower(expr);
        self.env.pop();
        res
    }

    /// Lower a compound expression; emits statements culminating in an
    /// assignment to the current frame's target.
    fn lower(&mut self, expr: Expr) -> Result<(), CompileError> {
        let assigned = self.assigned()?;
        match expr {
            Expr::Unary(u) => {
                let Unary { op, expr, ty } = *u;
                let operand = self.lift_operand(expr, format!("{assigned}_unary"))?;
                self.emit(Stmt::Assign(Assign {
                    var: Ident::new(assigned),
                    expr: Expr::Unary(Box::new(Unary {
                        op,
                        expr: operand,
                        ty,
                    })),
                }))
            }
            Expr::Binary(b) => {
                let Binary { lhs, op, rhs, ty } = *b;
                let lhs = self.lift_operand(lhs, format!("{assigned}_lhs"))?;
                let rhs = self.lift_operand(rhs, format!("{assigned}_rhs"))?;
                self.emit(Stmt::Assign(Assign {
                    var: Ident::new(assigned),
                    expr: Expr::Binary(Box::new(Binary { lhs, op, rhs, ty })),
                }))
            }
            Expr::Call(c) => {
                let Call { func, args } = *c;
                let mut new_args = Vec::with_capacity(args.len());
                for arg in args {
                    if arg.is_primitive() {
                        new_args.push(arg);
                    } else {
                        let name = self.alloc_temp("arg")?;
                        new_args.push(self.lift_operand(arg, name)?);
                    }
                }
                let func = if func.is_primitive() {
                    if !matches!(func, Expr::Ident(_)) {
                        return Err(CompileError::internal(
                            "call target lowered to a non-identifier primitive",
                        ));
                    }
                    func
                } else {
                    let name = self.alloc_temp("func_call")?;
                    self.lift_operand(func, name)?
                };
                self.emit(Stmt::Assign(Assign {
                    var: Ident::new(assigned),
                    expr: Expr::Call(Box::new(Call {
                        func,
                        args: new_args,
                    })),
                }))
            }
            // The literal is preserved as a distinguished RHS that codegen
            // recognises as a closure construction.
            Expr::FuncLit(mut lit) => {
                let lit_name = lit.named()?.to_string();
                let body = std::mem::take(&mut lit.body);
                self.env.push(FlattenFrame::function(lit_name));
                let res = body.into_iter().try_for_each(|s| self.stmt(s));
                let frame = self.env.pop().expect("literal frame pushed above");
                res?;
                lit.body = frame
                    .stmts
                    .ok_or_else(|| CompileError::internal("literal frame lost its statement list"))?;
                let var = Ident::typed(assigned, lit.ty());
                self.emit(Stmt::Assign(Assign {
                    var,
                    expr: Expr::FuncLit(lit),
                }))
            }
            Expr::Int(_) | Expr::Float(_) | Expr::Ident(_) => Err(CompileError::internal(
                "flatten asked to lower an atomic expression",
            )),
        }
    }

    /// Primitive operands pass through; compound operands are lifted into
    /// a fresh placeholder-typed temporary named `name`.
    fn lift_operand(&mut self, expr: Expr, name: String) -> Result<Expr, CompileError> {
        if expr.is_primitive() {
            return Ok(expr);
        }
        self.stmt(Stmt::VarSpec(VarSpec {
            var: Ident::typed(name.clone(), Type::Placeholder),
            init: Some(expr),
        }))?;
        Ok(Expr::ident(name))
    }

    // ── frame access ─────────────────────────────────────────────────────────

    fn emit(&mut self, stmt: Stmt) -> Result<(), CompileError> {
        for frame in self.env.frames_mut().iter_mut().rev() {
            if let Some(stmts) = frame.stmts.as_mut() {
                stmts.push(stmt);
                return Ok(());
            }
        }
        Err(CompileError::internal("no statement list to emit into"))
    }

    fn scope_name(&mut self) -> Result<String, CompileError> {
        Ok(self.env.expect_top_mut()?.scope_name.clone())
    }

    fn assigned(&mut self) -> Result<String, CompileError> {
        self.env
            .expect_top_mut()?
            .assigned
            .clone()
            .ok_or_else(|| CompileError::internal("no assignment target during lowering"))
    }

    fn alloc_temp(&mut self, info: &str) -> Result<String, CompileError> {
        Ok(self.env.expect_top_mut()?.alloc_temp(info))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;
    use crate::parser::parse;
    use crate::passes::name_lits::assign_literal_names;

    fn flattened(src: &str) -> Program {
        let mut program = parse(src).expect("program should parse");
        let mut ctx = Context::new();
        assign_literal_names(&mut program, &mut ctx).expect("naming should succeed");
        flatten(&mut program).expect("flatten should succeed");
        program
    }

    /// Post-pass invariant: every operand position is primitive and no
    /// declaration keeps an initializer.
    fn assert_flat_stmts(stmts: &[Stmt]) {
        for s in stmts {
            match s {
                Stmt::VarSpec(vs) => assert!(vs.init.is_none(), "initializer survived"),
                Stmt::Assign(a) => assert_flat_rhs(&a.expr),
                Stmt::Return(Some(e)) | Stmt::Expr(e) => {
                    assert!(e.is_primitive(), "compound expression survived: {e:?}");
                }
                Stmt::Return(None) => {}
                Stmt::Block(b) => assert_flat_stmts(&b.stmts),
            }
        }
    }

    fn assert_flat_rhs(expr: &Expr) {
        match expr {
            Expr::Unary(u) => assert!(u.expr.is_primitive()),
            Expr::Binary(b) => {
                assert!(b.lhs.is_primitive());
                assert!(b.rhs.is_primitive());
            }
            Expr::Call(c) => {
                assert!(matches!(c.func, Expr::Ident(_)));
                assert!(c.args.iter().all(Expr::is_primitive));
            }
            Expr::FuncLit(lit) => assert_flat_stmts(&lit.body),
            Expr::Int(_) | Expr::Float(_) | Expr::Ident(_) => {}
        }
    }

    #[test]
    fn test_nested_arithmetic_lowered() {
        // `var x int = (a + b) * c;` becomes:
        //   var x int; var x_lhs __placeholder__; x_lhs = a + b; x = x_lhs * c;
        let p = flattened("func f(a int, b int, c int) { var x int = (a + b) * c; }");
        let body = &p.functions[0].body;
        assert_flat_stmts(body);
        assert_eq!(body.len(), 4);

        let Stmt::VarSpec(vs) = &body[0] else {
            panic!("expected `var x`");
        };
        assert_eq!(vs.var.name, "x");

        let Stmt::VarSpec(tmp) = &body[1] else {
            panic!("expected lifted temporary declaration");
        };
        assert_eq!(tmp.var.name, "x_lhs");
        assert_eq!(tmp.var.ty, Some(Type::Placeholder));

        let Stmt::Assign(a1) = &body[2] else {
            panic!("expected `x_lhs = a + b`");
        };
        assert_eq!(a1.var.name, "x_lhs");
        assert!(matches!(&a1.expr, Expr::Binary(_)));

        let Stmt::Assign(a2) = &body[3] else {
            panic!("expected `x = x_lhs * c`");
        };
        assert_eq!(a2.var.name, "x");
        let Expr::Binary(b) = &a2.expr else {
            panic!("rhs should be binary");
        };
        assert!(matches!(&b.lhs, Expr::Ident(id) if id.name == "x_lhs"));
        assert!(matches!(&b.rhs, Expr::Ident(id) if id.name == "c"));
    }

    #[test]
    fn test_primitive_assignment_kept_verbatim() {
        let p = flattened("func f(a int) { var x int = a; }");
        let body = &p.functions[0].body;
        assert_eq!(body.len(), 2);
        assert!(matches!(&body[1], Stmt::Assign(a) if a.expr.is_primitive()));
    }

    #[test]
    fn test_compound_return_lifted_to_retarg() {
        let p = flattened("func f(a int, b int) int { return a + b; }");
        let body = &p.functions[0].body;
        assert_flat_stmts(body);
        let Stmt::VarSpec(vs) = &body[0] else {
            panic!("expected retarg declaration");
        };
        assert_eq!(vs.var.name, "f_retarg");
        let Stmt::Return(Some(Expr::Ident(id))) = &body[2] else {
            panic!("expected `return f_retarg`");
        };
        assert_eq!(id.name, "f_retarg");
    }

    #[test]
    fn test_call_arguments_lifted() {
        let p = flattened("func main() { f(g(1), 2); }");
        let body = &p.functions[0].body;
        assert_flat_stmts(body);
        // var main_tmp_flat0; var main_arg_flat0; main_arg_flat0 = g(1);
        // main_tmp_flat0 = f(main_arg_flat0, 2);
        assert_eq!(body.len(), 4);
        let Stmt::Assign(inner) = &body[2] else {
            panic!("expected inner call assignment");
        };
        assert_eq!(inner.var.name, "main_arg_flat0");
        let Stmt::Assign(outer) = &body[3] else {
            panic!("expected outer call assignment");
        };
        assert_eq!(outer.var.name, "main_tmp_flat0");
        let Expr::Call(call) = &outer.expr else {
            panic!("rhs should be the outer call");
        };
        assert!(matches!(&call.args[0], Expr::Ident(id) if id.name == "main_arg_flat0"));
        assert!(matches!(call.args[1], Expr::Int(2)));
    }

    #[test]
    fn test_immediately_invoked_literal_lifted_via_func_call_temp() {
        let p = flattened("func main() { var k int = func() int { return 1; }(); }");
        let body = &p.functions[0].body;
        assert_flat_stmts(body);
        // var k; var main_func_call_flat0; main_func_call_flat0 = <lit>;
        // k = main_func_call_flat0();
        let Stmt::Assign(lit_assign) = &body[2] else {
            panic!("expected literal assignment");
        };
        assert_eq!(lit_assign.var.name, "main_func_call_flat0");
        assert!(matches!(lit_assign.expr, Expr::FuncLit(_)));
        let Stmt::Assign(call_assign) = &body[3] else {
            panic!("expected call assignment");
        };
        assert_eq!(call_assign.var.name, "k");
    }

    #[test]
    fn test_literal_body_flattened_under_own_scope() {
        let p = flattened(
            "func main() { var f func() int = func() int { return 1 + 2; }; }",
        );
        let body = &p.functions[0].body;
        let Stmt::Assign(a) = &body[1] else {
            panic!("expected literal assignment");
        };
        let Expr::FuncLit(lit) = &a.expr else {
            panic!("rhs should be the literal");
        };
        // Lifted return temp is named after the literal's scope.
        let Stmt::VarSpec(vs) = &lit.body[0] else {
            panic!("expected retarg in literal body");
        };
        assert_eq!(vs.var.name, "main_c0_retarg");
        // The literal assignment target carries the literal's type.
        assert_eq!(a.var.ty, Some(Type::func(vec![], Type::Int)));
    }

    #[test]
    fn test_expression_statement_lifted() {
        let p = flattened("func main() { 1 + 2; }");
        let body = &p.functions[0].body;
        assert_flat_stmts(body);
        assert_eq!(body.len(), 2);
        let Stmt::Assign(a) = &body[1] else {
            panic!("expected assignment to temp");
        };
        assert_eq!(a.var.name, "main_tmp_flat0");
    }

    #[test]
    fn test_block_statements_flattened_in_place() {
        let p = flattened("func f(a int, b int) { { var x int = a + b; } }");
        let body = &p.functions[0].body;
        assert_eq!(body.len(), 1);
        let Stmt::Block(block) = &body[0] else {
            panic!("expected block");
        };
        assert_flat_stmts(&block.stmts);
        assert_eq!(block.stmts.len(), 2);
    }

    #[test]
    fn test_flatten_is_exhaustive_on_deep_nesting() {
        let p = flattened(
            "func f(a int, b int, c int, d int) int { return (a + b) * (c - d) % 2; }",
        );
        assert_flat_stmts(&p.functions[0].body);
    }
}
