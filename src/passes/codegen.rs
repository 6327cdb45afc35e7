//! Pass 7 — C code generation.
//!
//! Emits one translation unit against the runtime ABI.  Closures lower to
//! heap tuples: slot 0 holds the raw C function pointer, slots 1.. hold
//! the function's free variables (their box pointers, so every closure
//! over the same variable shares one mutable cell).
//!
//! Every function — declaration or literal — is emitted as a top-level C
//! function whose first parameter is `gc_header_t* context_tuple`.  Plain
//! calls pass `NULL`; closure calls fetch the function pointer out of
//! slot 0 and pass the tuple itself.
//!
//! Captured and free variables are uniformly `gc_header_t*` boxes; reads
//! and writes go through `*GC_TO_OBJ(FAKE_TYPE, name)`.  A variable is
//! boxed at a use site if any scope of the current function captures it,
//! or if it is free in the current function.

use crate::ast::{Assign, Call, Expr, Function, Program, ScopeVarset, Stmt, VarSpec};
use crate::context::{Context, FuncKind};
use crate::emit::CodeWriter;
use crate::env::ScopedEnv;
use crate::error::CompileError;
use crate::types::Type;

const GC_HEADER_T: &str = "gc_header_t*";

const RUNTIME_HEADERS: &[&str] = &["base.h", "gc.h", "gc_header.h", "memory.h", "tuple.h"];

pub fn generate_c(program: &Program, ctx: &Context) -> Result<String, CompileError> {
    let mut functions = Vec::new();
    for f in &program.functions {
        collect_functions(f, &mut functions);
    }

    let mut cg = Codegen {
        ctx,
        env: ScopedEnv::new(),
        w: CodeWriter::new(),
    };
    for h in RUNTIME_HEADERS {
        cg.w.line(format!("#include \"runtime/{h}\""));
    }
    cg.w.blank();
    for f in &functions {
        cg.prototype(f)?;
    }
    for f in &functions {
        cg.w.blank();
        cg.define(f)?;
    }
    Ok(cg.w.build())
}

/// Pre-order walk: a declaration first, then the literals nested in it.
/// This equals the naming pass's registration order and fixes emission
/// order program-wide.
fn collect_functions<'a>(f: &'a Function, out: &mut Vec<&'a Function>) {
    out.push(f);
    for s in &f.body {
        collect_from_stmt(s, out);
    }
}

fn collect_from_stmt<'a>(stmt: &'a Stmt, out: &mut Vec<&'a Function>) {
    match stmt {
        Stmt::VarSpec(vs) => {
            if let Some(init) = &vs.init {
                collect_from_expr(init, out);
            }
        }
        Stmt::Assign(a) => collect_from_expr(&a.expr, out),
        Stmt::Return(Some(e)) | Stmt::Expr(e) => collect_from_expr(e, out),
        Stmt::Return(None) => {}
        Stmt::Block(b) => {
            for s in &b.stmts {
                collect_from_stmt(s, out);
            }
        }
    }
}

fn collect_from_expr<'a>(expr: &'a Expr, out: &mut Vec<&'a Function>) {
    match expr {
        Expr::Int(_) | Expr::Float(_) | Expr::Ident(_) => {}
        Expr::Unary(u) => collect_from_expr(&u.expr, out),
        Expr::Binary(b) => {
            collect_from_expr(&b.lhs, out);
            collect_from_expr(&b.rhs, out);
        }
        Expr::Call(c) => {
            for a in &c.args {
                collect_from_expr(a, out);
            }
            collect_from_expr(&c.func, out);
        }
        Expr::FuncLit(lit) => collect_functions(lit, out),
    }
}

// ── Type rendering ───────────────────────────────────────────────────────────

/// Primitive types keep their C names; every other type is the uniform
/// boxed representation.
fn c_type(t: &Type) -> &'static str {
    match t {
        Type::Void => "void",
        Type::Bool => "bool",
        Type::Int => "int64_t",
        Type::Float => "double",
        _ => GC_HEADER_T,
    }
}

/// The C function-pointer type for calling a closure, including the
/// leading context-tuple parameter.
fn c_fn_ptr_type(t: &Type) -> Result<String, CompileError> {
    let (params, ret) = t
        .as_func()
        .ok_or_else(|| CompileError::internal("callee type is not a function type"))?;
    let mut out = format!("{}(*)({GC_HEADER_T}", c_type(ret));
    for p in params {
        out.push_str(", ");
        out.push_str(c_type(p));
    }
    out.push(')');
    Ok(out)
}

// ── Generator ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScopeKind {
    Function,
    Block,
}

struct CodegenFrame<'a> {
    varset: &'a ScopeVarset,
    kind: ScopeKind,
}

struct Codegen<'a> {
    ctx: &'a Context,
    env: ScopedEnv<CodegenFrame<'a>>,
    w: CodeWriter,
}

impl<'a> Codegen<'a> {
    fn signature(&self, f: &Function) -> Result<String, CompileError> {
        let name = f.named()?;
        let mut params = format!("{GC_HEADER_T} context_tuple");
        for p in &f.params {
            params.push_str(&format!(", {} {}", c_type(&p.ty), p.name));
        }
        Ok(format!("{} {}({})", c_type(&f.ret), name, params))
    }

    fn prototype(&mut self, f: &Function) -> Result<(), CompileError> {
        let sig = self.signature(f)?;
        self.w.line(format!("{sig};"));
        Ok(())
    }

    fn define(&mut self, f: &'a Function) -> Result<(), CompileError> {
        let sig = self.signature(f)?;
        self.w.line(format!("{sig} {{"));
        self.env.push(CodegenFrame {
            varset: &f.varset,
            kind: ScopeKind::Function,
        });
        self.w.push_indent();
        let res = self.function_body(f);
        self.w.pop_indent();
        self.env.pop();
        res?;
        self.w.line("}");
        Ok(())
    }

    fn function_body(&mut self, f: &'a Function) -> Result<(), CompileError> {
        // Slot 0 of the context tuple holds the function pointer, so free
        // variables start at slot 1.
        for (i, fv) in f.varset.free.iter().enumerate() {
            self.w.line(format!(
                "{GC_HEADER_T} {fv} = ({GC_HEADER_T})get_tuple_at(context_tuple, {});",
                i + 1
            ));
        }
        for s in &f.body {
            self.stmt(s)?;
        }
        Ok(())
    }

    fn stmt(&mut self, stmt: &'a Stmt) -> Result<(), CompileError> {
        match stmt {
            Stmt::VarSpec(vs) => self.var_spec(vs),
            Stmt::Assign(a) => self.assign(a),
            Stmt::Return(None) => {
                self.w.line("return;");
                Ok(())
            }
            Stmt::Return(Some(e)) => {
                let rendered = self.render_expr(e)?;
                self.w.line(format!("return {rendered};"));
                Ok(())
            }
            Stmt::Expr(e) => {
                let rendered = self.render_expr(e)?;
                self.w.line(format!("({rendered});"));
                Ok(())
            }
            Stmt::Block(b) => {
                self.w.line("{");
                self.env.push(CodegenFrame {
                    varset: &b.varset,
                    kind: ScopeKind::Block,
                });
                self.w.push_indent();
                let res = b.stmts.iter().try_for_each(|s| self.stmt(s));
                self.w.pop_indent();
                self.env.pop();
                res?;
                self.w.line("}");
                Ok(())
            }
        }
    }

    fn var_spec(&mut self, vs: &VarSpec) -> Result<(), CompileError> {
        if vs.init.is_some() {
            return Err(CompileError::internal(
                "declaration initializer survived flattening",
            ));
        }
        let name = &vs.var.name;
        let top = self
            .env
            .top()
            .ok_or_else(|| CompileError::internal("declaration outside any scope"))?;
        if top.varset.captured.iter().any(|c| c == name) {
            // Captured locals live in a single-slot GC box.
            self.w.line(format!(
                "{GC_HEADER_T} {name} = gc_alloc_trivial(sizeof(val_t), get_trivial_obj_operators());"
            ));
        } else {
            let ty = vs
                .var
                .ty
                .as_ref()
                .ok_or_else(|| CompileError::internal("untyped declaration in codegen"))?;
            // A void-typed temporary (a lifted call to a void function) has
            // no C storage; its assignment becomes a bare call statement.
            if *ty == Type::Void {
                return Ok(());
            }
            let c = c_type(ty);
            self.w.line(format!("{c} {name} = ({c})0;"));
        }
        Ok(())
    }

    fn assign(&mut self, a: &'a Assign) -> Result<(), CompileError> {
        // A function-reference RHS is a closure construction, not a value
        // copy.
        if let Some((fn_name, free)) = self.func_ref(&a.expr)? {
            return self.assign_function(&a.var.name, fn_name, free);
        }
        let rhs = self.render_expr(&a.expr)?;
        // Assignments into a void temporary keep only their effect.
        if a.var.ty == Some(Type::Void) {
            self.w.line(format!("{rhs};"));
            return Ok(());
        }
        let lhs = self.id_cexpr(&a.var.name);
        self.w.line(format!("{lhs} = {rhs};"));
        Ok(())
    }

    /// `Some((name, free_vars))` when the RHS is a function literal or an
    /// identifier naming a declared function.
    fn func_ref(
        &self,
        expr: &'a Expr,
    ) -> Result<Option<(&'a str, &'a [String])>, CompileError> {
        match expr {
            Expr::FuncLit(lit) => Ok(Some((lit.named()?, &lit.varset.free))),
            Expr::Ident(id) => match self.ctx.function(&id.name) {
                Some(info) => Ok(Some((id.name.as_str(), &info.free))),
                None => Ok(None),
            },
            _ => Ok(None),
        }
    }

    fn assign_function(
        &mut self,
        lhs_name: &str,
        fn_name: &str,
        free: &[String],
    ) -> Result<(), CompileError> {
        let lhs = self.id_cexpr(lhs_name);
        self.w
            .line(format!("{lhs} = alloc_tuple({});", 1 + free.len()));
        self.w
            .line(format!("set_tuple_at({lhs}, 0, (val_t){fn_name}, false);"));
        for (i, fv) in free.iter().enumerate() {
            // The box pointer is stored, not the value — closures over the
            // same variable share one cell.
            self.w.line(format!(
                "set_tuple_at({lhs}, {}, (val_t){fv}, /*needs_gc=*/false);",
                i + 1
            ));
        }
        Ok(())
    }

    // ── Expression rendering ──────────────────────────────────────────────────

    fn render_expr(&self, expr: &Expr) -> Result<String, CompileError> {
        match expr {
            Expr::Int(v) => Ok(v.to_string()),
            Expr::Float(v) => Ok(format!("{v:?}")),
            Expr::Ident(id) => Ok(self.id_cexpr(&id.name)),
            Expr::Unary(u) => Ok(format!(
                "{} ({})",
                u.op.symbol(),
                self.render_expr(&u.expr)?
            )),
            Expr::Binary(b) => Ok(format!(
                "({}) {} ({})",
                self.render_expr(&b.lhs)?,
                b.op.symbol(),
                self.render_expr(&b.rhs)?
            )),
            Expr::Call(c) => self.render_call(c),
            Expr::FuncLit(_) => Err(CompileError::internal(
                "function literal outside a closure assignment",
            )),
        }
    }

    fn render_call(&self, call: &Call) -> Result<String, CompileError> {
        let Expr::Ident(callee) = &call.func else {
            return Err(CompileError::internal(
                "call target is not an identifier after flattening",
            ));
        };
        let mut args = String::new();
        for a in &call.args {
            args.push_str(", ");
            args.push_str(&self.render_expr(a)?);
        }

        let plain = matches!(
            self.ctx.function(&callee.name),
            Some(info) if info.kind == FuncKind::Decl
        );
        if plain {
            return Ok(format!("{}(NULL{args})", callee.name));
        }

        // The callee value is a closure tuple; slot 0 holds the function
        // pointer.
        let callee_c = self.id_cexpr(&callee.name);
        let fn_ty = callee
            .ty
            .as_ref()
            .ok_or_else(|| CompileError::internal("untyped callee in codegen"))?;
        let fpt = c_fn_ptr_type(fn_ty)?;
        Ok(format!(
            "(({fpt})get_tuple_at({callee_c}, 0))({callee_c}{args})"
        ))
    }

    /// Render an identifier use, dereferencing through the box when the
    /// name is captured by any scope of the current function or free in
    /// the current function.
    fn id_cexpr(&self, name: &str) -> String {
        for frame in self.env.frames().iter().rev() {
            if frame.varset.captured.iter().any(|c| c == name) {
                return format!("*GC_TO_OBJ(FAKE_TYPE, {name})");
            }
            if frame.kind == ScopeKind::Function {
                if frame.varset.free.iter().any(|f| f == name) {
                    return format!("*GC_TO_OBJ(FAKE_TYPE, {name})");
                }
                break;
            }
        }
        name.to_string()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use crate::compile::compile;

    fn compiled(src: &str) -> String {
        compile(src).expect("compilation should succeed")
    }

    #[test]
    fn test_runtime_headers_emitted() {
        let c = compiled("func main() { }");
        assert!(c.starts_with("#include \"runtime/base.h\""));
        assert!(c.contains("#include \"runtime/tuple.h\""));
    }

    #[test]
    fn test_empty_function_is_prologue_only() {
        let c = compiled("func main() { }");
        assert!(c.contains("void main(gc_header_t* context_tuple) {\n}"));
    }

    #[test]
    fn test_forward_declarations_before_definitions() {
        let c = compiled("func main() { var r int = helper(); }\nfunc helper() int { return 1; }");
        let proto = c
            .find("int64_t helper(gc_header_t* context_tuple);")
            .expect("prototype present");
        let def = c
            .find("int64_t helper(gc_header_t* context_tuple) {")
            .expect("definition present");
        assert!(proto < def);
    }

    #[test]
    fn test_plain_call_passes_null_context() {
        let c = compiled(
            "func helper(a int) int { return a; }\n\
             func main() { var r int = helper(2); }",
        );
        assert!(c.contains("r = helper(NULL, 2);"));
    }

    #[test]
    fn test_void_call_statement_keeps_only_the_call() {
        let c = compiled(
            "func doit() { }\n\
             func main() { doit(); }",
        );
        // The lifted temporary is void: no declaration, no assignment.
        assert!(c.contains("doit(NULL);"));
        assert!(!c.contains("void main_tmp_flat0"));
        assert!(!c.contains("= doit(NULL)"));
    }

    #[test]
    fn test_scalar_declaration_zero_initialised() {
        let c = compiled("func main() { var a int; var b float; }");
        assert!(c.contains("int64_t a = (int64_t)0;"));
        assert!(c.contains("double b = (double)0;"));
    }

    #[test]
    fn test_closure_over_parameter_end_to_end() {
        let c = compiled(
            "func makeClosure(i int) func() int {\n\
             \x20 return func() int { return i; };\n\
             }\n\
             func main() { var f func() int = makeClosure(2); var r int = f(); }",
        );
        // The captured parameter is boxed and re-initialised from its raw
        // counterpart.
        assert!(c.contains(
            "gc_header_t* makeClosure(gc_header_t* context_tuple, int64_t i_raw) {"
        ));
        assert!(c.contains(
            "gc_header_t* i = gc_alloc_trivial(sizeof(val_t), get_trivial_obj_operators());"
        ));
        assert!(c.contains("*GC_TO_OBJ(FAKE_TYPE, i) = i_raw;"));

        // The literal reads `i` out of slot 1 of its context tuple.
        assert!(c.contains("int64_t makeClosure_c0(gc_header_t* context_tuple) {"));
        assert!(c.contains(
            "gc_header_t* i = (gc_header_t*)get_tuple_at(context_tuple, 1);"
        ));
        assert!(c.contains("return *GC_TO_OBJ(FAKE_TYPE, i);"));

        // Closure construction: 2 slots, function pointer then the box.
        assert!(c.contains("makeClosure_retarg = alloc_tuple(2);"));
        assert!(c.contains(
            "set_tuple_at(makeClosure_retarg, 0, (val_t)makeClosure_c0, false);"
        ));
        assert!(c.contains(
            "set_tuple_at(makeClosure_retarg, 1, (val_t)i, /*needs_gc=*/false);"
        ));

        // Call sites: plain call with NULL, closure call through slot 0.
        assert!(c.contains("f = makeClosure(NULL, 2);"));
        assert!(c.contains("r = ((int64_t(*)(gc_header_t*))get_tuple_at(f, 0))(f);"));
    }

    #[test]
    fn test_no_free_variables_one_slot_tuple() {
        let c = compiled(
            "func main() { var f func() int = func() int { return 1; }; var r int = f(); }",
        );
        assert!(c.contains("f = alloc_tuple(1);"));
        assert!(c.contains("set_tuple_at(f, 0, (val_t)main_c0, false);"));
    }

    #[test]
    fn test_function_valued_variable_rendered_as_gc_header() {
        let c = compiled("func main() { var f func() int = func() int { return 1; }; }");
        assert!(c.contains("gc_header_t* f = (gc_header_t*)0;"));
    }

    #[test]
    fn test_assigning_declared_function_builds_tuple() {
        let c = compiled(
            "func helper() int { return 1; }\n\
             func main() { var f func() int = helper; var r int = f(); }",
        );
        assert!(c.contains("f = alloc_tuple(1);"));
        assert!(c.contains("set_tuple_at(f, 0, (val_t)helper, false);"));
    }

    #[test]
    fn test_closure_call_with_arguments() {
        let c = compiled(
            "func main() {\n\
             \x20 var add func(a int, b int) int = func(a int, b int) int { return a + b; };\n\
             \x20 var r int = add(1, 2);\n\
             }",
        );
        assert!(c.contains(
            "r = ((int64_t(*)(gc_header_t*, int64_t, int64_t))get_tuple_at(add, 0))(add, 1, 2);"
        ));
    }

    #[test]
    fn test_binary_and_unary_parenthesised() {
        let c = compiled("func f(a int, b int) { var x int = a + b; var y int = -a; }");
        assert!(c.contains("x = (a) + (b);"));
        assert!(c.contains("y = - (a);"));
    }

    #[test]
    fn test_float_literal_keeps_decimal_point() {
        let c = compiled("func f() { var x float = 2.0; }");
        assert!(c.contains("x = 2.0;"));
    }

    #[test]
    fn test_block_emitted_with_braces() {
        let c = compiled("func f() { { var a int; } }");
        assert!(c.contains("{\n    int64_t a = (int64_t)0;\n  }"));
    }

    #[test]
    fn test_block_declared_captured_variable_boxed() {
        let c = compiled(
            "func outer() func() int {\n\
             \x20 { var j int = 2; return func() int { return j; }; }\n\
             }",
        );
        assert!(c.contains(
            "gc_header_t* j = gc_alloc_trivial(sizeof(val_t), get_trivial_obj_operators());"
        ));
        assert!(c.contains("*GC_TO_OBJ(FAKE_TYPE, j) = 2;"));
    }

    #[test]
    fn test_two_level_capture_slots() {
        let c = compiled(
            "func outer(i int) func() int {\n\
             \x20 return func() func() int {\n\
             \x20   var j int = 2;\n\
             \x20   return func() int { i = i + j; return i; };\n\
             \x20 }();\n\
             }",
        );
        // The innermost literal loads both free variables from its tuple.
        assert!(c.contains("gc_header_t* i = (gc_header_t*)get_tuple_at(context_tuple, 1);"));
        assert!(c.contains("gc_header_t* j = (gc_header_t*)get_tuple_at(context_tuple, 2);"));
        // Its construction stores both boxes.
        assert!(c.contains("set_tuple_at(outer_c0_retarg, 0, (val_t)outer_c0_c0, false);"));
        assert!(c.contains("set_tuple_at(outer_c0_retarg, 2, (val_t)j, /*needs_gc=*/false);"));
        // Mutation goes through the box.
        assert!(c.contains("*GC_TO_OBJ(FAKE_TYPE, i) = (*GC_TO_OBJ(FAKE_TYPE, i)) + (*GC_TO_OBJ(FAKE_TYPE, j));"));
    }
}
