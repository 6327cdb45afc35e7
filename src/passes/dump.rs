//! Lowered-AST pretty-printer, behind the CLI's `--dump-ast`.
//!
//! Renders the program in a Fo-like surface form so the output of the
//! transformation passes can be eyeballed.  Function literals are printed
//! in full when they sit on the right of an assignment or initializer (the
//! only places the lowered AST puts them) and as a `func_lit <name>`
//! reference elsewhere.

use crate::ast::{Expr, Function, Program, Stmt};
use crate::emit::CodeWriter;
use crate::types::Type;

pub fn dump_ast(program: &Program) -> String {
    let mut w = CodeWriter::new();
    for f in &program.functions {
        dump_function(&mut w, f, "func");
        w.blank();
    }
    w.build()
}

fn dump_function(w: &mut CodeWriter, f: &Function, keyword: &str) {
    let name = f.name.as_deref().unwrap_or("<anonymous>");
    let params = f
        .params
        .iter()
        .map(|p| format!("{} {}", p.name, p.ty))
        .collect::<Vec<_>>()
        .join(", ");
    let ret = if f.ret == Type::Void {
        String::new()
    } else {
        format!(" {}", f.ret)
    };
    w.line(format!("{keyword} {name}({params}){ret} {{"));
    w.push_indent();
    for s in &f.body {
        dump_stmt(w, s);
    }
    w.pop_indent();
    w.line("}");
}

fn dump_stmt(w: &mut CodeWriter, stmt: &Stmt) {
    match stmt {
        Stmt::VarSpec(vs) => {
            let ty = vs
                .var
                .ty
                .as_ref()
                .map(|t| format!(" {t}"))
                .unwrap_or_default();
            match &vs.init {
                Some(Expr::FuncLit(lit)) => {
                    w.line(format!("var {}{ty} =", vs.var.name));
                    w.indented(|w| dump_function(w, lit, "func_lit"));
                }
                Some(init) => w.line(format!("var {}{ty} = {};", vs.var.name, render(init))),
                None => w.line(format!("var {}{ty};", vs.var.name)),
            }
        }
        Stmt::Assign(a) => match &a.expr {
            Expr::FuncLit(lit) => {
                w.line(format!("{} =", a.var.name));
                w.indented(|w| dump_function(w, lit, "func_lit"));
            }
            expr => w.line(format!("{} = {};", a.var.name, render(expr))),
        },
        Stmt::Return(None) => w.line("return;"),
        Stmt::Return(Some(e)) => w.line(format!("return {};", render(e))),
        Stmt::Expr(e) => w.line(format!("{};", render(e))),
        Stmt::Block(b) => {
            w.line("{");
            w.push_indent();
            for s in &b.stmts {
                dump_stmt(w, s);
            }
            w.pop_indent();
            w.line("}");
        }
    }
}

fn render(expr: &Expr) -> String {
    match expr {
        Expr::Int(v) => v.to_string(),
        Expr::Float(v) => format!("{v:?}"),
        Expr::Ident(id) => id.name.clone(),
        Expr::Unary(u) => format!("({} {})", u.op.symbol(), render(&u.expr)),
        Expr::Binary(b) => format!(
            "({} {} {})",
            render(&b.lhs),
            b.op.symbol(),
            render(&b.rhs)
        ),
        Expr::Call(c) => {
            let args = c.args.iter().map(render).collect::<Vec<_>>().join(", ");
            format!("{}({args})", render(&c.func))
        }
        Expr::FuncLit(lit) => {
            format!("func_lit {}", lit.name.as_deref().unwrap_or("<anonymous>"))
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
