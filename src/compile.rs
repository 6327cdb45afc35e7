//! The compilation pipeline.
//!
//! A linear chain: parse, then the six analysis/lowering passes in fixed
//! order, then code generation.  Data flows strictly forward — each pass
//! consumes the previous pass's AST and the shared [`Context`] and never
//! revisits earlier output.

use crate::ast::Program;
use crate::context::Context;
use crate::error::CompileError;
use crate::parser;
use crate::passes::codegen::generate_c;
use crate::passes::fix_params::box_captured_params;
use crate::passes::flatten::flatten;
use crate::passes::infer::propagate_types;
use crate::passes::name_lits::assign_literal_names;
use crate::passes::reveal::reveal_captures;
use crate::passes::uniquify::uniquify;

/// The fully analysed program: lowered AST plus the compilation context
/// (function table, capture sets, variable types).
pub struct Compilation {
    pub program: Program,
    pub context: Context,
}

/// Run the front-end and every transformation pass short of code
/// generation.
pub fn analyze(source: &str) -> Result<Compilation, CompileError> {
    let mut program = parser::parse(source)?;
    let mut context = Context::new();
    assign_literal_names(&mut program, &mut context)?;
    flatten(&mut program)?;
    uniquify(&mut program, &context)?;
    reveal_captures(&mut program, &mut context)?;
    box_captured_params(&mut program);
    propagate_types(&mut program, &mut context)?;
    Ok(Compilation { program, context })
}

/// Compile Fo source text into a C translation unit.
pub fn compile(source: &str) -> Result<String, CompileError> {
    let compilation = analyze(source)?;
    generate_c(&compilation.program, &compilation.context)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
