//! Fatal compilation errors.
//!
//! Every error aborts the compilation; there is no recovery.  The binary
//! prints the `Display` form as a single line and exits non-zero.

use crate::types::Type;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompileError {
    /// The lexer hit a character sequence that is not a Fo token.
    #[error("lexing error at line {line}: {message}")]
    Lex { line: usize, message: String },

    /// The parser hit a token sequence outside the grammar.
    #[error("parsing error at line {line}: {message}")]
    Parse { line: usize, message: String },

    /// An identifier reference that no enclosing scope declares.
    #[error("unbound variable `{0}`")]
    Unbound(String),

    /// The same name declared twice in one scope.
    #[error("duplicate variable `{0}` in scope")]
    DuplicateVar(String),

    /// Two sides of a binary expression disagree.
    #[error("type mismatch: `{lhs}` vs `{rhs}`")]
    TypeMismatch { lhs: Type, rhs: Type },

    /// A variable was given two incompatible types.
    #[error("conflicting types for `{name}`: `{stored}` vs `{new}`")]
    VarTypeConflict {
        name: String,
        stored: Type,
        new: Type,
    },

    /// Type propagation stopped making progress with placeholders left.
    #[error("cannot resolve types: {unresolved} expression(s) remain untyped")]
    Unresolved { unresolved: usize },

    /// A pass invariant was violated.  This is a compiler bug, not a
    /// problem with the input program.
    #[error("internal compiler error: {0}")]
    Internal(String),
}

impl CompileError {
    pub fn internal(message: impl Into<String>) -> Self {
        CompileError::Internal(message.into())
    }
}
