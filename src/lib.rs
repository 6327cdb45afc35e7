//! foc — a compiler from Fo, a small statically-typed imperative language
//! with simplified-Go syntax, to portable C.
//!
//! The generated C links against a small runtime providing tagged heap
//! allocation, tuple objects, and a mark-and-sweep GC.  Closures are
//! heap-allocated tuples holding a function pointer in slot 0 and the
//! captured environment in the remaining slots; captured variables live in
//! single-slot GC boxes so nested closures share one mutable cell.
//!
//! The core is a seven-pass pipeline over a mutable AST — see
//! [`passes`] for the pass inventory and [`compile::compile`] for the
//! one-call entry point:
//!
//! ```
//! let c = foc::compile("func main() { }").unwrap();
//! assert!(c.contains("void main(gc_header_t* context_tuple)"));
//! ```

pub mod ast;
pub mod compile;
pub mod context;
pub mod emit;
pub mod env;
pub mod error;
pub mod lexer;
pub mod location;
pub mod parser;
pub mod passes;
pub mod types;

pub use compile::{analyze, compile, Compilation};
pub use error::CompileError;
