//! The transformation pipeline.
//!
//! Seven passes, each a full traversal of the AST, run in a fixed order by
//! [`crate::compile`]:
//!
//! 1. [`name_lits`] — give every anonymous function literal a
//!    program-unique name.
//! 2. [`flatten`] — lower nested expressions to three-address statements.
//! 3. [`uniquify`] — rename every variable to a program-unique name.
//! 4. [`reveal`] — compute declared/captured/free variable sets.
//! 5. [`fix_params`] — box captured parameters through a body prologue.
//! 6. [`infer`] — propagate types to a fixed point.
//! 7. [`codegen`] — emit the C translation unit.
//!
//! Data flows strictly forward; no pass revisits an earlier pass's output.
//! [`dump`] is not a pass — it pretty-prints the lowered AST for
//! debugging.

pub mod codegen;
pub mod dump;
pub mod fix_params;
pub mod flatten;
pub mod infer;
pub mod name_lits;
pub mod reveal;
pub mod uniquify;
