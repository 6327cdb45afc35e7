//! Per-compilation shared state.
//!
//! The context outlives every pass: the naming pass fills the function
//! table, the reveal pass records each function's capture sets into it, and
//! type propagation accumulates the variable-type map.  The function table
//! is an `IndexMap` so everything downstream (codegen order, the closure
//! report) is deterministic.

use crate::error::CompileError;
use crate::types::Type;
use indexmap::IndexMap;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

// ── Function table ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FuncKind {
    /// A top-level `func` declaration — callable directly by name.
    Decl,
    /// A named function literal — only reachable through a closure value.
    Lit,
}

#[derive(Debug, Clone)]
pub struct FuncInfo {
    pub kind: FuncKind,
    pub ty: Type,
    /// Filled by the reveal pass.
    pub free: Vec<String>,
    pub captured: Vec<String>,
}

// ── Context ──────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct Context {
    /// Function name → its signature and capture sets.  Names are unique
    /// across the program once the naming pass has run.
    pub functions: IndexMap<String, FuncInfo>,
    /// Variable name → resolved, non-placeholder type.
    pub var_types: HashMap<String, Type>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a function under `name`.  Re-registration is a no-op so
    /// the naming pass stays idempotent.
    pub fn register_function(&mut self, name: &str, kind: FuncKind, ty: Type) {
        self.functions
            .entry(name.to_string())
            .or_insert(FuncInfo {
                kind,
                ty,
                free: Vec::new(),
                captured: Vec::new(),
            });
    }

    pub fn is_function(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    pub fn function(&self, name: &str) -> Option<&FuncInfo> {
        self.functions.get(name)
    }

    /// Store the capture sets the reveal pass computed for `name`.
    pub fn record_capture_sets(&mut self, name: &str, free: Vec<String>, captured: Vec<String>) {
        if let Some(info) = self.functions.get_mut(name) {
            info.free = free;
            info.captured = captured;
        }
    }

    /// Record a resolved type for a variable.  A placeholder here is a
    /// compiler bug; a different already-stored type is a user-facing
    /// conflict.
    pub fn add_var_type(&mut self, name: &str, ty: Type) -> Result<(), CompileError> {
        if ty.is_placeholder() {
            return Err(CompileError::internal(format!(
                "recording placeholder type for `{name}`"
            )));
        }
        match self.var_types.get(name) {
            Some(stored) if *stored != ty => Err(CompileError::VarTypeConflict {
                name: name.to_string(),
                stored: stored.clone(),
                new: ty,
            }),
            Some(_) => Ok(()),
            None => {
                self.var_types.insert(name.to_string(), ty);
                Ok(())
            }
        }
    }

    pub fn var_type(&self, name: &str) -> Option<&Type> {
        self.var_types.get(name)
    }

    /// The closure-capture report for every function in the program.
    pub fn report(&self) -> Report {
        Report {
            functions: self
                .functions
                .iter()
                .map(|(name, info)| FuncSummary {
                    name: name.clone(),
                    free_vars: info.free.clone(),
                    captured_vars: info.captured.clone(),
                })
                .collect(),
        }
    }
}

// ── Closure report ───────────────────────────────────────────────────────────

/// Human- and machine-readable summary of what every function captures.
#[derive(Debug, Serialize)]
pub struct Report {
    pub functions: Vec<FuncSummary>,
}

#[derive(Debug, Serialize)]
pub struct FuncSummary {
    pub name: String,
    pub free_vars: Vec<String>,
    pub captured_vars: Vec<String>,
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for func in &self.functions {
            writeln!(
                f,
                "{}, #free {}, #captured {}",
                func.name,
                func.free_vars.len(),
                func.captured_vars.len()
            )?;
            if !func.free_vars.is_empty() {
                writeln!(f, "  free variables:")?;
                for v in &func.free_vars {
                    writeln!(f, "    {v}")?;
                }
            }
            if !func.captured_vars.is_empty() {
                writeln!(f, "  variables being captured:")?;
                for v in &func.captured_vars {
                    writeln!(f, "    {v}")?;
                }
            }
        }
        Ok(())
    }
}
