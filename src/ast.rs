//! AST for the Fo language.
//!
//! The tree the parser produces is the tree every pass mutates in place:
//! declarations, statements, and expressions as tagged enums, with
//! struct-per-definition payloads.  Names are owned `String`s rather than
//! borrowed source slices because the renaming passes (literal naming,
//! flattening, uniquify, parameter boxing) rewrite most of them.
//!
//! An expression is *primitive* if it is a literal or an identifier;
//! everything else is compound and gets lifted by the flatten pass.

use crate::error::CompileError;
use crate::types::Type;

// ── Program ──────────────────────────────────────────────────────────────────

/// A parsed translation unit.
///
/// `var_decls` and `type_decls` are carried for completeness but processed
/// by no pass; only `functions` drives compilation.
#[derive(Debug, Clone)]
pub struct Program {
    pub var_decls: Vec<VarSpec>,
    pub type_decls: Vec<TypeAlias>,
    pub functions: Vec<Function>,
}

/// `type ID = type;` — parsed and otherwise inert.
#[derive(Debug, Clone)]
pub struct TypeAlias {
    pub name: String,
    pub ty: Type,
}

// ── Scope varset ─────────────────────────────────────────────────────────────

/// The three per-scope variable lists computed by the reveal pass.
///
/// All three are ordered and duplicate-free.  `declared` holds names
/// introduced by a `var` spec in this scope; `captured` holds names
/// declared here (or parameters) that a nested function references;
/// `free` holds names referenced here but declared in an enclosing
/// function.  Free variables only ever appear on function scopes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScopeVarset {
    pub declared: Vec<String>,
    pub captured: Vec<String>,
    pub free: Vec<String>,
}

impl ScopeVarset {
    fn add(list: &mut Vec<String>, name: &str) -> Result<(), CompileError> {
        if list.iter().any(|v| v == name) {
            return Err(CompileError::DuplicateVar(name.to_string()));
        }
        list.push(name.to_string());
        Ok(())
    }

    /// Insert-if-absent.  Returns `true` if the name was added.
    fn note(list: &mut Vec<String>, name: &str) -> bool {
        if list.iter().any(|v| v == name) {
            return false;
        }
        list.push(name.to_string());
        true
    }

    pub fn add_declared(&mut self, name: &str) -> Result<(), CompileError> {
        Self::add(&mut self.declared, name)
    }

    pub fn add_captured(&mut self, name: &str) -> Result<(), CompileError> {
        Self::add(&mut self.captured, name)
    }

    pub fn add_free(&mut self, name: &str) -> Result<(), CompileError> {
        Self::add(&mut self.free, name)
    }

    /// The same name may be referenced many times; captures are recorded
    /// once and silently absorbed afterwards.
    pub fn note_captured(&mut self, name: &str) -> bool {
        Self::note(&mut self.captured, name)
    }

    pub fn note_free(&mut self, name: &str) -> bool {
        Self::note(&mut self.free, name)
    }
}

// ── Statements ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub enum Stmt {
    VarSpec(VarSpec),
    Assign(Assign),
    Return(Option<Expr>),
    /// A bare expression statement.
    Expr(Expr),
    Block(Block),
}

/// `var x T;` or `var x T = init;`.  The declared type lives on `var` —
/// the placeholder type when the source omitted it.
#[derive(Debug, Clone)]
pub struct VarSpec {
    pub var: Ident,
    pub init: Option<Expr>,
}

/// `x = expr;` — identifiers are the only l-values.
#[derive(Debug, Clone)]
pub struct Assign {
    pub var: Ident,
    pub expr: Expr,
}

#[derive(Debug, Clone)]
pub struct Block {
    pub stmts: Vec<Stmt>,
    pub varset: ScopeVarset,
}

// ── Functions ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Param {
    pub name: String,
    pub ty: Type,
}

/// A function declaration or a function literal.
///
/// Declarations always carry their source name; literals are anonymous
/// until the naming pass assigns them a program-unique one.
#[derive(Debug, Clone)]
pub struct Function {
    pub name: Option<String>,
    pub params: Vec<Param>,
    pub ret: Type,
    pub body: Vec<Stmt>,
    pub varset: ScopeVarset,
}

impl Function {
    pub fn ty(&self) -> Type {
        Type::func(
            self.params.iter().map(|p| p.ty.clone()).collect(),
            self.ret.clone(),
        )
    }

    /// The function's name after the naming pass.  Hitting an unnamed
    /// function in any later pass is a compiler bug.
    pub fn named(&self) -> Result<&str, CompileError> {
        self.name
            .as_deref()
            .ok_or_else(|| CompileError::internal("function literal has no name"))
    }
}

// ── Expressions ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Ident {
    pub name: String,
    pub ty: Option<Type>,
}

impl Ident {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ty: None,
        }
    }

    pub fn typed(name: impl Into<String>, ty: Type) -> Self {
        Self {
            name: name.into(),
            ty: Some(ty),
        }
    }

    /// A known, non-placeholder type.
    pub fn valid_ty(&self) -> Option<&Type> {
        self.ty.as_ref().filter(|t| t.is_valid())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Plus,
    Neg,
    Not,
    /// `<-` — reserved channel receive; lexed but rejected downstream.
    Recv,
}

impl UnaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            UnaryOp::Plus => "+",
            UnaryOp::Neg => "-",
            UnaryOp::Not => "!",
            UnaryOp::Recv => "<-",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    And,
    Or,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl BinOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Mod => "%",
            BinOp::And => "&&",
            BinOp::Or => "||",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Unary {
    pub op: UnaryOp,
    pub expr: Expr,
    /// Filled by type propagation.
    pub ty: Option<Type>,
}

#[derive(Debug, Clone)]
pub struct Binary {
    pub lhs: Expr,
    pub op: BinOp,
    pub rhs: Expr,
    /// Filled by type propagation.
    pub ty: Option<Type>,
}

#[derive(Debug, Clone)]
pub struct Call {
    pub func: Expr,
    pub args: Vec<Expr>,
}

#[derive(Debug, Clone)]
pub enum Expr {
    Int(i64),
    Float(f64),
    Ident(Ident),
    Unary(Box<Unary>),
    Binary(Box<Binary>),
    Call(Box<Call>),
    FuncLit(Box<Function>),
}

impl Expr {
    pub fn ident(name: impl Into<String>) -> Expr {
        Expr::Ident(Ident::new(name))
    }

    /// Literals and identifiers need no lowering.
    pub fn is_primitive(&self) -> bool {
        matches!(self, Expr::Int(_) | Expr::Float(_) | Expr::Ident(_))
    }

    /// The expression's type, as far as it is currently known.
    ///
    /// Literals and function literals always know their type; identifiers
    /// and operators know theirs once propagation has filled them in; a
    /// call derives its type from the callee's function type.
    pub fn ty(&self) -> Option<Type> {
        match self {
            Expr::Int(_) => Some(Type::Int),
            Expr::Float(_) => Some(Type::Float),
            Expr::Ident(id) => id.ty.clone(),
            Expr::Unary(u) => u.ty.clone(),
            Expr::Binary(b) => b.ty.clone(),
            Expr::Call(c) => {
                let func_ty = c.func.ty()?;
                let (_, ret) = func_ty.as_func().map(|(p, r)| (p, r.clone()))?;
                Some(ret)
            }
            Expr::FuncLit(f) => Some(f.ty()),
        }
    }

    /// A known, non-placeholder type.
    pub fn valid_ty(&self) -> Option<Type> {
        self.ty().filter(|t| t.is_valid())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primitive_expressions() {
        assert!(Expr::Int(1).is_primitive());
        assert!(Expr::Float(2.5).is_primitive());
        assert!(Expr::ident("x").is_primitive());
        let call = Expr::Call(Box::new(Call {
            func: Expr::ident("f"),
            args: vec![],
        }));
        assert!(!call.is_primitive());
    }

    #[test]
    fn test_varset_rejects_duplicates() {
        let mut vs = ScopeVarset::default();
        vs.add_declared("x").unwrap();
        let err = vs.add_declared("x").unwrap_err();
        assert_eq!(err, CompileError::DuplicateVar("x".to_string()));
    }

    #[test]
    fn test_varset_note_absorbs_duplicates() {
        let mut vs = ScopeVarset::default();
        assert!(vs.note_free("i"));
        assert!(!vs.note_free("i"));
        assert_eq!(vs.free, vec!["i".to_string()]);
    }

    #[test]
    fn test_function_type_from_signature() {
        let f = Function {
            name: Some("add".to_string()),
            params: vec![
                Param {
                    name: "a".to_string(),
                    ty: Type::Int,
                },
                Param {
                    name: "b".to_string(),
                    ty: Type::Int,
                },
            ],
            ret: Type::Int,
            body: vec![],
            varset: ScopeVarset::default(),
        };
        assert_eq!(f.ty(), Type::func(vec![Type::Int, Type::Int], Type::Int));
    }

    #[test]
    fn test_call_type_derives_from_callee() {
        let callee = Expr::Ident(Ident::typed("f", Type::func(vec![], Type::Int)));
        let call = Expr::Call(Box::new(Call {
            func: callee,
            args: vec![],
        }));
        assert_eq!(call.ty(), Some(Type::Int));

        let untyped = Expr::Call(Box::new(Call {
            func: Expr::ident("g"),
            args: vec![],
        }));
        assert_eq!(untyped.ty(), None);
    }

    #[test]
    fn test_named_on_anonymous_literal_is_internal_error() {
        let f = Function {
            name: None,
            params: vec![],
            ret: Type::Void,
            body: vec![],
            varset: ScopeVarset::default(),
        };
        assert!(f.named().is_err());
    }
}
