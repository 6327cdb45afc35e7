//! Recursive-descent Fo parser.
//!
//! Produces a [`Program`] from a source string using the zero-copy
//! [`Lexer`].  Operator precedence follows Go: `||` binds loosest, then
//! `&&`, the relational operators, `+`/`-`, and `*`/`/`/`%` tightest;
//! unary operators bind tighter still.
//!
//! There is no error recovery — the first grammar violation aborts with a
//! [`CompileError::Parse`] carrying the offending line.  The reserved
//! keywords (`if`, `for`, `break`, …) are lexed but rejected here with a
//! dedicated message.
//!
//! One convenience in the grammar: the type in a `var` spec may
//! be omitted when an initializer is present (`var y = x + 2;`); the
//! declared type is then the placeholder type and inference fills it in.

use crate::ast::{
    Assign, BinOp, Block, Expr, Function, Ident, Param, Program, ScopeVarset, Stmt, TypeAlias,
    Unary, UnaryOp, VarSpec,
};
use crate::ast::{Binary, Call};
use crate::error::CompileError;
use crate::lexer::{Lexer, Token};
use crate::types::Type;

// ── Public entry point ────────────────────────────────────────────────────────

/// Parse a Fo source string into a [`Program`].
pub fn parse(source: &str) -> Result<Program, CompileError> {
    let mut p = Parser::new(source);
    p.parse_program()
}

// ── Parser ────────────────────────────────────────────────────────────────────

struct Parser<'src> {
    lex: Lexer<'src>,
}

impl<'src> Parser<'src> {
    fn new(src: &'src str) -> Self {
        Self {
            lex: Lexer::new(src),
        }
    }

    // ── Program ───────────────────────────────────────────────────────────────

    fn parse_program(&mut self) -> Result<Program, CompileError> {
        let mut program = Program {
            var_decls: Vec::new(),
            type_decls: Vec::new(),
            functions: Vec::new(),
        };
        loop {
            match self.lex.peek()?.clone() {
                Token::Eof => break,
                Token::KwVar => {
                    let specs = self.parse_var_decl()?;
                    program.var_decls.extend(specs);
                }
                Token::KwType => {
                    let aliases = self.parse_type_decl()?;
                    program.type_decls.extend(aliases);
                }
                Token::KwFunc => {
                    let func = self.parse_function_decl()?;
                    program.functions.push(func);
                }
                other => {
                    return Err(self.parse_error(format!(
                        "expected `var`, `type` or `func` declaration, found {}",
                        other.describe()
                    )));
                }
            }
        }
        Ok(program)
    }

    // ── Declarations ──────────────────────────────────────────────────────────

    /// `var var_spec` or `var ( var_spec+ )`.
    fn parse_var_decl(&mut self) -> Result<Vec<VarSpec>, CompileError> {
        self.lex.bump()?; // consume `var`
        if self.lex.eat(&Token::LParen)? {
            let mut specs = Vec::new();
            while !self.lex.eat(&Token::RParen)? {
                specs.push(self.parse_var_spec()?);
            }
            Ok(specs)
        } else {
            Ok(vec![self.parse_var_spec()?])
        }
    }

    /// `ID type? ( "=" expression )? ";"` — the type may only be omitted
    /// when an initializer follows.
    fn parse_var_spec(&mut self) -> Result<VarSpec, CompileError> {
        let name = self.expect_ident()?;
        let ty = match self.lex.peek()? {
            Token::Assign | Token::Semicolon => Type::Placeholder,
            _ => self.parse_type()?,
        };
        let init = if self.lex.eat(&Token::Assign)? {
            Some(self.parse_expr()?)
        } else {
            None
        };
        self.expect(&Token::Semicolon, "`;`")?;
        Ok(VarSpec {
            var: Ident::typed(name, ty),
            init,
        })
    }

    /// `type type_spec` or `type ( type_spec+ )`.
    fn parse_type_decl(&mut self) -> Result<Vec<TypeAlias>, CompileError> {
        self.lex.bump()?; // consume `type`
        if self.lex.eat(&Token::LParen)? {
            let mut aliases = Vec::new();
            while !self.lex.eat(&Token::RParen)? {
                aliases.push(self.parse_type_spec()?);
            }
            Ok(aliases)
        } else {
            Ok(vec![self.parse_type_spec()?])
        }
    }

    /// `ID "=" type ";"` — alias only; there are no type definitions.
    fn parse_type_spec(&mut self) -> Result<TypeAlias, CompileError> {
        let name = self.expect_ident()?;
        self.expect(&Token::Assign, "`=`")?;
        let ty = self.parse_type()?;
        self.expect(&Token::Semicolon, "`;`")?;
        Ok(TypeAlias { name, ty })
    }

    /// `func ID signature { stmt* }`.
    fn parse_function_decl(&mut self) -> Result<Function, CompileError> {
        self.lex.bump()?; // consume `func`
        let name = self.expect_ident()?;
        self.parse_function_tail(Some(name))
    }

    /// Signature and body, shared by declarations and literals.
    fn parse_function_tail(&mut self, name: Option<String>) -> Result<Function, CompileError> {
        let (params, ret) = self.parse_signature()?;
        self.expect(&Token::LBrace, "`{`")?;
        let body = self.parse_stmts_until_rbrace()?;
        Ok(Function {
            name,
            params,
            ret,
            body,
            varset: ScopeVarset::default(),
        })
    }

    /// `( param_list ) type?` — the result type is present iff the next
    /// token can start a type.
    fn parse_signature(&mut self) -> Result<(Vec<Param>, Type), CompileError> {
        self.expect(&Token::LParen, "`(`")?;
        let mut params = Vec::new();
        if !self.lex.eat(&Token::RParen)? {
            loop {
                let name = self.expect_ident()?;
                let ty = self.parse_type()?;
                params.push(Param { name, ty });
                if !self.lex.eat(&Token::Comma)? {
                    break;
                }
            }
            self.expect(&Token::RParen, "`)`")?;
        }
        let ret = match self.lex.peek()? {
            Token::Ident(_) | Token::KwFunc => self.parse_type()?,
            _ => Type::Void,
        };
        Ok((params, ret))
    }

    /// `ID | func signature`.
    fn parse_type(&mut self) -> Result<Type, CompileError> {
        match self.lex.peek()?.clone() {
            Token::Ident(name) => {
                self.lex.bump()?;
                Ok(Type::from_name(name))
            }
            Token::KwFunc => {
                self.lex.bump()?;
                let (params, ret) = self.parse_signature()?;
                Ok(Type::func(params.into_iter().map(|p| p.ty).collect(), ret))
            }
            other => Err(self.parse_error(format!("expected type, found {}", other.describe()))),
        }
    }

    // ── Statements ────────────────────────────────────────────────────────────

    fn parse_stmts_until_rbrace(&mut self) -> Result<Vec<Stmt>, CompileError> {
        let mut stmts = Vec::new();
        loop {
            match self.lex.peek()? {
                Token::RBrace => {
                    self.lex.bump()?;
                    return Ok(stmts);
                }
                Token::Eof => {
                    return Err(self.parse_error("expected `}`, found end of input".to_string()));
                }
                _ => self.parse_stmt_into(&mut stmts)?,
            }
        }
    }

    fn parse_stmt_into(&mut self, out: &mut Vec<Stmt>) -> Result<(), CompileError> {
        match self.lex.peek()?.clone() {
            Token::LBrace => {
                self.lex.bump()?;
                let stmts = self.parse_stmts_until_rbrace()?;
                out.push(Stmt::Block(Block {
                    stmts,
                    varset: ScopeVarset::default(),
                }));
                Ok(())
            }
            Token::KwVar => {
                let specs = self.parse_var_decl()?;
                out.extend(specs.into_iter().map(Stmt::VarSpec));
                Ok(())
            }
            Token::KwType => Err(self.parse_error(
                "type declarations are only allowed at the top level".to_string(),
            )),
            Token::KwReturn => {
                self.lex.bump()?;
                if self.lex.eat(&Token::Semicolon)? {
                    out.push(Stmt::Return(None));
                } else {
                    let expr = self.parse_expr()?;
                    self.expect(&Token::Semicolon, "`;`")?;
                    out.push(Stmt::Return(Some(expr)));
                }
                Ok(())
            }
            // An empty statement: lone `;`.
            Token::Semicolon => {
                self.lex.bump()?;
                Ok(())
            }
            tok @ (Token::KwBreak
            | Token::KwChan
            | Token::KwContinue
            | Token::KwElse
            | Token::KwFo
            | Token::KwFor
            | Token::KwIf
            | Token::KwSelect) => Err(self.parse_error(format!(
                "{} is reserved but not supported",
                tok.describe()
            ))),
            _ => {
                let expr = self.parse_expr()?;
                if self.lex.eat(&Token::Assign)? {
                    let Expr::Ident(var) = expr else {
                        return Err(self.parse_error(
                            "left-hand side of assignment must be an identifier".to_string(),
                        ));
                    };
                    let rhs = self.parse_expr()?;
                    self.expect(&Token::Semicolon, "`;`")?;
                    out.push(Stmt::Assign(Assign { var, expr: rhs }));
                } else {
                    self.expect(&Token::Semicolon, "`;`")?;
                    out.push(Stmt::Expr(expr));
                }
                Ok(())
            }
        }
    }

    // ── Expressions ───────────────────────────────────────────────────────────

    fn parse_expr(&mut self) -> Result<Expr, CompileError> {
        self.parse_binary(1)
    }

    /// Precedence climbing; all binary operators are left-associative.
    fn parse_binary(&mut self, min_prec: u8) -> Result<Expr, CompileError> {
        let mut lhs = self.parse_unary()?;
        loop {
            let Some((op, prec)) = binary_op(self.lex.peek()?) else {
                break;
            };
            if prec < min_prec {
                break;
            }
            self.lex.bump()?;
            let rhs = self.parse_binary(prec + 1)?;
            lhs = Expr::Binary(Box::new(Binary {
                lhs,
                op,
                rhs,
                ty: None,
            }));
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr, CompileError> {
        let op = match self.lex.peek()? {
            Token::Plus => Some(UnaryOp::Plus),
            Token::Minus => Some(UnaryOp::Neg),
            Token::Not => Some(UnaryOp::Not),
            Token::Arrow => Some(UnaryOp::Recv),
            _ => None,
        };
        if let Some(op) = op {
            self.lex.bump()?;
            let expr = self.parse_unary()?;
            return Ok(Expr::Unary(Box::new(Unary {
                op,
                expr,
                ty: None,
            })));
        }
        self.parse_primary()
    }

    /// `operand arguments*` — a chain of call argument lists.
    fn parse_primary(&mut self) -> Result<Expr, CompileError> {
        let mut expr = self.parse_operand()?;
        while *self.lex.peek()? == Token::LParen {
            let args = self.parse_arguments()?;
            expr = Expr::Call(Box::new(Call { func: expr, args }));
        }
        Ok(expr)
    }

    fn parse_arguments(&mut self) -> Result<Vec<Expr>, CompileError> {
        self.expect(&Token::LParen, "`(`")?;
        let mut args = Vec::new();
        if self.lex.eat(&Token::RParen)? {
            return Ok(args);
        }
        loop {
            args.push(self.parse_expr()?);
            if !self.lex.eat(&Token::Comma)? {
                break;
            }
        }
        self.expect(&Token::RParen, "`)`")?;
        Ok(args)
    }

    fn parse_operand(&mut self) -> Result<Expr, CompileError> {
        match self.lex.peek()?.clone() {
            Token::Int(v) => {
                self.lex.bump()?;
                Ok(Expr::Int(v))
            }
            Token::Float(v) => {
                self.lex.bump()?;
                Ok(Expr::Float(v))
            }
            Token::Ident(name) => {
                self.lex.bump()?;
                Ok(Expr::ident(name))
            }
            Token::LParen => {
                self.lex.bump()?;
                let expr = self.parse_expr()?;
                self.expect(&Token::RParen, "`)`")?;
                Ok(expr)
            }
            // Anonymous function literal: `func signature { stmt* }`.
            Token::KwFunc => {
                self.lex.bump()?;
                let lit = self.parse_function_tail(None)?;
                Ok(Expr::FuncLit(Box::new(lit)))
            }
            other => Err(self.parse_error(format!(
                "expected expression, found {}",
                other.describe()
            ))),
        }
    }

    // ── Helpers ───────────────────────────────────────────────────────────────

    fn expect_ident(&mut self) -> Result<String, CompileError> {
        match self.lex.peek()?.clone() {
            Token::Ident(name) => {
                self.lex.bump()?;
                Ok(name.to_string())
            }
            other => Err(self.parse_error(format!(
                "expected identifier, found {}",
                other.describe()
            ))),
        }
    }

    fn expect(&mut self, tok: &Token<'src>, what: &str) -> Result<(), CompileError> {
        if self.lex.eat(tok)? {
            Ok(())
        } else {
            let found = self.lex.peek()?.describe();
            Err(self.parse_error(format!("expected {what}, found {found}")))
        }
    }

    fn parse_error(&mut self, message: String) -> CompileError {
        let line = match self.lex.peek_offset() {
            Ok(offset) => self.lex.line_at(offset),
            Err(_) => 1,
        };
        CompileError::Parse { line, message }
    }
}

fn binary_op(tok: &Token<'_>) -> Option<(BinOp, u8)> {
    let pair = match tok {
        Token::OrOr => (BinOp::Or, 1),
        Token::AndAnd => (BinOp::And, 2),
        Token::EqEq => (BinOp::Eq, 3),
        Token::NotEq => (BinOp::Ne, 3),
        Token::Lt => (BinOp::Lt, 3),
        Token::Le => (BinOp::Le, 3),
        Token::Gt => (BinOp::Gt, 3),
        Token::Ge => (BinOp::Ge, 3),
        Token::Plus => (BinOp::Add, 4),
        Token::Minus => (BinOp::Sub, 4),
        Token::Star => (BinOp::Mul, 5),
        Token::Slash => (BinOp::Div, 5),
        Token::Percent => (BinOp::Mod, 5),
        _ => return None,
    };
    Some(pair)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
