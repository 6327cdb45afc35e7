//! Zero-copy Fo lexer.
//!
//! Produces [`Token`] variants that borrow `&'src str` slices directly from
//! the source buffer.  Every token carries its byte offset so diagnostics
//! can report a line number.
//!
//! Handles:
//! - All keyword tokens, including the reserved ones the parser rejects
//!   (`break`, `chan`, `continue`, `else`, `fo`, `for`, `if`, `select`)
//! - Operators: arithmetic, logical, relational, `=` and the unary `<-`
//! - Integer and float literals (values decoded here)
//! - `// …` line comments (skipped)
//!
//! Unlike the parser-facing cursor this was modelled on, the lexer is
//! fallible: an unrecognised character is a fatal [`CompileError::Lex`]
//! with the offending line number.

use crate::error::CompileError;
use crate::location::line_of;

// ── Token ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum Token<'src> {
    Ident(&'src str),
    Int(i64),
    Float(f64),

    // Punctuation
    LParen,    // (
    RParen,    // )
    LBrace,    // {
    RBrace,    // }
    Comma,     // ,
    Semicolon, // ;
    Assign,    // =

    // Arithmetic
    Plus,    // +
    Minus,   // -
    Star,    // *
    Slash,   // /
    Percent, // %

    // Logical
    AndAnd, // &&
    OrOr,   // ||
    Not,    // !

    // Relational
    EqEq,  // ==
    NotEq, // !=
    Lt,    // <
    Le,    // <=
    Gt,    // >
    Ge,    // >=

    /// `<-` — the receive operator, reserved for channels.
    Arrow,

    // Keywords
    KwBreak,
    KwChan,
    KwContinue,
    KwElse,
    KwFo,
    KwFor,
    KwFunc,
    KwIf,
    KwReturn,
    KwSelect,
    KwType,
    KwVar,

    Eof,
}

impl Token<'_> {
    /// Short description for parse-error messages.
    pub fn describe(&self) -> String {
        match self {
            Token::Ident(name) => format!("identifier `{name}`"),
            Token::Int(v) => format!("integer literal `{v}`"),
            Token::Float(v) => format!("float literal `{v}`"),
            Token::Eof => "end of input".to_string(),
            Token::LParen => "`(`".to_string(),
            Token::RParen => "`)`".to_string(),
            Token::LBrace => "`{`".to_string(),
            Token::RBrace => "`}`".to_string(),
            Token::Comma => "`,`".to_string(),
            Token::Semicolon => "`;`".to_string(),
            Token::Assign => "`=`".to_string(),
            Token::Plus => "`+`".to_string(),
            Token::Minus => "`-`".to_string(),
            Token::Star => "`*`".to_string(),
            Token::Slash => "`/`".to_string(),
            Token::Percent => "`%`".to_string(),
            Token::AndAnd => "`&&`".to_string(),
            Token::OrOr => "`||`".to_string(),
            Token::Not => "`!`".to_string(),
            Token::EqEq => "`==`".to_string(),
            Token::NotEq => "`!=`".to_string(),
            Token::Lt => "`<`".to_string(),
            Token::Le => "`<=`".to_string(),
            Token::Gt => "`>`".to_string(),
            Token::Ge => "`>=`".to_string(),
            Token::Arrow => "`<-`".to_string(),
            Token::KwBreak => "`break`".to_string(),
            Token::KwChan => "`chan`".to_string(),
            Token::KwContinue => "`continue`".to_string(),
            Token::KwElse => "`else`".to_string(),
            Token::KwFo => "`fo`".to_string(),
            Token::KwFor => "`for`".to_string(),
            Token::KwFunc => "`func`".to_string(),
            Token::KwIf => "`if`".to_string(),
            Token::KwReturn => "`return`".to_string(),
            Token::KwSelect => "`select`".to_string(),
            Token::KwType => "`type`".to_string(),
            Token::KwVar => "`var`".to_string(),
        }
    }
}

fn keyword<'a>(name: &str) -> Option<Token<'a>> {
    let tok = match name {
        "break" => Token::KwBreak,
        "chan" => Token::KwChan,
        "continue" => Token::KwContinue,
        "else" => Token::KwElse,
        "fo" => Token::KwFo,
        "for" => Token::KwFor,
        "func" => Token::KwFunc,
        "if" => Token::KwIf,
        "return" => Token::KwReturn,
        "select" => Token::KwSelect,
        "type" => Token::KwType,
        "var" => Token::KwVar,
        _ => return None,
    };
    Some(tok)
}

// ── TokenWithOffset ───────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct TokenWithOffset<'src> {
    pub token: Token<'src>,
    pub offset: u32,
}

// ── Lexer ─────────────────────────────────────────────────────────────────────

pub struct Lexer<'src> {
    src: &'src [u8],
    /// The same source as a `&str` — used for safe UTF-8 slicing without
    /// `unsafe` and for line-number lookups in diagnostics.
    src_str: &'src str,
    /// Current byte position.
    pos: usize,
    /// One-token lookahead buffer.
    peeked: Option<TokenWithOffset<'src>>,
}

impl<'src> Lexer<'src> {
    pub fn new(src: &'src str) -> Self {
        Self {
            src: src.as_bytes(),
            src_str: src,
            pos: 0,
            peeked: None,
        }
    }

    // ── public interface ──────────────────────────────────────────────────────

    /// Return (but do not consume) the next token.
    pub fn peek(&mut self) -> Result<&Token<'src>, CompileError> {
        if self.peeked.is_none() {
            let t = self.next_inner()?;
            self.peeked = Some(t);
        }
        Ok(&self
            .peeked
            .as_ref()
            .expect("peeked is always Some after the fill above")
            .token)
    }

    /// Return (but do not consume) the next token's byte offset.
    pub fn peek_offset(&mut self) -> Result<u32, CompileError> {
        if self.peeked.is_none() {
            let t = self.next_inner()?;
            self.peeked = Some(t);
        }
        Ok(self
            .peeked
            .as_ref()
            .expect("peeked is always Some after the fill above")
            .offset)
    }

    /// Consume and return the next token with its offset.
    pub fn consume(&mut self) -> Result<TokenWithOffset<'src>, CompileError> {
        match self.peeked.take() {
            Some(t) => Ok(t),
            None => self.next_inner(),
        }
    }

    /// Consume the next token and return just the token (discards offset).
    pub fn bump(&mut self) -> Result<Token<'src>, CompileError> {
        Ok(self.consume()?.token)
    }

    /// Consume the next token only if it matches `expected`.
    /// Returns `true` if it matched and was consumed.
    pub fn eat(&mut self, expected: &Token<'src>) -> Result<bool, CompileError> {
        if self.peek()? == expected {
            self.bump()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// The 1-indexed line containing `offset` — for parser diagnostics.
    pub fn line_at(&self, offset: u32) -> usize {
        line_of(offset as usize, self.src_str)
    }

    // ── internals ─────────────────────────────────────────────────────────────

    fn error_at(&self, offset: usize, message: impl Into<String>) -> CompileError {
        CompileError::Lex {
            line: line_of(offset, self.src_str),
            message: message.into(),
        }
    }

    fn skip_trivia(&mut self) {
        loop {
            match self.src.get(self.pos).copied() {
                Some(b' ' | b'\t' | b'\r' | b'\n') => self.pos += 1,
                Some(b'/') if self.src.get(self.pos + 1) == Some(&b'/') => {
                    while let Some(&b) = self.src.get(self.pos) {
                        if b == b'\n' {
                            break;
                        }
                        self.pos += 1;
                    }
                }
                _ => break,
            }
        }
    }

    fn next_inner(&mut self) -> Result<TokenWithOffset<'src>, CompileError> {
        self.skip_trivia();
        let offset = self.pos;
        let tok_offset = offset as u32;

        let Some(&b) = self.src.get(self.pos) else {
            return Ok(TokenWithOffset {
                token: Token::Eof,
                offset: tok_offset,
            });
        };

        let token = match b {
            b'a'..=b'z' | b'A'..=b'Z' | b'_' => {
                let start = self.pos;
                while let Some(&c) = self.src.get(self.pos) {
                    if c.is_ascii_alphanumeric() || c == b'_' {
                        self.pos += 1;
                    } else {
                        break;
                    }
                }
                let name = &self.src_str[start..self.pos];
                keyword(name).unwrap_or(Token::Ident(name))
            }
            b'0'..=b'9' => return self.lex_number(offset),
            b'.' if matches!(self.src.get(self.pos + 1).copied(), Some(b'0'..=b'9')) => {
                return self.lex_number(offset);
            }
            b'(' => {
                self.pos += 1;
                Token::LParen
            }
            b')' => {
                self.pos += 1;
                Token::RParen
            }
            b'{' => {
                self.pos += 1;
                Token::LBrace
            }
            b'}' => {
                self.pos += 1;
                Token::RBrace
            }
            b',' => {
                self.pos += 1;
                Token::Comma
            }
            b';' => {
                self.pos += 1;
                Token::Semicolon
            }
            b'+' => {
                self.pos += 1;
                Token::Plus
            }
            b'-' => {
                self.pos += 1;
                Token::Minus
            }
            b'*' => {
                self.pos += 1;
                Token::Star
            }
            b'/' => {
                self.pos += 1;
                Token::Slash
            }
            b'%' => {
                self.pos += 1;
                Token::Percent
            }
            b'=' => {
                self.pos += 1;
                if self.src.get(self.pos) == Some(&b'=') {
                    self.pos += 1;
                    Token::EqEq
                } else {
                    Token::Assign
                }
            }
            b'!' => {
                self.pos += 1;
                if self.src.get(self.pos) == Some(&b'=') {
                    self.pos += 1;
                    Token::NotEq
                } else {
                    Token::Not
                }
            }
            b'<' => {
                self.pos += 1;
                match self.src.get(self.pos) {
                    Some(&b'-') => {
                        self.pos += 1;
                        Token::Arrow
                    }
                    Some(&b'=') => {
                        self.pos += 1;
                        Token::Le
                    }
                    _ => Token::Lt,
                }
            }
            b'>' => {
                self.pos += 1;
                if self.src.get(self.pos) == Some(&b'=') {
                    self.pos += 1;
                    Token::Ge
                } else {
                    Token::Gt
                }
            }
            b'&' => {
                if self.src.get(self.pos + 1) == Some(&b'&') {
                    self.pos += 2;
                    Token::AndAnd
                } else {
                    return Err(self.error_at(offset, "unknown token `&`"));
                }
            }
            b'|' => {
                if self.src.get(self.pos + 1) == Some(&b'|') {
                    self.pos += 2;
                    Token::OrOr
                } else {
                    return Err(self.error_at(offset, "unknown token `|`"));
                }
            }
            other => {
                let ch = self.src_str[offset..]
                    .chars()
                    .next()
                    .unwrap_or(other as char);
                return Err(self.error_at(offset, format!("unknown token `{ch}`")));
            }
        };

        Ok(TokenWithOffset {
            token,
            offset: tok_offset,
        })
    }

    /// `\d+(\.\d*)?` or `\.\d+` — the leading character has already been
    /// checked to start a number.
    fn lex_number(&mut self, offset: usize) -> Result<TokenWithOffset<'src>, CompileError> {
        let start = self.pos;
        let mut is_float = false;

        while matches!(self.src.get(self.pos).copied(), Some(b'0'..=b'9')) {
            self.pos += 1;
        }
        if self.src.get(self.pos) == Some(&b'.') {
            is_float = true;
            self.pos += 1;
            while matches!(self.src.get(self.pos).copied(), Some(b'0'..=b'9')) {
                self.pos += 1;
            }
        }

        let text = &self.src_str[start..self.pos];
        let token = if is_float {
            let val: f64 = text
                .parse()
                .map_err(|_| self.error_at(offset, format!("bad float literal `{text}`")))?;
            Token::Float(val)
        } else {
            let val: i64 = text
                .parse()
                .map_err(|_| self.error_at(offset, format!("bad integer literal `{text}`")))?;
            Token::Int(val)
        };

        Ok(TokenWithOffset {
            token,
            offset: offset as u32,
        })
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
