//! MiniScript — the reference interpreter.
//!
//! Deliberately small: one statement per line, `let` bindings, number
//! and string literals, dotted capability paths and calls. Lines whose
//! first non-blank character is `#` are comments. That is the whole
//! language; it exists so the runtime has something real to compile,
//! bind and run, while the [`Interpreter`] seam stays open for richer
//! engines.
//!
//! Free root names are checked at bind time against the scope list, so
//! a typo is a compile-stage failure rather than a mid-session one.
//! Script-local `let` bindings shadow every scope.

use std::collections::{HashMap, HashSet};

use anyhow::{anyhow, bail, Result};

use crate::scope::{resolve, Scope, Value};

use super::{CompiledScript, ExecutableUnit, Interpreter, ScriptError};

// ── Lexer ────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Let,
    Ident(String),
    Num(f64),
    Str(String),
    LParen,
    RParen,
    Comma,
    Dot,
    Eq,
    Minus,
}

fn lex(line: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = line.chars().peekable();
    while let Some(&c) = chars.peek() {
        match c {
            ' ' | '\t' => {
                chars.next();
            }
            '(' => {
                chars.next();
                tokens.push(Token::LParen);
            }
            ')' => {
                chars.next();
                tokens.push(Token::RParen);
            }
            ',' => {
                chars.next();
                tokens.push(Token::Comma);
            }
            '.' => {
                chars.next();
                tokens.push(Token::Dot);
            }
            '=' => {
                chars.next();
                tokens.push(Token::Eq);
            }
            '-' => {
                chars.next();
                tokens.push(Token::Minus);
            }
            '"' => {
                chars.next();
                let mut text = String::new();
                loop {
                    match chars.next() {
                        Some('"') => break,
                        Some('\\') => match chars.next() {
                            Some('n') => text.push('\n'),
                            Some('t') => text.push('\t'),
                            Some(c @ ('"' | '\\')) => text.push(c),
                            other => bail!("invalid escape sequence: \\{:?}", other),
                        },
                        Some(c) => text.push(c),
                        None => bail!("unterminated string literal"),
                    }
                }
                tokens.push(Token::Str(text));
            }
            c if c.is_ascii_digit() => {
                let mut num = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_ascii_digit() || c == '.' {
                        // A dot starts a path segment only after idents;
                        // after digits it is a decimal point.
                        num.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                let value: f64 = num
                    .parse()
                    .map_err(|_| anyhow!("invalid number literal `{num}`"))?;
                tokens.push(Token::Num(value));
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let mut ident = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_ascii_alphanumeric() || c == '_' {
                        ident.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(if ident == "let" {
                    Token::Let
                } else {
                    Token::Ident(ident)
                });
            }
            other => bail!("unexpected character `{other}`"),
        }
    }
    Ok(tokens)
}

// ── AST / parser ─────────────────────────────────────────

#[derive(Debug, Clone)]
enum Expr {
    Num(f64),
    Str(String),
    Ref(Vec<String>),
    Call(Vec<String>, Vec<Expr>),
}

#[derive(Debug, Clone)]
enum Stmt {
    Let(String, Expr),
    Expr(Expr),
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, pos: 0 }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn expect(&mut self, want: Token) -> Result<()> {
        match self.next() {
            Some(token) if token == want => Ok(()),
            other => bail!("expected {want:?}, found {other:?}"),
        }
    }

    fn stmt(&mut self) -> Result<Stmt> {
        let stmt = if self.peek() == Some(&Token::Let) {
            self.next();
            let name = match self.next() {
                Some(Token::Ident(name)) => name,
                other => bail!("expected a name after `let`, found {other:?}"),
            };
            self.expect(Token::Eq)?;
            Stmt::Let(name, self.expr()?)
        } else {
            Stmt::Expr(self.expr()?)
        };
        if let Some(trailing) = self.peek() {
            bail!("unexpected trailing {trailing:?}");
        }
        Ok(stmt)
    }

    fn expr(&mut self) -> Result<Expr> {
        match self.next() {
            Some(Token::Num(n)) => Ok(Expr::Num(n)),
            Some(Token::Minus) => match self.next() {
                Some(Token::Num(n)) => Ok(Expr::Num(-n)),
                other => bail!("expected a number after `-`, found {other:?}"),
            },
            Some(Token::Str(s)) => Ok(Expr::Str(s)),
            Some(Token::Ident(first)) => {
                let mut path = vec![first];
                while self.peek() == Some(&Token::Dot) {
                    self.next();
                    match self.next() {
                        Some(Token::Ident(seg)) => path.push(seg),
                        other => bail!("expected a name after `.`, found {other:?}"),
                    }
                }
                if self.peek() == Some(&Token::LParen) {
                    self.next();
                    let mut args = Vec::new();
                    if self.peek() != Some(&Token::RParen) {
                        loop {
                            args.push(self.expr()?);
                            match self.next() {
                                Some(Token::Comma) => continue,
                                Some(Token::RParen) => break,
                                other => bail!("expected `,` or `)`, found {other:?}"),
                            }
                        }
                    } else {
                        self.next();
                    }
                    Ok(Expr::Call(path, args))
                } else {
                    Ok(Expr::Ref(path))
                }
            }
            other => bail!("expected an expression, found {other:?}"),
        }
    }
}

// ── Interpreter ──────────────────────────────────────────

/// Compiles MiniScript source. Stateless; one instance serves any
/// number of cells.
#[derive(Default)]
pub struct MiniInterpreter;

impl MiniInterpreter {
    pub fn new() -> Self {
        Self
    }
}

impl Interpreter for MiniInterpreter {
    fn compile(&self, source: &str) -> Result<Box<dyn CompiledScript>> {
        let mut stmts = Vec::new();
        for (line_no, line) in source.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let tokens = lex(trimmed).map_err(|e| anyhow!("line {}: {e}", line_no + 1))?;
            let stmt = Parser::new(tokens)
                .stmt()
                .map_err(|e| anyhow!("line {}: {e}", line_no + 1))?;
            stmts.push(stmt);
        }
        Ok(Box::new(MiniScript { stmts }))
    }
}

struct MiniScript {
    stmts: Vec<Stmt>,
}

impl MiniScript {
    fn check_expr(expr: &Expr, locals: &HashSet<String>, scopes: &[Scope]) -> Result<()> {
        match expr {
            Expr::Num(_) | Expr::Str(_) => Ok(()),
            Expr::Ref(path) => Self::check_root(path, locals, scopes),
            Expr::Call(path, args) => {
                Self::check_root(path, locals, scopes)?;
                for arg in args {
                    Self::check_expr(arg, locals, scopes)?;
                }
                Ok(())
            }
        }
    }

    fn check_root(path: &[String], locals: &HashSet<String>, scopes: &[Scope]) -> Result<()> {
        let root = &path[0];
        if locals.contains(root) || resolve(scopes, root).is_some() {
            Ok(())
        } else {
            bail!("unknown name `{root}`")
        }
    }
}

impl CompiledScript for MiniScript {
    fn bind(&self, scopes: &[Scope]) -> Result<Box<dyn ExecutableUnit>> {
        let mut locals = HashSet::new();
        for stmt in &self.stmts {
            match stmt {
                Stmt::Let(name, expr) => {
                    Self::check_expr(expr, &locals, scopes)?;
                    locals.insert(name.clone());
                }
                Stmt::Expr(expr) => Self::check_expr(expr, &locals, scopes)?,
            }
        }
        Ok(Box::new(MiniUnit {
            stmts: self.stmts.clone(),
            scopes: scopes.to_vec(),
        }))
    }
}

struct MiniUnit {
    stmts: Vec<Stmt>,
    scopes: Vec<Scope>,
}

impl MiniUnit {
    fn eval(&self, expr: &Expr, locals: &HashMap<String, Value>) -> Result<Value, ScriptError> {
        match expr {
            Expr::Num(n) => Ok(Value::Number(*n)),
            Expr::Str(s) => Ok(Value::Text(s.clone())),
            Expr::Ref(path) => self.lookup(path, locals),
            Expr::Call(path, args) => {
                let target = self.lookup(path, locals)?;
                let Value::Func(f) = target else {
                    return Err(ScriptError::Type(format!(
                        "`{}` is not a function",
                        path.join(".")
                    )));
                };
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(self.eval(arg, locals)?);
                }
                f(&values)
            }
        }
    }

    fn lookup(&self, path: &[String], locals: &HashMap<String, Value>) -> Result<Value, ScriptError> {
        let root = &path[0];
        let mut current = locals
            .get(root)
            .cloned()
            .or_else(|| resolve(&self.scopes, root).cloned())
            .ok_or_else(|| ScriptError::Name(root.clone()))?;
        for segment in &path[1..] {
            current = match current {
                Value::Map(map) => map
                    .get(segment)
                    .cloned()
                    .ok_or_else(|| ScriptError::Name(path.join(".")))?,
                other => {
                    return Err(ScriptError::Type(format!(
                        "`{}` is not a map (got `{}`)",
                        path.join("."),
                        other.type_name()
                    )))
                }
            };
        }
        Ok(current)
    }
}

impl ExecutableUnit for MiniUnit {
    fn run(&self) -> Result<(), ScriptError> {
        let mut locals = HashMap::new();
        for stmt in &self.stmts {
            match stmt {
                Stmt::Let(name, expr) => {
                    let value = self.eval(expr, &locals)?;
                    locals.insert(name.clone(), value);
                }
                Stmt::Expr(expr) => {
                    self.eval(expr, &locals)?;
                }
            }
        }
        Ok(())
    }
}
