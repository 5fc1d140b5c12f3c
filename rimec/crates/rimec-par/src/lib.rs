//! rimec-par - Recursive-descent parser for the Rime language.
//!
//! The parser pulls tokens from [`rimec_lex::Lexer`] on demand and builds
//! an arena-allocated [`ast::Ast`]. Statement dispatch on an identifier
//! uses two-token lookahead (`x := ..` declares, `x = ..` assigns,
//! anything else is an expression statement). Expressions go through the
//! shunting-yard sub-parser in [`expr`].
//!
//! Every parse function returns `Option`; a `None` means a diagnostic has
//! been rendered and the sticky `error` flag is set, so outer frames
//! unwind without emitting cascading diagnostics of their own.

pub mod ast;
pub mod expr;

use bumpalo::Bump;
use thiserror::Error;

use rimec_lex::{Lexer, Token, TokenKind};
use rimec_util::{Diagnostic, Renderer, Span};

use crate::ast::{Assign, Ast, Const, ConstKind, Ident, IfBranch, IfChain, Proc, Stmt};

/// A parse error. All diagnostics have already been written to stderr.
#[derive(Debug, Error)]
#[error("parse error")]
pub struct ParseError;

/// Parses `source` into an AST allocated in `arena`.
pub fn parse<'a>(arena: &'a Bump, source: &'a str) -> Result<Ast<'a>, ParseError> {
    Parser::new(arena, source).parse_ast()
}

/// Recursive-descent parser.
pub struct Parser<'a> {
    pub(crate) arena: &'a Bump,
    pub(crate) lexer: Lexer<'a>,
    pub(crate) renderer: Renderer<'a>,
    /// Sticky error flag: once set, outer frames stay quiet.
    pub(crate) error: bool,
}

impl<'a> Parser<'a> {
    /// Creates a parser over `source`, allocating AST nodes in `arena`.
    pub fn new(arena: &'a Bump, source: &'a str) -> Self {
        Self {
            arena,
            lexer: Lexer::new(source),
            renderer: Renderer::new(source),
            error: false,
        }
    }

    /// Parses a whole source file: `const* EOF`.
    pub fn parse_ast(mut self) -> Result<Ast<'a>, ParseError> {
        let mut consts = Vec::new();

        loop {
            let tk = self.peek().ok_or(ParseError)?;
            if tk.kind == TokenKind::Eof {
                break;
            }

            match self.parse_const() {
                Some(c) => consts.push(c),
                None => return Err(ParseError),
            }
        }

        Ok(Ast { consts })
    }

    /// Parses one `IDENT '::' (proc | string | expr)` definition.
    fn parse_const(&mut self) -> Option<Const<'a>> {
        let tk = self.next()?;

        if tk.kind != TokenKind::Ident {
            self.error = true;

            if tk.kind.is_keyword() {
                Diagnostic::error("keywords cannot be used as identifiers")
                    .with_snippet(tk.span, "this is a keyword")
                    .emit(&self.renderer);
            } else {
                self.report_unexpected(tk, "an identifier", None);
            }

            return None;
        }

        let ident = self.ident_of(tk);

        self.expect(TokenKind::ColonColon, "'::'")?;

        let tk = self.peek()?;

        let kind = match tk.kind {
            TokenKind::Proc => {
                let kind = self.parse_proc()?;

                // The semicolon after a body's closing '}' is optional;
                // a declaration consumed its own inside parse_proc.
                if matches!(kind, ConstKind::Proc(_)) && self.peek()?.kind == TokenKind::Semicolon {
                    self.next()?;
                }

                return Some(Const { ident, kind });
            }

            TokenKind::Str => {
                self.next()?;
                // Strip the quotes; the payload borrows the source buffer.
                let text = Span::new(tk.span.start + 1, tk.span.end - 1);
                ConstKind::Str(text.slice(self.lexer.source()))
            }

            TokenKind::Int | TokenKind::Ident => ConstKind::Expr(self.parse_expression()?),

            TokenKind::Eof => {
                self.report_unexpected(tk, "an expression or procedure definition", None);
                return None;
            }

            _ => {
                self.report_unexpected(tk, "a procedure or expression definition", None);
                return None;
            }
        };

        self.expect_semicolon()?;

        Some(Const { ident, kind })
    }

    /// Parses `proc '(' ')' (';' | '{' stmt* '}')`; the `proc` keyword has
    /// not been consumed yet.
    fn parse_proc(&mut self) -> Option<ConstKind<'a>> {
        self.expect(TokenKind::Proc, "'proc'")?;
        self.expect(TokenKind::LParen, "'('")?;
        self.expect_with_note(
            TokenKind::RParen,
            "')'",
            "for the time being, procedures can take no arguments",
        )?;

        let tk = self.next()?;

        if tk.kind == TokenKind::Semicolon {
            return Some(ConstKind::ProcDecl);
        }

        if tk.kind != TokenKind::LBrace {
            self.report_unexpected(
                tk,
                "'{' or ';'",
                Some("for the time being, procedures cannot define their return type, it is assumed to be i64"),
            );
            return None;
        }

        let body = self.parse_block_stmts()?;
        self.expect(TokenKind::RBrace, "'}'")?;

        Some(ConstKind::Proc(Proc { params: &[], body }))
    }

    /// Parses statements up to (but not including) a closing `}`.
    fn parse_block_stmts(&mut self) -> Option<&'a [Stmt<'a>]> {
        let mut stmts = Vec::new();

        loop {
            let tk = self.peek()?;
            if tk.kind == TokenKind::RBrace || tk.kind == TokenKind::Eof {
                break;
            }

            stmts.push(self.parse_stmt()?);
        }

        Some(self.arena.alloc_slice_copy(&stmts))
    }

    /// Parses a single statement.
    fn parse_stmt(&mut self) -> Option<Stmt<'a>> {
        let tk = self.peek()?;

        let stmt = match tk.kind {
            TokenKind::Return => {
                self.next()?;

                let tk = self.peek()?;

                if tk.kind == TokenKind::Eof {
                    self.report_unexpected(tk, "an expression or ';'", None);
                    return None;
                }

                if tk.kind == TokenKind::Semicolon {
                    self.next()?;
                    return Some(Stmt::Return(None));
                }

                Stmt::Return(Some(self.parse_expression()?))
            }

            TokenKind::If => {
                let chain = self.parse_if()?;

                // The statement loop does not demand a ';' after an
                // if-chain, but accepts a stray one.
                if self.peek()?.kind == TokenKind::Semicolon {
                    self.next()?;
                }

                return Some(Stmt::If(chain));
            }

            TokenKind::Ident => match self.lexer.peek_n(2).ok() {
                Some(tk2) if tk2.kind == TokenKind::ColonEq => Stmt::Let(self.parse_let()?),
                Some(tk2) if tk2.kind == TokenKind::Eq => Stmt::Assign(self.parse_assign()?),
                Some(_) => Stmt::Expr(self.parse_expression()?),
                None => {
                    self.error = true;
                    return None;
                }
            },

            TokenKind::Eof => {
                self.report_unexpected(tk, "a statement", None);
                return None;
            }

            _ => Stmt::Expr(self.parse_expression()?),
        };

        self.expect_semicolon()?;

        Some(stmt)
    }

    /// Parses `IDENT ':=' expr`.
    fn parse_let(&mut self) -> Option<Assign<'a>> {
        let tk = self.expect(TokenKind::Ident, "an identifier")?;
        let ident = self.ident_of(tk);

        self.expect(TokenKind::ColonEq, "':='")?;

        let value = self.parse_expression()?;

        Some(Assign { ident, value })
    }

    /// Parses `IDENT '=' expr`.
    fn parse_assign(&mut self) -> Option<Assign<'a>> {
        let tk = self.expect(TokenKind::Ident, "an identifier")?;
        let ident = self.ident_of(tk);

        self.expect(TokenKind::Eq, "'='")?;

        let value = self.parse_expression()?;

        Some(Assign { ident, value })
    }

    /// Parses one `if expr '{' stmt* '}'` branch.
    fn parse_branch(&mut self) -> Option<IfBranch<'a>> {
        self.expect(TokenKind::If, "'if'")?;

        let cond = self.parse_expression()?;

        self.expect(TokenKind::LBrace, "'{'")?;
        let body = self.parse_block_stmts()?;
        self.expect(TokenKind::RBrace, "'}'")?;

        Some(IfBranch { cond, body })
    }

    /// Parses a full `if` / `else if` / `else` chain.
    fn parse_if(&mut self) -> Option<IfChain<'a>> {
        let mut branches = vec![self.parse_branch()?];
        let mut else_body: &'a [Stmt<'a>] = &[];

        loop {
            if self.peek()?.kind != TokenKind::Else {
                break;
            }
            self.next()?;

            if self.peek()?.kind == TokenKind::If {
                branches.push(self.parse_branch()?);
                continue;
            }

            self.expect(TokenKind::LBrace, "'{'")?;
            else_body = self.parse_block_stmts()?;
            self.expect(TokenKind::RBrace, "'}'")?;

            break;
        }

        Some(IfChain {
            branches: self.arena.alloc_slice_copy(&branches),
            else_body,
        })
    }

    // =========================================================================
    // Token plumbing and diagnostics
    // =========================================================================

    pub(crate) fn ident_of(&self, tk: Token) -> Ident<'a> {
        Ident {
            name: tk.span.slice(self.lexer.source()),
            span: tk.span,
        }
    }

    /// Consumes the next token; a lex failure sets the sticky flag.
    pub(crate) fn next(&mut self) -> Option<Token> {
        match self.lexer.next() {
            Ok(tk) => Some(tk),
            Err(_) => {
                self.error = true;
                None
            }
        }
    }

    /// Peeks the next token without consuming it.
    pub(crate) fn peek(&mut self) -> Option<Token> {
        match self.lexer.peek() {
            Ok(tk) => Some(tk),
            Err(_) => {
                self.error = true;
                None
            }
        }
    }

    /// Consumes the next token and requires it to be `kind`.
    pub(crate) fn expect(&mut self, kind: TokenKind, expected: &str) -> Option<Token> {
        let tk = self.next()?;

        if tk.kind == kind {
            return Some(tk);
        }

        self.report_unexpected(tk, expected, None);
        None
    }

    /// Like [`Parser::expect`], with an extra note on the unexpected-token
    /// branch.
    fn expect_with_note(&mut self, kind: TokenKind, expected: &str, note: &str) -> Option<Token> {
        let tk = self.next()?;

        if tk.kind == kind {
            return Some(tk);
        }

        self.report_unexpected(tk, expected, Some(note));
        None
    }

    /// Requires a `;`, attaching the "perhaps you forgot to add a ';'
    /// here" anchor at the end of the previous token.
    fn expect_semicolon(&mut self) -> Option<Token> {
        let tk = self.next()?;

        if tk.kind == TokenKind::Semicolon {
            return Some(tk);
        }

        self.error = true;
        let anchor = Span::point(self.lexer.previous().span.end);

        let diag = if tk.kind == TokenKind::Eof {
            Diagnostic::error("input unexpectedly ended").with_info_snippet(anchor, "here")
        } else {
            Diagnostic::error(format!("got an unexpected {} token", tk.kind))
                .with_snippet(tk.span, "unexpected token")
        };

        diag.with_info_snippet(anchor, "perhaps you forgot to add a ';' here")
            .with_help("expected ';'")
            .emit(&self.renderer);

        None
    }

    /// Reports the standard unexpected-token / unexpected-EOF diagnostic
    /// pair and sets the sticky flag.
    pub(crate) fn report_unexpected(&mut self, tk: Token, expected: &str, note: Option<&str>) {
        self.error = true;

        if tk.kind == TokenKind::Eof {
            let anchor = Span::point(self.lexer.previous().span.end);

            Diagnostic::error("input unexpectedly ended")
                .with_info_snippet(anchor, "here")
                .with_help(format!("expected {expected}"))
                .emit(&self.renderer);
        } else {
            let mut diag = Diagnostic::error(format!("got an unexpected {} token", tk.kind))
                .with_snippet(tk.span, "unexpected token")
                .with_help(format!("expected {expected}"));

            if let Some(note) = note {
                diag = diag.with_note(note);
            }

            diag.emit(&self.renderer);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{ExprKind, Op};

    #[test]
    fn test_empty_source() {
        let arena = Bump::new();
        let ast = parse(&arena, "").unwrap();
        assert!(ast.consts.is_empty());
    }

    #[test]
    fn test_integer_constant() {
        let arena = Bump::new();
        let ast = parse(&arena, "K :: 7;").unwrap();

        assert_eq!(ast.consts.len(), 1);
        assert_eq!(ast.consts[0].ident.name, "K");
        match ast.consts[0].kind {
            ConstKind::Expr(expr) => assert!(matches!(expr.kind, ExprKind::Int(7))),
            _ => panic!("expected an expression constant"),
        }
    }

    #[test]
    fn test_string_constant_strips_quotes() {
        let arena = Bump::new();
        let ast = parse(&arena, r#"greeting :: "hi";"#).unwrap();

        match ast.consts[0].kind {
            ConstKind::Str(text) => assert_eq!(text, "hi"),
            _ => panic!("expected a string constant"),
        }
    }

    #[test]
    fn test_procedure_with_return() {
        let arena = Bump::new();
        let ast = parse(&arena, "main :: proc() { return 42; }").unwrap();

        let body = match ast.consts[0].kind {
            ConstKind::Proc(proc) => proc.body,
            _ => panic!("expected a procedure"),
        };

        assert_eq!(body.len(), 1);
        match body[0] {
            Stmt::Return(Some(expr)) => assert!(matches!(expr.kind, ExprKind::Int(42))),
            _ => panic!("expected a return statement"),
        }
    }

    #[test]
    fn test_procedure_declaration() {
        let arena = Bump::new();
        let ast = parse(&arena, "putchar :: proc();").unwrap();
        assert!(matches!(ast.consts[0].kind, ConstKind::ProcDecl));
    }

    #[test]
    fn test_optional_semicolon_after_proc_body() {
        let arena = Bump::new();
        assert!(parse(&arena, "main :: proc() { };").is_ok());
        let arena = Bump::new();
        assert!(parse(&arena, "main :: proc() { }").is_ok());
    }

    #[test]
    fn test_let_and_assign_dispatch() {
        let arena = Bump::new();
        let ast = parse(&arena, "main :: proc() { x := 1; x = 2; x; }").unwrap();

        let body = match ast.consts[0].kind {
            ConstKind::Proc(proc) => proc.body,
            _ => panic!("expected a procedure"),
        };

        assert!(matches!(body[0], Stmt::Let(_)));
        assert!(matches!(body[1], Stmt::Assign(_)));
        assert!(matches!(body[2], Stmt::Expr(_)));
    }

    #[test]
    fn test_bare_return() {
        let arena = Bump::new();
        let ast = parse(&arena, "main :: proc() { return; }").unwrap();

        let body = match ast.consts[0].kind {
            ConstKind::Proc(proc) => proc.body,
            _ => panic!("expected a procedure"),
        };
        assert!(matches!(body[0], Stmt::Return(None)));
    }

    #[test]
    fn test_if_else_chain() {
        let arena = Bump::new();
        let src = "main :: proc() { if 1 { return 1; } else if 0 { return 2; } else { return 3; }; }";
        let ast = parse(&arena, src).unwrap();

        let body = match ast.consts[0].kind {
            ConstKind::Proc(proc) => proc.body,
            _ => panic!("expected a procedure"),
        };

        match body[0] {
            Stmt::If(chain) => {
                assert_eq!(chain.branches.len(), 2);
                assert_eq!(chain.else_body.len(), 1);
            }
            _ => panic!("expected an if statement"),
        }
    }

    #[test]
    fn test_if_without_trailing_semicolon() {
        let arena = Bump::new();
        let ast = parse(&arena, "main :: proc() { if 1 { } return; }").unwrap();

        let body = match ast.consts[0].kind {
            ConstKind::Proc(proc) => proc.body,
            _ => panic!("expected a procedure"),
        };
        assert_eq!(body.len(), 2);
    }

    #[test]
    fn test_expression_statement_with_call() {
        let arena = Bump::new();
        let ast = parse(&arena, "main :: proc() { f(65); }").unwrap();

        let body = match ast.consts[0].kind {
            ConstKind::Proc(proc) => proc.body,
            _ => panic!("expected a procedure"),
        };
        match body[0] {
            Stmt::Expr(expr) => assert!(matches!(expr.kind, ExprKind::Call(_))),
            _ => panic!("expected an expression statement"),
        }
    }

    #[test]
    fn test_keyword_as_constant_name_fails() {
        let arena = Bump::new();
        assert!(parse(&arena, "proc :: 1;").is_err());
    }

    #[test]
    fn test_missing_semicolon_fails() {
        let arena = Bump::new();
        assert!(parse(&arena, "K :: 7").is_err());
    }

    #[test]
    fn test_missing_double_colon_fails() {
        let arena = Bump::new();
        assert!(parse(&arena, "K 7;").is_err());
    }

    #[test]
    fn test_unclosed_body_fails() {
        let arena = Bump::new();
        assert!(parse(&arena, "main :: proc() { return 1;").is_err());
    }

    #[test]
    fn test_multiplication_binds_tighter_than_addition() {
        let arena = Bump::new();
        let ast = parse(&arena, "main :: proc() { x := 2 + 3 * 4; }").unwrap();

        let body = match ast.consts[0].kind {
            ConstKind::Proc(proc) => proc.body,
            _ => panic!("expected a procedure"),
        };
        let value = match body[0] {
            Stmt::Let(assign) => assign.value,
            _ => panic!("expected a let statement"),
        };

        match value.kind {
            ExprKind::Op(op) => {
                assert_eq!(op.op, Op::Add);
                let rhs = op.rhs.expect("binary rhs");
                match rhs.kind {
                    ExprKind::Op(inner) => assert_eq!(inner.op, Op::Mul),
                    _ => panic!("expected 3 * 4 on the right"),
                }
            }
            _ => panic!("expected an operation"),
        }
    }
}
