//! The scanner.
//!
//! [`Lexer`] walks the source buffer byte by byte and hands out tokens on
//! demand. It keeps a ring of up to two peeked tokens (the parser needs
//! two-token lookahead to tell `x := ..` from `x = ..`) and a history of
//! the last two consumed tokens, which diagnostics use to anchor
//! "input unexpectedly ended" messages at the end of the last real token.
//!
//! Lexical errors are rendered immediately; the returned [`LexError`] only
//! tells the caller that a diagnostic has already been printed.

use thiserror::Error;

use rimec_util::{Diagnostic, Renderer, Span};

use crate::token::{keyword, Token, TokenKind};

/// A lexical error. The diagnostic has already been written to stderr.
#[derive(Debug, Error)]
#[error("lexical error")]
pub struct LexError;

/// Lexer for the Rime language.
pub struct Lexer<'src> {
    /// The source buffer.
    source: &'src str,
    /// Current byte position in the source.
    pos: usize,
    /// Diagnostic renderer over the source.
    renderer: Renderer<'src>,

    /// Ring of tokens scanned ahead of the consumer.
    peeked: [Token; 2],
    num_peeked: usize,
    /// The last two consumed tokens, most recent first.
    history: [Token; 2],
}

impl<'src> Lexer<'src> {
    /// Creates a lexer over `source`.
    pub fn new(source: &'src str) -> Self {
        Self {
            source,
            pos: 0,
            renderer: Renderer::new(source),
            peeked: [Token::eof(0); 2],
            num_peeked: 0,
            history: [Token::eof(0); 2],
        }
    }

    /// The source buffer this lexer reads from.
    pub fn source(&self) -> &'src str {
        self.source
    }

    /// Consumes and returns the next token.
    ///
    /// End of input is an ordinary [`TokenKind::Eof`] token; an `Err`
    /// means a lexical error was reported.
    pub fn next(&mut self) -> Result<Token, LexError> {
        let tk = self.next_no_history()?;

        self.history[1] = self.history[0];
        self.history[0] = tk;

        Ok(tk)
    }

    /// Returns the next token without consuming it.
    pub fn peek(&mut self) -> Result<Token, LexError> {
        self.peek_n(1)
    }

    /// Returns the `n`-th upcoming token (1-based, `n <= 2`) without
    /// consuming anything.
    pub fn peek_n(&mut self, n: usize) -> Result<Token, LexError> {
        debug_assert!(n >= 1 && n <= self.peeked.len());

        while self.num_peeked < n {
            let tk = self.scan_token()?;
            self.peeked[self.num_peeked] = tk;
            self.num_peeked += 1;
        }

        Ok(self.peeked[n - 1])
    }

    /// The token consumed before the most recent one.
    ///
    /// When a parse function consumes an unexpected token (or EOF), this is
    /// the last token of the well-formed prefix, which is where "perhaps
    /// you forgot ..." anchors point.
    pub fn previous(&self) -> Token {
        self.history[1]
    }

    fn next_no_history(&mut self) -> Result<Token, LexError> {
        if self.num_peeked > 0 {
            let tk = self.peeked[0];
            self.peeked[0] = self.peeked[1];
            self.num_peeked -= 1;
            return Ok(tk);
        }

        self.scan_token()
    }

    fn scan_token(&mut self) -> Result<Token, LexError> {
        let bytes = self.source.as_bytes();

        while self.pos < bytes.len() && bytes[self.pos].is_ascii_whitespace() {
            self.pos += 1;
        }

        let start = self.pos;

        if self.pos >= bytes.len() {
            return Ok(Token::eof(start));
        }

        let b = bytes[self.pos];

        if b.is_ascii_alphabetic() || b == b'_' {
            self.eat_word();
            let span = Span::new(start, self.pos);
            let kind = keyword(span.slice(self.source)).unwrap_or(TokenKind::Ident);
            return Ok(Token::new(kind, span));
        }

        if b.is_ascii_digit() {
            while self.pos < bytes.len() && bytes[self.pos].is_ascii_digit() {
                self.pos += 1;
            }

            if self.pos < bytes.len()
                && (bytes[self.pos].is_ascii_alphabetic() || bytes[self.pos] == b'_')
            {
                // The rest of the word is swallowed so the underline covers
                // the whole malformed identifier.
                self.eat_word();
                let span = Span::new(start, self.pos);

                Diagnostic::error("identifiers cannot start with a digit")
                    .with_snippet(span, "this identifier")
                    .with_help("identifiers can only start with 'a-z', 'A-Z', or '_'")
                    .emit(&self.renderer);

                return Err(LexError);
            }

            return Ok(Token::new(TokenKind::Int, Span::new(start, self.pos)));
        }

        self.pos += 1;

        let kind = match b {
            b'"' => return self.scan_string(start),

            b':' => {
                if self.eat(b':') {
                    TokenKind::ColonColon
                } else if self.eat(b'=') {
                    TokenKind::ColonEq
                } else {
                    Diagnostic::error("use of invalid token")
                        .with_snippet(Span::new(start, start + 2), "here")
                        .with_help("perhaps you meant to use '::' or ':='")
                        .emit(&self.renderer);

                    return Err(LexError);
                }
            }

            b'=' => {
                if self.eat(b'=') {
                    TokenKind::EqEq
                } else {
                    TokenKind::Eq
                }
            }

            b'!' => {
                if self.eat(b'=') {
                    TokenKind::NotEq
                } else {
                    Diagnostic::error("use of invalid token")
                        .with_snippet(Span::new(start, start + 2), "here")
                        .with_help("perhaps you meant to use '!='")
                        .emit(&self.renderer);

                    return Err(LexError);
                }
            }

            b'<' => {
                if self.eat(b'=') {
                    TokenKind::LtEq
                } else {
                    TokenKind::Lt
                }
            }

            b'>' => {
                if self.eat(b'=') {
                    TokenKind::GtEq
                } else {
                    TokenKind::Gt
                }
            }

            b';' => TokenKind::Semicolon,
            b',' => TokenKind::Comma,
            b'(' => TokenKind::LParen,
            b')' => TokenKind::RParen,
            b'{' => TokenKind::LBrace,
            b'}' => TokenKind::RBrace,

            b'+' => TokenKind::Plus,
            b'-' => TokenKind::Minus,
            b'*' => TokenKind::Star,

            _ => {
                Diagnostic::error("use of invalid token")
                    .with_snippet(Span::new(start, start + 1), "here")
                    .with_note("only identifiers, keywords and integers have been implemented so far")
                    .emit(&self.renderer);

                return Err(LexError);
            }
        };

        Ok(Token::new(kind, Span::new(start, self.pos)))
    }

    /// Scans the remainder of a string literal; `start` points at the
    /// opening quote, which has already been consumed.
    fn scan_string(&mut self, start: usize) -> Result<Token, LexError> {
        let bytes = self.source.as_bytes();

        loop {
            if self.pos >= bytes.len() {
                Diagnostic::error("unterminated string")
                    .with_snippet(Span::new(start, self.pos), "this string is never closed")
                    .with_help("expected a '\"'")
                    .emit(&self.renderer);

                return Err(LexError);
            }

            match bytes[self.pos] {
                b'"' => {
                    self.pos += 1;
                    break;
                }
                // Whatever follows a backslash is part of the string.
                b'\\' => self.pos = (self.pos + 2).min(bytes.len()),
                _ => self.pos += 1,
            }
        }

        Ok(Token::new(TokenKind::Str, Span::new(start, self.pos)))
    }

    fn eat_word(&mut self) {
        let bytes = self.source.as_bytes();
        while self.pos < bytes.len()
            && (bytes[self.pos].is_ascii_alphanumeric() || bytes[self.pos] == b'_')
        {
            self.pos += 1;
        }
    }

    fn eat(&mut self, expected: u8) -> bool {
        if self.pos < self.source.len() && self.source.as_bytes()[self.pos] == expected {
            self.pos += 1;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        let mut lexer = Lexer::new(source);
        let mut kinds = Vec::new();
        loop {
            let tk = lexer.next().expect("lex error");
            if tk.kind == TokenKind::Eof {
                break;
            }
            kinds.push(tk.kind);
        }
        kinds
    }

    #[test]
    fn test_empty_source() {
        let mut lexer = Lexer::new("");
        assert_eq!(lexer.next().unwrap().kind, TokenKind::Eof);
        assert_eq!(lexer.next().unwrap().kind, TokenKind::Eof);
    }

    #[test]
    fn test_keywords_and_idents() {
        assert_eq!(
            kinds("proc return if else main _tmp x1"),
            vec![
                TokenKind::Proc,
                TokenKind::Return,
                TokenKind::If,
                TokenKind::Else,
                TokenKind::Ident,
                TokenKind::Ident,
                TokenKind::Ident,
            ]
        );
    }

    #[test]
    fn test_procedure_definition() {
        assert_eq!(
            kinds("main :: proc() { return 42; }"),
            vec![
                TokenKind::Ident,
                TokenKind::ColonColon,
                TokenKind::Proc,
                TokenKind::LParen,
                TokenKind::RParen,
                TokenKind::LBrace,
                TokenKind::Return,
                TokenKind::Int,
                TokenKind::Semicolon,
                TokenKind::RBrace,
            ]
        );
    }

    #[test]
    fn test_operators() {
        assert_eq!(
            kinds("== != < > <= >= + - * = :="),
            vec![
                TokenKind::EqEq,
                TokenKind::NotEq,
                TokenKind::Lt,
                TokenKind::Gt,
                TokenKind::LtEq,
                TokenKind::GtEq,
                TokenKind::Plus,
                TokenKind::Minus,
                TokenKind::Star,
                TokenKind::Eq,
                TokenKind::ColonEq,
            ]
        );
    }

    #[test]
    fn test_token_spans_are_zero_copy() {
        let src = "answer :: 42;";
        let mut lexer = Lexer::new(src);

        let ident = lexer.next().unwrap();
        assert_eq!(ident.kind, TokenKind::Ident);
        assert_eq!(ident.text(src), "answer");

        let sep = lexer.next().unwrap();
        assert_eq!(sep.text(src), "::");

        let int = lexer.next().unwrap();
        assert_eq!(int.text(src), "42");
    }

    #[test]
    fn test_string_literal_span_includes_quotes() {
        let src = r#"greeting :: "hello, world";"#;
        let mut lexer = Lexer::new(src);
        lexer.next().unwrap();
        lexer.next().unwrap();

        let string = lexer.next().unwrap();
        assert_eq!(string.kind, TokenKind::Str);
        assert_eq!(string.text(src), "\"hello, world\"");
    }

    #[test]
    fn test_string_escape_consumes_next_char() {
        let src = r#""a\"b""#;
        let mut lexer = Lexer::new(src);
        let string = lexer.next().unwrap();
        assert_eq!(string.kind, TokenKind::Str);
        assert_eq!(string.span, Span::new(0, src.len()));
    }

    #[test]
    fn test_unterminated_string_is_an_error() {
        let mut lexer = Lexer::new("\"never closed");
        assert!(lexer.next().is_err());
    }

    #[test]
    fn test_identifier_starting_with_digit() {
        let mut lexer = Lexer::new("1abc");
        assert!(lexer.next().is_err());
    }

    #[test]
    fn test_bare_bang_is_an_error() {
        let mut lexer = Lexer::new("! x");
        assert!(lexer.next().is_err());
    }

    #[test]
    fn test_bare_colon_is_an_error() {
        let mut lexer = Lexer::new(": x");
        assert!(lexer.next().is_err());
    }

    #[test]
    fn test_unknown_character_is_an_error() {
        let mut lexer = Lexer::new("@");
        assert!(lexer.next().is_err());
    }

    #[test]
    fn test_peek_does_not_consume() {
        let mut lexer = Lexer::new("a b");

        let peeked = lexer.peek().unwrap();
        assert_eq!(peeked.kind, TokenKind::Ident);

        let next = lexer.next().unwrap();
        assert_eq!(next, peeked);
    }

    #[test]
    fn test_peek_n_two_ahead() {
        let src = "x := 1";
        let mut lexer = Lexer::new(src);

        assert_eq!(lexer.peek_n(2).unwrap().kind, TokenKind::ColonEq);
        assert_eq!(lexer.peek_n(1).unwrap().kind, TokenKind::Ident);

        assert_eq!(lexer.next().unwrap().kind, TokenKind::Ident);
        assert_eq!(lexer.next().unwrap().kind, TokenKind::ColonEq);
        assert_eq!(lexer.next().unwrap().kind, TokenKind::Int);
    }

    #[test]
    fn test_history_tracks_previous_token() {
        let mut lexer = Lexer::new("a ;");
        lexer.next().unwrap();
        lexer.next().unwrap();
        // history[0] is ';', history[1] is 'a'.
        assert_eq!(lexer.previous().kind, TokenKind::Ident);

        // Consuming EOF shifts ';' into the previous slot.
        lexer.next().unwrap();
        assert_eq!(lexer.previous().kind, TokenKind::Semicolon);
    }
}
