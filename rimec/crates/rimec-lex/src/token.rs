//! Token kinds and the token type.

use std::fmt;

use rimec_util::Span;

/// The kind of a lexical token.
///
/// The operator tokens `/ % | ^ & << >>` are reserved: they are part of the
/// token set and the expression parser's operator tables, but the scanner
/// does not currently produce them.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenKind {
    // Keywords
    /// `proc` - procedure definition keyword.
    Proc,
    /// `return` keyword.
    Return,
    /// `if` keyword.
    If,
    /// `else` keyword.
    Else,

    // Literals and names
    /// An identifier.
    Ident,
    /// An integer literal.
    Int,
    /// A string literal; the span includes both quotes.
    Str,

    // Punctuation
    /// `::` - constant definition.
    ColonColon,
    /// `:=` - variable declaration.
    ColonEq,
    /// `=` - assignment.
    Eq,
    /// `;`
    Semicolon,
    /// `,`
    Comma,
    /// `(`
    LParen,
    /// `)`
    RParen,
    /// `{`
    LBrace,
    /// `}`
    RBrace,

    // Operators
    /// `==`
    EqEq,
    /// `!=`
    NotEq,
    /// `>`
    Gt,
    /// `<`
    Lt,
    /// `>=`
    GtEq,
    /// `<=`
    LtEq,
    /// `|` (reserved)
    Pipe,
    /// `^` (reserved)
    Caret,
    /// `&` (reserved)
    Ampersand,
    /// `<<` (reserved)
    Shl,
    /// `>>` (reserved)
    Shr,
    /// `+`
    Plus,
    /// `-`
    Minus,
    /// `*`
    Star,
    /// `/` (reserved)
    Slash,
    /// `%` (reserved)
    Percent,

    /// End of input.
    Eof,
}

impl TokenKind {
    /// Returns true for the keyword kinds.
    pub fn is_keyword(self) -> bool {
        matches!(
            self,
            TokenKind::Proc | TokenKind::Return | TokenKind::If | TokenKind::Else
        )
    }
}

/// Maps a scanned word to its keyword kind, if it is one.
pub fn keyword(word: &str) -> Option<TokenKind> {
    match word {
        "proc" => Some(TokenKind::Proc),
        "return" => Some(TokenKind::Return),
        "if" => Some(TokenKind::If),
        "else" => Some(TokenKind::Else),
        _ => None,
    }
}

impl fmt::Display for TokenKind {
    /// The human-readable description used in diagnostics, e.g.
    /// `got an unexpected ';' token`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TokenKind::Proc => "proc",
            TokenKind::Return => "return",
            TokenKind::If => "if",
            TokenKind::Else => "else",
            TokenKind::Ident => "identifier",
            TokenKind::Int => "integer",
            TokenKind::Str => "string",
            TokenKind::ColonColon => "'::'",
            TokenKind::ColonEq => "':='",
            TokenKind::Eq => "'='",
            TokenKind::Semicolon => "';'",
            TokenKind::Comma => "','",
            TokenKind::LParen => "'('",
            TokenKind::RParen => "')'",
            TokenKind::LBrace => "'{'",
            TokenKind::RBrace => "'}'",
            TokenKind::EqEq => "'=='",
            TokenKind::NotEq => "'!='",
            TokenKind::Gt => "'>'",
            TokenKind::Lt => "'<'",
            TokenKind::GtEq => "'>='",
            TokenKind::LtEq => "'<='",
            TokenKind::Pipe => "'|'",
            TokenKind::Caret => "'^'",
            TokenKind::Ampersand => "'&'",
            TokenKind::Shl => "'<<'",
            TokenKind::Shr => "'>>'",
            TokenKind::Plus => "'+'",
            TokenKind::Minus => "'-'",
            TokenKind::Star => "'*'",
            TokenKind::Slash => "'/'",
            TokenKind::Percent => "'%'",
            TokenKind::Eof => "eof",
        };
        f.write_str(s)
    }
}

/// A lexical token: a kind plus its span in the source buffer.
///
/// The span is the token's only payload; identifier names and literal text
/// are read back out of the source with [`Token::text`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    /// Creates a token.
    pub fn new(kind: TokenKind, span: Span) -> Self {
        Self { kind, span }
    }

    /// Creates an end-of-input token anchored at `pos`.
    pub fn eof(pos: usize) -> Self {
        Self {
            kind: TokenKind::Eof,
            span: Span::point(pos),
        }
    }

    /// Returns the source text the token covers.
    pub fn text<'src>(&self, source: &'src str) -> &'src str {
        self.span.slice(source)
    }
}
