//! rimec-lex - Lexical analysis for the Rime language.
//!
//! The lexer produces [`Token`]s on demand with one- and two-token
//! lookahead and a short history window. Tokens are zero-copy: they carry
//! only a kind and a span into the source buffer.

pub mod lexer;
pub mod token;

pub use lexer::{LexError, Lexer};
pub use token::{Token, TokenKind};
