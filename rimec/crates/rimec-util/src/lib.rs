//! rimec-util - Shared infrastructure for the Rime compiler.
//!
//! This crate provides the two pieces every phase of the pipeline depends
//! on: source spans ([`Span`]) and diagnostic rendering ([`Diagnostic`],
//! [`Renderer`]). It sits at the bottom of the crate graph and has no
//! knowledge of tokens, ASTs, or SSA.

pub mod diagnostic;
pub mod span;

pub use diagnostic::{Diagnostic, Level, Renderer};
pub use span::Span;
