//! rimec-gen - Lowering from the AST to textual SSA.
//!
//! The emitter walks top-level constants in declaration order and prints
//! SSA text for the downstream code generator. Referencing a not-yet
//! emitted global emits it on the spot, so the output is topologically
//! ordered by constant dependencies; a reference back into a definition
//! that is still being emitted is a cycle and aborts the compilation.

pub mod emit;
pub mod scope;

pub use emit::{emit_ast, EmitError};
