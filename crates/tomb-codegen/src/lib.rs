//! Code generation for TombLang.
//!
//! Walks the elaborated AST and emits textual VM assembly: one entry label
//! per method, an argument-popping prologue, the lowered body, and a
//! builtin section appended once at the end of the script. Registers come
//! from a fixed-size pool whose lifetimes are tied to AST nodes.

pub mod builtins;
mod emitter;
mod gen;
mod registers;

pub use emitter::Emitter;
pub use gen::{entry_label, generate};
pub use registers::{RegId, RegisterPool, REGISTER_COUNT};
