//! Semantic elaboration for TombLang.
//!
//! This crate owns everything between parsing and code generation: the
//! lexical scope model, the built-in library catalog, bottom-up type
//! checking with the language's implicit conversions, and compile-time
//! macro expansion.

mod check;
pub mod libraries;
pub mod macros;
pub mod scope;

pub use check::{elaborate, CheckedUnit, MethodSig};
pub use libraries::{CustomKind, LibMethod, Library, LibraryRegistry, Lowering};
pub use scope::{Scope, ScopeArena, ScopeId, Symbol};
