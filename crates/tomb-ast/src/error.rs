//! Compile-time diagnostics.
//!
//! A compilation either completes or fails fast with a single
//! [`CompilerError`]. There are no warnings, no recovery and no partial
//! output; the first failure aborts the pipeline.

use crate::span::Span;
use std::fmt;
use thiserror::Error;

/// Compiler phase that raised a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Tokenization
    Lex,
    /// Syntax analysis
    Parse,
    /// Name resolution
    Resolve,
    /// Type checking and elaboration
    TypeCheck,
    /// Assembly emission
    CodeGen,
    /// Binary encoding
    Assemble,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Lex => "lex",
            Phase::Parse => "parse",
            Phase::Resolve => "resolve",
            Phase::TypeCheck => "type-check",
            Phase::CodeGen => "codegen",
            Phase::Assemble => "assemble",
        };
        write!(f, "{name}")
    }
}

/// The single error kind raised by the compiler.
///
/// Carries the 1-based source line and column where compilation stopped, the
/// phase that detected the problem and a human-readable message. Tests match
/// on message substrings ("duplicate", "deprecated", "precision",
/// "not implemented"), so those fragments are part of the stable surface.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{phase} error at line {line}: {message}")]
pub struct CompilerError {
    /// 1-based source line.
    pub line: u32,
    /// 1-based column within the line (0 when unknown).
    pub column: u32,
    /// Phase that detected the failure.
    pub phase: Phase,
    /// Human-readable explanation.
    pub message: String,
}

impl CompilerError {
    /// Create an error anchored to a span.
    pub fn new(phase: Phase, span: Span, message: impl Into<String>) -> Self {
        Self {
            line: span.line,
            column: 0,
            phase,
            message: message.into(),
        }
    }

    /// Create an error with an explicit line/column.
    pub fn at(phase: Phase, line: u32, column: u32, message: impl Into<String>) -> Self {
        Self {
            line,
            column,
            phase,
            message: message.into(),
        }
    }

    /// Attach a column after construction.
    pub fn with_column(mut self, column: u32) -> Self {
        self.column = column;
        self
    }
}

/// Result type for compilation operations.
pub type CompileResult<T> = Result<T, CompilerError>;
