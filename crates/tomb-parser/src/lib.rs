//! Recursive-descent parser for TombLang.
//!
//! The entry point is [`parse`], which tokenizes and parses a full source
//! unit. The parser does not attempt recovery: the first syntax error is
//! returned as a [`CompilerError`] and aborts the compilation.

mod decl;
mod expr;
mod stmt;
mod stream;
mod types;

pub use expr::parse_expr;
pub use stmt::{parse_block, parse_stmt};
pub use stream::TokenStream;
pub use types::parse_type;

use tomb_ast::{CompileResult, CompilerError, Phase, SourceText, SourceUnit};

/// Tokenize and parse a full source unit.
pub fn parse(source: &SourceText) -> CompileResult<SourceUnit> {
    let tokens = tomb_lexer::lex(source.text()).map_err(|err| {
        CompilerError::at(
            Phase::Lex,
            source.line_of(err.offset),
            source.column_of(err.offset),
            "unrecognized token",
        )
    })?;
    let mut stream = TokenStream::new(tokens, source);
    decl::parse_unit(&mut stream)
}
