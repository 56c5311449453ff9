//! Token stream wrapper for the hand-written parser.

use std::ops::Range;
use std::rc::Rc;
use tomb_ast::{CompileResult, CompilerError, Phase, SourceText, Span};
use tomb_lexer::Token;

/// Token stream with lookahead and position tracking.
///
/// Owns the token vector so that `>>` can be split into two `>` tokens when
/// it closes nested generics (`map<string, array<number>>`).
pub struct TokenStream<'src> {
    tokens: Vec<(Token, Range<usize>)>,
    pos: usize,
    source: &'src SourceText,
}

impl<'src> TokenStream<'src> {
    pub fn new(tokens: Vec<(Token, Range<usize>)>, source: &'src SourceText) -> Self {
        Self {
            tokens,
            pos: 0,
            source,
        }
    }

    /// Peek at the current token without consuming it.
    pub fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(tok, _)| tok)
    }

    /// Peek at the nth token ahead without consuming.
    pub fn peek_nth(&self, n: usize) -> Option<&Token> {
        self.tokens.get(self.pos + n).map(|(tok, _)| tok)
    }

    /// Advance to the next token and return it.
    pub fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|(tok, _)| tok.clone());
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    /// Check if the current token matches the expected variant.
    pub fn check(&self, expected: &Token) -> bool {
        matches!(self.peek(), Some(t) if std::mem::discriminant(t) == std::mem::discriminant(expected))
    }

    /// Consume the current token if it matches; report whether it did.
    pub fn eat(&mut self, expected: &Token) -> bool {
        if self.check(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    /// Expect a specific token and advance past it.
    pub fn expect(&mut self, expected: Token) -> CompileResult<Span> {
        if self.check(&expected) {
            let span = self.current_span();
            self.pos += 1;
            Ok(span)
        } else {
            Err(self.error_here(format!(
                "expected {:?}, found {}",
                expected,
                self.describe_current()
            )))
        }
    }

    /// Expect an identifier and return its text.
    pub fn expect_ident(&mut self) -> CompileResult<(Rc<str>, Span)> {
        let span = self.current_span();
        match self.advance() {
            Some(Token::Ident(name)) => Ok((name, span)),
            other => Err(self.error_at(
                span,
                format!("expected identifier, found {}", describe(other.as_ref())),
            )),
        }
    }

    /// Expect `>`, splitting a `>>` token in two when generics nest.
    pub fn expect_gt(&mut self) -> CompileResult<()> {
        match self.peek() {
            Some(Token::Gt) => {
                self.pos += 1;
                Ok(())
            }
            Some(Token::Shr) => {
                let range = self.tokens[self.pos].1.clone();
                self.tokens[self.pos] = (Token::Gt, range.start + 1..range.end);
                Ok(())
            }
            _ => Err(self.error_here(format!(
                "expected '>', found {}",
                self.describe_current()
            ))),
        }
    }

    /// Check if we've reached the end of the token stream.
    pub fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    /// Span of the current token (or a zero span at EOF past the last one).
    pub fn current_span(&self) -> Span {
        if let Some((_, range)) = self.tokens.get(self.pos) {
            self.source.span(range.clone())
        } else if let Some((_, range)) = self.tokens.last() {
            self.source.span(range.end..range.end)
        } else {
            Span::zero()
        }
    }

    /// Span of the most recently consumed token.
    pub fn previous_span(&self) -> Span {
        if self.pos > 0 {
            let (_, range) = &self.tokens[self.pos - 1];
            self.source.span(range.clone())
        } else {
            Span::zero()
        }
    }

    /// Build a parse error at the current token.
    pub fn error_here(&self, message: impl Into<String>) -> CompilerError {
        self.error_at(self.current_span(), message)
    }

    /// Build a parse error at a given span.
    pub fn error_at(&self, span: Span, message: impl Into<String>) -> CompilerError {
        CompilerError::new(Phase::Parse, span, message)
            .with_column(self.source.column_of(span.start as usize))
    }

    fn describe_current(&self) -> String {
        describe(self.peek())
    }
}

fn describe(token: Option<&Token>) -> String {
    match token {
        Some(t) => format!("{t:?}"),
        None => "end of input".to_string(),
    }
}
