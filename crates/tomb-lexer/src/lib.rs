//! Lexical analysis for TombLang.
//!
//! Tokenization of TombLang source using logos.
//!
//! # Design
//!
//! - `Token` — all TombLang token types (keywords, operators, literals, identifiers)
//! - Comments are stripped during lexing (not tokens); `/* */` blocks nest
//! - Literal payloads (`Integer`, `Decimal`, `Hex`, …) keep the raw slice as
//!   `Rc<str>`; numeric parsing happens in the parser where the value types live
//!
//! The lexer itself only reports byte offsets. Offsets are converted to
//! 1-based lines by the `SourceText` line table in `tomb-ast`.

use logos::{Lexer, Logos};
use std::ops::Range;
use std::rc::Rc;

/// TombLang token.
///
/// Represents all lexical elements of the language: module and declaration
/// keywords, statement keywords, operators (including the deprecated `:=`,
/// which is lexed so the parser can reject it with a proper diagnostic),
/// punctuation, and literals.
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n\f]+")] // Skip whitespace
#[logos(skip r"//[^\n]*")] // Skip // comments
pub enum Token {
    // === Module keywords ===
    /// Keyword `contract`
    #[token("contract")]
    Contract,
    /// Keyword `token`
    #[token("token")]
    TokenKw,
    /// Keyword `script`
    #[token("script")]
    Script,
    /// Keyword `nft`
    #[token("nft")]
    Nft,
    /// Keyword `struct`
    #[token("struct")]
    Struct,
    /// Keyword `enum`
    #[token("enum")]
    Enum,

    // === Declaration keywords ===
    /// Keyword `import`
    #[token("import")]
    Import,
    /// Keyword `global`
    #[token("global")]
    Global,
    /// Keyword `local`
    #[token("local")]
    Local,
    /// Keyword `const`
    #[token("const")]
    Const,
    /// Keyword `property`
    #[token("property")]
    Property,
    /// Keyword `constructor`
    #[token("constructor")]
    Constructor,
    /// Keyword `public`
    #[token("public")]
    Public,
    /// Keyword `private`
    #[token("private")]
    Private,
    /// Keyword `task`
    #[token("task")]
    Task,
    /// Keyword `trigger`
    #[token("trigger")]
    Trigger,

    // === Statement keywords ===
    /// Keyword `if`
    #[token("if")]
    If,
    /// Keyword `else`
    #[token("else")]
    Else,
    /// Keyword `switch`
    #[token("switch")]
    Switch,
    /// Keyword `case`
    #[token("case")]
    Case,
    /// Keyword `default`
    #[token("default")]
    Default,
    /// Keyword `while`
    #[token("while")]
    While,
    /// Keyword `do`
    #[token("do")]
    Do,
    /// Keyword `for`
    #[token("for")]
    For,
    /// Keyword `break`
    #[token("break")]
    Break,
    /// Keyword `continue`
    #[token("continue")]
    Continue,
    /// Keyword `return`
    #[token("return")]
    Return,
    /// Keyword `throw`
    #[token("throw")]
    Throw,
    /// Keyword `this`
    #[token("this")]
    This,

    // === Boolean literals ===
    /// Boolean literal `true`
    #[token("true")]
    True,
    /// Boolean literal `false`
    #[token("false")]
    False,

    // === Operators ===
    /// Operator `+`
    #[token("+")]
    Plus,
    /// Operator `-`
    #[token("-")]
    Minus,
    /// Operator `*`
    #[token("*")]
    Star,
    /// Operator `/`
    #[token("/")]
    Slash,
    /// Operator `%`
    #[token("%")]
    Percent,
    /// Operator `^`
    #[token("^")]
    Caret,
    /// Operator `!`
    #[token("!")]
    Bang,
    /// Operator `=`
    #[token("=")]
    Assign,
    /// Deprecated assignment operator `:=` (rejected by the parser)
    #[token(":=")]
    ColonAssign,
    /// Operator `+=`
    #[token("+=")]
    PlusAssign,
    /// Operator `-=`
    #[token("-=")]
    MinusAssign,
    /// Operator `*=`
    #[token("*=")]
    StarAssign,
    /// Operator `/=`
    #[token("/=")]
    SlashAssign,
    /// Operator `==`
    #[token("==")]
    EqEq,
    /// Operator `!=`
    #[token("!=")]
    BangEq,
    /// Operator `<`
    #[token("<")]
    Lt,
    /// Operator `<=`
    #[token("<=")]
    LtEq,
    /// Operator `>`
    #[token(">")]
    Gt,
    /// Operator `>=`
    #[token(">=")]
    GtEq,
    /// Operator `<<`
    #[token("<<")]
    Shl,
    /// Operator `>>`
    #[token(">>")]
    Shr,
    /// Operator `&&`
    #[token("&&")]
    AndAnd,
    /// Operator `||`
    #[token("||")]
    OrOr,

    // === Punctuation ===
    /// Delimiter `(`
    #[token("(")]
    LParen,
    /// Delimiter `)`
    #[token(")")]
    RParen,
    /// Delimiter `{`
    #[token("{")]
    LBrace,
    /// Delimiter `}`
    #[token("}")]
    RBrace,
    /// Delimiter `[`
    #[token("[")]
    LBracket,
    /// Delimiter `]`
    #[token("]")]
    RBracket,
    /// Separator `,`
    #[token(",")]
    Comma,
    /// Terminator `;`
    #[token(";")]
    Semicolon,
    /// Separator `:`
    #[token(":")]
    Colon,
    /// Accessor `.`
    #[token(".")]
    Dot,

    // === Literals ===
    /// Integer literal, e.g. `42`. Raw text; parsed to a big integer later.
    #[regex(r"[0-9]+", |lex| Rc::from(lex.slice()))]
    Integer(Rc<str>),

    /// Decimal literal, e.g. `2.4587`. Raw text; scaled during elaboration
    /// once the target precision is known.
    #[regex(r"[0-9]+\.[0-9]+", |lex| Rc::from(lex.slice()))]
    Decimal(Rc<str>),

    /// Hex literal, e.g. `0xA1FF`. Stored without the `0x` prefix.
    #[regex(r"0x[0-9a-fA-F]+", |lex| Rc::from(&lex.slice()[2..]))]
    Hex(Rc<str>),

    /// Address literal, e.g. `@P2KFNXEbt65rQiWqogAzqkVGMqFirPmqPw8mQyxvRKsrXV8`.
    /// Stored without the `@` prefix.
    #[regex(r"@[A-Za-z0-9]+", |lex| Rc::from(&lex.slice()[1..]))]
    Address(Rc<str>),

    /// String literal with `\\`, `\"`, `\n`, `\t`, `\xHH` escapes.
    #[regex(r#""([^"\\]|\\.)*""#, |lex| {
        let s = lex.slice();
        unescape_string(&s[1..s.len() - 1]).map(|s| Rc::from(s.as_str()))
    })]
    String(Rc<str>),

    /// Char literal, e.g. `'a'` or `'\n'`.
    #[regex(r"'([^'\\]|\\.)'", |lex| {
        let s = lex.slice();
        unescape_string(&s[1..s.len() - 1]).and_then(|s| s.chars().next())
    })]
    Char(char),

    /// Compile-time macro, e.g. `$THIS_SYMBOL`. Stored without the `$` prefix.
    #[regex(r"\$[A-Z_][A-Z_0-9]*", |lex| Rc::from(&lex.slice()[1..]))]
    Macro(Rc<str>),

    /// Identifier, e.g. `getBalance`, `_tokenID`.
    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*", |lex| Rc::from(lex.slice()))]
    Ident(Rc<str>),

    /// Start of a `/* */` block comment. Nesting is handled by the callback;
    /// the whole comment is skipped, an unterminated one is a lex error.
    #[token("/*", lex_block_comment)]
    BlockComment,
}

/// Skip a (possibly nested) block comment.
///
/// Called after logos has consumed the opening `/*`. Scans the remainder for
/// the matching `*/`, tracking nesting depth, and bumps the lexer past it.
fn lex_block_comment(lex: &mut Lexer<Token>) -> logos::FilterResult<(), ()> {
    let bytes = lex.remainder().as_bytes();
    let mut depth = 1usize;
    let mut i = 0usize;
    while i < bytes.len() {
        if bytes[i] == b'/' && i + 1 < bytes.len() && bytes[i + 1] == b'*' {
            depth += 1;
            i += 2;
        } else if bytes[i] == b'*' && i + 1 < bytes.len() && bytes[i + 1] == b'/' {
            depth -= 1;
            i += 2;
            if depth == 0 {
                lex.bump(i);
                return logos::FilterResult::Skip;
            }
        } else {
            i += 1;
        }
    }
    lex.bump(bytes.len());
    logos::FilterResult::Error(())
}

/// Unescape string/char literal content.
fn unescape_string(s: &str) -> Option<String> {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => result.push('\n'),
                Some('t') => result.push('\t'),
                Some('\\') => result.push('\\'),
                Some('"') => result.push('"'),
                Some('\'') => result.push('\''),
                Some('x') => {
                    let hi = chars.next()?.to_digit(16)?;
                    let lo = chars.next()?.to_digit(16)?;
                    result.push(char::from((hi * 16 + lo) as u8));
                }
                _ => return None,
            }
        } else {
            result.push(c);
        }
    }
    Some(result)
}

/// A lexing failure: the byte offset of the first unrecognized input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LexError {
    /// Byte offset of the offending input.
    pub offset: usize,
}

/// Tokenize a full source text into `(token, byte range)` pairs.
///
/// Stops at the first unrecognized token; the caller maps the offset to a
/// line/column via its source table.
pub fn lex(source: &str) -> Result<Vec<(Token, Range<usize>)>, LexError> {
    let mut out = Vec::new();
    let mut lexer = Token::lexer(source);
    while let Some(result) = lexer.next() {
        match result {
            Ok(token) => out.push((token, lexer.span())),
            Err(()) => {
                return Err(LexError {
                    offset: lexer.span().start,
                })
            }
        }
    }
    Ok(out)
}

impl Token {
    /// Keywords that can also appear as plain member names after `.`
    /// (e.g. `map.default`). Returns the keyword's source text.
    pub fn keyword_text(&self) -> Option<&'static str> {
        match self {
            Token::Default => Some("default"),
            Token::This => Some("this"),
            Token::TokenKw => Some("token"),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Test helper: lex source, panicking on any error.
    fn lex_ok(source: &str) -> Vec<Token> {
        lex(source)
            .expect("lexing failed")
            .into_iter()
            .map(|(tok, _)| tok)
            .collect()
    }

    fn ident(s: &str) -> Token {
        Token::Ident(Rc::from(s))
    }

    fn string(s: &str) -> Token {
        Token::String(Rc::from(s))
    }

    #[test]
    fn test_keywords() {
        let tokens = lex_ok("contract token script nft struct enum");
        assert_eq!(
            tokens,
            vec![
                Token::Contract,
                Token::TokenKw,
                Token::Script,
                Token::Nft,
                Token::Struct,
                Token::Enum,
            ]
        );
    }

    #[test]
    fn test_identifiers_and_reserved() {
        let tokens = lex_ok("balance _tokenID _ROM thisOne");
        assert_eq!(
            tokens,
            vec![
                ident("balance"),
                ident("_tokenID"),
                ident("_ROM"),
                ident("thisOne"),
            ]
        );
    }

    #[test]
    fn test_numbers() {
        let tokens = lex_ok("42 0 2.4587");
        assert_eq!(
            tokens,
            vec![
                Token::Integer(Rc::from("42")),
                Token::Integer(Rc::from("0")),
                Token::Decimal(Rc::from("2.4587")),
            ]
        );
    }

    #[test]
    fn test_hex_and_address() {
        let tokens = lex_ok("0xA1ff @P2KabcXYZ9");
        assert_eq!(
            tokens,
            vec![
                Token::Hex(Rc::from("A1ff")),
                Token::Address(Rc::from("P2KabcXYZ9")),
            ]
        );
    }

    #[test]
    fn test_strings() {
        let tokens = lex_ok(r#""hello" "a\nb" "q\"q" "\x41""#);
        assert_eq!(
            tokens,
            vec![string("hello"), string("a\nb"), string("q\"q"), string("A")]
        );
    }

    #[test]
    fn test_char_literal() {
        let tokens = lex_ok(r"'a' '\n'");
        assert_eq!(tokens, vec![Token::Char('a'), Token::Char('\n')]);
    }

    #[test]
    fn test_macros() {
        let tokens = lex_ok("$THIS_ADDRESS $THIS_SYMBOL $TYPE_OF(number)");
        assert_eq!(
            tokens,
            vec![
                Token::Macro(Rc::from("THIS_ADDRESS")),
                Token::Macro(Rc::from("THIS_SYMBOL")),
                Token::Macro(Rc::from("TYPE_OF")),
                Token::LParen,
                ident("number"),
                Token::RParen,
            ]
        );
    }

    #[test]
    fn test_operators() {
        let tokens = lex_ok("+ - * / % == != < <= > >= << >> && || ! ^");
        assert_eq!(
            tokens,
            vec![
                Token::Plus,
                Token::Minus,
                Token::Star,
                Token::Slash,
                Token::Percent,
                Token::EqEq,
                Token::BangEq,
                Token::Lt,
                Token::LtEq,
                Token::Gt,
                Token::GtEq,
                Token::Shl,
                Token::Shr,
                Token::AndAnd,
                Token::OrOr,
                Token::Bang,
                Token::Caret,
            ]
        );
    }

    #[test]
    fn test_assignment_operators() {
        let tokens = lex_ok("= += -= *= /= :=");
        assert_eq!(
            tokens,
            vec![
                Token::Assign,
                Token::PlusAssign,
                Token::MinusAssign,
                Token::StarAssign,
                Token::SlashAssign,
                Token::ColonAssign,
            ]
        );
    }

    #[test]
    fn test_line_comments() {
        let tokens = lex_ok("global // comment\nname");
        assert_eq!(tokens, vec![Token::Global, ident("name")]);
    }

    #[test]
    fn test_nested_block_comments() {
        let tokens = lex_ok("global /* outer /* inner */ still outer */ name");
        assert_eq!(tokens, vec![Token::Global, ident("name")]);
    }

    #[test]
    fn test_unterminated_block_comment() {
        assert!(lex("global /* oops").is_err());
    }

    #[test]
    fn test_declaration_snippet() {
        let tokens = lex_ok("global amount: decimal<3>;");
        assert_eq!(
            tokens,
            vec![
                Token::Global,
                ident("amount"),
                Token::Colon,
                ident("decimal"),
                Token::Lt,
                Token::Integer(Rc::from("3")),
                Token::Gt,
                Token::Semicolon,
            ]
        );
    }

    #[test]
    fn test_lex_error_offset() {
        let err = lex("local x = `bad`;").unwrap_err();
        assert_eq!(err.offset, 10);
    }
}
