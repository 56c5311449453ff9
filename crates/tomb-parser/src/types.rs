//! Type-expression parsing: `number`, `decimal<3>`, `map<string, number>`, …

use crate::stream::TokenStream;
use tomb_ast::{CompileResult, TypeArg, TypeExpr};
use tomb_lexer::Token;

/// Parse a type as written in source.
pub fn parse_type(stream: &mut TokenStream) -> CompileResult<TypeExpr> {
    let (name, span) = stream.expect_ident()?;
    let mut ty = TypeExpr::named(name, span);
    if stream.eat(&Token::Lt) {
        loop {
            ty.args.push(parse_type_arg(stream)?);
            if !stream.eat(&Token::Comma) {
                break;
            }
        }
        stream.expect_gt()?;
    }
    Ok(ty)
}

fn parse_type_arg(stream: &mut TokenStream) -> CompileResult<TypeArg> {
    if let Some(Token::Integer(raw)) = stream.peek() {
        let raw = raw.clone();
        let span = stream.current_span();
        stream.advance();
        let value: u32 = raw
            .parse()
            .map_err(|_| stream.error_at(span, format!("type argument {raw} out of range")))?;
        return Ok(TypeArg::Number(value));
    }
    Ok(TypeArg::Type(parse_type(stream)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tomb_ast::SourceText;

    fn parse(source: &str) -> TypeExpr {
        let text = SourceText::new(source);
        let tokens = tomb_lexer::lex(source).expect("lex failed");
        let mut stream = TokenStream::new(tokens, &text);
        parse_type(&mut stream).expect("parse failed")
    }

    #[test]
    fn test_plain_type() {
        let ty = parse("number");
        assert_eq!(&*ty.name, "number");
        assert!(ty.args.is_empty());
    }

    #[test]
    fn test_decimal_precision() {
        let ty = parse("decimal<3>");
        assert_eq!(&*ty.name, "decimal");
        assert_eq!(ty.args, vec![TypeArg::Number(3)]);
    }

    #[test]
    fn test_nested_generics_shift_split() {
        // The closing `>>` arrives as a single Shr token and must split.
        let ty = parse("map<string, array<number>>");
        assert_eq!(&*ty.name, "map");
        assert_eq!(ty.args.len(), 2);
        match &ty.args[1] {
            TypeArg::Type(inner) => {
                assert_eq!(&*inner.name, "array");
                assert_eq!(inner.args.len(), 1);
            }
            other => panic!("expected type arg, got {other:?}"),
        }
    }
}
