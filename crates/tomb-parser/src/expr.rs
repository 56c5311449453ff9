//! Expression parsing: precedence climbing over binary operators, prefix
//! unaries, postfix call/index/field chains, and primary atoms.

use crate::stream::TokenStream;
use crate::types::parse_type;
use num_bigint::BigInt;
use tomb_ast::{literal, BinaryOp, CallTarget, CompileResult, Expr, ExprKind, Literal, UnaryOp};
use tomb_lexer::Token;

/// Parse a full expression.
pub fn parse_expr(stream: &mut TokenStream) -> CompileResult<Expr> {
    parse_pratt(stream, 0)
}

/// Binary operator metadata: `(precedence, op)`, all left-associative.
///
/// Higher precedence binds tighter. This table is the single source of truth
/// for the expression grammar's precedence ladder.
fn binary_op_info(token: &Token) -> Option<(u8, BinaryOp)> {
    match token {
        Token::OrOr => Some((10, BinaryOp::Or)),
        Token::AndAnd => Some((20, BinaryOp::And)),
        Token::EqEq => Some((30, BinaryOp::Eq)),
        Token::BangEq => Some((30, BinaryOp::Ne)),
        Token::Lt => Some((40, BinaryOp::Lt)),
        Token::LtEq => Some((40, BinaryOp::Le)),
        Token::Gt => Some((40, BinaryOp::Gt)),
        Token::GtEq => Some((40, BinaryOp::Ge)),
        Token::Shl => Some((50, BinaryOp::Shl)),
        Token::Shr => Some((50, BinaryOp::Shr)),
        Token::Caret => Some((50, BinaryOp::Xor)),
        Token::Plus => Some((60, BinaryOp::Add)),
        Token::Minus => Some((60, BinaryOp::Sub)),
        Token::Star => Some((70, BinaryOp::Mul)),
        Token::Slash => Some((70, BinaryOp::Div)),
        Token::Percent => Some((70, BinaryOp::Mod)),
        _ => None,
    }
}

fn parse_pratt(stream: &mut TokenStream, min_prec: u8) -> CompileResult<Expr> {
    let mut left = parse_prefix(stream)?;

    while let Some(token) = stream.peek() {
        let Some((prec, op)) = binary_op_info(token) else {
            break;
        };
        if prec < min_prec {
            break;
        }
        stream.advance();
        let right = parse_pratt(stream, prec + 1)?;
        let span = left.span;
        left = Expr::new(
            ExprKind::Binary {
                op,
                lhs: Box::new(left),
                rhs: Box::new(right),
            },
            span,
        );
    }

    Ok(left)
}

fn parse_prefix(stream: &mut TokenStream) -> CompileResult<Expr> {
    match stream.peek() {
        Some(Token::Bang) => {
            let span = stream.current_span();
            stream.advance();
            let operand = parse_prefix(stream)?;
            Ok(Expr::new(
                ExprKind::Unary {
                    op: UnaryOp::Not,
                    operand: Box::new(operand),
                },
                span,
            ))
        }
        Some(Token::Minus) => {
            let span = stream.current_span();
            stream.advance();
            let operand = parse_prefix(stream)?;
            Ok(Expr::new(
                ExprKind::Unary {
                    op: UnaryOp::Neg,
                    operand: Box::new(operand),
                },
                span,
            ))
        }
        _ => parse_postfix(stream),
    }
}

fn parse_postfix(stream: &mut TokenStream) -> CompileResult<Expr> {
    let mut expr = parse_atom(stream)?;

    loop {
        match stream.peek() {
            Some(Token::Dot) => {
                stream.advance();
                let member = parse_member_name(stream)?;

                // `.name<T>(args)` — explicit type argument, used by
                // Call.method<T> / Call.interop<T>.
                let type_arg = if matches!(stream.peek(), Some(Token::Lt))
                    && generic_call_ahead(stream)
                {
                    stream.advance();
                    let ty = parse_type(stream)?;
                    stream.expect_gt()?;
                    Some(ty)
                } else {
                    None
                };

                if matches!(stream.peek(), Some(Token::LParen)) {
                    let args = parse_call_args(stream)?;
                    let span = expr.span;
                    let is_this =
                        matches!(&expr.kind, ExprKind::Ident { name, .. } if &**name == "this");
                    let target = if is_this {
                        CallTarget::This(member)
                    } else {
                        CallTarget::Value {
                            base: Box::new(expr),
                            method: member,
                        }
                    };
                    expr = Expr::new(
                        ExprKind::Call {
                            target,
                            type_arg,
                            args,
                            resolved: None,
                        },
                        span,
                    );
                } else if let Some(ty) = type_arg {
                    return Err(stream.error_at(
                        ty.span,
                        "type argument is only valid on a call".to_string(),
                    ));
                } else {
                    let span = expr.span;
                    expr = Expr::new(
                        ExprKind::Field {
                            base: Box::new(expr),
                            field: member,
                        },
                        span,
                    );
                }
            }
            Some(Token::LParen) => {
                let span = expr.span;
                let name = match &expr.kind {
                    ExprKind::Ident { name, .. } => name.clone(),
                    _ => {
                        return Err(
                            stream.error_at(span, "only named methods can be called".to_string())
                        )
                    }
                };
                let args = parse_call_args(stream)?;
                expr = Expr::new(
                    ExprKind::Call {
                        target: CallTarget::Bare(name),
                        type_arg: None,
                        args,
                        resolved: None,
                    },
                    span,
                );
            }
            Some(Token::LBracket) => {
                stream.advance();
                let index = parse_expr(stream)?;
                stream.expect(Token::RBracket)?;
                let span = expr.span;
                expr = Expr::new(
                    ExprKind::Index {
                        base: Box::new(expr),
                        index: Box::new(index),
                    },
                    span,
                );
            }
            _ => break,
        }
    }

    Ok(expr)
}

/// Member names after `.` may be identifiers or the few keywords that double
/// as member names.
fn parse_member_name(stream: &mut TokenStream) -> CompileResult<std::rc::Rc<str>> {
    let span = stream.current_span();
    match stream.advance() {
        Some(Token::Ident(name)) => Ok(name),
        Some(token) => token
            .keyword_text()
            .map(std::rc::Rc::from)
            .ok_or_else(|| stream.error_at(span, format!("expected member name after '.', found {token:?}"))),
        None => Err(stream.error_at(span, "expected member name after '.'".to_string())),
    }
}

/// Lookahead: does `<` at the cursor open `name<Type>(…)` rather than a
/// comparison? Scans a bounded window for a matching `>` followed by `(`.
fn generic_call_ahead(stream: &TokenStream) -> bool {
    let mut depth = 0i32;
    for i in 0..24 {
        match stream.peek_nth(i) {
            Some(Token::Lt) => depth += 1,
            Some(Token::Shr) => {
                depth -= 2;
                if depth <= 0 {
                    return matches!(stream.peek_nth(i + 1), Some(Token::LParen));
                }
            }
            Some(Token::Gt) => {
                depth -= 1;
                if depth == 0 {
                    return matches!(stream.peek_nth(i + 1), Some(Token::LParen));
                }
            }
            Some(Token::Ident(_)) | Some(Token::Integer(_)) | Some(Token::Comma) => {}
            _ => return false,
        }
    }
    false
}

fn parse_call_args(stream: &mut TokenStream) -> CompileResult<Vec<Expr>> {
    stream.expect(Token::LParen)?;
    let mut args = Vec::new();
    while !matches!(stream.peek(), Some(Token::RParen)) {
        args.push(parse_expr(stream)?);
        if !stream.eat(&Token::Comma) {
            break;
        }
    }
    stream.expect(Token::RParen)?;
    Ok(args)
}

fn parse_atom(stream: &mut TokenStream) -> CompileResult<Expr> {
    let span = stream.current_span();
    match stream.peek().cloned() {
        Some(Token::Integer(raw)) => {
            stream.advance();
            let value: BigInt = raw
                .parse()
                .map_err(|_| stream.error_at(span, format!("invalid number literal {raw}")))?;
            Ok(Expr::new(ExprKind::Literal(Literal::Number(value)), span))
        }
        Some(Token::Decimal(raw)) => {
            stream.advance();
            let frac = raw.split_once('.').map(|(_, f)| f).unwrap_or("");
            let places = frac.trim_end_matches('0').len() as u8;
            let scaled = literal::scale_decimal(&raw, places, span)?;
            Ok(Expr::new(
                ExprKind::Literal(Literal::Decimal {
                    raw: scaled,
                    places,
                }),
                span,
            ))
        }
        Some(Token::String(text)) => {
            stream.advance();
            Ok(Expr::new(
                ExprKind::Literal(Literal::String(text.to_string())),
                span,
            ))
        }
        Some(Token::Char(c)) => {
            stream.advance();
            Ok(Expr::new(
                ExprKind::Literal(Literal::Number(BigInt::from(c as u32))),
                span,
            ))
        }
        Some(Token::Hex(raw)) => {
            stream.advance();
            let bytes = decode_hex(&raw)
                .ok_or_else(|| stream.error_at(span, format!("invalid hex literal 0x{raw}")))?;
            Ok(Expr::new(ExprKind::Literal(Literal::Bytes(bytes)), span))
        }
        Some(Token::Address(text)) => {
            stream.advance();
            Ok(Expr::new(
                ExprKind::Literal(Literal::Address(text.as_bytes().to_vec())),
                span,
            ))
        }
        Some(Token::True) => {
            stream.advance();
            Ok(Expr::new(ExprKind::Literal(Literal::Bool(true)), span))
        }
        Some(Token::False) => {
            stream.advance();
            Ok(Expr::new(ExprKind::Literal(Literal::Bool(false)), span))
        }
        Some(Token::Macro(name)) => {
            stream.advance();
            let arg = if &*name == "TYPE_OF" {
                stream.expect(Token::LParen)?;
                let ty = parse_type(stream)?;
                stream.expect(Token::RParen)?;
                Some(ty)
            } else {
                None
            };
            Ok(Expr::new(ExprKind::Macro { name, arg }, span))
        }
        Some(Token::Ident(name)) => {
            stream.advance();
            Ok(Expr::new(
                ExprKind::Ident {
                    name,
                    binding: None,
                },
                span,
            ))
        }
        Some(Token::This) => {
            stream.advance();
            Ok(Expr::new(
                ExprKind::Ident {
                    name: "this".into(),
                    binding: None,
                },
                span,
            ))
        }
        Some(Token::LParen) => {
            stream.advance();
            let expr = parse_expr(stream)?;
            stream.expect(Token::RParen)?;
            Ok(expr)
        }
        Some(Token::LBrace) => {
            stream.advance();
            let mut items = Vec::new();
            while !matches!(stream.peek(), Some(Token::RBrace)) {
                items.push(parse_expr(stream)?);
                if !stream.eat(&Token::Comma) {
                    break;
                }
            }
            stream.expect(Token::RBrace)?;
            Ok(Expr::new(ExprKind::ArrayLiteral(items), span))
        }
        other => Err(stream.error_at(
            span,
            format!(
                "expected expression, found {}",
                other.map(|t| format!("{t:?}")).unwrap_or_else(|| "end of input".to_string())
            ),
        )),
    }
}

/// Decode a hex string (without `0x`), padding odd lengths on the left.
fn decode_hex(raw: &str) -> Option<Vec<u8>> {
    let padded;
    let raw = if raw.len() % 2 == 1 {
        padded = format!("0{raw}");
        &padded
    } else {
        raw
    };
    (0..raw.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&raw[i..i + 2], 16).ok())
        .collect()
}
