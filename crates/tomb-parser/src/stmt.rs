//! Statement and block parsing.

use crate::expr::parse_expr;
use crate::stream::TokenStream;
use crate::types::parse_type;
use tomb_ast::{AssignOp, Block, CompileResult, Expr, ExprKind, LValue, Stmt};
use tomb_lexer::Token;

/// Parse a `{ … }` block.
pub fn parse_block(stream: &mut TokenStream) -> CompileResult<Block> {
    stream.expect(Token::LBrace)?;
    let mut stmts = Vec::new();
    while !matches!(stream.peek(), Some(Token::RBrace)) {
        if stream.at_end() {
            return Err(stream.error_here("unexpected end of input inside block"));
        }
        stmts.push(parse_stmt(stream)?);
    }
    stream.expect(Token::RBrace)?;
    Ok(Block { stmts })
}

/// Parse a single statement.
pub fn parse_stmt(stream: &mut TokenStream) -> CompileResult<Stmt> {
    let span = stream.current_span();
    match stream.peek() {
        Some(Token::Local) => {
            let stmt = parse_local(stream)?;
            stream.expect(Token::Semicolon)?;
            Ok(stmt)
        }
        Some(Token::If) => parse_if(stream),
        Some(Token::Switch) => parse_switch(stream),
        Some(Token::While) => {
            stream.advance();
            stream.expect(Token::LParen)?;
            let cond = parse_expr(stream)?;
            stream.expect(Token::RParen)?;
            let body = parse_block(stream)?;
            Ok(Stmt::While { cond, body, span })
        }
        Some(Token::Do) => {
            stream.advance();
            let body = parse_block(stream)?;
            stream.expect(Token::While)?;
            stream.expect(Token::LParen)?;
            let cond = parse_expr(stream)?;
            stream.expect(Token::RParen)?;
            stream.expect(Token::Semicolon)?;
            Ok(Stmt::DoWhile { body, cond, span })
        }
        Some(Token::For) => parse_for(stream),
        Some(Token::Break) => {
            stream.advance();
            stream.expect(Token::Semicolon)?;
            Ok(Stmt::Break(span))
        }
        Some(Token::Continue) => {
            stream.advance();
            stream.expect(Token::Semicolon)?;
            Ok(Stmt::Continue(span))
        }
        Some(Token::Return) => {
            stream.advance();
            let value = if matches!(stream.peek(), Some(Token::Semicolon)) {
                None
            } else {
                Some(parse_expr(stream)?)
            };
            stream.expect(Token::Semicolon)?;
            Ok(Stmt::Return { value, span })
        }
        Some(Token::Throw) => {
            stream.advance();
            let message = parse_expr(stream)?;
            stream.expect(Token::Semicolon)?;
            Ok(Stmt::Throw { message, span })
        }
        _ => {
            let stmt = parse_expr_or_assign(stream)?;
            stream.expect(Token::Semicolon)?;
            Ok(stmt)
        }
    }
}

/// `local NAME[:TYPE] [= expr]` — without the trailing semicolon, so the
/// `for` initializer can share it.
fn parse_local(stream: &mut TokenStream) -> CompileResult<Stmt> {
    let span = stream.current_span();
    stream.expect(Token::Local)?;
    let (name, _) = stream.expect_ident()?;
    let declared = if stream.eat(&Token::Colon) {
        Some(parse_type(stream)?)
    } else {
        None
    };
    let init = if stream.eat(&Token::Assign) {
        Some(parse_expr(stream)?)
    } else {
        None
    };
    Ok(Stmt::Local {
        name,
        declared,
        init,
        ty: None,
        slot: None,
        span,
    })
}

/// An expression statement or an assignment, without the semicolon.
fn parse_expr_or_assign(stream: &mut TokenStream) -> CompileResult<Stmt> {
    let span = stream.current_span();
    let expr = parse_expr(stream)?;

    let op = match stream.peek() {
        Some(Token::Assign) => Some(AssignOp::Set),
        Some(Token::PlusAssign) => Some(AssignOp::Add),
        Some(Token::MinusAssign) => Some(AssignOp::Sub),
        Some(Token::StarAssign) => Some(AssignOp::Mul),
        Some(Token::SlashAssign) => Some(AssignOp::Div),
        Some(Token::ColonAssign) => {
            return Err(stream.error_here(
                "the ':=' assignment operator is deprecated, use '=' instead",
            ));
        }
        _ => None,
    };

    match op {
        Some(op) => {
            stream.advance();
            let value = parse_expr(stream)?;
            let target = lvalue_of(stream, expr)?;
            Ok(Stmt::Assign {
                target,
                op,
                value,
                span,
            })
        }
        None => Ok(Stmt::Expr(expr)),
    }
}

/// Reinterpret an already-parsed expression as an assignment target.
fn lvalue_of(stream: &TokenStream, expr: Expr) -> CompileResult<LValue> {
    match expr.kind {
        ExprKind::Ident { name, binding } => Ok(LValue::Name { name, binding }),
        ExprKind::Index { base, index } => Ok(LValue::Index {
            base: *base,
            index: *index,
        }),
        ExprKind::Field { base, field } => Ok(LValue::Field { base: *base, field }),
        _ => Err(stream.error_at(expr.span, "invalid assignment target")),
    }
}

fn parse_if(stream: &mut TokenStream) -> CompileResult<Stmt> {
    let span = stream.current_span();
    stream.expect(Token::If)?;
    stream.expect(Token::LParen)?;
    let cond = parse_expr(stream)?;
    stream.expect(Token::RParen)?;
    let then_block = parse_block(stream)?;

    let or_else = if stream.eat(&Token::Else) {
        if matches!(stream.peek(), Some(Token::If)) {
            // `else if` chains nest as a single-statement else block.
            let nested = parse_if(stream)?;
            Some(Block {
                stmts: vec![nested],
            })
        } else {
            Some(parse_block(stream)?)
        }
    } else {
        None
    };

    Ok(Stmt::If {
        cond,
        then_block,
        or_else,
        span,
    })
}

fn parse_switch(stream: &mut TokenStream) -> CompileResult<Stmt> {
    let span = stream.current_span();
    stream.expect(Token::Switch)?;
    stream.expect(Token::LParen)?;
    let scrutinee = parse_expr(stream)?;
    stream.expect(Token::RParen)?;
    stream.expect(Token::LBrace)?;

    let mut cases = Vec::new();
    let mut default = None;
    loop {
        match stream.peek() {
            Some(Token::Case) => {
                stream.advance();
                let label = parse_expr(stream)?;
                stream.expect(Token::Colon)?;
                cases.push((label, parse_case_body(stream)?));
            }
            Some(Token::Default) => {
                let default_span = stream.current_span();
                stream.advance();
                stream.expect(Token::Colon)?;
                if default.is_some() {
                    return Err(stream.error_at(default_span, "duplicate default case"));
                }
                default = Some(parse_case_body(stream)?);
            }
            Some(Token::RBrace) => break,
            _ => return Err(stream.error_here("expected 'case', 'default' or '}' in switch")),
        }
    }
    stream.expect(Token::RBrace)?;

    Ok(Stmt::Switch {
        scrutinee,
        cases,
        default,
        span,
    })
}

/// Statements of one `case` arm, up to the next label or the closing brace.
fn parse_case_body(stream: &mut TokenStream) -> CompileResult<Block> {
    let mut stmts = Vec::new();
    while !matches!(
        stream.peek(),
        Some(Token::Case) | Some(Token::Default) | Some(Token::RBrace) | None
    ) {
        stmts.push(parse_stmt(stream)?);
    }
    Ok(Block { stmts })
}

fn parse_for(stream: &mut TokenStream) -> CompileResult<Stmt> {
    let span = stream.current_span();
    stream.expect(Token::For)?;
    stream.expect(Token::LParen)?;
    let init = if matches!(stream.peek(), Some(Token::Local)) {
        parse_local(stream)?
    } else {
        parse_expr_or_assign(stream)?
    };
    stream.expect(Token::Semicolon)?;
    let cond = parse_expr(stream)?;
    stream.expect(Token::Semicolon)?;
    let post = parse_expr_or_assign(stream)?;
    stream.expect(Token::RParen)?;
    let body = parse_block(stream)?;

    Ok(Stmt::For {
        init: Box::new(init),
        cond,
        post: Box::new(post),
        body,
        span,
    })
}
