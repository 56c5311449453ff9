//! Declaration parsing: modules, structs, enums, and module members.

use crate::expr::parse_expr;
use crate::stmt::parse_block;
use crate::stream::TokenStream;
use crate::types::parse_type;
use std::rc::Rc;
use tomb_ast::{
    Block, CompileResult, ConstDecl, EnumDecl, Expr, ExprKind, GlobalDecl, Literal, MethodDecl,
    MethodKind, ModuleAst, ModuleKind, Parameter, SourceUnit, Stmt, StructDecl, UnaryOp,
    Visibility,
};
use tomb_lexer::Token;

/// Parse a full source unit.
pub fn parse_unit(stream: &mut TokenStream) -> CompileResult<SourceUnit> {
    let mut unit = SourceUnit::default();
    while !stream.at_end() {
        match stream.peek() {
            Some(Token::Struct) => {
                let decl = parse_struct(stream)?;
                if unit.structs.contains_key(&decl.name) || unit.enums.contains_key(&decl.name) {
                    return Err(
                        stream.error_at(decl.span, format!("duplicate type '{}'", decl.name))
                    );
                }
                unit.structs.insert(decl.name.clone(), decl);
            }
            Some(Token::Enum) => {
                let decl = parse_enum(stream)?;
                if unit.structs.contains_key(&decl.name) || unit.enums.contains_key(&decl.name) {
                    return Err(
                        stream.error_at(decl.span, format!("duplicate type '{}'", decl.name))
                    );
                }
                unit.enums.insert(decl.name.clone(), decl);
            }
            Some(Token::Contract) => unit.modules.push(parse_module(stream, ModuleKind::Contract)?),
            Some(Token::TokenKw) => unit.modules.push(parse_module(stream, ModuleKind::Token)?),
            Some(Token::Script) => unit.modules.push(parse_module(stream, ModuleKind::Script)?),
            _ => {
                return Err(stream.error_here(
                    "expected 'contract', 'token', 'script', 'struct' or 'enum' at top level",
                ))
            }
        }
    }
    Ok(unit)
}

/// `struct NAME { field: type; … }`
fn parse_struct(stream: &mut TokenStream) -> CompileResult<StructDecl> {
    let span = stream.current_span();
    stream.expect(Token::Struct)?;
    let (name, _) = stream.expect_ident()?;
    stream.expect(Token::LBrace)?;
    let mut fields = Vec::new();
    while !matches!(stream.peek(), Some(Token::RBrace)) {
        let (field, field_span) = stream.expect_ident()?;
        if fields.iter().any(|(existing, _)| *existing == field) {
            return Err(stream.error_at(field_span, format!("duplicate field '{field}'")));
        }
        stream.expect(Token::Colon)?;
        let ty = parse_type(stream)?;
        stream.expect(Token::Semicolon)?;
        fields.push((field, ty));
    }
    stream.expect(Token::RBrace)?;
    Ok(StructDecl { name, fields, span })
}

/// `enum NAME { A, B = 4, C }` — entries default to the previous value + 1.
fn parse_enum(stream: &mut TokenStream) -> CompileResult<EnumDecl> {
    let span = stream.current_span();
    stream.expect(Token::Enum)?;
    let (name, _) = stream.expect_ident()?;
    stream.expect(Token::LBrace)?;
    let mut entries: Vec<(Rc<str>, u32)> = Vec::new();
    let mut next = 0u32;
    while !matches!(stream.peek(), Some(Token::RBrace)) {
        let (entry, entry_span) = stream.expect_ident()?;
        let value = if stream.eat(&Token::Assign) {
            let (raw, raw_span) = match stream.advance() {
                Some(Token::Integer(raw)) => (raw, stream.previous_span()),
                _ => return Err(stream.error_here("expected integer enum value")),
            };
            raw.parse::<u32>()
                .map_err(|_| stream.error_at(raw_span, format!("enum value {raw} out of range")))?
        } else {
            next
        };
        if entries.iter().any(|(_, existing)| *existing == value) {
            return Err(stream.error_at(
                entry_span,
                format!("duplicate enum value {value} for entry '{entry}'"),
            ));
        }
        if entries.iter().any(|(existing, _)| *existing == entry) {
            return Err(stream.error_at(entry_span, format!("duplicate enum entry '{entry}'")));
        }
        next = value + 1;
        entries.push((entry, value));
        if !stream.eat(&Token::Comma) {
            break;
        }
    }
    stream.expect(Token::RBrace)?;
    Ok(EnumDecl {
        name,
        entries,
        span,
    })
}

/// `contract NAME { members }` and friends.
fn parse_module(stream: &mut TokenStream, kind: ModuleKind) -> CompileResult<ModuleAst> {
    let span = stream.current_span();
    stream.advance(); // module keyword, checked by the caller
    let (name, _) = stream.expect_ident()?;
    let mut module = ModuleAst::new(name, kind, span);
    parse_module_body(stream, &mut module)?;
    Ok(module)
}

fn parse_module_body(stream: &mut TokenStream, module: &mut ModuleAst) -> CompileResult<()> {
    stream.expect(Token::LBrace)?;
    while !matches!(stream.peek(), Some(Token::RBrace)) {
        match stream.peek() {
            Some(Token::Import) => {
                let span = stream.current_span();
                stream.advance();
                let (lib, _) = stream.expect_ident()?;
                stream.expect(Token::Semicolon)?;
                module.imports.push((lib, span));
            }
            Some(Token::Global) => {
                let span = stream.current_span();
                stream.advance();
                let (name, _) = stream.expect_ident()?;
                stream.expect(Token::Colon)?;
                let declared = parse_type(stream)?;
                stream.expect(Token::Semicolon)?;
                module.globals.push(GlobalDecl {
                    name,
                    declared,
                    ty: None,
                    span,
                });
            }
            Some(Token::Const) => {
                let span = stream.current_span();
                stream.advance();
                let (name, _) = stream.expect_ident()?;
                stream.expect(Token::Colon)?;
                let declared = parse_type(stream)?;
                stream.expect(Token::Assign)?;
                let value = parse_const_literal(stream)?;
                stream.expect(Token::Semicolon)?;
                module.consts.push(ConstDecl {
                    name,
                    declared,
                    value,
                    span,
                });
            }
            Some(Token::Property) => module.methods.push(parse_property(stream)?),
            Some(Token::Constructor) => {
                let span = stream.current_span();
                stream.advance();
                let params = parse_params(stream)?;
                let body = parse_block(stream)?;
                module.methods.push(MethodDecl {
                    name: "constructor".into(),
                    kind: MethodKind::Constructor,
                    visibility: Visibility::Public,
                    params,
                    ret: None,
                    variadic: false,
                    body,
                    span,
                    ret_ty: None,
                });
            }
            Some(Token::Public) => {
                stream.advance();
                module
                    .methods
                    .push(parse_method(stream, MethodKind::Method, Visibility::Public)?);
            }
            Some(Token::Private) => {
                stream.advance();
                module
                    .methods
                    .push(parse_method(stream, MethodKind::Method, Visibility::Private)?);
            }
            Some(Token::Task) => {
                stream.advance();
                module
                    .methods
                    .push(parse_method(stream, MethodKind::Task, Visibility::Public)?);
            }
            Some(Token::Trigger) => {
                stream.advance();
                module
                    .methods
                    .push(parse_method(stream, MethodKind::Trigger, Visibility::Public)?);
            }
            Some(Token::Nft) => module.sub_modules.push(parse_nft(stream)?),
            _ => {
                return Err(stream.error_here(format!(
                    "unexpected token in {} body",
                    module.kind.keyword()
                )))
            }
        }
    }
    stream.expect(Token::RBrace)?;
    Ok(())
}

/// `property NAME: TYPE { stmts }` or `property NAME: TYPE = expr;`
///
/// Compiles to a getter method `get<Name>` of kind `Property`.
fn parse_property(stream: &mut TokenStream) -> CompileResult<MethodDecl> {
    let span = stream.current_span();
    stream.expect(Token::Property)?;
    let (name, _) = stream.expect_ident()?;
    stream.expect(Token::Colon)?;
    let ret = parse_type(stream)?;

    let body = if stream.eat(&Token::Assign) {
        let value = parse_expr(stream)?;
        let value_span = value.span;
        stream.expect(Token::Semicolon)?;
        Block {
            stmts: vec![Stmt::Return {
                value: Some(value),
                span: value_span,
            }],
        }
    } else {
        parse_block(stream)?
    };

    Ok(MethodDecl {
        name: getter_name(&name),
        kind: MethodKind::Property,
        visibility: Visibility::Public,
        params: Vec::new(),
        ret: Some(ret),
        variadic: false,
        body,
        span,
        ret_ty: None,
    })
}

/// `getName` for property `name`.
fn getter_name(name: &str) -> Rc<str> {
    let mut out = String::with_capacity(name.len() + 3);
    out.push_str("get");
    let mut chars = name.chars();
    if let Some(first) = chars.next() {
        out.extend(first.to_uppercase());
        out.push_str(chars.as_str());
    }
    Rc::from(out.as_str())
}

/// `name(params)[: TYPE[*]] { body }` after the introducing keyword.
fn parse_method(
    stream: &mut TokenStream,
    kind: MethodKind,
    visibility: Visibility,
) -> CompileResult<MethodDecl> {
    let span = stream.current_span();
    let (name, _) = stream.expect_ident()?;
    let params = parse_params(stream)?;
    let (ret, variadic) = if stream.eat(&Token::Colon) {
        let ty = parse_type(stream)?;
        let variadic = stream.eat(&Token::Star);
        (Some(ty), variadic)
    } else {
        (None, false)
    };
    let body = parse_block(stream)?;
    Ok(MethodDecl {
        name,
        kind,
        visibility,
        params,
        ret,
        variadic,
        body,
        span,
        ret_ty: None,
    })
}

fn parse_params(stream: &mut TokenStream) -> CompileResult<Vec<Parameter>> {
    stream.expect(Token::LParen)?;
    let mut params = Vec::new();
    while !matches!(stream.peek(), Some(Token::RParen)) {
        let (name, name_span) = stream.expect_ident()?;
        if params.iter().any(|p: &Parameter| p.name == name) {
            return Err(stream.error_at(name_span, format!("duplicate parameter '{name}'")));
        }
        stream.expect(Token::Colon)?;
        let declared = parse_type(stream)?;
        params.push(Parameter {
            name,
            declared,
            ty: None,
        });
        if !stream.eat(&Token::Comma) {
            break;
        }
    }
    stream.expect(Token::RParen)?;
    Ok(params)
}

/// `nft NAME<ROM, RAM> { members }` — a nested sub-module.
fn parse_nft(stream: &mut TokenStream) -> CompileResult<ModuleAst> {
    let span = stream.current_span();
    stream.expect(Token::Nft)?;
    let (name, _) = stream.expect_ident()?;
    stream.expect(Token::Lt)?;
    let rom = parse_type(stream)?;
    stream.expect(Token::Comma)?;
    let ram = parse_type(stream)?;
    stream.expect_gt()?;
    let mut module = ModuleAst::new(name, ModuleKind::Nft, span);
    module.nft_types = Some((rom, ram));
    parse_module_body(stream, &mut module)?;
    Ok(module)
}

/// Const initializers must be literals (optionally signed).
fn parse_const_literal(stream: &mut TokenStream) -> CompileResult<Literal> {
    let expr = parse_expr(stream)?;
    literal_of(&expr).ok_or_else(|| {
        stream.error_at(expr.span, "const initializer must be a literal value")
    })
}

fn literal_of(expr: &Expr) -> Option<Literal> {
    match &expr.kind {
        ExprKind::Literal(lit) => Some(lit.clone()),
        ExprKind::Unary {
            op: UnaryOp::Neg,
            operand,
        } => match &operand.kind {
            ExprKind::Literal(Literal::Number(n)) => Some(Literal::Number(-n)),
            ExprKind::Literal(Literal::Decimal { raw, places }) => Some(Literal::Decimal {
                raw: -raw,
                places: *places,
            }),
            _ => None,
        },
        _ => None,
    }
}
