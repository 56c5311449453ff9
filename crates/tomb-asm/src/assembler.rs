//! Two-pass assembler: textual VM assembly to a binary script.
//!
//! Pass 1 parses lines into instructions and records label offsets; pass 2
//! encodes operands and rewrites every `@label` reference as an absolute
//! `u16` offset from script start. Unknown labels are fatal.

use crate::opcode::{Opcode, OperandKind};
use indexmap::IndexMap;
use num_bigint::BigInt;
use tomb_ast::{CompileResult, CompilerError, Phase, Span};

/// A parsed assembly operand.
#[derive(Debug, Clone, PartialEq)]
pub enum AsmOperand {
    Reg(u8),
    Label(String),
    Str(String),
    Number(BigInt),
    Bytes(Vec<u8>),
    Bool(bool),
    None,
    TypeCode(u8),
}

/// One parsed instruction with its source line in the assembly text.
#[derive(Debug, Clone)]
pub struct Instr {
    pub op: Opcode,
    pub operands: Vec<AsmOperand>,
    pub line: u32,
}

/// Payload tags used in `LOAD` encoding; these match the VM type codes.
pub mod payload_tag {
    pub const NONE: u8 = 0;
    pub const NUMBER: u8 = 1;
    pub const BOOL: u8 = 2;
    pub const STRING: u8 = 3;
    pub const ADDRESS: u8 = 5;
    pub const BYTES: u8 = 7;
}

/// The output of assembling one module's text.
#[derive(Debug, Clone)]
pub struct AssembledScript {
    /// The binary script.
    pub bytes: Vec<u8>,
    /// Absolute offset of every label.
    pub labels: IndexMap<String, u16>,
}

/// Assemble textual VM assembly into a binary script.
pub fn assemble(text: &str) -> CompileResult<AssembledScript> {
    let items = parse_text(text)?;

    // Pass 1: compute label offsets.
    let mut labels: IndexMap<String, u16> = IndexMap::new();
    let mut offset = 0usize;
    for item in &items {
        match item {
            Item::Label(name, line) => {
                if labels.insert(name.clone(), offset as u16).is_some() {
                    return Err(asm_error(*line, format!("duplicate label @{name}")));
                }
            }
            Item::Instr(instr) => {
                offset += instr_size(instr);
                if offset > u16::MAX as usize {
                    return Err(asm_error(
                        instr.line,
                        "script exceeds the 64 KiB jump-addressable range".to_string(),
                    ));
                }
            }
        }
    }

    // Pass 2: encode.
    let mut bytes = Vec::with_capacity(offset);
    for item in &items {
        let Item::Instr(instr) = item else { continue };
        encode_instr(instr, &labels, &mut bytes)?;
    }

    Ok(AssembledScript { bytes, labels })
}

enum Item {
    Label(String, u32),
    Instr(Instr),
}

/// Parse assembly text into labels and instructions.
fn parse_text(text: &str) -> CompileResult<Vec<Item>> {
    let mut items = Vec::new();
    for (index, raw_line) in text.lines().enumerate() {
        let line = index as u32 + 1;
        let stripped = strip_comment(raw_line).trim();
        if stripped.is_empty() {
            continue;
        }
        if let Some(name) = stripped.strip_suffix(':') {
            let name = name.trim();
            let Some(label) = name.strip_prefix('@') else {
                return Err(asm_error(line, format!("malformed label '{name}'")));
            };
            items.push(Item::Label(label.to_string(), line));
            continue;
        }
        items.push(Item::Instr(parse_instr(stripped, line)?));
    }
    Ok(items)
}

/// Strip a trailing `//` comment, honoring string operands.
fn strip_comment(line: &str) -> &str {
    let bytes = line.as_bytes();
    let mut in_string = false;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'"' => in_string = !in_string,
            b'\\' if in_string => i += 1,
            b'/' if !in_string && i + 1 < bytes.len() && bytes[i + 1] == b'/' => {
                return &line[..i];
            }
            _ => {}
        }
        i += 1;
    }
    line
}

fn parse_instr(text: &str, line: u32) -> CompileResult<Instr> {
    let mut parts = tokenize(text, line)?;
    if parts.is_empty() {
        return Err(asm_error(line, "empty instruction".to_string()));
    }
    let mnemonic = parts.remove(0);
    let op = Opcode::from_mnemonic(&mnemonic)
        .ok_or_else(|| asm_error(line, format!("unknown mnemonic '{mnemonic}'")))?;

    let mut operands = Vec::with_capacity(parts.len());
    for part in parts {
        operands.push(parse_operand(&part, line)?);
    }

    let layout = op.operands();
    if operands.len() != layout.len() {
        return Err(asm_error(
            line,
            format!(
                "{} expects {} operands, got {}",
                op.mnemonic(),
                layout.len(),
                operands.len()
            ),
        ));
    }
    for (operand, kind) in operands.iter().zip(layout) {
        let ok = match kind {
            OperandKind::Reg => matches!(operand, AsmOperand::Reg(_)),
            OperandKind::Target => matches!(operand, AsmOperand::Label(_)),
            OperandKind::TypeCode => matches!(operand, AsmOperand::TypeCode(_)),
            OperandKind::Payload => !matches!(
                operand,
                AsmOperand::Reg(_) | AsmOperand::Label(_) | AsmOperand::TypeCode(_)
            ),
        };
        if !ok {
            return Err(asm_error(
                line,
                format!("invalid operand {operand:?} for {}", op.mnemonic()),
            ));
        }
    }

    Ok(Instr { op, operands, line })
}

/// Split an instruction into whitespace-separated tokens, keeping quoted
/// strings intact.
fn tokenize(text: &str, line: u32) -> CompileResult<Vec<String>> {
    let mut tokens = Vec::new();
    let mut chars = text.chars().peekable();
    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }
        if c == '"' {
            let mut token = String::from('"');
            chars.next();
            loop {
                match chars.next() {
                    Some('\\') => {
                        token.push('\\');
                        match chars.next() {
                            Some(escaped) => token.push(escaped),
                            None => {
                                return Err(asm_error(line, "unterminated string".to_string()))
                            }
                        }
                    }
                    Some('"') => {
                        token.push('"');
                        break;
                    }
                    Some(other) => token.push(other),
                    None => return Err(asm_error(line, "unterminated string".to_string())),
                }
            }
            tokens.push(token);
            continue;
        }
        let mut token = String::new();
        while let Some(&c) = chars.peek() {
            if c.is_whitespace() {
                break;
            }
            token.push(c);
            chars.next();
        }
        tokens.push(token);
    }
    Ok(tokens)
}

fn parse_operand(token: &str, line: u32) -> CompileResult<AsmOperand> {
    if let Some(rest) = token.strip_prefix('r') {
        if let Ok(index) = rest.parse::<u8>() {
            return Ok(AsmOperand::Reg(index));
        }
    }
    if let Some(label) = token.strip_prefix('@') {
        return Ok(AsmOperand::Label(label.to_string()));
    }
    if let Some(code) = token.strip_prefix('#') {
        let code = code
            .parse::<u8>()
            .map_err(|_| asm_error(line, format!("invalid type code '{token}'")))?;
        return Ok(AsmOperand::TypeCode(code));
    }
    if token.starts_with('"') && token.ends_with('"') && token.len() >= 2 {
        let content = &token[1..token.len() - 1];
        let unescaped = unescape(content)
            .ok_or_else(|| asm_error(line, format!("invalid string escape in {token}")))?;
        return Ok(AsmOperand::Str(unescaped));
    }
    if let Some(hex) = token.strip_prefix("0x") {
        let bytes = decode_hex(hex)
            .ok_or_else(|| asm_error(line, format!("invalid hex operand '{token}'")))?;
        return Ok(AsmOperand::Bytes(bytes));
    }
    match token {
        "true" => return Ok(AsmOperand::Bool(true)),
        "false" => return Ok(AsmOperand::Bool(false)),
        "none" => return Ok(AsmOperand::None),
        _ => {}
    }
    if let Ok(value) = token.parse::<BigInt>() {
        return Ok(AsmOperand::Number(value));
    }
    Err(asm_error(line, format!("unrecognized operand '{token}'")))
}

// === Encoding ===

/// Append an unsigned LEB128 varint.
pub fn write_varint(out: &mut Vec<u8>, mut value: u64) {
    loop {
        let mut byte = (value & 0x7F) as u8;
        value >>= 7;
        if value != 0 {
            byte |= 0x80;
        }
        out.push(byte);
        if value == 0 {
            break;
        }
    }
}

/// Read an unsigned LEB128 varint, advancing `pos`.
pub fn read_varint(bytes: &[u8], pos: &mut usize) -> Option<u64> {
    let mut value = 0u64;
    let mut shift = 0u32;
    loop {
        let byte = *bytes.get(*pos)?;
        *pos += 1;
        value |= u64::from(byte & 0x7F) << shift;
        if byte & 0x80 == 0 {
            return Some(value);
        }
        shift += 7;
        if shift > 63 {
            return None;
        }
    }
}

fn varint_len(value: u64) -> usize {
    let mut out = Vec::with_capacity(10);
    write_varint(&mut out, value);
    out.len()
}

/// Encoded payload of a `LOAD` literal: tag + varint length + bytes.
fn payload_bytes(operand: &AsmOperand) -> (u8, Vec<u8>) {
    match operand {
        AsmOperand::Number(value) => (payload_tag::NUMBER, value.to_signed_bytes_le()),
        AsmOperand::Bool(value) => (payload_tag::BOOL, vec![u8::from(*value)]),
        AsmOperand::Str(value) => (payload_tag::STRING, value.as_bytes().to_vec()),
        AsmOperand::Bytes(value) => (payload_tag::BYTES, value.clone()),
        AsmOperand::None => (payload_tag::NONE, Vec::new()),
        AsmOperand::Reg(_) | AsmOperand::Label(_) | AsmOperand::TypeCode(_) => {
            unreachable!("operand kinds validated during parsing")
        }
    }
}

fn instr_size(instr: &Instr) -> usize {
    let mut size = 1;
    for (operand, kind) in instr.operands.iter().zip(instr.op.operands()) {
        size += match kind {
            OperandKind::Reg | OperandKind::TypeCode => 1,
            OperandKind::Target => 2,
            OperandKind::Payload => {
                let (_, payload) = payload_bytes(operand);
                1 + varint_len(payload.len() as u64) + payload.len()
            }
        };
    }
    size
}

fn encode_instr(
    instr: &Instr,
    labels: &IndexMap<String, u16>,
    out: &mut Vec<u8>,
) -> CompileResult<()> {
    out.push(instr.op as u8);
    for (operand, kind) in instr.operands.iter().zip(instr.op.operands()) {
        match (kind, operand) {
            (OperandKind::Reg, AsmOperand::Reg(index)) => out.push(*index),
            (OperandKind::TypeCode, AsmOperand::TypeCode(code)) => out.push(*code),
            (OperandKind::Target, AsmOperand::Label(name)) => {
                let target = labels.get(name).ok_or_else(|| {
                    asm_error(instr.line, format!("unknown label @{name}"))
                })?;
                out.extend_from_slice(&target.to_le_bytes());
            }
            (OperandKind::Payload, operand) => {
                let (tag, payload) = payload_bytes(operand);
                out.push(tag);
                write_varint(out, payload.len() as u64);
                out.extend_from_slice(&payload);
            }
            (kind, operand) => {
                unreachable!("validated operand {operand:?} for kind {kind:?}")
            }
        }
    }
    Ok(())
}

fn asm_error(line: u32, message: String) -> CompilerError {
    CompilerError::new(Phase::Assemble, Span::new(0, 0, line), message)
}

fn unescape(s: &str) -> Option<String> {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => result.push('\n'),
                Some('t') => result.push('\t'),
                Some('\\') => result.push('\\'),
                Some('"') => result.push('"'),
                _ => return None,
            }
        } else {
            result.push(c);
        }
    }
    Some(result)
}

fn decode_hex(hex: &str) -> Option<Vec<u8>> {
    if hex.is_empty() || hex.len() % 2 != 0 {
        return None;
    }
    (0..hex.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&hex[i..i + 2], 16).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_varint_round_trip() {
        for value in [0u64, 1, 127, 128, 300, 16384, u32::MAX as u64] {
            let mut out = Vec::new();
            write_varint(&mut out, value);
            let mut pos = 0;
            assert_eq!(read_varint(&out, &mut pos), Some(value));
            assert_eq!(pos, out.len());
        }
    }

    #[test]
    fn test_simple_program() {
        let script = assemble(
            "@entry_run:\n    LOAD r0 7\n    PUSH r0\n    RET\n",
        )
        .unwrap();
        assert_eq!(script.labels.get("entry_run"), Some(&0));
        // LOAD = opcode + reg + tag + len + one payload byte.
        assert_eq!(script.bytes[0], Opcode::Load as u8);
        assert_eq!(script.bytes[1], 0); // r0
        assert_eq!(script.bytes[2], payload_tag::NUMBER);
        assert_eq!(script.bytes[3], 1); // length
        assert_eq!(script.bytes[4], 7);
        assert_eq!(script.bytes[5], Opcode::Push as u8);
    }

    #[test]
    fn test_label_resolution() {
        let script = assemble(
            "@start:\n    JMP @after\n    NOP\n@after:\n    RET\n",
        )
        .unwrap();
        // JMP is 3 bytes, NOP is 1: @after sits at offset 4.
        assert_eq!(script.labels.get("after"), Some(&4));
        assert_eq!(&script.bytes[1..3], &4u16.to_le_bytes());
    }

    #[test]
    fn test_unknown_label_is_fatal() {
        let err = assemble("JMP @nowhere\n").unwrap_err();
        assert!(err.message.contains("unknown label"));
        assert_eq!(err.phase, tomb_ast::Phase::Assemble);
    }

    #[test]
    fn test_comments_and_strings() {
        let script = assemble(
            "LOAD r1 \"hi // not a comment\" // real comment\nRET\n",
        )
        .unwrap();
        let text = b"hi // not a comment";
        assert!(script
            .bytes
            .windows(text.len())
            .any(|window| window == text));
    }

    #[test]
    fn test_operand_validation() {
        let err = assemble("COPY r0\n").unwrap_err();
        assert!(err.message.contains("expects 2 operands"));
        let err = assemble("JMP r0\n").unwrap_err();
        assert!(err.message.contains("invalid operand"));
    }

    #[test]
    fn test_negative_number_payload() {
        let script = assemble("LOAD r0 -1\nRET\n").unwrap();
        // -1 encodes as a single 0xFF byte, signed little-endian.
        assert_eq!(script.bytes[2], payload_tag::NUMBER);
        assert_eq!(script.bytes[3], 1);
        assert_eq!(script.bytes[4], 0xFF);
    }
}
