//! ABI serialization.
//!
//! The ABI is a little-endian, length-prefixed table of a module's callable
//! surface: public methods in declaration order, then triggers. Strings are
//! varint-length-prefixed UTF-8; offsets are absolute script offsets of the
//! method entry labels.

use crate::assembler::{read_varint, write_varint};

/// Flag bits of an ABI method entry.
pub mod flags {
    /// The entry is a VM lifecycle trigger.
    pub const TRIGGER: u8 = 0b0000_0001;
    /// The method returns a variadic stream (`T*`).
    pub const VARIADIC: u8 = 0b0000_0010;
}

/// Return-type code of a method with no declared return type.
///
/// Distinct from the `none` *value* type (code 0): `f(): none` and `f()`
/// serialize differently.
pub const VOID_RETURN: u8 = 0xFF;

/// One method entry of a module's ABI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AbiMethod {
    pub name: String,
    /// Absolute script offset of the entry label.
    pub offset: u32,
    /// VM type code of the return type; `0` encodes none/void distinctly
    /// from any value type.
    pub ret_code: u8,
    pub trigger: bool,
    pub variadic: bool,
    /// `(name, VM type code)` per parameter, in declaration order.
    pub params: Vec<(String, u8)>,
}

/// Serialize a module's ABI.
pub fn serialize_abi(module_name: &str, methods: &[AbiMethod]) -> Vec<u8> {
    let mut out = Vec::new();
    write_str(&mut out, module_name);
    write_varint(&mut out, methods.len() as u64);
    for method in methods {
        write_str(&mut out, &method.name);
        out.extend_from_slice(&method.offset.to_le_bytes());
        let mut flag_bits = 0u8;
        if method.trigger {
            flag_bits |= flags::TRIGGER;
        }
        if method.variadic {
            flag_bits |= flags::VARIADIC;
        }
        out.push(flag_bits);
        out.push(method.ret_code);
        out.push(method.params.len() as u8);
        for (name, code) in &method.params {
            write_str(&mut out, name);
            out.push(*code);
        }
    }
    out
}

/// Parse an ABI back into its method table.
///
/// Used by the CLI manifest and the test harness; returns `None` on a
/// malformed buffer.
pub fn parse_abi(bytes: &[u8]) -> Option<(String, Vec<AbiMethod>)> {
    let mut pos = 0usize;
    let module_name = read_str(bytes, &mut pos)?;
    let count = read_varint(bytes, &mut pos)?;
    let mut methods = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let name = read_str(bytes, &mut pos)?;
        let offset = u32::from_le_bytes(bytes.get(pos..pos + 4)?.try_into().ok()?);
        pos += 4;
        let flag_bits = *bytes.get(pos)?;
        pos += 1;
        let ret_code = *bytes.get(pos)?;
        pos += 1;
        let param_count = *bytes.get(pos)?;
        pos += 1;
        let mut params = Vec::with_capacity(param_count as usize);
        for _ in 0..param_count {
            let param_name = read_str(bytes, &mut pos)?;
            let code = *bytes.get(pos)?;
            pos += 1;
            params.push((param_name, code));
        }
        methods.push(AbiMethod {
            name,
            offset,
            ret_code,
            trigger: flag_bits & flags::TRIGGER != 0,
            variadic: flag_bits & flags::VARIADIC != 0,
            params,
        });
    }
    if pos != bytes.len() {
        return None;
    }
    Some((module_name, methods))
}

fn write_str(out: &mut Vec<u8>, text: &str) {
    write_varint(out, text.len() as u64);
    out.extend_from_slice(text.as_bytes());
}

fn read_str(bytes: &[u8], pos: &mut usize) -> Option<String> {
    let len = read_varint(bytes, pos)? as usize;
    let slice = bytes.get(*pos..*pos + len)?;
    *pos += len;
    String::from_utf8(slice.to_vec()).ok()
}
