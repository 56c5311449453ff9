//! Literal values.
//!
//! Literals are the currency of constant folding and macro expansion: by the
//! time code generation runs, every constant reference, enum entry and macro
//! has been folded into one of these.

use crate::error::{CompileResult, CompilerError, Phase};
use crate::span::Span;
use crate::types::{Type, TypeInterner, TypeRef};
use num_bigint::BigInt;
use num_traits::Zero;

/// A compile-time constant value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Literal {
    /// Arbitrary-precision integer.
    Number(BigInt),
    /// Scaled fixed-point value: `raw` equals `⌊value · 10^places⌋`.
    Decimal { raw: BigInt, places: u8 },
    Bool(bool),
    String(String),
    /// Raw address bytes.
    Address(Vec<u8>),
    /// Raw byte string from a `0x…` literal.
    Bytes(Vec<u8>),
    None,
}

impl Literal {
    /// The natural type of this literal.
    pub fn ty(&self, types: &mut TypeInterner) -> TypeRef {
        match self {
            Literal::Number(_) => types.number(),
            Literal::Decimal { places, .. } => types.intern(Type::Decimal(*places)),
            Literal::Bool(_) => types.bool_(),
            Literal::String(_) => types.string(),
            Literal::Address(_) => types.address(),
            Literal::Bytes(_) => types.bytes(),
            Literal::None => types.none(),
        }
    }

    /// Render as a textual-assembly operand.
    pub fn asm_operand(&self) -> String {
        match self {
            Literal::Number(n) => n.to_string(),
            Literal::Decimal { raw, .. } => raw.to_string(),
            Literal::Bool(b) => b.to_string(),
            Literal::String(s) => format!("\"{}\"", escape_asm_string(s)),
            Literal::Address(bytes) | Literal::Bytes(bytes) => {
                let mut out = String::with_capacity(2 + bytes.len() * 2);
                out.push_str("0x");
                for b in bytes {
                    out.push_str(&format!("{b:02x}"));
                }
                out
            }
            Literal::None => "none".to_string(),
        }
    }
}

/// Escape a string for embedding in assembly text.
pub fn escape_asm_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            _ => out.push(c),
        }
    }
    out
}

/// Scale a decimal literal (`"2.4587"`) to an integer with the given
/// precision.
///
/// Fails with a message containing "precision" when the literal carries more
/// fractional digits than the target allows.
pub fn scale_decimal(text: &str, places: u8, span: Span) -> CompileResult<BigInt> {
    let (int_part, frac_part) = match text.split_once('.') {
        Some(parts) => parts,
        None => (text, ""),
    };
    let frac_part = frac_part.trim_end_matches('0');
    if frac_part.len() > places as usize {
        return Err(CompilerError::new(
            Phase::TypeCheck,
            span,
            format!(
                "decimal literal {text} exceeds precision: {} fractional digits do not fit in decimal<{places}>",
                frac_part.len()
            ),
        ));
    }
    let mut digits = String::with_capacity(int_part.len() + places as usize);
    digits.push_str(int_part);
    digits.push_str(frac_part);
    for _ in frac_part.len()..places as usize {
        digits.push('0');
    }
    digits
        .parse::<BigInt>()
        .map_err(|_| CompilerError::new(Phase::TypeCheck, span, format!("invalid decimal literal {text}")))
}

/// Rescale an already-scaled decimal from `from` to `to` fractional digits.
///
/// Only widening is possible without loss; narrowing fails unless the
/// dropped digits are zero.
pub fn rescale_decimal(raw: &BigInt, from: u8, to: u8, span: Span) -> CompileResult<BigInt> {
    if from == to {
        return Ok(raw.clone());
    }
    if from < to {
        let factor = BigInt::from(10u32).pow((to - from) as u32);
        return Ok(raw * factor);
    }
    let factor = BigInt::from(10u32).pow((from - to) as u32);
    let (quot, rem) = (raw / &factor, raw % &factor);
    if !rem.is_zero() {
        return Err(CompilerError::new(
            Phase::TypeCheck,
            span,
            format!("decimal value exceeds precision: cannot narrow decimal<{from}> to decimal<{to}>"),
        ));
    }
    Ok(quot)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scale_decimal() {
        let span = Span::zero();
        assert_eq!(scale_decimal("2.45", 3, span).unwrap(), BigInt::from(2450));
        assert_eq!(scale_decimal("2.450", 2, span).unwrap(), BigInt::from(245));
        assert_eq!(scale_decimal("7", 2, span).unwrap(), BigInt::from(700));
    }

    #[test]
    fn test_scale_decimal_overflow() {
        let err = scale_decimal("2.4587", 3, Span::zero()).unwrap_err();
        assert!(err.message.contains("precision"));
    }

    #[test]
    fn test_rescale() {
        let span = Span::zero();
        let raw = BigInt::from(245);
        assert_eq!(rescale_decimal(&raw, 2, 4, span).unwrap(), BigInt::from(24500));
        assert_eq!(
            rescale_decimal(&BigInt::from(24500), 4, 2, span).unwrap(),
            BigInt::from(245)
        );
        assert!(rescale_decimal(&BigInt::from(2451), 3, 2, span).is_err());
    }

    #[test]
    fn test_asm_operand() {
        assert_eq!(Literal::Number(BigInt::from(-3)).asm_operand(), "-3");
        assert_eq!(
            Literal::String("a\"b".to_string()).asm_operand(),
            "\"a\\\"b\""
        );
        assert_eq!(Literal::Bytes(vec![0xa1, 0x02]).asm_operand(), "0xa102");
        assert_eq!(Literal::Bool(true).asm_operand(), "true");
    }
}
