//! Opcode numbering and operand layouts.
//!
//! The numbering is fixed by the VM specification; it lives in exactly one
//! table so the compiler and the test harness cannot drift apart. Never
//! rely on enum declaration order anywhere else.

/// VM opcodes, numbered as the VM defines them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Opcode {
    Nop = 0x00,
    Load = 0x01,
    Copy = 0x02,
    Push = 0x03,
    Pop = 0x04,
    Add = 0x05,
    Sub = 0x06,
    Mul = 0x07,
    Div = 0x08,
    Mod = 0x09,
    Shl = 0x0A,
    Shr = 0x0B,
    And = 0x0C,
    Or = 0x0D,
    Xor = 0x0E,
    Not = 0x0F,
    Neg = 0x10,
    Equal = 0x11,
    Lt = 0x12,
    Gt = 0x13,
    Lte = 0x14,
    Gte = 0x15,
    Jmp = 0x16,
    JmpIf = 0x17,
    JmpNot = 0x18,
    Call = 0x19,
    ExtCall = 0x1A,
    Ret = 0x1B,
    Ctx = 0x1C,
    Switch = 0x1D,
    Throw = 0x1E,
    Cast = 0x1F,
}

/// Operand slot kinds, in instruction order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandKind {
    /// A register index, one byte.
    Reg,
    /// An absolute jump target, u16 little-endian.
    Target,
    /// A VM type code, one byte.
    TypeCode,
    /// A typed literal: tag byte + varint length + payload.
    Payload,
}

/// Mnemonic/opcode table; a single source of truth for both directions.
const MNEMONICS: &[(&str, Opcode)] = &[
    ("NOP", Opcode::Nop),
    ("LOAD", Opcode::Load),
    ("COPY", Opcode::Copy),
    ("PUSH", Opcode::Push),
    ("POP", Opcode::Pop),
    ("ADD", Opcode::Add),
    ("SUB", Opcode::Sub),
    ("MUL", Opcode::Mul),
    ("DIV", Opcode::Div),
    ("MOD", Opcode::Mod),
    ("SHL", Opcode::Shl),
    ("SHR", Opcode::Shr),
    ("AND", Opcode::And),
    ("OR", Opcode::Or),
    ("XOR", Opcode::Xor),
    ("NOT", Opcode::Not),
    ("NEG", Opcode::Neg),
    ("EQUAL", Opcode::Equal),
    ("LT", Opcode::Lt),
    ("GT", Opcode::Gt),
    ("LTE", Opcode::Lte),
    ("GTE", Opcode::Gte),
    ("JMP", Opcode::Jmp),
    ("JMPIF", Opcode::JmpIf),
    ("JMPNOT", Opcode::JmpNot),
    ("CALL", Opcode::Call),
    ("EXTCALL", Opcode::ExtCall),
    ("RET", Opcode::Ret),
    ("CTX", Opcode::Ctx),
    ("SWITCH", Opcode::Switch),
    ("THROW", Opcode::Throw),
    ("CAST", Opcode::Cast),
];

impl Opcode {
    /// Parse an assembly mnemonic.
    pub fn from_mnemonic(text: &str) -> Option<Self> {
        MNEMONICS
            .iter()
            .find(|(name, _)| *name == text)
            .map(|(_, op)| *op)
    }

    /// The assembly mnemonic.
    pub fn mnemonic(self) -> &'static str {
        MNEMONICS
            .iter()
            .find(|(_, op)| *op == self)
            .map(|(name, _)| *name)
            .expect("opcode present in mnemonic table")
    }

    /// Decode an opcode byte.
    pub fn from_byte(byte: u8) -> Option<Self> {
        MNEMONICS
            .iter()
            .find(|(_, op)| *op as u8 == byte)
            .map(|(_, op)| *op)
    }

    /// The operand layout of this opcode.
    pub fn operands(self) -> &'static [OperandKind] {
        use OperandKind::*;
        match self {
            Opcode::Nop | Opcode::Ret => &[],
            Opcode::Load => &[Reg, Payload],
            Opcode::Copy | Opcode::Ctx | Opcode::Not | Opcode::Neg => &[Reg, Reg],
            Opcode::Push
            | Opcode::Pop
            | Opcode::ExtCall
            | Opcode::Switch
            | Opcode::Throw => &[Reg],
            Opcode::Add
            | Opcode::Sub
            | Opcode::Mul
            | Opcode::Div
            | Opcode::Mod
            | Opcode::Shl
            | Opcode::Shr
            | Opcode::And
            | Opcode::Or
            | Opcode::Xor
            | Opcode::Equal
            | Opcode::Lt
            | Opcode::Gt
            | Opcode::Lte
            | Opcode::Gte => &[Reg, Reg, Reg],
            Opcode::Jmp | Opcode::Call => &[Target],
            Opcode::JmpIf | Opcode::JmpNot => &[Reg, Target],
            Opcode::Cast => &[Reg, Reg, TypeCode],
        }
    }
}
