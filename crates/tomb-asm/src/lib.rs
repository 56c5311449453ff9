//! Assembler and ABI serializer for the TombLang VM.
//!
//! Lowers the textual assembly produced by `tomb-codegen` to the binary
//! script format, and encodes the module method table. The opcode
//! numbering and operand layouts live in [`opcode`]; the test harness VM
//! decodes against the same table.

pub mod abi;
mod assembler;
pub mod opcode;

pub use abi::{parse_abi, serialize_abi, AbiMethod};
pub use assembler::{
    assemble, payload_tag, read_varint, write_varint, AsmOperand, AssembledScript, Instr,
};
pub use opcode::{Opcode, OperandKind};
