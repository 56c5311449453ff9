//! In-memory reference VM for validating compiled scripts.
//!
//! This is test tooling, not a product VM: it decodes the binary format
//! against the same opcode table the assembler encodes with, and implements
//! exactly the semantics the compiler's output relies on — register frames
//! per call, an operand stack, contract storage keyed by
//! `keccak256(contract) || field`, and the handful of ext-calls the test
//! programs use.

use num_bigint::BigInt;
use num_traits::Zero;
use sha3::{Digest, Keccak256};
use std::collections::HashMap;
use thiserror::Error;
use tomb_asm::{payload_tag, read_varint, Opcode};
use tomb_codegen::REGISTER_COUNT;

/// A runtime value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    None,
    Number(BigInt),
    Bool(bool),
    String(String),
    Bytes(Vec<u8>),
}

impl Value {
    pub fn number(value: i64) -> Self {
        Value::Number(BigInt::from(value))
    }

    pub fn string(value: &str) -> Self {
        Value::String(value.to_string())
    }

    fn as_number(&self) -> Result<&BigInt, VmError> {
        match self {
            Value::Number(n) => Ok(n),
            other => Err(VmError::TypeMismatch(format!(
                "expected number, got {other:?}"
            ))),
        }
    }

    fn as_bool(&self) -> Result<bool, VmError> {
        match self {
            Value::Bool(b) => Ok(*b),
            other => Err(VmError::TypeMismatch(format!(
                "expected bool, got {other:?}"
            ))),
        }
    }

    fn as_string(&self) -> Result<&str, VmError> {
        match self {
            Value::String(s) => Ok(s),
            other => Err(VmError::TypeMismatch(format!(
                "expected string, got {other:?}"
            ))),
        }
    }
}

/// Execution failures of the reference VM.
#[derive(Debug, Error)]
pub enum VmError {
    #[error("unknown opcode 0x{0:02x} at offset {1}")]
    UnknownOpcode(u8, usize),
    #[error("truncated instruction at offset {0}")]
    Truncated(usize),
    #[error("stack underflow")]
    StackUnderflow,
    #[error("type mismatch: {0}")]
    TypeMismatch(String),
    #[error("unknown ext-call '{0}'")]
    UnknownExtCall(String),
    #[error("script threw: {0}")]
    Thrown(String),
    #[error("unsupported operation: {0}")]
    Unsupported(&'static str),
    #[error("execution exceeded {0} steps")]
    StepLimit(u64),
}

struct Frame {
    regs: Vec<Value>,
    ret_ip: Option<usize>,
}

impl Frame {
    fn new(ret_ip: Option<usize>) -> Self {
        Self {
            regs: vec![Value::None; REGISTER_COUNT],
            ret_ip,
        }
    }
}

/// The reference VM.
pub struct Vm<'a> {
    code: &'a [u8],
    stack: Vec<Value>,
    frames: Vec<Frame>,
    storage: HashMap<Vec<u8>, Value>,
    context: String,
    logs: Vec<String>,
}

const STEP_LIMIT: u64 = 1_000_000;

impl<'a> Vm<'a> {
    /// Create a VM over a compiled script, executing in the storage
    /// context of the named contract.
    pub fn new(code: &'a [u8], contract: &str) -> Self {
        Self {
            code,
            stack: Vec::new(),
            frames: Vec::new(),
            storage: HashMap::new(),
            context: contract.to_string(),
            logs: Vec::new(),
        }
    }

    /// Push an argument before a call. Callers push right-to-left so the
    /// first argument ends up on top.
    pub fn push(&mut self, value: Value) {
        self.stack.push(value);
    }

    /// Pop a result after a call.
    pub fn pop(&mut self) -> Option<Value> {
        self.stack.pop()
    }

    /// The operand stack, bottom first.
    pub fn stack(&self) -> &[Value] {
        &self.stack
    }

    /// Number of keys in contract storage.
    pub fn storage_len(&self) -> usize {
        self.storage.len()
    }

    /// Messages captured from `Runtime.Log`.
    pub fn logs(&self) -> &[String] {
        &self.logs
    }

    /// Execute from an absolute offset until the outermost `RET`.
    pub fn run(&mut self, offset: u32) -> Result<(), VmError> {
        let mut ip = offset as usize;
        self.frames.push(Frame::new(None));
        let mut steps = 0u64;

        loop {
            steps += 1;
            if steps > STEP_LIMIT {
                return Err(VmError::StepLimit(STEP_LIMIT));
            }

            let at = ip;
            let byte = *self.code.get(ip).ok_or(VmError::Truncated(at))?;
            ip += 1;
            let op = Opcode::from_byte(byte).ok_or(VmError::UnknownOpcode(byte, at))?;

            match op {
                Opcode::Nop => {}
                Opcode::Load => {
                    let reg = self.read_reg(&mut ip, at)?;
                    let value = self.read_payload(&mut ip, at)?;
                    self.set_reg(reg, value);
                }
                Opcode::Copy => {
                    let src = self.read_reg(&mut ip, at)?;
                    let dst = self.read_reg(&mut ip, at)?;
                    let value = self.reg(src).clone();
                    self.set_reg(dst, value);
                }
                Opcode::Push => {
                    let reg = self.read_reg(&mut ip, at)?;
                    let value = self.reg(reg).clone();
                    self.stack.push(value);
                }
                Opcode::Pop => {
                    let reg = self.read_reg(&mut ip, at)?;
                    let value = self.stack.pop().ok_or(VmError::StackUnderflow)?;
                    self.set_reg(reg, value);
                }
                Opcode::Add
                | Opcode::Sub
                | Opcode::Mul
                | Opcode::Div
                | Opcode::Mod
                | Opcode::Shl
                | Opcode::Shr
                | Opcode::Xor
                | Opcode::Equal
                | Opcode::Lt
                | Opcode::Gt
                | Opcode::Lte
                | Opcode::Gte
                | Opcode::And
                | Opcode::Or => {
                    let l = self.read_reg(&mut ip, at)?;
                    let r = self.read_reg(&mut ip, at)?;
                    let out = self.read_reg(&mut ip, at)?;
                    let result = self.binary(op, l, r)?;
                    self.set_reg(out, result);
                }
                Opcode::Not => {
                    let src = self.read_reg(&mut ip, at)?;
                    let dst = self.read_reg(&mut ip, at)?;
                    let value = !self.reg(src).as_bool()?;
                    self.set_reg(dst, Value::Bool(value));
                }
                Opcode::Neg => {
                    let src = self.read_reg(&mut ip, at)?;
                    let dst = self.read_reg(&mut ip, at)?;
                    let value = -self.reg(src).as_number()?;
                    self.set_reg(dst, Value::Number(value));
                }
                Opcode::Jmp => {
                    ip = self.read_target(&mut ip, at)?;
                }
                Opcode::JmpIf => {
                    let reg = self.read_reg(&mut ip, at)?;
                    let target = self.read_target(&mut ip, at)?;
                    if self.reg(reg).as_bool()? {
                        ip = target;
                    }
                }
                Opcode::JmpNot => {
                    let reg = self.read_reg(&mut ip, at)?;
                    let target = self.read_target(&mut ip, at)?;
                    if !self.reg(reg).as_bool()? {
                        ip = target;
                    }
                }
                Opcode::Call => {
                    let target = self.read_target(&mut ip, at)?;
                    self.frames.push(Frame::new(Some(ip)));
                    ip = target;
                }
                Opcode::Ret => {
                    let frame = self.frames.pop().expect("frame present while running");
                    match frame.ret_ip {
                        Some(ret_ip) => ip = ret_ip,
                        None => return Ok(()),
                    }
                }
                Opcode::ExtCall => {
                    let reg = self.read_reg(&mut ip, at)?;
                    let name = self.reg(reg).as_string()?.to_string();
                    self.ext_call(&name)?;
                }
                Opcode::Ctx | Opcode::Switch => {
                    return Err(VmError::Unsupported("cross-contract context switch"));
                }
                Opcode::Throw => {
                    let reg = self.read_reg(&mut ip, at)?;
                    let message = self.reg(reg).as_string()?.to_string();
                    return Err(VmError::Thrown(message));
                }
                Opcode::Cast => {
                    let src = self.read_reg(&mut ip, at)?;
                    let dst = self.read_reg(&mut ip, at)?;
                    let code = *self.code.get(ip).ok_or(VmError::Truncated(at))?;
                    ip += 1;
                    let value = cast(self.reg(src), code)?;
                    self.set_reg(dst, value);
                }
            }
        }
    }

    // === Decoding ===

    fn read_reg(&self, ip: &mut usize, at: usize) -> Result<usize, VmError> {
        let byte = *self.code.get(*ip).ok_or(VmError::Truncated(at))?;
        *ip += 1;
        Ok(byte as usize)
    }

    fn read_target(&self, ip: &mut usize, at: usize) -> Result<usize, VmError> {
        let bytes = self
            .code
            .get(*ip..*ip + 2)
            .ok_or(VmError::Truncated(at))?;
        *ip += 2;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]) as usize)
    }

    fn read_payload(&self, ip: &mut usize, at: usize) -> Result<Value, VmError> {
        let tag = *self.code.get(*ip).ok_or(VmError::Truncated(at))?;
        *ip += 1;
        let len = read_varint(self.code, ip).ok_or(VmError::Truncated(at))? as usize;
        let bytes = self
            .code
            .get(*ip..*ip + len)
            .ok_or(VmError::Truncated(at))?;
        *ip += len;
        match tag {
            payload_tag::NONE => Ok(Value::None),
            payload_tag::NUMBER => Ok(Value::Number(BigInt::from_signed_bytes_le(bytes))),
            payload_tag::BOOL => Ok(Value::Bool(first_byte(bytes)? != 0)),
            payload_tag::STRING => String::from_utf8(bytes.to_vec())
                .map(Value::String)
                .map_err(|_| VmError::TypeMismatch("invalid utf-8 string payload".to_string())),
            payload_tag::ADDRESS | payload_tag::BYTES => Ok(Value::Bytes(bytes.to_vec())),
            other => Err(VmError::TypeMismatch(format!(
                "unknown payload tag {other}"
            ))),
        }
    }

    // === Registers ===

    fn reg(&self, index: usize) -> &Value {
        &self.frames.last().expect("frame present").regs[index]
    }

    fn set_reg(&mut self, index: usize, value: Value) {
        self.frames.last_mut().expect("frame present").regs[index] = value;
    }

    // === Operators ===

    fn binary(&self, op: Opcode, l: usize, r: usize) -> Result<Value, VmError> {
        let left = self.reg(l);
        let right = self.reg(r);
        let value = match op {
            Opcode::Add => match (left, right) {
                (Value::String(a), Value::String(b)) => Value::String(format!("{a}{b}")),
                _ => Value::Number(left.as_number()? + right.as_number()?),
            },
            Opcode::Sub => Value::Number(left.as_number()? - right.as_number()?),
            Opcode::Mul => Value::Number(left.as_number()? * right.as_number()?),
            Opcode::Div => {
                let divisor = right.as_number()?;
                if divisor.is_zero() {
                    return Err(VmError::TypeMismatch("division by zero".to_string()));
                }
                Value::Number(left.as_number()? / divisor)
            }
            Opcode::Mod => Value::Number(left.as_number()? % right.as_number()?),
            Opcode::Shl => Value::Number(left.as_number()? << shift_amount(right)?),
            Opcode::Shr => Value::Number(left.as_number()? >> shift_amount(right)?),
            Opcode::Xor => Value::Number(left.as_number()? ^ right.as_number()?),
            Opcode::Equal => Value::Bool(left == right),
            Opcode::Lt => Value::Bool(left.as_number()? < right.as_number()?),
            Opcode::Gt => Value::Bool(left.as_number()? > right.as_number()?),
            Opcode::Lte => Value::Bool(left.as_number()? <= right.as_number()?),
            Opcode::Gte => Value::Bool(left.as_number()? >= right.as_number()?),
            Opcode::And => Value::Bool(left.as_bool()? && right.as_bool()?),
            Opcode::Or => Value::Bool(left.as_bool()? || right.as_bool()?),
            _ => unreachable!("non-binary opcode dispatched as binary"),
        };
        Ok(value)
    }

    // === Ext-calls ===

    fn ext_call(&mut self, name: &str) -> Result<(), VmError> {
        match name {
            "Data.Get" => {
                let key = self.pop_value()?.as_string()?.to_string();
                let value = self
                    .storage
                    .get(&self.storage_key(&key))
                    .cloned()
                    .unwrap_or(Value::None);
                self.stack.push(value);
                Ok(())
            }
            "Data.Set" => {
                let key = self.pop_value()?.as_string()?.to_string();
                let value = self.pop_value()?;
                let storage_key = self.storage_key(&key);
                self.storage.insert(storage_key, value);
                Ok(())
            }
            "Data.Delete" => {
                let key = self.pop_value()?.as_string()?.to_string();
                let storage_key = self.storage_key(&key);
                self.storage.remove(&storage_key);
                Ok(())
            }
            "String.Length" => {
                let text = self.pop_value()?;
                let len = text.as_string()?.chars().count() as i64;
                self.stack.push(Value::number(len));
                Ok(())
            }
            "String.ToUpper" => {
                let text = self.pop_value()?;
                self.stack
                    .push(Value::String(text.as_string()?.to_uppercase()));
                Ok(())
            }
            "String.ToLower" => {
                let text = self.pop_value()?;
                self.stack
                    .push(Value::String(text.as_string()?.to_lowercase()));
                Ok(())
            }
            "Runtime.Log" => {
                let message = self.pop_value()?;
                self.logs.push(message.as_string()?.to_string());
                Ok(())
            }
            other => Err(VmError::UnknownExtCall(other.to_string())),
        }
    }

    fn pop_value(&mut self) -> Result<Value, VmError> {
        self.stack.pop().ok_or(VmError::StackUnderflow)
    }

    /// Storage key of a global: `keccak256(contract) || field`.
    fn storage_key(&self, field: &str) -> Vec<u8> {
        let mut hasher = Keccak256::new();
        hasher.update(self.context.as_bytes());
        let mut key = hasher.finalize().to_vec();
        key.extend_from_slice(field.as_bytes());
        key
    }
}

fn first_byte(bytes: &[u8]) -> Result<u8, VmError> {
    bytes
        .first()
        .copied()
        .ok_or_else(|| VmError::TypeMismatch("empty bool payload".to_string()))
}

fn shift_amount(value: &Value) -> Result<u32, VmError> {
    let n = value.as_number()?;
    u32::try_from(n.clone())
        .map_err(|_| VmError::TypeMismatch(format!("invalid shift amount {n}")))
}

/// `CAST` semantics for the type codes the compiler emits.
fn cast(value: &Value, code: u8) -> Result<Value, VmError> {
    match code {
        // number
        1 | 4 => match value {
            Value::Number(n) => Ok(Value::Number(n.clone())),
            Value::String(s) => s
                .parse::<BigInt>()
                .map(Value::Number)
                .map_err(|_| VmError::TypeMismatch(format!("cannot cast '{s}' to number"))),
            Value::Bool(b) => Ok(Value::number(i64::from(*b))),
            other => Err(VmError::TypeMismatch(format!(
                "cannot cast {other:?} to number"
            ))),
        },
        // string
        3 => match value {
            Value::String(s) => Ok(Value::String(s.clone())),
            Value::Number(n) => Ok(Value::String(n.to_string())),
            Value::Bool(b) => Ok(Value::String(b.to_string())),
            Value::Bytes(bytes) => {
                let mut out = String::with_capacity(2 + bytes.len() * 2);
                out.push_str("0x");
                for b in bytes {
                    out.push_str(&format!("{b:02x}"));
                }
                Ok(Value::String(out))
            }
            Value::None => Ok(Value::String(String::new())),
        },
        // any other target keeps the representation
        _ => Ok(value.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_asm(asm: &str, args: Vec<Value>) -> (Vec<Value>, Result<(), VmError>) {
        let script = tomb_asm::assemble(asm).expect("assembly failed");
        let mut vm = Vm::new(&script.bytes, "test");
        for arg in args.into_iter().rev() {
            vm.push(arg);
        }
        let result = vm.run(0);
        (vm.stack().to_vec(), result)
    }

    #[test]
    fn test_arithmetic() {
        let (stack, result) = run_asm(
            "POP r0\nPOP r1\nADD r0 r1 r2\nPUSH r2\nRET\n",
            vec![Value::number(2), Value::number(40)],
        );
        result.unwrap();
        assert_eq!(stack, vec![Value::number(42)]);
    }

    #[test]
    fn test_string_concat_via_add() {
        let (stack, result) = run_asm(
            "LOAD r0 \"foo\"\nLOAD r1 \"bar\"\nADD r0 r1 r2\nPUSH r2\nRET\n",
            vec![],
        );
        result.unwrap();
        assert_eq!(stack, vec![Value::string("foobar")]);
    }

    #[test]
    fn test_call_frames_isolate_registers() {
        // The callee clobbers r0; the caller's r0 must survive.
        let asm = "\
LOAD r0 7
CALL @clobber
PUSH r0
RET
@clobber:
    LOAD r0 99
    RET
";
        let (stack, result) = run_asm(asm, vec![]);
        result.unwrap();
        assert_eq!(stack, vec![Value::number(7)]);
    }

    #[test]
    fn test_throw() {
        let (_, result) = run_asm("LOAD r0 \"boom\"\nTHROW r0\n", vec![]);
        match result {
            Err(VmError::Thrown(message)) => assert_eq!(message, "boom"),
            other => panic!("expected throw, got {other:?}"),
        }
    }

    #[test]
    fn test_storage_round_trip() {
        let asm = "\
LOAD r0 \"val\"
PUSH r0
LOAD r0 \"slot\"
PUSH r0
LOAD r0 \"Data.Set\"
EXTCALL r0
LOAD r0 \"slot\"
PUSH r0
LOAD r0 \"Data.Get\"
EXTCALL r0
RET
";
        let script = tomb_asm::assemble(asm).unwrap();
        let mut vm = Vm::new(&script.bytes, "demo");
        vm.run(0).unwrap();
        assert_eq!(vm.storage_len(), 1);
        assert_eq!(vm.pop(), Some(Value::string("val")));
    }

    #[test]
    fn test_cast_number_to_string() {
        let (stack, result) = run_asm(
            "LOAD r0 123\nCAST r0 r0 #3\nPUSH r0\nRET\n",
            vec![],
        );
        result.unwrap();
        assert_eq!(stack, vec![Value::string("123")]);
    }
}
