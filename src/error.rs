use thiserror::Error;

/// Which of the machine's stacks ran dry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackKind {
    /// 8-bit operand stack (A, B)
    Byte,
    /// 16-bit operand stack (D, X, Y)
    Word,
    /// Return-address stack used by CALL/RET
    Call,
}

/// Errors raised while parsing or loading a B33 image.
///
/// A load error is always reported before anything is written to the bus.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("image too short: {len} bytes, header needs 10")]
    Truncated { len: usize },
    #[error("bad magic {0:02X?}, expected \"B33\"")]
    BadMagic([u8; 3]),
    #[error("payload of {len} bytes at 0x{load_address:04X} runs past 0xFFFF")]
    PayloadOverflow { load_address: u16, len: usize },
    #[error("debug table pointer 0x{pointer:04X} lies outside the payload")]
    DebugTableOutOfRange { pointer: u16 },
    #[error("debug table truncated at payload offset {offset}")]
    TruncatedDebugTable { offset: usize },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Faults end the current run. The register file is left as it was before
/// the faulting instruction, so `pc` is the address of its opcode.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Fault {
    #[error("division by zero at 0x{pc:04X} (opcode 0x{opcode:02X})")]
    DivideByZero { pc: u16, opcode: u8 },
    #[error("{stack:?} stack underflow at 0x{pc:04X} (opcode 0x{opcode:02X})")]
    StackUnderflow { pc: u16, opcode: u8, stack: StackKind },
    #[error("illegal opcode 0x{opcode:02X} at 0x{pc:04X}")]
    IllegalOpcode { pc: u16, opcode: u8 },
    #[error("invalid register code 0x{code:02X} at 0x{pc:04X} (opcode 0x{opcode:02X})")]
    InvalidRegisterCode { pc: u16, opcode: u8, code: u8 },
}

impl Fault {
    /// Address of the instruction that faulted
    pub fn pc(&self) -> u16 {
        match *self {
            Fault::DivideByZero { pc, .. }
            | Fault::StackUnderflow { pc, .. }
            | Fault::IllegalOpcode { pc, .. }
            | Fault::InvalidRegisterCode { pc, .. } => pc,
        }
    }
}

#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("device requires its own execution context but none was supplied")]
    ContextRequired,
    #[error("device execution context has shut down")]
    ContextClosed,
}

/// Anything that can end [`crate::machine::Machine::boot`]
#[derive(Debug, Error)]
pub enum MachineError {
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error(transparent)]
    Device(#[from] DeviceError),
    #[error(transparent)]
    Fault(#[from] Fault),
}

/// Returned by observer hooks. The interpreter logs and drops these.
#[derive(Debug, Error)]
#[error("observer failed: {0}")]
pub struct ObserverError(pub String);
