//! Operand-byte decoding.
//!
//! Two conventions share the same five bit values:
//! - [`RegisterCode`] names exactly one register (1=A, 2=B, 4=D, 8=X, 16=Y).
//! - [`RegisterMask`] is a bit-set of the same values, used by PUSH/POP and by
//!   the mode byte of indexed addressing.
//!
//! Each opcode decodes its operand with the type matching its family.

/// Operand width of a register or an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Width {
    Byte,
    Word,
}

impl Width {
    /// Mask that truncates a value to this width
    pub const fn mask(self) -> u16 {
        match self {
            Width::Byte => 0x00FF,
            Width::Word => 0xFFFF,
        }
    }

    /// Most significant bit for this width
    pub const fn top_bit(self) -> u16 {
        match self {
            Width::Byte => 0x0080,
            Width::Word => 0x8000,
        }
    }
}

/// A single register named by an enumerated operand byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterCode {
    A = 1,
    B = 2,
    D = 4,
    X = 8,
    Y = 16,
}

impl RegisterCode {
    /// All codes in the machine's fixed A, B, D, X, Y order
    pub const ALL: [RegisterCode; 5] = [
        RegisterCode::A,
        RegisterCode::B,
        RegisterCode::D,
        RegisterCode::X,
        RegisterCode::Y,
    ];

    /// Decode an operand byte. Anything other than an exact match is rejected.
    pub fn decode(byte: u8) -> Option<Self> {
        match byte {
            1 => Some(RegisterCode::A),
            2 => Some(RegisterCode::B),
            4 => Some(RegisterCode::D),
            8 => Some(RegisterCode::X),
            16 => Some(RegisterCode::Y),
            _ => None,
        }
    }

    pub fn width(self) -> Width {
        match self {
            RegisterCode::A | RegisterCode::B => Width::Byte,
            RegisterCode::D | RegisterCode::X | RegisterCode::Y => Width::Word,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            RegisterCode::A => "A",
            RegisterCode::B => "B",
            RegisterCode::D => "D",
            RegisterCode::X => "X",
            RegisterCode::Y => "Y",
        }
    }

    /// Bit this register occupies in a [`RegisterMask`]
    pub const fn bit(self) -> u8 {
        self as u8
    }
}

/// Bit-set selection of registers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RegisterMask(u8);

impl RegisterMask {
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub fn contains(self, register: RegisterCode) -> bool {
        self.0 & register.bit() != 0
    }

    /// Selected registers in A, B, D, X, Y order
    pub fn registers(self) -> impl DoubleEndedIterator<Item = RegisterCode> {
        RegisterCode::ALL
            .into_iter()
            .filter(move |&register| self.contains(register))
    }

    pub fn is_empty(self) -> bool {
        self.registers().next().is_none()
    }
}

// Mode byte of indexed addressing
const INDEX_POST_INCREMENT: u8 = 0b0010_0000;
const INDEX_POST_DECREMENT: u8 = 0b0100_0000;
const INDEX_DOUBLE_STEP: u8 = 0b1000_0000;

/// Decoded mode/mask byte of an indexed load or store.
///
/// Bits 4/8/16 select D/X/Y as base (first match wins), bit 32 requests a
/// post-increment, bit 64 a post-decrement and bit 128 doubles the step.
/// Increment and decrement are applied independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexMode {
    pub base: Option<RegisterCode>,
    pub increment: bool,
    pub decrement: bool,
    pub double: bool,
}

impl IndexMode {
    pub fn decode(byte: u8) -> Self {
        let mask = RegisterMask::from_bits(byte);
        let base = [RegisterCode::D, RegisterCode::X, RegisterCode::Y]
            .into_iter()
            .find(|&register| mask.contains(register));
        Self {
            base,
            increment: byte & INDEX_POST_INCREMENT != 0,
            decrement: byte & INDEX_POST_DECREMENT != 0,
            double: byte & INDEX_DOUBLE_STEP != 0,
        }
    }

    /// Net change applied to the base register after the access
    pub fn post_adjust(self) -> u16 {
        let step: u16 = if self.double { 2 } else { 1 };
        let mut delta = 0u16;
        if self.increment {
            delta = delta.wrapping_add(step);
        }
        if self.decrement {
            delta = delta.wrapping_sub(step);
        }
        delta
    }
}
