use std::fmt;

use crate::operand::RegisterCode;

/// Condition code register flags
/// Bit 0: Carry / shift-out (written only by LSFT/RSFT)
/// Bit 1: Equal
/// Bit 2: Greater than (unsigned)
/// Bit 3: Less than (unsigned)
/// Bit 4: Not equal
pub const FLAG_CARRY: u8 = 0b0000_0001;
pub const FLAG_EQUAL: u8 = 0b0000_0010;
pub const FLAG_GREATER: u8 = 0b0000_0100;
pub const FLAG_LESS: u8 = 0b0000_1000;
pub const FLAG_NOT_EQUAL: u8 = 0b0001_0000;

/// Bits owned by compare instructions
pub const COMPARE_FLAGS: u8 = FLAG_EQUAL | FLAG_GREATER | FLAG_LESS | FLAG_NOT_EQUAL;

/// B33 register file.
///
/// D is not stored separately: it is always `(A << 8) | B`, so every
/// assignment to A, B or D keeps the three in agreement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RegisterFile {
    a: u8,
    b: u8,
    x: u16,
    y: u16,
    pc: u16,
    cc: u8,
}

impl RegisterFile {
    pub fn new() -> Self {
        Self::default()
    }

    /// Zero every register
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn a(&self) -> u8 {
        self.a
    }

    pub fn b(&self) -> u8 {
        self.b
    }

    pub fn d(&self) -> u16 {
        ((self.a as u16) << 8) | self.b as u16
    }

    pub fn x(&self) -> u16 {
        self.x
    }

    pub fn y(&self) -> u16 {
        self.y
    }

    pub fn pc(&self) -> u16 {
        self.pc
    }

    pub fn cc(&self) -> u8 {
        self.cc
    }

    pub fn set_a(&mut self, value: u8) {
        self.a = value;
    }

    pub fn set_b(&mut self, value: u8) {
        self.b = value;
    }

    /// Set D, splitting it into A (high byte) and B (low byte)
    pub fn set_d(&mut self, value: u16) {
        self.a = (value >> 8) as u8;
        self.b = value as u8;
    }

    pub fn set_x(&mut self, value: u16) {
        self.x = value;
    }

    pub fn set_y(&mut self, value: u16) {
        self.y = value;
    }

    pub fn set_pc(&mut self, value: u16) {
        self.pc = value;
    }

    pub fn set_cc(&mut self, value: u8) {
        self.cc = value;
    }

    /// Read a register named by a code, zero-extended to 16 bits
    pub fn get(&self, register: RegisterCode) -> u16 {
        match register {
            RegisterCode::A => self.a as u16,
            RegisterCode::B => self.b as u16,
            RegisterCode::D => self.d(),
            RegisterCode::X => self.x,
            RegisterCode::Y => self.y,
        }
    }

    /// Write a register named by a code, truncating to its width
    pub fn set(&mut self, register: RegisterCode, value: u16) {
        match register {
            RegisterCode::A => self.a = value as u8,
            RegisterCode::B => self.b = value as u8,
            RegisterCode::D => self.set_d(value),
            RegisterCode::X => self.x = value,
            RegisterCode::Y => self.y = value,
        }
    }

    pub fn flag(&self, flag: u8) -> bool {
        self.cc & flag != 0
    }

    /// Unsigned compare; rewrites the compare flags and leaves Carry alone
    pub fn compare(&mut self, left: u16, right: u16) {
        let outcome = if left == right {
            FLAG_EQUAL
        } else if left > right {
            FLAG_GREATER | FLAG_NOT_EQUAL
        } else {
            FLAG_LESS | FLAG_NOT_EQUAL
        };
        self.cc = (self.cc & !COMPARE_FLAGS) | outcome;
    }

    pub fn set_carry(&mut self, carry: bool) {
        if carry {
            self.cc |= FLAG_CARRY;
        } else {
            self.cc &= !FLAG_CARRY;
        }
    }
}

impl fmt::Display for RegisterFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PC:{:04X} A:{:02X} B:{:02X} D:{:04X} X:{:04X} Y:{:04X} CC:{:08b}",
            self.pc,
            self.a,
            self.b,
            self.d(),
            self.x,
            self.y,
            self.cc
        )
    }
}
