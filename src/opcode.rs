use crate::bus::MemoryBus;
use crate::operand::{IndexMode, RegisterCode, RegisterMask};

/// Operand format of an instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operands {
    /// No operand bytes
    Inherent,
    /// One literal byte
    Imm8,
    /// Two literal bytes, low byte first
    Imm16,
    /// Absolute address, low byte first
    Address,
    /// Offset selector (RegisterCode) then mode byte (RegisterMask + adjust bits)
    Indexed,
    /// One RegisterCode
    Register,
    /// Two RegisterCodes
    RegisterPair,
    /// One RegisterMask
    Mask,
    /// KEY destination selector (1=A, 2=B)
    KeySelector,
}

impl Operands {
    /// Total instruction length including the opcode byte
    pub const fn length(self) -> u16 {
        match self {
            Operands::Inherent => 1,
            Operands::Imm8 | Operands::Register | Operands::Mask | Operands::KeySelector => 2,
            Operands::Imm16 | Operands::Address | Operands::Indexed | Operands::RegisterPair => 3,
        }
    }
}

/// A B33 opcode with its mnemonic and operand format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpCode {
    /// The opcode byte value
    pub code: u8,
    /// The instruction mnemonic (e.g., "LDA", "CMPX")
    pub mnemonic: &'static str,
    pub operands: Operands,
}

impl OpCode {
    pub const fn new(code: u8, mnemonic: &'static str, operands: Operands) -> Self {
        Self {
            code,
            mnemonic,
            operands,
        }
    }

    pub const fn length(&self) -> u16 {
        self.operands.length()
    }
}

// Opcode constants for use in match patterns
pub const END: u8 = 0x00;
pub const LDA_IMM: u8 = 0x01;
pub const LDB_IMM: u8 = 0x02;
pub const LDX_IMM: u8 = 0x03;
pub const LDY_IMM: u8 = 0x04;
pub const LDD_IMM: u8 = 0x05;
pub const STA_EXT: u8 = 0x06;
pub const STB_EXT: u8 = 0x07;
pub const STX_EXT: u8 = 0x08;
pub const STY_EXT: u8 = 0x09;
pub const STD_EXT: u8 = 0x0A;
pub const LDA_EXT: u8 = 0x0B;
pub const LDB_EXT: u8 = 0x0C;
pub const LDX_EXT: u8 = 0x0D;
pub const LDY_EXT: u8 = 0x0E;
pub const LDD_EXT: u8 = 0x0F;
pub const STA_IDX: u8 = 0x10;
pub const STB_IDX: u8 = 0x11;
pub const CMPA_IMM: u8 = 0x12;
pub const CMPB_IMM: u8 = 0x13;
pub const CMPD_IMM: u8 = 0x14;
pub const CMPX_IMM: u8 = 0x15;
pub const CMPY_IMM: u8 = 0x16;
pub const JEQ: u8 = 0x17;
pub const JNE: u8 = 0x18;
pub const LDA_IDX: u8 = 0x19;
pub const LDB_IDX: u8 = 0x1A;
pub const JGE: u8 = 0x20;
pub const JLE: u8 = 0x21;
pub const JLT: u8 = 0x22;
pub const JGT: u8 = 0x23;
pub const JMP: u8 = 0x24;
pub const PUSH: u8 = 0x25;
pub const POP: u8 = 0x26;
pub const CALL: u8 = 0x27;
pub const RET: u8 = 0x28;
pub const KEY: u8 = 0x29;
pub const SUBA_IMM: u8 = 0x2A;
pub const SUBB_IMM: u8 = 0x2B;
pub const SUBD_IMM: u8 = 0x2C;
pub const SUBX_IMM: u8 = 0x2D;
pub const SUBY_IMM: u8 = 0x2E;
pub const ADDA_IMM: u8 = 0x2F;
pub const ADDB_IMM: u8 = 0x30;
pub const ADDD_IMM: u8 = 0x31;
pub const ADDX_IMM: u8 = 0x32;
pub const ADDY_IMM: u8 = 0x33;
pub const SUBA_REG: u8 = 0x34;
pub const SUBB_REG: u8 = 0x35;
pub const SUBD_REG: u8 = 0x36;
pub const SUBX_REG: u8 = 0x37;
pub const SUBY_REG: u8 = 0x38;
pub const ADDA_REG: u8 = 0x39;
pub const ADDB_REG: u8 = 0x3A;
pub const ADDD_REG: u8 = 0x3B;
pub const ADDX_REG: u8 = 0x3C;
pub const ADDY_REG: u8 = 0x3D;
pub const TFR: u8 = 0x3E;
pub const CMPA_REG: u8 = 0x3F;
pub const CMPB_REG: u8 = 0x40;
pub const CMPD_REG: u8 = 0x41;
pub const CMPX_REG: u8 = 0x42;
pub const CMPY_REG: u8 = 0x43;
pub const LSFT: u8 = 0x44;
pub const RSFT: u8 = 0x45;
pub const JOS: u8 = 0x46;
pub const JOC: u8 = 0x47;
pub const MUL8: u8 = 0x48;
pub const MUL16: u8 = 0x49;
pub const ANDA_IMM: u8 = 0x4A;
pub const ANDB_IMM: u8 = 0x4B;
pub const ANDD_IMM: u8 = 0x4C;
pub const ANDX_IMM: u8 = 0x4D;
pub const ANDY_IMM: u8 = 0x4E;
pub const ANDA_REG: u8 = 0x4F;
pub const ANDB_REG: u8 = 0x50;
pub const ANDD_REG: u8 = 0x51;
pub const ANDX_REG: u8 = 0x52;
pub const ANDY_REG: u8 = 0x53;
pub const ORA_IMM: u8 = 0x54;
pub const ORB_IMM: u8 = 0x55;
pub const ORD_IMM: u8 = 0x56;
pub const ORX_IMM: u8 = 0x57;
pub const ORY_IMM: u8 = 0x58;
pub const ORA_REG: u8 = 0x59;
pub const ORB_REG: u8 = 0x5A;
pub const ORD_REG: u8 = 0x5B;
pub const ORX_REG: u8 = 0x5C;
pub const ORY_REG: u8 = 0x5D;
pub const DIV8: u8 = 0x5E;
pub const DIV16: u8 = 0x5F;
pub const XORA_IMM: u8 = 0x60;
pub const XORB_IMM: u8 = 0x61;
pub const XORD_IMM: u8 = 0x62;
pub const XORX_IMM: u8 = 0x63;
pub const XORY_IMM: u8 = 0x64;
pub const XORA_REG: u8 = 0x65;
pub const XORB_REG: u8 = 0x66;
pub const XORD_REG: u8 = 0x67;
pub const XORX_REG: u8 = 0x68;
pub const XORY_REG: u8 = 0x69;
pub const RND: u8 = 0x6A;
pub const STCLR: u8 = 0x6B;
pub const MVTO: u8 = 0x6C;
pub const LNTO: u8 = 0x6D;
pub const NOP: u8 = 0x6E;
pub const NEG: u8 = 0x6F;

/// Register order of the LD/ST families (A, B, X, Y, D)
pub const LOAD_STORE_ORDER: [RegisterCode; 5] = [
    RegisterCode::A,
    RegisterCode::B,
    RegisterCode::X,
    RegisterCode::Y,
    RegisterCode::D,
];

/// Register order of every other five-register family (A, B, D, X, Y)
pub const ALU_ORDER: [RegisterCode; 5] = RegisterCode::ALL;

/// Register implied by an opcode's position within its five-opcode family
pub fn family_register(order: &[RegisterCode; 5], opcode: u8, first: u8) -> RegisterCode {
    order[(opcode - first) as usize]
}

use Operands::*;

pub static OPCODE_TABLE: &[OpCode] = &[
    OpCode::new(END, "END", Inherent),
    OpCode::new(LDA_IMM, "LDA", Imm8),
    OpCode::new(LDB_IMM, "LDB", Imm8),
    OpCode::new(LDX_IMM, "LDX", Imm16),
    OpCode::new(LDY_IMM, "LDY", Imm16),
    OpCode::new(LDD_IMM, "LDD", Imm16),
    OpCode::new(STA_EXT, "STA", Address),
    OpCode::new(STB_EXT, "STB", Address),
    OpCode::new(STX_EXT, "STX", Address),
    OpCode::new(STY_EXT, "STY", Address),
    OpCode::new(STD_EXT, "STD", Address),
    OpCode::new(LDA_EXT, "LDA", Address),
    OpCode::new(LDB_EXT, "LDB", Address),
    OpCode::new(LDX_EXT, "LDX", Address),
    OpCode::new(LDY_EXT, "LDY", Address),
    OpCode::new(LDD_EXT, "LDD", Address),
    OpCode::new(STA_IDX, "STA", Indexed),
    OpCode::new(STB_IDX, "STB", Indexed),
    OpCode::new(CMPA_IMM, "CMPA", Imm8),
    OpCode::new(CMPB_IMM, "CMPB", Imm8),
    OpCode::new(CMPD_IMM, "CMPD", Imm16),
    OpCode::new(CMPX_IMM, "CMPX", Imm16),
    OpCode::new(CMPY_IMM, "CMPY", Imm16),
    OpCode::new(JEQ, "JEQ", Address),
    OpCode::new(JNE, "JNE", Address),
    OpCode::new(LDA_IDX, "LDA", Indexed),
    OpCode::new(LDB_IDX, "LDB", Indexed),
    OpCode::new(JGE, "JGE", Address),
    OpCode::new(JLE, "JLE", Address),
    OpCode::new(JLT, "JLT", Address),
    OpCode::new(JGT, "JGT", Address),
    OpCode::new(JMP, "JMP", Address),
    OpCode::new(PUSH, "PUSH", Mask),
    OpCode::new(POP, "POP", Mask),
    OpCode::new(CALL, "CALL", Address),
    OpCode::new(RET, "RET", Inherent),
    OpCode::new(KEY, "KEY", KeySelector),
    OpCode::new(SUBA_IMM, "SUBA", Imm8),
    OpCode::new(SUBB_IMM, "SUBB", Imm8),
    OpCode::new(SUBD_IMM, "SUBD", Imm16),
    OpCode::new(SUBX_IMM, "SUBX", Imm16),
    OpCode::new(SUBY_IMM, "SUBY", Imm16),
    OpCode::new(ADDA_IMM, "ADDA", Imm8),
    OpCode::new(ADDB_IMM, "ADDB", Imm8),
    OpCode::new(ADDD_IMM, "ADDD", Imm16),
    OpCode::new(ADDX_IMM, "ADDX", Imm16),
    OpCode::new(ADDY_IMM, "ADDY", Imm16),
    OpCode::new(SUBA_REG, "SUBA", Register),
    OpCode::new(SUBB_REG, "SUBB", Register),
    OpCode::new(SUBD_REG, "SUBD", Register),
    OpCode::new(SUBX_REG, "SUBX", Register),
    OpCode::new(SUBY_REG, "SUBY", Register),
    OpCode::new(ADDA_REG, "ADDA", Register),
    OpCode::new(ADDB_REG, "ADDB", Register),
    OpCode::new(ADDD_REG, "ADDD", Register),
    OpCode::new(ADDX_REG, "ADDX", Register),
    OpCode::new(ADDY_REG, "ADDY", Register),
    OpCode::new(TFR, "TFR", RegisterPair),
    OpCode::new(CMPA_REG, "CMPA", Register),
    OpCode::new(CMPB_REG, "CMPB", Register),
    OpCode::new(CMPD_REG, "CMPD", Register),
    OpCode::new(CMPX_REG, "CMPX", Register),
    OpCode::new(CMPY_REG, "CMPY", Register),
    OpCode::new(LSFT, "LSFT", Register),
    OpCode::new(RSFT, "RSFT", Register),
    OpCode::new(JOS, "JOS", Address),
    OpCode::new(JOC, "JOC", Address),
    OpCode::new(MUL8, "MUL8", RegisterPair),
    OpCode::new(MUL16, "MUL16", RegisterPair),
    OpCode::new(ANDA_IMM, "ANDA", Imm8),
    OpCode::new(ANDB_IMM, "ANDB", Imm8),
    OpCode::new(ANDD_IMM, "ANDD", Imm16),
    OpCode::new(ANDX_IMM, "ANDX", Imm16),
    OpCode::new(ANDY_IMM, "ANDY", Imm16),
    OpCode::new(ANDA_REG, "ANDA", Register),
    OpCode::new(ANDB_REG, "ANDB", Register),
    OpCode::new(ANDD_REG, "ANDD", Register),
    OpCode::new(ANDX_REG, "ANDX", Register),
    OpCode::new(ANDY_REG, "ANDY", Register),
    OpCode::new(ORA_IMM, "ORA", Imm8),
    OpCode::new(ORB_IMM, "ORB", Imm8),
    OpCode::new(ORD_IMM, "ORD", Imm16),
    OpCode::new(ORX_IMM, "ORX", Imm16),
    OpCode::new(ORY_IMM, "ORY", Imm16),
    OpCode::new(ORA_REG, "ORA", Register),
    OpCode::new(ORB_REG, "ORB", Register),
    OpCode::new(ORD_REG, "ORD", Register),
    OpCode::new(ORX_REG, "ORX", Register),
    OpCode::new(ORY_REG, "ORY", Register),
    OpCode::new(DIV8, "DIV8", RegisterPair),
    OpCode::new(DIV16, "DIV16", RegisterPair),
    OpCode::new(XORA_IMM, "XORA", Imm8),
    OpCode::new(XORB_IMM, "XORB", Imm8),
    OpCode::new(XORD_IMM, "XORD", Imm16),
    OpCode::new(XORX_IMM, "XORX", Imm16),
    OpCode::new(XORY_IMM, "XORY", Imm16),
    OpCode::new(XORA_REG, "XORA", Register),
    OpCode::new(XORB_REG, "XORB", Register),
    OpCode::new(XORD_REG, "XORD", Register),
    OpCode::new(XORX_REG, "XORX", Register),
    OpCode::new(XORY_REG, "XORY", Register),
    OpCode::new(RND, "RND", Register),
    OpCode::new(STCLR, "STCLR", Inherent),
    OpCode::new(MVTO, "MVTO", Inherent),
    OpCode::new(LNTO, "LNTO", Inherent),
    OpCode::new(NOP, "NOP", Inherent),
    OpCode::new(NEG, "NEG", Register),
];

/// Lookup an opcode by its byte value
pub fn lookup(code: u8) -> Option<&'static OpCode> {
    OPCODE_TABLE.iter().find(|op| op.code == code)
}

fn register_name(byte: u8) -> String {
    match RegisterCode::decode(byte) {
        Some(register) => register.name().to_string(),
        None => format!("?{:02X}", byte),
    }
}

fn format_indexed(offset: u8, mode: u8) -> String {
    let offset = if offset == 0 {
        "0".to_string()
    } else {
        register_name(offset)
    };
    let mode = IndexMode::decode(mode);
    let base = mode.base.map_or("0", |register| register.name());
    let step = if mode.double { 2 } else { 1 };
    let mut text = format!("{},{}", offset, base);
    if mode.increment {
        text.push_str(&"+".repeat(step));
    }
    if mode.decrement {
        text.push_str(&"-".repeat(step));
    }
    text
}

fn format_mask(byte: u8) -> String {
    let names: Vec<&str> = RegisterMask::from_bits(byte)
        .registers()
        .map(RegisterCode::name)
        .collect();
    if names.is_empty() {
        "-".to_string()
    } else {
        names.join(",")
    }
}

/// Disassemble the instruction at `pc`. Returns its text and length.
/// Bytes that are not an opcode come back as a one-byte `.byte` directive.
pub fn disassemble(bus: &MemoryBus, pc: u16) -> (String, u16) {
    let code = bus.read(pc);
    let Some(opcode) = lookup(code) else {
        return (format!(".byte ${:02X}", code), 1);
    };

    let b1 = bus.read(pc.wrapping_add(1));
    let b2 = bus.read(pc.wrapping_add(2));
    let word = bus.read_u16(pc.wrapping_add(1));
    let operands = match opcode.operands {
        Inherent => String::new(),
        Imm8 => format!("#${:02X}", b1),
        Imm16 => format!("#${:04X}", word),
        Address => format!("${:04X}", word),
        Indexed => format_indexed(b1, b2),
        Register => register_name(b1),
        RegisterPair => format!("{},{}", register_name(b1), register_name(b2)),
        Mask => format_mask(b1),
        KeySelector => match b1 {
            1 => "A".to_string(),
            2 => "B".to_string(),
            _ => format!("?{:02X}", b1),
        },
    };

    let text = if operands.is_empty() {
        opcode.mnemonic.to_string()
    } else {
        format!("{} {}", opcode.mnemonic, operands)
    };
    (text, opcode.length())
}
