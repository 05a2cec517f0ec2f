use std::sync::Arc;

use log::{Level, log_enabled, trace};
use rand::Rng;
use rand::rngs::StdRng;

use crate::bus::MemoryBus;
use crate::device::PenCommand;
use crate::error::{Fault, StackKind};
use crate::keys::KeySource;
use crate::opcode::*;
use crate::operand::{IndexMode, RegisterCode, RegisterMask, Width};
use crate::registers::{FLAG_CARRY, FLAG_EQUAL, FLAG_GREATER, FLAG_LESS, FLAG_NOT_EQUAL, RegisterFile};

/// Outcome of a successfully executed instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Keep going. `state_changed` is false for the extended loads, which
    /// do not notify observers.
    Continue { state_changed: bool },
    /// END was executed
    End,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AluOp {
    Add,
    Sub,
    And,
    Or,
    Xor,
}

impl AluOp {
    /// Apply the operation and wrap to `width`
    fn apply(self, left: u16, right: u16, width: Width) -> u16 {
        let result = match self {
            AluOp::Add => left.wrapping_add(right),
            AluOp::Sub => left.wrapping_sub(right),
            AluOp::And => left & right,
            AluOp::Or => left | right,
            AluOp::Xor => left ^ right,
        };
        result & width.mask()
    }
}

/// B33 CPU
///
/// Owns the register file and the three stacks. Memory goes through the
/// shared [`MemoryBus`].
pub struct Cpu {
    pub registers: RegisterFile,
    /// Operand stack for 8-bit registers
    byte_stack: Vec<u8>,
    /// Operand stack for 16-bit registers
    word_stack: Vec<u16>,
    /// Return addresses pushed by CALL
    call_stack: Vec<u16>,
    bus: Arc<MemoryBus>,
    keys: Box<dyn KeySource>,
    /// Seeded once per machine; RND draws from it
    rng: StdRng,
}

impl Cpu {
    pub fn new(bus: Arc<MemoryBus>, keys: Box<dyn KeySource>, rng: StdRng) -> Self {
        Self {
            registers: RegisterFile::new(),
            byte_stack: Vec::new(),
            word_stack: Vec::new(),
            call_stack: Vec::new(),
            bus,
            keys,
            rng,
        }
    }

    /// Zero the registers and empty all stacks
    pub fn reset(&mut self) {
        self.registers.reset();
        self.byte_stack.clear();
        self.word_stack.clear();
        self.call_stack.clear();
    }

    pub fn bus(&self) -> &Arc<MemoryBus> {
        &self.bus
    }

    pub fn set_key_source(&mut self, keys: Box<dyn KeySource>) {
        self.keys = keys;
    }

    pub fn byte_stack(&self) -> &[u8] {
        &self.byte_stack
    }

    pub fn word_stack(&self) -> &[u16] {
        &self.word_stack
    }

    pub fn call_stack(&self) -> &[u16] {
        &self.call_stack
    }

    /// Execute the instruction at PC.
    ///
    /// On a fault the register file is restored to its state before the
    /// instruction; no instruction faults after touching the bus or stacks.
    pub fn step(&mut self) -> Result<Step, Fault> {
        if log_enabled!(Level::Trace) {
            let pc = self.registers.pc();
            let (text, _) = disassemble(&self.bus, pc);
            trace!("{:04X}  {:<20} {}", pc, text, self.registers);
        }

        let before = self.registers;
        let result = self.execute();
        if result.is_err() {
            self.registers = before;
        }
        result
    }

    fn execute(&mut self) -> Result<Step, Fault> {
        let pc = self.registers.pc();
        let opcode = self.fetch_byte();

        match opcode {
            END => return Ok(Step::End),

            // Loads and stores
            LDA_IMM..=LDD_IMM => {
                let register = family_register(&LOAD_STORE_ORDER, opcode, LDA_IMM);
                let value = self.fetch_immediate(register.width());
                self.registers.set(register, value);
            }
            STA_EXT..=STD_EXT => {
                let register = family_register(&LOAD_STORE_ORDER, opcode, STA_EXT);
                let addr = self.fetch_word();
                self.store(register, addr);
            }
            LDA_EXT..=LDD_EXT => {
                let register = family_register(&LOAD_STORE_ORDER, opcode, LDA_EXT);
                let addr = self.fetch_word();
                let value = self.load(register.width(), addr);
                self.registers.set(register, value);
                return Ok(Step::Continue {
                    state_changed: false,
                });
            }
            STA_IDX | STB_IDX => {
                let register = if opcode == STA_IDX {
                    RegisterCode::A
                } else {
                    RegisterCode::B
                };
                let (addr, mode) = self.fetch_indexed(pc, opcode)?;
                self.bus.write(addr, self.registers.get(register) as u8);
                self.post_adjust(mode);
            }
            LDA_IDX | LDB_IDX => {
                let register = if opcode == LDA_IDX {
                    RegisterCode::A
                } else {
                    RegisterCode::B
                };
                let (addr, mode) = self.fetch_indexed(pc, opcode)?;
                let value = self.bus.read(addr);
                self.registers.set(register, value as u16);
                self.post_adjust(mode);
            }

            // Compares
            CMPA_IMM..=CMPY_IMM => {
                let register = family_register(&ALU_ORDER, opcode, CMPA_IMM);
                let value = self.fetch_immediate(register.width());
                self.registers.compare(self.registers.get(register), value);
            }
            CMPA_REG..=CMPY_REG => {
                let register = family_register(&ALU_ORDER, opcode, CMPA_REG);
                let source = self.fetch_register(pc, opcode)?;
                let value = self.registers.get(source) & register.width().mask();
                self.registers.compare(self.registers.get(register), value);
            }

            // Jumps
            JEQ => self.jump_if(self.registers.flag(FLAG_EQUAL)),
            JNE => self.jump_if(self.registers.flag(FLAG_NOT_EQUAL)),
            JGE => self.jump_if(self.registers.flag(FLAG_GREATER | FLAG_EQUAL)),
            JLE => self.jump_if(self.registers.flag(FLAG_LESS | FLAG_EQUAL)),
            JLT => self.jump_if(self.registers.flag(FLAG_LESS)),
            JGT => self.jump_if(self.registers.flag(FLAG_GREATER)),
            JMP => self.jump_if(true),
            JOS => self.jump_if(self.registers.flag(FLAG_CARRY)),
            JOC => self.jump_if(!self.registers.flag(FLAG_CARRY)),

            // Stacks
            PUSH => {
                let mask = RegisterMask::from_bits(self.fetch_byte());
                self.push(mask);
            }
            POP => {
                let mask = RegisterMask::from_bits(self.fetch_byte());
                self.pop(mask, pc, opcode)?;
            }
            CALL => {
                let target = self.fetch_word();
                self.call_stack.push(self.registers.pc());
                self.registers.set_pc(target);
            }
            RET => {
                let target = self.call_stack.pop().ok_or(Fault::StackUnderflow {
                    pc,
                    opcode,
                    stack: StackKind::Call,
                })?;
                self.registers.set_pc(target);
            }

            KEY => {
                let selector = self.fetch_byte();
                let register = match selector {
                    1 => RegisterCode::A,
                    2 => RegisterCode::B,
                    code => return Err(Fault::InvalidRegisterCode { pc, opcode, code }),
                };
                let key = self.keys.next_pending().unwrap_or(0);
                self.registers.set(register, key as u16);
            }

            // Arithmetic and logic
            SUBA_IMM..=SUBY_IMM => self.alu_immediate(AluOp::Sub, opcode, SUBA_IMM),
            ADDA_IMM..=ADDY_IMM => self.alu_immediate(AluOp::Add, opcode, ADDA_IMM),
            SUBA_REG..=SUBY_REG => self.alu_register(AluOp::Sub, pc, opcode, SUBA_REG)?,
            ADDA_REG..=ADDY_REG => self.alu_register(AluOp::Add, pc, opcode, ADDA_REG)?,
            ANDA_IMM..=ANDY_IMM => self.alu_immediate(AluOp::And, opcode, ANDA_IMM),
            ANDA_REG..=ANDY_REG => self.alu_register(AluOp::And, pc, opcode, ANDA_REG)?,
            ORA_IMM..=ORY_IMM => self.alu_immediate(AluOp::Or, opcode, ORA_IMM),
            ORA_REG..=ORY_REG => self.alu_register(AluOp::Or, pc, opcode, ORA_REG)?,
            XORA_IMM..=XORY_IMM => self.alu_immediate(AluOp::Xor, opcode, XORA_IMM),
            XORA_REG..=XORY_REG => self.alu_register(AluOp::Xor, pc, opcode, XORA_REG)?,

            TFR => {
                let source = self.fetch_register(pc, opcode)?;
                let dest = self.fetch_register(pc, opcode)?;
                self.registers.set(dest, self.registers.get(source));
            }
            LSFT | RSFT => {
                let register = self.fetch_register(pc, opcode)?;
                let width = register.width();
                let value = self.registers.get(register);
                let (result, carry) = if opcode == LSFT {
                    ((value << 1) & width.mask(), value & width.top_bit() != 0)
                } else {
                    (value >> 1, value & 1 != 0)
                };
                self.registers.set(register, result);
                self.registers.set_carry(carry);
            }
            MUL8 | MUL16 => {
                let width = if opcode == MUL8 { Width::Byte } else { Width::Word };
                let left = self.fetch_register(pc, opcode)?;
                let right = self.fetch_register(pc, opcode)?;
                let a = (self.registers.get(left) & width.mask()) as u32;
                let b = (self.registers.get(right) & width.mask()) as u32;
                let product = (a * b) as u16 & width.mask();
                self.registers.set(left, product);
            }
            DIV8 | DIV16 => {
                let width = if opcode == DIV8 { Width::Byte } else { Width::Word };
                let left = self.fetch_register(pc, opcode)?;
                let right = self.fetch_register(pc, opcode)?;
                let dividend = self.registers.get(left) & width.mask();
                let divisor = self.registers.get(right) & width.mask();
                if divisor == 0 {
                    return Err(Fault::DivideByZero { pc, opcode });
                }
                let (quotient, remainder) = (dividend / divisor, dividend % divisor);
                match width {
                    Width::Byte => {
                        self.registers.set_a(quotient as u8);
                        self.registers.set_b(remainder as u8);
                    }
                    Width::Word => {
                        self.registers.set_x(quotient);
                        self.registers.set_y(remainder);
                    }
                }
            }
            NEG => {
                let register = self.fetch_register(pc, opcode)?;
                let value = self.registers.get(register);
                self.registers
                    .set(register, value.wrapping_neg() & register.width().mask());
            }
            RND => {
                let register = self.fetch_register(pc, opcode)?;
                let bound = self.registers.get(register);
                let value = if bound == 0 {
                    0
                } else {
                    self.rng.random_range(0..bound)
                };
                self.registers.set(register, value);
            }

            // Pen commands for the display device
            STCLR => self.bus.draw(PenCommand::SetColor {
                r: self.registers.a(),
                g: self.registers.b(),
                b: self.registers.y() as u8,
            }),
            MVTO => self.bus.draw(PenCommand::MoveTo {
                x: self.registers.x(),
                y: self.registers.y(),
            }),
            LNTO => {
                self.bus.draw(PenCommand::LineTo {
                    x: self.registers.x(),
                    y: self.registers.y(),
                });
                self.bus.force_refresh();
            }

            NOP => {}

            _ => return Err(Fault::IllegalOpcode { pc, opcode }),
        }

        Ok(Step::Continue {
            state_changed: true,
        })
    }

    /// Read a byte from memory at PC and increment PC
    fn fetch_byte(&mut self) -> u8 {
        let pc = self.registers.pc();
        let value = self.bus.read(pc);
        self.registers.set_pc(pc.wrapping_add(1));
        value
    }

    /// Read a 16-bit word from memory at PC (little-endian) and increment PC
    fn fetch_word(&mut self) -> u16 {
        let lo = self.fetch_byte() as u16;
        let hi = self.fetch_byte() as u16;
        (hi << 8) | lo
    }

    fn fetch_immediate(&mut self, width: Width) -> u16 {
        match width {
            Width::Byte => self.fetch_byte() as u16,
            Width::Word => self.fetch_word(),
        }
    }

    fn fetch_register(&mut self, pc: u16, opcode: u8) -> Result<RegisterCode, Fault> {
        let code = self.fetch_byte();
        RegisterCode::decode(code).ok_or(Fault::InvalidRegisterCode { pc, opcode, code })
    }

    /// Decode the offset selector and mode byte into an effective address
    fn fetch_indexed(&mut self, pc: u16, opcode: u8) -> Result<(u16, IndexMode), Fault> {
        let selector = self.fetch_byte();
        let mode = IndexMode::decode(self.fetch_byte());
        let offset = if selector == 0 {
            0
        } else {
            let register = RegisterCode::decode(selector).ok_or(Fault::InvalidRegisterCode {
                pc,
                opcode,
                code: selector,
            })?;
            self.registers.get(register)
        };
        let base = mode.base.map_or(0, |register| self.registers.get(register));
        Ok((base.wrapping_add(offset), mode))
    }

    fn post_adjust(&mut self, mode: IndexMode) {
        if let Some(base) = mode.base {
            let adjusted = self.registers.get(base).wrapping_add(mode.post_adjust());
            self.registers.set(base, adjusted);
        }
    }

    /// Store a register; 16-bit values go high byte first
    fn store(&mut self, register: RegisterCode, addr: u16) {
        let value = self.registers.get(register);
        match register.width() {
            Width::Byte => self.bus.write(addr, value as u8),
            Width::Word => self.bus.write_u16_be(addr, value),
        }
    }

    fn load(&self, width: Width, addr: u16) -> u16 {
        match width {
            Width::Byte => self.bus.read(addr) as u16,
            Width::Word => self.bus.read_u16_be(addr),
        }
    }

    /// Read the target address and jump there if `condition` holds
    fn jump_if(&mut self, condition: bool) {
        let target = self.fetch_word();
        if condition {
            self.registers.set_pc(target);
        }
    }

    fn push(&mut self, mask: RegisterMask) {
        for register in mask.registers() {
            let value = self.registers.get(register);
            match register.width() {
                Width::Byte => self.byte_stack.push(value as u8),
                Width::Word => self.word_stack.push(value),
            }
        }
    }

    /// Pop in reverse push order, so PUSH m; POP m restores every register
    fn pop(&mut self, mask: RegisterMask, pc: u16, opcode: u8) -> Result<(), Fault> {
        let bytes = mask
            .registers()
            .filter(|register| register.width() == Width::Byte)
            .count();
        let words = mask.registers().count() - bytes;
        if self.byte_stack.len() < bytes {
            return Err(Fault::StackUnderflow {
                pc,
                opcode,
                stack: StackKind::Byte,
            });
        }
        if self.word_stack.len() < words {
            return Err(Fault::StackUnderflow {
                pc,
                opcode,
                stack: StackKind::Word,
            });
        }

        for register in mask.registers().rev() {
            let value = match register.width() {
                Width::Byte => self.byte_stack.pop().map(u16::from),
                Width::Word => self.word_stack.pop(),
            };
            if let Some(value) = value {
                self.registers.set(register, value);
            }
        }
        Ok(())
    }

    fn alu_immediate(&mut self, op: AluOp, opcode: u8, first: u8) {
        let register = family_register(&ALU_ORDER, opcode, first);
        let width = register.width();
        let operand = self.fetch_immediate(width);
        let result = op.apply(self.registers.get(register), operand, width);
        self.registers.set(register, result);
    }

    fn alu_register(&mut self, op: AluOp, pc: u16, opcode: u8, first: u8) -> Result<(), Fault> {
        let register = family_register(&ALU_ORDER, opcode, first);
        let width = register.width();
        let source = self.fetch_register(pc, opcode)?;
        let operand = self.registers.get(source) & width.mask();
        let result = op.apply(self.registers.get(register), operand, width);
        self.registers.set(register, result);
        Ok(())
    }
}
