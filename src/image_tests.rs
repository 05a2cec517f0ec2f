// End-to-end tests: build whole images, boot them and inspect the machine

use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::MachineConfig;
use crate::device::{Device, PenCommand, SharedDevice, shared};
use crate::display::{DisplayDevice, DisplayLayout, DisplayMode};
use crate::error::{Fault, MachineError, StackKind};
use crate::keys::KeyQueue;
use crate::loader::ProgramImage;
use crate::loader::tests::build_image;
use crate::machine::{HaltReason, Machine};
use crate::opcode::*;

const A: u8 = 1;
const B: u8 = 2;
const D: u8 = 4;
const X: u8 = 8;
const Y: u8 = 16;
const INC: u8 = 32;
const DEC: u8 = 64;
const DOUBLE: u8 = 128;

/// Records every poke it sees, in or out of its window
struct PokeLog {
    base: u16,
    size: usize,
    pokes: Vec<(u16, u8)>,
}

impl PokeLog {
    fn new(base: u16, size: usize) -> Self {
        Self {
            base,
            size,
            pokes: Vec::new(),
        }
    }

    fn in_window(&self) -> Vec<(u16, u8)> {
        self.pokes
            .iter()
            .copied()
            .filter(|&(address, _)| self.owns(address))
            .collect()
    }
}

impl Device for PokeLog {
    fn reset(&mut self) {
        self.pokes.clear();
    }
    fn poke(&mut self, address: u16, value: u8) {
        self.pokes.push((address, value));
    }
    fn peek(&self, _address: u16) -> u8 {
        0
    }
    fn window_base(&self) -> u16 {
        self.base
    }
    fn window_size(&self) -> usize {
        self.size
    }
}

fn boot(data: &[u8], devices: Vec<SharedDevice>) -> (Machine, Result<HaltReason, MachineError>) {
    let mut machine = Machine::new(MachineConfig::with_seed(33));
    let result = machine.boot(data, devices);
    (machine, result)
}

fn fault_of(result: Result<HaltReason, MachineError>) -> Fault {
    match result {
        Err(MachineError::Fault(fault)) => fault,
        other => panic!("expected a fault, got {:?}", other),
    }
}

#[test]
fn test_reference_image() {
    let data = [
        0x42, 0x33, 0x33, // magic
        0x00, 0x00, // load
        0x00, 0x00, // entry
        0x00, 0x00, // debug table
        0x00, // single display
        0x01, 0x2A, 0x00, 0x00, // LDA #$2A; END
    ];
    let (machine, result) = boot(&data, Vec::new());
    assert!(matches!(result, Ok(HaltReason::End)));
    assert_eq!(machine.registers().a(), 0x2A);
    assert_eq!(machine.registers().pc(), 0x0000);
}

#[test]
fn test_countdown_loop() {
    // X = 0; B = 10
    // loop: ADDX #3; SUBB #1; CMPB #0; JNE loop; END
    let program = [
        LDB_IMM, 10, // 0x1000
        ADDX_IMM, 3, 0, // 0x1002
        SUBB_IMM, 1, // 0x1005
        CMPB_IMM, 0, // 0x1007
        JNE, 0x02, 0x10, // 0x1009
        END, // 0x100C
    ];
    let (machine, result) = boot(&build_image(0x1000, 0x1000, 0, 0, &program), Vec::new());
    assert!(matches!(result, Ok(HaltReason::End)));
    assert_eq!(machine.registers().x(), 30);
    assert_eq!(machine.registers().b(), 0);
    assert_eq!(machine.registers().pc(), 0x1000);
}

#[test]
fn test_entry_differs_from_load_address() {
    // Data byte at 0x2000, code from 0x2001
    let program = [0x99, LDA_EXT, 0x00, 0x20, END];
    let (machine, result) = boot(&build_image(0x2000, 0x2001, 0, 0, &program), Vec::new());
    assert!(matches!(result, Ok(HaltReason::End)));
    assert_eq!(machine.registers().a(), 0x99);
    assert_eq!(machine.registers().pc(), 0x2001);
}

#[test]
fn test_div8_by_zero_image() {
    let program = [LDA_IMM, 200, LDB_IMM, 0, LDY_IMM, 0x34, 0x12, DIV8, A, B, END];
    let (machine, result) = boot(&build_image(0, 0, 0, 0, &program), Vec::new());
    assert_eq!(
        fault_of(result),
        Fault::DivideByZero {
            pc: 7,
            opcode: DIV8
        }
    );
    let registers = machine.registers();
    assert_eq!(registers.a(), 200);
    assert_eq!(registers.b(), 0);
    assert_eq!(registers.y(), 0x1234);
    assert_eq!(registers.pc(), 7);
}

#[test]
fn test_subroutine_calls() {
    // main: CALL double; CALL double; END
    // double: ADDA_REG A; RET
    let program = [
        LDA_IMM, 3, // 0x0000
        CALL, 0x0C, 0x00, // 0x0002
        CALL, 0x0C, 0x00, // 0x0005
        STA_EXT, 0x00, 0x30, // 0x0008
        END, // 0x000B
        ADDA_REG, A, // 0x000C
        RET, // 0x000E
    ];
    let (machine, result) = boot(&build_image(0, 0, 0, 0, &program), Vec::new());
    assert!(matches!(result, Ok(HaltReason::End)));
    assert_eq!(machine.registers().a(), 12);
    assert_eq!(machine.bus().read(0x3000), 12);
    assert!(machine.cpu().call_stack().is_empty());
}

#[test]
fn test_nested_calls_preserve_registers_with_push_pop() {
    // outer saves X,Y, calls inner that clobbers them, restores
    let program = [
        LDX_IMM, 0x11, 0x11, // 0x00
        LDY_IMM, 0x22, 0x22, // 0x03
        CALL, 0x0A, 0x00, // 0x06
        END, // 0x09
        PUSH, X | Y, // 0x0A outer
        CALL, 0x13, 0x00, // 0x0C
        POP, X | Y, // 0x0F
        RET, // 0x11
        NOP, // 0x12
        LDX_IMM, 0, 0, // 0x13 inner
        LDY_IMM, 0, 0, // 0x16
        RET, // 0x19
    ];
    let (machine, result) = boot(&build_image(0, 0, 0, 0, &program), Vec::new());
    assert!(matches!(result, Ok(HaltReason::End)));
    assert_eq!(machine.registers().x(), 0x1111);
    assert_eq!(machine.registers().y(), 0x2222);
    assert!(machine.cpu().word_stack().is_empty());
}

#[test]
fn test_ret_without_call_faults() {
    let (machine, result) = boot(&build_image(0x0100, 0x0100, 0, 0, &[NOP, RET]), Vec::new());
    assert_eq!(
        fault_of(result),
        Fault::StackUnderflow {
            pc: 0x0101,
            opcode: RET,
            stack: StackKind::Call
        }
    );
    assert_eq!(machine.registers().pc(), 0x0101);
}

#[test]
fn test_fill_loop_with_post_increment() {
    // Fill 0x4000..0x4008 with 0xEE using STA 0,X+
    let program = [
        LDA_IMM, 0xEE, // 0x00
        LDX_IMM, 0x00, 0x40, // 0x02
        STA_IDX, 0, X | INC, // 0x05
        CMPX_IMM, 0x08, 0x40, // 0x08
        JLT, 0x05, 0x00, // 0x0B
        END, // 0x0E
    ];
    let (machine, result) = boot(&build_image(0, 0, 0, 0, &program), Vec::new());
    assert!(matches!(result, Ok(HaltReason::End)));
    let mut expected = vec![0xEE; 8];
    expected.push(0);
    assert_eq!(machine.bus().snapshot(0x4000..0x4009), expected);
    assert_eq!(machine.registers().x(), 0x4008);
}

#[test]
fn test_indexed_double_step_and_cancel() {
    let program = [
        LDX_IMM, 0x00, 0x40, // X = 0x4000
        LDY_IMM, 0x00, 0x50, // Y = 0x5000
        LDA_IDX, 0, X | INC | DOUBLE, // X += 2
        LDA_IDX, 0, X | INC | DOUBLE, // X += 2
        STB_IDX, 0, Y | INC | DEC, // Y unchanged
        STB_IDX, 0, Y | DEC | DOUBLE, // Y -= 2
        END,
    ];
    let (machine, result) = boot(&build_image(0, 0, 0, 0, &program), Vec::new());
    assert!(matches!(result, Ok(HaltReason::End)));
    assert_eq!(machine.registers().x(), 0x4004);
    assert_eq!(machine.registers().y(), 0x4FFE);
}

#[test]
fn test_indexed_table_lookup_with_offset() {
    // Table at 0x0100; read entry B via LDA B,X
    let mut program = vec![
        LDX_IMM, 0x00, 0x01, // 0x00
        LDB_IMM, 3, // 0x03
        LDA_IDX, B, X, // 0x05
        END, // 0x08
    ];
    program.resize(0x100, 0);
    program.extend_from_slice(&[10, 20, 30, 40, 50]);
    let (machine, result) = boot(&build_image(0, 0, 0, 0, &program), Vec::new());
    assert!(matches!(result, Ok(HaltReason::End)));
    assert_eq!(machine.registers().a(), 40);
}

#[test]
fn test_write_inside_window_pokes_device_once() {
    let program = [LDA_IMM, 0x5A, STA_EXT, 0x10, 0x80, END];
    let log = shared(PokeLog::new(0x8000, 0x100));
    let other = shared(PokeLog::new(0x9000, 0x100));
    let devices = vec![log.clone() as SharedDevice, other.clone() as SharedDevice];
    let (_machine, result) = boot(&build_image(0, 0, 0, 0, &program), devices);
    assert!(matches!(result, Ok(HaltReason::End)));

    // Start reset the devices, so only the run's writes remain
    assert_eq!(log.lock().pokes, vec![(0x8010, 0x5A)]);
    assert_eq!(log.lock().in_window(), vec![(0x8010, 0x5A)]);
    // Out-of-window writes still reach every device
    assert_eq!(other.lock().pokes, vec![(0x8010, 0x5A)]);
    assert!(other.lock().in_window().is_empty());
}

#[test]
fn test_sixteen_bit_store_pokes_high_byte_first() {
    let program = [LDX_IMM, 0xCD, 0xAB, STX_EXT, 0x00, 0x80, END];
    let log = shared(PokeLog::new(0x8000, 0x10));
    let (_machine, result) = boot(&build_image(0, 0, 0, 0, &program), vec![log.clone() as SharedDevice]);
    assert!(matches!(result, Ok(HaltReason::End)));
    assert_eq!(log.lock().pokes, vec![(0x8000, 0xAB), (0x8001, 0xCD)]);
}

#[test]
fn test_cpu_reads_ignore_device_state() {
    struct Liar;
    impl Device for Liar {
        fn reset(&mut self) {}
        fn poke(&mut self, _address: u16, _value: u8) {}
        fn peek(&self, _address: u16) -> u8 {
            0xFF
        }
        fn window_base(&self) -> u16 {
            0x8000
        }
        fn window_size(&self) -> usize {
            0x100
        }
    }

    let program = [LDA_EXT, 0x00, 0x80, END];
    let liar: SharedDevice = Arc::new(Mutex::new(Liar));
    let (machine, result) = boot(&build_image(0, 0, 0, 0, &program), vec![liar]);
    assert!(matches!(result, Ok(HaltReason::End)));
    assert_eq!(machine.registers().a(), 0);
}

#[test]
fn test_display_shadow_and_pen_commands() {
    let program = [
        LDA_IMM, 0x7F, STA_EXT, 0x04, 0x80, // shadow byte
        LDA_IMM, 255, LDB_IMM, 128, LDY_IMM, 64, 0, STCLR, // colour
        LDX_IMM, 10, 0, LDY_IMM, 20, 0, MVTO, // move
        LDX_IMM, 30, 0, LNTO, // line
        END,
    ];
    let data = build_image(0, 0, 0, 0, &program);
    let image = ProgramImage::parse(&data).unwrap();
    let layout = DisplayLayout::for_mode(image.display_mode());
    let displays: Vec<Arc<Mutex<DisplayDevice>>> =
        layout.devices().into_iter().map(shared).collect();
    let devices: Vec<SharedDevice> = displays.iter().map(|d| d.clone() as SharedDevice).collect();

    let (_machine, result) = boot(&data, devices);
    assert!(matches!(result, Ok(HaltReason::End)));

    let display = displays[0].lock();
    assert_eq!(display.shadow()[4], 0x7F);
    assert_eq!(
        display.commands(),
        &[
            PenCommand::SetColor {
                r: 255,
                g: 128,
                b: 64
            },
            PenCommand::MoveTo { x: 10, y: 20 },
            PenCommand::LineTo { x: 30, y: 20 },
        ]
    );
    assert_eq!(display.refresh_count(), 1);
    assert!(display.is_dirty());
}

#[test]
fn test_dual_display_windows() {
    let program = [LDA_IMM, 1, STA_EXT, 0x00, 0x80, LDA_IMM, 2, STA_EXT, 0x00, 0xA0, END];
    let data = build_image(0, 0, 0, 1, &program);
    let image = ProgramImage::parse(&data).unwrap();
    assert_eq!(image.display_mode(), DisplayMode::Dual);

    let displays: Vec<Arc<Mutex<DisplayDevice>>> = DisplayLayout::for_mode(image.display_mode())
        .devices()
        .into_iter()
        .map(shared)
        .collect();
    assert_eq!(displays.len(), 2);
    let devices: Vec<SharedDevice> = displays.iter().map(|d| d.clone() as SharedDevice).collect();
    let (_machine, result) = boot(&data, devices);
    assert!(matches!(result, Ok(HaltReason::End)));

    assert_eq!(displays[0].lock().shadow()[0], 1);
    assert_eq!(displays[1].lock().shadow()[0], 2);
}

#[test]
fn test_keyboard_input() {
    // Read two keys into A and B, then a third with the queue empty
    let program = [KEY, 1, KEY, 2, STA_EXT, 0x00, 0x30, KEY, 1, END];
    let keys = KeyQueue::new();
    keys.push_str("hi");

    let mut machine = Machine::new(MachineConfig::with_seed(1));
    machine.set_key_source(keys.clone());
    let result = machine.boot(&build_image(0, 0, 0, 0, &program), Vec::new());
    assert!(matches!(result, Ok(HaltReason::End)));
    assert_eq!(machine.bus().read(0x3000), b'h');
    assert_eq!(machine.registers().b(), b'i');
    assert_eq!(machine.registers().a(), 0);
    assert!(keys.is_empty());
}

#[test]
fn test_debug_table_survives_boot() {
    // Code at 0x0600, table right after it
    let mut payload = vec![LDA_IMM, 1, NOP, END];
    payload.extend_from_slice(&[0x00, 0x06]);
    payload.extend_from_slice(b"lda #1\0");
    payload.extend_from_slice(&[0x03, 0x06]);
    payload.extend_from_slice(b"end\0");
    payload.extend_from_slice(&[0x00, 0x00]);

    let (machine, result) = boot(&build_image(0x0600, 0x0600, 0x0604, 0, &payload), Vec::new());
    assert!(matches!(result, Ok(HaltReason::End)));
    let symbols = machine.symbols();
    assert_eq!(symbols.len(), 2);
    assert_eq!(symbols.line_for(0x0600), Some("lda #1"));
    assert_eq!(symbols.line_for(0x0602), None);
    assert_eq!(symbols.nearest(0x0602), Some((0x0600, "lda #1")));
    assert_eq!(symbols.line_for(0x0603), Some("end"));
}

#[test]
fn test_illegal_opcode_faults_instead_of_hanging() {
    let (machine, result) = boot(&build_image(0, 0, 0, 0, &[NOP, NOP, 0x1C]), Vec::new());
    assert_eq!(
        fault_of(result),
        Fault::IllegalOpcode {
            pc: 2,
            opcode: 0x1C
        }
    );
    assert_eq!(machine.registers().pc(), 2);
}

#[test]
fn test_rnd_is_repeatable_with_seed() {
    let program = [LDX_IMM, 0xE8, 0x03, RND, X, TFR, X, Y, LDX_IMM, 0xE8, 0x03, RND, X, END];
    let (first, _) = boot(&build_image(0, 0, 0, 0, &program), Vec::new());
    let (second, _) = boot(&build_image(0, 0, 0, 0, &program), Vec::new());
    assert_eq!(first.registers().x(), second.registers().x());
    assert_eq!(first.registers().y(), second.registers().y());
    assert!(first.registers().x() < 1000);
    assert!(first.registers().y() < 1000);
}

#[test]
fn test_multiply_divide_pipeline() {
    // D = 12 * 11 = 132 (MUL16 D,X), then DIV16 D,Y with Y = 10
    let program = [
        LDD_IMM, 12, 0, LDX_IMM, 11, 0, MUL16, D, X, // D = 132
        LDY_IMM, 10, 0, DIV16, D, Y, // X = 13, Y = 2
        END,
    ];
    let (machine, result) = boot(&build_image(0, 0, 0, 0, &program), Vec::new());
    assert!(matches!(result, Ok(HaltReason::End)));
    assert_eq!(machine.registers().d(), 132);
    assert_eq!(machine.registers().x(), 13);
    assert_eq!(machine.registers().y(), 2);
}
