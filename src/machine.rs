use std::sync::Arc;

use log::{debug, info};

use crate::bus::MemoryBus;
use crate::config::MachineConfig;
use crate::control::{GateState, RunControl};
use crate::cpu::{Cpu, Step};
use crate::device::{DeviceContext, SharedDevice};
use crate::error::{DeviceError, Fault, MachineError};
use crate::keys::{KeySource, NoKeys};
use crate::loader::ProgramImage;
use crate::observer::{MachineObserver, ObserverSlot};
use crate::registers::RegisterFile;
use crate::symbols::DebugSymbolTable;

/// Interpreter state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MachineState {
    Halted,
    Running,
}

/// Why a run ended without a fault
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HaltReason {
    /// END executed
    End,
    /// Stop was requested by the host
    Stopped,
}

/// A B33 machine: CPU, memory bus, attached devices and run control.
///
/// The host keeps a handle from [`Machine::control`] to stop or pause a run
/// that is executing on another thread.
pub struct Machine {
    cpu: Cpu,
    bus: Arc<MemoryBus>,
    control: Arc<RunControl>,
    symbols: DebugSymbolTable,
    /// Entry address of the loaded program; PC returns here on halt
    entry: u16,
    state: MachineState,
    observer: ObserverSlot,
    config: MachineConfig,
}

impl Machine {
    pub fn new(config: MachineConfig) -> Self {
        let bus = Arc::new(MemoryBus::new());
        let cpu = Cpu::new(bus.clone(), Box::new(NoKeys), config.build_rng());
        Self {
            cpu,
            bus,
            control: Arc::new(RunControl::new()),
            symbols: DebugSymbolTable::new(),
            entry: 0,
            state: MachineState::Halted,
            observer: ObserverSlot::default(),
            config,
        }
    }

    /// Source of key codes for the KEY instruction
    pub fn set_key_source<K: KeySource + 'static>(&mut self, keys: K) {
        self.cpu.set_key_source(Box::new(keys));
    }

    pub fn attach(&self, device: SharedDevice) -> Result<(), DeviceError> {
        self.bus.attach(device)
    }

    /// Attach a device whose calls must run on `context`
    pub fn attach_with_context(&self, device: SharedDevice, context: DeviceContext) {
        self.bus.attach_with_context(device, context);
    }

    /// Register the observer. Only a weak reference is kept.
    pub fn set_observer(&mut self, observer: &Arc<dyn MachineObserver>) {
        self.observer.set(observer);
    }

    pub fn clear_observer(&mut self) {
        self.observer.clear();
    }

    /// Copy the image into memory and take over its entry point and symbols
    pub fn load(&mut self, image: &ProgramImage) {
        image.load_into(&self.bus);
        self.symbols = image.symbols().clone();
        self.entry = image.entry_address();
    }

    /// Full reset: zero memory, reset and detach every device, zero the
    /// registers and clear the stacks and symbols.
    pub fn reset(&mut self) {
        self.bus.reset();
        self.cpu.reset();
        self.symbols = DebugSymbolTable::new();
        self.entry = 0;
        self.state = MachineState::Halted;
    }

    /// Parse `data`, reset, attach `devices`, load and run to completion
    pub fn boot(
        &mut self,
        data: &[u8],
        devices: Vec<SharedDevice>,
    ) -> Result<HaltReason, MachineError> {
        let image = ProgramImage::parse(data)?;
        self.reset();
        for device in devices {
            self.attach(device)?;
        }
        self.load(&image);
        Ok(self.start()?)
    }

    /// Run from the loaded entry address
    pub fn start(&mut self) -> Result<HaltReason, Fault> {
        self.start_at(self.entry)
    }

    /// Run from `entry` until END, a stop request or a fault.
    ///
    /// Registers and stacks are cleared and attached devices reset first.
    /// Memory is left as loaded.
    pub fn start_at(&mut self, entry: u16) -> Result<HaltReason, Fault> {
        if self.config.clear_stop_on_start {
            self.control.clear_stop();
        }
        self.entry = entry;
        self.cpu.reset();
        self.bus.reset_devices();
        self.cpu.registers.set_pc(entry);
        self.state = MachineState::Running;
        info!("Starting at {:04X}", entry);

        loop {
            let pc = self.cpu.registers.pc();
            self.observer
                .debug_position_changed(pc, self.symbols.line_for(pc));

            if self.control.is_stop_requested() {
                return Ok(self.halt(HaltReason::Stopped));
            }
            if self.control.wait_while_paused() == GateState::Stopped {
                return Ok(self.halt(HaltReason::Stopped));
            }

            match self.execute() {
                Ok(Some(reason)) => return Ok(self.halt(reason)),
                Ok(None) => {}
                Err(fault) => {
                    self.state = MachineState::Halted;
                    info!("Halted on fault: {}", fault);
                    return Err(fault);
                }
            }
        }
    }

    /// Execute a single instruction outside the run loop.
    ///
    /// Returns `Some(HaltReason::End)` when the instruction was END. The
    /// observer hooks fire as they would inside [`Machine::start`].
    pub fn step(&mut self) -> Result<Option<HaltReason>, Fault> {
        let pc = self.cpu.registers.pc();
        self.observer
            .debug_position_changed(pc, self.symbols.line_for(pc));
        match self.execute()? {
            Some(reason) => Ok(Some(self.halt(reason))),
            None => Ok(None),
        }
    }

    fn execute(&mut self) -> Result<Option<HaltReason>, Fault> {
        match self.cpu.step() {
            Ok(Step::End) => Ok(Some(HaltReason::End)),
            Ok(Step::Continue { state_changed }) => {
                if state_changed {
                    self.observer.cpu_state_changed(&self.cpu.registers);
                }
                Ok(None)
            }
            Err(fault) => {
                debug!("{}", fault);
                Err(fault)
            }
        }
    }

    fn halt(&mut self, reason: HaltReason) -> HaltReason {
        self.cpu.registers.set_pc(self.entry);
        self.state = MachineState::Halted;
        info!("Halted ({:?}): {}", reason, self.cpu.registers);
        reason
    }

    /// Shared stop/pause handle for the host
    pub fn control(&self) -> Arc<RunControl> {
        self.control.clone()
    }

    pub fn bus(&self) -> &Arc<MemoryBus> {
        &self.bus
    }

    pub fn cpu(&self) -> &Cpu {
        &self.cpu
    }

    pub fn registers(&self) -> &RegisterFile {
        &self.cpu.registers
    }

    pub fn registers_mut(&mut self) -> &mut RegisterFile {
        &mut self.cpu.registers
    }

    pub fn symbols(&self) -> &DebugSymbolTable {
        &self.symbols
    }

    pub fn entry(&self) -> u16 {
        self.entry
    }

    pub fn state(&self) -> MachineState {
        self.state
    }
}

impl Default for Machine {
    fn default() -> Self {
        Self::new(MachineConfig::default())
    }
}
