use std::ops::Range;

use log::{debug, warn};
use parking_lot::{Mutex, RwLock};

use crate::device::{Device, DeviceContext, PenCommand, SharedDevice};
use crate::error::DeviceError;

/// Size of the B33 address space
pub const ADDRESS_SPACE_SIZE: usize = 0x10000;

struct AttachedDevice {
    device: SharedDevice,
    context: Option<DeviceContext>,
}

impl AttachedDevice {
    /// Run `op` against the device, on its own context if it has one
    fn with_device<F>(&self, op: F)
    where
        F: FnOnce(&mut dyn Device) + Send + 'static,
    {
        match &self.context {
            None => op(&mut *self.device.lock()),
            Some(context) => {
                let device = self.device.clone();
                if let Err(e) = context.run_sync(move || op(&mut *device.lock())) {
                    warn!("Device dispatch failed: {}", e);
                }
            }
        }
    }
}

/// B33 memory bus (64KB flat address space)
///
/// Reads only ever see the core array. Writes land in the core array and are
/// then broadcast to every attached device in attachment order, each device
/// deciding for itself whether the address is in its window.
pub struct MemoryBus {
    cells: RwLock<Box<[u8]>>,
    devices: Mutex<Vec<AttachedDevice>>,
}

impl MemoryBus {
    /// Create a bus with 64KB of zeroed memory and no devices
    pub fn new() -> Self {
        Self {
            cells: RwLock::new(vec![0; ADDRESS_SPACE_SIZE].into_boxed_slice()),
            devices: Mutex::new(Vec::new()),
        }
    }

    /// Read a byte from the core array. Devices are never consulted.
    pub fn read(&self, addr: u16) -> u8 {
        self.cells.read()[addr as usize]
    }

    /// Read a 16-bit word stored low byte first (instruction operands)
    pub fn read_u16(&self, addr: u16) -> u16 {
        let lo = self.read(addr) as u16;
        let hi = self.read(addr.wrapping_add(1)) as u16;
        (hi << 8) | lo
    }

    /// Read a 16-bit word stored high byte first (register data)
    pub fn read_u16_be(&self, addr: u16) -> u16 {
        let hi = self.read(addr) as u16;
        let lo = self.read(addr.wrapping_add(1)) as u16;
        (hi << 8) | lo
    }

    /// Write a byte and broadcast it to every attached device
    pub fn write(&self, addr: u16, value: u8) {
        let devices = self.devices.lock();
        self.cells.write()[addr as usize] = value;
        for attached in devices.iter() {
            attached.with_device(move |device| device.poke(addr, value));
        }
    }

    /// Write a 16-bit word high byte first, as two consecutive bus writes
    pub fn write_u16_be(&self, addr: u16, value: u16) {
        self.write(addr, (value >> 8) as u8);
        self.write(addr.wrapping_add(1), value as u8);
    }

    /// Copy a block into memory through the write path
    pub fn load(&self, addr: u16, bytes: &[u8]) {
        for (offset, &byte) in bytes.iter().enumerate() {
            self.write(addr.wrapping_add(offset as u16), byte);
        }
    }

    /// Copy a range of the core array
    pub fn snapshot(&self, range: Range<u16>) -> Vec<u8> {
        self.cells.read()[range.start as usize..range.end as usize].to_vec()
    }

    /// Attach a device that can be driven from any thread
    pub fn attach(&self, device: SharedDevice) -> Result<(), DeviceError> {
        if device.lock().requires_own_execution_context() {
            return Err(DeviceError::ContextRequired);
        }
        self.push_device(device, None);
        Ok(())
    }

    /// Attach a device whose calls must be run on `context`
    pub fn attach_with_context(&self, device: SharedDevice, context: DeviceContext) {
        self.push_device(device, Some(context));
    }

    fn push_device(&self, device: SharedDevice, context: Option<DeviceContext>) {
        {
            let locked = device.lock();
            debug!(
                "Attaching device at {:04X} (+{:X} bytes){}",
                locked.window_base(),
                locked.window_size(),
                if context.is_some() { " on own context" } else { "" }
            );
        }
        self.devices.lock().push(AttachedDevice { device, context });
    }

    pub fn device_count(&self) -> usize {
        self.devices.lock().len()
    }

    /// Reset every attached device, keeping them attached
    pub fn reset_devices(&self) {
        let devices = self.devices.lock();
        for attached in devices.iter() {
            attached.with_device(|device| device.reset());
        }
    }

    /// Send a drawing command to every attached device
    pub fn draw(&self, command: PenCommand) {
        let devices = self.devices.lock();
        for attached in devices.iter() {
            attached.with_device(move |device| device.pen(command));
        }
    }

    /// Ask every attached device to refresh
    pub fn force_refresh(&self) {
        let devices = self.devices.lock();
        for attached in devices.iter() {
            attached.with_device(|device| device.force_refresh());
        }
    }

    /// Zero memory, reset every device, then detach them all
    pub fn reset(&self) {
        let mut devices = self.devices.lock();
        self.cells.write().fill(0);
        for attached in devices.iter() {
            attached.with_device(|device| device.reset());
        }
        devices.clear();
    }
}

impl Default for MemoryBus {
    fn default() -> Self {
        Self::new()
    }
}
