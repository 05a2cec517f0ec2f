//! Peripheral device contract.
//!
//! Devices are memory-mapped peripherals that see every bus write. The bus
//! only holds a reference to a device: the host keeps its own [`SharedDevice`]
//! handle and can lock it at any time (e.g. from a render thread) to read a
//! consistent snapshot of the device's private state.

use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;

use parking_lot::Mutex;

use crate::error::DeviceError;

/// Drawing command emitted by STCLR, MVTO and LNTO
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PenCommand {
    SetColor { r: u8, g: u8, b: u8 },
    MoveTo { x: u16, y: u16 },
    LineTo { x: u16, y: u16 },
}

/// Capability set every peripheral implements.
pub trait Device: Send {
    /// Return to power-on state
    fn reset(&mut self);

    /// Called for every bus write, whether or not `address` is in this
    /// device's window. Out-of-window addresses must be ignored.
    fn poke(&mut self, address: u16, value: u8);

    /// Device-private view of an address (not visible to CPU reads)
    fn peek(&self, address: u16) -> u8;

    /// Flush pending state to whatever the device renders to
    fn force_refresh(&mut self) {}

    /// Receive a drawing command. Devices that do not draw ignore it.
    fn pen(&mut self, _command: PenCommand) {}

    /// First address of the window this device claims
    fn window_base(&self) -> u16;

    /// Number of bytes in the window
    fn window_size(&self) -> usize;

    /// True when the device must only be touched from its own execution
    /// context (see [`DeviceContext`])
    fn requires_own_execution_context(&self) -> bool {
        false
    }

    /// True when `address` falls inside this device's window
    fn owns(&self, address: u16) -> bool {
        let base = self.window_base();
        address >= base && ((address - base) as usize) < self.window_size()
    }
}

/// Handle shared between the host and the bus
pub type SharedDevice = Arc<Mutex<dyn Device>>;

/// Wrap a device for attachment
pub fn shared<D: Device + 'static>(device: D) -> Arc<Mutex<D>> {
    Arc::new(Mutex::new(device))
}

type Job = Box<dyn FnOnce() + Send>;

/// Sending half of a device execution context.
///
/// Work submitted through [`DeviceContext::run_sync`] runs on whichever thread
/// drives the matching [`ContextPump`], and the caller blocks until it is done.
#[derive(Clone)]
pub struct DeviceContext {
    jobs: Sender<Job>,
}

/// Receiving half of a device execution context
pub struct ContextPump {
    jobs: Receiver<Job>,
}

impl DeviceContext {
    /// Create a context whose pump is driven by the caller (e.g. a UI loop)
    pub fn channel() -> (DeviceContext, ContextPump) {
        let (jobs, receiver) = mpsc::channel();
        (DeviceContext { jobs }, ContextPump { jobs: receiver })
    }

    /// Create a context backed by a dedicated named thread
    pub fn spawn(name: &str) -> std::io::Result<DeviceContext> {
        let (context, pump) = Self::channel();
        thread::Builder::new()
            .name(name.to_string())
            .spawn(move || pump.run())?;
        Ok(context)
    }

    /// Run `job` on the context and wait for it to finish
    pub fn run_sync<F>(&self, job: F) -> Result<(), DeviceError>
    where
        F: FnOnce() + Send + 'static,
    {
        let (done_tx, done_rx) = mpsc::sync_channel(1);
        let wrapped: Job = Box::new(move || {
            job();
            let _ = done_tx.send(());
        });
        self.jobs
            .send(wrapped)
            .map_err(|_| DeviceError::ContextClosed)?;
        done_rx.recv().map_err(|_| DeviceError::ContextClosed)
    }
}

impl ContextPump {
    /// Run jobs until every [`DeviceContext`] handle is dropped
    pub fn run(self) {
        while let Ok(job) = self.jobs.recv() {
            job();
        }
    }

    /// Run whatever is queued without blocking. Returns the number of jobs run.
    pub fn pump_pending(&self) -> usize {
        let mut count = 0;
        while let Ok(job) = self.jobs.try_recv() {
            job();
            count += 1;
        }
        count
    }
}
