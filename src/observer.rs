use std::sync::{Arc, Weak};

use log::debug;

use crate::error::ObserverError;
use crate::registers::RegisterFile;

/// Host-side hooks invoked synchronously from the interpreter loop.
///
/// Both hooks are diagnostic only: an error return is logged and dropped, and
/// the machine holds the observer weakly so a host that has gone away is
/// simply skipped.
pub trait MachineObserver: Send + Sync {
    /// Called after an instruction changed CPU state
    fn on_cpu_state_changed(&self, _registers: &RegisterFile) -> Result<(), ObserverError> {
        Ok(())
    }

    /// Called before each instruction fetch with the debug line for `pc`, if any
    fn on_debug_position_changed(
        &self,
        _pc: u16,
        _line: Option<&str>,
    ) -> Result<(), ObserverError> {
        Ok(())
    }
}

/// Weak handle to the registered observer
#[derive(Default)]
pub(crate) struct ObserverSlot {
    observer: Option<Weak<dyn MachineObserver>>,
}

impl ObserverSlot {
    pub(crate) fn set(&mut self, observer: &Arc<dyn MachineObserver>) {
        self.observer = Some(Arc::downgrade(observer));
    }

    pub(crate) fn clear(&mut self) {
        self.observer = None;
    }

    fn with_observer<F>(&self, hook: &str, call: F)
    where
        F: FnOnce(&dyn MachineObserver) -> Result<(), ObserverError>,
    {
        let Some(observer) = self.observer.as_ref().and_then(Weak::upgrade) else {
            return;
        };
        if let Err(e) = call(observer.as_ref()) {
            debug!("Ignoring {} failure: {}", hook, e);
        }
    }

    pub(crate) fn cpu_state_changed(&self, registers: &RegisterFile) {
        self.with_observer("on_cpu_state_changed", |observer| {
            observer.on_cpu_state_changed(registers)
        });
    }

    pub(crate) fn debug_position_changed(&self, pc: u16, line: Option<&str>) {
        self.with_observer("on_debug_position_changed", |observer| {
            observer.on_debug_position_changed(pc, line)
        });
    }
}
