//! Cooperative run control shared between the host and the interpreter.
//!
//! The interpreter samples the stop token once per instruction boundary and
//! blocks on the pause gate before decoding. Neither ever interrupts an
//! instruction in progress.

use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::{Condvar, Mutex};

/// Outcome of waiting at the pause gate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    /// Not paused (or resumed); keep executing
    Open,
    /// Stop was requested while waiting
    Stopped,
}

#[derive(Default)]
pub struct RunControl {
    stop: AtomicBool,
    paused: Mutex<bool>,
    gate: Condvar,
}

impl RunControl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a stop at the next instruction boundary. Idempotent.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
        // Take the gate lock so a paused worker cannot miss the wakeup
        let _paused = self.paused.lock();
        self.gate.notify_all();
    }

    pub fn is_stop_requested(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    /// Forget a previous stop request
    pub fn clear_stop(&self) {
        self.stop.store(false, Ordering::SeqCst);
    }

    /// Close the gate: the worker blocks before its next instruction
    pub fn pause(&self) {
        *self.paused.lock() = true;
    }

    /// Open the gate and wake the worker
    pub fn resume(&self) {
        let mut paused = self.paused.lock();
        *paused = false;
        self.gate.notify_all();
    }

    pub fn is_paused(&self) -> bool {
        *self.paused.lock()
    }

    /// Block while paused, until resumed or stopped
    pub fn wait_while_paused(&self) -> GateState {
        let mut paused = self.paused.lock();
        while *paused && !self.is_stop_requested() {
            self.gate.wait(&mut paused);
        }
        if self.is_stop_requested() {
            GateState::Stopped
        } else {
            GateState::Open
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_stop_is_idempotent() {
        let control = RunControl::new();
        assert!(!control.is_stop_requested());
        control.stop();
        control.stop();
        assert!(control.is_stop_requested());
        control.clear_stop();
        assert!(!control.is_stop_requested());
    }

    #[test]
    fn test_open_gate_does_not_block() {
        let control = RunControl::new();
        assert_eq!(control.wait_while_paused(), GateState::Open);
    }

    #[test]
    fn test_pause_and_resume_flags() {
        let control = RunControl::new();
        control.pause();
        assert!(control.is_paused());
        control.resume();
        assert!(!control.is_paused());
    }

    #[test]
    #[serial]
    fn test_resume_releases_waiting_worker() {
        let control = Arc::new(RunControl::new());
        control.pause();
        let worker = {
            let control = control.clone();
            thread::spawn(move || control.wait_while_paused())
        };
        thread::sleep(Duration::from_millis(20));
        assert!(!worker.is_finished());
        control.resume();
        assert_eq!(worker.join().unwrap(), GateState::Open);
    }

    #[test]
    #[serial]
    fn test_stop_releases_waiting_worker() {
        let control = Arc::new(RunControl::new());
        control.pause();
        let worker = {
            let control = control.clone();
            thread::spawn(move || control.wait_while_paused())
        };
        thread::sleep(Duration::from_millis(20));
        control.stop();
        assert_eq!(worker.join().unwrap(), GateState::Stopped);
        // Still paused; stop does not open the gate
        assert!(control.is_paused());
    }
}
