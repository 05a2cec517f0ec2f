use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

/// Source of key codes consumed by the KEY instruction
pub trait KeySource: Send {
    /// Dequeue the next pending key code, if any
    fn next_pending(&mut self) -> Option<u8>;
}

/// Key source that never has anything pending
pub struct NoKeys;

impl KeySource for NoKeys {
    fn next_pending(&mut self) -> Option<u8> {
        None
    }
}

/// FIFO of pending key codes.
///
/// Clones share the same queue, so the host keeps one handle to push
/// keystrokes while the machine owns another.
#[derive(Clone, Default)]
pub struct KeyQueue {
    pending: Arc<Mutex<VecDeque<u8>>>,
}

impl KeyQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a key code
    pub fn push(&self, key: u8) {
        self.pending.lock().push_back(key);
    }

    /// Queue every byte of `text`
    pub fn push_str(&self, text: &str) {
        self.pending.lock().extend(text.bytes());
    }

    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.lock().is_empty()
    }

    pub fn clear(&self) {
        self.pending.lock().clear();
    }
}

impl KeySource for KeyQueue {
    fn next_pending(&mut self) -> Option<u8> {
        self.pending.lock().pop_front()
    }
}
