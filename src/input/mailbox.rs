use std::sync::{Arc, Mutex, MutexGuard};

use super::key::KeyEvent;

/// Single-slot holder for the latest unconsumed key. Cloning shares the slot.
#[derive(Clone, Debug, Default)]
pub struct Mailbox {
    slot: Arc<Mutex<Option<KeyEvent>>>,
}

impl Mailbox {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Option<KeyEvent>> {
        self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Store `event`, replacing any key not yet taken.
    pub fn post(&self, event: KeyEvent) {
        if let Some(previous) = self.lock().replace(event) {
            log::debug!("key {:?} replaced by {:?} before it was read", previous, event);
        }
    }

    /// Remove and return the pending key.
    pub fn take(&self) -> Option<KeyEvent> {
        self.lock().take()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_none()
    }
}
