//! Cooperative cancellation for archive operations
//!
//! The engine checks the flag between entries, never in the middle of one.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::GatewayError;

#[derive(Debug, Clone, Default)]
pub struct Cancellation {
    flag: Arc<AtomicBool>,
}

impl Cancellation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }

    /// Fails once the operation has been cancelled
    pub fn check(&self) -> Result<(), GatewayError> {
        if self.is_cancelled() {
            return Err(GatewayError::IoError("operation cancelled".into()));
        }
        Ok(())
    }

    /// Guard that cancels when dropped. Request handlers hold one so that a
    /// dropped request stops the blocking work it started.
    pub fn cancel_on_drop(&self) -> CancelOnDrop {
        CancelOnDrop(self.clone())
    }
}

pub struct CancelOnDrop(Cancellation);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.cancel();
    }
}
