//! Operational / destroyed state shared by every backend

use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::StorageError;

/// Tracks whether a store has been destroyed
#[derive(Debug, Default)]
pub struct Lifecycle {
    destroyed: AtomicBool,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail with [`StorageError::Destroyed`] once the store has been destroyed
    pub fn ensure_live(&self) -> Result<(), StorageError> {
        if self.destroyed.load(Ordering::Acquire) {
            Err(StorageError::Destroyed)
        } else {
            Ok(())
        }
    }

    /// Move to the destroyed state
    ///
    /// Returns true only for the call that performed the transition.
    pub fn destroy(&self) -> bool {
        !self.destroyed.swap(true, Ordering::AcqRel)
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::Acquire)
    }
}
