//! # Connection State (RFC 9000 Section 5)
//!
//! Per-connection state mutated by received frames, plus a shared handle
//! for when that state has to cross threads.

pub mod cid_registry;
pub mod state;

#[cfg(test)]
mod tests;

use std::sync::{Arc, Mutex, MutexGuard};

pub use cid_registry::ConnectionIdRegistry;
pub use state::{ConnectionLimits, ConnectionState, RecvStreamState};

use crate::error::Result;
use crate::frames::Frame;

/// Single-writer handle around a [`ConnectionState`].
///
/// Every mutation goes through one mutex; a frame batch is applied under
/// a single lock so no other writer observes a half-applied packet.
#[derive(Debug, Clone)]
pub struct SharedConnection {
    inner: Arc<Mutex<ConnectionState>>,
}

impl SharedConnection {
    pub fn new(state: ConnectionState) -> Self {
        Self {
            inner: Arc::new(Mutex::new(state)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ConnectionState> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Apply all frames of one packet.
    pub fn apply_frames(&self, frames: &[Frame]) -> Result<()> {
        self.lock().apply_frames(frames)
    }

    /// Run `f` with exclusive access to the state.
    pub fn with<R>(&self, f: impl FnOnce(&mut ConnectionState) -> R) -> R {
        f(&mut self.lock())
    }
}
