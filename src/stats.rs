//! Process-wide player statistics.
//!
//! A single atomic counter tracks the number of open WebSocket sessions. Each
//! connection holds a [`ConnectionGuard`] for its lifetime and receives a
//! periodic `stat` frame with the current count; the cadence doubles as a
//! keep-alive so idle intermediaries do not drop the socket.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use crate::proto::Frame;

/// Shared live-connection counter.
#[derive(Debug, Clone, Default)]
pub struct PlayerCounter(Arc<AtomicI64>);

impl PlayerCounter {
    /// Create a counter starting at zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection. The count drops again when the returned guard
    /// is dropped.
    #[must_use]
    pub fn connect(&self) -> ConnectionGuard {
        self.0.fetch_add(1, Ordering::Relaxed);
        ConnectionGuard(Arc::clone(&self.0))
    }

    /// The number of currently open sessions.
    #[must_use]
    pub fn count(&self) -> i64 {
        self.0.load(Ordering::Relaxed)
    }

    /// The `stat` frame for the current count.
    #[must_use]
    pub fn stat_frame(&self) -> Frame {
        Frame::Stat {
            num_players: self.count(),
        }
    }
}

/// Decrements the counter on drop.
#[derive(Debug)]
pub struct ConnectionGuard(Arc<AtomicI64>);

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::Relaxed);
    }
}
