//! Redraw wake-up channel and console telemetry.

use crossbeam_channel::{Receiver, Sender, TryRecvError, TrySendError};
use std::sync::atomic::{AtomicU64, Ordering};

// -------------------------------------------------------------------------------------------------
// Channel Policy
// -------------------------------------------------------------------------------------------------
// Producers never wait on rendering. A redraw request is a `try_send` into a channel of capacity
// one: if a request is already pending the new one is dropped and counted as coalesced, so any
// number of updates between two passes collapse into exactly one pass. The redraw thread blocks in
// `recv` while idle; there is no polling interval anywhere on this path. `Stop` is the only blocking
// send and is issued once, from teardown.
// -------------------------------------------------------------------------------------------------
pub const REDRAW_CHANNEL_CAP: usize = 1;

// -------------------------------------------------------------------------------------------------
// Telemetry
// -------------------------------------------------------------------------------------------------
// Process-wide relaxed counters. Cheap enough to bump on every producer call; read through
// `telemetry_snapshot` in tests or for a shutdown summary log line.
// -------------------------------------------------------------------------------------------------
pub static REDRAW_REQUESTS: AtomicU64 = AtomicU64::new(0);
pub static REDRAW_COALESCED: AtomicU64 = AtomicU64::new(0); // requests absorbed by a pending one
pub static REDRAW_PASSES: AtomicU64 = AtomicU64::new(0);
pub static LINES_REPAINTED: AtomicU64 = AtomicU64::new(0); // slot lines actually rewritten
pub static SCROLL_WRITES: AtomicU64 = AtomicU64::new(0);
pub static FORCED_WRAPS: AtomicU64 = AtomicU64::new(0); // breaks inserted at the column limit

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TelemetrySnapshot {
    pub redraw_requests: u64,
    pub redraw_coalesced: u64,
    pub redraw_passes: u64,
    pub lines_repainted: u64,
    pub scroll_writes: u64,
    pub forced_wraps: u64,
}

pub fn telemetry_snapshot() -> TelemetrySnapshot {
    use Ordering::Relaxed;
    TelemetrySnapshot {
        redraw_requests: REDRAW_REQUESTS.load(Relaxed),
        redraw_coalesced: REDRAW_COALESCED.load(Relaxed),
        redraw_passes: REDRAW_PASSES.load(Relaxed),
        lines_repainted: LINES_REPAINTED.load(Relaxed),
        scroll_writes: SCROLL_WRITES.load(Relaxed),
        forced_wraps: FORCED_WRAPS.load(Relaxed),
    }
}

/// Message observed by the redraw thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wake {
    Redraw,
    Stop,
}

/// Producer side. Cloned freely into every component that mutates layout.
#[derive(Debug, Clone)]
pub struct RedrawNotifier {
    tx: Sender<Wake>,
}

/// Consumer side, owned by the redraw thread.
#[derive(Debug)]
pub struct RedrawListener {
    rx: Receiver<Wake>,
}

pub fn redraw_channel() -> (RedrawNotifier, RedrawListener) {
    let (tx, rx) = crossbeam_channel::bounded(REDRAW_CHANNEL_CAP);
    (RedrawNotifier { tx }, RedrawListener { rx })
}

impl RedrawNotifier {
    /// Ask for a pass. Returns `true` when this call scheduled one, `false`
    /// when it was coalesced into an already pending request or the listener
    /// is gone.
    pub fn request(&self) -> bool {
        REDRAW_REQUESTS.fetch_add(1, Ordering::Relaxed);
        match self.tx.try_send(Wake::Redraw) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                REDRAW_COALESCED.fetch_add(1, Ordering::Relaxed);
                false
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }

    /// Deliver `Stop`, waiting for the pending slot to drain if necessary.
    /// A listener that already exited is not an error.
    pub fn stop(&self) {
        if self.tx.send(Wake::Stop).is_err() {
            tracing::debug!(target: "console.redraw", "stop_listener_gone");
        }
    }
}

impl RedrawListener {
    /// Block until woken. A closed channel reads as `Stop`.
    pub fn wait(&self) -> Wake {
        self.rx.recv().unwrap_or(Wake::Stop)
    }

    /// Non-blocking take of the pending wake, if any.
    pub fn try_take(&self) -> Option<Wake> {
        match self.rx.try_recv() {
            Ok(w) => Some(w),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Wake::Stop),
        }
    }
}
