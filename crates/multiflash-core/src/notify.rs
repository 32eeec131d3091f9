//! Debounced volume change detection
//!
//! The mass-storage stack reports every flush of the backing store. A host
//! copying a file produces a burst of flushes, and scanning the volume in
//! the middle of that burst would see half-written files. The notifier
//! turns the burst into one "changed" edge once the volume has been quiet
//! for the settle window.
//!
//! Time is passed in by the caller as a monotonic millisecond counter so
//! the notifier works the same on a host and on bare metal.

/// Default quiescence window after the last flush
pub const SETTLE_WINDOW_MS: u64 = 250;

/// Settle timer fed by raw flush notifications
///
/// Must be polled from a single control loop: [`ChangeNotifier::changed`]
/// reports each elapse to the first caller only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangeNotifier {
    window_ms: u64,
    settle_at: Option<u64>,
}

impl Default for ChangeNotifier {
    fn default() -> Self {
        Self::new(SETTLE_WINDOW_MS)
    }
}

impl ChangeNotifier {
    /// Create a notifier with the given settle window
    pub const fn new(window_ms: u64) -> Self {
        Self {
            window_ms,
            settle_at: None,
        }
    }

    /// Settle window in milliseconds
    pub const fn window_ms(&self) -> u64 {
        self.window_ms
    }

    /// Record a flush of the backing store at `now_ms`
    ///
    /// Re-arms the timer, so a continuous stream of writes keeps the volume
    /// in the changing state.
    pub fn note_flush(&mut self, now_ms: u64) {
        self.settle_at = Some(now_ms.saturating_add(self.window_ms));
    }

    /// Whether a write burst is still in progress
    pub fn changing(&self, now_ms: u64) -> bool {
        matches!(self.settle_at, Some(at) if now_ms < at)
    }

    /// Whether the volume settled since the last call
    ///
    /// Returns `true` once per elapse, then clears.
    pub fn changed(&mut self, now_ms: u64) -> bool {
        match self.settle_at {
            Some(at) if now_ms >= at => {
                self.settle_at = None;
                true
            }
            _ => false,
        }
    }
}
