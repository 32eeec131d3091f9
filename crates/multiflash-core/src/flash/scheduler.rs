//! Cooperative yield point

use maybe_async::maybe_async;

/// Hands control back to the runtime between block operations
///
/// On a single-threaded device this is where the USB stack and the UI get
/// serviced. It must not change any orchestrator state.
#[maybe_async(AFIT)]
pub trait Scheduler {
    /// Let background work run, then return
    async fn yield_now(&mut self);
}

/// A scheduler that returns immediately
#[derive(Debug, Default, Clone, Copy)]
pub struct NoYield;

#[maybe_async(AFIT)]
impl Scheduler for NoYield {
    async fn yield_now(&mut self) {}
}
