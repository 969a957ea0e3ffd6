use std::sync::atomic::{AtomicBool, Ordering};

/// Single-producer, single-consumer event flag.
///
/// The compare-match handler is the only writer and the polling loop the
/// only reader, so a relaxed atomic store/swap is all the synchronization
/// needed.
#[derive(Debug, Default)]
pub struct TickFlag(AtomicBool);

impl TickFlag {
    pub const fn new() -> Self {
        Self(AtomicBool::new(false))
    }

    pub fn set(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    /// Clear the flag, returning whether it was set.
    pub fn take(&self) -> bool {
        self.0.swap(false, Ordering::Relaxed)
    }
}
