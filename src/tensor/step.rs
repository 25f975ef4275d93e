use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

/// An external step counter shared with the training loop.
///
/// Optimizers bump it by one after every variable write of a successful apply.
#[derive(Debug, Clone, Default)]
pub struct GlobalStep(Arc<AtomicU64>);

impl GlobalStep {
    /// Creates a new `GlobalStep` starting at `start`.
    pub fn new(start: u64) -> Self {
        Self(Arc::new(AtomicU64::new(start)))
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Acquire)
    }

    /// Increments the counter and returns the new value.
    pub(crate) fn increment(&self) -> u64 {
        self.0.fetch_add(1, Ordering::AcqRel) + 1
    }
}
