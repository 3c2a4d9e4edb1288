//! `SenseFlag`: the per-cell spin location.

use core::fmt;

use crossbeam_utils::{Backoff, CachePadded};

use crate::sync::{self, AtomicBool, Ordering};

/// A cache-padded boolean written by exactly one opponent and polled by its owner.
///
/// Stores use `Release` and loads use `Acquire`, so everything the writer did
/// before signalling is visible to the owner once it observes the new sense.
/// The padding keeps flags that different threads write on separate lines.
pub struct SenseFlag {
    inner: CachePadded<AtomicBool>,
}

impl SenseFlag {
    /// Creates a flag holding `value`.
    pub fn new(value: bool) -> Self {
        Self {
            inner: CachePadded::new(AtomicBool::new(value)),
        }
    }

    /// Current value.
    #[inline(always)]
    pub fn load(&self) -> bool {
        self.inner.load(Ordering::Acquire)
    }

    /// Publishes `sense` to the owner.
    #[inline(always)]
    pub fn signal(&self, sense: bool) {
        self.inner.store(sense, Ordering::Release);
    }

    /// Spins until the flag holds `sense`.
    ///
    /// Starts with busy spinning and escalates to yielding once the backoff
    /// completes. Never returns if no opponent ever signals.
    #[inline]
    pub fn wait_for(&self, sense: bool) {
        if self.load() == sense {
            return;
        }
        let backoff = Backoff::new();
        while self.load() != sense {
            sync::relax(&backoff);
        }
    }
}

impl Default for SenseFlag {
    fn default() -> Self {
        Self::new(false)
    }
}

impl fmt::Debug for SenseFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SenseFlag").field(&self.load()).finish()
    }
}
