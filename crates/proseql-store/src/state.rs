use std::sync::Arc;

use arc_swap::ArcSwap;

/// Atomically swappable shared state.
///
/// Readers take O(1) snapshots whose lifetime is independent of later
/// writes; writers build a new value off a snapshot and swap the pointer.
/// Pointer identity doubles as the change signal: a snapshot that is no
/// longer pointer-equal to the live value has been superseded.
pub struct VersionedCell<T> {
    inner: ArcSwap<T>,
}

impl<T> VersionedCell<T> {
    pub fn new(value: T) -> Self {
        Self {
            inner: ArcSwap::new(Arc::new(value)),
        }
    }

    /// Capture the current value. Never blocks.
    pub fn snapshot(&self) -> Arc<T> {
        self.inner.load_full()
    }

    /// Install a new value. Earlier snapshots are unaffected.
    pub fn replace(&self, value: Arc<T>) {
        self.inner.store(value);
    }

    /// Whether `snapshot` is still the live value.
    pub fn is_current(&self, snapshot: &Arc<T>) -> bool {
        Arc::ptr_eq(&self.inner.load_full(), snapshot)
    }
}

impl<T: Default> Default for VersionedCell<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}
