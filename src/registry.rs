//! Handle registry: maps the opaque per-stream identifier handed to the engine to the stream's
//! binding state.
//!
//! The engine only ever sees a [`StreamHandle`]. Every realtime invocation resolves it through
//! [`HandleRegistry::get`], which takes the read lock and clones an [`Arc`]. Nothing is
//! allocated or freed while the write lock is held: capacity is grown before the lock is taken,
//! and removed entries are dropped after it is released.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

use crate::error::HandleCorruption;

/// Opaque identifier of a live stream binding.
///
/// Handles are unique for the life of the process and never reissued, so a stale handle can
/// only ever miss, never resolve to another stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StreamHandle(u64);

static NEXT_HANDLE: AtomicU64 = AtomicU64::new(1);

impl StreamHandle {
    fn next() -> Self {
        Self(NEXT_HANDLE.fetch_add(1, Ordering::Relaxed))
    }

    /// Rebuilds a handle from its raw value.
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw value.
    pub const fn as_raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for StreamHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

const INITIAL_CAPACITY: usize = 16;

/// Thread-safe map from [`StreamHandle`] to shared binding state.
pub struct HandleRegistry<T: ?Sized> {
    entries: RwLock<HashMap<StreamHandle, Arc<T>>>,
}

impl<T: ?Sized> HandleRegistry<T> {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::with_capacity(INITIAL_CAPACITY)),
        }
    }

    /// Registers `value` under a fresh handle.
    pub fn track(&self, value: Arc<T>) -> StreamHandle {
        let handle = StreamHandle::next();
        let mut value = Some(value);
        loop {
            {
                let mut entries = self.entries.write();
                if entries.len() < entries.capacity() {
                    if let Some(value) = value.take() {
                        entries.insert(handle, value);
                    }
                    return handle;
                }
            }
            self.grow();
        }
    }

    /// Doubles the capacity, allocating and freeing outside the lock.
    fn grow(&self) {
        let wanted = (self.entries.read().capacity() * 2).max(INITIAL_CAPACITY);
        let mut replacement = HashMap::with_capacity(wanted);
        let retired = {
            let mut entries = self.entries.write();
            if entries.len() < entries.capacity() {
                // Another thread grew it first.
                return;
            }
            if replacement.capacity() <= entries.len() {
                return;
            }
            replacement.extend(entries.drain());
            std::mem::replace(&mut *entries, replacement)
        };
        drop(retired);
    }

    /// Resolves `handle`.
    ///
    /// # Errors
    ///
    /// Returns [`HandleCorruption`] if the handle is not registered.
    pub fn get(&self, handle: StreamHandle) -> Result<Arc<T>, HandleCorruption> {
        self.entries
            .read()
            .get(&handle)
            .cloned()
            .ok_or(HandleCorruption(handle))
    }

    /// Removes `handle`, returning its value if it was registered.
    ///
    /// The returned value (and with it possibly the last reference to the binding) is dropped
    /// by the caller, outside the lock.
    pub fn untrack(&self, handle: StreamHandle) -> Option<Arc<T>> {
        self.entries.write().remove(&handle)
    }

    /// Returns true if `handle` is registered.
    pub fn contains(&self, handle: StreamHandle) -> bool {
        self.entries.read().contains_key(&handle)
    }

    /// Number of registered handles.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns true if no handle is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: ?Sized> Default for HandleRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized> fmt::Debug for HandleRegistry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandleRegistry")
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn handles_resolve_until_untracked() {
        let registry = HandleRegistry::<str>::new();
        let a = registry.track(Arc::from("a"));
        let b = registry.track(Arc::from("b"));
        assert!(b > a);
        assert_eq!(&*registry.get(a).expect("tracked"), "a");
        assert_eq!(registry.len(), 2);

        assert_eq!(registry.untrack(a).as_deref(), Some("a"));
        assert_eq!(registry.get(a).err(), Some(HandleCorruption(a)));
        assert!(registry.untrack(a).is_none());
        assert!(registry.contains(b));
    }

    #[test]
    fn growth_keeps_existing_entries() {
        let registry = HandleRegistry::<usize>::new();
        let handles: Vec<_> = (0..200).map(|i| registry.track(Arc::new(i))).collect();
        for (i, handle) in handles.iter().enumerate() {
            assert_eq!(*registry.get(*handle).expect("tracked"), i);
        }
    }

    #[test]
    fn unknown_handle_is_corruption() {
        let registry = HandleRegistry::<u8>::default();
        let bogus = StreamHandle::from_raw(u64::MAX);
        assert_eq!(registry.get(bogus).err(), Some(HandleCorruption(bogus)));
        assert!(registry.is_empty());
    }

    proptest! {
        #[test]
        fn handles_are_never_reissued(ops in prop::collection::vec(any::<bool>(), 1..200)) {
            let registry = HandleRegistry::<u32>::new();
            let mut live: Vec<StreamHandle> = Vec::new();
            let mut last: Option<StreamHandle> = None;
            for track in ops {
                if track || live.is_empty() {
                    let handle = registry.track(Arc::new(0));
                    if let Some(previous) = last {
                        prop_assert!(handle > previous);
                    }
                    last = Some(handle);
                    live.push(handle);
                } else {
                    let handle = live.remove(0);
                    prop_assert!(registry.untrack(handle).is_some());
                    prop_assert!(registry.get(handle).is_err());
                }
                prop_assert_eq!(registry.len(), live.len());
            }
        }
    }
}
