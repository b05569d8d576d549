//! Single-value publication slot for immutable routing snapshots.

use arc_swap::ArcSwap;
use std::fmt;
use std::sync::Arc;

/// A lock-free holder for the most recently published snapshot of `T`.
///
/// Uses `ArcSwap` so that publishing a new value is a single pointer swap: readers
/// never observe a half-built value and are never blocked by a writer or by each
/// other. Values are shared behind an `Arc` and must be treated as read-only; to
/// change a snapshot, build a new value and [`set`](Self::set) it.
pub struct SnapshotSlot<T> {
    current: ArcSwap<T>,
}

impl<T> SnapshotSlot<T> {
    /// Create a slot holding an initial value.
    pub fn new(initial: T) -> Self {
        Self {
            current: ArcSwap::from_pointee(initial),
        }
    }

    /// Publish a fully built value, replacing whatever was published before.
    pub fn set(&self, value: T) {
        self.current.store(Arc::new(value));
    }

    /// Publish a value that is already shared.
    pub fn set_arc(&self, value: Arc<T>) {
        self.current.store(value);
    }

    /// Returns the most recently published value.
    pub fn get(&self) -> Arc<T> {
        self.current.load_full()
    }
}

impl<T: Default> Default for SnapshotSlot<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: fmt::Debug> fmt::Debug for SnapshotSlot<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SnapshotSlot")
            .field("current", &self.current.load())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_get_returns_latest_set() {
        let slot = SnapshotSlot::new(1u32);
        assert_eq!(*slot.get(), 1);

        slot.set(2);
        slot.set(3);
        assert_eq!(*slot.get(), 3);
    }

    #[test]
    fn test_old_reader_keeps_its_value() {
        let slot = SnapshotSlot::new(vec!["a".to_string()]);
        let before = slot.get();

        slot.set(vec!["b".to_string(), "c".to_string()]);

        assert_eq!(before.as_slice(), ["a"]);
        assert_eq!(slot.get().len(), 2);
    }

    #[test]
    fn test_concurrent_readers_see_whole_values() {
        // Every published vec has all elements equal to its length; a torn read would break that.
        let slot = Arc::new(SnapshotSlot::new(vec![1usize]));
        let mut handles = vec![];

        let writer = Arc::clone(&slot);
        handles.push(thread::spawn(move || {
            for n in 1..500usize {
                writer.set(vec![n; n]);
            }
        }));

        for _ in 0..4 {
            let reader = Arc::clone(&slot);
            handles.push(thread::spawn(move || {
                for _ in 0..500 {
                    let v = reader.get();
                    assert!(v.iter().all(|x| *x == v.len()));
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }
    }
}
