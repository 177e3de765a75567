//! A live key/value record inside one bucket chain (spec.md §3, §4.7).

use crate::event::Notifier;
use bytes::Bytes;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// The mutable part of an entry: the key/value pair itself. Replaced
/// in place under the owning bucket's lock on `put`-replace.
pub struct EntryData<V> {
    pub key: Bytes,
    pub value: V,
}

/// `refcount >= 1` iff linked in a bucket chain; a pin (iterator or
/// otherwise) increments it while the bucket lock is held, so the
/// increment never races with destruction (spec.md §4.7).
pub struct Entry<V, D> {
    pub data: Mutex<EntryData<V>>,
    refcount: AtomicUsize,
    pub notifiers: Mutex<Vec<Notifier<V, D>>>,
}

impl<V, D> Entry<V, D> {
    pub fn new(key: Bytes, value: V) -> Self {
        Entry {
            data: Mutex::new(EntryData { key, value }),
            refcount: AtomicUsize::new(1),
            notifiers: Mutex::new(Vec::new()),
        }
    }

    /// Current refcount. Only meaningful as a snapshot; callers that
    /// need a linearizable read must hold the owning bucket's lock.
    pub fn refcount(&self) -> usize {
        self.refcount.load(Ordering::Acquire)
    }

    /// Pin the entry (iterator cursor). Precondition: the caller holds
    /// the owning bucket's lock, so this can never race with the
    /// refcount reaching zero.
    pub fn pin(&self) {
        self.refcount.fetch_add(1, Ordering::AcqRel);
    }

    /// Decrement the refcount and report whether it reached zero.
    /// Precondition: the caller holds the owning bucket's lock.
    pub fn deref(&self) -> bool {
        self.refcount.fetch_sub(1, Ordering::AcqRel) == 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_entry_has_refcount_one() {
        let e: Entry<u32, ()> = Entry::new(Bytes::from_static(b"k"), 1);
        assert_eq!(e.refcount(), 1);
    }

    #[test]
    fn pin_then_deref_is_a_no_op_on_liveness() {
        let e: Entry<u32, ()> = Entry::new(Bytes::from_static(b"k"), 1);
        e.pin();
        assert_eq!(e.refcount(), 2);
        assert!(!e.deref());
        assert_eq!(e.refcount(), 1);
        assert!(e.deref());
        assert_eq!(e.refcount(), 0);
    }
}
