//! A bucket: a chain of entries plus the mutex serializing it
//! (spec.md §4.2). The unit of concurrency in the table.

use crate::entry::Entry;
use parking_lot::Mutex;
use std::sync::Arc;

pub struct Bucket<V, D> {
    pub chain: Mutex<Vec<Arc<Entry<V, D>>>>,
}

impl<V, D> Default for Bucket<V, D> {
    fn default() -> Self {
        Bucket {
            chain: Mutex::new(Vec::new()),
        }
    }
}

impl<V, D> Bucket<V, D> {
    /// Find the entry in this chain matching `key` by byte equality.
    pub fn find(chain: &[Arc<Entry<V, D>>], key: &[u8]) -> Option<usize> {
        chain.iter().position(|e| e.data.lock().key.as_ref() == key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[test]
    fn find_locates_matching_key() {
        let bucket: Bucket<u32, ()> = Bucket::default();
        {
            let mut chain = bucket.chain.lock();
            chain.push(Arc::new(Entry::new(Bytes::from_static(b"a"), 1)));
            chain.push(Arc::new(Entry::new(Bytes::from_static(b"b"), 2)));
        }
        let chain = bucket.chain.lock();
        assert_eq!(Bucket::find(&chain, b"b"), Some(1));
        assert_eq!(Bucket::find(&chain, b"missing"), None);
    }
}
