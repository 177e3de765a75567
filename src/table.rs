//! The fixed bucket array, global count, and table-wide notifier list
//! (spec.md §3, §4.3, §4.4, §4.5).

use crate::bucket::Bucket;
use crate::entry::Entry;
use crate::error::MapError;
use crate::event::{self, Callback, Event, Notifier};
use crate::hash;
use bytes::Bytes;
use parking_lot::Mutex;
use std::sync::Arc;

pub struct Table<V, D> {
    buckets: Vec<Bucket<V, D>>,
    order: u32,
    count: Mutex<usize>,
    notifiers: Mutex<Vec<Notifier<V, D>>>,
}

impl<V, D> Table<V, D> {
    pub fn new(max_size: usize) -> Self {
        let order = hash::order_for(max_size);
        let buckets = (0..1u32 << order).map(|_| Bucket::default()).collect();
        log::info!("shardmap: table created, order={order}, buckets={}", 1u32 << order);
        Table {
            buckets,
            order,
            count: Mutex::new(0),
            notifiers: Mutex::new(Vec::new()),
        }
    }

    pub fn order(&self) -> u32 {
        self.order
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    fn bucket_index(&self, key: &[u8]) -> usize {
        hash::bucket_index(key, self.order)
    }

    pub fn count(&self) -> usize {
        *self.count.lock()
    }

    pub fn get(&self, key: &[u8]) -> Option<V>
    where
        V: Clone,
    {
        let idx = self.bucket_index(key);
        let chain = self.buckets[idx].chain.lock();
        let i = Bucket::find(&chain, key)?;
        let value = chain[i].data.lock().value.clone();
        Some(value)
    }

    pub fn put(&self, key: &[u8], value: V)
    where
        D: Clone,
    {
        let idx = self.bucket_index(key);
        let bucket = &self.buckets[idx];
        let mut chain = bucket.chain.lock();

        if let Some(i) = Bucket::find(&chain, key) {
            let entry = chain[i].clone();
            let (old_key, old_value) = {
                let mut data = entry.data.lock();
                let old_key = std::mem::replace(&mut data.key, Bytes::copy_from_slice(key));
                let old_value = std::mem::replace(&mut data.value, value);
                (old_key, old_value)
            };
            let snapshot = {
                let entry_notifiers = entry.notifiers.lock();
                let table_notifiers = self.notifiers.lock();
                event::snapshot_for(&entry_notifiers, &table_notifiers, Event::REPLACED)
            };
            drop(chain);
            let new_value = entry.data.lock();
            log::debug!("shardmap: replaced key {:?}", String::from_utf8_lossy(&old_key));
            event::dispatch(snapshot, &old_key, Some(&old_value), Some(&new_value.value));
        } else {
            if chain.try_reserve(1).is_err() {
                log::error!(
                    "shardmap: allocation failed inserting key {:?}",
                    String::from_utf8_lossy(key)
                );
                return;
            }
            let entry = Arc::new(Entry::new(Bytes::copy_from_slice(key), value));
            chain.push(entry.clone());
            *self.count.lock() += 1;
            let snapshot = {
                let entry_notifiers = entry.notifiers.lock();
                let table_notifiers = self.notifiers.lock();
                event::snapshot_for(&entry_notifiers, &table_notifiers, Event::INSERTED)
            };
            drop(chain);
            let data = entry.data.lock();
            log::debug!("shardmap: inserted key {:?}", String::from_utf8_lossy(&data.key));
            event::dispatch(snapshot, &data.key, None, Some(&data.value));
        }
    }

    pub fn rm(&self, key: &[u8]) -> bool
    where
        D: Clone,
    {
        let idx = self.bucket_index(key);
        let bucket = &self.buckets[idx];
        let mut chain = bucket.chain.lock();

        let i = match Bucket::find(&chain, key) {
            Some(i) => i,
            None => return false,
        };
        let entry = chain[i].clone();
        let destroyed = entry.deref();
        if destroyed {
            chain.remove(i);
        }
        let snapshot = destroyed.then(|| self.destroy_snapshot(&entry));
        drop(chain);

        if let Some(snapshot) = snapshot {
            let data = entry.data.lock();
            event::dispatch(snapshot, &data.key, Some(&data.value), None);
        }
        *self.count.lock() -= 1;
        true
    }

    /// Build the `DELETED`/`FREE` snapshot for an entry whose refcount
    /// just reached zero. Takes a shared reference rather than owning
    /// the entry: other `Arc` clones of it (an iterator's outgoing
    /// pin, a caller's transient handle) may still be dropping around
    /// the same time, so destruction itself is left to `Drop` once the
    /// last clone goes away instead of forced here.
    fn destroy_snapshot(&self, entry: &Entry<V, D>) -> Vec<event::Dispatch<V, D>>
    where
        D: Clone,
    {
        let entry_notifiers = entry.notifiers.lock();
        let table_notifiers = self.notifiers.lock();
        event::snapshot_for(&entry_notifiers, &table_notifiers, Event::DELETED)
    }

    /// Deref an entry pinned by an iterator (spec.md §4.6 step 3):
    /// re-locks the entry's bucket, derefs, and if that destroys the
    /// entry, unlinks it and dispatches `DELETED`/`FREE` after
    /// releasing the bucket lock.
    ///
    /// Does not touch `count`: the global count is decremented exactly
    /// once, by whichever `rm`/`destroy` call logically removed the
    /// entry, regardless of whether that call or a later pin release
    /// is what physically destroys it (spec.md §9, Open Question 3).
    pub fn deref_pinned(&self, bucket_idx: usize, entry: &Arc<Entry<V, D>>)
    where
        D: Clone,
    {
        let bucket = &self.buckets[bucket_idx];
        let mut chain = bucket.chain.lock();
        let destroyed = entry.deref();
        if destroyed {
            if let Some(pos) = chain.iter().position(|e| Arc::ptr_eq(e, entry)) {
                chain.remove(pos);
            }
        }
        let snapshot = destroyed.then(|| self.destroy_snapshot(entry));
        drop(chain);
        if let Some(snapshot) = snapshot {
            let data = entry.data.lock();
            event::dispatch(snapshot, &data.key, Some(&data.value), None);
        }
    }

    pub fn notify_add(
        &self,
        key: Option<&[u8]>,
        events: Event,
        callback: Callback<V, D>,
        user_data: D,
    ) -> Result<(), MapError>
    where
        D: PartialEq,
    {
        let notifier = Notifier {
            events,
            callback,
            user_data,
        };
        let result = match key {
            Some(key) => {
                let idx = self.bucket_index(key);
                let chain = self.buckets[idx].chain.lock();
                match Bucket::find(&chain, key) {
                    Some(i) => {
                        let mut list = chain[i].notifiers.lock();
                        event::register(&mut list, notifier)
                    }
                    None => Err(MapError::NotFound),
                }
            }
            None => event::register(&mut self.notifiers.lock(), notifier),
        };
        if let Err(e) = result {
            log::warn!("shardmap: notify_add rejected: {}", crate::error::MapErrnoDisplay(&e));
        }
        result
    }

    pub fn notify_del(
        &self,
        key: Option<&[u8]>,
        events: Event,
        callback: &Callback<V, D>,
        compare_user_data: bool,
        user_data: &D,
    ) -> Result<(), MapError>
    where
        D: PartialEq,
    {
        let removed = match key {
            Some(key) => {
                let idx = self.bucket_index(key);
                let chain = self.buckets[idx].chain.lock();
                match Bucket::find(&chain, key) {
                    Some(i) => {
                        let mut list = chain[i].notifiers.lock();
                        event::deregister(&mut list, events, callback, compare_user_data, user_data)
                    }
                    None => return Err(MapError::NotFound),
                }
            }
            None => {
                let mut list = self.notifiers.lock();
                event::deregister(&mut list, events, callback, compare_user_data, user_data)
            }
        };
        if removed {
            Ok(())
        } else {
            Err(MapError::NotFound)
        }
    }

    pub fn buckets(&self) -> &[Bucket<V, D>] {
        &self.buckets
    }

    /// Destroy every live entry, firing `DELETED`/`FREE` notifications
    /// for each, then drop the table itself. Requires no outstanding
    /// iterator (spec.md §4.3) — an entry still pinned by one is left
    /// alive rather than force-destroyed.
    pub fn destroy(self)
    where
        D: Clone,
    {
        for (idx, bucket) in self.buckets.iter().enumerate() {
            loop {
                let mut chain = bucket.chain.lock();
                let entry = match chain.last().cloned() {
                    Some(e) => e,
                    None => break,
                };
                let destroyed = entry.deref();
                if !destroyed {
                    log::warn!(
                        "shardmap: destroy() found a still-pinned entry in bucket {idx}; leaving it alive"
                    );
                    break;
                }
                chain.pop();
                let snapshot = self.destroy_snapshot(&entry);
                drop(chain);
                *self.count.lock() -= 1;
                let data = entry.data.lock();
                event::dispatch(snapshot, &data.key, Some(&data.value), None);
            }
        }
        log::info!("shardmap: table destroyed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Barrier;

    #[test]
    fn get_on_empty_table_is_none() {
        let table: Table<u32, ()> = Table::new(8);
        assert_eq!(table.get(b"absent"), None);
        assert_eq!(table.count(), 0);
    }

    #[test]
    fn put_then_get_round_trips() {
        let table: Table<u32, ()> = Table::new(8);
        table.put(b"a", 1);
        assert_eq!(table.get(b"a"), Some(1));
        assert_eq!(table.count(), 1);
    }

    #[test]
    fn rm_of_absent_key_returns_false_and_does_not_touch_count() {
        let table: Table<u32, ()> = Table::new(8);
        table.put(b"a", 1);
        assert!(!table.rm(b"missing"));
        assert_eq!(table.count(), 1);
    }

    #[test]
    fn rm_then_get_is_none_and_a_second_rm_returns_false() {
        let table: Table<u32, ()> = Table::new(8);
        table.put(b"a", 1);
        assert!(table.rm(b"a"));
        assert_eq!(table.get(b"a"), None);
        assert!(!table.rm(b"a"));
        assert_eq!(table.count(), 0);
    }

    #[test]
    fn notify_add_with_unknown_key_is_rejected() {
        let table: Table<u32, ()> = Table::new(8);
        let cb: Callback<u32, ()> = Arc::new(|_, _, _, _, _| {});
        let err = table.notify_add(Some(b"missing"), Event::DELETED, cb, ()).unwrap_err();
        assert_eq!(err, MapError::NotFound);
    }

    #[test]
    fn concurrent_disjoint_key_puts_all_land() {
        let table: Arc<Table<u32, ()>> = Arc::new(Table::new(64));
        let barrier = Arc::new(Barrier::new(8));
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let table = table.clone();
                let barrier = barrier.clone();
                std::thread::spawn(move || {
                    barrier.wait();
                    for i in 0..100u32 {
                        let key = format!("t{t}-k{i}");
                        table.put(key.as_bytes(), t * 1000 + i);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(table.count(), 800);
        for t in 0..8u32 {
            for i in 0..100u32 {
                let key = format!("t{t}-k{i}");
                assert_eq!(table.get(key.as_bytes()), Some(t * 1000 + i));
            }
        }
    }

    #[test]
    fn concurrent_rm_of_disjoint_keys_each_fire_exactly_once() {
        let table: Arc<Table<u32, ()>> = Arc::new(Table::new(64));
        for i in 0..200u32 {
            table.put(format!("k{i}").as_bytes(), i);
        }
        let fired = Arc::new(AtomicUsize::new(0));
        let fired2 = fired.clone();
        table
            .notify_add(
                None,
                Event::DELETED,
                Arc::new(move |_, _, _, _, _| {
                    fired2.fetch_add(1, Ordering::SeqCst);
                }),
                (),
            )
            .unwrap();

        let barrier = Arc::new(Barrier::new(4));
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let table = table.clone();
                let barrier = barrier.clone();
                std::thread::spawn(move || {
                    barrier.wait();
                    for i in (t * 50)..(t * 50 + 50) {
                        assert!(table.rm(format!("k{i}").as_bytes()));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(table.count(), 0);
        assert_eq!(fired.load(Ordering::SeqCst), 200);
    }
}
