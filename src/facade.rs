//! The operation set external callers see (spec.md §6): `put` / `get`
//! / `rm` / `count` / `iter_*` / `notify_add` / `notify_del` /
//! `destroy`, bound here to [`Table`].

use crate::config::Config;
use crate::error::MapError;
use crate::event::{Callback, Event};
use crate::iter::Iter;
use crate::table::Table;
use bytes::Bytes;
use std::sync::Arc;

/// The facade operation set, generic over the value type `V` and the
/// per-notifier user-data type `D` (`()` for callers with no use for
/// it, the common case).
pub trait Map<V, D = ()>
where
    D: Clone,
{
    fn put(&self, key: &[u8], value: V);
    fn get(&self, key: &[u8]) -> Option<V>
    where
        V: Clone;
    fn rm(&self, key: &[u8]) -> bool;
    fn count(&self) -> usize;
    fn iter(&self, prefix: Option<&[u8]>) -> Iter<'_, V, D>;
    fn notify_add(
        &self,
        key: Option<&[u8]>,
        events: Event,
        callback: Callback<V, D>,
        user_data: D,
    ) -> Result<(), MapError>
    where
        D: PartialEq;
    fn notify_del(
        &self,
        key: Option<&[u8]>,
        events: Event,
        callback: &Callback<V, D>,
        compare_user_data: bool,
        user_data: &D,
    ) -> Result<(), MapError>
    where
        D: PartialEq;
}

/// An `Arc`-backed handle onto a [`Table`]. Cloning the handle is
/// cheap and shares the underlying table, mirroring the
/// `Arc`-wrapped-clone pattern the teacher uses for its own per-index
/// database handles.
pub struct HashTableMap<V, D = ()>
where
    D: Clone,
{
    inner: Arc<Table<V, D>>,
}

impl<V, D> Clone for HashTableMap<V, D>
where
    D: Clone,
{
    fn clone(&self) -> Self {
        HashTableMap {
            inner: self.inner.clone(),
        }
    }
}

impl<V, D> HashTableMap<V, D>
where
    D: Clone,
{
    /// `max_size` is a hint, sizing the bucket array to
    /// `2^max(3, ceil(log2(max_size)))` (spec.md §6).
    pub fn new(max_size: usize) -> Self {
        HashTableMap {
            inner: Arc::new(Table::new(max_size)),
        }
    }

    pub fn with_config(config: &Config) -> Self {
        Self::new(config.max_size)
    }

    pub fn order(&self) -> u32 {
        self.inner.order()
    }

    pub fn bucket_count(&self) -> usize {
        self.inner.bucket_count()
    }

    /// Destroy the table: fires `DELETED`/`FREE` for every live entry,
    /// then drops the backing storage. Requires no outstanding
    /// iterator and no other clone of this handle still reachable by
    /// other threads (spec.md §4.3).
    pub fn destroy(self) {
        match Arc::try_unwrap(self.inner) {
            Ok(table) => table.destroy(),
            Err(_) => log::warn!(
                "shardmap: destroy() called while other HashTableMap handles are still alive; \
                 the table was not torn down"
            ),
        }
    }
}

impl<V, D> Map<V, D> for HashTableMap<V, D>
where
    D: Clone,
{
    fn put(&self, key: &[u8], value: V) {
        self.inner.put(key, value);
    }

    fn get(&self, key: &[u8]) -> Option<V>
    where
        V: Clone,
    {
        self.inner.get(key)
    }

    fn rm(&self, key: &[u8]) -> bool {
        self.inner.rm(key)
    }

    fn count(&self) -> usize {
        self.inner.count()
    }

    fn iter(&self, prefix: Option<&[u8]>) -> Iter<'_, V, D> {
        Iter::new(&self.inner, prefix)
    }

    fn notify_add(
        &self,
        key: Option<&[u8]>,
        events: Event,
        callback: Callback<V, D>,
        user_data: D,
    ) -> Result<(), MapError>
    where
        D: PartialEq,
    {
        self.inner.notify_add(key, events, callback, user_data)
    }

    fn notify_del(
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
        self.inner
            .notify_del(key, events, callback, compare_user_data, user_data)
    }
}

/// Convenience re-export for callers that want the key type spelled
/// out without reaching into `bytes` themselves.
pub type Key = Bytes;
