//! Pinned-cursor traversal across buckets (spec.md §4.6).

use crate::entry::Entry;
use crate::table::Table;
use bytes::Bytes;
use std::sync::Arc;

/// A cursor over a [`Table`]'s entries.
///
/// `iter_create`'s `prefix` argument (spec.md §6) is accepted by
/// [`Iter::new`] for facade-contract compatibility and deliberately
/// unused (spec.md §9, Open Question 1) — this implementation is
/// hash-backed, not trie-backed, and has nothing to prefix-match on.
pub struct Iter<'a, V, D>
where
    D: Clone,
{
    table: &'a Table<V, D>,
    bucket: usize,
    pinned: Option<(usize, Arc<Entry<V, D>>)>,
}

impl<'a, V, D> Iter<'a, V, D>
where
    D: Clone,
{
    pub fn new(table: &'a Table<V, D>, _prefix: Option<&[u8]>) -> Self {
        Iter {
            table,
            bucket: 0,
            pinned: None,
        }
    }

    /// Advance the cursor. Publishes the new pin (if any) before
    /// dereffing the previous one, so a concurrent destroyer of the
    /// just-vacated entry can't race the pin of its successor
    /// (spec.md §4.6 steps 2–3).
    pub fn next(&mut self) -> Option<(Bytes, V)>
    where
        V: Clone,
    {
        let prev = self.pinned.take();
        let mut found = None;

        for b in self.bucket..self.table.buckets().len() {
            let chain = self.table.buckets()[b].chain.lock();
            let resume_from = match &prev {
                Some((pb, pe)) if *pb == b => chain
                    .iter()
                    .position(|e| Arc::ptr_eq(e, pe))
                    .map(|i| i + 1)
                    .unwrap_or(0),
                _ => 0,
            };
            let hit = chain
                .iter()
                .skip(resume_from)
                .find(|e| e.refcount() > 0)
                .cloned();
            if let Some(entry) = hit {
                entry.pin();
                let data = entry.data.lock();
                found = Some((b, entry.clone(), data.key.clone(), data.value.clone()));
            }
            drop(chain);
            if found.is_some() {
                break;
            }
        }

        if let Some((pb, pe)) = prev {
            self.table.deref_pinned(pb, &pe);
        }

        match found {
            Some((b, entry, key, value)) => {
                self.bucket = b;
                self.pinned = Some((b, entry));
                Some((key, value))
            }
            None => None,
        }
    }
}

impl<V, D> Drop for Iter<'_, V, D>
where
    D: Clone,
{
    fn drop(&mut self) {
        if let Some((bucket, entry)) = self.pinned.take() {
            self.table.deref_pinned(bucket, &entry);
        }
    }
}
