//! The notifier registry and snapshot/dispatch machinery (spec.md §4.5).
//!
//! Registrations are owned copies kept in per-entry and table-wide
//! lists; a mutation builds a *snapshot* of the observers it should
//! notify while still holding the bucket lock, then invokes the
//! snapshot after the lock is released. See [`snapshot_for`].

use std::fmt;
use std::sync::Arc;

bitflags::bitflags! {
    /// Event bits, numerically fixed by the facade contract (spec.md §6).
    #[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
    pub struct Event: u32 {
        const INSERTED  = 0b0_0001;
        const DELETED   = 0b0_0010;
        const REPLACED  = 0b0_0100;
        const FREE      = 0b0_1000;
        const RECURSIVE = 0b1_0000;
    }
}

/// `(events_fired, key, old_value, new_value, user_data)`.
pub type Callback<V, D> = Arc<dyn Fn(Event, &[u8], Option<&V>, Option<&V>, &D) + Send + Sync>;

/// A single notifier registration.
pub struct Notifier<V, D> {
    pub events: Event,
    pub callback: Callback<V, D>,
    pub user_data: D,
}

impl<V, D> Clone for Notifier<V, D>
where
    D: Clone,
{
    fn clone(&self) -> Self {
        Notifier {
            events: self.events,
            callback: self.callback.clone(),
            user_data: self.user_data.clone(),
        }
    }
}

impl<V, D> fmt::Debug for Notifier<V, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Notifier").field("events", &self.events).finish()
    }
}

impl<V, D> Notifier<V, D> {
    /// Identity used for duplicate-registration and deregistration matching.
    fn same_registration(&self, events: Event, callback: &Callback<V, D>) -> bool {
        self.events == events && Arc::ptr_eq(&self.callback, callback)
    }
}

/// Register `notifier` onto `list`, enforcing spec.md §4.5's rules:
/// a `FREE`-only registration must be unique on the list and is always
/// appended to the tail; anything else is rejected if the
/// `(events, callback, user_data)` tuple already exists, and otherwise
/// prepended to the head.
pub fn register<V, D>(
    list: &mut Vec<Notifier<V, D>>,
    notifier: Notifier<V, D>,
) -> Result<(), crate::error::MapError>
where
    D: PartialEq,
{
    let is_free_only = notifier.events == Event::FREE;

    for existing in list.iter() {
        if is_free_only && existing.events == Event::FREE {
            return Err(crate::error::MapError::AlreadyExists);
        }
        if existing.same_registration(notifier.events, &notifier.callback)
            && existing.user_data == notifier.user_data
        {
            return Err(crate::error::MapError::AlreadyExists);
        }
    }

    if list.try_reserve(1).is_err() {
        return Err(crate::error::MapError::OutOfMemory);
    }

    if is_free_only {
        list.push(notifier);
    } else {
        list.insert(0, notifier);
    }
    Ok(())
}

/// Remove every notifier on `list` matching `(events, callback)`,
/// filtered by user-data equality when `compare_user_data` is set.
/// Returns `true` if anything was removed.
pub fn deregister<V, D>(
    list: &mut Vec<Notifier<V, D>>,
    events: Event,
    callback: &Callback<V, D>,
    compare_user_data: bool,
    user_data: &D,
) -> bool
where
    D: PartialEq,
{
    let before = list.len();
    list.retain(|n| {
        let matches = n.same_registration(events, callback);
        if !matches {
            return true;
        }
        if compare_user_data {
            &n.user_data != user_data
        } else {
            false
        }
    });
    list.len() != before
}

/// A single `(event, notifier)` pair ready to invoke, with its own
/// `events` field pinned to the event it is firing for (spec.md's
/// "fresh copy... with its `events` field set to the current event").
pub struct Dispatch<V, D> {
    pub event: Event,
    pub notifier: Notifier<V, D>,
}

/// Build the snapshot for a mutation firing `event` against a given
/// entry's notifier list and the table-wide list.
///
/// For `DELETED`/`REPLACED`, any observer (entry-scoped or table-wide)
/// that separately registered `FREE` also contributes a `FREE`-tagged
/// copy — see DESIGN.md's Open Question 5 for why this crate also
/// honors entry-scoped `FREE` registrations, unlike the C source it is
/// grounded on.
pub fn snapshot_for<V, D>(
    entry_notifiers: &[Notifier<V, D>],
    table_notifiers: &[Notifier<V, D>],
    event: Event,
) -> Vec<Dispatch<V, D>>
where
    D: Clone,
{
    let mut out = Vec::new();
    for n in entry_notifiers.iter().chain(table_notifiers.iter()) {
        if n.events.intersects(event) {
            out.push(Dispatch {
                event,
                notifier: n.clone(),
            });
        }
    }
    if matches!(event, Event::DELETED | Event::REPLACED) {
        for n in entry_notifiers.iter().chain(table_notifiers.iter()) {
            if n.events.intersects(Event::FREE) {
                out.push(Dispatch {
                    event: Event::FREE,
                    notifier: n.clone(),
                });
            }
        }
    }
    out
}

/// Invoke a snapshot built by [`snapshot_for`]. Must be called with no
/// bucket or table lock held — callbacks may re-enter the map.
pub fn dispatch<V, D>(snapshot: Vec<Dispatch<V, D>>, key: &[u8], old: Option<&V>, new: Option<&V>) {
    for Dispatch { event, notifier } in snapshot {
        (notifier.callback)(event, key, old, new, &notifier.user_data);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn noop_callback<V>() -> Callback<V, ()> {
        Arc::new(|_, _, _, _, _| {})
    }

    #[test]
    fn free_only_registration_is_unique() {
        let mut list: Vec<Notifier<u32, ()>> = Vec::new();
        register(
            &mut list,
            Notifier {
                events: Event::FREE,
                callback: noop_callback(),
                user_data: (),
            },
        )
        .unwrap();
        let err = register(
            &mut list,
            Notifier {
                events: Event::FREE,
                callback: noop_callback(),
                user_data: (),
            },
        )
        .unwrap_err();
        assert_eq!(err, crate::error::MapError::AlreadyExists);
    }

    #[test]
    fn free_is_appended_others_prepended() {
        let mut list: Vec<Notifier<u32, ()>> = Vec::new();
        let cb_a = noop_callback();
        let cb_b = noop_callback();
        register(
            &mut list,
            Notifier {
                events: Event::INSERTED,
                callback: cb_a,
                user_data: (),
            },
        )
        .unwrap();
        register(
            &mut list,
            Notifier {
                events: Event::FREE,
                callback: cb_b.clone(),
                user_data: (),
            },
        )
        .unwrap();
        register(
            &mut list,
            Notifier {
                events: Event::DELETED,
                callback: cb_b,
                user_data: (),
            },
        )
        .unwrap();
        assert_eq!(list[0].events, Event::DELETED);
        assert_eq!(list[1].events, Event::INSERTED);
        assert_eq!(list[2].events, Event::FREE);
    }

    #[test]
    fn duplicate_non_free_registration_rejected() {
        let mut list: Vec<Notifier<u32, ()>> = Vec::new();
        let cb = noop_callback();
        register(
            &mut list,
            Notifier {
                events: Event::INSERTED,
                callback: cb.clone(),
                user_data: (),
            },
        )
        .unwrap();
        let err = register(
            &mut list,
            Notifier {
                events: Event::INSERTED,
                callback: cb,
                user_data: (),
            },
        )
        .unwrap_err();
        assert_eq!(err, crate::error::MapError::AlreadyExists);
    }

    #[test]
    fn deregister_removes_matching_and_reports_not_found_otherwise() {
        let mut list: Vec<Notifier<u32, ()>> = Vec::new();
        let cb = noop_callback();
        register(
            &mut list,
            Notifier {
                events: Event::DELETED,
                callback: cb.clone(),
                user_data: (),
            },
        )
        .unwrap();
        assert!(deregister(&mut list, Event::DELETED, &cb, false, &()));
        assert!(list.is_empty());
        assert!(!deregister(&mut list, Event::DELETED, &cb, false, &()));
    }

    #[test]
    fn snapshot_fires_free_for_entry_and_table_scope_on_replace() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls2 = calls.clone();
        let cb: Callback<u32, ()> = Arc::new(move |event, _, _, _, _| {
            if event == Event::FREE {
                calls2.fetch_add(1, Ordering::SeqCst);
            }
        });
        let entry_list = vec![Notifier {
            events: Event::FREE,
            callback: cb.clone(),
            user_data: (),
        }];
        let table_list = vec![Notifier {
            events: Event::FREE,
            callback: cb,
            user_data: (),
        }];
        let snapshot = snapshot_for(&entry_list, &table_list, Event::REPLACED);
        dispatch(snapshot, b"k", Some(&1), Some(&2));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn snapshot_does_not_synthesize_free_on_insert() {
        let table_list = vec![Notifier {
            events: Event::FREE,
            callback: noop_callback(),
            user_data: (),
        }];
        let snapshot: Vec<Dispatch<u32, ()>> = snapshot_for(&[], &table_list, Event::INSERTED);
        assert!(snapshot.is_empty());
    }
}
