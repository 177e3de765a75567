//! A concurrent, observable associative map with fine-grained
//! per-bucket locking, refcounted entries, and a notifier subsystem
//! for INSERTED/DELETED/REPLACED/FREE events.
//!
//! The public surface is the [`Map`] trait, implemented by
//! [`HashTableMap`]. See `SPEC_FULL.md` in the repository root for the
//! full contract.

mod bucket;
mod config;
mod entry;
mod error;
mod event;
mod facade;
mod hash;
mod iter;
mod table;

pub use config::Config;
pub use error::MapError;
pub use event::{Callback, Event};
pub use facade::{HashTableMap, Key, Map};
pub use iter::Iter;
