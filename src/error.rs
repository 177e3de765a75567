//! Error taxonomy for the map's fallible operations (spec.md §6/§7).

use std::fmt;

/// Outcomes `notify_add`/`notify_del` and allocation sites can report.
///
/// Variant names mirror the POSIX symbols the facade contract is
/// defined against; [`MapError::as_errno`] gives callers the raw
/// negative integer for an FFI-style boundary.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapError {
    #[error("key not found")]
    NotFound,
    #[error("notifier already exists")]
    AlreadyExists,
    #[error("allocation failed")]
    OutOfMemory,
}

impl MapError {
    /// The negative `errno`-style value spec.md §6 assigns this outcome.
    pub fn as_errno(self) -> i32 {
        match self {
            MapError::NotFound => -ENOENT,
            MapError::AlreadyExists => -EEXIST,
            MapError::OutOfMemory => -ENOMEM,
        }
    }
}

// Standard POSIX values. Kept as plain constants rather than a `libc`
// dependency since this crate only needs the three integers, not FFI
// bindings.
const ENOENT: i32 = 2;
const EEXIST: i32 = 17;
const ENOMEM: i32 = 12;

impl fmt::Display for MapErrnoDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.0, self.0.as_errno())
    }
}

/// Helper for logging a [`MapError`] alongside its errno value.
pub struct MapErrnoDisplay<'a>(pub &'a MapError);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errno_values_match_posix() {
        assert_eq!(MapError::NotFound.as_errno(), -2);
        assert_eq!(MapError::AlreadyExists.as_errno(), -17);
        assert_eq!(MapError::OutOfMemory.as_errno(), -12);
    }
}
