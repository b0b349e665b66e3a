//! Compile-time table policies: key uniqueness and key extraction.

use crate::cursor::Cursor;
use core::hash::Hash;

mod sealed {
    pub trait Sealed {}
    impl Sealed for super::Unique {}
    impl Sealed for super::Multi {}
}

/// Uniqueness policy of a [`HashTable`](crate::HashTable).
///
/// Both policies share one engine; the choice is resolved at compile time.
pub trait Policy: sealed::Sealed {
    /// Whether equal keys are rejected.
    const UNIQUE: bool;

    /// What `emplace` returns: `(Cursor, bool)` for unique tables, a bare
    /// `Cursor` for multi tables.
    type Emplaced;

    #[doc(hidden)]
    fn emplaced(pos: Cursor, inserted: bool) -> Self::Emplaced;
}

/// At most one element per key.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct Unique;

/// Any number of elements per key, stored as one contiguous run.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct Multi;

impl Policy for Unique {
    const UNIQUE: bool = true;
    type Emplaced = (Cursor, bool);

    #[inline]
    fn emplaced(pos: Cursor, inserted: bool) -> Self::Emplaced {
        (pos, inserted)
    }
}

impl Policy for Multi {
    const UNIQUE: bool = false;
    type Emplaced = Cursor;

    #[inline]
    fn emplaced(pos: Cursor, inserted: bool) -> Self::Emplaced {
        debug_assert!(inserted);
        pos
    }
}

/// Pulls the lookup key out of a stored element.
pub trait Extract<T> {
    type Key: Hash + Eq;

    fn key(value: &T) -> &Self::Key;
}

/// The element is its own key (sets).
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct Identity;

/// The key is the first half of a `(key, value)` pair (maps).
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct First;

impl<T: Hash + Eq> Extract<T> for Identity {
    type Key = T;

    #[inline]
    fn key(value: &T) -> &T {
        value
    }
}

impl<K: Hash + Eq, V> Extract<(K, V)> for First {
    type Key = K;

    #[inline]
    fn key(value: &(K, V)) -> &K {
        &value.0
    }
}
