//! Debug-only detection of reentrant table access.
//!
//! Lookups call user `Hash` and `Eq` implementations while walking a
//! bucket. A key whose `Eq` reaches back into the same table would see it
//! mid-walk, so every such section is bracketed with
//! `let _s = self.reentrancy.enter();`. Release builds keep only the
//! zero-sized marker.

use core::cell::Cell;
use core::marker::PhantomData;

#[derive(Debug, Default)]
pub(crate) struct ReentrancyCheck {
    #[cfg(debug_assertions)]
    active: Cell<bool>,
    // Same auto traits in every profile: `Send`, never `Sync`.
    _not_sync: PhantomData<Cell<()>>,
}

impl ReentrancyCheck {
    pub(crate) const fn new() -> Self {
        Self {
            #[cfg(debug_assertions)]
            active: Cell::new(false),
            _not_sync: PhantomData,
        }
    }

    /// Open a section that may run user code. Panics in debug builds if a
    /// section on the same table is already open.
    #[inline]
    pub(crate) fn enter(&self) -> Section<'_> {
        #[cfg(debug_assertions)]
        {
            assert!(
                !self.active.replace(true),
                "reentrant access to a hash table from its own Hash or Eq"
            );
            Section { owner: self }
        }

        #[cfg(not(debug_assertions))]
        {
            Section { _owner: PhantomData }
        }
    }
}

impl Clone for ReentrancyCheck {
    fn clone(&self) -> Self {
        Self::new()
    }
}

/// RAII scope returned by [`ReentrancyCheck::enter`].
pub(crate) struct Section<'a> {
    #[cfg(debug_assertions)]
    owner: &'a ReentrancyCheck,
    #[cfg(not(debug_assertions))]
    _owner: PhantomData<&'a ReentrancyCheck>,
}

impl Drop for Section<'_> {
    fn drop(&mut self) {
        #[cfg(debug_assertions)]
        self.owner.active.set(false);
    }
}
