//! Map and set adapters over [`HashTable`].
//!
//! The adapters are instantiations of the engine; maps get a few extra
//! keyed accessors on top. Keys are never handed out mutably.

use crate::cursor::Cursor;
use crate::error::TableError;
use crate::hash_table::HashTable;
use crate::policy::{First, Identity, Multi, Policy, Unique};
use core::borrow::Borrow;
use core::hash::{BuildHasher, Hash};
use hashbrown::hash_map::DefaultHashBuilder;

pub type UnorderedMap<K, V, S = DefaultHashBuilder> = HashTable<(K, V), First, Unique, S>;
pub type UnorderedMultiMap<K, V, S = DefaultHashBuilder> = HashTable<(K, V), First, Multi, S>;
pub type UnorderedSet<T, S = DefaultHashBuilder> = HashTable<T, Identity, Unique, S>;
pub type UnorderedMultiSet<T, S = DefaultHashBuilder> = HashTable<T, Identity, Multi, S>;

impl<K, V, P, S> HashTable<(K, V), First, P, S>
where
    K: Hash + Eq,
    P: Policy,
    S: BuildHasher,
{
    /// The value stored under `q`; for multi maps, the first of its run.
    pub fn get<Q>(&self, q: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.element(self.find(q)).map(|(_, v)| v)
    }

    pub fn get_mut<Q>(&mut self, q: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let pos = self.find(q);
        self.value_mut(pos)
    }

    /// Like [`get`](Self::get), but an absent key is an error.
    pub fn at<Q>(&self, q: &Q) -> Result<&V, TableError>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.get(q).ok_or(TableError::KeyNotFound)
    }

    pub fn at_mut<Q>(&mut self, q: &Q) -> Result<&mut V, TableError>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.get_mut(q).ok_or(TableError::KeyNotFound)
    }

    /// Mutable access to the value at `pos`.
    pub fn value_mut(&mut self, pos: Cursor) -> Option<&mut V> {
        self.element_mut(pos).map(|(_, v)| v)
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> + '_ {
        self.iter().map(|(k, _)| k)
    }

    pub fn values(&self) -> impl Iterator<Item = &V> + '_ {
        self.iter().map(|(_, v)| v)
    }
}

impl<K, V, S> HashTable<(K, V), First, Unique, S>
where
    K: Hash + Eq,
    S: BuildHasher,
{
    /// The value under `key`, inserting `make()` first if it is absent.
    /// `make` only runs on insertion.
    pub fn get_or_insert_with<F>(&mut self, key: K, make: F) -> &mut V
    where
        F: FnOnce() -> V,
    {
        let found = self.find(&key);
        let pos = if found.is_end() {
            self.emplace((key, make())).0
        } else {
            found
        };
        self.value_mut(pos)
            .expect("position must be live right after lookup or insert")
    }

    /// The value under `key`, inserting `V::default()` if it is absent.
    pub fn get_or_insert_default(&mut self, key: K) -> &mut V
    where
        V: Default,
    {
        self.get_or_insert_with(key, V::default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    /// Invariant: `at` reports absent keys as `KeyNotFound` and `at_mut`
    /// edits are visible to later reads.
    #[test]
    fn at_and_at_mut() {
        let mut m: UnorderedMap<String, i32> = UnorderedMap::new();
        m.insert(("a".to_string(), 1));
        assert_eq!(m.at("a"), Ok(&1));
        assert_eq!(m.at("zz"), Err(TableError::KeyNotFound));
        *m.at_mut("a").unwrap() += 10;
        assert_eq!(m.get("a"), Some(&11));
        assert_eq!(m.at_mut("zz").unwrap_err(), TableError::KeyNotFound);
    }

    /// Invariant: the index-style accessor inserts a default exactly once and
    /// the closure variant is lazy.
    #[test]
    fn get_or_insert_is_lazy() {
        let mut m: UnorderedMap<&str, Vec<i32>> = UnorderedMap::new();
        m.get_or_insert_default("a").push(1);
        m.get_or_insert_default("a").push(2);
        assert_eq!(m.get("a"), Some(&vec![1, 2]));
        assert_eq!(m.len(), 1);

        let calls = Cell::new(0);
        let make = || {
            calls.set(calls.get() + 1);
            vec![9]
        };
        m.get_or_insert_with("a", make);
        assert_eq!(calls.get(), 0);
        m.get_or_insert_with("b", || {
            calls.set(calls.get() + 1);
            vec![9]
        });
        assert_eq!(calls.get(), 1);
        assert_eq!(m.get("b"), Some(&vec![9]));
    }

    /// Invariant: `get` on a multi map returns the first value of the key's run.
    #[test]
    fn multi_map_get_returns_run_head() {
        let mut m: UnorderedMultiMap<&str, i32> = UnorderedMultiMap::new();
        m.insert(("a", 1));
        m.insert(("a", 2));
        m.insert(("b", 3));
        assert_eq!(m.get("a"), Some(&1));
        let mut all: Vec<i32> = m.get_all("a").map(|(_, v)| *v).collect();
        all.sort_unstable();
        assert_eq!(all, [1, 2]);
    }

    /// Invariant: keys and values walk the same order as `iter`.
    #[test]
    fn keys_and_values_follow_iteration_order() {
        let m: UnorderedMap<u8, char> = [(1, 'a'), (2, 'b'), (3, 'c')].into();
        let pairs: Vec<(u8, char)> = m.iter().copied().collect();
        let keys: Vec<u8> = pairs.iter().map(|p| p.0).collect();
        let values: Vec<char> = pairs.iter().map(|p| p.1).collect();
        assert_eq!(m.keys().copied().collect::<Vec<_>>(), keys);
        assert_eq!(m.values().copied().collect::<Vec<_>>(), values);
    }
}
