//! HashTable: the engine shared by the map and set adapters.

use crate::chain::Chain;
use crate::cursor::{Cursor, IntoIter, Iter, LocalCursor, LocalIter, Range};
use crate::error::TableError;
use crate::node::{Anchor, NodeKey};
use crate::policy::{Extract, Policy};
use crate::reentrancy::ReentrancyCheck;
use core::borrow::Borrow;
use core::fmt;
use core::hash::{BuildHasher, Hash};
use core::marker::PhantomData;
use hashbrown::hash_map::DefaultHashBuilder;

pub const DEFAULT_BUCKET_COUNT: usize = 16;
pub const DEFAULT_MAX_LOAD_FACTOR: f32 = 0.75;

/// Separately-chained hash table over elements `T`.
///
/// `X` extracts the key from an element, `P` selects unique or multi-key
/// behavior, and `S` builds the hasher. All elements live on one list in
/// which every bucket, and within it every run of equal keys, is
/// contiguous.
pub struct HashTable<T, X, P, S = DefaultHashBuilder> {
    hasher: S,
    chain: Chain<T>,
    max_load_factor: f32,
    reentrancy: ReentrancyCheck,
    _policy: PhantomData<fn() -> (X, P)>,
}

/// The run of elements equal to a looked-up key: first and last node.
#[derive(Copy, Clone)]
struct Run {
    first: NodeKey,
    tail: NodeKey,
}

impl<T, X, P> HashTable<T, X, P> {
    /// An empty table with 16 buckets.
    pub fn new() -> Self {
        Self::with_buckets(DEFAULT_BUCKET_COUNT)
    }

    /// An empty table with `bucket_count` buckets (at least one).
    pub fn with_buckets(bucket_count: usize) -> Self {
        Self::with_buckets_and_hasher(bucket_count, DefaultHashBuilder::default())
    }
}

impl<T, X, P, S: Default> Default for HashTable<T, X, P, S> {
    fn default() -> Self {
        Self::with_hasher(S::default())
    }
}

impl<T, X, P, S> HashTable<T, X, P, S> {
    pub fn with_hasher(hasher: S) -> Self {
        Self::with_buckets_and_hasher(DEFAULT_BUCKET_COUNT, hasher)
    }

    pub fn with_buckets_and_hasher(bucket_count: usize, hasher: S) -> Self {
        Self {
            hasher,
            chain: Chain::with_buckets(bucket_count),
            max_load_factor: DEFAULT_MAX_LOAD_FACTOR,
            reentrancy: ReentrancyCheck::new(),
            _policy: PhantomData,
        }
    }

    pub fn hasher(&self) -> &S {
        &self.hasher
    }

    pub fn len(&self) -> usize {
        self.chain.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chain.len() == 0
    }

    pub fn bucket_count(&self) -> usize {
        self.chain.bucket_count()
    }

    pub fn load_factor(&self) -> f32 {
        self.len() as f32 / self.bucket_count() as f32
    }

    pub fn max_load_factor(&self) -> f32 {
        self.max_load_factor
    }

    /// Set the growth threshold. Takes effect on the next insertion.
    pub fn set_max_load_factor(&mut self, max_load_factor: f32) -> Result<(), TableError> {
        if !(max_load_factor.is_finite() && max_load_factor > 0.0) {
            return Err(TableError::InvalidLoadFactor(max_load_factor));
        }
        self.max_load_factor = max_load_factor;
        Ok(())
    }

    // Global positions.

    pub fn begin(&self) -> Cursor {
        Cursor(self.chain.head)
    }

    pub fn end(&self) -> Cursor {
        Cursor::END
    }

    /// The position after `pos`; stale positions and the end advance to the end.
    pub fn advance(&self, pos: Cursor) -> Cursor {
        Cursor(
            pos.0
                .and_then(|k| self.chain.nodes.get(k))
                .and_then(|n| n.next),
        )
    }

    /// The element at `pos`, or `None` for the end or a stale position.
    pub fn element(&self, pos: Cursor) -> Option<&T> {
        pos.0
            .and_then(|k| self.chain.nodes.get(k))
            .map(|n| &n.value)
    }

    pub(crate) fn element_mut(&mut self, pos: Cursor) -> Option<&mut T> {
        pos.0
            .and_then(|k| self.chain.nodes.get_mut(k))
            .map(|n| &mut n.value)
    }

    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            chain: &self.chain,
            cur: self.chain.head,
            remaining: self.chain.len(),
        }
    }

    /// Iterate `[first, last)`.
    pub fn range(&self, first: Cursor, last: Cursor) -> Range<'_, T> {
        Range {
            chain: &self.chain,
            cur: first.0.filter(|&k| self.chain.nodes.contains_key(k)),
            last: last.0,
        }
    }

    // Bucket-local positions.

    fn check_bucket(&self, bucket: usize) -> Result<(), TableError> {
        if bucket < self.bucket_count() {
            Ok(())
        } else {
            Err(TableError::InvalidBucket {
                bucket,
                bucket_count: self.bucket_count(),
            })
        }
    }

    pub fn bucket_begin(&self, bucket: usize) -> Result<LocalCursor, TableError> {
        self.check_bucket(bucket)?;
        Ok(self
            .chain
            .local_cursor(self.chain.bucket_head(bucket), bucket))
    }

    pub fn bucket_end(&self, bucket: usize) -> Result<LocalCursor, TableError> {
        self.check_bucket(bucket)?;
        Ok(self.chain.local_cursor(None, bucket))
    }

    /// Step within the bucket, judged by the bucket count `pos` was created
    /// under.
    pub fn advance_local(&self, pos: LocalCursor) -> LocalCursor {
        self.chain.advance_local(pos)
    }

    pub fn element_local(&self, pos: LocalCursor) -> Option<&T> {
        self.element(pos.to_cursor())
    }

    pub fn bucket_iter(&self, bucket: usize) -> Result<LocalIter<'_, T>, TableError> {
        self.check_bucket(bucket)?;
        Ok(LocalIter {
            chain: &self.chain,
            cur: self.chain.bucket_head(bucket),
            bucket,
        })
    }

    pub fn bucket_size(&self, bucket: usize) -> Result<usize, TableError> {
        Ok(self.bucket_iter(bucket)?.count())
    }

    // Removal by position.

    /// Erase the element at `pos` and return the position that followed it.
    pub fn erase(&mut self, pos: Cursor) -> Result<Cursor, TableError> {
        let key = pos.0.ok_or(TableError::InvalidPosition)?;
        let node = self.chain.unlink(key).ok_or(TableError::InvalidPosition)?;
        Ok(Cursor(node.next))
    }

    /// Erase `[first, last)` and return `last`.
    ///
    /// The span is validated before anything is removed: if `last` cannot
    /// be reached from a live `first`, nothing changes.
    pub fn erase_range(&mut self, first: Cursor, last: Cursor) -> Result<Cursor, TableError> {
        let mut probe = first.0;
        while probe != last.0 {
            let key = probe.ok_or(TableError::InvalidPosition)?;
            probe = self
                .chain
                .nodes
                .get(key)
                .ok_or(TableError::InvalidPosition)?
                .next;
        }
        let mut cur = first;
        while cur != last {
            cur = self.erase(cur)?;
        }
        Ok(last)
    }

    /// Take the element at `pos` out of the table.
    pub fn remove(&mut self, pos: Cursor) -> Option<T> {
        pos.0
            .and_then(|k| self.chain.unlink(k))
            .map(|node| node.value)
    }

    /// Drop every element; the bucket count is kept.
    pub fn clear(&mut self) {
        self.chain.clear();
    }

    // Rehashing.

    fn rehash_target(&self, requested: usize) -> usize {
        let needed = (self.len() as f64 / f64::from(self.max_load_factor)).ceil() as usize;
        requested.max(needed).max(1)
    }

    fn rethread(&mut self, buckets: Vec<Option<Anchor>>) {
        log::trace!(
            "rehash: {} -> {} buckets, {} elements",
            self.bucket_count(),
            buckets.len(),
            self.len()
        );
        self.chain.rethread(buckets);
    }

    /// Rebuild the bucket index with at least `bucket_count` buckets, and
    /// never so few that the load factor would exceed its maximum.
    ///
    /// Global cursors survive; local cursors do not.
    pub fn rehash(&mut self, bucket_count: usize) {
        let target = self.rehash_target(bucket_count);
        self.rethread(vec![None; target]);
    }

    /// [`rehash`](Self::rehash), reporting a failed bucket index allocation
    /// instead of aborting. On failure the table is unchanged.
    pub fn try_rehash(&mut self, bucket_count: usize) -> Result<(), TableError> {
        let target = self.rehash_target(bucket_count);
        let mut buckets = Vec::new();
        buckets
            .try_reserve_exact(target)
            .map_err(|_| TableError::AllocationFailure { buckets: target })?;
        buckets.resize(target, None);
        self.rethread(buckets);
        Ok(())
    }

    fn buckets_for(&self, elements: usize) -> usize {
        (elements as f64 / f64::from(self.max_load_factor)).ceil() as usize
    }

    /// Make room for `elements` elements without exceeding the max load factor.
    pub fn reserve(&mut self, elements: usize) {
        self.rehash(self.buckets_for(elements));
    }

    pub fn try_reserve(&mut self, elements: usize) -> Result<(), TableError> {
        self.try_rehash(self.buckets_for(elements))
    }

    fn grow_if_needed(&mut self) {
        if self.load_factor() > self.max_load_factor {
            let doubled = self.bucket_count().saturating_mul(2);
            log::debug!(
                "load factor {:.3} over {:.3}, growing to {} buckets",
                self.load_factor(),
                self.max_load_factor,
                doubled
            );
            self.rehash(doubled);
        }
    }
}

impl<T, X, P, S> HashTable<T, X, P, S>
where
    X: Extract<T>,
    P: Policy,
    S: BuildHasher,
{
    /// Bucket-scan for `q`. Only this section runs user `Hash`/`Eq`.
    fn locate<Q>(&self, q: &Q) -> (u64, Option<Run>)
    where
        X::Key: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let _s = self.reentrancy.enter();
        let hash = self.hasher.hash_one(q);
        let matches = |key: NodeKey| {
            let node = &self.chain.nodes[key];
            node.hash == hash && X::key(&node.value).borrow() == q
        };

        let bucket = self.chain.bucket_for(hash);
        let bucket_count = self.chain.bucket_count();
        let mut cur = self.chain.bucket_head(bucket);
        while let Some(key) = cur {
            if matches(key) {
                let mut tail = key;
                if !P::UNIQUE {
                    while let Some(next) = self.chain.nodes[tail].next.filter(|&n| matches(n)) {
                        tail = next;
                    }
                }
                return (hash, Some(Run { first: key, tail }));
            }
            cur = self.chain.next_in_bucket(key, bucket, bucket_count);
        }
        (hash, None)
    }

    fn run_len(&self, run: Run) -> usize {
        let mut n = 1;
        let mut cur = run.first;
        while cur != run.tail {
            cur = match self.chain.nodes[cur].next {
                Some(next) => next,
                None => break,
            };
            n += 1;
        }
        n
    }

    // Insertion.

    /// Insert `value`.
    ///
    /// A unique table that already holds an equal key drops `value` and
    /// returns the existing position with `false`. A multi table appends
    /// `value` to the end of its key's run.
    pub fn emplace(&mut self, value: T) -> P::Emplaced {
        let (hash, run) = self.locate(X::key(&value));
        if P::UNIQUE {
            if let Some(run) = run {
                return P::emplaced(Cursor(Some(run.first)), false);
            }
        }

        let key = self.chain.allocate(hash, value);
        self.chain.thread(key, run.map(|r| r.tail));
        self.grow_if_needed();
        P::emplaced(Cursor(Some(key)), true)
    }

    pub fn emplace_with<F>(&mut self, make: F) -> P::Emplaced
    where
        F: FnOnce() -> T,
    {
        self.emplace(make())
    }

    /// Build the element with a fallible constructor. An `Err` leaves the
    /// table untouched.
    pub fn try_emplace_with<F, E>(&mut self, make: F) -> Result<P::Emplaced, E>
    where
        F: FnOnce() -> Result<T, E>,
    {
        let value = make()?;
        Ok(self.emplace(value))
    }

    pub fn insert(&mut self, value: T) -> P::Emplaced {
        self.emplace(value)
    }

    pub fn insert_iter<I>(&mut self, values: I)
    where
        I: IntoIterator<Item = T>,
    {
        for value in values {
            self.emplace(value);
        }
    }

    /// Move the elements of `other` into `self`.
    ///
    /// A unique table leaves behind, in `other`, every element whose key
    /// it already holds.
    pub fn merge<P2, S2>(&mut self, other: &mut HashTable<T, X, P2, S2>) {
        let mut cur = other.chain.head;
        while let Some(key) = cur {
            cur = other.chain.nodes[key].next;
            if P::UNIQUE && self.locate(X::key(&other.chain.nodes[key].value)).1.is_some() {
                continue;
            }
            if let Some(node) = other.chain.unlink(key) {
                self.emplace(node.value);
            }
        }
    }

    // Lookup.

    pub fn find<Q>(&self, q: &Q) -> Cursor
    where
        X::Key: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        Cursor(self.locate(q).1.map(|run| run.first))
    }

    pub fn contains<Q>(&self, q: &Q) -> bool
    where
        X::Key: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.locate(q).1.is_some()
    }

    pub fn count<Q>(&self, q: &Q) -> usize
    where
        X::Key: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.locate(q).1.map_or(0, |run| self.run_len(run))
    }

    /// `[first, last)` of the elements equal to `q`; `(end, end)` if none.
    pub fn equal_range<Q>(&self, q: &Q) -> (Cursor, Cursor)
    where
        X::Key: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        match self.locate(q).1 {
            Some(run) => (
                Cursor(Some(run.first)),
                Cursor(self.chain.nodes[run.tail].next),
            ),
            None => (Cursor::END, Cursor::END),
        }
    }

    /// Iterate the elements equal to `q`.
    pub fn get_all<Q>(&self, q: &Q) -> Range<'_, T>
    where
        X::Key: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let (first, last) = self.equal_range(q);
        self.range(first, last)
    }

    /// Index of the bucket `q` hashes to.
    pub fn bucket<Q>(&self, q: &Q) -> usize
    where
        X::Key: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let _s = self.reentrancy.enter();
        self.chain.bucket_for(self.hasher.hash_one(q))
    }

    // Removal by key.

    /// Erase every element equal to `q`; returns how many were removed.
    pub fn erase_key<Q>(&mut self, q: &Q) -> usize
    where
        X::Key: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let Some(run) = self.locate(q).1 else {
            return 0;
        };
        let stop = self.chain.nodes[run.tail].next;
        let mut cur = Some(run.first);
        let mut removed = 0;
        while let Some(key) = cur.filter(|&k| Some(k) != stop) {
            cur = self.chain.unlink(key).and_then(|node| node.next);
            removed += 1;
        }
        removed
    }

    /// Check every structural invariant, including key uniqueness and
    /// contiguity of equal keys.
    #[cfg(test)]
    pub(crate) fn check_invariants(&self) -> Result<(), String> {
        use std::collections::HashSet;

        self.chain.check()?;
        let mut closed: HashSet<&X::Key> = HashSet::new();
        let mut prev: Option<&X::Key> = None;
        for value in self.iter() {
            let key = X::key(value);
            if prev == Some(key) {
                if P::UNIQUE {
                    return Err("duplicate key in unique table".into());
                }
                continue;
            }
            if let Some(done) = prev {
                closed.insert(done);
            }
            if closed.contains(key) {
                return Err("equal keys are not contiguous".into());
            }
            prev = Some(key);
        }
        for node in self.chain.nodes.values() {
            if self.hasher.hash_one(X::key(&node.value)) != node.hash {
                return Err("cached hash differs from key hash".into());
            }
        }
        Ok(())
    }
}

impl<T, X, P, S> Extend<T> for HashTable<T, X, P, S>
where
    X: Extract<T>,
    P: Policy,
    S: BuildHasher,
{
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        self.insert_iter(iter);
    }
}

impl<T, X, P, S> FromIterator<T> for HashTable<T, X, P, S>
where
    X: Extract<T>,
    P: Policy,
    S: BuildHasher + Default,
{
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut table = Self::default();
        table.insert_iter(iter);
        table
    }
}

impl<T, X, P, S, const N: usize> From<[T; N]> for HashTable<T, X, P, S>
where
    X: Extract<T>,
    P: Policy,
    S: BuildHasher + Default,
{
    fn from(values: [T; N]) -> Self {
        values.into_iter().collect()
    }
}

impl<'a, T, X, P, S> IntoIterator for &'a HashTable<T, X, P, S> {
    type Item = &'a T;
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<T, X, P, S> IntoIterator for HashTable<T, X, P, S> {
    type Item = T;
    type IntoIter = IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        let cur = self.chain.head;
        IntoIter {
            chain: self.chain,
            cur,
        }
    }
}

impl<T: Clone, X, P, S: Clone> Clone for HashTable<T, X, P, S> {
    fn clone(&self) -> Self {
        Self {
            hasher: self.hasher.clone(),
            chain: self.chain.clone(),
            max_load_factor: self.max_load_factor,
            reentrancy: ReentrancyCheck::new(),
            _policy: PhantomData,
        }
    }
}

impl<T: fmt::Debug, X, P, S> fmt::Debug for HashTable<T, X, P, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::{First, Identity, Multi, Unique};
    use core::hash::{BuildHasherDefault, Hasher};
    use std::cell::Cell;

    type UniqueTable = HashTable<(&'static str, i32), First, Unique>;
    type MultiTable = HashTable<(&'static str, i32), First, Multi>;

    /// Sends every key to hash 0.
    #[derive(Default)]
    struct ZeroHasher;
    impl Hasher for ZeroHasher {
        fn write(&mut self, _bytes: &[u8]) {}
        fn finish(&self) -> u64 {
            0
        }
    }
    type Colliding = BuildHasherDefault<ZeroHasher>;

    /// Hashes a `u64` to itself so bucket placement is predictable.
    #[derive(Default)]
    struct IdentityHasher(u64);
    impl Hasher for IdentityHasher {
        fn write(&mut self, bytes: &[u8]) {
            for &b in bytes {
                self.0 = (self.0 << 8) | u64::from(b);
            }
        }
        fn write_u64(&mut self, n: u64) {
            self.0 = n;
        }
        fn finish(&self) -> u64 {
            self.0
        }
    }
    type Plain = BuildHasherDefault<IdentityHasher>;

    /// Invariant: duplicate keys are rejected by unique tables and the stored
    /// element is left as it was.
    #[test]
    fn unique_emplace_keeps_first_value() {
        let mut t = UniqueTable::new();
        let (first, inserted) = t.emplace(("a", 1));
        assert!(inserted);
        let (again, inserted) = t.emplace(("a", 2));
        assert!(!inserted);
        assert_eq!(again, first);
        assert_eq!(t.element(again), Some(&("a", 1)));
        assert_eq!(t.len(), 1);
        t.check_invariants().unwrap();
    }

    /// Invariant: multi tables keep equal keys in one run even when every key
    /// collides into the same bucket.
    #[test]
    fn multi_emplace_keeps_runs_contiguous_under_collisions() {
        let mut t: HashTable<(&str, i32), First, Multi, Colliding> = HashTable::default();
        let a1 = t.emplace(("a", 1));
        t.emplace(("b", 2));
        let a2 = t.emplace(("a", 2));
        assert_ne!(a1, a2);
        assert_eq!(t.len(), 3);
        let keys: Vec<&str> = t.iter().map(|(k, _)| *k).collect();
        assert!(keys == ["a", "a", "b"] || keys == ["b", "a", "a"], "{keys:?}");
        t.check_invariants().unwrap();
    }

    /// Invariant: a multi insert appended behind a run that closes its bucket
    /// re-anchors the bucket that follows.
    #[test]
    fn multi_insert_at_bucket_tail_keeps_next_bucket_reachable() {
        let mut t: HashTable<u64, Identity, Multi, Plain> =
            HashTable::with_buckets_and_hasher(8, Plain::default());
        t.emplace(1);
        t.emplace(2); // list: 2 1
        t.emplace(2); // list: 2 2 1; bucket 1 now anchored after the second 2
        assert_eq!(t.bucket_iter(1).unwrap().copied().collect::<Vec<_>>(), [1]);
        assert_eq!(t.bucket_size(2).unwrap(), 2);
        assert_eq!(t.count(&2), 2);
        t.check_invariants().unwrap();
    }

    /// Invariant: growth doubles the bucket count once the load factor passes
    /// the maximum, and nothing is lost.
    #[test]
    fn grows_when_load_factor_exceeded() {
        let mut t = UniqueTable::with_buckets(2);
        t.emplace(("a", 1));
        t.emplace(("b", 2));
        t.emplace(("c", 3));
        assert_eq!(t.bucket_count(), 4);
        for k in ["a", "b", "c"] {
            assert!(t.contains(k));
        }
        assert!(t.load_factor() <= t.max_load_factor());
        t.check_invariants().unwrap();
    }

    /// Invariant: rehash never goes below what the max load factor allows,
    /// and zero buckets are never produced.
    #[test]
    fn rehash_respects_load_factor_floor() {
        let mut t: HashTable<u64, Identity, Unique> = HashTable::new();
        t.insert_iter(0..30);
        t.rehash(1);
        assert_eq!(t.bucket_count(), 40);
        t.check_invariants().unwrap();
        t.clear();
        t.rehash(0);
        assert_eq!(t.bucket_count(), 1);
        t.check_invariants().unwrap();
    }

    /// Invariant: reserve sizes the index for the requested element count.
    #[test]
    fn reserve_avoids_growth() {
        let mut t: HashTable<u64, Identity, Unique> = HashTable::with_buckets(1);
        t.reserve(75);
        assert_eq!(t.bucket_count(), 100);
        t.insert_iter(0..75);
        assert_eq!(t.bucket_count(), 100);
        t.try_reserve(150).unwrap();
        assert_eq!(t.bucket_count(), 200);
        t.check_invariants().unwrap();
    }

    /// Invariant: an absurd bucket index request reports an allocation failure
    /// and leaves the table unchanged.
    #[test]
    fn try_rehash_reports_allocation_failure() {
        let mut t: HashTable<u64, Identity, Unique> = HashTable::new();
        t.insert_iter([1, 2, 3]);
        let err = t.try_rehash(usize::MAX).unwrap_err();
        assert_eq!(err, TableError::AllocationFailure { buckets: usize::MAX });
        assert_eq!(t.bucket_count(), DEFAULT_BUCKET_COUNT);
        assert_eq!(t.len(), 3);
        t.check_invariants().unwrap();
    }

    /// Invariant: global cursors survive a rehash.
    #[test]
    fn cursor_survives_rehash() {
        let mut t = UniqueTable::new();
        let (pos, _) = t.emplace(("k", 7));
        t.insert_iter((0..100).map(|i| (["x", "y", "z"][i % 3], i as i32)));
        t.rehash(257);
        assert_eq!(t.element(pos), Some(&("k", 7)));
    }

    /// Invariant: equal keys keep their insertion order through growth and
    /// explicit rehashes.
    #[test]
    fn rehash_keeps_order_within_runs() {
        let mut t: HashTable<(u64, u32), First, Multi, Plain> =
            HashTable::with_buckets_and_hasher(1, Plain::default());
        for i in 0..40u32 {
            t.emplace((u64::from(i % 5), i));
        }
        for n in [3, 64, 7] {
            t.rehash(n);
            for k in 0..5u64 {
                let run: Vec<u32> = t.get_all(&k).map(|(_, v)| *v).collect();
                assert!(run.windows(2).all(|w| w[0] < w[1]), "{run:?}");
                assert_eq!(run.len(), 8);
            }
            t.check_invariants().unwrap();
        }
    }

    /// Invariant: erase returns the successor and turns the erased cursor
    /// stale; erasing it again is an error.
    #[test]
    fn erase_returns_successor_and_rejects_stale() {
        let mut t = UniqueTable::new();
        t.insert_iter([("a", 1), ("b", 2), ("c", 3)]);
        let first = t.begin();
        let second = t.advance(first);
        assert_eq!(t.erase(first), Ok(second));
        assert_eq!(t.erase(first), Err(TableError::InvalidPosition));
        assert_eq!(t.erase(t.end()), Err(TableError::InvalidPosition));
        assert!(t.element(first).is_none());
        assert_eq!(t.len(), 2);
        t.check_invariants().unwrap();
    }

    /// Invariant: an unreachable range end is rejected before anything is erased.
    #[test]
    fn erase_range_validates_span_first() {
        let mut t = UniqueTable::new();
        t.insert_iter([("a", 1), ("b", 2), ("c", 3)]);
        let first = t.begin();
        let mid = t.advance(first);
        assert_eq!(t.erase_range(mid, first), Err(TableError::InvalidPosition));
        assert_eq!(t.len(), 3);
        assert_eq!(t.erase_range(first, mid), Ok(mid));
        assert_eq!(t.len(), 2);
        t.check_invariants().unwrap();
    }

    /// Invariant: erase by key removes the whole run in multi tables and at
    /// most one element in unique tables.
    #[test]
    fn erase_key_counts_removed() {
        let mut m = MultiTable::new();
        m.insert_iter([("a", 1), ("c", 1), ("c", 2), ("d", 1)]);
        assert_eq!(m.erase_key("c"), 2);
        assert_eq!(m.erase_key("c"), 0);
        assert_eq!(m.len(), 2);
        m.check_invariants().unwrap();

        let mut u = UniqueTable::new();
        u.insert_iter([("a", 1), ("b", 1)]);
        assert_eq!(u.erase_key("a"), 1);
        assert_eq!(u.erase_key("a"), 0);
        u.check_invariants().unwrap();
    }

    /// Invariant: a failing constructor leaves the table exactly as it was.
    #[test]
    fn try_emplace_failure_leaves_table_untouched() {
        let mut t = UniqueTable::with_buckets(2);
        t.emplace(("a", 1));
        let before: Vec<_> = t.iter().copied().collect();
        let res: Result<_, &str> = t.try_emplace_with(|| Err("boom"));
        assert_eq!(res, Err("boom"));
        assert_eq!(t.iter().copied().collect::<Vec<_>>(), before);
        assert_eq!(t.bucket_count(), 2);
        assert!(t.try_emplace_with(|| Ok::<_, ()>(("b", 2))).unwrap().1);
        t.check_invariants().unwrap();
    }

    /// Invariant: merging into a unique table leaves duplicates in the source.
    #[test]
    fn merge_into_unique_leaves_duplicates_behind() {
        let mut dst = UniqueTable::new();
        dst.emplace(("a", 1));
        let mut src = MultiTable::new();
        src.insert_iter([("a", 2), ("b", 3), ("b", 4)]);
        dst.merge(&mut src);
        assert_eq!(dst.len(), 2);
        assert_eq!(src.len(), 2);
        assert_eq!(src.count("a"), 1);
        assert_eq!(src.count("b"), 1);
        dst.check_invariants().unwrap();
        src.check_invariants().unwrap();
    }

    /// Invariant: merging into a multi table drains the source.
    #[test]
    fn merge_into_multi_takes_everything() {
        let mut dst = MultiTable::new();
        dst.emplace(("a", 1));
        let mut src = UniqueTable::new();
        src.emplace(("a", 2));
        dst.merge(&mut src);
        assert_eq!(dst.len(), 2);
        assert!(src.is_empty());
        assert_eq!(dst.iter().map(|(_, v)| v).sum::<i32>(), 3);
        dst.check_invariants().unwrap();
    }

    /// Invariant: an invalid max load factor is rejected and the old one kept.
    #[test]
    fn max_load_factor_validation() {
        let mut t: HashTable<u64, Identity, Unique> = HashTable::new();
        assert!(t.set_max_load_factor(0.0).is_err());
        assert!(t.set_max_load_factor(f32::NAN).is_err());
        assert!(t.set_max_load_factor(-1.0).is_err());
        assert_eq!(t.max_load_factor(), DEFAULT_MAX_LOAD_FACTOR);
        t.set_max_load_factor(2.0).unwrap();
        t.insert_iter(0..32);
        assert_eq!(t.bucket_count(), DEFAULT_BUCKET_COUNT);
        t.insert(32);
        assert_eq!(t.bucket_count(), 2 * DEFAULT_BUCKET_COUNT);
    }

    /// Invariant: bucket accessors reject indexes outside the bucket range.
    #[test]
    fn bucket_index_out_of_range() {
        let t = UniqueTable::with_buckets(3);
        let err = TableError::InvalidBucket {
            bucket: 3,
            bucket_count: 3,
        };
        assert_eq!(t.bucket_size(3), Err(err));
        assert_eq!(t.bucket_begin(3).unwrap_err(), err);
        assert!(t.bucket_iter(7).is_err());
        assert_eq!(t.bucket_size(2), Ok(0));
    }

    /// Invariant: a clone is structurally identical and independent.
    #[test]
    fn clone_is_independent() {
        let mut t = MultiTable::new();
        t.insert_iter([("a", 1), ("a", 2), ("b", 3)]);
        let mut c = t.clone();
        assert_eq!(
            c.iter().collect::<Vec<_>>(),
            t.iter().collect::<Vec<_>>()
        );
        c.erase_key("a");
        assert_eq!(t.count("a"), 2);
        assert_eq!(c.count("a"), 0);
        c.check_invariants().unwrap();
    }

    /// Invariant: lookups call `Hash` once per query and never mutate.
    #[test]
    fn find_does_not_mutate() {
        thread_local!(static HASHES: Cell<usize> = const { Cell::new(0) });
        #[derive(Default)]
        struct Counting(u64);
        impl Hasher for Counting {
            fn write(&mut self, bytes: &[u8]) {
                for &b in bytes {
                    self.0 = self.0.wrapping_mul(31).wrapping_add(u64::from(b));
                }
            }
            fn finish(&self) -> u64 {
                HASHES.with(|h| h.set(h.get() + 1));
                self.0
            }
        }
        let mut t: HashTable<u32, Identity, Unique, BuildHasherDefault<Counting>> =
            HashTable::default();
        t.insert_iter(0..20);
        let order: Vec<u32> = t.iter().copied().collect();
        let buckets = t.bucket_count();
        HASHES.with(|h| h.set(0));
        for k in 0..40 {
            let _ = t.find(&k);
        }
        assert_eq!(HASHES.with(Cell::get), 40);
        assert_eq!(t.iter().copied().collect::<Vec<_>>(), order);
        assert_eq!(t.bucket_count(), buckets);
        assert_eq!(t.len(), 20);
    }

    /// Invariant (debug-only): a key whose `Eq` reaches back into the table
    /// trips the reentrancy check.
    #[cfg(debug_assertions)]
    #[test]
    fn reentrant_eq_panics() {
        struct Sneaky {
            id: u8,
            table: *const HashTable<Sneaky, Identity, Unique, Colliding>,
        }
        impl PartialEq for Sneaky {
            fn eq(&self, other: &Self) -> bool {
                if !other.table.is_null() {
                    // SAFETY: the table outlives the lookup in this test.
                    let table = unsafe { &*other.table };
                    let _ = table.len();
                    let _ = table.bucket(&Sneaky {
                        id: 0,
                        table: core::ptr::null(),
                    });
                }
                self.id == other.id
            }
        }
        impl Eq for Sneaky {}
        impl Hash for Sneaky {
            fn hash<H: Hasher>(&self, state: &mut H) {
                self.id.hash(state);
            }
        }

        let mut t: HashTable<Sneaky, Identity, Unique, Colliding> = HashTable::default();
        t.emplace(Sneaky {
            id: 1,
            table: core::ptr::null(),
        });
        let probe = Sneaky {
            id: 2,
            table: &t as *const _,
        };
        let res = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| t.contains(&probe)));
        assert!(res.is_err(), "expected reentrancy to panic in debug builds");
    }
}
