//! chain-hashtable: a separately-chained hash table engine with unique and
//! multi-key policies, bucket-local iteration and incremental growth.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: one engine, [`HashTable`], behind map, multimap, set and
//!   multiset adapters, with amortized O(1) insert, lookup and erase.
//! - Layers:
//!   - `Chain<T>`: node arena, global list and bucket index. Purely
//!     structural; works from cached hashes and never calls user code.
//!   - `HashTable<T, X, P, S>`: hashing, key comparison, uniqueness
//!     policy and growth on top of the chain.
//!   - Adapters: type aliases plus keyed accessors for maps.
//!
//! Layout
//! - Every element lives in a node stored in a `slotmap::SlotMap` and
//!   linked into one global list that starts at a `BeforeBegin` sentinel.
//! - Nodes of one bucket are contiguous in the list. Per bucket, the index
//!   stores the position *preceding* the bucket's first node, or nothing
//!   when the bucket is empty.
//! - Equal keys are contiguous too: a multi insert lands right behind the
//!   last element of its key's run.
//! - Nodes also keep a back link, so erasing by position is O(1) without
//!   scanning the bucket for the predecessor.
//!
//! Positions
//! - [`Cursor`] is a generational node key (past-the-end is `None`). It
//!   survives rehashing, and a cursor to an erased element never resolves
//!   to a different element later stored in the same slot.
//! - [`LocalCursor`] remembers its bucket and the bucket count it was made
//!   under; it ends where the list leaves the bucket. Rehashing invalidates
//!   it.
//!
//! Growth
//! - After an insertion pushes `len / bucket_count` above the max load
//!   factor (0.75 by default), the bucket count doubles. `rehash(n)` never
//!   picks fewer buckets than the load factor needs.
//! - Rehashing replays the existing list into a fresh index in its current
//!   order. Keys are not hashed again.
//!
//! Reentrancy
//! - User `Hash`/`Eq` only run inside lookup sections guarded by a
//!   debug-only reentrancy check. A key that reaches back into its own
//!   table from `Eq` panics in debug builds.
//!
//! Notes and non-goals
//! - Single-threaded: the table is `Send` when its contents are, never
//!   `Sync`.
//! - No open addressing and no custom allocator support.
//! - Failing element construction (`try_emplace_with`) leaves the table
//!   untouched.

mod chain;
mod cursor;
mod error;
mod hash_table;
mod hash_table_proptest;
mod map;
mod node;
mod policy;
mod reentrancy;

// Public surface
pub use cursor::{Cursor, IntoIter, Iter, LocalCursor, LocalIter, Range};
pub use error::TableError;
pub use hash_table::{HashTable, DEFAULT_BUCKET_COUNT, DEFAULT_MAX_LOAD_FACTOR};
pub use map::{UnorderedMap, UnorderedMultiMap, UnorderedMultiSet, UnorderedSet};
pub use policy::{Extract, First, Identity, Multi, Policy, Unique};
