//! open-table: a single-threaded associative map built on open addressing
//! with wrap-around linear probing.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: a small, fully observable hash table whose probing, deletion,
//!   and resizing behavior can be reasoned about slot by slot, with a
//!   fail-fast protocol for callers that interleave traversal and mutation.
//! - Pieces:
//!   - Entry<K, V>: an owned key/value pair with a mutable value; the
//!     storage cell for occupied slots.
//!   - OpenTable<K, V, S>: the table proper. A boxed slice of slots (empty,
//!     tombstone, or occupied), linear probing from `hash % capacity`,
//!     growth past a 3/4 load factor, owned snapshots, and a diagnostic
//!     dump of home-vs-actual slot placement.
//!   - Cursor: a detached, one-shot traversal that is handed the table at
//!     each step and fails with `ConcurrentModification` instead of
//!     observing a table mutated underneath it.
//!
//! Constraints
//! - Single-threaded, no interior mutability: shared references are
//!   read-only and all mutation goes through `&mut self`.
//! - Collisions resolve by linear probing that wraps modulo capacity; every
//!   probe loop is bounded by one full cycle of the array.
//! - Deletion leaves a tombstone so probe runs for colliding keys stay
//!   intact; inserts reuse the earliest tombstone on their path, and the
//!   table purges tombstones in place once they cover half the array.
//! - Capacity starts at 3 and grows by `2n + 1` (always odd, which spreads
//!   home slots under the naive modulus); it never shrinks.
//!
//! Fail-fast protocol
//! - Every mutating call bumps a per-table modification counter exactly
//!   once. A cursor captures the counter at creation and compares before
//!   each step; `Cursor::remove` is the one sanctioned mid-traversal
//!   mutation and re-captures the counter. Mismatches are returned as
//!   ordinary errors, never by aborting the process.
//!
//! Hasher and rehashing invariants
//! - Each occupied slot caches the key's `u64` hash and rehashing relocates
//!   entries from the cached value; `K: Hash` is never invoked after
//!   insertion, so resizing never calls back into user code.
//!
//! Notes and non-goals
//! - Absence of a key is expressed with `Option`, not errors; the only
//!   error conditions are storing an absent value (`put_opt(.., None)`) and
//!   the cursor's modification check.
//! - No concurrency: the table assumes exactly one logical owner. No
//!   persistence, no custom hash algorithm beyond delegating to the
//!   caller-supplied `BuildHasher` (default `RandomState`).
//! - Snapshots (`entries`/`keys`/`values`) are owned copies, not live
//!   views.

mod cursor;
mod entry;
mod open_table;
mod open_table_proptest;

pub use cursor::Cursor;
pub use entry::Entry;
pub use open_table::{Iter, IterMut, OpenTable, TableError};
