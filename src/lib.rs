//! cow-collections: single-threaded containers built on one shared idea:
//! keep values in storage the container owns outright, and share that
//! storage between copies only until someone writes.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: three containers, each small enough to reason about alone, where
//!   the upper ones reuse the lower ones unchanged.
//! - Layers:
//!   - SharedBlock<T>: one heap allocation holding a header (capacity,
//!     length, owner count) followed by the elements. Crate-private.
//!   - CowVec<T>: a vector stored as `Empty`, `Inline(T)` or
//!     `Shared(SharedBlock<T>)`. Clones share the block; mutation through a
//!     shared block first clones the live elements into a private one.
//!   - TreeSet<T>: an unbalanced binary search tree whose nodes live in a
//!     slotmap arena. Children and parents are referenced by generational
//!     key, so traversal needs no stack and stale positions never resolve.
//!   - ChainedHashSet<T, S>: a `CowVec` of `TreeSet` buckets, indexed by the
//!     low bits of a hash stored with every element.
//!
//! Constraints
//! - Single-threaded sharing: block owner counts are plain `Cell<usize>`, so
//!   `CowVec` and `ChainedHashSet` are `!Send`/`!Sync`. `TreeSet` owns no
//!   block and is as thread-safe as `T`.
//! - Duplicate inserts are not errors: they return the position of the
//!   element already present with `inserted == false`.
//! - Allocation failure surfaces as `AllocError` from the `try_*` methods;
//!   the infallible forms panic (capacity overflow) or call
//!   `handle_alloc_error`, like `Vec`.
//! - Out-of-range indices panic as slice indexing does.
//!
//! Failure guarantees
//! - CowVec growth, reserve, resize and copy-on-write divergence are
//!   all-or-nothing: a panicking `T::clone` or a failed allocation leaves the
//!   vector as it was and leaks nothing.
//! - ChainedHashSet rehash moves entries by their stored hash and never calls
//!   `Hash`, `Ord` or `Clone` while entries are between tables.
//!
//! Hasher and rehashing invariants
//! - Each hash set entry keeps the `u64` hash computed at insertion. Bucket
//!   counts are powers of two; an entry lives in bucket `hash & (n - 1)`.
//! - After doubling, every new bucket receives entries from exactly one old
//!   bucket in ascending order, so entries are appended as tree maxima with
//!   no comparisons.
//!
//! Notes and non-goals
//! - No tree balancing: sorted input builds a linear spine.
//! - No thread-safe variant; wrap in external synchronization or use
//!   separate copies per thread.
//! - No allocator parameter; blocks use the global allocator.
//!
//! Logging
//! - `log::trace!` on block allocation and copy-on-write divergence,
//!   `log::debug!` on rehash. The library never installs a logger.

pub mod chained_hash_set;
pub mod cow_vec;
mod shared_block;
pub mod tree_set;
mod tree_set_proptest;

// Public surface
pub use chained_hash_set::{ChainedHashSet, Config, ConfigError, HashPosition, ThresholdPolicy};
pub use cow_vec::{CowVec, StorageKind, DEFAULT_CAPACITY};
pub use shared_block::AllocError;
pub use tree_set::{Position, TreeSet};
