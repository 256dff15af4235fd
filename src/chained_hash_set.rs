//! ChainedHashSet: a power-of-two array of `TreeSet` buckets.
//!
//! Each element is stored next to the `u64` hash computed when it was
//! inserted. Lookups hash the key once, pick bucket `hash & (n - 1)` and
//! search that bucket's tree with `Ord`. Growth doubles the bucket count and
//! moves every entry by its stored hash, appending to the destination tree as
//! its new maximum. No `Hash`, `Ord` or `Clone` implementation runs while
//! entries are in flight, so a rehash cannot lose or duplicate elements.
//!
//! The bucket array is a `CowVec`, so cloning a set shares it until either
//! side mutates.

use crate::cow_vec::CowVec;
use crate::shared_block::AllocError;
use crate::tree_set::{self, Position, TreeSet};
use core::borrow::Borrow;
use core::cmp::Ordering;
use core::fmt;
use core::hash::{BuildHasher, Hash};
use core::iter::FusedIterator;
use core::mem;
use hashbrown::hash_map::DefaultHashBuilder;
use log::debug;
use thiserror::Error;

/// How the resize threshold moves when the bucket array doubles.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub enum ThresholdPolicy {
    /// Threshold is `bucket_count * load_factor`, recomputed after every
    /// resize.
    #[default]
    Recompute,
    /// Threshold is the previous threshold scaled by `2 * load_factor`, so
    /// the headroom relative to bucket count shrinks with every resize.
    /// Needs a load factor above 0.5 or the threshold would never rise.
    Compounding,
}

impl ThresholdPolicy {
    fn after_grow(self, load_factor: f32, previous: usize, buckets: usize) -> usize {
        match self {
            ThresholdPolicy::Recompute => scaled(buckets, load_factor),
            ThresholdPolicy::Compounding => scaled(previous.saturating_mul(2), load_factor),
        }
    }
}

fn scaled(n: usize, load_factor: f32) -> usize {
    (n as f64 * f64::from(load_factor)) as usize
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Config {
    /// Initial bucket count is `1 << bucket_pow`; `clear` returns to it.
    pub bucket_pow: u32,
    /// Ratio of elements to buckets at which the table grows.
    pub load_factor: f32,
    pub threshold_policy: ThresholdPolicy,
}

impl Config {
    pub const DEFAULT_BUCKET_POW: u32 = 4;
    pub const DEFAULT_LOAD_FACTOR: f32 = 0.75;

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.load_factor.is_finite() && self.load_factor > 0.0) {
            return Err(ConfigError::InvalidLoadFactor(self.load_factor));
        }
        if self.bucket_pow >= usize::BITS - 1 {
            return Err(ConfigError::BucketPowTooLarge(self.bucket_pow));
        }
        if self.threshold_policy == ThresholdPolicy::Compounding && self.load_factor <= 0.5 {
            return Err(ConfigError::CompoundingWithoutGrowth(self.load_factor));
        }
        Ok(())
    }

    fn initial_buckets(&self) -> usize {
        1 << self.bucket_pow
    }
}

/// Smallest power of two covering `hint`, capped at the largest bucket
/// power `validate` accepts.
fn bucket_pow_for(hint: usize) -> u32 {
    let max = usize::BITS - 2;
    hint.max(1)
        .checked_next_power_of_two()
        .map_or(max, |n| n.trailing_zeros().min(max))
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bucket_pow: Self::DEFAULT_BUCKET_POW,
            load_factor: Self::DEFAULT_LOAD_FACTOR,
            threshold_policy: ThresholdPolicy::Recompute,
        }
    }
}

#[derive(Error, Clone, Copy, Debug, PartialEq)]
pub enum ConfigError {
    #[error("load factor must be finite and positive, got {0}")]
    InvalidLoadFactor(f32),
    #[error("bucket power {0} leaves no room to grow")]
    BucketPowTooLarge(u32),
    #[error("compounding threshold needs a load factor above 0.5, got {0}")]
    CompoundingWithoutGrowth(f32),
}

/// Element plus the hash it was placed with. Ordered by value only.
#[derive(Clone, Debug)]
struct Hashed<T> {
    hash: u64,
    value: T,
}

impl<T: PartialEq> PartialEq for Hashed<T> {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl<T: Eq> Eq for Hashed<T> {}

impl<T: PartialOrd> PartialOrd for Hashed<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.value.partial_cmp(&other.value)
    }
}

impl<T: Ord> Ord for Hashed<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.value.cmp(&other.value)
    }
}

/// Location of an element: bucket index plus position inside that bucket.
///
/// Positions survive removals of other elements and copy-on-write
/// divergence, but not a rehash.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct HashPosition {
    bucket: usize,
    node: Position,
}

impl HashPosition {
    pub fn bucket(&self) -> usize {
        self.bucket
    }
}

pub struct ChainedHashSet<T, S = DefaultHashBuilder> {
    buckets: CowVec<TreeSet<Hashed<T>>>,
    len: usize,
    threshold: usize,
    config: Config,
    hasher: S,
}

impl<T: Clone> ChainedHashSet<T> {
    pub fn new() -> Self {
        Self::with_hasher(DefaultHashBuilder::default())
    }

    /// Start with at least `buckets` buckets, rounded up to a power of two.
    pub fn with_buckets(buckets: usize) -> Self {
        let config = Config {
            bucket_pow: bucket_pow_for(buckets),
            ..Config::default()
        };
        Self::build(config, DefaultHashBuilder::default())
    }

    pub fn with_config(config: Config) -> Result<Self, ConfigError> {
        Self::with_config_and_hasher(config, DefaultHashBuilder::default())
    }
}

impl<T: Clone, S> ChainedHashSet<T, S> {
    pub fn with_hasher(hasher: S) -> Self {
        Self::build(Config::default(), hasher)
    }

    pub fn with_config_and_hasher(config: Config, hasher: S) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::build(config, hasher))
    }

    fn build(config: Config, hasher: S) -> Self {
        let count = config.initial_buckets();
        let mut buckets = CowVec::new();
        buckets.resize_with(count, TreeSet::new);
        Self {
            buckets,
            len: 0,
            threshold: scaled(count, config.load_factor).max(1),
            config,
            hasher,
        }
    }

    /// Drop every element and return to the configured bucket count.
    pub fn clear(&mut self) {
        let count = self.config.initial_buckets();
        self.buckets = CowVec::new();
        self.buckets.resize_with(count, TreeSet::new);
        self.len = 0;
        self.threshold = scaled(count, self.config.load_factor).max(1);
    }
}

impl<T, S> ChainedHashSet<T, S> {
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// Number of elements the table holds before the next insert grows it.
    pub fn capacity(&self) -> usize {
        self.threshold
    }

    /// Current ratio of elements to buckets.
    pub fn load_factor(&self) -> f32 {
        self.len as f32 / self.buckets.len() as f32
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn hasher(&self) -> &S {
        &self.hasher
    }

    pub fn begin(&self) -> HashPosition {
        self.first_from(0)
    }

    pub fn end(&self) -> HashPosition {
        HashPosition {
            bucket: self.buckets.len(),
            node: Position::END,
        }
    }

    pub fn get_at(&self, pos: HashPosition) -> Option<&T> {
        let tree = self.buckets.get(pos.bucket)?;
        tree.get_at(pos.node).map(|e| &e.value)
    }

    /// Next element in iteration order, or `end()`.
    pub fn successor(&self, pos: HashPosition) -> HashPosition {
        let Some(tree) = self.buckets.get(pos.bucket) else {
            return self.end();
        };
        if tree.get_at(pos.node).is_none() {
            return self.end();
        }
        self.after(pos.bucket, tree.successor(pos.node))
    }

    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            buckets: self.buckets.iter(),
            current: None,
            remaining: self.len,
        }
    }

    fn first_from(&self, start: usize) -> HashPosition {
        self.buckets
            .iter()
            .enumerate()
            .skip(start)
            .find(|(_, tree)| !tree.is_empty())
            .map_or_else(
                || self.end(),
                |(bucket, tree)| HashPosition {
                    bucket,
                    node: tree.begin(),
                },
            )
    }

    /// Resolve an in-bucket successor, moving on to later buckets at `END`.
    fn after(&self, bucket: usize, node: Position) -> HashPosition {
        if node.is_end() {
            self.first_from(bucket + 1)
        } else {
            HashPosition { bucket, node }
        }
    }

    fn bucket_of(&self, hash: u64) -> usize {
        (hash as usize) & (self.buckets.len() - 1)
    }
}

impl<T, S> ChainedHashSet<T, S>
where
    T: Hash + Ord,
    S: BuildHasher,
{
    pub fn find<Q>(&self, q: &Q) -> Option<HashPosition>
    where
        T: Borrow<Q>,
        Q: ?Sized + Hash + Ord,
    {
        let bucket = self.bucket_of(self.hasher.hash_one(q));
        let node = self.buckets[bucket].find_by(|e| e.value.borrow().cmp(q))?;
        Some(HashPosition { bucket, node })
    }

    pub fn contains<Q>(&self, q: &Q) -> bool
    where
        T: Borrow<Q>,
        Q: ?Sized + Hash + Ord,
    {
        self.find(q).is_some()
    }

    pub fn get<Q>(&self, q: &Q) -> Option<&T>
    where
        T: Borrow<Q>,
        Q: ?Sized + Hash + Ord,
    {
        self.find(q).and_then(|pos| self.get_at(pos))
    }
}

impl<T, S> ChainedHashSet<T, S>
where
    T: Hash + Ord + Clone,
    S: BuildHasher,
{
    /// Insert `value`. Returns its position and whether it was new; an
    /// equal element already present is kept.
    pub fn insert(&mut self, value: T) -> (HashPosition, bool) {
        self.try_insert(value).unwrap_or_else(|e| e.handle())
    }

    pub fn try_insert(&mut self, value: T) -> Result<(HashPosition, bool), AllocError> {
        self.insert_inner(None, value)
    }

    /// Insert with a position hint. The hint only helps when it lies in the
    /// bucket `value` hashes to and no resize is needed.
    pub fn insert_hint(&mut self, hint: HashPosition, value: T) -> (HashPosition, bool) {
        self.insert_inner(Some(hint), value)
            .unwrap_or_else(|e| e.handle())
    }

    fn insert_inner(
        &mut self,
        hint: Option<HashPosition>,
        value: T,
    ) -> Result<(HashPosition, bool), AllocError> {
        let hash = self.hasher.hash_one(&value);
        let bucket = self.bucket_of(hash);
        if let Some(node) = self.buckets[bucket].find_by(|e| e.value.cmp(&value)) {
            return Ok((HashPosition { bucket, node }, false));
        }
        let mut hint = hint.filter(|h| h.bucket == bucket);
        if self.len >= self.threshold {
            self.grow()?;
            hint = None;
        }
        let bucket = self.bucket_of(hash);
        self.buckets.try_make_unique()?;
        let tree = &mut self.buckets.as_mut_slice()[bucket];
        let entry = Hashed { hash, value };
        let (node, inserted) = match hint {
            Some(h) => tree.insert_hint(h.node, entry),
            None => tree.insert(entry),
        };
        debug_assert!(inserted, "absent key was found on insert");
        self.len += 1;
        Ok((HashPosition { bucket, node }, true))
    }

    pub fn remove<Q>(&mut self, q: &Q) -> Option<T>
    where
        T: Borrow<Q>,
        Q: ?Sized + Hash + Ord,
    {
        let pos = self.find(q)?;
        self.remove_at(pos).map(|(value, _)| value)
    }

    /// Remove the element at `pos`, returning it with the position of the
    /// element that followed it. `None` for `end()` or a stale position.
    pub fn remove_at(&mut self, pos: HashPosition) -> Option<(T, HashPosition)> {
        self.get_at(pos)?;
        let (entry, next) = self.buckets.as_mut_slice()[pos.bucket].remove_at(pos.node)?;
        self.len -= 1;
        Some((entry.value, self.after(pos.bucket, next)))
    }

    /// Double the bucket array and move every entry by its stored hash.
    fn grow(&mut self) -> Result<(), AllocError> {
        let old_count = self.buckets.len();
        let new_count = old_count
            .checked_mul(2)
            .ok_or(AllocError::CapacityOverflow)?;
        // Detach before moving out so the old trees are never cloned
        // mid-migration.
        self.buckets.try_make_unique()?;
        let mut fresh = CowVec::new();
        fresh.try_resize_with(new_count, TreeSet::new)?;
        let old = mem::replace(&mut self.buckets, fresh);

        // Each new bucket draws from exactly one old bucket, which yields in
        // ascending order, so appending as the maximum keeps trees sorted.
        let mask = new_count - 1;
        let dest = self.buckets.as_mut_slice();
        for tree in old {
            for entry in tree {
                dest[(entry.hash as usize) & mask].push_greatest(entry);
            }
        }

        let previous = self.threshold;
        self.threshold = self
            .config
            .threshold_policy
            .after_grow(self.config.load_factor, previous, new_count)
            .max(self.len + 1);
        debug!(
            "rehash: {} -> {} buckets, {} elements, threshold {} -> {}",
            old_count, new_count, self.len, previous, self.threshold
        );
        Ok(())
    }
}

impl<T: Clone> Default for ChainedHashSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone, S: Clone> Clone for ChainedHashSet<T, S> {
    /// O(1): the bucket array is shared until one side mutates.
    fn clone(&self) -> Self {
        Self {
            buckets: self.buckets.clone(),
            len: self.len,
            threshold: self.threshold,
            config: self.config,
            hasher: self.hasher.clone(),
        }
    }
}

impl<T: fmt::Debug, S> fmt::Debug for ChainedHashSet<T, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl<T, S> PartialEq for ChainedHashSet<T, S>
where
    T: Hash + Ord,
    S: BuildHasher,
{
    /// Set equality; bucket layout and hashers may differ.
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().all(|v| other.contains(v))
    }
}

impl<T: Hash + Ord, S: BuildHasher> Eq for ChainedHashSet<T, S> {}

impl<T, S> FromIterator<T> for ChainedHashSet<T, S>
where
    T: Hash + Ord + Clone,
    S: BuildHasher + Default,
{
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut set = Self::with_hasher(S::default());
        set.extend(iter);
        set
    }
}

impl<T, S> Extend<T> for ChainedHashSet<T, S>
where
    T: Hash + Ord + Clone,
    S: BuildHasher,
{
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for value in iter {
            self.insert(value);
        }
    }
}

/// Iterates buckets in array order, each bucket in ascending order.
pub struct Iter<'a, T> {
    buckets: core::slice::Iter<'a, TreeSet<Hashed<T>>>,
    current: Option<tree_set::Iter<'a, Hashed<T>>>,
    remaining: usize,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<&'a T> {
        loop {
            if let Some(e) = self.current.as_mut().and_then(Iterator::next) {
                self.remaining -= 1;
                return Some(&e.value);
            }
            self.current = Some(self.buckets.next()?.iter());
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<T> ExactSizeIterator for Iter<'_, T> {}
impl<T> FusedIterator for Iter<'_, T> {}

impl<'a, T, S> IntoIterator for &'a ChainedHashSet<T, S> {
    type Item = &'a T;
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Iter<'a, T> {
        self.iter()
    }
}
