//! CowVec: a growable array that stores nothing, one inline value, or a
//! reference to a copy-on-write `SharedBlock`.
//!
//! Representation rules
//! - `Empty` → `Inline` on the first push; no heap allocation for one element.
//! - Growth past one element (or past a full block) allocates a block sized
//!   `DEFAULT_CAPACITY` or twice the old capacity.
//! - Cloning a vector with a block shares the block; the first structural
//!   write through either copy clones the live elements into a private block.
//!   Reads never clone.
//! - Shrinking to one element returns to `Inline`, to zero returns to `Empty`.
//!
//! Failure behavior
//! - Growth, reserve, resize and divergence are all-or-nothing: on an
//!   allocation error or a panicking `T::clone` the vector is observably
//!   unchanged and nothing leaks.
//! - `insert`/`erase` at an arbitrary index are implemented as a push/pop
//!   plus an in-place rotation, so they inherit the same behavior.
//!
//! The owner count on a block is a plain `Cell<usize>`; `CowVec` is neither
//! `Send` nor `Sync`.

use crate::shared_block::{AllocError, SharedBlock};
use core::cmp::Ordering;
use core::fmt;
use core::hash::{Hash, Hasher};
use core::iter::FusedIterator;
use core::mem;
use core::ops::{Bound, Deref, DerefMut, RangeBounds};
use core::slice;

/// Capacity of the first heap block when a vector grows past one element.
pub const DEFAULT_CAPACITY: usize = 4;

enum Storage<T> {
    Empty,
    Inline(T),
    Shared(SharedBlock<T>),
}

/// Which of the three representations a `CowVec` currently uses.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum StorageKind {
    Empty,
    Inline,
    Shared,
}

pub struct CowVec<T> {
    storage: Storage<T>,
}

impl<T> CowVec<T> {
    pub const fn new() -> Self {
        Self {
            storage: Storage::Empty,
        }
    }

    pub fn len(&self) -> usize {
        match &self.storage {
            Storage::Empty => 0,
            Storage::Inline(_) => 1,
            Storage::Shared(block) => block.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 0 when empty, 1 when inline, otherwise the block's capacity.
    pub fn capacity(&self) -> usize {
        match &self.storage {
            Storage::Empty => 0,
            Storage::Inline(_) => 1,
            Storage::Shared(block) => block.capacity(),
        }
    }

    pub fn storage_kind(&self) -> StorageKind {
        match &self.storage {
            Storage::Empty => StorageKind::Empty,
            Storage::Inline(_) => StorageKind::Inline,
            Storage::Shared(_) => StorageKind::Shared,
        }
    }

    /// Number of vectors referencing this vector's heap block, or 0 when it
    /// has none.
    pub fn share_count(&self) -> usize {
        match &self.storage {
            Storage::Shared(block) => block.owners(),
            _ => 0,
        }
    }

    pub fn as_slice(&self) -> &[T] {
        match &self.storage {
            Storage::Empty => &[],
            Storage::Inline(value) => slice::from_ref(value),
            Storage::Shared(block) => block.as_slice(),
        }
    }

    pub fn front(&self) -> Option<&T> {
        self.as_slice().first()
    }

    pub fn back(&self) -> Option<&T> {
        self.as_slice().last()
    }

    /// Drop this vector's elements (or its share of a block).
    pub fn clear(&mut self) {
        self.storage = Storage::Empty;
    }

    /// Move an inline value into a new block of `capacity`.
    fn spill(&mut self, capacity: usize) -> Result<(), AllocError> {
        let mut block = SharedBlock::with_capacity(capacity)?;
        match mem::replace(&mut self.storage, Storage::Empty) {
            Storage::Inline(first) => block.push(first),
            Storage::Empty => {}
            Storage::Shared(_) => unreachable!("spill is only used on inline storage"),
        }
        self.storage = Storage::Shared(block);
        Ok(())
    }
}

impl<T: Clone> CowVec<T> {
    pub fn with_capacity(capacity: usize) -> Self {
        let mut v = Self::new();
        v.reserve(capacity);
        v
    }

    /// Make sure no other vector shares this one's block.
    pub fn make_unique(&mut self) {
        self.try_make_unique().unwrap_or_else(|e| e.handle())
    }

    pub fn try_make_unique(&mut self) -> Result<(), AllocError> {
        if let Storage::Shared(ref mut block) = self.storage {
            block.make_mut()?;
        }
        Ok(())
    }

    /// Mutable view of the elements; detaches from a shared block first.
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        match self.storage {
            Storage::Empty => &mut [],
            Storage::Inline(ref mut value) => slice::from_mut(value),
            Storage::Shared(ref mut block) => block.make_mut().unwrap_or_else(|e| e.handle()),
        }
    }

    pub fn front_mut(&mut self) -> Option<&mut T> {
        self.as_mut_slice().first_mut()
    }

    pub fn back_mut(&mut self) -> Option<&mut T> {
        self.as_mut_slice().last_mut()
    }

    pub fn push_back(&mut self, value: T) {
        self.try_push_back(value).unwrap_or_else(|e| e.handle())
    }

    /// Append `value`. On error the vector is unchanged and `value` is dropped.
    pub fn try_push_back(&mut self, value: T) -> Result<(), AllocError> {
        match self.storage {
            Storage::Empty => {
                self.storage = Storage::Inline(value);
                return Ok(());
            }
            Storage::Inline(_) => self.spill(DEFAULT_CAPACITY)?,
            Storage::Shared(ref mut block) => {
                if block.len() == block.capacity() {
                    let grown = block
                        .capacity()
                        .checked_mul(2)
                        .ok_or(AllocError::CapacityOverflow)?
                        .max(DEFAULT_CAPACITY);
                    block.relocate(grown)?;
                } else {
                    block.make_mut()?;
                }
            }
        }
        if let Storage::Shared(ref mut block) = self.storage {
            block.push(value);
        }
        Ok(())
    }

    pub fn pop_back(&mut self) -> Option<T> {
        let popped = match self.storage {
            Storage::Empty => return None,
            Storage::Inline(_) => match mem::replace(&mut self.storage, Storage::Empty) {
                Storage::Inline(value) => Some(value),
                _ => None,
            },
            Storage::Shared(ref mut block) => {
                if block.len() == 0 {
                    return None;
                }
                block.make_mut().unwrap_or_else(|e| e.handle());
                block.pop()
            }
        };
        self.collapse();
        popped
    }

    /// Insert `value` at `index`, shifting later elements right.
    ///
    /// # Panics
    /// Panics if `index > len`.
    pub fn insert(&mut self, index: usize, value: T) {
        let len = self.len();
        assert!(index <= len, "insertion index (is {index}) should be <= len (is {len})");
        self.push_back(value);
        self.as_mut_slice()[index..].rotate_right(1);
    }

    /// Remove and return the element at `index`, shifting later elements left.
    ///
    /// # Panics
    /// Panics if `index >= len`.
    pub fn erase(&mut self, index: usize) -> T {
        let len = self.len();
        assert!(index < len, "removal index (is {index}) should be < len (is {len})");
        self.as_mut_slice()[index..].rotate_left(1);
        self.pop_back()
            .expect("vector holds at least one element after bounds check")
    }

    /// Remove the elements in `range`.
    ///
    /// A shared vector only clones the surviving elements.
    ///
    /// # Panics
    /// Panics if the range is decreasing or extends past `len`.
    pub fn erase_range<R: RangeBounds<usize>>(&mut self, range: R) {
        let len = self.len();
        let start = match range.start_bound() {
            Bound::Included(&s) => s,
            Bound::Excluded(&s) => s + 1,
            Bound::Unbounded => 0,
        };
        let end = match range.end_bound() {
            Bound::Included(&e) => e + 1,
            Bound::Excluded(&e) => e,
            Bound::Unbounded => len,
        };
        assert!(start <= end, "range start (is {start}) should be <= range end (is {end})");
        assert!(end <= len, "range end (is {end}) should be <= len (is {len})");
        if start == end {
            return;
        }
        if start == 0 && end == len {
            self.clear();
            return;
        }
        match self.storage {
            Storage::Shared(ref mut block) if !block.is_unique() => {
                let items = block.as_slice();
                let fresh = SharedBlock::cloned_from(&[&items[..start], &items[end..]], block.capacity())
                    .unwrap_or_else(|e| e.handle());
                *block = fresh;
            }
            _ => {
                self.as_mut_slice()[start..].rotate_left(end - start);
                self.truncate(len - (end - start));
            }
        }
        self.collapse();
    }

    /// Shorten the vector to `len` elements; no-op if it is not longer.
    pub fn truncate(&mut self, len: usize) {
        if len >= self.len() {
            return;
        }
        if len == 0 {
            self.clear();
            return;
        }
        if let Storage::Shared(ref mut block) = self.storage {
            if block.is_unique() {
                block.truncate(len);
            } else {
                let fresh = SharedBlock::cloned_from(&[&block.as_slice()[..len]], block.capacity())
                    .unwrap_or_else(|e| e.handle());
                *block = fresh;
            }
        }
        self.collapse();
    }

    /// Resize to `new_len`, filling new slots with clones of `value`.
    pub fn resize(&mut self, new_len: usize, value: T) {
        self.resize_with(new_len, || value.clone())
    }

    /// Resize to `new_len`, filling new slots with `T::default()`.
    pub fn resize_default(&mut self, new_len: usize)
    where
        T: Default,
    {
        self.resize_with(new_len, T::default)
    }

    pub fn resize_with<F: FnMut() -> T>(&mut self, new_len: usize, f: F) {
        self.try_resize_with(new_len, f).unwrap_or_else(|e| e.handle())
    }

    /// Grow (filling with `f`) or shrink to `new_len`.
    ///
    /// Growth is all-or-nothing: if allocation fails or `f` panics, the
    /// vector holds exactly its previous elements in its previous
    /// representation, with its previous capacity.
    pub fn try_resize_with<F: FnMut() -> T>(&mut self, new_len: usize, mut f: F) -> Result<(), AllocError> {
        struct Restore<'a, U: Clone>(&'a mut CowVec<U>);

        impl<U: Clone> Drop for Restore<'_, U> {
            fn drop(&mut self) {
                self.0.collapse();
            }
        }

        let len = self.len();
        if new_len <= len {
            self.truncate(new_len);
            return Ok(());
        }
        match self.storage {
            Storage::Shared(ref mut block) if block.is_unique() && new_len <= block.capacity() => {
                block.fill_with(new_len, f);
            }
            Storage::Shared(ref mut block) => {
                let capacity = block.capacity().max(new_len);
                block.grow_with(capacity, new_len, f)?;
            }
            Storage::Empty if new_len == 1 => self.storage = Storage::Inline(f()),
            Storage::Empty | Storage::Inline(_) => {
                self.spill(new_len)?;
                let mut guard = Restore(self);
                if let Storage::Shared(ref mut block) = guard.0.storage {
                    block.fill_with(new_len, f);
                }
            }
        }
        Ok(())
    }

    /// Make room for at least `new_capacity` elements in total.
    ///
    /// No-op when `new_capacity` is below 2 (inline storage suffices) or
    /// does not exceed the current capacity.
    pub fn reserve(&mut self, new_capacity: usize) {
        self.try_reserve(new_capacity).unwrap_or_else(|e| e.handle())
    }

    pub fn try_reserve(&mut self, new_capacity: usize) -> Result<(), AllocError> {
        if new_capacity < 2 || new_capacity <= self.capacity() {
            return Ok(());
        }
        match self.storage {
            Storage::Empty | Storage::Inline(_) => self.spill(new_capacity),
            Storage::Shared(ref mut block) => block.relocate(new_capacity),
        }
    }

    /// Drop unused capacity. Blocks holding fewer than two elements are
    /// released in favor of inline or empty storage.
    pub fn shrink_to_fit(&mut self) {
        if let Storage::Shared(ref mut block) = self.storage {
            let len = block.len();
            if len >= 2 && len < block.capacity() {
                block.relocate(len).unwrap_or_else(|e| e.handle());
            }
        }
        self.collapse();
    }

    /// Replace the contents with the items of `iter`.
    pub fn assign<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        *self = iter.into_iter().collect();
    }

    /// Return to inline or empty storage once a block holds fewer than two
    /// elements.
    fn collapse(&mut self) {
        if let Storage::Shared(ref mut block) = self.storage {
            match block.len() {
                0 => self.storage = Storage::Empty,
                1 => {
                    if let Some(first) = block.take_single() {
                        self.storage = Storage::Inline(first);
                    }
                }
                _ => {}
            }
        }
    }
}

impl<T> Default for CowVec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> Clone for CowVec<T> {
    /// Shares a heap block in O(1); an inline value is cloned.
    fn clone(&self) -> Self {
        let storage = match &self.storage {
            Storage::Empty => Storage::Empty,
            Storage::Inline(value) => Storage::Inline(value.clone()),
            Storage::Shared(block) => Storage::Shared(block.share()),
        };
        Self { storage }
    }
}

impl<T> Deref for CowVec<T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        self.as_slice()
    }
}

impl<T: Clone> DerefMut for CowVec<T> {
    fn deref_mut(&mut self) -> &mut [T] {
        self.as_mut_slice()
    }
}

impl<T: fmt::Debug> fmt::Debug for CowVec<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.as_slice()).finish()
    }
}

impl<T: PartialEq> PartialEq for CowVec<T> {
    fn eq(&self, other: &Self) -> bool {
        self.as_slice() == other.as_slice()
    }
}

impl<T: Eq> Eq for CowVec<T> {}

impl<T: PartialOrd> PartialOrd for CowVec<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.as_slice().partial_cmp(other.as_slice())
    }
}

impl<T: Ord> Ord for CowVec<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.as_slice().cmp(other.as_slice())
    }
}

impl<T: Hash> Hash for CowVec<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_slice().hash(state)
    }
}

impl<T: Clone> From<&[T]> for CowVec<T> {
    /// Copies `items` into storage sized exactly to fit.
    fn from(items: &[T]) -> Self {
        let storage = match items {
            [] => Storage::Empty,
            [only] => Storage::Inline(only.clone()),
            _ => Storage::Shared(
                SharedBlock::cloned_from(&[items], items.len()).unwrap_or_else(|e| e.handle()),
            ),
        };
        Self { storage }
    }
}

impl<T: Clone> FromIterator<T> for CowVec<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut v = Self::new();
        v.extend(iter);
        v
    }
}

impl<T: Clone> Extend<T> for CowVec<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        let iter = iter.into_iter();
        let (lower, _) = iter.size_hint();
        self.reserve(self.len().saturating_add(lower));
        for item in iter {
            self.push_back(item);
        }
    }
}

impl<'a, T> IntoIterator for &'a CowVec<T> {
    type Item = &'a T;
    type IntoIter = slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.as_slice().iter()
    }
}

impl<'a, T: Clone> IntoIterator for &'a mut CowVec<T> {
    type Item = &'a mut T;
    type IntoIter = slice::IterMut<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.as_mut_slice().iter_mut()
    }
}

impl<T: Clone> IntoIterator for CowVec<T> {
    type Item = T;
    type IntoIter = IntoIter<T>;

    /// Detaches from a shared block, then moves the elements out in order.
    fn into_iter(mut self) -> IntoIter<T> {
        // Reversed so that `pop` yields front to back.
        self.as_mut_slice().reverse();
        IntoIter {
            storage: self.storage,
        }
    }
}

/// Owning iterator over a `CowVec`.
pub struct IntoIter<T> {
    storage: Storage<T>,
}

impl<T> Iterator for IntoIter<T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        match self.storage {
            Storage::Empty => None,
            Storage::Inline(_) => match mem::replace(&mut self.storage, Storage::Empty) {
                Storage::Inline(value) => Some(value),
                _ => None,
            },
            Storage::Shared(ref mut block) => block.pop(),
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = match &self.storage {
            Storage::Empty => 0,
            Storage::Inline(_) => 1,
            Storage::Shared(block) => block.len(),
        };
        (n, Some(n))
    }
}

impl<T> ExactSizeIterator for IntoIter<T> {}
impl<T> FusedIterator for IntoIter<T> {}
