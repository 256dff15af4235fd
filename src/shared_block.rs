//! SharedBlock: one heap allocation holding a small header followed by an
//! element array, shared between owners through a non-atomic count.
//!
//! Every `SharedBlock<T>` value is exactly one owner. `share` mints another
//! owner; dropping the last one destroys the live elements and frees the
//! allocation. Structural mutation is only permitted while the block is
//! uniquely owned; `make_mut` and `relocate` detach a shared block by
//! cloning its live elements into a fresh private allocation.

use core::alloc::Layout;
use core::cell::Cell;
use core::marker::PhantomData;
use core::mem;
use core::ptr::{self, NonNull};
use core::slice;
use std::alloc;

/// Failure to obtain storage for a container.
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum AllocError {
    /// The requested capacity does not fit in the address space.
    #[error("capacity overflow")]
    CapacityOverflow,
    /// The global allocator returned null for `layout`.
    #[error("memory allocation of {} bytes failed", .layout.size())]
    OutOfMemory { layout: Layout },
}

impl AllocError {
    /// Diverge the way `Vec` does for infallible entry points.
    pub(crate) fn handle(self) -> ! {
        match self {
            AllocError::CapacityOverflow => panic!("capacity overflow"),
            AllocError::OutOfMemory { layout } => alloc::handle_alloc_error(layout),
        }
    }
}

#[repr(C)]
struct Header {
    capacity: usize,
    len: usize,
    owners: Cell<usize>,
}

pub(crate) struct SharedBlock<T> {
    header: NonNull<Header>,
    // Owns `T`s for drop check; the raw pointer keeps the block !Send + !Sync.
    _owns: PhantomData<T>,
}

const fn data_offset<T>() -> usize {
    let align = mem::align_of::<T>();
    (mem::size_of::<Header>() + align - 1) & !(align - 1)
}

impl<T> SharedBlock<T> {
    const DATA_OFFSET: usize = data_offset::<T>();

    fn layout(capacity: usize) -> Result<Layout, AllocError> {
        let elems = Layout::array::<T>(capacity).map_err(|_| AllocError::CapacityOverflow)?;
        let (layout, offset) = Layout::new::<Header>()
            .extend(elems)
            .map_err(|_| AllocError::CapacityOverflow)?;
        debug_assert_eq!(offset, Self::DATA_OFFSET);
        Ok(layout.pad_to_align())
    }

    /// Allocate an empty, uniquely owned block.
    pub(crate) fn with_capacity(capacity: usize) -> Result<Self, AllocError> {
        let layout = Self::layout(capacity)?;
        // SAFETY: the layout is never zero-sized because it includes the header.
        let raw = unsafe { alloc::alloc(layout) };
        let header = NonNull::new(raw.cast::<Header>()).ok_or(AllocError::OutOfMemory { layout })?;
        // SAFETY: freshly allocated and suitably aligned for `Header`.
        unsafe {
            header.as_ptr().write(Header {
                capacity,
                len: 0,
                owners: Cell::new(1),
            });
        }
        log::trace!("allocated shared block: capacity {capacity}, {} bytes", layout.size());
        Ok(Self {
            header,
            _owns: PhantomData,
        })
    }

    /// Allocate a block of `capacity` and clone `chunks` into it back to back.
    ///
    /// If a clone panics the partially built block is dropped, releasing
    /// both the clones made so far and the allocation.
    pub(crate) fn cloned_from(chunks: &[&[T]], capacity: usize) -> Result<Self, AllocError>
    where
        T: Clone,
    {
        let total: usize = chunks.iter().map(|c| c.len()).sum();
        assert!(total <= capacity, "cloned contents exceed block capacity");
        let mut block = Self::with_capacity(capacity)?;
        for chunk in chunks {
            for item in chunk.iter() {
                block.push(item.clone());
            }
        }
        Ok(block)
    }

    #[inline]
    fn header(&self) -> &Header {
        // SAFETY: the header stays allocated while any owner is alive.
        unsafe { self.header.as_ref() }
    }

    #[inline]
    fn data(&self) -> *mut T {
        // SAFETY: the element array starts DATA_OFFSET bytes into the allocation.
        unsafe {
            self.header
                .as_ptr()
                .cast::<u8>()
                .add(Self::DATA_OFFSET)
                .cast::<T>()
        }
    }

    /// # Safety
    /// The block must be uniquely owned and slots `..len` initialized.
    #[inline]
    unsafe fn set_len(&mut self, len: usize) {
        (*self.header.as_ptr()).len = len;
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.header().len
    }

    #[inline]
    pub(crate) fn capacity(&self) -> usize {
        self.header().capacity
    }

    #[inline]
    pub(crate) fn owners(&self) -> usize {
        self.header().owners.get()
    }

    #[inline]
    pub(crate) fn is_unique(&self) -> bool {
        self.owners() == 1
    }

    pub(crate) fn as_slice(&self) -> &[T] {
        // SAFETY: `..len` are initialized; shared readers never mutate.
        unsafe { slice::from_raw_parts(self.data(), self.len()) }
    }

    /// Mint another owner of the same allocation.
    pub(crate) fn share(&self) -> Self {
        let owners = self.owners().wrapping_add(1);
        if owners == 0 {
            // Same policy as Rc: never continue with a wrapped count.
            std::process::abort();
        }
        self.header().owners.set(owners);
        Self {
            header: self.header,
            _owns: PhantomData,
        }
    }

    /// Detach from other owners (cloning the live elements into a block of
    /// the same capacity) and return the now-private elements.
    pub(crate) fn make_mut(&mut self) -> Result<&mut [T], AllocError>
    where
        T: Clone,
    {
        if !self.is_unique() {
            log::trace!(
                "copy-on-write: detaching {} elements from a block with {} owners",
                self.len(),
                self.owners()
            );
            *self = Self::cloned_from(&[self.as_slice()], self.capacity())?;
        }
        // SAFETY: unique owner, `..len` initialized.
        Ok(unsafe { slice::from_raw_parts_mut(self.data(), self.len()) })
    }

    /// Replace this owner's block with a private one of `capacity`.
    ///
    /// A unique block has its elements moved bitwise; a shared block has
    /// them cloned. The new allocation is obtained before anything moves, so
    /// on error `self` is unchanged.
    pub(crate) fn relocate(&mut self, capacity: usize) -> Result<(), AllocError>
    where
        T: Clone,
    {
        let len = self.len();
        assert!(capacity >= len, "relocation would drop live elements");
        if !self.is_unique() {
            *self = Self::cloned_from(&[self.as_slice()], capacity)?;
            return Ok(());
        }
        let mut fresh = Self::with_capacity(capacity)?;
        // SAFETY: both blocks are uniquely owned and non-overlapping; after the
        // copy the old block no longer owns its elements.
        unsafe {
            ptr::copy_nonoverlapping(self.data(), fresh.data(), len);
            fresh.set_len(len);
            self.set_len(0);
        }
        *self = fresh;
        Ok(())
    }

    /// Replace this owner's block with a private one of `capacity` holding
    /// the current elements followed by values from `f` up to `new_len`.
    ///
    /// `self` is only touched once every new value exists: a failed
    /// allocation, a panicking `f` or a panicking clone of a shared element
    /// leaves the old block, capacity included, in place.
    pub(crate) fn grow_with<F>(&mut self, capacity: usize, new_len: usize, mut f: F) -> Result<(), AllocError>
    where
        T: Clone,
        F: FnMut() -> T,
    {
        struct Tail<'a, U> {
            block: &'a mut SharedBlock<U>,
            start: usize,
            end: usize,
        }

        impl<U> Drop for Tail<'_, U> {
            fn drop(&mut self) {
                // SAFETY: slots start..end were written and are not counted
                // in the block's length.
                unsafe {
                    ptr::drop_in_place(ptr::slice_from_raw_parts_mut(
                        self.block.data().add(self.start),
                        self.end - self.start,
                    ));
                }
            }
        }

        let len = self.len();
        assert!(
            len <= new_len && new_len <= capacity,
            "growth target outside the new block"
        );
        if !self.is_unique() {
            let mut fresh = Self::cloned_from(&[self.as_slice()], capacity)?;
            fresh.fill_with(new_len, f);
            *self = fresh;
            return Ok(());
        }

        let mut fresh = Self::with_capacity(capacity)?;
        let mut tail = Tail {
            block: &mut fresh,
            start: len,
            end: len,
        };
        while tail.end < new_len {
            let value = f();
            // SAFETY: slot `end` is below capacity and not yet written.
            unsafe { tail.block.data().add(tail.end).write(value) };
            tail.end += 1;
        }
        mem::forget(tail);
        // SAFETY: both blocks are uniquely owned; slots ..len of `fresh` are
        // still free and the old block gives up its elements.
        unsafe {
            ptr::copy_nonoverlapping(self.data(), fresh.data(), len);
            fresh.set_len(new_len);
            self.set_len(0);
        }
        *self = fresh;
        Ok(())
    }

    pub(crate) fn push(&mut self, value: T) {
        let len = self.len();
        assert!(
            self.is_unique() && len < self.capacity(),
            "push onto a shared or full block"
        );
        // SAFETY: slot `len` is within capacity and uninitialized.
        unsafe {
            self.data().add(len).write(value);
            self.set_len(len + 1);
        }
    }

    pub(crate) fn pop(&mut self) -> Option<T> {
        assert!(self.is_unique(), "pop from a shared block");
        let len = self.len().checked_sub(1)?;
        // SAFETY: slot `len` was initialized and is forgotten by shrinking first.
        unsafe {
            self.set_len(len);
            Some(self.data().add(len).read())
        }
    }

    /// Remove the last element of a block holding exactly one, moving it out
    /// when unique and cloning it otherwise.
    pub(crate) fn take_single(&mut self) -> Option<T>
    where
        T: Clone,
    {
        debug_assert_eq!(self.len(), 1);
        if self.is_unique() {
            self.pop()
        } else {
            self.as_slice().first().cloned()
        }
    }

    pub(crate) fn truncate(&mut self, len: usize) {
        assert!(self.is_unique(), "truncate of a shared block");
        let old = self.len();
        if len >= old {
            return;
        }
        // SAFETY: length is lowered before dropping so a panicking destructor
        // cannot lead to a double drop.
        unsafe {
            let tail = ptr::slice_from_raw_parts_mut(self.data().add(len), old - len);
            self.set_len(len);
            ptr::drop_in_place(tail);
        }
    }

    /// Append values produced by `f` until the block holds `new_len`.
    ///
    /// If `f` panics, everything appended so far is dropped again and the
    /// block is left at its previous length.
    pub(crate) fn fill_with<F>(&mut self, new_len: usize, mut f: F)
    where
        F: FnMut() -> T,
    {
        struct Rollback<'a, U> {
            block: &'a mut SharedBlock<U>,
            restore: usize,
        }

        impl<U> Drop for Rollback<'_, U> {
            fn drop(&mut self) {
                self.block.truncate(self.restore);
            }
        }

        assert!(
            self.is_unique() && new_len <= self.capacity(),
            "fill beyond a private block's capacity"
        );
        let restore = self.len();
        let mut guard = Rollback {
            block: self,
            restore,
        };
        while guard.block.len() < new_len {
            guard.block.push(f());
        }
        guard.restore = new_len;
    }
}

impl<T> Drop for SharedBlock<T> {
    fn drop(&mut self) {
        let owners = self.owners() - 1;
        self.header().owners.set(owners);
        if owners > 0 {
            return;
        }
        let capacity = self.capacity();
        // SAFETY: last owner; `..len` are initialized and the allocation was
        // made with `layout(capacity)`.
        unsafe {
            ptr::drop_in_place(ptr::slice_from_raw_parts_mut(self.data(), self.len()));
            if let Ok(layout) = Self::layout(capacity) {
                alloc::dealloc(self.header.as_ptr().cast::<u8>(), layout);
            }
        }
    }
}
