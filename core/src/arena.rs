//! Pluggable element storage: direct heap allocation or a bump arena.
//!
//! Why an arena: a forward pass allocates one short-lived tensor per layer,
//! and a bump arena releases all of them with a single `reset`.
//!
//! Both backends hand out zero-initialised [`Buffer`]s. Heap buffers are
//! released when dropped. Arena buffers borrow the arena, so the borrow
//! checker refuses `ArenaAllocator::reset` while any of them is alive.

use core::alloc::Layout;
use core::cell::Cell;
use core::fmt;
use core::ops::{Deref, DerefMut};

use bumpalo::Bump;

use crate::element::Element;
use crate::error::{CnnError, CnnResult};

/// Backing storage for an owning matrix.
pub enum Buffer<'a, T> {
    Heap(Vec<T>),
    Arena(&'a mut [T]),
}

impl<T> Deref for Buffer<'_, T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        match self {
            Buffer::Heap(data) => data,
            Buffer::Arena(data) => data,
        }
    }
}

impl<T> DerefMut for Buffer<'_, T> {
    fn deref_mut(&mut self) -> &mut [T] {
        match self {
            Buffer::Heap(data) => data,
            Buffer::Arena(data) => data,
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Buffer<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let backend = match self {
            Buffer::Heap(_) => "Heap",
            Buffer::Arena(_) => "Arena",
        };
        f.debug_struct("Buffer")
            .field("backend", &backend)
            .field("len", &self.len())
            .finish()
    }
}

/// Source of zero-initialised element buffers.
pub trait Allocator {
    /// Allocates `len` zeroed elements.
    fn allocate<T: Element>(&self, len: usize) -> CnnResult<Buffer<'_, T>>;
}

impl<A: Allocator> Allocator for &A {
    fn allocate<T: Element>(&self, len: usize) -> CnnResult<Buffer<'_, T>> {
        (**self).allocate(len)
    }
}

fn byte_len<T: Element>(len: usize) -> usize {
    len.saturating_mul(T::DTYPE.size_bytes())
}

// =============================================================================
// Heap
// =============================================================================

/// Global-heap backend.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeapAllocator;

impl Allocator for HeapAllocator {
    fn allocate<T: Element>(&self, len: usize) -> CnnResult<Buffer<'_, T>> {
        let mut data = Vec::new();
        data.try_reserve_exact(len)
            .map_err(|_| CnnError::AllocationFailure {
                requested: byte_len::<T>(len),
                remaining: 0,
            })?;
        data.resize(len, T::ZERO);
        Ok(Buffer::Heap(data))
    }
}

// =============================================================================
// Arena
// =============================================================================

/// Bump arena with a fixed byte budget and bulk reset.
pub struct ArenaAllocator {
    bump: Bump,
    capacity: usize,
    used: Cell<usize>,
}

impl ArenaAllocator {
    /// Creates an arena that will hand out at most `capacity` bytes between
    /// resets.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            bump: Bump::with_capacity(capacity),
            capacity,
            used: Cell::new(0),
        }
    }

    /// Invalidates every prior allocation and restores the full budget.
    pub fn reset(&mut self) {
        self.bump.reset();
        self.used.set(0);
    }

    /// Frees the arena's chunks.
    pub fn release_all(self) {
        drop(self);
    }

    /// Total capacity in bytes.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Bytes currently handed out.
    #[inline]
    pub fn used(&self) -> usize {
        self.used.get()
    }

    /// Bytes remaining before the arena reports exhaustion.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.capacity.saturating_sub(self.used.get())
    }
}

impl fmt::Debug for ArenaAllocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArenaAllocator")
            .field("capacity", &self.capacity)
            .field("used", &self.used.get())
            .finish()
    }
}

impl Allocator for ArenaAllocator {
    fn allocate<T: Element>(&self, len: usize) -> CnnResult<Buffer<'_, T>> {
        if len == 0 {
            return Ok(Buffer::Arena(&mut []));
        }

        let requested = byte_len::<T>(len);
        let exhausted = || CnnError::AllocationFailure {
            requested,
            remaining: self.remaining(),
        };
        if requested > self.remaining() {
            return Err(exhausted());
        }

        let layout = Layout::array::<T>(len).map_err(|_| exhausted())?;
        let ptr = self
            .bump
            .try_alloc_layout(layout)
            .map_err(|_| exhausted())?
            .cast::<T>();
        self.used.set(self.used.get() + requested);

        // SAFETY: `ptr` is aligned for `T` and valid for `len` elements per
        // `layout`. The bump never hands the region out twice, and `reset`
        // takes `&mut self`, so the slice cannot outlive the region.
        let data = unsafe {
            for i in 0..len {
                ptr.as_ptr().add(i).write(T::ZERO);
            }
            core::slice::from_raw_parts_mut(ptr.as_ptr(), len)
        };
        Ok(Buffer::Arena(data))
    }
}
