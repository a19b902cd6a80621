//! Bump-allocated arena all values, strings, and matcher nodes live in.
//!
//! An explicit, user-owned object: there is no notion of "the current
//! thread's arena", only arenas the caller creates, passes around, and
//! frees. Chunk growth itself is delegated to `bumpalo::Bump`, which
//! already doubles each new chunk as needed.

use bumpalo::Bump;
use std::alloc::Layout;
use std::cell::RefCell;

use crate::error::{ArenaError, ErrorKind};

/// A foreign allocation adopted via [`Arena::trace`], released when the
/// arena is freed.
struct TracedAlloc {
    ptr: *mut u8,
    layout: Layout,
}

/// Bump-allocated pool with grow-on-demand, bulk-free, and reset-to-empty.
///
/// All pointers/references handed out by `alloc*` are valid until the next
/// `reset()` or until the arena is dropped (`free()`), whichever comes
/// first.
pub struct Arena {
    bump: Bump,
    traced: RefCell<Vec<TracedAlloc>>,
    error: RefCell<Option<ArenaError>>,
}

const INITIAL_CHUNK: usize = 2 * 1024;

impl Arena {
    /// Creates an empty arena with an initial 2 KiB chunk.
    pub fn new() -> Self {
        Arena {
            bump: Bump::with_capacity(INITIAL_CHUNK),
            traced: RefCell::new(Vec::new()),
            error: RefCell::new(None),
        }
    }

    /// Returns an 8-byte-aligned, zero-initialized region of `n` bytes.
    /// Never moves existing allocations. On failure, sets the arena's
    /// error slot to the shared `ALLOC_FAILED` sentinel and returns an
    /// empty slice.
    pub fn alloc_bytes(&self, n: usize) -> &mut [u8] {
        let layout = match Layout::from_size_align(n, 8) {
            Ok(l) => l,
            Err(_) => {
                self.set_error(ErrorKind::Memory, "invalid allocation size");
                return &mut [];
            }
        };
        let before = self.bump.allocated_bytes();
        match self.bump.try_alloc_layout(layout) {
            Ok(ptr) => {
                if self.bump.allocated_bytes() > before {
                    tracing::trace!(requested = n, "arena growing a new chunk");
                }
                unsafe {
                    std::ptr::write_bytes(ptr.as_ptr(), 0, n);
                    std::slice::from_raw_parts_mut(ptr.as_ptr(), n)
                }
            }
            Err(_) => {
                let mut slot = self.error.borrow_mut();
                if slot.is_none() {
                    *slot = Some(ArenaError::alloc_failed());
                }
                &mut []
            }
        }
    }

    /// Allocates and moves `value` into the arena, returning a reference
    /// with the arena's lifetime.
    pub fn alloc<T>(&self, value: T) -> &mut T {
        self.bump.alloc(value)
    }

    /// Copies `s` into the arena and returns an arena-owned `&str`.
    pub fn alloc_str<'a>(&'a self, s: &str) -> &'a str {
        self.bump.alloc_str(s)
    }

    /// Copies `slice` into the arena.
    pub fn alloc_slice_copy<'a, T: Copy>(&'a self, slice: &[T]) -> &'a mut [T] {
        self.bump.alloc_slice_copy(slice)
    }

    /// The underlying bump allocator, for arena-backed collections
    /// (`bumpalo::collections::Vec`) used by [`crate::value::array`] and
    /// [`crate::value::table`].
    pub(crate) fn bump(&self) -> &Bump {
        &self.bump
    }

    /// Marks every chunk as empty and re-winds to the head. Retains
    /// capacity. Every reference previously handed out is invalidated.
    pub fn reset(&mut self) {
        self.bump.reset();
        for t in self.traced.borrow_mut().drain(..) {
            unsafe { std::alloc::dealloc(t.ptr, t.layout) };
        }
        *self.error.borrow_mut() = None;
    }

    /// Adopts a foreign allocation so it is released when the arena is
    /// dropped (used by host bindings that hand the arena memory they
    /// allocated themselves).
    ///
    /// # Safety
    /// `ptr` must have been allocated with the global allocator using
    /// `layout`, and must not be freed by any other means.
    pub unsafe fn trace(&self, ptr: *mut u8, layout: Layout) {
        self.traced.borrow_mut().push(TracedAlloc { ptr, layout });
    }

    /// The arena's last-error slot, if any operation on this arena has
    /// failed since the last `reset`/`clear_error`.
    pub fn error(&self) -> Option<ArenaError> {
        self.error.borrow().clone()
    }

    /// Records `{kind, message}` in the error slot, unless one is already
    /// set (subsequent validators short-circuit without overwriting the
    /// first failure).
    pub fn set_error(&self, kind: ErrorKind, message: impl Into<String>) {
        let mut slot = self.error.borrow_mut();
        if slot.is_none() {
            *slot = Some(ArenaError::new(kind, message));
        }
    }

    pub fn clear_error(&self) {
        *self.error.borrow_mut() = None;
    }

    /// Copies `s` into the arena and wraps it as `Value::Str`, bundling
    /// the two steps callers otherwise repeat at every string-valued
    /// call site.
    pub fn alloc_value_str<'a>(&'a self, s: &str) -> crate::value::Value<'a> {
        crate::value::Value::Str(self.alloc_str(s))
    }

    /// Allocates an empty [`crate::value::Array`] into the arena and
    /// wraps it as `Value::Array`.
    pub fn alloc_array<'a>(&'a self) -> crate::value::Value<'a> {
        let array = crate::value::Array::new(self);
        crate::value::Value::Array(self.alloc(array))
    }

    /// Allocates an empty [`crate::value::Table`] into the arena and
    /// wraps it as `Value::Table`.
    pub fn alloc_table<'a>(&'a self) -> crate::value::Value<'a> {
        let table = crate::value::Table::new(self);
        crate::value::Value::Table(self.alloc(table))
    }
}

impl Default for Arena {
    fn default() -> Self {
        Arena::new()
    }
}

impl Drop for Arena {
    fn drop(&mut self) {
        for t in self.traced.borrow_mut().drain(..) {
            unsafe { std::alloc::dealloc(t.ptr, t.layout) };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alloc_is_zeroed_and_aligned() {
        let arena = Arena::new();
        let region = arena.alloc_bytes(37);
        assert_eq!(region.len(), 37);
        assert!(region.iter().all(|b| *b == 0));
        assert_eq!((region.as_ptr() as usize) % 8, 0);
    }

    #[test]
    fn reset_clears_error_and_retains_capacity() {
        let mut arena = Arena::new();
        arena.set_error(ErrorKind::InvalidType, "boom");
        assert!(arena.error().is_some());
        let cap_before = arena.bump().allocated_bytes();
        arena.reset();
        assert!(arena.error().is_none());
        // `reset` retains at least one chunk; capacity does not shrink.
        assert!(arena.bump().allocated_bytes() <= cap_before);
    }

    #[test]
    fn error_does_not_overwrite_first_failure() {
        let arena = Arena::new();
        arena.set_error(ErrorKind::InvalidType, "first");
        arena.set_error(ErrorKind::Parse, "second");
        assert_eq!(arena.error().unwrap().message, "first");
    }

    #[test]
    fn grows_across_chunk_boundaries() {
        let arena = Arena::new();
        // Force several chunk growths; no allocation must move.
        let first = arena.alloc_bytes(16).as_ptr();
        for _ in 0..64 {
            arena.alloc_bytes(4096);
        }
        let first_again = unsafe { &*(first as *const [u8; 16]) };
        assert!(first_again.iter().all(|b| *b == 0));
    }

    #[test]
    fn convenience_constructors_build_expected_kinds() {
        use crate::value::Value;

        let arena = Arena::new();
        assert!(matches!(arena.alloc_value_str("hi"), Value::Str("hi")));
        assert!(matches!(arena.alloc_array(), Value::Array(a) if a.is_empty()));
        assert!(matches!(arena.alloc_table(), Value::Table(t) if t.is_empty()));
    }
}
