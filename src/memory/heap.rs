//! General and cache-line-aligned allocation facade.
//!
//! Thin wrapper over the system allocator. Aligned frees must pass the same
//! alignment that was given at allocation time so the layout round-trips.

use std::alloc::{alloc, alloc_zeroed, dealloc, Layout};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Cache line size assumed throughout the scheduler.
pub const CACHE_LINE: usize = 64;

/// Allocation facade with byte accounting.
#[derive(Default)]
pub struct HeapAlloc {
    allocated_bytes: AtomicUsize,
}

impl HeapAlloc {
    /// Create a new facade.
    pub const fn new() -> Self {
        Self {
            allocated_bytes: AtomicUsize::new(0),
        }
    }

    /// Allocate `size` bytes with pointer alignment.
    ///
    /// Returns null on failure or when `size` is zero.
    pub fn alloc(&self, size: usize) -> *mut u8 {
        self.alloc_aligned(size, std::mem::align_of::<usize>())
    }

    /// Allocate `size` bytes aligned to `align`.
    ///
    /// `align` must be a power of two and at least pointer-sized.
    pub fn alloc_aligned(&self, size: usize, align: usize) -> *mut u8 {
        debug_assert!(align.is_power_of_two());
        debug_assert!(align >= std::mem::align_of::<usize>());

        if size == 0 {
            return std::ptr::null_mut();
        }

        let layout = match Layout::from_size_align(size, align) {
            Ok(l) => l,
            Err(_) => return std::ptr::null_mut(),
        };

        // SAFETY: layout has non-zero size.
        let ptr = unsafe { alloc(layout) };
        if !ptr.is_null() {
            self.allocated_bytes.fetch_add(size, Ordering::Relaxed);
        }
        ptr
    }

    /// Allocate zeroed memory aligned to `align`.
    pub fn alloc_zeroed(&self, size: usize, align: usize) -> *mut u8 {
        debug_assert!(align.is_power_of_two());

        if size == 0 {
            return std::ptr::null_mut();
        }

        let layout = match Layout::from_size_align(size, align) {
            Ok(l) => l,
            Err(_) => return std::ptr::null_mut(),
        };

        // SAFETY: layout has non-zero size.
        let ptr = unsafe { alloc_zeroed(layout) };
        if !ptr.is_null() {
            self.allocated_bytes.fetch_add(size, Ordering::Relaxed);
        }
        ptr
    }

    /// Allocate a block on its own cache line.
    pub fn alloc_cache_aligned(&self, size: usize) -> *mut u8 {
        self.alloc_aligned(size, CACHE_LINE)
    }

    /// Free a block previously returned by [`alloc_aligned`](Self::alloc_aligned).
    ///
    /// # Safety
    /// `ptr` must come from this facade with exactly this `size` and `align`.
    pub unsafe fn free_aligned(&self, ptr: *mut u8, size: usize, align: usize) {
        if ptr.is_null() {
            return;
        }
        let layout = Layout::from_size_align(size, align).expect("invalid free layout");
        dealloc(ptr, layout);
        self.allocated_bytes.fetch_sub(size, Ordering::Relaxed);
    }

    /// Free a block previously returned by [`alloc`](Self::alloc).
    ///
    /// # Safety
    /// `ptr` must come from this facade with exactly this `size`.
    pub unsafe fn free(&self, ptr: *mut u8, size: usize) {
        self.free_aligned(ptr, size, std::mem::align_of::<usize>());
    }

    /// Bytes currently outstanding.
    pub fn allocated_bytes(&self) -> usize {
        self.allocated_bytes.load(Ordering::Relaxed)
    }
}
