//! Monotonic region arena with growth, mark/restore, and bulk reset.
//!
//! The hot path is a pointer bump inside the cached region. Allocations are
//! never freed individually; the whole arena is reset at a frame or group
//! boundary, or rolled back to a [`ArenaMark`] for nested scopes.

use std::alloc::{alloc, dealloc, Layout};
use std::ptr::NonNull;

use crate::util::size::align_up;

/// Default allocation alignment.
pub const ARENA_DEFAULT_ALIGN: usize = 16;

/// Minimum region size (one page).
const ARENA_MIN_REGION: usize = 4096;

struct Region {
    base: NonNull<u8>,
    capacity: usize,
    used: usize,
}

impl Region {
    fn new(capacity: usize) -> Option<Region> {
        let layout = Layout::from_size_align(capacity, ARENA_DEFAULT_ALIGN).ok()?;
        // SAFETY: capacity is non-zero, layout is valid.
        let ptr = unsafe { alloc(layout) };
        Some(Region {
            base: NonNull::new(ptr)?,
            capacity,
            used: 0,
        })
    }

    fn remaining_after_align(&self, align: usize) -> (usize, usize) {
        let current = self.base.as_ptr() as usize + self.used;
        let aligned = align_up(current, align);
        let padding = aligned - current;
        (padding, self.capacity.saturating_sub(self.used + padding))
    }
}

impl Drop for Region {
    fn drop(&mut self) {
        let layout = Layout::from_size_align(self.capacity, ARENA_DEFAULT_ALIGN)
            .expect("region layout was validated at creation");
        // SAFETY: base was allocated with this layout in Region::new.
        unsafe { dealloc(self.base.as_ptr(), layout) };
    }
}

/// A cursor into the arena captured by [`Arena::mark`].
///
/// Restoring frees every region created after the mark and rewinds the
/// marked region's bump pointer.
#[derive(Debug, Clone, Copy)]
pub struct ArenaMark {
    region: usize,
    used: usize,
    total_used: usize,
}

/// Monotonic region allocator.
///
/// Single-writer: per-worker arenas are owned by their worker, per-group
/// arenas are written only by tasks of that group or by the owner before
/// submission.
pub struct Arena {
    regions: Vec<Region>,
    /// Index of the region that served the last allocation.
    last: usize,
    region_size: usize,
    total_used: usize,
}

impl Arena {
    /// Create an arena whose first region holds at least `capacity` bytes.
    ///
    /// The region is rounded up to a page.
    pub fn with_capacity(capacity: usize) -> Arena {
        let region_size = align_up(capacity.max(ARENA_MIN_REGION), ARENA_MIN_REGION);
        let first = Region::new(region_size).expect("arena region allocation failed");
        Arena {
            regions: vec![first],
            last: 0,
            region_size,
            total_used: 0,
        }
    }

    /// Allocate `size` bytes with the default alignment.
    pub fn alloc(&mut self, size: usize) -> *mut u8 {
        self.alloc_aligned(size, ARENA_DEFAULT_ALIGN)
    }

    /// Allocate `size` bytes aligned to `align` (power of two).
    ///
    /// Returns null only if the underlying allocator fails.
    pub fn alloc_aligned(&mut self, size: usize, align: usize) -> *mut u8 {
        debug_assert!(align.is_power_of_two());
        if size == 0 {
            return std::ptr::null_mut();
        }

        // Walk regions starting from the cached cursor, wrapping once.
        let count = self.regions.len();
        for step in 0..count {
            let idx = (self.last + step) % count;
            let (padding, remaining) = self.regions[idx].remaining_after_align(align);
            if remaining >= size {
                return self.bump(idx, padding, size);
            }
        }

        // No region fits: grow with a region sized for the request, with
        // slack for the alignment padding of the first allocation.
        let grown = align_up(size.max(self.region_size) + align, ARENA_MIN_REGION);
        let region = match Region::new(grown) {
            Some(r) => r,
            None => return std::ptr::null_mut(),
        };
        self.regions.push(region);
        let idx = self.regions.len() - 1;
        let (padding, _) = self.regions[idx].remaining_after_align(align);
        self.bump(idx, padding, size)
    }

    fn bump(&mut self, idx: usize, padding: usize, size: usize) -> *mut u8 {
        let region = &mut self.regions[idx];
        let offset = region.used + padding;
        region.used = offset + size;
        self.last = idx;
        self.total_used += size;
        // SAFETY: offset + size <= capacity was checked by the caller.
        unsafe { region.base.as_ptr().add(offset) }
    }

    /// Allocate zeroed memory.
    pub fn alloc_zeroed(&mut self, count: usize, size: usize) -> *mut u8 {
        let total = count.checked_mul(size).unwrap_or(0);
        let ptr = self.alloc(total);
        if !ptr.is_null() {
            // SAFETY: ptr points to `total` freshly bumped bytes.
            unsafe { std::ptr::write_bytes(ptr, 0, total) };
        }
        ptr
    }

    /// Grow an allocation, in place when it is the last one in its region.
    ///
    /// # Safety
    /// `ptr` must be the result of a previous arena allocation of `old_size`
    /// bytes that is still live.
    pub unsafe fn realloc(&mut self, ptr: *mut u8, old_size: usize, new_size: usize) -> *mut u8 {
        if ptr.is_null() {
            return self.alloc(new_size);
        }
        if new_size <= old_size {
            return ptr;
        }

        // In-place growth only when ptr is the last allocation in the cached
        // region and the extra bytes fit.
        let region = &mut self.regions[self.last];
        let end = region.base.as_ptr() as usize + region.used;
        if ptr as usize + old_size == end {
            let extra = new_size - old_size;
            if region.used + extra <= region.capacity {
                region.used += extra;
                self.total_used += extra;
                return ptr;
            }
        }

        let new_ptr = self.alloc(new_size);
        if !new_ptr.is_null() {
            std::ptr::copy_nonoverlapping(ptr, new_ptr, old_size);
        }
        new_ptr
    }

    /// Copy a string into the arena, returning an arena-backed slice.
    pub fn strdup(&mut self, s: &str) -> &str {
        let ptr = self.alloc(s.len().max(1));
        // SAFETY: ptr holds at least s.len() bytes; source and destination
        // do not overlap.
        unsafe {
            std::ptr::copy_nonoverlapping(s.as_ptr(), ptr, s.len());
            std::str::from_utf8_unchecked(std::slice::from_raw_parts(ptr, s.len()))
        }
    }

    /// Capture the current allocation cursor.
    pub fn mark(&self) -> ArenaMark {
        ArenaMark {
            region: self.last,
            used: self.regions[self.last].used,
            total_used: self.total_used,
        }
    }

    /// Roll back to a mark, freeing regions created after it.
    ///
    /// All allocations made since the mark are invalidated.
    pub fn restore(&mut self, mark: ArenaMark) {
        debug_assert!(mark.region < self.regions.len());
        self.regions.truncate(mark.region + 1);
        self.regions[mark.region].used = mark.used;
        self.last = mark.region;
        self.total_used = mark.total_used;
    }

    /// Reset every region's usage to zero, retaining the memory.
    pub fn reset(&mut self) {
        for region in &mut self.regions {
            #[cfg(feature = "debug")]
            // SAFETY: the whole region belongs to the arena.
            unsafe {
                std::ptr::write_bytes(region.base.as_ptr(), 0xCD, region.used);
            }
            region.used = 0;
        }
        self.last = 0;
        self.total_used = 0;
    }

    /// Bytes handed out since creation or the last reset.
    pub fn total_used(&self) -> usize {
        self.total_used
    }

    /// Bytes reserved across all regions.
    pub fn total_capacity(&self) -> usize {
        self.regions.iter().map(|r| r.capacity).sum()
    }

    /// Number of regions currently held.
    pub fn region_count(&self) -> usize {
        self.regions.len()
    }
}

// SAFETY: the arena is single-writer by contract; cross-thread handoff of
// the whole arena (worker arenas at pool teardown) is safe.
unsafe impl Send for Arena {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_allocation() {
        let mut arena = Arena::with_capacity(1024);

        let a = arena.alloc(64);
        let b = arena.alloc(64);
        assert!(!a.is_null());
        assert!(!b.is_null());
        assert_ne!(a, b);
        assert_eq!(arena.total_used(), 128);
    }

    #[test]
    fn test_alignment() {
        let mut arena = Arena::with_capacity(1024);
        arena.alloc(3);
        let p = arena.alloc_aligned(64, 64);
        assert_eq!(p as usize % 64, 0);
    }

    #[test]
    fn test_growth_links_new_region() {
        let mut arena = Arena::with_capacity(4096);
        assert_eq!(arena.region_count(), 1);

        // Exceeds the first region, must grow.
        let p = arena.alloc(8192);
        assert!(!p.is_null());
        assert_eq!(arena.region_count(), 2);
    }

    #[test]
    fn test_reset_retains_regions() {
        let mut arena = Arena::with_capacity(4096);
        let first = arena.alloc(16);
        arena.alloc(8192);
        assert_eq!(arena.region_count(), 2);

        arena.reset();
        assert_eq!(arena.region_count(), 2);
        assert_eq!(arena.total_used(), 0);

        // After reset the first region serves allocations again.
        let again = arena.alloc(16);
        assert_eq!(first, again);
    }

    #[test]
    fn test_mark_restore_frees_trailing_regions() {
        let mut arena = Arena::with_capacity(4096);
        arena.alloc(16);
        let mark = arena.mark();

        arena.alloc(32);
        arena.alloc(8192);
        assert_eq!(arena.region_count(), 2);

        arena.restore(mark);
        assert_eq!(arena.region_count(), 1);
        assert_eq!(arena.total_used(), 16);
    }

    #[test]
    fn test_realloc_in_place_for_last_allocation() {
        let mut arena = Arena::with_capacity(4096);
        let p = arena.alloc(16);
        let used = arena.total_used();

        let q = unsafe { arena.realloc(p, 16, 48) };
        assert_eq!(p, q);
        assert_eq!(arena.total_used(), used + 32);
    }

    #[test]
    fn test_realloc_moves_when_not_last() {
        let mut arena = Arena::with_capacity(4096);
        let p = arena.alloc(16);
        unsafe { std::ptr::write_bytes(p, 0xAB, 16) };
        arena.alloc(16);

        let q = unsafe { arena.realloc(p, 16, 64) };
        assert_ne!(p, q);
        // Contents were copied.
        assert_eq!(unsafe { *q }, 0xAB);
    }

    #[test]
    fn test_strdup() {
        let mut arena = Arena::with_capacity(4096);
        let s = arena.strdup("frame graph");
        assert_eq!(s, "frame graph");
    }

    #[test]
    fn test_calloc_zeroes() {
        let mut arena = Arena::with_capacity(4096);
        let p = arena.alloc_zeroed(8, 8);
        let bytes = unsafe { std::slice::from_raw_parts(p, 64) };
        assert!(bytes.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_steady_state_region_count() {
        // Frame pattern: allocate, reset, repeat. The region count must
        // stabilize instead of growing without bound.
        let mut arena = Arena::with_capacity(4096);
        for _ in 0..1000 {
            for _ in 0..50 {
                arena.alloc(48);
            }
            arena.reset();
        }
        assert!(arena.region_count() <= 2);
    }
}
