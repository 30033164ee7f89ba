//! Fixed-size object pool with block chaining and free-list recycling.
//!
//! Objects come out of slab blocks; unused cells hold the free-list links
//! themselves, so an empty pool costs nothing beyond the block memory. The
//! `debug` feature adds a per-block allocation bitmap for double-free
//! detection plus FREE/ALLOC sentinels stamped into recycled cells.

use std::alloc::{alloc, dealloc, Layout};
use std::ptr::NonNull;

use crate::util::size::align_up;

#[cfg(feature = "debug")]
const POOL_FREE_PATTERN: u32 = 0xDEAD_BEEF;
#[cfg(feature = "debug")]
const POOL_ALLOC_PATTERN: u32 = 0xABCD_EF00;

#[repr(C)]
struct FreeNode {
    next: *mut FreeNode,
    #[cfg(feature = "debug")]
    magic: u32,
}

struct Block {
    memory: NonNull<u8>,
    layout: Layout,
    num_objects: usize,
    objects_in_use: usize,
    free_list: *mut FreeNode,
    #[cfg(feature = "debug")]
    bitmap: Vec<u64>,
}

impl Block {
    fn contains(&self, ptr: *mut u8, object_size: usize) -> bool {
        let start = self.memory.as_ptr() as usize;
        let end = start + self.num_objects * object_size;
        let p = ptr as usize;
        p >= start && p < end && (p - start) % object_size == 0
    }
}

impl Drop for Block {
    fn drop(&mut self) {
        // SAFETY: memory was allocated with self.layout.
        unsafe { dealloc(self.memory.as_ptr(), self.layout) };
    }
}

/// Pool configuration.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Size of each object in bytes.
    pub object_size: usize,
    /// Alignment requirement; 0 selects one based on the size.
    pub object_align: usize,
    /// Objects per slab block; 0 selects one based on the size.
    pub objects_per_block: usize,
    /// Blocks to pre-allocate (at least one is always created).
    pub initial_blocks: usize,
    /// Name used in stats output.
    pub name: &'static str,
}

impl PoolConfig {
    /// Config for objects of `object_size` bytes with auto-tuned block size.
    pub fn for_size(object_size: usize) -> Self {
        Self {
            object_size,
            object_align: 0,
            objects_per_block: 0,
            initial_blocks: 1,
            name: "pool",
        }
    }
}

/// Fixed-size slab pool.
///
/// Not thread-safe by itself; shared pools are wrapped in a mutex by their
/// owner.
pub struct PoolAllocator {
    object_size: usize,
    object_align: usize,
    objects_per_block: usize,

    blocks: Vec<Block>,
    /// Index of the block that served the last block-level allocation.
    active_block: usize,

    /// Cross-block free list for fast reuse.
    global_free_list: *mut FreeNode,

    total_objects: usize,
    allocated_objects: usize,
    peak_allocated: usize,
    name: &'static str,
}

impl PoolAllocator {
    /// Create a pool for objects of `object_size` bytes, `objects_per_block`
    /// per slab (0 = auto).
    pub fn new(object_size: usize, objects_per_block: usize) -> PoolAllocator {
        let mut config = PoolConfig::for_size(object_size);
        config.objects_per_block = objects_per_block;
        Self::with_config(config)
    }

    /// Create a pool from an explicit configuration.
    pub fn with_config(config: PoolConfig) -> PoolAllocator {
        assert!(config.object_size > 0, "pool object size must be non-zero");

        let align = if config.object_align != 0 {
            config.object_align
        } else if config.object_size >= 16 {
            16
        } else {
            std::mem::align_of::<usize>()
        };

        // Objects must be able to hold the embedded free-list node.
        let object_size = align_up(
            config.object_size.max(std::mem::size_of::<FreeNode>()),
            align,
        );

        let objects_per_block = if config.objects_per_block != 0 {
            config.objects_per_block
        } else if object_size <= 64 {
            4096
        } else if object_size <= 256 {
            1024
        } else if object_size <= 1024 {
            256
        } else {
            64
        };

        let mut pool = PoolAllocator {
            object_size,
            object_align: align,
            objects_per_block,
            blocks: Vec::new(),
            active_block: 0,
            global_free_list: std::ptr::null_mut(),
            total_objects: 0,
            allocated_objects: 0,
            peak_allocated: 0,
            name: config.name,
        };

        for _ in 0..config.initial_blocks.max(1) {
            pool.grow();
        }
        pool
    }

    fn grow(&mut self) -> bool {
        let data_size = self.object_size * self.objects_per_block;
        let layout = match Layout::from_size_align(data_size, self.object_align) {
            Ok(l) => l,
            Err(_) => return false,
        };

        // SAFETY: layout has non-zero size.
        let raw = unsafe { alloc(layout) };
        let memory = match NonNull::new(raw) {
            Some(p) => p,
            None => return false,
        };

        let mut block = Block {
            memory,
            layout,
            num_objects: self.objects_per_block,
            objects_in_use: 0,
            free_list: std::ptr::null_mut(),
            #[cfg(feature = "debug")]
            bitmap: vec![0u64; (self.objects_per_block + 63) / 64],
        };

        Self::rebuild_free_list(&mut block, self.object_size);

        self.blocks.push(block);
        self.active_block = self.blocks.len() - 1;
        self.total_objects += self.objects_per_block;
        true
    }

    fn rebuild_free_list(block: &mut Block, object_size: usize) {
        let mut prev: *mut FreeNode = std::ptr::null_mut();
        for i in 0..block.num_objects {
            // SAFETY: i * object_size stays inside the block.
            let node = unsafe { block.memory.as_ptr().add(i * object_size) } as *mut FreeNode;
            // SAFETY: node points at writable pool memory.
            unsafe {
                (*node).next = prev;
                #[cfg(feature = "debug")]
                {
                    (*node).magic = POOL_FREE_PATTERN;
                }
            }
            prev = node;
        }
        block.free_list = prev;
    }

    fn alloc_from_block(&mut self, block_idx: usize) -> *mut u8 {
        let block = &mut self.blocks[block_idx];
        let node = block.free_list;
        if node.is_null() {
            return std::ptr::null_mut();
        }

        #[cfg(feature = "debug")]
        // SAFETY: node is a live free-list entry inside the block.
        unsafe {
            assert_eq!(
                (*node).magic,
                POOL_FREE_PATTERN,
                "pool corruption: invalid free node magic"
            );
            (*node).magic = POOL_ALLOC_PATTERN;
        }

        // SAFETY: node is a valid free-list entry.
        block.free_list = unsafe { (*node).next };
        block.objects_in_use += 1;

        #[cfg(feature = "debug")]
        {
            let index =
                (node as usize - block.memory.as_ptr() as usize) / self.object_size;
            block.bitmap[index / 64] |= 1u64 << (index % 64);
        }

        node as *mut u8
    }

    /// Allocate one object.
    ///
    /// Precedence: global free list, active block, any block with free
    /// cells, then a new block. Returns null if the system allocator fails.
    pub fn allocate(&mut self) -> *mut u8 {
        // Global free list first: cross-block reuse keeps hot objects hot.
        if !self.global_free_list.is_null() {
            let node = self.global_free_list;
            // SAFETY: node is a valid free-list entry.
            self.global_free_list = unsafe { (*node).next };

            #[cfg(feature = "debug")]
            // SAFETY: node points at pool memory.
            unsafe {
                assert_eq!(
                    (*node).magic,
                    POOL_FREE_PATTERN,
                    "pool corruption: invalid free node magic"
                );
                (*node).magic = POOL_ALLOC_PATTERN;
                self.mark_allocated(node as *mut u8);
            }

            self.allocated_objects += 1;
            self.peak_allocated = self.peak_allocated.max(self.allocated_objects);
            return node as *mut u8;
        }

        // Active block, then any block with a free cell.
        let mut ptr = self.alloc_from_block(self.active_block);
        if ptr.is_null() {
            for idx in 0..self.blocks.len() {
                if !self.blocks[idx].free_list.is_null() {
                    ptr = self.alloc_from_block(idx);
                    if !ptr.is_null() {
                        self.active_block = idx;
                        break;
                    }
                }
            }
        }

        // All blocks full: chain a new one.
        if ptr.is_null() {
            if !self.grow() {
                return std::ptr::null_mut();
            }
            ptr = self.alloc_from_block(self.active_block);
        }

        if !ptr.is_null() {
            self.allocated_objects += 1;
            self.peak_allocated = self.peak_allocated.max(self.allocated_objects);
        }
        ptr
    }

    #[cfg(feature = "debug")]
    unsafe fn mark_allocated(&mut self, ptr: *mut u8) {
        let object_size = self.object_size;
        for block in &mut self.blocks {
            if block.contains(ptr, object_size) {
                let index = (ptr as usize - block.memory.as_ptr() as usize) / object_size;
                block.bitmap[index / 64] |= 1u64 << (index % 64);
                return;
            }
        }
    }

    /// Return an object to the pool.
    ///
    /// # Safety
    /// `ptr` must have been returned by [`allocate`](Self::allocate) on this
    /// pool and not freed since.
    pub unsafe fn free(&mut self, ptr: *mut u8) {
        if ptr.is_null() {
            return;
        }

        #[cfg(feature = "debug")]
        {
            let object_size = self.object_size;
            let block = self
                .blocks
                .iter_mut()
                .find(|b| b.contains(ptr, object_size))
                .expect("pointer not from this pool");
            let index = (ptr as usize - block.memory.as_ptr() as usize) / object_size;
            let word = &mut block.bitmap[index / 64];
            let bit = 1u64 << (index % 64);
            assert!(*word & bit != 0, "double free detected");
            *word &= !bit;
        }

        let node = ptr as *mut FreeNode;
        (*node).next = self.global_free_list;
        #[cfg(feature = "debug")]
        {
            (*node).magic = POOL_FREE_PATTERN;
        }
        self.global_free_list = node;
        self.allocated_objects -= 1;
    }

    /// Whether `ptr` points into one of this pool's blocks.
    pub fn contains(&self, ptr: *mut u8) -> bool {
        self.blocks.iter().any(|b| b.contains(ptr, self.object_size))
    }

    /// Drop every outstanding object: rebuild all per-block free lists and
    /// clear the global list.
    pub fn clear(&mut self) {
        let object_size = self.object_size;
        for block in &mut self.blocks {
            block.objects_in_use = 0;
            Self::rebuild_free_list(block, object_size);
            #[cfg(feature = "debug")]
            block.bitmap.iter_mut().for_each(|w| *w = 0);
        }
        self.global_free_list = std::ptr::null_mut();
        self.allocated_objects = 0;
        self.active_block = 0;
    }

    /// Effective (aligned) object size.
    pub fn object_size(&self) -> usize {
        self.object_size
    }

    /// Objects currently allocated.
    pub fn allocated_objects(&self) -> usize {
        self.allocated_objects
    }

    /// Objects available without growing.
    pub fn free_objects(&self) -> usize {
        self.total_objects - self.allocated_objects
    }

    /// Number of slab blocks chained.
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// High-water mark of allocated objects.
    pub fn peak_allocated(&self) -> usize {
        self.peak_allocated
    }

    /// Log a usage summary.
    pub fn log_stats(&self) {
        log::debug!(
            "pool '{}': {}/{} objects in {} blocks (peak {})",
            self.name,
            self.allocated_objects,
            self.total_objects,
            self.blocks.len(),
            self.peak_allocated
        );
    }
}

// SAFETY: raw free-list pointers all point into blocks owned by the pool;
// shared access is mediated by the owner's mutex.
unsafe impl Send for PoolAllocator {}
