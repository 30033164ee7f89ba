//! Transient memory tour: arena scopes, slab pools, aligned heap blocks.

use taskweave::{Arena, HeapAlloc, PoolAllocator};

#[derive(Debug)]
#[allow(dead_code)]
struct Particle {
    position: [f32; 3],
    velocity: [f32; 3],
    age: f32,
}

fn main() {
    // Frame arena: bump allocations, rolled back wholesale.
    let mut arena = Arena::with_capacity(64 * 1024);
    for frame in 0..3 {
        let scratch = arena.alloc_zeroed(256, 4);
        let used = arena.total_used();
        let name = arena.strdup("explosion_emitter");
        println!("frame {}: '{}' scratch at {:p}, {} bytes used", frame, name, scratch, used);

        // Nested scope: everything after the mark disappears on restore.
        let mark = arena.mark();
        arena.alloc(16 * 1024);
        arena.restore(mark);

        arena.reset();
    }

    // Slab pool: fixed-size particles with free-list recycling.
    let mut pool = PoolAllocator::new(std::mem::size_of::<Particle>(), 256);
    let mut live = Vec::new();
    for _ in 0..512 {
        let p = pool.allocate() as *mut Particle;
        assert!(!p.is_null());
        live.push(p);
    }
    println!(
        "pool: {} particles across {} blocks (peak {})",
        pool.allocated_objects(),
        pool.block_count(),
        pool.peak_allocated()
    );
    for p in live.drain(..) {
        unsafe { pool.free(p as *mut u8) };
    }
    println!("pool: {} free after recycle", pool.free_objects());

    // Heap facade: cache-line-aligned blocks with matching frees.
    let heap = HeapAlloc::new();
    let block = heap.alloc_cache_aligned(4096);
    println!(
        "heap: 4096 bytes at {:p} ({} outstanding)",
        block,
        heap.allocated_bytes()
    );
    unsafe { heap.free_aligned(block, 4096, 64) };
}
