//! Memory subsystem: general allocation, arenas, and object pools.

pub mod arena;
pub mod heap;
pub mod pool;

pub use arena::{Arena, ArenaMark};
pub use pool::{PoolAllocator, PoolConfig};
