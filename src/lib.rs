//! # taskweave
//!
//! Fiber-based, work-stealing task scheduling for Rust game engines.
//!
//! ## Features
//!
//! - Chase-Lev work-stealing deques with a two-tier global queue
//! - Stackful job fibers with cooperative yield (small and large stacks)
//! - Dependency DAGs over generation-checked task handles
//! - Task groups with continuations and hierarchical fork/join
//! - NUMA-aware victim selection with thread pinning
//! - Arena and slab-pool transient memory
//! - Per-frame worker timeline profiler
//! - Fixed-timestep application loop
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use taskweave::TaskHandle;
//!
//! taskweave::init().unwrap();
//!
//! fn load(_data: *mut ()) { /* ... */ }
//! fn build(_data: *mut ()) { /* ... */ }
//!
//! let load = taskweave::schedule("load", load, std::ptr::null_mut(), TaskHandle::INVALID);
//! let build = taskweave::schedule("build", build, std::ptr::null_mut(), load);
//! taskweave::wait(build);
//!
//! taskweave::shutdown();
//! ```

// Internal modules (not directly exported)
#[allow(dead_code)]
mod api;
#[allow(dead_code)]
mod sync;
#[allow(dead_code)]
mod util;

mod deque;
mod exec;
mod memory;
mod profiler;
mod task;

// Client-facing surfaces
pub mod app;
pub mod config;
pub mod input;

// Core API re-exports
pub use api::config::SchedConfig;
pub use api::error::{AppError, ConfigError, SchedError};
pub use api::handle::TaskHandle;
pub use api::stats::{PoolStats, TaskPerfInfo, WorkerStats};

pub use task::group::TaskGroup;
pub use task::{RangeFn, TaskFn, TaskOptions, TaskPriority, TaskState, MAX_DEPENDENTS, TASK_TABLE_SIZE};

pub use exec::pool::{
    add_dependency, cancel, create_task, current_arena, frame_end, frame_start, global, init,
    init_with_config, is_complete, parallel_for, perf_info, schedule, schedule_with, shutdown,
    spawn_child, stats, submit, wait, WorkStealingPool,
};
pub use exec::worker::{current_worker_id, yield_now};

pub use memory::arena::{Arena, ArenaMark};
pub use memory::heap::HeapAlloc;
pub use memory::pool::{PoolAllocator, PoolConfig};

pub use profiler::{ProfilerEvent, MAX_PROFILER_EVENTS};
