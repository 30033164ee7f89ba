//! Scheduler configuration.

use crate::util::size::kb;

/// Configuration for the work-stealing pool.
#[derive(Debug, Clone)]
pub struct SchedConfig {
    /// Worker threads to spawn (0 = logical cores minus one for the main
    /// thread). Worker 0 is always the submitting thread.
    pub worker_threads: usize,

    /// Capacity of each worker's local deque.
    pub local_queue_capacity: usize,

    /// Capacity hint for the global queues.
    pub global_queue_capacity: usize,

    /// Failed acquisition rounds before a worker sleeps.
    pub max_idle_spins: u32,

    /// Steal attempts per acquisition round.
    pub steal_attempts_per_round: u32,

    /// Pause iterations between steal attempts.
    pub steal_pause: u32,

    /// Enable stealing from other workers.
    pub enable_work_stealing: bool,

    /// Enable NUMA topology detection and pinning.
    pub enable_numa_awareness: bool,

    /// Small job fibers per worker.
    pub small_fibers_per_worker: usize,

    /// Large-stack job fibers per worker.
    pub large_fibers_per_worker: usize,

    /// Per-worker scratch arena size.
    pub worker_arena_size: usize,

    /// Per-group arena size.
    pub group_arena_size: usize,
}

impl Default for SchedConfig {
    fn default() -> Self {
        Self {
            worker_threads: 0,
            local_queue_capacity: 256,
            global_queue_capacity: 1024,
            max_idle_spins: 1000,
            steal_attempts_per_round: 4,
            steal_pause: 16,
            enable_work_stealing: true,
            enable_numa_awareness: true,
            small_fibers_per_worker: 64,
            large_fibers_per_worker: 8,
            worker_arena_size: kb(64),
            group_arena_size: kb(64),
        }
    }
}

impl SchedConfig {
    /// Create a minimal config for testing or constrained environments.
    pub fn minimal() -> Self {
        Self {
            worker_threads: 1,
            local_queue_capacity: 64,
            global_queue_capacity: 128,
            max_idle_spins: 100,
            steal_attempts_per_round: 2,
            steal_pause: 4,
            enable_work_stealing: true,
            enable_numa_awareness: false,
            small_fibers_per_worker: 8,
            large_fibers_per_worker: 2,
            worker_arena_size: kb(16),
            group_arena_size: kb(16),
        }
    }

    /// Builder pattern: set the worker thread count.
    pub fn with_worker_threads(mut self, count: usize) -> Self {
        self.worker_threads = count;
        self
    }

    /// Builder pattern: set the local deque capacity.
    pub fn with_local_queue_capacity(mut self, capacity: usize) -> Self {
        self.local_queue_capacity = capacity;
        self
    }

    /// Builder pattern: toggle work stealing.
    pub fn with_work_stealing(mut self, enable: bool) -> Self {
        self.enable_work_stealing = enable;
        self
    }

    /// Builder pattern: toggle NUMA awareness.
    pub fn with_numa_awareness(mut self, enable: bool) -> Self {
        self.enable_numa_awareness = enable;
        self
    }

    /// Builder pattern: set idle spin budget.
    pub fn with_max_idle_spins(mut self, spins: u32) -> Self {
        self.max_idle_spins = spins;
        self
    }

    /// Resolved worker count including the main-thread worker 0.
    pub(crate) fn resolved_worker_count(&self) -> usize {
        let threads = if self.worker_threads == 0 {
            num_cpus::get().saturating_sub(1).max(1)
        } else {
            self.worker_threads
        };
        threads + 1
    }
}
