//! Scheduler statistics.

/// Pool-wide statistics snapshot.
#[derive(Debug, Clone, Default)]
pub struct PoolStats {
    /// Total workers, including the main-thread worker 0.
    pub worker_count: u32,

    /// Workers currently running their scheduler loop.
    pub active_workers: u32,

    /// Workers asleep on the wake condition.
    pub sleeping_workers: u32,

    /// Tasks submitted since init (or the last reset).
    pub tasks_submitted: u64,

    /// Tasks completed since init (or the last reset).
    pub tasks_completed: u64,

    /// Steal attempts across all workers.
    pub steal_attempts: u64,

    /// Successful steals across all workers.
    pub steal_successes: u64,

    /// Entries currently in the normal global queue.
    pub global_queue_len: usize,

    /// Entries currently in the high-priority global queue.
    pub high_priority_queue_len: usize,
}

impl PoolStats {
    /// Tasks submitted but not yet completed.
    pub fn tasks_pending(&self) -> u64 {
        self.tasks_submitted.saturating_sub(self.tasks_completed)
    }

    /// Fraction of steal attempts that succeeded.
    pub fn steal_success_rate(&self) -> f64 {
        if self.steal_attempts == 0 {
            0.0
        } else {
            self.steal_successes as f64 / self.steal_attempts as f64
        }
    }
}

impl std::fmt::Display for PoolStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Thread Pool Statistics:")?;
        writeln!(
            f,
            "  Workers: {} active, {} sleeping, {} total",
            self.active_workers, self.sleeping_workers, self.worker_count
        )?;
        writeln!(
            f,
            "  Tasks: {} submitted, {} completed, {} pending",
            self.tasks_submitted,
            self.tasks_completed,
            self.tasks_pending()
        )?;
        writeln!(
            f,
            "  Work stealing: {} attempts, {} successes ({:.2}% success rate)",
            self.steal_attempts,
            self.steal_successes,
            self.steal_success_rate() * 100.0
        )?;
        writeln!(
            f,
            "  Queue sizes: global={}, high priority={}",
            self.global_queue_len, self.high_priority_queue_len
        )?;
        Ok(())
    }
}

/// Per-worker statistics snapshot.
#[derive(Debug, Clone, Default)]
pub struct WorkerStats {
    /// Worker id (0 = main thread).
    pub worker_id: u32,

    /// Tasks this worker executed.
    pub tasks_executed: u64,

    /// Pushes to the local deque.
    pub local_pushes: u64,

    /// Pops from the local deque.
    pub local_pops: u64,

    /// Steal attempts made by this worker.
    pub steals_attempted: u64,

    /// Steals that returned a task.
    pub steals_succeeded: u64,

    /// Nanoseconds spent asleep.
    pub idle_ns: u64,

    /// Tasks currently queued in the local deque.
    pub queue_len: usize,
}

impl WorkerStats {
    /// Fraction of this worker's steal attempts that succeeded.
    pub fn steal_success_rate(&self) -> f64 {
        if self.steals_attempted == 0 {
            0.0
        } else {
            self.steals_succeeded as f64 / self.steals_attempted as f64
        }
    }
}

impl std::fmt::Display for WorkerStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Worker {}: executed={}, pushes={}, pops={}, steals={}/{}, queued={}",
            self.worker_id,
            self.tasks_executed,
            self.local_pushes,
            self.local_pops,
            self.steals_succeeded,
            self.steals_attempted,
            self.queue_len
        )
    }
}

/// Timing and placement record for a single task.
#[derive(Debug, Clone, Copy, Default)]
pub struct TaskPerfInfo {
    /// Nanoseconds (pool epoch) when the task was created.
    pub created_ns: u64,

    /// Nanoseconds when execution started.
    pub started_ns: u64,

    /// Nanoseconds when the task completed.
    pub completed_ns: u64,

    /// Worker that executed the task.
    pub worker_id: u32,

    /// Number of recorded dependents.
    pub dependent_count: u32,
}

impl TaskPerfInfo {
    /// Time spent executing.
    pub fn execution_ns(&self) -> u64 {
        self.completed_ns.saturating_sub(self.started_ns)
    }

    /// Time spent waiting between creation and start.
    pub fn wait_ns(&self) -> u64 {
        self.started_ns.saturating_sub(self.created_ns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_steal_rate() {
        let stats = PoolStats {
            steal_attempts: 10,
            steal_successes: 4,
            ..Default::default()
        };
        assert!((stats.steal_success_rate() - 0.4).abs() < 1e-9);
    }

    #[test]
    fn test_pending() {
        let stats = PoolStats {
            tasks_submitted: 10,
            tasks_completed: 7,
            ..Default::default()
        };
        assert_eq!(stats.tasks_pending(), 3);
    }

    #[test]
    fn test_perf_durations() {
        let info = TaskPerfInfo {
            created_ns: 100,
            started_ns: 250,
            completed_ns: 400,
            ..Default::default()
        };
        assert_eq!(info.wait_ns(), 150);
        assert_eq!(info.execution_ns(), 150);
    }
}
