//! The work-stealing pool: global queues, submission, sleep/wake, and the
//! process-wide scheduler instance.
//!
//! One pool owns the task table, all workers, both global injector queues,
//! and the frame profiler. Worker 0 is the thread that called `init`; it
//! participates in execution during waits. The global pool is created and
//! torn down explicitly — `init` twice is a no-op, and every other entry
//! point degrades gracefully when no pool exists.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crossbeam_queue::SegQueue;

use crate::api::config::SchedConfig;
use crate::api::error::SchedError;
use crate::api::handle::TaskHandle;
use crate::api::stats::{PoolStats, TaskPerfInfo, WorkerStats};
use crate::exec::fiber::FiberPool;
use crate::exec::numa::NumaTopology;
use crate::exec::worker::{self, Worker};
use crate::profiler::Profiler;
use crate::sync::atomics::{cpu_pause, AtomicCounter, AtomicGauge};
use crate::sync::mutex::{Condvar, Mutex};
use crate::task::{
    PushDependent, RangeFn, TaskFn, TaskOptions, TaskSlot, TaskState, TaskTable,
};

/// The work-stealing task pool.
pub struct WorkStealingPool {
    workers: Vec<Worker>,
    table: TaskTable,
    topology: NumaTopology,
    config: SchedConfig,
    epoch: Instant,
    profiler: Profiler,

    global_queue: SegQueue<u64>,
    high_priority_queue: SegQueue<u64>,

    shutdown: AtomicBool,
    active_workers: AtomicGauge,
    sleeping_workers: AtomicGauge,

    sleep_mutex: Mutex<()>,
    wake_condition: Condvar,

    tasks_submitted: AtomicCounter,
    tasks_completed: AtomicCounter,
    steal_attempts: AtomicCounter,
    steal_successes: AtomicCounter,

    join_handles: Mutex<Vec<std::thread::JoinHandle<()>>>,
}

impl WorkStealingPool {
    /// Create a pool and spawn its worker threads.
    ///
    /// The calling thread becomes worker 0.
    pub fn create(config: SchedConfig) -> Result<Arc<WorkStealingPool>, SchedError> {
        let worker_count = config.resolved_worker_count();
        let topology = NumaTopology::detect(worker_count, config.enable_numa_awareness);

        let workers = (0..worker_count)
            .map(|id| {
                let fibers = if id == 0 {
                    None
                } else {
                    Some(FiberPool::new(
                        id as u32,
                        config.small_fibers_per_worker,
                        config.large_fibers_per_worker,
                    ))
                };
                Worker::new(
                    id as u32,
                    config.local_queue_capacity,
                    config.worker_arena_size,
                    fibers,
                )
            })
            .collect();

        let pool = Arc::new(WorkStealingPool {
            workers,
            table: TaskTable::new(),
            topology,
            config,
            epoch: Instant::now(),
            profiler: Profiler::new(),
            global_queue: SegQueue::new(),
            high_priority_queue: SegQueue::new(),
            shutdown: AtomicBool::new(false),
            active_workers: AtomicGauge::new(0),
            sleeping_workers: AtomicGauge::new(0),
            sleep_mutex: Mutex::new(()),
            wake_condition: Condvar::new(),
            tasks_submitted: AtomicCounter::new(0),
            tasks_completed: AtomicCounter::new(0),
            steal_attempts: AtomicCounter::new(0),
            steal_successes: AtomicCounter::new(0),
            join_handles: Mutex::new(Vec::new()),
        });

        for id in 1..worker_count {
            let pool_ref = Arc::clone(&pool);
            let handle = std::thread::Builder::new()
                .name(format!("taskweave-worker-{}", id))
                .spawn(move || worker::worker_loop(pool_ref, id as u32))
                .map_err(|e| {
                    pool.shutdown.store(true, Ordering::SeqCst);
                    pool.wake_workers(u32::MAX);
                    SchedError::ThreadSpawn(e)
                })?;
            pool.join_handles.lock().push(handle);
        }

        // The creating thread is worker 0.
        worker::bind_thread(&pool, pool.worker(0));

        log::info!(
            "taskweave: {} workers ({} threads + main), stealing {}, numa {}",
            worker_count,
            worker_count - 1,
            if pool.config.enable_work_stealing { "on" } else { "off" },
            if pool.topology.is_available() { "on" } else { "off" },
        );

        Ok(pool)
    }

    // -- accessors ---------------------------------------------------------

    pub(crate) fn table(&self) -> &TaskTable {
        &self.table
    }

    pub(crate) fn topology(&self) -> &NumaTopology {
        &self.topology
    }

    pub(crate) fn config(&self) -> &SchedConfig {
        &self.config
    }

    pub(crate) fn profiler(&self) -> &Profiler {
        &self.profiler
    }

    pub(crate) fn worker(&self, id: u32) -> &Worker {
        &self.workers[id as usize]
    }

    /// Total workers, including the main-thread worker 0.
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Nanoseconds since pool creation.
    pub fn now_ns(&self) -> u64 {
        self.epoch.elapsed().as_nanos() as u64
    }

    pub(crate) fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    pub(crate) fn note_worker_active(&self, active: bool) {
        if active {
            self.active_workers.add(1);
        } else {
            self.active_workers.sub(1);
        }
    }

    pub(crate) fn count_steal_attempt(&self) {
        self.steal_attempts.increment();
    }

    pub(crate) fn count_steal_success(&self) {
        self.steal_successes.increment();
    }

    pub(crate) fn pop_global_high(&self) -> Option<u64> {
        self.high_priority_queue.pop()
    }

    pub(crate) fn pop_global_normal(&self) -> Option<u64> {
        self.global_queue.pop()
    }

    // -- task creation and submission --------------------------------------

    /// Create a task without submitting it.
    ///
    /// The returned task holds its construction hold until
    /// [`submit`](Self::submit). Returns the invalid handle when the task
    /// table is exhausted.
    ///
    /// `data` must stay valid until the task completes and be safe to use
    /// from whichever worker thread executes the function.
    pub fn create_task(
        &self,
        name: &'static str,
        func: TaskFn,
        data: *mut (),
        options: TaskOptions,
    ) -> TaskHandle {
        self.table
            .claim(name, Some(func), data, options, self.now_ns())
    }

    /// Add a dependency edge: `task` will not run before `depends_on`
    /// completes.
    ///
    /// Both handles must be live; `task` must not have been submitted yet.
    /// A completed (or stale) `depends_on` is a satisfied dependency and
    /// records nothing.
    pub fn add_dependency(
        &self,
        task: TaskHandle,
        depends_on: TaskHandle,
    ) -> Result<(), SchedError> {
        let task_slot = self
            .table
            .slot(task)
            .ok_or(SchedError::DependencyRejected("dependent task not live"))?;
        debug_assert_eq!(task_slot.state(), TaskState::Pending);

        let pred_slot = match self.table.slot(depends_on) {
            Some(s) => s,
            // Already recycled: treat as completed.
            None => return Ok(()),
        };

        // Hold the edge before recording it so the fan-out cannot miss it.
        task_slot.add_incoming();
        match pred_slot.push_dependent(task) {
            PushDependent::Recorded => Ok(()),
            PushDependent::AlreadyCompleted => {
                task_slot.release_incoming();
                Ok(())
            }
            PushDependent::Full => {
                task_slot.release_incoming();
                Err(SchedError::DependencyRejected("dependent list full"))
            }
        }
    }

    /// Release a created task's construction hold, making it runnable once
    /// its dependencies are satisfied.
    pub fn submit(&self, handle: TaskHandle) -> bool {
        let slot = match self.table.slot(handle) {
            Some(s) => s,
            None => return false,
        };
        if slot.state() != TaskState::Pending {
            // Cancelled (or double-submitted) tasks stay where they are.
            return false;
        }
        if slot.release_incoming() {
            self.make_ready(handle, slot);
        }
        true
    }

    /// One-shot compose of create, optional dependency, and submit.
    ///
    /// `after` is a predecessor handle or [`TaskHandle::INVALID`] for none.
    pub fn schedule(
        &self,
        name: &'static str,
        func: TaskFn,
        data: *mut (),
        after: TaskHandle,
    ) -> TaskHandle {
        self.schedule_with(name, func, data, after, TaskOptions::default())
    }

    /// [`schedule`](Self::schedule) with explicit options.
    pub fn schedule_with(
        &self,
        name: &'static str,
        func: TaskFn,
        data: *mut (),
        after: TaskHandle,
        options: TaskOptions,
    ) -> TaskHandle {
        let handle = self.create_task(name, func, data, options);
        if !handle.is_valid() {
            return TaskHandle::INVALID;
        }
        if after.is_valid() && self.add_dependency(handle, after).is_err() {
            // Fan-out limit hit: revert the claim so the slot is reusable.
            if let Some(slot) = self.table.slot(handle) {
                slot.store_state(TaskState::Cancelled);
                slot.retire();
            }
            return TaskHandle::INVALID;
        }
        self.submit(handle);
        handle
    }

    /// Mark a task ready and route it to a queue.
    fn make_ready(&self, handle: TaskHandle, slot: &TaskSlot) {
        // Only pending tasks become ready; a concurrent cancel wins here.
        if !slot.transition(TaskState::Pending, TaskState::Ready) {
            return;
        }

        // SAFETY: priority and affinity are stable after creation.
        let (priority, affinity) = {
            let payload = unsafe { slot.payload() };
            (payload.priority, payload.affinity_mask)
        };

        self.tasks_submitted.increment();

        // Local LIFO push when the submitting thread is an eligible worker.
        if let Some(current) = worker::current_worker() {
            let eligible = affinity == 0 || affinity & (1u64 << (current.id as u64 % 64)) != 0;
            if eligible && worker::push_local(current, handle.raw()) {
                self.wake_workers(1);
                return;
            }
        }

        let queue = if priority.is_high() {
            &self.high_priority_queue
        } else {
            &self.global_queue
        };
        queue.push(handle.raw());
        self.wake_workers(1);
    }

    // -- hierarchy and bulk helpers ----------------------------------------

    /// Create and submit a child task of a running parent.
    ///
    /// The parent is not considered complete until the child (and any
    /// further descendants) finish. The child inherits the parent's arena.
    pub fn spawn_child(
        &self,
        parent: TaskHandle,
        name: &'static str,
        func: TaskFn,
        data: *mut (),
    ) -> TaskHandle {
        let parent_slot = match self.table.slot(parent) {
            Some(s) => s,
            None => return TaskHandle::INVALID,
        };

        let child = self.create_task(name, func, data, TaskOptions::default());
        if !child.is_valid() {
            return TaskHandle::INVALID;
        }

        parent_slot.add_unfinished();
        {
            let child_slot = self.table.slot(child).expect("fresh child slot");
            // SAFETY: creator-exclusive access before submission.
            let child_payload = unsafe { child_slot.payload_mut() };
            child_payload.parent = parent;
            child_payload.arena = unsafe { parent_slot.payload() }.arena;
        }

        self.submit(child);
        child
    }

    /// Fan `count` iterations out as batched child tasks.
    ///
    /// Returns a parent handle to wait on; `batch_size` 0 divides the range
    /// evenly across workers.
    pub fn parallel_for(
        &self,
        name: &'static str,
        count: u32,
        batch_size: u32,
        func: RangeFn,
        data: *mut (),
    ) -> TaskHandle {
        let workers = self.worker_count() as u32;
        let batch_size = if batch_size == 0 {
            ((count + workers - 1) / workers).max(1)
        } else {
            batch_size
        };

        let parent = self
            .table
            .claim(name, None, std::ptr::null_mut(), TaskOptions::default(), self.now_ns());
        if !parent.is_valid() {
            return TaskHandle::INVALID;
        }
        let parent_slot = self.table.slot(parent).expect("fresh parent slot");

        let batch_count = (count + batch_size - 1) / batch_size;
        let mut batches = Box::new(Vec::with_capacity(batch_count as usize));
        for i in 0..batch_count {
            batches.push(RangeBatch {
                start: i * batch_size,
                end: ((i + 1) * batch_size).min(count),
                func,
                data,
            });
        }

        // The batch storage lives until the parent completes.
        let batches_ptr = Box::into_raw(batches);
        {
            // SAFETY: creator-exclusive access before submission.
            let payload = unsafe { parent_slot.payload_mut() };
            payload.cleanup = Some(drop_range_batches);
            payload.cleanup_data = batches_ptr as *mut ();
        }

        // SAFETY: just leaked, freed by the parent's cleanup hook.
        let batches = unsafe { &*batches_ptr };
        for batch in batches.iter() {
            let child = self.create_task(
                "parallel_for_batch",
                run_range_batch,
                batch as *const RangeBatch as *mut (),
                TaskOptions::default(),
            );
            if !child.is_valid() {
                // Table exhausted: run the remainder inline to keep the
                // contract that every iteration executes.
                (batch.func)(batch.start, batch.end, batch.data);
                continue;
            }
            parent_slot.add_unfinished();
            let child_slot = self.table.slot(child).expect("fresh child slot");
            // SAFETY: creator-exclusive access before submission.
            unsafe { child_slot.payload_mut() }.parent = parent;
            self.submit(child);
        }

        self.submit(parent);
        parent
    }

    // -- completion --------------------------------------------------------

    /// Called after a task's function returns: drops its self hold and
    /// completes it once all spawned children are done.
    pub(crate) fn finish_task(&self, handle: TaskHandle) {
        let slot = match self.table.slot(handle) {
            Some(s) => s,
            None => return,
        };
        if slot.release_unfinished() {
            self.complete_task(handle, slot, TaskState::Completed);
        }
    }

    /// Terminal transition: record times, fan out to dependents, notify
    /// group and parent, retire the slot.
    fn complete_task(&self, handle: TaskHandle, slot: &TaskSlot, terminal: TaskState) {
        debug_assert!(terminal.is_terminal());

        // SAFETY: completion-winner access (last unfinished hold, or the
        // cancel CAS winner).
        let payload = unsafe { slot.payload_mut() };
        payload.completed_ns = self.now_ns();
        let group = payload.group;
        let parent = payload.parent;
        let cleanup = payload.cleanup.take();
        let cleanup_data = payload.cleanup_data;

        slot.store_state(terminal);

        // Release dependents.
        let dependents = slot.take_dependents();
        for raw in dependents {
            let child = TaskHandle::from_raw(raw);
            if let Some(child_slot) = self.table.slot(child) {
                if child_slot.release_incoming() {
                    self.make_ready(child, child_slot);
                }
            }
        }

        if let Some(cleanup) = cleanup {
            // SAFETY: the cleanup hook owns cleanup_data by construction.
            unsafe { cleanup(cleanup_data) };
        }

        if !group.is_null() {
            // SAFETY: member tasks keep their group alive by contract.
            unsafe { crate::task::group::notify_complete(group, self) };
        }

        self.tasks_completed.increment();
        slot.retire();

        // Hierarchical completion: the parent may have been waiting on us.
        if parent.is_valid() {
            if let Some(parent_slot) = self.table.slot(parent) {
                if parent_slot.release_unfinished() {
                    self.complete_task(parent, parent_slot, TaskState::Completed);
                }
            }
        }

        self.wake_workers(1);
    }

    /// Cancel a task that has not started running.
    ///
    /// The completion fan-out still fires so dependents advance. Running
    /// tasks cannot be preempted; cancelling a completed or stale handle is
    /// a no-op. Returns whether this call performed the cancellation.
    pub fn cancel(&self, handle: TaskHandle) -> bool {
        let slot = match self.table.slot(handle) {
            Some(s) => s,
            None => return false,
        };
        if slot.transition(TaskState::Pending, TaskState::Cancelled)
            || slot.transition(TaskState::Ready, TaskState::Cancelled)
        {
            self.complete_task(handle, slot, TaskState::Cancelled);
            return true;
        }
        false
    }

    // -- waiting -----------------------------------------------------------

    /// Whether the referenced task has reached a terminal state (stale
    /// handles count as complete).
    pub fn is_complete(&self, handle: TaskHandle) -> bool {
        self.table.is_complete(handle)
    }

    /// Block until the task completes, executing other work meanwhile.
    ///
    /// Reentrant: callable from the main thread, from worker threads, and
    /// from inside tasks (where it cooperatively yields between attempts).
    pub fn wait(&self, handle: TaskHandle) {
        while !self.table.is_complete(handle) {
            if !self.help_one() {
                cpu_pause();
            }
            worker::yield_now();
        }
    }

    /// Wait until every submitted task has completed.
    pub fn wait_idle(&self) {
        while self.tasks_submitted.get() > self.tasks_completed.get() {
            if !self.help_one() {
                cpu_pause();
            }
        }
    }

    /// Execute up to `max_tasks` tasks on the calling thread.
    pub fn process_tasks(&self, max_tasks: u32) -> u32 {
        let mut processed = 0;
        while processed < max_tasks {
            if !self.help_one() {
                break;
            }
            processed += 1;
        }
        processed
    }

    /// Acquire and run one task on the calling thread. Returns false when
    /// no work was found.
    pub(crate) fn help_one(&self) -> bool {
        let current = match worker::current_worker() {
            Some(w) => w,
            None => return false,
        };
        match worker::acquire_task(self, current) {
            Some(raw) => {
                worker::dispatch(self, current, raw);
                true
            }
            None => false,
        }
    }

    // -- sleep / wake ------------------------------------------------------

    pub(crate) fn worker_sleep(&self, worker: &Worker) {
        self.sleeping_workers.add(1);

        let guard = self.sleep_mutex.lock();
        // Re-check under the lock: a submission may have raced our decision
        // to sleep.
        let should_sleep = worker.deque.is_empty()
            && self.high_priority_queue.is_empty()
            && self.global_queue.is_empty()
            && !self.is_shutdown();
        if should_sleep {
            let sleep_start = self.now_ns();
            let guard = self.wake_condition.wait(guard);
            worker.idle_ns.add(self.now_ns() - sleep_start);
            drop(guard);
        } else {
            drop(guard);
        }

        self.sleeping_workers.sub(1);
    }

    pub(crate) fn wake_workers(&self, count: u32) {
        if count == 0 || self.sleeping_workers.get() == 0 {
            return;
        }
        let _guard = self.sleep_mutex.lock();
        if count == 1 {
            self.wake_condition.notify_one();
        } else {
            self.wake_condition.notify_all();
        }
    }

    // -- frame hooks -------------------------------------------------------

    /// Begin a profiler frame.
    pub fn frame_start(&self) {
        self.profiler.frame_start(self.now_ns());
    }

    /// End the frame: emit the profiler timeline, reclaim retired deque
    /// buffers, and (when the pool is quiescent) reset worker arenas.
    ///
    /// Call after the frame's tasks have completed.
    pub fn frame_end(&self) {
        self.profiler
            .frame_end(self.now_ns(), self.worker_count() as u32);

        for worker in &self.workers {
            worker.deque.reclaim_retired();
        }

        if self.tasks_submitted.get() == self.tasks_completed.get() {
            for worker in &self.workers {
                // SAFETY: no task is in flight, so every worker arena is
                // quiescent.
                unsafe { (*worker.arena.get()).reset() };
            }
        }
    }

    // -- introspection -----------------------------------------------------

    /// Timing and placement info for a live or recently completed task.
    pub fn perf_info(&self, handle: TaskHandle) -> Option<TaskPerfInfo> {
        self.table.perf_info(handle)
    }

    /// Pool-wide statistics snapshot.
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            worker_count: self.worker_count() as u32,
            active_workers: self.active_workers.get() as u32,
            sleeping_workers: self.sleeping_workers.get() as u32,
            tasks_submitted: self.tasks_submitted.get(),
            tasks_completed: self.tasks_completed.get(),
            steal_attempts: self.steal_attempts.get(),
            steal_successes: self.steal_successes.get(),
            global_queue_len: self.global_queue.len(),
            high_priority_queue_len: self.high_priority_queue.len(),
        }
    }

    /// Per-worker statistics snapshots.
    pub fn worker_stats(&self) -> Vec<WorkerStats> {
        self.workers
            .iter()
            .map(|w| WorkerStats {
                worker_id: w.id,
                tasks_executed: w.tasks_executed.get(),
                local_pushes: w.local_pushes.get(),
                local_pops: w.local_pops.get(),
                steals_attempted: w.steals_attempted.get(),
                steals_succeeded: w.steals_succeeded.get(),
                idle_ns: w.idle_ns.get(),
                queue_len: w.deque.len(),
            })
            .collect()
    }

    /// Reset pool and worker statistics.
    pub fn reset_stats(&self) {
        self.tasks_submitted.reset();
        self.tasks_completed.reset();
        self.steal_attempts.reset();
        self.steal_successes.reset();
        for w in &self.workers {
            w.tasks_executed.reset();
            w.local_pushes.reset();
            w.local_pops.reset();
            w.steals_attempted.reset();
            w.steals_succeeded.reset();
            w.idle_ns.reset();
        }
    }

    /// Log the pool statistics.
    pub fn log_stats(&self) {
        log::info!("{}", self.stats());
        for stats in self.worker_stats() {
            log::debug!("{}", stats);
        }
    }

    // -- shutdown ----------------------------------------------------------

    /// Signal shutdown, wake everyone, and join the worker threads.
    pub fn shutdown_and_join(&self) {
        if self.shutdown.swap(true, Ordering::SeqCst) {
            return;
        }

        {
            let _guard = self.sleep_mutex.lock();
            self.wake_condition.notify_all();
        }

        let handles: Vec<_> = self.join_handles.lock().drain(..).collect();
        for handle in handles {
            let _ = handle.join();
        }

        worker::unbind_thread();
        if self.table.live_count() > 0 {
            log::debug!(
                "taskweave: {} live task slots at shutdown",
                self.table.live_count()
            );
        }
        log::info!(
            "taskweave: shut down after {} tasks",
            self.tasks_completed.get()
        );
    }
}

impl Drop for WorkStealingPool {
    fn drop(&mut self) {
        self.shutdown_and_join();
    }
}

// ---------------------------------------------------------------------------
// parallel_for support
// ---------------------------------------------------------------------------

pub(crate) struct RangeBatch {
    start: u32,
    end: u32,
    func: RangeFn,
    data: *mut (),
}

fn run_range_batch(data: *mut ()) {
    // SAFETY: the batch storage outlives its parent task.
    let batch = unsafe { &*(data as *const RangeBatch) };
    (batch.func)(batch.start, batch.end, batch.data);
}

unsafe fn drop_range_batches(data: *mut ()) {
    drop(Box::from_raw(data as *mut Vec<RangeBatch>));
}

// ---------------------------------------------------------------------------
// Global pool
// ---------------------------------------------------------------------------

static GLOBAL_POOL: Mutex<Option<Arc<WorkStealingPool>>> = Mutex::new(None);

/// Initialize the global scheduler with the default configuration.
///
/// A second init without an intervening [`shutdown`] is a no-op.
pub fn init() -> Result<(), SchedError> {
    init_with_config(SchedConfig::default())
}

/// Initialize the global scheduler with an explicit configuration.
pub fn init_with_config(config: SchedConfig) -> Result<(), SchedError> {
    let mut slot = GLOBAL_POOL.lock();
    if slot.is_some() {
        return Ok(());
    }
    *slot = Some(WorkStealingPool::create(config)?);
    Ok(())
}

/// Tear the global scheduler down, joining all worker threads.
pub fn shutdown() {
    let pool = GLOBAL_POOL.lock().take();
    if let Some(pool) = pool {
        pool.shutdown_and_join();
    }
}

/// The global pool, if initialized.
pub fn global() -> Option<Arc<WorkStealingPool>> {
    GLOBAL_POOL.lock().clone()
}

/// Run a closure against the global pool.
pub(crate) fn with_global<R>(f: impl FnOnce(&WorkStealingPool) -> R) -> Option<R> {
    let pool = global()?;
    Some(f(&pool))
}

// ---------------------------------------------------------------------------
// Global facade
// ---------------------------------------------------------------------------

/// Schedule a task on the global pool; see [`WorkStealingPool::schedule`].
///
/// Returns the invalid handle when the scheduler is not initialized or the
/// task table is exhausted.
pub fn schedule(name: &'static str, func: TaskFn, data: *mut (), after: TaskHandle) -> TaskHandle {
    with_global(|p| p.schedule(name, func, data, after)).unwrap_or(TaskHandle::INVALID)
}

/// Schedule with explicit options on the global pool.
pub fn schedule_with(
    name: &'static str,
    func: TaskFn,
    data: *mut (),
    after: TaskHandle,
    options: TaskOptions,
) -> TaskHandle {
    with_global(|p| p.schedule_with(name, func, data, after, options))
        .unwrap_or(TaskHandle::INVALID)
}

/// Create an unsubmitted task on the global pool.
pub fn create_task(
    name: &'static str,
    func: TaskFn,
    data: *mut (),
    options: TaskOptions,
) -> TaskHandle {
    with_global(|p| p.create_task(name, func, data, options)).unwrap_or(TaskHandle::INVALID)
}

/// Add a dependency edge on the global pool.
pub fn add_dependency(task: TaskHandle, depends_on: TaskHandle) -> Result<(), SchedError> {
    with_global(|p| p.add_dependency(task, depends_on)).unwrap_or(Err(SchedError::NotInitialized))
}

/// Submit a created task on the global pool.
pub fn submit(handle: TaskHandle) -> bool {
    with_global(|p| p.submit(handle)).unwrap_or(false)
}

/// Wait for a task on the global pool.
pub fn wait(handle: TaskHandle) {
    with_global(|p| p.wait(handle));
}

/// Whether a task has completed on the global pool.
pub fn is_complete(handle: TaskHandle) -> bool {
    with_global(|p| p.is_complete(handle)).unwrap_or(true)
}

/// Cancel a not-yet-running task on the global pool.
pub fn cancel(handle: TaskHandle) -> bool {
    with_global(|p| p.cancel(handle)).unwrap_or(false)
}

/// Spawn a child of a running task on the global pool.
pub fn spawn_child(
    parent: TaskHandle,
    name: &'static str,
    func: TaskFn,
    data: *mut (),
) -> TaskHandle {
    with_global(|p| p.spawn_child(parent, name, func, data)).unwrap_or(TaskHandle::INVALID)
}

/// Parallel-for on the global pool.
pub fn parallel_for(
    name: &'static str,
    count: u32,
    batch_size: u32,
    func: RangeFn,
    data: *mut (),
) -> TaskHandle {
    with_global(|p| p.parallel_for(name, count, batch_size, func, data))
        .unwrap_or(TaskHandle::INVALID)
}

/// Timing info for a task on the global pool.
pub fn perf_info(handle: TaskHandle) -> Option<TaskPerfInfo> {
    with_global(|p| p.perf_info(handle)).flatten()
}

/// Global pool statistics.
pub fn stats() -> Option<PoolStats> {
    with_global(|p| p.stats())
}

/// Begin a profiler frame on the global pool.
pub fn frame_start() {
    with_global(|p| p.frame_start());
}

/// End a profiler frame on the global pool.
pub fn frame_end() {
    with_global(|p| p.frame_end());
}

/// The scratch arena for the current task (group or parent arena when
/// inherited, the worker's arena otherwise).
///
/// Null when called off-pool. Single-writer contract applies.
pub fn current_arena() -> *mut crate::memory::arena::Arena {
    let Some(worker) = worker::current_worker() else {
        return std::ptr::null_mut();
    };
    let Some(pool) = worker::current_pool() else {
        return std::ptr::null_mut();
    };

    let raw = worker.current_task.load(Ordering::Relaxed);
    if raw != 0 {
        if let Some(slot) = pool.table().slot(TaskHandle::from_raw(raw)) {
            // SAFETY: arena pointer is stable after submission.
            let arena = unsafe { slot.payload() }.arena;
            if !arena.is_null() {
                return arena;
            }
        }
    }
    worker.arena.get()
}
