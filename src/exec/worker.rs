//! Worker records, thread-local worker lookup, and the scheduler loop.
//!
//! Worker 0 is the submitting ("main") thread: it owns a deque and an
//! arena like any other worker but has no fiber pool and no scheduler
//! loop; it executes tasks inline while waiting. Workers 1..N each run
//! [`worker_loop`] on their own OS thread.

use std::cell::UnsafeCell;
use std::ptr;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use crate::api::handle::TaskHandle;
use crate::deque::{Deque, PushResult, Steal};
use crate::exec::fiber::{decode_fiber, Fiber, FiberPool, FiberStatus, FIBER_NONE};
use crate::exec::pool::WorkStealingPool;
use crate::memory::arena::Arena;
use crate::sync::atomics::{cpu_pause, spin, AtomicCounter};
use crate::task::{TaskSlot, TaskState};

/// Per-worker record.
pub(crate) struct Worker {
    pub id: u32,
    pub deque: Deque,
    /// Job fibers; `None` for the main-thread worker 0.
    pub fibers: Option<FiberPool>,
    /// Thread-local scratch, reset at frame boundaries.
    pub arena: UnsafeCell<Arena>,

    /// Owner-thread execution context.
    pub current_task: AtomicU64,
    pub current_fiber: AtomicU32,
    pub inline_depth: AtomicU32,
    rng: AtomicU32,

    // Statistics.
    pub tasks_executed: AtomicCounter,
    pub local_pushes: AtomicCounter,
    pub local_pops: AtomicCounter,
    pub steals_attempted: AtomicCounter,
    pub steals_succeeded: AtomicCounter,
    pub idle_ns: AtomicCounter,
}

// SAFETY: the arena and the context cells are touched only by the thread
// currently driving this worker; everything else is atomic.
unsafe impl Sync for Worker {}
unsafe impl Send for Worker {}

impl Worker {
    pub(crate) fn new(
        id: u32,
        local_queue_capacity: usize,
        arena_size: usize,
        fibers: Option<FiberPool>,
    ) -> Worker {
        Worker {
            id,
            deque: Deque::new(local_queue_capacity),
            fibers,
            arena: UnsafeCell::new(Arena::with_capacity(arena_size)),
            current_task: AtomicU64::new(0),
            current_fiber: AtomicU32::new(FIBER_NONE),
            inline_depth: AtomicU32::new(0),
            rng: AtomicU32::new(id.wrapping_mul(0x9e37_79b9) | 1),
            tasks_executed: AtomicCounter::new(0),
            local_pushes: AtomicCounter::new(0),
            local_pops: AtomicCounter::new(0),
            steals_attempted: AtomicCounter::new(0),
            steals_succeeded: AtomicCounter::new(0),
            idle_ns: AtomicCounter::new(0),
        }
    }

    pub(crate) fn reseed(&self, seed: u32) {
        self.rng.store(seed | 1, Ordering::Relaxed);
    }
}

thread_local! {
    static CURRENT_WORKER: std::cell::Cell<*const Worker> =
        const { std::cell::Cell::new(ptr::null()) };
    static CURRENT_POOL: std::cell::Cell<*const WorkStealingPool> =
        const { std::cell::Cell::new(ptr::null()) };
}

pub(crate) fn bind_thread(pool: &WorkStealingPool, worker: &Worker) {
    CURRENT_WORKER.with(|c| c.set(worker));
    CURRENT_POOL.with(|c| c.set(pool));
}

pub(crate) fn unbind_thread() {
    CURRENT_WORKER.with(|c| c.set(ptr::null()));
    CURRENT_POOL.with(|c| c.set(ptr::null()));
}

/// The worker driving the current thread, if any.
pub(crate) fn current_worker<'a>() -> Option<&'a Worker> {
    let ptr = CURRENT_WORKER.with(|c| c.get());
    if ptr.is_null() {
        None
    } else {
        // SAFETY: the pointer targets a worker inside the pool, which is
        // kept alive until shutdown unbinds every thread.
        Some(unsafe { &*ptr })
    }
}

/// The pool bound to the current thread, if any.
pub(crate) fn current_pool<'a>() -> Option<&'a WorkStealingPool> {
    let ptr = CURRENT_POOL.with(|c| c.get());
    if ptr.is_null() {
        None
    } else {
        // SAFETY: see current_worker.
        Some(unsafe { &*ptr })
    }
}

/// Worker id of the calling thread (0 when called off-pool).
pub fn current_worker_id() -> u32 {
    current_worker().map(|w| w.id).unwrap_or(0)
}

// ---------------------------------------------------------------------------
// Scheduler loop
// ---------------------------------------------------------------------------

/// Entry point for worker threads 1..N.
pub(crate) fn worker_loop(pool: Arc<WorkStealingPool>, worker_id: u32) {
    let worker = pool.worker(worker_id);
    bind_thread(&pool, worker);

    pool.topology().pin_current_thread(worker_id);
    worker.reseed(worker_id.wrapping_mul(0x9e37_79b9) ^ pool.now_ns() as u32);

    pool.note_worker_active(true);

    let mut idle_spins = 0u32;
    while !pool.is_shutdown() {
        match acquire_task(&pool, worker) {
            Some(raw) => {
                idle_spins = 0;
                dispatch(&pool, worker, raw);
            }
            None => {
                idle_spins += 1;
                if idle_spins < pool.config().max_idle_spins {
                    cpu_pause();
                } else {
                    pool.worker_sleep(worker);
                    idle_spins = 0;
                }
            }
        }
    }

    pool.note_worker_active(false);
    unbind_thread();
}

/// Acquire one runnable task: local deque, then steal, then the global
/// queues.
pub(crate) fn acquire_task(pool: &WorkStealingPool, worker: &Worker) -> Option<u64> {
    if let Some(raw) = worker.deque.pop_bottom() {
        worker.local_pops.increment();
        return Some(raw);
    }

    if let Some(raw) = steal_round(pool, worker) {
        return Some(raw);
    }

    if let Some(raw) = pool.pop_global_high() {
        return Some(raw);
    }
    pool.pop_global_normal()
}

/// One round of victim selection and stealing.
fn steal_round(pool: &WorkStealingPool, worker: &Worker) -> Option<u64> {
    let config = pool.config();
    if !config.enable_work_stealing || pool.worker_count() <= 1 {
        return None;
    }

    let mut rng = worker.rng.load(Ordering::Relaxed);
    let mut pause_mult = 1u32;

    for _ in 0..config.steal_attempts_per_round {
        let (victim_id, remote) =
            pool.topology()
                .select_victim(worker.id, pool.worker_count() as u32, &mut rng);
        let victim = pool.worker(victim_id);

        worker.steals_attempted.increment();
        pool.count_steal_attempt();

        match victim.deque.steal() {
            Steal::Taken(raw) => {
                worker.rng.store(rng, Ordering::Relaxed);
                worker.steals_succeeded.increment();
                pool.count_steal_success();
                return Some(raw);
            }
            Steal::Aborted | Steal::Empty => {}
        }

        // Cross-node steals back off harder to dampen remote traffic.
        if remote {
            pause_mult = 4;
        }
        spin(config.steal_pause * pause_mult);
    }

    worker.rng.store(rng, Ordering::Relaxed);
    None
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

/// Run one dequeued task to its next suspension point.
pub(crate) fn dispatch(pool: &WorkStealingPool, worker: &Worker, raw: u64) {
    let handle = TaskHandle::from_raw(raw);
    let slot = match pool.table().slot(handle) {
        Some(s) => s,
        // Stale entry: the task completed (or was cancelled) and its slot
        // moved on.
        None => return,
    };

    if !slot.transition(TaskState::Ready, TaskState::Running) {
        return;
    }

    // SAFETY: winning the Ready -> Running transition grants payload access.
    let payload = unsafe { slot.payload_mut() };
    if payload.started_ns == 0 {
        payload.started_ns = pool.now_ns();
    }
    payload.worker_id = worker.id;
    let name = payload.name;
    let large_stack = payload.large_stack;
    let suspended = payload.fiber;
    payload.fiber = FIBER_NONE;

    let start_ns = pool.now_ns();
    let prev_task = worker.current_task.swap(raw, Ordering::Relaxed);

    if suspended != FIBER_NONE {
        resume_fiber(pool, worker, suspended);
    } else {
        let fiber = worker.fibers.as_ref().and_then(|f| f.acquire(large_stack));
        match fiber {
            Some(fiber) => {
                // SAFETY: we hold the claim from acquire().
                unsafe { fiber.assign(pool, raw) };
                run_fiber(pool, worker, fiber);
            }
            None => execute_inline(pool, worker, raw),
        }
    }

    worker.current_task.store(prev_task, Ordering::Relaxed);
    worker.tasks_executed.increment();
    pool.profiler().record(start_ns, pool.now_ns(), worker.id, name);
}

/// Resume a suspended fiber, wherever it lives.
fn resume_fiber(pool: &WorkStealingPool, worker: &Worker, fiber_id: u32) {
    let (owner, _, _) = decode_fiber(fiber_id);
    let fiber = pool
        .worker(owner)
        .fibers
        .as_ref()
        .expect("suspended fiber belongs to a fiberless worker")
        .fiber(fiber_id);
    // SAFETY: a yielded fiber is exclusively owned by its task, and we won
    // that task's Ready -> Running transition.
    unsafe { fiber.prepare_resume(pool) };
    run_fiber(pool, worker, fiber);
}

/// Switch into a fiber and handle its exit status.
fn run_fiber(pool: &WorkStealingPool, worker: &Worker, fiber: &Fiber) {
    let prev_fiber = worker.current_fiber.swap(fiber.id(), Ordering::Relaxed);
    // SAFETY: claim is held; the fiber has a job assigned or suspended.
    let status = unsafe { fiber.run() };
    worker.current_fiber.store(prev_fiber, Ordering::Relaxed);

    match status {
        FiberStatus::Finished => {
            let (owner, _, _) = decode_fiber(fiber.id());
            pool.worker(owner)
                .fibers
                .as_ref()
                .expect("fiber owner lost its pool")
                .release(fiber.id());
        }
        FiberStatus::Yielded => {
            // The job suspended: it keeps the fiber and goes back to the
            // dispatching worker's deque for a later resumption.
            let raw = fiber.current_job();
            let handle = TaskHandle::from_raw(raw);
            if let Some(slot) = pool.table().slot(handle) {
                // SAFETY: the task is Running and we are its executor.
                let payload = unsafe { slot.payload_mut() };
                payload.fiber = fiber.id();
                slot.store_state(TaskState::Ready);
                push_local(worker, raw);
                pool.wake_workers(1);
            }
        }
        FiberStatus::Idle | FiberStatus::Running => {
            unreachable!("fiber returned control in state {:?}", status)
        }
    }
}

/// Push onto the worker's own deque, resizing on demand.
///
/// Owner thread only. Returns false when the deque is at its hard
/// capacity; the caller must route the task elsewhere.
pub(crate) fn push_local(worker: &Worker, raw: u64) -> bool {
    if worker.deque.len() + 1 >= crate::deque::DEQUE_MAX_CAPACITY {
        return false;
    }
    match worker.deque.push_bottom(raw) {
        PushResult::Pushed => {
            worker.local_pushes.increment();
            true
        }
        PushResult::ResizeNeeded => {
            worker.local_pushes.increment();
            if !worker.deque.resize() {
                log::warn!("worker {} deque at hard capacity", worker.id);
            }
            true
        }
    }
}

/// Run a task's function on the current stack (no fiber).
///
/// Used by worker 0, by wait-loops helping out, and as the overflow path
/// when a worker's fiber pools are empty. Yields degrade to a pause here.
pub(crate) fn execute_inline(pool: &WorkStealingPool, worker: &Worker, raw: u64) {
    let handle = TaskHandle::from_raw(raw);
    let slot = match pool.table().slot(handle) {
        Some(s) => s,
        None => return,
    };

    worker.inline_depth.fetch_add(1, Ordering::Relaxed);
    run_task_body(slot);
    worker.inline_depth.fetch_sub(1, Ordering::Relaxed);

    pool.finish_task(handle);
}

/// Invoke the task function. The caller owns the Running state.
fn run_task_body(slot: &TaskSlot) {
    // SAFETY: executor access; func/data are stable after submission.
    let (func, data) = {
        let payload = unsafe { slot.payload() };
        (payload.func, payload.data)
    };
    if let Some(func) = func {
        func(data);
    }
}

/// Body run on a job fiber (called from the fiber trampoline).
pub(crate) fn fiber_execute(pool: &WorkStealingPool, fiber: &Fiber, raw: u64) {
    let handle = TaskHandle::from_raw(raw);
    if let Some(slot) = pool.table().slot(handle) {
        run_task_body(slot);
    }

    // The job may have yielded and been resumed on another worker; finish
    // against the pool recorded by the most recent dispatcher.
    // SAFETY: the dispatcher refreshed the pool pointer before resuming.
    let pool = unsafe { &*fiber.pool_ptr() };
    pool.finish_task(handle);
}

/// Cooperatively suspend the current task.
///
/// Valid inside a task running on a job fiber: the fiber's stack is kept,
/// the task is re-enqueued on the current worker, and other tasks run
/// before it resumes. Outside a fiber (inline execution, main thread) this
/// is a CPU pause.
pub fn yield_now() {
    let worker = match current_worker() {
        Some(w) => w,
        None => return cpu_pause(),
    };
    if worker.inline_depth.load(Ordering::Relaxed) > 0 {
        return cpu_pause();
    }
    let fiber_id = worker.current_fiber.load(Ordering::Relaxed);
    if fiber_id == FIBER_NONE {
        return cpu_pause();
    }

    let pool = match current_pool() {
        Some(p) => p,
        None => return cpu_pause(),
    };
    let (owner, _, _) = decode_fiber(fiber_id);
    let fiber = pool
        .worker(owner)
        .fibers
        .as_ref()
        .expect("current fiber has no pool")
        .fiber(fiber_id);

    // The dispatcher publishes the re-enqueue after the switch back, so no
    // thief can resume this fiber while it is still live on this stack.
    fiber.suspend(FiberStatus::Yielded);
}
