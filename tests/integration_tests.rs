//! Integration tests for taskweave.
//!
//! The scheduler is process-global, so every test takes the harness lock,
//! initializes a fresh pool, and tears it down before releasing the lock.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Mutex;

use taskweave::{SchedConfig, TaskGroup, TaskHandle, TaskOptions, TaskPriority};

static HARNESS: Mutex<()> = Mutex::new(());

fn with_sched<R>(config: SchedConfig, f: impl FnOnce() -> R) -> R {
    let _guard = HARNESS.lock().unwrap_or_else(|e| e.into_inner());
    taskweave::init_with_config(config).expect("scheduler init failed");
    let result = f();
    taskweave::shutdown();
    result
}

fn test_config() -> SchedConfig {
    SchedConfig::default()
        .with_worker_threads(3)
        .with_numa_awareness(false)
}

fn atomic_ptr(a: &AtomicU64) -> *mut () {
    a as *const AtomicU64 as *mut ()
}

// ---------------------------------------------------------------------------
// Scenario: chain of three
// ---------------------------------------------------------------------------

static CHAIN_SEQ: AtomicU64 = AtomicU64::new(0);
static CHAIN_A: AtomicU64 = AtomicU64::new(0);
static CHAIN_B: AtomicU64 = AtomicU64::new(0);
static CHAIN_C: AtomicU64 = AtomicU64::new(0);

fn chain_step(data: *mut ()) {
    let cell = unsafe { &*(data as *const AtomicU64) };
    let order = CHAIN_SEQ.fetch_add(1, Ordering::SeqCst) + 1;
    cell.store(order, Ordering::SeqCst);
}

#[test]
fn chain_of_three_runs_in_order() {
    with_sched(test_config(), || {
        CHAIN_SEQ.store(0, Ordering::SeqCst);

        let a = taskweave::schedule("A", chain_step, atomic_ptr(&CHAIN_A), TaskHandle::INVALID);
        let b = taskweave::schedule("B", chain_step, atomic_ptr(&CHAIN_B), a);
        let c = taskweave::schedule("C", chain_step, atomic_ptr(&CHAIN_C), b);
        assert!(a.is_valid() && b.is_valid() && c.is_valid());

        taskweave::wait(c);

        let (oa, ob, oc) = (
            CHAIN_A.load(Ordering::SeqCst),
            CHAIN_B.load(Ordering::SeqCst),
            CHAIN_C.load(Ordering::SeqCst),
        );
        assert!(oa != 0 && ob != 0 && oc != 0, "all three ran");
        assert!(oa < ob && ob < oc, "order was A, B, C: {} {} {}", oa, ob, oc);

        assert!(taskweave::is_complete(a));
        assert!(taskweave::is_complete(b));
        assert!(taskweave::is_complete(c));

        // Dependency ordering is visible in the timestamps.
        let pa = taskweave::perf_info(a).expect("A perf info");
        let pb = taskweave::perf_info(b).expect("B perf info");
        let pc = taskweave::perf_info(c).expect("C perf info");
        assert!(pa.completed_ns <= pb.started_ns);
        assert!(pb.completed_ns <= pc.started_ns);
        assert!(pa.started_ns >= pa.created_ns);
        assert!(pa.completed_ns >= pa.started_ns);
    });
}

// ---------------------------------------------------------------------------
// Scenario: fork-join through a group with a continuation barrier
// ---------------------------------------------------------------------------

static FORK_RUNS: AtomicU64 = AtomicU64::new(0);
static BARRIER_SAW: AtomicU64 = AtomicU64::new(0);

fn fork_child(_: *mut ()) {
    FORK_RUNS.fetch_add(1, Ordering::SeqCst);
}

fn fork_barrier(_: *mut ()) {
    BARRIER_SAW.store(FORK_RUNS.load(Ordering::SeqCst), Ordering::SeqCst);
}

#[test]
fn fork_join_barrier_after_256_children() {
    with_sched(test_config(), || {
        FORK_RUNS.store(0, Ordering::SeqCst);
        BARRIER_SAW.store(0, Ordering::SeqCst);

        let root = taskweave::schedule("root", fork_child, std::ptr::null_mut(), TaskHandle::INVALID);

        let mut group = TaskGroup::new(256);
        for _ in 0..255 {
            let child = taskweave::create_task(
                "child",
                fork_child,
                std::ptr::null_mut(),
                TaskOptions::default(),
            );
            assert!(child.is_valid());
            taskweave::add_dependency(child, root).unwrap();
            assert!(group.add(child));
        }

        let barrier = taskweave::create_task(
            "barrier",
            fork_barrier,
            std::ptr::null_mut(),
            TaskOptions::default(),
        );
        group.set_continuation(barrier);
        group.submit();
        group.wait();

        taskweave::wait(barrier);

        // root + 255 children all executed before the barrier sampled.
        assert_eq!(FORK_RUNS.load(Ordering::SeqCst), 256);
        assert_eq!(BARRIER_SAW.load(Ordering::SeqCst), 256);
        assert_eq!(group.remaining(), 0);
    });
}

// ---------------------------------------------------------------------------
// Scenario: stealing under imbalance
// ---------------------------------------------------------------------------

static IMBALANCE_RUNS: AtomicU64 = AtomicU64::new(0);

fn short_spin(_: *mut ()) {
    for _ in 0..200 {
        std::hint::spin_loop();
    }
    IMBALANCE_RUNS.fetch_add(1, Ordering::SeqCst);
}

#[test]
fn stealing_balances_single_producer_load() {
    with_sched(test_config(), || {
        IMBALANCE_RUNS.store(0, Ordering::SeqCst);
        const TASKS: u64 = 10_000;

        let pool = taskweave::global().unwrap();

        // All submissions come from worker 0 (this thread). The task table
        // is smaller than the burst, so the submitter absorbs backpressure
        // by draining work itself.
        let mut scheduled = 0u64;
        let mut last = TaskHandle::INVALID;
        while scheduled < TASKS {
            let h = taskweave::schedule("spin", short_spin, std::ptr::null_mut(), TaskHandle::INVALID);
            if h.is_valid() {
                scheduled += 1;
                last = h;
            } else {
                pool.process_tasks(64);
            }
        }
        taskweave::wait(last);
        pool.wait_idle();

        assert_eq!(IMBALANCE_RUNS.load(Ordering::SeqCst), TASKS);

        let stats = pool.stats();
        assert_eq!(stats.tasks_completed, TASKS);
        assert!(
            stats.steal_successes > 0,
            "workers never stole from the submitting thread"
        );

        // Coarse balance: the spinning load is long enough that every
        // worker thread participates.
        let worker_stats = pool.worker_stats();
        let executed_by_thieves: u64 = worker_stats
            .iter()
            .filter(|w| w.worker_id != 0)
            .map(|w| w.tasks_executed)
            .sum();
        assert!(
            executed_by_thieves > TASKS / 10,
            "worker threads executed only {} of {}",
            executed_by_thieves,
            TASKS
        );
    });
}

// ---------------------------------------------------------------------------
// Scenario: cooperative yield
// ---------------------------------------------------------------------------

static COOP_ITERS: AtomicU64 = AtomicU64::new(0);
static COOP_DONE: AtomicBool = AtomicBool::new(false);
static COOP_OTHERS: AtomicU64 = AtomicU64::new(0);

fn cooperative(_: *mut ()) {
    let mut iterations = 0u64;
    while iterations < 100_000 {
        iterations += 1;
        if iterations % 1000 == 0 {
            taskweave::yield_now();
        }
    }
    COOP_ITERS.store(iterations, Ordering::SeqCst);
    COOP_DONE.store(true, Ordering::SeqCst);
}

fn coop_other(_: *mut ()) {
    COOP_OTHERS.fetch_add(1, Ordering::SeqCst);
}

#[test]
fn cooperative_task_yields_and_completes() {
    // One worker thread: interleaving with other tasks proves the yield
    // actually released the worker.
    let config = SchedConfig::default()
        .with_worker_threads(1)
        .with_numa_awareness(false);
    with_sched(config, || {
        COOP_ITERS.store(0, Ordering::SeqCst);
        COOP_DONE.store(false, Ordering::SeqCst);
        COOP_OTHERS.store(0, Ordering::SeqCst);

        let coop = taskweave::schedule("coop", cooperative, std::ptr::null_mut(), TaskHandle::INVALID);
        let mut others = Vec::new();
        for _ in 0..64 {
            others.push(taskweave::schedule(
                "other",
                coop_other,
                std::ptr::null_mut(),
                TaskHandle::INVALID,
            ));
        }

        taskweave::wait(coop);
        for h in others {
            taskweave::wait(h);
        }

        assert!(COOP_DONE.load(Ordering::SeqCst));
        assert_eq!(COOP_ITERS.load(Ordering::SeqCst), 100_000);
        assert_eq!(COOP_OTHERS.load(Ordering::SeqCst), 64);
    });
}

// ---------------------------------------------------------------------------
// Hierarchical spawn
// ---------------------------------------------------------------------------

static SPAWN_CHILDREN: AtomicU64 = AtomicU64::new(0);
static SPAWN_PARENT_RAW: AtomicU64 = AtomicU64::new(0);

fn spawned_child(_: *mut ()) {
    SPAWN_CHILDREN.fetch_add(1, Ordering::SeqCst);
}

fn spawning_parent(_: *mut ()) {
    // Spawn children from inside the running task; the parent is not
    // complete until they are.
    let me = TaskHandle::from_raw(SPAWN_PARENT_RAW.load(Ordering::SeqCst));
    for _ in 0..8 {
        let child = taskweave::spawn_child(me, "spawned", spawned_child, std::ptr::null_mut());
        assert!(child.is_valid());
    }
}

#[test]
fn spawned_children_gate_parent_completion() {
    with_sched(test_config(), || {
        SPAWN_CHILDREN.store(0, Ordering::SeqCst);

        // Create first, stash the handle where the body can see it, then
        // submit.
        let parent = taskweave::create_task(
            "parent",
            spawning_parent,
            std::ptr::null_mut(),
            TaskOptions::default(),
        );
        SPAWN_PARENT_RAW.store(parent.raw(), Ordering::SeqCst);
        taskweave::submit(parent);

        taskweave::wait(parent);

        // Parent completion implies every spawned child finished.
        assert_eq!(SPAWN_CHILDREN.load(Ordering::SeqCst), 8);
    });
}

// ---------------------------------------------------------------------------
// parallel_for
// ---------------------------------------------------------------------------

static PARALLEL_SUM: AtomicU64 = AtomicU64::new(0);

fn sum_range(start: u32, end: u32, _data: *mut ()) {
    let mut local = 0u64;
    for i in start..end {
        local += i as u64;
    }
    PARALLEL_SUM.fetch_add(local, Ordering::SeqCst);
}

#[test]
fn parallel_for_covers_every_iteration_once() {
    with_sched(test_config(), || {
        PARALLEL_SUM.store(0, Ordering::SeqCst);
        const N: u32 = 4096;

        let parent = taskweave::parallel_for("sum", N, 64, sum_range, std::ptr::null_mut());
        assert!(parent.is_valid());
        taskweave::wait(parent);

        let expected = (N as u64 - 1) * N as u64 / 2;
        assert_eq!(PARALLEL_SUM.load(Ordering::SeqCst), expected);
    });
}

// ---------------------------------------------------------------------------
// Cancellation
// ---------------------------------------------------------------------------

static CANCELLED_RAN: AtomicBool = AtomicBool::new(false);
static DEPENDENT_RAN: AtomicBool = AtomicBool::new(false);

fn cancelled_body(_: *mut ()) {
    CANCELLED_RAN.store(true, Ordering::SeqCst);
}

fn dependent_body(_: *mut ()) {
    DEPENDENT_RAN.store(true, Ordering::SeqCst);
}

#[test]
fn cancel_skips_execution_but_releases_dependents() {
    with_sched(test_config(), || {
        CANCELLED_RAN.store(false, Ordering::SeqCst);
        DEPENDENT_RAN.store(false, Ordering::SeqCst);

        // Created but unsubmitted: cancel must win before it can run.
        let victim = taskweave::create_task(
            "victim",
            cancelled_body,
            std::ptr::null_mut(),
            TaskOptions::default(),
        );
        let dependent = taskweave::schedule(
            "dependent",
            dependent_body,
            std::ptr::null_mut(),
            victim,
        );

        assert!(taskweave::cancel(victim));
        assert!(!taskweave::cancel(victim), "cancel is idempotent");

        taskweave::wait(dependent);
        taskweave::wait(victim);

        assert!(!CANCELLED_RAN.load(Ordering::SeqCst), "cancelled task must not run");
        assert!(DEPENDENT_RAN.load(Ordering::SeqCst), "dependents still advance");
        assert!(taskweave::is_complete(victim));
    });
}

// ---------------------------------------------------------------------------
// Handles, priorities, lifecycle
// ---------------------------------------------------------------------------

fn noop(_: *mut ()) {}

#[test]
fn wait_on_stale_or_invalid_handles_returns() {
    with_sched(test_config(), || {
        taskweave::wait(TaskHandle::INVALID);

        let h = taskweave::schedule("noop", noop, std::ptr::null_mut(), TaskHandle::INVALID);
        taskweave::wait(h);
        // Waiting again on a completed handle returns immediately.
        taskweave::wait(h);
        assert!(taskweave::is_complete(h));
    });
}

#[test]
fn priorities_and_options_are_accepted() {
    with_sched(test_config(), || {
        let options = TaskOptions {
            priority: TaskPriority::Critical,
            affinity_mask: 0,
            large_stack: true,
        };
        let h = taskweave::schedule_with(
            "critical",
            noop,
            std::ptr::null_mut(),
            TaskHandle::INVALID,
            options,
        );
        assert!(h.is_valid());
        taskweave::wait(h);
        assert!(taskweave::is_complete(h));
    });
}

#[test]
fn reinit_without_shutdown_is_a_noop() {
    with_sched(test_config(), || {
        // Second init while a pool exists: no-op success.
        assert!(taskweave::init_with_config(SchedConfig::minimal()).is_ok());
        let stats = taskweave::stats().unwrap();
        // Still the original pool (4 workers, not minimal's 2).
        assert_eq!(stats.worker_count, 4);
    });
}

#[test]
fn frame_hooks_emit_and_reset() {
    with_sched(test_config(), || {
        taskweave::frame_start();
        let h = taskweave::schedule("frame task", noop, std::ptr::null_mut(), TaskHandle::INVALID);
        taskweave::wait(h);
        let pool = taskweave::global().unwrap();
        pool.wait_idle();
        taskweave::frame_end();
    });
}

static ARENA_SAW: AtomicU64 = AtomicU64::new(0);

fn arena_user(_: *mut ()) {
    let arena = taskweave::current_arena();
    if arena.is_null() {
        return;
    }
    // SAFETY: the task owns its scratch arena while running.
    let p = unsafe { (*arena).alloc(128) };
    if !p.is_null() {
        ARENA_SAW.fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
fn tasks_get_a_scratch_arena() {
    with_sched(test_config(), || {
        ARENA_SAW.store(0, Ordering::SeqCst);
        let h = taskweave::schedule("arena user", arena_user, std::ptr::null_mut(), TaskHandle::INVALID);
        taskweave::wait(h);
        let pool = taskweave::global().unwrap();
        pool.wait_idle();
        assert_eq!(ARENA_SAW.load(Ordering::SeqCst), 1);
    });
}

// ---------------------------------------------------------------------------
// Group arena sharing
// ---------------------------------------------------------------------------

static GROUP_ARENA_HITS: AtomicU32 = AtomicU32::new(0);

fn group_arena_user(_: *mut ()) {
    let arena = taskweave::current_arena();
    if !arena.is_null() {
        GROUP_ARENA_HITS.fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
fn group_members_inherit_the_group_arena() {
    with_sched(test_config(), || {
        GROUP_ARENA_HITS.store(0, Ordering::SeqCst);

        let mut group = TaskGroup::new(4);
        for _ in 0..4 {
            let t = taskweave::create_task(
                "member",
                group_arena_user,
                std::ptr::null_mut(),
                TaskOptions::default(),
            );
            assert!(group.add(t));
        }
        group.submit();
        group.wait();

        assert_eq!(GROUP_ARENA_HITS.load(Ordering::SeqCst), 4);
        assert_eq!(group.remaining(), 0);
        assert_eq!(group.total(), 4);
    });
}
