//! Task groups: counted collections with an optional continuation.
//!
//! A group tracks a set of tasks as one unit. Each added task holds a
//! reference back to the group; the last completion releases the
//! continuation (if any). Groups carry a dedicated arena that member tasks
//! inherit for scratch allocations.

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crate::api::handle::TaskHandle;
use crate::exec::pool::WorkStealingPool;
use crate::memory::arena::Arena;
use crate::util::size::kb;

/// A counted collection of tasks.
///
/// Create with [`TaskGroup::new`]; the box must stay in place (its address
/// is recorded in member tasks) until [`wait`](Self::wait) returns or the
/// group was detached with [`detach_auto_destroy`](Self::detach_auto_destroy).
pub struct TaskGroup {
    /// Tasks still pending completion.
    remaining: AtomicU64,
    /// Raw handle of the continuation task (0 = none).
    continuation: AtomicU64,
    auto_destroy: AtomicBool,
    /// Scratch memory shared by all member tasks.
    arena: UnsafeCell<Arena>,
    /// Tracked tasks for bulk submission.
    tasks: Vec<TaskHandle>,
    total: u32,
    created_ns: u64,
}

// SAFETY: the arena is written only by member tasks during execution or by
// the owner before submission; counters are atomic.
unsafe impl Sync for TaskGroup {}
unsafe impl Send for TaskGroup {}

impl TaskGroup {
    /// Create a group sized for roughly `estimated` tasks, with the default
    /// 64 KiB group arena.
    pub fn new(estimated: usize) -> Box<TaskGroup> {
        Self::with_arena_size(estimated, kb(64))
    }

    /// Create a group with an explicit arena capacity.
    pub fn with_arena_size(estimated: usize, arena_size: usize) -> Box<TaskGroup> {
        let created_ns = crate::exec::pool::with_global(|p| p.now_ns()).unwrap_or(0);
        Box::new(TaskGroup {
            remaining: AtomicU64::new(0),
            continuation: AtomicU64::new(0),
            auto_destroy: AtomicBool::new(false),
            arena: UnsafeCell::new(Arena::with_capacity(arena_size)),
            tasks: Vec::with_capacity(estimated),
            total: 0,
            created_ns,
        })
    }

    /// Track a created (not yet submitted) task in this group.
    ///
    /// The task inherits the group arena unless it already has one.
    pub fn add(&mut self, handle: TaskHandle) -> bool {
        let recorded = crate::exec::pool::with_global(|pool| {
            let slot = match pool.table().slot(handle) {
                Some(s) => s,
                None => return false,
            };
            debug_assert_eq!(slot.state(), crate::task::TaskState::Pending);
            // SAFETY: pre-submission, the creator has exclusive payload
            // access.
            let payload = unsafe { slot.payload_mut() };
            payload.group = self as *const TaskGroup;
            if payload.arena.is_null() {
                payload.arena = self.arena.get();
            }
            true
        })
        .unwrap_or(false);

        if recorded {
            self.remaining.fetch_add(1, Ordering::AcqRel);
            self.total += 1;
            self.tasks.push(handle);
        }
        recorded
    }

    /// Register a created (not yet submitted) task to run once the group
    /// completes. Its construction hold is released by the last member.
    pub fn set_continuation(&mut self, handle: TaskHandle) {
        self.continuation.store(handle.raw(), Ordering::Release);
    }

    /// Submit every tracked task.
    pub fn submit(&mut self) {
        crate::exec::pool::with_global(|pool| {
            for handle in &self.tasks {
                pool.submit(*handle);
            }
        });
    }

    /// Execute pool work until every member task has completed.
    pub fn wait(&self) {
        crate::exec::pool::with_global(|pool| {
            while self.remaining.load(Ordering::Acquire) > 0 {
                if !pool.help_one() {
                    crate::sync::atomics::cpu_pause();
                }
            }
        });
    }

    /// Tasks still outstanding.
    pub fn remaining(&self) -> u64 {
        self.remaining.load(Ordering::Acquire)
    }

    /// Tasks added over the group's lifetime.
    pub fn total(&self) -> u32 {
        self.total
    }

    /// Creation timestamp (pool epoch nanoseconds).
    pub fn created_ns(&self) -> u64 {
        self.created_ns
    }

    /// The group's scratch arena.
    ///
    /// Single-writer contract: member tasks during execution, the owner
    /// otherwise.
    pub fn arena_ptr(&self) -> *mut Arena {
        self.arena.get()
    }

    /// Reset the group arena, reclaiming all scratch memory.
    ///
    /// # Safety
    /// No member task may be running.
    pub unsafe fn reset_arena(&self) {
        (*self.arena.get()).reset();
    }

    /// Hand ownership to the scheduler: the group frees itself when the
    /// last member task completes.
    ///
    /// Call only after [`submit`](Self::submit); adding further tasks to a
    /// detached group is a contract violation.
    pub fn detach_auto_destroy(self: Box<Self>) {
        // Register a phantom member before flipping the flag, so exactly
        // one of the real members and this call observes remaining == 0
        // and frees the group.
        self.remaining.fetch_add(1, Ordering::AcqRel);
        self.auto_destroy.store(true, Ordering::Release);
        let raw = Box::into_raw(self);

        let completed = crate::exec::pool::with_global(|pool| {
            // SAFETY: raw is live; the phantom member keeps it so.
            unsafe { notify_complete(raw, pool) };
        });
        if completed.is_none() {
            // No scheduler: nothing can complete members anymore.
            // SAFETY: we are the only owner left.
            unsafe { drop(Box::from_raw(raw)) };
        }
    }
}

/// Completion hook invoked by the scheduler for each member task.
///
/// # Safety
/// `ptr` must reference a live group whose `remaining` counter includes the
/// completing task.
pub(crate) unsafe fn notify_complete(ptr: *const TaskGroup, pool: &WorkStealingPool) {
    let group = &*ptr;
    if group.remaining.fetch_sub(1, Ordering::AcqRel) != 1 {
        return;
    }

    // Last member: release the continuation and honor auto-destroy.
    let continuation = TaskHandle::from_raw(group.continuation.swap(0, Ordering::AcqRel));
    let auto_destroy = group.auto_destroy.load(Ordering::Acquire);

    if continuation.is_valid() {
        pool.submit(continuation);
    }
    if auto_destroy {
        drop(Box::from_raw(ptr as *mut TaskGroup));
    }
}
