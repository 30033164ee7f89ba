//! Task records and the global handle table.
//!
//! Tasks live in a fixed table of slots addressed by [`TaskHandle`]. Slot 0
//! is reserved so that the all-zero handle is never valid; a claimed slot
//! bumps its generation, invalidating every handle issued for the previous
//! occupant. Claims walk a monotonic index and skip slots that are still
//! live, so the table applies backpressure instead of overwriting running
//! work.

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

use crate::api::handle::TaskHandle;
use crate::api::stats::TaskPerfInfo;
use crate::exec::fiber::FIBER_NONE;
use crate::memory::arena::Arena;
use crate::sync::atomics::SpinFlag;
use crate::task::group::TaskGroup;

pub mod group;

/// Work function executed by a task.
///
/// The data pointer is the one passed at creation; the scheduler never
/// dereferences it.
pub type TaskFn = fn(*mut ());

/// Range function for [`parallel_for`](crate::parallel_for) batches.
pub type RangeFn = fn(u32, u32, *mut ());

/// Number of slots in the task table (power of two; slot 0 reserved).
pub const TASK_TABLE_SIZE: usize = 4096;

/// Hard cap on recorded dependents per task.
pub const MAX_DEPENDENTS: usize = 1024;

/// Lifecycle states of a task.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// Created, not yet runnable (dependencies or construction hold).
    Pending = 0,
    /// Runnable, sitting in a queue.
    Ready = 1,
    /// Executing (or suspended mid-execution on a fiber).
    Running = 2,
    /// Finished; dependents have been notified.
    Completed = 3,
    /// Cancelled before execution; dependents have been notified.
    Cancelled = 4,
}

impl TaskState {
    fn from_u32(v: u32) -> TaskState {
        match v {
            0 => TaskState::Pending,
            1 => TaskState::Ready,
            2 => TaskState::Running,
            3 => TaskState::Completed,
            _ => TaskState::Cancelled,
        }
    }

    /// Whether the task has reached a terminal state.
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskState::Completed | TaskState::Cancelled)
    }
}

/// Task priorities, in decreasing urgency.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TaskPriority {
    /// Must run as soon as possible.
    Critical = 0,
    /// Ahead of normal work.
    High = 1,
    /// Default.
    #[default]
    Normal = 2,
    /// Background work.
    Low = 3,
}

impl TaskPriority {
    /// Whether this priority routes to the high-priority global queue.
    pub(crate) fn is_high(self) -> bool {
        matches!(self, TaskPriority::Critical | TaskPriority::High)
    }
}

/// Options applied at task creation.
#[derive(Debug, Clone, Copy, Default)]
pub struct TaskOptions {
    /// Queue-selection priority.
    pub priority: TaskPriority,
    /// Bitmask of preferred worker ids (0 = any).
    pub affinity_mask: u64,
    /// Run on a large-stack fiber.
    pub large_stack: bool,
}

/// Mutable task fields.
///
/// Written by the creator before submission and by the executing worker
/// while running; both phases hold exclusive access (publication goes
/// through the slot's atomics). The dependents list is additionally guarded
/// by the slot's spin flag because predecessors can complete concurrently
/// with edge insertion.
pub(crate) struct SlotPayload {
    pub func: Option<TaskFn>,
    pub data: *mut (),
    pub name: &'static str,
    pub priority: TaskPriority,
    pub affinity_mask: u64,
    pub large_stack: bool,

    /// Dependents to release on completion (raw handles).
    pub dependents: Vec<u64>,
    /// Set once the completion fan-out has run; later edges are rejected.
    pub fanout_fired: bool,

    /// Group this task belongs to, if any.
    pub group: *const TaskGroup,
    /// Parent task for hierarchical spawns.
    pub parent: TaskHandle,
    /// Scratch arena inherited from the group or parent.
    pub arena: *mut Arena,
    /// Invoked once at completion to drop owned auxiliary data.
    pub cleanup: Option<unsafe fn(*mut ())>,
    pub cleanup_data: *mut (),

    /// Suspended fiber carrying this task, if it yielded.
    pub fiber: u32,

    pub created_ns: u64,
    pub started_ns: u64,
    pub completed_ns: u64,
    pub worker_id: u32,
}

impl SlotPayload {
    fn empty() -> SlotPayload {
        SlotPayload {
            func: None,
            data: std::ptr::null_mut(),
            name: "",
            priority: TaskPriority::Normal,
            affinity_mask: 0,
            large_stack: false,
            dependents: Vec::new(),
            fanout_fired: false,
            group: std::ptr::null(),
            parent: TaskHandle::INVALID,
            arena: std::ptr::null_mut(),
            cleanup: None,
            cleanup_data: std::ptr::null_mut(),
            fiber: FIBER_NONE,
            created_ns: 0,
            started_ns: 0,
            completed_ns: 0,
            worker_id: 0,
        }
    }
}

/// One table slot.
pub(crate) struct TaskSlot {
    state: AtomicU32,
    generation: AtomicU32,
    /// Claimed flag; cleared when the slot may be reused.
    allocated: AtomicBool,
    /// Unsatisfied dependencies plus the construction hold.
    incoming: AtomicU32,
    /// Completion gate: 1 for the task itself plus 1 per spawned child.
    unfinished: AtomicU32,
    /// Guards `dependents` and `fanout_fired`.
    lock: SpinFlag,
    payload: UnsafeCell<SlotPayload>,
}

// SAFETY: payload access follows the exclusivity protocol documented on
// SlotPayload; everything else is atomic.
unsafe impl Sync for TaskSlot {}
unsafe impl Send for TaskSlot {}

impl TaskSlot {
    fn new() -> TaskSlot {
        TaskSlot {
            state: AtomicU32::new(TaskState::Completed as u32),
            generation: AtomicU32::new(0),
            allocated: AtomicBool::new(false),
            incoming: AtomicU32::new(0),
            unfinished: AtomicU32::new(0),
            lock: SpinFlag::new(),
            payload: UnsafeCell::new(SlotPayload::empty()),
        }
    }

    pub(crate) fn state(&self) -> TaskState {
        TaskState::from_u32(self.state.load(Ordering::Acquire))
    }

    pub(crate) fn store_state(&self, state: TaskState) {
        self.state.store(state as u32, Ordering::Release);
    }

    /// CAS the state, returning whether this caller won the transition.
    pub(crate) fn transition(&self, from: TaskState, to: TaskState) -> bool {
        self.state
            .compare_exchange(from as u32, to as u32, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub(crate) fn generation(&self) -> u32 {
        self.generation.load(Ordering::Acquire)
    }

    /// Release one incoming hold; true when the task just became ready.
    pub(crate) fn release_incoming(&self) -> bool {
        let prev = self.incoming.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(prev > 0, "incoming counter underflow");
        prev == 1
    }

    pub(crate) fn add_incoming(&self) {
        self.incoming.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn incoming(&self) -> u32 {
        self.incoming.load(Ordering::Acquire)
    }

    /// Add a completion hold (hierarchical child spawn).
    pub(crate) fn add_unfinished(&self) {
        self.unfinished.fetch_add(1, Ordering::AcqRel);
    }

    /// Drop one completion hold; true when the task just fully completed.
    pub(crate) fn release_unfinished(&self) -> bool {
        let prev = self.unfinished.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(prev > 0, "unfinished counter underflow");
        prev == 1
    }

    /// Exclusive payload access.
    ///
    /// # Safety
    /// Caller must hold exclusive rights per the SlotPayload protocol
    /// (creator before publication, executing worker, or completion winner).
    #[allow(clippy::mut_from_ref)]
    pub(crate) unsafe fn payload_mut(&self) -> &mut SlotPayload {
        &mut *self.payload.get()
    }

    /// Shared payload read for stable (published) fields.
    ///
    /// # Safety
    /// Caller must only read fields that are stable in the slot's current
    /// state.
    pub(crate) unsafe fn payload(&self) -> &SlotPayload {
        &*self.payload.get()
    }

    /// Record a dependent under the slot lock.
    ///
    /// Fails when the fan-out already fired (predecessor completed) or the
    /// dependent list is at its cap.
    pub(crate) fn push_dependent(&self, child: TaskHandle) -> PushDependent {
        self.lock.with(|| {
            // SAFETY: dependents/fanout_fired are guarded by `lock`.
            let payload = unsafe { self.payload_mut() };
            if payload.fanout_fired {
                PushDependent::AlreadyCompleted
            } else if payload.dependents.len() >= MAX_DEPENDENTS {
                PushDependent::Full
            } else {
                payload.dependents.push(child.raw());
                PushDependent::Recorded
            }
        })
    }

    /// Mark the fan-out fired and take the dependent list.
    pub(crate) fn take_dependents(&self) -> Vec<u64> {
        self.lock.with(|| {
            // SAFETY: guarded by `lock`.
            let payload = unsafe { self.payload_mut() };
            payload.fanout_fired = true;
            std::mem::take(&mut payload.dependents)
        })
    }

    /// Allow the slot to be claimed again.
    pub(crate) fn retire(&self) {
        self.allocated.store(false, Ordering::Release);
    }
}

/// Outcome of recording a dependency edge.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum PushDependent {
    Recorded,
    AlreadyCompleted,
    Full,
}

/// The fixed task table.
pub(crate) struct TaskTable {
    slots: Box<[TaskSlot]>,
    next: AtomicU64,
}

impl TaskTable {
    pub(crate) fn new() -> TaskTable {
        let slots = (0..TASK_TABLE_SIZE).map(|_| TaskSlot::new()).collect();
        TaskTable {
            slots,
            next: AtomicU64::new(0),
        }
    }

    /// Claim a slot and initialize it as a pending task with the
    /// construction hold.
    ///
    /// Returns the invalid handle when every slot is live (backpressure).
    pub(crate) fn claim(
        &self,
        name: &'static str,
        func: Option<TaskFn>,
        data: *mut (),
        options: TaskOptions,
        created_ns: u64,
    ) -> TaskHandle {
        for _ in 0..TASK_TABLE_SIZE {
            let n = self.next.fetch_add(1, Ordering::Relaxed);
            // Reserve index 0 so the zero handle stays invalid.
            let index = 1 + (n % (TASK_TABLE_SIZE as u64 - 1)) as usize;
            let slot = &self.slots[index];

            if slot
                .allocated
                .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
                .is_err()
            {
                continue;
            }

            let generation = slot.generation.fetch_add(1, Ordering::AcqRel) + 1;

            // Construction hold keeps the task unrunnable until submit.
            slot.incoming.store(1, Ordering::Release);
            slot.unfinished.store(1, Ordering::Release);

            // SAFETY: the claim gives exclusive payload access.
            let payload = unsafe { slot.payload_mut() };
            *payload = SlotPayload::empty();
            payload.func = func;
            payload.data = data;
            payload.name = name;
            payload.priority = options.priority;
            payload.affinity_mask = options.affinity_mask;
            payload.large_stack = options.large_stack;
            payload.created_ns = created_ns;

            slot.store_state(TaskState::Pending);
            return TaskHandle::new(index as u32, generation);
        }

        TaskHandle::INVALID
    }

    /// Resolve a handle, checking the generation.
    pub(crate) fn slot(&self, handle: TaskHandle) -> Option<&TaskSlot> {
        if !handle.is_valid() {
            return None;
        }
        let index = handle.index() as usize;
        if index == 0 || index >= TASK_TABLE_SIZE {
            return None;
        }
        let slot = &self.slots[index];
        if slot.generation() != handle.generation() {
            return None;
        }
        Some(slot)
    }

    /// Whether the referenced task has reached a terminal state.
    ///
    /// Stale or invalid handles count as complete.
    pub(crate) fn is_complete(&self, handle: TaskHandle) -> bool {
        match self.slot(handle) {
            Some(slot) => slot.state().is_terminal(),
            None => true,
        }
    }

    /// Timing snapshot for a still-resolvable handle.
    pub(crate) fn perf_info(&self, handle: TaskHandle) -> Option<TaskPerfInfo> {
        let slot = self.slot(handle)?;
        let dependent_count = slot.lock.with(|| {
            // SAFETY: dependents are guarded by the slot lock.
            unsafe { slot.payload() }.dependents.len() as u32
        });
        // SAFETY: timing fields are stable once written; reading them from
        // a live slot is a benign snapshot.
        let payload = unsafe { slot.payload() };
        Some(TaskPerfInfo {
            created_ns: payload.created_ns,
            started_ns: payload.started_ns,
            completed_ns: payload.completed_ns,
            worker_id: payload.worker_id,
            dependent_count,
        })
    }

    /// Live (claimed) slot count.
    pub(crate) fn live_count(&self) -> usize {
        self.slots
            .iter()
            .filter(|s| s.allocated.load(Ordering::Relaxed))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(_: *mut ()) {}

    #[test]
    fn test_claim_reserves_index_zero() {
        let table = TaskTable::new();
        for _ in 0..32 {
            let h = table.claim("t", Some(noop), std::ptr::null_mut(), TaskOptions::default(), 0);
            assert!(h.is_valid());
            assert_ne!(h.index(), 0);
        }
    }

    #[test]
    fn test_generation_invalidates_stale_handles() {
        let table = TaskTable::new();
        let h = table.claim("t", Some(noop), std::ptr::null_mut(), TaskOptions::default(), 0);
        let slot = table.slot(h).unwrap();
        slot.store_state(TaskState::Completed);
        slot.retire();

        // Drive the monotonic index all the way around so the same slot is
        // reused with a bumped generation.
        let mut reused = TaskHandle::INVALID;
        for _ in 0..(TASK_TABLE_SIZE * 2) {
            let h2 = table.claim("u", Some(noop), std::ptr::null_mut(), TaskOptions::default(), 0);
            if h2.index() == h.index() {
                reused = h2;
                break;
            }
            let s = table.slot(h2).unwrap();
            s.store_state(TaskState::Completed);
            s.retire();
        }

        assert!(reused.is_valid());
        assert!(table.slot(h).is_none(), "stale handle must not resolve");
        assert!(table.slot(reused).is_some());
        assert!(table.is_complete(h));
    }

    #[test]
    fn test_backpressure_when_table_full() {
        let table = TaskTable::new();
        let mut handles = Vec::new();
        loop {
            let h = table.claim("t", Some(noop), std::ptr::null_mut(), TaskOptions::default(), 0);
            if !h.is_valid() {
                break;
            }
            handles.push(h);
        }
        // All claimable slots (table minus reserved index 0) were handed out,
        // then the claim failed instead of overwriting live work.
        assert_eq!(handles.len(), TASK_TABLE_SIZE - 1);

        for h in &handles {
            let slot = table.slot(*h).unwrap();
            slot.store_state(TaskState::Completed);
            slot.retire();
        }
        let h = table.claim("t", Some(noop), std::ptr::null_mut(), TaskOptions::default(), 0);
        assert!(h.is_valid());
    }

    #[test]
    fn test_dependent_recording() {
        let table = TaskTable::new();
        let pred = table.claim("p", Some(noop), std::ptr::null_mut(), TaskOptions::default(), 0);
        let child = table.claim("c", Some(noop), std::ptr::null_mut(), TaskOptions::default(), 0);

        let slot = table.slot(pred).unwrap();
        assert_eq!(slot.push_dependent(child), PushDependent::Recorded);

        let deps = slot.take_dependents();
        assert_eq!(deps, vec![child.raw()]);

        // After the fan-out fired, new edges are rejected.
        assert_eq!(slot.push_dependent(child), PushDependent::AlreadyCompleted);
    }

    #[test]
    fn test_incoming_hold() {
        let table = TaskTable::new();
        let h = table.claim("t", Some(noop), std::ptr::null_mut(), TaskOptions::default(), 0);
        let slot = table.slot(h).unwrap();

        assert_eq!(slot.incoming(), 1);
        slot.add_incoming();
        assert!(!slot.release_incoming());
        assert!(slot.release_incoming(), "last release reports readiness");
    }

    #[test]
    fn test_state_transitions() {
        let table = TaskTable::new();
        let h = table.claim("t", Some(noop), std::ptr::null_mut(), TaskOptions::default(), 0);
        let slot = table.slot(h).unwrap();

        assert_eq!(slot.state(), TaskState::Pending);
        slot.store_state(TaskState::Ready);
        assert!(slot.transition(TaskState::Ready, TaskState::Running));
        assert!(!slot.transition(TaskState::Ready, TaskState::Running));
        slot.store_state(TaskState::Completed);
        assert!(slot.state().is_terminal());
    }
}
