//! Frame profiler: a per-frame ring of task execution spans.
//!
//! Workers record one event per task activation with an atomic index
//! claim; events past the per-frame cap are dropped silently. At frame end
//! the recorded spans are folded into one timeline line per worker, with
//! idle gaps, and emitted through `log`.

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

/// Events retained per frame; later records are dropped.
pub const MAX_PROFILER_EVENTS: usize = 4096;

/// One recorded task execution span.
#[derive(Debug, Clone, Copy)]
pub struct ProfilerEvent {
    /// Span start, pool-epoch nanoseconds.
    pub start_ns: u64,
    /// Span end, pool-epoch nanoseconds.
    pub end_ns: u64,
    /// Worker that executed the span.
    pub worker_id: u32,
    /// Task name.
    pub name: &'static str,
}

impl ProfilerEvent {
    const fn zero() -> ProfilerEvent {
        ProfilerEvent {
            start_ns: 0,
            end_ns: 0,
            worker_id: 0,
            name: "",
        }
    }
}

/// Per-frame trace ring.
///
/// Record claims are exclusive (each index is handed to exactly one
/// writer); reading happens at frame end, after the frame's tasks are
/// done, which is the caller's contract.
pub(crate) struct Profiler {
    events: Box<[UnsafeCell<ProfilerEvent>]>,
    count: AtomicU32,
    frame_start_ns: AtomicU64,
}

// SAFETY: each event cell is written by exactly one claimant per frame.
unsafe impl Sync for Profiler {}
unsafe impl Send for Profiler {}

impl Profiler {
    pub(crate) fn new() -> Profiler {
        let events = (0..MAX_PROFILER_EVENTS)
            .map(|_| UnsafeCell::new(ProfilerEvent::zero()))
            .collect();
        Profiler {
            events,
            count: AtomicU32::new(0),
            frame_start_ns: AtomicU64::new(0),
        }
    }

    /// Reset the ring and stamp the frame start.
    pub(crate) fn frame_start(&self, now_ns: u64) {
        self.frame_start_ns.store(now_ns, Ordering::Release);
        self.count.store(0, Ordering::Release);
    }

    /// Record one execution span. Dropped silently when the frame cap is
    /// reached.
    pub(crate) fn record(&self, start_ns: u64, end_ns: u64, worker_id: u32, name: &'static str) {
        let index = self.count.fetch_add(1, Ordering::AcqRel) as usize;
        if index >= MAX_PROFILER_EVENTS {
            return;
        }
        // SAFETY: the fetch_add hands this index to us exclusively.
        unsafe {
            *self.events[index].get() = ProfilerEvent {
                start_ns,
                end_ns,
                worker_id,
                name,
            };
        }
    }

    /// Events recorded this frame (capped).
    pub(crate) fn event_count(&self) -> usize {
        (self.count.load(Ordering::Acquire) as usize).min(MAX_PROFILER_EVENTS)
    }

    /// Snapshot the frame's events.
    ///
    /// Call after the frame's tasks have completed.
    pub(crate) fn events(&self) -> Vec<ProfilerEvent> {
        let count = self.event_count();
        (0..count)
            // SAFETY: indexes below count were fully written; the caller
            // guarantees no concurrent recording.
            .map(|i| unsafe { *self.events[i].get() })
            .collect()
    }

    /// Emit one timeline line per worker.
    pub(crate) fn frame_end(&self, now_ns: u64, worker_count: u32) {
        if !log::log_enabled!(log::Level::Info) {
            return;
        }

        let frame_start = self.frame_start_ns.load(Ordering::Acquire);
        let frame_ms = (now_ns.saturating_sub(frame_start)) as f64 / 1e6;
        let events = self.events();

        log::info!("--- frame timeline ({:.2} ms) ---", frame_ms);
        for worker in 0..worker_count {
            let mut line = format!("Worker {}: ", worker);
            let mut last_end = frame_start;
            for event in events.iter().filter(|e| e.worker_id == worker) {
                let idle_ms = (event.start_ns.saturating_sub(last_end)) as f64 / 1e6;
                let span_ms = (event.end_ns.saturating_sub(event.start_ns)) as f64 / 1e6;
                if idle_ms > 0.01 {
                    line.push_str(&format!("[idle: {:.2} ms]", idle_ms));
                }
                line.push_str(&format!("[{}: {:.2} ms]", event.name, span_ms));
                last_end = event.end_ns;
            }
            log::info!("{}", line);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_snapshot() {
        let profiler = Profiler::new();
        profiler.frame_start(0);
        profiler.record(10, 20, 0, "physics");
        profiler.record(20, 25, 1, "culling");

        let events = profiler.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].name, "physics");
        assert_eq!(events[1].worker_id, 1);
    }

    #[test]
    fn test_frame_start_resets() {
        let profiler = Profiler::new();
        profiler.record(0, 1, 0, "a");
        profiler.frame_start(100);
        assert_eq!(profiler.event_count(), 0);
    }

    #[test]
    fn test_overflow_drops_events() {
        let profiler = Profiler::new();
        profiler.frame_start(0);
        for i in 0..(MAX_PROFILER_EVENTS + 100) {
            profiler.record(i as u64, i as u64 + 1, 0, "spam");
        }
        assert_eq!(profiler.event_count(), MAX_PROFILER_EVENTS);
        assert_eq!(profiler.events().len(), MAX_PROFILER_EVENTS);
    }
}
