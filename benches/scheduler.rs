//! Scheduler throughput benchmarks.

use std::sync::atomic::{AtomicU64, Ordering};

use criterion::{criterion_group, criterion_main, Criterion};
use taskweave::{SchedConfig, TaskHandle};

static SINK: AtomicU64 = AtomicU64::new(0);

fn tiny_task(_: *mut ()) {
    SINK.fetch_add(1, Ordering::Relaxed);
}

fn bench_schedule_wait(c: &mut Criterion) {
    taskweave::init_with_config(SchedConfig::default().with_numa_awareness(false)).unwrap();

    c.bench_function("schedule_wait_single", |b| {
        b.iter(|| {
            let h = taskweave::schedule("tiny", tiny_task, std::ptr::null_mut(), TaskHandle::INVALID);
            taskweave::wait(h);
        })
    });

    c.bench_function("schedule_wait_chain_16", |b| {
        b.iter(|| {
            let mut prev = TaskHandle::INVALID;
            for _ in 0..16 {
                prev = taskweave::schedule("link", tiny_task, std::ptr::null_mut(), prev);
            }
            taskweave::wait(prev);
        })
    });

    c.bench_function("fan_out_256", |b| {
        b.iter(|| {
            let mut last = TaskHandle::INVALID;
            for _ in 0..256 {
                last = taskweave::schedule("fan", tiny_task, std::ptr::null_mut(), TaskHandle::INVALID);
            }
            taskweave::wait(last);
            taskweave::global().unwrap().wait_idle();
        })
    });

    taskweave::shutdown();
}

fn bench_arena(c: &mut Criterion) {
    use taskweave::Arena;

    c.bench_function("arena_frame_pattern", |b| {
        let mut arena = Arena::with_capacity(64 * 1024);
        b.iter(|| {
            for _ in 0..128 {
                std::hint::black_box(arena.alloc(48));
            }
            arena.reset();
        })
    });
}

criterion_group!(benches, bench_schedule_wait, bench_arena);
criterion_main!(benches);
