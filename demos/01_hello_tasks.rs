//! Minimal task graph: two dependent tasks and a wait.

use std::sync::atomic::{AtomicU64, Ordering};

use taskweave::TaskHandle;

static LOADED: AtomicU64 = AtomicU64::new(0);

fn load_assets(_: *mut ()) {
    LOADED.store(42, Ordering::SeqCst);
    println!("[{}] assets loaded", taskweave::current_worker_id());
}

fn build_scene(_: *mut ()) {
    println!(
        "[{}] scene built from {} assets",
        taskweave::current_worker_id(),
        LOADED.load(Ordering::SeqCst)
    );
}

fn main() {
    env_logger::init();
    taskweave::init().expect("scheduler init");

    let load = taskweave::schedule("load_assets", load_assets, std::ptr::null_mut(), TaskHandle::INVALID);
    let build = taskweave::schedule("build_scene", build_scene, std::ptr::null_mut(), load);

    taskweave::wait(build);
    if let Some(stats) = taskweave::stats() {
        println!("{}", stats);
    }

    taskweave::shutdown();
}
