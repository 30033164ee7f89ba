//! Build script for taskweave.
//!
//! Emits feature diagnostics so integrators see what they compiled in.

use std::env;

fn main() {
    println!("cargo:rerun-if-env-changed=CARGO_FEATURE_DEBUG");
    println!("cargo:rerun-if-env-changed=CARGO_FEATURE_PARKING_LOT");

    let debug_enabled = env::var("CARGO_FEATURE_DEBUG").is_ok();
    let parking_lot_enabled = env::var("CARGO_FEATURE_PARKING_LOT").is_ok();
    let profile = env::var("PROFILE").unwrap_or_else(|_| "unknown".to_string());

    if debug_enabled {
        emit("debug features enabled: pool bitmaps, free sentinels, arena poisoning");
        if profile == "release" {
            emit("warning: 'debug' feature in a release build will cost throughput");
        }
    }

    if parking_lot_enabled {
        emit("using parking_lot for the sleep mutex and wake condition");
    } else if profile == "release" {
        emit("tip: the 'parking_lot' feature speeds up worker sleep/wake");
    }

    let target = env::var("TARGET").unwrap_or_default();
    if !target.contains("x86_64") && !target.contains("aarch64") {
        emit("warning: job fibers require x86_64 or aarch64");
    }
}

fn emit(msg: &str) {
    println!("cargo:warning=[taskweave] {}", msg);
}
