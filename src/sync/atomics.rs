//! Atomic helpers: padded cells, counters, and spin primitives.
//!
//! The hot scheduler structures embed their atomics through [`CachePadded`]
//! so that `top`/`bottom` style pairs never share a cache line.

use std::ops::Deref;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

/// Pads and aligns a value to 64 bytes.
#[repr(align(64))]
#[derive(Debug, Default)]
pub struct CachePadded<T>(pub T);

impl<T> CachePadded<T> {
    /// Wrap a value on its own cache line.
    pub const fn new(value: T) -> Self {
        Self(value)
    }
}

impl<T> Deref for CachePadded<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

/// Hint the CPU that we are in a spin-wait loop.
#[inline(always)]
pub fn cpu_pause() {
    std::hint::spin_loop();
}

/// Spin for `n` pause iterations.
#[inline]
pub fn spin(n: u32) {
    for _ in 0..n {
        cpu_pause();
    }
}

/// An atomic counter for statistics.
pub struct AtomicCounter(AtomicU64);

impl AtomicCounter {
    /// Create a new counter.
    pub const fn new(initial: u64) -> Self {
        Self(AtomicU64::new(initial))
    }

    /// Increment the counter.
    pub fn increment(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    /// Add a value to the counter.
    pub fn add(&self, value: u64) {
        self.0.fetch_add(value, Ordering::Relaxed);
    }

    /// Get the current value.
    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }

    /// Reset to zero.
    pub fn reset(&self) {
        self.0.store(0, Ordering::Relaxed);
    }
}

impl Default for AtomicCounter {
    fn default() -> Self {
        Self::new(0)
    }
}

/// An atomic gauge for tracking current values (can go up or down).
pub struct AtomicGauge(AtomicUsize);

impl AtomicGauge {
    /// Create a new gauge.
    pub const fn new(initial: usize) -> Self {
        Self(AtomicUsize::new(initial))
    }

    /// Add to the gauge, returning the new value.
    pub fn add(&self, value: usize) -> usize {
        self.0.fetch_add(value, Ordering::Relaxed) + value
    }

    /// Subtract from the gauge, returning the new value.
    pub fn sub(&self, value: usize) -> usize {
        self.0.fetch_sub(value, Ordering::Relaxed) - value
    }

    /// Get the current value.
    pub fn get(&self) -> usize {
        self.0.load(Ordering::Relaxed)
    }

    /// Set the value.
    pub fn set(&self, value: usize) {
        self.0.store(value, Ordering::Relaxed);
    }

    /// Update the maximum (for high-water marks).
    pub fn update_max(&self, value: usize) {
        let mut current = self.0.load(Ordering::Relaxed);
        while value > current {
            match self
                .0
                .compare_exchange_weak(current, value, Ordering::Relaxed, Ordering::Relaxed)
            {
                Ok(_) => break,
                Err(c) => current = c,
            }
        }
    }
}

impl Default for AtomicGauge {
    fn default() -> Self {
        Self::new(0)
    }
}

/// A one-bit spin lock guarding short critical sections.
///
/// Used for the per-slot dependent lists where a full mutex per table slot
/// would be wasteful. Hold times are a handful of pointer writes.
pub struct SpinFlag(AtomicBool);

impl SpinFlag {
    /// Create an unlocked flag.
    pub const fn new() -> Self {
        Self(AtomicBool::new(false))
    }

    /// Acquire the flag, spinning until it is free.
    pub fn lock(&self) {
        while self
            .0
            .compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            while self.0.load(Ordering::Relaxed) {
                cpu_pause();
            }
        }
    }

    /// Release the flag.
    pub fn unlock(&self) {
        self.0.store(false, Ordering::Release);
    }

    /// Run a closure under the flag.
    pub fn with<R>(&self, f: impl FnOnce() -> R) -> R {
        self.lock();
        let result = f();
        self.unlock();
        result
    }
}

impl Default for SpinFlag {
    fn default() -> Self {
        Self::new()
    }
}
