//! Fixed-timestep application loop.
//!
//! The loop owns only time: updates run at a fixed logic rate, rendering
//! happens once per iteration with an interpolation factor. Windowing,
//! input pumping, and swapchain handling stay with the client.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::api::error::AppError;

/// Logic updates per second.
pub const LOGIC_FREQUENCY: f64 = 60.0;

/// Seconds per fixed update.
pub const FIXED_TIMESTEP: f64 = 1.0 / LOGIC_FREQUENCY;

/// Accumulator cap: stalls longer than this are swallowed instead of
/// triggering an update spiral.
pub const MAX_ACCUMULATOR: f64 = 0.25;

/// Application callbacks driven by the loop.
///
/// All four run on the main thread.
pub trait AppCallbacks {
    /// One-time setup before the first frame.
    fn init(&mut self) -> Result<(), AppError>;

    /// Fixed-timestep logic update; `dt` is always [`FIXED_TIMESTEP`]
    /// (passed explicitly so callbacks need no global).
    fn update(&mut self, dt: f64);

    /// Render once per loop iteration. `alpha` in `0..1` is how far the
    /// accumulator has advanced into the next update; interpolation is the
    /// client's business.
    fn render(&mut self, alpha: f64);

    /// Teardown after the loop exits.
    fn quit(&mut self);
}

/// Cloneable handle that stops a running [`App`].
#[derive(Clone)]
pub struct QuitHandle(Arc<AtomicBool>);

impl QuitHandle {
    /// Request the loop to exit after the current iteration.
    pub fn request_quit(&self) {
        self.0.store(true, Ordering::Release);
    }
}

/// The fixed-timestep loop driver.
pub struct App {
    fixed_timestep: f64,
    max_accumulator: f64,
    quit: Arc<AtomicBool>,
}

impl Default for App {
    fn default() -> Self {
        Self::new()
    }
}

impl App {
    /// Create a loop with the default 60 Hz timestep.
    pub fn new() -> App {
        App {
            fixed_timestep: FIXED_TIMESTEP,
            max_accumulator: MAX_ACCUMULATOR,
            quit: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Override the fixed timestep (seconds per update).
    pub fn with_fixed_timestep(mut self, dt: f64) -> App {
        assert!(dt > 0.0);
        self.fixed_timestep = dt;
        self
    }

    /// Handle for requesting loop exit from callbacks or other threads.
    pub fn quit_handle(&self) -> QuitHandle {
        QuitHandle(Arc::clone(&self.quit))
    }

    /// Run the loop until quit is requested.
    pub fn run<C: AppCallbacks>(&mut self, callbacks: &mut C) -> Result<(), AppError> {
        callbacks.init()?;

        let mut previous = Instant::now();
        let mut accumulator = 0.0f64;

        while !self.quit.load(Ordering::Acquire) {
            let now = Instant::now();
            let dt = now.duration_since(previous).as_secs_f64();
            previous = now;

            accumulator = (accumulator + dt).min(self.max_accumulator);

            while accumulator >= self.fixed_timestep {
                callbacks.update(self.fixed_timestep);
                accumulator -= self.fixed_timestep;
            }

            callbacks.render(accumulator / self.fixed_timestep);
        }

        callbacks.quit();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct CountingApp {
        quit: QuitHandle,
        updates: u32,
        renders: u32,
        quit_after_renders: u32,
        alphas_ok: bool,
        init_called: bool,
        quit_called: bool,
    }

    impl AppCallbacks for CountingApp {
        fn init(&mut self) -> Result<(), AppError> {
            self.init_called = true;
            Ok(())
        }

        fn update(&mut self, dt: f64) {
            assert!((dt - FIXED_TIMESTEP).abs() < 1e-12);
            self.updates += 1;
        }

        fn render(&mut self, alpha: f64) {
            self.alphas_ok &= (0.0..1.0).contains(&alpha);
            self.renders += 1;
            if self.renders >= self.quit_after_renders {
                self.quit.request_quit();
            }
        }

        fn quit(&mut self) {
            self.quit_called = true;
        }
    }

    #[test]
    fn test_loop_lifecycle() {
        let mut app = App::new();
        let mut callbacks = CountingApp {
            quit: app.quit_handle(),
            updates: 0,
            renders: 0,
            quit_after_renders: 5,
            alphas_ok: true,
            init_called: false,
            quit_called: false,
        };

        app.run(&mut callbacks).unwrap();

        assert!(callbacks.init_called);
        assert!(callbacks.quit_called);
        assert_eq!(callbacks.renders, 5);
        assert!(callbacks.alphas_ok, "render alpha must stay in [0, 1)");
    }

    #[test]
    fn test_updates_track_wall_time() {
        let mut app = App::new().with_fixed_timestep(0.001);
        let mut callbacks = CountingApp {
            quit: app.quit_handle(),
            updates: 0,
            renders: 0,
            quit_after_renders: 50,
            alphas_ok: true,
            init_called: false,
            quit_called: false,
        };

        let start = Instant::now();
        app.run(&mut callbacks).unwrap();
        let elapsed = start.elapsed().as_secs_f64();

        // The update count can never exceed wall time / timestep (plus the
        // initial accumulator cap worth of catch-up updates).
        let bound = (elapsed + MAX_ACCUMULATOR) / 0.001 + 1.0;
        assert!((callbacks.updates as f64) <= bound);
    }

    #[test]
    fn test_init_error_skips_loop() {
        struct FailingApp {
            quit_called: bool,
        }
        impl AppCallbacks for FailingApp {
            fn init(&mut self) -> Result<(), AppError> {
                Err(AppError::Init("no device".into()))
            }
            fn update(&mut self, _: f64) {
                panic!("update must not run");
            }
            fn render(&mut self, _: f64) {
                panic!("render must not run");
            }
            fn quit(&mut self) {
                self.quit_called = true;
            }
        }

        let mut app = App::new();
        let mut callbacks = FailingApp { quit_called: false };
        assert!(app.run(&mut callbacks).is_err());
        assert!(!callbacks.quit_called);
    }
}
