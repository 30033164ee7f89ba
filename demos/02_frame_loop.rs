//! Fixed-timestep loop driving a small per-frame task graph.

use std::sync::atomic::{AtomicU32, Ordering};

use taskweave::app::{App, AppCallbacks, QuitHandle};
use taskweave::{AppError, TaskHandle};

static SIMULATED_STEPS: AtomicU32 = AtomicU32::new(0);

fn simulate(_: *mut ()) {
    SIMULATED_STEPS.fetch_add(1, Ordering::Relaxed);
}

fn animate(_: *mut ()) {
    std::hint::black_box(0u64);
}

struct Game {
    quit: QuitHandle,
    frames: u32,
}

impl AppCallbacks for Game {
    fn init(&mut self) -> Result<(), AppError> {
        println!("game init");
        Ok(())
    }

    fn update(&mut self, _dt: f64) {
        taskweave::frame_start();
        let sim = taskweave::schedule("simulate", simulate, std::ptr::null_mut(), TaskHandle::INVALID);
        let anim = taskweave::schedule("animate", animate, std::ptr::null_mut(), sim);
        taskweave::wait(anim);
        taskweave::frame_end();
    }

    fn render(&mut self, _alpha: f64) {
        self.frames += 1;
        if self.frames >= 180 {
            self.quit.request_quit();
        }
    }

    fn quit(&mut self) {
        println!(
            "game quit after {} frames, {} sim steps",
            self.frames,
            SIMULATED_STEPS.load(Ordering::Relaxed)
        );
    }
}

fn main() {
    env_logger::init();
    taskweave::init().expect("scheduler init");

    let mut app = App::new();
    let mut game = Game {
        quit: app.quit_handle(),
        frames: 0,
    };
    app.run(&mut game).expect("app loop");

    taskweave::shutdown();
}
