//! Windowed hosts for the engine.
//!
//! Two environments are supported and chosen at startup:
//!
//! - [`run_direct`]: the engine shares the main thread with the window and
//!   ticks on every redraw.
//! - [`run_worker`]: the engine runs on a render thread, fed by
//!   [`HostMessage`]s, and ticks on a fixed interval.
//!
//! Both read the same [`AppConfig`].

mod direct;
mod worker;

use std::sync::Arc;

use winit::event_loop::ActiveEventLoop;
use winit::window::{Window, WindowAttributes};

pub use direct::{DirectHost, run_direct};
pub use worker::{HostMessage, WorkerHandle, WorkerOptions, run_worker, spawn};

use crate::engine::EngineConfig;
use crate::error::HostError;
use crate::palette::PaletteInput;

/// Configuration for the app window.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    /// Render on a worker thread instead of the main thread.
    pub worker: bool,
    /// Theme applied before the first frame.
    pub theme: Option<PaletteInput>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            title: "Canopy".to_string(),
            width: 1280,
            height: 720,
            worker: false,
            theme: None,
        }
    }
}

impl AppConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn worker(mut self, worker: bool) -> Self {
        self.worker = worker;
        self
    }

    pub fn theme(mut self, theme: PaletteInput) -> Self {
        self.theme = Some(theme);
        self
    }
}

/// Run in whichever environment `config` selects.
pub fn run(config: AppConfig, engine_config: EngineConfig) -> Result<(), HostError> {
    if config.worker {
        run_worker(config, engine_config)
    } else {
        run_direct(config, engine_config)
    }
}

fn create_window(
    event_loop: &ActiveEventLoop,
    config: &AppConfig,
) -> Result<Arc<Window>, HostError> {
    let attrs = WindowAttributes::default()
        .with_title(&config.title)
        .with_inner_size(winit::dpi::LogicalSize::new(config.width, config.height));
    Ok(Arc::new(event_loop.create_window(attrs)?))
}

/// `(width, height, pixel_scale)` of the window's drawable area in device pixels.
fn window_metrics(window: &Window) -> (u32, u32, f32) {
    let size = window.inner_size();
    (size.width, size.height, window.scale_factor() as f32)
}
