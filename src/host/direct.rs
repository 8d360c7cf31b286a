//! Main-thread hosting: the engine lives next to the window and ticks on every
//! redraw.

use std::sync::Arc;
use std::time::Instant;

use tracing::{error, info};
use winit::application::ApplicationHandler;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{Window, WindowId};

use super::{AppConfig, create_window, window_metrics};
use crate::canvas::GpuCanvas;
use crate::engine::{Engine, EngineConfig};
use crate::error::HostError;
use crate::gpu::GpuContext;
use crate::palette::PaletteInput;

/// Open a window and run the engine on the main thread until it closes.
pub fn run_direct(config: AppConfig, engine_config: EngineConfig) -> Result<(), HostError> {
    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut host = DirectHost::new(config, engine_config);
    event_loop.run_app(&mut host)?;
    host.finish()
}

/// Winit application driving one [`Engine`] on the main thread.
pub struct DirectHost {
    state: HostState,
    error: Option<HostError>,
}

enum HostState {
    Pending {
        config: AppConfig,
        engine_config: EngineConfig,
    },
    Running {
        window: Arc<Window>,
        engine: Box<Engine<GpuCanvas>>,
        origin: Instant,
    },
    Closed,
}

impl DirectHost {
    pub fn new(config: AppConfig, engine_config: EngineConfig) -> Self {
        Self {
            state: HostState::Pending {
                config,
                engine_config,
            },
            error: None,
        }
    }

    /// Change the ambient theme. Fades when running; replaces the startup theme otherwise.
    pub fn update_theme(&mut self, theme: PaletteInput) {
        match &mut self.state {
            HostState::Pending { config, .. } => config.theme = Some(theme),
            HostState::Running { engine, .. } => engine.set_theme(&theme),
            HostState::Closed => {}
        }
    }

    /// The error that stopped the event loop, if any.
    pub fn finish(self) -> Result<(), HostError> {
        if let HostState::Running { engine, .. } = &self.state {
            let stats = engine.stats();
            info!(
                frames = stats.frames_drawn,
                skipped = stats.frames_skipped,
                "direct host closed"
            );
        }
        self.error.map_or(Ok(()), Err)
    }

    fn start(
        event_loop: &ActiveEventLoop,
        config: &mut AppConfig,
        engine_config: EngineConfig,
    ) -> Result<HostState, HostError> {
        let window = create_window(event_loop, config)?;
        let (width, height, pixel_scale) = window_metrics(&window);
        let canvas = GpuCanvas::new(GpuContext::new(window.clone())?);

        let mut engine = Box::new(Engine::new(engine_config));
        engine.init(
            Some(canvas),
            width,
            height,
            pixel_scale,
            config.theme.as_ref(),
        )?;
        window.request_redraw();

        Ok(HostState::Running {
            window,
            engine,
            origin: Instant::now(),
        })
    }
}

impl ApplicationHandler for DirectHost {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        let HostState::Pending { config, engine_config } = &mut self.state else {
            return;
        };

        let engine_config = engine_config.clone();
        match Self::start(event_loop, config, engine_config) {
            Ok(running) => self.state = running,
            Err(err) => {
                error!(%err, "failed to start direct host");
                self.error = Some(err);
                self.state = HostState::Closed;
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        let HostState::Running {
            window,
            engine,
            origin,
        } = &mut self.state
        else {
            return;
        };

        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::Resized(_) | WindowEvent::ScaleFactorChanged { .. } => {
                let (width, height, pixel_scale) = window_metrics(window);
                engine.resize(width, height, pixel_scale);
            }
            WindowEvent::RedrawRequested => {
                engine.tick(origin.elapsed().as_secs_f64() * 1000.0);
                window.request_redraw();
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::palette::Palette;

    fn pending_theme(host: &DirectHost) -> Option<&PaletteInput> {
        match &host.state {
            HostState::Pending { config, .. } => config.theme.as_ref(),
            _ => None,
        }
    }

    #[test]
    fn pending_host_replaces_startup_theme() {
        let config = AppConfig::new().theme(PaletteInput::from(&Palette::dusk()));
        let mut host = DirectHost::new(config, EngineConfig::default());

        let dawn = PaletteInput::from(&Palette::dawn());
        host.update_theme(dawn.clone());
        assert_eq!(pending_theme(&host), Some(&dawn));
    }

    #[test]
    fn closed_host_ignores_themes() {
        let mut host = DirectHost::new(AppConfig::new(), EngineConfig::default());
        host.state = HostState::Closed;

        host.update_theme(PaletteInput::from(&Palette::dawn()));
        assert!(matches!(host.state, HostState::Closed));
        assert!(host.finish().is_ok());
    }
}
