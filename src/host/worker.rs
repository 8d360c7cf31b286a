//! Off-thread hosting.
//!
//! The engine lives on a dedicated render thread and is driven purely by
//! messages: the host sends [`HostMessage::Init`] once with the drawing surface,
//! then [`Resize`](HostMessage::Resize) and [`Theme`](HostMessage::Theme) as
//! they happen. The thread ticks on a fixed frame interval between messages
//! and exits when every sender is gone, handing the engine back through
//! [`WorkerHandle::shutdown`].

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use tracing::{debug, error, info, warn};
use winit::application::ApplicationHandler;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{Window, WindowId};

use super::{AppConfig, create_window, window_metrics};
use crate::canvas::GpuCanvas;
use crate::engine::{Engine, EngineConfig};
use crate::error::{EngineError, HostError};
use crate::gpu::GpuContext;
use crate::palette::PaletteInput;
use crate::surface::Surface;

/// Messages from the host to the render thread.
pub enum HostMessage<S> {
    Init {
        surface: Option<S>,
        width: u32,
        height: u32,
        pixel_scale: f32,
        theme: Option<PaletteInput>,
    },
    Resize {
        width: u32,
        height: u32,
        pixel_scale: f32,
    },
    Theme(PaletteInput),
}

/// Render thread settings.
#[derive(Clone, Debug)]
pub struct WorkerOptions {
    /// Delay between ticks. Used because no display callback exists off the main thread.
    pub frame_interval: Duration,
    pub thread_name: String,
}

impl Default for WorkerOptions {
    fn default() -> Self {
        Self {
            frame_interval: Duration::from_millis(16),
            thread_name: "canopy-render".to_string(),
        }
    }
}

impl WorkerOptions {
    pub fn frame_interval(mut self, interval: Duration) -> Self {
        self.frame_interval = interval;
        self
    }

    pub fn thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }
}

/// Host-side handle to a running render thread.
pub struct WorkerHandle<S: Surface> {
    tx: Option<Sender<HostMessage<S>>>,
    ready_rx: Receiver<Result<usize, EngineError>>,
    thread: Option<JoinHandle<Engine<S>>>,
}

/// Start an engine on its own thread.
pub fn spawn<S>(config: EngineConfig, options: WorkerOptions) -> Result<WorkerHandle<S>, HostError>
where
    S: Surface + Send + 'static,
    S::Gradient: Send,
{
    let (tx, rx) = crossbeam_channel::unbounded();
    let (ready_tx, ready_rx) = crossbeam_channel::bounded(1);
    let interval = options.frame_interval;

    let thread = std::thread::Builder::new()
        .name(options.thread_name.clone())
        .spawn(move || run_loop(Engine::new(config), rx, ready_tx, interval))
        .map_err(HostError::Spawn)?;

    info!(
        thread = %options.thread_name,
        interval_ms = interval.as_millis() as u64,
        "render worker started"
    );
    Ok(WorkerHandle {
        tx: Some(tx),
        ready_rx,
        thread: Some(thread),
    })
}

impl<S: Surface> WorkerHandle<S> {
    pub fn send(&self, message: HostMessage<S>) -> Result<(), HostError> {
        let tx = self.tx.as_ref().ok_or(HostError::Disconnected)?;
        tx.send(message).map_err(|_| HostError::Disconnected)
    }

    pub fn init(
        &self,
        surface: Option<S>,
        width: u32,
        height: u32,
        pixel_scale: f32,
        theme: Option<PaletteInput>,
    ) -> Result<(), HostError> {
        self.send(HostMessage::Init {
            surface,
            width,
            height,
            pixel_scale,
            theme,
        })
    }

    pub fn resize(&self, width: u32, height: u32, pixel_scale: f32) -> Result<(), HostError> {
        self.send(HostMessage::Resize {
            width,
            height,
            pixel_scale,
        })
    }

    pub fn set_theme(&self, theme: PaletteInput) -> Result<(), HostError> {
        self.send(HostMessage::Theme(theme))
    }

    /// Parse on the calling thread so malformed JSON is reported to the caller.
    pub fn set_theme_json(&self, json: &str) -> Result<(), HostError> {
        let theme = PaletteInput::from_json(json)?;
        self.set_theme(theme)
    }

    /// Block until the worker has processed `Init`. Returns the tree count.
    pub fn wait_ready(&self, timeout: Duration) -> Result<usize, HostError> {
        match self.ready_rx.recv_timeout(timeout) {
            Ok(result) => Ok(result?),
            Err(RecvTimeoutError::Timeout) => Err(HostError::Timeout),
            Err(RecvTimeoutError::Disconnected) => Err(HostError::Disconnected),
        }
    }

    /// Stop the worker and take back its engine.
    pub fn shutdown(mut self) -> Result<Engine<S>, HostError> {
        self.tx = None;
        let thread = self.thread.take().ok_or(HostError::Disconnected)?;
        thread.join().map_err(|_| HostError::WorkerPanicked)
    }
}

impl<S: Surface> Drop for WorkerHandle<S> {
    fn drop(&mut self) {
        self.tx = None;
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("render worker panicked during shutdown");
            }
        }
    }
}

fn run_loop<S: Surface>(
    mut engine: Engine<S>,
    rx: Receiver<HostMessage<S>>,
    ready_tx: Sender<Result<usize, EngineError>>,
    interval: Duration,
) -> Engine<S> {
    let origin = Instant::now();
    let mut next_frame = origin;

    loop {
        match rx.recv_deadline(next_frame) {
            Ok(message) => {
                handle_message(&mut engine, message, &ready_tx);
                continue;
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }

        if engine.is_initialized() {
            engine.tick(origin.elapsed().as_secs_f64() * 1000.0);
        }

        next_frame += interval;
        let now = Instant::now();
        if next_frame < now {
            next_frame = now + interval;
        }
    }

    debug!(frames = engine.stats().frames_drawn, "render worker exiting");
    engine
}

fn handle_message<S: Surface>(
    engine: &mut Engine<S>,
    message: HostMessage<S>,
    ready_tx: &Sender<Result<usize, EngineError>>,
) {
    match message {
        HostMessage::Init {
            surface,
            width,
            height,
            pixel_scale,
            theme,
        } => {
            let result = engine
                .init(surface, width, height, pixel_scale, theme.as_ref())
                .map(|()| engine.forest().len());
            if let Err(err) = &result {
                error!(%err, "render worker failed to initialize");
            }
            let _ = ready_tx.try_send(result);
        }
        HostMessage::Resize {
            width,
            height,
            pixel_scale,
        } => engine.resize(width, height, pixel_scale),
        HostMessage::Theme(theme) => engine.set_theme(&theme),
    }
}

// ============================================================================
// Windowed worker host
// ============================================================================

/// Open a window on the main thread and render into it from a worker thread.
pub fn run_worker(config: AppConfig, engine_config: EngineConfig) -> Result<(), HostError> {
    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Wait);

    let handle = spawn::<GpuCanvas>(engine_config, WorkerOptions::default())?;
    let mut shell = WorkerShell {
        config,
        handle,
        window: None,
        error: None,
    };
    event_loop.run_app(&mut shell)?;

    let WorkerShell { handle, error, .. } = shell;
    let engine = handle.shutdown()?;
    info!(frames = engine.stats().frames_drawn, "worker host closed");
    error.map_or(Ok(()), Err)
}

struct WorkerShell {
    config: AppConfig,
    handle: WorkerHandle<GpuCanvas>,
    window: Option<Arc<Window>>,
    error: Option<HostError>,
}

impl WorkerShell {
    fn start(&mut self, event_loop: &ActiveEventLoop) -> Result<(), HostError> {
        let window = create_window(event_loop, &self.config)?;
        let (width, height, pixel_scale) = window_metrics(&window);
        let canvas = GpuCanvas::new(GpuContext::new(window.clone())?);

        self.handle
            .init(Some(canvas), width, height, pixel_scale, self.config.theme.take())?;
        self.window = Some(window);
        Ok(())
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: HostError) {
        error!(%err, "worker host stopped");
        self.error = Some(err);
        event_loop.exit();
    }
}

impl ApplicationHandler for WorkerShell {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        if let Err(err) = self.start(event_loop) {
            self.fail(event_loop, err);
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        let Some(window) = &self.window else {
            return;
        };

        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::Resized(_) | WindowEvent::ScaleFactorChanged { .. } => {
                let (width, height, pixel_scale) = window_metrics(window);
                if let Err(err) = self.handle.resize(width, height, pixel_scale) {
                    warn!(%err, "resize not delivered");
                    self.fail(event_loop, err);
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::RecordingSurface;

    fn fast() -> WorkerOptions {
        WorkerOptions::default().frame_interval(Duration::from_millis(2))
    }

    #[test]
    fn worker_ticks_after_init_and_returns_engine() {
        let handle = spawn::<RecordingSurface>(EngineConfig::default(), fast()).unwrap();
        handle
            .init(Some(RecordingSurface::new()), 320, 240, 1.0, None)
            .unwrap();
        let trees = handle.wait_ready(Duration::from_secs(5)).unwrap();
        assert!(trees > 0);

        std::thread::sleep(Duration::from_millis(50));
        let engine = handle.shutdown().unwrap();
        assert!(engine.stats().frames_drawn > 0);
        assert!(engine.surface().unwrap().frames() > 0);
    }

    #[test]
    fn init_without_surface_is_reported() {
        let handle = spawn::<RecordingSurface>(EngineConfig::default(), fast()).unwrap();
        handle.init(None, 320, 240, 1.0, None).unwrap();
        let result = handle.wait_ready(Duration::from_secs(5));
        assert!(matches!(
            result,
            Err(HostError::Engine(EngineError::MissingSurface))
        ));
    }

    #[test]
    fn malformed_theme_json_is_rejected_on_the_host() {
        let handle = spawn::<RecordingSurface>(EngineConfig::default(), fast()).unwrap();
        assert!(matches!(
            handle.set_theme_json("not json"),
            Err(HostError::Theme(_))
        ));
    }

    #[test]
    fn resize_and_theme_reach_the_engine() {
        let handle = spawn::<RecordingSurface>(EngineConfig::default(), fast()).unwrap();
        handle
            .init(Some(RecordingSurface::new()), 320, 240, 1.0, None)
            .unwrap();
        handle.wait_ready(Duration::from_secs(5)).unwrap();
        handle.resize(640, 480, 2.0).unwrap();
        handle
            .set_theme_json(r#"{ "treeSat": 10 }"#)
            .unwrap();

        let engine = handle.shutdown().unwrap();
        assert_eq!(engine.viewport().width, 640);
        assert_eq!(engine.viewport().pixel_scale, 2.0);
        assert!(engine.is_transitioning() || engine.palette().tree_sat == 10.0);
    }
}
