//! Error types for the engine, themes and hosts.

use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced by [`Engine`](crate::Engine) to its host.
#[derive(Debug, Error)]
pub enum EngineError {
    /// `init` was called without a drawing surface. This is a host configuration error.
    #[error("no drawing surface was supplied at init")]
    MissingSurface,
    #[error("engine is already initialized")]
    AlreadyInitialized,
}

/// Errors reading a theme document.
///
/// Individual bad fields never produce an error; see [`PaletteInput`](crate::PaletteInput).
#[derive(Debug, Error)]
pub enum ThemeError {
    #[error("theme JSON is malformed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("theme must be a JSON object")]
    NotAnObject,
    #[error("failed to read theme file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors raised while wiring the engine to a window or a worker thread.
#[derive(Debug, Error)]
pub enum HostError {
    #[error("failed to create window: {0}")]
    Window(#[from] winit::error::OsError),
    #[error("event loop failed: {0}")]
    EventLoop(#[from] winit::error::EventLoopError),
    #[error("failed to create drawing surface: {0}")]
    CreateSurface(#[from] wgpu::CreateSurfaceError),
    #[error("no suitable GPU adapter: {0}")]
    Adapter(#[from] wgpu::RequestAdapterError),
    #[error("failed to create GPU device: {0}")]
    Device(#[from] wgpu::RequestDeviceError),
    #[error("surface reports no supported formats")]
    NoSurfaceFormat,
    #[error("failed to spawn render worker: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("render worker is no longer running")]
    Disconnected,
    #[error("render worker panicked")]
    WorkerPanicked,
    #[error("render worker did not report in time")]
    Timeout,
    #[error(transparent)]
    Theme(#[from] ThemeError),
    #[error(transparent)]
    Engine(#[from] EngineError),
}
