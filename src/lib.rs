//! # Canopy
//!
//! **An endless, procedurally generated fly-through of an abstract forest.**
//!
//! A fixed pool of tapered trunks is laid out on a seeded jittered grid, slides
//! toward a drifting, yawing camera, is recycled to the back when it passes,
//! and is drawn back to front with depth-keyed colors onto any 2D [`Surface`].
//! A sky gradient sits behind everything and a fog gradient on top; themes
//! cross-fade smoothly.
//!
//! ## Quick Start
//!
//! ```no_run
//! use canopy::{AppConfig, EngineConfig};
//!
//! fn main() -> Result<(), canopy::HostError> {
//!     canopy::run(AppConfig::new().size(1280, 720), EngineConfig::default())
//! }
//! ```
//!
//! ## Headless
//!
//! The engine never touches a window itself. Drive it with any [`Surface`]:
//!
//! ```
//! use canopy::{Engine, EngineConfig, Palette, PaletteInput, RecordingSurface};
//!
//! let mut engine = Engine::new(EngineConfig::default());
//! engine.init(Some(RecordingSurface::new()), 640, 360, 1.0, None).unwrap();
//! engine.set_theme(&PaletteInput::from(&Palette::dawn()));
//!
//! for i in 0..120 {
//!     engine.tick(i as f64 * 16.0);
//! }
//! assert!(engine.stats().frames_drawn > 0);
//! ```

mod camera;
mod camera_path;
mod canvas;
mod clock;
mod color;
mod engine;
mod error;
mod forest;
mod gpu;
pub mod host;
mod palette;
mod projection;
mod rng;
mod surface;
mod theme;
mod viewport;

pub use camera::Camera;
pub use camera_path::{CameraPath, CameraPathConfig};
pub use canvas::{
    GpuCanvas, GradientScratch, LinearGradient, MAX_VERTICES, Vertex2d, tessellate_gradient,
    tessellate_solid,
};
pub use clock::{ClockConfig, FrameClock};
pub use color::{Color, ColorStop, sample_stops};
pub use engine::{CacheStats, Engine, EngineConfig, FrameStats};
pub use error::{EngineError, HostError, ThemeError};
pub use forest::{
    DEFAULT_COLOR_BUCKETS, Forest, ForestConfig, MIN_DEPTH, Tree, column_x, depth_sort,
};
pub use gpu::GpuContext;
pub use host::{AppConfig, DirectHost, HostMessage, WorkerHandle, WorkerOptions, run};
pub use palette::{FOG_STOPS, Palette, PaletteInput, SKY_STOPS};
pub use projection::{
    Culled, ProjectionConfig, Silhouette, body_alpha, far_fade, near_fade, normalized_depth,
    project, side_keep, visibility,
};
pub use rng::{FOREST_SEED, SeededRng};
pub use surface::{
    DrawCommand, Paint, Rect, RecordedGradient, RecordedPaint, RecordingSurface, Surface,
};
pub use theme::{DEFAULT_THEME_DURATION_MS, Easing, ThemeTransition};
pub use viewport::{SceneGradients, Viewport};

// Re-export glam math types for convenience
pub use glam::Vec2;
