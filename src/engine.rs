//! The engine core shared by every host.
//!
//! [`Engine`] owns all per-instance state: the forest, the viewport, the
//! palette and its transition, the camera path and the frame clock. Hosts talk
//! to it through four calls, [`init`](Engine::init), [`resize`](Engine::resize),
//! [`set_theme`](Engine::set_theme) and [`tick`](Engine::tick), and never touch
//! its internals.
//!
//! # Example
//!
//! ```
//! use canopy::{Engine, EngineConfig, RecordingSurface};
//!
//! let mut engine = Engine::new(EngineConfig::default());
//! engine
//!     .init(Some(RecordingSurface::new()), 800, 600, 1.0, None)
//!     .unwrap();
//!
//! for frame in 0..3 {
//!     engine.tick(frame as f64 * 16.0);
//! }
//! assert_eq!(engine.stats().frames_drawn, 3);
//! ```
//!
//! # Tick order
//!
//! 1. step the theme transition (rebuilding color caches if it moved)
//! 2. paint the sky
//! 3. advance the camera path and the forest
//! 4. depth sort
//! 5. project and draw every visible tree
//! 6. paint the fog overlay

use glam::Vec2;
use tracing::{debug, info, warn};

use crate::camera::Camera;
use crate::camera_path::{CameraPath, CameraPathConfig};
use crate::clock::{ClockConfig, FrameClock};
use crate::error::{EngineError, ThemeError};
use crate::forest::{Forest, ForestConfig};
use crate::palette::{Palette, PaletteInput};
use crate::projection::{ProjectionConfig, body_alpha, project};
use crate::surface::{Paint, Rect, Surface};
use crate::theme::{DEFAULT_THEME_DURATION_MS, Easing, ThemeTransition};
use crate::viewport::{SceneGradients, Viewport};

/// Everything tunable about an engine instance.
#[derive(Clone, Debug, PartialEq)]
pub struct EngineConfig {
    pub forest: ForestConfig,
    pub path: CameraPathConfig,
    pub projection: ProjectionConfig,
    pub clock: ClockConfig,
    pub theme_duration_ms: f32,
    pub theme_easing: Easing,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            forest: ForestConfig::default(),
            path: CameraPathConfig::default(),
            projection: ProjectionConfig::default(),
            clock: ClockConfig::default(),
            theme_duration_ms: DEFAULT_THEME_DURATION_MS,
            theme_easing: Easing::SmoothStep,
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn forest(mut self, forest: ForestConfig) -> Self {
        self.forest = forest;
        self
    }

    pub fn path(mut self, path: CameraPathConfig) -> Self {
        self.path = path;
        self
    }

    pub fn projection(mut self, projection: ProjectionConfig) -> Self {
        self.projection = projection;
        self
    }

    pub fn clock(mut self, clock: ClockConfig) -> Self {
        self.clock = clock;
        self
    }

    pub fn theme_duration(mut self, duration_ms: f32) -> Self {
        self.theme_duration_ms = duration_ms;
        self
    }

    pub fn theme_easing(mut self, easing: Easing) -> Self {
        self.theme_easing = easing;
        self
    }
}

/// Running totals of cache work, for diagnostics.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Sky + fog gradient pairs built.
    pub scene_gradient_builds: u64,
    /// Individual tree gradients built.
    pub tree_gradient_builds: u64,
    /// Full passes recomputing every tree's body ramp and stops.
    pub color_ramp_builds: u64,
    pub frames_drawn: u64,
    pub frames_skipped: u64,
}

/// What happened during one tick.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// Trees that produced draw calls.
    pub drawn: usize,
    /// Trees rejected by projection or culling.
    pub culled: usize,
    /// True when nothing was drawn (no surface, zero size, or not initialized).
    pub skipped: bool,
}

impl FrameStats {
    fn skipped() -> Self {
        Self {
            skipped: true,
            ..Self::default()
        }
    }
}

/// One forest renderer instance.
pub struct Engine<S: Surface> {
    config: EngineConfig,
    surface: Option<S>,
    viewport: Viewport,
    scene: SceneGradients<S::Gradient>,
    forest: Forest<S::Gradient>,
    path: CameraPath,
    camera: Camera,
    palette: Palette,
    transition: ThemeTransition,
    clock: FrameClock,
    start_ms: Option<f64>,
    now_ms: f64,
    initialized: bool,
    skipping: bool,
    stats: CacheStats,
    last_frame: FrameStats,
}

impl<S: Surface> Engine<S> {
    pub fn new(config: EngineConfig) -> Self {
        let transition = ThemeTransition::new(config.theme_duration_ms).easing(config.theme_easing);
        Self {
            path: CameraPath::new(config.path.clone()),
            clock: FrameClock::new(config.clock),
            config,
            surface: None,
            viewport: Viewport::empty(),
            scene: SceneGradients::default(),
            forest: Forest::new(),
            camera: Camera::default(),
            palette: Palette::default(),
            transition,
            start_ms: None,
            now_ms: 0.0,
            initialized: false,
            skipping: false,
            stats: CacheStats::default(),
            last_frame: FrameStats::default(),
        }
    }

    // ========================================================================
    // Host entry points
    // ========================================================================

    /// Attach the surface, plant the forest and build every cache.
    ///
    /// Fails without a surface; that is a host configuration error.
    pub fn init(
        &mut self,
        surface: Option<S>,
        width: u32,
        height: u32,
        pixel_scale: f32,
        theme: Option<&PaletteInput>,
    ) -> Result<(), EngineError> {
        if self.initialized {
            return Err(EngineError::AlreadyInitialized);
        }
        let surface = surface.ok_or(EngineError::MissingSurface)?;

        if let Some(theme) = theme {
            self.palette = self.palette.apply(theme);
        }
        self.surface = Some(surface);

        self.forest.build(&self.config.forest, &self.palette);
        self.stats.color_ramp_builds += 1;
        self.initialized = true;
        self.apply_viewport(width, height, pixel_scale);

        info!(
            trees = self.forest.len(),
            rows = self.forest.rows_per_column(),
            width,
            height,
            pixel_scale,
            "forest engine initialized"
        );
        Ok(())
    }

    /// Resize the viewport. The forest is kept; only size-dependent caches rebuild.
    pub fn resize(&mut self, width: u32, height: u32, pixel_scale: f32) {
        debug!(width, height, pixel_scale, "resize");
        self.apply_viewport(width, height, pixel_scale);
    }

    /// Start fading to `input` merged over the latest palette.
    ///
    /// Before [`init`](Self::init) the palette is replaced immediately.
    pub fn set_theme(&mut self, input: &PaletteInput) {
        let base = if self.transition.is_active() {
            self.transition.target().clone()
        } else {
            self.palette.clone()
        };
        let target = base.apply(input);

        if !self.initialized {
            self.palette = target;
            return;
        }

        info!(
            duration_ms = self.transition.duration_ms(),
            rejected = input.rejected().len(),
            "theme transition started"
        );
        self.transition.begin(self.palette.clone(), target, self.now_ms);
    }

    /// Parse theme JSON and start a transition. Malformed JSON keeps the current palette.
    pub fn set_theme_json(&mut self, json: &str) -> Result<(), ThemeError> {
        match PaletteInput::from_json(json) {
            Ok(input) => {
                self.set_theme(&input);
                Ok(())
            }
            Err(err) => {
                warn!(%err, "rejected theme update, keeping current palette");
                Err(err)
            }
        }
    }

    /// Advance one frame to host time `now_ms` and draw it.
    pub fn tick(&mut self, now_ms: f64) -> FrameStats {
        let dt = self.clock.delta(now_ms);
        let start = match self.start_ms {
            Some(start) => start,
            None => {
                self.start_ms = Some(now_ms);
                if self.transition.is_active() {
                    self.transition.restart_at(now_ms);
                }
                now_ms
            }
        };
        self.now_ms = now_ms;

        if !self.initialized {
            self.last_frame = FrameStats::skipped();
            return self.last_frame;
        }

        if let Some(palette) = self.transition.step(now_ms) {
            self.palette = palette;
            self.forest.refresh_colors(&self.palette);
            self.stats.color_ramp_builds += 1;
            self.rebuild_tree_gradients();
            self.rebuild_scene_gradients();
            if !self.transition.is_active() {
                info!("theme transition finished");
            }
        }

        let drawable = self.surface.is_some() && self.viewport.is_drawable();
        self.note_drawable(drawable);

        if drawable {
            self.begin_frame();
        }

        self.camera = self.path.camera_at(now_ms - start, self.viewport.fov);
        self.forest.advance(dt, &self.config.forest);
        self.forest.depth_sort();

        if !drawable {
            self.stats.frames_skipped += 1;
            self.last_frame = FrameStats::skipped();
            return self.last_frame;
        }

        let frame = self.draw_trees();
        self.finish_frame();
        self.stats.frames_drawn += 1;
        self.last_frame = frame;
        frame
    }

    // ========================================================================
    // Drawing
    // ========================================================================

    fn begin_frame(&mut self) {
        let Some(surface) = self.surface.as_mut() else {
            return;
        };
        let (w, h) = (self.viewport.width, self.viewport.height);
        surface.begin_frame(w, h);
        paint_full(surface, &self.viewport, self.scene.sky.as_ref());
    }

    fn finish_frame(&mut self) {
        let Some(surface) = self.surface.as_mut() else {
            return;
        };
        paint_full(surface, &self.viewport, self.scene.fog.as_ref());
        surface.set_alpha(1.0);
        surface.end_frame();
    }

    fn draw_trees(&mut self) -> FrameStats {
        let Self {
            surface,
            forest,
            camera,
            viewport,
            config,
            stats,
            ..
        } = self;
        let Some(surface) = surface.as_mut() else {
            return FrameStats::skipped();
        };

        let (top, bottom) = viewport.clip_lines();
        let mut frame = FrameStats::default();

        for tree in forest.trees_mut() {
            let silhouette = match project(tree, camera, viewport, &config.projection) {
                Ok(silhouette) => silhouette,
                Err(_) => {
                    frame.culled += 1;
                    continue;
                }
            };

            surface.set_alpha(body_alpha(&silhouette, &config.projection));
            surface.fill_path(
                &silhouette.corners,
                Paint::Solid(tree.body_color(silhouette.depth)),
            );

            let lit_alpha = (tree.lit() * silhouette.alpha).min(1.0);
            let gradient = tree.gradient_or_build(|stops| {
                stats.tree_gradient_builds += 1;
                surface.create_linear_gradient(Vec2::new(0.0, top), Vec2::new(0.0, bottom), stops)
            });
            surface.set_alpha(lit_alpha);
            surface.fill_path(&silhouette.corners, Paint::Gradient(gradient));

            frame.drawn += 1;
        }
        frame
    }

    // ========================================================================
    // Cache maintenance
    // ========================================================================

    fn apply_viewport(&mut self, width: u32, height: u32, pixel_scale: f32) {
        let next = Viewport::new(width, height, pixel_scale, &self.config.projection);
        let clip_changed = next.clip_lines() != self.viewport.clip_lines();
        self.viewport = next;

        if let Some(surface) = self.surface.as_mut() {
            surface.resize(width, height);
        }
        if clip_changed {
            self.rebuild_tree_gradients();
        }
        self.rebuild_scene_gradients();
    }

    fn rebuild_tree_gradients(&mut self) {
        let Some(surface) = self.surface.as_mut() else {
            self.forest.invalidate_gradients();
            return;
        };
        if !self.viewport.is_drawable() {
            self.forest.invalidate_gradients();
            return;
        }

        let (top, bottom) = self.viewport.clip_lines();
        let built = self.forest.rebuild_gradients(|stops| {
            surface.create_linear_gradient(Vec2::new(0.0, top), Vec2::new(0.0, bottom), stops)
        });
        self.stats.tree_gradient_builds += built as u64;
        debug!(built, "rebuilt tree gradients");
    }

    fn rebuild_scene_gradients(&mut self) {
        let Some(surface) = self.surface.as_mut() else {
            return;
        };
        if !self.viewport.is_drawable() {
            self.scene = SceneGradients::default();
            return;
        }

        let end = Vec2::new(0.0, self.viewport.height as f32);
        self.scene.sky = Some(surface.create_linear_gradient(
            Vec2::ZERO,
            end,
            &self.palette.sky_stops(),
        ));
        self.scene.fog = Some(surface.create_linear_gradient(
            Vec2::ZERO,
            end,
            &self.palette.fog_stops(),
        ));
        self.stats.scene_gradient_builds += 1;
    }

    fn note_drawable(&mut self, drawable: bool) {
        if drawable == !self.skipping {
            return;
        }
        self.skipping = !drawable;
        if drawable {
            info!("drawing resumed");
        } else {
            warn!(
                has_surface = self.surface.is_some(),
                width = self.viewport.width,
                height = self.viewport.height,
                "nothing to draw on, skipping frames"
            );
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn is_transitioning(&self) -> bool {
        self.transition.is_active()
    }

    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    pub fn forest(&self) -> &Forest<S::Gradient> {
        &self.forest
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    pub fn last_frame(&self) -> FrameStats {
        self.last_frame
    }

    pub fn surface(&self) -> Option<&S> {
        self.surface.as_ref()
    }

    pub fn surface_mut(&mut self) -> Option<&mut S> {
        self.surface.as_mut()
    }

    /// Detach the surface. Ticks keep simulating but draw nothing until one is attached.
    pub fn take_surface(&mut self) -> Option<S> {
        self.forest.invalidate_gradients();
        self.scene = SceneGradients::default();
        self.surface.take()
    }

    /// Attach a new surface and rebuild every gradient against it.
    pub fn attach_surface(&mut self, surface: S) {
        self.surface = Some(surface);
        let viewport = self.viewport;
        if let Some(surface) = self.surface.as_mut() {
            surface.resize(viewport.width, viewport.height);
        }
        self.rebuild_tree_gradients();
        self.rebuild_scene_gradients();
    }
}

fn paint_full<S: Surface>(surface: &mut S, viewport: &Viewport, gradient: Option<&S::Gradient>) {
    let Some(gradient) = gradient else {
        return;
    };
    let rect = Rect::new(0.0, 0.0, viewport.width as f32, viewport.height as f32);
    surface.set_alpha(1.0);
    surface.fill_rect(rect, Paint::Gradient(gradient));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::{DrawCommand, RecordingSurface};

    fn engine() -> Engine<RecordingSurface> {
        Engine::new(EngineConfig::default())
    }

    #[test]
    fn init_without_surface_fails() {
        let mut e = engine();
        assert!(matches!(
            e.init(None, 800, 600, 1.0, None),
            Err(EngineError::MissingSurface)
        ));
        assert!(!e.is_initialized());
    }

    #[test]
    fn init_twice_fails() {
        let mut e = engine();
        e.init(Some(RecordingSurface::new()), 800, 600, 1.0, None).unwrap();
        assert!(matches!(
            e.init(Some(RecordingSurface::new()), 800, 600, 1.0, None),
            Err(EngineError::AlreadyInitialized)
        ));
    }

    #[test]
    fn tick_before_init_is_skipped() {
        let mut e = engine();
        assert!(e.tick(0.0).skipped);
    }

    #[test]
    fn frame_is_bracketed_by_sky_and_fog() {
        let mut e = engine();
        e.init(Some(RecordingSurface::new()), 800, 600, 1.0, None).unwrap();
        e.surface_mut().unwrap().clear();
        let frame = e.tick(0.0);
        assert!(!frame.skipped);

        let commands = &e.surface().unwrap().commands;
        assert!(matches!(
            commands.first(),
            Some(DrawCommand::BeginFrame {
                width: 800,
                height: 600
            })
        ));
        assert!(matches!(commands.last(), Some(DrawCommand::EndFrame)));

        let rects: Vec<usize> = commands
            .iter()
            .enumerate()
            .filter(|(_, c)| matches!(c, DrawCommand::FillRect { .. }))
            .map(|(i, _)| i)
            .collect();
        assert_eq!(rects.len(), 2);
        let paths = e.surface().unwrap().path_count();
        assert_eq!(paths, frame.drawn * 2);
    }

    #[test]
    fn set_theme_before_init_applies_immediately() {
        let mut e = engine();
        e.set_theme(&PaletteInput::from(&Palette::dawn()));
        assert_eq!(e.palette(), &Palette::dawn());
        assert!(!e.is_transitioning());
    }

    #[test]
    fn detached_surface_skips_until_reattached() {
        let mut e = engine();
        e.init(Some(RecordingSurface::new()), 800, 600, 1.0, None).unwrap();
        e.tick(0.0);

        let surface = e.take_surface().unwrap();
        assert_eq!(e.forest().cached_gradients(), 0);
        assert!(e.tick(16.0).skipped);
        assert_eq!(e.stats().frames_skipped, 1);

        e.attach_surface(surface);
        assert_eq!(e.forest().cached_gradients(), e.forest().len());
        assert!(!e.tick(32.0).skipped);
    }

    #[test]
    fn malformed_theme_json_keeps_palette() {
        let mut e = engine();
        e.init(Some(RecordingSurface::new()), 800, 600, 1.0, None).unwrap();
        assert!(e.set_theme_json("{{{").is_err());
        assert!(!e.is_transitioning());
        assert_eq!(e.palette(), &Palette::dusk());
    }
}
