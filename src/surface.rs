//! The drawing capability the engine renders through.
//!
//! [`Surface`] is deliberately tiny: fill a rectangle, fill a polygon, build a
//! linear gradient, and set a global alpha. Everything the forest needs can be
//! expressed with those four operations, which keeps the simulation and
//! projection code testable without a GPU.
//!
//! Two implementations ship with the crate:
//!
//! - [`GpuCanvas`](crate::GpuCanvas) tessellates paths into colored triangles and
//!   draws them with wgpu.
//! - [`RecordingSurface`] stores every call for inspection in tests.

use glam::Vec2;

use crate::color::{Color, ColorStop};

/// A rectangle in surface pixel coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Corners in clockwise order starting at the top-left.
    pub fn corners(&self) -> [Vec2; 4] {
        [
            Vec2::new(self.x, self.y),
            Vec2::new(self.x + self.width, self.y),
            Vec2::new(self.x + self.width, self.y + self.height),
            Vec2::new(self.x, self.y + self.height),
        ]
    }
}

/// How a fill is colored.
#[derive(Debug)]
pub enum Paint<'a, G> {
    Solid(Color),
    Gradient(&'a G),
}

impl<G> Clone for Paint<'_, G> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<G> Copy for Paint<'_, G> {}

/// Rendering capability used by the engine.
///
/// Gradients are created once and handed back by reference on every fill, so an
/// implementation is free to make `Gradient` as heavy as it likes.
pub trait Surface {
    /// Opaque gradient object produced by [`create_linear_gradient`](Self::create_linear_gradient).
    type Gradient;

    /// Multiply every following fill by `alpha` until changed again.
    fn set_alpha(&mut self, alpha: f32);

    fn fill_rect(&mut self, rect: Rect, paint: Paint<'_, Self::Gradient>);

    /// Fill a convex polygon given in drawing order.
    fn fill_path(&mut self, points: &[Vec2], paint: Paint<'_, Self::Gradient>);

    /// Build a gradient running from `start` to `end` in surface coordinates.
    fn create_linear_gradient(
        &mut self,
        start: Vec2,
        end: Vec2,
        stops: &[ColorStop],
    ) -> Self::Gradient;

    /// Called once per drawn frame before any fill.
    fn begin_frame(&mut self, _width: u32, _height: u32) {}

    /// Called once per drawn frame after the last fill.
    fn end_frame(&mut self) {}

    /// The backing store changed size (device pixels).
    fn resize(&mut self, _width: u32, _height: u32) {}
}

// ============================================================================
// Recording implementation
// ============================================================================

/// Gradient handle produced by [`RecordingSurface`].
#[derive(Clone, Debug, PartialEq)]
pub struct RecordedGradient {
    pub id: usize,
    pub start: Vec2,
    pub end: Vec2,
    pub stops: Vec<ColorStop>,
}

/// Paint as captured by [`RecordingSurface`]: gradients are referenced by id.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum RecordedPaint {
    Solid(Color),
    Gradient(usize),
}

/// One captured surface call.
#[derive(Clone, Debug, PartialEq)]
pub enum DrawCommand {
    BeginFrame { width: u32, height: u32 },
    SetAlpha(f32),
    FillRect { rect: Rect, paint: RecordedPaint },
    FillPath { points: Vec<Vec2>, paint: RecordedPaint },
    EndFrame,
    Resize { width: u32, height: u32 },
}

/// Headless surface that records every call.
///
/// # Example
///
/// ```
/// use canopy::{Color, Paint, RecordingSurface, Rect, Surface};
///
/// let mut surface = RecordingSurface::new();
/// surface.fill_rect(Rect::new(0.0, 0.0, 4.0, 4.0), Paint::Solid(Color::BLACK));
/// assert_eq!(surface.fill_count(), 1);
/// ```
#[derive(Debug, Default)]
pub struct RecordingSurface {
    pub commands: Vec<DrawCommand>,
    gradients_created: usize,
}

impl RecordingSurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total gradients built since creation.
    pub fn gradients_created(&self) -> usize {
        self.gradients_created
    }

    /// Number of `fill_rect` and `fill_path` calls recorded.
    pub fn fill_count(&self) -> usize {
        self.commands
            .iter()
            .filter(|c| matches!(c, DrawCommand::FillRect { .. } | DrawCommand::FillPath { .. }))
            .count()
    }

    /// Number of `fill_path` calls recorded.
    pub fn path_count(&self) -> usize {
        self.commands
            .iter()
            .filter(|c| matches!(c, DrawCommand::FillPath { .. }))
            .count()
    }

    /// Number of completed frames recorded.
    pub fn frames(&self) -> usize {
        self.commands
            .iter()
            .filter(|c| matches!(c, DrawCommand::EndFrame))
            .count()
    }

    pub fn clear(&mut self) {
        self.commands.clear();
    }

    fn record_paint(paint: Paint<'_, RecordedGradient>) -> RecordedPaint {
        match paint {
            Paint::Solid(color) => RecordedPaint::Solid(color),
            Paint::Gradient(gradient) => RecordedPaint::Gradient(gradient.id),
        }
    }
}

impl Surface for RecordingSurface {
    type Gradient = RecordedGradient;

    fn set_alpha(&mut self, alpha: f32) {
        self.commands.push(DrawCommand::SetAlpha(alpha));
    }

    fn fill_rect(&mut self, rect: Rect, paint: Paint<'_, RecordedGradient>) {
        let paint = Self::record_paint(paint);
        self.commands.push(DrawCommand::FillRect { rect, paint });
    }

    fn fill_path(&mut self, points: &[Vec2], paint: Paint<'_, RecordedGradient>) {
        let paint = Self::record_paint(paint);
        self.commands.push(DrawCommand::FillPath {
            points: points.to_vec(),
            paint,
        });
    }

    fn create_linear_gradient(
        &mut self,
        start: Vec2,
        end: Vec2,
        stops: &[ColorStop],
    ) -> RecordedGradient {
        let id = self.gradients_created;
        self.gradients_created += 1;
        RecordedGradient {
            id,
            start,
            end,
            stops: stops.to_vec(),
        }
    }

    fn begin_frame(&mut self, width: u32, height: u32) {
        self.commands.push(DrawCommand::BeginFrame { width, height });
    }

    fn end_frame(&mut self) {
        self.commands.push(DrawCommand::EndFrame);
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.commands.push(DrawCommand::Resize { width, height });
    }
}
