//! GPU-backed [`Surface`] built on wgpu.
//!
//! Every fill is tessellated on the CPU into colored triangles and batched;
//! the whole frame is uploaded and drawn in a single render pass at
//! [`end_frame`](Surface::end_frame).
//!
//! Linear gradients are exact: a polygon is first cut into bands at every
//! interior color stop, so each band only spans one linear segment of the ramp
//! and plain per-vertex color interpolation reproduces it.

use glam::Vec2;
use tracing::{error, warn};

use crate::color::{Color, ColorStop, sample_stops};
use crate::gpu::GpuContext;
use crate::surface::{Paint, Rect, Surface};

/// Vertex for flat 2D triangles.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex2d {
    pub position: [f32; 2],
    pub color: [f32; 4],
}

impl Vertex2d {
    pub const LAYOUT: wgpu::VertexBufferLayout<'static> = wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<Vertex2d>() as u64,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &[
            // position
            wgpu::VertexAttribute {
                offset: 0,
                shader_location: 0,
                format: wgpu::VertexFormat::Float32x2,
            },
            // color
            wgpu::VertexAttribute {
                offset: 8,
                shader_location: 1,
                format: wgpu::VertexFormat::Float32x4,
            },
        ],
    };

    fn new(position: Vec2, color: Color) -> Self {
        Self {
            position: position.to_array(),
            color: color.to_array(),
        }
    }
}

#[repr(C)]
#[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct CanvasUniforms {
    resolution: [f32; 2],
    linearize: f32,
    _padding: f32,
}

/// Per-frame vertex capacity. Fills beyond it are dropped for the frame.
pub const MAX_VERTICES: usize = 65536;

/// A linear gradient in surface pixel coordinates.
#[derive(Clone, Debug, PartialEq)]
pub struct LinearGradient {
    start: Vec2,
    end: Vec2,
    stops: Vec<ColorStop>,
}

impl LinearGradient {
    pub fn new(start: Vec2, end: Vec2, stops: &[ColorStop]) -> Self {
        Self {
            start,
            end,
            stops: stops.to_vec(),
        }
    }

    pub fn stops(&self) -> &[ColorStop] {
        &self.stops
    }

    /// Unclamped position of `point` along the gradient axis (0 at start, 1 at end).
    pub fn axis_t(&self, point: Vec2) -> f32 {
        let axis = self.end - self.start;
        let len_sq = axis.length_squared();
        if len_sq <= f32::EPSILON {
            return 0.0;
        }
        (point - self.start).dot(axis) / len_sq
    }

    pub fn color_at(&self, point: Vec2) -> Color {
        sample_stops(&self.stops, self.axis_t(point))
    }
}

// ============================================================================
// Tessellation
// ============================================================================

/// Fan-triangulate a convex polygon with a single color.
pub fn tessellate_solid(points: &[Vec2], color: Color, out: &mut Vec<Vertex2d>) {
    if points.len() < 3 {
        return;
    }
    let first = Vertex2d::new(points[0], color);
    for pair in points[1..].windows(2) {
        out.push(first);
        out.push(Vertex2d::new(pair[0], color));
        out.push(Vertex2d::new(pair[1], color));
    }
}

/// Reusable buffers for [`tessellate_gradient`], so steady frames don't allocate.
#[derive(Debug, Default)]
pub struct GradientScratch {
    tagged: Vec<(Vec2, f32)>,
    cuts: Vec<f32>,
    band: Vec<(Vec2, f32)>,
    clipped: Vec<(Vec2, f32)>,
}

impl GradientScratch {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Tessellate a convex polygon filled with `gradient`, scaling every alpha by `alpha`.
pub fn tessellate_gradient(
    points: &[Vec2],
    gradient: &LinearGradient,
    alpha: f32,
    scratch: &mut GradientScratch,
    out: &mut Vec<Vertex2d>,
) {
    if points.len() < 3 {
        return;
    }
    let GradientScratch {
        tagged,
        cuts,
        band,
        clipped,
    } = scratch;

    tagged.clear();
    tagged.extend(points.iter().map(|&p| (p, gradient.axis_t(p))));
    let (t_min, t_max) = tagged
        .iter()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &(_, t)| {
            (lo.min(t), hi.max(t))
        });

    cuts.clear();
    cuts.extend(
        gradient
            .stops
            .iter()
            .map(|s| s.offset)
            .filter(|&o| o > t_min && o < t_max),
    );
    cuts.dedup();

    let mut lower = f32::NEG_INFINITY;
    for i in 0..=cuts.len() {
        let upper = cuts.get(i).copied().unwrap_or(f32::INFINITY);
        band.clear();
        band.extend_from_slice(tagged);
        if lower.is_finite() {
            clip_axis(band, lower, true, clipped);
            std::mem::swap(band, clipped);
        }
        if upper.is_finite() {
            clip_axis(band, upper, false, clipped);
            std::mem::swap(band, clipped);
        }
        if band.len() >= 3 {
            let first = shade(band[0], gradient, alpha);
            for pair in band[1..].windows(2) {
                out.push(first);
                out.push(shade(pair[0], gradient, alpha));
                out.push(shade(pair[1], gradient, alpha));
            }
        }
        lower = upper;
    }
}

fn shade((point, t): (Vec2, f32), gradient: &LinearGradient, alpha: f32) -> Vertex2d {
    let color = sample_stops(&gradient.stops, t);
    Vertex2d::new(point, color.with_alpha(color.a * alpha))
}

/// Sutherland–Hodgman against one axis boundary, written into `out`. Keeps
/// `t >= boundary` when `keep_above`, otherwise `t <= boundary`.
fn clip_axis(
    polygon: &[(Vec2, f32)],
    boundary: f32,
    keep_above: bool,
    out: &mut Vec<(Vec2, f32)>,
) {
    let inside = |t: f32| if keep_above { t >= boundary } else { t <= boundary };
    out.clear();

    for (i, &current) in polygon.iter().enumerate() {
        let previous = polygon[(i + polygon.len() - 1) % polygon.len()];
        let (cur_in, prev_in) = (inside(current.1), inside(previous.1));

        if cur_in != prev_in {
            let s = (boundary - previous.1) / (current.1 - previous.1);
            let point = previous.0 + (current.0 - previous.0) * s;
            out.push((point, boundary));
        }
        if cur_in {
            out.push(current);
        }
    }
}

// ============================================================================
// GPU canvas
// ============================================================================

/// Draws the forest with wgpu.
pub struct GpuCanvas {
    gpu: GpuContext,
    pipeline: wgpu::RenderPipeline,
    vertex_buffer: wgpu::Buffer,
    uniform_buffer: wgpu::Buffer,
    uniform_bind_group: wgpu::BindGroup,
    vertices: Vec<Vertex2d>,
    scratch: GradientScratch,
    alpha: f32,
    clear_color: wgpu::Color,
    overflow_reported: bool,
}

impl GpuCanvas {
    pub fn new(gpu: GpuContext) -> Self {
        let device = &gpu.device;

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Canvas Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/canvas.wgsl").into()),
        });

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Canvas Uniforms"),
            size: std::mem::size_of::<CanvasUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let uniform_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Canvas Uniform Layout"),
                entries: &[wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                }],
            });

        let uniform_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Canvas Uniform Bind Group"),
            layout: &uniform_bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Canvas Pipeline Layout"),
            bind_group_layouts: &[&uniform_bind_group_layout],
            push_constant_ranges: &[],
        });

        // Straight alpha blending
        let blend_state = wgpu::BlendState {
            color: wgpu::BlendComponent {
                src_factor: wgpu::BlendFactor::SrcAlpha,
                dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
                operation: wgpu::BlendOperation::Add,
            },
            alpha: wgpu::BlendComponent {
                src_factor: wgpu::BlendFactor::One,
                dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
                operation: wgpu::BlendOperation::Add,
            },
        };

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Canvas Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs"),
                buffers: &[Vertex2d::LAYOUT],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: gpu.config.format,
                    blend: Some(blend_state),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                ..Default::default()
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        let vertex_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Canvas Vertex Buffer"),
            size: (MAX_VERTICES * std::mem::size_of::<Vertex2d>()) as u64,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        Self {
            gpu,
            pipeline,
            vertex_buffer,
            uniform_buffer,
            uniform_bind_group,
            vertices: Vec::with_capacity(8192),
            scratch: GradientScratch::new(),
            alpha: 1.0,
            clear_color: wgpu::Color::BLACK,
            overflow_reported: false,
        }
    }

    /// Color the frame is cleared to before the sky is painted.
    pub fn clear_color(mut self, color: Color) -> Self {
        self.clear_color = wgpu::Color {
            r: color.r as f64,
            g: color.g as f64,
            b: color.b as f64,
            a: color.a as f64,
        };
        self
    }

    pub fn gpu(&self) -> &GpuContext {
        &self.gpu
    }

    /// Vertices batched for the current frame.
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    fn fill_polygon(&mut self, points: &[Vec2], paint: Paint<'_, LinearGradient>) {
        match paint {
            Paint::Solid(color) => {
                let color = color.with_alpha(color.a * self.alpha);
                tessellate_solid(points, color, &mut self.vertices);
            }
            Paint::Gradient(gradient) => {
                tessellate_gradient(
                    points,
                    gradient,
                    self.alpha,
                    &mut self.scratch,
                    &mut self.vertices,
                );
            }
        }
    }

    fn render(&mut self) {
        if self.vertices.len() > MAX_VERTICES {
            if !self.overflow_reported {
                warn!(
                    vertices = self.vertices.len(),
                    capacity = MAX_VERTICES,
                    "canvas vertex budget exceeded, dropping excess fills"
                );
                self.overflow_reported = true;
            }
            self.vertices.truncate(MAX_VERTICES - MAX_VERTICES % 3);
        }

        let output = match self.gpu.surface.get_current_texture() {
            Ok(output) => output,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                self.gpu.reconfigure();
                return;
            }
            Err(wgpu::SurfaceError::Timeout) => {
                warn!("surface timed out, skipping frame");
                return;
            }
            Err(err) => {
                error!(%err, "failed to acquire surface texture");
                return;
            }
        };
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let uniforms = CanvasUniforms {
            resolution: [self.gpu.width() as f32, self.gpu.height() as f32],
            linearize: if self.gpu.is_srgb() { 1.0 } else { 0.0 },
            _padding: 0.0,
        };
        self.gpu
            .queue
            .write_buffer(&self.uniform_buffer, 0, bytemuck::cast_slice(&[uniforms]));
        if !self.vertices.is_empty() {
            self.gpu
                .queue
                .write_buffer(&self.vertex_buffer, 0, bytemuck::cast_slice(&self.vertices));
        }

        let mut encoder = self
            .gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Canvas Encoder"),
            });

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Canvas Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(self.clear_color),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            if !self.vertices.is_empty() {
                render_pass.set_pipeline(&self.pipeline);
                render_pass.set_bind_group(0, &self.uniform_bind_group, &[]);
                render_pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
                render_pass.draw(0..self.vertices.len() as u32, 0..1);
            }
        }

        self.gpu.queue.submit(std::iter::once(encoder.finish()));
        output.present();
    }
}

impl Surface for GpuCanvas {
    type Gradient = LinearGradient;

    fn set_alpha(&mut self, alpha: f32) {
        self.alpha = alpha.clamp(0.0, 1.0);
    }

    fn fill_rect(&mut self, rect: Rect, paint: Paint<'_, LinearGradient>) {
        self.fill_polygon(&rect.corners(), paint);
    }

    fn fill_path(&mut self, points: &[Vec2], paint: Paint<'_, LinearGradient>) {
        self.fill_polygon(points, paint);
    }

    fn create_linear_gradient(
        &mut self,
        start: Vec2,
        end: Vec2,
        stops: &[ColorStop],
    ) -> LinearGradient {
        LinearGradient::new(start, end, stops)
    }

    fn begin_frame(&mut self, width: u32, height: u32) {
        self.vertices.clear();
        self.alpha = 1.0;
        if width != self.gpu.width() || height != self.gpu.height() {
            self.gpu.resize(width, height);
        }
    }

    fn end_frame(&mut self) {
        self.render();
        self.vertices.clear();
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.gpu.resize(width, height);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> [Vec2; 4] {
        Rect::new(0.0, 0.0, 10.0, 10.0).corners()
    }

    fn vertical(stops: &[ColorStop]) -> LinearGradient {
        LinearGradient::new(Vec2::ZERO, Vec2::new(0.0, 10.0), stops)
    }

    #[test]
    fn solid_quad_is_two_triangles() {
        let mut out = Vec::new();
        tessellate_solid(&square(), Color::WHITE, &mut out);
        assert_eq!(out.len(), 6);
        assert!(out.iter().all(|v| v.color == Color::WHITE.to_array()));
    }

    #[test]
    fn degenerate_polygons_emit_nothing() {
        let mut out = Vec::new();
        tessellate_solid(&[Vec2::ZERO, Vec2::X], Color::WHITE, &mut out);
        let mut scratch = GradientScratch::new();
        tessellate_gradient(&[Vec2::ZERO], &vertical(&[]), 1.0, &mut scratch, &mut out);
        assert!(out.is_empty());
    }

    #[test]
    fn axis_projection() {
        let g = vertical(&[]);
        assert_eq!(g.axis_t(Vec2::new(3.0, 0.0)), 0.0);
        assert_eq!(g.axis_t(Vec2::new(7.0, 5.0)), 0.5);
        assert_eq!(g.axis_t(Vec2::new(0.0, 20.0)), 2.0);
    }

    #[test]
    fn gradient_is_cut_at_interior_stops() {
        let g = vertical(&[
            ColorStop::new(0.0, Color::BLACK),
            ColorStop::new(0.5, Color::WHITE),
            ColorStop::new(1.0, Color::BLACK),
        ]);
        let mut out = Vec::new();
        tessellate_gradient(&square(), &g, 1.0, &mut GradientScratch::new(), &mut out);

        // Two quads, one on each side of the middle stop.
        assert_eq!(out.len(), 12);
        for v in &out {
            let expected = g.color_at(Vec2::from(v.position));
            assert!((v.color[0] - expected.r).abs() < 1e-5);
        }
        assert!(out.iter().any(|v| v.position[1] == 5.0 && v.color[0] == 1.0));
    }

    #[test]
    fn gradient_alpha_is_scaled() {
        let g = vertical(&[
            ColorStop::new(0.0, Color::WHITE),
            ColorStop::new(1.0, Color::WHITE.with_alpha(0.5)),
        ]);
        let mut out = Vec::new();
        tessellate_gradient(&square(), &g, 0.5, &mut GradientScratch::new(), &mut out);
        for v in &out {
            assert!(v.color[3] <= 0.5 + 1e-6);
            assert!(v.color[3] >= 0.25 - 1e-6);
        }
    }

    #[test]
    fn clipping_keeps_the_requested_side() {
        let tagged: Vec<(Vec2, f32)> = square().iter().map(|&p| (p, p.y / 10.0)).collect();
        let mut upper = Vec::new();
        clip_axis(&tagged, 0.3, false, &mut upper);
        assert!(upper.iter().all(|&(_, t)| t <= 0.3 + 1e-6));
        assert_eq!(upper.len(), 4);

        let mut lower = vec![(Vec2::ZERO, 9.0)];
        clip_axis(&tagged, 0.3, true, &mut lower);
        assert_eq!(lower.len(), 4);
        assert!(lower.iter().all(|&(_, t)| t >= 0.3 - 1e-6));
    }

    #[test]
    fn scratch_buffers_are_reused_across_fills() {
        let g = vertical(&[
            ColorStop::new(0.0, Color::BLACK),
            ColorStop::new(0.25, Color::WHITE),
            ColorStop::new(0.75, Color::WHITE),
            ColorStop::new(1.0, Color::BLACK),
        ]);
        let mut scratch = GradientScratch::new();
        let mut first = Vec::new();
        tessellate_gradient(&square(), &g, 1.0, &mut scratch, &mut first);

        let buffers = |s: &GradientScratch| {
            [
                (s.tagged.as_ptr() as usize, s.tagged.capacity()),
                (s.cuts.as_ptr() as usize, s.cuts.capacity()),
                (s.band.as_ptr() as usize, s.band.capacity()),
                (s.clipped.as_ptr() as usize, s.clipped.capacity()),
            ]
        };
        let warm = buffers(&scratch);

        let mut second = Vec::new();
        for _ in 0..10 {
            second.clear();
            tessellate_gradient(&square(), &g, 1.0, &mut scratch, &mut second);
        }
        assert_eq!(first, second);
        assert_eq!(first.len(), 18);

        // band and clipped trade places on every clip, so compare as a set.
        let mut before = warm;
        let mut after = buffers(&scratch);
        before.sort_unstable();
        after.sort_unstable();
        assert_eq!(before, after);
    }
}
