//! Perspective projection, fading and culling of individual trees.
//!
//! A tree is drawn as a trapezoid. Its wide bottom edge uses the ordinary
//! perspective scale `fov / rz`; its narrow top edge uses a much flatter scale
//! `fov / (far · 4)` so every trunk leans toward a shared vanishing point no
//! matter how far away it is.
//!
//! Visibility is the product of three independent terms:
//!
//! - **far fade**: linear falloff over the last stretch before the far plane;
//! - **near fade**: trees on the centerline dissolve as they reach the camera,
//!   but trees off to the side are exempt so they can sweep past at full strength;
//! - **lifecycle fade**: the tree's own fade-in after planting or recycling.

use glam::Vec2;

use crate::camera::Camera;
use crate::forest::Tree;
use crate::theme::Easing;
use crate::viewport::Viewport;

/// Tunables for projection and fading.
#[derive(Clone, Debug, PartialEq)]
pub struct ProjectionConfig {
    /// Trees closer than this (camera space) are not drawn.
    pub near: f32,
    /// Far plane. Trees beyond it are invisible.
    pub far: f32,
    /// Fraction of `far` where the far fade begins.
    pub far_fade_start: f32,
    /// Camera-space depth where a centered tree is fully faded out.
    pub near_fade_inner: f32,
    /// Camera-space depth where a centered tree starts fading out.
    pub near_fade_outer: f32,
    /// Lateral distance inside which the near fade applies fully.
    pub center_band_inner: f32,
    /// Width of the band over which the near-fade exemption eases in.
    pub center_band_width: f32,
    /// Minimum width of a trunk's top edge, logical pixels.
    pub min_top_px: f32,
    /// Body intensity at the far plane.
    pub base_intensity: f32,
    /// Extra body intensity gained toward the near plane.
    pub depth_weight: f32,
    /// Top clip line as a fraction of viewport height.
    pub top_clip: f32,
    /// Bottom clip line as a fraction of viewport height.
    pub bottom_clip: f32,
    /// Focal length as a fraction of viewport height.
    pub fov_scale: f32,
    /// Trees fainter than this are skipped before any drawing.
    pub alpha_epsilon: f32,
}

impl Default for ProjectionConfig {
    fn default() -> Self {
        Self {
            near: 0.6,
            far: 120.0,
            far_fade_start: 0.72,
            near_fade_inner: 1.5,
            near_fade_outer: 9.0,
            center_band_inner: 1.2,
            center_band_width: 3.5,
            min_top_px: 1.5,
            base_intensity: 0.55,
            depth_weight: 0.4,
            top_clip: -0.04,
            bottom_clip: 1.04,
            fov_scale: 0.85,
            alpha_epsilon: 0.01,
        }
    }
}

impl ProjectionConfig {
    pub fn planes(mut self, near: f32, far: f32) -> Self {
        self.near = near;
        self.far = far;
        self
    }

    pub fn near_fade(mut self, inner: f32, outer: f32) -> Self {
        self.near_fade_inner = inner;
        self.near_fade_outer = outer;
        self
    }

    pub fn center_band(mut self, inner: f32, width: f32) -> Self {
        self.center_band_inner = inner;
        self.center_band_width = width;
        self
    }

    pub fn far_fade_start(mut self, fraction: f32) -> Self {
        self.far_fade_start = fraction;
        self
    }
}

/// Why a tree was not drawn.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Culled {
    /// In front of the near clip distance or behind the camera.
    Behind,
    /// Combined alpha below the epsilon.
    Faded,
    /// Entirely left or right of the viewport.
    OffScreen,
}

/// A tree ready to draw.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Silhouette {
    /// Top-left, top-right, bottom-right, bottom-left.
    pub corners: [Vec2; 4],
    /// 0 at the far plane, 1 at the near plane.
    pub depth: f32,
    /// Combined visibility.
    pub alpha: f32,
}

impl Silhouette {
    /// Leftmost and rightmost x over the top and bottom edges.
    pub fn horizontal_extent(&self) -> (f32, f32) {
        let [tl, tr, br, bl] = self.corners;
        (tl.x.min(bl.x), tr.x.max(br.x))
    }
}

fn clamp01(v: f32) -> f32 {
    v.clamp(0.0, 1.0)
}

/// Normalized depth: 0 at the far plane, 1 at the near plane.
pub fn normalized_depth(rz: f32, config: &ProjectionConfig) -> f32 {
    let range = (config.far - config.near).max(f32::EPSILON);
    clamp01(1.0 - (rz - config.near) / range)
}

/// Linear fade over the last stretch before the far plane.
pub fn far_fade(rz: f32, config: &ProjectionConfig) -> f32 {
    let start = config.far * config.far_fade_start;
    if rz <= start {
        return 1.0;
    }
    let range = (config.far - start).max(f32::EPSILON);
    clamp01(1.0 - (rz - start) / range)
}

/// 1 when far enough away, easing to 0 at `near_fade_inner`.
pub fn near_fade(rz: f32, config: &ProjectionConfig) -> f32 {
    let range = (config.near_fade_outer - config.near_fade_inner).max(f32::EPSILON);
    Easing::SmoothStep.apply((rz - config.near_fade_inner) / range)
}

/// How strongly a tree at lateral offset `rx` ignores the near fade.
pub fn side_keep(rx: f32, config: &ProjectionConfig) -> f32 {
    let width = config.center_band_width.max(f32::EPSILON);
    Easing::SmoothStep.apply((rx.abs() - config.center_band_inner) / width)
}

/// Combined visibility of a tree at camera-space `(rx, rz)` with lifecycle `fade`.
pub fn visibility(rx: f32, rz: f32, fade: f32, config: &ProjectionConfig) -> f32 {
    let near = near_fade(rz, config);
    let keep = side_keep(rx, config);
    fade * (near + (1.0 - near) * keep) * far_fade(rz, config)
}

/// Project one tree, or report why it should be skipped.
pub fn project<G>(
    tree: &Tree<G>,
    camera: &Camera,
    viewport: &Viewport,
    config: &ProjectionConfig,
) -> Result<Silhouette, Culled> {
    let view = camera.to_view(tree.x, tree.z);
    let (rx, rz) = (view.x, view.y);
    if rz < config.near {
        return Err(Culled::Behind);
    }

    let alpha = visibility(rx, rz, tree.fade, config);
    if alpha < config.alpha_epsilon {
        return Err(Culled::Faded);
    }

    let cx = viewport.center_x();
    let scale = camera.fov / rz;
    let top_scale = camera.fov / (config.far * 4.0);

    let bottom_x = cx + rx * scale;
    let bottom_half = tree.half_width() * scale;
    let top_x = cx + rx * top_scale;
    let top_half = (tree.half_width() * top_scale).max(viewport.min_top_px * 0.5);

    let silhouette = Silhouette {
        corners: [
            Vec2::new(top_x - top_half, viewport.top_clip),
            Vec2::new(top_x + top_half, viewport.top_clip),
            Vec2::new(bottom_x + bottom_half, viewport.bottom_clip),
            Vec2::new(bottom_x - bottom_half, viewport.bottom_clip),
        ],
        depth: normalized_depth(rz, config),
        alpha,
    };

    let (left, right) = silhouette.horizontal_extent();
    if left > viewport.width as f32 || right < 0.0 {
        return Err(Culled::OffScreen);
    }
    Ok(silhouette)
}

/// Alpha for the solid body fill.
pub fn body_alpha(silhouette: &Silhouette, config: &ProjectionConfig) -> f32 {
    ((config.base_intensity + silhouette.depth * config.depth_weight) * silhouette.alpha).min(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forest::{Forest, ForestConfig};
    use crate::palette::Palette;

    fn cfg() -> ProjectionConfig {
        ProjectionConfig::default()
    }

    #[test]
    fn alpha_rises_leaving_the_far_plane() {
        let c = cfg();
        let start = c.far * c.far_fade_start;
        let mut last = visibility(0.0, c.far, 1.0, &c);
        assert!(last.abs() < 1e-6);
        let mut rz = c.far - 1.0;
        while rz > start + 0.5 {
            let a = visibility(0.0, rz, 1.0, &c);
            assert!(a > last, "alpha did not rise at rz = {rz}");
            last = a;
            rz -= 1.0;
        }
    }

    #[test]
    fn alpha_falls_approaching_the_camera_on_centerline() {
        let c = cfg();
        let mut last = visibility(0.0, c.near_fade_outer, 1.0, &c);
        let mut rz = c.near_fade_outer - 0.25;
        while rz > c.near_fade_inner + 0.1 {
            let a = visibility(0.0, rz, 1.0, &c);
            assert!(a < last, "alpha did not fall at rz = {rz}");
            last = a;
            rz -= 0.25;
        }
        assert!(visibility(0.0, c.near_fade_inner, 1.0, &c) < 1e-6);
    }

    #[test]
    fn side_trees_are_exempt_from_near_fade() {
        let c = cfg();
        let rx = c.center_band_inner + c.center_band_width + 0.5;
        let mut rz = c.near_fade_outer;
        while rz > c.near {
            assert!((visibility(rx, rz, 1.0, &c) - 1.0).abs() < 1e-6);
            rz -= 0.5;
        }
    }

    #[test]
    fn exemption_eases_across_the_band() {
        let c = cfg();
        let rz = c.near_fade_inner;
        let inner = visibility(c.center_band_inner, rz, 1.0, &c);
        let mid = visibility(c.center_band_inner + c.center_band_width * 0.5, rz, 1.0, &c);
        let outer = visibility(c.center_band_inner + c.center_band_width, rz, 1.0, &c);
        assert!(inner < mid && mid < outer);
        assert!((mid - 0.5).abs() < 1e-5);
    }

    #[test]
    fn lifecycle_fade_scales_linearly() {
        let c = cfg();
        let full = visibility(3.0, 40.0, 1.0, &c);
        let half = visibility(3.0, 40.0, 0.5, &c);
        assert!((half - full * 0.5).abs() < 1e-6);
    }

    fn single_tree(x: f32, z: f32) -> Forest<()> {
        let mut forest = Forest::new();
        forest.build(
            &ForestConfig::default().layout(1.0, 100.0, 0.5, 100.0),
            &Palette::dusk(),
        );
        let tree = &mut forest.trees_mut()[0];
        tree.x = x;
        tree.z = z;
        tree.fade = 1.0;
        forest
    }

    fn viewport() -> Viewport {
        Viewport::new(1000, 600, 1.0, &cfg())
    }

    #[test]
    fn centered_tree_projects_symmetrically() {
        let c = cfg();
        let vp = viewport();
        let forest = single_tree(0.0, 30.0);
        let tree = &forest.trees()[0];
        let cam = Camera::new().with_fov(vp.fov);

        let s = project(tree, &cam, &vp, &c).unwrap();
        let [tl, tr, br, bl] = s.corners;
        assert!((tl.x + tr.x - 1000.0).abs() < 1e-3);
        assert!((bl.x + br.x - 1000.0).abs() < 1e-3);
        assert_eq!(tl.y, vp.top_clip);
        assert_eq!(bl.y, vp.bottom_clip);
        assert!((br.x - bl.x) > (tr.x - tl.x));
        assert!((tr.x - tl.x) >= vp.min_top_px - 1e-4);
    }

    #[test]
    fn tops_converge_more_than_bottoms() {
        let c = cfg();
        let vp = viewport();
        let forest = single_tree(5.0, 20.0);
        let tree = &forest.trees()[0];
        let cam = Camera::new().with_fov(vp.fov);
        let s = project(tree, &cam, &vp, &c).unwrap();
        let top_offset = (s.corners[0].x + s.corners[1].x) * 0.5 - 500.0;
        let bottom_offset = (s.corners[2].x + s.corners[3].x) * 0.5 - 500.0;
        assert!(top_offset > 0.0 && bottom_offset > top_offset * 10.0);
    }

    #[test]
    fn culls_behind_faded_and_offscreen() {
        let c = cfg();
        let vp = viewport();
        let cam = Camera::new().with_fov(vp.fov);

        let behind = single_tree(0.0, 0.3);
        assert_eq!(project(&behind.trees()[0], &cam, &vp, &c), Err(Culled::Behind));

        let far = single_tree(0.0, c.far + 1.0);
        assert_eq!(project(&far.trees()[0], &cam, &vp, &c), Err(Culled::Faded));

        let mut faded = single_tree(0.0, 30.0);
        faded.trees_mut()[0].fade = 0.0;
        assert_eq!(project(&faded.trees()[0], &cam, &vp, &c), Err(Culled::Faded));

        // Both the converging top and the wide bottom must leave the screen.
        let side = single_tree(600.0, 60.0);
        assert_eq!(project(&side.trees()[0], &cam, &vp, &c), Err(Culled::OffScreen));
        let other_side = single_tree(-600.0, 60.0);
        assert_eq!(project(&other_side.trees()[0], &cam, &vp, &c), Err(Culled::OffScreen));
    }

    #[test]
    fn slanted_tree_crossing_the_screen_is_kept() {
        let c = cfg();
        let vp = viewport();
        let cam = Camera::new().with_fov(vp.fov);
        let forest = single_tree(80.0, 10.0);
        let s = project(&forest.trees()[0], &cam, &vp, &c).unwrap();
        let (left, right) = s.horizontal_extent();
        assert!(left < vp.width as f32 && right > vp.width as f32);
    }

    #[test]
    fn depth_runs_from_far_to_near() {
        let c = cfg();
        assert!(normalized_depth(c.far, &c).abs() < 1e-6);
        assert!((normalized_depth(c.near, &c) - 1.0).abs() < 1e-6);
        assert!((normalized_depth(c.far * 2.0, &c)).abs() < 1e-6);
    }

    #[test]
    fn body_alpha_grows_with_depth_and_caps() {
        let c = cfg();
        let mut s = Silhouette {
            corners: [Vec2::ZERO; 4],
            depth: 0.0,
            alpha: 1.0,
        };
        let far = body_alpha(&s, &c);
        s.depth = 1.0;
        let near = body_alpha(&s, &c);
        assert!(near > far);
        assert!(near <= 1.0);
        s.alpha = 0.5;
        assert!((body_alpha(&s, &c) - near * 0.5).abs() < 1e-6);
    }
}
