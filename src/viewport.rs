use crate::projection::ProjectionConfig;

/// Size-dependent state, rebuilt on every resize.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewport {
    /// Width in device pixels.
    pub width: u32,
    /// Height in device pixels.
    pub height: u32,
    /// Device pixels per logical pixel.
    pub pixel_scale: f32,
    /// Y of the narrow top edge of every trunk.
    pub top_clip: f32,
    /// Y of the wide bottom edge of every trunk.
    pub bottom_clip: f32,
    /// Focal length in device pixels.
    pub fov: f32,
    /// Minimum trunk top width in device pixels.
    pub min_top_px: f32,
}

impl Viewport {
    pub fn new(width: u32, height: u32, pixel_scale: f32, config: &ProjectionConfig) -> Self {
        let h = height as f32;
        let pixel_scale = if pixel_scale.is_finite() && pixel_scale > 0.0 {
            pixel_scale
        } else {
            1.0
        };
        Self {
            width,
            height,
            pixel_scale,
            top_clip: h * config.top_clip,
            bottom_clip: h * config.bottom_clip,
            fov: h * config.fov_scale,
            min_top_px: config.min_top_px * pixel_scale,
        }
    }

    /// An empty viewport; nothing is drawn until a real size arrives.
    pub fn empty() -> Self {
        Self::new(0, 0, 1.0, &ProjectionConfig::default())
    }

    /// False for zero-sized viewports.
    pub fn is_drawable(&self) -> bool {
        self.width > 0 && self.height > 0
    }

    pub fn center_x(&self) -> f32 {
        self.width as f32 * 0.5
    }

    /// `(top_clip, bottom_clip)`. Tree gradients depend on these and nothing else.
    pub fn clip_lines(&self) -> (f32, f32) {
        (self.top_clip, self.bottom_clip)
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::empty()
    }
}

/// Whole-scene gradients, rebuilt on resize and on theme steps.
#[derive(Debug)]
pub struct SceneGradients<G> {
    pub sky: Option<G>,
    pub fog: Option<G>,
}

impl<G> Default for SceneGradients<G> {
    fn default() -> Self {
        Self {
            sky: None,
            fog: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clip_lines_follow_height_only() {
        let config = ProjectionConfig::default();
        let a = Viewport::new(800, 600, 1.0, &config);
        let b = Viewport::new(1400, 600, 1.0, &config);
        let c = Viewport::new(800, 700, 1.0, &config);
        assert_eq!(a.clip_lines(), b.clip_lines());
        assert_ne!(a.clip_lines(), c.clip_lines());
    }

    #[test]
    fn zero_size_is_not_drawable() {
        let config = ProjectionConfig::default();
        assert!(!Viewport::new(0, 600, 1.0, &config).is_drawable());
        assert!(!Viewport::new(800, 0, 1.0, &config).is_drawable());
        assert!(Viewport::new(800, 600, 2.0, &config).is_drawable());
    }

    #[test]
    fn bad_pixel_scale_falls_back_to_one() {
        let v = Viewport::new(10, 10, f32::NAN, &ProjectionConfig::default());
        assert_eq!(v.pixel_scale, 1.0);
    }
}
