use glam::Vec2;

/// The viewer for one frame.
///
/// Only yaw and a lateral offset are modelled; the camera always sits at depth
/// zero and trees move toward it. Recomputed every tick from elapsed time.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Camera {
    /// Lateral offset in world units.
    pub x: f32,
    /// Focal length in device pixels.
    pub fov: f32,
    pub yaw_cos: f32,
    pub yaw_sin: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            x: 0.0,
            fov: 1.0,
            yaw_cos: 1.0,
            yaw_sin: 0.0,
        }
    }
}

impl Camera {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn at(mut self, x: f32) -> Self {
        self.x = x;
        self
    }

    pub fn with_fov(mut self, fov: f32) -> Self {
        self.fov = fov;
        self
    }

    pub fn with_yaw(mut self, yaw: f32) -> Self {
        let (sin, cos) = yaw.sin_cos();
        self.yaw_cos = cos;
        self.yaw_sin = sin;
        self
    }

    /// Rotate a world-space `(x, z)` into camera space `(rx, rz)`.
    pub fn to_view(&self, x: f32, z: f32) -> Vec2 {
        let dx = x - self.x;
        Vec2::new(
            dx * self.yaw_cos - z * self.yaw_sin,
            dx * self.yaw_sin + z * self.yaw_cos,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_yaw_is_a_pure_offset() {
        let cam = Camera::new().at(2.0);
        assert_eq!(cam.to_view(5.0, 10.0), Vec2::new(3.0, 10.0));
    }

    #[test]
    fn rotation_preserves_distance() {
        let cam = Camera::new().with_yaw(0.4);
        let v = cam.to_view(3.0, 4.0);
        assert!((v.length() - 5.0).abs() < 1e-5);
    }
}
