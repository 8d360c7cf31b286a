//! The camera's scripted flight: waypoint yaw plus layered lateral drift.
//!
//! Everything here is a pure function of elapsed time. A dropped frame or a
//! slow machine changes how often the path is sampled, never where it goes.

use std::f64::consts::TAU;

use crate::camera::Camera;
use crate::theme::Easing;

/// Tunables for [`CameraPath`].
#[derive(Clone, Debug, PartialEq)]
pub struct CameraPathConfig {
    /// Yaw waypoints in radians. The loop closes from the last back to the first.
    pub waypoints: Vec<f32>,
    /// Time for one full loop over every waypoint.
    pub loop_ms: f64,
    /// Amplitude of the primary drift wave, world units.
    pub drift_amplitude: f32,
    /// Angular frequency of the primary drift wave, radians per millisecond.
    pub drift_omega: f64,
    /// Phase offsets of the three drift waves.
    pub drift_phases: [f64; 3],
}

impl Default for CameraPathConfig {
    fn default() -> Self {
        Self {
            waypoints: vec![0.0, 0.16, -0.08, 0.22, -0.18, 0.05],
            loop_ms: 96_000.0,
            drift_amplitude: 4.5,
            drift_omega: TAU / 30_000.0,
            drift_phases: [0.0, 1.3, 2.1],
        }
    }
}

impl CameraPathConfig {
    pub fn waypoints(mut self, waypoints: impl Into<Vec<f32>>) -> Self {
        self.waypoints = waypoints.into();
        self
    }

    pub fn loop_ms(mut self, loop_ms: f64) -> Self {
        self.loop_ms = loop_ms;
        self
    }

    pub fn drift(mut self, amplitude: f32, omega: f64) -> Self {
        self.drift_amplitude = amplitude;
        self.drift_omega = omega;
        self
    }
}

/// Samples yaw and drift for any elapsed time.
#[derive(Clone, Debug)]
pub struct CameraPath {
    config: CameraPathConfig,
}

impl CameraPath {
    pub fn new(config: CameraPathConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CameraPathConfig {
        &self.config
    }

    /// Length of one waypoint-to-waypoint segment.
    pub fn segment_ms(&self) -> f64 {
        let count = self.config.waypoints.len().max(1);
        self.config.loop_ms / count as f64
    }

    /// Yaw in radians at `elapsed_ms`.
    pub fn yaw_at(&self, elapsed_ms: f64) -> f32 {
        let points = &self.config.waypoints;
        let count = points.len();
        if count == 0 {
            return 0.0;
        }
        let segment_ms = self.segment_ms();
        if count == 1 || segment_ms <= 0.0 {
            return points[0];
        }

        let position = elapsed_ms.max(0.0) / segment_ms;
        let index = (position.floor() as u64 % count as u64) as usize;
        let fraction = position.fract() as f32;

        let from = points[index];
        let to = points[(index + 1) % count];
        let t = Easing::Sine.apply(fraction);
        from + (to - from) * t
    }

    /// Lateral drift in world units at `elapsed_ms`.
    pub fn drift_at(&self, elapsed_ms: f64) -> f32 {
        let c = &self.config;
        let a = c.drift_amplitude as f64;
        let w = c.drift_omega * elapsed_ms;
        let [p1, p2, p3] = c.drift_phases;
        let x = a * (w + p1).sin()
            + 0.38 * a * (2.6 * w + p2).sin()
            + 0.2 * a * (0.7 * w + p3).sin();
        x as f32
    }

    /// Camera for `elapsed_ms` with the given focal length.
    pub fn camera_at(&self, elapsed_ms: f64, fov: f32) -> Camera {
        Camera::new()
            .at(self.drift_at(elapsed_ms))
            .with_fov(fov)
            .with_yaw(self.yaw_at(elapsed_ms))
    }
}

impl Default for CameraPath {
    fn default() -> Self {
        Self::new(CameraPathConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path() -> CameraPath {
        CameraPath::new(
            CameraPathConfig::default()
                .waypoints(vec![0.0, 1.0, -1.0])
                .loop_ms(3000.0),
        )
    }

    #[test]
    fn hits_waypoints_at_segment_starts() {
        let p = path();
        assert_eq!(p.yaw_at(0.0), 0.0);
        assert!((p.yaw_at(1000.0) - 1.0).abs() < 1e-6);
        assert!((p.yaw_at(2000.0) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn loop_closes_back_to_first_waypoint() {
        let p = path();
        assert!(p.yaw_at(2999.0).abs() < 1e-3);
        assert!((p.yaw_at(3000.0) - p.yaw_at(0.0)).abs() < 1e-6);
        assert!((p.yaw_at(7500.0) - p.yaw_at(1500.0)).abs() < 1e-6);
    }

    #[test]
    fn eases_with_half_cosine() {
        let p = path();
        assert!((p.yaw_at(500.0) - 0.5).abs() < 1e-5);
        assert!((p.yaw_at(250.0) - Easing::Sine.apply(0.25)).abs() < 1e-5);
    }

    #[test]
    fn drift_is_a_pure_function_of_time() {
        let p = CameraPath::default();
        let a = p.drift_at(12_345.0);
        let b = p.drift_at(12_345.0);
        assert_eq!(a, b);
        let bound = p.config().drift_amplitude * 1.58;
        for i in 0..200 {
            assert!(p.drift_at(i as f64 * 977.0).abs() <= bound + 1e-4);
        }
    }

    #[test]
    fn no_waypoints_means_no_yaw() {
        let p = CameraPath::new(CameraPathConfig::default().waypoints(Vec::new()));
        assert_eq!(p.yaw_at(5000.0), 0.0);
    }

    #[test]
    fn camera_carries_yaw_and_drift() {
        let p = path();
        let cam = p.camera_at(1000.0, 800.0);
        assert_eq!(cam.fov, 800.0);
        assert!((cam.yaw_sin - 1.0f32.sin()).abs() < 1e-5);
        assert_eq!(cam.x, p.drift_at(1000.0));
    }
}
