//! Easing curves and the timed cross-fade between two palettes.

use crate::palette::Palette;

/// Easing functions for smooth transitions.
///
/// These control the acceleration curve of an animation.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum Easing {
    /// Constant speed throughout.
    Linear,
    /// Cubic smoothstep, `t²(3 − 2t)`.
    #[default]
    SmoothStep,
    /// Half a cosine wave, `0.5 − 0.5·cos(πt)`.
    Sine,
}

impl Easing {
    /// Apply the easing function to a linear progress value (0.0 to 1.0).
    pub fn apply(&self, t: f32) -> f32 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Easing::Linear => t,
            Easing::SmoothStep => t * t * (3.0 - 2.0 * t),
            Easing::Sine => 0.5 - 0.5 * (t * std::f32::consts::PI).cos(),
        }
    }
}

/// Default cross-fade length.
pub const DEFAULT_THEME_DURATION_MS: f32 = 1600.0;

/// Cross-fade from one palette to another over a fixed duration.
///
/// ```
/// use canopy::{Palette, ThemeTransition};
///
/// let mut fade = ThemeTransition::new(1000.0);
/// fade.begin(Palette::dusk(), Palette::dawn(), 0.0);
///
/// let halfway = fade.step(500.0).unwrap();
/// assert!(fade.is_active());
///
/// let done = fade.step(1000.0).unwrap();
/// assert_eq!(done, Palette::dawn());
/// assert!(!fade.is_active());
/// # let _ = halfway;
/// ```
#[derive(Clone, Debug)]
pub struct ThemeTransition {
    from: Palette,
    to: Palette,
    start_ms: f64,
    duration_ms: f32,
    easing: Easing,
    active: bool,
}

impl ThemeTransition {
    pub fn new(duration_ms: f32) -> Self {
        Self {
            from: Palette::default(),
            to: Palette::default(),
            start_ms: 0.0,
            duration_ms: duration_ms.max(0.0),
            easing: Easing::SmoothStep,
            active: false,
        }
    }

    /// Override the easing curve (smoothstep by default).
    pub fn easing(mut self, easing: Easing) -> Self {
        self.easing = easing;
        self
    }

    /// Start fading from `current` to `target`, replacing any fade in progress.
    pub fn begin(&mut self, current: Palette, target: Palette, now_ms: f64) {
        self.from = current;
        self.to = target;
        self.start_ms = now_ms;
        self.active = true;
    }

    /// Move the start of the running fade to `now_ms`.
    pub fn restart_at(&mut self, now_ms: f64) {
        self.start_ms = now_ms;
    }

    /// Palette for time `now_ms`, or `None` when no fade is running.
    ///
    /// The step that reaches the target returns it exactly and deactivates the fade.
    pub fn step(&mut self, now_ms: f64) -> Option<Palette> {
        if !self.active {
            return None;
        }

        let t = self.progress(now_ms);
        let eased = self.easing.apply(t);
        if eased >= 1.0 {
            self.active = false;
            return Some(self.to.clone());
        }
        Some(Palette::lerp(&self.from, &self.to, eased))
    }

    /// Linear progress in `[0, 1]` at `now_ms`.
    pub fn progress(&self, now_ms: f64) -> f32 {
        if self.duration_ms <= 0.0 {
            return 1.0;
        }
        (((now_ms - self.start_ms) / self.duration_ms as f64) as f32).clamp(0.0, 1.0)
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Palette the running fade is heading to. Meaningful only while active.
    pub fn target(&self) -> &Palette {
        &self.to
    }

    pub fn duration_ms(&self) -> f32 {
        self.duration_ms
    }
}

impl Default for ThemeTransition {
    fn default() -> Self {
        Self::new(DEFAULT_THEME_DURATION_MS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn between(a: f32, b: f32, v: f32) -> bool {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        v >= lo - 1e-5 && v <= hi + 1e-5
    }

    #[test]
    fn easing_endpoints() {
        for easing in [Easing::Linear, Easing::SmoothStep, Easing::Sine] {
            assert!(easing.apply(0.0).abs() < 1e-6);
            assert!((easing.apply(1.0) - 1.0).abs() < 1e-6);
            assert!((easing.apply(0.5) - 0.5).abs() < 1e-6);
        }
    }

    #[test]
    fn smoothstep_is_not_linear_off_center() {
        let e = Easing::SmoothStep.apply(0.25);
        assert!((e - 0.15625).abs() < 1e-6);
    }

    #[test]
    fn idle_transition_yields_nothing() {
        let mut fade = ThemeTransition::new(1000.0);
        assert!(fade.step(10.0).is_none());
    }

    #[test]
    fn start_equals_from_and_end_equals_to() {
        let mut fade = ThemeTransition::new(1000.0);
        fade.begin(Palette::dusk(), Palette::dawn(), 200.0);
        assert_eq!(fade.step(200.0).unwrap(), Palette::dusk());
        assert_eq!(fade.step(1200.0).unwrap(), Palette::dawn());
        assert!(!fade.is_active());
        assert!(fade.step(1300.0).is_none());
    }

    #[test]
    fn intermediate_channels_stay_between_endpoints() {
        let (a, b) = (Palette::dusk(), Palette::dawn());
        let mut fade = ThemeTransition::new(1000.0);
        fade.begin(a.clone(), b.clone(), 0.0);

        for step in 1..10 {
            let p = fade.step(step as f64 * 100.0).unwrap();
            for i in 0..a.sky.len() {
                assert!(between(a.sky[i].r, b.sky[i].r, p.sky[i].r));
                assert!(between(a.sky[i].g, b.sky[i].g, p.sky[i].g));
                assert!(between(a.sky[i].b, b.sky[i].b, p.sky[i].b));
            }
            for i in 0..a.fog.len() {
                assert!(between(a.fog[i].a, b.fog[i].a, p.fog[i].a));
                assert!(between(a.fog[i].r, b.fog[i].r, p.fog[i].r));
            }
            assert!(between(a.tree_hue_min, b.tree_hue_min, p.tree_hue_min));
            assert!(between(a.tree_light_max, b.tree_light_max, p.tree_light_max));
        }
    }

    #[test]
    fn zero_duration_jumps_to_target() {
        let mut fade = ThemeTransition::new(0.0);
        fade.begin(Palette::dusk(), Palette::dawn(), 5.0);
        assert_eq!(fade.step(5.0).unwrap(), Palette::dawn());
        assert!(!fade.is_active());
    }
}
