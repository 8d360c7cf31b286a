/// Delta-time bookkeeping for the tick loop.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ClockConfig {
    /// Delta used for the very first tick.
    pub nominal_dt_ms: f32,
    /// Ceiling on any delta, so a suspended host does not teleport the forest.
    pub max_dt_ms: f32,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            nominal_dt_ms: 16.0,
            max_dt_ms: 48.0,
        }
    }
}

/// Turns host timestamps into clamped per-tick deltas.
#[derive(Clone, Debug, Default)]
pub struct FrameClock {
    config: ClockConfig,
    last_ms: Option<f64>,
}

impl FrameClock {
    pub fn new(config: ClockConfig) -> Self {
        Self {
            config,
            last_ms: None,
        }
    }

    /// Delta since the previous call, clamped to `[0, max_dt_ms]`.
    pub fn delta(&mut self, now_ms: f64) -> f32 {
        let dt = match self.last_ms {
            Some(last) => ((now_ms - last) as f32).clamp(0.0, self.config.max_dt_ms),
            None => self.config.nominal_dt_ms,
        };
        self.last_ms = Some(now_ms);
        dt
    }

    pub fn last_ms(&self) -> Option<f64> {
        self.last_ms
    }
}
