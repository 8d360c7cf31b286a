//! Color themes for the sky, the fog and the trees.
//!
//! A [`Palette`] is the complete set of colors a frame is painted with. Hosts
//! never hand the engine a `Palette` directly; they send a [`PaletteInput`],
//! a partial and possibly malformed description that is merged field by field
//! over the last palette that was known to be good.
//!
//! # JSON shape
//!
//! ```json
//! {
//!   "sky": [[18, 20, 44], [34, 32, 74], [72, 52, 104], [148, 82, 116], [222, 128, 104], [246, 186, 132]],
//!   "fog": [[40, 36, 70, 0.0], [240, 170, 130, 0.18], [150, 96, 120, 0.28], [22, 20, 40, 0.6]],
//!   "treeHueMin": 250, "treeHueMax": 330,
//!   "treeSat": 28,
//!   "treeLightMin": 10, "treeLightMax": 46
//! }
//! ```
//!
//! Color channels are 0–255, alpha 0–1, hues in degrees, saturation and
//! lightness in percent.

use std::path::Path;

use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};
use tracing::warn;

use crate::color::{Color, ColorStop};
use crate::error::ThemeError;

pub const SKY_STOPS: usize = 6;
pub const FOG_STOPS: usize = 4;

/// Full theme used to paint a frame.
#[derive(Clone, Debug, PartialEq)]
pub struct Palette {
    /// Sky gradient, top of the screen first.
    pub sky: [Color; SKY_STOPS],
    /// Fog overlay gradient, top first. Alpha matters here.
    pub fog: [Color; FOG_STOPS],
    pub tree_hue_min: f32,
    pub tree_hue_max: f32,
    pub tree_sat: f32,
    pub tree_light_min: f32,
    pub tree_light_max: f32,
}

impl Default for Palette {
    fn default() -> Self {
        Self::dusk()
    }
}

impl Palette {
    /// Violet dusk with warm haze on the horizon.
    pub fn dusk() -> Self {
        Self {
            sky: [
                Color::rgb8(18.0, 20.0, 44.0),
                Color::rgb8(34.0, 32.0, 74.0),
                Color::rgb8(72.0, 52.0, 104.0),
                Color::rgb8(148.0, 82.0, 116.0),
                Color::rgb8(222.0, 128.0, 104.0),
                Color::rgb8(246.0, 186.0, 132.0),
            ],
            fog: [
                Color::rgba8(40.0, 36.0, 70.0, 0.0),
                Color::rgba8(240.0, 170.0, 130.0, 0.18),
                Color::rgba8(150.0, 96.0, 120.0, 0.28),
                Color::rgba8(22.0, 20.0, 40.0, 0.6),
            ],
            tree_hue_min: 250.0,
            tree_hue_max: 330.0,
            tree_sat: 28.0,
            tree_light_min: 10.0,
            tree_light_max: 46.0,
        }
    }

    /// Pale morning with cool green-blue trunks.
    pub fn dawn() -> Self {
        Self {
            sky: [
                Color::rgb8(120.0, 160.0, 210.0),
                Color::rgb8(160.0, 190.0, 225.0),
                Color::rgb8(205.0, 210.0, 225.0),
                Color::rgb8(240.0, 215.0, 200.0),
                Color::rgb8(252.0, 200.0, 170.0),
                Color::rgb8(255.0, 226.0, 196.0),
            ],
            fog: [
                Color::rgba8(255.0, 255.0, 255.0, 0.0),
                Color::rgba8(255.0, 236.0, 214.0, 0.2),
                Color::rgba8(220.0, 200.0, 200.0, 0.3),
                Color::rgba8(90.0, 100.0, 120.0, 0.45),
            ],
            tree_hue_min: 160.0,
            tree_hue_max: 220.0,
            tree_sat: 22.0,
            tree_light_min: 24.0,
            tree_light_max: 70.0,
        }
    }

    /// Interpolate every color channel and every scalar bound.
    pub fn lerp(from: &Palette, to: &Palette, t: f32) -> Palette {
        let scalar = |a: f32, b: f32| a * (1.0 - t) + b * t;
        Palette {
            sky: std::array::from_fn(|i| from.sky[i].lerp(to.sky[i], t)),
            fog: std::array::from_fn(|i| from.fog[i].lerp(to.fog[i], t)),
            tree_hue_min: scalar(from.tree_hue_min, to.tree_hue_min),
            tree_hue_max: scalar(from.tree_hue_max, to.tree_hue_max),
            tree_sat: scalar(from.tree_sat, to.tree_sat),
            tree_light_min: scalar(from.tree_light_min, to.tree_light_min),
            tree_light_max: scalar(from.tree_light_max, to.tree_light_max),
        }
    }

    /// Merge `input` over this palette. Absent or rejected fields keep their current value.
    pub fn apply(&self, input: &PaletteInput) -> Palette {
        let mut out = self.clone();
        for (slot, color) in out.sky.iter_mut().zip(&input.sky) {
            if let Some(color) = color {
                *slot = *color;
            }
        }
        for (slot, color) in out.fog.iter_mut().zip(&input.fog) {
            if let Some(color) = color {
                *slot = *color;
            }
        }
        let scalars = [
            (&mut out.tree_hue_min, input.tree_hue_min),
            (&mut out.tree_hue_max, input.tree_hue_max),
            (&mut out.tree_sat, input.tree_sat),
            (&mut out.tree_light_min, input.tree_light_min),
            (&mut out.tree_light_max, input.tree_light_max),
        ];
        for (slot, value) in scalars {
            if let Some(value) = value {
                *slot = value;
            }
        }
        out
    }

    /// Hue of a tree whose random hue draw is `hue_rng`.
    pub fn tree_hue(&self, hue_rng: f32) -> f32 {
        self.tree_hue_min * (1.0 - hue_rng) + self.tree_hue_max * hue_rng
    }

    /// Fill `out` with one body color per depth bucket.
    ///
    /// Bucket 0 is the far plane (lightest), the last bucket is right in front of
    /// the camera (darkest).
    pub fn fill_body_ramp(&self, hue_rng: f32, out: &mut [Color]) {
        let hue = self.tree_hue(hue_rng);
        let steps = out.len().saturating_sub(1).max(1) as f32;
        for (i, slot) in out.iter_mut().enumerate() {
            let t = i as f32 / steps;
            let light = self.tree_light_max * (1.0 - t) + self.tree_light_min * t;
            *slot = Color::hsla(hue, self.tree_sat, light, 1.0);
        }
    }

    /// Top-to-bottom glow laid over a trunk: bright and warm at the top, fading
    /// to transparent dark at the bottom. Each stop nudges the hue a little.
    pub fn gradient_stops(&self, hue_rng: f32) -> [ColorStop; 4] {
        let hue = self.tree_hue(hue_rng);
        let sat = self.tree_sat;
        let (lo, hi) = (self.tree_light_min, self.tree_light_max);
        let mid = (lo + hi) * 0.5;
        [
            ColorStop::new(0.0, Color::hsla(hue - 18.0, sat * 1.25, hi + 18.0, 0.85)),
            ColorStop::new(0.35, Color::hsla(hue - 8.0, sat, hi + 6.0, 0.5)),
            ColorStop::new(0.7, Color::hsla(hue + 4.0, sat * 0.85, mid, 0.18)),
            ColorStop::new(1.0, Color::hsla(hue + 12.0, sat * 0.7, lo * 0.5, 0.0)),
        ]
    }

    /// Sky stops spread evenly from top to bottom.
    pub fn sky_stops(&self) -> [ColorStop; SKY_STOPS] {
        std::array::from_fn(|i| ColorStop::new(i as f32 / (SKY_STOPS - 1) as f32, self.sky[i]))
    }

    /// Fog stops spread evenly from top to bottom.
    pub fn fog_stops(&self) -> [ColorStop; FOG_STOPS] {
        std::array::from_fn(|i| ColorStop::new(i as f32 / (FOG_STOPS - 1) as f32, self.fog[i]))
    }
}

// ============================================================================
// Partial input
// ============================================================================

/// A theme update as supplied by a host.
///
/// Every field is optional. Color lists are positional: `sky[2] = None` keeps
/// the current third sky color. Invalid values are dropped while parsing and
/// listed in [`rejected`](Self::rejected).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PaletteInput {
    pub sky: [Option<Color>; SKY_STOPS],
    pub fog: [Option<Color>; FOG_STOPS],
    pub tree_hue_min: Option<f32>,
    pub tree_hue_max: Option<f32>,
    pub tree_sat: Option<f32>,
    pub tree_light_min: Option<f32>,
    pub tree_light_max: Option<f32>,
    rejected: Vec<String>,
}

impl From<&Palette> for PaletteInput {
    fn from(palette: &Palette) -> Self {
        Self {
            sky: palette.sky.map(Some),
            fog: palette.fog.map(Some),
            tree_hue_min: Some(palette.tree_hue_min),
            tree_hue_max: Some(palette.tree_hue_max),
            tree_sat: Some(palette.tree_sat),
            tree_light_min: Some(palette.tree_light_min),
            tree_light_max: Some(palette.tree_light_max),
            rejected: Vec::new(),
        }
    }
}

impl PaletteInput {
    /// Parse theme JSON. Only a syntax error or a non-object document fails;
    /// bad fields are skipped.
    pub fn from_json(text: &str) -> Result<Self, ThemeError> {
        let value: Value = serde_json::from_str(text)?;
        Self::from_value(&value)
    }

    /// Read and parse a theme file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ThemeError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ThemeError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }

    pub fn from_value(value: &Value) -> Result<Self, ThemeError> {
        let Value::Object(map) = value else {
            return Err(ThemeError::NotAnObject);
        };

        let mut input = PaletteInput::default();
        input.read_colors(map, "sky", false);
        input.read_colors(map, "fog", true);
        input.tree_hue_min = input.read_scalar(map, "treeHueMin", f32::MIN, f32::MAX);
        input.tree_hue_max = input.read_scalar(map, "treeHueMax", f32::MIN, f32::MAX);
        input.tree_sat = input.read_scalar(map, "treeSat", 0.0, 100.0);
        input.tree_light_min = input.read_scalar(map, "treeLightMin", 0.0, 100.0);
        input.tree_light_max = input.read_scalar(map, "treeLightMax", 0.0, 100.0);

        for field in &input.rejected {
            warn!(field = %field, "ignoring invalid theme field, keeping previous value");
        }
        Ok(input)
    }

    /// Field names (with slot index for colors) dropped while parsing.
    pub fn rejected(&self) -> &[String] {
        &self.rejected
    }

    /// True when the input would change nothing.
    pub fn is_empty(&self) -> bool {
        self.sky.iter().all(Option::is_none)
            && self.fog.iter().all(Option::is_none)
            && self.tree_hue_min.is_none()
            && self.tree_hue_max.is_none()
            && self.tree_sat.is_none()
            && self.tree_light_min.is_none()
            && self.tree_light_max.is_none()
    }

    fn read_colors(&mut self, map: &Map<String, Value>, key: &str, with_alpha: bool) {
        let Some(value) = map.get(key) else {
            return;
        };
        let Some(entries) = value.as_array() else {
            self.rejected.push(key.to_string());
            return;
        };
        let slots = if with_alpha { FOG_STOPS } else { SKY_STOPS };
        if entries.len() > slots {
            self.rejected.push(format!("{key}[{slots}..]"));
        }

        for (i, entry) in entries.iter().take(slots).enumerate() {
            if entry.is_null() {
                continue;
            }
            let color = if with_alpha {
                parse_rgba(entry)
            } else {
                parse_rgb(entry)
            };
            match color {
                Some(color) if with_alpha => self.fog[i] = Some(color),
                Some(color) => self.sky[i] = Some(color),
                None => self.rejected.push(format!("{key}[{i}]")),
            }
        }
    }

    fn read_scalar(
        &mut self,
        map: &Map<String, Value>,
        key: &str,
        min: f32,
        max: f32,
    ) -> Option<f32> {
        let value = map.get(key)?;
        match value.as_f64().map(|v| v as f32) {
            Some(v) if v.is_finite() && (min..=max).contains(&v) => Some(v),
            _ => {
                self.rejected.push(key.to_string());
                None
            }
        }
    }
}

impl<'de> Deserialize<'de> for PaletteInput {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::from_value(&value).map_err(serde::de::Error::custom)
    }
}

fn channels<const N: usize>(value: &Value) -> Option<[f32; N]> {
    let entries = value.as_array()?;
    if entries.len() != N {
        return None;
    }
    let mut out = [0.0; N];
    for (slot, entry) in out.iter_mut().zip(entries) {
        let v = entry.as_f64()? as f32;
        if !v.is_finite() {
            return None;
        }
        *slot = v;
    }
    Some(out)
}

fn valid_channel(v: f32) -> bool {
    (0.0..=255.0).contains(&v)
}

fn parse_rgb(value: &Value) -> Option<Color> {
    let [r, g, b] = channels::<3>(value)?;
    [r, g, b]
        .into_iter()
        .all(valid_channel)
        .then(|| Color::rgb8(r, g, b))
}

fn parse_rgba(value: &Value) -> Option<Color> {
    let [r, g, b, a] = channels::<4>(value)?;
    ([r, g, b].into_iter().all(valid_channel) && (0.0..=1.0).contains(&a))
        .then(|| Color::rgba8(r, g, b, a))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_json_round_trips_to_palette() {
        let json = r#"{
            "sky": [[0,0,0],[10,10,10],[20,20,20],[30,30,30],[40,40,40],[255,255,255]],
            "fog": [[1,2,3,0.0],[4,5,6,0.25],[7,8,9,0.5],[10,11,12,1.0]],
            "treeHueMin": 10, "treeHueMax": 20, "treeSat": 30,
            "treeLightMin": 5, "treeLightMax": 60
        }"#;
        let input = PaletteInput::from_json(json).unwrap();
        assert!(input.rejected().is_empty());

        let palette = Palette::dusk().apply(&input);
        assert_eq!(palette.sky[5], Color::WHITE);
        assert_eq!(palette.fog[1], Color::rgba8(4.0, 5.0, 6.0, 0.25));
        assert_eq!(palette.tree_hue_min, 10.0);
        assert_eq!(palette.tree_light_max, 60.0);
    }

    #[test]
    fn bad_fields_keep_last_known_good() {
        let json = r#"{
            "sky": [[1,2,3], "teal", null, [300, 0, 0]],
            "fog": [[0,0,0,2.0]],
            "treeSat": "lots",
            "treeLightMin": 150,
            "treeHueMax": 45
        }"#;
        let input = PaletteInput::from_json(json).unwrap();
        let base = Palette::dawn();
        let merged = base.apply(&input);

        assert_eq!(merged.sky[0], Color::rgb8(1.0, 2.0, 3.0));
        assert_eq!(merged.sky[1], base.sky[1]);
        assert_eq!(merged.sky[2], base.sky[2]);
        assert_eq!(merged.sky[3], base.sky[3]);
        assert_eq!(merged.fog, base.fog);
        assert_eq!(merged.tree_sat, base.tree_sat);
        assert_eq!(merged.tree_light_min, base.tree_light_min);
        assert_eq!(merged.tree_hue_max, 45.0);

        let rejected = input.rejected();
        assert!(rejected.contains(&"sky[1]".to_string()));
        assert!(rejected.contains(&"sky[3]".to_string()));
        assert!(rejected.contains(&"fog[0]".to_string()));
        assert!(rejected.contains(&"treeSat".to_string()));
        assert!(rejected.contains(&"treeLightMin".to_string()));
    }

    #[test]
    fn malformed_documents_are_errors() {
        assert!(matches!(
            PaletteInput::from_json("{ not json"),
            Err(ThemeError::Json(_))
        ));
        assert!(matches!(
            PaletteInput::from_json("[1, 2, 3]"),
            Err(ThemeError::NotAnObject)
        ));
    }

    #[test]
    fn empty_object_changes_nothing() {
        let input = PaletteInput::from_json("{}").unwrap();
        assert!(input.is_empty());
        assert_eq!(Palette::dusk().apply(&input), Palette::dusk());
    }

    #[test]
    fn palette_converts_to_complete_input() {
        let input = PaletteInput::from(&Palette::dawn());
        assert_eq!(Palette::dusk().apply(&input), Palette::dawn());
    }

    #[test]
    fn deserializes_through_serde() {
        let input: PaletteInput = serde_json::from_str(r#"{"treeSat": 12}"#).unwrap();
        assert_eq!(input.tree_sat, Some(12.0));
    }

    #[test]
    fn body_ramp_darkens_toward_the_camera() {
        let palette = Palette::dusk();
        let mut ramp = [Color::BLACK; 11];
        palette.fill_body_ramp(0.5, &mut ramp);
        let luma = |c: Color| c.r + c.g + c.b;
        for pair in ramp.windows(2) {
            assert!(luma(pair[0]) > luma(pair[1]));
        }
    }

    #[test]
    fn gradient_fades_out_at_the_bottom() {
        let stops = Palette::dusk().gradient_stops(0.3);
        assert_eq!(stops[0].offset, 0.0);
        assert_eq!(stops[3].offset, 1.0);
        assert_eq!(stops[3].color.a, 0.0);
        assert!(stops.windows(2).all(|w| w[0].color.a > w[1].color.a));
    }

    #[test]
    fn lerp_endpoints_are_exact() {
        let (a, b) = (Palette::dusk(), Palette::dawn());
        assert_eq!(Palette::lerp(&a, &b, 0.0), a);
        assert_eq!(Palette::lerp(&a, &b, 1.0), b);
    }
}
