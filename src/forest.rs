//! The forest: a fixed pool of trees that stream toward the camera forever.
//!
//! Trees are laid out once on a mirrored column grid and then recycled in
//! place. When a tree has lingered past the near threshold long enough it is
//! pushed back by exactly one row-span and fades in again, so the pool never
//! grows, shrinks, or reallocates after [`Forest::build`].
//!
//! Each tree also owns its color cache: a body color per depth bucket, the
//! stops of its glow gradient, and the gradient object itself once the surface
//! has built one.

use rand::Rng;

use crate::color::{Color, ColorStop};
use crate::palette::Palette;
use crate::rng::{FOREST_SEED, SeededRng};

/// `z` never drops below this, even for pathological configurations.
pub const MIN_DEPTH: f32 = 1e-3;

/// Default number of depth buckets in each tree's body ramp.
pub const DEFAULT_COLOR_BUCKETS: usize = 11;

/// Layout and motion tunables for the forest.
#[derive(Clone, Debug, PartialEq)]
pub struct ForestConfig {
    pub seed: u32,
    /// Distance between neighbouring columns.
    pub column_spacing: f32,
    /// Distance between neighbouring rows within a column.
    pub row_spacing: f32,
    /// No column center lies further than this from `x = 0`.
    pub half_width: f32,
    /// Keep only the first `n` columns of the mirrored order.
    pub max_columns: Option<usize>,
    /// Depth the rows must cover; normally the projection's far plane.
    pub depth_far: f32,
    /// Maximum x jitter as a fraction of `column_spacing`.
    pub x_jitter: f32,
    /// Range of trunk half-widths, world units.
    pub trunk_half_width: (f32, f32),
    /// Range of the lit-glow brightness.
    pub lit: (f32, f32),
    /// Approach speed, world units per millisecond.
    pub speed_base: f32,
    /// Fade change per millisecond.
    pub fade_rate: f32,
    /// Depth below which a tree starts waiting to be recycled.
    pub near_threshold: f32,
    /// Time a tree waits past the threshold before it is recycled.
    pub recycle_delay_ms: f32,
    /// Body colors per tree.
    pub color_buckets: usize,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            seed: FOREST_SEED,
            column_spacing: 5.0,
            row_spacing: 6.0,
            half_width: 90.0,
            max_columns: None,
            depth_far: 120.0,
            x_jitter: 0.45,
            trunk_half_width: (0.22, 0.55),
            lit: (0.35, 0.8),
            speed_base: 0.004,
            fade_rate: 0.0012,
            near_threshold: 2.0,
            recycle_delay_ms: 400.0,
            color_buckets: DEFAULT_COLOR_BUCKETS,
        }
    }
}

impl ForestConfig {
    /// Set the four layout parameters at once.
    pub fn layout(
        mut self,
        column_spacing: f32,
        row_spacing: f32,
        half_width: f32,
        depth_far: f32,
    ) -> Self {
        self.column_spacing = column_spacing;
        self.row_spacing = row_spacing;
        self.half_width = half_width;
        self.depth_far = depth_far;
        self
    }

    pub fn max_columns(mut self, columns: usize) -> Self {
        self.max_columns = Some(columns.max(1));
        self
    }

    pub fn seed(mut self, seed: u32) -> Self {
        self.seed = seed;
        self
    }

    pub fn speed(mut self, speed_base: f32) -> Self {
        self.speed_base = speed_base;
        self
    }

    pub fn recycle(mut self, near_threshold: f32, delay_ms: f32) -> Self {
        self.near_threshold = near_threshold;
        self.recycle_delay_ms = delay_ms;
        self
    }

    pub fn fade_rate(mut self, fade_rate: f32) -> Self {
        self.fade_rate = fade_rate;
        self
    }

    pub fn color_buckets(mut self, buckets: usize) -> Self {
        self.color_buckets = buckets.max(1);
        self
    }

    /// Number of columns the layout produces.
    ///
    /// Walks the mirrored order while `|x| <= half_width`, which always
    /// yields `1 + 2k` columns, then applies `max_columns`.
    pub fn columns(&self) -> usize {
        let mirrored = if self.column_spacing > 0.0 && self.half_width >= 0.0 {
            let mut k = (self.half_width / self.column_spacing).floor() as usize;
            while k > 0 && k as f32 * self.column_spacing > self.half_width {
                k -= 1;
            }
            1 + 2 * k
        } else {
            1
        };
        match self.max_columns {
            Some(cap) => mirrored.min(cap.max(1)),
            None => mirrored,
        }
    }

    /// Number of rows in each column.
    pub fn rows_per_column(&self) -> usize {
        if self.row_spacing <= 0.0 {
            return 1;
        }
        ((self.depth_far / self.row_spacing).ceil() as usize).max(1)
    }
}

/// Center of column `index` in the mirrored order `0, +s, -s, +2s, -2s, …`.
pub fn column_x(index: usize, spacing: f32) -> f32 {
    if index == 0 {
        return 0.0;
    }
    let step = index.div_ceil(2) as f32 * spacing;
    if index % 2 == 1 { step } else { -step }
}

/// One tree in the pool.
#[derive(Clone, Debug)]
pub struct Tree<G> {
    pub x: f32,
    pub z: f32,
    half_width: f32,
    hue_rng: f32,
    lit: f32,
    pub fade: f32,
    wait_ms: f32,
    body: Vec<Color>,
    stops: [ColorStop; 4],
    gradient: Option<G>,
}

impl<G> Tree<G> {
    pub fn half_width(&self) -> f32 {
        self.half_width
    }

    pub fn hue_rng(&self) -> f32 {
        self.hue_rng
    }

    pub fn lit(&self) -> f32 {
        self.lit
    }

    /// Time spent past the near threshold.
    pub fn wait_ms(&self) -> f32 {
        self.wait_ms
    }

    /// Body color per depth bucket, far first.
    pub fn body_colors(&self) -> &[Color] {
        &self.body
    }

    /// Body color for a normalized depth (0 = far plane, 1 = near plane).
    pub fn body_color(&self, depth: f32) -> Color {
        let last = self.body.len().saturating_sub(1);
        let index = (depth.clamp(0.0, 1.0) * last as f32).round() as usize;
        self.body[index.min(last)]
    }

    pub fn gradient_stops(&self) -> &[ColorStop; 4] {
        &self.stops
    }

    pub fn gradient(&self) -> Option<&G> {
        self.gradient.as_ref()
    }

    /// The cached gradient, building it with `build` if it was invalidated.
    pub fn gradient_or_build(&mut self, build: impl FnOnce(&[ColorStop]) -> G) -> &G {
        let stops = &self.stops;
        self.gradient.get_or_insert_with(|| build(stops))
    }

    fn refresh_colors(&mut self, palette: &Palette) {
        palette.fill_body_ramp(self.hue_rng, &mut self.body);
        self.stops = palette.gradient_stops(self.hue_rng);
        self.gradient = None;
    }
}

/// Fixed-size pool of trees.
#[derive(Clone, Debug)]
pub struct Forest<G> {
    trees: Vec<Tree<G>>,
    rows_per_column: usize,
    row_spacing: f32,
}

impl<G> Default for Forest<G> {
    fn default() -> Self {
        Self::new()
    }
}

impl<G> Forest<G> {
    /// An empty pool; call [`build`](Self::build) to plant it.
    pub fn new() -> Self {
        Self {
            trees: Vec::new(),
            rows_per_column: 0,
            row_spacing: 0.0,
        }
    }

    /// Plant the forest described by `config`, colored with `palette`.
    ///
    /// Random draws per tree happen in this order: x jitter, z jitter, trunk
    /// half-width, hue, lit brightness. Reordering them changes every tree.
    pub fn build(&mut self, config: &ForestConfig, palette: &Palette) {
        let columns = config.columns();
        let rows = config.rows_per_column();
        let buckets = config.color_buckets.max(1);
        let mut rng = SeededRng::new(config.seed);

        self.trees.clear();
        self.trees.reserve_exact(columns * rows);
        self.rows_per_column = rows;
        self.row_spacing = config.row_spacing;

        for column in 0..columns {
            let center = column_x(column, config.column_spacing);
            for row in 0..rows {
                let jitter = config.x_jitter * config.column_spacing;
                let x = center + uniform(&mut rng, -jitter, jitter);
                let z = (row as f32 + 1.0 + rng.random_range(0.05f32..0.5)) * config.row_spacing;
                let (lo, hi) = config.trunk_half_width;
                let half_width = uniform(&mut rng, lo, hi);
                let hue_rng = rng.random::<f32>();
                let lit = uniform(&mut rng, config.lit.0, config.lit.1);

                let mut tree = Tree {
                    x,
                    z: z.max(MIN_DEPTH),
                    half_width,
                    hue_rng,
                    lit,
                    fade: 0.0,
                    wait_ms: 0.0,
                    body: vec![Color::TRANSPARENT; buckets],
                    stops: [ColorStop::new(0.0, Color::TRANSPARENT); 4],
                    gradient: None,
                };
                tree.refresh_colors(palette);
                self.trees.push(tree);
            }
        }
    }

    /// Depth added to a recycled tree.
    pub fn row_span(&self) -> f32 {
        self.rows_per_column as f32 * self.row_spacing
    }

    pub fn rows_per_column(&self) -> usize {
        self.rows_per_column
    }

    pub fn len(&self) -> usize {
        self.trees.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trees.is_empty()
    }

    pub fn trees(&self) -> &[Tree<G>] {
        &self.trees
    }

    pub fn trees_mut(&mut self) -> &mut [Tree<G>] {
        &mut self.trees
    }

    /// Move every tree toward the camera by `config.speed_base · dt_ms`, ease
    /// fades, and recycle trees that have waited past the near threshold.
    pub fn advance(&mut self, dt_ms: f32, config: &ForestConfig) {
        let step = config.speed_base * dt_ms;
        let fade_step = config.fade_rate * dt_ms;
        let span = self.row_span();

        for tree in &mut self.trees {
            tree.z = (tree.z - step).max(MIN_DEPTH);

            if tree.z < config.near_threshold {
                tree.wait_ms += dt_ms;
                tree.fade = (tree.fade - fade_step).max(0.0);
                if tree.wait_ms > config.recycle_delay_ms {
                    tree.z += span;
                    tree.fade = 0.0;
                    tree.wait_ms = 0.0;
                }
            } else {
                tree.wait_ms = 0.0;
                tree.fade = (tree.fade + fade_step).min(1.0);
            }
        }
    }

    /// Order trees far to near for painter's-algorithm drawing.
    pub fn depth_sort(&mut self) {
        depth_sort(&mut self.trees, |tree| tree.z);
    }

    /// Recompute every tree's body ramp and gradient stops, dropping cached gradients.
    pub fn refresh_colors(&mut self, palette: &Palette) {
        for tree in &mut self.trees {
            tree.refresh_colors(palette);
        }
    }

    /// Drop cached gradients so they are rebuilt on next draw; colors are kept.
    pub fn invalidate_gradients(&mut self) {
        for tree in &mut self.trees {
            tree.gradient = None;
        }
    }

    /// Rebuild every tree's gradient from its stops. Returns how many were built.
    pub fn rebuild_gradients(&mut self, mut build: impl FnMut(&[ColorStop]) -> G) -> usize {
        for tree in &mut self.trees {
            tree.gradient = Some(build(&tree.stops));
        }
        self.trees.len()
    }

    /// Number of trees currently holding a built gradient.
    pub fn cached_gradients(&self) -> usize {
        self.trees.iter().filter(|t| t.gradient.is_some()).count()
    }
}

/// Draw from `[lo, hi)`, or return `lo` when the range is empty.
///
/// Consumes one draw either way so the per-tree sequence stays aligned.
fn uniform(rng: &mut impl Rng, lo: f32, hi: f32) -> f32 {
    if hi > lo {
        rng.random_range(lo..hi)
    } else {
        let _: u32 = rng.random();
        lo
    }
}

/// Stable in-place insertion sort, descending by `key`.
///
/// Depths move by a small bounded amount per tick, so the slice is almost
/// always nearly sorted and this runs in close to linear time without allocating.
pub fn depth_sort<T>(items: &mut [T], key: impl Fn(&T) -> f32) {
    for i in 1..items.len() {
        let mut j = i;
        while j > 0 && key(&items[j - 1]) < key(&items[j]) {
            items.swap(j - 1, j);
            j -= 1;
        }
    }
}
