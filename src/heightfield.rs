use crate::config::TerrainParams;
use noise::{NoiseFn, Perlin};

/// Moves the interesting part of the noise away from the world origin.
const ORIGIN_OFFSET_X: f64 = 6000.0;
const ORIGIN_OFFSET_Y: f64 = 3500.0;
/// Every layer samples the same slice of 3D noise.
const NOISE_SLICE: f64 = 2.7;

/// Deterministic elevation of the landscape; `elevation < 0` is under water.
#[derive(Clone)]
pub struct HeightField {
    params: TerrainParams,
    perlin: Perlin,
}

impl HeightField {
    pub fn new(params: TerrainParams) -> Self {
        let perlin = Perlin::new(params.seed);
        Self { params, perlin }
    }

    pub fn params(&self) -> &TerrainParams {
        &self.params
    }

    #[inline]
    fn layer(&self, x: f64, y: f64, period: f64) -> f64 {
        self.perlin.get([x * period, y * period, NOISE_SLICE])
    }

    /// Fine and coarse layers are combined multiplicatively, the very coarse
    /// one additively, then the sea level is subtracted.
    pub fn elevation(&self, x: f32, y: f32) -> f32 {
        let p = &self.params;
        let x = x as f64 - ORIGIN_OFFSET_X;
        let y = y as f64 - ORIGIN_OFFSET_Y;

        let fine = 1.0 + self.layer(x, y, p.period_a);
        let coarse = 1.0 + self.layer(x, y, p.period_b);
        let mega = self.layer(x, y, p.period_c);

        (coarse * fine * p.multiplier_1 + coarse * p.multiplier_2 + mega * p.multiplier_3
            - p.water_level) as f32
    }

    pub fn is_submerged(&self, x: f32, y: f32) -> bool {
        self.elevation(x, y) < 0.0
    }
}

impl Default for HeightField {
    fn default() -> Self {
        Self::new(TerrainParams::default())
    }
}
