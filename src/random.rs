use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;

/// The seeded stream every scatter pass draws from. It is continued across
/// cells and passes, so replaying a world requires generating cells in the
/// same order.
#[derive(Clone, Debug)]
pub struct ScatterRng {
    seed: u64,
    inner: Pcg32,
}

impl ScatterRng {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            inner: Pcg32::seed_from_u64(seed),
        }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Uniform in `[0, 1)`.
    #[inline]
    pub fn next_unit(&mut self) -> f32 {
        self.inner.gen::<f32>()
    }

    pub fn reset(&mut self) {
        self.inner = Pcg32::seed_from_u64(self.seed);
    }
}
