use serde::{Deserialize, Serialize};

/// Exponential price curve: `floor(base * (growth_num / growth_den)^owned)`.
///
/// Evaluated in exact integer arithmetic while the intermediate product fits
/// in a `u128`; beyond that a float estimate is used. Results saturate at
/// `u64::MAX`.
///
/// Example:
/// let bot = CostCurve::new(10, 3, 2); // x1.5
/// assert_eq!(bot.cost(3), 33);
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostCurve {
    /// Cost of the first unit.
    pub base: u64,
    /// Growth factor numerator.
    pub growth_num: u64,
    /// Growth factor denominator (> 0).
    pub growth_den: u64,
}

impl CostCurve {
    /// Bot purchase: 10, x1.5 per owned bot.
    pub const BOT: CostCurve = CostCurve::new(10, 3, 2);
    /// Click multiplier level: 100, x2 per level.
    pub const MULTIPLIER: CostCurve = CostCurve::new(100, 2, 1);
    /// Bot efficiency level: 250, x3 per level.
    pub const BOT_LEVEL: CostCurve = CostCurve::new(250, 3, 1);

    /// Build a curve from base cost and growth ratio.
    pub const fn new(base: u64, growth_num: u64, growth_den: u64) -> Self {
        Self {
            base,
            growth_num,
            growth_den,
        }
    }

    /// Cost of the next unit when `owned` units are already held.
    pub fn cost(&self, owned: u32) -> u64 {
        match self.exact(owned) {
            Some(c) => c,
            None => self.approx(owned),
        }
    }

    fn exact(&self, owned: u32) -> Option<u64> {
        if self.growth_den == 0 {
            return None;
        }
        let mut num = u128::from(self.base);
        let mut den: u128 = 1;
        for _ in 0..owned {
            num = num.checked_mul(u128::from(self.growth_num))?;
            den = den.checked_mul(u128::from(self.growth_den))?;
        }
        let q = num / den;
        Some(u64::try_from(q).unwrap_or(u64::MAX))
    }

    fn approx(&self, owned: u32) -> u64 {
        if self.growth_den == 0 {
            return u64::MAX;
        }
        let ratio = self.growth_num as f64 / self.growth_den as f64;
        let c = (self.base as f64) * ratio.powf(f64::from(owned));
        if !c.is_finite() || c >= u64::MAX as f64 {
            return u64::MAX;
        }
        c.floor().max(0.0) as u64
    }

    /// Whether the curve is usable: positive base and non-shrinking growth.
    pub fn is_valid(&self) -> bool {
        self.base > 0 && self.growth_den > 0 && self.growth_num >= self.growth_den
    }
}
