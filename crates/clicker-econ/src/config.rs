use crate::{CostCurve, EconError};
use clicker_core::RateTable;
use serde::{Deserialize, Serialize};

/// Tunable economy parameters. Every field has a default, so partial YAML works.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EconomyConfig {
    /// Coefficients of the derived rate and multiplier.
    pub rates: RateTable,
    /// Price of the next bot.
    pub bot_curve: CostCurve,
    /// Price of the next click multiplier level.
    pub multiplier_curve: CostCurve,
    /// Price of the next bot efficiency level.
    pub bot_level_curve: CostCurve,
    /// Maximum offline window credited by one settlement, in seconds.
    pub offline_cap_secs: u32,
    /// Maximum raw units accepted by one click call.
    pub click_ceiling: u64,
}

impl Default for EconomyConfig {
    fn default() -> Self {
        Self {
            rates: RateTable::default(),
            bot_curve: CostCurve::BOT,
            multiplier_curve: CostCurve::MULTIPLIER,
            bot_level_curve: CostCurve::BOT_LEVEL,
            offline_cap_secs: 3600,
            click_ceiling: 1000,
        }
    }
}

impl EconomyConfig {
    /// Reject parameter sets that would break monotone pricing or produce
    /// negative rates.
    pub fn validate(&self) -> Result<(), EconError> {
        for (name, curve) in [
            ("bot_curve", &self.bot_curve),
            ("multiplier_curve", &self.multiplier_curve),
            ("bot_level_curve", &self.bot_level_curve),
        ] {
            if !curve.is_valid() {
                return Err(EconError::InvalidConfig(format!(
                    "{name} must have base > 0 and growth >= 1"
                )));
            }
        }
        let r = &self.rates;
        if r.bot_yield_per_minute.is_sign_negative()
            || r.level_bonus.is_sign_negative()
            || r.multiplier_step.is_sign_negative()
        {
            return Err(EconError::InvalidConfig("rate coefficients must be >= 0".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    #[test]
    fn defaults_are_valid() {
        let cfg = EconomyConfig::default();
        cfg.validate().unwrap();
        assert_eq!(cfg.offline_cap_secs, 3600);
        assert_eq!(cfg.click_ceiling, 1000);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let cfg: EconomyConfig = serde_json::from_str(r#"{"click_ceiling": 50}"#).unwrap();
        assert_eq!(cfg.click_ceiling, 50);
        assert_eq!(cfg.bot_curve, CostCurve::BOT);
        assert_eq!(cfg.rates, RateTable::default());
    }

    #[test]
    fn shrinking_curve_is_rejected() {
        let cfg = EconomyConfig {
            bot_curve: CostCurve::new(10, 1, 2),
            ..EconomyConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(EconError::InvalidConfig(_))));
    }

    #[test]
    fn negative_rate_is_rejected() {
        let mut cfg = EconomyConfig::default();
        cfg.rates.level_bonus = Decimal::new(-1, 0);
        assert!(cfg.validate().is_err());
    }
}
