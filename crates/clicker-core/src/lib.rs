#![deny(warnings)]

//! Core ledger types and invariants for the clicker economy.
//!
//! A [`ProductionSite`] holds the durable counters of one player site. The
//! derived fields (`click_multiplier`, `production_rate`) are stored next to
//! their drivers and must be recomputed through [`ProductionSite::recompute_derived`]
//! whenever a driver changes. [`validate_site`] checks that they agree.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tracing::debug;

/// Unique identifier of a production site.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SiteId(pub u64);

impl fmt::Display for SiteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "site#{}", self.0)
    }
}

/// Coefficients of the derived production and click formulas.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateTable {
    /// Units produced per minute by one bot at level 0.
    pub bot_yield_per_minute: Decimal,
    /// Relative bonus per bot efficiency level (0.5 = +50%).
    pub level_bonus: Decimal,
    /// Click multiplier increment per multiplier level.
    pub multiplier_step: Decimal,
}

impl Default for RateTable {
    fn default() -> Self {
        Self {
            bot_yield_per_minute: Decimal::new(6, 0),
            level_bonus: Decimal::new(5, 1),
            multiplier_step: Decimal::new(25, 2),
        }
    }
}

impl RateTable {
    /// Units produced per minute by `bot_count` bots at `bot_level`.
    ///
    /// `bots * yield * (1 + level * bonus)`, saturating at `Decimal::MAX`.
    pub fn yield_per_minute(&self, bot_count: u32, bot_level: u32) -> Decimal {
        let efficiency = Decimal::from(bot_level)
            .checked_mul(self.level_bonus)
            .and_then(|bonus| bonus.checked_add(Decimal::ONE))
            .unwrap_or(Decimal::MAX);
        let base = Decimal::from(bot_count)
            .checked_mul(self.bot_yield_per_minute)
            .unwrap_or(Decimal::MAX);
        base.checked_mul(efficiency).unwrap_or(Decimal::MAX)
    }

    /// Units produced per second; the single formula used for display and accrual.
    pub fn production_rate(&self, bot_count: u32, bot_level: u32) -> Decimal {
        self.yield_per_minute(bot_count, bot_level) / Decimal::from(60)
    }

    /// Manual click multiplier at `multiplier_level`, saturating at `Decimal::MAX`.
    pub fn click_multiplier(&self, multiplier_level: u32) -> Decimal {
        Decimal::from(multiplier_level)
            .checked_mul(self.multiplier_step)
            .and_then(|step| step.checked_add(Decimal::ONE))
            .unwrap_or(Decimal::MAX)
    }
}

/// Durable counters of one production site.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProductionSite {
    /// Site identifier.
    pub id: SiteId,
    /// Display name (non-empty).
    pub name: String,
    /// Spendable resource.
    pub resource_balance: u64,
    /// Owned passive producers.
    pub bot_count: u32,
    /// Efficiency tier of the producers.
    pub bot_level: u32,
    /// Tier of the manual click multiplier.
    pub multiplier_level: u32,
    /// Derived from `multiplier_level`.
    pub click_multiplier: Decimal,
    /// Derived from `bot_count` and `bot_level`, in units per second.
    pub production_rate: Decimal,
    /// Watermark of the last production settlement.
    pub last_update: DateTime<Utc>,
}

impl ProductionSite {
    /// A fresh site: no bots, no levels, multiplier 1.0.
    pub fn new(id: SiteId, name: impl Into<String>, now: DateTime<Utc>, rates: &RateTable) -> Self {
        let mut site = Self {
            id,
            name: name.into(),
            resource_balance: 0,
            bot_count: 0,
            bot_level: 0,
            multiplier_level: 0,
            click_multiplier: Decimal::ONE,
            production_rate: Decimal::ZERO,
            last_update: now,
        };
        site.recompute_derived(rates);
        site
    }

    /// Refresh `click_multiplier` and `production_rate` from their drivers.
    pub fn recompute_derived(&mut self, rates: &RateTable) {
        self.click_multiplier = rates.click_multiplier(self.multiplier_level);
        self.production_rate = rates.production_rate(self.bot_count, self.bot_level);
    }

    /// Add to the balance, saturating at `u64::MAX`. Returns the new balance.
    pub fn credit(&mut self, amount: u64) -> u64 {
        self.resource_balance = self.resource_balance.saturating_add(amount);
        self.resource_balance
    }

    /// Subtract `amount`, flooring at zero. Returns the new balance.
    ///
    /// Purchases check affordability before debiting.
    pub fn debit(&mut self, amount: u64) -> u64 {
        self.resource_balance = self.resource_balance.saturating_sub(amount);
        self.resource_balance
    }

    /// Move the settlement watermark forward. Earlier timestamps are ignored.
    pub fn advance_watermark(&mut self, now: DateTime<Utc>) {
        if now > self.last_update {
            self.last_update = now;
        } else if now < self.last_update {
            debug!(site = %self.id, %now, last_update = %self.last_update, "watermark not moved backwards");
        }
    }
}

/// Validation errors for ledger invariants.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    /// Site names must not be blank.
    #[error("site name must not be empty")]
    EmptyName,
    /// Stored derived field disagrees with its drivers.
    #[error("derived field {field} is stale: stored {stored}, expected {expected}")]
    StaleDerived {
        /// Field name.
        field: &'static str,
        /// Value found on the site.
        stored: Decimal,
        /// Value recomputed from the drivers.
        expected: Decimal,
    },
    /// Click multiplier must be strictly positive.
    #[error("click multiplier must be > 0")]
    NonPositiveMultiplier,
}

/// Validate a site name.
pub fn validate_name(name: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        return Err(ValidationError::EmptyName);
    }
    Ok(())
}

/// Validate a site against the rate table it was computed with.
pub fn validate_site(site: &ProductionSite, rates: &RateTable) -> Result<(), ValidationError> {
    validate_name(&site.name)?;
    if site.click_multiplier <= Decimal::ZERO {
        return Err(ValidationError::NonPositiveMultiplier);
    }
    let expected = rates.click_multiplier(site.multiplier_level);
    if site.click_multiplier != expected {
        return Err(ValidationError::StaleDerived {
            field: "click_multiplier",
            stored: site.click_multiplier,
            expected,
        });
    }
    let expected = rates.production_rate(site.bot_count, site.bot_level);
    if site.production_rate != expected {
        return Err(ValidationError::StaleDerived {
            field: "production_rate",
            stored: site.production_rate,
            expected,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use proptest::prelude::*;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn new_site_starts_empty() {
        let rates = RateTable::default();
        let site = ProductionSite::new(SiteId(1), "Kong", t0(), &rates);
        assert_eq!(site.resource_balance, 0);
        assert_eq!(site.bot_count, 0);
        assert_eq!(site.click_multiplier, Decimal::ONE);
        assert_eq!(site.production_rate, Decimal::ZERO);
        assert_eq!(site.last_update, t0());
        validate_site(&site, &rates).unwrap();
    }

    #[test]
    fn default_rates_match_formulas() {
        let rates = RateTable::default();
        // one bot at level 0: 6/min = 0.1/s
        assert_eq!(rates.production_rate(1, 0), Decimal::new(1, 1));
        // 4 bots at level 2: 4 * 6 * 2 / 60 = 0.8
        assert_eq!(rates.production_rate(4, 2), Decimal::new(8, 1));
        assert_eq!(rates.click_multiplier(1), Decimal::new(125, 2));
        assert_eq!(rates.click_multiplier(4), Decimal::new(2, 0));
    }

    #[test]
    fn huge_coefficients_saturate() {
        let rates = RateTable {
            bot_yield_per_minute: Decimal::MAX / Decimal::from(2),
            level_bonus: Decimal::MAX,
            multiplier_step: Decimal::MAX,
        };
        assert_eq!(rates.yield_per_minute(3, 0), Decimal::MAX);
        assert_eq!(rates.yield_per_minute(1, 2), Decimal::MAX);
        assert_eq!(rates.click_multiplier(2), Decimal::MAX);
        assert_eq!(rates.click_multiplier(0), Decimal::ONE);
        assert_eq!(rates.production_rate(0, 5), Decimal::ZERO);
        let mut site = ProductionSite::new(SiteId(1), "Kong", t0(), &rates);
        site.bot_count = u32::MAX;
        site.recompute_derived(&rates);
        validate_site(&site, &rates).unwrap();
    }

    #[test]
    fn non_positive_multiplier_is_rejected() {
        let rates = RateTable::default();
        let mut site = ProductionSite::new(SiteId(1), "Kong", t0(), &rates);
        site.click_multiplier = Decimal::ZERO;
        assert_eq!(validate_site(&site, &rates), Err(ValidationError::NonPositiveMultiplier));
    }

    #[test]
    fn stale_derived_is_rejected() {
        let rates = RateTable::default();
        let mut site = ProductionSite::new(SiteId(1), "Kong", t0(), &rates);
        site.bot_count = 3;
        assert!(matches!(
            validate_site(&site, &rates),
            Err(ValidationError::StaleDerived { field: "production_rate", .. })
        ));
        site.recompute_derived(&rates);
        validate_site(&site, &rates).unwrap();
    }

    #[test]
    fn blank_name_is_rejected() {
        assert_eq!(validate_name("  "), Err(ValidationError::EmptyName));
    }

    #[test]
    fn debit_never_goes_negative() {
        let rates = RateTable::default();
        let mut site = ProductionSite::new(SiteId(1), "Kong", t0(), &rates);
        site.credit(5);
        assert_eq!(site.debit(2), 3);
        assert_eq!(site.debit(6), 0);
        assert_eq!(site.resource_balance, 0);
    }

    #[test]
    fn watermark_only_moves_forward() {
        let rates = RateTable::default();
        let mut site = ProductionSite::new(SiteId(1), "Kong", t0(), &rates);
        site.advance_watermark(t0() - Duration::seconds(30));
        assert_eq!(site.last_update, t0());
        site.advance_watermark(t0() + Duration::seconds(30));
        assert_eq!(site.last_update, t0() + Duration::seconds(30));
    }

    #[test]
    fn site_snapshot_roundtrip() {
        let rates = RateTable::default();
        let mut site = ProductionSite::new(SiteId(7), "Bonzo", t0(), &rates);
        site.bot_count = 2;
        site.multiplier_level = 1;
        site.recompute_derived(&rates);
        let s = serde_json::to_string_pretty(&site).unwrap();
        let back: ProductionSite = serde_json::from_str(&s).unwrap();
        assert_eq!(back, site);
        validate_site(&back, &rates).unwrap();
    }

    proptest! {
        #[test]
        fn recompute_always_validates(bots in 0u32..10_000, level in 0u32..200, mult in 0u32..200) {
            let rates = RateTable::default();
            let mut site = ProductionSite::new(SiteId(1), "Prop", t0(), &rates);
            site.bot_count = bots;
            site.bot_level = level;
            site.multiplier_level = mult;
            site.recompute_derived(&rates);
            prop_assert!(validate_site(&site, &rates).is_ok());
            prop_assert!(site.click_multiplier >= Decimal::ONE);
            prop_assert!(site.production_rate >= Decimal::ZERO);
        }

        #[test]
        fn rate_grows_with_bots(bots in 0u32..10_000, level in 0u32..200) {
            let rates = RateTable::default();
            prop_assert!(rates.production_rate(bots + 1, level) > rates.production_rate(bots, level));
        }
    }
}
