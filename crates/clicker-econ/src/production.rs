use crate::EconomyConfig;
use chrono::{DateTime, Duration, Utc};
use clicker_core::{ProductionSite, RateTable};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Outcome of catching a site's passive production up to `now`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settlement {
    /// Whole units produced in the credited window.
    pub accrued: u64,
    /// Credited window after clamping and capping, in milliseconds.
    pub elapsed_ms: i64,
    /// Watermark after settlement.
    pub new_last_update: DateTime<Utc>,
    /// `now` was earlier than the stored watermark.
    pub clock_anomaly: bool,
}

/// Whole units produced by `bot_count` bots at `bot_level` over `elapsed_ms`.
///
/// `floor(elapsed_ms * yield_per_minute / 60_000)`, computed without float
/// rounding so that 0.1/s over 3600 s yields exactly 360.
pub fn accrual(rates: &RateTable, bot_count: u32, bot_level: u32, elapsed_ms: i64) -> u64 {
    if bot_count == 0 || elapsed_ms <= 0 {
        return 0;
    }
    let per_minute = rates.yield_per_minute(bot_count, bot_level);
    let Some(scaled) = Decimal::from(elapsed_ms).checked_mul(per_minute) else {
        return u64::MAX;
    };
    let units = (scaled / Decimal::from(60_000)).floor();
    if units.is_sign_negative() {
        return 0;
    }
    units.to_u64().unwrap_or(u64::MAX)
}

/// Compute the settlement of `site` at `now` without mutating it.
///
/// Elapsed time is clamped to zero when `now` precedes the watermark and
/// capped at `config.offline_cap_secs`.
pub fn settle(site: &ProductionSite, now: DateTime<Utc>, config: &EconomyConfig) -> Settlement {
    let raw = now.signed_duration_since(site.last_update);
    let clock_anomaly = raw < Duration::zero();
    if clock_anomaly {
        warn!(site = %site.id, %now, last_update = %site.last_update, "clock went backwards; nothing accrued");
    }
    let cap = Duration::seconds(i64::from(config.offline_cap_secs));
    let elapsed = raw.max(Duration::zero()).min(cap);
    let elapsed_ms = elapsed.num_milliseconds();
    let accrued = accrual(&config.rates, site.bot_count, site.bot_level, elapsed_ms);
    Settlement {
        accrued,
        elapsed_ms,
        new_last_update: site.last_update.max(now),
        clock_anomaly,
    }
}

/// Settle and apply: credit the accrual and advance the watermark.
pub fn settle_in_place(
    site: &mut ProductionSite,
    now: DateTime<Utc>,
    config: &EconomyConfig,
) -> Settlement {
    let s = settle(site, now, config);
    site.credit(s.accrued);
    site.advance_watermark(s.new_last_update);
    if s.accrued > 0 {
        debug!(site = %site.id, accrued = s.accrued, elapsed_ms = s.elapsed_ms, balance = site.resource_balance, "settled production");
    }
    s
}
