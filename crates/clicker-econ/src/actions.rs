use crate::{settle_in_place, EconError, EconomyConfig};
use chrono::{DateTime, Utc};
use clicker_core::ProductionSite;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Repeatable upgrades a site can buy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpgradeKind {
    /// One more passive producer.
    Bot,
    /// One more click multiplier level.
    Multiplier,
    /// One more bot efficiency level.
    BotLevel,
}

impl UpgradeKind {
    /// Units of this upgrade currently owned by `site`.
    pub fn owned(self, site: &ProductionSite) -> u32 {
        match self {
            UpgradeKind::Bot => site.bot_count,
            UpgradeKind::Multiplier => site.multiplier_level,
            UpgradeKind::BotLevel => site.bot_level,
        }
    }

    fn counter_mut(self, site: &mut ProductionSite) -> &mut u32 {
        match self {
            UpgradeKind::Bot => &mut site.bot_count,
            UpgradeKind::Multiplier => &mut site.multiplier_level,
            UpgradeKind::BotLevel => &mut site.bot_level,
        }
    }
}

/// Cost of the next unit of `kind` for `site` as it stands.
pub fn next_cost(site: &ProductionSite, kind: UpgradeKind, config: &EconomyConfig) -> u64 {
    let curve = match kind {
        UpgradeKind::Bot => &config.bot_curve,
        UpgradeKind::Multiplier => &config.multiplier_curve,
        UpgradeKind::BotLevel => &config.bot_level_curve,
    };
    curve.cost(kind.owned(site))
}

/// Next cost of every upgrade, for display.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NextCosts {
    /// Next bot.
    pub bot: u64,
    /// Next multiplier level.
    pub multiplier: u64,
    /// Next bot efficiency level.
    pub bot_level: u64,
}

/// All three next costs for `site`.
pub fn next_costs(site: &ProductionSite, config: &EconomyConfig) -> NextCosts {
    NextCosts {
        bot: next_cost(site, UpgradeKind::Bot, config),
        multiplier: next_cost(site, UpgradeKind::Multiplier, config),
        bot_level: next_cost(site, UpgradeKind::BotLevel, config),
    }
}

/// Whether the balance covers `cost`.
pub fn can_afford(site: &ProductionSite, cost: u64) -> bool {
    site.resource_balance >= cost
}

/// Result of a successful purchase.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PurchaseReceipt {
    /// What was bought.
    pub kind: UpgradeKind,
    /// Units credited by the settlement that preceded the purchase.
    pub settled: u64,
    /// Price paid.
    pub cost: u64,
    /// Balance after the debit.
    pub new_balance: u64,
    /// Counter value after the increment.
    pub new_level: u32,
    /// Price of the following unit.
    pub next_cost: u64,
    /// Production rate after the purchase, units per second.
    pub production_rate: Decimal,
    /// Click multiplier after the purchase.
    pub click_multiplier: Decimal,
}

/// Settle, price, debit and increment in one step.
///
/// Works on a scratch copy; `site` is only overwritten on success, so an
/// unaffordable purchase leaves every field (watermark included) untouched.
pub fn purchase(
    site: &mut ProductionSite,
    kind: UpgradeKind,
    now: DateTime<Utc>,
    config: &EconomyConfig,
) -> Result<PurchaseReceipt, EconError> {
    let mut draft = site.clone();
    let settlement = settle_in_place(&mut draft, now, config);
    let cost = next_cost(&draft, kind, config);
    if !can_afford(&draft, cost) {
        return Err(EconError::InsufficientResource {
            balance: draft.resource_balance,
            cost,
        });
    }
    let new_balance = draft.debit(cost);
    let counter = kind.counter_mut(&mut draft);
    *counter = counter.saturating_add(1);
    let new_level = *counter;
    draft.recompute_derived(&config.rates);

    let receipt = PurchaseReceipt {
        kind,
        settled: settlement.accrued,
        cost,
        new_balance,
        new_level,
        next_cost: next_cost(&draft, kind, config),
        production_rate: draft.production_rate,
        click_multiplier: draft.click_multiplier,
    };
    info!(site = %draft.id, ?kind, cost, new_level, new_balance, "upgrade purchased");
    *site = draft;
    Ok(receipt)
}

/// Result of a credited click.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClickReceipt {
    /// Units requested by the caller before the multiplier.
    pub raw_amount: u64,
    /// Units actually credited.
    pub credited: u64,
    /// Multiplier applied.
    pub multiplier: Decimal,
    /// Units credited by the settlement that preceded the click.
    pub settled: u64,
    /// Balance before the click was credited (after settlement).
    pub previous_balance: u64,
    /// Balance after the click.
    pub new_balance: u64,
    /// Current production rate, units per second.
    pub production_rate: Decimal,
}

/// Credit a manual click: `floor(raw_amount * click_multiplier)`.
///
/// Requests above `config.click_ceiling` are refused before anything is touched.
pub fn apply_click(
    site: &mut ProductionSite,
    raw_amount: u64,
    now: DateTime<Utc>,
    config: &EconomyConfig,
) -> Result<ClickReceipt, EconError> {
    if raw_amount > config.click_ceiling {
        return Err(EconError::RateLimit {
            amount: raw_amount,
            ceiling: config.click_ceiling,
        });
    }
    let settlement = settle_in_place(site, now, config);
    let credited = Decimal::from(raw_amount)
        .checked_mul(site.click_multiplier)
        .map_or(u64::MAX, |units| units.floor().to_u64().unwrap_or(u64::MAX));
    let previous_balance = site.resource_balance;
    let new_balance = site.credit(credited);
    Ok(ClickReceipt {
        raw_amount,
        credited,
        multiplier: site.click_multiplier,
        settled: settlement.accrued,
        previous_balance,
        new_balance,
        production_rate: site.production_rate,
    })
}
