use crate::{Clock, DispatchError, RuntimeConfig, SiteRepository, WindowedCache};
use chrono::{DateTime, Utc};
use clicker_core::{validate_name, validate_site, ProductionSite, SiteId};
use clicker_econ::{
    apply_click, next_costs, purchase, settle_in_place, ClickReceipt, EconError, EconomyConfig,
    NextCosts, PurchaseReceipt, UpgradeKind,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

/// Identity of the requesting user, scoping click deduplication.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CallerId(pub u64);

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct ClickKey {
    caller: CallerId,
    site: SiteId,
    raw_amount: u64,
    token: String,
}

/// Uniform response envelope returned by every dispatcher endpoint.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActionResponse<T> {
    /// Whether the operation was applied.
    pub success: bool,
    /// Human-readable reason for a rejection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Payload of a successful operation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ActionResponse<T> {
    /// Successful response carrying `data`.
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            error: None,
            data: Some(data),
        }
    }

    /// Rejection with a message and no payload.
    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(message.into()),
            data: None,
        }
    }

    /// Convert an outcome, logging rejections.
    pub fn from_result(result: Result<T, DispatchError>) -> Self {
        match result {
            Ok(data) => Self::ok(data),
            Err(e) => {
                warn!(error = %e, "request rejected");
                Self::fail(e.to_string())
            }
        }
    }
}

/// Display snapshot of one site.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SiteStats {
    /// Site identifier.
    pub id: SiteId,
    /// Display name.
    pub name: String,
    /// Resource balance after settlement.
    pub balance: u64,
    /// Owned bots.
    pub bot_count: u32,
    /// Bot efficiency level.
    pub bot_level: u32,
    /// Click multiplier level.
    pub multiplier_level: u32,
    /// Current click multiplier.
    pub click_multiplier: Decimal,
    /// Passive production, units per second.
    pub production_rate: Decimal,
    /// Price of the next unit of each upgrade.
    pub next_costs: NextCosts,
    /// Settlement watermark.
    pub last_update: DateTime<Utc>,
    /// Units credited by the settlement performed for this snapshot.
    pub settled: u64,
}

impl SiteStats {
    fn of(site: &ProductionSite, config: &EconomyConfig, settled: u64) -> Self {
        Self {
            id: site.id,
            name: site.name.clone(),
            balance: site.resource_balance,
            bot_count: site.bot_count,
            bot_level: site.bot_level,
            multiplier_level: site.multiplier_level,
            click_multiplier: site.click_multiplier,
            production_rate: site.production_rate,
            next_costs: next_costs(site, config),
            last_update: site.last_update,
            settled,
        }
    }
}

/// Request handler: clock read, site lock, engine call, response envelope.
pub struct Dispatcher<R, C> {
    repo: R,
    clock: C,
    economy: EconomyConfig,
    recent_clicks: Mutex<WindowedCache<ClickKey, ClickReceipt>>,
}

impl<R: SiteRepository, C: Clock> Dispatcher<R, C> {
    /// Build a dispatcher; rejects an invalid economy.
    pub fn new(repo: R, clock: C, config: RuntimeConfig) -> Result<Self, DispatchError> {
        config.economy.validate()?;
        let cache = WindowedCache::new(
            config.dedup.freshness(),
            config.dedup.retention(),
            config.dedup.capacity,
        );
        Ok(Self {
            repo,
            clock,
            economy: config.economy,
            recent_clicks: Mutex::new(cache),
        })
    }

    /// Validated economy parameters in use.
    pub fn economy(&self) -> &EconomyConfig {
        &self.economy
    }

    /// Underlying site storage.
    pub fn repository(&self) -> &R {
        &self.repo
    }

    /// Clock read once per request.
    pub fn clock(&self) -> &C {
        &self.clock
    }

    fn recent_clicks(&self) -> Result<MutexGuard<'_, WindowedCache<ClickKey, ClickReceipt>>, DispatchError> {
        self.recent_clicks
            .lock()
            .map_err(|_| DispatchError::Storage("click cache lock poisoned".into()))
    }

    /// Refuse to commit a site whose derived fields no longer match the rates.
    fn check(&self, site: &ProductionSite) -> Result<(), DispatchError> {
        validate_site(site, &self.economy.rates).map_err(|e| {
            warn!(site = %site.id, error = %e, "site failed validation; not committed");
            DispatchError::from(e)
        })
    }

    /// Register a new site under a trimmed, non-blank name.
    pub fn try_create_site(&self, name: &str) -> Result<SiteStats, DispatchError> {
        validate_name(name)?;
        let now = self.clock.now();
        let rates = self.economy.rates;
        let site = self
            .repo
            .create(|id| ProductionSite::new(id, name.trim(), now, &rates))?;
        info!(site = %site.id, name = %site.name, "site created");
        Ok(SiteStats::of(&site, &self.economy, 0))
    }

    /// Envelope form of [`Dispatcher::try_create_site`].
    pub fn create_site(&self, name: &str) -> ActionResponse<SiteStats> {
        ActionResponse::from_result(self.try_create_site(name))
    }

    /// Credit a manual click.
    ///
    /// With a `token`, a repeat of the same `(caller, site, raw_amount, token)`
    /// inside the freshness window returns the stored receipt instead of
    /// crediting again. The lookup runs under the site lock, so concurrent
    /// duplicates cannot both credit.
    pub fn try_click(
        &self,
        caller: CallerId,
        site: SiteId,
        raw_amount: u64,
        token: Option<&str>,
    ) -> Result<ClickReceipt, DispatchError> {
        if raw_amount > self.economy.click_ceiling {
            return Err(EconError::RateLimit {
                amount: raw_amount,
                ceiling: self.economy.click_ceiling,
            }
            .into());
        }
        let now = self.clock.now();
        let key = token.map(|t| ClickKey {
            caller,
            site,
            raw_amount,
            token: t.to_string(),
        });
        self.repo.transact(site, |s| -> Result<ClickReceipt, DispatchError> {
            let Some(key) = key else {
                let receipt = apply_click(s, raw_amount, now, &self.economy)?;
                self.check(s)?;
                return Ok(receipt);
            };
            let mut recent = self.recent_clicks()?;
            if let Some(hit) = recent.get_fresh(&key, now) {
                debug!(%site, ?caller, token = %key.token, "duplicate click replayed");
                return Ok(hit);
            }
            let receipt = apply_click(s, raw_amount, now, &self.economy)?;
            self.check(s)?;
            recent.insert(key, receipt.clone(), now);
            Ok(receipt)
        })
    }

    /// Envelope form of [`Dispatcher::try_click`].
    pub fn click(
        &self,
        caller: CallerId,
        site: SiteId,
        raw_amount: u64,
        token: Option<&str>,
    ) -> ActionResponse<ClickReceipt> {
        ActionResponse::from_result(self.try_click(caller, site, raw_amount, token))
    }

    /// Buy one unit of `kind`, settling first.
    pub fn try_purchase(&self, site: SiteId, kind: UpgradeKind) -> Result<PurchaseReceipt, DispatchError> {
        let now = self.clock.now();
        self.repo.transact(site, |s| -> Result<PurchaseReceipt, DispatchError> {
            let receipt = purchase(s, kind, now, &self.economy)?;
            self.check(s)?;
            Ok(receipt)
        })
    }

    /// Buy one bot.
    pub fn buy_bot(&self, site: SiteId) -> ActionResponse<PurchaseReceipt> {
        ActionResponse::from_result(self.try_purchase(site, UpgradeKind::Bot))
    }

    /// Raise the click multiplier by one level.
    pub fn upgrade_multiplier(&self, site: SiteId) -> ActionResponse<PurchaseReceipt> {
        ActionResponse::from_result(self.try_purchase(site, UpgradeKind::Multiplier))
    }

    /// Raise bot efficiency by one level.
    pub fn upgrade_bots(&self, site: SiteId) -> ActionResponse<PurchaseReceipt> {
        ActionResponse::from_result(self.try_purchase(site, UpgradeKind::BotLevel))
    }

    /// Settle the site to now and report it.
    pub fn try_stats(&self, site: SiteId) -> Result<SiteStats, DispatchError> {
        let now = self.clock.now();
        self.repo.transact(site, |s| {
            let settlement = settle_in_place(s, now, &self.economy);
            self.check(s)?;
            Ok::<_, DispatchError>(SiteStats::of(s, &self.economy, settlement.accrued))
        })
    }

    /// Envelope form of [`Dispatcher::try_stats`].
    pub fn stats(&self, site: SiteId) -> ActionResponse<SiteStats> {
        ActionResponse::from_result(self.try_stats(site))
    }

    /// Every site with its next costs, as stored (no settlement).
    pub fn try_overview(&self) -> Result<Vec<SiteStats>, DispatchError> {
        Ok(self
            .repo
            .list()?
            .iter()
            .map(|s| SiteStats::of(s, &self.economy, 0))
            .collect())
    }

    /// Envelope form of [`Dispatcher::try_overview`].
    pub fn overview(&self) -> ActionResponse<Vec<SiteStats>> {
        ActionResponse::from_result(self.try_overview())
    }
}
