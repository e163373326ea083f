#![deny(warnings)]

//! Economic engine for the clicker: production catch-up and upgrade pricing.
//!
//! This crate provides pure functions over a [`ProductionSite`]:
//! - Offline production settlement capped at a maximum elapsed window
//! - Exponential cost curves for bots, bot efficiency and click multiplier
//! - Atomic purchase and click application producing receipts
//!
//! Nothing here locks or persists; callers serialize access per site.

mod actions;
mod config;
mod cost;
mod production;

pub use actions::{
    apply_click, can_afford, next_cost, next_costs, purchase, ClickReceipt, NextCosts,
    PurchaseReceipt, UpgradeKind,
};
pub use config::EconomyConfig;
pub use cost::CostCurve;
pub use production::{accrual, settle, settle_in_place, Settlement};

pub use clicker_core::{ProductionSite, RateTable, SiteId};

use thiserror::Error;

/// Errors produced by economic operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EconError {
    /// Balance does not cover the cost of the requested upgrade.
    #[error("insufficient resource: have {balance}, need {cost}")]
    InsufficientResource {
        /// Balance after settlement.
        balance: u64,
        /// Cost of the next unit.
        cost: u64,
    },
    /// Manual credit request above the per-call ceiling.
    #[error("too many units in one call: {amount} exceeds {ceiling}")]
    RateLimit {
        /// Requested raw amount.
        amount: u64,
        /// Configured ceiling.
        ceiling: u64,
    },
    /// Economy parameters violate a basic constraint.
    #[error("invalid economy config: {0}")]
    InvalidConfig(String),
}
