#![deny(warnings)]

//! Request-handling runtime around the clicker economy.
//!
//! The [`Dispatcher`] resolves a site, reads the clock once, runs the engine
//! under the site's lock and turns the outcome into an [`ActionResponse`].
//! Storage is abstracted behind [`SiteRepository`]; [`InMemorySites`] is the
//! bundled implementation with one mutex per site.

mod cache;
mod clock;
mod config;
mod dispatch;
mod repository;

pub use cache::WindowedCache;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{load_config, DedupConfig, RuntimeConfig};
pub use dispatch::{ActionResponse, CallerId, Dispatcher, SiteStats};
pub use repository::{InMemorySites, SiteRepository};

use clicker_core::{SiteId, ValidationError};
use clicker_econ::EconError;
use thiserror::Error;

/// Failures surfaced by the dispatcher.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DispatchError {
    /// No site with this id.
    #[error("{0} not found")]
    NotFound(SiteId),
    /// Engine refused the operation.
    #[error(transparent)]
    Econ(#[from] EconError),
    /// Input failed ledger validation.
    #[error(transparent)]
    Invalid(#[from] ValidationError),
    /// Lower-level storage failure.
    #[error("storage failure: {0}")]
    Storage(String),
}
