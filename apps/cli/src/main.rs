#![deny(warnings)]

//! Headless driver: plays a seeded clicker session against a manual clock
//! and prints the final site state as JSON.

use anyhow::Result;
use chrono::{Duration, Utc};
use clicker_econ::{NextCosts, UpgradeKind};
use clicker_runtime::{
    load_config, CallerId, Dispatcher, InMemorySites, ManualClock, RuntimeConfig, SiteRepository,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{info, Level};
use tracing_subscriber::EnvFilter;

struct Args {
    config: Option<String>,
    seed: u64,
    minutes: u32,
    offline_secs: i64,
}

fn parse_args() -> Args {
    let mut args = Args {
        config: None,
        seed: 42,
        minutes: 30,
        offline_secs: 0,
    };
    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--config" => args.config = it.next(),
            "--seed" => args.seed = it.next().and_then(|s| s.parse().ok()).unwrap_or(args.seed),
            "--minutes" => {
                args.minutes = it.next().and_then(|s| s.parse().ok()).unwrap_or(args.minutes)
            }
            "--offline-secs" => {
                args.offline_secs = it
                    .next()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(args.offline_secs)
            }
            _ => {}
        }
    }
    args
}

fn cheapest(costs: &NextCosts) -> (UpgradeKind, u64) {
    [
        (UpgradeKind::Bot, costs.bot),
        (UpgradeKind::Multiplier, costs.multiplier),
        (UpgradeKind::BotLevel, costs.bot_level),
    ]
    .into_iter()
    .min_by_key(|(_, c)| *c)
    .unwrap_or((UpgradeKind::Bot, costs.bot))
}

fn main() -> Result<()> {
    // Logging setup
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_max_level(Level::INFO)
        .init();

    let args = parse_args();
    info!(config = ?args.config, seed = args.seed, minutes = args.minutes, "starting session");

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => RuntimeConfig::default(),
    };
    let ceiling = config.economy.click_ceiling;
    let dispatcher = Dispatcher::new(InMemorySites::new(), ManualClock::new(Utc::now()), config)?;
    let site = dispatcher.try_create_site("Kong")?.id;
    let player = CallerId(1);
    let mut rng = ChaCha8Rng::seed_from_u64(args.seed);

    let mut purchases = 0u32;
    for minute in 0..args.minutes {
        let taps: u64 = rng.gen_range(20..=120);
        let token = format!("m{minute}");
        dispatcher.try_click(player, site, taps.min(ceiling), Some(&token))?;
        dispatcher.clock().advance(Duration::seconds(60));

        loop {
            let stats = dispatcher.try_stats(site)?;
            let (kind, cost) = cheapest(&stats.next_costs);
            if stats.balance < cost {
                break;
            }
            dispatcher.try_purchase(site, kind)?;
            purchases += 1;
        }
    }

    if args.offline_secs > 0 {
        let secs = args.offline_secs.min(365 * 86_400);
        dispatcher.clock().advance(Duration::seconds(secs));
    }
    let final_stats = dispatcher.stats(site);
    let stored = dispatcher.repository().load(site)?;
    info!(purchases, balance = stored.resource_balance, bots = stored.bot_count, "session finished");
    println!("{}", serde_json::to_string_pretty(&final_stats)?);
    Ok(())
}
