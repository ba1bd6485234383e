//! veneer-demo: caching and tracing proxies over a sample contract
//!
//! Wraps an in-memory catalog first in a caching proxy, then in a tracing
//! proxy that logs every call, and issues a few lookups.
//!
//! ## Configuration
//! - `--config <path>`: settings file (YAML)
//! - VENEER_CONFIG: settings file (YAML)
//! - VENEER_CACHING__HONOR_EXPIRATION, VENEER_TRACING__LOG_CALLS: overrides
//! - VENEER_LOG: log filter (default "info")

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info};

use veneer::config::Settings;
use veneer::{CachingEngine, TracingEngine};

#[veneer::contract]
pub trait Catalog: Send + Sync {
    fn price(&self, sku: &str) -> Option<u64>;
    fn quote(&self, sku: &str, quantity: u32) -> Result<u64, String>;
    fn size(&self) -> usize;
    fn restock(&self, sku: String);
}

struct MemoryCatalog {
    prices: HashMap<String, u64>,
    lookups: AtomicUsize,
}

impl MemoryCatalog {
    fn new() -> Self {
        let prices = [("apple", 40), ("pear", 55), ("plum", 25)]
            .into_iter()
            .map(|(sku, price)| (sku.to_string(), price))
            .collect();
        Self {
            prices,
            lookups: AtomicUsize::new(0),
        }
    }

    fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

impl Catalog for MemoryCatalog {
    fn price(&self, sku: &str) -> Option<u64> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.prices.get(sku).copied()
    }

    fn quote(&self, sku: &str, quantity: u32) -> Result<u64, String> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        let price = self
            .prices
            .get(sku)
            .ok_or_else(|| format!("unknown sku {sku}"))?;
        Ok(price * u64::from(quantity))
    }

    fn size(&self) -> usize {
        self.prices.len()
    }

    fn restock(&self, sku: String) {
        info!(sku = %sku, "Restocked");
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    veneer::utils::bootstrap::init_tracing();

    let config_path = veneer::utils::bootstrap::parse_config_path();
    let settings = Settings::load(config_path.as_deref()).map_err(|e| {
        error!("Failed to load settings: {}", e);
        e
    })?;

    info!("Starting veneer-demo");

    let caching = CachingEngine::with_settings(settings.caching);
    let tracing = TracingEngine::with_settings(settings.tracing);

    let backing = Arc::new(MemoryCatalog::new());
    let catalog: Arc<dyn Catalog> = backing.clone();

    let catalog = caching.build(catalog, |cfg| {
        cfg.method(CatalogMethods::SIZE).exclude();
        cfg.method(CatalogMethods::QUOTE)
            .expire(Duration::from_secs(30));
    })?;
    let catalog = tracing.build(
        catalog,
        |_, method: &str| info!(method, "Call started"),
        |_, method: &str| info!(method, "Call finished"),
    )?;

    for sku in ["apple", "pear", "apple", "kiwi", "apple"] {
        info!(sku, price = ?catalog.price(sku), "Price");
    }
    match catalog.quote("plum", 4) {
        Ok(total) => info!(total, "Quote"),
        Err(e) => error!(error = %e, "Quote failed"),
    }
    if let Err(e) = catalog.quote("kiwi", 1) {
        info!(error = %e, "Quote rejected");
    }
    catalog.restock("kiwi".to_string());
    info!(size = catalog.size(), "Catalog size");

    let (synthesized, reused, discarded) = caching.stats().snapshot();
    info!(
        lookups = backing.lookups(),
        synthesized, reused, discarded, "Done"
    );
    Ok(())
}
