//! Process-lifetime cache of synthesized contracts.
//!
//! Keyed by contract type alone. Concurrent first builds may both
//! synthesize; the first insert wins and the loser adopts the winner's
//! table. Failed synthesis is never cached.

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use super::{EngineKind, SynthesizedContract};
use crate::error::SynthesisError;

/// Counters describing how the cache has been used.
#[derive(Debug, Default)]
pub struct SynthesisStats {
    /// Tables built, including ones that lost a race.
    pub synthesized: AtomicU64,
    /// Builds served from an existing table.
    pub reused: AtomicU64,
    /// Tables built but dropped because another build inserted first.
    pub discarded: AtomicU64,
}

impl SynthesisStats {
    /// Snapshot as `(synthesized, reused, discarded)`.
    pub fn snapshot(&self) -> (u64, u64, u64) {
        (
            self.synthesized.load(Ordering::Relaxed),
            self.reused.load(Ordering::Relaxed),
            self.discarded.load(Ordering::Relaxed),
        )
    }
}

/// One engine's map from contract type to synthesized table.
pub struct SynthesisCache {
    engine: EngineKind,
    entries: RwLock<HashMap<TypeId, Arc<SynthesizedContract>>>,
    stats: SynthesisStats,
}

impl SynthesisCache {
    pub fn new(engine: EngineKind) -> Self {
        Self {
            engine,
            entries: RwLock::new(HashMap::new()),
            stats: SynthesisStats::default(),
        }
    }

    pub fn engine(&self) -> EngineKind {
        self.engine
    }

    /// Cached table for a contract, if one was synthesized.
    pub fn get(&self, contract: TypeId) -> Option<Arc<SynthesizedContract>> {
        self.entries.read().get(&contract).cloned()
    }

    /// Cached table for `contract`, synthesizing it on a miss.
    ///
    /// `synthesize` runs without holding any lock.
    pub fn get_or_synthesize<F>(
        &self,
        contract: TypeId,
        synthesize: F,
    ) -> Result<Arc<SynthesizedContract>, SynthesisError>
    where
        F: FnOnce() -> Result<SynthesizedContract, SynthesisError>,
    {
        if let Some(existing) = self.get(contract) {
            self.stats.reused.fetch_add(1, Ordering::Relaxed);
            debug!(
                contract = existing.contract(),
                engine = %self.engine,
                "Reusing synthesized contract"
            );
            return Ok(existing);
        }

        let built = Arc::new(synthesize()?);
        self.stats.synthesized.fetch_add(1, Ordering::Relaxed);

        let mut entries = self.entries.write();
        let winner = Arc::clone(entries.entry(contract).or_insert_with(|| Arc::clone(&built)));
        drop(entries);

        if !Arc::ptr_eq(&winner, &built) {
            self.stats.discarded.fetch_add(1, Ordering::Relaxed);
            debug!(
                contract = winner.contract(),
                engine = %self.engine,
                "Lost synthesis race, discarding local table"
            );
        }

        Ok(winner)
    }

    /// Number of contracts cached.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn stats(&self) -> &SynthesisStats {
        &self.stats
    }
}

impl std::fmt::Debug for SynthesisCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SynthesisCache")
            .field("engine", &self.engine)
            .field("contracts", &self.len())
            .finish()
    }
}
