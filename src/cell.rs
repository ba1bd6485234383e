//! Per-proxy cache cells.
//!
//! [`MemoCell`] holds one value and guarantees that, among concurrent
//! callers finding it empty (or stale), exactly one computes while the others
//! wait and then read the stored result. A failed or panicking computation
//! leaves the cell as it was. [`KeyedCell`] is a map of memo cells, so the
//! same guarantee holds per key while distinct keys compute in parallel. A key
//! whose computation never succeeded keeps no entry.

use std::any::Any;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, OnceLock, Weak};
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};

struct Stamped<V> {
    value: V,
    stored_at: Instant,
}

impl<V> Stamped<V> {
    fn is_fresh(&self, ttl: Option<Duration>) -> bool {
        ttl.map_or(true, |ttl| self.stored_at.elapsed() < ttl)
    }
}

/// A single lazily computed value.
pub struct MemoCell<V> {
    slot: RwLock<Option<Stamped<V>>>,
    gate: Mutex<()>,
}

impl<V: Clone> MemoCell<V> {
    pub fn new() -> Self {
        Self {
            slot: RwLock::new(None),
            gate: Mutex::new(()),
        }
    }

    /// Stored value, if present and younger than `ttl`.
    pub fn get(&self, ttl: Option<Duration>) -> Option<V> {
        self.slot
            .read()
            .as_ref()
            .filter(|stamped| stamped.is_fresh(ttl))
            .map(|stamped| stamped.value.clone())
    }

    /// Stored value, computing and storing it first if absent or stale.
    ///
    /// An `Err` from `compute` is returned as-is and nothing is stored.
    pub fn get_or_try_compute<E, F>(&self, ttl: Option<Duration>, compute: F) -> Result<V, E>
    where
        F: FnOnce() -> Result<V, E>,
    {
        if let Some(value) = self.get(ttl) {
            tracing::trace!("Cache hit");
            return Ok(value);
        }

        let _gate = self.gate.lock();
        if let Some(value) = self.get(ttl) {
            tracing::trace!("Cache hit after wait");
            return Ok(value);
        }

        tracing::trace!("Cache miss");
        let value = compute()?;
        *self.slot.write() = Some(Stamped {
            value: value.clone(),
            stored_at: Instant::now(),
        });
        Ok(value)
    }

    pub fn is_populated(&self) -> bool {
        self.slot.read().is_some()
    }
}

impl<V: Clone> Default for MemoCell<V> {
    fn default() -> Self {
        Self::new()
    }
}

/// Lazily computed values keyed by argument.
pub struct KeyedCell<K, V> {
    entries: RwLock<HashMap<K, Arc<MemoCell<V>>>>,
}

impl<K: Eq + Hash, V: Clone> KeyedCell<K, V> {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// The memo cell for `key`, created empty on first sight.
    pub fn entry(&self, key: &K) -> Arc<MemoCell<V>>
    where
        K: Clone,
    {
        if let Some(cell) = self.entries.read().get(key) {
            return Arc::clone(cell);
        }
        Arc::clone(
            self.entries
                .write()
                .entry(key.clone())
                .or_insert_with(|| Arc::new(MemoCell::new())),
        )
    }

    /// Stored value for `key`, computing it first if absent or stale.
    ///
    /// If the computation fails or panics and no other caller still holds
    /// the key's cell, the empty entry is removed.
    pub fn get_or_try_compute<E, F>(
        &self,
        key: K,
        ttl: Option<Duration>,
        compute: F,
    ) -> Result<V, E>
    where
        K: Clone,
        F: FnOnce() -> Result<V, E>,
    {
        // Declared before `cell`, so it runs after our handle is released,
        // on unwind as well.
        let mut vacate = Vacate {
            entries: &self.entries,
            cell: Weak::new(),
            key,
            settled: false,
        };
        let cell = self.entry(&vacate.key);
        vacate.cell = Arc::downgrade(&cell);

        let result = cell.get_or_try_compute(ttl, compute);
        vacate.settled = result.is_ok();
        drop(cell);
        result
    }

    /// Number of keys holding a value.
    pub fn populated(&self) -> usize {
        self.entries
            .read()
            .values()
            .filter(|cell| cell.is_populated())
            .count()
    }

    /// Number of keys with an entry, populated or still computing.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

/// Drops a key's entry if it is still empty once its last caller is done.
struct Vacate<'a, K: Eq + Hash, V: Clone> {
    entries: &'a RwLock<HashMap<K, Arc<MemoCell<V>>>>,
    cell: Weak<MemoCell<V>>,
    key: K,
    settled: bool,
}

impl<K: Eq + Hash, V: Clone> Drop for Vacate<'_, K, V> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        let mut entries = self.entries.write();
        let vacant = entries.get(&self.key).is_some_and(|held| {
            std::ptr::eq(Arc::as_ptr(held), self.cell.as_ptr())
                && Arc::strong_count(held) == 1
                && !held.is_populated()
        });
        if vacant {
            entries.remove(&self.key);
        }
    }
}

impl<K: Eq + Hash, V: Clone> Default for KeyedCell<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

/// The cells of one proxy instance, one slot per caching method.
///
/// Slots are typed on first use, since only the generated method body knows
/// its argument and return types.
pub struct CellSlots {
    slots: Box<[OnceLock<Box<dyn Any + Send + Sync>>]>,
}

impl CellSlots {
    pub fn new(count: usize) -> Self {
        Self {
            slots: (0..count).map(|_| OnceLock::new()).collect(),
        }
    }

    /// The cell in `slot`, created as `T::default()` on first use.
    ///
    /// Returns `None` for an out-of-range slot or one already holding a
    /// different type.
    pub fn typed<T>(&self, slot: usize) -> Option<&T>
    where
        T: Default + Send + Sync + 'static,
    {
        self.slots
            .get(slot)?
            .get_or_init(|| Box::new(T::default()))
            .downcast_ref::<T>()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Number of slots touched so far.
    pub fn initialized(&self) -> usize {
        self.slots.iter().filter(|s| s.get().is_some()).count()
    }
}
