//! Time-gated staleness detection.
//!
//! Checking a source's modification time can mean a filesystem call or a
//! network round trip, and pages are asked "should I reload?" on every
//! request. [`StalenessCache`] remembers the last outcome for the configured
//! check interval, so only one caller per interval pays for the lookup.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use pagemeta_config::ReloadSettings;
use parking_lot::{Mutex, RwLock};

use crate::freshness::{establish_last_modified, Resource};

struct Slot<T> {
    value: Option<T>,
    computed_at: Option<Instant>,
}

/// A single cached value with a time-to-live.
///
/// Expired values are recomputed by at most one thread at a time; the
/// computation runs outside the value lock, so readers of a fresh value are
/// never blocked by it.
pub struct CacheEntry<T> {
    slot: RwLock<Slot<T>>,
    update_gate: Mutex<()>,
}

impl<T: Clone> CacheEntry<T> {
    /// Creates an empty entry; the first lookup always computes.
    pub fn new() -> Self {
        Self {
            slot: RwLock::new(Slot {
                value: None,
                computed_at: None,
            }),
            update_gate: Mutex::new(()),
        }
    }

    /// Returns the cached value if it is younger than `ttl`, otherwise
    /// recomputes it with `compute`.
    ///
    /// While another thread is recomputing, callers get the expired value
    /// when `return_expired_while_updating` is set and one exists; otherwise
    /// they wait for the new value.
    pub fn get_value(
        &self,
        ttl: Duration,
        compute: impl FnOnce() -> T,
        return_expired_while_updating: bool,
    ) -> T {
        if let Some(value) = self.fresh_value(ttl) {
            return value;
        }

        let _gate = if return_expired_while_updating {
            match self.update_gate.try_lock() {
                Some(gate) => gate,
                None => {
                    if let Some(value) = self.slot.read().value.clone() {
                        return value;
                    }
                    self.update_gate.lock()
                }
            }
        } else {
            self.update_gate.lock()
        };

        // Another thread may have refreshed while we waited for the gate.
        if let Some(value) = self.fresh_value(ttl) {
            return value;
        }

        let value = compute();
        let mut slot = self.slot.write();
        slot.value = Some(value.clone());
        slot.computed_at = Some(Instant::now());
        value
    }

    /// The cached value regardless of age.
    pub fn peek(&self) -> Option<T> {
        self.slot.read().value.clone()
    }

    /// Forgets the cached value.
    pub fn clear(&self) {
        let mut slot = self.slot.write();
        slot.value = None;
        slot.computed_at = None;
    }

    fn fresh_value(&self, ttl: Duration) -> Option<T> {
        let slot = self.slot.read();
        match slot.computed_at {
            Some(at) if at.elapsed() < ttl => slot.value.clone(),
            _ => None,
        }
    }
}

impl<T: Clone> Default for CacheEntry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: fmt::Debug> fmt::Debug for CacheEntry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slot = self.slot.read();
        f.debug_struct("CacheEntry")
            .field("value", &slot.value)
            .field("age", &slot.computed_at.map(|at| at.elapsed()))
            .finish()
    }
}

/// Returns `true` if `current` is a known timestamp that differs from
/// `recorded` by more than `granularity_ms`.
pub fn is_newer(current: i64, recorded: i64, granularity_ms: i64) -> bool {
    current > 0 && current.abs_diff(recorded) > granularity_ms.unsigned_abs()
}

/// Caches the answer to "has this page's source changed?".
///
/// The cached outcome is either `None` (unchanged) or the resource that has
/// changed, shared by all callers until the check interval expires.
#[derive(Debug)]
pub struct StalenessCache {
    entry: CacheEntry<Option<Arc<dyn Resource>>>,
    settings: ReloadSettings,
}

impl StalenessCache {
    /// Creates a cache with the given interval and tolerance.
    pub fn new(settings: ReloadSettings) -> Self {
        Self {
            entry: CacheEntry::new(),
            settings,
        }
    }

    /// The settings this cache was built with.
    pub fn settings(&self) -> ReloadSettings {
        self.settings
    }

    /// Returns the changed source resource, or `None` if the source is
    /// unchanged, missing, or its modification time is unknown.
    ///
    /// `resolve_source` is called only when the cached outcome has expired.
    pub fn check_staleness<F>(&self, recorded_last_modified: i64, resolve_source: F) -> Option<Arc<dyn Resource>>
    where
        F: FnOnce() -> Option<Arc<dyn Resource>>,
    {
        let granularity_ms = self.settings.granularity_ms;
        self.entry.get_value(
            self.settings.check_interval,
            || {
                let resource = resolve_source().filter(|r| r.exists())?;
                let current = establish_last_modified(resource.as_ref());
                if is_newer(current, recorded_last_modified, granularity_ms) {
                    tracing::debug!(
                        resource = %resource.description(),
                        current,
                        recorded = recorded_last_modified,
                        "page source changed"
                    );
                    Some(resource)
                } else {
                    None
                }
            },
            true,
        )
    }

    /// Drops the cached outcome so the next check looks again.
    pub fn invalidate(&self) {
        self.entry.clear();
    }
}

/// Uses the process-wide [`ReloadSettings::global`].
impl Default for StalenessCache {
    fn default() -> Self {
        Self::new(ReloadSettings::global())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn tolerance_boundary() {
        assert!(!is_newer(12_000, 10_000, 2000));
        assert!(is_newer(12_001, 10_000, 2000));
        assert!(is_newer(7_999, 10_000, 2000));
        assert!(!is_newer(8_000, 10_000, 2000));
    }

    #[test]
    fn unknown_is_never_newer() {
        assert!(!is_newer(-1, 10_000, 2000));
        assert!(!is_newer(0, 10_000, 2000));
    }

    #[test]
    fn entry_computes_once_within_ttl() {
        let entry = CacheEntry::new();
        let calls = AtomicUsize::new(0);
        let compute = || calls.fetch_add(1, Ordering::SeqCst);
        assert_eq!(entry.get_value(Duration::from_secs(60), compute, true), 0);
        assert_eq!(entry.get_value(Duration::from_secs(60), compute, true), 0);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn zero_ttl_always_recomputes() {
        let entry = CacheEntry::new();
        let calls = AtomicUsize::new(0);
        let compute = || calls.fetch_add(1, Ordering::SeqCst);
        entry.get_value(Duration::ZERO, compute, false);
        entry.get_value(Duration::ZERO, compute, false);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn expired_value_is_recomputed() {
        let entry = CacheEntry::new();
        entry.get_value(Duration::from_millis(10), || 1, true);
        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(entry.get_value(Duration::from_millis(10), || 2, true), 2);
    }

    #[test]
    fn clear_forgets_value() {
        let entry = CacheEntry::new();
        entry.get_value(Duration::from_secs(60), || 1, true);
        assert_eq!(entry.peek(), Some(1));
        entry.clear();
        assert_eq!(entry.peek(), None);
        assert_eq!(entry.get_value(Duration::from_secs(60), || 2, true), 2);
    }

    #[test]
    fn missing_source_is_unchanged() {
        let cache = StalenessCache::new(ReloadSettings::new(0, 2000));
        assert!(cache.check_staleness(10_000, || None).is_none());
    }

    #[test]
    fn warm_cache_skips_resolution() {
        let cache = StalenessCache::new(ReloadSettings::new(60_000, 2000));
        let calls = AtomicUsize::new(0);
        let resolve = || {
            calls.fetch_add(1, Ordering::SeqCst);
            None
        };
        cache.check_staleness(0, resolve);
        cache.check_staleness(0, resolve);
        cache.check_staleness(0, resolve);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn default_uses_process_settings() {
        let cache = StalenessCache::default();
        assert_eq!(cache.settings(), ReloadSettings::global());
        assert!(cache.check_staleness(10_000, || None).is_none());
    }

    #[test]
    fn invalidate_forces_fresh_lookup() {
        let cache = StalenessCache::new(ReloadSettings::new(60_000, 2000));
        let calls = AtomicUsize::new(0);
        let resolve = || {
            calls.fetch_add(1, Ordering::SeqCst);
            None
        };
        cache.check_staleness(0, resolve);
        cache.invalidate();
        cache.check_staleness(0, resolve);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
