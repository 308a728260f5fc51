use std::fmt::Display;
use std::sync::Arc;

use once_cell::sync::OnceCell;

use crate::error::EngineResult;

/// Derived artifacts the engine may keep between queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheKey {
    CategoryClusters,
    UserCategoryMatrix,
}

impl Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheKey::CategoryClusters => write!(f, "derived:category_clusters"),
            CacheKey::UserCategoryMatrix => write!(f, "derived:user_category_matrix"),
        }
    }
}

/// Read-through slot for one derived artifact
///
/// Concurrent callers wait for the first computation instead of repeating it.
/// Failed computations are not stored. With caching disabled every call
/// recomputes.
#[derive(Debug)]
pub struct CacheSlot<T> {
    key: CacheKey,
    enabled: bool,
    value: OnceCell<Arc<T>>,
}

impl<T> CacheSlot<T> {
    pub fn new(key: CacheKey, enabled: bool) -> Self {
        Self {
            key,
            enabled,
            value: OnceCell::new(),
        }
    }

    pub fn get_or_try_init<F>(&self, compute: F) -> EngineResult<Arc<T>>
    where
        F: FnOnce() -> EngineResult<T>,
    {
        if !self.enabled {
            return compute().map(Arc::new);
        }

        if let Some(cached) = self.value.get() {
            tracing::debug!(key = %self.key, "Cache hit");
            return Ok(Arc::clone(cached));
        }

        self.value
            .get_or_try_init(|| {
                tracing::debug!(key = %self.key, "Cache miss");
                compute().map(Arc::new)
            })
            .map(Arc::clone)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_cache_key_display() {
        assert_eq!(
            format!("{}", CacheKey::CategoryClusters),
            "derived:category_clusters"
        );
        assert_eq!(
            format!("{}", CacheKey::UserCategoryMatrix),
            "derived:user_category_matrix"
        );
    }

    #[test]
    fn test_computes_once_when_enabled() {
        let slot = CacheSlot::new(CacheKey::CategoryClusters, true);
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let value = slot
                .get_or_try_init(|| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(7)
                })
                .unwrap();
            assert_eq!(*value, 7);
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_recomputes_when_disabled() {
        let slot = CacheSlot::new(CacheKey::CategoryClusters, false);
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            slot.get_or_try_init(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .unwrap();
        }

        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_errors_are_not_cached() {
        let slot: CacheSlot<u32> = CacheSlot::new(CacheKey::UserCategoryMatrix, true);

        let first = slot.get_or_try_init(|| Err(EngineError::InsufficientData("empty".into())));
        assert!(first.is_err());

        let second = slot.get_or_try_init(|| Ok(3)).unwrap();
        assert_eq!(*second, 3);
    }

    #[test]
    fn test_concurrent_callers_share_one_computation() {
        let slot = Arc::new(CacheSlot::new(CacheKey::CategoryClusters, true));
        let calls = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let slot = Arc::clone(&slot);
                let calls = Arc::clone(&calls);
                std::thread::spawn(move || {
                    slot.get_or_try_init(|| {
                        calls.fetch_add(1, Ordering::SeqCst);
                        std::thread::sleep(std::time::Duration::from_millis(10));
                        Ok(1u8)
                    })
                    .unwrap();
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_panicking_computation_leaves_slot_usable() {
        let slot: CacheSlot<u32> = CacheSlot::new(CacheKey::CategoryClusters, true);

        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            slot.get_or_try_init(|| panic!("clustering blew up"))
        }));
        assert!(outcome.is_err());

        let value = slot.get_or_try_init(|| Ok(5)).unwrap();
        assert_eq!(*value, 5);
    }
}
