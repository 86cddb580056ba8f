//! Cache domain trait and cache statistics.

use async_trait::async_trait;
use procura_core::ProcuraResult;
use serde::Serialize;

/// One independently clearable cache, registered with the invalidation
/// coordinator.
///
/// Every loader is a domain. Other implementations (a remote mirror, a
/// rendered page cache) can register alongside them and may fail to clear;
/// the coordinator records such failures instead of propagating them.
#[async_trait]
pub trait CacheDomain: Send + Sync {
    /// Stable name used in logs and invalidation reports.
    fn name(&self) -> &str;

    /// Drop every entry. Returns how many entries were removed.
    async fn clear(&self) -> ProcuraResult<usize>;
}

/// Statistics about cache usage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Number of cache hits.
    pub hits: u64,
    /// Number of cache misses.
    pub misses: u64,
    /// Number of entries currently held, expired ones included until touched.
    pub entry_count: u64,
    /// Entries dropped because they were found expired on access.
    pub evictions: u64,
}

impl CacheStats {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_rate() {
        assert_eq!(CacheStats::default().hit_rate(), 0.0);

        let stats = CacheStats {
            hits: 3,
            misses: 1,
            ..Default::default()
        };
        assert!((stats.hit_rate() - 0.75).abs() < f64::EPSILON);
    }
}
