//! In-memory caching using moka
//!
//! Holds the latest booking summary figures so summary reads skip the
//! database. Every recompute overwrites its booking's entry.

use moka::future::Cache;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::pricing::summary::SummaryFigures;

/// Default summary TTL: 10 minutes
pub const DEFAULT_SUMMARY_TTL: Duration = Duration::from_secs(10 * 60);

/// Application cache holding booking summaries
#[derive(Clone)]
pub struct AppCache {
    /// Booking summaries (booking_id -> figures)
    pub summaries: Cache<i64, Arc<SummaryFigures>>,
}

impl AppCache {
    /// Create a new cache instance with the given summary TTL
    pub fn new(summary_ttl: Duration) -> Self {
        Self {
            // Summaries: 10k bookings, idle entries drop after half the TTL
            summaries: Cache::builder()
                .max_capacity(10_000)
                .time_to_live(summary_ttl)
                .time_to_idle(summary_ttl / 2)
                .build(),
        }
    }

    pub async fn summary(&self, booking_id: i64) -> Option<Arc<SummaryFigures>> {
        self.summaries.get(&booking_id).await
    }

    pub async fn store_summary(&self, booking_id: i64, figures: SummaryFigures) {
        self.summaries.insert(booking_id, Arc::new(figures)).await;
    }

    /// Get cache statistics for monitoring
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            summaries_size: self.summaries.entry_count(),
        }
    }

    /// Invalidate a single booking's summary
    pub async fn invalidate_booking(&self, booking_id: i64) {
        self.summaries.invalidate(&booking_id).await;
        info!("Summary cache invalidated for booking {}", booking_id);
    }
}

impl Default for AppCache {
    fn default() -> Self {
        Self::new(DEFAULT_SUMMARY_TTL)
    }
}

/// Cache statistics for monitoring endpoint
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub summaries_size: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_store_and_invalidate_summary() {
        let cache = AppCache::default();
        assert!(cache.summary(7).await.is_none());

        cache
            .store_summary(
                7,
                SummaryFigures {
                    subtotal: dec!(100),
                    ..SummaryFigures::default()
                },
            )
            .await;
        assert_eq!(cache.summary(7).await.unwrap().subtotal, dec!(100));

        cache.invalidate_booking(7).await;
        assert!(cache.summary(7).await.is_none());
    }
}
