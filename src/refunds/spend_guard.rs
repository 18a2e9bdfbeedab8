//! Daily outflow limit enforcement.
//!
//! # Responsibilities
//! - Atomically reserve refund amounts against a rolling UTC-day cap
//! - Roll the reservation back when it would cross the cap
//! - Degrade open when the counter store is unreachable
//!
//! The sequence is increment-then-check-then-rollback, not
//! read-then-check-then-write: each increment is atomic and visible to the
//! next caller, so two concurrent reservations can never both observe a
//! value below the limit and both proceed.

use std::sync::Arc;

use chrono::Utc;

use crate::observability::metrics;
use crate::refunds::amounts::{usd_to_cents, AmountError};
use crate::store::CounterStore;

/// Default daily cap when no override is configured.
pub const DEFAULT_DAILY_LIMIT_USD: &str = "10000";

/// Counter expiry, comfortably past 24h to tolerate clock skew between
/// writers.
const COUNTER_EXPIRY_SECS: u64 = 48 * 3600;

/// Atomic daily spend limit guard.
pub struct SpendLimitGuard {
    store: Arc<dyn CounterStore>,
    daily_limit_cents: u64,
}

impl SpendLimitGuard {
    /// Build a guard with an optional decimal-USD limit override.
    pub fn new(
        store: Arc<dyn CounterStore>,
        daily_limit_usd: Option<&str>,
    ) -> Result<Self, AmountError> {
        let daily_limit_cents = usd_to_cents(daily_limit_usd.unwrap_or(DEFAULT_DAILY_LIMIT_USD))?;
        Ok(Self {
            store,
            daily_limit_cents,
        })
    }

    fn day_key() -> String {
        format!("refund:daily-spend:{}", Utc::now().format("%Y-%m-%d"))
    }

    /// Atomically reserve `amount_usd` against today's cap.
    ///
    /// Returns true when the reservation is allowed. A counter-store failure
    /// also returns true: spend enforcement degrades open rather than
    /// blocking all refunds on infrastructure failure — an explicit
    /// availability-over-strict-enforcement tradeoff.
    pub async fn check_and_reserve(&self, amount_usd: &str) -> bool {
        let amount_cents = match usd_to_cents(amount_usd) {
            Ok(cents) => cents,
            Err(e) => {
                // Callers validate amounts before reserving; an unparseable
                // amount here cannot be priced, so it cannot be reserved.
                tracing::error!(error = %e, "Spend reservation with unparseable amount");
                metrics::record_spend_guard("rejected");
                return false;
            }
        };

        // The counter protocol is i64; an amount that cannot be represented
        // cannot be reserved (and could corrupt the counter via a wrapped
        // rollback).
        let amount_cents = match i64::try_from(amount_cents) {
            Ok(cents) => cents,
            Err(_) => {
                tracing::error!(
                    amount_usd = amount_usd,
                    "Spend reservation amount exceeds counter range"
                );
                metrics::record_spend_guard("rejected");
                return false;
            }
        };

        let key = Self::day_key();
        let new_total = match self.store.incr_by(&key, amount_cents).await {
            Ok(total) => total,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    "Counter store unavailable; spend limit check degraded open"
                );
                metrics::record_spend_guard("degraded");
                return true;
            }
        };

        // Refresh expiry on every reservation; idempotent.
        if let Err(e) = self.store.expire(&key, COUNTER_EXPIRY_SECS).await {
            tracing::warn!(error = %e, "Failed to set spend counter expiry");
        }

        if new_total as u64 > self.daily_limit_cents {
            match self.store.incr_by(&key, -amount_cents).await {
                Ok(restored) => {
                    tracing::warn!(
                        attempted_cents = amount_cents,
                        daily_total_cents = restored,
                        limit_cents = self.daily_limit_cents,
                        "Refund rejected: daily spend limit reached"
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        "Failed to roll back over-limit reservation"
                    );
                }
            }
            metrics::record_spend_guard("rejected");
            return false;
        }

        metrics::record_spend_guard("allowed");
        true
    }

    /// The configured cap in cents.
    pub fn daily_limit_cents(&self) -> u64 {
        self.daily_limit_cents
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{CounterStore, InMemoryCounterStore, StoreError, StoreResult};
    use async_trait::async_trait;

    struct FailingStore;

    #[async_trait]
    impl CounterStore for FailingStore {
        async fn get(&self, _key: &str) -> StoreResult<Option<String>> {
            Err(StoreError::Unavailable("connection refused".to_string()))
        }

        async fn incr_by(&self, _key: &str, _delta: i64) -> StoreResult<i64> {
            Err(StoreError::Unavailable("connection refused".to_string()))
        }

        async fn set_max(&self, _key: &str, _floor: i64) -> StoreResult<i64> {
            Err(StoreError::Unavailable("connection refused".to_string()))
        }

        async fn expire(&self, _key: &str, _seconds: u64) -> StoreResult<bool> {
            Err(StoreError::Unavailable("connection refused".to_string()))
        }
    }

    fn guard_with_limit(limit: &str) -> (Arc<InMemoryCounterStore>, SpendLimitGuard) {
        let store = Arc::new(InMemoryCounterStore::new());
        let guard = SpendLimitGuard::new(store.clone(), Some(limit)).unwrap();
        (store, guard)
    }

    async fn counter_value(store: &InMemoryCounterStore) -> i64 {
        store
            .get(&SpendLimitGuard::day_key())
            .await
            .unwrap()
            .map(|v| v.parse().unwrap())
            .unwrap_or(0)
    }

    #[test]
    fn test_default_limit_applied() {
        let store = Arc::new(InMemoryCounterStore::new());
        let guard = SpendLimitGuard::new(store, None).unwrap();
        assert_eq!(guard.daily_limit_cents(), 1_000_000);
    }

    #[tokio::test]
    async fn test_reservations_accumulate_until_limit() {
        let (_, guard) = guard_with_limit("100");

        assert!(guard.check_and_reserve("40").await);
        assert!(guard.check_and_reserve("40").await);
        assert!(!guard.check_and_reserve("40").await);
    }

    #[tokio::test]
    async fn test_crossing_reservation_rolls_back() {
        let (store, guard) = guard_with_limit("100");

        assert!(guard.check_and_reserve("90").await);
        let before = counter_value(&store).await;

        assert!(!guard.check_and_reserve("20").await);
        // No net change from the failed attempt.
        assert_eq!(counter_value(&store).await, before);

        // Budget under the cap is still usable.
        assert!(guard.check_and_reserve("10").await);
    }

    #[tokio::test]
    async fn test_exact_limit_is_allowed() {
        let (_, guard) = guard_with_limit("100");
        assert!(guard.check_and_reserve("100").await);
        assert!(!guard.check_and_reserve("0.01").await);
    }

    #[tokio::test]
    async fn test_concurrent_reservations_bounded_by_limit() {
        let (store, guard) = guard_with_limit("100");
        let guard = Arc::new(guard);

        // 8 concurrent $30 reservations against a $100 cap: at most
        // floor(100/30) = 3 can win.
        let mut handles = Vec::new();
        for _ in 0..8 {
            let guard = guard.clone();
            handles.push(tokio::spawn(
                async move { guard.check_and_reserve("30").await },
            ));
        }

        let mut successes = 0;
        for handle in handles {
            if handle.await.unwrap() {
                successes += 1;
            }
        }

        assert_eq!(successes, 3);
        assert_eq!(counter_value(&store).await, successes * 3000);
    }

    #[tokio::test]
    async fn test_amount_beyond_counter_range_is_rejected() {
        let (store, guard) = guard_with_limit("100");
        // 2^63 cents does not fit the counter's i64 protocol.
        assert!(!guard.check_and_reserve("92233720368547758.08").await);
        assert_eq!(counter_value(&store).await, 0);
    }

    #[tokio::test]
    async fn test_store_failure_degrades_open() {
        let guard = SpendLimitGuard::new(Arc::new(FailingStore), Some("100")).unwrap();
        assert!(guard.check_and_reserve("999999").await);
    }

    #[tokio::test]
    async fn test_sub_cent_amounts_round_before_reserving() {
        let (store, guard) = guard_with_limit("100");
        assert!(guard.check_and_reserve("1.005").await);
        assert_eq!(counter_value(&store).await, 101);
    }
}
