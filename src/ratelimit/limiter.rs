//! Sliding window rate limiter implementation.
//!
//! The limiter holds no window state of its own: every decision is a single
//! atomic round-trip against a [`ReservationStore`], so concurrent callers
//! across processes observe a consistent count.

use std::sync::Arc;
use tracing::{debug, trace};

use crate::config::WindowSettings;
use crate::error::{Result, UsersCoreError};

use super::store::{ReservationStore, ReserveArgs, WindowReply};

/// Sentinel `reset` value meaning the key is blocked with no defined expiry
/// and requires explicit cleanup to clear.
pub const STATUS_FOREVER: u64 = 0;

/// Suffix appended to a window key to derive its hard-block marker key.
const BLOCK_KEY_SUFFIX: &str = ":block";

/// A successfully admitted reservation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reservation {
    /// The token now occupying the window
    pub token: String,
    /// Window occupancy including this reservation
    pub usage: u32,
    /// The configured window limit
    pub limit: u32,
}

/// Current occupancy of a window, as reported by a non-mutating probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowStatus {
    /// Entries currently occupying the window
    pub usage: u32,
    /// The configured window limit
    pub limit: u32,
    /// Epoch-ms instant at which the key frees up; `0` when nothing is
    /// pending, or [`STATUS_FOREVER`] while hard-blocked without expiry
    pub reset: u64,
}

/// Sliding window rate limiter backed by an external atomic store.
pub struct SlidingWindowLimiter {
    /// Store handle providing the atomic reserve/cancel/cleanup operations
    store: Arc<dyn ReservationStore>,
    /// Window span in milliseconds
    interval_ms: u64,
    /// Hard-block span in milliseconds
    block_interval_ms: u64,
    /// Maximum reservations admitted within the window
    limit: u32,
}

impl SlidingWindowLimiter {
    /// Create a new sliding window limiter.
    ///
    /// `settings.interval` and `settings.block_interval` are seconds and are
    /// converted to milliseconds internally. `block_interval` defaults to
    /// `interval` when not set. Fails when `attempts` is zero or an interval
    /// does not fit the millisecond range.
    pub fn new(store: Arc<dyn ReservationStore>, settings: &WindowSettings) -> Result<Self> {
        if settings.attempts == 0 {
            return Err(UsersCoreError::Config("`attempts` is invalid".into()));
        }

        let interval_ms = settings
            .interval
            .checked_mul(1000)
            .ok_or_else(|| UsersCoreError::Config("`interval` is invalid".into()))?;
        let block_interval_ms = settings
            .block_interval
            .unwrap_or(settings.interval)
            .checked_mul(1000)
            .ok_or_else(|| UsersCoreError::Config("`block_interval` is invalid".into()))?;

        Ok(Self {
            store,
            interval_ms,
            block_interval_ms,
            limit: settings.attempts,
        })
    }

    /// Try to reserve `token` within the window for `key`.
    ///
    /// Returns the admitted reservation, or
    /// [`UsersCoreError::RateLimit`] when the window is saturated or the key
    /// is hard-blocked. The error carries the epoch-ms `reset` hint
    /// ([`STATUS_FOREVER`] when blocked without expiry).
    pub async fn reserve(&self, key: &str, token: &str) -> Result<Reservation> {
        ensure_not_empty(key, "key")?;
        ensure_not_empty(token, "token")?;

        let reply = self.round_trip(key, true, token).await?;

        match reply.token {
            Some(token) => {
                trace!(
                    key = %key,
                    usage = reply.usage,
                    limit = reply.limit,
                    "Reservation admitted"
                );
                Ok(Reservation {
                    token,
                    usage: reply.usage,
                    limit: reply.limit,
                })
            }
            None => {
                debug!(
                    key = %key,
                    usage = reply.usage,
                    limit = reply.limit,
                    reset = reply.reset_ms,
                    "Reservation rejected"
                );
                Err(UsersCoreError::RateLimit {
                    reset: reply.reset_ms,
                    limit: reply.limit,
                })
            }
        }
    }

    /// Probe the window for `key` without reserving.
    ///
    /// Never fails on rate-limit grounds and never engages a hard block;
    /// it only reports current occupancy and the projected reset instant.
    pub async fn check(&self, key: &str) -> Result<WindowStatus> {
        ensure_not_empty(key, "key")?;

        let reply = self.round_trip(key, false, "").await?;

        Ok(WindowStatus {
            usage: reply.usage,
            limit: reply.limit,
            reset: reply.reset_ms,
        })
    }

    /// Cancel a reservation, freeing its slot in the window.
    ///
    /// Cancelling a token that is not present is a no-op.
    pub async fn cancel(&self, key: &str, token: &str) -> Result<()> {
        ensure_not_empty(key, "key")?;
        ensure_not_empty(token, "token")?;

        self.store.cancel(key, token).await
    }

    /// Delete the window for `key` entirely, including any hard block.
    ///
    /// Tokens that were recorded under `key` are also removed from each of
    /// the `extra_keys` windows, so satellite indexes referencing the same
    /// tokens are cleared in the same operation.
    pub async fn cleanup(&self, key: &str, extra_keys: &[&str]) -> Result<()> {
        ensure_not_empty(key, "key")?;

        self.store.cleanup(key, &block_key(key), extra_keys).await
    }

    /// The configured window limit.
    pub fn limit(&self) -> u32 {
        self.limit
    }

    async fn round_trip(&self, key: &str, reserve: bool, token: &str) -> Result<WindowReply> {
        let args = ReserveArgs {
            now_ms: epoch_ms(),
            interval_ms: self.interval_ms,
            limit: self.limit,
            reserve,
            token,
            block_interval_ms: self.block_interval_ms,
        };

        self.store.reserve(key, &block_key(key), args).await
    }
}

/// Derive the hard-block marker key for a window key.
fn block_key(key: &str) -> String {
    format!("{}{}", key, BLOCK_KEY_SUFFIX)
}

fn epoch_ms() -> u64 {
    chrono::Utc::now().timestamp_millis() as u64
}

fn ensure_not_empty(value: &str, name: &str) -> Result<()> {
    if value.is_empty() {
        return Err(UsersCoreError::Config(format!("`{}` is invalid", name)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ratelimit::memory::MemoryReservationStore;
    use futures::future::join_all;

    fn limiter(interval: u64, attempts: u32) -> SlidingWindowLimiter {
        let settings = WindowSettings {
            interval,
            attempts,
            block_interval: None,
        };
        SlidingWindowLimiter::new(Arc::new(MemoryReservationStore::new()), &settings).unwrap()
    }

    #[test]
    fn test_rejects_zero_attempts() {
        let settings = WindowSettings {
            interval: 60,
            attempts: 0,
            block_interval: None,
        };
        let result = SlidingWindowLimiter::new(Arc::new(MemoryReservationStore::new()), &settings);
        assert!(matches!(result, Err(UsersCoreError::Config(_))));
    }

    #[tokio::test]
    async fn test_rejects_empty_key_and_token() {
        let limiter = limiter(60, 1);

        assert!(matches!(
            limiter.reserve("", "t1").await,
            Err(UsersCoreError::Config(_))
        ));
        assert!(matches!(
            limiter.reserve("key", "").await,
            Err(UsersCoreError::Config(_))
        ));
        assert!(matches!(
            limiter.check("").await,
            Err(UsersCoreError::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_admits_up_to_limit_then_rejects() {
        let limit = 5;
        let limiter = limiter(60, limit);

        for i in 0..limit {
            let reservation = limiter.reserve("key", &format!("t{}", i)).await.unwrap();
            assert_eq!(reservation.usage, i + 1);
            assert_eq!(reservation.limit, limit);
        }

        let err = limiter.reserve("key", "one-too-many").await.unwrap_err();
        match err {
            UsersCoreError::RateLimit { reset, limit: l } => {
                assert_eq!(l, limit);
                // the window has a defined expiry, so the reset is a real instant
                assert_ne!(reset, STATUS_FOREVER);
            }
            other => panic!("expected RateLimit, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_cancel_frees_capacity() {
        let limiter = limiter(60, 3);

        // reserve/cancel cycles never trip a limit of 3
        for i in 0..10 {
            let token = format!("t{}", i);
            limiter.reserve("key", &token).await.unwrap();
            limiter.cancel("key", &token).await.unwrap();
        }

        let reservation = limiter.reserve("key", "final").await.unwrap();
        assert_eq!(reservation.usage, 1);
    }

    #[tokio::test]
    async fn test_cancel_unknown_token_is_noop() {
        let limiter = limiter(60, 1);
        limiter.cancel("key", "never-reserved").await.unwrap();

        limiter.reserve("key", "t1").await.unwrap();
        limiter.cancel("key", "still-not-there").await.unwrap();

        // the real reservation is untouched
        let status = limiter.check("key").await.unwrap();
        assert_eq!(status.usage, 1);
    }

    #[tokio::test]
    async fn test_check_does_not_mutate() {
        let limiter = limiter(60, 2);

        limiter.reserve("key", "t1").await.unwrap();
        for _ in 0..10 {
            let status = limiter.check("key").await.unwrap();
            assert_eq!(status.usage, 1);
            assert_eq!(status.limit, 2);
        }

        // probing did not consume the remaining slot
        limiter.reserve("key", "t2").await.unwrap();
    }

    #[tokio::test]
    async fn test_check_does_not_engage_block() {
        let limiter = limiter(60, 1);
        limiter.reserve("key", "t1").await.unwrap();

        // saturated, but probes never mark the key blocked
        for _ in 0..3 {
            let status = limiter.check("key").await.unwrap();
            assert_eq!(status.usage, 1);
            assert_ne!(status.reset, STATUS_FOREVER);
        }

        limiter.cancel("key", "t1").await.unwrap();
        limiter.reserve("key", "t2").await.unwrap();
    }

    #[tokio::test]
    async fn test_cleanup_resets_saturation() {
        let limiter = limiter(60, 2);

        limiter.reserve("key", "t1").await.unwrap();
        limiter.reserve("key", "t2").await.unwrap();
        assert!(limiter.reserve("key", "t3").await.is_err());

        limiter.cleanup("key", &[]).await.unwrap();

        let reservation = limiter.reserve("key", "t4").await.unwrap();
        assert_eq!(reservation.usage, 1);
    }

    #[tokio::test]
    async fn test_rejection_engages_hard_block() {
        let limiter = limiter(60, 1);

        limiter.reserve("key", "t1").await.unwrap();
        assert!(limiter.reserve("key", "t2").await.is_err());

        // cancelling the admitted token frees the window, but the hard
        // block from the rejection still rejects new reservations
        limiter.cancel("key", "t1").await.unwrap();
        let err = limiter.reserve("key", "t3").await.unwrap_err();
        assert!(err.is_rate_limited());

        // cleanup clears the block as well
        limiter.cleanup("key", &[]).await.unwrap();
        limiter.reserve("key", "t4").await.unwrap();
    }

    #[tokio::test]
    async fn test_zero_interval_blocks_forever() {
        let limiter = limiter(0, 1);

        limiter.reserve("key", "t1").await.unwrap();
        let err = limiter.reserve("key", "t2").await.unwrap_err();
        match err {
            UsersCoreError::RateLimit { reset, .. } => assert_eq!(reset, STATUS_FOREVER),
            other => panic!("expected RateLimit, got {:?}", other),
        }

        // only explicit cleanup clears a forever block
        limiter.cleanup("key", &[]).await.unwrap();
        limiter.reserve("key", "t3").await.unwrap();
    }

    #[tokio::test]
    async fn test_entries_age_out_of_window() {
        let limiter = limiter(1, 1);

        limiter.reserve("key", "t1").await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(1100)).await;

        // t1 left the window; no rejection ever happened, so no block
        // stands in the way of a fresh reservation
        let reservation = limiter.reserve("key", "t2").await.unwrap();
        assert_eq!(reservation.usage, 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_concurrent_reserves_never_over_admit() {
        for limit in [1u32, 5, 50] {
            let limiter = Arc::new(limiter(60, limit));

            let calls = (0..limit * 2).map(|i| {
                let limiter = Arc::clone(&limiter);
                tokio::spawn(async move {
                    limiter
                        .reserve("contended", &format!("t{}", i))
                        .await
                        .is_ok()
                })
            });

            let outcomes = join_all(calls).await;
            let admitted = outcomes
                .into_iter()
                .filter(|r| *r.as_ref().unwrap())
                .count();
            assert_eq!(admitted as u32, limit, "limit {}", limit);
        }
    }

    #[tokio::test]
    async fn test_separate_keys_have_separate_windows() {
        let limiter = limiter(60, 1);

        limiter.reserve("key-a", "t1").await.unwrap();
        limiter.reserve("key-b", "t1").await.unwrap();

        assert!(limiter.reserve("key-a", "t2").await.is_err());
        assert_eq!(limiter.check("key-b").await.unwrap().usage, 1);
    }
}
