//! Reservation store trait for abstracting the atomic window storage.

use async_trait::async_trait;

use crate::error::Result;

/// Arguments for a single reserve/check round-trip.
#[derive(Debug, Clone, Copy)]
pub struct ReserveArgs<'a> {
    /// Current time, epoch milliseconds
    pub now_ms: u64,
    /// Window span in milliseconds, `0` = entries never age out
    pub interval_ms: u64,
    /// Maximum reservations admitted within the window
    pub limit: u32,
    /// `true` to reserve, `false` for a non-mutating probe
    pub reserve: bool,
    /// Token identifying this reservation attempt (empty for probes)
    pub token: &'a str,
    /// Hard-block span engaged on rejection, milliseconds, `0` = forever
    pub block_interval_ms: u64,
}

/// Outcome of a reserve/check round-trip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowReply {
    /// Entries currently occupying the window
    pub usage: u32,
    /// The configured limit, echoed back
    pub limit: u32,
    /// The reserved token, `None` when rejected or probing
    pub token: Option<String>,
    /// Epoch-ms instant at which the key frees up, `0` = blocked forever
    /// (or nothing to wait for when the window is not saturated)
    pub reset_ms: u64,
}

/// Trait for reservation store implementations.
///
/// Each operation must be indivisible from the store's perspective: two
/// concurrent `reserve` calls on the same key must never both be admitted
/// past the limit. Implementations achieve this with server-side scripts
/// (Redis) or a process-wide lock (in-memory).
///
/// Hard-block bookkeeping lives under a sibling `block_key` derived from the
/// window key by the limiter, so that all adapters agree on the layout.
#[async_trait]
pub trait ReservationStore: Send + Sync {
    /// Age out expired entries, then either admit the token into the window
    /// or report the rejection. With `args.reserve == false` this is a pure
    /// probe and never mutates the window or engages a block.
    async fn reserve(
        &self,
        key: &str,
        block_key: &str,
        args: ReserveArgs<'_>,
    ) -> Result<WindowReply>;

    /// Remove exactly the entry matching `token` from the window for `key`.
    /// Removing an absent token is a no-op.
    async fn cancel(&self, key: &str, token: &str) -> Result<()>;

    /// Delete the window for `key` wholesale, clear its hard block, and
    /// remove the tokens it contained from every key in `extra_keys`.
    async fn cleanup(&self, key: &str, block_key: &str, extra_keys: &[&str]) -> Result<()>;
}
