//! In-process reservation store.
//!
//! Implements the same window layout and algorithm as the Redis adapter
//! against process-local state. One mutex guards all windows, which gives
//! every operation the required atomicity, including the multi-key
//! set-difference cleanup. Suitable for tests and single-process
//! deployments.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::Result;

use super::store::{ReservationStore, ReserveArgs, WindowReply};

/// One admitted reservation inside a window.
#[derive(Debug, Clone)]
struct Entry {
    token: String,
    at_ms: u64,
}

/// A window of reservations, ordered by admission time.
#[derive(Debug, Default)]
struct Window {
    entries: Vec<Entry>,
}

/// Hard-block state for a key.
#[derive(Debug, Clone, Copy)]
enum Block {
    /// Blocked until the given epoch-ms instant
    Until(u64),
    /// Blocked until explicit cleanup
    Forever,
}

#[derive(Debug, Default)]
struct Shared {
    windows: HashMap<String, Window>,
    blocks: HashMap<String, Block>,
}

/// Reservation store keeping all windows in process memory.
#[derive(Debug, Default)]
pub struct MemoryReservationStore {
    shared: Mutex<Shared>,
}

impl MemoryReservationStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ReservationStore for MemoryReservationStore {
    async fn reserve(
        &self,
        key: &str,
        block_key: &str,
        args: ReserveArgs<'_>,
    ) -> Result<WindowReply> {
        let mut guard = self.shared.lock();
        let shared = &mut *guard;

        // age out entries that left the window
        if args.interval_ms > 0 {
            if let Some(window) = shared.windows.get_mut(key) {
                let cutoff = args.now_ms.saturating_sub(args.interval_ms);
                window.entries.retain(|e| e.at_ms > cutoff);
            }
        }

        let usage = shared
            .windows
            .get(key)
            .map_or(0, |w| w.entries.len() as u32);

        // a standing hard block rejects regardless of occupancy
        match shared.blocks.get(block_key).copied() {
            Some(Block::Forever) => {
                return Ok(rejected(usage, args.limit, 0));
            }
            Some(Block::Until(until)) if until > args.now_ms => {
                return Ok(rejected(usage, args.limit, until));
            }
            Some(Block::Until(_)) => {
                shared.blocks.remove(block_key);
            }
            None => {}
        }

        if usage < args.limit {
            if !args.reserve {
                return Ok(WindowReply {
                    usage,
                    limit: args.limit,
                    token: None,
                    reset_ms: 0,
                });
            }

            shared
                .windows
                .entry(key.to_string())
                .or_default()
                .entries
                .push(Entry {
                    token: args.token.to_string(),
                    at_ms: args.now_ms,
                });
            return Ok(WindowReply {
                usage: usage + 1,
                limit: args.limit,
                token: Some(args.token.to_string()),
                reset_ms: 0,
            });
        }

        // saturated: a rejected reservation engages the hard block, a
        // probe only projects when the window frees up
        let reset_ms = if args.reserve {
            if args.block_interval_ms > 0 {
                let until = args.now_ms + args.block_interval_ms;
                shared.blocks.insert(block_key.to_string(), Block::Until(until));
                until
            } else {
                shared.blocks.insert(block_key.to_string(), Block::Forever);
                0
            }
        } else {
            window_reset(shared, key, args)
        };

        Ok(rejected(usage, args.limit, reset_ms))
    }

    async fn cancel(&self, key: &str, token: &str) -> Result<()> {
        let mut guard = self.shared.lock();
        if let Some(window) = guard.windows.get_mut(key) {
            window.entries.retain(|e| e.token != token);
        }
        Ok(())
    }

    async fn cleanup(&self, key: &str, block_key: &str, extra_keys: &[&str]) -> Result<()> {
        let mut guard = self.shared.lock();
        let shared = &mut *guard;

        let tokens: HashSet<String> = shared
            .windows
            .remove(key)
            .map(|w| w.entries.into_iter().map(|e| e.token).collect())
            .unwrap_or_default();

        if !tokens.is_empty() {
            for extra in extra_keys {
                if let Some(window) = shared.windows.get_mut(*extra) {
                    window.entries.retain(|e| !tokens.contains(&e.token));
                }
            }
        }

        shared.blocks.remove(block_key);
        Ok(())
    }
}

fn rejected(usage: u32, limit: u32, reset_ms: u64) -> WindowReply {
    WindowReply {
        usage,
        limit,
        token: None,
        reset_ms,
    }
}

/// Project the instant at which the oldest entry ages out of the window.
/// `0` when the window never ages out.
fn window_reset(shared: &Shared, key: &str, args: ReserveArgs<'_>) -> u64 {
    if args.interval_ms == 0 {
        return 0;
    }

    let oldest = shared
        .windows
        .get(key)
        .and_then(|w| w.entries.iter().map(|e| e.at_ms).min());

    match oldest {
        // never 0, so the forever sentinel stays unambiguous
        Some(at_ms) => (at_ms + args.interval_ms).max(args.now_ms + 1),
        None => 0,
    }
}
