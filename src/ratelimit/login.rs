//! Login attempt throttling.
//!
//! Two sliding windows apply to every login attempt: a global per-IP window
//! shared across all accounts, and a narrower per-account window keyed by
//! `(user, ip)`. The same token is reserved in both so that clearing the
//! per-account window can also drop its tokens from the global index.

use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::config::UserLoginConfig;
use crate::error::Result;

use super::limiter::{SlidingWindowLimiter, WindowStatus};
use super::store::ReservationStore;

/// Key prefix of the global per-IP window.
const IP_KEY_PREFIX: &str = "gl!ip!ctr";

/// A reservation held in both login windows for one attempt.
#[derive(Debug, Clone)]
pub struct LoginAttempt {
    /// The token occupying both windows
    pub token: String,
    ip_key: String,
    user_key: String,
}

/// Throttles login attempts per IP and per account.
pub struct LoginRateLimiter {
    ip: Option<SlidingWindowLimiter>,
    user_ip: Option<SlidingWindowLimiter>,
}

impl LoginRateLimiter {
    /// Create a login rate limiter.
    ///
    /// With `config.enabled == false` every operation becomes a no-op and
    /// all attempts are admitted.
    pub fn new(store: Arc<dyn ReservationStore>, config: &UserLoginConfig) -> Result<Self> {
        if !config.enabled {
            return Ok(Self {
                ip: None,
                user_ip: None,
            });
        }

        Ok(Self {
            ip: Some(SlidingWindowLimiter::new(Arc::clone(&store), &config.ip)?),
            user_ip: Some(SlidingWindowLimiter::new(store, &config.user_ip)?),
        })
    }

    /// Reserve one attempt for `user` from `ip`.
    ///
    /// Reserves in the global window first, then in the per-account window.
    /// A per-account rejection rolls the global reservation back so the
    /// rejected attempt is not double-counted, and the rate-limit error is
    /// returned unchanged.
    pub async fn reserve(&self, user: &str, ip: &str) -> Result<LoginAttempt> {
        let attempt = LoginAttempt {
            token: Uuid::new_v4().to_string(),
            ip_key: ip_key(ip),
            user_key: user_ip_key(user, ip),
        };

        if let Some(limiter) = &self.ip {
            limiter.reserve(&attempt.ip_key, &attempt.token).await?;
        }

        if let Some(limiter) = &self.user_ip {
            if let Err(err) = limiter.reserve(&attempt.user_key, &attempt.token).await {
                if let Some(ip_limiter) = &self.ip {
                    ip_limiter.cancel(&attempt.ip_key, &attempt.token).await?;
                }
                return Err(err);
            }
        }

        Ok(attempt)
    }

    /// Roll back a speculative attempt, e.g. when the account turned out
    /// not to exist and the attempt should not count.
    pub async fn cancel(&self, attempt: &LoginAttempt) -> Result<()> {
        if let Some(limiter) = &self.user_ip {
            limiter.cancel(&attempt.user_key, &attempt.token).await?;
        }
        if let Some(limiter) = &self.ip {
            limiter.cancel(&attempt.ip_key, &attempt.token).await?;
        }
        Ok(())
    }

    /// Clear the per-account lock after a successful login.
    ///
    /// Drops the `(user, ip)` window wholesale and removes its tokens from
    /// the global per-IP window, so past failures by the now-authenticated
    /// user no longer count against the address.
    pub async fn clear(&self, user: &str, ip: &str) -> Result<()> {
        let Some(limiter) = &self.user_ip else {
            return Ok(());
        };

        debug!(user = %user, ip = %ip, "Clearing login throttle");
        limiter
            .cleanup(&user_ip_key(user, ip), &[&ip_key(ip)])
            .await
    }

    /// Report occupancy of both windows without reserving.
    pub async fn check(&self, user: &str, ip: &str) -> Result<LoginThrottleStatus> {
        let ip_status = match &self.ip {
            Some(limiter) => Some(limiter.check(&ip_key(ip)).await?),
            None => None,
        };
        let user_status = match &self.user_ip {
            Some(limiter) => Some(limiter.check(&user_ip_key(user, ip)).await?),
            None => None,
        };

        Ok(LoginThrottleStatus {
            ip: ip_status,
            user_ip: user_status,
        })
    }
}

/// Occupancy of the two login windows.
#[derive(Debug, Clone, Copy)]
pub struct LoginThrottleStatus {
    /// Global per-IP window, `None` when disabled
    pub ip: Option<WindowStatus>,
    /// Per-account window, `None` when disabled
    pub user_ip: Option<WindowStatus>,
}

fn ip_key(ip: &str) -> String {
    format!("{}!{}", IP_KEY_PREFIX, ip)
}

fn user_ip_key(user: &str, ip: &str) -> String {
    format!("{}!ip!ctr!{}", user, ip)
}
