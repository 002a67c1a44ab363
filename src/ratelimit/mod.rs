//! Sliding window rate limiting over an external atomic store.

mod limiter;
mod login;
mod memory;
mod redis;
mod store;

pub use limiter::{Reservation, SlidingWindowLimiter, WindowStatus, STATUS_FOREVER};
pub use login::{LoginAttempt, LoginRateLimiter, LoginThrottleStatus};
pub use memory::MemoryReservationStore;
pub use redis::RedisReservationStore;
pub use store::{ReservationStore, ReserveArgs, WindowReply};
