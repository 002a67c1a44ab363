//! users-core - Account Service Core
//!
//! This crate implements the two load-bearing subsystems of the users
//! microservice: a sliding window rate limiter enforced through atomic
//! operations against a Redis-like store, and a compiler turning
//! declarative property filters into full-text search queries with bound
//! parameters. Everything else about the service (transport, sessions,
//! mail, OAuth) lives outside and consumes these through their public
//! types.

pub mod config;
pub mod error;
pub mod ratelimit;
pub mod search;
