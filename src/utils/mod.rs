// src/utils/mod.rs

//! Shared building blocks: request spacing and retry backoff.

pub mod backoff;
pub mod rate_limit;

pub use backoff::BackoffPolicy;
pub use rate_limit::RateLimiter;
