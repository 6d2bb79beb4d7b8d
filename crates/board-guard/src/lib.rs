//! Login throttling, device fingerprinting and input checks.
//!
//! Nothing in here touches the network or a database directly: the rate
//! limiter talks to storage through [`rate_limit::AttemptStore`].

pub mod fingerprint;
pub mod rate_limit;
pub mod sanitize;

pub use fingerprint::Fingerprint;
pub use rate_limit::{AttemptStore, RateLimitPolicy, RateLimiter};
