//! Retry and backoff policy.
//!
//! Every failed attempt is treated alike: there is no error classification,
//! only an attempt cap and an exponential delay between attempts.

mod policy;

pub use policy::{RetryDecision, RetryPolicy};
