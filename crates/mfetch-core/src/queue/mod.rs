//! Persistent download queue (SQLite via sqlx).
//!
//! Stores one row per job: parameters, state, attempt count, the latest
//! progress snapshot, and the terminal outcome. All state transitions of an
//! active job are conditioned on the claim that produced it, so a stale
//! worker or a late progress write can never overwrite a newer outcome.

pub mod db;
mod jobs;
pub mod types;

pub use db::*;
pub use jobs::STALLED_ERROR;
pub use types::*;
