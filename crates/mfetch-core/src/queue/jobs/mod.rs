//! Job operations on the queue: reads, claim/transition writes, retention.

mod read;
mod retention;
mod write;

pub use write::STALLED_ERROR;
