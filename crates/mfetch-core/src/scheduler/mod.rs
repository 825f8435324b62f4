//! Worker pool: claims jobs from the queue and runs the downloader for each.

pub mod execute;
pub mod pool;
pub mod progress;

pub use execute::{execute_job, JobError};
pub use pool::{WorkerContext, WorkerPool};
pub use progress::ProgressThrottle;
