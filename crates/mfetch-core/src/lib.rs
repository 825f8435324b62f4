//! mfetch core: durable download queue, yt-dlp worker pool, retention sweeper
//! and the submission/status façade on top of them.

pub mod config;
pub mod logging;
pub mod naming;
pub mod process;
pub mod queue;
pub mod retry;
pub mod scheduler;
pub mod service;
pub mod shutdown;
pub mod sweeper;
