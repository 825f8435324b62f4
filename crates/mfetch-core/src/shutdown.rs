//! Shutdown signalling shared by the long-running loops.
//!
//! A `watch::Sender<bool>` owned by the caller flips to `true` to stop
//! everything; dropping the sender counts as a stop request too.

use tokio::sync::watch;

pub fn channel() -> (watch::Sender<bool>, watch::Receiver<bool>) {
    watch::channel(false)
}

pub fn is_requested(rx: &watch::Receiver<bool>) -> bool {
    *rx.borrow() || rx.has_changed().is_err()
}

/// Resolves once a stop has been requested.
pub async fn requested(rx: &mut watch::Receiver<bool>) {
    let _ = rx.wait_for(|stop| *stop).await;
}
