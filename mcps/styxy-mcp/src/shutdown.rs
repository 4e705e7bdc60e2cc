//! Process termination handling
//!
//! The singleton lock is released when the process actually stops: on normal
//! return, on SIGINT/SIGTERM, and when a panic unwinds out of `main` and drops
//! the [`ShutdownHooks`] guard. A panic that tokio catches inside a task does
//! not stop the process and leaves the lock held. Abrupt exits are covered by
//! the kernel dropping the lock file's `flock`.

use std::sync::Arc;

use tracing::info;

use crate::singleton::SingletonLock;

/// Guard owning the release of `lock`; dropping it releases the lock
#[must_use = "dropping the guard releases the lock immediately"]
pub struct ShutdownHooks {
    lock: Arc<SingletonLock>,
}

impl ShutdownHooks {
    pub fn new(lock: Arc<SingletonLock>) -> Self {
        Self { lock }
    }

    /// Release now; later calls and the drop are no-ops
    pub fn release(&self) {
        self.lock.release();
    }

    /// Wait for SIGINT or SIGTERM, then release the lock
    pub async fn release_on_signal(&self) -> &'static str {
        let name = shutdown_signal().await;
        self.release();
        name
    }
}

impl Drop for ShutdownHooks {
    fn drop(&mut self) {
        self.lock.release();
    }
}

/// Resolves when SIGINT or SIGTERM arrives, yielding the signal name
pub async fn shutdown_signal() -> &'static str {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Failed to listen for SIGINT: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let name = tokio::select! {
        _ = ctrl_c => "SIGINT",
        _ = terminate => "SIGTERM",
    };
    info!("Received {}, shutting down", name);
    name
}
