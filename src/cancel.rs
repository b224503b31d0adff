//! Cooperative cancellation signal.
//!
//! A crawl is stopped by signalling an object, not by flipping a shared
//! boolean: the holder of the [`StopHandle`] signals once, and every
//! clone of the paired [`StopSignal`] observes it, including tasks parked
//! inside `workerPool.acquire`.

use tokio::sync::watch;

/// Sending half. Owned by the external driver; stopping is idempotent
/// and final.
#[derive(Debug)]
pub struct StopHandle {
    tx: watch::Sender<bool>,
}

impl StopHandle {
    pub fn stop(&self) {
        let _ = self.tx.send(true);
    }
}

/// Receiving half, cloned into every task that needs to observe
/// cancellation.
#[derive(Debug, Clone)]
pub struct StopSignal {
    rx: watch::Receiver<bool>,
}

impl StopSignal {
    /// Create a connected handle/signal pair.
    #[must_use]
    pub fn new_pair() -> (StopHandle, StopSignal) {
        let (tx, rx) = watch::channel(false);
        (StopHandle { tx }, StopSignal { rx })
    }

    /// A signal that can never fire. Useful for fire-and-forget crawls.
    #[must_use]
    pub fn never() -> StopSignal {
        let (tx, rx) = watch::channel(false);
        // Leak the sender so the channel stays open forever.
        std::mem::forget(tx);
        StopSignal { rx }
    }

    #[must_use]
    pub fn is_stopped(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once `stop()` has been called. Never resolves spuriously:
    /// if the handle is dropped without stopping, this pends forever.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        loop {
            if *rx.borrow() {
                return;
            }
            if rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}
