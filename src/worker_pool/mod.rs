//! Fixed-size pool of long-lived browser tabs.
//!
//! A worker is one tab plus the right to run extraction scripts in it.
//! `acquire` blocks FIFO when every worker is busy and honors the stop
//! signal; `release` wakes the oldest waiter. Dead workers (tab gone)
//! are replaced with a fresh tab on release.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, Mutex};
use tracing::{debug, warn};

use crate::browser::{BrowserHost, TabHandle};
use crate::cancel::StopSignal;
use crate::errors::{BrowserHostError, CrawlError};

/// One long-lived tab checked out of the pool.
#[derive(Debug)]
pub struct Worker {
    pub id: usize,
    tab: TabHandle,
    dead: bool,
    // What the worker was last dispatched to; logged when a dead worker
    // is torn down.
    current_course: Option<String>,
    last_url: Option<String>,
}

impl Worker {
    fn new(id: usize, tab: TabHandle) -> Self {
        Self {
            id,
            tab,
            dead: false,
            current_course: None,
            last_url: None,
        }
    }

    /// Flag the worker's tab as unusable; the pool replaces it on
    /// release.
    pub fn mark_dead(&mut self) {
        self.dead = true;
    }
}

/// Result of [`WorkerPool::acquire`].
#[derive(Debug)]
pub enum Acquired {
    Worker(Worker),
    /// The stop signal fired or the pool was destroyed while waiting.
    Cancelled,
}

/// Result of one `navigate + run` cycle.
#[derive(Debug)]
pub enum RunOutcome {
    /// The script returned a value.
    Value(serde_json::Value),
    /// The page was torn down mid-run (frame removed). Non-fatal.
    Detached,
    /// The wall-clock budget elapsed. `restartable` marks file/download
    /// URLs, whose hangs poison the whole window.
    Timeout { restartable: bool },
}

struct PoolInner {
    idle: VecDeque<Worker>,
    waiters: VecDeque<oneshot::Sender<Worker>>,
    destroyed: bool,
}

/// Fixed-size set of reusable workers over one [`BrowserHost`] window.
pub struct WorkerPool {
    host: Arc<dyn BrowserHost>,
    inner: Mutex<PoolInner>,
    stop: StopSignal,
    settle_delay: Duration,
    run_timeout: Duration,
    next_worker_id: AtomicUsize,
}

impl WorkerPool {
    /// Create `size` fresh tabs in the already-open scraping window.
    pub async fn start(
        host: Arc<dyn BrowserHost>,
        size: usize,
        settle_delay: Duration,
        run_timeout: Duration,
        stop: StopSignal,
    ) -> Result<Arc<Self>, CrawlError> {
        let mut idle = VecDeque::with_capacity(size);
        for id in 0..size {
            let tab = host
                .create_tab()
                .await
                .map_err(|e| CrawlError::WindowCreation(e.to_string()))?;
            idle.push_back(Worker::new(id, tab));
        }
        debug!("worker pool started with {size} workers");
        Ok(Arc::new(Self {
            host,
            inner: Mutex::new(PoolInner {
                idle,
                waiters: VecDeque::new(),
                destroyed: false,
            }),
            stop,
            settle_delay,
            run_timeout,
            next_worker_id: AtomicUsize::new(size),
        }))
    }

    /// Check a worker out, blocking FIFO behind earlier waiters when all
    /// are busy.
    pub async fn acquire(&self) -> Acquired {
        if self.stop.is_stopped() {
            return Acquired::Cancelled;
        }
        let rx = {
            let mut inner = self.inner.lock().await;
            if inner.destroyed {
                return Acquired::Cancelled;
            }
            if let Some(worker) = inner.idle.pop_front() {
                return Acquired::Worker(worker);
            }
            let (tx, rx) = oneshot::channel();
            inner.waiters.push_back(tx);
            rx
        };
        tokio::select! {
            biased;
            res = rx => match res {
                Ok(worker) => Acquired::Worker(worker),
                Err(_) => Acquired::Cancelled,
            },
            _ = self.stop.cancelled() => Acquired::Cancelled,
        }
    }

    /// Return a worker. Dead workers are replaced by a fresh tab first;
    /// the oldest live waiter gets the worker, otherwise it goes idle.
    pub async fn release(&self, mut worker: Worker) {
        if worker.dead {
            warn!(
                "closing dead worker {} (course {}, last url {})",
                worker.id,
                worker.current_course.as_deref().unwrap_or("-"),
                worker.last_url.as_deref().unwrap_or("-"),
            );
            let _ = self.host.close_tab(&worker.tab).await;
            match self.host.create_tab().await {
                Ok(tab) => {
                    let id = self.next_worker_id.fetch_add(1, Ordering::Relaxed);
                    debug!("replaced dead worker {} with worker {id}", worker.id);
                    worker = Worker::new(id, tab);
                }
                Err(e) => {
                    warn!("could not replace dead worker {}: {e}", worker.id);
                    return;
                }
            }
        }
        worker.current_course = None;

        let mut inner = self.inner.lock().await;
        if inner.destroyed {
            drop(inner);
            let _ = self.host.close_tab(&worker.tab).await;
            return;
        }
        while let Some(waiter) = inner.waiters.pop_front() {
            match waiter.send(worker) {
                Ok(()) => return,
                Err(returned) => worker = returned,
            }
        }
        inner.idle.push_back(worker);
    }

    /// Navigate the worker's tab and run one extraction script, all
    /// under a single wall-clock budget measured from navigate start.
    pub async fn navigate_and_run(
        &self,
        worker: &mut Worker,
        url: &str,
        course_id: &str,
        script: &str,
        arg: serde_json::Value,
        is_file_url: bool,
    ) -> Result<RunOutcome, BrowserHostError> {
        worker.current_course = Some(course_id.to_string());
        worker.last_url = Some(url.to_string());
        let tab = worker.tab;

        let attempt = async {
            self.host.set_non_discardable(&tab).await?;
            self.host.navigate(&tab, url).await?;
            self.host.wait_for_load(&tab).await?;
            tokio::time::sleep(self.settle_delay).await;
            self.host.run_script(&tab, script, arg).await
        };

        match tokio::time::timeout(self.run_timeout, attempt).await {
            Ok(Ok(value)) => Ok(RunOutcome::Value(value)),
            Ok(Err(e)) if e.is_frame_detached() => {
                debug!("frame detached mid-run for {url}: {e}");
                Ok(RunOutcome::Detached)
            }
            Ok(Err(e)) => {
                if e.is_tab_dead() {
                    worker.mark_dead();
                }
                Err(e)
            }
            Err(_) => Ok(RunOutcome::Timeout {
                restartable: is_file_url,
            }),
        }
    }

    /// Close every idle tab and wake every waiter with cancellation.
    /// Idempotent; checked-out workers are closed when released.
    pub async fn destroy_all(&self) {
        let (workers, waiters) = {
            let mut inner = self.inner.lock().await;
            inner.destroyed = true;
            (
                inner.idle.drain(..).collect::<Vec<_>>(),
                inner.waiters.drain(..).collect::<Vec<_>>(),
            )
        };
        drop(waiters);
        for worker in workers {
            let _ = self.host.close_tab(&worker.tab).await;
        }
        debug!("worker pool destroyed");
    }
}
