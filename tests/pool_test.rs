//! Worker pool semantics: FIFO waiters, cancellation, dead-worker
//! replacement, idempotent destruction.

mod common;

use std::collections::HashMap;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use common::MockHost;
use coursescrape::browser::BrowserHost;
use coursescrape::{Acquired, StopSignal, WorkerPool};

async fn pool_of(host: &Arc<MockHost>, size: usize, stop: StopSignal) -> Arc<WorkerPool> {
    host.open_window().await.expect("window");
    WorkerPool::start(
        host.clone() as Arc<dyn BrowserHost>,
        size,
        Duration::ZERO,
        Duration::from_secs(5),
        stop,
    )
    .await
    .expect("pool")
}

#[tokio::test]
async fn waiters_are_served_in_fifo_order() {
    let host = MockHost::new(HashMap::new());
    let (_handle, stop) = StopSignal::new_pair();
    let pool = pool_of(&host, 1, stop).await;

    let held = match pool.acquire().await {
        Acquired::Worker(worker) => worker,
        Acquired::Cancelled => panic!("pool should have a worker"),
    };

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    for i in 0..3u32 {
        let pool = Arc::clone(&pool);
        let tx = tx.clone();
        tokio::spawn(async move {
            // Stagger arrivals so waiter order is deterministic.
            tokio::time::sleep(Duration::from_millis(20 * u64::from(i) + 5)).await;
            if let Acquired::Worker(worker) = pool.acquire().await {
                tx.send(i).expect("send");
                pool.release(worker).await;
            }
        });
    }

    tokio::time::sleep(Duration::from_millis(120)).await;
    pool.release(held).await;

    assert_eq!(rx.recv().await, Some(0));
    assert_eq!(rx.recv().await, Some(1));
    assert_eq!(rx.recv().await, Some(2));
}

#[tokio::test]
async fn stop_signal_cancels_a_blocked_acquire() {
    let host = MockHost::new(HashMap::new());
    let (handle, stop) = StopSignal::new_pair();
    let pool = pool_of(&host, 1, stop).await;

    let _held = match pool.acquire().await {
        Acquired::Worker(worker) => worker,
        Acquired::Cancelled => panic!("pool should have a worker"),
    };

    let blocked = {
        let pool = Arc::clone(&pool);
        tokio::spawn(async move { pool.acquire().await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    handle.stop();

    match blocked.await.expect("join") {
        Acquired::Cancelled => {}
        Acquired::Worker(_) => panic!("stop must cancel the blocked acquire"),
    }
}

#[tokio::test]
async fn destroy_all_wakes_waiters_and_is_idempotent() {
    let host = MockHost::new(HashMap::new());
    let (_handle, stop) = StopSignal::new_pair();
    let pool = pool_of(&host, 1, stop).await;

    let held = match pool.acquire().await {
        Acquired::Worker(worker) => worker,
        Acquired::Cancelled => panic!("pool should have a worker"),
    };
    let blocked = {
        let pool = Arc::clone(&pool);
        tokio::spawn(async move { pool.acquire().await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;

    pool.destroy_all().await;
    pool.destroy_all().await;

    match blocked.await.expect("join") {
        Acquired::Cancelled => {}
        Acquired::Worker(_) => panic!("destroyed pool must cancel waiters"),
    }

    // Releasing into a destroyed pool closes the tab instead of parking it.
    pool.release(held).await;
    assert_eq!(host.live_tabs(), 0);
}

#[tokio::test]
async fn dead_workers_are_replaced_with_fresh_tabs() {
    let host = MockHost::new(HashMap::new());
    let (_handle, stop) = StopSignal::new_pair();
    let pool = pool_of(&host, 1, stop).await;

    let mut worker = match pool.acquire().await {
        Acquired::Worker(worker) => worker,
        Acquired::Cancelled => panic!("pool should have a worker"),
    };
    let old_id = worker.id;
    worker.mark_dead();
    pool.release(worker).await;

    let replacement = match pool.acquire().await {
        Acquired::Worker(worker) => worker,
        Acquired::Cancelled => panic!("pool should have a replacement worker"),
    };
    assert_ne!(replacement.id, old_id);
    assert_eq!(host.tabs_created.load(Ordering::SeqCst), 2);
    assert_eq!(host.live_tabs(), 1);
    pool.release(replacement).await;
}
