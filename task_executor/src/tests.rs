// Copyright 2026 action-engine contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::*;

#[tokio::test]
async fn pool_bounds_concurrency() {
    let pool = WorkerPool::new("test", 2);
    let concurrent = Arc::new(AtomicUsize::new(0));
    let max_seen = Arc::new(AtomicUsize::new(0));

    let mut handles = Vec::new();
    for _ in 0..6 {
        let pool = pool.clone();
        let concurrent = concurrent.clone();
        let max_seen = max_seen.clone();
        handles.push(tokio::spawn(async move {
            pool.run(Priority::Normal, async {
                let now = concurrent.fetch_add(1, Ordering::SeqCst) + 1;
                max_seen.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(20)).await;
                concurrent.fetch_sub(1, Ordering::SeqCst);
            })
            .await;
        }));
    }
    for h in handles {
        h.await.unwrap();
    }

    assert!(max_seen.load(Ordering::SeqCst) <= 2);
}

#[tokio::test]
async fn high_priority_admitted_before_queued_normal() {
    let pool = WorkerPool::new("test", 1);
    // Occupy the only slot.
    let order = Arc::new(Mutex::new(Vec::new()));
    let hold = pool.clone();
    let order_hold = order.clone();
    let holder = tokio::spawn(async move {
        hold.run(Priority::Normal, async move {
            order_hold.lock().push("holder-start");
            tokio::time::sleep(Duration::from_millis(30)).await;
        })
        .await;
    });
    tokio::time::sleep(Duration::from_millis(5)).await;

    let normal_pool = pool.clone();
    let order_normal = order.clone();
    let normal = tokio::spawn(async move {
        normal_pool
            .run(Priority::Normal, async move {
                order_normal.lock().push("normal");
            })
            .await;
    });
    tokio::time::sleep(Duration::from_millis(5)).await;

    let high_pool = pool.clone();
    let order_high = order.clone();
    let high = tokio::spawn(async move {
        high_pool
            .run(Priority::High, async move {
                order_high.lock().push("high");
            })
            .await;
    });

    holder.await.unwrap();
    normal.await.unwrap();
    high.await.unwrap();

    let order = order.lock().clone();
    let high_pos = order.iter().position(|s| *s == "high").unwrap();
    let normal_pos = order.iter().position(|s| *s == "normal").unwrap();
    assert!(high_pos < normal_pos, "order was {order:?}");
}

#[tokio::test]
async fn background_queue_drains_before_timeout() {
    let executor = Executor::new();
    let queue = BackgroundQueue::new();
    let done = Arc::new(AtomicUsize::new(0));

    for _ in 0..5 {
        let done = done.clone();
        queue.submit(&executor, async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            done.fetch_add(1, Ordering::SeqCst);
        });
    }

    queue.drain(Duration::from_secs(1)).await;
    assert_eq!(done.load(Ordering::SeqCst), 5);
}

#[tokio::test]
async fn background_queue_aborts_on_timeout() {
    let executor = Executor::new();
    let queue = BackgroundQueue::new();
    queue.submit(&executor, async move {
        tokio::time::sleep(Duration::from_secs(10)).await;
    });
    // Should return promptly rather than waiting out the full sleep.
    let start = std::time::Instant::now();
    queue.drain(Duration::from_millis(20)).await;
    assert!(start.elapsed() < Duration::from_secs(1));
}
