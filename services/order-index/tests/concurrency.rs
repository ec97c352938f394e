//! Concurrency test
//!
//! Many callers share one engine handle. Writers on different pairs and
//! readers on the same pair interleave freely; committed state stays
//! consistent and readers never observe a half-written order.

mod common;

use std::sync::Arc;

use common::{memory_index, order, token};
use order_index::EngineError;
use tokio::sync::Barrier;
use types::ids::OrderId;
use types::page::Page;

const WRITERS: usize = 8;
const ORDERS_PER_WRITER: usize = 50;

fn rate_for(writer: usize, i: usize) -> String {
    format!("{}.{:02}", 1 + (i % 7), writer)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallel_writers_and_readers() {
    let (index, backend) = memory_index();
    index.add_pair(&token("A"), &token("B")).await.unwrap();

    let mut handles = Vec::new();
    for writer in 0..WRITERS {
        let index = index.clone();
        handles.push(tokio::spawn(async move {
            for i in 0..ORDERS_PER_WRITER {
                let id = format!("w{writer}-{i:03}");
                let o = order(&id, &format!("maker{writer}"), ("A", "B"), &rate_for(writer, i), "100", "1");
                index.add_order(&o).await.unwrap();
            }
        }));
    }

    // Readers: every order they see must be complete and well formed
    for _ in 0..4 {
        let index = index.clone();
        handles.push(tokio::spawn(async move {
            for _ in 0..50 {
                match index.get_order_with_max_rate(&token("A"), &token("B")).await {
                    Ok(best) => {
                        assert_eq!(best.max_volume.to_string(), "100");
                        assert!(best.rate.is_positive());
                    }
                    Err(EngineError::NoOrdersForPair { .. }) => {}
                    Err(other) => panic!("unexpected read error: {other}"),
                }
                let page = index
                    .list_min_rate_orders(&token("A"), &token("B"), Page::first(5))
                    .await
                    .unwrap();
                assert!(page.windows(2).all(|w| w[0].rate.as_decimal() <= w[1].rate.as_decimal()));
                tokio::task::yield_now().await;
            }
        }));
    }

    for handle in handles {
        handle.await.unwrap();
    }

    let all = index.list_orders_by_pair(&token("A"), &token("B"), Page::all()).await.unwrap();
    assert_eq!(all.len(), WRITERS * ORDERS_PER_WRITER);
    backend.verify_consistency().await.unwrap();

    // Highest rate is 7.xx; writer 7 has the largest fraction
    let best = index.get_order_with_max_rate(&token("A"), &token("B")).await.unwrap();
    assert_eq!(best.rate.to_string(), "7.07");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_racing_removes_of_one_order() {
    let (index, backend) = memory_index();
    index.add_pair(&token("A"), &token("B")).await.unwrap();
    index.add_order(&order("contested", "m", ("A", "B"), "2", "3", "1")).await.unwrap();

    let racers = 6;
    let barrier = Arc::new(Barrier::new(racers));
    let mut handles = Vec::new();
    for _ in 0..racers {
        let index = index.clone();
        let barrier = barrier.clone();
        handles.push(tokio::spawn(async move {
            barrier.wait().await;
            index.remove_order(&OrderId::from("contested")).await
        }));
    }

    let mut winners = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(()) => winners += 1,
            Err(EngineError::OrderNotFound { .. }) | Err(EngineError::BackendConflict { .. }) => {}
            Err(other) => panic!("unexpected error: {other}"),
        }
    }
    assert_eq!(winners, 1);
    assert_eq!(backend.order_count().await, 0);
    backend.verify_consistency().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_pair_removal_is_all_or_nothing_for_readers() {
    let (index, backend) = memory_index();
    index.add_pair(&token("A"), &token("B")).await.unwrap();
    for i in 0..100 {
        let id = format!("o{i:03}");
        let pair = if i % 2 == 0 { ("A", "B") } else { ("B", "A") };
        index.add_order(&order(&id, "m", pair, "1", "1", "0")).await.unwrap();
    }

    let reader = {
        let index = index.clone();
        tokio::spawn(async move {
            for _ in 0..100 {
                let forward = index.list_orders_by_pair(&token("A"), &token("B"), Page::all()).await.unwrap();
                // A reader sees the full pair or nothing at all
                assert!(forward.is_empty() || forward.len() == 50, "saw {} orders", forward.len());
                tokio::task::yield_now().await;
            }
        })
    };

    let removed = index.remove_pair(&token("A"), &token("B")).await.unwrap();
    assert_eq!(removed, 100);
    reader.await.unwrap();
    backend.verify_consistency().await.unwrap();
}
