//! End-to-end behaviour of the order index over the memory backend

mod common;

use common::{ids, memory_index, order, token};
use order_index::EngineError;
use types::errors::{OrderError, PageError};
use types::ids::{MakerId, OrderId};
use types::order::Order;
use types::page::Page;

async fn five_orders() -> order_index::OrderIndex {
    let (index, _) = memory_index();
    index.add_pair(&token("A"), &token("B")).await.unwrap();
    // Insert out of id order; listings must not depend on insertion order
    for id in ["o4", "o2", "o5", "o1", "o3"] {
        index.add_order(&order(id, "m1", ("A", "B"), "1.5", "100", "1")).await.unwrap();
    }
    index
}

#[tokio::test]
async fn test_pagination_window() {
    let index = five_orders().await;

    let page = Page::from_sentinels(2, 1).unwrap();
    let window = index.list_orders_by_pair(&token("A"), &token("B"), page).await.unwrap();
    assert_eq!(ids(&window), vec!["o2", "o3"]);

    let all = Page::from_sentinels(-1, -1).unwrap();
    let everything = index.list_orders_by_pair(&token("A"), &token("B"), all).await.unwrap();
    assert_eq!(ids(&everything), vec!["o1", "o2", "o3", "o4", "o5"]);

    // Offset only, limit only
    let tail = Page::from_sentinels(-1, 3).unwrap();
    let tail = index.list_orders_by_pair(&token("A"), &token("B"), tail).await.unwrap();
    assert_eq!(ids(&tail), vec!["o4", "o5"]);

    let head = Page::from_sentinels(1, -1).unwrap();
    let head = index.list_orders_by_pair(&token("A"), &token("B"), head).await.unwrap();
    assert_eq!(ids(&head), vec!["o1"]);

    // Past the end and zero-sized windows are empty, not errors
    let beyond = index
        .list_orders_by_pair(&token("A"), &token("B"), Page::new(10, 9))
        .await
        .unwrap();
    assert!(beyond.is_empty());
    let zero = index
        .list_orders_by_pair(&token("A"), &token("B"), Page::new(0, 0))
        .await
        .unwrap();
    assert!(zero.is_empty());
}

#[tokio::test]
async fn test_invalid_page_rejected() {
    let err = Page::from_sentinels(-2, 0).unwrap_err();
    assert_eq!(err, PageError::InvalidPage { field: "limit", value: -2 });

    let engine_err: EngineError = Page::from_sentinels(5, -7).unwrap_err().into();
    assert!(matches!(engine_err, EngineError::InvalidPage(_)));
    assert!(engine_err.is_client_error());
}

#[tokio::test]
async fn test_round_trip_preserves_all_fields() {
    let (index, _) = memory_index();
    index.add_pair(&token("ETH"), &token("USDC")).await.unwrap();

    let original = order("ord-1", "maker-7", ("ETH", "USDC"), "3125.000000001", "0.75", "0.0001");
    index.add_order(&original).await.unwrap();

    let fetched = index.get_order_by_id(&original.id).await.unwrap();
    assert_eq!(fetched, original);
    assert_eq!(fetched.rate.to_string(), "3125.000000001");

    // Serializes with hex ids and decimal strings
    let json = serde_json::to_value(&fetched).unwrap();
    assert_eq!(json["id"], "6f72642d31");
    assert_eq!(json["max_volume"], "0.75");
    let back: Order = serde_json::from_value(json).unwrap();
    assert_eq!(back, original);
}

#[tokio::test]
async fn test_unknown_order_not_found() {
    let (index, _) = memory_index();
    let err = index.get_order_by_id(&OrderId::from("nope")).await.unwrap_err();
    assert!(matches!(err, EngineError::OrderNotFound { .. }));
}

#[tokio::test]
async fn test_pair_teardown() {
    let (index, backend) = memory_index();
    let (a, b) = (token("A"), token("B"));
    index.add_pair(&a, &b).await.unwrap();
    index.add_order(&order("o1", "m1", ("A", "B"), "2", "10", "1")).await.unwrap();
    index.add_order(&order("o2", "m1", ("B", "A"), "0.5", "20", "2")).await.unwrap();
    index.add_order(&order("o3", "m2", ("A", "B"), "3", "10", "1")).await.unwrap();

    let removed = index.remove_pair(&a, &b).await.unwrap();
    assert_eq!(removed, 3);
    assert_eq!(backend.order_count().await, 0);

    for id in ["o1", "o2", "o3"] {
        let err = index.get_order_by_id(&OrderId::from(id)).await.unwrap_err();
        assert!(matches!(err, EngineError::OrderNotFound { .. }), "{id}: {err}");
    }
    let err = index.get_order_with_max_rate(&a, &b).await.unwrap_err();
    assert!(matches!(err, EngineError::PairNotFound { .. }));

    // Re-adding starts from empty indexes
    index.add_pair(&a, &b).await.unwrap();
    assert!(index.list_orders_by_pair(&a, &b, Page::all()).await.unwrap().is_empty());
    assert!(index.list_orders_by_pair(&b, &a, Page::all()).await.unwrap().is_empty());
    let err = index.get_order_with_min_volume(&b, &a).await.unwrap_err();
    assert!(matches!(err, EngineError::NoOrdersForPair { .. }));
    assert!(backend.verify_consistency().await.is_ok());
}

#[tokio::test]
async fn test_remove_pair_leaves_other_pairs_alone() {
    let (index, _) = memory_index();
    index.add_pair(&token("A"), &token("B")).await.unwrap();
    index.add_pair(&token("A"), &token("C")).await.unwrap();
    index.add_order(&order("o1", "m1", ("A", "B"), "2", "10", "1")).await.unwrap();
    index.add_order(&order("o2", "m1", ("A", "C"), "2", "10", "1")).await.unwrap();

    index.remove_pair(&token("A"), &token("B")).await.unwrap();

    let survivor = index.get_order_by_id(&OrderId::from("o2")).await.unwrap();
    assert_eq!(survivor.token_ask, token("C"));
    let mine = index.list_orders_by_maker_id(&MakerId::from("m1"), Page::all()).await.unwrap();
    assert_eq!(ids(&mine), vec!["o2"]);
}

#[tokio::test]
async fn test_extremal_ties_break_on_smallest_id() {
    let (index, _) = memory_index();
    let (a, b) = (token("A"), token("B"));
    index.add_pair(&a, &b).await.unwrap();
    index.add_order(&order("o3", "m", ("A", "B"), "9", "50", "5")).await.unwrap();
    index.add_order(&order("o2", "m", ("A", "B"), "9.00", "50", "5")).await.unwrap();
    index.add_order(&order("o1", "m", ("A", "B"), "1", "50", "5")).await.unwrap();

    let best = index.get_order_with_max_rate(&a, &b).await.unwrap();
    assert_eq!(best.id, OrderId::from("o2"));
    // Exact decimal preserved even though 9 == 9.00 share an index level
    assert_eq!(best.rate.to_string(), "9.00");

    // Every order ties on volume
    assert_eq!(index.get_order_with_max_volume(&a, &b).await.unwrap().id, OrderId::from("o1"));
    assert_eq!(index.get_order_with_min_volume(&a, &b).await.unwrap().id, OrderId::from("o1"));
    assert_eq!(index.get_order_with_min_rate(&a, &b).await.unwrap().id, OrderId::from("o1"));

    let ranked = index.list_max_rate_orders(&a, &b, Page::all()).await.unwrap();
    assert_eq!(ids(&ranked), vec!["o2", "o3", "o1"]);
}

#[tokio::test]
async fn test_extremal_on_unknown_pair() {
    let (index, _) = memory_index();
    let err = index.get_order_with_min_rate(&token("X"), &token("Y")).await.unwrap_err();
    assert!(matches!(err, EngineError::PairNotFound { .. }));
}

#[tokio::test]
async fn test_directions_are_independent() {
    let (index, _) = memory_index();
    let (a, b) = (token("A"), token("B"));
    index.add_pair(&a, &b).await.unwrap();
    index.add_order(&order("o1", "m", ("A", "B"), "2", "10", "1")).await.unwrap();

    assert_eq!(index.list_orders_by_pair(&a, &b, Page::all()).await.unwrap().len(), 1);
    assert!(index.list_orders_by_pair(&b, &a, Page::all()).await.unwrap().is_empty());
    assert!(matches!(
        index.get_order_with_max_rate(&b, &a).await.unwrap_err(),
        EngineError::NoOrdersForPair { .. }
    ));
}

#[tokio::test]
async fn test_maker_listing_spans_pairs() {
    let (index, _) = memory_index();
    index.add_pair(&token("A"), &token("B")).await.unwrap();
    index.add_pair(&token("C"), &token("D")).await.unwrap();
    index.add_order(&order("o3", "alice", ("A", "B"), "1", "1", "0")).await.unwrap();
    index.add_order(&order("o1", "alice", ("D", "C"), "1", "1", "0")).await.unwrap();
    index.add_order(&order("o2", "bob", ("A", "B"), "1", "1", "0")).await.unwrap();
    index.add_order(&order("o4", "alice", ("B", "A"), "1", "1", "0")).await.unwrap();

    let alice = MakerId::from("alice");
    let all = index.list_orders_by_maker_id(&alice, Page::all()).await.unwrap();
    assert_eq!(ids(&all), vec!["o1", "o3", "o4"]);

    let page = index.list_orders_by_maker_id(&alice, Page::new(1, 1)).await.unwrap();
    assert_eq!(ids(&page), vec!["o3"]);

    // Prefix of another maker id must not match
    let ali = index.list_orders_by_maker_id(&MakerId::from("ali"), Page::all()).await.unwrap();
    assert!(ali.is_empty());
}

#[tokio::test]
async fn test_validation_errors() {
    let (index, _) = memory_index();
    index.add_pair(&token("A"), &token("B")).await.unwrap();

    let cases = [
        (order("o1", "m", ("A", "B"), "0", "1", "0"), "non-positive rate"),
        (order("o1", "m", ("A", "B"), "1", "-1", "0"), "negative max volume"),
        (order("o1", "m", ("A", "B"), "1", "1", "2"), "inverted bounds"),
        (order("o1", "m", ("A", "A"), "1", "1", "0"), "identical tokens"),
        (order("", "m", ("A", "B"), "1", "1", "0"), "empty id"),
    ];
    for (bad, label) in cases {
        let err = index.add_order(&bad).await.unwrap_err();
        assert!(matches!(err, EngineError::InvalidOrder(_)), "{label}: {err}");
        assert!(!err.is_retryable());
    }

    let err = index
        .add_order(&order("o1", "m", ("A", "B"), "-3", "1", "0"))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidOrder(OrderError::NonPositiveRate { .. })));

    // Equal bounds and zero volumes are fine
    index.add_order(&order("o1", "m", ("A", "B"), "1", "0", "0")).await.unwrap();
    index.add_order(&order("o2", "m", ("A", "B"), "1", "5", "5")).await.unwrap();
}

#[tokio::test]
async fn test_remove_order_twice() {
    let (index, _) = memory_index();
    index.add_pair(&token("A"), &token("B")).await.unwrap();
    index.add_order(&order("o1", "m", ("A", "B"), "1", "2", "1")).await.unwrap();

    index.remove_order(&OrderId::from("o1")).await.unwrap();
    let err = index.remove_order(&OrderId::from("o1")).await.unwrap_err();
    assert!(matches!(err, EngineError::OrderNotFound { .. }));

    // The id is free again
    index.add_order(&order("o1", "m", ("A", "B"), "4", "2", "1")).await.unwrap();
    let fetched = index.get_order_by_id(&OrderId::from("o1")).await.unwrap();
    assert_eq!(fetched.rate.to_string(), "4");
}
