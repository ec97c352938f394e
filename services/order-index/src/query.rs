//! Read paths: point lookups, extremal lookups, paginated lists
//!
//! Every read runs in a read-only unit of work and returns fully joined
//! orders (record plus the three indexed attributes). Lists come back empty
//! when nothing matches, including for pairs that were never registered.

use types::ids::{DirectionalPair, MakerId, OrderId, TokenId};
use types::order::Order;
use types::page::Page;

use crate::backend::row::{decode_order, decode_orders};
use crate::backend::{AccessMode, Query, UnitOfWork};
use crate::engine::OrderIndex;
use crate::error::{BackendResultExt, EngineError, EngineResult};
use crate::index::{Attribute, Direction};
use crate::orders::find_record;
use crate::registry::pair_exists;

async fn fetch(uow: &mut dyn UnitOfWork, query: Query, context: &'static str) -> EngineResult<Vec<Order>> {
    let rows = uow.query(query).await.context(context)?;
    decode_orders(rows).context(context)
}

async fn lookup(uow: &mut dyn UnitOfWork, order_id: &OrderId) -> EngineResult<Order> {
    let not_found = || EngineError::OrderNotFound {
        order_id: order_id.clone(),
    };
    let record = find_record(uow, order_id).await?.ok_or_else(not_found)?;
    let mut rows = uow
        .query(Query::OrderById {
            order_id: order_id.clone(),
            pair: record.pair(),
        })
        .await
        .context("reading order")?;
    let row = rows.next().ok_or_else(not_found)?;
    decode_order(&row).context("decoding order")
}

async fn extremal(
    uow: &mut dyn UnitOfWork,
    pair: DirectionalPair,
    attribute: Attribute,
    direction: Direction,
) -> EngineResult<Order> {
    if !pair_exists(uow, &pair).await? {
        return Err(EngineError::PairNotFound { pair });
    }
    let query = Query::Ranked {
        pair: pair.clone(),
        attribute,
        direction,
        page: Page::first(1),
    };
    fetch(uow, query, "reading extremal order")
        .await?
        .into_iter()
        .next()
        .ok_or(EngineError::NoOrdersForPair { pair })
}

impl OrderIndex {
    /// Full order by id, joined from its pair's indexes
    pub async fn get_order_by_id(&self, order_id: &OrderId) -> EngineResult<Order> {
        let mut uow = self.begin(AccessMode::ReadOnly, "beginning get_order_by_id").await?;
        let result = lookup(uow.as_mut(), order_id).await;
        self.finish(uow, result, "get_order_by_id").await
    }

    async fn extremal_order(
        &self,
        token_bid: &TokenId,
        token_ask: &TokenId,
        attribute: Attribute,
        direction: Direction,
        operation: &'static str,
    ) -> EngineResult<Order> {
        let pair = DirectionalPair::new(token_bid.clone(), token_ask.clone());
        let mut uow = self.begin(AccessMode::ReadOnly, operation).await?;
        let result = extremal(uow.as_mut(), pair, attribute, direction).await;
        self.finish(uow, result, operation).await
    }

    /// Order with the highest rate on the pair; smallest id among ties
    pub async fn get_order_with_max_rate(&self, token_bid: &TokenId, token_ask: &TokenId) -> EngineResult<Order> {
        self.extremal_order(token_bid, token_ask, Attribute::Rate, Direction::Descending, "get_order_with_max_rate")
            .await
    }

    pub async fn get_order_with_min_rate(&self, token_bid: &TokenId, token_ask: &TokenId) -> EngineResult<Order> {
        self.extremal_order(token_bid, token_ask, Attribute::Rate, Direction::Ascending, "get_order_with_min_rate")
            .await
    }

    pub async fn get_order_with_max_volume(&self, token_bid: &TokenId, token_ask: &TokenId) -> EngineResult<Order> {
        self.extremal_order(
            token_bid,
            token_ask,
            Attribute::MaxVolume,
            Direction::Descending,
            "get_order_with_max_volume",
        )
        .await
    }

    pub async fn get_order_with_min_volume(&self, token_bid: &TokenId, token_ask: &TokenId) -> EngineResult<Order> {
        self.extremal_order(
            token_bid,
            token_ask,
            Attribute::MinVolume,
            Direction::Ascending,
            "get_order_with_min_volume",
        )
        .await
    }

    async fn list(&self, query: Query, operation: &'static str) -> EngineResult<Vec<Order>> {
        let mut uow = self.begin(AccessMode::ReadOnly, operation).await?;
        let result = fetch(uow.as_mut(), query, operation).await;
        self.finish(uow, result, operation).await
    }

    /// Orders on a directional pair, id ascending
    pub async fn list_orders_by_pair(
        &self,
        token_bid: &TokenId,
        token_ask: &TokenId,
        page: Page,
    ) -> EngineResult<Vec<Order>> {
        let pair = DirectionalPair::new(token_bid.clone(), token_ask.clone());
        self.list(Query::OrdersByPair { pair, page }, "list_orders_by_pair").await
    }

    /// Orders of one maker across every pair, id ascending
    pub async fn list_orders_by_maker_id(&self, maker_id: &MakerId, page: Page) -> EngineResult<Vec<Order>> {
        let query = Query::OrdersByMaker {
            maker_id: maker_id.clone(),
            page,
        };
        self.list(query, "list_orders_by_maker_id").await
    }

    async fn ranked(
        &self,
        token_bid: &TokenId,
        token_ask: &TokenId,
        attribute: Attribute,
        direction: Direction,
        page: Page,
        operation: &'static str,
    ) -> EngineResult<Vec<Order>> {
        let query = Query::Ranked {
            pair: DirectionalPair::new(token_bid.clone(), token_ask.clone()),
            attribute,
            direction,
            page,
        };
        self.list(query, operation).await
    }

    /// Rate descending, ties by id ascending
    pub async fn list_max_rate_orders(
        &self,
        token_bid: &TokenId,
        token_ask: &TokenId,
        page: Page,
    ) -> EngineResult<Vec<Order>> {
        self.ranked(token_bid, token_ask, Attribute::Rate, Direction::Descending, page, "list_max_rate_orders")
            .await
    }

    /// Rate ascending, ties by id ascending
    pub async fn list_min_rate_orders(
        &self,
        token_bid: &TokenId,
        token_ask: &TokenId,
        page: Page,
    ) -> EngineResult<Vec<Order>> {
        self.ranked(token_bid, token_ask, Attribute::Rate, Direction::Ascending, page, "list_min_rate_orders")
            .await
    }

    /// Max volume descending, ties by id ascending
    pub async fn list_max_volume_orders(
        &self,
        token_bid: &TokenId,
        token_ask: &TokenId,
        page: Page,
    ) -> EngineResult<Vec<Order>> {
        self.ranked(
            token_bid,
            token_ask,
            Attribute::MaxVolume,
            Direction::Descending,
            page,
            "list_max_volume_orders",
        )
        .await
    }

    /// Min volume ascending, ties by id ascending
    pub async fn list_min_volume_orders(
        &self,
        token_bid: &TokenId,
        token_ask: &TokenId,
        page: Page,
    ) -> EngineResult<Vec<Order>> {
        self.ranked(
            token_bid,
            token_ask,
            Attribute::MinVolume,
            Direction::Ascending,
            page,
            "list_min_volume_orders",
        )
        .await
    }
}
