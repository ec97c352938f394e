//! Pair registry
//!
//! A pair is provisioned in both directions at once; (A, B) and (B, A) are
//! separate index spaces that are created and removed together.

use tracing::{debug, info};
use types::ids::{DirectionalPair, TokenId};

use crate::backend::{AccessMode, Query, Statement, UnitOfWork};
use crate::engine::OrderIndex;
use crate::error::{BackendResultExt, EngineError, EngineResult};

fn checked_pair(token_bid: &TokenId, token_ask: &TokenId) -> EngineResult<DirectionalPair> {
    let pair = DirectionalPair::new(token_bid.clone(), token_ask.clone());
    if token_bid.is_empty() || token_ask.is_empty() {
        return Err(EngineError::InvalidPair {
            pair,
            reason: "token id is empty",
        });
    }
    if token_bid == token_ask {
        return Err(EngineError::InvalidPair {
            pair,
            reason: "tokens are identical",
        });
    }
    Ok(pair)
}

/// Whether `pair` is provisioned, as seen by `uow`
pub(crate) async fn pair_exists(uow: &mut dyn UnitOfWork, pair: &DirectionalPair) -> EngineResult<bool> {
    let mut rows = uow
        .query(Query::PairExists { pair: pair.clone() })
        .await
        .context("looking up pair")?;
    Ok(rows.next().is_some())
}

impl OrderIndex {
    /// Provision both directions of a pair. Idempotent.
    pub async fn add_pair(&self, token_bid: &TokenId, token_ask: &TokenId) -> EngineResult<()> {
        let pair = checked_pair(token_bid, token_ask)?;
        let mut uow = self.begin(AccessMode::ReadWrite, "beginning add_pair").await?;

        let result = async {
            let mut created = 0;
            for direction in [pair.clone(), pair.reversed()] {
                created += uow
                    .execute(Statement::CreatePairIndexes { pair: direction })
                    .await
                    .context("creating pair indexes")?;
            }
            Ok::<_, EngineError>(created)
        }
        .await;

        let created = self.finish(uow, result, "add_pair").await?;
        if created > 0 {
            info!(%pair, directions = created, "pair registered");
        } else {
            debug!(%pair, "pair already registered");
        }
        Ok(())
    }

    /// Drop both directions of a pair along with every order on either.
    ///
    /// Returns the number of orders removed.
    pub async fn remove_pair(&self, token_bid: &TokenId, token_ask: &TokenId) -> EngineResult<u64> {
        let pair = checked_pair(token_bid, token_ask)?;
        let mut uow = self.begin(AccessMode::ReadWrite, "beginning remove_pair").await?;

        let result = async {
            if !pair_exists(uow.as_mut(), &pair).await? {
                return Err(EngineError::PairNotFound { pair: pair.clone() });
            }
            let mut removed = 0;
            for direction in [pair.clone(), pair.reversed()] {
                removed += uow
                    .execute(Statement::DeleteOrdersForPair {
                        pair: direction.clone(),
                    })
                    .await
                    .context("deleting orders of pair")?;
                uow.execute(Statement::DropPairIndexes { pair: direction })
                    .await
                    .context("dropping pair indexes")?;
            }
            Ok::<_, EngineError>(removed)
        }
        .await;

        let removed = self.finish(uow, result, "remove_pair").await?;
        info!(%pair, orders = removed, "pair removed");
        Ok(removed)
    }

    /// Whether the directional pair is provisioned
    pub async fn has_pair(&self, token_bid: &TokenId, token_ask: &TokenId) -> EngineResult<bool> {
        let pair = DirectionalPair::new(token_bid.clone(), token_ask.clone());
        let mut uow = self.begin(AccessMode::ReadOnly, "beginning has_pair").await?;
        let result = pair_exists(uow.as_mut(), &pair).await;
        self.finish(uow, result, "has_pair").await
    }
}
