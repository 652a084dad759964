use std::str::FromStr;

use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use tracing::instrument;

use super::AppState;
use crate::error::GatewayError;
use crate::mempool;
use crate::node::NodeConnector;
use crate::primitives::TxHash;
use crate::with_session;

pub fn routes<C: NodeConnector>() -> Router<AppState<C>> {
    Router::new()
        .route("/sizes", get(sizes::<C>))
        .route("/has_tx/:tx_hash", get(has_tx::<C>))
        .route("/txs", get(txs::<C>))
}

#[derive(Debug, Serialize)]
struct Sizes {
    capacity: u32,
    size: u32,
    tx_count: u32,
}

#[derive(Debug, Serialize)]
struct HasTx {
    has_tx: bool,
}

#[derive(Debug, Serialize)]
struct MempoolTx {
    tx_hash: String,
    tx_bytes: String,
}

#[instrument(skip_all)]
async fn sizes<C: NodeConnector>(
    State(state): State<AppState<C>>,
) -> Result<Json<Sizes>, GatewayError> {
    let sizes = with_session!(state.connector, |session| mempool::mempool_sizes(&mut session))?;

    Ok(Json(Sizes {
        capacity: sizes.capacity,
        size: sizes.size,
        tx_count: sizes.tx_count,
    }))
}

#[instrument(skip(state))]
async fn has_tx<C: NodeConnector>(
    State(state): State<AppState<C>>,
    Path(tx_hash): Path<String>,
) -> Result<Json<HasTx>, GatewayError> {
    let hash = TxHash::from_str(&tx_hash)
        .map_err(|_| GatewayError::InvalidRequest(format!("invalid transaction hash {tx_hash}")))?;

    let has_tx = with_session!(state.connector, |session| mempool::has_tx(&mut session, hash))?;
    Ok(Json(HasTx { has_tx }))
}

#[instrument(skip_all)]
async fn txs<C: NodeConnector>(
    State(state): State<AppState<C>>,
) -> Result<Json<Vec<MempoolTx>>, GatewayError> {
    let txs = with_session!(state.connector, |session| mempool::list_mempool(&mut session))?;

    Ok(Json(
        txs.into_iter()
            .map(|tx| MempoolTx {
                tx_hash: tx.hash.to_string(),
                tx_bytes: hex::encode(&tx.raw),
            })
            .collect(),
    ))
}
