//! Transaction submission through the node's local tx submission protocol

use tracing::{info, instrument, warn};

use crate::error::GatewayError;
use crate::ledger::decode_transaction;
use crate::node::{NodeSession, SubmitResponse};
use crate::primitives::TxHash;

/// Outcome of one transaction of a batch
#[derive(Debug)]
pub enum SubmitOutcome {
    Accepted(TxHash),
    Failed(GatewayError),
}

/// Submits one transaction. The era is read from the transaction itself, so bytes the gateway
/// can not decode never reach the node.
#[instrument(skip_all)]
pub async fn submit_tx<S: NodeSession>(session: &mut S, bytes: Vec<u8>) -> Result<TxHash, GatewayError> {
    let tx = decode_transaction(&bytes)?;

    match session.submit_tx(tx.era, bytes).await? {
        SubmitResponse::Accepted => {
            info!(tx_hash = %tx.hash, era = %tx.era, "transaction accepted");
            Ok(tx.hash)
        }
        SubmitResponse::Rejected(reason) => {
            warn!(tx_hash = %tx.hash, reason = hex::encode(&reason), "transaction rejected");
            Err(GatewayError::Rejected { reason })
        }
    }
}

/// Submits transactions in order on one session. A decode failure or rejection only affects its
/// own item, a connection failure ends the batch.
#[instrument(skip_all, fields(txs = txs.len()))]
pub async fn submit_batch<S: NodeSession>(
    session: &mut S,
    txs: Vec<Vec<u8>>,
) -> Result<Vec<SubmitOutcome>, GatewayError> {
    let mut outcomes = Vec::with_capacity(txs.len());

    for bytes in txs {
        let outcome = match submit_tx(session, bytes).await {
            Ok(hash) => SubmitOutcome::Accepted(hash),
            Err(e @ (GatewayError::Decode(_) | GatewayError::Rejected { .. })) => {
                SubmitOutcome::Failed(e)
            }
            Err(e) => return Err(e),
        };
        outcomes.push(outcome);
    }

    Ok(outcomes)
}
