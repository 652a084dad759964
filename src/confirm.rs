//! Watches chain sync for a set of transaction hashes.

use std::collections::BTreeSet;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use crate::error::GatewayError;
use crate::node::{ChainEvent, NodeSession};
use crate::primitives::{BlockHash, TxHash};

/// A watched transaction seen in a block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Confirmation {
    pub hash: TxHash,
    pub slot: u64,
    pub block_hash: BlockHash,
}

#[derive(Debug, Clone, Default)]
pub struct ConfirmationTracker {
    pending: BTreeSet<TxHash>,
}

impl ConfirmationTracker {
    pub fn new(targets: impl IntoIterator<Item = TxHash>) -> Self {
        Self {
            pending: targets.into_iter().collect(),
        }
    }

    /// Confirmations carried by `event`. A confirmed hash stops being watched. Rollbacks are
    /// only observed, a transaction that was rolled back is simply never seen again.
    pub fn observe(&mut self, event: &ChainEvent) -> Vec<Confirmation> {
        let ChainEvent::RollForward(block) = event else {
            return vec![];
        };

        block
            .tx_hashes
            .iter()
            .filter(|hash| self.pending.remove(*hash))
            .map(|hash| Confirmation {
                hash: *hash,
                slot: block.slot,
                block_hash: block.hash,
            })
            .collect()
    }

    pub fn pending(&self) -> impl Iterator<Item = &TxHash> {
        self.pending.iter()
    }

    pub fn is_done(&self) -> bool {
        self.pending.is_empty()
    }
}

/// Follows the chain from its current tip and sends a [`Confirmation`] for every target that
/// shows up in a new block.
///
/// Finishes once every target is confirmed, when `cancel` fires or when `sink` is closed.
#[instrument(skip_all, fields(targets = targets.len()))]
pub async fn wait_for_confirmations<S: NodeSession>(
    session: &mut S,
    targets: Vec<TxHash>,
    cancel: CancellationToken,
    sink: mpsc::Sender<Confirmation>,
) -> Result<(), GatewayError> {
    let mut tracker = ConfirmationTracker::new(targets);
    if tracker.is_done() {
        return Ok(());
    }

    let tip = tokio::select! {
        _ = cancel.cancelled() => return Ok(()),
        tip = session.follow_tip() => tip?,
    };
    debug!(slot = tip.slot(), "following chain from tip");

    loop {
        let event = tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            event = session.next_event() => event?,
        };

        if let ChainEvent::RollBackward(point) = &event {
            debug!(slot = point.slot(), "rolled back");
        }

        for confirmation in tracker.observe(&event) {
            info!(tx_hash = %confirmation.hash, slot = confirmation.slot, "transaction confirmed");
            if sink.send(confirmation).await.is_err() {
                return Ok(());
            }
        }

        if tracker.is_done() {
            return Ok(());
        }
    }
}
