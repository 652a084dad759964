//! Consistent iteration over the node's mempool.
//!
//! The tx monitor protocol hands out snapshots: after an acquire, `next` walks the snapshot and
//! answers nothing once it is exhausted. A [`MempoolCursor`] releases the snapshot at that
//! point, the next acquire waits for the mempool to change.

use std::collections::HashSet;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use crate::error::{GatewayError, NodeError};
use crate::ledger::{Transaction, decode_transaction_for_era};
use crate::node::{MempoolSizes, NodeSession};
use crate::primitives::TxHash;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorState {
    Released,
    Acquired,
}

/// Acquire / next / release sequencing on one session
pub struct MempoolCursor<'a, S> {
    session: &'a mut S,
    state: CursorState,
}

impl<'a, S: NodeSession> MempoolCursor<'a, S> {
    pub fn new(session: &'a mut S) -> Self {
        Self {
            session,
            state: CursorState::Released,
        }
    }

    pub fn state(&self) -> CursorState {
        self.state
    }

    /// Takes a new snapshot. Does nothing while one is held.
    pub async fn acquire(&mut self) -> Result<(), NodeError> {
        if self.state == CursorState::Released {
            self.session.mempool_acquire().await?;
            self.state = CursorState::Acquired;
        }
        Ok(())
    }

    /// Next transaction of the held snapshot, decoded. `None` once the snapshot is exhausted,
    /// the snapshot is released by then.
    pub async fn next(&mut self) -> Result<Option<Transaction>, GatewayError> {
        if self.state == CursorState::Released {
            return Ok(None);
        }

        match self.session.mempool_next().await? {
            Some(pending) => Ok(Some(decode_transaction_for_era(pending.era, &pending.bytes)?)),
            None => {
                self.session.mempool_release().await?;
                self.state = CursorState::Released;
                Ok(None)
            }
        }
    }
}

/// The transactions of one mempool snapshot.
#[instrument(skip_all)]
pub async fn list_mempool<S: NodeSession>(session: &mut S) -> Result<Vec<Transaction>, GatewayError> {
    let mut cursor = MempoolCursor::new(session);
    cursor.acquire().await?;

    let mut txs = Vec::new();
    while let Some(tx) = cursor.next().await? {
        txs.push(tx);
    }

    debug!(count = txs.len(), "read mempool");
    Ok(txs)
}

pub async fn mempool_sizes<S: NodeSession>(session: &mut S) -> Result<MempoolSizes, GatewayError> {
    Ok(session.mempool_sizes().await?)
}

pub async fn has_tx<S: NodeSession>(session: &mut S, hash: TxHash) -> Result<bool, GatewayError> {
    Ok(session.mempool_has_tx(hash).await?)
}

/// Sends every transaction that enters the mempool to `sink`, once.
///
/// Ends with `Ok(())` when `cancel` fires or the receiving side goes away. A transaction that
/// can not be decoded ends the watch with an error.
#[instrument(skip_all)]
pub async fn watch_mempool<S: NodeSession>(
    session: &mut S,
    poll_interval: Duration,
    cancel: CancellationToken,
    sink: mpsc::Sender<Transaction>,
) -> Result<(), GatewayError> {
    let mut cursor = MempoolCursor::new(session);
    // hashes of the previous snapshot
    let mut seen: HashSet<TxHash> = HashSet::new();

    loop {
        tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            acquired = cursor.acquire() => acquired?,
        }

        let mut snapshot = HashSet::new();
        let mut fresh = 0usize;
        loop {
            let next = tokio::select! {
                _ = cancel.cancelled() => return Ok(()),
                next = cursor.next() => next?,
            };
            let Some(tx) = next else { break };

            snapshot.insert(tx.hash);
            if seen.contains(&tx.hash) {
                continue;
            }

            fresh += 1;
            debug!(tx_hash = %tx.hash, "new mempool transaction");
            if sink.send(tx).await.is_err() {
                return Ok(());
            }
        }
        seen = snapshot;

        if fresh == 0 {
            tokio::select! {
                _ = cancel.cancelled() => return Ok(()),
                _ = tokio::time::sleep(poll_interval) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DecodeError;
    use crate::ledger::decode_transaction;
    use crate::node::{NodeConnector, PendingTx};
    use crate::primitives::Era;
    use crate::testing::{FakeNode, pending_tx, sample_tx_bytes};

    fn hash_of(seed: u8) -> TxHash {
        decode_transaction(&sample_tx_bytes(seed)).unwrap().hash
    }

    #[tokio::test]
    async fn test_drains_snapshot_and_releases() {
        let node = FakeNode::default().with(|state| {
            state.snapshots.push_back(vec![pending_tx(1), pending_tx(2)]);
        });
        let mut session = node.open().await.unwrap();
        let mut cursor = MempoolCursor::new(&mut session);

        cursor.acquire().await.unwrap();
        assert_eq!(cursor.state(), CursorState::Acquired);

        let first = cursor.next().await.unwrap().unwrap();
        let second = cursor.next().await.unwrap().unwrap();
        assert!(cursor.next().await.unwrap().is_none());

        assert_eq!(first.hash, hash_of(1));
        assert_eq!(second.hash, hash_of(2));
        assert_eq!(cursor.state(), CursorState::Released);
        assert_eq!(
            node.state().calls,
            vec![
                "mempool_acquire",
                "mempool_next",
                "mempool_next",
                "mempool_next",
                "mempool_release"
            ]
        );
    }

    #[tokio::test]
    async fn test_list_never_reacquires() {
        let node = FakeNode::default().with(|state| {
            state.snapshots.push_back(vec![pending_tx(3)]);
            state.snapshots.push_back(vec![pending_tx(4)]);
        });
        let mut session = node.open().await.unwrap();

        let txs = list_mempool(&mut session).await.unwrap();

        assert_eq!(txs.len(), 1);
        assert_eq!(txs[0].raw, sample_tx_bytes(3));
        assert_eq!(node.state().snapshots.len(), 1);
    }

    #[tokio::test]
    async fn test_watch_yields_each_transaction_once() {
        let node = FakeNode::default().with(|state| {
            state.snapshots.push_back(vec![pending_tx(1)]);
            state.snapshots.push_back(vec![pending_tx(1), pending_tx(2)]);
            state.snapshots.push_back(vec![pending_tx(2)]);
        });
        let mut session = node.open().await.unwrap();
        let cancel = CancellationToken::new();
        let (sink, mut txs) = mpsc::channel(8);

        let watch = tokio::spawn({
            let cancel = cancel.clone();
            async move {
                watch_mempool(&mut session, Duration::from_millis(1), cancel, sink).await
            }
        });

        assert_eq!(txs.recv().await.unwrap().hash, hash_of(1));
        assert_eq!(txs.recv().await.unwrap().hash, hash_of(2));

        cancel.cancel();
        watch.await.unwrap().unwrap();
        assert!(txs.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_watch_fails_on_undecodable_transaction() {
        let node = FakeNode::default().with(|state| {
            state.snapshots.push_back(vec![PendingTx {
                era: Era::Conway,
                bytes: vec![0xde, 0xad],
            }]);
        });
        let mut session = node.open().await.unwrap();
        let (sink, _txs) = mpsc::channel(1);

        let result = watch_mempool(
            &mut session,
            Duration::from_millis(1),
            CancellationToken::new(),
            sink,
        )
        .await;

        assert!(matches!(
            result,
            Err(GatewayError::Decode(DecodeError::Transaction(_)))
        ));
    }
}
