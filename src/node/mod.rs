//! Per-request sessions with the node.
//!
//! A session is opened for one request, owned by it exclusively and closed on every exit path.
//! Connection failures noticed by the session are also raised on a [`FaultSignal`] so a consumer
//! blocked on a long wait fails instead of hanging.

mod history;
mod n2c;
mod params;

pub use history::*;
pub use n2c::*;
pub use params::*;

use std::collections::BTreeMap;
use std::future::Future;

use tokio::sync::oneshot;

use crate::error::{GatewayError, NodeError};
use crate::ledger::BlockSummary;
use crate::plutus::SystemStart;
use crate::primitives::{Era, Input, Output, TxHash};

/// Outputs returned by a UTxO query, keyed by the reference they were found at
pub type UtxoSet = BTreeMap<Input, Output>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainPoint {
    Origin,
    Specific { slot: u64, hash: Vec<u8> },
}

impl ChainPoint {
    pub fn slot(&self) -> u64 {
        match self {
            ChainPoint::Origin => 0,
            ChainPoint::Specific { slot, .. } => *slot,
        }
    }

    /// Block hash, empty at the origin
    pub fn hash(&self) -> &[u8] {
        match self {
            ChainPoint::Origin => &[],
            ChainPoint::Specific { hash, .. } => hash,
        }
    }
}

/// The node's view of the chain tip, as reported by the state query protocol
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerTip {
    pub era: Era,
    pub point: ChainPoint,
    pub epoch: u64,
    pub block_number: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainEvent {
    RollForward(BlockSummary),
    RollBackward(ChainPoint),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MempoolSizes {
    pub capacity: u32,
    pub size: u32,
    pub tx_count: u32,
}

/// A pending transaction as handed out by the tx monitor protocol
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingTx {
    pub era: Era,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitResponse {
    Accepted,
    /// Rejection reason in the node's own encoding
    Rejected(Vec<u8>),
}

/// Out of band connection failure of a session.
#[derive(Debug, Default)]
pub struct FaultSignal(Option<oneshot::Receiver<NodeError>>);

impl FaultSignal {
    pub fn new(receiver: oneshot::Receiver<NodeError>) -> Self {
        Self(Some(receiver))
    }

    /// Resolves with the first fault raised. Never resolves if the session can no longer raise
    /// one.
    pub async fn raised(&mut self) -> NodeError {
        if let Some(receiver) = self.0.as_mut() {
            let fault = receiver.await;
            self.0 = None;
            if let Ok(fault) = fault {
                return fault;
            }
        }

        std::future::pending().await
    }
}

/// Drives `work` to completion unless the session faults first.
pub async fn with_fault<T>(
    fault: &mut FaultSignal,
    work: impl Future<Output = Result<T, GatewayError>>,
) -> Result<T, GatewayError> {
    tokio::select! {
        biased;
        result = work => result,
        fault = fault.raised() => Err(fault.into()),
    }
}

/// Node operations used by the gateway. Each call is one or more round trips on the session's
/// mini-protocols.
pub trait NodeSession: Send {
    fn current_era(&mut self) -> impl Future<Output = Result<Era, NodeError>> + Send;

    fn protocol_params(&mut self) -> impl Future<Output = Result<ProtocolParams, NodeError>> + Send;

    fn system_start(&mut self) -> impl Future<Output = Result<SystemStart, NodeError>> + Send;

    fn chain_point(&mut self) -> impl Future<Output = Result<ChainPoint, NodeError>> + Send;

    fn ledger_tip(&mut self) -> impl Future<Output = Result<LedgerTip, NodeError>> + Send;

    /// Start, end and parameters of every era so far
    fn era_history(&mut self) -> impl Future<Output = Result<EraHistory, NodeError>> + Send;

    fn utxos_by_refs(
        &mut self,
        refs: &[Input],
    ) -> impl Future<Output = Result<UtxoSet, GatewayError>> + Send;

    fn utxos_by_address(
        &mut self,
        addresses: &[Vec<u8>],
    ) -> impl Future<Output = Result<UtxoSet, GatewayError>> + Send;

    /// The whole UTxO set. Expensive on a real network.
    fn utxos_whole(&mut self) -> impl Future<Output = Result<UtxoSet, GatewayError>> + Send;

    fn submit_tx(
        &mut self,
        era: Era,
        bytes: Vec<u8>,
    ) -> impl Future<Output = Result<SubmitResponse, NodeError>> + Send;

    /// Acquires a mempool snapshot. Blocks until the mempool differs from the previous
    /// snapshot of this session.
    fn mempool_acquire(&mut self) -> impl Future<Output = Result<(), NodeError>> + Send;

    fn mempool_next(&mut self) -> impl Future<Output = Result<Option<PendingTx>, NodeError>> + Send;

    fn mempool_release(&mut self) -> impl Future<Output = Result<(), NodeError>> + Send;

    fn mempool_has_tx(
        &mut self,
        hash: TxHash,
    ) -> impl Future<Output = Result<bool, NodeError>> + Send;

    fn mempool_sizes(&mut self) -> impl Future<Output = Result<MempoolSizes, NodeError>> + Send;

    /// Positions chain sync at the current tip and returns it.
    fn follow_tip(&mut self) -> impl Future<Output = Result<ChainPoint, NodeError>> + Send;

    /// Next chain sync event. Waits for a new block when already at the tip.
    fn next_event(&mut self) -> impl Future<Output = Result<ChainEvent, GatewayError>> + Send;

    /// Hands out the session's fault signal. Later calls return a signal that never fires.
    fn take_fault_signal(&mut self) -> FaultSignal;

    fn close(self) -> impl Future<Output = ()> + Send;
}

pub trait NodeConnector: Clone + Send + Sync + 'static {
    type Session: NodeSession + 'static;

    fn open(&self) -> impl Future<Output = Result<Self::Session, NodeError>> + Send;
}

/// Opens a session on `$connector`, runs the future built by `$work` with the session bound to
/// `$session`, then closes it. Evaluates to the future's result, or to a connection error when
/// the session faults first. Opening failures are returned with `?`.
#[macro_export]
macro_rules! with_session {
    ($connector:expr, |$session:ident| $work:expr) => {{
        let mut $session = $crate::node::NodeConnector::open(&$connector).await?;
        let mut fault = $crate::node::NodeSession::take_fault_signal(&mut $session);
        let result = $crate::node::with_fault(&mut fault, $work).await;
        $crate::node::NodeSession::close($session).await;
        result
    }};
}
