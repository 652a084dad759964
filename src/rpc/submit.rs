use jsonrpsee::PendingSubscriptionSink;
use jsonrpsee::core::{RpcResult, SubscriptionResult};
use jsonrpsee::proc_macros::rpc;
use jsonrpsee::types::ErrorObjectOwned;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

use super::types::{
    ConfirmedItem, EvalResponse, MempoolItem, MempoolList, SubmitItem, parse_tx_hash,
};
use super::{Gateway, forward};
use crate::confirm::{self, Confirmation};
use crate::error::{DecodeError, GatewayError};
use crate::eval;
use crate::ledger::{Transaction, decode_transaction};
use crate::mempool;
use crate::node::NodeConnector;
use crate::primitives::TxHash;
use crate::submit;
use crate::with_session;

const SUBSCRIPTION_BUFFER: usize = 16;

#[rpc(server, namespace = "submit")]
pub trait SubmitApi {
    /// Submits every transaction in order, one outcome per transaction
    #[method(name = "submitTx")]
    async fn submit_tx(&self, txs: Vec<String>) -> RpcResult<Vec<SubmitItem>>;

    /// Execution units of every redeemer of a transaction
    #[method(name = "evalTx")]
    async fn eval_tx(&self, tx: String) -> RpcResult<EvalResponse>;

    #[method(name = "readMempool")]
    async fn read_mempool(&self) -> RpcResult<MempoolList>;

    #[subscription(name = "waitForTx", unsubscribe = "unwaitForTx", item = ConfirmedItem)]
    async fn wait_for_tx(&self, refs: Vec<String>) -> SubscriptionResult;

    #[subscription(name = "watchMempool", unsubscribe = "unwatchMempool", item = MempoolItem)]
    async fn watch_mempool(&self) -> SubscriptionResult;
}

pub(super) async fn wait_confirmed<C: NodeConnector>(
    connector: C,
    targets: Vec<TxHash>,
    cancel: CancellationToken,
    sink: mpsc::Sender<Confirmation>,
) -> Result<(), GatewayError> {
    with_session!(connector, |session| confirm::wait_for_confirmations(
        &mut session,
        targets,
        cancel,
        sink
    ))
}

async fn watch_pending<C: NodeConnector>(
    connector: C,
    poll_interval: std::time::Duration,
    cancel: CancellationToken,
    sink: mpsc::Sender<Transaction>,
) -> Result<(), GatewayError> {
    with_session!(connector, |session| mempool::watch_mempool(
        &mut session,
        poll_interval,
        cancel,
        sink
    ))
}

impl<C: NodeConnector> Gateway<C> {
    pub(super) async fn submit(&self, txs: Vec<String>) -> Result<Vec<SubmitItem>, GatewayError> {
        // undecodable hex fails only its own item
        let decoded: Vec<_> = txs.iter().map(hex::decode).collect();
        let valid: Vec<Vec<u8>> = decoded
            .iter()
            .filter_map(|tx| tx.as_ref().ok().cloned())
            .collect();

        let outcomes = with_session!(self.connector, |session| submit::submit_batch(
            &mut session,
            valid
        ))?;

        let mut outcomes = outcomes.into_iter().map(SubmitItem::from);
        Ok(decoded
            .into_iter()
            .filter_map(|tx| match tx {
                Ok(_) => outcomes.next(),
                Err(e) => Some(SubmitItem::Failed {
                    error: DecodeError::Transaction(e.to_string()).to_string(),
                    reason: None,
                }),
            })
            .collect())
    }

    pub(super) async fn evaluate(&self, tx: String) -> Result<EvalResponse, GatewayError> {
        let bytes = hex::decode(&tx)
            .map_err(|e| GatewayError::InvalidRequest(format!("invalid transaction hex: {e}")))?;
        let tx = decode_transaction(&bytes)?;
        let engine = self.engine.clone();

        let redeemers = with_session!(self.connector, |session| eval::evaluate_tx(
            &mut session,
            engine,
            tx
        ))?;
        Ok(EvalResponse { redeemers })
    }

    pub(super) async fn mempool(&self) -> Result<MempoolList, GatewayError> {
        let txs = with_session!(self.connector, |session| mempool::list_mempool(&mut session))?;

        Ok(MempoolList {
            items: txs.into_iter().map(MempoolItem::from).collect(),
        })
    }
}

#[jsonrpsee::core::async_trait]
impl<C: NodeConnector> SubmitApiServer for Gateway<C> {
    #[instrument(skip_all, fields(txs = txs.len()))]
    async fn submit_tx(&self, txs: Vec<String>) -> RpcResult<Vec<SubmitItem>> {
        Ok(self.submit(txs).await?)
    }

    #[instrument(skip_all)]
    async fn eval_tx(&self, tx: String) -> RpcResult<EvalResponse> {
        Ok(self.evaluate(tx).await?)
    }

    #[instrument(skip_all)]
    async fn read_mempool(&self) -> RpcResult<MempoolList> {
        Ok(self.mempool().await?)
    }

    async fn wait_for_tx(
        &self,
        pending: PendingSubscriptionSink,
        refs: Vec<String>,
    ) -> SubscriptionResult {
        let targets = match refs.iter().map(|r| parse_tx_hash(r)).collect::<Result<Vec<_>, _>>() {
            Ok(targets) => targets,
            Err(e) => {
                pending.reject(ErrorObjectOwned::from(e)).await;
                return Ok(());
            }
        };

        let sink = pending.accept().await?;
        let (sender, receiver) = mpsc::channel(SUBSCRIPTION_BUFFER);
        let cancel = CancellationToken::new();
        let task = tokio::spawn(wait_confirmed(
            self.connector.clone(),
            targets,
            cancel.clone(),
            sender,
        ));

        forward(sink, receiver, cancel, task, ConfirmedItem::from).await
    }

    async fn watch_mempool(&self, pending: PendingSubscriptionSink) -> SubscriptionResult {
        let sink = pending.accept().await?;
        let (sender, receiver) = mpsc::channel(SUBSCRIPTION_BUFFER);
        let cancel = CancellationToken::new();
        let task = tokio::spawn(watch_pending(
            self.connector.clone(),
            self.poll_interval,
            cancel.clone(),
            sender,
        ));

        forward(sink, receiver, cancel, task, MempoolItem::from).await
    }
}
