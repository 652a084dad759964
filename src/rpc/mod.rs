//! UTxO oriented JSON-RPC surface, served over HTTP and WebSocket.

mod query;
mod submit;
pub mod types;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use jsonrpsee::core::SubscriptionResult;
use jsonrpsee::server::Server;
use jsonrpsee::types::ErrorObjectOwned;
use jsonrpsee::types::error::{INTERNAL_ERROR_CODE, INVALID_PARAMS_CODE};
use jsonrpsee::{RpcModule, SubscriptionMessage, SubscriptionSink};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

pub use query::QueryApiServer;
pub use submit::SubmitApiServer;

use crate::error::GatewayError;
use crate::eval::ScriptEngine;
use crate::node::NodeConnector;

/// The node could not be reached or answered unexpectedly
pub const NODE_ERROR_CODE: i32 = -32000;
/// The node refused the transaction, `data` carries the hex encoded reason
pub const REJECTED_CODE: i32 = -32001;
pub const MISSING_COST_MODELS_CODE: i32 = -32002;

impl From<GatewayError> for ErrorObjectOwned {
    fn from(error: GatewayError) -> Self {
        match &error {
            GatewayError::Decode(_) | GatewayError::InvalidRequest(_) => {
                ErrorObjectOwned::owned(INVALID_PARAMS_CODE, error.to_string(), None::<()>)
            }
            GatewayError::Rejected { reason } => {
                ErrorObjectOwned::owned(REJECTED_CODE, error.to_string(), Some(hex::encode(reason)))
            }
            GatewayError::Connection(_) => {
                ErrorObjectOwned::owned(NODE_ERROR_CODE, error.to_string(), None::<()>)
            }
            GatewayError::MissingCostModels => {
                ErrorObjectOwned::owned(MISSING_COST_MODELS_CODE, error.to_string(), None::<()>)
            }
            GatewayError::Task(_) => {
                ErrorObjectOwned::owned(INTERNAL_ERROR_CODE, error.to_string(), None::<()>)
            }
        }
    }
}

/// Shared state behind both namespaces
#[derive(Clone)]
pub struct Gateway<C> {
    connector: C,
    engine: Arc<dyn ScriptEngine>,
    poll_interval: Duration,
}

impl<C: NodeConnector> Gateway<C> {
    pub fn new(connector: C, engine: Arc<dyn ScriptEngine>, poll_interval: Duration) -> Self {
        Self {
            connector,
            engine,
            poll_interval,
        }
    }

    /// Both namespaces in one module. Fails if a method name is registered twice.
    pub fn into_module(self) -> anyhow::Result<RpcModule<()>> {
        let mut module = RpcModule::new(());
        module.merge(QueryApiServer::into_rpc(self.clone()))?;
        module.merge(SubmitApiServer::into_rpc(self))?;
        Ok(module)
    }
}

/// Serves the JSON-RPC api on `addr` until `cancel` fires.
pub async fn serve<C: NodeConnector>(
    addr: SocketAddr,
    gateway: Gateway<C>,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    let module = gateway.into_module()?;
    let server = Server::builder().build(addr).await?;
    info!(address = %server.local_addr()?, "JSON-RPC api listening");

    let handle = server.start(module);
    cancel.cancelled().await;

    // already stopped if it fails
    let _ = handle.stop();
    handle.stopped().await;
    Ok(())
}

/// Relays `items` produced by `task` to a subscriber until the task finishes or the subscriber
/// goes away. The task is cancelled through `cancel` in the latter case.
async fn forward<T, M, F>(
    sink: SubscriptionSink,
    mut items: mpsc::Receiver<T>,
    cancel: CancellationToken,
    task: JoinHandle<Result<(), GatewayError>>,
    render: F,
) -> SubscriptionResult
where
    M: Serialize,
    F: Fn(T) -> M,
{
    loop {
        tokio::select! {
            _ = sink.closed() => {
                debug!("subscriber went away");
                break;
            }
            item = items.recv() => {
                let Some(item) = item else { break };
                let message = SubscriptionMessage::from_json(&render(item))?;
                if sink.send(message).await.is_err() {
                    break;
                }
            }
        }
    }

    cancel.cancel();
    match task.await {
        Ok(result) => result.map_err(Into::into),
        Err(e) => Err(e.into()),
    }
}
