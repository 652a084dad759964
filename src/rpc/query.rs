use jsonrpsee::core::RpcResult;
use jsonrpsee::proc_macros::rpc;
use tracing::instrument;

use super::Gateway;
use super::types::{PredicateParams, ReadParamsResponse, TxoRef, UtxoList};
use crate::error::GatewayError;
use crate::node::NodeConnector;
use crate::query::{self, UtxoPredicate};
use crate::with_session;

#[rpc(server, namespace = "query")]
pub trait QueryApi {
    /// Current protocol parameters and the tip they were read at
    #[method(name = "readParams")]
    async fn read_params(&self) -> RpcResult<ReadParamsResponse>;

    /// Outputs at the given references. Unknown references are left out.
    #[method(name = "readUtxos")]
    async fn read_utxos(&self, refs: Vec<TxoRef>) -> RpcResult<UtxoList>;

    #[method(name = "searchUtxos")]
    async fn search_utxos(&self, predicate: PredicateParams) -> RpcResult<UtxoList>;
}

impl<C: NodeConnector> Gateway<C> {
    pub(super) async fn params(&self) -> Result<ReadParamsResponse, GatewayError> {
        let params = with_session!(self.connector, |session| query::read_params(&mut session))?;

        Ok(ReadParamsResponse {
            ledger_tip: (&params.tip).into(),
            params: params.value,
        })
    }

    pub(super) async fn utxos(&self, refs: Vec<TxoRef>) -> Result<UtxoList, GatewayError> {
        let refs = refs
            .iter()
            .map(TxoRef::parse)
            .collect::<Result<Vec<_>, _>>()?;

        let found = with_session!(self.connector, |session| query::read_utxos(
            &mut session,
            &refs
        ))?;
        Ok(UtxoList::new(&found.tip, &found.value))
    }

    pub(super) async fn search(&self, predicate: PredicateParams) -> Result<UtxoList, GatewayError> {
        let predicate = UtxoPredicate::try_from(predicate)?;

        let found = with_session!(self.connector, |session| query::search_utxos(
            &mut session,
            &predicate
        ))?;
        Ok(UtxoList::new(&found.tip, &found.value))
    }
}

#[jsonrpsee::core::async_trait]
impl<C: NodeConnector> QueryApiServer for Gateway<C> {
    #[instrument(skip_all)]
    async fn read_params(&self) -> RpcResult<ReadParamsResponse> {
        Ok(self.params().await?)
    }

    #[instrument(skip_all, fields(refs = refs.len()))]
    async fn read_utxos(&self, refs: Vec<TxoRef>) -> RpcResult<UtxoList> {
        Ok(self.utxos(refs).await?)
    }

    #[instrument(skip_all)]
    async fn search_utxos(&self, predicate: PredicateParams) -> RpcResult<UtxoList> {
        Ok(self.search(predicate).await?)
    }
}
