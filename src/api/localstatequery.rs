use std::collections::BTreeMap;

use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use super::AppState;
use crate::error::GatewayError;
use crate::node::{EraSummary, NodeConnector, ProtocolParams};
use crate::plutus::SystemStart;
use crate::primitives::{PolicyId, display_address, parse_address};
use crate::query::{self, AssetPattern, UtxoPredicate};
use crate::with_session;

pub fn routes<C: NodeConnector>() -> Router<AppState<C>> {
    Router::new()
        .route("/current-era", get(current_era::<C>))
        .route("/era-history", get(era_history::<C>))
        .route("/system-start", get(system_start::<C>))
        .route("/tip", get(tip::<C>))
        .route("/protocol-params", get(protocol_params::<C>))
        .route("/utxos/search-by-asset", get(search_by_asset::<C>))
}

#[derive(Debug, Serialize)]
struct CurrentEra {
    id: u16,
    name: &'static str,
}

#[derive(Debug, Serialize)]
struct Tip {
    era: &'static str,
    hash: String,
    epoch_no: u64,
    block_no: u64,
    slot_no: u64,
}

#[derive(Debug, Deserialize)]
struct AssetSearch {
    policy_id: Option<String>,
    asset_name: Option<String>,
    address: Option<String>,
}

#[derive(Debug, Serialize)]
struct UtxoItem {
    tx_hash: String,
    index: u64,
    address: String,
    amount: u64,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    assets: BTreeMap<String, BTreeMap<String, u64>>,
}

#[derive(Debug, Serialize)]
struct AssetSearchResult {
    utxos: Vec<UtxoItem>,
    count: usize,
}

#[instrument(skip_all)]
async fn current_era<C: NodeConnector>(
    State(state): State<AppState<C>>,
) -> Result<Json<CurrentEra>, GatewayError> {
    let era = with_session!(state.connector, |session| query::current_era(&mut session))?;

    Ok(Json(CurrentEra {
        id: era.index(),
        name: era.name(),
    }))
}

#[instrument(skip_all)]
async fn era_history<C: NodeConnector>(
    State(state): State<AppState<C>>,
) -> Result<Json<Vec<EraSummary>>, GatewayError> {
    let history = with_session!(state.connector, |session| query::era_history(&mut session))?;
    Ok(Json(history.0))
}

#[instrument(skip_all)]
async fn system_start<C: NodeConnector>(
    State(state): State<AppState<C>>,
) -> Result<Json<SystemStart>, GatewayError> {
    let start = with_session!(state.connector, |session| query::system_start(&mut session))?;
    Ok(Json(start))
}

#[instrument(skip_all)]
async fn tip<C: NodeConnector>(
    State(state): State<AppState<C>>,
) -> Result<Json<Tip>, GatewayError> {
    let tip = with_session!(state.connector, |session| query::ledger_tip(&mut session))?;

    Ok(Json(Tip {
        era: tip.era.name(),
        hash: hex::encode(tip.point.hash()),
        epoch_no: tip.epoch,
        block_no: tip.block_number,
        slot_no: tip.point.slot(),
    }))
}

#[instrument(skip_all)]
async fn protocol_params<C: NodeConnector>(
    State(state): State<AppState<C>>,
) -> Result<Json<ProtocolParams>, GatewayError> {
    let params = with_session!(state.connector, |session| query::read_params(&mut session))?;
    Ok(Json(params.value))
}

#[instrument(skip_all)]
async fn search_by_asset<C: NodeConnector>(
    State(state): State<AppState<C>>,
    Query(search): Query<AssetSearch>,
) -> Result<Json<AssetSearchResult>, GatewayError> {
    let predicate = search.predicate()?;

    let found = with_session!(state.connector, |session| query::search_utxos(
        &mut session,
        &predicate
    ))?;

    let utxos: Vec<UtxoItem> = found
        .value
        .into_iter()
        .map(|(input, output)| UtxoItem {
            tx_hash: input.hash.to_string(),
            index: input.index,
            address: display_address(&output.address),
            amount: output.value.lovelace,
            assets: output.value.assets_hex(),
        })
        .collect();

    Ok(Json(AssetSearchResult {
        count: utxos.len(),
        utxos,
    }))
}

impl AssetSearch {
    fn predicate(&self) -> Result<UtxoPredicate, GatewayError> {
        let invalid = |msg: String| GatewayError::InvalidRequest(msg);

        let policy_hex = self
            .policy_id
            .as_deref()
            .filter(|policy| !policy.is_empty())
            .ok_or_else(|| invalid("policy_id parameter is required".into()))?;
        let policy = hex::decode(policy_hex)
            .map_err(|e| invalid(format!("invalid policy_id hex: {e}")))?;
        let policy: [u8; 28] = policy
            .try_into()
            .map_err(|_| invalid("policy_id must be 28 bytes".into()))?;

        let name_hex = self
            .asset_name
            .as_deref()
            .filter(|name| !name.is_empty())
            .ok_or_else(|| invalid("asset_name parameter is required".into()))?;
        let name =
            hex::decode(name_hex).map_err(|e| invalid(format!("invalid asset_name hex: {e}")))?;

        let address = self
            .address
            .as_deref()
            .filter(|address| !address.is_empty())
            .map(parse_address)
            .transpose()
            .map_err(invalid)?;

        Ok(UtxoPredicate {
            address,
            asset: Some(AssetPattern {
                policy: PolicyId::new(policy),
                name: Some(name),
            }),
            ..Default::default()
        })
    }
}
