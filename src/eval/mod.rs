//! Execution unit estimation for the redeemers of a transaction.
//!
//! Every redeemer is evaluated on its own. A redeemer that can not be resolved or whose script
//! fails gets a zero cost entry carrying the reason, the rest of the batch is unaffected.

mod engine;

pub use engine::*;

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, instrument, warn};

use crate::error::{GatewayError, NodeError, ResolutionError};
use crate::ledger::Transaction;
use crate::node::{NodeSession, ProtocolParams, UtxoSet};
use crate::plutus::{ContextAssembler, Data};
use crate::primitives::{
    Credential, DatumOption, ExUnits, PlutusScript, PlutusVersion, Redeemer, RedeemerTag,
    ScriptHash, ScriptRef,
};

/// Memory ceiling for a single script run
pub const MAX_MEMORY: u64 = 14_000_000;
/// Step ceiling for a single script run
pub const MAX_STEPS: u64 = 10_000_000_000;

pub fn budget() -> ExUnits {
    ExUnits::new(MAX_MEMORY, MAX_STEPS)
}

/// Outcome for one redeemer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RedeemerEvaluation {
    #[serde(rename = "purpose")]
    pub tag: RedeemerTag,
    pub index: u32,
    pub ex_units: ExUnits,
    #[serde(skip_serializing_if = "Option::is_none", serialize_with = "display")]
    pub error: Option<ResolutionError>,
}

fn display<S: serde::Serializer>(
    error: &Option<ResolutionError>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match error {
        Some(error) => serializer.collect_str(error),
        None => serializer.serialize_none(),
    }
}

/// Plutus scripts available to a transaction, from its witnesses and from the outputs it
/// spends or references.
#[derive(Debug, Clone, Default)]
pub struct ScriptTable(BTreeMap<ScriptHash, PlutusScript>);

impl ScriptTable {
    pub fn new(tx: &Transaction, utxos: &UtxoSet) -> Self {
        let mut scripts = BTreeMap::new();

        for script in &tx.scripts {
            scripts.insert(script.hash(), script.clone());
        }

        for input in tx.all_inputs() {
            if let Some(ScriptRef::Plutus(script)) =
                utxos.get(&input).and_then(|output| output.script_ref.as_ref())
            {
                scripts.insert(script.hash(), script.clone());
            }
        }

        Self(scripts)
    }

    pub fn get(&self, hash: &ScriptHash) -> Result<&PlutusScript, ResolutionError> {
        self.0.get(hash).ok_or(ResolutionError::ScriptNotFound(*hash))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A redeemer resolved down to what the engine needs
struct Plan<'a> {
    script: &'a PlutusScript,
    args: Vec<Data>,
    cost_model: &'a [i64],
}

/// Evaluates every redeemer of `tx` against a resolved UTxO snapshot. Results are in the
/// transaction's redeemer order.
pub fn evaluate_redeemers(
    engine: &dyn ScriptEngine,
    tx: &Transaction,
    utxos: &UtxoSet,
    params: &ProtocolParams,
    system_start_ms: i64,
) -> Result<Vec<RedeemerEvaluation>, GatewayError> {
    if params.cost_models.is_empty() {
        return Err(GatewayError::MissingCostModels);
    }

    let table = ScriptTable::new(tx, utxos);
    let assembler = ContextAssembler::new(tx, utxos, system_start_ms);
    debug!(scripts = table.len(), redeemers = tx.redeemers.len(), "evaluating");

    let evaluations = tx
        .redeemers
        .iter()
        .map(|redeemer| {
            let outcome = assembler
                .as_ref()
                .map_err(Clone::clone)
                .and_then(|assembler| plan(tx, utxos, params, &table, assembler, redeemer))
                .and_then(|plan| {
                    engine
                        .evaluate(
                            plan.script,
                            &plan.args,
                            budget(),
                            params.version(),
                            plan.cost_model,
                        )
                        .map_err(|e| ResolutionError::Evaluation(e.to_string()))
                });

            match outcome {
                Ok(ex_units) => RedeemerEvaluation {
                    tag: redeemer.tag,
                    index: redeemer.index,
                    ex_units,
                    error: None,
                },
                Err(error) => {
                    warn!(redeemer = %redeemer.key(), %error, "could not evaluate redeemer");
                    RedeemerEvaluation {
                        tag: redeemer.tag,
                        index: redeemer.index,
                        ex_units: ExUnits::default(),
                        error: Some(error),
                    }
                }
            }
        })
        .collect();

    Ok(evaluations)
}

fn plan<'a>(
    tx: &Transaction,
    utxos: &UtxoSet,
    params: &'a ProtocolParams,
    table: &'a ScriptTable,
    assembler: &ContextAssembler,
    redeemer: &Redeemer,
) -> Result<Plan<'a>, ResolutionError> {
    let order = assembler.order();

    let (script, datum) = match redeemer.tag {
        RedeemerTag::Spend => {
            let input = order.spent_input(redeemer.index)?;
            let output = utxos
                .get(input)
                .ok_or(ResolutionError::MissingUtxo(*input))?;
            let hash = match output.payment_credential() {
                Some(Credential::Script(hash)) => hash,
                _ => return Err(ResolutionError::NotAScript(*input)),
            };
            let script = table.get(&hash)?;

            // datums are embedded in the context from version 3 on
            let datum = match script.version {
                PlutusVersion::V3 => None,
                _ => {
                    let datum = spent_datum(tx, output.datum.as_ref())
                        .ok_or(ResolutionError::MissingDatum(*input))??;
                    Some(datum)
                }
            };

            (script, datum)
        }
        RedeemerTag::Mint => (table.get(order.minted_policy(redeemer.index)?)?, None),
        tag => return Err(ResolutionError::UnsupportedPurpose(tag)),
    };

    let cost_model = params
        .cost_models
        .get(script.version)
        .ok_or(ResolutionError::MissingCostModel(script.version))?;

    let context = assembler.context_for(redeemer.key())?;
    let args = match script.version {
        PlutusVersion::V3 => vec![context],
        _ => datum
            .into_iter()
            .chain([redeemer.data.clone(), context])
            .collect(),
    };

    Ok(Plan {
        script,
        args,
        cost_model,
    })
}

/// Datum of a spent output. Hashes are resolved against the witness datums.
fn spent_datum(
    tx: &Transaction,
    datum: Option<&DatumOption>,
) -> Option<Result<Data, ResolutionError>> {
    match datum? {
        DatumOption::Inline(raw) => Some(
            Data::from_cbor(raw)
                .map_err(|e| ResolutionError::Unrepresentable(format!("inline datum: {e}"))),
        ),
        DatumOption::Hash(hash) => tx
            .datums
            .iter()
            .find(|datum| datum.hash == *hash)
            .map(|datum| Ok(datum.data.clone())),
    }
}

/// Resolves everything an evaluation needs through `session`, then evaluates on a blocking
/// worker.
#[instrument(skip_all, fields(tx_hash = %tx.hash))]
pub async fn evaluate_tx<S: NodeSession>(
    session: &mut S,
    engine: Arc<dyn ScriptEngine>,
    tx: Transaction,
) -> Result<Vec<RedeemerEvaluation>, GatewayError> {
    let params = session.protocol_params().await?;
    if params.cost_models.is_empty() {
        return Err(GatewayError::MissingCostModels);
    }

    let system_start_ms = session
        .system_start()
        .await?
        .unix_millis()
        .ok_or_else(|| NodeError::Unexpected("system start is not a valid date".into()))?;
    let utxos = session.utxos_by_refs(&tx.all_inputs()).await?;

    tokio::task::spawn_blocking(move || {
        evaluate_redeemers(engine.as_ref(), &tx, &utxos, &params, system_start_ms)
    })
    .await
    .map_err(|e| GatewayError::Task(e.to_string()))?
}
