use std::collections::BTreeMap;

use tracing::debug;

use super::{
    CanonicalOrder, Data, bool_data, mint_data, output_data, posix_time_range,
    staking_credential_data, tx_in_info_data, tx_out_ref_data, unit, value_data,
};
use crate::error::ResolutionError;
use crate::ledger::Transaction;
use crate::primitives::{Input, Output, RedeemerKey, RedeemerTag, StakeReference, Value};

/// UTxOs resolved for a single request
pub type ResolvedUtxos = BTreeMap<Input, Output>;

/// Builds script contexts for the redeemers of one transaction.
///
/// The `TxInfo` part does not depend on the redeemer, so it is built once and shared by every
/// context this assembler hands out.
#[derive(Debug, Clone)]
pub struct ContextAssembler {
    order: CanonicalOrder,
    tx_info: Data,
}

impl ContextAssembler {
    pub fn new(
        tx: &Transaction,
        utxos: &ResolvedUtxos,
        system_start_ms: i64,
    ) -> Result<Self, ResolutionError> {
        let order = CanonicalOrder::of(tx);
        let tx_info = tx_info_data(tx, &order, utxos, system_start_ms)?;

        Ok(Self { order, tx_info })
    }

    pub fn order(&self) -> &CanonicalOrder {
        &self.order
    }

    pub fn tx_info(&self) -> &Data {
        &self.tx_info
    }

    /// `ScriptContext{TxInfo, ScriptPurpose}` for the redeemer at `key`
    pub fn context_for(&self, key: RedeemerKey) -> Result<Data, ResolutionError> {
        let purpose = script_purpose(&self.order, key)?;
        Ok(Data::constr(0, vec![self.tx_info.clone(), purpose]))
    }
}

/// Builds the script context of a single redeemer.
pub fn assemble(
    tx: &Transaction,
    utxos: &ResolvedUtxos,
    tag: RedeemerTag,
    index: u32,
    system_start_ms: i64,
) -> Result<Data, ResolutionError> {
    ContextAssembler::new(tx, utxos, system_start_ms)?.context_for(RedeemerKey { tag, index })
}

/// Reward and Cert purposes are placeholders, the withdrawn credential and the certificate are
/// not attributed.
pub fn script_purpose(order: &CanonicalOrder, key: RedeemerKey) -> Result<Data, ResolutionError> {
    match key.tag {
        RedeemerTag::Mint => {
            let policy = order.minted_policy(key.index)?;
            Ok(Data::constr(0, vec![Data::bytes(policy)]))
        }
        RedeemerTag::Spend => {
            let input = order.spent_input(key.index)?;
            Ok(Data::constr(1, vec![tx_out_ref_data(input)]))
        }
        RedeemerTag::Reward => Ok(Data::constr(2, vec![unit(0)])),
        RedeemerTag::Cert => Ok(Data::constr(3, vec![unit(0)])),
        tag @ (RedeemerTag::Vote | RedeemerTag::Propose) => {
            Err(ResolutionError::UnsupportedPurpose(tag))
        }
    }
}

/// `TxInfo` in its version 2 layout:
/// `[inputs, reference inputs, outputs, fee, mint, certificates, withdrawals, valid range,
/// signatories, redeemers, datums, id]`
pub fn tx_info_data(
    tx: &Transaction,
    order: &CanonicalOrder,
    utxos: &ResolvedUtxos,
    system_start_ms: i64,
) -> Result<Data, ResolutionError> {
    // unresolved inputs are left out, their redeemers fail on their own
    let inputs = order
        .inputs
        .iter()
        .filter_map(|input| utxos.get(input).map(|output| tx_in_info_data(input, output)))
        .collect::<Result<Vec<_>, _>>()?;

    let reference_inputs = tx
        .reference_inputs
        .iter()
        .filter_map(|input| utxos.get(input).map(|output| tx_in_info_data(input, output)))
        .collect::<Result<Vec<_>, _>>()?;

    let outputs = tx
        .outputs
        .iter()
        .map(output_data)
        .collect::<Result<Vec<_>, _>>()?;

    let withdrawals = tx
        .withdrawals
        .iter()
        .filter_map(|(account, amount)| {
            let credential = account.credential()?;
            Some((
                staking_credential_data(&StakeReference::Credential(credential)),
                Data::int(*amount),
            ))
        })
        .collect();

    let signatories = tx.required_signers.iter().map(Data::bytes).collect();

    let mut keys: Vec<RedeemerKey> = Vec::with_capacity(tx.redeemers.len());
    let mut redeemers = Vec::with_capacity(tx.redeemers.len());
    let mut sorted: Vec<_> = tx.redeemers.iter().collect();
    sorted.sort_by_key(|redeemer| redeemer.key());
    for redeemer in sorted {
        let key = redeemer.key();
        if keys.contains(&key) {
            continue;
        }
        match script_purpose(order, key) {
            Ok(purpose) => {
                keys.push(key);
                redeemers.push((purpose, redeemer.data.clone()));
            }
            Err(err) => debug!(redeemer = %key, %err, "leaving redeemer out of tx info"),
        }
    }

    let datums = tx
        .datums
        .iter()
        .map(|datum| (Data::bytes(datum.hash), datum.data.clone()))
        .collect();

    Ok(Data::constr(
        0,
        vec![
            Data::List(inputs),
            Data::List(reference_inputs),
            Data::List(outputs),
            value_data(&Value::lovelace(tx.fee)),
            mint_data(&tx.mint),
            Data::List(vec![]),
            Data::Map(withdrawals),
            posix_time_range(
                tx.validity_start.unwrap_or_default(),
                tx.ttl.unwrap_or_default(),
                system_start_ms,
            ),
            Data::List(signatories),
            Data::Map(redeemers),
            Data::Map(datums),
            Data::constr(0, vec![Data::bytes(tx.hash)]),
        ],
    ))
}
