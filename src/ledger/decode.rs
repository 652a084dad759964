use pallas::ledger::primitives::conway::{DatumOption as EraDatum, RedeemerTag as EraTag, ScriptRef as EraScript};
use pallas::ledger::traverse::{MultiEraBlock, MultiEraOutput, MultiEraTx};

use super::{BlockSummary, Transaction};
use crate::error::DecodeError;
use crate::plutus::Data;
use crate::primitives::{
    DatumOption, Era, ExUnits, Input, KeyHash, Mint, Output, PlutusScript, PlutusVersion,
    Redeemer, RedeemerTag, RewardAccount, ScriptRef, Value, WitnessDatum,
};

/// Decodes a transaction, detecting its era from the bytes.
pub fn decode_transaction(bytes: &[u8]) -> Result<Transaction, DecodeError> {
    let tx = MultiEraTx::decode(bytes).map_err(|e| DecodeError::Transaction(e.to_string()))?;
    project_transaction(&tx, bytes)
}

/// Decodes a transaction the node reported as belonging to `era`.
pub fn decode_transaction_for_era(era: Era, bytes: &[u8]) -> Result<Transaction, DecodeError> {
    let tx = MultiEraTx::decode_for_era(era.into(), bytes)
        .map_err(|e| DecodeError::Transaction(e.to_string()))?;
    project_transaction(&tx, bytes)
}

/// Decodes a single output as returned by a UTxO query. `raw` is kept verbatim.
pub fn decode_output(raw: Vec<u8>) -> Result<Output, DecodeError> {
    let output = MultiEraOutput::decode(pallas::ledger::traverse::Era::Conway, &raw)
        .map_err(|e| DecodeError::Output(e.to_string()))?;
    project_output(&output, raw.clone())
}

pub fn decode_block(bytes: &[u8]) -> Result<BlockSummary, DecodeError> {
    let block = MultiEraBlock::decode(bytes).map_err(|e| DecodeError::Block(e.to_string()))?;

    Ok(BlockSummary {
        slot: block.slot(),
        hash: block.hash(),
        number: block.number(),
        tx_hashes: block.txs().iter().map(|tx| tx.hash()).collect(),
    })
}

fn project_transaction(tx: &MultiEraTx<'_>, raw: &[u8]) -> Result<Transaction, DecodeError> {
    let outputs = tx
        .outputs()
        .iter()
        .map(|output| project_output(output, output.encode()))
        .collect::<Result<Vec<_>, _>>()?;

    let mut mint = Mint::new();
    for policy in tx.mints() {
        for asset in policy.assets() {
            if let Some(quantity) = asset.mint_coin() {
                *mint
                    .entry(*policy.policy())
                    .or_default()
                    .entry(asset.name().to_vec())
                    .or_default() += quantity;
            }
        }
    }

    let withdrawals = tx
        .withdrawals_sorted_set()
        .into_iter()
        .map(|(account, amount)| (RewardAccount::from(account.to_vec()), amount))
        .collect();

    let required_signers: Vec<KeyHash> = tx
        .required_signers()
        .collect::<Vec<&KeyHash>>()
        .into_iter()
        .copied()
        .collect();

    let scripts = tx
        .plutus_v1_scripts()
        .iter()
        .map(|s| PlutusScript::new(PlutusVersion::V1, s.0.to_vec()))
        .chain(
            tx.plutus_v2_scripts()
                .iter()
                .map(|s| PlutusScript::new(PlutusVersion::V2, s.0.to_vec())),
        )
        .chain(
            tx.plutus_v3_scripts()
                .iter()
                .map(|s| PlutusScript::new(PlutusVersion::V3, s.0.to_vec())),
        )
        .collect();

    let redeemers = tx
        .redeemers()
        .iter()
        .map(|redeemer| {
            let data = pallas::codec::minicbor::to_vec(redeemer.data())
                .map_err(|e| DecodeError::PlutusData(e.to_string()))?;
            let ex_units = redeemer.ex_units();

            Ok(Redeemer {
                tag: redeemer_tag(redeemer.tag()),
                index: redeemer.index(),
                data: Data::from_cbor(&data).map_err(|e| DecodeError::PlutusData(e.to_string()))?,
                ex_units: ExUnits::new(ex_units.mem, ex_units.steps),
            })
        })
        .collect::<Result<Vec<_>, DecodeError>>()?;

    let datums = tx
        .plutus_data()
        .iter()
        .map(|datum| {
            WitnessDatum::from_cbor(datum.raw_cbor())
                .map_err(|e| DecodeError::PlutusData(e.to_string()))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Transaction {
        hash: tx.hash(),
        era: tx.era().into(),
        inputs: tx.inputs().iter().map(Input::from).collect(),
        reference_inputs: tx.reference_inputs().iter().map(Input::from).collect(),
        outputs,
        fee: tx.fee().unwrap_or_default(),
        mint,
        withdrawals,
        validity_start: tx.validity_start(),
        ttl: tx.ttl(),
        required_signers,
        scripts,
        redeemers,
        datums,
        raw: raw.to_vec(),
    })
}

fn project_output(output: &MultiEraOutput<'_>, raw: Vec<u8>) -> Result<Output, DecodeError> {
    let address = output
        .address()
        .map_err(|e| DecodeError::Output(e.to_string()))?
        .to_vec();

    let era_value = output.value();
    let mut value = Value::lovelace(era_value.coin());
    for policy in era_value.assets() {
        for asset in policy.assets() {
            if let Some(quantity) = asset.output_coin() {
                value = value.with_asset(*policy.policy(), asset.name().to_vec(), quantity);
            }
        }
    }

    let datum = output.datum().map(|datum| match datum {
        EraDatum::Hash(hash) => DatumOption::Hash(hash),
        EraDatum::Data(data) => DatumOption::Inline(data.0.raw_cbor().to_vec()),
    });

    let script_ref = match output.script_ref() {
        Some(EraScript::NativeScript(script)) => Some(ScriptRef::Native(
            pallas::codec::minicbor::to_vec(&script)
                .map_err(|e| DecodeError::Output(e.to_string()))?,
        )),
        Some(EraScript::PlutusV1Script(script)) => Some(ScriptRef::Plutus(PlutusScript::new(
            PlutusVersion::V1,
            script.0.to_vec(),
        ))),
        Some(EraScript::PlutusV2Script(script)) => Some(ScriptRef::Plutus(PlutusScript::new(
            PlutusVersion::V2,
            script.0.to_vec(),
        ))),
        Some(EraScript::PlutusV3Script(script)) => Some(ScriptRef::Plutus(PlutusScript::new(
            PlutusVersion::V3,
            script.0.to_vec(),
        ))),
        None => None,
    };

    Ok(Output {
        address,
        value,
        datum,
        script_ref,
        raw,
    })
}

fn redeemer_tag(tag: EraTag) -> RedeemerTag {
    match tag {
        EraTag::Spend => RedeemerTag::Spend,
        EraTag::Mint => RedeemerTag::Mint,
        EraTag::Cert => RedeemerTag::Cert,
        EraTag::Reward => RedeemerTag::Reward,
        EraTag::Vote => RedeemerTag::Vote,
        EraTag::Propose => RedeemerTag::Propose,
    }
}
