//! Wire shapes of the JSON-RPC surface. Byte strings are hex.

use std::collections::BTreeMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::confirm::Confirmation;
use crate::error::GatewayError;
use crate::eval::RedeemerEvaluation;
use crate::ledger::Transaction;
use crate::node::{ChainPoint, ProtocolParams, UtxoSet};
use crate::primitives::{
    DatumOption, Input, Output, PolicyId, TxHash, datum_hash, display_address, parse_address,
};
use crate::query::{AssetPattern, UtxoPredicate};
use crate::submit::SubmitOutcome;

fn invalid(msg: impl Into<String>) -> GatewayError {
    GatewayError::InvalidRequest(msg.into())
}

fn hex_field(name: &str, value: &str) -> Result<Vec<u8>, GatewayError> {
    hex::decode(value).map_err(|e| invalid(format!("invalid {name} hex: {e}")))
}

pub fn parse_tx_hash(value: &str) -> Result<TxHash, GatewayError> {
    TxHash::from_str(value).map_err(|_| invalid(format!("invalid transaction hash {value}")))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerTip {
    pub slot: u64,
    pub hash: String,
}

impl From<&ChainPoint> for LedgerTip {
    fn from(point: &ChainPoint) -> Self {
        Self {
            slot: point.slot(),
            hash: hex::encode(point.hash()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReadParamsResponse {
    pub ledger_tip: LedgerTip,
    pub params: ProtocolParams,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxoRef {
    pub hash: String,
    pub index: u64,
}

impl TxoRef {
    pub fn parse(&self) -> Result<Input, GatewayError> {
        Ok(Input::new(parse_tx_hash(&self.hash)?, self.index))
    }
}

impl From<&Input> for TxoRef {
    fn from(input: &Input) -> Self {
        Self {
            hash: input.hash.to_string(),
            index: input.index,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AnyUtxo {
    pub txo_ref: TxoRef,
    pub native_bytes: String,
    pub address: String,
    pub coin: u64,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub assets: BTreeMap<String, BTreeMap<String, u64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub datum_hash: Option<String>,
    /// Hash of the reference script
    #[serde(skip_serializing_if = "Option::is_none")]
    pub script_ref: Option<String>,
}

impl AnyUtxo {
    fn new(input: &Input, output: &Output) -> Self {
        let datum_hash = output.datum.as_ref().map(|datum| match datum {
            DatumOption::Hash(hash) => hash.to_string(),
            DatumOption::Inline(raw) => datum_hash(raw).to_string(),
        });

        Self {
            txo_ref: input.into(),
            native_bytes: hex::encode(&output.raw),
            address: display_address(&output.address),
            coin: output.value.lovelace,
            assets: output.value.assets_hex(),
            datum_hash,
            script_ref: output.script_ref.as_ref().map(|script| script.hash().to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct UtxoList {
    pub ledger_tip: LedgerTip,
    pub items: Vec<AnyUtxo>,
}

impl UtxoList {
    pub fn new(tip: &ChainPoint, utxos: &UtxoSet) -> Self {
        Self {
            ledger_tip: tip.into(),
            items: utxos
                .iter()
                .map(|(input, output)| AnyUtxo::new(input, output))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AssetParams {
    pub policy_id: String,
    pub asset_name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PredicateParams {
    pub address: Option<String>,
    pub payment_part: Option<String>,
    pub delegation_part: Option<String>,
    pub asset: Option<AssetParams>,
}

impl TryFrom<PredicateParams> for UtxoPredicate {
    type Error = GatewayError;

    fn try_from(params: PredicateParams) -> Result<Self, Self::Error> {
        let asset = params
            .asset
            .map(|asset| {
                let policy: [u8; 28] = hex_field("policy_id", &asset.policy_id)?
                    .try_into()
                    .map_err(|_| invalid("policy_id must be 28 bytes"))?;
                let name = asset
                    .asset_name
                    .map(|name| hex_field("asset_name", &name))
                    .transpose()?;

                Ok::<_, GatewayError>(AssetPattern {
                    policy: PolicyId::new(policy),
                    name,
                })
            })
            .transpose()?;

        Ok(UtxoPredicate {
            address: params
                .address
                .map(|address| parse_address(&address))
                .transpose()
                .map_err(invalid)?,
            payment_part: params
                .payment_part
                .map(|part| hex_field("payment_part", &part))
                .transpose()?,
            delegation_part: params
                .delegation_part
                .map(|part| hex_field("delegation_part", &part))
                .transpose()?,
            asset,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Mempool,
    Confirmed,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum SubmitItem {
    Accepted {
        #[serde(rename = "ref")]
        tx_ref: String,
    },
    Failed {
        error: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
}

impl From<SubmitOutcome> for SubmitItem {
    fn from(outcome: SubmitOutcome) -> Self {
        match outcome {
            SubmitOutcome::Accepted(hash) => SubmitItem::Accepted {
                tx_ref: hash.to_string(),
            },
            SubmitOutcome::Failed(error) => {
                let reason = match &error {
                    GatewayError::Rejected { reason } => Some(hex::encode(reason)),
                    _ => None,
                };
                SubmitItem::Failed {
                    error: error.to_string(),
                    reason,
                }
            }
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EvalResponse {
    pub redeemers: Vec<RedeemerEvaluation>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MempoolItem {
    #[serde(rename = "ref")]
    pub tx_ref: String,
    pub native_bytes: String,
    pub stage: Stage,
}

impl From<Transaction> for MempoolItem {
    fn from(tx: Transaction) -> Self {
        Self {
            tx_ref: tx.hash.to_string(),
            native_bytes: hex::encode(&tx.raw),
            stage: Stage::Mempool,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MempoolList {
    pub items: Vec<MempoolItem>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConfirmedItem {
    #[serde(rename = "ref")]
    pub tx_ref: String,
    pub stage: Stage,
    pub slot: u64,
    pub block_hash: String,
}

impl From<Confirmation> for ConfirmedItem {
    fn from(confirmation: Confirmation) -> Self {
        Self {
            tx_ref: confirmation.hash.to_string(),
            stage: Stage::Confirmed,
            slot: confirmation.slot,
            block_hash: confirmation.block_hash.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::{ScriptRef, Value};
    use crate::testing::{key_address, sample_script};

    #[test]
    fn test_predicate_params() {
        let params = PredicateParams {
            address: Some(hex::encode(key_address(4))),
            payment_part: Some("04".repeat(28)),
            asset: Some(AssetParams {
                policy_id: "aa".repeat(28),
                asset_name: None,
            }),
            ..Default::default()
        };

        let predicate = UtxoPredicate::try_from(params).unwrap();

        assert_eq!(predicate.address, Some(key_address(4)));
        assert_eq!(predicate.payment_part, Some(vec![4; 28]));
        assert_eq!(predicate.asset.unwrap().name, None);
    }

    #[test]
    fn test_predicate_params_reject_short_policy() {
        let params = PredicateParams {
            asset: Some(AssetParams {
                policy_id: "aa".into(),
                asset_name: Some("00".into()),
            }),
            ..Default::default()
        };

        assert!(matches!(
            UtxoPredicate::try_from(params),
            Err(GatewayError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_any_utxo_shape() {
        let input = Input::new(TxHash::new([2; 32]), 1);
        let mut output = Output::new(key_address(1), Value::lovelace(9))
            .with_datum(DatumOption::Inline(vec![0x01]))
            .with_script_ref(ScriptRef::Plutus(sample_script()));
        output.raw = vec![0xab, 0xcd];

        let json = serde_json::to_value(AnyUtxo::new(&input, &output)).unwrap();

        assert_eq!(json["txo_ref"]["hash"], "02".repeat(32));
        assert_eq!(json["txo_ref"]["index"], 1);
        assert_eq!(json["native_bytes"], "abcd");
        assert_eq!(json["coin"], 9);
        assert_eq!(json["datum_hash"], datum_hash(&[0x01]).to_string());
        assert_eq!(json["script_ref"], sample_script().hash().to_string());
        assert!(json.get("assets").is_none());
    }

    #[test]
    fn test_submit_item_shapes() {
        let accepted = SubmitItem::from(SubmitOutcome::Accepted(TxHash::new([1; 32])));
        let rejected = SubmitItem::from(SubmitOutcome::Failed(GatewayError::Rejected {
            reason: vec![0x80],
        }));

        assert_eq!(
            serde_json::to_value(accepted).unwrap(),
            serde_json::json!({ "ref": "01".repeat(32) })
        );
        assert_eq!(
            serde_json::to_value(rejected).unwrap(),
            serde_json::json!({ "error": "transaction rejected by node", "reason": "80" })
        );
    }
}
