use pallas::network::miniprotocols::localstate::queries_v16 as q;
use serde::Serialize;

use crate::primitives::{ExUnits, PlutusVersion};

/// Cost model arrays per Plutus version, in the order the node reports them
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CostModels {
    #[serde(rename = "PlutusV1", skip_serializing_if = "Option::is_none")]
    pub plutus_v1: Option<Vec<i64>>,
    #[serde(rename = "PlutusV2", skip_serializing_if = "Option::is_none")]
    pub plutus_v2: Option<Vec<i64>>,
    #[serde(rename = "PlutusV3", skip_serializing_if = "Option::is_none")]
    pub plutus_v3: Option<Vec<i64>>,
}

impl CostModels {
    pub fn get(&self, version: PlutusVersion) -> Option<&[i64]> {
        match version {
            PlutusVersion::V1 => self.plutus_v1.as_deref(),
            PlutusVersion::V2 => self.plutus_v2.as_deref(),
            PlutusVersion::V3 => self.plutus_v3.as_deref(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.plutus_v1.is_none() && self.plutus_v2.is_none() && self.plutus_v3.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProtocolVersion {
    pub major: u64,
    pub minor: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Ratio {
    pub numerator: u64,
    pub denominator: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ExecutionPrices {
    pub memory: Ratio,
    pub steps: Ratio,
}

/// Current protocol parameters. The node leaves out fields that do not exist in the current era.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProtocolParams {
    pub min_fee_a: Option<u64>,
    pub min_fee_b: Option<u64>,
    pub max_block_body_size: Option<u64>,
    pub max_tx_size: Option<u64>,
    pub max_block_header_size: Option<u64>,
    pub key_deposit: Option<u64>,
    pub pool_deposit: Option<u64>,
    pub min_pool_cost: Option<u64>,
    pub protocol_version: Option<ProtocolVersion>,
    pub coins_per_utxo_byte: Option<u64>,
    pub cost_models: CostModels,
    pub execution_prices: Option<ExecutionPrices>,
    pub max_tx_ex_units: Option<ExUnits>,
    pub max_block_ex_units: Option<ExUnits>,
    pub max_value_size: Option<u64>,
    pub collateral_percentage: Option<u64>,
    pub max_collateral_inputs: Option<u64>,
}

impl ProtocolParams {
    /// `(major, minor)`, `(0, 0)` when the node did not report one
    pub fn version(&self) -> ProtocolVersion {
        self.protocol_version.unwrap_or(ProtocolVersion { major: 0, minor: 0 })
    }
}

fn ratio(value: &q::RationalNumber) -> Ratio {
    Ratio {
        numerator: u64::from(value.numerator),
        denominator: u64::from(value.denominator),
    }
}

fn ex_units(value: &q::ExUnits) -> ExUnits {
    ExUnits::new(u64::from(value.mem), u64::from(value.steps))
}

impl From<&q::ProtocolParam> for ProtocolParams {
    fn from(params: &q::ProtocolParam) -> Self {
        let cost_models = params
            .cost_models_for_script_languages
            .as_ref()
            .map(|models| CostModels {
                plutus_v1: models.plutus_v1.clone(),
                plutus_v2: models.plutus_v2.clone(),
                plutus_v3: models.plutus_v3.clone(),
            })
            .unwrap_or_default();

        Self {
            min_fee_a: params.minfee_a.map(u64::from),
            min_fee_b: params.minfee_b.map(u64::from),
            max_block_body_size: params.max_block_body_size.map(u64::from),
            max_tx_size: params.max_transaction_size.map(u64::from),
            max_block_header_size: params.max_block_header_size.map(u64::from),
            key_deposit: params.key_deposit.clone().map(u64::from),
            pool_deposit: params.pool_deposit.clone().map(u64::from),
            min_pool_cost: params.min_pool_cost.clone().map(u64::from),
            protocol_version: params
                .protocol_version
                .map(|(major, minor)| ProtocolVersion { major, minor }),
            coins_per_utxo_byte: params.ada_per_utxo_byte.clone().map(u64::from),
            cost_models,
            execution_prices: params.execution_costs.as_ref().map(|prices| ExecutionPrices {
                memory: ratio(&prices.mem_price),
                steps: ratio(&prices.step_price),
            }),
            max_tx_ex_units: params.max_tx_ex_units.as_ref().map(ex_units),
            max_block_ex_units: params.max_block_ex_units.as_ref().map(ex_units),
            max_value_size: params.max_value_size.map(u64::from),
            collateral_percentage: params.collateral_percentage.map(u64::from),
            max_collateral_inputs: params.max_collateral_inputs.map(u64::from),
        }
    }
}
