use pallas_primitives::conway::Language;
use uplc::ast::{FakeNamedDeBruijn, NamedDeBruijn, Program};
use uplc::machine::cost_model::ExBudget;

use crate::node::ProtocolVersion;
use crate::plutus::Data;
use crate::primitives::{ExUnits, PlutusScript, PlutusVersion};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    #[error("could not decode script: {0}")]
    Script(String),
    #[error("could not convert argument: {0}")]
    Argument(String),
    #[error("script failed: {0}")]
    Failed(String),
}

/// Runs a single script.
///
/// `budget` is an upper bound, the returned units are what the script actually consumed.
pub trait ScriptEngine: Send + Sync {
    fn evaluate(
        &self,
        script: &PlutusScript,
        args: &[Data],
        budget: ExUnits,
        protocol_version: ProtocolVersion,
        cost_model: &[i64],
    ) -> Result<ExUnits, EngineError>;
}

/// [`ScriptEngine`] on top of the `uplc` machine
#[derive(Debug, Clone, Copy, Default)]
pub struct UplcEngine;

fn language(version: PlutusVersion) -> Language {
    match version {
        PlutusVersion::V1 => Language::PlutusV1,
        PlutusVersion::V2 => Language::PlutusV2,
        PlutusVersion::V3 => Language::PlutusV3,
    }
}

impl ScriptEngine for UplcEngine {
    // the machine has no notion of protocol versions, its cost model array is version specific
    fn evaluate(
        &self,
        script: &PlutusScript,
        args: &[Data],
        budget: ExUnits,
        _protocol_version: ProtocolVersion,
        cost_model: &[i64],
    ) -> Result<ExUnits, EngineError> {
        let mut buffer = Vec::new();
        let mut program: Program<NamedDeBruijn> =
            Program::<FakeNamedDeBruijn>::from_cbor(&script.bytes, &mut buffer)
                .map_err(|e| EngineError::Script(e.to_string()))?
                .into();

        for arg in args {
            let data = uplc::plutus_data(&arg.to_cbor())
                .map_err(|e| EngineError::Argument(e.to_string()))?;
            program = program.apply_data(data);
        }

        let limit = ExBudget {
            mem: i64::try_from(budget.mem).unwrap_or(i64::MAX),
            cpu: i64::try_from(budget.steps).unwrap_or(i64::MAX),
        };
        let result = program.eval_as(&language(script.version), cost_model, Some(&limit));
        let spent = result.cost();

        result
            .result()
            .map_err(|e| EngineError::Failed(e.to_string()))?;

        Ok(ExUnits::new(
            u64::try_from(spent.mem).unwrap_or_default(),
            u64::try_from(spent.cpu).unwrap_or_default(),
        ))
    }
}
