use crate::primitives::{Input, PlutusVersion, RedeemerTag, ScriptHash};

/// Failures talking to the node
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NodeError {
    #[error("could not connect to node: {0}")]
    Connect(String),
    #[error("timed out connecting to node")]
    ConnectTimeout,
    /// A single round trip exceeded the query timeout
    #[error("node did not answer {0} in time")]
    Timeout(&'static str),
    #[error("{operation} failed: {reason}")]
    Protocol {
        operation: &'static str,
        reason: String,
    },
    #[error("unexpected reply from node: {0}")]
    Unexpected(String),
    #[error("node session already closed")]
    Closed,
}

/// Bytes that could not be understood as a ledger structure
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("malformed transaction: {0}")]
    Transaction(String),
    #[error("malformed transaction output: {0}")]
    Output(String),
    #[error("malformed block: {0}")]
    Block(String),
    #[error("malformed plutus data: {0}")]
    PlutusData(String),
    #[error("unsupported era {0}")]
    UnsupportedEra(u16),
}

/// Reasons a single redeemer could not be evaluated. These never fail a whole request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolutionError {
    #[error("{tag} redeemer index {index} out of range ({len} candidates)")]
    IndexOutOfRange {
        tag: RedeemerTag,
        index: u32,
        len: usize,
    },
    #[error("mint redeemer {0} but the transaction mints nothing")]
    NoMint(u32),
    #[error("input {0} could not be resolved")]
    MissingUtxo(Input),
    #[error("input {0} carries no datum")]
    MissingDatum(Input),
    #[error("input {0} is not locked by a script")]
    NotAScript(Input),
    #[error("{0} redeemers are not supported")]
    UnsupportedPurpose(RedeemerTag),
    #[error("script {0} not found in witnesses or reference inputs")]
    ScriptNotFound(ScriptHash),
    #[error("no cost model for {0:?}")]
    MissingCostModel(PlutusVersion),
    #[error("transaction can not be represented as plutus data: {0}")]
    Unrepresentable(String),
    #[error("script evaluation failed: {0}")]
    Evaluation(String),
}

/// Request level failures
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error(transparent)]
    Connection(#[from] NodeError),
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error("protocol parameters carry no cost models")]
    MissingCostModels,
    /// The node refused a transaction. The reason is the node's own encoding.
    #[error("transaction rejected by node")]
    Rejected { reason: Vec<u8> },
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("evaluation task failed: {0}")]
    Task(String),
}

pub type Result<T, E = GatewayError> = std::result::Result<T, E>;
