use std::cmp::Ordering;
use std::fmt;

use pallas::ledger::primitives::TransactionInput;
use pallas::ledger::traverse::MultiEraInput;

use super::TxHash;

/// Reference to a transaction output, `(transaction hash, output index)`.
///
/// Ordering is the ledger's canonical input order: transaction id bytes first (which is the same
/// as comparing the lowercase hex), then the output index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Input {
    pub hash: TxHash,
    pub index: u64,
}

impl Input {
    pub fn new(hash: TxHash, index: u64) -> Self {
        Self { hash, index }
    }
}

impl Ord for Input {
    fn cmp(&self, other: &Self) -> Ordering {
        self.hash[..]
            .cmp(&other.hash[..])
            .then(self.index.cmp(&other.index))
    }
}

impl PartialOrd for Input {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Input {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.hash, self.index)
    }
}

impl From<&MultiEraInput<'_>> for Input {
    fn from(input: &MultiEraInput<'_>) -> Self {
        Self {
            hash: *input.hash(),
            index: input.index(),
        }
    }
}

impl From<&Input> for TransactionInput {
    fn from(input: &Input) -> Self {
        TransactionInput {
            transaction_id: input.hash,
            index: input.index,
        }
    }
}
