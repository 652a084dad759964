use crate::error::ResolutionError;
use crate::ledger::Transaction;
use crate::primitives::{Input, PolicyId, RedeemerTag};

/// The orderings redeemer indices are defined over.
///
/// Spend redeemers index into the inputs sorted by `(transaction id hex, output index)`, Mint
/// redeemers into the minted policy ids sorted by their hex. Both sorts are on fixed width byte
/// strings, so comparing bytes gives the same order as comparing lowercase hex.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalOrder {
    pub inputs: Vec<Input>,
    pub policies: Vec<PolicyId>,
}

impl CanonicalOrder {
    pub fn of(tx: &Transaction) -> Self {
        Self {
            inputs: sorted_inputs(&tx.inputs),
            // mint is keyed by policy, iteration is already ascending
            policies: tx.mint.keys().copied().collect(),
        }
    }

    pub fn spent_input(&self, index: u32) -> Result<&Input, ResolutionError> {
        self.inputs
            .get(index as usize)
            .ok_or(ResolutionError::IndexOutOfRange {
                tag: RedeemerTag::Spend,
                index,
                len: self.inputs.len(),
            })
    }

    pub fn minted_policy(&self, index: u32) -> Result<&PolicyId, ResolutionError> {
        if self.policies.is_empty() {
            return Err(ResolutionError::NoMint(index));
        }

        self.policies
            .get(index as usize)
            .ok_or(ResolutionError::IndexOutOfRange {
                tag: RedeemerTag::Mint,
                index,
                len: self.policies.len(),
            })
    }
}

pub fn sorted_inputs(inputs: &[Input]) -> Vec<Input> {
    let mut sorted = inputs.to_vec();
    sorted.sort();
    sorted.dedup();
    sorted
}
