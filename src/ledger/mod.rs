//! Owned views of era-tagged ledger structures

mod decode;

pub use decode::*;

use crate::primitives::{
    BlockHash, Era, Input, KeyHash, Mint, Output, PlutusScript, Redeemer, RewardAccount, TxHash,
    WitnessDatum,
};

/// A decoded transaction. Everything a script context or an evaluation needs is copied out of
/// the era specific structure so the bytes don't have to be kept borrowed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub hash: TxHash,
    pub era: Era,
    pub inputs: Vec<Input>,
    pub reference_inputs: Vec<Input>,
    pub outputs: Vec<Output>,
    pub fee: u64,
    pub mint: Mint,
    pub withdrawals: Vec<(RewardAccount, u64)>,
    /// First slot the transaction is valid in
    pub validity_start: Option<u64>,
    /// First slot the transaction is no longer valid in
    pub ttl: Option<u64>,
    pub required_signers: Vec<KeyHash>,
    pub scripts: Vec<PlutusScript>,
    pub redeemers: Vec<Redeemer>,
    pub datums: Vec<WitnessDatum>,
    pub raw: Vec<u8>,
}

impl Transaction {
    /// Regular and reference inputs, the set that has to be resolved before evaluation
    pub fn all_inputs(&self) -> Vec<Input> {
        let mut inputs: Vec<Input> = self
            .inputs
            .iter()
            .chain(self.reference_inputs.iter())
            .copied()
            .collect();
        inputs.sort();
        inputs.dedup();
        inputs
    }
}

/// What the confirmation tracker needs to know about a block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockSummary {
    pub slot: u64,
    pub hash: BlockHash,
    pub number: u64,
    pub tx_hashes: Vec<TxHash>,
}
