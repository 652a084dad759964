use std::fmt;

use serde::Serialize;

use crate::plutus::Data;

/// Purpose a redeemer is attached for. The declaration order is the ledger's tag numbering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RedeemerTag {
    Spend,
    Mint,
    Cert,
    Reward,
    Vote,
    Propose,
}

impl RedeemerTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            RedeemerTag::Spend => "spend",
            RedeemerTag::Mint => "mint",
            RedeemerTag::Cert => "cert",
            RedeemerTag::Reward => "reward",
            RedeemerTag::Vote => "vote",
            RedeemerTag::Propose => "propose",
        }
    }
}

impl fmt::Display for RedeemerTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `(tag, index)` pointer from a redeemer to the input, policy, etc. it governs
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RedeemerKey {
    pub tag: RedeemerTag,
    pub index: u32,
}

impl fmt::Display for RedeemerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.tag, self.index)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ExUnits {
    #[serde(rename = "memory")]
    pub mem: u64,
    pub steps: u64,
}

impl ExUnits {
    pub fn new(mem: u64, steps: u64) -> Self {
        Self { mem, steps }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redeemer {
    pub tag: RedeemerTag,
    pub index: u32,
    pub data: Data,
    pub ex_units: ExUnits,
}

impl Redeemer {
    pub fn key(&self) -> RedeemerKey {
        RedeemerKey {
            tag: self.tag,
            index: self.index,
        }
    }
}
