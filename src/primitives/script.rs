use pallas::crypto::hash::Hasher;

use super::{DatumHash, ScriptHash};
use crate::plutus::Data;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PlutusVersion {
    V1,
    V2,
    V3,
}

impl PlutusVersion {
    /// Language tag prepended to the script bytes when hashing
    pub fn tag(self) -> u8 {
        match self {
            PlutusVersion::V1 => 1,
            PlutusVersion::V2 => 2,
            PlutusVersion::V3 => 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlutusScript {
    pub version: PlutusVersion,
    /// CBOR wrapped flat program, as carried in witness sets and reference scripts
    pub bytes: Vec<u8>,
}

impl PlutusScript {
    pub fn new(version: PlutusVersion, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            version,
            bytes: bytes.into(),
        }
    }

    pub fn hash(&self) -> ScriptHash {
        Hasher::<224>::hash_tagged(&self.bytes, self.version.tag())
    }
}

// language tag of native scripts when hashing
const NATIVE_SCRIPT_TAG: u8 = 0;

/// Script attached to an output. Native scripts are kept opaque.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptRef {
    Native(Vec<u8>),
    Plutus(PlutusScript),
}

impl ScriptRef {
    pub fn hash(&self) -> ScriptHash {
        match self {
            ScriptRef::Native(bytes) => Hasher::<224>::hash_tagged(bytes, NATIVE_SCRIPT_TAG),
            ScriptRef::Plutus(script) => script.hash(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatumOption {
    Hash(DatumHash),
    /// Inline datum, raw CBOR
    Inline(Vec<u8>),
}

/// Datum attached to the witness set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WitnessDatum {
    pub hash: DatumHash,
    pub data: Data,
}

impl WitnessDatum {
    pub fn from_cbor(raw: &[u8]) -> Result<Self, minicbor::decode::Error> {
        Ok(Self {
            hash: datum_hash(raw),
            data: Data::from_cbor(raw)?,
        })
    }
}

pub fn datum_hash(raw: &[u8]) -> DatumHash {
    Hasher::<256>::hash(raw)
}
