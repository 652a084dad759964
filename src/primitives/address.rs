use pallas::ledger::addresses::{Address, ShelleyDelegationPart, ShelleyPaymentPart};

use super::{KeyHash, ScriptHash};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Credential {
    Key(KeyHash),
    Script(ScriptHash),
}

impl Credential {
    pub fn hash(&self) -> &[u8] {
        match self {
            Credential::Key(hash) => &hash[..],
            Credential::Script(hash) => &hash[..],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StakeReference {
    Credential(Credential),
    Pointer {
        slot: u64,
        tx_index: u64,
        cert_index: u64,
    },
}

/// Payment and delegation parts of a Shelley-era address
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShelleyParts {
    pub payment: Credential,
    pub stake: Option<StakeReference>,
}

/// Splits raw address bytes into their credentials. Byron and reward addresses have no payment
/// credential and yield `None`.
pub fn shelley_parts(address: &[u8]) -> Option<ShelleyParts> {
    let Ok(Address::Shelley(address)) = Address::from_bytes(address) else {
        return None;
    };

    let payment = match address.payment() {
        ShelleyPaymentPart::Key(hash) => Credential::Key(*hash),
        ShelleyPaymentPart::Script(hash) => Credential::Script(*hash),
    };

    let stake = match address.delegation() {
        ShelleyDelegationPart::Key(hash) => Some(StakeReference::Credential(Credential::Key(*hash))),
        ShelleyDelegationPart::Script(hash) => {
            Some(StakeReference::Credential(Credential::Script(*hash)))
        }
        ShelleyDelegationPart::Pointer(pointer) => Some(StakeReference::Pointer {
            slot: pointer.slot(),
            tx_index: pointer.tx_idx(),
            cert_index: pointer.cert_idx(),
        }),
        ShelleyDelegationPart::Null => None,
    };

    Some(ShelleyParts { payment, stake })
}

/// Human readable form: bech32 for Shelley-era addresses, base58 for Byron.
pub fn display_address(address: &[u8]) -> String {
    let rendered = match Address::from_bytes(address) {
        Ok(Address::Byron(byron)) => Some(byron.to_base58()),
        Ok(Address::Shelley(shelley)) => shelley.to_bech32().ok(),
        Ok(Address::Stake(stake)) => stake.to_bech32().ok(),
        Err(_) => None,
    };

    rendered.unwrap_or_else(|| hex::encode(address))
}

/// Accepts bech32, base58 (Byron) or hex encoded addresses.
pub fn parse_address(s: &str) -> Result<Vec<u8>, String> {
    if let Ok(address) = Address::from_bech32(s) {
        return Ok(address.to_vec());
    }

    if let Ok(bytes) = hex::decode(s) {
        if Address::from_bytes(&bytes).is_ok() {
            return Ok(bytes);
        }
    }

    match pallas::ledger::addresses::ByronAddress::from_base58(s) {
        Ok(byron) => Ok(Address::Byron(byron).to_vec()),
        Err(_) => Err(format!("invalid address: {s}")),
    }
}
