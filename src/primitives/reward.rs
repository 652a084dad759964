use super::{Credential, Hash};

// Conway CDDL: "reward addresses: bits 7-5: 111; bit 4: credential is keyhash/scripthash; bits 3-0: network id"
const REWARD_ADDRESS_PREFIX: u8 = 0b1110_0000;
const REWARD_ADDRESS_PREFIX_MASK: u8 = 0b1110_0000;
const REWARD_ADDRESS_CREDENTIAL_SCRIPT: u8 = 0b0001_0000;
const REWARD_ADDRESS_NETWORK_MASK: u8 = 0b0000_1111;

/// Raw reward address, the key of a withdrawal
#[derive(PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Clone)]
pub struct RewardAccount(Vec<u8>);

impl RewardAccount {
    pub fn new(network_id: u8, credential: Credential) -> Self {
        let mut header = REWARD_ADDRESS_PREFIX | (network_id & REWARD_ADDRESS_NETWORK_MASK);
        if let Credential::Script(_) = credential {
            header |= REWARD_ADDRESS_CREDENTIAL_SCRIPT;
        }

        let mut bytes = Vec::with_capacity(1 + 28);
        bytes.push(header);
        bytes.extend_from_slice(credential.hash());

        RewardAccount(bytes)
    }

    /// `None` when the bytes are not a well-formed reward address
    pub fn credential(&self) -> Option<Credential> {
        let (&header, hash) = self.0.split_first()?;
        if header & REWARD_ADDRESS_PREFIX_MASK != REWARD_ADDRESS_PREFIX {
            return None;
        }

        let hash = Hash::<28>::new(<[u8; 28]>::try_from(hash).ok()?);
        if header & REWARD_ADDRESS_CREDENTIAL_SCRIPT != 0 {
            Some(Credential::Script(hash))
        } else {
            Some(Credential::Key(hash))
        }
    }

    pub fn network_id(&self) -> Option<u8> {
        self.0.first().map(|header| header & REWARD_ADDRESS_NETWORK_MASK)
    }
}

impl From<Vec<u8>> for RewardAccount {
    fn from(value: Vec<u8>) -> Self {
        RewardAccount(value)
    }
}

impl AsRef<[u8]> for RewardAccount {
    fn as_ref(&self) -> &[u8] {
        self.0.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_credential_round_trip() {
        let credential = Credential::Script(Hash::new([7; 28]));
        let account = RewardAccount::new(0, credential);

        assert_eq!(account.as_ref()[0], 0b1111_0000);
        assert_eq!(account.credential(), Some(credential));
        assert_eq!(account.network_id(), Some(0));
    }

    #[test]
    fn test_key_credential_round_trip() {
        let credential = Credential::Key(Hash::new([9; 28]));
        let account = RewardAccount::new(1, credential);

        assert_eq!(account.as_ref()[0], 0b1110_0001);
        assert_eq!(account.credential(), Some(credential));
    }

    #[test]
    fn test_rejects_non_reward_header() {
        let mut bytes = vec![0b0110_0000];
        bytes.extend([0; 28]);
        assert_eq!(RewardAccount::from(bytes).credential(), None);
    }
}
