//! Chain state reads shared by the REST and RPC surfaces

use tracing::instrument;

use crate::error::GatewayError;
use crate::node::{ChainPoint, EraHistory, LedgerTip, NodeSession, ProtocolParams, UtxoSet};
use crate::plutus::SystemStart;
use crate::primitives::{Era, Input, Output, PolicyId, shelley_parts};

/// A query result together with the tip it was read at
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AtTip<T> {
    pub tip: ChainPoint,
    pub value: T,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetPattern {
    pub policy: PolicyId,
    /// `None` matches any asset of the policy
    pub name: Option<Vec<u8>>,
}

impl AssetPattern {
    /// Whether `output` holds a positive quantity of a matching asset
    pub fn matches(&self, output: &Output) -> bool {
        let Some(assets) = output.value.assets.get(&self.policy) else {
            return false;
        };

        match &self.name {
            Some(name) => assets.get(name).is_some_and(|quantity| *quantity > 0),
            None => assets.values().any(|quantity| *quantity > 0),
        }
    }
}

/// Criteria of a UTxO search. Every given criterion has to match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UtxoPredicate {
    /// Exact address, raw bytes
    pub address: Option<Vec<u8>>,
    /// Payment credential hash of the address
    pub payment_part: Option<Vec<u8>>,
    /// Stake credential hash of the address
    pub delegation_part: Option<Vec<u8>>,
    pub asset: Option<AssetPattern>,
}

impl UtxoPredicate {
    fn validate(&self) -> Result<(), GatewayError> {
        if self.address.is_none() && self.asset.is_none() {
            return Err(GatewayError::InvalidRequest(
                "predicate needs an address or an asset".into(),
            ));
        }
        if self.address.is_none() && (self.payment_part.is_some() || self.delegation_part.is_some())
        {
            return Err(GatewayError::InvalidRequest(
                "payment and delegation parts narrow an address".into(),
            ));
        }
        Ok(())
    }

    pub fn matches(&self, output: &Output) -> bool {
        if self
            .address
            .as_ref()
            .is_some_and(|address| *address != output.address)
        {
            return false;
        }

        if self.payment_part.is_some() || self.delegation_part.is_some() {
            let Some(parts) = shelley_parts(&output.address) else {
                return false;
            };

            if self
                .payment_part
                .as_ref()
                .is_some_and(|part| part.as_slice() != parts.payment.hash())
            {
                return false;
            }

            let stake_hash = match parts.stake {
                Some(crate::primitives::StakeReference::Credential(credential)) => {
                    Some(credential.hash().to_vec())
                }
                _ => None,
            };
            if self
                .delegation_part
                .as_ref()
                .is_some_and(|part| stake_hash.as_ref() != Some(part))
            {
                return false;
            }
        }

        self.asset
            .as_ref()
            .is_none_or(|pattern| pattern.matches(output))
    }
}

pub async fn current_era<S: NodeSession>(session: &mut S) -> Result<Era, GatewayError> {
    Ok(session.current_era().await?)
}

pub async fn system_start<S: NodeSession>(session: &mut S) -> Result<SystemStart, GatewayError> {
    Ok(session.system_start().await?)
}

pub async fn ledger_tip<S: NodeSession>(session: &mut S) -> Result<LedgerTip, GatewayError> {
    Ok(session.ledger_tip().await?)
}

pub async fn era_history<S: NodeSession>(session: &mut S) -> Result<EraHistory, GatewayError> {
    Ok(session.era_history().await?)
}

#[instrument(skip_all)]
pub async fn read_params<S: NodeSession>(
    session: &mut S,
) -> Result<AtTip<ProtocolParams>, GatewayError> {
    let value = session.protocol_params().await?;
    let tip = session.chain_point().await?;
    Ok(AtTip { tip, value })
}

#[instrument(skip_all, fields(refs = refs.len()))]
pub async fn read_utxos<S: NodeSession>(
    session: &mut S,
    refs: &[Input],
) -> Result<AtTip<UtxoSet>, GatewayError> {
    let value = session.utxos_by_refs(refs).await?;
    let tip = session.chain_point().await?;
    Ok(AtTip { tip, value })
}

/// Searches UTxOs. An address narrows the node query, without one the whole set is read and
/// filtered.
#[instrument(skip_all)]
pub async fn search_utxos<S: NodeSession>(
    session: &mut S,
    predicate: &UtxoPredicate,
) -> Result<AtTip<UtxoSet>, GatewayError> {
    predicate.validate()?;

    let found = match &predicate.address {
        Some(address) => session.utxos_by_address(std::slice::from_ref(address)).await?,
        None => session.utxos_whole().await?,
    };
    let tip = session.chain_point().await?;

    let value = found
        .into_iter()
        .filter(|(_, output)| predicate.matches(output))
        .collect();

    Ok(AtTip { tip, value })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NodeConnector;
    use crate::primitives::{TxHash, Value};
    use crate::testing::{FakeNode, key_address};

    fn policy() -> PolicyId {
        PolicyId::new([0x51; 28])
    }

    fn node() -> FakeNode {
        FakeNode::default().with(|state| {
            state.utxos.insert(
                Input::new(TxHash::new([1; 32]), 0),
                Output::new(
                    key_address(1),
                    Value::lovelace(2).with_asset(policy(), b"coin".to_vec(), 5),
                ),
            );
            state.utxos.insert(
                Input::new(TxHash::new([2; 32]), 1),
                Output::new(key_address(2), Value::lovelace(3).with_asset(
                    policy(),
                    b"other".to_vec(),
                    1,
                )),
            );
            state.utxos.insert(
                Input::new(TxHash::new([3; 32]), 0),
                Output::new(key_address(1), Value::lovelace(4)),
            );
        })
    }

    #[tokio::test]
    async fn test_search_by_asset_reads_whole_set() {
        let node = node();
        let mut session = node.open().await.unwrap();
        let predicate = UtxoPredicate {
            asset: Some(AssetPattern {
                policy: policy(),
                name: Some(b"coin".to_vec()),
            }),
            ..Default::default()
        };

        let found = search_utxos(&mut session, &predicate).await.unwrap();

        assert_eq!(found.value.len(), 1);
        assert!(found.value.contains_key(&Input::new(TxHash::new([1; 32]), 0)));
        assert_eq!(found.tip.slot(), 1_000);
        assert_eq!(node.state().calls, vec!["utxos_whole", "chain_point"]);
    }

    #[tokio::test]
    async fn test_search_by_address_and_any_asset() {
        let node = node();
        let mut session = node.open().await.unwrap();
        let predicate = UtxoPredicate {
            address: Some(key_address(1)),
            payment_part: Some(vec![1; 28]),
            asset: Some(AssetPattern {
                policy: policy(),
                name: None,
            }),
            ..Default::default()
        };

        let found = search_utxos(&mut session, &predicate).await.unwrap();

        assert_eq!(
            found.value.keys().collect::<Vec<_>>(),
            vec![&Input::new(TxHash::new([1; 32]), 0)]
        );
        assert_eq!(node.state().calls[0], "utxos_by_address");
    }

    #[tokio::test]
    async fn test_rejects_unanchored_predicates() {
        let mut session = node().open().await.unwrap();

        for predicate in [
            UtxoPredicate::default(),
            UtxoPredicate {
                payment_part: Some(vec![1; 28]),
                asset: Some(AssetPattern {
                    policy: policy(),
                    name: None,
                }),
                ..Default::default()
            },
        ] {
            assert!(matches!(
                search_utxos(&mut session, &predicate).await,
                Err(GatewayError::InvalidRequest(_))
            ));
        }
    }

    #[test]
    fn test_delegation_part_mismatch() {
        let output = Output::new(key_address(1), Value::lovelace(1));
        let predicate = UtxoPredicate {
            address: Some(key_address(1)),
            delegation_part: Some(vec![9; 28]),
            ..Default::default()
        };

        assert!(!predicate.matches(&output));
    }

    #[tokio::test]
    async fn test_read_utxos_skips_unknown_refs() {
        let node = node();
        let mut session = node.open().await.unwrap();
        let refs = [
            Input::new(TxHash::new([3; 32]), 0),
            Input::new(TxHash::new([8; 32]), 0),
        ];

        let found = read_utxos(&mut session, &refs).await.unwrap();

        assert_eq!(found.value.len(), 1);
        assert_eq!(found.value[&refs[0]].value, Value::lovelace(4));
    }
}
