use std::collections::BTreeMap;

use super::PolicyId;

pub type AssetName = Vec<u8>;

/// Assets grouped by policy. Policies and asset names iterate in ascending byte order.
pub type MultiAsset<T> = BTreeMap<PolicyId, BTreeMap<AssetName, T>>;

/// Minted (positive) and burned (negative) quantities of a transaction
pub type Mint = MultiAsset<i64>;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Value {
    pub lovelace: u64,
    pub assets: MultiAsset<u64>,
}

impl Value {
    pub fn lovelace(lovelace: u64) -> Self {
        Self {
            lovelace,
            assets: MultiAsset::new(),
        }
    }

    pub fn with_asset(mut self, policy: PolicyId, name: impl Into<AssetName>, quantity: u64) -> Self {
        *self
            .assets
            .entry(policy)
            .or_default()
            .entry(name.into())
            .or_default() += quantity;
        self
    }

    pub fn asset_quantity(&self, policy: &PolicyId, name: &[u8]) -> u64 {
        self.assets
            .get(policy)
            .and_then(|assets| assets.get(name))
            .copied()
            .unwrap_or_default()
    }

    /// Assets keyed by hex policy id, then hex asset name
    pub fn assets_hex(&self) -> BTreeMap<String, BTreeMap<String, u64>> {
        self.assets
            .iter()
            .map(|(policy, assets)| {
                let assets = assets
                    .iter()
                    .map(|(name, quantity)| (hex::encode(name), *quantity))
                    .collect();
                (policy.to_string(), assets)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_asset_accumulates() {
        let policy = PolicyId::new([1; 28]);
        let value = Value::lovelace(2_000_000)
            .with_asset(policy, b"token".to_vec(), 5)
            .with_asset(policy, b"token".to_vec(), 3);

        assert_eq!(value.asset_quantity(&policy, b"token"), 8);
        assert_eq!(value.asset_quantity(&policy, b"other"), 0);
    }

    #[test]
    fn test_assets_hex() {
        let value = Value::lovelace(1).with_asset(PolicyId::new([0xab; 28]), b"A".to_vec(), 2);

        let assets = value.assets_hex();

        assert_eq!(assets["ab".repeat(28).as_str()]["41"], 2);
    }
}
