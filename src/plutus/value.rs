//! Conversions from ledger values into [`Data`]. Every function here is pure and yields the same
//! structure for the same input.

use super::{Data, slot_to_posix_ms};
use crate::error::ResolutionError;
use crate::primitives::{
    Credential, DatumOption, Input, Mint, Output, StakeReference, Value, shelley_parts,
};

const FALSE: u64 = 0;
const TRUE: u64 = 1;

pub fn unit(tag: u64) -> Data {
    Data::constr(tag, vec![])
}

pub fn bool_data(value: bool) -> Data {
    unit(if value { TRUE } else { FALSE })
}

pub fn maybe_data(value: Option<Data>) -> Data {
    match value {
        Some(value) => Data::constr(0, vec![value]),
        None => unit(1),
    }
}

/// `Map{policy -> Map{asset name -> quantity}}` with the native asset under the empty policy and
/// empty name, ahead of every other policy.
pub fn value_data(value: &Value) -> Data {
    let mut entries = Vec::with_capacity(1 + value.assets.len());
    entries.push((
        Data::bytes(b""),
        Data::Map(vec![(Data::bytes(b""), Data::int(value.lovelace))]),
    ));

    for (policy, assets) in &value.assets {
        let assets = assets
            .iter()
            .map(|(name, quantity)| (Data::bytes(name), Data::int(*quantity)))
            .collect();
        entries.push((Data::bytes(policy), Data::Map(assets)));
    }

    Data::Map(entries)
}

/// Same shape as [`value_data`] without the native asset entry
pub fn mint_data(mint: &Mint) -> Data {
    Data::Map(
        mint.iter()
            .map(|(policy, assets)| {
                let assets = assets
                    .iter()
                    .map(|(name, quantity)| (Data::bytes(name), Data::int(*quantity)))
                    .collect();
                (Data::bytes(policy), Data::Map(assets))
            })
            .collect(),
    )
}

/// `TxOutRef{TxId{hash}, index}`
pub fn tx_out_ref_data(input: &Input) -> Data {
    Data::constr(
        0,
        vec![
            Data::constr(0, vec![Data::bytes(input.hash)]),
            Data::int(input.index),
        ],
    )
}

/// `TxInInfo{TxOutRef, TxOut}`
pub fn tx_in_info_data(input: &Input, output: &Output) -> Result<Data, ResolutionError> {
    Ok(Data::constr(
        0,
        vec![tx_out_ref_data(input), output_data(output)?],
    ))
}

pub fn credential_data(credential: &Credential) -> Data {
    match credential {
        Credential::Key(hash) => Data::constr(0, vec![Data::bytes(hash)]),
        Credential::Script(hash) => Data::constr(1, vec![Data::bytes(hash)]),
    }
}

pub fn staking_credential_data(stake: &StakeReference) -> Data {
    match stake {
        StakeReference::Credential(credential) => {
            Data::constr(0, vec![credential_data(credential)])
        }
        StakeReference::Pointer {
            slot,
            tx_index,
            cert_index,
        } => Data::constr(
            1,
            vec![Data::int(*slot), Data::int(*tx_index), Data::int(*cert_index)],
        ),
    }
}

/// `Address{credential, Maybe staking credential}`. Byron addresses have no representation.
pub fn address_data(address: &[u8]) -> Result<Data, ResolutionError> {
    let parts = shelley_parts(address).ok_or_else(|| {
        ResolutionError::Unrepresentable(format!("address {}", hex::encode(address)))
    })?;

    Ok(Data::constr(
        0,
        vec![
            credential_data(&parts.payment),
            maybe_data(parts.stake.as_ref().map(staking_credential_data)),
        ],
    ))
}

/// `NoOutputDatum | OutputDatumHash h | OutputDatum d`
pub fn output_datum_data(datum: Option<&DatumOption>) -> Result<Data, ResolutionError> {
    match datum {
        None => Ok(unit(0)),
        Some(DatumOption::Hash(hash)) => Ok(Data::constr(1, vec![Data::bytes(hash)])),
        Some(DatumOption::Inline(raw)) => {
            let data = Data::from_cbor(raw)
                .map_err(|e| ResolutionError::Unrepresentable(format!("inline datum: {e}")))?;
            Ok(Data::constr(2, vec![data]))
        }
    }
}

/// `TxOut{address, value, datum, Maybe reference script hash}`
pub fn output_data(output: &Output) -> Result<Data, ResolutionError> {
    Ok(Data::constr(
        0,
        vec![
            address_data(&output.address)?,
            value_data(&output.value),
            output_datum_data(output.datum.as_ref())?,
            maybe_data(
                output
                    .script_ref
                    .as_ref()
                    .map(|script| Data::bytes(script.hash())),
            ),
        ],
    ))
}

/// Half open POSIX time range `[start, ttl)`. A slot of 0 means the bound is absent.
pub fn posix_time_range(validity_start: u64, ttl: u64, system_start_ms: i64) -> Data {
    let lower = if validity_start == 0 {
        unit(0)
    } else {
        Data::constr(1, vec![Data::int(slot_to_posix_ms(validity_start, system_start_ms))])
    };

    let upper = if ttl == 0 {
        unit(2)
    } else {
        Data::constr(1, vec![Data::int(slot_to_posix_ms(ttl, system_start_ms))])
    };

    Data::constr(
        0,
        vec![
            Data::constr(0, vec![lower, bool_data(true)]),
            Data::constr(0, vec![upper, bool_data(false)]),
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::{PlutusScript, PlutusVersion, PolicyId, ScriptRef, TxHash};
    use crate::testing::script_address;

    #[test]
    fn test_lovelace_only() {
        assert_eq!(
            value_data(&Value::lovelace(1_000_000)),
            Data::Map(vec![(
                Data::bytes(b""),
                Data::Map(vec![(Data::bytes(b""), Data::int(1_000_000))])
            )])
        );
    }

    #[test]
    fn test_native_asset_comes_first() {
        let policy = PolicyId::new([0x00; 28]);
        let value = Value::lovelace(5).with_asset(policy, b"b".to_vec(), 2).with_asset(
            policy,
            b"a".to_vec(),
            1,
        );

        let Data::Map(entries) = value_data(&value) else {
            panic!("value is not a map");
        };

        assert_eq!(entries[0].0, Data::bytes(b""));
        assert_eq!(
            entries[1],
            (
                Data::bytes(policy),
                Data::Map(vec![
                    (Data::bytes(b"a"), Data::int(1)),
                    (Data::bytes(b"b"), Data::int(2))
                ])
            )
        );
    }

    #[test]
    fn test_mint_has_no_native_entry() {
        let mut mint = Mint::new();
        mint.entry(PolicyId::new([0x11; 28]))
            .or_default()
            .insert(b"burn".to_vec(), -3);

        assert_eq!(
            mint_data(&mint),
            Data::Map(vec![(
                Data::bytes(PolicyId::new([0x11; 28])),
                Data::Map(vec![(Data::bytes(b"burn"), Data::int(-3))])
            )])
        );
        assert_eq!(mint_data(&Mint::new()), Data::Map(vec![]));
    }

    #[test]
    fn test_unbounded_range() {
        assert_eq!(
            posix_time_range(0, 0, 1_596_059_091_000),
            Data::constr(
                0,
                vec![
                    Data::constr(0, vec![unit(0), unit(1)]),
                    Data::constr(0, vec![unit(2), unit(0)]),
                ]
            )
        );
    }

    #[test]
    fn test_bounded_range() {
        let range = posix_time_range(10, 20, 1_000_000);

        assert_eq!(
            range,
            Data::constr(
                0,
                vec![
                    Data::constr(0, vec![Data::constr(1, vec![Data::int(1_010_000)]), unit(1)]),
                    Data::constr(0, vec![Data::constr(1, vec![Data::int(1_020_000)]), unit(0)]),
                ]
            )
        );
    }

    #[test]
    fn test_far_future_ttl() {
        let range = posix_time_range(0, u64::MAX, 1_666_656_000_000);

        let upper = i128::from(u64::MAX) * 1_000 + 1_666_656_000_000;
        assert_eq!(
            range,
            Data::constr(
                0,
                vec![
                    Data::constr(0, vec![unit(0), unit(1)]),
                    Data::constr(0, vec![Data::constr(1, vec![Data::int(upper)]), unit(0)]),
                ]
            )
        );
    }

    #[test]
    fn test_tx_in_info() {
        let input = Input::new(TxHash::new([0x42; 32]), 1);
        let script = PlutusScript::new(PlutusVersion::V2, vec![0x01, 0x02]);
        let output = Output::new(script_address(&script), Value::lovelace(2))
            .with_datum(DatumOption::Inline(hex::decode("d87980").unwrap()))
            .with_script_ref(ScriptRef::Plutus(script.clone()));

        let info = tx_in_info_data(&input, &output).unwrap();

        assert_eq!(
            info,
            Data::constr(
                0,
                vec![
                    Data::constr(
                        0,
                        vec![Data::constr(0, vec![Data::bytes([0x42; 32])]), Data::int(1)]
                    ),
                    Data::constr(
                        0,
                        vec![
                            Data::constr(
                                0,
                                vec![
                                    Data::constr(1, vec![Data::bytes(script.hash())]),
                                    unit(1)
                                ]
                            ),
                            value_data(&Value::lovelace(2)),
                            Data::constr(2, vec![unit(0)]),
                            Data::constr(0, vec![Data::bytes(script.hash())]),
                        ]
                    ),
                ]
            )
        );
    }

    #[test]
    fn test_pointer_stake_reference() {
        let stake = StakeReference::Pointer {
            slot: 1,
            tx_index: 2,
            cert_index: 3,
        };

        assert_eq!(
            staking_credential_data(&stake),
            Data::constr(1, vec![Data::int(1), Data::int(2), Data::int(3)])
        );
    }

    #[test]
    fn test_byron_address_is_unrepresentable() {
        assert!(matches!(
            address_data(&[0x82, 0xd8, 0x18]),
            Err(ResolutionError::Unrepresentable(_))
        ));
    }
}
