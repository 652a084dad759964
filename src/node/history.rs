use pallas::codec::minicbor::data::{Tag, Type};
use pallas::codec::minicbor::decode::Error;
use pallas::codec::minicbor::{Decode, Decoder};
use serde::Serialize;

const PICOSECONDS_PER_MILLISECOND: u128 = 1_000_000_000;

/// Where an era starts or ends, relative to the system start
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EraBound {
    pub time_ms: u64,
    pub slot: u64,
    pub epoch: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EraParams {
    pub epoch_length: u64,
    pub slot_length_ms: u64,
    /// Slots after the tip that are known to stay in the current era. `None` when unbounded.
    pub safe_zone: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub genesis_window: Option<u64>,
}

/// One era of the hard fork history. The last era has no end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EraSummary {
    pub start: EraBound,
    pub end: Option<EraBound>,
    pub params: EraParams,
}

/// The node's era history in the hard fork combinator's interpreter encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EraHistory(pub Vec<EraSummary>);

impl<'b, C> Decode<'b, C> for EraHistory {
    fn decode(d: &mut Decoder<'b>, _ctx: &mut C) -> Result<Self, Error> {
        let mut eras = Vec::new();
        let mut remaining = d.array()?;
        while more(d, &mut remaining)? {
            eras.push(summary(d)?);
        }
        Ok(EraHistory(eras))
    }
}

/// Whether another item of a definite or indefinite container follows. Counts the item down,
/// or consumes the break.
pub(super) fn more(d: &mut Decoder<'_>, remaining: &mut Option<u64>) -> Result<bool, Error> {
    match remaining {
        Some(0) => Ok(false),
        Some(n) => {
            *n -= 1;
            Ok(true)
        }
        None if d.datatype()? == Type::Break => {
            d.set_position(d.position() + 1);
            Ok(false)
        }
        None => Ok(true),
    }
}

fn summary(d: &mut Decoder<'_>) -> Result<EraSummary, Error> {
    d.array()?;
    let start = bound(d)?;
    let end = match d.datatype()? {
        Type::Array | Type::ArrayIndef => Some(bound(d)?),
        _ => {
            d.skip()?;
            None
        }
    };
    let params = params(d)?;

    Ok(EraSummary { start, end, params })
}

fn bound(d: &mut Decoder<'_>) -> Result<EraBound, Error> {
    d.array()?;
    let picoseconds = integer(d)?;
    let slot = d.u64()?;
    let epoch = d.u64()?;

    Ok(EraBound {
        time_ms: u64::try_from(picoseconds / PICOSECONDS_PER_MILLISECOND)
            .map_err(|_| Error::message("era bound time out of range"))?,
        slot,
        epoch,
    })
}

fn params(d: &mut Decoder<'_>) -> Result<EraParams, Error> {
    let len = d.array()?;
    let epoch_length = d.u64()?;
    let slot_length_ms = d.u64()?;

    let safe_zone_len = d.array()?;
    let safe_zone = match d.u8()? {
        0 => {
            let slots = d.u64()?;
            // trailing `[0]` of the standard safe zone
            d.skip()?;
            Some(slots)
        }
        _ => None,
    };
    if safe_zone_len.is_none() {
        d.set_position(d.position() + 1);
    }

    let genesis_window = match len {
        Some(4) => Some(d.u64()?),
        _ => None,
    };

    Ok(EraParams {
        epoch_length,
        slot_length_ms,
        safe_zone,
        genesis_window,
    })
}

/// Unsigned integer that may be encoded as a positive bignum
fn integer(d: &mut Decoder<'_>) -> Result<u128, Error> {
    if d.datatype()? != Type::Tag {
        return Ok(u128::from(d.u64()?));
    }

    if d.tag()? != Tag::new(2) {
        return Err(Error::message("expected a positive bignum"));
    }
    let bytes = d.bytes()?;
    if bytes.len() > 16 {
        return Err(Error::message("bignum out of range"));
    }

    Ok(bytes
        .iter()
        .fold(0u128, |value, byte| (value << 8) | u128::from(*byte)))
}
