use minicbor::data::{Int, Tag, Type};
use minicbor::decode::Error as DecodeError;
use minicbor::encode::{Error as EncodeError, Write};
use minicbor::{Decode, Decoder, Encode, Encoder};
use num::bigint::{BigInt, Sign};
use num::{One, ToPrimitive};

// Constructor tags 0-6 map to CBOR tags 121-127, 7-127 to 1280-1400, anything else uses the
// general form `102([tag, fields])`.
const COMPACT_TAG_BASE: u64 = 121;
const COMPACT_TAG_MAX: u64 = 127;
const EXTENDED_TAG_BASE: u64 = 1280;
const EXTENDED_TAG_MAX: u64 = 1400;
const GENERAL_TAG: u64 = 102;

const POSITIVE_BIGNUM_TAG: u64 = 2;
const NEGATIVE_BIGNUM_TAG: u64 = 3;

// byte strings longer than this are split into an indefinite string of chunks
const BYTES_CHUNK_SIZE: usize = 64;

/// Untyped data consumed by Plutus scripts
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Data {
    Constr(u64, Vec<Data>),
    /// Entries keep their insertion order
    Map(Vec<(Data, Data)>),
    List(Vec<Data>),
    Integer(BigInt),
    Bytes(Vec<u8>),
}

impl Data {
    pub fn constr(tag: u64, fields: Vec<Data>) -> Self {
        Data::Constr(tag, fields)
    }

    pub fn int(value: impl Into<BigInt>) -> Self {
        Data::Integer(value.into())
    }

    pub fn bytes(value: impl AsRef<[u8]>) -> Self {
        Data::Bytes(value.as_ref().to_vec())
    }

    pub fn to_cbor(&self) -> Vec<u8> {
        // writing into a Vec is infallible and encoding never raises its own errors
        minicbor::to_vec(self).unwrap_or_default()
    }

    pub fn from_cbor(bytes: &[u8]) -> Result<Self, DecodeError> {
        minicbor::decode(bytes)
    }
}

impl<C> Encode<C> for Data {
    fn encode<W: Write>(&self, e: &mut Encoder<W>, ctx: &mut C) -> Result<(), EncodeError<W::Error>> {
        match self {
            Data::Constr(tag, fields) => {
                match *tag {
                    0..=6 => {
                        e.tag(Tag::new(COMPACT_TAG_BASE + tag))?;
                    }
                    7..=127 => {
                        e.tag(Tag::new(EXTENDED_TAG_BASE + tag - 7))?;
                    }
                    _ => {
                        e.tag(Tag::new(GENERAL_TAG))?;
                        e.array(2)?;
                        e.u64(*tag)?;
                    }
                }
                encode_list(fields, e, ctx)
            }
            Data::Map(entries) => {
                e.map(entries.len() as u64)?;
                for (key, value) in entries {
                    key.encode(e, ctx)?;
                    value.encode(e, ctx)?;
                }
                Ok(())
            }
            Data::List(items) => encode_list(items, e, ctx),
            Data::Integer(value) => encode_integer(value, e),
            Data::Bytes(bytes) => encode_bytes(bytes, e),
        }
    }
}

fn encode_list<C, W: Write>(
    items: &[Data],
    e: &mut Encoder<W>,
    ctx: &mut C,
) -> Result<(), EncodeError<W::Error>> {
    if items.is_empty() {
        e.array(0)?;
        return Ok(());
    }

    e.begin_array()?;
    for item in items {
        item.encode(e, ctx)?;
    }
    e.end()?;
    Ok(())
}

fn encode_integer<W: Write>(value: &BigInt, e: &mut Encoder<W>) -> Result<(), EncodeError<W::Error>> {
    if let Some(int) = value.to_i128().and_then(|v| Int::try_from(v).ok()) {
        e.int(int)?;
        return Ok(());
    }

    match value.sign() {
        Sign::Minus => {
            // -1 - n
            let magnitude = -value - BigInt::one();
            e.tag(Tag::new(NEGATIVE_BIGNUM_TAG))?;
            encode_bytes(&magnitude.to_bytes_be().1, e)
        }
        _ => {
            e.tag(Tag::new(POSITIVE_BIGNUM_TAG))?;
            encode_bytes(&value.to_bytes_be().1, e)
        }
    }
}

fn encode_bytes<W: Write>(bytes: &[u8], e: &mut Encoder<W>) -> Result<(), EncodeError<W::Error>> {
    if bytes.len() <= BYTES_CHUNK_SIZE {
        e.bytes(bytes)?;
        return Ok(());
    }

    e.begin_bytes()?;
    for chunk in bytes.chunks(BYTES_CHUNK_SIZE) {
        e.bytes(chunk)?;
    }
    e.end()?;
    Ok(())
}

impl<'b, C> Decode<'b, C> for Data {
    fn decode(d: &mut Decoder<'b>, ctx: &mut C) -> Result<Self, DecodeError> {
        match d.datatype()? {
            Type::Tag => {
                let tag = d.tag()?.as_u64();
                match tag {
                    COMPACT_TAG_BASE..=COMPACT_TAG_MAX => {
                        Ok(Data::Constr(tag - COMPACT_TAG_BASE, decode_list(d, ctx)?))
                    }
                    EXTENDED_TAG_BASE..=EXTENDED_TAG_MAX => {
                        Ok(Data::Constr(tag - EXTENDED_TAG_BASE + 7, decode_list(d, ctx)?))
                    }
                    GENERAL_TAG => {
                        if d.array()? != Some(2) {
                            return Err(DecodeError::message("general constructor must be a pair"));
                        }
                        let tag = d.u64()?;
                        Ok(Data::Constr(tag, decode_list(d, ctx)?))
                    }
                    POSITIVE_BIGNUM_TAG => {
                        let magnitude = decode_bytes(d)?;
                        Ok(Data::Integer(BigInt::from_bytes_be(Sign::Plus, &magnitude)))
                    }
                    NEGATIVE_BIGNUM_TAG => {
                        let magnitude = decode_bytes(d)?;
                        let magnitude = BigInt::from_bytes_be(Sign::Plus, &magnitude);
                        Ok(Data::Integer(-magnitude - BigInt::one()))
                    }
                    _ => Err(DecodeError::message("unknown tag for plutus data")),
                }
            }
            Type::Map | Type::MapIndef => {
                let entries = d
                    .map_iter_with::<C, Data, Data>(ctx)?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Data::Map(entries))
            }
            Type::Array | Type::ArrayIndef => Ok(Data::List(decode_list(d, ctx)?)),
            Type::U8
            | Type::U16
            | Type::U32
            | Type::U64
            | Type::I8
            | Type::I16
            | Type::I32
            | Type::I64
            | Type::Int => Ok(Data::Integer(BigInt::from(i128::from(d.int()?)))),
            Type::Bytes | Type::BytesIndef => Ok(Data::Bytes(decode_bytes(d)?)),
            _ => Err(DecodeError::message("invalid data type for plutus data")),
        }
    }
}

fn decode_list<C>(d: &mut Decoder<'_>, ctx: &mut C) -> Result<Vec<Data>, DecodeError> {
    d.array_iter_with::<C, Data>(ctx)?.collect()
}

fn decode_bytes(d: &mut Decoder<'_>) -> Result<Vec<u8>, DecodeError> {
    let mut bytes = Vec::new();
    for chunk in d.bytes_iter()? {
        bytes.extend_from_slice(chunk?);
    }
    Ok(bytes)
}
