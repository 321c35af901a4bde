//! Property byte codec.
//!
//! Each term is a presence byte (0 = null, 1 = value) followed by:
//!
//! | type | encoding |
//! |---|---|
//! | Boolean | 1 byte |
//! | Int32 | 4 bytes BE |
//! | Int64, Date64 | 8 bytes BE |
//! | Float32, Float64 | canonical IEEE bits BE (`-0.0` as `0.0`, one NaN) |
//! | Utf8, Binary | u32 BE length, then the bytes |
//!
//! Every encoding is self-delimiting, so comparators can walk a key without
//! decoding it into values.

use std::cmp::Ordering;

use stagec_core::hash::hash32;
use stagec_core::schema::DataType;
use stagec_core::types::{float_cmp, Scalar};

use crate::error::CodecError;

const NULL: u8 = 0;
const PRESENT: u8 = 1;

type CodecResult<T> = std::result::Result<T, CodecError>;

pub fn encode_value(out: &mut Vec<u8>, value: &Scalar, dt: DataType) -> CodecResult<()> {
    if value.is_null() {
        out.push(NULL);
        return Ok(());
    }
    out.push(PRESENT);
    match (value, dt) {
        (Scalar::Bool(b), DataType::Boolean) => out.push(u8::from(*b)),
        (Scalar::I32(v), DataType::Int32) => out.extend_from_slice(&v.to_be_bytes()),
        (Scalar::I64(v), DataType::Int64 | DataType::Date64) => {
            out.extend_from_slice(&v.to_be_bytes())
        }
        (Scalar::F32(v), DataType::Float32) => {
            out.extend_from_slice(&canonical_f32(*v).to_bits().to_be_bytes())
        }
        (Scalar::F64(v), DataType::Float64) => {
            out.extend_from_slice(&canonical_f64(*v).to_bits().to_be_bytes())
        }
        (Scalar::Str(s), DataType::Utf8) => put_bytes(out, s.as_bytes(), dt)?,
        (Scalar::Bin(b), DataType::Binary) => put_bytes(out, b, dt)?,
        (other, expected) => {
            return Err(CodecError::Type {
                expected,
                got: format!("{:?}", other),
            })
        }
    }
    Ok(())
}

fn put_bytes(out: &mut Vec<u8>, bytes: &[u8], dt: DataType) -> CodecResult<()> {
    let len = u32::try_from(bytes.len()).map_err(|_| CodecError::Type {
        expected: dt,
        got: format!("{} bytes", bytes.len()),
    })?;
    out.extend_from_slice(&len.to_be_bytes());
    out.extend_from_slice(bytes);
    Ok(())
}

fn canonical_f32(v: f32) -> f32 {
    if v.is_nan() {
        f32::NAN
    } else if v == 0.0 {
        0.0
    } else {
        v
    }
}

fn canonical_f64(v: f64) -> f64 {
    if v.is_nan() {
        f64::NAN
    } else if v == 0.0 {
        0.0
    } else {
        v
    }
}

fn take(bytes: &[u8], at: usize, n: usize) -> CodecResult<&[u8]> {
    at.checked_add(n)
        .and_then(|end| bytes.get(at..end))
        .ok_or(CodecError::Truncated { needed: n, at })
}

fn take_array<const N: usize>(bytes: &[u8], at: usize) -> CodecResult<[u8; N]> {
    let mut buf = [0u8; N];
    buf.copy_from_slice(take(bytes, at, N)?);
    Ok(buf)
}

/// Presence byte at `at`: true for a value, false for null.
fn presence(bytes: &[u8], at: usize) -> CodecResult<bool> {
    match take(bytes, at, 1)?[0] {
        NULL => Ok(false),
        PRESENT => Ok(true),
        byte => Err(CodecError::Presence { byte, at }),
    }
}

/// Width of the value body at `at` (after the presence byte).
fn body_len(bytes: &[u8], at: usize, dt: DataType) -> CodecResult<usize> {
    Ok(match dt {
        DataType::Boolean => 1,
        DataType::Int32 | DataType::Float32 => 4,
        DataType::Int64 | DataType::Date64 | DataType::Float64 => 8,
        DataType::Utf8 | DataType::Binary => {
            let len = u32::from_be_bytes(take_array::<4>(bytes, at)?) as usize;
            take(bytes, at + 4, len)?;
            4 + len
        }
    })
}

/// Offset just past the term starting at `at`.
pub fn skip_value(bytes: &[u8], at: usize, dt: DataType) -> CodecResult<usize> {
    if presence(bytes, at)? {
        let len = body_len(bytes, at + 1, dt)?;
        take(bytes, at + 1, len)?;
        Ok(at + 1 + len)
    } else {
        Ok(at + 1)
    }
}

/// Decode the term at `at`; returns the value and the next offset.
pub fn decode_value(bytes: &[u8], at: usize, dt: DataType) -> CodecResult<(Scalar, usize)> {
    if !presence(bytes, at)? {
        return Ok((Scalar::Null, at + 1));
    }
    let body = at + 1;
    let value = match dt {
        DataType::Boolean => Scalar::Bool(take(bytes, body, 1)?[0] != 0),
        DataType::Int32 => Scalar::I32(i32::from_be_bytes(take_array(bytes, body)?)),
        DataType::Int64 | DataType::Date64 => {
            Scalar::I64(i64::from_be_bytes(take_array(bytes, body)?))
        }
        DataType::Float32 => Scalar::F32(f32::from_bits(u32::from_be_bytes(take_array(
            bytes, body,
        )?))),
        DataType::Float64 => Scalar::F64(f64::from_bits(u64::from_be_bytes(take_array(
            bytes, body,
        )?))),
        DataType::Utf8 => {
            let raw = var_bytes(bytes, body)?;
            let s = std::str::from_utf8(raw).map_err(|_| CodecError::Utf8 { at: body + 4 })?;
            Scalar::Str(s.to_string())
        }
        DataType::Binary => Scalar::Bin(var_bytes(bytes, body)?.to_vec()),
    };
    Ok((value, body + body_len(bytes, body, dt)?))
}

fn var_bytes(bytes: &[u8], at: usize) -> CodecResult<&[u8]> {
    let len = u32::from_be_bytes(take_array::<4>(bytes, at)?) as usize;
    take(bytes, at + 4, len)
}

/// Compare the terms at `ia` in `a` and `ib` in `b` without building values.
///
/// Returns the ordering and the offsets just past both terms.
pub fn compare_values(
    a: &[u8],
    ia: usize,
    b: &[u8],
    ib: usize,
    dt: DataType,
) -> CodecResult<(Ordering, usize, usize)> {
    let na = skip_value(a, ia, dt)?;
    let nb = skip_value(b, ib, dt)?;
    let ord = match (presence(a, ia)?, presence(b, ib)?) {
        (false, false) => Ordering::Equal,
        (false, true) => Ordering::Less,
        (true, false) => Ordering::Greater,
        (true, true) => {
            let (ba, bb) = (ia + 1, ib + 1);
            match dt {
                DataType::Boolean => a[ba].cmp(&b[bb]),
                DataType::Int32 => i32::from_be_bytes(take_array(a, ba)?)
                    .cmp(&i32::from_be_bytes(take_array(b, bb)?)),
                DataType::Int64 | DataType::Date64 => i64::from_be_bytes(take_array(a, ba)?)
                    .cmp(&i64::from_be_bytes(take_array(b, bb)?)),
                DataType::Float32 => float_cmp(
                    f64::from(f32::from_bits(u32::from_be_bytes(take_array(a, ba)?))),
                    f64::from(f32::from_bits(u32::from_be_bytes(take_array(b, bb)?))),
                ),
                DataType::Float64 => float_cmp(
                    f64::from_bits(u64::from_be_bytes(take_array(a, ba)?)),
                    f64::from_bits(u64::from_be_bytes(take_array(b, bb)?)),
                ),
                DataType::Utf8 | DataType::Binary => var_bytes(a, ba)?.cmp(var_bytes(b, bb)?),
            }
        }
    };
    Ok((ord, na, nb))
}

/// Hash of one encoded term (presence byte included).
pub fn term_hash_bytes(encoded: &[u8]) -> i32 {
    hash32(encoded)
}

/// Hash of a value, identical to `term_hash_bytes` over its encoding.
pub fn term_hash(value: &Scalar, dt: DataType) -> CodecResult<i32> {
    let mut buf = Vec::with_capacity(16);
    encode_value(&mut buf, value, dt)?;
    Ok(term_hash_bytes(&buf))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enc(v: Scalar, dt: DataType) -> Vec<u8> {
        let mut out = Vec::new();
        encode_value(&mut out, &v, dt).unwrap();
        out
    }

    #[test]
    fn layout_is_big_endian_with_presence() {
        assert_eq!(enc(Scalar::I32(1), DataType::Int32), vec![1, 0, 0, 0, 1]);
        assert_eq!(enc(Scalar::Null, DataType::Int32), vec![0]);
        assert_eq!(
            enc(Scalar::Str("ab".into()), DataType::Utf8),
            vec![1, 0, 0, 0, 2, b'a', b'b']
        );
    }

    #[test]
    fn floats_are_canonical() {
        assert_eq!(
            enc(Scalar::F64(-0.0), DataType::Float64),
            enc(Scalar::F64(0.0), DataType::Float64)
        );
        let nan_a = enc(Scalar::F32(f32::NAN), DataType::Float32);
        let nan_b = enc(Scalar::F32(-f32::NAN), DataType::Float32);
        assert_eq!(nan_a, nan_b);
    }

    #[test]
    fn compare_orders_nulls_first_and_signed_ints() {
        let null = enc(Scalar::Null, DataType::Int32);
        let neg = enc(Scalar::I32(-5), DataType::Int32);
        let pos = enc(Scalar::I32(3), DataType::Int32);
        let cmp = |a: &[u8], b: &[u8]| compare_values(a, 0, b, 0, DataType::Int32).unwrap().0;
        assert_eq!(cmp(&null, &neg), Ordering::Less);
        assert_eq!(cmp(&neg, &pos), Ordering::Less);
        assert_eq!(cmp(&pos, &pos), Ordering::Equal);
    }

    #[test]
    fn decode_reads_back_and_advances() {
        let mut buf = enc(Scalar::Str("hé".into()), DataType::Utf8);
        buf.extend(enc(Scalar::I64(-9), DataType::Date64));
        let (v, next) = decode_value(&buf, 0, DataType::Utf8).unwrap();
        assert_eq!(v, Scalar::Str("hé".into()));
        let (v, end) = decode_value(&buf, next, DataType::Date64).unwrap();
        assert_eq!(v, Scalar::I64(-9));
        assert_eq!(end, buf.len());
    }

    #[test]
    fn truncated_and_mistyped_input_is_an_error() {
        let buf = enc(Scalar::I64(7), DataType::Int64);
        assert!(matches!(
            decode_value(&buf[..5], 0, DataType::Int64),
            Err(CodecError::Truncated { .. })
        ));
        assert!(matches!(
            skip_value(&[9], 0, DataType::Int32),
            Err(CodecError::Presence { byte: 9, at: 0 })
        ));
        let mut out = Vec::new();
        assert!(encode_value(&mut out, &Scalar::I32(1), DataType::Utf8).is_err());
    }
}
