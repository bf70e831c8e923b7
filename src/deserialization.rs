use crate::types::ScalarType;
use crate::value::{ArrayValue, FieldValue, Number};

// ─── Helpers ────────────────────────────────────────────────────────────────

/// Copy up to N bytes into a zero-padded array.
#[inline]
fn le_array<const N: usize>(bytes: &[u8]) -> [u8; N] {
    let mut raw = [0u8; N];
    let n = bytes.len().min(N);
    raw[..n].copy_from_slice(&bytes[..n]);
    raw
}

/// Unsigned little-endian integer of up to 8 bytes (addresses, enums).
#[inline]
pub fn decode_unsigned(bytes: &[u8]) -> u64 {
    u64::from_le_bytes(le_array(bytes))
}

#[inline]
pub fn decode_address(bytes: &[u8]) -> u64 {
    decode_unsigned(bytes)
}

#[inline]
fn collect_le<T, const N: usize>(bytes: &[u8], from_le: fn([u8; N]) -> T) -> Vec<T> {
    bytes.chunks_exact(N).map(|chunk| from_le(le_array(chunk))).collect()
}

// ─── Scalars ────────────────────────────────────────────────────────────────

/// Decode a scalar from exactly its field-width bytes.
pub fn decode_scalar(ty: ScalarType, bytes: &[u8]) -> FieldValue {
    match ty {
        ScalarType::Bool => FieldValue::Bool(bytes.first().is_some_and(|b| *b != 0)),
        ScalarType::I8 => signed(i8::from_le_bytes(le_array(bytes)) as i64),
        ScalarType::I16 => signed(i16::from_le_bytes(le_array(bytes)) as i64),
        ScalarType::I32 => signed(i32::from_le_bytes(le_array(bytes)) as i64),
        ScalarType::I64 => signed(i64::from_le_bytes(le_array(bytes))),
        ScalarType::U8 | ScalarType::U16 | ScalarType::U32 | ScalarType::U64 => {
            FieldValue::Number(Number::U64(decode_unsigned(bytes)))
        }
        ScalarType::F32 => float(f32::from_le_bytes(le_array(bytes)) as f64),
        ScalarType::F64 => float(f64::from_le_bytes(le_array(bytes))),
        ScalarType::Str | ScalarType::Pointer => match decode_address(bytes) {
            0 => FieldValue::Null,
            address => FieldValue::Address(address),
        },
    }
}

#[inline]
fn signed(v: i64) -> FieldValue {
    FieldValue::Number(Number::I64(v))
}

#[inline]
fn float(v: f64) -> FieldValue {
    FieldValue::Number(Number::F64(v))
}

// ─── Arrays ─────────────────────────────────────────────────────────────────

/// Decode `count` contiguous elements. String elements come back as raw
/// addresses; they are not dereferenced.
pub fn decode_elements(element: ScalarType, bytes: &[u8], count: usize, pointer_width: usize) -> ArrayValue {
    let width = element.width(pointer_width);
    let bytes = &bytes[..count.saturating_mul(width).min(bytes.len())];
    match element {
        ScalarType::Bool => ArrayValue::Bool(bytes.iter().map(|b| *b != 0).collect()),
        ScalarType::I8 => ArrayValue::I8(collect_le(bytes, i8::from_le_bytes)),
        ScalarType::U8 => ArrayValue::U8(bytes.to_vec()),
        ScalarType::I16 => ArrayValue::I16(collect_le(bytes, i16::from_le_bytes)),
        ScalarType::U16 => ArrayValue::U16(collect_le(bytes, u16::from_le_bytes)),
        ScalarType::I32 => ArrayValue::I32(collect_le(bytes, i32::from_le_bytes)),
        ScalarType::U32 => ArrayValue::U32(collect_le(bytes, u32::from_le_bytes)),
        ScalarType::I64 => ArrayValue::I64(collect_le(bytes, i64::from_le_bytes)),
        ScalarType::U64 => ArrayValue::U64(collect_le(bytes, u64::from_le_bytes)),
        ScalarType::F32 => ArrayValue::F32(collect_le(bytes, f32::from_le_bytes)),
        ScalarType::F64 => ArrayValue::F64(collect_le(bytes, f64::from_le_bytes)),
        ScalarType::Str | ScalarType::Pointer => {
            ArrayValue::Address(bytes.chunks_exact(width).map(decode_address).collect())
        }
    }
}
