use crate::error::StructError;
use crate::types::ScalarType;
use crate::value::{ArrayValue, FieldValue, Number};
use arrayvec::ArrayVec;
use smol_str::SmolStr;

/// Encoded scalar; never wider than 8 bytes.
pub type ScalarBytes = ArrayVec<u8, 8>;

// ─── Scalars ────────────────────────────────────────────────────────────────

/// Little-endian address at the pointer width. Addresses that need more bytes
/// than the width are rejected, never truncated.
#[inline]
pub fn encode_address(field: &SmolStr, address: u64, pointer_width: usize) -> Result<ScalarBytes, StructError> {
    if pointer_width < 8 && address >> (8 * pointer_width) != 0 {
        return Err(StructError::AddressOverflow {
            field: field.clone(),
            address,
            width: pointer_width,
        });
    }
    let mut out = ScalarBytes::new();
    out.extend(address.to_le_bytes().into_iter().take(pointer_width));
    Ok(out)
}

/// Numeric view of a scalar value. Bools count as 0/1 and `Null` as 0, like
/// the untyped setters native bindings usually expose.
fn scalar_number(field: &SmolStr, ty: ScalarType, value: &FieldValue) -> Result<Number, StructError> {
    match value {
        FieldValue::Number(n) => Ok(*n),
        FieldValue::Bool(b) => Ok(Number::U64(*b as u64)),
        FieldValue::Null => Ok(Number::U64(0)),
        other => Err(StructError::TypeMismatch {
            field: field.clone(),
            expected: ty.label(),
            actual: other.label(),
        }),
    }
}

/// Encode one scalar at its exact width. Integers wrap to the field width.
/// `Str` fields only reach this path with a raw address; string contents are
/// handled by the flush (they need retention).
pub fn encode_scalar(
    field: &SmolStr,
    ty: ScalarType,
    value: &FieldValue,
    pointer_width: usize,
) -> Result<ScalarBytes, StructError> {
    let mut out = ScalarBytes::new();
    match ty {
        ScalarType::Bool => {
            let set = match value {
                FieldValue::Bool(b) => *b,
                other => scalar_number(field, ty, other)?.as_f64() != 0.0,
            };
            out.push(set as u8);
        }
        ScalarType::F32 => {
            let n = scalar_number(field, ty, value)?;
            out.extend((n.as_f64() as f32).to_le_bytes());
        }
        ScalarType::F64 => {
            let n = scalar_number(field, ty, value)?;
            out.extend(n.as_f64().to_le_bytes());
        }
        ScalarType::Str | ScalarType::Pointer => {
            let address = value.as_address().ok_or_else(|| StructError::TypeMismatch {
                field: field.clone(),
                expected: "address",
                actual: value.label(),
            })?;
            return encode_address(field, address, pointer_width);
        }
        _ => {
            let bits = scalar_number(field, ty, value)?.to_raw_bits();
            out.extend(bits.to_le_bytes().into_iter().take(ty.width(pointer_width)));
        }
    }
    Ok(out)
}

/// Enum values are written as unsigned integers of the configured width.
pub fn encode_enum(field: &SmolStr, width: usize, value: &FieldValue) -> Result<ScalarBytes, StructError> {
    let bits = scalar_number(field, ScalarType::U64, value)?.to_raw_bits();
    let mut out = ScalarBytes::new();
    out.extend(bits.to_le_bytes().into_iter().take(width));
    Ok(out)
}

/// NUL-terminated copy of `s`.
#[inline]
pub fn cstr(s: &str) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(s.len() + 1);
    bytes.extend_from_slice(s.as_bytes());
    bytes.push(0);
    bytes
}

// ─── Arrays ─────────────────────────────────────────────────────────────────

#[inline]
fn extend_le<T: Copy, const N: usize>(out: &mut Vec<u8>, items: &[T], to_le: fn(T) -> [u8; N]) {
    out.reserve(items.len() * N);
    for &item in items {
        out.extend_from_slice(&to_le(item));
    }
}

/// Encode array elements contiguously.
///
/// Typed buffers must match `element` exactly and are copied verbatim. Plain
/// string arrays call `intern` once per entry; it keeps a NUL-terminated copy
/// alive and returns that copy's address.
pub fn encode_elements(
    field: &SmolStr,
    element: ScalarType,
    array: &ArrayValue,
    pointer_width: usize,
    mut intern: impl FnMut(&str) -> u64,
) -> Result<Vec<u8>, StructError> {
    let mut out = Vec::new();
    match (element, array) {
        (ScalarType::I8, ArrayValue::I8(v)) => extend_le(&mut out, v, i8::to_le_bytes),
        (ScalarType::U8 | ScalarType::Bool, ArrayValue::U8(v)) => out.extend_from_slice(v),
        (ScalarType::I16, ArrayValue::I16(v)) => extend_le(&mut out, v, i16::to_le_bytes),
        (ScalarType::U16, ArrayValue::U16(v)) => extend_le(&mut out, v, u16::to_le_bytes),
        (ScalarType::I32, ArrayValue::I32(v)) => extend_le(&mut out, v, i32::to_le_bytes),
        (ScalarType::U32, ArrayValue::U32(v)) => extend_le(&mut out, v, u32::to_le_bytes),
        (ScalarType::I64, ArrayValue::I64(v)) => extend_le(&mut out, v, i64::to_le_bytes),
        (ScalarType::U64, ArrayValue::U64(v)) => extend_le(&mut out, v, u64::to_le_bytes),
        (ScalarType::F32, ArrayValue::F32(v)) => extend_le(&mut out, v, f32::to_le_bytes),
        (ScalarType::F64, ArrayValue::F64(v)) => extend_le(&mut out, v, f64::to_le_bytes),
        (ScalarType::Bool, ArrayValue::Bool(v)) => out.extend(v.iter().map(|b| *b as u8)),
        (ScalarType::Str, ArrayValue::Str(v)) => {
            out.reserve(v.len() * pointer_width);
            for s in v {
                out.extend(encode_address(field, intern(s), pointer_width)?);
            }
        }
        (ScalarType::Str | ScalarType::Pointer, ArrayValue::Address(v)) => {
            out.reserve(v.len() * pointer_width);
            for address in v {
                out.extend(encode_address(field, *address, pointer_width)?);
            }
        }
        (_, ArrayValue::Bool(_) | ArrayValue::Str(_)) => {
            return Err(StructError::UnsupportedArrayElement {
                field: field.clone(),
                element: element.label(),
            });
        }
        (_, other) => {
            return Err(StructError::TypeMismatch {
                field: field.clone(),
                expected: element.label(),
                actual: other.label(),
            });
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name() -> SmolStr {
        SmolStr::new("f")
    }

    #[test]
    fn test_encode_integers_little_endian() {
        let bytes = encode_scalar(&name(), ScalarType::U32, &FieldValue::from(0x0102_0304u32), 8).unwrap();
        assert_eq!(bytes.as_slice(), &[4, 3, 2, 1]);

        let bytes = encode_scalar(&name(), ScalarType::I16, &FieldValue::from(-2i16), 8).unwrap();
        assert_eq!(bytes.as_slice(), &[0xfe, 0xff]);
    }

    #[test]
    fn test_encode_wraps_to_width() {
        let bytes = encode_scalar(&name(), ScalarType::U8, &FieldValue::from(300u32), 8).unwrap();
        assert_eq!(bytes.as_slice(), &[44]);
    }

    #[test]
    fn test_encode_bool_and_null() {
        let t = encode_scalar(&name(), ScalarType::Bool, &FieldValue::Bool(true), 8).unwrap();
        assert_eq!(t.as_slice(), &[1]);
        let zero = encode_scalar(&name(), ScalarType::U16, &FieldValue::Null, 8).unwrap();
        assert_eq!(zero.as_slice(), &[0, 0]);
    }

    #[test]
    fn test_encode_float_bit_exact() {
        let bytes = encode_scalar(&name(), ScalarType::F64, &FieldValue::from(-0.1f64), 8).unwrap();
        assert_eq!(bytes.as_slice(), &(-0.1f64).to_le_bytes());
        let bytes = encode_scalar(&name(), ScalarType::F32, &FieldValue::from(1.5f32), 8).unwrap();
        assert_eq!(bytes.as_slice(), &1.5f32.to_le_bytes());
    }

    #[test]
    fn test_encode_rejects_strings_for_numbers() {
        let err = encode_scalar(&name(), ScalarType::I32, &FieldValue::from("x"), 8).unwrap_err();
        assert!(matches!(err, StructError::TypeMismatch { expected: "i32", .. }));
    }

    #[test]
    fn test_encode_address_at_pointer_width() {
        assert_eq!(encode_address(&name(), 0x5566_7788, 4).unwrap().as_slice(), &[0x88, 0x77, 0x66, 0x55]);
        assert_eq!(encode_address(&name(), 0xffff_ffff, 4).unwrap().len(), 4);
        assert_eq!(encode_address(&name(), 1, 8).unwrap().len(), 8);
    }

    #[test]
    fn test_encode_address_rejects_wide_address() {
        let err = encode_address(&name(), 0x1_0000_0000, 4).unwrap_err();
        assert!(matches!(
            err,
            StructError::AddressOverflow { address: 0x1_0000_0000, width: 4, .. }
        ));

        let array = ArrayValue::Address(vec![0x10, 0x7f00_0000_0000]);
        let err = encode_elements(&name(), ScalarType::Pointer, &array, 4, |_| 0).unwrap_err();
        assert!(matches!(err, StructError::AddressOverflow { .. }));
    }

    #[test]
    fn test_cstr_is_nul_terminated() {
        assert_eq!(cstr("hi"), b"hi\0");
        assert_eq!(cstr(""), b"\0");
    }

    #[test]
    fn test_encode_typed_elements() {
        let out = encode_elements(&name(), ScalarType::U16, &ArrayValue::U16(vec![1, 0x0203]), 8, |_| 0).unwrap();
        assert_eq!(out, [1, 0, 3, 2]);
    }

    #[test]
    fn test_encode_string_elements_interns_each() {
        let mut seen = Vec::new();
        let array = ArrayValue::Str(vec![SmolStr::new("a"), SmolStr::new("b")]);
        let out = encode_elements(&name(), ScalarType::Str, &array, 4, |s| {
            seen.push(s.to_string());
            0x10 + seen.len() as u64
        })
        .unwrap();
        assert_eq!(seen, ["a", "b"]);
        assert_eq!(out, [0x11, 0, 0, 0, 0x12, 0, 0, 0]);
    }

    #[test]
    fn test_encode_rejects_mismatched_elements() {
        let err = encode_elements(&name(), ScalarType::F32, &ArrayValue::U32(vec![1]), 8, |_| 0).unwrap_err();
        assert!(matches!(err, StructError::TypeMismatch { .. }));

        let err = encode_elements(&name(), ScalarType::F32, &ArrayValue::Bool(vec![true]), 8, |_| 0).unwrap_err();
        assert!(matches!(err, StructError::UnsupportedArrayElement { element: "f32", .. }));
    }
}
