use crate::native_struct::StructInstance;
use crate::types::ScalarType;
use serde::ser::{Serialize, SerializeSeq, Serializer};
use smol_str::SmolStr;
use std::convert::TryFrom;

// ─── Number ─────────────────────────────────────────────────────────────────

#[derive(Clone, Copy)]
pub enum Number {
    I64(i64),
    U64(u64),
    F64(f64),
}

impl std::fmt::Debug for Number {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Number::I64(i) => write!(f, "I64({})", i),
            Number::U64(u) => write!(f, "U64({})", u),
            Number::F64(v) => write!(f, "F64({})", v),
        }
    }
}

/// Integers compare by value across signedness; floats compare bit-exactly.
impl PartialEq for Number {
    fn eq(&self, other: &Self) -> bool {
        match (*self, *other) {
            (Number::F64(a), Number::F64(b)) => a.to_bits() == b.to_bits(),
            (Number::F64(_), _) | (_, Number::F64(_)) => false,
            (a, b) => a.as_i128() == b.as_i128(),
        }
    }
}

impl Number {
    #[inline]
    fn as_i128(self) -> i128 {
        match self {
            Number::I64(i) => i as i128,
            Number::U64(u) => u as i128,
            Number::F64(f) => f as i128,
        }
    }

    pub fn as_f64(self) -> f64 {
        match self {
            Number::I64(i) => i as f64,
            Number::U64(u) => u as f64,
            Number::F64(f) => f,
        }
    }

    pub fn as_i64(self) -> Option<i64> {
        match self {
            Number::I64(i) => Some(i),
            Number::U64(u) => i64::try_from(u).ok(),
            Number::F64(f) => {
                if f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64 {
                    Some(f as i64)
                } else {
                    None
                }
            }
        }
    }

    pub fn as_u64(self) -> Option<u64> {
        match self {
            Number::U64(u) => Some(u),
            Number::I64(i) => u64::try_from(i).ok(),
            Number::F64(f) => {
                if f.fract() == 0.0 && f >= 0.0 && f <= u64::MAX as f64 {
                    Some(f as u64)
                } else {
                    None
                }
            }
        }
    }

    /// Two's-complement bit pattern, truncated by the caller to the field width.
    #[inline]
    pub fn to_raw_bits(self) -> u64 {
        match self {
            Number::I64(i) => i as u64,
            Number::U64(u) => u,
            Number::F64(f) => f as i64 as u64,
        }
    }
}

// ─── ArrayValue ─────────────────────────────────────────────────────────────

/// Array contents. The numeric variants are typed buffers copied verbatim;
/// `Bool` and `Str` are plain arrays encoded element by element.
#[derive(Debug, Clone, PartialEq)]
pub enum ArrayValue {
    I8(Vec<i8>),
    U8(Vec<u8>),
    I16(Vec<i16>),
    U16(Vec<u16>),
    I32(Vec<i32>),
    U32(Vec<u32>),
    I64(Vec<i64>),
    U64(Vec<u64>),
    F32(Vec<f32>),
    F64(Vec<f64>),
    Bool(Vec<bool>),
    Str(Vec<SmolStr>),
    /// Raw addresses, for string and opaque pointer elements.
    Address(Vec<u64>),
}

impl ArrayValue {
    /// Zero-filled array of `length` elements of `element`.
    pub fn zeroed(element: ScalarType, length: usize) -> Self {
        match element {
            ScalarType::Bool => ArrayValue::Bool(vec![false; length]),
            ScalarType::I8 => ArrayValue::I8(vec![0; length]),
            ScalarType::U8 => ArrayValue::U8(vec![0; length]),
            ScalarType::I16 => ArrayValue::I16(vec![0; length]),
            ScalarType::U16 => ArrayValue::U16(vec![0; length]),
            ScalarType::I32 => ArrayValue::I32(vec![0; length]),
            ScalarType::U32 => ArrayValue::U32(vec![0; length]),
            ScalarType::I64 => ArrayValue::I64(vec![0; length]),
            ScalarType::U64 => ArrayValue::U64(vec![0; length]),
            ScalarType::F32 => ArrayValue::F32(vec![0.0; length]),
            ScalarType::F64 => ArrayValue::F64(vec![0.0; length]),
            ScalarType::Str | ScalarType::Pointer => ArrayValue::Address(vec![0; length]),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ArrayValue::I8(v) => v.len(),
            ArrayValue::U8(v) => v.len(),
            ArrayValue::I16(v) => v.len(),
            ArrayValue::U16(v) => v.len(),
            ArrayValue::I32(v) => v.len(),
            ArrayValue::U32(v) => v.len(),
            ArrayValue::I64(v) => v.len(),
            ArrayValue::U64(v) => v.len(),
            ArrayValue::F32(v) => v.len(),
            ArrayValue::F64(v) => v.len(),
            ArrayValue::Bool(v) => v.len(),
            ArrayValue::Str(v) => v.len(),
            ArrayValue::Address(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn label(&self) -> &'static str {
        match self {
            ArrayValue::I8(_) => "i8[]",
            ArrayValue::U8(_) => "u8[]",
            ArrayValue::I16(_) => "i16[]",
            ArrayValue::U16(_) => "u16[]",
            ArrayValue::I32(_) => "i32[]",
            ArrayValue::U32(_) => "u32[]",
            ArrayValue::I64(_) => "i64[]",
            ArrayValue::U64(_) => "u64[]",
            ArrayValue::F32(_) => "f32[]",
            ArrayValue::F64(_) => "f64[]",
            ArrayValue::Bool(_) => "bool[]",
            ArrayValue::Str(_) => "string[]",
            ArrayValue::Address(_) => "address[]",
        }
    }
}

// ─── FieldValue ─────────────────────────────────────────────────────────────

/// Current value of one field in an instance's value store.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum FieldValue {
    /// Zero address / absent.
    #[default]
    Null,
    Bool(bool),
    Number(Number),
    Str(SmolStr),
    /// Raw native address (struct pointer, opaque pointer, function pointer).
    Address(u64),
    Struct(Box<StructInstance>),
    Array(ArrayValue),
}

impl FieldValue {
    #[inline]
    pub fn address(address: u64) -> Self {
        FieldValue::Address(address)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<Number> {
        match self {
            FieldValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        self.as_number()?.as_i64()
    }

    pub fn as_u64(&self) -> Option<u64> {
        self.as_number()?.as_u64()
    }

    pub fn as_f64(&self) -> Option<f64> {
        self.as_number().map(Number::as_f64)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Str(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Address held by a pointer-like value. Numbers are accepted as raw addresses.
    pub fn as_address(&self) -> Option<u64> {
        match self {
            FieldValue::Address(a) => Some(*a),
            FieldValue::Number(n) => n.as_u64(),
            FieldValue::Null => Some(0),
            _ => None,
        }
    }

    pub fn as_struct(&self) -> Option<&StructInstance> {
        match self {
            FieldValue::Struct(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_struct_mut(&mut self) -> Option<&mut StructInstance> {
        match self {
            FieldValue::Struct(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&ArrayValue> {
        match self {
            FieldValue::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            FieldValue::Null => "null",
            FieldValue::Bool(_) => "bool",
            FieldValue::Number(_) => "number",
            FieldValue::Str(_) => "string",
            FieldValue::Address(_) => "address",
            FieldValue::Struct(_) => "struct",
            FieldValue::Array(_) => "array",
        }
    }
}

// ─── Serialize (snapshots for logging / to_json) ────────────────────────────

impl Serialize for Number {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Number::I64(i) => serializer.serialize_i64(*i),
            Number::U64(u) => serializer.serialize_u64(*u),
            Number::F64(f) => serializer.serialize_f64(*f),
        }
    }
}

impl Serialize for ArrayValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        fn seq<S: Serializer, T: Serialize>(serializer: S, items: &[T]) -> Result<S::Ok, S::Error> {
            let mut seq = serializer.serialize_seq(Some(items.len()))?;
            for item in items {
                seq.serialize_element(item)?;
            }
            seq.end()
        }
        match self {
            ArrayValue::I8(v) => seq(serializer, v),
            ArrayValue::U8(v) => seq(serializer, v),
            ArrayValue::I16(v) => seq(serializer, v),
            ArrayValue::U16(v) => seq(serializer, v),
            ArrayValue::I32(v) => seq(serializer, v),
            ArrayValue::U32(v) => seq(serializer, v),
            ArrayValue::I64(v) => seq(serializer, v),
            ArrayValue::U64(v) => seq(serializer, v),
            ArrayValue::F32(v) => seq(serializer, v),
            ArrayValue::F64(v) => seq(serializer, v),
            ArrayValue::Bool(v) => seq(serializer, v),
            ArrayValue::Str(v) => seq(serializer, v),
            ArrayValue::Address(v) => seq(serializer, v),
        }
    }
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            FieldValue::Null => serializer.serialize_none(),
            FieldValue::Bool(b) => serializer.serialize_bool(*b),
            FieldValue::Number(n) => n.serialize(serializer),
            FieldValue::Str(s) => serializer.serialize_str(s.as_str()),
            FieldValue::Address(a) => serializer.serialize_u64(*a),
            FieldValue::Struct(s) => s.serialize(serializer),
            FieldValue::Array(a) => a.serialize(serializer),
        }
    }
}

// ─── From impls ─────────────────────────────────────────────────────────────

macro_rules! from_number {
    ($variant:ident as $wide:ty: $($ty:ty),*) => {
        $(
            impl From<$ty> for FieldValue {
                fn from(n: $ty) -> Self {
                    FieldValue::Number(Number::$variant(n as $wide))
                }
            }
        )*
    };
}

from_number!(I64 as i64: i8, i16, i32, i64);
from_number!(U64 as u64: u8, u16, u32, u64);
from_number!(F64 as f64: f32, f64);

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        FieldValue::Bool(b)
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Str(SmolStr::from(s))
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::Str(SmolStr::from(s))
    }
}

impl From<SmolStr> for FieldValue {
    fn from(s: SmolStr) -> Self {
        FieldValue::Str(s)
    }
}

impl From<StructInstance> for FieldValue {
    fn from(instance: StructInstance) -> Self {
        FieldValue::Struct(Box::new(instance))
    }
}

impl From<ArrayValue> for FieldValue {
    fn from(array: ArrayValue) -> Self {
        FieldValue::Array(array)
    }
}

macro_rules! from_vec {
    ($($ty:ty => $variant:ident),*) => {
        $(
            impl From<Vec<$ty>> for FieldValue {
                fn from(items: Vec<$ty>) -> Self {
                    FieldValue::Array(ArrayValue::$variant(items))
                }
            }
        )*
    };
}

from_vec!(
    i8 => I8, u8 => U8, i16 => I16, u16 => U16, i32 => I32, u32 => U32,
    i64 => I64, u64 => U64, f32 => F32, f64 => F64, bool => Bool, SmolStr => Str
);

impl From<Vec<&str>> for FieldValue {
    fn from(items: Vec<&str>) -> Self {
        FieldValue::Array(ArrayValue::Str(items.into_iter().map(SmolStr::from).collect()))
    }
}
