use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ─── Pointer Width ──────────────────────────────────────────────────────────

/// Pointer size of the running process (LP64 → 8).
pub const NATIVE_POINTER_WIDTH: usize = std::mem::size_of::<usize>();

/// Default width of enum fields (`u32`, what C compilers pick for plain enums).
pub const DEFAULT_ENUM_WIDTH: EnumWidth = EnumWidth::U32;

/// Upper bound on inline struct nesting.
pub const MAX_INLINE_DEPTH: usize = 32;

/// Upper bound on C strings dereferenced during `read()`.
pub const MAX_CSTR_LEN: usize = 1 << 20;

// ─── Binary Layout ──────────────────────────────────────────────────────────
//
//  Normal mode (C struct)                Overlay mode (C union)
//  ┌──────────────────────────────┐      ┌──────────────────────────────┐
//  │ field 0 @ align_up(0, a0)    │      │ field 0 @ 0                  │
//  │ padding                      │      │ field 1 @ 0                  │
//  │ field 1 @ align_up(end0, a1) │      │ ...                          │
//  │ ...                          │      ├──────────────────────────────┤
//  ├──────────────────────────────┤      │ size = align_up(max size,    │
//  │ size = align_up(end, max a)  │      │                 max align)   │
//  └──────────────────────────────┘      └──────────────────────────────┘
//
//  Pointer-bearing kinds (string, opaque pointer, struct pointer, dynamic
//  array, function pointer) occupy one pointer-width slot. Fixed arrays are
//  stored inline and never smaller than one pointer.

// ─── ScalarType ─────────────────────────────────────────────────────────────

/// Primitive element type of scalar and array fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScalarType {
    #[serde(alias = "boolean")]
    Bool,
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    F32,
    F64,
    /// Pointer to a NUL-terminated C string.
    #[serde(alias = "string")]
    Str,
    /// Opaque `void*`.
    #[serde(alias = "void")]
    Pointer,
}

impl ScalarType {
    /// Width in bytes.
    #[inline]
    pub fn width(self, pointer_width: usize) -> usize {
        match self {
            Self::Bool | Self::I8 | Self::U8 => 1,
            Self::I16 | Self::U16 => 2,
            Self::I32 | Self::U32 | Self::F32 => 4,
            Self::I64 | Self::U64 | Self::F64 => 8,
            Self::Str | Self::Pointer => pointer_width,
        }
    }

    /// Scalars are naturally aligned.
    #[inline]
    pub fn alignment(self, pointer_width: usize) -> usize {
        self.width(pointer_width)
    }

    #[inline]
    pub fn is_pointer(self) -> bool {
        matches!(self, Self::Str | Self::Pointer)
    }

    #[inline]
    pub fn is_signed(self) -> bool {
        matches!(self, Self::I8 | Self::I16 | Self::I32 | Self::I64)
    }

    #[inline]
    pub fn is_float(self) -> bool {
        matches!(self, Self::F32 | Self::F64)
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::I8 => "i8",
            Self::U8 => "u8",
            Self::I16 => "i16",
            Self::U16 => "u16",
            Self::I32 => "i32",
            Self::U32 => "u32",
            Self::I64 => "i64",
            Self::U64 => "u64",
            Self::F32 => "f32",
            Self::F64 => "f64",
            Self::Str => "string",
            Self::Pointer => "void",
        }
    }

    /// Parse a type label. Accepts the aliases used by schema definitions
    /// (`boolean`, `string`, `void`).
    pub fn from_label(label: &str) -> Option<Self> {
        Some(match label {
            "bool" | "boolean" => Self::Bool,
            "i8" => Self::I8,
            "u8" => Self::U8,
            "i16" => Self::I16,
            "u16" => Self::U16,
            "i32" => Self::I32,
            "u32" => Self::U32,
            "i64" => Self::I64,
            "u64" => Self::U64,
            "f32" => Self::F32,
            "f64" => Self::F64,
            "str" | "string" => Self::Str,
            "pointer" | "void" => Self::Pointer,
            _ => return None,
        })
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ScalarType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_label(s).ok_or_else(|| format!("unknown scalar type `{s}`"))
    }
}

// ─── EnumWidth ──────────────────────────────────────────────────────────────

/// Storage width of an enum field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnumWidth {
    U8,
    U16,
    #[default]
    U32,
    U64,
}

impl EnumWidth {
    #[inline]
    pub fn bytes(self) -> usize {
        match self {
            Self::U8 => 1,
            Self::U16 => 2,
            Self::U32 => 4,
            Self::U64 => 8,
        }
    }

    pub fn from_bytes(bytes: usize) -> Option<Self> {
        Some(match bytes {
            1 => Self::U8,
            2 => Self::U16,
            4 => Self::U32,
            8 => Self::U64,
            _ => return None,
        })
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::U8 => "u8",
            Self::U16 => "u16",
            Self::U32 => "u32",
            Self::U64 => "u64",
        }
    }
}
