//! Field kinds and the per-kind builder functions used to declare schemas.
//!
//! Every builder takes the field's explicit `order`; layout and processing
//! follow `order`, never declaration order.

use crate::schema::SchemaRef;
use crate::types::{EnumWidth, ScalarType};

// ─── FieldKind ──────────────────────────────────────────────────────────────

/// Child struct referenced by an inline or pointer field.
#[derive(Debug, Clone)]
pub struct StructTarget {
    pub schema: SchemaRef,
    /// Lay the child out as a union.
    pub overlay: bool,
}

/// Closed set of field kinds.
#[derive(Debug, Clone)]
pub enum FieldKind {
    Scalar(ScalarType),
    Enum { width: EnumWidth },
    /// Elements stored inline in the parent buffer.
    FixedArray { element: ScalarType, length: usize },
    /// Pointer to separately allocated elements; the count travels out of band.
    DynamicArray { element: ScalarType },
    InlineStruct(StructTarget),
    StructPointer(StructTarget),
    FunctionPointer,
}

impl FieldKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Scalar(ty) => ty.label(),
            Self::Enum { .. } => "enum",
            Self::FixedArray { .. } => "fixed array",
            Self::DynamicArray { .. } => "dynamic array",
            Self::InlineStruct(_) => "inline struct",
            Self::StructPointer(_) => "struct pointer",
            Self::FunctionPointer => "fn",
        }
    }

    /// Whether the field's slot holds an address rather than the data itself.
    pub fn is_pointer(&self) -> bool {
        match self {
            Self::Scalar(ty) => ty.is_pointer(),
            Self::DynamicArray { .. } | Self::StructPointer(_) | Self::FunctionPointer => true,
            Self::Enum { .. } | Self::FixedArray { .. } | Self::InlineStruct(_) => false,
        }
    }
}

// ─── FieldSpec ──────────────────────────────────────────────────────────────

/// One field declaration. `order` is optional only so that definitions coming
/// from data can be rejected by schema validation when they omit it.
#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub order: Option<u32>,
    pub kind: FieldKind,
}

impl FieldSpec {
    pub fn new(kind: FieldKind) -> Self {
        Self { order: None, kind }
    }

    pub fn ordered(order: u32, kind: FieldKind) -> Self {
        Self {
            order: Some(order),
            kind,
        }
    }

    pub fn with_order(mut self, order: u32) -> Self {
        self.order = Some(order);
        self
    }
}

// ════════════════════════════════════════════════════════════════════════
// Builders
// ════════════════════════════════════════════════════════════════════════

#[inline]
pub fn scalar(order: u32, ty: ScalarType) -> FieldSpec {
    FieldSpec::ordered(order, FieldKind::Scalar(ty))
}

pub fn bool(order: u32) -> FieldSpec {
    scalar(order, ScalarType::Bool)
}

pub fn i8(order: u32) -> FieldSpec {
    scalar(order, ScalarType::I8)
}

pub fn u8(order: u32) -> FieldSpec {
    scalar(order, ScalarType::U8)
}

pub fn i16(order: u32) -> FieldSpec {
    scalar(order, ScalarType::I16)
}

pub fn u16(order: u32) -> FieldSpec {
    scalar(order, ScalarType::U16)
}

pub fn i32(order: u32) -> FieldSpec {
    scalar(order, ScalarType::I32)
}

pub fn u32(order: u32) -> FieldSpec {
    scalar(order, ScalarType::U32)
}

pub fn i64(order: u32) -> FieldSpec {
    scalar(order, ScalarType::I64)
}

pub fn u64(order: u32) -> FieldSpec {
    scalar(order, ScalarType::U64)
}

pub fn f32(order: u32) -> FieldSpec {
    scalar(order, ScalarType::F32)
}

pub fn f64(order: u32) -> FieldSpec {
    scalar(order, ScalarType::F64)
}

/// `const char*`, written from a retained NUL-terminated copy on flush.
pub fn string(order: u32) -> FieldSpec {
    scalar(order, ScalarType::Str)
}

/// Opaque `void*`.
pub fn pointer(order: u32) -> FieldSpec {
    scalar(order, ScalarType::Pointer)
}

pub fn enumeration(order: u32, width: EnumWidth) -> FieldSpec {
    FieldSpec::ordered(order, FieldKind::Enum { width })
}

pub fn fixed_array(order: u32, element: ScalarType, length: usize) -> FieldSpec {
    FieldSpec::ordered(order, FieldKind::FixedArray { element, length })
}

pub fn dynamic_array(order: u32, element: ScalarType) -> FieldSpec {
    FieldSpec::ordered(order, FieldKind::DynamicArray { element })
}

pub fn inline_struct(order: u32, schema: impl Into<SchemaRef>) -> FieldSpec {
    FieldSpec::ordered(
        order,
        FieldKind::InlineStruct(StructTarget {
            schema: schema.into(),
            overlay: false,
        }),
    )
}

/// Inline child laid out as a union.
pub fn inline_union(order: u32, schema: impl Into<SchemaRef>) -> FieldSpec {
    FieldSpec::ordered(
        order,
        FieldKind::InlineStruct(StructTarget {
            schema: schema.into(),
            overlay: true,
        }),
    )
}

pub fn struct_pointer(order: u32, schema: impl Into<SchemaRef>) -> FieldSpec {
    FieldSpec::ordered(
        order,
        FieldKind::StructPointer(StructTarget {
            schema: schema.into(),
            overlay: false,
        }),
    )
}

/// Pointer to a struct of the enclosing schema (`pNext`-style chains).
pub fn self_pointer(order: u32) -> FieldSpec {
    struct_pointer(order, SchemaRef::SelfRef)
}

pub fn function_pointer(order: u32) -> FieldSpec {
    FieldSpec::ordered(order, FieldKind::FunctionPointer)
}
