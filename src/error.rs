// ─── Error ──────────────────────────────────────────────────────────────────
use smol_str::SmolStr;
use thiserror::Error;

/// Failure reported by a [`NativeMemory`](crate::memory::NativeMemory) collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MemoryError {
    #[error("Null address")]
    NullAddress,
    #[error("Address {address:#x}+{index} is not mapped")]
    Unmapped { address: u64, index: usize },
}

#[derive(Debug, Error)]
pub enum StructError {
    // Schema validation
    #[error("Struct schema `{0}` has no fields")]
    EmptySchema(SmolStr),
    #[error("Missing order for field `{0}`")]
    MissingOrder(SmolStr),
    #[error("Duplicate order {order} found on field `{field}`")]
    DuplicateOrder { order: u32, field: SmolStr },
    #[error("Duplicate field name `{0}`")]
    DuplicateField(SmolStr),
    #[error("Fixed array `{0}` must have a non-zero length")]
    ZeroLengthArray(SmolStr),
    #[error("Cannot inline self-referencing struct in field `{0}`")]
    SelfInline(SmolStr),
    #[error("Schema reference `{0}` is not resolved")]
    UnresolvedSchema(SmolStr),
    #[error("Schema reference `{0}` was already resolved")]
    AlreadyResolved(SmolStr),
    #[error("Inline struct nesting exceeds {0} levels")]
    InlineDepthExceeded(usize),
    #[error("Size of field `{0}` overflows the address space")]
    SizeOverflow(SmolStr),

    // Configuration
    #[error("Invalid pack limit {0}: expected a power of two in 1..=16")]
    InvalidPackLimit(usize),
    #[error("Invalid pointer width {0}: expected 4 or 8")]
    InvalidPointerWidth(usize),

    // Field access
    #[error("Unknown struct field `{0}`")]
    UnknownField(SmolStr),

    // Type mismatch
    #[error("Invalid value for inline struct field `{0}`")]
    InvalidInlineValue(SmolStr),
    #[error("Invalid value for pointer-to-struct field `{0}`")]
    InvalidPointerValue(SmolStr),
    #[error("Invalid array length on `{field}`: expected {expected}, got {actual}")]
    ArrayLengthMismatch {
        field: SmolStr,
        expected: usize,
        actual: usize,
    },
    #[error("Invalid array element kind {element} for plain array field `{field}`")]
    UnsupportedArrayElement { field: SmolStr, element: &'static str },
    #[error("Type mismatch on `{field}`: expected {expected}, got {actual}")]
    TypeMismatch {
        field: SmolStr,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("Address {address:#x} on `{field}` does not fit in {width} bytes")]
    AddressOverflow { field: SmolStr, address: u64, width: usize },

    // Raw buffer access
    #[error("Range {start}..{end} is outside the {size}-byte struct buffer")]
    OutOfBounds { start: usize, end: usize, size: usize },

    // Collaborators
    #[error(transparent)]
    Memory(#[from] MemoryError),
    #[error("Schema definition error: {0}")]
    Definition(String),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
