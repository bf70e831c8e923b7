use crate::error::StructError;
use crate::fields::{FieldKind, FieldSpec};
use rustc_hash::{FxHashMap, FxHashSet};
use smol_str::SmolStr;
use std::fmt::{self, Write as _};
use std::sync::{Arc, OnceLock, Weak};
use xxhash_rust::xxh64::xxh64;

// ─── SchemaCell ─────────────────────────────────────────────────────────────

/// Indirection filled in after the referenced schema has been built.
///
/// Holds a weak reference: the cell never keeps a schema alive, so a schema
/// that points at itself through a cell does not leak. The resolved schema
/// must be kept alive by the caller (or by a
/// [`SchemaRegistry`](crate::registry::SchemaRegistry)) for as long as any
/// schema referencing the cell is used. Once it is dropped, the cell reads as
/// unresolved again and layout, flush and read of referencing fields fail with
/// [`StructError::UnresolvedSchema`].
pub struct SchemaCell {
    name: SmolStr,
    slot: OnceLock<Weak<StructSchema>>,
}

impl SchemaCell {
    pub fn new(name: impl Into<SmolStr>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            slot: OnceLock::new(),
        })
    }

    #[inline]
    pub fn name(&self) -> &SmolStr {
        &self.name
    }

    /// Fill the cell. A cell resolves exactly once.
    pub fn resolve(&self, schema: &Arc<StructSchema>) -> Result<(), StructError> {
        self.slot
            .set(Arc::downgrade(schema))
            .map_err(|_| StructError::AlreadyResolved(self.name.clone()))
    }

    pub fn get(&self) -> Option<Arc<StructSchema>> {
        self.slot.get()?.upgrade()
    }

    pub fn is_resolved(&self) -> bool {
        self.get().is_some()
    }
}

impl fmt::Debug for SchemaCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaCell")
            .field("name", &self.name)
            .field("resolved", &self.is_resolved())
            .finish()
    }
}

// ─── SchemaRef ──────────────────────────────────────────────────────────────

/// Reference from a struct field to the schema of its child.
#[derive(Clone)]
pub enum SchemaRef {
    Schema(Arc<StructSchema>),
    /// The schema that contains the field.
    SelfRef,
    /// Resolved lazily through a [`SchemaCell`].
    Deferred(Arc<SchemaCell>),
}

impl SchemaRef {
    pub fn resolve(&self, enclosing: &Arc<StructSchema>) -> Result<Arc<StructSchema>, StructError> {
        match self {
            Self::Schema(schema) => Ok(schema.clone()),
            Self::SelfRef => Ok(enclosing.clone()),
            Self::Deferred(cell) => cell
                .get()
                .ok_or_else(|| StructError::UnresolvedSchema(cell.name.clone())),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Schema(schema) => schema.name(),
            Self::SelfRef => "self",
            Self::Deferred(cell) => cell.name(),
        }
    }
}

impl fmt::Debug for SchemaRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Schema(schema) => write!(f, "Schema({})", schema.name()),
            Self::SelfRef => f.write_str("SelfRef"),
            Self::Deferred(cell) => write!(f, "Deferred({})", cell.name()),
        }
    }
}

impl From<Arc<StructSchema>> for SchemaRef {
    fn from(schema: Arc<StructSchema>) -> Self {
        Self::Schema(schema)
    }
}

impl From<&Arc<StructSchema>> for SchemaRef {
    fn from(schema: &Arc<StructSchema>) -> Self {
        Self::Schema(schema.clone())
    }
}

impl From<Arc<SchemaCell>> for SchemaRef {
    fn from(cell: Arc<SchemaCell>) -> Self {
        Self::Deferred(cell)
    }
}

impl From<&Arc<SchemaCell>> for SchemaRef {
    fn from(cell: &Arc<SchemaCell>) -> Self {
        Self::Deferred(cell.clone())
    }
}

// ─── StructSchema ───────────────────────────────────────────────────────────

/// A validated field of a schema.
#[derive(Debug, Clone)]
pub struct SchemaField {
    pub name: SmolStr,
    pub order: u32,
    pub kind: FieldKind,
}

/// Ordered, validated collection of named fields. Built once, shared by every
/// instance through an `Arc`.
#[derive(Debug)]
pub struct StructSchema {
    name: SmolStr,
    /// Sorted by `order`.
    fields: Vec<SchemaField>,
    index: FxHashMap<SmolStr, usize>,
    fingerprint: u64,
}

impl StructSchema {
    /// Validate and build a schema. Declaration order is irrelevant; fields are
    /// sorted by their `order`.
    pub fn new<I, K>(name: impl Into<SmolStr>, fields: I) -> Result<Arc<Self>, StructError>
    where
        I: IntoIterator<Item = (K, FieldSpec)>,
        K: Into<SmolStr>,
    {
        let name = name.into();
        let mut validated: Vec<SchemaField> = Vec::new();
        let mut orders: FxHashSet<u32> = FxHashSet::default();

        for (field_name, spec) in fields {
            let field_name: SmolStr = field_name.into();
            let order = spec
                .order
                .ok_or_else(|| StructError::MissingOrder(field_name.clone()))?;
            if !orders.insert(order) {
                return Err(StructError::DuplicateOrder {
                    order,
                    field: field_name,
                });
            }
            if validated.iter().any(|f| f.name == field_name) {
                return Err(StructError::DuplicateField(field_name));
            }
            match &spec.kind {
                FieldKind::FixedArray { length: 0, .. } => {
                    return Err(StructError::ZeroLengthArray(field_name));
                }
                FieldKind::InlineStruct(target) if matches!(target.schema, SchemaRef::SelfRef) => {
                    return Err(StructError::SelfInline(field_name));
                }
                _ => {}
            }
            validated.push(SchemaField {
                name: field_name,
                order,
                kind: spec.kind,
            });
        }

        if validated.is_empty() {
            return Err(StructError::EmptySchema(name));
        }

        validated.sort_unstable_by_key(|f| f.order);
        let index = validated
            .iter()
            .enumerate()
            .map(|(i, f)| (f.name.clone(), i))
            .collect();
        let fingerprint = fingerprint_of(&name, &validated);

        Ok(Arc::new(Self {
            name,
            fields: validated,
            index,
            fingerprint,
        }))
    }

    pub fn builder(name: impl Into<SmolStr>) -> SchemaBuilder {
        SchemaBuilder {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    #[inline]
    pub fn name(&self) -> &SmolStr {
        &self.name
    }

    /// Fields in ascending `order`.
    #[inline]
    pub fn fields(&self) -> &[SchemaField] {
        &self.fields
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Always false for a constructed schema; kept for API symmetry with `len`.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    #[inline]
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn field(&self, name: &str) -> Option<&SchemaField> {
        self.index_of(name).map(|i| &self.fields[i])
    }

    /// Structural hash over names, orders and kinds.
    #[inline]
    pub fn fingerprint(&self) -> u64 {
        self.fingerprint
    }

    /// Same schema, or a structurally identical one.
    pub fn is_compatible(&self, other: &StructSchema) -> bool {
        std::ptr::eq(self, other) || self.fingerprint == other.fingerprint
    }
}

fn fingerprint_of(name: &str, fields: &[SchemaField]) -> u64 {
    let mut canon = String::with_capacity(32 + fields.len() * 16);
    let _ = write!(canon, "{name}{{");
    for field in fields {
        let _ = write!(canon, "{}:{}:", field.name, field.order);
        let _ = match &field.kind {
            FieldKind::Scalar(ty) => write!(canon, "{ty}"),
            FieldKind::Enum { width } => write!(canon, "enum/{}", width.label()),
            FieldKind::FixedArray { element, length } => write!(canon, "[{element};{length}]"),
            FieldKind::DynamicArray { element } => write!(canon, "[{element}]"),
            FieldKind::InlineStruct(target) => match &target.schema {
                SchemaRef::Schema(child) => {
                    write!(canon, "inline({:016x},{})", child.fingerprint(), target.overlay)
                }
                other => write!(canon, "inline({},{})", other.name(), target.overlay),
            },
            FieldKind::StructPointer(target) => write!(canon, "*{}", target.schema.name()),
            FieldKind::FunctionPointer => write!(canon, "fn"),
        };
        canon.push(';');
    }
    canon.push('}');
    xxh64(canon.as_bytes(), 0)
}

// ─── SchemaBuilder ──────────────────────────────────────────────────────────

pub struct SchemaBuilder {
    name: SmolStr,
    fields: Vec<(SmolStr, FieldSpec)>,
}

impl SchemaBuilder {
    pub fn field(mut self, name: impl Into<SmolStr>, spec: FieldSpec) -> Self {
        self.fields.push((name.into(), spec));
        self
    }

    pub fn build(self) -> Result<Arc<StructSchema>, StructError> {
        StructSchema::new(self.name, self.fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::{self, FieldKind, FieldSpec};
    use crate::types::ScalarType;

    #[test]
    fn test_fields_sorted_by_order() {
        let schema = StructSchema::builder("S")
            .field("c", fields::u8(2))
            .field("a", fields::u32(0))
            .field("b", fields::u16(1))
            .build()
            .unwrap();
        let names: Vec<&str> = schema.fields().iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["a", "b", "c"]);
        assert_eq!(schema.index_of("c"), Some(2));
        assert!(schema.field("missing").is_none());
    }

    #[test]
    fn test_empty_schema_rejected() {
        let err = StructSchema::new("Empty", Vec::<(&str, FieldSpec)>::new()).unwrap_err();
        assert!(matches!(err, StructError::EmptySchema(name) if name == "Empty"));
    }

    #[test]
    fn test_missing_order_rejected() {
        let err = StructSchema::builder("S")
            .field("a", fields::u32(0))
            .field("b", FieldSpec::new(FieldKind::Scalar(ScalarType::U8)))
            .build()
            .unwrap_err();
        assert!(matches!(err, StructError::MissingOrder(name) if name == "b"));
    }

    #[test]
    fn test_duplicate_order_rejected() {
        let err = StructSchema::builder("S")
            .field("a", fields::u32(1))
            .field("b", fields::u64(1))
            .build()
            .unwrap_err();
        assert!(matches!(err, StructError::DuplicateOrder { order: 1, .. }));
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let err = StructSchema::builder("S")
            .field("a", fields::u32(0))
            .field("a", fields::u64(1))
            .build()
            .unwrap_err();
        assert!(matches!(err, StructError::DuplicateField(_)));
    }

    #[test]
    fn test_zero_length_fixed_array_rejected() {
        let err = StructSchema::builder("S")
            .field("a", fields::fixed_array(0, ScalarType::F32, 0))
            .build()
            .unwrap_err();
        assert!(matches!(err, StructError::ZeroLengthArray(_)));
    }

    #[test]
    fn test_inline_self_rejected() {
        let err = StructSchema::builder("Node")
            .field("me", fields::inline_struct(0, SchemaRef::SelfRef))
            .build()
            .unwrap_err();
        assert!(matches!(err, StructError::SelfInline(_)));
    }

    #[test]
    fn test_deferred_cell_resolves_once() {
        let cell = SchemaCell::new("Node");
        let node = StructSchema::builder("Node")
            .field("value", fields::u32(0))
            .field("next", fields::struct_pointer(1, &cell))
            .build()
            .unwrap();

        let next = SchemaRef::from(&cell);
        assert!(matches!(
            next.resolve(&node),
            Err(StructError::UnresolvedSchema(_))
        ));

        cell.resolve(&node).unwrap();
        assert!(Arc::ptr_eq(&next.resolve(&node).unwrap(), &node));
        assert!(matches!(
            cell.resolve(&node),
            Err(StructError::AlreadyResolved(_))
        ));
    }

    #[test]
    fn test_cell_does_not_keep_schema_alive() {
        let cell = SchemaCell::new("Tmp");
        {
            let schema = StructSchema::builder("Tmp")
                .field("x", fields::u8(0))
                .build()
                .unwrap();
            cell.resolve(&schema).unwrap();
            assert!(cell.is_resolved());
        }
        assert!(!cell.is_resolved());
    }

    #[test]
    fn test_fingerprint_is_structural() {
        let build = |order_b| {
            StructSchema::builder("S")
                .field("a", fields::u32(0))
                .field("b", fields::f64(order_b))
                .build()
                .unwrap()
        };
        let first = build(1);
        let second = build(1);
        let third = build(2);
        assert_eq!(first.fingerprint(), second.fingerprint());
        assert!(first.is_compatible(&second));
        assert_ne!(first.fingerprint(), third.fingerprint());
    }
}
