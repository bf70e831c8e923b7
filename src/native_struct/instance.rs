use crate::config::MarshalConfig;
use crate::error::StructError;
use crate::fields::FieldKind;
use crate::layout::{FieldSlot, StructLayout, compute_layout};
use crate::memory::NativeMemory;
use crate::retention::{PinnedBuffers, Retention};
use crate::schema::StructSchema;
use crate::types::ScalarType;
use crate::value::{ArrayValue, FieldValue, Number};
use serde::ser::{Serialize, SerializeMap, Serializer};
use smol_str::SmolStr;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

// ─── StructInstance ─────────────────────────────────────────────────────────

/// One C-compatible struct: a value store, the fixed layout of its schema and
/// the single byte buffer native code sees.
///
/// Values and bytes are only synchronized at explicit commit points:
/// [`flush`](Self::flush) writes values into the buffer, [`read`](Self::read)
/// loads them back.
pub struct StructInstance {
    pub(crate) schema: Arc<StructSchema>,
    pub(crate) layout: StructLayout,
    pub(crate) config: MarshalConfig,
    pub(crate) memory: Rc<dyn NativeMemory>,
    /// Parallel to `schema.fields()`.
    pub(crate) values: Vec<FieldValue>,
    /// Allocated once; never resized.
    pub(crate) buffer: Box<[u8]>,
    pub(crate) retention: Retention,
    /// Element counts of dynamic arrays, recorded by flush or supplied by the caller.
    pub(crate) array_lens: Vec<Option<usize>>,
    /// Union member most recently assigned through `set` or `get_mut`; the
    /// only member a union flush writes. Always `None` for plain structs.
    pub(crate) active: Option<usize>,
}

impl StructInstance {
    pub fn new(schema: &Arc<StructSchema>, memory: Rc<dyn NativeMemory>) -> Result<Self, StructError> {
        Self::with_config(schema, memory, false, MarshalConfig::default())
    }

    /// Union layout: every field at offset 0.
    pub fn new_overlay(schema: &Arc<StructSchema>, memory: Rc<dyn NativeMemory>) -> Result<Self, StructError> {
        Self::with_config(schema, memory, true, MarshalConfig::default())
    }

    pub fn with_config(
        schema: &Arc<StructSchema>,
        memory: Rc<dyn NativeMemory>,
        overlay: bool,
        config: MarshalConfig,
    ) -> Result<Self, StructError> {
        let layout = compute_layout(schema, overlay, &config)?;
        let values = default_values(schema, &memory, &config)?;
        let buffer = vec![0u8; layout.size].into_boxed_slice();
        let array_lens = vec![None; values.len()];

        Ok(Self {
            schema: schema.clone(),
            layout,
            config,
            memory,
            values,
            buffer,
            retention: Retention::new(),
            array_lens,
            active: None,
        })
    }

    // ════════════════════════════════════════════════════════════════════════
    // Layout & buffer
    // ════════════════════════════════════════════════════════════════════════

    #[inline]
    pub fn schema(&self) -> &Arc<StructSchema> {
        &self.schema
    }

    #[inline]
    pub fn layout(&self) -> &StructLayout {
        &self.layout
    }

    #[inline]
    pub fn config(&self) -> &MarshalConfig {
        &self.config
    }

    #[inline]
    pub fn memory(&self) -> &Rc<dyn NativeMemory> {
        &self.memory
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.layout.size
    }

    #[inline]
    pub fn alignment(&self) -> usize {
        self.layout.alignment
    }

    #[inline]
    pub fn is_overlay(&self) -> bool {
        self.layout.overlay
    }

    /// Address of the byte buffer, to pass to a native call.
    #[inline]
    pub fn pointer(&self) -> u64 {
        self.memory.address_of(&self.buffer)
    }

    /// Raw bytes as of the last flush (or as written by native code).
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    /// Mutable pointer for native calls that fill the struct in.
    #[inline]
    pub fn as_mut_ptr(&mut self) -> *mut u8 {
        self.buffer.as_mut_ptr()
    }

    /// Slot of a field.
    pub fn offset_of(&self, name: &str) -> Result<FieldSlot, StructError> {
        let index = self.index(name)?;
        Ok(self.layout.slots[index])
    }

    /// Buffers kept alive by the last flush.
    #[inline]
    pub fn retained(&self) -> &Retention {
        &self.retention
    }

    /// Detach the buffers retained by the last flush, including those of
    /// child instances, so later flushes do not release them.
    pub fn pin_retained(&mut self) -> PinnedBuffers {
        let mut pinned = self.retention.take();
        for value in &mut self.values {
            if let FieldValue::Struct(child) = value {
                pinned.merge(child.pin_retained());
            }
        }
        pinned
    }

    // ════════════════════════════════════════════════════════════════════════
    // Value store
    // ════════════════════════════════════════════════════════════════════════

    #[inline]
    fn index(&self, name: &str) -> Result<usize, StructError> {
        self.schema
            .index_of(name)
            .ok_or_else(|| StructError::UnknownField(SmolStr::new(name)))
    }

    pub fn get(&self, name: &str) -> Result<&FieldValue, StructError> {
        let index = self.index(name)?;
        Ok(&self.values[index])
    }

    /// Mutable access, e.g. to edit an inline child in place. On a union this
    /// makes `name` the active member.
    pub fn get_mut(&mut self, name: &str) -> Result<&mut FieldValue, StructError> {
        let index = self.index(name)?;
        self.touch(index);
        Ok(&mut self.values[index])
    }

    /// Replace a field's value. Bytes are untouched until the next flush. On a
    /// union this makes `name` the active member.
    pub fn set(&mut self, name: &str, value: impl Into<FieldValue>) -> Result<(), StructError> {
        let index = self.index(name)?;
        self.touch(index);
        self.values[index] = value.into();
        Ok(())
    }

    #[inline]
    fn touch(&mut self, index: usize) {
        if self.layout.overlay {
            self.active = Some(index);
        }
    }

    /// Union member the next flush writes, if one has been assigned.
    pub fn active_member(&self) -> Option<&SmolStr> {
        self.active.map(|index| &self.schema.fields()[index].name)
    }

    /// Fields in ascending order with their current values.
    pub fn fields(&self) -> impl Iterator<Item = (&SmolStr, &FieldValue)> {
        self.schema
            .fields()
            .iter()
            .zip(self.values.iter())
            .map(|(field, value)| (&field.name, value))
    }

    /// Supply the element count of a dynamic array filled by native code, so
    /// `read()` can copy it.
    pub fn set_array_len(&mut self, name: &str, count: usize) -> Result<(), StructError> {
        let index = self.dynamic_array_index(name)?;
        self.array_lens[index] = Some(count);
        Ok(())
    }

    pub fn array_len(&self, name: &str) -> Result<Option<usize>, StructError> {
        let index = self.dynamic_array_index(name)?;
        Ok(self.array_lens[index])
    }

    fn dynamic_array_index(&self, name: &str) -> Result<usize, StructError> {
        let index = self.index(name)?;
        match &self.schema.fields()[index].kind {
            FieldKind::DynamicArray { .. } => Ok(index),
            other => Err(StructError::TypeMismatch {
                field: SmolStr::new(name),
                expected: "dynamic array",
                actual: other.label(),
            }),
        }
    }

    /// Snapshot of the value store as JSON.
    pub fn to_json(&self) -> Result<serde_json::Value, StructError> {
        Ok(serde_json::to_value(self)?)
    }
}

// ─── Defaults ───────────────────────────────────────────────────────────────

/// Zero value of a non-inline field kind.
pub(crate) fn zero_value(kind: &FieldKind) -> FieldValue {
    match kind {
        FieldKind::Scalar(ScalarType::Bool) => FieldValue::Bool(false),
        FieldKind::Scalar(ScalarType::Str | ScalarType::Pointer) => FieldValue::Null,
        FieldKind::Scalar(ty) if ty.is_float() => FieldValue::Number(Number::F64(0.0)),
        FieldKind::Scalar(ty) if ty.is_signed() => FieldValue::Number(Number::I64(0)),
        FieldKind::Scalar(_) | FieldKind::Enum { .. } => FieldValue::Number(Number::U64(0)),
        FieldKind::FixedArray { element, length } => FieldValue::Array(ArrayValue::zeroed(*element, *length)),
        FieldKind::DynamicArray { .. }
        | FieldKind::StructPointer(_)
        | FieldKind::FunctionPointer
        | FieldKind::InlineStruct(_) => FieldValue::Null,
    }
}

fn default_values(
    schema: &Arc<StructSchema>,
    memory: &Rc<dyn NativeMemory>,
    config: &MarshalConfig,
) -> Result<Vec<FieldValue>, StructError> {
    schema
        .fields()
        .iter()
        .map(|field| match &field.kind {
            FieldKind::InlineStruct(target) => {
                let child_schema = target.schema.resolve(schema)?;
                let child = StructInstance::with_config(&child_schema, memory.clone(), target.overlay, *config)?;
                Ok(FieldValue::Struct(Box::new(child)))
            }
            kind => Ok(zero_value(kind)),
        })
        .collect()
}

// ─── Trait impls ────────────────────────────────────────────────────────────

/// Clones the value store and current bytes. The clone starts with no
/// retained buffers; addresses already in its bytes still refer to the
/// original's retention.
impl Clone for StructInstance {
    fn clone(&self) -> Self {
        Self {
            schema: self.schema.clone(),
            layout: self.layout.clone(),
            config: self.config,
            memory: self.memory.clone(),
            values: self.values.clone(),
            buffer: self.buffer.clone(),
            retention: Retention::new(),
            array_lens: self.array_lens.clone(),
            active: self.active,
        }
    }
}

/// Equal when the schemas are compatible, the layouts match and every value
/// is equal. Bytes are not compared.
impl PartialEq for StructInstance {
    fn eq(&self, other: &Self) -> bool {
        self.schema.is_compatible(&other.schema) && self.layout == other.layout && self.values == other.values
    }
}

impl fmt::Debug for StructInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        struct Values<'a>(&'a StructInstance);
        impl fmt::Debug for Values<'_> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.debug_map().entries(self.0.fields()).finish()
            }
        }

        f.debug_struct("StructInstance")
            .field("schema", self.schema.name())
            .field("size", &self.layout.size)
            .field("alignment", &self.layout.alignment)
            .field("overlay", &self.layout.overlay)
            .field("values", &Values(self))
            .field("retained", &self.retention.len())
            .finish()
    }
}

impl Serialize for StructInstance {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (name, value) in self.fields() {
            map.serialize_entry(name.as_str(), value)?;
        }
        map.end()
    }
}
