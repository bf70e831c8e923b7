use super::StructInstance;
use crate::config::MarshalConfig;
use crate::error::StructError;
use crate::fields::{FieldKind, StructTarget};
use crate::layout::FieldSlot;
use crate::memory::NativeMemory;
use crate::retention::Retention;
use crate::schema::{SchemaField, StructSchema};
use crate::serialization::{cstr, encode_address, encode_elements, encode_enum, encode_scalar};
use crate::types::ScalarType;
use crate::value::{ArrayValue, FieldValue};
use log::{debug, trace};
use std::sync::Arc;

impl StructInstance {
    /// Write every field value into the buffer.
    ///
    /// The buffer is zeroed first and the buffers retained by the previous
    /// flush are released. Struct children (inline and pointed-to) are flushed
    /// recursively. A union writes only its active member, or every member in
    /// order when none has been assigned.
    pub fn flush(&mut self) -> Result<(), StructError> {
        self.buffer.fill(0);
        let released = self.retention.reset();
        if released > 0 {
            debug!(
                "{}: released {} buffers retained by the previous flush",
                self.schema.name(),
                released
            );
        }

        let Self {
            schema,
            layout,
            config,
            memory,
            values,
            buffer,
            retention,
            array_lens,
            active,
        } = self;
        let schema: &Arc<StructSchema> = schema;
        let active = *active;

        let mut ctx = FlushCtx {
            enclosing: schema,
            buffer,
            retention,
            memory: &**memory,
            config,
        };

        for (index, field) in schema.fields().iter().enumerate() {
            if active.is_some_and(|member| member != index) {
                continue;
            }
            ctx.flush_field(field, layout.slots[index], &mut values[index], &mut array_lens[index])?;
        }

        trace!(
            "{}: flushed {} bytes, {} retained",
            schema.name(),
            ctx.buffer.len(),
            ctx.retention.len()
        );
        Ok(())
    }
}

// ─── FlushCtx ───────────────────────────────────────────────────────────────

struct FlushCtx<'a> {
    enclosing: &'a Arc<StructSchema>,
    buffer: &'a mut [u8],
    retention: &'a mut Retention,
    memory: &'a dyn NativeMemory,
    config: &'a MarshalConfig,
}

impl FlushCtx<'_> {
    fn flush_field(
        &mut self,
        field: &SchemaField,
        slot: FieldSlot,
        value: &mut FieldValue,
        array_len: &mut Option<usize>,
    ) -> Result<(), StructError> {
        let pointer_width = self.config.pointer_width;

        match &field.kind {
            FieldKind::Scalar(ScalarType::Str) => {
                let address = match value {
                    FieldValue::Str(s) if s.is_empty() => 0,
                    FieldValue::Str(s) => self.retain(cstr(s)),
                    other => other.as_address().ok_or_else(|| StructError::TypeMismatch {
                        field: field.name.clone(),
                        expected: "string",
                        actual: other.label(),
                    })?,
                };
                self.write(slot.offset, &encode_address(&field.name, address, pointer_width)?);
            }
            FieldKind::Scalar(ty) => {
                let bytes = encode_scalar(&field.name, *ty, value, pointer_width)?;
                self.write(slot.offset, &bytes);
            }
            FieldKind::Enum { width } => {
                let bytes = encode_enum(&field.name, width.bytes(), value)?;
                self.write(slot.offset, &bytes);
            }
            FieldKind::FunctionPointer => {
                let address = value
                    .as_address()
                    .ok_or_else(|| StructError::InvalidPointerValue(field.name.clone()))?;
                self.write(slot.offset, &encode_address(&field.name, address, pointer_width)?);
            }
            FieldKind::InlineStruct(target) => {
                let FieldValue::Struct(child) = value else {
                    return Err(StructError::InvalidInlineValue(field.name.clone()));
                };
                self.check_target(field, target, child)?;
                if child.size() != slot.size {
                    return Err(StructError::TypeMismatch {
                        field: field.name.clone(),
                        expected: if target.overlay { "union" } else { "struct" },
                        actual: if child.is_overlay() { "union" } else { "struct" },
                    });
                }
                child.flush()?;
                self.write(slot.offset, child.as_bytes());
            }
            FieldKind::StructPointer(target) => {
                let address = match value {
                    FieldValue::Struct(child) => {
                        self.check_target(field, target, child)?;
                        child.flush()?;
                        child.pointer()
                    }
                    FieldValue::Null => 0,
                    FieldValue::Address(address) => *address,
                    FieldValue::Number(n) => n
                        .as_u64()
                        .ok_or_else(|| StructError::InvalidPointerValue(field.name.clone()))?,
                    _ => return Err(StructError::InvalidPointerValue(field.name.clone())),
                };
                self.write(slot.offset, &encode_address(&field.name, address, pointer_width)?);
            }
            FieldKind::FixedArray { element, length } => match value {
                FieldValue::Null => {}
                FieldValue::Array(array) => {
                    if array.len() != *length {
                        return Err(StructError::ArrayLengthMismatch {
                            field: field.name.clone(),
                            expected: *length,
                            actual: array.len(),
                        });
                    }
                    let bytes = self.encode_array(field, *element, array)?;
                    let n = bytes.len().min(slot.size);
                    self.write(slot.offset, &bytes[..n]);
                }
                other => {
                    return Err(StructError::TypeMismatch {
                        field: field.name.clone(),
                        expected: "array",
                        actual: other.label(),
                    });
                }
            },
            FieldKind::DynamicArray { element } => {
                let address = match value {
                    FieldValue::Null => {
                        *array_len = None;
                        0
                    }
                    FieldValue::Array(array) => {
                        let bytes = self.encode_array(field, *element, array)?;
                        *array_len = Some(array.len());
                        if bytes.is_empty() { 0 } else { self.retain(bytes) }
                    }
                    // Storage owned by native code; the count stays as supplied.
                    FieldValue::Address(address) => *address,
                    other => {
                        return Err(StructError::TypeMismatch {
                            field: field.name.clone(),
                            expected: "array",
                            actual: other.label(),
                        });
                    }
                };
                self.write(slot.offset, &encode_address(&field.name, address, pointer_width)?);
            }
        }
        Ok(())
    }

    /// A child instance must have been built from the declared schema (or a
    /// structurally identical one).
    fn check_target(
        &self,
        field: &SchemaField,
        target: &StructTarget,
        child: &StructInstance,
    ) -> Result<(), StructError> {
        let expected = target.schema.resolve(self.enclosing)?;
        if child.schema().is_compatible(&expected) {
            Ok(())
        } else {
            Err(StructError::TypeMismatch {
                field: field.name.clone(),
                expected: "struct of the declared schema",
                actual: "struct of another schema",
            })
        }
    }

    fn encode_array(
        &mut self,
        field: &SchemaField,
        element: ScalarType,
        array: &ArrayValue,
    ) -> Result<Vec<u8>, StructError> {
        let retention = &mut *self.retention;
        let memory = self.memory;
        encode_elements(&field.name, element, array, self.config.pointer_width, |s| {
            memory.address_of(retention.retain(cstr(s)))
        })
    }

    #[inline]
    fn retain(&mut self, bytes: Vec<u8>) -> u64 {
        self.memory.address_of(self.retention.retain(bytes))
    }

    #[inline]
    fn write(&mut self, offset: usize, bytes: &[u8]) {
        self.buffer[offset..offset + bytes.len()].copy_from_slice(bytes);
    }
}
