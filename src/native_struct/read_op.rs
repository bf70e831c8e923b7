use super::StructInstance;
use crate::deserialization::{decode_address, decode_elements, decode_scalar, decode_unsigned};
use crate::error::{MemoryError, StructError};
use crate::fields::FieldKind;
use crate::memory::NativeMemory;
use crate::schema::StructSchema;
use crate::types::{MAX_CSTR_LEN, ScalarType};
use crate::value::{FieldValue, Number};
use log::{trace, warn};
use smol_str::SmolStr;
use std::sync::Arc;

impl StructInstance {
    /// Load every field value from the buffer.
    ///
    /// Non-null struct pointers are followed into fresh child instances, up to
    /// `max_pointer_depth` hops; deeper pointers are kept as raw addresses.
    /// String fields are dereferenced as C strings.
    pub fn read(&mut self) -> Result<(), StructError> {
        self.read_at_depth(0)
    }

    pub(crate) fn read_at_depth(&mut self, depth: usize) -> Result<(), StructError> {
        let Self {
            schema,
            layout,
            config,
            memory,
            values,
            buffer,
            array_lens,
            ..
        } = self;
        let schema: &Arc<StructSchema> = schema;
        let pointer_width = config.pointer_width;

        for (index, field) in schema.fields().iter().enumerate() {
            let slot = layout.slots[index];
            let bytes = &buffer[slot.range()];

            match &field.kind {
                FieldKind::Scalar(ScalarType::Str) => {
                    values[index] = read_cstr(&**memory, decode_address(bytes))?;
                }
                FieldKind::Scalar(ty) => values[index] = decode_scalar(*ty, bytes),
                FieldKind::Enum { .. } => {
                    values[index] = FieldValue::Number(Number::U64(decode_unsigned(bytes)));
                }
                // Function pointers are opaque handles; the stored value wins.
                FieldKind::FunctionPointer => {}
                FieldKind::InlineStruct(target) => {
                    let reusable = matches!(&values[index], FieldValue::Struct(child) if child.size() == slot.size);
                    if !reusable {
                        let child_schema = target.schema.resolve(schema)?;
                        let child =
                            StructInstance::with_config(&child_schema, memory.clone(), target.overlay, *config)?;
                        values[index] = FieldValue::Struct(Box::new(child));
                    }
                    if let FieldValue::Struct(child) = &mut values[index] {
                        child.buffer.copy_from_slice(bytes);
                        child.read_at_depth(depth)?;
                    }
                }
                FieldKind::StructPointer(target) => {
                    let address = decode_address(bytes);
                    values[index] = if address == 0 {
                        FieldValue::Null
                    } else if depth >= config.max_pointer_depth {
                        warn!(
                            "{}.{}: pointer depth limit {} reached, keeping raw address {:#x}",
                            schema.name(),
                            field.name,
                            config.max_pointer_depth,
                            address
                        );
                        FieldValue::Address(address)
                    } else {
                        let target_schema = target.schema.resolve(schema)?;
                        let mut pointee =
                            StructInstance::with_config(&target_schema, memory.clone(), target.overlay, *config)?;
                        for (i, byte) in pointee.buffer.iter_mut().enumerate() {
                            *byte = memory.read_byte(address, i)?;
                        }
                        pointee.read_at_depth(depth + 1)?;
                        FieldValue::Struct(Box::new(pointee))
                    };
                }
                FieldKind::FixedArray { element, length } => {
                    values[index] = FieldValue::Array(decode_elements(*element, bytes, *length, pointer_width));
                }
                FieldKind::DynamicArray { element } => {
                    let address = decode_address(bytes);
                    values[index] = match array_lens[index] {
                        None => FieldValue::Null,
                        Some(0) => FieldValue::Array(decode_elements(*element, &[], 0, pointer_width)),
                        Some(_) if address == 0 => FieldValue::Null,
                        Some(count) => {
                            let len = count
                                .checked_mul(element.width(pointer_width))
                                .ok_or_else(|| StructError::SizeOverflow(field.name.clone()))?;
                            let raw = (0..len)
                                .map(|i| memory.read_byte(address, i))
                                .collect::<Result<Vec<u8>, MemoryError>>()?;
                            FieldValue::Array(decode_elements(*element, &raw, count, pointer_width))
                        }
                    };
                }
            }
        }

        trace!("{}: read {} fields at depth {}", schema.name(), values.len(), depth);
        Ok(())
    }
}

/// Dereference a C string; a zero address reads as `Null`.
fn read_cstr(memory: &dyn NativeMemory, address: u64) -> Result<FieldValue, StructError> {
    if address == 0 {
        return Ok(FieldValue::Null);
    }
    let mut bytes = Vec::new();
    while bytes.len() < MAX_CSTR_LEN {
        let b = memory.read_byte(address, bytes.len())?;
        if b == 0 {
            break;
        }
        bytes.push(b);
    }
    Ok(FieldValue::Str(SmolStr::new(String::from_utf8_lossy(&bytes))))
}
