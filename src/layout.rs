//! C-compatible layout arithmetic. Pure: the result depends only on the
//! schema, the overlay flag and the config, never on field values.

use crate::config::MarshalConfig;
use crate::error::StructError;
use crate::fields::FieldKind;
use crate::schema::{SchemaField, StructSchema};
use crate::types::MAX_INLINE_DEPTH;
use std::sync::Arc;

/// Position of one field inside the struct buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSlot {
    pub offset: usize,
    pub size: usize,
    /// Effective alignment (after pack clamping).
    pub align: usize,
}

impl FieldSlot {
    #[inline]
    pub fn end(&self) -> usize {
        self.offset + self.size
    }

    #[inline]
    pub fn range(&self) -> std::ops::Range<usize> {
        self.offset..self.end()
    }
}

/// Computed layout of a schema. `slots` parallels `StructSchema::fields()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructLayout {
    pub slots: Vec<FieldSlot>,
    pub size: usize,
    pub alignment: usize,
    pub overlay: bool,
}

impl StructLayout {
    #[inline]
    pub fn slot(&self, index: usize) -> Option<&FieldSlot> {
        self.slots.get(index)
    }
}

/// `(x + a - 1) & !(a - 1)`; `a` must be a power of two.
#[inline]
pub fn align_up(x: usize, align: usize) -> usize {
    debug_assert!(align.is_power_of_two(), "alignment {align} is not a power of two");
    let mask = align - 1;
    (x + mask) & !mask
}

/// [`align_up`] that reports overflow instead of wrapping.
#[inline]
fn checked_align_up(x: usize, align: usize) -> Option<usize> {
    let mask = align - 1;
    x.checked_add(mask).map(|v| v & !mask)
}

pub fn compute_layout(
    schema: &Arc<StructSchema>,
    overlay: bool,
    config: &MarshalConfig,
) -> Result<StructLayout, StructError> {
    config.validate()?;
    let layout = layout_at_depth(schema, overlay, config, 0)?;
    log::debug!(
        "layout {}{}: size={} alignment={} fields={}",
        schema.name(),
        if overlay { " (overlay)" } else { "" },
        layout.size,
        layout.alignment,
        layout.slots.len()
    );
    Ok(layout)
}

fn layout_at_depth(
    schema: &Arc<StructSchema>,
    overlay: bool,
    config: &MarshalConfig,
    depth: usize,
) -> Result<StructLayout, StructError> {
    if depth > MAX_INLINE_DEPTH {
        return Err(StructError::InlineDepthExceeded(MAX_INLINE_DEPTH));
    }

    let mut slots = Vec::with_capacity(schema.len());
    let mut cursor = 0usize;
    let mut max_align = 1usize;
    let mut overlay_max_size = 0usize;

    for field in schema.fields() {
        let (size, natural_align) = natural_layout(field, schema, config, depth)?;
        let align = config.clamp_align(natural_align).max(1);
        max_align = max_align.max(align);

        if overlay {
            slots.push(FieldSlot {
                offset: 0,
                size,
                align,
            });
            overlay_max_size = overlay_max_size.max(size);
        } else {
            let overflow = || StructError::SizeOverflow(field.name.clone());
            let offset = checked_align_up(cursor, align).ok_or_else(overflow)?;
            slots.push(FieldSlot {
                offset,
                size,
                align,
            });
            cursor = offset.checked_add(size).ok_or_else(overflow)?;
        }
    }

    let raw_size = if overlay { overlay_max_size } else { cursor };
    let size = checked_align_up(raw_size, max_align)
        .filter(|size| *size <= isize::MAX as usize)
        .ok_or_else(|| StructError::SizeOverflow(schema.name().clone()))?;
    Ok(StructLayout {
        slots,
        size,
        alignment: max_align,
        overlay,
    })
}

/// Natural `(size, alignment)` of a field kind before pack clamping.
fn natural_layout(
    field: &SchemaField,
    enclosing: &Arc<StructSchema>,
    config: &MarshalConfig,
    depth: usize,
) -> Result<(usize, usize), StructError> {
    let ptr = config.pointer_width;
    Ok(match &field.kind {
        FieldKind::Scalar(ty) => (ty.width(ptr), ty.alignment(ptr)),
        FieldKind::Enum { width } => (width.bytes(), width.bytes()),
        FieldKind::FixedArray { element, length } => {
            let bytes = length
                .checked_mul(element.width(ptr))
                .ok_or_else(|| StructError::SizeOverflow(field.name.clone()))?;
            (bytes.max(ptr), element.alignment(ptr))
        }
        FieldKind::DynamicArray { .. } | FieldKind::StructPointer(_) | FieldKind::FunctionPointer => {
            (ptr, ptr)
        }
        FieldKind::InlineStruct(target) => {
            let child = target.schema.resolve(enclosing)?;
            let child_layout = layout_at_depth(&child, target.overlay, config, depth + 1)?;
            (child_layout.size, child_layout.alignment)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields;
    use crate::schema::{SchemaCell, StructSchema};
    use crate::types::{EnumWidth, ScalarType};

    fn config64() -> MarshalConfig {
        MarshalConfig::default().with_pointer_width(8)
    }

    fn a_u32_b_u64() -> Arc<StructSchema> {
        StructSchema::builder("AB")
            .field("a", fields::u32(0))
            .field("b", fields::u64(1))
            .build()
            .unwrap()
    }

    #[test]
    fn test_align_up() {
        assert_eq!(align_up(0, 8), 0);
        assert_eq!(align_up(1, 8), 8);
        assert_eq!(align_up(4, 8), 8);
        assert_eq!(align_up(9, 4), 12);
        assert_eq!(align_up(7, 1), 7);
    }

    #[test]
    fn test_normal_layout_pads_to_alignment() {
        let layout = compute_layout(&a_u32_b_u64(), false, &config64()).unwrap();
        assert_eq!(layout.slots[0], FieldSlot { offset: 0, size: 4, align: 4 });
        assert_eq!(layout.slots[1], FieldSlot { offset: 8, size: 8, align: 8 });
        assert_eq!(layout.size, 16);
        assert_eq!(layout.alignment, 8);
    }

    #[test]
    fn test_overlay_layout_shares_offset_zero() {
        let layout = compute_layout(&a_u32_b_u64(), true, &config64()).unwrap();
        assert!(layout.slots.iter().all(|s| s.offset == 0));
        assert_eq!(layout.size, 8);
        assert_eq!(layout.alignment, 8);
    }

    #[test]
    fn test_overlay_size_rounds_to_alignment() {
        let schema = StructSchema::builder("U")
            .field("bytes", fields::fixed_array(0, ScalarType::U8, 13))
            .field("word", fields::u32(1))
            .build()
            .unwrap();
        let layout = compute_layout(&schema, true, &config64()).unwrap();
        assert_eq!(layout.size, 16);
        assert_eq!(layout.alignment, 4);
    }

    #[test]
    fn test_pack_limit_clamps_alignment() {
        let config = config64().with_pack(4);
        let layout = compute_layout(&a_u32_b_u64(), false, &config).unwrap();
        assert_eq!(layout.slots[1].offset, 4);
        assert_eq!(layout.slots[1].align, 4);
        assert_eq!(layout.size, 12);
        assert_eq!(layout.alignment, 4);

        let packed = compute_layout(&a_u32_b_u64(), false, &config64().with_pack(1)).unwrap();
        assert_eq!(packed.size, 12);
        assert_eq!(packed.alignment, 1);
    }

    #[test]
    fn test_pointer_kinds_use_pointer_width() {
        let schema = StructSchema::builder("P")
            .field("flag", fields::u8(0))
            .field("name", fields::string(1))
            .field("data", fields::dynamic_array(2, ScalarType::F32))
            .field("next", fields::self_pointer(3))
            .field("callback", fields::function_pointer(4))
            .field("opaque", fields::pointer(5))
            .build()
            .unwrap();

        let wide = compute_layout(&schema, false, &config64()).unwrap();
        let offsets: Vec<usize> = wide.slots.iter().map(|s| s.offset).collect();
        assert_eq!(offsets, [0, 8, 16, 24, 32, 40]);
        assert_eq!(wide.size, 48);

        let narrow =
            compute_layout(&schema, false, &MarshalConfig::default().with_pointer_width(4)).unwrap();
        let offsets: Vec<usize> = narrow.slots.iter().map(|s| s.offset).collect();
        assert_eq!(offsets, [0, 4, 8, 12, 16, 20]);
        assert_eq!(narrow.size, 24);
        assert_eq!(narrow.alignment, 4);
    }

    #[test]
    fn test_fixed_array_is_at_least_pointer_sized() {
        let schema = StructSchema::builder("A")
            .field("small", fields::fixed_array(0, ScalarType::U8, 3))
            .field("big", fields::fixed_array(1, ScalarType::F32, 4))
            .field("tail", fields::u8(2))
            .build()
            .unwrap();
        let layout = compute_layout(&schema, false, &config64()).unwrap();
        assert_eq!(layout.slots[0], FieldSlot { offset: 0, size: 8, align: 1 });
        assert_eq!(layout.slots[1], FieldSlot { offset: 8, size: 16, align: 4 });
        assert_eq!(layout.slots[2], FieldSlot { offset: 24, size: 1, align: 1 });
        assert_eq!(layout.size, 28);
    }

    #[test]
    fn test_enum_width() {
        let schema = StructSchema::builder("E")
            .field("small", fields::enumeration(0, EnumWidth::U8))
            .field("normal", fields::enumeration(1, EnumWidth::U32))
            .field("wide", fields::enumeration(2, EnumWidth::U64))
            .build()
            .unwrap();
        let layout = compute_layout(&schema, false, &config64()).unwrap();
        let slots: Vec<(usize, usize)> = layout.slots.iter().map(|s| (s.offset, s.size)).collect();
        assert_eq!(slots, [(0, 1), (4, 4), (8, 8)]);
        assert_eq!(layout.size, 16);
    }

    #[test]
    fn test_inline_struct_uses_child_layout() {
        let extent = StructSchema::builder("Extent2D")
            .field("width", fields::u32(0))
            .field("height", fields::u32(1))
            .build()
            .unwrap();
        let rect = StructSchema::builder("Rect2D")
            .field("tag", fields::u8(0))
            .field("extent", fields::inline_struct(1, &extent))
            .field("scale", fields::f64(2))
            .build()
            .unwrap();
        let layout = compute_layout(&rect, false, &config64()).unwrap();
        assert_eq!(layout.slots[1], FieldSlot { offset: 4, size: 8, align: 4 });
        assert_eq!(layout.slots[2].offset, 16);
        assert_eq!(layout.size, 24);
        assert_eq!(layout.alignment, 8);
    }

    #[test]
    fn test_inline_union_child() {
        let color = StructSchema::builder("ClearColorValue")
            .field("float32", fields::fixed_array(0, ScalarType::F32, 4))
            .field("int32", fields::fixed_array(1, ScalarType::I32, 4))
            .field("uint32", fields::fixed_array(2, ScalarType::U32, 4))
            .build()
            .unwrap();
        let value = StructSchema::builder("ClearValue")
            .field("color", fields::inline_union(0, &color))
            .field("depth", fields::f32(1))
            .build()
            .unwrap();
        let layout = compute_layout(&value, false, &config64()).unwrap();
        assert_eq!(layout.slots[0].size, 16);
        assert_eq!(layout.slots[1].offset, 16);
        assert_eq!(layout.size, 20);
    }

    #[test]
    fn test_unresolved_inline_reference_fails() {
        let cell = SchemaCell::new("Later");
        let schema = StructSchema::builder("S")
            .field("later", fields::inline_struct(0, &cell))
            .build()
            .unwrap();
        let err = compute_layout(&schema, false, &config64()).unwrap_err();
        assert!(matches!(err, StructError::UnresolvedSchema(_)));
    }

    #[test]
    fn test_inline_cycle_through_cell_is_bounded() {
        let cell = SchemaCell::new("Loop");
        let schema = StructSchema::builder("Loop")
            .field("inner", fields::inline_struct(0, &cell))
            .build()
            .unwrap();
        cell.resolve(&schema).unwrap();
        let err = compute_layout(&schema, false, &config64()).unwrap_err();
        assert!(matches!(err, StructError::InlineDepthExceeded(_)));
    }

    #[test]
    fn test_oversized_fixed_array_fails() {
        let schema = StructSchema::builder("Huge")
            .field("data", fields::fixed_array(0, ScalarType::U64, usize::MAX / 2))
            .build()
            .unwrap();
        let err = compute_layout(&schema, false, &config64()).unwrap_err();
        assert!(matches!(err, StructError::SizeOverflow(name) if name == "data"));

        let schema = StructSchema::builder("Twice")
            .field("a", fields::fixed_array(0, ScalarType::U8, usize::MAX - 4))
            .field("b", fields::u64(1))
            .build()
            .unwrap();
        let err = compute_layout(&schema, false, &config64()).unwrap_err();
        assert!(matches!(err, StructError::SizeOverflow(name) if name == "b"));
    }

    #[test]
    fn test_consecutive_fields_never_overlap() {
        let schema = StructSchema::builder("Mixed")
            .field("a", fields::u8(0))
            .field("b", fields::f64(1))
            .field("c", fields::u16(2))
            .field("d", fields::fixed_array(3, ScalarType::I16, 5))
            .field("e", fields::bool(4))
            .field("f", fields::u32(5))
            .build()
            .unwrap();
        for pack in [None, Some(1), Some(2), Some(4), Some(8)] {
            let config = MarshalConfig { pack, ..config64() };
            let layout = compute_layout(&schema, false, &config).unwrap();
            for pair in layout.slots.windows(2) {
                assert!(pair[1].offset >= pair[0].end());
                assert_eq!(pair[1].offset % pair[1].align, 0);
            }
            assert_eq!(layout.size % layout.alignment, 0);
            assert_eq!(layout, compute_layout(&schema, false, &config).unwrap());
        }
    }
}
