//! Named schemas declared as data.
//!
//! A [`SchemaRegistry`] builds [`StructSchema`]s from [`SchemaDef`]s (usually
//! loaded from JSON) and wires up references between them. A field may name a
//! schema that is not defined yet; it gets a deferred reference that resolves
//! when that schema is registered.

use crate::error::StructError;
use crate::fields::{self, FieldKind, FieldSpec, StructTarget};
use crate::schema::{SchemaCell, SchemaRef, StructSchema};
use crate::types::{DEFAULT_ENUM_WIDTH, EnumWidth, ScalarType};
use log::debug;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::sync::Arc;

// ─── Definitions ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaDef {
    pub name: SmolStr,
    pub fields: Vec<FieldDef>,
}

/// One field as data.
///
/// ```json
/// { "name": "next", "order": 2, "type": "struct", "schema": "self" }
/// { "name": "data", "order": 3, "type": "array", "to": "f32", "length": 4 }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldDef {
    pub name: SmolStr,
    #[serde(default)]
    pub order: Option<u32>,
    /// Scalar label, or one of `enum`, `struct`, `fn`, `array`.
    #[serde(rename = "type")]
    pub ty: SmolStr,
    /// Array element label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<SmolStr>,
    /// Fixed array length. Absent or zero means a dynamic array.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<usize>,
    /// Target schema name, or `"self"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<SmolStr>,
    #[serde(default)]
    pub inline: bool,
    #[serde(default)]
    pub overlay: bool,
    /// Enum width label (`u8`, `u16`, `u32`, `u64`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bytes: Option<SmolStr>,
}

// ─── SchemaRegistry ─────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct SchemaRegistry {
    schemas: FxHashMap<SmolStr, Arc<StructSchema>>,
    /// Deferred references handed out before their schema was registered.
    pending: FxHashMap<SmolStr, Arc<SchemaCell>>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a built schema under its own name and resolve any deferred
    /// references to it.
    pub fn register(&mut self, schema: Arc<StructSchema>) -> Result<Arc<StructSchema>, StructError> {
        let name = schema.name().clone();
        if self.schemas.contains_key(&name) {
            return Err(StructError::Definition(format!("schema `{name}` is already registered")));
        }
        if let Some(cell) = self.pending.remove(&name) {
            cell.resolve(&schema)?;
            debug!("registry: resolved deferred references to `{name}`");
        }
        debug!("registry: registered `{}` ({} fields)", name, schema.len());
        self.schemas.insert(name, schema.clone());
        Ok(schema)
    }

    /// Reference to the schema called `name`: direct when it is registered,
    /// otherwise a deferred cell shared by every reference to that name.
    pub fn reference(&mut self, name: &str) -> SchemaRef {
        match self.schemas.get(name) {
            Some(schema) => SchemaRef::Schema(schema.clone()),
            None => SchemaRef::Deferred(
                self.pending
                    .entry(SmolStr::new(name))
                    .or_insert_with(|| SchemaCell::new(name))
                    .clone(),
            ),
        }
    }

    /// Build and register a schema from its definition.
    pub fn define(&mut self, def: &SchemaDef) -> Result<Arc<StructSchema>, StructError> {
        let mut specs = Vec::with_capacity(def.fields.len());
        for field in &def.fields {
            let spec = self.field_spec(&def.name, field)?;
            specs.push((field.name.clone(), spec));
        }
        let schema = StructSchema::new(def.name.clone(), specs)?;
        self.register(schema)
    }

    /// Define every schema of a JSON array of [`SchemaDef`]s, in order.
    pub fn load_json(&mut self, json: &str) -> Result<Vec<Arc<StructSchema>>, StructError> {
        let defs: Vec<SchemaDef> = serde_json::from_str(json)?;
        defs.iter().map(|def| self.define(def)).collect()
    }

    #[inline]
    pub fn get(&self, name: &str) -> Option<&Arc<StructSchema>> {
        self.schemas.get(name)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }

    /// Names referenced but never registered, sorted.
    pub fn unresolved(&self) -> Vec<SmolStr> {
        let mut names: Vec<SmolStr> = self.pending.keys().cloned().collect();
        names.sort_unstable();
        names
    }

    // ─── FieldDef → FieldSpec ───────────────────────────────────────────────

    fn field_spec(&mut self, schema_name: &str, def: &FieldDef) -> Result<FieldSpec, StructError> {
        let kind = match def.ty.as_str() {
            "enum" => FieldKind::Enum {
                width: match &def.bytes {
                    Some(label) => enum_width(&def.name, label)?,
                    None => DEFAULT_ENUM_WIDTH,
                },
            },
            "fn" => FieldKind::FunctionPointer,
            "array" => {
                let label = def
                    .to
                    .as_deref()
                    .ok_or_else(|| definition(schema_name, &def.name, "array field needs `to`"))?;
                let element = ScalarType::from_label(label)
                    .ok_or_else(|| definition(schema_name, &def.name, &format!("unknown element type `{label}`")))?;
                match def.length {
                    Some(length) if length >= 1 => FieldKind::FixedArray { element, length },
                    _ => FieldKind::DynamicArray { element },
                }
            }
            "struct" => {
                let name = def
                    .schema
                    .as_deref()
                    .ok_or_else(|| definition(schema_name, &def.name, "struct field needs `schema`"))?;
                let target = StructTarget {
                    schema: if name == "self" { SchemaRef::SelfRef } else { self.reference(name) },
                    overlay: def.overlay,
                };
                if def.inline {
                    FieldKind::InlineStruct(target)
                } else {
                    FieldKind::StructPointer(target)
                }
            }
            label => match ScalarType::from_label(label) {
                Some(ty) => FieldKind::Scalar(ty),
                None => return Err(definition(schema_name, &def.name, &format!("unknown type `{label}`"))),
            },
        };

        let spec = FieldSpec::new(kind);
        Ok(match def.order {
            Some(order) => spec.with_order(order),
            None => spec,
        })
    }
}

fn enum_width(field: &str, label: &str) -> Result<EnumWidth, StructError> {
    match ScalarType::from_label(label) {
        Some(ty @ (ScalarType::U8 | ScalarType::U16 | ScalarType::U32 | ScalarType::U64)) => {
            EnumWidth::from_bytes(ty.width(8))
                .ok_or_else(|| StructError::Definition(format!("invalid enum width `{label}` on `{field}`")))
        }
        _ => Err(StructError::Definition(format!("invalid enum width `{label}` on `{field}`"))),
    }
}

fn definition(schema: &str, field: &str, message: &str) -> StructError {
    StructError::Definition(format!("{schema}.{field}: {message}"))
}

/// Struct-pointer spec for a registered or pending schema.
pub fn pointer_to(registry: &mut SchemaRegistry, order: u32, name: &str) -> FieldSpec {
    fields::struct_pointer(order, registry.reference(name))
}
