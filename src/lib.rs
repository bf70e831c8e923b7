//! Schema-driven C-ABI struct layout and marshalling.
//!
//! A [`StructSchema`] declares named, ordered fields. A [`StructInstance`]
//! lays them out the way a C compiler would (or as a union), keeps a value
//! store next to a single byte buffer, and synchronizes the two at explicit
//! commit points: [`flush`](StructInstance::flush) before handing the buffer to
//! native code, [`read`](StructInstance::read) after native code wrote it.
//!
//! Foreign memory is only ever touched through a [`NativeMemory`].

pub mod config;
pub mod deserialization;
pub mod error;
pub mod fields;
pub mod layout;
pub mod memory;
pub mod native_struct;
pub mod registry;
pub mod retention;
pub mod schema;
pub mod serialization;
pub mod types;
pub mod value;

pub use config::MarshalConfig;
pub use error::{MemoryError, StructError};
pub use fields::{FieldKind, FieldSpec, StructTarget};
pub use layout::{FieldSlot, StructLayout, compute_layout};
pub use memory::{ArenaMemory, NativeMemory, ProcessMemory};
pub use native_struct::StructInstance;
pub use registry::{FieldDef, SchemaDef, SchemaRegistry};
pub use retention::{PinnedBuffers, Retention};
pub use schema::{SchemaBuilder, SchemaCell, SchemaField, SchemaRef, StructSchema};
pub use types::{EnumWidth, ScalarType};
pub use value::{ArrayValue, FieldValue, Number};
