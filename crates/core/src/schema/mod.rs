//! Runtime content schema: attribute definitions, compiled snapshots, the
//! copy-on-write registry, and the definition-file loader.

pub mod attribute;
pub mod loader;
pub mod registry;

pub use attribute::{AttributeDef, RelationKind, ScalarKind};
pub use registry::{
    ComponentSchema, ContentTypeKind, ContentTypeSchema, SchemaRegistry, SchemaSnapshot,
    FILE_UID, RESTRICTED_FIELDS,
};
