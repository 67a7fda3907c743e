//! Compiled schema snapshots and the process-wide registry.
//!
//! Content-type and component definitions are compiled once into a
//! [`SchemaSnapshot`]: relation/component targets are resolved eagerly (a
//! dangling target is a fatal configuration error, not a request-time
//! surprise) and each type's populatable attribute names are pre-computed so
//! the populate path never re-scans attribute kinds.
//!
//! The registry itself is a copy-on-write version pointer: schema changes
//! install a whole new snapshot, and in-flight requests keep reading the
//! snapshot they started with.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use indexmap::IndexMap;

use super::attribute::AttributeDef;
use crate::error::{CoreError, CoreResult};

/// Uid of the built-in file type that `media` attributes resolve against.
pub const FILE_UID: &str = "plugin::upload.file";

/// Audit fields stripped from all sanitized output.
pub const RESTRICTED_FIELDS: &[&str] = &["created_by", "updated_by"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentTypeKind {
    CollectionType,
    SingleType,
}

/// A content type: identity, draft/publish setting, and attributes.
/// Immutable once compiled into a snapshot.
#[derive(Debug, Clone)]
pub struct ContentTypeSchema {
    pub uid: String,
    pub kind: ContentTypeKind,
    pub draft_and_publish: bool,
    pub attributes: IndexMap<String, AttributeDef>,
}

/// A component: a reusable attribute bag embedded inside content types,
/// other components, or dynamic zones. Never persisted as a row of its own.
#[derive(Debug, Clone)]
pub struct ComponentSchema {
    pub uid: String,
    pub attributes: IndexMap<String, AttributeDef>,
}

/// An immutable, fully cross-checked view of the schema.
#[derive(Debug)]
pub struct SchemaSnapshot {
    content_types: IndexMap<String, ContentTypeSchema>,
    components: IndexMap<String, ComponentSchema>,
    /// Per uid (content type or component): attribute names a populate plan
    /// may legally address.
    populatable: HashMap<String, Vec<String>>,
}

impl SchemaSnapshot {
    /// Compile raw schemas into a snapshot, resolving every relation,
    /// component, and dynamic-zone target. The built-in file type is always
    /// present.
    pub fn compile(
        mut content_types: Vec<ContentTypeSchema>,
        components: Vec<ComponentSchema>,
    ) -> CoreResult<Self> {
        if !content_types.iter().any(|ct| ct.uid == FILE_UID) {
            content_types.push(builtin_file_type());
        }

        let content_types: IndexMap<_, _> = content_types
            .into_iter()
            .map(|ct| (ct.uid.clone(), ct))
            .collect();
        let components: IndexMap<_, _> = components
            .into_iter()
            .map(|c| (c.uid.clone(), c))
            .collect();

        let mut populatable = HashMap::new();
        for (uid, ct) in &content_types {
            check_targets(uid, &ct.attributes, &content_types, &components)?;
            populatable.insert(uid.clone(), populatable_names(&ct.attributes));
        }
        for (uid, comp) in &components {
            check_targets(uid, &comp.attributes, &content_types, &components)?;
            populatable.insert(uid.clone(), populatable_names(&comp.attributes));
        }

        Ok(Self {
            content_types,
            components,
            populatable,
        })
    }

    pub fn get_content_type(&self, uid: &str) -> Option<&ContentTypeSchema> {
        self.content_types.get(uid)
    }

    /// Look up a content type; absence is a configuration error (the uid came
    /// from a compiled schema or a route, never from entity data).
    pub fn content_type(&self, uid: &str) -> CoreResult<&ContentTypeSchema> {
        self.content_types
            .get(uid)
            .ok_or_else(|| CoreError::Config(format!("unknown content type '{uid}'")))
    }

    pub fn component(&self, uid: &str) -> CoreResult<&ComponentSchema> {
        self.components
            .get(uid)
            .ok_or_else(|| CoreError::Config(format!("unknown component '{uid}'")))
    }

    /// Attribute table of either a content type or a component.
    pub fn attributes_of(&self, uid: &str) -> Option<&IndexMap<String, AttributeDef>> {
        self.content_types
            .get(uid)
            .map(|ct| &ct.attributes)
            .or_else(|| self.components.get(uid).map(|c| &c.attributes))
    }

    pub fn attribute(&self, uid: &str, name: &str) -> Option<&AttributeDef> {
        self.attributes_of(uid).and_then(|attrs| attrs.get(name))
    }

    /// Pre-computed populatable attribute names for a uid (empty for unknown
    /// uids; callers that need a hard failure use [`content_type`]).
    pub fn populatable_attributes(&self, uid: &str) -> &[String] {
        self.populatable.get(uid).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Whether entries of `uid` carry the draft/published discriminator.
    pub fn draft_and_publish(&self, uid: &str) -> bool {
        self.content_types
            .get(uid)
            .map(|ct| ct.draft_and_publish)
            .unwrap_or(false)
    }

    pub fn content_type_uids(&self) -> impl Iterator<Item = &str> {
        self.content_types.keys().map(String::as_str)
    }
}

fn populatable_names(attributes: &IndexMap<String, AttributeDef>) -> Vec<String> {
    attributes
        .iter()
        .filter(|(_, def)| def.is_populatable())
        .map(|(name, _)| name.clone())
        .collect()
}

fn check_targets(
    uid: &str,
    attributes: &IndexMap<String, AttributeDef>,
    content_types: &IndexMap<String, ContentTypeSchema>,
    components: &IndexMap<String, ComponentSchema>,
) -> CoreResult<()> {
    for (name, def) in attributes {
        match def {
            AttributeDef::Relation { target, .. } => {
                if !content_types.contains_key(target) {
                    return Err(CoreError::Config(format!(
                        "{uid}.{name}: relation target '{target}' does not exist"
                    )));
                }
            }
            AttributeDef::Component { component, .. } => {
                if !components.contains_key(component) {
                    return Err(CoreError::Config(format!(
                        "{uid}.{name}: component '{component}' does not exist"
                    )));
                }
            }
            AttributeDef::DynamicZone { components: allowed } => {
                for comp in allowed {
                    if !components.contains_key(comp) {
                        return Err(CoreError::Config(format!(
                            "{uid}.{name}: dynamic zone component '{comp}' does not exist"
                        )));
                    }
                }
            }
            _ => {}
        }
    }
    Ok(())
}

/// Schema of the built-in file type. `folder_path` mirrors the containing
/// folder's materialized path and is never exposed to clients.
fn builtin_file_type() -> ContentTypeSchema {
    let raw = serde_json::json!({
        "name": {"type": "string", "required": true},
        "alternative_text": {"type": "string"},
        "url": {"type": "string", "required": true},
        "mime": {"type": "string"},
        "size": {"type": "float"},
        "folder_path": {"type": "string", "private": true},
    });
    let attributes = raw
        .as_object()
        .expect("builtin file schema is an object")
        .iter()
        .map(|(name, def)| {
            let parsed = AttributeDef::parse(&format!("{FILE_UID}.{name}"), def)
                .expect("builtin file schema is valid");
            (name.clone(), parsed)
        })
        .collect();
    ContentTypeSchema {
        uid: FILE_UID.to_string(),
        kind: ContentTypeKind::CollectionType,
        draft_and_publish: false,
        attributes,
    }
}

/// Process-wide schema registry: a swap-on-reload snapshot pointer.
#[derive(Debug)]
pub struct SchemaRegistry {
    current: RwLock<Arc<SchemaSnapshot>>,
}

impl SchemaRegistry {
    pub fn new(snapshot: SchemaSnapshot) -> Self {
        Self {
            current: RwLock::new(Arc::new(snapshot)),
        }
    }

    /// The snapshot to use for the remainder of one request.
    pub fn snapshot(&self) -> Arc<SchemaSnapshot> {
        self.current
            .read()
            .expect("schema registry lock poisoned")
            .clone()
    }

    /// Atomically replace the snapshot. Requests already holding the old
    /// `Arc` are unaffected.
    pub fn install(&self, snapshot: SchemaSnapshot) {
        let mut guard = self
            .current
            .write()
            .expect("schema registry lock poisoned");
        *guard = Arc::new(snapshot);
    }
}
