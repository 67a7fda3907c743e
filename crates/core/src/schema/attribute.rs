//! Attribute definitions: the closed tagged union every content-type and
//! component attribute resolves to at schema-load time.
//!
//! Definitions arrive as JSON (`{ "type": "relation", "relation": "oneToMany",
//! ... }`) and are parsed once into [`AttributeDef`]; nothing downstream
//! dispatches on type strings.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{CoreError, CoreResult};

/// Scalar attribute kinds. `Password` is implicitly private.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScalarKind {
    String,
    Text,
    RichText,
    Integer,
    Float,
    Boolean,
    Date,
    DateTime,
    Email,
    Uid,
    Enumeration,
    Json,
    Password,
}

/// Relation cardinality and directionality.
///
/// `OneWay`/`ManyWay` have no inverse attribute on the target; `ManyWay` is
/// the polymorphic-capable many-target form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RelationKind {
    OneToOne,
    OneToMany,
    ManyToOne,
    ManyToMany,
    OneWay,
    ManyWay,
}

impl RelationKind {
    /// Whether the owning side holds a list of targets.
    pub fn is_to_many(self) -> bool {
        matches!(
            self,
            RelationKind::OneToMany | RelationKind::ManyToMany | RelationKind::ManyWay
        )
    }
}

/// A fully resolved attribute definition.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeDef {
    Scalar {
        kind: ScalarKind,
        required: bool,
        min_length: Option<u64>,
        max_length: Option<u64>,
        /// Allowed values when `kind` is `Enumeration`.
        enum_values: Vec<String>,
        private: bool,
    },
    /// Media resolves against the built-in file type (`plugin::upload.file`).
    Media { multiple: bool, private: bool },
    Component {
        component: String,
        repeatable: bool,
        min: Option<u64>,
        max: Option<u64>,
        private: bool,
    },
    /// Ordered list of allowed component uids; stored items carry their own
    /// `__component` tag.
    DynamicZone { components: Vec<String> },
    Relation {
        kind: RelationKind,
        target: String,
        inversed_by: Option<String>,
        private: bool,
    },
}

impl AttributeDef {
    /// Whether a populate plan node on this attribute is meaningful.
    pub fn is_populatable(&self) -> bool {
        matches!(
            self,
            AttributeDef::Media { .. }
                | AttributeDef::Component { .. }
                | AttributeDef::DynamicZone { .. }
                | AttributeDef::Relation { .. }
        )
    }

    /// Whether the sanitizer must strip this attribute from output.
    pub fn is_private(&self) -> bool {
        match self {
            AttributeDef::Scalar { kind, private, .. } => {
                *private || *kind == ScalarKind::Password
            }
            AttributeDef::Media { private, .. } => *private,
            AttributeDef::Component { private, .. } => *private,
            AttributeDef::DynamicZone { .. } => false,
            AttributeDef::Relation { private, .. } => *private,
        }
    }

    pub fn required(&self) -> bool {
        matches!(self, AttributeDef::Scalar { required: true, .. })
    }

    /// Parse one raw attribute definition. `path` is `"{uid}.{attribute}"`
    /// and only used for error reporting.
    pub fn parse(path: &str, raw: &Value) -> CoreResult<Self> {
        let obj = raw
            .as_object()
            .ok_or_else(|| CoreError::Config(format!("{path}: attribute must be an object")))?;
        let ty = obj
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| CoreError::Config(format!("{path}: missing attribute type")))?;

        let private = obj.get("private").and_then(Value::as_bool).unwrap_or(false);

        let def = match ty {
            "media" => AttributeDef::Media {
                multiple: obj.get("multiple").and_then(Value::as_bool).unwrap_or(false),
                private,
            },
            "component" => AttributeDef::Component {
                component: required_str(obj, "component", path)?,
                repeatable: obj
                    .get("repeatable")
                    .and_then(Value::as_bool)
                    .unwrap_or(false),
                min: obj.get("min").and_then(Value::as_u64),
                max: obj.get("max").and_then(Value::as_u64),
                private,
            },
            "dynamiczone" => {
                let components = obj
                    .get("components")
                    .and_then(Value::as_array)
                    .ok_or_else(|| {
                        CoreError::Config(format!("{path}: dynamiczone requires a component list"))
                    })?
                    .iter()
                    .map(|c| {
                        c.as_str().map(str::to_string).ok_or_else(|| {
                            CoreError::Config(format!("{path}: component uid must be a string"))
                        })
                    })
                    .collect::<CoreResult<Vec<_>>>()?;
                AttributeDef::DynamicZone { components }
            }
            "relation" => {
                let kind_str = required_str(obj, "relation", path)?;
                let kind = serde_json::from_value(Value::String(kind_str.clone()))
                    .map_err(|_| {
                        CoreError::Config(format!("{path}: unknown relation kind '{kind_str}'"))
                    })?;
                AttributeDef::Relation {
                    kind,
                    target: required_str(obj, "target", path)?,
                    inversed_by: obj
                        .get("inversedBy")
                        .and_then(Value::as_str)
                        .map(str::to_string),
                    private,
                }
            }
            scalar => {
                let kind = parse_scalar_kind(scalar)
                    .ok_or_else(|| CoreError::Config(format!("{path}: unknown type '{scalar}'")))?;
                AttributeDef::Scalar {
                    kind,
                    required: obj.get("required").and_then(Value::as_bool).unwrap_or(false),
                    min_length: obj.get("minLength").and_then(Value::as_u64),
                    max_length: obj.get("maxLength").and_then(Value::as_u64),
                    enum_values: obj
                        .get("enum")
                        .and_then(Value::as_array)
                        .map(|vals| {
                            vals.iter()
                                .filter_map(Value::as_str)
                                .map(str::to_string)
                                .collect()
                        })
                        .unwrap_or_default(),
                    private,
                }
            }
        };
        Ok(def)
    }
}

fn parse_scalar_kind(ty: &str) -> Option<ScalarKind> {
    let kind = match ty {
        "string" => ScalarKind::String,
        "text" => ScalarKind::Text,
        "richtext" => ScalarKind::RichText,
        "integer" => ScalarKind::Integer,
        "float" | "decimal" => ScalarKind::Float,
        "boolean" => ScalarKind::Boolean,
        "date" => ScalarKind::Date,
        "datetime" => ScalarKind::DateTime,
        "email" => ScalarKind::Email,
        "uid" => ScalarKind::Uid,
        "enumeration" => ScalarKind::Enumeration,
        "json" => ScalarKind::Json,
        "password" => ScalarKind::Password,
        _ => return None,
    };
    Some(kind)
}

fn required_str(obj: &serde_json::Map<String, Value>, key: &str, path: &str) -> CoreResult<String> {
    obj.get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| CoreError::Config(format!("{path}: missing '{key}'")))
}
