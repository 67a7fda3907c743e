//! Population: plan types, the spec resolver, the entity-query seam, and
//! the relation graph walker.

pub mod plan;
pub mod resolver;
pub mod source;
pub mod walker;

pub use plan::{FragmentNode, PageRequest, PlanNode, PopulatePlan, PopulateSpec, SortKey};
pub use resolver::resolve;
pub use source::{
    EntityQuery, EntityRecord, Page, PageMeta, QueryParams, RelatedQuery, RelationMode,
};
pub use walker::{inline_ids, GraphWalker, WalkerConfig, COMPONENT_TAG};
