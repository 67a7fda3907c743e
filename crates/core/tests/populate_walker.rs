//! End-to-end population over an in-memory entity source.

use std::cmp::Ordering;
use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};

use canopy_core::error::{CoreError, CoreResult};
use canopy_core::populate::{
    resolve, EntityQuery, EntityRecord, GraphWalker, Page, PageMeta, PopulateSpec, QueryParams,
    RelatedQuery, RelationMode, WalkerConfig,
};
use canopy_core::publication::PublicationState;
use canopy_core::schema::loader::snapshot_from_values;
use canopy_core::schema::SchemaSnapshot;
use canopy_core::types::DbId;

// ---------------------------------------------------------------------------
// In-memory entity source

#[derive(Default)]
struct MemorySource {
    entities: HashMap<String, Vec<EntityRecord>>,
    /// (source uid, source id, attribute) -> ordered target ids.
    links: HashMap<(String, DbId, String), Vec<DbId>>,
}

impl MemorySource {
    fn insert(&mut self, uid: &str, record: EntityRecord) {
        self.entities.entry(uid.to_string()).or_default().push(record);
    }

    fn link(&mut self, source_uid: &str, source_id: DbId, attribute: &str, targets: &[DbId]) {
        self.links.insert(
            (source_uid.to_string(), source_id, attribute.to_string()),
            targets.to_vec(),
        );
    }

    fn of(&self, uid: &str) -> &[EntityRecord] {
        self.entities.get(uid).map(Vec::as_slice).unwrap_or(&[])
    }

    fn linked_ids(&self, source_uid: &str, source_id: DbId, attribute: &str) -> Vec<DbId> {
        self.links
            .get(&(source_uid.to_string(), source_id, attribute.to_string()))
            .cloned()
            .unwrap_or_default()
    }
}

fn admit(record: &EntityRecord, params: &QueryParams) -> bool {
    if params.published_only && record.published_at.is_none() {
        return false;
    }
    match &params.filters {
        Some(filter) => filter.matches(&Value::Object(record.to_output())),
        None => true,
    }
}

fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ => Ordering::Equal,
    }
}

fn finish(mut records: Vec<EntityRecord>, params: &QueryParams) -> Page<EntityRecord> {
    if !params.sort.is_empty() {
        records.sort_by(|a, b| {
            for key in &params.sort {
                let left = a.document.get(&key.field).cloned().unwrap_or(Value::Null);
                let right = b.document.get(&key.field).cloned().unwrap_or(Value::Null);
                let ord = compare_values(&left, &right);
                let ord = if key.descending { ord.reverse() } else { ord };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            Ordering::Equal
        });
    }
    let total = records.len() as u64;
    let page = params.page();
    let items = records
        .into_iter()
        .skip(page.offset() as usize)
        .take(page.page_size as usize)
        .collect();
    Page {
        items,
        meta: PageMeta::compute(page, total),
    }
}

#[async_trait]
impl EntityQuery for MemorySource {
    async fn find_one(&self, uid: &str, id: DbId) -> CoreResult<Option<EntityRecord>> {
        Ok(self.of(uid).iter().find(|r| r.id == id).cloned())
    }

    async fn find_many(&self, uid: &str, params: &QueryParams) -> CoreResult<Page<EntityRecord>> {
        let records = self
            .of(uid)
            .iter()
            .filter(|r| admit(r, params))
            .cloned()
            .collect();
        Ok(finish(records, params))
    }

    async fn find_related(&self, query: &RelatedQuery<'_>) -> CoreResult<Page<EntityRecord>> {
        let linked = match query.source_id {
            Some(id) => self.linked_ids(query.source_uid, id, query.attribute),
            None => Vec::new(),
        };
        let records: Vec<EntityRecord> = match query.mode {
            RelationMode::Current => linked
                .iter()
                .filter_map(|id| self.of(query.target_uid).iter().find(|r| r.id == *id))
                .filter(|r| admit(r, &query.params))
                .cloned()
                .collect(),
            RelationMode::Available => self
                .of(query.target_uid)
                .iter()
                .filter(|r| !linked.contains(&r.id))
                .filter(|r| !query.ids_to_omit.contains(&r.id))
                .filter(|r| admit(r, &query.params))
                .cloned()
                .collect(),
        };
        Ok(finish(records, &query.params))
    }

    async fn find_by_ids(
        &self,
        uid: &str,
        ids: &[DbId],
        params: &QueryParams,
    ) -> CoreResult<Vec<EntityRecord>> {
        let records: Vec<EntityRecord> = ids
            .iter()
            .filter_map(|id| self.of(uid).iter().find(|r| r.id == *id))
            .filter(|r| admit(r, params))
            .cloned()
            .collect();
        Ok(finish(records, params).items)
    }
}

// ---------------------------------------------------------------------------
// Fixtures

fn snapshot() -> SchemaSnapshot {
    snapshot_from_values(&[
        json!({
            "uid": "api::article.article",
            "draftAndPublish": true,
            "attributes": {
                "title": {"type": "string"},
                "author": {"type": "relation", "relation": "manyToOne", "target": "api::author.author"},
                "tags": {"type": "relation", "relation": "manyToMany", "target": "api::tag.tag"},
                "blocks": {"type": "dynamiczone", "components": ["shared.quote", "shared.card"]},
                "hero": {"type": "component", "component": "shared.card"},
            }
        }),
        json!({
            "uid": "api::author.author",
            "attributes": {"name": {"type": "string"}}
        }),
        json!({
            "uid": "api::tag.tag",
            "draftAndPublish": true,
            "attributes": {"label": {"type": "string"}}
        }),
        json!({
            "uid": "shared.quote",
            "kind": "component",
            "attributes": {
                "body": {"type": "string"},
                "source": {"type": "relation", "relation": "oneToOne", "target": "api::author.author"},
            }
        }),
        json!({
            "uid": "shared.card",
            "kind": "component",
            "attributes": {"caption": {"type": "string"}}
        }),
    ])
    .unwrap()
}

fn record(id: DbId, document: Value, published: bool) -> EntityRecord {
    let now = Utc::now();
    EntityRecord {
        id,
        document: document.as_object().unwrap().clone(),
        published_at: published.then_some(now),
        created_at: now,
        updated_at: now,
    }
}

fn source() -> MemorySource {
    let mut source = MemorySource::default();
    source.insert("api::author.author", record(1, json!({"name": "ada"}), true));
    source.insert("api::author.author", record(2, json!({"name": "brie"}), true));
    source.insert("api::tag.tag", record(10, json!({"label": "rust"}), true));
    source.insert("api::tag.tag", record(11, json!({"label": "draft-only"}), false));
    source.insert("api::tag.tag", record(12, json!({"label": "web"}), true));
    source.insert(
        "api::article.article",
        record(
            100,
            json!({
                "title": "hello",
                "blocks": [
                    {"__component": "shared.quote", "body": "first", "source": 1},
                    {"__component": "shared.card", "caption": "pic"},
                    {"__component": "shared.quote", "body": "second", "source": 2},
                ],
                "hero": {"caption": "cover"},
            }),
            true,
        ),
    );
    source.link("api::article.article", 100, "author", &[2]);
    source.link("api::article.article", 100, "tags", &[10, 11, 12]);
    source
}

async fn populate(
    snapshot: &SchemaSnapshot,
    source: &MemorySource,
    state: PublicationState,
    raw_populate: Value,
) -> CoreResult<Value> {
    let spec = resolve(snapshot, "api::article.article", &raw_populate)?;
    let record = source
        .find_one("api::article.article", 100)
        .await?
        .unwrap();
    let walker = GraphWalker::new(snapshot, source, state, WalkerConfig::default());
    walker
        .populate_record("api::article.article", &record, spec.as_ref())
        .await
}

// ---------------------------------------------------------------------------
// Tests

#[tokio::test]
async fn no_populate_keeps_relations_out_of_the_output() {
    let snap = snapshot();
    let out = populate(&snap, &source(), PublicationState::Preview, json!(null))
        .await
        .unwrap();
    assert_eq!(out["title"], "hello");
    assert!(out.get("author").is_none());
    assert!(out.get("tags").is_none());
    assert!(out.get("blocks").is_none());
    assert!(out.get("published_at").is_some());
}

#[tokio::test]
async fn wildcard_matches_the_explicit_one_level_plan() {
    let snap = snapshot();
    let src = source();
    let starred = populate(&snap, &src, PublicationState::Preview, json!("*"))
        .await
        .unwrap();
    let listed = populate(
        &snap,
        &src,
        PublicationState::Preview,
        json!(["author", "tags", "blocks", "hero"]),
    )
    .await
    .unwrap();
    assert_eq!(starred, listed);
    assert_eq!(starred["author"]["name"], "brie");
    assert_eq!(starred["hero"]["caption"], "cover");
    // One level: the quote's own relation stays unpopulated.
    assert!(starred["blocks"][0].get("source").is_none());
}

#[tokio::test]
async fn live_state_drops_unpublished_targets_at_every_hop() {
    let snap = snapshot();
    let src = source();
    let live = populate(&snap, &src, PublicationState::Live, json!(["tags"]))
        .await
        .unwrap();
    let labels: Vec<&str> = live["tags"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["label"].as_str().unwrap())
        .collect();
    assert_eq!(labels, vec!["rust", "web"]);

    let preview = populate(&snap, &src, PublicationState::Preview, json!(["tags"]))
        .await
        .unwrap();
    assert_eq!(preview["tags"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn to_one_relation_filtered_away_becomes_null() {
    let snap = snapshot();
    let out = populate(
        &snap,
        &source(),
        PublicationState::Preview,
        json!({"author": {"filters": {"name": {"$eq": "nobody"}}}}),
    )
    .await
    .unwrap();
    assert!(out["author"].is_null());
}

#[tokio::test]
async fn branch_filters_do_not_leak_to_siblings() {
    let snap = snapshot();
    let out = populate(
        &snap,
        &source(),
        PublicationState::Preview,
        json!({
            "author": {"filters": {"name": {"$eq": "nobody"}}},
            "tags": true,
        }),
    )
    .await
    .unwrap();
    assert!(out["author"].is_null());
    assert_eq!(out["tags"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn dynamic_zone_fragments_trim_without_reordering() {
    let snap = snapshot();
    let out = populate(
        &snap,
        &source(),
        PublicationState::Preview,
        json!({
            "blocks": {
                "on": {
                    "shared.quote": {
                        "filters": {"body": {"$ne": "first"}},
                        "populate": {"source": true},
                    },
                }
            }
        }),
    )
    .await
    .unwrap();
    let blocks = out["blocks"].as_array().unwrap();
    // Card excluded (absent from the selector), first quote filtered out.
    assert_eq!(blocks.len(), 1);
    assert_eq!(blocks[0]["__component"], "shared.quote");
    assert_eq!(blocks[0]["body"], "second");
    // The fragment's populate reached the inline relation.
    assert_eq!(blocks[0]["source"]["name"], "brie");
}

#[tokio::test]
async fn dynamic_zone_without_selector_keeps_stored_order() {
    let snap = snapshot();
    let out = populate(&snap, &source(), PublicationState::Preview, json!(["blocks"]))
        .await
        .unwrap();
    let tags: Vec<&str> = out["blocks"]
        .as_array()
        .unwrap()
        .iter()
        .map(|b| b["__component"].as_str().unwrap())
        .collect();
    assert_eq!(tags, vec!["shared.quote", "shared.card", "shared.quote"]);
}

#[tokio::test]
async fn relation_sort_and_pagination_apply_per_node() {
    let snap = snapshot();
    let out = populate(
        &snap,
        &source(),
        PublicationState::Preview,
        json!({
            "tags": {
                "sort": "label:desc",
                "pagination": {"page": 1, "pageSize": 2},
            }
        }),
    )
    .await
    .unwrap();
    let labels: Vec<&str> = out["tags"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["label"].as_str().unwrap())
        .collect();
    assert_eq!(labels, vec!["web", "rust"]);
}

#[tokio::test]
async fn recursion_depth_is_bounded() {
    let snap = snapshot_from_values(&[json!({
        "uid": "api::node.node",
        "attributes": {
            "label": {"type": "string"},
            "next": {"type": "relation", "relation": "oneToOne", "target": "api::node.node"},
        }
    })])
    .unwrap();
    let mut src = MemorySource::default();
    src.insert("api::node.node", record(1, json!({"label": "a"}), true));
    src.insert("api::node.node", record(2, json!({"label": "b"}), true));
    src.link("api::node.node", 1, "next", &[2]);
    src.link("api::node.node", 2, "next", &[1]);

    let spec = resolve(
        &snap,
        "api::node.node",
        &json!({"next": {"populate": {"next": {"populate": {"next": true}}}}}),
    )
    .unwrap();
    let walker = GraphWalker::new(
        &snap,
        &src,
        PublicationState::Preview,
        WalkerConfig { max_depth: 2 },
    );
    let root = src.find_one("api::node.node", 1).await.unwrap().unwrap();
    let err = walker
        .populate_record("api::node.node", &root, spec.as_ref())
        .await
        .unwrap_err();
    match err {
        CoreError::Validation(errors) => assert_eq!(errors[0].name, "maxDepth"),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn available_mode_excludes_current_and_omitted_ids() {
    let snap = snapshot();
    let src = source();
    let mut shorter = src;
    // Only 10 currently linked, so 11 and 12 are candidates.
    shorter.link("api::article.article", 100, "tags", &[10]);

    let walker = GraphWalker::new(
        &snap,
        &shorter,
        PublicationState::Preview,
        WalkerConfig::default(),
    );
    let query = RelatedQuery {
        source_uid: "api::article.article",
        source_id: Some(100),
        attribute: "tags",
        target_uid: "api::tag.tag",
        mode: RelationMode::Available,
        ids_to_omit: &[12],
        params: QueryParams::default(),
    };
    let page = walker.list_related(&query, None).await.unwrap();
    assert_eq!(page.meta.total, 1);
    assert_eq!(page.items[0]["label"], "draft-only");
}

#[tokio::test]
async fn populated_pages_keep_their_metadata() {
    let snap = snapshot();
    let src = source();
    let spec = Some(PopulateSpec::Wildcard);
    let walker = GraphWalker::new(&snap, &src, PublicationState::Live, WalkerConfig::default());
    let page = src
        .find_many(
            "api::article.article",
            &QueryParams {
                published_only: true,
                ..Default::default()
            },
        )
        .await
        .unwrap();
    let out = walker
        .populate_page("api::article.article", page, spec.as_ref())
        .await
        .unwrap();
    assert_eq!(out.meta.total, 1);
    assert_eq!(out.items[0]["author"]["name"], "brie");
}
