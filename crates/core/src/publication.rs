//! Publication-state filtering for draft-and-publish content types.

use serde::{Deserialize, Serialize};

use crate::schema::SchemaSnapshot;
use crate::types::Timestamp;

/// Requested visibility of draft entries.
///
/// The default is `Live`. For content types without draft-and-publish the
/// filter is a no-op regardless of mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PublicationState {
    #[default]
    Live,
    Preview,
}

impl PublicationState {
    /// Parse a `publicationState` (or legacy `_publicationState`) query
    /// value. Unrecognized values fall back to the default.
    pub fn parse(value: Option<&str>) -> Self {
        match value {
            Some("preview") => PublicationState::Preview,
            _ => PublicationState::Live,
        }
    }

    /// Whether row fetches of `uid` must restrict to published entries.
    /// Applied independently at every relation hop.
    pub fn published_only(self, snapshot: &SchemaSnapshot, uid: &str) -> bool {
        self == PublicationState::Live && snapshot.draft_and_publish(uid)
    }

    /// In-memory form of the same rule, for already-fetched entries.
    pub fn admits(
        self,
        snapshot: &SchemaSnapshot,
        uid: &str,
        published_at: Option<Timestamp>,
    ) -> bool {
        !self.published_only(snapshot, uid) || published_at.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::loader::snapshot_from_values;
    use serde_json::json;

    fn snapshot() -> SchemaSnapshot {
        snapshot_from_values(&[
            json!({"uid": "api::article.article", "draftAndPublish": true, "attributes": {}}),
            json!({"uid": "api::author.author", "draftAndPublish": false, "attributes": {}}),
        ])
        .unwrap()
    }

    #[test]
    fn live_restricts_draft_and_publish_types_only() {
        let snap = snapshot();
        assert!(PublicationState::Live.published_only(&snap, "api::article.article"));
        assert!(!PublicationState::Live.published_only(&snap, "api::author.author"));
    }

    #[test]
    fn preview_admits_drafts() {
        let snap = snapshot();
        assert!(!PublicationState::Preview.published_only(&snap, "api::article.article"));
        assert!(PublicationState::Preview.admits(&snap, "api::article.article", None));
        assert!(!PublicationState::Live.admits(&snap, "api::article.article", None));
        assert!(PublicationState::Live.admits(
            &snap,
            "api::article.article",
            Some(chrono::Utc::now())
        ));
    }

    #[test]
    fn parse_recognizes_preview_and_defaults_to_live() {
        assert_eq!(
            PublicationState::parse(Some("preview")),
            PublicationState::Preview
        );
        assert_eq!(PublicationState::parse(Some("live")), PublicationState::Live);
        assert_eq!(PublicationState::parse(Some("bogus")), PublicationState::Live);
        assert_eq!(PublicationState::parse(None), PublicationState::Live);
    }
}
