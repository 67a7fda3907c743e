//! Shared query parameter types for API handlers.
//!
//! Object-valued parameters (`filters`, the object form of `populate`)
//! arrive JSON-encoded; `sort` and the list form of `populate` are
//! comma-separated strings; pagination uses bracketed keys.

use canopy_core::error::{CoreError, CoreResult};
use canopy_core::filter::Filter;
use canopy_core::populate::{PageRequest, SortKey};
use canopy_core::publication::PublicationState;
use canopy_core::types::DbId;
use serde::Deserialize;
use serde_json::Value;

/// Query parameters of entity listing and fetching endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub populate: Option<String>,
    pub filters: Option<String>,
    pub sort: Option<String>,
    #[serde(rename = "pagination[page]")]
    pub page: Option<u64>,
    #[serde(rename = "pagination[pageSize]")]
    pub page_size: Option<u64>,
    #[serde(rename = "publicationState")]
    pub publication_state: Option<String>,
    /// Legacy spelling, lower precedence.
    #[serde(rename = "_publicationState")]
    pub publication_state_legacy: Option<String>,
}

impl ListQuery {
    /// The raw populate value as the resolver expects it: a JSON string for
    /// `*` and comma-separated paths, a parsed document for the object form.
    pub fn populate_value(&self) -> CoreResult<Option<Value>> {
        let Some(raw) = self.populate.as_deref() else {
            return Ok(None);
        };
        let trimmed = raw.trim();
        if trimmed.starts_with('{') || trimmed.starts_with('[') {
            let value = serde_json::from_str(trimmed).map_err(|e| {
                CoreError::validation("populate", format!("invalid populate JSON: {e}"), "invalidPopulate")
            })?;
            Ok(Some(value))
        } else {
            Ok(Some(Value::String(trimmed.to_string())))
        }
    }

    pub fn filter(&self) -> CoreResult<Option<Filter>> {
        let Some(raw) = self.filters.as_deref() else {
            return Ok(None);
        };
        let value: Value = serde_json::from_str(raw).map_err(|e| {
            CoreError::validation("filters", format!("invalid filters JSON: {e}"), "invalidFilter")
        })?;
        Filter::parse(&value).map(Some)
    }

    pub fn sort_keys(&self) -> CoreResult<Vec<SortKey>> {
        let Some(raw) = self.sort.as_deref() else {
            return Ok(Vec::new());
        };
        let entries: Vec<Value> = raw
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| Value::String(s.to_string()))
            .collect();
        SortKey::parse_many(&Value::Array(entries), "sort")
    }

    pub fn page(&self) -> Option<PageRequest> {
        if self.page.is_none() && self.page_size.is_none() {
            return None;
        }
        Some(PageRequest::new(self.page, self.page_size))
    }

    pub fn state(&self) -> PublicationState {
        PublicationState::parse(
            self.publication_state
                .as_deref()
                .or(self.publication_state_legacy.as_deref()),
        )
    }
}

/// Query parameters of the available-relations endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct RelationsQuery {
    #[serde(rename = "entityId")]
    pub entity_id: Option<DbId>,
    /// Comma-separated ids to exclude from the candidates.
    #[serde(rename = "idsToOmit")]
    pub ids_to_omit: Option<String>,
    /// Scope the field lookup to a component schema instead of the
    /// content type.
    pub component: Option<String>,
    pub filters: Option<String>,
    pub sort: Option<String>,
    #[serde(rename = "pagination[page]")]
    pub page: Option<u64>,
    #[serde(rename = "pagination[pageSize]")]
    pub page_size: Option<u64>,
}

impl RelationsQuery {
    pub fn omitted_ids(&self) -> CoreResult<Vec<DbId>> {
        let Some(raw) = self.ids_to_omit.as_deref() else {
            return Ok(Vec::new());
        };
        raw.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| {
                s.parse().map_err(|_| {
                    CoreError::validation(
                        "idsToOmit",
                        format!("'{s}' is not a valid id"),
                        "invalidId",
                    )
                })
            })
            .collect()
    }

    pub fn filter(&self) -> CoreResult<Option<Filter>> {
        let Some(raw) = self.filters.as_deref() else {
            return Ok(None);
        };
        let value: Value = serde_json::from_str(raw).map_err(|e| {
            CoreError::validation("filters", format!("invalid filters JSON: {e}"), "invalidFilter")
        })?;
        Filter::parse(&value).map(Some)
    }

    pub fn sort_keys(&self) -> CoreResult<Vec<SortKey>> {
        let Some(raw) = self.sort.as_deref() else {
            return Ok(Vec::new());
        };
        let entries: Vec<Value> = raw
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| Value::String(s.to_string()))
            .collect();
        SortKey::parse_many(&Value::Array(entries), "sort")
    }

    pub fn page(&self) -> PageRequest {
        PageRequest::new(self.page, self.page_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn populate_object_form_is_parsed_as_json() {
        let query = ListQuery {
            populate: Some(r#"{"author": true}"#.to_string()),
            ..Default::default()
        };
        let value = query.populate_value().unwrap().unwrap();
        assert!(value.is_object());

        let query = ListQuery {
            populate: Some("author,tags".to_string()),
            ..Default::default()
        };
        assert_eq!(query.populate_value().unwrap().unwrap(), "author,tags");
    }

    #[test]
    fn malformed_filter_json_is_a_validation_error(){
        let query = ListQuery {
            filters: Some("{not json".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            query.filter().unwrap_err(),
            CoreError::Validation(_)
        ));
    }

    #[test]
    fn omitted_ids_parse_comma_lists() {
        let query = RelationsQuery {
            ids_to_omit: Some("1, 2,3".to_string()),
            ..Default::default()
        };
        assert_eq!(query.omitted_ids().unwrap(), vec![1, 2, 3]);
        assert!(RelationsQuery {
            ids_to_omit: Some("1,x".to_string()),
            ..Default::default()
        }
        .omitted_ids()
        .is_err());
    }
}
