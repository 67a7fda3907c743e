//! Materialized-path rules for the media-library folder tree.
//!
//! Every folder owns a numeric path segment (`path_id`); its `path` is the
//! slash-joined chain of ancestor segments (`/3/7/12`). These helpers are
//! pure — the repository layer applies them inside a single transaction so
//! a subtree move appears atomic to readers.

use crate::error::{CoreError, CoreResult};
use crate::types::DbId;

/// Path of the (virtual) media-library root.
pub const ROOT_PATH: &str = "/";

/// Validate a folder name: no slash, no leading/trailing whitespace, not
/// empty. Returns the offending rule as a field error on `name`.
pub fn validate_folder_name(name: &str) -> CoreResult<()> {
    if name.is_empty() {
        return Err(CoreError::validation(
            "name",
            "name is required",
            "required",
        ));
    }
    if name.contains('/') {
        return Err(CoreError::validation(
            "name",
            "name cannot contain a slash",
            "invalidName",
        ));
    }
    if name != name.trim() {
        return Err(CoreError::validation(
            "name",
            "name cannot start or end with a whitespace",
            "invalidName",
        ));
    }
    Ok(())
}

/// Compose a folder path from its parent's path and its own segment.
pub fn join_path(parent_path: &str, path_id: DbId) -> String {
    if parent_path == ROOT_PATH {
        format!("/{path_id}")
    } else {
        format!("{parent_path}/{path_id}")
    }
}

/// Whether `candidate` is `folder` itself or anywhere below it. Used to
/// reject moves into the folder's own subtree before touching any row.
pub fn is_self_or_descendant(folder_path: &str, candidate_path: &str) -> bool {
    candidate_path == folder_path
        || candidate_path.starts_with(&format!("{folder_path}/"))
}

/// Rewrite one path after its subtree root moved from `old_prefix` to
/// `new_prefix`. The caller guarantees `path` lies inside `old_prefix`.
pub fn rebase_path(path: &str, old_prefix: &str, new_prefix: &str) -> String {
    match path.strip_prefix(old_prefix) {
        Some(rest) => format!("{new_prefix}{rest}"),
        None => path.to_string(),
    }
}
