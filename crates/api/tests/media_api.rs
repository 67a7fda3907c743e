//! HTTP-level integration tests for the media-library endpoints: the folder
//! tree, file metadata, and the bulk actions.

mod common;

use axum::http::StatusCode;
use common::{body_json, get, post_json, put_json};
use serde_json::{json, Value};
use sqlx::PgPool;

async fn create_folder(pool: &PgPool, name: &str, parent: Option<i64>) -> Value {
    let response = post_json(
        common::build_test_app(pool.clone()),
        "/upload/folders",
        json!({"name": name, "parent": parent}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    body_json(response).await["data"].clone()
}

async fn create_file(pool: &PgPool, name: &str, folder: Option<i64>) -> Value {
    let response = post_json(
        common::build_test_app(pool.clone()),
        "/upload/files",
        json!({"name": name, "url": format!("/uploads/{name}"), "folder": folder}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    body_json(response).await["data"].clone()
}

// ---------------------------------------------------------------------------
// Folder tree
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn nested_folder_paths_chain(pool: PgPool) {
    let parent = create_folder(&pool, "reports", None).await;
    let child = create_folder(&pool, "2026", Some(parent["id"].as_i64().unwrap())).await;

    let parent_path = parent["path"].as_str().unwrap();
    let child_path = child["path"].as_str().unwrap();
    assert!(child_path.starts_with(&format!("{parent_path}/")));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn sibling_names_must_be_unique(pool: PgPool) {
    create_folder(&pool, "dup", None).await;

    let response = post_json(
        common::build_test_app(pool.clone()),
        "/upload/folders",
        json!({"name": "dup", "parent": null}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"]["name"], "ValidationError");
    assert_eq!(body["error"]["details"]["errors"][0]["name"], "unique");

    // The same name under a different parent is fine.
    let other = create_folder(&pool, "other", None).await;
    create_folder(&pool, "dup", other["id"].as_i64()).await;
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn folder_names_are_validated(pool: PgPool) {
    for name in ["", "a/b", " padded"] {
        let response = post_json(
            common::build_test_app(pool.clone()),
            "/upload/folders",
            json!({"name": name, "parent": null}),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "name: {name:?}");
    }
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn moving_a_folder_rebases_its_subtree(pool: PgPool) {
    let a = create_folder(&pool, "a", None).await;
    let b = create_folder(&pool, "b", a["id"].as_i64()).await;
    let c = create_folder(&pool, "c", None).await;
    let file = create_file(&pool, "doc.pdf", b["id"].as_i64()).await;

    let response = put_json(
        common::build_test_app(pool.clone()),
        &format!("/upload/folders/{}", b["id"]),
        json!({"parent": c["id"]}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let moved = body_json(response).await;
    let c_path = c["path"].as_str().unwrap();
    assert!(moved["data"]["path"]
        .as_str()
        .unwrap()
        .starts_with(&format!("{c_path}/")));
    assert_eq!(moved["data"]["parent_id"], c["id"]);

    // The contained file is still listed inside the moved folder.
    let body = body_json(
        get(
            common::build_test_app(pool),
            &format!("/upload/files?folder={}", b["id"]),
        )
        .await,
    )
    .await;
    assert_eq!(body["data"][0]["id"], file["id"]);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn moving_into_own_subtree_fails_without_changes(pool: PgPool) {
    let a = create_folder(&pool, "a", None).await;
    let b = create_folder(&pool, "b", a["id"].as_i64()).await;

    let response = put_json(
        common::build_test_app(pool.clone()),
        &format!("/upload/folders/{}", a["id"]),
        json!({"parent": b["id"]}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"]["name"], "ApplicationError");
    assert_eq!(body["error"]["details"]["key"], "folder.moveIntoSelf");

    // Nothing moved: a is still at the root.
    let body = body_json(get(common::build_test_app(pool), "/upload/folders").await).await;
    let root_a = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .find(|f| f["id"] == a["id"])
        .unwrap();
    assert!(root_a["parent_id"].is_null());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn rename_and_move_in_one_request(pool: PgPool) {
    let a = create_folder(&pool, "a", None).await;
    let b = create_folder(&pool, "b", None).await;

    let response = put_json(
        common::build_test_app(pool),
        &format!("/upload/folders/{}", b["id"]),
        json!({"name": "renamed", "parent": a["id"]}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["name"], "renamed");
    assert_eq!(body["data"]["parent_id"], a["id"]);
}

// ---------------------------------------------------------------------------
// Files
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn file_metadata_updates_keep_unset_fields(pool: PgPool) {
    let file = create_file(&pool, "img.png", None).await;

    let response = put_json(
        common::build_test_app(pool),
        &format!("/upload/files/{}", file["id"]),
        json!({"alternative_text": "an image"}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["name"], "img.png");
    assert_eq!(body["data"]["alternative_text"], "an image");
}

// ---------------------------------------------------------------------------
// Bulk actions
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn bulk_move_relocates_files_and_folders(pool: PgPool) {
    let src = create_folder(&pool, "src", None).await;
    let moving = create_folder(&pool, "moving", src["id"].as_i64()).await;
    let file = create_file(&pool, "loose.txt", None).await;
    let dest = create_folder(&pool, "dest", None).await;

    let response = post_json(
        common::build_test_app(pool.clone()),
        "/upload/actions/bulk-move",
        json!({
            "fileIds": [file["id"]],
            "folderIds": [moving["id"]],
            "destinationFolderId": dest["id"],
        }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["folders"][0]["id"], moving["id"]);
    assert_eq!(body["data"]["files"][0]["id"], file["id"]);

    let body = body_json(
        get(
            common::build_test_app(pool.clone()),
            &format!("/upload/folders?parent={}", dest["id"]),
        )
        .await,
    )
    .await;
    assert_eq!(body["data"][0]["id"], moving["id"]);

    let body = body_json(
        get(
            common::build_test_app(pool),
            &format!("/upload/files?folder={}", dest["id"]),
        )
        .await,
    )
    .await;
    assert_eq!(body["data"][0]["id"], file["id"]);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn bulk_move_with_a_duplicate_name_moves_nothing(pool: PgPool) {
    let dest = create_folder(&pool, "dest", None).await;
    create_folder(&pool, "dup", dest["id"].as_i64()).await;
    let src = create_folder(&pool, "src", None).await;
    let clashing = create_folder(&pool, "dup", src["id"].as_i64()).await;
    let innocent = create_folder(&pool, "innocent", src["id"].as_i64()).await;

    let response = post_json(
        common::build_test_app(pool.clone()),
        "/upload/actions/bulk-move",
        json!({
            "folderIds": [innocent["id"], clashing["id"]],
            "destinationFolderId": dest["id"],
        }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(
        body["error"]["message"],
        "some folders already exists: dup"
    );

    // Nothing moved, the innocent folder included.
    let body = body_json(
        get(
            common::build_test_app(pool),
            &format!("/upload/folders?parent={}", src["id"]),
        )
        .await,
    )
    .await;
    assert_eq!(body["data"].as_array().unwrap().len(), 2);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn bulk_move_rejects_duplicates_within_the_moving_set(pool: PgPool) {
    let src1 = create_folder(&pool, "src1", None).await;
    let src2 = create_folder(&pool, "src2", None).await;
    let first = create_folder(&pool, "dup", src1["id"].as_i64()).await;
    let second = create_folder(&pool, "dup", src2["id"].as_i64()).await;
    let dest = create_folder(&pool, "dest", None).await;

    // Both folders would land under dest with the same name.
    let response = post_json(
        common::build_test_app(pool.clone()),
        "/upload/actions/bulk-move",
        json!({
            "folderIds": [first["id"], second["id"]],
            "destinationFolderId": dest["id"],
        }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"]["message"], "some folders already exists: dup");

    // Neither folder moved, the first included.
    let body = body_json(
        get(
            common::build_test_app(pool.clone()),
            &format!("/upload/folders?parent={}", dest["id"]),
        )
        .await,
    )
    .await;
    assert!(body["data"].as_array().unwrap().is_empty());
    for src in [&src1, &src2] {
        let body = body_json(
            get(
                common::build_test_app(pool.clone()),
                &format!("/upload/folders?parent={}", src["id"]),
            )
            .await,
        )
        .await;
        assert_eq!(body["data"].as_array().unwrap().len(), 1);
    }
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn failed_rename_during_a_move_changes_nothing(pool: PgPool) {
    let dest = create_folder(&pool, "dest", None).await;
    create_folder(&pool, "taken", dest["id"].as_i64()).await;
    let folder = create_folder(&pool, "wanderer", None).await;

    // The new name collides with dest's existing child, so neither the
    // rename nor the move may stick.
    let response = put_json(
        common::build_test_app(pool.clone()),
        &format!("/upload/folders/{}", folder["id"]),
        json!({"name": "taken", "parent": dest["id"]}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"]["name"], "ValidationError");
    assert_eq!(body["error"]["details"]["errors"][0]["name"], "unique");

    let body = body_json(get(common::build_test_app(pool), "/upload/folders").await).await;
    let unchanged = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .find(|f| f["id"] == folder["id"])
        .unwrap();
    assert_eq!(unchanged["name"], "wanderer");
    assert!(unchanged["parent_id"].is_null());
    assert_eq!(unchanged["path"], folder["path"]);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn bulk_delete_cascades_folder_contents(pool: PgPool) {
    let folder = create_folder(&pool, "trash", None).await;
    let child = create_folder(&pool, "inner", folder["id"].as_i64()).await;
    let file = create_file(&pool, "gone.txt", child["id"].as_i64()).await;
    let loose = create_file(&pool, "also-gone.txt", None).await;

    let response = post_json(
        common::build_test_app(pool.clone()),
        "/upload/actions/bulk-delete",
        json!({"fileIds": [loose["id"]], "folderIds": [folder["id"]]}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let files = body["data"]["files"].as_array().unwrap();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0]["id"], loose["id"]);
    let folders = body["data"]["folders"].as_array().unwrap();
    assert_eq!(folders.len(), 1);
    assert_eq!(folders[0]["id"], folder["id"]);

    let body = body_json(get(common::build_test_app(pool.clone()), "/upload/folders").await).await;
    assert!(body["data"].as_array().unwrap().is_empty());

    let body = body_json(get(common::build_test_app(pool), "/upload/files").await).await;
    let ids: Vec<i64> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["id"].as_i64().unwrap())
        .collect();
    assert!(!ids.contains(&file["id"].as_i64().unwrap()));
    assert!(!ids.contains(&loose["id"].as_i64().unwrap()));
}
