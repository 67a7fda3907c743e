//! Integration tests for the folder tree and file repositories: path
//! composition, sibling-name uniqueness, subtree moves, and cascades.

use canopy_core::folders;
use canopy_db::models::file::{CreateFile, UpdateFile};
use canopy_db::models::folder::Folder;
use canopy_db::repositories::{FileRepo, FolderRepo, Relocation};
use sqlx::PgPool;

fn new_file(name: &str, folder: Option<i64>) -> CreateFile {
    CreateFile {
        name: name.to_string(),
        alternative_text: None,
        url: format!("/uploads/{name}"),
        mime: Some("image/png".to_string()),
        size: Some(12.5),
        folder,
    }
}

fn relocation_into(destination: &Folder, folder: &Folder) -> Relocation {
    Relocation {
        new_parent: Some(destination.id),
        old_path: folder.path.clone(),
        new_path: folders::join_path(&destination.path, folder.path_id),
    }
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn folder_paths_chain_parent_segments(pool: PgPool) {
    let root = FolderRepo::create(&pool, "media", None).await.unwrap();
    let child = FolderRepo::create(&pool, "reports", Some(root.id)).await.unwrap();
    let grandchild = FolderRepo::create(&pool, "2026", Some(child.id)).await.unwrap();

    assert_eq!(root.path, format!("/{}", root.path_id));
    assert_eq!(child.path, format!("{}/{}", root.path, child.path_id));
    assert_eq!(grandchild.path, format!("{}/{}", child.path, grandchild.path_id));
    assert!(folders::is_self_or_descendant(&root.path, &grandchild.path));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn sibling_names_are_unique_including_root(pool: PgPool) {
    FolderRepo::create(&pool, "media", None).await.unwrap();
    assert!(FolderRepo::create(&pool, "media", None).await.is_err());

    let parent = FolderRepo::create(&pool, "parent", None).await.unwrap();
    FolderRepo::create(&pool, "media", Some(parent.id)).await.unwrap();
    assert!(FolderRepo::create(&pool, "media", Some(parent.id)).await.is_err());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn creating_under_a_missing_parent_fails(pool: PgPool) {
    let err = FolderRepo::create(&pool, "orphan", Some(9999)).await.unwrap_err();
    assert!(matches!(err, sqlx::Error::RowNotFound));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn moving_a_subtree_rebases_descendants_and_files(pool: PgPool) {
    let a = FolderRepo::create(&pool, "a", None).await.unwrap();
    let b = FolderRepo::create(&pool, "b", Some(a.id)).await.unwrap();
    let c = FolderRepo::create(&pool, "c", Some(b.id)).await.unwrap();
    let dest = FolderRepo::create(&pool, "dest", None).await.unwrap();

    let file = FileRepo::create(&pool, &new_file("deep.png", Some(c.id))).await.unwrap();
    assert_eq!(file.folder_path, c.path);

    // Move b (with c and the file below it) under dest.
    let relocation = relocation_into(&dest, &b);
    let moved = FolderRepo::update(&pool, b.id, None, Some(&relocation))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(moved.path, relocation.new_path);
    assert_eq!(moved.parent_id, Some(dest.id));

    let c_after = FolderRepo::find_by_id(&pool, c.id).await.unwrap().unwrap();
    assert_eq!(c_after.path, folders::rebase_path(&c.path, &b.path, &relocation.new_path));

    let file_after = FileRepo::find_by_id(&pool, file.id).await.unwrap().unwrap();
    assert_eq!(file_after.folder_path, c_after.path);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn rename_and_move_apply_atomically(pool: PgPool) {
    let dest = FolderRepo::create(&pool, "dest", None).await.unwrap();
    FolderRepo::create(&pool, "taken", Some(dest.id)).await.unwrap();
    let folder = FolderRepo::create(&pool, "wanderer", None).await.unwrap();

    // The combined update collides with dest's existing child; the subtree
    // path rewrite must roll back with it.
    let relocation = relocation_into(&dest, &folder);
    let result = FolderRepo::update(&pool, folder.id, Some("taken"), Some(&relocation)).await;
    assert!(result.is_err());

    let unchanged = FolderRepo::find_by_id(&pool, folder.id).await.unwrap().unwrap();
    assert_eq!(unchanged.name, "wanderer");
    assert_eq!(unchanged.parent_id, None);
    assert_eq!(unchanged.path, folder.path);

    // With a non-colliding name the same combined update succeeds.
    let renamed = FolderRepo::update(&pool, folder.id, Some("free"), Some(&relocation))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(renamed.name, "free");
    assert_eq!(renamed.parent_id, Some(dest.id));
    assert_eq!(renamed.path, relocation.new_path);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn bulk_move_rolls_back_every_tree_on_a_collision(pool: PgPool) {
    let dest = FolderRepo::create(&pool, "dest", None).await.unwrap();
    FolderRepo::create(&pool, "dup", Some(dest.id)).await.unwrap();
    let src = FolderRepo::create(&pool, "src", None).await.unwrap();
    let innocent = FolderRepo::create(&pool, "innocent", Some(src.id)).await.unwrap();
    let clashing = FolderRepo::create(&pool, "dup", Some(src.id)).await.unwrap();

    let moves = vec![
        (innocent.id, relocation_into(&dest, &innocent)),
        (clashing.id, relocation_into(&dest, &clashing)),
    ];
    let result = FolderRepo::bulk_move(&pool, &moves, &[], Some(dest.id)).await;
    assert!(result.is_err());

    // The first move in the batch rolled back with the second.
    let innocent_after = FolderRepo::find_by_id(&pool, innocent.id).await.unwrap().unwrap();
    assert_eq!(innocent_after.parent_id, Some(src.id));
    assert_eq!(innocent_after.path, innocent.path);
    let dest_children = FolderRepo::list_children(&pool, Some(dest.id)).await.unwrap();
    assert_eq!(dest_children.len(), 1);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn deleting_folders_cascades_children_and_files(pool: PgPool) {
    let parent = FolderRepo::create(&pool, "parent", None).await.unwrap();
    let child = FolderRepo::create(&pool, "child", Some(parent.id)).await.unwrap();
    let file = FileRepo::create(&pool, &new_file("x.png", Some(child.id))).await.unwrap();

    let (removed, _) = FolderRepo::bulk_delete(&pool, &[parent.id], &[]).await.unwrap();
    assert_eq!(removed.len(), 1);
    assert_eq!(removed[0].id, parent.id);
    assert!(FolderRepo::find_by_id(&pool, child.id).await.unwrap().is_none());
    assert!(FileRepo::find_by_id(&pool, file.id).await.unwrap().is_none());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn files_move_between_folders_and_to_root(pool: PgPool) {
    let folder = FolderRepo::create(&pool, "images", None).await.unwrap();
    let one = FileRepo::create(&pool, &new_file("one.png", None)).await.unwrap();
    let two = FileRepo::create(&pool, &new_file("two.png", None)).await.unwrap();
    assert_eq!(one.folder_path, folders::ROOT_PATH);

    let mut conn = pool.acquire().await.unwrap();
    let moved = FileRepo::move_many(&mut conn, &[one.id, two.id], Some(folder.id))
        .await
        .unwrap();
    assert_eq!(moved.len(), 2);
    let one_after = FileRepo::find_by_id(&pool, one.id).await.unwrap().unwrap();
    assert_eq!(one_after.folder_path, folder.path);
    assert_eq!(one_after.folder_id, Some(folder.id));

    FileRepo::move_many(&mut conn, &[one.id], None).await.unwrap();
    let back = FileRepo::find_by_id(&pool, one.id).await.unwrap().unwrap();
    assert_eq!(back.folder_path, folders::ROOT_PATH);
    assert_eq!(back.folder_id, None);

    let in_folder = FileRepo::list_in_folder(&pool, Some(folder.id)).await.unwrap();
    assert_eq!(in_folder.len(), 1);
    assert_eq!(in_folder[0].name, "two.png");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn file_metadata_updates_keep_unset_fields(pool: PgPool) {
    let file = FileRepo::create(&pool, &new_file("pic.png", None)).await.unwrap();
    let updated = FileRepo::update(
        &pool,
        file.id,
        &UpdateFile {
            name: None,
            alternative_text: Some("a picture".to_string()),
        },
    )
    .await
    .unwrap()
    .unwrap();
    assert_eq!(updated.name, "pic.png");
    assert_eq!(updated.alternative_text.as_deref(), Some("a picture"));

    let mut conn = pool.acquire().await.unwrap();
    let deleted = FileRepo::delete_many(&mut conn, &[file.id]).await.unwrap();
    assert_eq!(deleted.len(), 1);
    assert_eq!(deleted[0].id, file.id);
}
