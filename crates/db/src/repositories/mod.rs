//! Repositories: plain CRUD over the storage tables. Query planning for
//! population lives in [`crate::query_source`].

pub mod entity_repo;
pub mod file_repo;
pub mod folder_repo;
pub mod link_repo;

pub use entity_repo::EntityRepo;
pub use file_repo::FileRepo;
pub use folder_repo::{FolderRepo, Relocation};
pub use link_repo::LinkRepo;
