//! Row models and DTOs.

pub mod entity;
pub mod file;
pub mod folder;
