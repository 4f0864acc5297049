//! Business logic services

pub mod guest_import;
pub mod guest_store;
pub mod import_history;
pub mod role_directory;
pub mod slug;
