//! Storage crate: the roleplay session store.
//!
//! ## Modules
//!
//! - [`error`] – Storage error types
//! - [`models`] – Session, GuildRecord
//! - [`repository`] – SessionStore trait
//! - [`session_repo`] – SqliteSessionStore (SQLite)
//! - [`sqlite_pool`] – SqlitePoolManager

mod error;
mod models;
mod repository;
mod session_repo;
mod sqlite_pool;


pub use error::StorageError;
pub use models::{GuildRecord, Session};
pub use repository::SessionStore;
pub use session_repo::SqliteSessionStore;
pub use sqlite_pool::SqlitePoolManager;
