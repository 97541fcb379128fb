//! Saved views and the storage they persist to.

pub mod storage;
pub mod view_store;

pub use storage::{FileStore, KeyValueStore, MemoryStore};
pub use view_store::{SavedView, ViewDraft, ViewStore, DEFAULT_VIEWS_SLOT};
