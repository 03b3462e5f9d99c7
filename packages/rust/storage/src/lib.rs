//! Persisted curator state: seen URLs, embeddings, feedback history, and
//! learned weights.
//!
//! The [`Store`] fronts an ephemeral [`MemoryBackend`] plus an optional
//! durable backend ([`JsonFileBackend`] or [`LibsqlBackend`]) and merges
//! their contents by recency on load.

mod backend;
mod database;
mod file;
mod memory;
pub mod merge;
mod migrations;
mod store;

pub use backend::StateBackend;
pub use database::LibsqlBackend;
pub use file::JsonFileBackend;
pub use memory::MemoryBackend;
pub use store::{Store, StoreHealth};
