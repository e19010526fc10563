//! Bookmark persistence for the linktap sync engine.
//!
//! Provides the [`StateStore`] trait plus a write-through JSON-file
//! backend and an in-memory backend for tests. Model types live in
//! [`linktap_types::state`].

#![warn(clippy::pedantic)]

pub mod backend;
pub mod error;
pub mod file;
pub mod memory;

pub use backend::StateStore;
pub use error::StateError;
pub use file::JsonFileStateStore;
pub use memory::InMemoryStateStore;
