//! Storage backends for the Stubby URL shortener.
//!
//! Three interchangeable implementations of [`UrlStore`]:
//!
//! - [`InMemoryStore`]: process memory only, the default.
//! - [`FileLogStore`]: an in-memory index persisted as an append-only
//!   newline-delimited JSON log.
//! - [`PostgresStore`]: a `urls` table with a unique constraint on the short code.
//!
//! [`open_store`] turns a [`StoreConfig`] into the one backend a process uses.

pub mod backend;
pub mod error;
pub mod file;
pub mod memory;
pub mod postgres;

pub use backend::{open_store, StoreConfig};
pub use error::{Result, StoreError};
pub use file::FileLogStore;
pub use memory::InMemoryStore;
pub use postgres::{PostgresOptions, PostgresStore};
pub use stubby_core::{ReadStore, UrlStore};
