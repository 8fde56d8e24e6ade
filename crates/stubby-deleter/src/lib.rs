//! Background deletion for the Stubby URL shortener.
//!
//! Request handlers never call [`UrlStore::delete_urls`] themselves. They
//! hand a [`DeleteRequest`] to a [`DeleteQueue`], and a single
//! [`DeleteWorker`] task applies the batches one after another against the
//! active store.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use stubby_core::{Principal, ShortCode};
//! use stubby_deleter::{DeleteRequest, DeleteWorker};
//! use stubby_storage::InMemoryStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let (queue, handle) = DeleteWorker::spawn(Arc::new(InMemoryStore::new()), 64)?;
//!
//! let owner = Principal::new("user-1")?;
//! queue
//!     .enqueue(DeleteRequest::new(owner, vec![ShortCode::new("abc12345")?]))
//!     .await?;
//!
//! handle.shutdown().await?;
//! # Ok(())
//! # }
//! ```
//!
//! [`UrlStore::delete_urls`]: stubby_core::UrlStore::delete_urls

pub mod error;
pub mod queue;
pub mod worker;

pub use error::{DeleterError, Result};
pub use queue::{DeleteQueue, DeleteRequest};
pub use worker::{DeleteWorker, DeleteWorkerHandle};
