//! Core types and traits for the Stubby URL shortener.
//!
//! This crate provides the short code derivation, the owning [`Principal`],
//! and the [`UrlStore`] capability every storage backend implements.

pub mod deadline;
pub mod error;
pub mod principal;
pub mod repository;
pub mod shortcode;

pub use deadline::with_deadline;
pub use error::{CoreError, Result, StoreError};
pub use principal::Principal;
pub use repository::{NewUrl, ReadStore, UrlRecord, UrlStore, UserUrl};
pub use shortcode::ShortCode;
