//! HTTP surface of the Stubby URL shortener.

pub mod app;
pub mod error;
pub mod handlers;
pub mod model;
pub mod principal;
pub mod state;
pub mod telemetry;

pub use app::App;
pub use error::{AppError, Result};
pub use state::AppState;
