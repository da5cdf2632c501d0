//! mediadrop server
//!
//! REST API storing uploaded items with a picture attachment, its resized
//! variants, and the media files behind their URLs.

pub mod attachment;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod routes;
pub mod store;

pub use config::ServerConfig;
pub use error::AppError;
pub use routes::{create_router, AppState};
pub use store::ItemStore;
