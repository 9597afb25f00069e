//! HTTP API for imgshelf.
//!
//! JSON endpoints for accounts, folders, uploads and settings, zip
//! downloads streamed from the storage backend, and optional static
//! serving of the local uploads root.

pub mod dto;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod server;

pub use error::ApiError;
pub use handlers::AppState;
pub use router::create_router;
pub use server::WebServer;
