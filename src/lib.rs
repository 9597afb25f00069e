//! imgshelf - image hosting server
//!
//! Users upload images into folders. Each upload is stored as an original
//! plus a thumbnail and a preview on a pluggable storage backend (local
//! disk or S3), billed against a per-user quota, and can be exported again
//! as a streamed zip archive.

pub mod archive;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod gallery;
pub mod imaging;
pub mod logging;
pub mod quota;
pub mod storage;
pub mod upload;
pub mod web;

pub use auth::{hash_password, validate_password, verify_password, ActingUser, PasswordError};
pub use config::Config;
pub use db::{Database, NewUser, Role, User, UserRepository};
pub use error::{Result, ShelfError, SkippedFile};
