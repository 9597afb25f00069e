//! Authentication and ownership rules for imgshelf.
//!
//! Token issuance lives in the web layer; this module covers password
//! hashing and the owner/admin checks shared by the upload, deletion and
//! archive paths.

mod password;
pub mod permission;

pub use password::{hash_password, validate_password, verify_password, PasswordError};
pub use permission::{ensure_can_manage, ensure_can_read_folder, ActingUser};
