//! Upload pipeline: spooled request files in, image records out.

mod file;
mod service;

pub use file::{spool_field, UploadedFile};
pub use service::{UploadOutcome, UploadService};
