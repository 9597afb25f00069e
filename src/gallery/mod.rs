//! Folders, images and the deletion path that keeps storage and quota in
//! step with the database.

mod folder;
mod image;
mod service;

pub use folder::{Folder, FolderRepository, FolderUpdate, NewFolder, MAX_FOLDER_NAME_LENGTH};
pub use image::{Image, ImageRepository, NewImage};
pub use service::{AccountDeletion, FolderDeletion, GalleryService};
