//! Test helpers shared by the integration tests.
//!
//! Provides an in-memory storage backend with failure injection, sample
//! image generators and fixture builders for users and folders.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::io::Cursor;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};

use imgshelf::auth::ActingUser;
use imgshelf::gallery::{Folder, FolderRepository, NewFolder};
use imgshelf::imaging::DerivativeConfig;
use imgshelf::quota::{QuotaLedger, QuotaUsage};
use imgshelf::storage::{ObjectReader, StorageBackend, StoredObject};
use imgshelf::upload::UploadedFile;
use imgshelf::{Database, NewUser, Role, ShelfError, UserRepository};

/// Storage backend keeping objects in memory.
#[derive(Default)]
pub struct MemoryStorage {
    objects: Mutex<BTreeMap<String, Bytes>>,
    fail_puts_containing: Mutex<Vec<String>>,
    delete_folder_on_put: Mutex<Option<(Database, i64)>>,
}

impl MemoryStorage {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make every `put` whose key contains `pattern` fail.
    pub fn fail_puts_containing(&self, pattern: &str) {
        self.fail_puts_containing
            .lock()
            .unwrap()
            .push(pattern.to_string());
    }

    /// Delete `folder_id` from the database during the next `put`,
    /// simulating a folder removed while a batch is processing.
    pub fn delete_folder_on_next_put(&self, db: &Database, folder_id: i64) {
        *self.delete_folder_on_put.lock().unwrap() = Some((db.clone(), folder_id));
    }

    /// Drop an object behind the application's back.
    pub fn remove(&self, key: &str) {
        self.objects.lock().unwrap().remove(key);
    }

    pub fn keys(&self) -> Vec<String> {
        self.objects.lock().unwrap().keys().cloned().collect()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.objects.lock().unwrap().contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<Bytes> {
        self.objects.lock().unwrap().get(key).cloned()
    }

    pub fn size_of(&self, key: &str) -> i64 {
        self.get(key).map_or(0, |b| b.len() as i64)
    }

    pub fn is_empty(&self) -> bool {
        self.objects.lock().unwrap().is_empty()
    }
}

#[async_trait]
impl StorageBackend for MemoryStorage {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn put(&self, key: &str, data: Bytes, _content_type: &str) -> imgshelf::Result<StoredObject> {
        let pending = self.delete_folder_on_put.lock().unwrap().take();
        if let Some((db, folder_id)) = pending {
            sqlx::query("DELETE FROM folders WHERE id = ?")
                .bind(folder_id)
                .execute(db.pool())
                .await
                .unwrap();
        }

        let failing = self
            .fail_puts_containing
            .lock()
            .unwrap()
            .iter()
            .any(|p| key.contains(p.as_str()));
        if failing {
            return Err(ShelfError::Storage(format!("injected failure for {key}")));
        }

        let size = data.len() as i64;
        self.objects.lock().unwrap().insert(key.to_string(), data);
        Ok(StoredObject {
            key: key.to_string(),
            url: format!("memory://{key}"),
            size,
        })
    }

    async fn delete(&self, key: &str) -> imgshelf::Result<()> {
        self.objects.lock().unwrap().remove(key);
        Ok(())
    }

    async fn open(&self, key: &str) -> imgshelf::Result<Option<ObjectReader>> {
        let data = self.get(key);
        Ok(data.map(|d| Box::pin(Cursor::new(d)) as ObjectReader))
    }
}

// ============================================================================
// Sample images
// ============================================================================

/// RGB noise, which compresses poorly in every format.
pub fn noise_image(width: u32, height: u32, seed: u32) -> DynamicImage {
    let mut state = seed.wrapping_mul(2_654_435_761).wrapping_add(1);
    let img = RgbImage::from_fn(width, height, |_, _| {
        let mut next = || {
            state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
            (state >> 24) as u8
        };
        Rgb([next(), next(), next()])
    });
    DynamicImage::ImageRgb8(img)
}

pub fn encode(img: &DynamicImage, format: ImageFormat) -> Vec<u8> {
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, format).unwrap();
    buf.into_inner()
}

pub fn noise_png(width: u32, height: u32, seed: u32) -> Vec<u8> {
    encode(&noise_image(width, height, seed), ImageFormat::Png)
}

pub fn noise_jpeg(width: u32, height: u32, seed: u32) -> Vec<u8> {
    encode(&noise_image(width, height, seed), ImageFormat::Jpeg)
}

pub fn noise_bmp(width: u32, height: u32, seed: u32) -> Vec<u8> {
    encode(&noise_image(width, height, seed), ImageFormat::Bmp)
}

pub async fn uploaded(name: &str, mime: &str, data: &[u8]) -> UploadedFile {
    UploadedFile::from_bytes(name, mime, data, None).await.unwrap()
}

// ============================================================================
// Fixtures
// ============================================================================

pub fn derivative_config() -> DerivativeConfig {
    DerivativeConfig::default()
}

pub async fn create_user(db: &Database, username: &str, role: Role, limit: i64) -> ActingUser {
    let user = UserRepository::new(db.pool())
        .create(
            &NewUser::new(username, format!("{username}@example.com"), "not-a-real-hash")
                .with_role(role)
                .with_storage_limit(limit),
        )
        .await
        .unwrap();
    ActingUser::new(user.id, user.role)
}

pub async fn create_folder(db: &Database, owner: &ActingUser, name: &str, public: bool) -> Folder {
    FolderRepository::new(db.pool())
        .create(&NewFolder::new(name, owner.id).with_public(public))
        .await
        .unwrap()
}

pub async fn usage(db: &Database, user: &ActingUser) -> QuotaUsage {
    QuotaLedger::new(db.pool()).usage(user.id).await.unwrap()
}

pub const GIB: i64 = 1024 * 1024 * 1024;
