//! Database schema and migrations for imgshelf.
//!
//! Migrations are applied sequentially when the database is first opened
//! or upgraded.

/// Database migrations.
///
/// Each migration is a SQL script that will be executed in order.
/// The schema_version table tracks which migrations have been applied.
pub const MIGRATIONS: &[&str] = &[
    // v1: users with storage accounting
    r#"
CREATE TABLE users (
    id                INTEGER PRIMARY KEY AUTOINCREMENT,
    username          TEXT NOT NULL UNIQUE COLLATE NOCASE,
    email             TEXT NOT NULL UNIQUE COLLATE NOCASE,
    password_hash     TEXT NOT NULL,           -- Argon2 hash
    role              TEXT NOT NULL DEFAULT 'user',  -- 'user', 'admin'
    storage_limit     INTEGER NOT NULL DEFAULT 5368709120,
    storage_used      INTEGER NOT NULL DEFAULT 0 CHECK (storage_used >= 0),
    storage_reserved  INTEGER NOT NULL DEFAULT 0 CHECK (storage_reserved >= 0),
    created_at        TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at        TEXT NOT NULL DEFAULT (datetime('now'))
);
"#,
    // v2: folders
    r#"
CREATE TABLE folders (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    name        TEXT NOT NULL,
    user_id     INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    is_public   INTEGER NOT NULL DEFAULT 0,
    created_at  TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at  TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX idx_folders_user_id ON folders(user_id);
CREATE INDEX idx_folders_is_public ON folders(is_public);
"#,
    // v3: images with per-rendition keys and urls
    r#"
CREATE TABLE images (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    filename        TEXT NOT NULL,           -- original client filename
    stored_key      TEXT NOT NULL,
    mimetype        TEXT NOT NULL,
    size            INTEGER NOT NULL,        -- bytes across all stored renditions
    folder_id       INTEGER NOT NULL REFERENCES folders(id) ON DELETE CASCADE,
    user_id         INTEGER NOT NULL REFERENCES users(id),
    url             TEXT NOT NULL,
    thumbnail_key   TEXT,
    thumbnail_url   TEXT,
    preview_key     TEXT,
    preview_url     TEXT,
    created_at      TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX idx_images_folder_id ON images(folder_id);
CREATE INDEX idx_images_user_id ON images(user_id);
"#,
    // v4: key/value settings
    r#"
CREATE TABLE settings (
    key     TEXT PRIMARY KEY,
    value   TEXT NOT NULL
);
"#,
];
