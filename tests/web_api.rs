//! Web API Tests
//!
//! End-to-end tests of the HTTP surface against local storage.

mod common;

use std::io::Cursor;
use std::sync::Arc;

use axum::http::header::{AUTHORIZATION, CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::http::StatusCode;
use axum_test::multipart::{MultipartForm, Part};
use axum_test::TestServer;
use imgshelf::db::SettingRepository;
use imgshelf::quota::QuotaLedger;
use imgshelf::storage::{LocalStorage, SharedStorage};
use imgshelf::web::WebServer;
use imgshelf::{Config, Database};
use serde_json::{json, Value};
use tempfile::TempDir;

use common::{noise_png, GIB};

const PUBLIC_URL: &str = "http://localhost/uploads";

struct TestApp {
    server: TestServer,
    db: Database,
    _dir: TempDir,
}

/// Create a test server with an in-memory database and local storage.
async fn create_test_app() -> TestApp {
    create_test_app_with(|_| {}).await
}

/// Like `create_test_app`, with a hook to adjust the configuration.
async fn create_test_app_with(configure: impl FnOnce(&mut Config)) -> TestApp {
    let dir = TempDir::new().unwrap();
    let mut config = Config::default();
    config.web.jwt_secret = "test-secret-key-for-testing-only".to_string();
    config.web.serve_uploads = true;
    config.storage.local_path = dir.path().to_string_lossy().into_owned();
    config.storage.public_url = PUBLIC_URL.to_string();
    config.upload.default_storage_limit = GIB;
    configure(&mut config);

    let db = Database::open_in_memory()
        .await
        .expect("Failed to create test database");
    SettingRepository::new(db.pool())
        .seed_defaults(&config.upload)
        .await
        .unwrap();
    let storage: SharedStorage = Arc::new(LocalStorage::new(dir.path(), PUBLIC_URL).unwrap());
    let web = WebServer::new(&config, db.clone(), storage).unwrap();
    let server = TestServer::new(web.router()).expect("Failed to create test server");

    TestApp {
        server,
        db,
        _dir: dir,
    }
}

/// Register a user and return the access token.
async fn register(server: &TestServer, username: &str) -> String {
    let response = server
        .post("/api/auth/register")
        .json(&json!({
            "username": username,
            "email": format!("{username}@example.com"),
            "password": "password123",
        }))
        .await;
    response.assert_status(StatusCode::CREATED);
    response.json::<Value>()["token"]
        .as_str()
        .unwrap()
        .to_string()
}

fn bearer(token: &str) -> String {
    format!("Bearer {token}")
}

async fn create_folder(server: &TestServer, token: &str, name: &str, public: bool) -> i64 {
    let response = server
        .post("/api/folders")
        .add_header(AUTHORIZATION, bearer(token))
        .json(&json!({ "name": name, "is_public": public }))
        .await;
    response.assert_status(StatusCode::CREATED);
    response.json::<Value>()["id"].as_i64().unwrap()
}

fn png_part(name: &str, seed: u32) -> Part {
    Part::bytes(noise_png(40, 30, seed))
        .file_name(name)
        .mime_type("image/png")
}

async fn upload(server: &TestServer, token: &str, folder_id: i64, form: MultipartForm) -> axum_test::TestResponse {
    server
        .post(&format!("/api/images/upload/{folder_id}"))
        .add_header(AUTHORIZATION, bearer(token))
        .multipart(form)
        .await
}

fn error_code(response: &axum_test::TestResponse) -> String {
    response.json::<Value>()["error"]["code"]
        .as_str()
        .unwrap()
        .to_string()
}

// ============================================================================
// Auth
// ============================================================================

#[tokio::test]
async fn test_first_user_is_admin() {
    let app = create_test_app().await;

    let first = app
        .server
        .post("/api/auth/register")
        .json(&json!({"username": "alice", "email": "alice@example.com", "password": "password123"}))
        .await;
    first.assert_status(StatusCode::CREATED);
    let body: Value = first.json();
    assert_eq!(body["user"]["role"], "admin");
    assert_eq!(body["user"]["storage_limit"], GIB);
    assert_eq!(body["user"]["storage_used"], 0);

    let second = app
        .server
        .post("/api/auth/register")
        .json(&json!({"username": "bob", "email": "bob@example.com", "password": "password123"}))
        .await;
    assert_eq!(second.json::<Value>()["user"]["role"], "user");

    let duplicate = app
        .server
        .post("/api/auth/register")
        .json(&json!({"username": "bob", "email": "bob2@example.com", "password": "password123"}))
        .await;
    duplicate.assert_status(StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_duplicate_email_rejected() {
    let app = create_test_app().await;
    register(&app.server, "alice").await;

    let duplicate = app
        .server
        .post("/api/auth/register")
        .json(&json!({"username": "bob", "email": "ALICE@example.com", "password": "password123"}))
        .await;
    duplicate.assert_status(StatusCode::CONFLICT);
    assert_eq!(duplicate.json::<Value>()["error"]["message"], "Email already in use");

    // The address still logs in to the original account.
    let login = app
        .server
        .post("/api/auth/login")
        .json(&json!({"usernameOrEmail": "alice@example.com", "password": "password123"}))
        .await;
    login.assert_status_ok();
    assert_eq!(login.json::<Value>()["user"]["username"], "alice");
}

#[tokio::test]
async fn test_login_by_username_or_email() {
    let app = create_test_app().await;
    register(&app.server, "alice").await;

    for login in ["alice", "Alice@Example.com"] {
        let response = app
            .server
            .post("/api/auth/login")
            .json(&json!({"usernameOrEmail": login, "password": "password123"}))
            .await;
        response.assert_status_ok();
        let token = response.json::<Value>()["token"].as_str().unwrap().to_string();

        let me = app
            .server
            .get("/api/auth/me")
            .add_header(AUTHORIZATION, bearer(&token))
            .await;
        me.assert_status_ok();
        assert_eq!(me.json::<Value>()["username"], "alice");
    }

    let wrong = app
        .server
        .post("/api/auth/login")
        .json(&json!({"usernameOrEmail": "alice", "password": "wrong-password"}))
        .await;
    wrong.assert_status(StatusCode::UNAUTHORIZED);
    assert_eq!(wrong.json::<Value>()["error"]["message"], "Invalid credentials");
}

#[tokio::test]
async fn test_protected_routes_require_token() {
    let app = create_test_app().await;

    app.server
        .get("/api/auth/me")
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
    app.server
        .get("/api/folders")
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
    app.server
        .get("/api/auth/me")
        .add_header(AUTHORIZATION, "Bearer invalid-token")
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
}

// ============================================================================
// Folders
// ============================================================================

#[tokio::test]
async fn test_folder_crud() {
    let app = create_test_app().await;
    let token = register(&app.server, "alice").await;
    let folder_id = create_folder(&app.server, &token, "Trips", false).await;

    let list = app
        .server
        .get("/api/folders")
        .add_header(AUTHORIZATION, bearer(&token))
        .await;
    list.assert_status_ok();
    assert_eq!(list.json::<Value>().as_array().unwrap().len(), 1);

    let updated = app
        .server
        .put(&format!("/api/folders/{folder_id}"))
        .add_header(AUTHORIZATION, bearer(&token))
        .json(&json!({"name": "Road trips", "is_public": true}))
        .await;
    updated.assert_status_ok();
    let body: Value = updated.json();
    assert_eq!(body["name"], "Road trips");
    assert_eq!(body["is_public"], true);

    let public = app.server.get("/api/folders/public").await;
    public.assert_status_ok();
    assert_eq!(public.json::<Value>().as_array().unwrap().len(), 1);

    app.server
        .put(&format!("/api/folders/{folder_id}"))
        .add_header(AUTHORIZATION, bearer(&token))
        .json(&json!({}))
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    let deleted = app
        .server
        .delete(&format!("/api/folders/{folder_id}"))
        .add_header(AUTHORIZATION, bearer(&token))
        .await;
    deleted.assert_status_ok();
    assert_eq!(deleted.json::<Value>()["images_removed"], 0);

    app.server
        .get(&format!("/api/folders/{folder_id}"))
        .add_header(AUTHORIZATION, bearer(&token))
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_private_folder_visibility() {
    let app = create_test_app().await;
    let alice = register(&app.server, "alice").await;
    let bob = register(&app.server, "bob").await;
    let folder_id = create_folder(&app.server, &alice, "secret", false).await;

    app.server
        .get(&format!("/api/folders/{folder_id}"))
        .await
        .assert_status(StatusCode::FORBIDDEN);
    app.server
        .get(&format!("/api/folders/{folder_id}/images"))
        .add_header(AUTHORIZATION, bearer(&bob))
        .await
        .assert_status(StatusCode::FORBIDDEN);
    app.server
        .get(&format!("/api/folders/{folder_id}/images"))
        .add_header(AUTHORIZATION, bearer(&alice))
        .await
        .assert_status_ok();
}

// ============================================================================
// Upload and delete
// ============================================================================

#[tokio::test]
async fn test_upload_and_serve() {
    let app = create_test_app().await;
    let token = register(&app.server, "alice").await;
    let folder_id = create_folder(&app.server, &token, "pics", false).await;

    let form = MultipartForm::new()
        .add_part("images", png_part("one.png", 1))
        .add_part(
            "images",
            Part::bytes(b"plain text".to_vec())
                .file_name("notes.txt")
                .mime_type("text/plain"),
        );
    let response = upload(&app.server, &token, folder_id, form).await;
    response.assert_status(StatusCode::CREATED);

    let body: Value = response.json();
    let images = body["newImages"].as_array().unwrap();
    assert_eq!(images.len(), 1);
    assert_eq!(body["skippedFiles"], json!(["notes.txt"]));
    assert_eq!(body["skippedReasons"][0]["filename"], "notes.txt");
    assert!(body["message"].as_str().unwrap().contains("1 image(s)"));

    let image = &images[0];
    assert_eq!(image["filename"], "one.png");
    assert!(image.get("stored_key").is_none());
    let size = image["size"].as_i64().unwrap();

    let me = app
        .server
        .get("/api/auth/me")
        .add_header(AUTHORIZATION, bearer(&token))
        .await;
    assert_eq!(me.json::<Value>()["storage_used"].as_i64().unwrap(), size);

    for field in ["url", "thumbnail_url", "preview_url"] {
        let url = image[field].as_str().unwrap();
        let path = url.strip_prefix("http://localhost").unwrap();
        app.server.get(path).await.assert_status_ok();
    }
    let original = app
        .server
        .get(image["url"].as_str().unwrap().strip_prefix("http://localhost").unwrap())
        .await;
    assert_eq!(original.as_bytes().as_ref(), noise_png(40, 30, 1).as_slice());

    let listed = app
        .server
        .get(&format!("/api/folders/{folder_id}/images"))
        .add_header(AUTHORIZATION, bearer(&token))
        .await;
    assert_eq!(listed.json::<Value>().as_array().unwrap().len(), 1);

    let image_id = image["id"].as_i64().unwrap();
    let deleted = app
        .server
        .delete(&format!("/api/images/{image_id}"))
        .add_header(AUTHORIZATION, bearer(&token))
        .await;
    deleted.assert_status_ok();
    assert_eq!(deleted.json::<Value>()["message"], "Image deleted successfully");

    app.server
        .delete(&format!("/api/images/{image_id}"))
        .add_header(AUTHORIZATION, bearer(&token))
        .await
        .assert_status(StatusCode::NOT_FOUND);

    let me = app
        .server
        .get("/api/auth/me")
        .add_header(AUTHORIZATION, bearer(&token))
        .await;
    assert_eq!(me.json::<Value>()["storage_used"], 0);
    app.server
        .get(image["url"].as_str().unwrap().strip_prefix("http://localhost").unwrap())
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_upload_rejections() {
    let app = create_test_app().await;
    let alice = register(&app.server, "alice").await;
    let bob = register(&app.server, "bob").await;
    let folder_id = create_folder(&app.server, &alice, "pics", false).await;

    let missing = upload(
        &app.server,
        &alice,
        9999,
        MultipartForm::new().add_part("images", png_part("a.png", 2)),
    )
    .await;
    missing.assert_status(StatusCode::NOT_FOUND);

    let foreign = upload(
        &app.server,
        &bob,
        folder_id,
        MultipartForm::new().add_part("images", png_part("a.png", 2)),
    )
    .await;
    foreign.assert_status(StatusCode::FORBIDDEN);

    let invalid = upload(
        &app.server,
        &alice,
        folder_id,
        MultipartForm::new().add_part(
            "images",
            Part::bytes(b"%PDF-1.4".to_vec())
                .file_name("doc.pdf")
                .mime_type("application/pdf"),
        ),
    )
    .await;
    invalid.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = invalid.json();
    assert_eq!(body["error"]["message"], "No valid files uploaded");
    assert!(body["error"]["details"]["doc.pdf"].is_array());

    app.server
        .post(&format!("/api/images/upload/{folder_id}"))
        .multipart(MultipartForm::new().add_part("images", png_part("a.png", 2)))
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_upload_over_quota() {
    let app = create_test_app().await;
    let admin = register(&app.server, "admin").await;
    let alice = register(&app.server, "alice").await;
    let folder_id = create_folder(&app.server, &alice, "pics", false).await;

    let users = app
        .server
        .get("/api/admin/users")
        .add_header(AUTHORIZATION, bearer(&admin))
        .await;
    users.assert_status_ok();
    let alice_id = users.json::<Value>()
        .as_array()
        .unwrap()
        .iter()
        .find(|u| u["username"] == "alice")
        .unwrap()["id"]
        .as_i64()
        .unwrap();

    let limited = app
        .server
        .put(&format!("/api/admin/users/{alice_id}/storage-limit"))
        .add_header(AUTHORIZATION, bearer(&admin))
        .json(&json!({"storageLimit": 100}))
        .await;
    limited.assert_status_ok();
    assert_eq!(limited.json::<Value>()["storage_limit"], 100);

    let response = upload(
        &app.server,
        &alice,
        folder_id,
        MultipartForm::new().add_part("images", png_part("big.png", 3)),
    )
    .await;
    response.assert_status(StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(error_code(&response), "PAYLOAD_TOO_LARGE");

    let listed = app
        .server
        .get(&format!("/api/folders/{folder_id}/images"))
        .add_header(AUTHORIZATION, bearer(&alice))
        .await;
    assert!(listed.json::<Value>().as_array().unwrap().is_empty());

    let usage = QuotaLedger::new(app.db.pool()).usage(alice_id).await.unwrap();
    assert_eq!(usage.storage_used, 0);
    assert_eq!(usage.storage_reserved, 0);
}

// ============================================================================
// Downloads
// ============================================================================

#[tokio::test]
async fn test_folder_download_headers() {
    let app = create_test_app().await;
    let token = register(&app.server, "alice").await;
    let folder_id = create_folder(&app.server, &token, "Été 2024", true).await;

    let form = MultipartForm::new()
        .add_part("images", png_part("a.png", 4))
        .add_part("images", png_part("b.png", 5));
    upload(&app.server, &token, folder_id, form)
        .await
        .assert_status(StatusCode::CREATED);

    // Public folders download without a token.
    let response = app
        .server
        .get(&format!("/api/folders/{folder_id}/download"))
        .await;
    response.assert_status_ok();
    assert_eq!(response.header(CONTENT_TYPE), "application/zip");
    let disposition = response.header(CONTENT_DISPOSITION);
    let disposition = disposition.to_str().unwrap();
    assert!(disposition.starts_with("attachment;"));
    assert!(disposition.contains("filename*=UTF-8''%C3%89t%C3%A9%202024.zip"));

    let archive = zip::ZipArchive::new(Cursor::new(response.as_bytes().to_vec())).unwrap();
    let mut names: Vec<&str> = archive.file_names().collect();
    names.sort();
    assert_eq!(names, vec!["a.png", "b.png"]);
}

#[tokio::test]
async fn test_bulk_download() {
    let app = create_test_app().await;
    let alice = register(&app.server, "alice").await;
    let bob = register(&app.server, "bob").await;
    let folder_id = create_folder(&app.server, &alice, "private", false).await;

    let response = upload(
        &app.server,
        &alice,
        folder_id,
        MultipartForm::new()
            .add_part("images", png_part("a.png", 6))
            .add_part("images", png_part("b.png", 7)),
    )
    .await;
    let ids: Vec<i64> = response.json::<Value>()["newImages"]
        .as_array()
        .unwrap()
        .iter()
        .map(|i| i["id"].as_i64().unwrap())
        .collect();

    let owned = app
        .server
        .post("/api/images/download/bulk")
        .add_header(AUTHORIZATION, bearer(&alice))
        .json(&json!({"imageIds": ids}))
        .await;
    owned.assert_status_ok();
    assert!(owned
        .header(CONTENT_DISPOSITION)
        .to_str()
        .unwrap()
        .contains("images.zip"));
    let archive = zip::ZipArchive::new(Cursor::new(owned.as_bytes().to_vec())).unwrap();
    assert_eq!(archive.len(), 2);

    app.server
        .post("/api/images/download/bulk")
        .add_header(AUTHORIZATION, bearer(&bob))
        .json(&json!({"imageIds": ids}))
        .await
        .assert_status(StatusCode::FORBIDDEN);
    app.server
        .post("/api/images/download/bulk")
        .json(&json!({"imageIds": ids}))
        .await
        .assert_status(StatusCode::FORBIDDEN);
    app.server
        .post("/api/images/download/bulk")
        .add_header(AUTHORIZATION, bearer(&alice))
        .json(&json!({"imageIds": []}))
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

// ============================================================================
// Settings and admin
// ============================================================================

#[tokio::test]
async fn test_settings_and_admin() {
    let app = create_test_app().await;
    let admin = register(&app.server, "admin").await;
    let user = register(&app.server, "alice").await;

    let settings = app
        .server
        .get("/api/settings")
        .add_header(AUTHORIZATION, bearer(&user))
        .await;
    settings.assert_status_ok();
    assert_eq!(settings.json::<Value>()["max_upload_size"], "5242880");

    app.server
        .get("/api/admin/users")
        .add_header(AUTHORIZATION, bearer(&user))
        .await
        .assert_status(StatusCode::FORBIDDEN);

    let updated = app
        .server
        .put("/api/admin/settings")
        .add_header(AUTHORIZATION, bearer(&admin))
        .json(&json!({"key": "max_upload_size", "value": "1024"}))
        .await;
    updated.assert_status_ok();
    assert_eq!(updated.json::<Value>()["value"], "1024");

    app.server
        .put("/api/admin/settings")
        .add_header(AUTHORIZATION, bearer(&admin))
        .json(&json!({"key": "max_upload_size", "value": "lots"}))
        .await
        .assert_status(StatusCode::BAD_REQUEST);
    app.server
        .put("/api/admin/settings")
        .add_header(AUTHORIZATION, bearer(&admin))
        .json(&json!({"key": "no_such_key", "value": "1"}))
        .await
        .assert_status(StatusCode::NOT_FOUND);

    let listed = app
        .server
        .get("/api/admin/settings")
        .add_header(AUTHORIZATION, bearer(&admin))
        .await;
    listed.assert_status_ok();
    assert_eq!(listed.json::<Value>()[0]["value"], "1024");

    // The lowered limit now skips a file that used to fit.
    let folder_id = create_folder(&app.server, &user, "pics", false).await;
    let response = upload(
        &app.server,
        &user,
        folder_id,
        MultipartForm::new().add_part("images", png_part("big.png", 8)),
    )
    .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&response), "BAD_REQUEST");
}

#[tokio::test]
async fn test_configured_upload_limit_is_seeded() {
    let app = create_test_app_with(|config| config.upload.default_max_upload_size = 2048).await;
    let token = register(&app.server, "alice").await;

    let settings = app
        .server
        .get("/api/settings")
        .add_header(AUTHORIZATION, bearer(&token))
        .await;
    settings.assert_status_ok();
    assert_eq!(settings.json::<Value>()["max_upload_size"], "2048");
    assert_eq!(
        SettingRepository::new(app.db.pool())
            .max_upload_size()
            .await
            .unwrap(),
        2048
    );
}

// ============================================================================
// Profile
// ============================================================================

async fn login(server: &TestServer, name: &str, password: &str) -> axum_test::TestResponse {
    server
        .post("/api/auth/login")
        .json(&json!({"usernameOrEmail": name, "password": password}))
        .await
}

#[tokio::test]
async fn test_profile_update() {
    let app = create_test_app().await;
    let alice = register(&app.server, "alice").await;
    register(&app.server, "bob").await;

    let profile = app
        .server
        .get("/api/user/profile")
        .add_header(AUTHORIZATION, bearer(&alice))
        .await;
    profile.assert_status_ok();
    assert_eq!(profile.json::<Value>()["email"], "alice@example.com");

    app.server
        .put("/api/user/profile")
        .add_header(AUTHORIZATION, bearer(&alice))
        .json(&json!({"email": "Bob@example.com"}))
        .await
        .assert_status(StatusCode::CONFLICT);
    app.server
        .put("/api/user/profile")
        .add_header(AUTHORIZATION, bearer(&alice))
        .json(&json!({"username": "BOB"}))
        .await
        .assert_status(StatusCode::CONFLICT);
    app.server
        .put("/api/user/profile")
        .add_header(AUTHORIZATION, bearer(&alice))
        .json(&json!({}))
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    let updated = app
        .server
        .put("/api/user/profile")
        .add_header(AUTHORIZATION, bearer(&alice))
        .json(&json!({"username": "alicia", "email": "alicia@example.com"}))
        .await;
    updated.assert_status_ok();
    let body: Value = updated.json();
    assert_eq!(body["username"], "alicia");
    assert_eq!(body["email"], "alicia@example.com");

    // Keeping the current email is not a conflict.
    app.server
        .put("/api/user/profile")
        .add_header(AUTHORIZATION, bearer(&alice))
        .json(&json!({"email": "alicia@example.com"}))
        .await
        .assert_status_ok();

    login(&app.server, "alicia@example.com", "password123")
        .await
        .assert_status_ok();
    app.server
        .put("/api/user/profile")
        .json(&json!({"username": "anon"}))
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_change_password() {
    let app = create_test_app().await;
    let alice = register(&app.server, "alice").await;

    let wrong = app
        .server
        .put("/api/user/password")
        .add_header(AUTHORIZATION, bearer(&alice))
        .json(&json!({"currentPassword": "not-it", "newPassword": "new-password"}))
        .await;
    wrong.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(wrong.json::<Value>()["error"]["message"], "Invalid current password");

    app.server
        .put("/api/user/password")
        .add_header(AUTHORIZATION, bearer(&alice))
        .json(&json!({"currentPassword": "password123", "newPassword": "abc"}))
        .await
        .assert_status(StatusCode::UNPROCESSABLE_ENTITY);

    app.server
        .put("/api/user/password")
        .add_header(AUTHORIZATION, bearer(&alice))
        .json(&json!({"currentPassword": "password123", "newPassword": "new-password"}))
        .await
        .assert_status_ok();

    login(&app.server, "alice", "password123")
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
    login(&app.server, "alice", "new-password")
        .await
        .assert_status_ok();
}

// ============================================================================
// Account administration
// ============================================================================

#[tokio::test]
async fn test_admin_changes_role() {
    let app = create_test_app().await;
    let admin = register(&app.server, "root").await;
    let alice = register(&app.server, "alice").await;
    let alice_id = app
        .server
        .get("/api/auth/me")
        .add_header(AUTHORIZATION, bearer(&alice))
        .await
        .json::<Value>()["id"]
        .as_i64()
        .unwrap();
    let admin_id = alice_id - 1;

    app.server
        .put(&format!("/api/admin/users/{alice_id}/role"))
        .add_header(AUTHORIZATION, bearer(&alice))
        .json(&json!({"role": "admin"}))
        .await
        .assert_status(StatusCode::FORBIDDEN);
    app.server
        .put(&format!("/api/admin/users/{alice_id}/role"))
        .add_header(AUTHORIZATION, bearer(&admin))
        .json(&json!({"role": "sysop"}))
        .await
        .assert_status(StatusCode::BAD_REQUEST);
    app.server
        .put(&format!("/api/admin/users/{admin_id}/role"))
        .add_header(AUTHORIZATION, bearer(&admin))
        .json(&json!({"role": "user"}))
        .await
        .assert_status(StatusCode::BAD_REQUEST);
    app.server
        .put("/api/admin/users/999/role")
        .add_header(AUTHORIZATION, bearer(&admin))
        .json(&json!({"role": "admin"}))
        .await
        .assert_status(StatusCode::NOT_FOUND);

    let promoted = app
        .server
        .put(&format!("/api/admin/users/{alice_id}/role"))
        .add_header(AUTHORIZATION, bearer(&admin))
        .json(&json!({"role": "admin"}))
        .await;
    promoted.assert_status_ok();
    assert_eq!(promoted.json::<Value>()["role"], "admin");

    // A fresh token carries the new role.
    let token = login(&app.server, "alice", "password123").await.json::<Value>()["token"]
        .as_str()
        .unwrap()
        .to_string();
    app.server
        .get("/api/admin/users")
        .add_header(AUTHORIZATION, bearer(&token))
        .await
        .assert_status_ok();
}

#[tokio::test]
async fn test_admin_deletes_user_with_files() {
    let app = create_test_app().await;
    let admin = register(&app.server, "root").await;
    let alice = register(&app.server, "alice").await;
    let alice_id = app
        .server
        .get("/api/auth/me")
        .add_header(AUTHORIZATION, bearer(&alice))
        .await
        .json::<Value>()["id"]
        .as_i64()
        .unwrap();

    // Alice is promoted so she can also upload into the admin's folder.
    app.server
        .put(&format!("/api/admin/users/{alice_id}/role"))
        .add_header(AUTHORIZATION, bearer(&admin))
        .json(&json!({"role": "admin"}))
        .await
        .assert_status_ok();
    let alice = login(&app.server, "alice", "password123").await.json::<Value>()["token"]
        .as_str()
        .unwrap()
        .to_string();

    let alice_folder = create_folder(&app.server, &alice, "alice-pics", true).await;
    let admin_folder = create_folder(&app.server, &admin, "root-pics", true).await;

    let mut urls = Vec::new();
    for (token, folder_id, seed) in [
        (&alice, alice_folder, 1),
        (&admin, alice_folder, 2),
        (&alice, admin_folder, 3),
    ] {
        let response = upload(
            &app.server,
            token,
            folder_id,
            MultipartForm::new().add_part("images", png_part("pic.png", seed)),
        )
        .await;
        response.assert_status(StatusCode::CREATED);
        let image = &response.json::<Value>()["newImages"][0];
        for field in ["url", "thumbnail_url", "preview_url"] {
            let url = image[field].as_str().unwrap();
            urls.push(url.strip_prefix("http://localhost").unwrap().to_string());
        }
    }

    app.server
        .delete(&format!("/api/admin/users/{alice_id}"))
        .add_header(AUTHORIZATION, bearer(&alice))
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    let deleted = app
        .server
        .delete(&format!("/api/admin/users/{alice_id}"))
        .add_header(AUTHORIZATION, bearer(&admin))
        .await;
    deleted.assert_status_ok();
    let body: Value = deleted.json();
    assert_eq!(body["folders_removed"], 1);
    assert_eq!(body["images_removed"], 3);

    for url in &urls {
        app.server.get(url).await.assert_status(StatusCode::NOT_FOUND);
    }

    // The admin's image in Alice's folder is reclaimed for the admin.
    let me = app
        .server
        .get("/api/auth/me")
        .add_header(AUTHORIZATION, bearer(&admin))
        .await;
    assert_eq!(me.json::<Value>()["storage_used"], 0);

    let remaining = app
        .server
        .get(&format!("/api/folders/{admin_folder}/images"))
        .add_header(AUTHORIZATION, bearer(&admin))
        .await;
    assert_eq!(remaining.json::<Value>().as_array().unwrap().len(), 0);
    app.server
        .get(&format!("/api/folders/{alice_folder}"))
        .add_header(AUTHORIZATION, bearer(&admin))
        .await
        .assert_status(StatusCode::NOT_FOUND);

    let users = app
        .server
        .get("/api/admin/users")
        .add_header(AUTHORIZATION, bearer(&admin))
        .await;
    assert_eq!(users.json::<Value>().as_array().unwrap().len(), 1);
    login(&app.server, "alice", "password123")
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
    app.server
        .delete(&format!("/api/admin/users/{alice_id}"))
        .add_header(AUTHORIZATION, bearer(&admin))
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_health() {
    let app = create_test_app().await;
    let response = app.server.get("/health").await;
    response.assert_status_ok();
    response.assert_text("OK");
}
