//! Router configuration for Web API.

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use std::path::Path;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use super::handlers::{
    admin_delete_user, admin_list_settings, admin_list_users, admin_update_role,
    admin_update_setting, admin_update_storage_limit, change_password, create_folder,
    delete_folder, delete_image, download_folder, download_images, get_folder, get_profile,
    get_user_settings, list_folder_images, list_folders, list_public_folders, login, me,
    register, update_folder, update_profile, upload_images, AppState,
};
use super::middleware::{create_cors_layer, jwt_auth, JwtState};

/// Create the main API router.
pub fn create_router(
    app_state: Arc<AppState>,
    jwt_state: Arc<JwtState>,
    cors_origins: &[String],
    max_request_bytes: usize,
) -> Router {
    let auth_routes = Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/me", get(me));

    let user_routes = Router::new()
        .route("/profile", get(get_profile).put(update_profile))
        .route("/password", put(change_password));

    let folder_routes = Router::new()
        .route("/", get(list_folders).post(create_folder))
        .route("/public", get(list_public_folders))
        .route(
            "/:id",
            get(get_folder).put(update_folder).delete(delete_folder),
        )
        .route("/:id/images", get(list_folder_images))
        .route("/:id/download", get(download_folder));

    let image_routes = Router::new()
        .route(
            "/upload/:folder_id",
            post(upload_images).layer(DefaultBodyLimit::max(max_request_bytes)),
        )
        .route("/download/bulk", post(download_images))
        .route("/:id", delete(delete_image));

    let admin_routes = Router::new()
        .route("/users", get(admin_list_users))
        .route("/users/:id", delete(admin_delete_user))
        .route("/users/:id/role", put(admin_update_role))
        .route("/users/:id/storage-limit", put(admin_update_storage_limit))
        .route(
            "/settings",
            get(admin_list_settings).put(admin_update_setting),
        );

    let api_routes = Router::new()
        .nest("/auth", auth_routes)
        .nest("/user", user_routes)
        .nest("/folders", folder_routes)
        .nest("/images", image_routes)
        .route("/settings", get(get_user_settings))
        .nest("/admin", admin_routes);

    let jwt_state_for_middleware = jwt_state.clone();

    Router::new()
        .nest("/api", api_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(create_cors_layer(cors_origins))
                .layer(middleware::from_fn(move |req, next| {
                    let state = jwt_state_for_middleware.clone();
                    jwt_auth(state, req, next)
                })),
        )
        .with_state(app_state)
}

/// Create a health check router.
pub fn create_health_router() -> Router {
    Router::new().route("/health", get(health_check))
}

/// Health check handler.
async fn health_check() -> &'static str {
    "OK"
}

/// Serve the local storage root under `/uploads`.
pub fn create_uploads_router(root: &Path) -> Router {
    Router::new().nest_service("/uploads", ServeDir::new(root))
}
