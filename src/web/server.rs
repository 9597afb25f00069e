//! Web server for imgshelf.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;

use crate::config::{Config, StorageKind};
use crate::storage::SharedStorage;
use crate::{Database, Result, ShelfError};

use super::handlers::AppState;
use super::middleware::JwtState;
use super::router::{create_health_router, create_router, create_uploads_router};

/// Web server for the API.
pub struct WebServer {
    /// Server address.
    addr: SocketAddr,
    /// Application state.
    app_state: Arc<AppState>,
    /// JWT state.
    jwt_state: Arc<JwtState>,
    /// CORS allowed origins.
    cors_origins: Vec<String>,
    /// Body limit of upload requests.
    max_request_bytes: usize,
    /// Local storage root served under `/uploads`, if enabled.
    uploads_root: Option<PathBuf>,
}

impl WebServer {
    /// Create a new web server.
    pub fn new(config: &Config, db: Database, storage: SharedStorage) -> Result<Self> {
        let addr = format!("{}:{}", config.web.host, config.web.port)
            .parse()
            .map_err(|e| ShelfError::Config(format!("invalid web server address: {e}")))?;

        let uploads_root = (config.storage.backend == StorageKind::Local
            && config.web.serve_uploads)
            .then(|| PathBuf::from(&config.storage.local_path));

        Ok(Self {
            addr,
            app_state: Arc::new(AppState::new(db, storage, config)),
            jwt_state: Arc::new(JwtState::new(&config.web.jwt_secret)),
            cors_origins: config.web.cors_origins.clone(),
            max_request_bytes: config.upload.max_request_bytes,
            uploads_root,
        })
    }

    /// Get the server address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Build the complete application router.
    pub fn router(&self) -> Router {
        let mut router = create_router(
            self.app_state.clone(),
            self.jwt_state.clone(),
            &self.cors_origins,
            self.max_request_bytes,
        )
        .merge(create_health_router());

        if let Some(root) = &self.uploads_root {
            router = router.merge(create_uploads_router(root));
        }
        router
    }

    /// Run the web server.
    pub async fn run(self) -> std::result::Result<(), std::io::Error> {
        let router = self.router();
        let listener = TcpListener::bind(self.addr).await?;
        tracing::info!("Web server listening on http://{}", listener.local_addr()?);

        axum::serve(listener, router).await
    }

    /// Run the server in the background and return the actual bound address.
    ///
    /// This is useful for testing when binding to port 0.
    pub async fn run_with_addr(self) -> std::result::Result<SocketAddr, std::io::Error> {
        let router = self.router();
        let listener = TcpListener::bind(self.addr).await?;
        let local_addr = listener.local_addr()?;
        tracing::info!("Web server listening on http://{}", local_addr);

        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router).await {
                tracing::error!("Web server error: {}", e);
            }
        });

        Ok(local_addr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::LocalStorage;
    use tempfile::TempDir;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    fn test_config(dir: &TempDir) -> Config {
        let mut config = Config::default();
        config.web.host = "127.0.0.1".to_string();
        config.web.port = 0;
        config.web.jwt_secret = "test-secret-key".to_string();
        config.storage.local_path = dir.path().to_string_lossy().into_owned();
        config
    }

    async fn server(config: &Config, dir: &TempDir) -> WebServer {
        let db = Database::open_in_memory().await.unwrap();
        let storage: SharedStorage =
            Arc::new(LocalStorage::new(dir.path(), "http://localhost/uploads").unwrap());
        WebServer::new(config, db, storage).unwrap()
    }

    #[tokio::test]
    async fn test_web_server_new() {
        let dir = TempDir::new().unwrap();
        let server = server(&test_config(&dir), &dir).await;
        assert_eq!(server.addr().ip().to_string(), "127.0.0.1");
        assert!(server.uploads_root.is_some());
    }

    #[tokio::test]
    async fn test_invalid_address() {
        let dir = TempDir::new().unwrap();
        let mut config = test_config(&dir);
        config.web.host = "not an address".to_string();

        let db = Database::open_in_memory().await.unwrap();
        let storage: SharedStorage =
            Arc::new(LocalStorage::new(dir.path(), "http://localhost/uploads").unwrap());
        assert!(matches!(
            WebServer::new(&config, db, storage),
            Err(ShelfError::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_web_server_run() {
        let dir = TempDir::new().unwrap();
        let server = server(&test_config(&dir), &dir).await;
        let addr = server.run_with_addr().await.unwrap();

        let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(b"GET /health HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
            .await
            .unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();

        assert!(response.starts_with("HTTP/1.1 200"));
        assert!(response.ends_with("OK"));
    }
}
