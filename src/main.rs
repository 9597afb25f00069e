use std::path::PathBuf;
use std::process::ExitCode;

use tracing::{error, info};

use imgshelf::db::SettingRepository;
use imgshelf::quota::QuotaLedger;
use imgshelf::storage::build_backend;
use imgshelf::web::WebServer;
use imgshelf::{Config, Database};

#[tokio::main]
async fn main() -> ExitCode {
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    // Load configuration
    let mut config = match Config::load(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load {}: {e}", config_path.display());
            eprintln!("Using default configuration.");
            Config::default()
        }
    };
    config.apply_env_overrides();

    // Initialize logging
    if let Err(e) = imgshelf::logging::init(&config.logging) {
        eprintln!("Failed to initialize logging: {e}");
        // Fall back to console-only logging
        imgshelf::logging::init_console_only(&config.logging.level);
    }

    if let Err(e) = config.validate() {
        error!("Invalid configuration: {}", e);
        return ExitCode::FAILURE;
    }

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Server error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(config: Config) -> imgshelf::Result<()> {
    info!("imgshelf {}", env!("CARGO_PKG_VERSION"));

    let db = Database::open(&config.database.path).await?;
    info!(
        path = %config.database.path,
        schema_version = db.schema_version().await?,
        "Database ready"
    );

    SettingRepository::new(db.pool())
        .seed_defaults(&config.upload)
        .await?;

    QuotaLedger::new(db.pool()).clear_stale_reservations().await?;

    let storage = build_backend(&config.storage).await?;

    let server = WebServer::new(&config, db, storage)?;
    info!("Server configured on {}", server.addr());
    server.run().await?;
    Ok(())
}
