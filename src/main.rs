use tracing::info;

use parley::config::Config;
use parley::db::Database;
use parley::web::WebServer;

#[tokio::main]
async fn main() -> std::process::ExitCode {
    // Load configuration
    let config = match Config::load_with_env("config.toml") {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load config.toml: {e}");
            eprintln!("Using default configuration.");
            let mut config = Config::default();
            config.apply_env_overrides();
            config
        }
    };

    if let Err(e) = config.validate() {
        eprintln!("Invalid configuration: {e}");
        return std::process::ExitCode::FAILURE;
    }

    // Initialize logging
    if let Err(e) = parley::logging::init(&config.logging) {
        eprintln!("Failed to initialize logging: {e}");
        // Fall back to console-only logging
        parley::logging::init_console_only(&config.logging.level);
    }

    info!("Parley chat server");

    let db = match Database::open(&config.database.path).await {
        Ok(db) => db,
        Err(e) => {
            tracing::error!("Failed to open database: {}", e);
            return std::process::ExitCode::FAILURE;
        }
    };

    let server = match WebServer::new(&config, db) {
        Ok(server) => server,
        Err(e) => {
            tracing::error!("Failed to configure server: {}", e);
            return std::process::ExitCode::FAILURE;
        }
    };

    if let Err(e) = server.run().await {
        tracing::error!("Server error: {}", e);
        return std::process::ExitCode::FAILURE;
    }

    std::process::ExitCode::SUCCESS
}
