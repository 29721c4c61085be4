//! Web server for Parley.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;

use crate::config::Config;
use crate::db::Database;
use crate::{ChatError, Result};

use super::handlers::AppState;
use super::middleware::AuthState;
use super::router::{create_health_router, create_router};

/// Web server for the chat API.
pub struct WebServer {
    /// Server address.
    addr: SocketAddr,
    /// Application state.
    app_state: Arc<AppState>,
    /// Auth state.
    auth_state: Arc<AuthState>,
    /// Allowed CORS origins.
    cors_origins: Vec<String>,
}

impl WebServer {
    /// Create a new web server.
    pub fn new(config: &Config, db: Database) -> Result<Self> {
        let addr = format!("{}:{}", config.server.host, config.server.port)
            .parse()
            .map_err(|e| ChatError::Config(format!("invalid server address: {e}")))?;

        let app_state = Arc::new(AppState::new(db, &config.auth, config.chat.clone()));
        let auth_state = Arc::new(AuthState::new(
            &config.auth.jwt_secret,
            config.auth.token_cookie.clone(),
        ));

        Ok(Self {
            addr,
            app_state,
            auth_state,
            cors_origins: config.server.cors_origins.clone(),
        })
    }

    /// Get the server address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    fn build_router(&self) -> axum::Router {
        create_router(
            self.app_state.clone(),
            self.auth_state.clone(),
            &self.cors_origins,
        )
        .merge(create_health_router())
    }

    /// Run the web server.
    pub async fn run(self) -> std::io::Result<()> {
        let router = self.build_router();

        let listener = TcpListener::bind(self.addr).await?;
        let local_addr = listener.local_addr()?;
        tracing::info!("Web server listening on http://{}", local_addr);

        axum::serve(listener, router).await
    }

    /// Run the server in the background and return the actual bound address.
    ///
    /// This is useful for testing when binding to port 0.
    pub async fn run_with_addr(self) -> std::io::Result<SocketAddr> {
        let router = self.build_router();

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

    #[tokio::test]
    async fn test_server_binds_random_port() {
        let mut config = Config::default();
        config.server.host = "127.0.0.1".to_string();
        config.server.port = 0;
        config.auth.jwt_secret = "test-secret".to_string();

        let db = Database::open_in_memory().await.unwrap();
        let server = WebServer::new(&config, db).unwrap();
        let addr = server.run_with_addr().await.unwrap();
        assert_ne!(addr.port(), 0);
    }

    #[tokio::test]
    async fn test_invalid_address_rejected() {
        let mut config = Config::default();
        config.server.host = "not an address".to_string();

        let db = Database::open_in_memory().await.unwrap();
        assert!(WebServer::new(&config, db).is_err());
    }
}
