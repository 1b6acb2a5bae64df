use std::sync::Arc;

use persona_store::{DurableProfileStore, InMemoryProfileStore, ProfileStore};
use persona_tracker::ProfileService;
use tokio::net::TcpListener;

use crate::auth::{AuthProvider, StaticTokenAuth};
use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::handler::AppState;
use crate::router::build_router;

/// Persona profile server.
pub struct PersonaServer {
    config: ServerConfig,
    auth: Arc<dyn AuthProvider>,
}

impl PersonaServer {
    /// A server authenticating against the config's token table.
    pub fn new(config: ServerConfig) -> Self {
        let auth = Arc::new(StaticTokenAuth::new(config.tokens.clone()));
        Self { config, auth }
    }

    pub fn with_auth(mut self, auth: Arc<dyn AuthProvider>) -> Self {
        self.auth = auth;
        self
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Open the configured store: durable when `data_dir` is set.
    pub fn open_store(&self) -> ServerResult<Arc<dyn ProfileStore>> {
        match &self.config.data_dir {
            Some(dir) => {
                let store = DurableProfileStore::open(dir, self.config.wal_config())?;
                Ok(Arc::new(store))
            }
            None => {
                tracing::warn!("no data_dir configured; profiles are kept in memory only");
                Ok(Arc::new(InMemoryProfileStore::new()))
            }
        }
    }

    pub fn state(&self) -> ServerResult<AppState> {
        let service = ProfileService::new(self.open_store()?, self.config.retry_policy());
        Ok(AppState {
            service,
            auth: Arc::clone(&self.auth),
            config: Arc::new(self.config.clone()),
        })
    }

    /// Build the router (useful for testing).
    pub fn router(&self) -> ServerResult<axum::Router> {
        Ok(build_router(self.state()?))
    }

    /// Start serving requests until ctrl-c or SIGTERM.
    pub async fn serve(self) -> ServerResult<()> {
        let app = self.router()?;
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        tracing::info!(addr = %self.config.bind_addr, "persona server listening");
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| ServerError::Internal(e.to_string()))
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("received shutdown signal, starting graceful shutdown");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_construction() {
        let server = PersonaServer::new(ServerConfig::default());
        assert_eq!(server.config().bind_addr, "127.0.0.1:8080".parse().unwrap());
    }

    #[test]
    fn in_memory_store_without_data_dir() {
        let server = PersonaServer::new(ServerConfig::default());
        let store = server.open_store().unwrap();
        assert!(store.list_by_owner("anyone").unwrap().is_empty());
    }

    #[test]
    fn durable_store_with_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let config = ServerConfig {
            data_dir: Some(dir.path().join("data")),
            ..ServerConfig::default()
        };
        let server = PersonaServer::new(config);
        let _router = server.router().unwrap();
        assert!(dir.path().join("data").join(persona_store::durable::WAL_FILE_NAME).exists());
    }
}
