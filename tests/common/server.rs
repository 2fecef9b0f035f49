//! Test server lifecycle management.
//!
//! Each test gets an isolated server on a random port with its own
//! temp-file databases and two provisioned admin accounts.

use super::constants::*;
use bookspot_server::server::{make_app, RequestsLoggingLevel, ServerConfig};
use bookspot_server::{AuthService, SqliteAdminStore, SqliteCatalogStore, StoreRegistry};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::TcpListener;

pub struct TestServer {
    /// Base URL for making requests, e.g. "http://127.0.0.1:12345".
    pub base_url: String,

    pub port: u16,

    /// Direct store access for seeding and assertions.
    pub catalog_store: Arc<SqliteCatalogStore>,
    pub admin_store: Arc<SqliteAdminStore>,

    // Keep resources alive until drop.
    _temp_dir: TempDir,
    _shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl TestServer {
    pub async fn spawn() -> Self {
        Self::spawn_with_config(ServerConfig::default()).await
    }

    pub async fn spawn_with_config(config: ServerConfig) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");

        let catalog_store = Arc::new(
            SqliteCatalogStore::open(&temp_dir.path().join("catalog.db"))
                .expect("Failed to open test catalog db"),
        );
        let admin_store = Arc::new(
            SqliteAdminStore::open(&temp_dir.path().join("admin.db"))
                .expect("Failed to open test admin db"),
        );

        // Provision the two admin accounts through the same service the
        // cli-auth binary uses.
        let provisioning =
            AuthService::new(admin_store.clone(), config.session_ttl).expect("auth service");
        provisioning
            .create_account(SCH_ADMIN, SCH_PASS, SCH_SPOT)
            .expect("Failed to provision sch admin");
        provisioning
            .create_account(SUNMOON_ADMIN, SUNMOON_PASS, SUNMOON_SPOT)
            .expect("Failed to provision sunmoon admin");

        let app = make_app(
            config,
            Arc::new(StoreRegistry::with_defaults()),
            catalog_store.clone(),
            admin_store.clone(),
        )
        .expect("Failed to build test app");

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind test port");
        let port = listener.local_addr().unwrap().port();
        let base_url = format!("http://127.0.0.1:{}", port);

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .expect("Test server failed");
        });

        // Give the accept loop a moment before the first request.
        tokio::time::sleep(Duration::from_millis(20)).await;

        TestServer {
            base_url,
            port,
            catalog_store,
            admin_store,
            _temp_dir: temp_dir,
            _shutdown_tx: Some(shutdown_tx),
        }
    }
}
