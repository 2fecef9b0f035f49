use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use bookspot_server::ingestion::IngestMode;
use bookspot_server::server::{run_server, RequestsLoggingLevel, ServerConfig};
use bookspot_server::{SqliteAdminStore, SqliteCatalogStore, StoreRegistry};

fn parse_path(s: &str) -> Result<PathBuf> {
    let path_buf = PathBuf::from(s);
    let original_path = match path_buf.canonicalize() {
        Ok(path) => path,
        Err(msg) => {
            if msg.kind() == std::io::ErrorKind::NotFound {
                path_buf
            } else {
                return Err(msg).with_context(|| format!("Error resolving path: {}", s));
            }
        }
    };
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(original_path))
}

#[derive(Parser, Debug)]
struct CliArgs {
    /// Path to the SQLite catalog database file.
    #[clap(value_parser = parse_path)]
    pub catalog_db: PathBuf,

    /// Path to the SQLite database file holding admin accounts and tokens.
    #[clap(value_parser = parse_path)]
    pub admin_db: PathBuf,

    /// Path to a TOML file listing the store spots. The built-in
    /// registry is used when omitted.
    #[clap(long, value_parser = parse_path)]
    pub registry_file: Option<PathBuf>,

    /// The port to listen on.
    #[clap(short, long, default_value_t = 3001)]
    pub port: u16,

    /// The level of logging to perform on each request.
    #[clap(long, default_value = "path")]
    pub logging_level: RequestsLoggingLevel,

    /// How many hours an issued session token stays valid.
    #[clap(long, default_value_t = 12)]
    pub session_ttl_hours: u64,

    /// Whether an upload appends to or replaces the store's catalog.
    #[clap(long, value_enum, default_value_t = IngestMode::Append)]
    pub ingest_mode: IngestMode,

    /// Maximum number of seconds to spend decoding an uploaded file.
    #[clap(long, default_value_t = 30)]
    pub decode_timeout_sec: u64,

    /// Maximum accepted upload size in bytes.
    #[clap(long, default_value_t = 20 * 1024 * 1024)]
    pub max_upload_bytes: usize,

    /// Interval in hours between expired-token pruning runs. Set to 0
    /// to disable pruning.
    #[clap(long, default_value_t = 1)]
    pub prune_interval_hours: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .unwrap();

    let registry = match &cli_args.registry_file {
        Some(path) => {
            info!("Loading store spot registry from {:?}...", path);
            Arc::new(StoreRegistry::from_toml_file(path)?)
        }
        None => Arc::new(StoreRegistry::with_defaults()),
    };
    info!("Serving {} store spots", registry.spots().len());

    info!("Opening catalog database at {:?}...", cli_args.catalog_db);
    let catalog_store = Arc::new(SqliteCatalogStore::open(&cli_args.catalog_db)?);

    info!("Opening admin database at {:?}...", cli_args.admin_db);
    let admin_store = Arc::new(SqliteAdminStore::open(&cli_args.admin_db)?);

    let session_ttl = Duration::from_secs(cli_args.session_ttl_hours * 60 * 60);

    // Expired tokens are refused at validation time regardless, pruning
    // just keeps the table from growing.
    if cli_args.prune_interval_hours > 0 {
        let pruning_store = admin_store.clone();
        let interval = Duration::from_secs(cli_args.prune_interval_hours * 60 * 60);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);

            // Skip the first immediate tick, wait for the first interval
            ticker.tick().await;

            loop {
                ticker.tick().await;
                match bookspot_server::AdminStore::prune_expired_tokens(
                    pruning_store.as_ref(),
                    session_ttl,
                ) {
                    Ok(count) => {
                        if count > 0 {
                            info!("Pruned {} expired session tokens", count);
                        }
                    }
                    Err(e) => {
                        error!("Failed to prune session tokens: {}", e);
                    }
                }
            }
        });
    }

    let config = ServerConfig {
        requests_logging_level: cli_args.logging_level,
        port: cli_args.port,
        session_ttl,
        ingest_mode: cli_args.ingest_mode,
        decode_timeout: Duration::from_secs(cli_args.decode_timeout_sec),
        max_upload_bytes: cli_args.max_upload_bytes,
    };

    info!("Ready to serve at port {}!", config.port);
    run_server(config, registry, catalog_store, admin_store).await
}
