use super::RequestsLoggingLevel;
use crate::ingestion::IngestMode;
use std::time::Duration;

#[derive(Clone)]
pub struct ServerConfig {
    pub requests_logging_level: RequestsLoggingLevel,
    pub port: u16,
    /// How long an issued session token stays valid.
    pub session_ttl: Duration,
    /// How an uploaded batch is applied to the existing catalog.
    pub ingest_mode: IngestMode,
    /// Upper bound on spreadsheet decoding time.
    pub decode_timeout: Duration,
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            requests_logging_level: RequestsLoggingLevel::Path,
            port: 3001,
            session_ttl: Duration::from_secs(12 * 60 * 60),
            ingest_mode: IngestMode::Append,
            decode_timeout: Duration::from_secs(30),
            max_upload_bytes: 20 * 1024 * 1024,
        }
    }
}
