//! REST transport for the sync engine and the wiring that stands one up
//! from a config file.

pub mod client;
pub mod config;
pub mod response;

pub use client::HttpRemoteClient;
pub use config::{RemoteConfig, SyncConfig};

use inspectsync_engine::{EngineError, SyncEngine};
use inspectsync_storage::SqliteStorage;
use tracing::info;

/// The production engine: SQLite drafts and list cache, HTTP remote.
pub type HttpSyncEngine = SyncEngine<SqliteStorage, HttpRemoteClient>;

/// Open the local database and build an engine against the configured
/// remote.
pub fn connect(config: &SyncConfig) -> Result<HttpSyncEngine, EngineError> {
    let storage = SqliteStorage::open(&config.database_path)?;
    let client = HttpRemoteClient::new(config.remote.clone())?;
    let engine = SyncEngine::new(storage, client, config.engine.clone())?;
    info!(
        database = %config.database_path,
        remote = %config.remote.base_url,
        "sync engine ready"
    );
    Ok(engine)
}
