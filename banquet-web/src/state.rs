use std::sync::Arc;
use std::time::Duration;

use banquet_core::storage::{FsBlobStore, LibsqlStorage, Storage};
use banquet_core::{DatabaseLocation, DatabaseManager};

use crate::config::Config;
use crate::session::SessionStore;

#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<dyn Storage>,
    pub sessions: Arc<SessionStore>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(storage: Arc<dyn Storage>, config: Config) -> Self {
        let sessions = Arc::new(SessionStore::new(Duration::from_secs(config.session_ttl_secs)));
        Self {
            storage,
            sessions,
            config: Arc::new(config),
        }
    }

    /// Open the configured database, migrate it and wire up media storage.
    pub async fn from_config(config: Config) -> anyhow::Result<Self> {
        let storage = open_storage(&config).await?;
        Ok(Self::new(Arc::new(storage), config))
    }
}

/// Storage backed by the configured database and media directory, migrations applied.
pub async fn open_storage(config: &Config) -> anyhow::Result<LibsqlStorage> {
    let location = DatabaseLocation::from_url(&config.database_url, config.database_auth_token.clone());
    let db = DatabaseManager::open(location).await?;
    db.run_migrations().await?;

    std::fs::create_dir_all(&config.media_root)?;
    let blobs = FsBlobStore::new(config.media_root.clone());

    Ok(LibsqlStorage::new(Arc::new(db), Arc::new(blobs)))
}
