use crate::common::error::{BanquetError, Result};
use libsql::{Builder, Connection, Database};
use std::path::PathBuf;
use tracing::info;

/// Where the relational store lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseLocation {
    /// SQLite file on local disk.
    Local(PathBuf),
    /// Networked libSQL / Turso server.
    Remote { url: String, auth_token: String },
}

impl DatabaseLocation {
    /// `libsql://`, `http(s)://` and `ws(s)://` URLs are remote; anything else is a file path.
    pub fn from_url(url: &str, auth_token: Option<String>) -> Self {
        let is_remote = ["libsql://", "https://", "http://", "wss://", "ws://"]
            .iter()
            .any(|scheme| url.starts_with(scheme));
        if is_remote {
            DatabaseLocation::Remote {
                url: url.to_string(),
                auth_token: auth_token.unwrap_or_default(),
            }
        } else {
            DatabaseLocation::Local(PathBuf::from(url.trim_start_matches("file:")))
        }
    }

    fn describe(&self) -> String {
        match self {
            DatabaseLocation::Local(path) => format!("local database {}", path.display()),
            DatabaseLocation::Remote { url, .. } => format!("remote database at {url}"),
        }
    }
}

pub struct DatabaseManager {
    db: Database,
    location: DatabaseLocation,
}

impl DatabaseManager {
    /// Open (or create) the database described by `location`
    pub async fn open(location: DatabaseLocation) -> Result<Self> {
        info!("Connecting to {}", location.describe());

        let db = match &location {
            DatabaseLocation::Local(path) => {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    std::fs::create_dir_all(parent)?;
                }
                Builder::new_local(path).build().await
            }
            DatabaseLocation::Remote { url, auth_token } => {
                Builder::new_remote(url.clone(), auth_token.clone()).build().await
            }
        }
        .map_err(|e| BanquetError::database("Failed to connect to database", e))?;

        Ok(Self { db, location })
    }

    pub fn location(&self) -> &DatabaseLocation {
        &self.location
    }

    /// Get a connection with foreign key enforcement switched on
    pub async fn get_connection(&self) -> Result<Connection> {
        let conn = self
            .db
            .connect()
            .map_err(|e| BanquetError::database("Failed to get database connection", e))?;

        conn.execute("PRAGMA foreign_keys = ON", ())
            .await
            .map_err(|e| BanquetError::database("Failed to enable foreign keys", e))?;

        Ok(conn)
    }

    /// Run database migrations
    pub async fn run_migrations(&self) -> Result<()> {
        info!("Running database migrations...");

        let conn = self.get_connection().await?;
        let migration_sql = include_str!("../migrations/001_initial_schema.sql");

        conn.execute_batch(migration_sql)
            .await
            .map_err(|e| BanquetError::database("Failed to run migrations", e))?;

        info!("Database migrations completed successfully");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_from_url() {
        assert_eq!(
            DatabaseLocation::from_url("db.sqlite3", None),
            DatabaseLocation::Local(PathBuf::from("db.sqlite3"))
        );
        assert_eq!(
            DatabaseLocation::from_url("file:data/banquet.db", None),
            DatabaseLocation::Local(PathBuf::from("data/banquet.db"))
        );
        assert_eq!(
            DatabaseLocation::from_url("libsql://banquet-org.turso.io", Some("tok".to_string())),
            DatabaseLocation::Remote {
                url: "libsql://banquet-org.turso.io".to_string(),
                auth_token: "tok".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_migrations_are_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let manager = DatabaseManager::open(DatabaseLocation::Local(dir.path().join("test.db")))
            .await
            .unwrap();

        manager.run_migrations().await.unwrap();
        manager.run_migrations().await.unwrap();

        let conn = manager.get_connection().await.unwrap();
        let mut rows = conn
            .query(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name IN \
                 ('users', 'venue_listings', 'venue_images', 'call_requests', 'contact_messages')",
                (),
            )
            .await
            .unwrap();
        let row = rows.next().await.unwrap().unwrap();
        assert_eq!(row.get::<i64>(0).unwrap(), 5);
    }
}
