use std::sync::Arc;

use libsql::{Builder, Connection, Database as LibSqlDatabase};
use thiserror::Error;

use crate::config::{DatabaseConfig, is_remote_url};

#[derive(Clone)]
pub struct Database {
    inner: Arc<LibSqlDatabase>,
    remote: bool,
}

#[derive(Error, Debug)]
pub enum DbError {
    #[error("failed to build database: {0}")]
    Build(libsql::Error),
    #[error("failed to open connection: {0}")]
    Connect(libsql::Error),
    #[error("failed to execute statement: {0}")]
    Statement(libsql::Error),
    #[error("missing auth token for remote database")]
    MissingAuthToken,
}

impl Database {
    pub async fn new(config: &DatabaseConfig) -> Result<Self, DbError> {
        let remote = is_remote_url(&config.url);
        let inner = if remote {
            let auth_token = config
                .auth_token
                .clone()
                .filter(|token| !token.is_empty())
                .ok_or(DbError::MissingAuthToken)?;

            Builder::new_remote(config.url.clone(), auth_token)
                .build()
                .await
        } else {
            Builder::new_local(config.url.clone()).build().await
        }
        .map_err(DbError::Build)?;

        Ok(Self {
            inner: Arc::new(inner),
            remote,
        })
    }

    /// Opens a fresh connection. Each request gets its own.
    pub async fn connection(&self) -> Result<Connection, DbError> {
        let conn = self.inner.connect().map_err(DbError::Connect)?;
        if !self.remote {
            // Concurrent imports wait on the file lock instead of failing fast.
            conn.query("PRAGMA busy_timeout = 5000", ())
                .await
                .map_err(DbError::Statement)?;
        }
        Ok(conn)
    }

    pub fn is_remote(&self) -> bool {
        self.remote
    }

    pub async fn health_check(&self) -> Result<(), DbError> {
        let conn = self.connection().await?;
        let mut rows = conn
            .query("SELECT 1", ())
            .await
            .map_err(DbError::Statement)?;
        let _ = rows.next().await.map_err(DbError::Statement)?;
        Ok(())
    }

    /// SQLite version reported by the engine behind the connection.
    pub async fn server_version(&self) -> Result<String, DbError> {
        let conn = self.connection().await?;
        let mut rows = conn
            .query("SELECT sqlite_version()", ())
            .await
            .map_err(DbError::Statement)?;
        match rows.next().await.map_err(DbError::Statement)? {
            Some(row) => row.get::<String>(0).map_err(DbError::Statement),
            None => Ok(String::from("unknown")),
        }
    }
}
