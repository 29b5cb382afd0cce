use libsql::params;
use thiserror::Error;

use crate::db::{Database, DbError};

pub const RULE_TABLE: &str = "rulelibtable";

const RULE_TABLE_SQL: &str = include_str!("../../../migrations/001_rulelibtable.sql");

#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("database error: {0}")]
    Database(#[from] DbError),
    #[error("schema statement failed: {0}")]
    LibSql(#[from] libsql::Error),
}

async fn apply_schema(conn: &libsql::Connection, sql: &str) -> Result<(), SchemaError> {
    let tx = conn.transaction().await?;
    tx.execute_batch(sql).await?;
    tx.commit().await?;
    Ok(())
}

/// Creates the rule table and its listing index when absent. Safe to call on
/// every startup and from the admin endpoint.
pub async fn ensure_schema(db: &Database) -> Result<(), SchemaError> {
    let conn = db.connection().await?;
    apply_schema(&conn, RULE_TABLE_SQL).await
}

pub async fn table_exists(db: &Database) -> Result<bool, SchemaError> {
    let conn = db.connection().await?;
    let mut rows = conn
        .query(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?1",
            params![RULE_TABLE],
        )
        .await?;
    Ok(rows.next().await?.is_some())
}
