//! Service index plus the health and maintenance endpoints.

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use rulelib_core::config::redact_database_url;
use rulelib_core::{
    Database, RULE_TABLE, RedactedConfig, RuleRepository, ensure_schema, table_exists,
};
use serde::Serialize;
use serde_json::json;

use super::ApiError;
use crate::AppState;

const ENDPOINTS: [(&str, &str, &str); 9] = [
    ("GET", "/", "service index"),
    ("GET", "/download_template", "download the rule spreadsheet template"),
    ("POST", "/upload", "import rules from an Excel file (field `file`)"),
    ("GET", "/view_data", "list stored rules (`limit`, `order`)"),
    ("GET", "/health", "database and table status"),
    ("GET", "/test_db", "database connectivity check"),
    ("GET", "/init_db", "create the rule table if missing"),
    ("POST", "/clear_data", "delete every stored rule"),
    ("GET", "/config_info", "non-secret configuration"),
];

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/test_db", get(test_db))
        .route("/init_db", get(init_db))
        .route("/clear_data", post(clear_data))
        .route("/config_info", get(config_info))
}

async fn index(State(state): State<AppState>) -> impl IntoResponse {
    let endpoints: Vec<_> = ENDPOINTS
        .iter()
        .map(|(method, path, description)| {
            json!({ "method": method, "path": path, "description": description })
        })
        .collect();

    Json(json!({
        "service": state.config.app.service_name,
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": endpoints,
    }))
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    database: &'static str,
    table_exists: bool,
    record_count: i64,
}

/// GET /health
///
/// A missing table is still healthy; the count is only taken once it exists.
async fn health(State(state): State<AppState>) -> impl IntoResponse {
    match table_snapshot(&state.db).await {
        Ok((table_exists, record_count)) => (
            StatusCode::OK,
            Json(HealthResponse {
                status: "healthy",
                database: "connected",
                table_exists,
                record_count,
            }),
        )
            .into_response(),
        Err(message) => {
            tracing::error!("health check failed: {}", message);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "status": "unhealthy",
                    "database": "disconnected",
                    "error": message,
                })),
            )
                .into_response()
        }
    }
}

async fn table_snapshot(db: &Database) -> Result<(bool, i64), String> {
    db.health_check().await.map_err(|err| err.to_string())?;
    if !table_exists(db).await.map_err(|err| err.to_string())? {
        return Ok((false, 0));
    }
    let count = RuleRepository::new(db.clone())
        .count()
        .await
        .map_err(|err| err.to_string())?;
    Ok((true, count))
}

/// GET /test_db
///
/// Plain-text connectivity check for operators. The URL is shown without
/// credentials.
async fn test_db(State(state): State<AppState>) -> impl IntoResponse {
    match state.db.server_version().await {
        Ok(version) => {
            let location = if state.db.is_remote() {
                "remote"
            } else {
                "local"
            };
            (
                StatusCode::OK,
                format!(
                    "Database connection OK\nSQLite version: {version}\nDatabase: {} ({location})",
                    redact_database_url(&state.config.database.url)
                ),
            )
        }
        Err(err) => {
            tracing::error!("database connectivity test failed: {}", err);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Database connection failed: {err}"),
            )
        }
    }
}

#[derive(Debug, Serialize)]
struct InitResponse {
    message: String,
    table_exists: bool,
}

async fn init_db(State(state): State<AppState>) -> Result<Json<InitResponse>, ApiError> {
    ensure_schema(&state.db).await?;
    let exists = table_exists(&state.db).await?;
    tracing::info!(table = RULE_TABLE, "rule table initialized");

    Ok(Json(InitResponse {
        message: format!("Table {RULE_TABLE} is ready"),
        table_exists: exists,
    }))
}

#[derive(Debug, Serialize)]
struct ClearResponse {
    success: bool,
    message: String,
    deleted_count: u64,
}

/// POST /clear_data
///
/// Deletes every stored rule. There is no undo.
async fn clear_data(State(state): State<AppState>) -> Result<Json<ClearResponse>, ApiError> {
    let deleted_count = RuleRepository::new(state.db.clone()).truncate().await?;
    tracing::warn!(deleted_count, "cleared rule table");

    Ok(Json(ClearResponse {
        success: true,
        message: format!("Deleted {deleted_count} rules"),
        deleted_count,
    }))
}

async fn config_info(State(state): State<AppState>) -> Json<RedactedConfig> {
    Json(state.config.redacted())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{bare_state, json_body, ready_state};
    use axum::body::to_bytes;
    use rulelib_core::Rule;

    fn rule(id: &str) -> Rule {
        Rule {
            rule_id: id.to_string(),
            rule_name: format!("Rule {id}"),
            trigger_type: "keyword".into(),
            trigger_content: "hello".into(),
            response_type: "text".into(),
            response_content: "Hi".into(),
            priority: 1,
            enabled: true,
            category: String::new(),
            tags: String::new(),
            created_time: None,
            updated_time: None,
        }
    }

    #[tokio::test]
    async fn index_lists_every_route() {
        let (state, _dir) = bare_state().await;
        let body = json_body(index(State(state)).await.into_response()).await;

        assert_eq!(body["service"], "rulelib");
        let paths: Vec<&str> = body["endpoints"]
            .as_array()
            .expect("endpoints")
            .iter()
            .filter_map(|endpoint| endpoint["path"].as_str())
            .collect();
        assert!(paths.contains(&"/upload"));
        assert!(paths.contains(&"/clear_data"));
        assert_eq!(paths.len(), ENDPOINTS.len());
    }

    #[tokio::test]
    async fn health_reports_missing_table_as_healthy() {
        let (state, _dir) = bare_state().await;
        let response = health(State(state)).await.into_response();
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["table_exists"], false);
        assert_eq!(body["record_count"], 0);
    }

    #[tokio::test]
    async fn health_counts_records_once_table_exists() {
        let (state, _dir) = ready_state().await;
        let repo = RuleRepository::new(state.db.clone());
        repo.upsert(&rule("R001")).await.expect("upsert");
        repo.upsert(&rule("R002")).await.expect("upsert");

        let body = json_body(health(State(state)).await.into_response()).await;
        assert_eq!(body["database"], "connected");
        assert_eq!(body["table_exists"], true);
        assert_eq!(body["record_count"], 2);
    }

    #[tokio::test]
    async fn test_db_reports_sqlite_version_as_text() {
        let (state, _dir) = bare_state().await;
        let response = test_db(State(state)).await.into_response();
        assert_eq!(response.status(), StatusCode::OK);

        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        let text = String::from_utf8(body.to_vec()).expect("utf8");
        assert!(text.starts_with("Database connection OK"));
        assert!(text.contains("SQLite version: 3"));
        assert!(text.contains("rules.sqlite (local)"));
        assert!(!text.contains("token-should-not-leak"));
    }

    #[tokio::test]
    async fn init_db_creates_table_and_is_repeatable() {
        let (state, _dir) = bare_state().await;
        assert!(!table_exists(&state.db).await.expect("lookup"));

        for _ in 0..2 {
            let response = init_db(State(state.clone())).await.into_response();
            assert_eq!(response.status(), StatusCode::OK);
            let body = json_body(response).await;
            assert_eq!(body["table_exists"], true);
        }
        assert!(table_exists(&state.db).await.expect("lookup"));
    }

    #[tokio::test]
    async fn clear_data_deletes_everything_and_reports_count() {
        let (state, _dir) = ready_state().await;
        let repo = RuleRepository::new(state.db.clone());
        for id in ["R001", "R002", "R003"] {
            repo.upsert(&rule(id)).await.expect("upsert");
        }

        let body = json_body(clear_data(State(state)).await.into_response()).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["deleted_count"], 3);
        assert_eq!(repo.count().await.expect("count"), 0);
    }

    #[tokio::test]
    async fn config_info_never_leaks_secrets() {
        let (state, _dir) = bare_state().await;
        let response = config_info(State(state)).await.into_response();
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        let text = String::from_utf8(body.to_vec()).expect("utf8");

        assert!(!text.contains("token-should-not-leak"));
        assert!(!text.contains("session-secret"));

        let json: serde_json::Value = serde_json::from_str(&text).expect("json");
        assert_eq!(json["db_auth_token_set"], true);
        assert_eq!(json["secret_key_set"], true);
        assert_eq!(json["max_content_length_mb"], 1.0);
    }
}
