use std::{env, net::SocketAddr, sync::Arc};

use axum::{Router, extract::DefaultBodyLimit};
use rulelib_core::{Config, Database, RULE_TABLE, ensure_schema, init_telemetry};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

mod api;

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub config: Arc<Config>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
    let config = Config::load(&config_path)?;

    let _guard = init_telemetry(&config.app, &config.telemetry)?;
    log_startup_banner(&config);

    tokio::fs::create_dir_all(&config.paths.upload_dir).await?;

    let db = Database::new(&config.database).await?;
    match ensure_schema(&db).await {
        Ok(()) => info!(table = RULE_TABLE, "rule table ready"),
        Err(err) => warn!(error = %err, "could not prepare rule table; /init_db can retry"),
    }
    match db.health_check().await {
        Ok(()) => info!("database connection ok"),
        Err(err) => warn!(error = %err, "database connection check failed"),
    }

    let port = config.app.port;
    let state = AppState {
        db,
        config: Arc::new(config),
    };
    let app = router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("rule library listening on {}", listener.local_addr()?);

    let shutdown = CancellationToken::new();
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .await?;

    shutdown.cancel();
    Ok(())
}

fn router(state: AppState) -> Router {
    let body_limit = state.config.upload.max_content_length;
    api::router()
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

fn log_startup_banner(config: &Config) {
    let redacted = config.redacted();
    info!(
        service = %redacted.service_name,
        env = %redacted.env,
        port = redacted.port,
        database = %redacted.db_url,
        remote = redacted.db_remote,
        auth_token = mask(config.database.auth_token.as_deref()),
        secret_key = mask(config.app.secret_key.as_deref()),
        upload_folder = %redacted.upload_folder,
        template_file = %redacted.template_file,
        max_upload_mb = redacted.max_content_length_mb,
        "starting rule library service"
    );
}

fn mask(secret: Option<&str>) -> &'static str {
    match secret {
        Some(value) if !value.is_empty() => "********",
        _ => "(unset)",
    }
}

async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        let mut sigterm = signal(SignalKind::terminate()).expect("install SIGTERM handler");
        sigterm.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            warn!("received ctrl+c, shutting down");
        }
        _ = terminate => {
            warn!("received terminate signal, shutting down");
        }
    }

    shutdown.cancel();
}
