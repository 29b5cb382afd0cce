use serde::{Deserialize, Serialize};
use std::{env, path::Path, path::PathBuf};
use thiserror::Error;

const DEFAULT_MAX_CONTENT_LENGTH: i64 = 16 * 1024 * 1024;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    pub app: AppConfig,
    pub database: DatabaseConfig,
    pub paths: PathsConfig,
    pub upload: UploadConfig,
    pub display: DisplayConfig,
    pub telemetry: TelemetryConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct AppConfig {
    pub service_name: String,
    pub port: u16,
    pub env: String,
    #[serde(default)]
    pub secret_key: Option<String>,
}

/// Where the rule table lives. `url` is either a local SQLite path or a
/// `libsql://` / `http(s)://` endpoint, in which case `auth_token` is required.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default)]
    pub auth_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PathsConfig {
    pub upload_dir: PathBuf,
    pub template_file: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct UploadConfig {
    pub max_content_length: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DisplayConfig {
    pub yes_label: String,
    pub no_label: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct TelemetryConfig {
    #[serde(default)]
    pub otlp_endpoint: Option<String>,
    pub export_traces: bool,
}

/// Configuration echo that is safe to hand to clients.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RedactedConfig {
    pub service_name: String,
    pub env: String,
    pub port: u16,
    pub db_url: String,
    pub db_remote: bool,
    pub db_auth_token_set: bool,
    pub secret_key_set: bool,
    pub upload_folder: String,
    pub template_file: String,
    pub max_content_length_mb: f64,
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read configuration file: {0}")]
    ConfigBuild(config::ConfigError),
    #[error("failed to parse configuration: {0}")]
    Deserialize(config::ConfigError),
    #[error("missing required environment variable {0}")]
    MissingEnvVar(String),
    #[error("invalid {name} override: {source}")]
    InvalidOverride {
        name: &'static str,
        source: std::num::ParseIntError,
    },
}

impl Config {
    /// Load configuration from built-in defaults, the optional file at `path`,
    /// and environment overrides, then resolve any `env:` indirections.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = defaults()
            .map_err(ConfigError::ConfigBuild)?
            .add_source(config::File::from(path.as_ref()).required(false))
            .build()
            .map_err(ConfigError::ConfigBuild)?;

        let mut cfg: Config = raw.try_deserialize().map_err(ConfigError::Deserialize)?;
        cfg.apply_env_overrides()?;
        cfg.resolve_env_markers()?;
        cfg.expand_paths();
        Ok(cfg)
    }

    pub fn is_remote_database(&self) -> bool {
        is_remote_url(&self.database.url)
    }

    pub fn redacted(&self) -> RedactedConfig {
        RedactedConfig {
            service_name: self.app.service_name.clone(),
            env: self.app.env.clone(),
            port: self.app.port,
            db_url: redact_database_url(&self.database.url),
            db_remote: self.is_remote_database(),
            db_auth_token_set: is_set(&self.database.auth_token),
            secret_key_set: is_set(&self.app.secret_key),
            upload_folder: self.paths.upload_dir.to_string_lossy().to_string(),
            template_file: self.paths.template_file.to_string_lossy().to_string(),
            max_content_length_mb: self.upload.max_content_length as f64 / (1024.0 * 1024.0),
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(port) = env::var("APP_PORT") {
            self.app.port = port.parse().map_err(|source| ConfigError::InvalidOverride {
                name: "APP_PORT",
                source,
            })?;
        }

        if let Ok(app_env) = env::var("APP_ENV") {
            self.app.env = app_env;
        }

        if let Ok(secret) = env::var("SECRET_KEY") {
            self.app.secret_key = Some(secret);
        }

        if let Ok(url) = env::var("DATABASE_URL") {
            self.database.url = url;
        }

        if let Ok(token) = env::var("DATABASE_AUTH_TOKEN") {
            self.database.auth_token = Some(token);
        }

        if let Ok(dir) = env::var("UPLOAD_FOLDER") {
            self.paths.upload_dir = PathBuf::from(dir);
        }

        if let Ok(template) = env::var("TEMPLATE_FILE") {
            self.paths.template_file = PathBuf::from(template);
        }

        if let Ok(max) = env::var("MAX_CONTENT_LENGTH") {
            self.upload.max_content_length =
                max.parse().map_err(|source| ConfigError::InvalidOverride {
                    name: "MAX_CONTENT_LENGTH",
                    source,
                })?;
        }

        if let Ok(otlp) = env::var("OTLP_ENDPOINT") {
            self.telemetry.otlp_endpoint = Some(otlp);
        }

        Ok(())
    }

    fn resolve_env_markers(&mut self) -> Result<(), ConfigError> {
        apply_env_marker(&mut self.app.service_name)?;
        apply_env_marker(&mut self.app.env)?;
        if let Some(secret) = &mut self.app.secret_key {
            apply_env_marker(secret)?;
        }
        apply_env_marker(&mut self.database.url)?;
        if let Some(token) = &mut self.database.auth_token {
            apply_env_marker(token)?;
        }
        apply_env_marker_path(&mut self.paths.upload_dir)?;
        apply_env_marker_path(&mut self.paths.template_file)?;
        if let Some(endpoint) = &mut self.telemetry.otlp_endpoint {
            apply_env_marker(endpoint)?;
        }
        Ok(())
    }

    fn expand_paths(&mut self) {
        if !self.is_remote_database() {
            self.database.url = shellexpand::tilde(&self.database.url).to_string();
        }
        expand_tilde(&mut self.paths.upload_dir);
        expand_tilde(&mut self.paths.template_file);
    }
}

fn defaults() -> Result<config::ConfigBuilder<config::builder::DefaultState>, config::ConfigError>
{
    config::Config::builder()
        .set_default("app.service_name", "rulelib")?
        .set_default("app.port", 5000_i64)?
        .set_default("app.env", "dev")?
        .set_default("database.url", "rulelib.db")?
        .set_default("paths.upload_dir", "uploads")?
        .set_default(
            "paths.template_file",
            "static/templates/rule_library_template.xlsx",
        )?
        .set_default("upload.max_content_length", DEFAULT_MAX_CONTENT_LENGTH)?
        .set_default("display.yes_label", "是")?
        .set_default("display.no_label", "否")?
        .set_default("telemetry.export_traces", false)
}

/// Remote URLs lose any user info and query string, either of which can carry
/// credentials. Local paths are returned as is.
pub fn redact_database_url(url: &str) -> String {
    if !is_remote_url(url) {
        return url.to_string();
    }
    let without_query = url.split(['?', '#']).next().unwrap_or(url);
    let Some((scheme, rest)) = without_query.split_once("://") else {
        return without_query.to_string();
    };
    let (authority, path) = match rest.split_once('/') {
        Some((authority, path)) => (authority, Some(path)),
        None => (rest, None),
    };
    let host = authority
        .rsplit_once('@')
        .map_or(authority, |(_, host)| host);
    match path {
        Some(path) => format!("{scheme}://{host}/{path}"),
        None => format!("{scheme}://{host}"),
    }
}

pub(crate) fn is_remote_url(url: &str) -> bool {
    url.starts_with("libsql://") || url.starts_with("http://") || url.starts_with("https://")
}

fn is_set(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.is_empty())
}

fn expand_tilde(path: &mut PathBuf) {
    let raw = path.to_string_lossy().to_string();
    *path = PathBuf::from(shellexpand::tilde(&raw).as_ref());
}

fn apply_env_marker(value: &mut String) -> Result<(), ConfigError> {
    if let Some(rest) = value.strip_prefix("env:") {
        let resolved = env::var(rest).map_err(|_| ConfigError::MissingEnvVar(rest.to_string()))?;
        *value = resolved;
    }
    Ok(())
}

fn apply_env_marker_path(path: &mut PathBuf) -> Result<(), ConfigError> {
    let mut value = path.to_string_lossy().to_string();
    apply_env_marker(&mut value)?;
    *path = PathBuf::from(value);
    Ok(())
}
