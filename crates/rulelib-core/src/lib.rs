pub mod config;
pub mod db;
pub mod import;
pub mod rules;
pub mod schema;
pub mod telemetry;
pub mod template;

pub use config::{Config, ConfigError, RedactedConfig};
pub use db::{Database, DbError};
pub use import::{ImportError, ImportSummary, RuleImporter};
pub use rules::{Rule, RuleError, RuleOrdering, RuleRepository, format_timestamp};
pub use schema::{RULE_TABLE, SchemaError, ensure_schema, table_exists};
pub use telemetry::{TelemetryError, TelemetryGuard, init_telemetry};
pub use template::{TEMPLATE_DOWNLOAD_NAME, TemplateError, XLSX_CONTENT_TYPE, ensure_template};
