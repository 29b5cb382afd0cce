//! Spreadsheet import: validate an uploaded workbook and upsert its rows.
//!
//! The pipeline is extension check → scratch file → first-sheet parse →
//! header validation → per-row fold. A row that fails is counted and
//! reported; it never stops the batch. The scratch file is removed on every
//! exit path.

pub mod cells;
pub mod columns;
pub mod scratch;
pub mod workbook;

use std::path::Path;

use calamine::Data;
use chrono::{Local, NaiveDateTime};
use futures::stream::{self, StreamExt};
use libsql::Connection;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::db::{Database, DbError};
use crate::rules::repository::upsert_rule;

pub use cells::{RowError, parse_row};
pub use columns::{Column, ColumnMap};
pub use scratch::ScratchFile;
pub use workbook::{SheetTable, read_first_sheet};

pub const ALLOWED_EXTENSIONS: [&str; 2] = ["xlsx", "xls"];

/// Only this many row errors are reported back; the count covers all of them.
pub const MAX_REPORTED_ERRORS: usize = 10;

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("no file was uploaded")]
    NoFile,
    #[error("unsupported file type {0:?}; upload an Excel file (.xlsx, .xls)")]
    UnsupportedFileType(String),
    #[error("the uploaded file is empty")]
    EmptyUpload,
    #[error("spreadsheet is missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),
    #[error("unable to connect to database: {0}")]
    Connection(#[source] DbError),
    #[error("failed to read spreadsheet: {0}")]
    Workbook(#[from] calamine::Error),
    #[error("failed to store upload: {0}")]
    Io(#[from] std::io::Error),
    #[error("spreadsheet parsing task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl ImportError {
    /// Client-caused failures, reported as bad requests.
    pub fn is_bad_input(&self) -> bool {
        matches!(
            self,
            ImportError::NoFile
                | ImportError::UnsupportedFileType(_)
                | ImportError::EmptyUpload
                | ImportError::MissingColumns(_)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub success_count: usize,
    pub error_count: usize,
    pub errors: Vec<String>,
}

impl ImportSummary {
    pub fn message(&self) -> String {
        format!(
            "Import finished: {} succeeded, {} failed",
            self.success_count, self.error_count
        )
    }
}

/// Accumulator for the per-row fold.
#[derive(Debug, Default)]
pub struct ImportTally {
    success_count: usize,
    error_count: usize,
    errors: Vec<String>,
}

impl ImportTally {
    pub fn record(&mut self, row_number: usize, outcome: Result<(), RowError>) {
        match outcome {
            Ok(()) => self.success_count += 1,
            Err(err) => {
                warn!(row = row_number, error = %err, "rule row failed to import");
                self.error_count += 1;
                if self.errors.len() < MAX_REPORTED_ERRORS {
                    self.errors.push(format!("row {row_number}: {err}"));
                }
            }
        }
    }

    pub fn into_summary(self) -> ImportSummary {
        ImportSummary {
            success_count: self.success_count,
            error_count: self.error_count,
            errors: self.errors,
        }
    }
}

pub fn validate_extension(file_name: &str) -> Result<(), ImportError> {
    let extension = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase());
    match extension {
        Some(ext) if ALLOWED_EXTENSIONS.contains(&ext.as_str()) => Ok(()),
        _ => Err(ImportError::UnsupportedFileType(file_name.to_string())),
    }
}

#[derive(Clone)]
pub struct RuleImporter {
    db: Database,
}

impl RuleImporter {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Validates an upload, parks it under `upload_dir`, and imports it.
    pub async fn import_upload(
        &self,
        upload_dir: &Path,
        file_name: &str,
        bytes: &[u8],
    ) -> Result<ImportSummary, ImportError> {
        if file_name.trim().is_empty() {
            return Err(ImportError::NoFile);
        }
        validate_extension(file_name)?;
        if bytes.is_empty() {
            return Err(ImportError::EmptyUpload);
        }

        let scratch = ScratchFile::persist(upload_dir, file_name, bytes).await?;
        self.import(scratch).await
    }

    /// Imports a parked upload. The scratch file is consumed and removed
    /// whatever the outcome.
    pub async fn import(&self, scratch: ScratchFile) -> Result<ImportSummary, ImportError> {
        let path = scratch.path().to_path_buf();
        let table = tokio::task::spawn_blocking(move || read_first_sheet(&path)).await??;

        let columns = ColumnMap::from_header(&table.header).map_err(ImportError::MissingColumns)?;
        let conn = self
            .db
            .connection()
            .await
            .map_err(ImportError::Connection)?;

        let row_count = table.rows.len();
        let now = Local::now().naive_local();
        let summary = fold_rows(&conn, &columns, table.rows, now)
            .await
            .into_summary();
        drop(scratch);

        info!(
            rows = row_count,
            success_count = summary.success_count,
            error_count = summary.error_count,
            "rule import finished"
        );
        Ok(summary)
    }
}

async fn fold_rows(
    conn: &Connection,
    columns: &ColumnMap,
    rows: Vec<(usize, Vec<Data>)>,
    now: NaiveDateTime,
) -> ImportTally {
    stream::iter(rows)
        .fold(
            ImportTally::default(),
            move |mut tally, (row_number, cells)| async move {
                let outcome = import_row(conn, columns, row_number, &cells, now).await;
                tally.record(row_number, outcome);
                tally
            },
        )
        .await
}

async fn import_row(
    conn: &Connection,
    columns: &ColumnMap,
    row_number: usize,
    cells: &[Data],
    now: NaiveDateTime,
) -> Result<(), RowError> {
    let rule = parse_row(columns, row_number, cells, now)?;
    upsert_rule(conn, &rule).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_allow_list_is_case_insensitive() {
        assert!(validate_extension("rules.xlsx").is_ok());
        assert!(validate_extension("RULES.XLS").is_ok());
        assert!(validate_extension("archive.tar.xlsx").is_ok());

        for name in ["rules.txt", "rules.csv", "xlsx", "rules.xlsx.exe"] {
            let err = validate_extension(name).expect_err("rejected");
            assert!(err.is_bad_input(), "{name} should be bad input");
        }
    }

    #[test]
    fn tally_caps_reported_errors_but_counts_all() {
        let mut tally = ImportTally::default();
        tally.record(1, Ok(()));
        for row in 2..=14 {
            tally.record(
                row,
                Err(RowError::InvalidBoolean {
                    column: "enabled",
                    value: "maybe".into(),
                }),
            );
        }

        let summary = tally.into_summary();
        assert_eq!(summary.success_count, 1);
        assert_eq!(summary.error_count, 13);
        assert_eq!(summary.errors.len(), MAX_REPORTED_ERRORS);
        assert_eq!(
            summary.errors[0],
            r#"row 2: enabled: cannot interpret "maybe" as a boolean"#
        );
        assert!(summary.errors[9].starts_with("row 11:"));
    }

    #[test]
    fn missing_columns_message_lists_names() {
        let err = ImportError::MissingColumns(vec!["priority".into(), "tags".into()]);
        assert!(err.is_bad_input());
        assert_eq!(
            err.to_string(),
            "spreadsheet is missing required columns: priority, tags"
        );
    }
}
