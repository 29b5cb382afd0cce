use axum::{
    Json, Router,
    extract::{Multipart, State},
    routing::post,
};
use rulelib_core::{ImportError, ImportSummary, RuleImporter};
use serde::Serialize;
use tracing::info;

use super::ApiError;
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/upload", post(upload))
}

#[derive(Debug, Serialize)]
struct UploadResponse {
    success: bool,
    message: String,
    success_count: usize,
    error_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    errors: Option<Vec<String>>,
}

impl From<ImportSummary> for UploadResponse {
    fn from(summary: ImportSummary) -> Self {
        UploadResponse {
            success: true,
            message: summary.message(),
            success_count: summary.success_count,
            error_count: summary.error_count,
            errors: (!summary.errors.is_empty()).then_some(summary.errors),
        }
    }
}

/// POST /upload
///
/// Imports the spreadsheet sent in the multipart field `file`. Row-level
/// failures are reported in the body; only file-level problems fail the request.
async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let mut upload = None;
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().unwrap_or_default().to_string();
        let bytes = field.bytes().await?;
        upload = Some((file_name, bytes));
        break;
    }

    let (file_name, bytes) = upload.ok_or(ImportError::NoFile)?;
    info!(file_name = %file_name, size = bytes.len(), "received rule spreadsheet");

    let importer = RuleImporter::new(state.db.clone());
    let summary = importer
        .import_upload(&state.config.paths.upload_dir, &file_name, &bytes)
        .await?;

    Ok(Json(UploadResponse::from(summary)))
}
