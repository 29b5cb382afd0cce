use axum::{
    Router,
    extract::State,
    http::header::{CONTENT_DISPOSITION, CONTENT_TYPE},
    response::{IntoResponse, Response},
    routing::get,
};
use rulelib_core::{TEMPLATE_DOWNLOAD_NAME, TemplateError, XLSX_CONTENT_TYPE, ensure_template};

use super::ApiError;
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/download_template", get(download_template))
}

/// GET /download_template
///
/// Serves the configured template, generating it first when it is missing.
async fn download_template(State(state): State<AppState>) -> Result<Response, ApiError> {
    let path = state.config.paths.template_file.clone();
    let bytes = tokio::task::spawn_blocking(move || {
        ensure_template(&path)?;
        std::fs::read(&path).map_err(TemplateError::from)
    })
    .await??;

    let headers = [
        (CONTENT_TYPE, XLSX_CONTENT_TYPE.to_string()),
        (
            CONTENT_DISPOSITION,
            format!("attachment; filename=\"{TEMPLATE_DOWNLOAD_NAME}\""),
        ),
    ];
    Ok((headers, bytes).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ready_state;
    use axum::{body::to_bytes, http::StatusCode};

    #[tokio::test]
    async fn download_generates_missing_template() {
        let (state, _dir) = ready_state().await;
        assert!(!state.config.paths.template_file.exists());

        let response = download_template(State(state.clone()))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[CONTENT_TYPE], XLSX_CONTENT_TYPE);
        assert!(
            response.headers()[CONTENT_DISPOSITION]
                .to_str()
                .expect("header")
                .contains(TEMPLATE_DOWNLOAD_NAME)
        );

        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        assert!(body.starts_with(b"PK"), "xlsx files are zip archives");
        assert!(state.config.paths.template_file.exists());
    }

    #[tokio::test]
    async fn download_serves_existing_template_unchanged() {
        let (state, _dir) = ready_state().await;
        let path = &state.config.paths.template_file;
        std::fs::create_dir_all(path.parent().expect("parent")).expect("dirs");
        std::fs::write(path, b"custom template").expect("write");

        let response = download_template(State(state.clone()))
            .await
            .into_response();
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        assert_eq!(&body[..], b"custom template");
    }
}
