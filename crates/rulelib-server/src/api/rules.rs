use axum::{
    Json, Router,
    extract::{Query, State},
    routing::get,
};
use chrono::NaiveDateTime;
use rulelib_core::config::DisplayConfig;
use rulelib_core::rules::RULE_COLUMNS;
use rulelib_core::{Rule, RuleOrdering, RuleRepository, format_timestamp};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::ApiError;
use crate::AppState;

const MAX_VIEW_ROWS: u32 = 100;

pub fn router() -> Router<AppState> {
    Router::new().route("/view_data", get(view_data))
}

#[derive(Debug, Default, Deserialize)]
struct ViewParams {
    limit: Option<u32>,
    order: Option<String>,
}

#[derive(Debug, Serialize)]
struct ViewResponse {
    total_count: i64,
    columns: Vec<&'static str>,
    data: Vec<Map<String, Value>>,
}

/// GET /view_data
///
/// Total row count plus up to 100 rules, every value rendered as display text.
async fn view_data(
    State(state): State<AppState>,
    Query(params): Query<ViewParams>,
) -> Result<Json<ViewResponse>, ApiError> {
    let ordering = match params.order.as_deref() {
        None | Some("") => RuleOrdering::default(),
        Some(raw) => RuleOrdering::parse(raw).ok_or_else(|| {
            ApiError::BadInput(format!(
                "unknown order {raw:?}; expected priority, rule_id or updated"
            ))
        })?,
    };
    let limit = params.limit.unwrap_or(MAX_VIEW_ROWS).min(MAX_VIEW_ROWS);

    let repo = RuleRepository::new(state.db.clone());
    let total_count = repo.count().await?;
    let rules = repo.list_top(limit, ordering).await?;

    Ok(Json(ViewResponse {
        total_count,
        columns: RULE_COLUMNS.to_vec(),
        data: rules
            .iter()
            .map(|rule| display_row(rule, &state.config.display))
            .collect(),
    }))
}

fn display_row(rule: &Rule, display: &DisplayConfig) -> Map<String, Value> {
    let timestamp = |value: &Option<NaiveDateTime>| {
        value.as_ref().map(format_timestamp).unwrap_or_default()
    };
    let enabled = if rule.enabled {
        &display.yes_label
    } else {
        &display.no_label
    };

    let values = [
        rule.rule_id.clone(),
        rule.rule_name.clone(),
        rule.trigger_type.clone(),
        rule.trigger_content.clone(),
        rule.response_type.clone(),
        rule.response_content.clone(),
        rule.priority.to_string(),
        enabled.clone(),
        rule.category.clone(),
        rule.tags.clone(),
        timestamp(&rule.created_time),
        timestamp(&rule.updated_time),
    ];

    RULE_COLUMNS
        .iter()
        .zip(values)
        .map(|(column, value)| (column.to_string(), Value::String(value)))
        .collect()
}
