use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Storage and display format for `created_time` / `updated_time`.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Column names of the rule table, in table order. Uploaded sheets must carry
/// every one of them.
pub const RULE_COLUMNS: [&str; 12] = [
    "rule_id",
    "rule_name",
    "trigger_type",
    "trigger_content",
    "response_type",
    "response_content",
    "priority",
    "enabled",
    "category",
    "tags",
    "created_time",
    "updated_time",
];

/// One trigger/response record. `trigger_type` and `response_type` are
/// open-ended categories read by the chatbot that consumes this table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub rule_id: String,
    pub rule_name: String,
    pub trigger_type: String,
    pub trigger_content: String,
    pub response_type: String,
    pub response_content: String,
    pub priority: i64,
    pub enabled: bool,
    pub category: String,
    pub tags: String,
    pub created_time: Option<NaiveDateTime>,
    pub updated_time: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleOrdering {
    /// Highest priority first, ties broken by id.
    #[default]
    Priority,
    RuleId,
    #[serde(rename = "updated")]
    RecentlyUpdated,
}

impl RuleOrdering {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleOrdering::Priority => "priority",
            RuleOrdering::RuleId => "rule_id",
            RuleOrdering::RecentlyUpdated => "updated",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "priority" => Some(Self::Priority),
            "rule_id" => Some(Self::RuleId),
            "updated" => Some(Self::RecentlyUpdated),
            _ => None,
        }
    }

    pub(crate) fn order_by(&self) -> &'static str {
        match self {
            RuleOrdering::Priority => "priority DESC, rule_id ASC",
            RuleOrdering::RuleId => "rule_id ASC",
            RuleOrdering::RecentlyUpdated => "updated_time DESC, rule_id ASC",
        }
    }
}

pub fn format_timestamp(value: &NaiveDateTime) -> String {
    value.format(TIMESTAMP_FORMAT).to_string()
}
