pub mod repository;
pub mod types;

pub use repository::{RuleError, RuleRepository};
pub use types::{RULE_COLUMNS, Rule, RuleOrdering, TIMESTAMP_FORMAT, format_timestamp};
