use chrono::NaiveDateTime;
use libsql::{Connection, Row, params};
use thiserror::Error;
use tracing::warn;

use crate::db::{Database, DbError};
use crate::import::cells::parse_timestamp_text;

use super::types::{Rule, RuleOrdering, format_timestamp};

const RULE_SELECT_COLUMNS: &str = "rule_id, rule_name, trigger_type, trigger_content, response_type, response_content, priority, enabled, category, tags, created_time, updated_time";

/// Every column but the key and `created_time` follows the incoming row.
const UPSERT_SQL: &str = "INSERT INTO rulelibtable (
        rule_id, rule_name, trigger_type, trigger_content, response_type,
        response_content, priority, enabled, category, tags, created_time, updated_time
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
    ON CONFLICT (rule_id) DO UPDATE SET
        rule_name = excluded.rule_name,
        trigger_type = excluded.trigger_type,
        trigger_content = excluded.trigger_content,
        response_type = excluded.response_type,
        response_content = excluded.response_content,
        priority = excluded.priority,
        enabled = excluded.enabled,
        category = excluded.category,
        tags = excluded.tags,
        updated_time = excluded.updated_time";

#[derive(Debug, Error)]
pub enum RuleError {
    #[error("database error: {0}")]
    Database(#[from] DbError),
    #[error("sql error: {0}")]
    Sql(#[from] libsql::Error),
}

#[derive(Clone)]
pub struct RuleRepository {
    db: Database,
}

impl RuleRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub async fn upsert(&self, rule: &Rule) -> Result<(), RuleError> {
        let conn = self.db.connection().await?;
        upsert_rule(&conn, rule).await
    }

    pub async fn count(&self) -> Result<i64, RuleError> {
        let conn = self.db.connection().await?;
        let mut rows = conn.query("SELECT COUNT(*) FROM rulelibtable", ()).await?;
        match rows.next().await? {
            Some(row) => Ok(row.get(0)?),
            None => Ok(0),
        }
    }

    /// Returns at most `limit` rules in the requested order.
    pub async fn list_top(
        &self,
        limit: u32,
        ordering: RuleOrdering,
    ) -> Result<Vec<Rule>, RuleError> {
        let conn = self.db.connection().await?;
        let mut rows = conn
            .query(
                &format!(
                    "SELECT {RULE_SELECT_COLUMNS}
                     FROM rulelibtable
                     ORDER BY {}
                     LIMIT ?1",
                    ordering.order_by()
                ),
                params![i64::from(limit)],
            )
            .await?;

        let mut rules = Vec::new();
        while let Some(row) = rows.next().await? {
            rules.push(row_to_rule(row)?);
        }
        Ok(rules)
    }

    pub async fn get_by_id(&self, rule_id: &str) -> Result<Option<Rule>, RuleError> {
        let conn = self.db.connection().await?;
        let mut rows = conn
            .query(
                &format!("SELECT {RULE_SELECT_COLUMNS} FROM rulelibtable WHERE rule_id = ?1"),
                params![rule_id],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(row_to_rule(row)?)),
            None => Ok(None),
        }
    }

    /// Deletes every rule. Returns how many rows were removed.
    pub async fn truncate(&self) -> Result<u64, RuleError> {
        let conn = self.db.connection().await?;
        let deleted = conn.execute("DELETE FROM rulelibtable", ()).await?;
        Ok(deleted)
    }
}

/// Single-statement insert-or-update; one row is atomic on its own.
pub(crate) async fn upsert_rule(conn: &Connection, rule: &Rule) -> Result<(), RuleError> {
    conn.execute(
        UPSERT_SQL,
        params![
            rule.rule_id.as_str(),
            rule.rule_name.as_str(),
            rule.trigger_type.as_str(),
            rule.trigger_content.as_str(),
            rule.response_type.as_str(),
            rule.response_content.as_str(),
            rule.priority,
            rule.enabled as i64,
            rule.category.as_str(),
            rule.tags.as_str(),
            rule.created_time.as_ref().map(format_timestamp),
            rule.updated_time.as_ref().map(format_timestamp)
        ],
    )
    .await?;
    Ok(())
}

/// Values written by other tools may use any layout the importer accepts;
/// anything else reads as absent instead of failing the whole listing.
fn parse_stored_timestamp(
    rule_id: &str,
    column: &'static str,
    value: Option<String>,
) -> Option<NaiveDateTime> {
    let value = value.filter(|v| !v.trim().is_empty())?;
    let parsed = parse_timestamp_text(&value);
    if parsed.is_none() {
        warn!(rule_id, column, value = %value, "ignoring unreadable stored timestamp");
    }
    parsed
}

fn row_to_rule(row: Row) -> Result<Rule, RuleError> {
    let text = |idx: i32| -> Result<String, RuleError> {
        Ok(row.get::<Option<String>>(idx)?.unwrap_or_default())
    };
    let priority: Option<i64> = row.get(6)?;
    let enabled: Option<i64> = row.get(7)?;

    let rule_id = text(0)?;
    let created_time = parse_stored_timestamp(&rule_id, "created_time", row.get(10)?);
    let updated_time = parse_stored_timestamp(&rule_id, "updated_time", row.get(11)?);

    Ok(Rule {
        rule_id,
        rule_name: text(1)?,
        trigger_type: text(2)?,
        trigger_content: text(3)?,
        response_type: text(4)?,
        response_content: text(5)?,
        priority: priority.unwrap_or(0),
        enabled: enabled.is_some_and(|v| v != 0),
        category: text(8)?,
        tags: text(9)?,
        created_time,
        updated_time,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::db::tests::temp_database;
    use crate::schema::ensure_schema;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    pub(crate) fn at(day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, day)
            .and_then(|d| d.and_hms_opt(hour, 0, 0))
            .expect("valid date")
    }

    pub(crate) fn sample_rule(id: &str, priority: i64) -> Rule {
        Rule {
            rule_id: id.to_string(),
            rule_name: format!("Rule {id}"),
            trigger_type: "keyword".to_string(),
            trigger_content: "hello,hi".to_string(),
            response_type: "text".to_string(),
            response_content: "Hello there".to_string(),
            priority,
            enabled: true,
            category: "greeting".to_string(),
            tags: "basic".to_string(),
            created_time: Some(at(1, 9)),
            updated_time: Some(at(1, 9)),
        }
    }

    async fn setup_repo() -> (RuleRepository, Database, TempDir) {
        let (db, dir) = temp_database().await;
        ensure_schema(&db).await.expect("schema");
        (RuleRepository::new(db.clone()), db, dir)
    }

    #[tokio::test]
    async fn upsert_inserts_new_rule() {
        let (repo, _db, _dir) = setup_repo().await;
        let rule = sample_rule("R001", 10);

        repo.upsert(&rule).await.expect("upsert");

        assert_eq!(repo.count().await.expect("count"), 1);
        let stored = repo.get_by_id("R001").await.expect("get").expect("present");
        assert_eq!(stored, rule);
    }

    #[tokio::test]
    async fn upsert_overwrites_all_but_key_and_created_time() {
        let (repo, _db, _dir) = setup_repo().await;
        repo.upsert(&sample_rule("R001", 10)).await.expect("first upsert");

        let replacement = Rule {
            rule_name: "Renamed".to_string(),
            trigger_type: "exact".to_string(),
            trigger_content: "who are you".to_string(),
            response_type: "dynamic".to_string(),
            response_content: "It is {time}".to_string(),
            priority: 3,
            enabled: false,
            category: "test".to_string(),
            tags: "english".to_string(),
            created_time: Some(at(20, 12)),
            updated_time: Some(at(21, 8)),
            ..sample_rule("R001", 0)
        };
        repo.upsert(&replacement).await.expect("second upsert");

        assert_eq!(repo.count().await.expect("count"), 1);
        let stored = repo.get_by_id("R001").await.expect("get").expect("present");
        assert_eq!(stored.created_time, Some(at(1, 9)));
        assert_eq!(stored.updated_time, Some(at(21, 8)));
        assert_eq!(
            stored,
            Rule {
                created_time: Some(at(1, 9)),
                ..replacement
            }
        );
    }

    #[tokio::test]
    async fn list_top_orders_by_priority_then_id_and_respects_limit() {
        let (repo, _db, _dir) = setup_repo().await;
        for (id, priority) in [("R003", 5), ("R001", 5), ("R002", 9), ("R004", 1)] {
            repo.upsert(&sample_rule(id, priority)).await.expect("upsert");
        }

        let ids: Vec<String> = repo
            .list_top(3, RuleOrdering::Priority)
            .await
            .expect("list")
            .into_iter()
            .map(|r| r.rule_id)
            .collect();
        assert_eq!(ids, vec!["R002", "R001", "R003"]);

        let ids: Vec<String> = repo
            .list_top(10, RuleOrdering::RuleId)
            .await
            .expect("list")
            .into_iter()
            .map(|r| r.rule_id)
            .collect();
        assert_eq!(ids, vec!["R001", "R002", "R003", "R004"]);
    }

    #[tokio::test]
    async fn list_top_by_recent_update() {
        let (repo, _db, _dir) = setup_repo().await;
        let mut older = sample_rule("R001", 1);
        older.updated_time = Some(at(2, 0));
        let mut newer = sample_rule("R002", 1);
        newer.updated_time = Some(at(3, 0));
        repo.upsert(&older).await.expect("upsert");
        repo.upsert(&newer).await.expect("upsert");

        let rules = repo
            .list_top(10, RuleOrdering::RecentlyUpdated)
            .await
            .expect("list");
        assert_eq!(rules[0].rule_id, "R002");
    }

    #[tokio::test]
    async fn null_columns_read_as_defaults() {
        let (repo, db, _dir) = setup_repo().await;
        let conn = db.connection().await.expect("conn");
        conn.execute(
            "INSERT INTO rulelibtable (rule_id) VALUES ('bare')",
            (),
        )
        .await
        .expect("insert bare row");

        let rule = repo.get_by_id("bare").await.expect("get").expect("present");
        assert_eq!(rule.rule_name, "");
        assert_eq!(rule.priority, 0);
        assert!(!rule.enabled);
        assert_eq!(rule.created_time, None);
    }

    #[tokio::test]
    async fn truncate_removes_everything() {
        let (repo, _db, _dir) = setup_repo().await;
        repo.upsert(&sample_rule("R001", 1)).await.expect("upsert");
        repo.upsert(&sample_rule("R002", 2)).await.expect("upsert");

        let deleted = repo.truncate().await.expect("truncate");

        assert_eq!(deleted, 2);
        assert_eq!(repo.count().await.expect("count"), 0);
        assert!(repo
            .list_top(100, RuleOrdering::Priority)
            .await
            .expect("list")
            .is_empty());
    }

    #[tokio::test]
    async fn count_fails_without_table() {
        let (db, _dir) = temp_database().await;
        let repo = RuleRepository::new(db);
        let err = repo.count().await.expect_err("table missing");
        assert!(matches!(err, RuleError::Sql(_)));
    }

    #[tokio::test]
    async fn foreign_timestamp_layouts_do_not_break_listing() {
        let (repo, db, _dir) = setup_repo().await;
        repo.upsert(&sample_rule("R001", 5)).await.expect("upsert");
        let conn = db.connection().await.expect("conn");
        conn.execute(
            "INSERT INTO rulelibtable (rule_id, priority, created_time, updated_time)
             VALUES ('foreign', 1, '2024-05-01', 'last tuesday')",
            (),
        )
        .await
        .expect("insert foreign row");

        let rules = repo
            .list_top(10, RuleOrdering::Priority)
            .await
            .expect("listing survives odd timestamps");
        assert_eq!(rules.len(), 2);

        let foreign = rules
            .iter()
            .find(|rule| rule.rule_id == "foreign")
            .expect("foreign row listed");
        assert_eq!(
            foreign.created_time,
            NaiveDate::from_ymd_opt(2024, 5, 1).and_then(|d| d.and_hms_opt(0, 0, 0))
        );
        assert_eq!(foreign.updated_time, None);
    }
}
