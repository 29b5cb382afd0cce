//! Downloadable rule spreadsheet template.

use std::path::Path;

use chrono::{Local, NaiveDateTime, Timelike};
use rust_xlsxwriter::{Format, Workbook, XlsxError};
use thiserror::Error;
use tracing::info;

use crate::rules::{RULE_COLUMNS, Rule, format_timestamp};

/// File name offered to the browser for the template download.
pub const TEMPLATE_DOWNLOAD_NAME: &str = "rule_library_template.xlsx";

pub const XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("template file error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to write workbook: {0}")]
    Xlsx(#[from] XlsxError),
}

/// Makes sure a template exists at `path`, writing one with example rules if
/// it does not. Blocking.
pub fn ensure_template(path: &Path) -> Result<(), TemplateError> {
    if path.exists() {
        return Ok(());
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let now = Local::now().naive_local();
    let now = now.with_nanosecond(0).unwrap_or(now);
    write_rules_workbook(path, &example_rules(now))?;
    info!(path = %path.display(), "generated rule template");
    Ok(())
}

/// Writes `rules` as a workbook whose header row carries every required column.
pub fn write_rules_workbook(path: &Path, rules: &[Rule]) -> Result<(), TemplateError> {
    let mut workbook = Workbook::new();
    let bold = Format::new().set_bold();
    let sheet = workbook.add_worksheet();
    sheet.set_name("rules")?;

    for (col, name) in RULE_COLUMNS.iter().enumerate() {
        sheet.write_string_with_format(0, col as u16, *name, &bold)?;
    }

    for (idx, rule) in rules.iter().enumerate() {
        let row = idx as u32 + 1;
        sheet.write_string(row, 0, rule.rule_id.as_str())?;
        sheet.write_string(row, 1, rule.rule_name.as_str())?;
        sheet.write_string(row, 2, rule.trigger_type.as_str())?;
        sheet.write_string(row, 3, rule.trigger_content.as_str())?;
        sheet.write_string(row, 4, rule.response_type.as_str())?;
        sheet.write_string(row, 5, rule.response_content.as_str())?;
        sheet.write_number(row, 6, rule.priority as f64)?;
        sheet.write_boolean(row, 7, rule.enabled)?;
        sheet.write_string(row, 8, rule.category.as_str())?;
        sheet.write_string(row, 9, rule.tags.as_str())?;
        if let Some(created) = &rule.created_time {
            sheet.write_string(row, 10, format_timestamp(created))?;
        }
        if let Some(updated) = &rule.updated_time {
            sheet.write_string(row, 11, format_timestamp(updated))?;
        }
    }

    sheet.set_column_width(3, 36)?;
    sheet.set_column_width(5, 60)?;
    sheet.set_freeze_panes(1, 0)?;
    workbook.save(path)?;
    Ok(())
}

pub fn example_rules(now: NaiveDateTime) -> Vec<Rule> {
    let rule = |id: &str,
                name: &str,
                trigger_type: &str,
                trigger: &str,
                response_type: &str,
                response: &str,
                priority: i64,
                category: &str,
                tags: &str| Rule {
        rule_id: id.to_string(),
        rule_name: name.to_string(),
        trigger_type: trigger_type.to_string(),
        trigger_content: trigger.to_string(),
        response_type: response_type.to_string(),
        response_content: response.to_string(),
        priority,
        enabled: true,
        category: category.to_string(),
        tags: tags.to_string(),
        created_time: Some(now),
        updated_time: Some(now),
    };

    vec![
        rule(
            "R001",
            "Greeting",
            "keyword",
            "hello,hi,hey,你好,您好",
            "text",
            "Hello! I'm the assistant. How can I help you today?",
            10,
            "greeting",
            "basic,greeting",
        ),
        rule(
            "R002",
            "Capabilities",
            "keyword",
            "what can you do,features,help",
            "text",
            "## What I can do<br><br>1. Answer product questions<br>2. Provide technical support<br>3. Answer common questions",
            8,
            "general",
            "features,help",
        ),
        rule(
            "R003",
            "Products",
            "keyword",
            "product,products,your products",
            "text",
            "## Our products<br><br>1. Assistant Pro<br>2. Analytics Platform<br>3. Collaboration Suite",
            7,
            "product",
            "product,sales",
        ),
        rule(
            "R004",
            "Contact",
            "keyword",
            "contact,support,phone,email",
            "text",
            "## Contact<br><br>- Email: support@example.com<br>- Hours: Mon-Fri 9:00-18:00",
            6,
            "contact",
            "contact,support",
        ),
        rule(
            "R005",
            "Date and time",
            "keyword",
            "date,time,what time is it,what day is it",
            "dynamic",
            "Current time: {time}<br>Current date: {date}<br>Today is {weekday}",
            5,
            "general",
            "time,date",
        ),
        rule(
            "R006",
            "Exact match test",
            "exact",
            "who are you",
            "text",
            "I am an assistant designed to help you with various tasks.",
            9,
            "test",
            "test,english",
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::import::{ColumnMap, read_first_sheet};
    use tempfile::TempDir;

    #[test]
    fn ensure_template_writes_workbook_once() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("static/templates").join(TEMPLATE_DOWNLOAD_NAME);

        ensure_template(&path).expect("template written");
        assert!(path.exists());

        std::fs::write(&path, b"custom").expect("overwrite");
        ensure_template(&path).expect("existing template kept");
        assert_eq!(std::fs::read(&path).expect("read"), b"custom");
    }

    #[test]
    fn template_has_complete_header_and_examples() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("template.xlsx");
        ensure_template(&path).expect("template written");

        let table = read_first_sheet(&path).expect("readable");
        assert!(ColumnMap::from_header(&table.header).is_ok());
        assert_eq!(table.rows.len(), 6);
    }

    #[test]
    fn example_rules_have_unique_ids() {
        let now = Local::now().naive_local();
        let rules = example_rules(now);
        let mut ids: Vec<&str> = rules.iter().map(|r| r.rule_id.as_str()).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), rules.len());
        assert!(rules.iter().any(|r| r.response_content.contains("{time}")));
    }
}
