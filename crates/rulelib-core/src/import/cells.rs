//! Cell-to-field coercion for one spreadsheet row.

use calamine::{Data, DataType};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Timelike};
use thiserror::Error;

use crate::rules::{Rule, RuleError, format_timestamp};

use super::columns::{Column, ColumnMap};

static EMPTY: Data = Data::Empty;

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y/%m/%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M",
];
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d"];

const TRUE_WORDS: &[&str] = &["true", "yes", "y", "1", "on", "enabled", "是", "启用"];
const FALSE_WORDS: &[&str] = &["false", "no", "n", "0", "off", "disabled", "否", "禁用"];

#[derive(Debug, Error)]
pub enum RowError {
    #[error("{column}: cannot interpret {value:?} as a boolean")]
    InvalidBoolean { column: &'static str, value: String },
    #[error("{column}: spreadsheet error value {detail}")]
    CellError { column: &'static str, detail: String },
    #[error("{0}")]
    Store(#[from] RuleError),
}

/// Builds a rule from one data row. `row_number` counts data rows from 1 and
/// feeds the generated id/name defaults; `now` substitutes for unreadable
/// timestamps.
pub fn parse_row(
    columns: &ColumnMap,
    row_number: usize,
    cells: &[Data],
    now: NaiveDateTime,
) -> Result<Rule, RowError> {
    let cell = |column: Column| cells.get(columns.position(column)).unwrap_or(&EMPTY);
    let text = |column: Column| text_value(column, cell(column));

    Ok(Rule {
        rule_id: text(Column::RuleId)?
            .map(|id| id.trim().to_string())
            .unwrap_or_else(|| format!("R{row_number:03}")),
        rule_name: text(Column::RuleName)?.unwrap_or_else(|| format!("Rule {row_number}")),
        trigger_type: text(Column::TriggerType)?.unwrap_or_else(|| "keyword".to_string()),
        trigger_content: text(Column::TriggerContent)?.unwrap_or_default(),
        response_type: text(Column::ResponseType)?.unwrap_or_else(|| "text".to_string()),
        response_content: text(Column::ResponseContent)?.unwrap_or_default(),
        priority: priority_value(cell(Column::Priority))?,
        enabled: enabled_value(cell(Column::Enabled))?,
        category: text(Column::Category)?.unwrap_or_default(),
        tags: text(Column::Tags)?.unwrap_or_default(),
        created_time: Some(timestamp_value(cell(Column::CreatedTime), now)),
        updated_time: Some(timestamp_value(cell(Column::UpdatedTime), now)),
    })
}

pub fn is_blank(cell: &Data) -> bool {
    match cell {
        Data::Empty => true,
        Data::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

/// `None` for blank cells, otherwise the cell rendered as text.
fn text_value(column: Column, cell: &Data) -> Result<Option<String>, RowError> {
    if is_blank(cell) {
        return Ok(None);
    }
    let rendered = match cell {
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => render_float(*f),
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => match excel_serial_datetime(cell) {
            Some(value) => format_timestamp(&value),
            None => render_float(dt.as_f64()),
        },
        Data::Error(err) => {
            return Err(RowError::CellError {
                column: column.name(),
                detail: err.to_string(),
            });
        }
        Data::Empty => return Ok(None),
    };
    Ok(Some(rendered))
}

fn render_float(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}

/// Integer priority; blank or non-numeric cells count as 0.
fn priority_value(cell: &Data) -> Result<i64, RowError> {
    Ok(match cell {
        Data::Int(i) => *i,
        Data::Float(f) if f.is_finite() => f.trunc() as i64,
        Data::Bool(b) => i64::from(*b),
        Data::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| {
                    s.parse::<f64>()
                        .ok()
                        .filter(|f| f.is_finite())
                        .map(|f| f.trunc() as i64)
                })
                .unwrap_or(0)
        }
        Data::Error(err) => {
            return Err(RowError::CellError {
                column: Column::Priority.name(),
                detail: err.to_string(),
            });
        }
        _ => 0,
    })
}

/// Blank means enabled. Unrecognised words are rejected rather than guessed.
fn enabled_value(cell: &Data) -> Result<bool, RowError> {
    let invalid = |value: String| RowError::InvalidBoolean {
        column: Column::Enabled.name(),
        value,
    };

    match cell {
        _ if is_blank(cell) => Ok(true),
        Data::Bool(b) => Ok(*b),
        Data::Int(i) => Ok(*i != 0),
        Data::Float(f) => Ok(*f != 0.0),
        Data::String(s) => {
            let word = s.trim().to_lowercase();
            if TRUE_WORDS.contains(&word.as_str()) {
                Ok(true)
            } else if FALSE_WORDS.contains(&word.as_str()) {
                Ok(false)
            } else {
                Err(invalid(s.clone()))
            }
        }
        Data::Error(err) => Err(RowError::CellError {
            column: Column::Enabled.name(),
            detail: err.to_string(),
        }),
        other => Err(invalid(other.to_string())),
    }
}

/// Spreadsheet dates, serial numbers, and common text layouts; anything
/// unreadable becomes `now`. Sub-second precision is dropped to match storage.
fn timestamp_value(cell: &Data, now: NaiveDateTime) -> NaiveDateTime {
    let parsed = match cell {
        Data::String(s) | Data::DateTimeIso(s) => parse_timestamp_text(s),
        Data::DateTime(_) | Data::Float(_) | Data::Int(_) => excel_serial_datetime(cell),
        _ => None,
    };
    let value = parsed.unwrap_or(now);
    value.with_nanosecond(0).unwrap_or(value)
}

/// Serial day numbers Excel can display: 0001-01-01 through 9999-12-31.
const EXCEL_SERIAL_RANGE: std::ops::RangeInclusive<f64> = -693_594.0..=2_958_465.999;

/// Numeric cells as dates, only inside the range calamine converts without
/// overflowing.
fn excel_serial_datetime(cell: &Data) -> Option<NaiveDateTime> {
    let serial = match cell {
        Data::DateTime(dt) => dt.as_f64(),
        Data::Float(f) => *f,
        Data::Int(i) => *i as f64,
        _ => return None,
    };
    if !serial.is_finite() || !EXCEL_SERIAL_RANGE.contains(&serial) {
        return None;
    }
    cell.as_datetime()
}

pub fn parse_timestamp_text(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            DateTime::parse_from_rfc3339(raw)
                .ok()
                .map(|dt| dt.naive_local())
        })
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
}
