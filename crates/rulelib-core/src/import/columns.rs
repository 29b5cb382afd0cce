use crate::rules::RULE_COLUMNS;

/// The twelve columns an uploaded sheet must provide.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    RuleId,
    RuleName,
    TriggerType,
    TriggerContent,
    ResponseType,
    ResponseContent,
    Priority,
    Enabled,
    Category,
    Tags,
    CreatedTime,
    UpdatedTime,
}

impl Column {
    pub const ALL: [Column; 12] = [
        Column::RuleId,
        Column::RuleName,
        Column::TriggerType,
        Column::TriggerContent,
        Column::ResponseType,
        Column::ResponseContent,
        Column::Priority,
        Column::Enabled,
        Column::Category,
        Column::Tags,
        Column::CreatedTime,
        Column::UpdatedTime,
    ];

    pub fn name(self) -> &'static str {
        RULE_COLUMNS[self as usize]
    }
}

/// Position of every required column within a sheet's header row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMap {
    positions: [usize; 12],
}

impl ColumnMap {
    /// Resolves the header row. On failure returns the names of all absent
    /// columns in table order. Extra columns are ignored; when a name repeats,
    /// the leftmost one wins.
    pub fn from_header(header: &[String]) -> Result<Self, Vec<String>> {
        let mut positions = [0usize; 12];
        let mut missing = Vec::new();

        for column in Column::ALL {
            match header.iter().position(|h| h.trim() == column.name()) {
                Some(idx) => positions[column as usize] = idx,
                None => missing.push(column.name().to_string()),
            }
        }

        if missing.is_empty() {
            Ok(Self { positions })
        } else {
            Err(missing)
        }
    }

    pub fn position(&self, column: Column) -> usize {
        self.positions[column as usize]
    }
}
