use std::path::Path;

use calamine::{Data, Reader, open_workbook_auto};

use super::cells::is_blank;

/// First worksheet of an uploaded workbook, split into header and data rows.
#[derive(Debug, Default)]
pub struct SheetTable {
    pub header: Vec<String>,
    /// Data rows with their 1-based number below the header. Fully blank rows
    /// are dropped but keep their slot in the numbering.
    pub rows: Vec<(usize, Vec<Data>)>,
}

/// Blocking; run it off the async runtime.
pub fn read_first_sheet(path: &Path) -> Result<SheetTable, calamine::Error> {
    let mut workbook = open_workbook_auto(path)?;
    let range = match workbook.worksheet_range_at(0) {
        Some(range) => range?,
        None => return Ok(SheetTable::default()),
    };

    let mut rows = range
        .rows()
        .skip_while(|row| row.iter().all(is_blank));

    let Some(header_row) = rows.next() else {
        return Ok(SheetTable::default());
    };
    let header = header_row
        .iter()
        .map(|cell| match cell {
            Data::String(s) => s.trim().to_string(),
            Data::Empty => String::new(),
            other => other.to_string(),
        })
        .collect();

    let rows = rows
        .enumerate()
        .filter(|(_, row)| !row.iter().all(is_blank))
        .map(|(idx, row)| (idx + 1, row.to_vec()))
        .collect();

    Ok(SheetTable { header, rows })
}
