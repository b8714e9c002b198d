//! Tabular exports as a grid of text cells: delimited text via `csv`,
//! spreadsheets via `calamine` (first sheet only).

use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader};
use chrono::{Duration, NaiveDate};

use crate::error::{ImportError, Result};
use crate::model::value::format_timestamp;

pub type Grid = Vec<Vec<String>>;

/// Detect delimiter by checking the first line for common separators.
pub fn detect_delimiter(first_line: &str) -> u8 {
    let semicolons = first_line.matches(';').count();
    let commas = first_line.matches(',').count();
    let tabs = first_line.matches('\t').count();

    if semicolons >= commas && semicolons >= tabs && semicolons > 0 {
        b';'
    } else if tabs >= commas && tabs > 0 {
        b'\t'
    } else {
        b','
    }
}

/// Read delimited text, auto-detecting `;`, tab or `,` from the first line.
pub fn read_delimited_grid(content: &str) -> Result<Grid> {
    let content = content.trim_start_matches('\u{feff}');
    let first_line = content.lines().next().unwrap_or("");
    let delimiter = detect_delimiter(first_line);

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .has_headers(false)
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());

    let mut grid = Grid::new();
    for (i, result) in reader.records().enumerate() {
        let record =
            result.map_err(|e| ImportError::Parse(format!("row {}: {}", i + 1, e)))?;
        grid.push(record.iter().map(str::to_string).collect());
    }
    Ok(grid)
}

/// Read the first worksheet of a workbook.
pub fn read_workbook_grid(path: &Path) -> Result<Grid> {
    let mut workbook = open_workbook_auto(path)
        .map_err(|e| ImportError::Parse(format!("spreadsheet: {}", e)))?;
    let Some(first) = workbook.sheet_names().first().cloned() else {
        return Err(ImportError::Parse("spreadsheet has no sheets".into()));
    };
    let range = workbook
        .worksheet_range(&first)
        .map_err(|e| ImportError::Parse(format!("sheet {}: {}", first, e)))?;

    Ok(range
        .rows()
        .map(|row| row.iter().map(cell_to_string).collect())
        .collect())
}

fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.trim().to_string(),
        Data::Int(n) => n.to_string(),
        Data::Float(f) => format!("{}", f),
        Data::Bool(b) => b.to_string(),
        Data::Error(e) => format!("#ERR({:?})", e),
        Data::DateTime(dt) => excel_serial_to_text(dt.as_f64()),
        Data::DateTimeIso(s) => s.clone(),
        Data::DurationIso(s) => s.clone(),
    }
}

/// Excel serial day numbers count from 1899-12-30.
fn excel_serial_to_text(serial: f64) -> String {
    let Some(epoch) = NaiveDate::from_ymd_opt(1899, 12, 30).and_then(|d| d.and_hms_opt(0, 0, 0))
    else {
        return format!("{}", serial);
    };
    let seconds = (serial * 86_400.0).round() as i64;
    match epoch.checked_add_signed(Duration::seconds(seconds)) {
        Some(dt) => format_timestamp(&dt),
        None => format!("{}", serial),
    }
}
