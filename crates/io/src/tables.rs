//! Mapping tables (NLSR keywords, TEP coefficients) read from a workbook's
//! first sheet or from a CSV file.

use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader, Sheets};
use tracing::{debug, info};

use smeta_rollup::model::parse_decimal;
use smeta_rollup::{ClassificationTable, NlsrEntry, TepTable};

use crate::error::IoError;
use crate::text::read_file_as_utf8;

/// One table cell, as read from a workbook or CSV and as written to reports.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Text(String),
    Number(f64),
}

impl Cell {
    pub fn text(value: impl Into<String>) -> Self {
        Cell::Text(value.into())
    }

    /// Display form: integral numbers without a fractional part.
    pub fn as_text(&self) -> String {
        match self {
            Cell::Empty => String::new(),
            Cell::Text(s) => s.trim().to_string(),
            Cell::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => format!("{}", *n as i64),
            Cell::Number(n) => n.to_string(),
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Cell::Number(n) => Some(*n),
            Cell::Text(s) => parse_decimal(s),
            Cell::Empty => None,
        }
    }

    /// Code cell (`Num 1` / `Num 2`). Spreadsheets turn `02` into the number
    /// 2, so integral numbers are zero-padded back to two digits.
    pub fn as_code(&self) -> String {
        match self {
            Cell::Number(n) if n.fract() == 0.0 && *n >= 0.0 && *n < 100.0 => {
                format!("{:02}", *n as i64)
            }
            other => other.as_text(),
        }
    }
}

impl From<&Data> for Cell {
    fn from(data: &Data) -> Self {
        match data {
            Data::Empty => Cell::Empty,
            Data::String(s) => Cell::Text(s.clone()),
            Data::Float(n) => Cell::Number(*n),
            Data::Int(n) => Cell::Number(*n as f64),
            other => Cell::Text(other.to_string()),
        }
    }
}

/// Header row plus data rows.
#[derive(Debug, Clone, Default)]
pub struct Table {
    pub header: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl Table {
    /// Column index by header name: case-insensitive, surrounding spaces ignored.
    pub fn column(&self, name: &str) -> Option<usize> {
        let wanted = name.to_lowercase();
        self.header
            .iter()
            .position(|h| h.trim().to_lowercase() == wanted)
    }

    fn require(&self, path: &Path, name: &'static str) -> Result<usize, IoError> {
        self.column(name).ok_or_else(|| IoError::MissingColumn {
            path: path.to_path_buf(),
            column: name,
        })
    }
}

static EMPTY: Cell = Cell::Empty;

fn cell(row: &[Cell], idx: usize) -> &Cell {
    row.get(idx).unwrap_or(&EMPTY)
}

// ============================================================================
// Reading
// ============================================================================

/// Read a table by extension: `.csv` through the csv reader, anything else
/// through calamine (xlsx, xls, xlsb, ods).
pub fn read_table(path: &Path) -> Result<Table, IoError> {
    let is_csv = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("csv"));
    if is_csv {
        read_csv_table(path)
    } else {
        read_workbook_table(path)
    }
}

fn read_workbook_table(path: &Path) -> Result<Table, IoError> {
    let mut workbook: Sheets<_> = open_workbook_auto(path).map_err(|e| IoError::read(path, e))?;
    let sheet_names: Vec<String> = workbook.sheet_names().to_vec();
    let first = sheet_names
        .first()
        .ok_or_else(|| IoError::table(path, "workbook contains no sheets"))?;
    let range = workbook
        .worksheet_range(first)
        .map_err(|e| IoError::table(path, format!("sheet '{first}': {e}")))?;

    let mut rows = range.rows();
    let header = rows
        .next()
        .map(|r| r.iter().map(|c| Cell::from(c).as_text()).collect())
        .unwrap_or_default();
    let rows = rows
        .map(|r| r.iter().map(Cell::from).collect::<Vec<_>>())
        .filter(|r: &Vec<Cell>| r.iter().any(|c| *c != Cell::Empty))
        .collect();
    Ok(Table { header, rows })
}

fn read_csv_table(path: &Path) -> Result<Table, IoError> {
    let content = read_file_as_utf8(path)?;
    let delimiter = sniff_delimiter(&content);

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(content.as_bytes());

    let mut records = reader.records();
    let header = match records.next() {
        Some(record) => record
            .map_err(|e| IoError::table(path, e))?
            .iter()
            .map(|f| f.trim().to_string())
            .collect(),
        None => Vec::new(),
    };

    let mut rows = Vec::new();
    for record in records {
        let record = record.map_err(|e| IoError::table(path, e))?;
        if record.iter().all(|f| f.trim().is_empty()) {
            continue;
        }
        rows.push(
            record
                .iter()
                .map(|f| if f.is_empty() { Cell::Empty } else { Cell::text(f) })
                .collect(),
        );
    }
    Ok(Table { header, rows })
}

/// Semicolon when the header line has more semicolons than commas
/// (Russian-locale Excel exports), comma otherwise.
fn sniff_delimiter(content: &str) -> u8 {
    let first = content.lines().next().unwrap_or("");
    let semis = first.matches(';').count();
    let commas = first.matches(',').count();
    if semis > commas {
        b';'
    } else {
        b','
    }
}

// ============================================================================
// Mapping tables
// ============================================================================

/// NLSR table: `Name` and `Keyword` columns, row order kept.
pub fn load_classification(path: &Path) -> Result<ClassificationTable, IoError> {
    let table = read_table(path)?;
    let name_col = table.require(path, "Name")?;
    let keyword_col = table.require(path, "Keyword")?;

    let table = ClassificationTable::new(table.rows.iter().map(|row| {
        NlsrEntry::new(cell(row, name_col).as_text(), cell(row, keyword_col).as_text())
    }));
    info!(path = %path.display(), entries = table.len(), "loaded classification table");
    Ok(table)
}

/// TEP table: `Type`, `Name`, optional `Name2`, `Num 1`, `Num 2`, `Tep`.
/// Rows whose `Tep` is not a number are skipped.
pub fn load_unit_economics(path: &Path) -> Result<TepTable, IoError> {
    let table = read_table(path)?;
    let type_col = table.require(path, "Type")?;
    let name_col = table.require(path, "Name")?;
    let name2_col = table.column("Name2");
    let num1_col = table.require(path, "Num 1")?;
    let num2_col = table.require(path, "Num 2")?;
    let tep_col = table.require(path, "Tep")?;

    let mut tep = TepTable::new();
    let mut skipped = 0usize;
    for row in &table.rows {
        let Some(value) = cell(row, tep_col).as_number() else {
            skipped += 1;
            continue;
        };
        let name2 = name2_col.map(|c| cell(row, c).as_text()).unwrap_or_default();
        tep.insert(
            &cell(row, type_col).as_text(),
            &cell(row, name_col).as_text(),
            &name2,
            &cell(row, num1_col).as_code(),
            &cell(row, num2_col).as_code(),
            value,
        );
    }
    if skipped > 0 {
        debug!(path = %path.display(), skipped, "TEP rows without a numeric coefficient");
    }
    info!(path = %path.display(), entries = tep.len(), "loaded unit-economics table");
    Ok(tep)
}
