//! Excel output: the combined corpus report, per-document workbooks and the
//! LSR summary.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use rust_xlsxwriter::{Workbook, Worksheet, XlsxError};
use tracing::info;

use smeta_rollup::itog::FinancialRollup;
use smeta_rollup::model::{DetailRow, DetailedRow, GroupedRow, RowIdentity};
use smeta_rollup::tree::FlatRecord;
use smeta_rollup::{CorpusReport, DocumentSummary, UnitMetric};

use crate::error::IoError;
use crate::tables::Cell;

/// Excel's limit on sheet-name length.
const SHEET_NAME_MAX: usize = 31;

pub const MAIN_HEADERS: [&str; 18] = [
    "№ п/п",
    "Обоснование",
    "Наименование локальных сметных расчётов",
    "строительных работ",
    "монтажных работ",
    "оборудования",
    "прочих затрат",
    "всего",
    "Year",
    "Quarter",
    "Name",
    "Name2",
    "Type",
    "НЛСР группа",
    "Keyword",
    "Num 1",
    "Num 2",
    "name_file",
];

pub const GROUPED_HEADERS: [&str; 11] = [
    "Type",
    "Name",
    "Name2",
    "Num 1",
    "Num 2",
    "НЛСР группа",
    "Year",
    "Quarter",
    "всего",
    "TEP",
    "Kvadrat",
];

pub const DETAILED_HEADERS: [&str; 10] = [
    "Type", "Name", "Name2", "Num 1", "Num 2", "Year", "Quarter", "всего", "TEP", "Kvadrat",
];

/// Header fields that open every LSR summary row.
const LSR_HEADER_FIELDS: [&str; 14] = [
    "FileNum",
    "FileName",
    "ObjectNum",
    "ObjectName",
    "RegionCode",
    "RegionName",
    "EstNum",
    "EstName",
    "EstType",
    "IndexType",
    "Reason",
    "CurYear",
    "CurMonth",
    "CurQuarter",
];

// ============================================================================
// Sheet helpers
// ============================================================================

struct SheetWriter<'a> {
    worksheet: &'a mut Worksheet,
    path: &'a Path,
    row: u32,
}

impl<'a> SheetWriter<'a> {
    fn new(workbook: &'a mut Workbook, name: &str, path: &'a Path) -> Result<Self, IoError> {
        let name = sheet_name(name);
        let worksheet = workbook
            .add_worksheet()
            .set_name(&name)
            .map_err(|e| IoError::write(path, format!("sheet '{name}': {e}")))?;
        Ok(Self {
            worksheet,
            path,
            row: 0,
        })
    }

    fn header(&mut self, headers: &[&str]) -> Result<(), IoError> {
        let cells: Vec<Cell> = headers.iter().map(|h| Cell::text(*h)).collect();
        self.row(&cells)
    }

    fn row(&mut self, cells: &[Cell]) -> Result<(), IoError> {
        for (col, cell) in cells.iter().enumerate() {
            let col = col as u16;
            let written: Result<_, XlsxError> = match cell {
                Cell::Empty => continue,
                Cell::Text(s) => self.worksheet.write_string(self.row, col, s).map(|_| ()),
                Cell::Number(n) => self.worksheet.write_number(self.row, col, *n).map(|_| ()),
            };
            written.map_err(|e| {
                IoError::write(self.path, format!("cell ({}, {col}): {e}", self.row))
            })?;
        }
        self.row += 1;
        Ok(())
    }

    /// Two-column `Field` / `Value` sheet.
    fn vertical<'f>(
        &mut self,
        fields: impl IntoIterator<Item = (&'f str, Cell)>,
    ) -> Result<(), IoError> {
        self.header(&["Field", "Value"])?;
        for (field, value) in fields {
            self.row(&[Cell::text(field), value])?;
        }
        Ok(())
    }
}

/// Sheet names may not contain `[]:*?/\` and are capped at 31 characters.
fn sheet_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| if "[]:*?/\\".contains(c) { '_' } else { c })
        .take(SHEET_NAME_MAX)
        .collect();
    if cleaned.is_empty() {
        "Sheet".to_string()
    } else {
        cleaned
    }
}

/// Fixed sheets of a per-document workbook.
const DOCUMENT_SHEETS: [&str; 6] = [
    "Header",
    "EstimatePrice",
    "Items",
    "Itog_Current",
    "Itog_Base",
    "LSR_Cur",
];

/// Sheet names already taken in one workbook, compared case-insensitively
/// the way Excel does.
struct SheetNames {
    used: HashSet<String>,
}

impl SheetNames {
    fn reserving(names: &[&str]) -> Self {
        Self {
            used: names.iter().map(|n| n.to_lowercase()).collect(),
        }
    }

    /// Sanitized `name`, suffixed `_1`, `_2`, ... while it collides with a
    /// taken name. The suffix replaces trailing characters at the length cap.
    fn claim(&mut self, name: &str) -> String {
        let base = sheet_name(name);
        let mut candidate = base.clone();
        let mut n = 1;
        while !self.used.insert(candidate.to_lowercase()) {
            let suffix = format!("_{n}");
            let keep = SHEET_NAME_MAX - suffix.len();
            candidate = base.chars().take(keep).collect::<String>() + &suffix;
            n += 1;
        }
        candidate
    }
}

fn save(mut workbook: Workbook, path: &Path) -> Result<(), IoError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| IoError::write(path, e))?;
    }
    workbook.save(path).map_err(|e| IoError::write(path, e))
}

fn amount(value: smeta_rollup::Amount) -> Cell {
    Cell::Number(value.to_f64())
}

fn optional(value: Option<u32>) -> Cell {
    value.map_or(Cell::Empty, |v| Cell::Number(f64::from(v)))
}

fn unit_cells(unit: &UnitMetric) -> [Cell; 2] {
    match unit {
        UnitMetric::Blank => [Cell::Empty, Cell::Empty],
        UnitMetric::Computed { tep, metric } => [Cell::Number(*tep), Cell::Number(*metric)],
    }
}

fn flat_cells(record: &FlatRecord) -> impl Iterator<Item = (&str, Cell)> {
    record.iter().map(|(k, v)| (k, Cell::text(v)))
}

fn rollup_cells(rollup: &FinancialRollup) -> impl Iterator<Item = (&'static str, Cell)> {
    rollup.labelled().into_iter().map(|(label, value)| (label, amount(value)))
}

// ============================================================================
// Combined report
// ============================================================================

fn main_row(row: &DetailRow) -> Vec<Cell> {
    let id = &row.identity;
    vec![
        Cell::text(&row.line_number),
        Cell::text(&row.reason),
        Cell::text(&row.description),
        amount(row.building),
        amount(row.mounting),
        amount(row.equipment),
        amount(row.other),
        amount(row.total),
        optional(id.year),
        optional(id.quarter),
        Cell::text(&id.name),
        Cell::text(&id.name2),
        Cell::text(&id.object_type),
        Cell::text(&row.group),
        Cell::text(&row.keyword),
        Cell::text(&id.num1),
        Cell::text(&id.num2),
        Cell::text(&row.file_name),
    ]
}

fn identity_prefix(id: &RowIdentity) -> Vec<Cell> {
    vec![
        Cell::text(&id.object_type),
        Cell::text(&id.name),
        Cell::text(&id.name2),
        Cell::text(&id.num1),
        Cell::text(&id.num2),
    ]
}

fn grouped_row(row: &GroupedRow) -> Vec<Cell> {
    let mut cells = identity_prefix(&row.identity);
    cells.push(Cell::text(&row.group));
    cells.push(optional(row.identity.year));
    cells.push(optional(row.identity.quarter));
    cells.push(amount(row.total));
    cells.extend(unit_cells(&row.unit));
    cells
}

fn detailed_row(row: &DetailedRow) -> Vec<Cell> {
    let mut cells = identity_prefix(&row.identity);
    cells.push(optional(row.identity.year));
    cells.push(optional(row.identity.quarter));
    cells.push(amount(row.total));
    cells.extend(unit_cells(&row.unit));
    cells
}

/// Write `MainData`, `GroupedData` and `DetailedData`.
pub fn write_combined_report(report: &CorpusReport, path: &Path) -> Result<(), IoError> {
    let mut workbook = Workbook::new();

    let mut sheet = SheetWriter::new(&mut workbook, "MainData", path)?;
    sheet.header(&MAIN_HEADERS)?;
    for row in &report.main {
        sheet.row(&main_row(row))?;
    }

    let mut sheet = SheetWriter::new(&mut workbook, "GroupedData", path)?;
    sheet.header(&GROUPED_HEADERS)?;
    for row in &report.grouped {
        sheet.row(&grouped_row(row))?;
    }

    let mut sheet = SheetWriter::new(&mut workbook, "DetailedData", path)?;
    sheet.header(&DETAILED_HEADERS)?;
    for row in &report.detailed {
        sheet.row(&detailed_row(row))?;
    }

    save(workbook, path)?;
    info!(
        path = %path.display(),
        main = report.main.len(),
        grouped = report.grouped.len(),
        "wrote combined report"
    );
    Ok(())
}

// ============================================================================
// Per-document workbook + LSR summary
// ============================================================================

/// LSR column names, header fields then rollup labels.
pub fn lsr_headers() -> Vec<&'static str> {
    let mut headers = LSR_HEADER_FIELDS.to_vec();
    headers.extend(FinancialRollup::default().labelled().map(|(label, _)| label));
    headers
}

fn lsr_row(doc: &DocumentSummary) -> Vec<Cell> {
    let mut cells: Vec<Cell> = LSR_HEADER_FIELDS
        .iter()
        .map(|field| Cell::text(doc.header.field(field)))
        .collect();
    cells.extend(rollup_cells(&doc.rollup_current).map(|(_, value)| value));
    cells
}

/// Union of item field names in first-seen order, section columns first.
fn item_columns(doc: &DocumentSummary) -> Vec<&str> {
    let mut columns: Vec<&str> = vec!["SectionCode", "SectionName"];
    for item in &doc.items {
        for key in item.fields.keys() {
            if !columns.contains(&key) {
                columns.push(key);
            }
        }
    }
    columns
}

/// Write `<stem>.xlsx` for one document into `dir`. Returns the path written.
pub fn write_document_workbook(doc: &DocumentSummary, dir: &Path) -> Result<PathBuf, IoError> {
    let stem = Path::new(&doc.source.file_name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string());
    let path = dir.join(format!("{stem}.xlsx"));
    let mut workbook = Workbook::new();

    SheetWriter::new(&mut workbook, "Header", &path)?
        .vertical(doc.header.fields().into_iter().map(|(k, v)| (k, Cell::text(v))))?;

    SheetWriter::new(&mut workbook, "EstimatePrice", &path)?.vertical(flat_cells(&doc.flat_summary))?;

    let mut names = SheetNames::reserving(&DOCUMENT_SHEETS);
    for (name, block) in doc.blocks.iter() {
        let name = names.claim(name);
        SheetWriter::new(&mut workbook, &name, &path)?.vertical(flat_cells(block))?;
    }

    let columns = item_columns(doc);
    let mut items = SheetWriter::new(&mut workbook, "Items", &path)?;
    items.header(&columns)?;
    for item in &doc.items {
        let cells: Vec<Cell> = columns
            .iter()
            .map(|c| item.fields.get(c).map_or(Cell::Empty, Cell::text))
            .collect();
        items.row(&cells)?;
    }

    SheetWriter::new(&mut workbook, "Itog_Current", &path)?.vertical(rollup_cells(&doc.rollup_current))?;
    SheetWriter::new(&mut workbook, "Itog_Base", &path)?.vertical(rollup_cells(&doc.rollup_base))?;

    let mut lsr = SheetWriter::new(&mut workbook, "LSR_Cur", &path)?;
    lsr.header(&lsr_headers())?;
    lsr.row(&lsr_row(doc))?;

    save(workbook, &path)?;
    Ok(path)
}

/// One `LSR_Cur` sheet with a row per processed document.
pub fn write_lsr_summary(documents: &[DocumentSummary], path: &Path) -> Result<(), IoError> {
    let mut workbook = Workbook::new();
    let mut sheet = SheetWriter::new(&mut workbook, "LSR_Cur", path)?;
    sheet.header(&lsr_headers())?;
    for doc in documents {
        sheet.row(&lsr_row(doc))?;
    }
    save(workbook, path)?;
    info!(path = %path.display(), rows = documents.len(), "wrote LSR summary");
    Ok(())
}
