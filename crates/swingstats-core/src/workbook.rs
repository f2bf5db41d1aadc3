// In-memory workbook model: named sheets of typed cells.
//
// SwingVision exports are `.xlsx` files with Settings, Points and Shots
// sheets. Sheets can also be built from CSV text, which is how the tests and
// CSV re-exports feed the same pipeline.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use calamine::{open_workbook, Data, Reader, Xlsx, XlsxError};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use tracing::debug;

use crate::error::IngestError;

// ---------------------------------------------------------------------------
// Cells
// ---------------------------------------------------------------------------

/// A single spreadsheet value.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
    DateTime(NaiveDateTime),
}

static EMPTY_CELL: Cell = Cell::Empty;

/// Accepted textual timestamp layouts, tried in order.
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
];

/// Parse a textual timestamp. Offsets are converted to UTC; a bare date is
/// taken as midnight.
pub fn parse_datetime(raw: &str) -> Option<NaiveDateTime> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Render a number the way it reads in a spreadsheet: integral values lose
/// their trailing `.0` so score tokens like 15 stay "15".
fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

impl Cell {
    /// Interpret a raw CSV field: blank is empty, numeric text is a number,
    /// anything else stays text.
    pub fn from_csv_field(field: &str) -> Self {
        let trimmed = field.trim();
        if trimmed.is_empty() {
            return Cell::Empty;
        }
        match trimmed.parse::<f64>() {
            Ok(n) if n.is_finite() => Cell::Number(n),
            _ => Cell::Text(field.to_string()),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// Trimmed text rendering, `None` for empty cells.
    pub fn as_text(&self) -> Option<String> {
        match self {
            Cell::Empty => None,
            Cell::Text(s) => {
                let t = s.trim();
                (!t.is_empty()).then(|| t.to_string())
            }
            Cell::Number(n) => Some(format_number(*n)),
            Cell::Bool(b) => Some(if *b { "True" } else { "False" }.to_string()),
            Cell::DateTime(dt) => Some(dt.format("%Y-%m-%d %H:%M:%S").to_string()),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Number(n) => Some(*n),
            Cell::Text(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
            _ => None,
        }
    }

    /// Non-negative whole number (set, game, point and shot indices).
    pub fn as_u32(&self) -> Option<u32> {
        let n = self.as_f64()?;
        if n.fract() != 0.0 || n < 0.0 || n > u32::MAX as f64 {
            return None;
        }
        Some(n as u32)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Cell::Bool(b) => Some(*b),
            Cell::Number(n) => Some(*n != 0.0),
            Cell::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "yes" | "y" | "1" => Some(true),
                "false" | "no" | "n" | "0" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn as_datetime(&self) -> Option<NaiveDateTime> {
        match self {
            Cell::DateTime(dt) => Some(*dt),
            Cell::Text(s) => parse_datetime(s),
            _ => None,
        }
    }

    fn from_xlsx(data: &Data) -> Self {
        match data {
            Data::Empty => Cell::Empty,
            Data::String(s) => {
                if s.trim().is_empty() {
                    Cell::Empty
                } else {
                    Cell::Text(s.clone())
                }
            }
            Data::Float(f) => Cell::Number(*f),
            Data::Int(i) => Cell::Number(*i as f64),
            Data::Bool(b) => Cell::Bool(*b),
            Data::DateTime(dt) => dt
                .as_datetime()
                .map(Cell::DateTime)
                .unwrap_or_else(|| Cell::Number(dt.as_f64())),
            Data::DateTimeIso(s) => parse_datetime(s)
                .map(Cell::DateTime)
                .unwrap_or_else(|| Cell::Text(s.clone())),
            Data::DurationIso(s) => Cell::Text(s.clone()),
            Data::Error(e) => {
                debug!("treating spreadsheet error cell {:?} as empty", e);
                Cell::Empty
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Sheets
// ---------------------------------------------------------------------------

/// One worksheet: a header row plus data rows. Rows may be shorter than the
/// header; missing trailing cells read as empty.
#[derive(Debug, Clone, PartialEq)]
pub struct Sheet {
    name: String,
    headers: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl Sheet {
    pub fn new(name: impl Into<String>, headers: Vec<String>, rows: Vec<Vec<Cell>>) -> Self {
        Self {
            name: name.into(),
            headers: headers.into_iter().map(|h| h.trim().to_string()).collect(),
            rows,
        }
    }

    /// Build a sheet from CSV text whose first record is the header row.
    pub fn from_csv_reader<R: Read>(name: &str, rdr: R) -> Result<Self, csv::Error> {
        let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(rdr);
        let headers = reader
            .headers()?
            .iter()
            .map(|h| h.to_string())
            .collect::<Vec<_>>();
        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            rows.push(record.iter().map(Cell::from_csv_field).collect());
        }
        Ok(Self::new(name, headers, rows))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Index of the column with exactly this (trimmed) header.
    pub fn column(&self, header: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == header)
    }

    pub fn cell(&self, row: usize, col: usize) -> &Cell {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .unwrap_or(&EMPTY_CELL)
    }

    /// Rows with at least one non-empty cell. Exports often carry trailing
    /// blank rows.
    pub fn is_blank_row(&self, row: usize) -> bool {
        self.rows
            .get(row)
            .map_or(true, |r| r.iter().all(Cell::is_empty))
    }
}

// ---------------------------------------------------------------------------
// Workbooks
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Workbook {
    sheets: Vec<Sheet>,
}

impl Workbook {
    pub fn new(sheets: Vec<Sheet>) -> Self {
        Self { sheets }
    }

    /// Read every worksheet of an `.xlsx` file. The first row of each sheet is
    /// taken as its header row.
    pub fn open_xlsx(path: &Path) -> Result<Self, IngestError> {
        let workbook_error = |message: String| IngestError::Workbook {
            path: path.to_path_buf(),
            message,
        };

        let mut xlsx: Xlsx<BufReader<File>> =
            open_workbook(path).map_err(|e: XlsxError| workbook_error(e.to_string()))?;

        let mut sheets = Vec::new();
        for name in xlsx.sheet_names() {
            let range = xlsx
                .worksheet_range(&name)
                .map_err(|e| workbook_error(format!("sheet `{name}`: {e}")))?;
            let mut rows = range.rows();
            let headers = rows
                .next()
                .map(|r| r.iter().map(|c| c.to_string()).collect())
                .unwrap_or_default();
            let data = rows
                .map(|r| r.iter().map(Cell::from_xlsx).collect())
                .collect();
            sheets.push(Sheet::new(name, headers, data));
        }

        debug!("read {} sheets from {}", sheets.len(), path.display());
        Ok(Self { sheets })
    }

    /// Read a directory of CSV files, one sheet per `<Sheet>.csv`, named
    /// after the file stem.
    pub fn open_csv_dir(dir: &Path) -> Result<Self, IngestError> {
        let workbook_error = |message: String| IngestError::Workbook {
            path: dir.to_path_buf(),
            message,
        };

        let entries = std::fs::read_dir(dir).map_err(|e| workbook_error(e.to_string()))?;
        let mut paths = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| workbook_error(e.to_string()))?.path();
            if path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("csv")) {
                paths.push(path);
            }
        }
        paths.sort();

        let mut sheets = Vec::new();
        for path in paths {
            let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let file = std::fs::File::open(&path)
                .map_err(|e| workbook_error(format!("{}: {e}", path.display())))?;
            let sheet = Sheet::from_csv_reader(name, file)
                .map_err(|e| workbook_error(format!("{}: {e}", path.display())))?;
            sheets.push(sheet);
        }

        debug!("read {} CSV sheets from {}", sheets.len(), dir.display());
        Ok(Self { sheets })
    }

    /// Open an export: a directory is read as CSV sheets, anything else as
    /// an `.xlsx` workbook.
    pub fn open(path: &Path) -> Result<Self, IngestError> {
        if path.is_dir() {
            Self::open_csv_dir(path)
        } else {
            Self::open_xlsx(path)
        }
    }

    pub fn sheet_names(&self) -> Vec<&str> {
        self.sheets.iter().map(|s| s.name()).collect()
    }

    pub fn sheet(&self, name: &str) -> Result<&Sheet, IngestError> {
        self.sheets
            .iter()
            .find(|s| s.name == name)
            .ok_or_else(|| IngestError::MissingSheet {
                sheet: name.to_string(),
            })
    }
}
