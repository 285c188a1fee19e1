use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::anyhow;
use calamine::{open_workbook_auto, Reader};
use tracing::{debug, warn};

use crate::error::PeriodError;
use crate::models::Period;

const BOM: char = '\u{feff}';

/// One export as read from disk: header names and raw string cells.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|header| header == name)
    }

    /// Missing trailing cells read as empty strings.
    pub fn cell(&self, row: usize, column: usize) -> &str {
        self.rows
            .get(row)
            .and_then(|cells| cells.get(column))
            .map(String::as_str)
            .unwrap_or("")
    }
}

const WORKBOOK_EXTENSIONS: [&str; 5] = ["xlsx", "xlsm", "xlsb", "xls", "ods"];

/// First header loses a leading BOM; every header is trimmed.
fn clean_headers<'h, I>(raw: I) -> Vec<String>
where
    I: IntoIterator<Item = &'h str>,
{
    raw.into_iter()
        .enumerate()
        .map(|(index, header)| {
            let header = if index == 0 {
                header.trim_start_matches(BOM)
            } else {
                header
            };
            header.trim().to_string()
        })
        .collect()
}

fn finish_table(
    period: Period,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> Result<RawTable, PeriodError> {
    if headers.iter().all(String::is_empty) {
        return Err(PeriodError::unreadable(period, "no header row"));
    }
    debug!(%period, columns = headers.len(), rows = rows.len(), "read period table");
    Ok(RawTable { headers, rows })
}

pub fn read_table<R: Read>(period: Period, reader: R) -> Result<RawTable, PeriodError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let headers = clean_headers(
        reader
            .headers()
            .map_err(|err| PeriodError::unreadable(period, err))?
            .iter(),
    );

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result.map_err(|err| PeriodError::unreadable(period, err))?;
        rows.push(record.iter().map(str::to_string).collect());
    }

    finish_table(period, headers, rows)
}

/// Reads the first worksheet of a workbook. Cells are rendered as text so the
/// normalizer applies the same coercion as for CSV exports.
pub fn read_workbook(period: Period, path: &Path) -> Result<RawTable, PeriodError> {
    let unreadable = |message: String| {
        PeriodError::unreadable(period, format!("{}: {message}", path.display()))
    };

    let mut workbook = open_workbook_auto(path).map_err(|err| unreadable(err.to_string()))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| unreadable("workbook has no worksheets".to_string()))?
        .map_err(|err| unreadable(err.to_string()))?;

    let mut cells = range
        .rows()
        .map(|row| row.iter().map(|cell| cell.to_string()).collect::<Vec<String>>());
    let headers = match cells.next() {
        Some(first) => clean_headers(first.iter().map(String::as_str)),
        None => Vec::new(),
    };
    let rows: Vec<Vec<String>> = cells.collect();

    finish_table(period, headers, rows)
}

fn is_workbook(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            WORKBOOK_EXTENSIONS
                .iter()
                .any(|known| known.eq_ignore_ascii_case(ext))
        })
        .unwrap_or(false)
}

/// Dispatches on the file extension: workbooks through calamine, anything
/// else as CSV.
pub fn read_table_from_path(period: Period, path: &Path) -> Result<RawTable, PeriodError> {
    if is_workbook(path) {
        return read_workbook(period, path);
    }
    let file = std::fs::File::open(path)
        .map_err(|err| PeriodError::unreadable(period, format!("{}: {err}", path.display())))?;
    read_table(period, file)
}

/// Header row of an export that is not tied to any period.
pub fn read_headers(path: &Path) -> anyhow::Result<Vec<String>> {
    match read_table_from_path(Period::First, path) {
        Ok(table) => Ok(table.headers),
        Err(PeriodError::InputUnreadable { message, .. }) => {
            Err(anyhow!("cannot read {}: {message}", path.display()))
        }
        Err(other) => Err(other.into()),
    }
}

/// Reads every supplied period file concurrently. Slots without a path stay `None`.
pub async fn load_period_tables(
    paths: [Option<PathBuf>; 3],
) -> [Option<Result<RawTable, PeriodError>>; 3] {
    let mut handles = Vec::new();
    for (period, path) in Period::ALL.into_iter().zip(paths) {
        let handle = path.map(|path| {
            tokio::task::spawn_blocking(move || read_table_from_path(period, &path))
        });
        handles.push((period, handle));
    }

    let mut tables: [Option<Result<RawTable, PeriodError>>; 3] = [None, None, None];
    for (period, handle) in handles {
        let Some(handle) = handle else {
            continue;
        };
        let loaded = match handle.await {
            Ok(result) => result,
            Err(err) => {
                warn!(%period, error = %err, "period loader task failed");
                Err(PeriodError::unreadable(period, err))
            }
        };
        tables[period.index()] = Some(loaded);
    }
    tables
}
