// Duplicate detection over the composite key (EnquiryNo, Date, FlightNumber)
//
// Two consumers share the same key grouping:
// - review mode copies every member of a duplicated key into a side table
// - drop mode removes every member of a duplicated key from the table
// Not Flown rows are set aside first in both, so they never count as copies of
// real flights.

use crate::dates::parse_flight_date;
use crate::table::{write_workbook, Table};
use crate::types::{Result, Status, TechlogError};
use chrono::NaiveDate;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const KEY_COLUMNS: [&str; 3] = ["EnquiryNo", "Date", "FlightNumber"];
pub const STATUS_COLUMN: &str = "Status";

pub const DUPLICATES_SHEET: &str = "Duplicates";
pub const NOT_FLOWN_SHEET: &str = "Not_flown";
pub const DUPLICATE_REASON_COLUMN: &str = "DuplicateReason";
pub const DUPLICATE_REASON: &str = "Same EnquiryNo, Date and FlightNumber as another record";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum DateKey {
    Day(NaiveDate),
    // Unparseable dates compare by their trimmed text
    Raw(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct DedupKey {
    enquiry_no: String,
    date: DateKey,
    flight_number: String,
}

#[derive(Debug, Clone, Copy)]
struct KeyColumns {
    enquiry_no: usize,
    date: usize,
    flight_number: usize,
}

impl KeyColumns {
    fn locate(table: &Table) -> Result<Self> {
        let missing: Vec<String> = KEY_COLUMNS
            .iter()
            .filter(|c| table.column_index(c).is_none())
            .map(|c| c.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(TechlogError::MissingKeyColumns {
                missing,
                available: table.headers().to_vec(),
            });
        }

        let index = |name: &str| table.column_index(name).unwrap_or_default();
        Ok(Self {
            enquiry_no: index(KEY_COLUMNS[0]),
            date: index(KEY_COLUMNS[1]),
            flight_number: index(KEY_COLUMNS[2]),
        })
    }

    fn key(&self, table: &Table, row: usize) -> DedupKey {
        let cell = |col: usize| table.cell(row, col).unwrap_or_default().trim().to_string();
        let raw_date = cell(self.date);
        let date = match parse_flight_date(&raw_date) {
            Some(day) => DateKey::Day(day),
            None => DateKey::Raw(raw_date),
        };
        DedupKey {
            enquiry_no: cell(self.enquiry_no),
            date,
            flight_number: cell(self.flight_number),
        }
    }
}

/// Rows among `candidates` whose key is shared with at least one other candidate.
/// Returned in table order.
fn duplicated_rows(table: &Table, columns: KeyColumns, candidates: &[usize]) -> Vec<usize> {
    let mut groups: HashMap<DedupKey, Vec<usize>> = HashMap::new();
    for &row in candidates {
        groups.entry(columns.key(table, row)).or_default().push(row);
    }

    let mut rows: Vec<usize> = groups
        .into_values()
        .filter(|members| members.len() > 1)
        .flatten()
        .collect();
    rows.sort_unstable();
    rows
}

/// Split rows into (not flown, everything else). Without a Status column no row
/// is treated as not flown.
fn partition_not_flown(table: &Table) -> (Vec<usize>, Vec<usize>) {
    let Some(status) = table.column_index(STATUS_COLUMN) else {
        return (Vec::new(), (0..table.len()).collect());
    };
    (0..table.len()).partition(|&row| {
        table
            .cell(row, status)
            .and_then(Status::parse_loose)
            .map_or(false, |s| s == Status::NotFlown)
    })
}

/// Side tables produced for manual review.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewReport {
    pub duplicates: Table,
    pub not_flown: Table,
}

impl ReviewReport {
    /// Write the non-empty sheets into `dir`.
    pub fn write(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        write_workbook(
            dir,
            &[(DUPLICATES_SHEET, &self.duplicates), (NOT_FLOWN_SHEET, &self.not_flown)],
        )
    }
}

/// Review mode: collect every row that shares its key with another row, and
/// optionally the Not Flown rows. Returns `None` when both side tables are empty.
pub fn flag_for_review(table: &Table, split_not_flown: bool) -> Result<Option<ReviewReport>> {
    let columns = KeyColumns::locate(table)?;

    let (not_flown_rows, remaining) = if split_not_flown {
        if table.column_index(STATUS_COLUMN).is_none() {
            warn!("table has no Status column; Not_flown sheet will be empty");
        }
        partition_not_flown(table)
    } else {
        (Vec::new(), (0..table.len()).collect())
    };

    let duplicate_rows = duplicated_rows(table, columns, &remaining);
    let duplicates = table
        .select_rows(duplicate_rows)
        .with_constant_column(DUPLICATE_REASON_COLUMN, DUPLICATE_REASON);
    let not_flown = table.select_rows(not_flown_rows);

    info!(
        duplicates = duplicates.len(),
        not_flown = not_flown.len(),
        "flagged rows for review"
    );

    if duplicates.is_empty() && not_flown.is_empty() {
        return Ok(None);
    }
    Ok(Some(ReviewReport {
        duplicates,
        not_flown,
    }))
}

/// Drop mode: remove Not Flown rows, then every row whose key is not unique.
pub fn drop_duplicates(table: &Table) -> Result<Table> {
    let columns = KeyColumns::locate(table)?;
    let (_, flown) = partition_not_flown(table);
    let duplicate_rows = duplicated_rows(table, columns, &flown);

    let kept: Vec<usize> = flown
        .into_iter()
        .filter(|row| duplicate_rows.binary_search(row).is_err())
        .collect();

    info!(
        input = table.len(),
        kept = kept.len(),
        dropped_duplicates = duplicate_rows.len(),
        "dropped duplicate and not-flown rows"
    );
    Ok(table.select_rows(kept))
}

/// Review an existing table file and write the workbook into `out_dir`.
/// Returns the workbook directory when anything was written.
pub fn review_file(table_path: &Path, out_dir: &Path, split_not_flown: bool) -> Result<Option<PathBuf>> {
    let table = Table::read_csv(table_path)?;
    match flag_for_review(&table, split_not_flown)? {
        Some(report) => {
            report.write(out_dir)?;
            Ok(Some(out_dir.to_path_buf()))
        }
        None => Ok(None),
    }
}
