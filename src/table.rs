// Tabular form of the flight data and its CSV artifacts
use crate::dates::{normalize_time, parse_flight_date};
use crate::types::{FlightRecord, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Column order of the canonical flight table.
pub const CANONICAL_COLUMNS: &[&str] = &[
    "EnquiryNo",
    "Date",
    "FlightNumber",
    "Registration",
    "Dep",
    "Arr",
    "STD",
    "STA",
    "ETA",
    "ETD",
    "ATD",
    "ATA",
    "TO",
    "LDG",
    "FuelBurn",
    "DelayCode",
    "DelayDuration",
    "DelayReason",
    "Pax",
    "Payload",
    "ReasonOfCancellation",
    "Status",
    "Rotation",
];

/// Provenance and the sort keys used for rotations, kept in the extended table.
pub const EXTENDED_COLUMNS: &[&str] = &["filename", "SortDate", "SortATD"];

/// Headers plus string rows. Every row has exactly one cell per header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new<S: Into<String>>(headers: impl IntoIterator<Item = S>) -> Self {
        Self {
            headers: headers.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    pub fn cell(&self, row: usize, column: usize) -> Option<&str> {
        self.rows.get(row)?.get(column).map(String::as_str)
    }

    /// Append a row, padding or truncating it to the header width.
    pub fn push_row(&mut self, mut row: Vec<String>) {
        row.resize(self.headers.len(), String::new());
        self.rows.push(row);
    }

    /// Same headers, only the given rows, in the given order.
    pub fn select_rows(&self, indices: impl IntoIterator<Item = usize>) -> Table {
        let mut out = Table::new(self.headers.iter().cloned());
        for i in indices {
            if let Some(row) = self.rows.get(i) {
                out.rows.push(row.clone());
            }
        }
        out
    }

    /// Set `name` to the same value in every row, appending the column if
    /// the table does not have it yet.
    pub fn with_constant_column(mut self, name: &str, value: &str) -> Table {
        match self.column_index(name) {
            Some(col) => {
                for row in &mut self.rows {
                    row[col] = value.to_string();
                }
            }
            None => {
                self.headers.push(name.to_string());
                for row in &mut self.rows {
                    row.push(value.to_string());
                }
            }
        }
        self
    }

    /// Keep the named columns in the given order. Absent columns come out empty.
    pub fn project(&self, columns: &[&str]) -> Table {
        let positions: Vec<Option<usize>> = columns.iter().map(|c| self.column_index(c)).collect();
        let mut out = Table::new(columns.iter().copied());
        for row in &self.rows {
            out.rows.push(
                positions
                    .iter()
                    .map(|p| p.and_then(|i| row.get(i).cloned()).unwrap_or_default())
                    .collect(),
            );
        }
        out
    }

    pub fn from_records(records: &[FlightRecord]) -> Table {
        let mut table = Table::new(CANONICAL_COLUMNS.iter().copied());
        for record in records {
            table.rows.push(canonical_row(record));
        }
        table
    }

    /// Canonical columns followed by filename and the normalized sort keys.
    pub fn extended_from_records(records: &[FlightRecord]) -> Table {
        let headers = CANONICAL_COLUMNS.iter().chain(EXTENDED_COLUMNS.iter()).copied();
        let mut table = Table::new(headers);
        for record in records {
            let mut row = canonical_row(record);
            row.push(record.filename.clone());
            row.push(
                record
                    .date
                    .as_deref()
                    .and_then(parse_flight_date)
                    .map(|d| d.format("%Y-%m-%d").to_string())
                    .unwrap_or_default(),
            );
            row.push(record.atd.as_deref().and_then(normalize_time).unwrap_or_default());
            table.rows.push(row);
        }
        table
    }

    pub fn read_csv(path: &Path) -> Result<Table> {
        let mut reader = csv::ReaderBuilder::new().flexible(true).from_path(path)?;
        let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
        let mut table = Table::new(headers);
        for record in reader.records() {
            let record = record?;
            table.push_row(record.iter().map(str::to_string).collect());
        }
        debug!(path = %path.display(), rows = table.len(), "read table");
        Ok(table)
    }

    pub fn write_csv(&self, path: &Path) -> Result<()> {
        let mut writer = csv::Writer::from_path(path)?;
        writer.write_record(&self.headers)?;
        for row in &self.rows {
            writer.write_record(row)?;
        }
        writer.flush()?;
        debug!(path = %path.display(), rows = self.len(), "wrote table");
        Ok(())
    }
}

fn opt(value: &Option<String>) -> String {
    value.clone().unwrap_or_default()
}

fn canonical_row(r: &FlightRecord) -> Vec<String> {
    vec![
        r.enquiry_no.clone(),
        opt(&r.date),
        opt(&r.flight_number),
        opt(&r.registration),
        opt(&r.dep),
        opt(&r.arr),
        opt(&r.std),
        opt(&r.sta),
        opt(&r.eta),
        opt(&r.etd),
        opt(&r.atd),
        opt(&r.ata),
        opt(&r.takeoff),
        opt(&r.landing),
        r.fuel_burn.map(|f| f.to_string()).unwrap_or_default(),
        opt(&r.delay_code),
        opt(&r.delay_duration),
        opt(&r.delay_reason),
        opt(&r.pax),
        opt(&r.payload),
        opt(&r.reason_of_cancellation),
        r.status.to_string(),
        r.rotation.to_string(),
    ]
}

/// Write a set of named sheets into `dir`, one `<name>.csv` per non-empty sheet.
/// Nothing is created when every sheet is empty.
pub fn write_workbook(dir: &Path, sheets: &[(&str, &Table)]) -> Result<Vec<PathBuf>> {
    let mut written = Vec::new();
    if sheets.iter().all(|(_, t)| t.is_empty()) {
        return Ok(written);
    }

    fs::create_dir_all(dir)?;
    for (name, table) in sheets {
        if table.is_empty() {
            continue;
        }
        let path = dir.join(format!("{name}.csv"));
        table.write_csv(&path)?;
        written.push(path);
    }
    Ok(written)
}
