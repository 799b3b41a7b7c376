use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use csv::StringRecord;
use tracing::{debug, warn};

use crate::error::{EtlError, Result, RowError};
use crate::record::*;

const DELIMITER: u8 = b';';

const TIMESTAMP_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];
const DATE_FORMAT: &str = "%Y-%m-%d";

/// Records that survived parsing, plus how many data rows were dropped.
#[derive(Debug, Default)]
pub struct ParseOutcome {
    pub records: Vec<Record>,
    pub skipped: usize,
}

/// Parse a semicolon-delimited export into records.
///
/// Only structural problems (unreadable header, missing columns) fail the
/// whole parse. Individual rows that do not fit are logged and skipped.
pub fn parse_export(text: &str) -> Result<ParseOutcome> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(DELIMITER)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let layout = Layout::from_headers(reader.headers()?)?;
    let mut outcome = ParseOutcome::default();

    for row in reader.records() {
        let row = match row {
            Ok(row) => row,
            Err(e) => {
                let line = e.position().map(|p| p.line());
                warn!(?line, error = %e, "Skipping unreadable row");
                outcome.skipped += 1;
                continue;
            }
        };
        match layout.record(&row) {
            Ok(record) => outcome.records.push(record),
            Err(e) => {
                let line = row.position().map(|p| p.line());
                warn!(?line, error = %e, "Skipping malformed row");
                outcome.skipped += 1;
            }
        }
    }

    debug!(
        records = outcome.records.len(),
        skipped = outcome.skipped,
        "Parsed export"
    );
    Ok(outcome)
}

/// Where each known label sits in the header.
struct Layout {
    width: usize,
    index: HashMap<&'static str, usize>,
}

impl Layout {
    fn from_headers(headers: &StringRecord) -> Result<Self> {
        let mut index = HashMap::new();
        let mut missing = Vec::new();
        for label in SOURCE_COLUMNS {
            match headers.iter().position(|h| h == label) {
                Some(i) => {
                    index.insert(label, i);
                }
                None => missing.push(label.to_string()),
            }
        }
        if !missing.is_empty() {
            return Err(EtlError::MissingColumns(missing));
        }
        Ok(Layout {
            width: headers.len(),
            index,
        })
    }

    fn get<'r>(&self, row: &'r StringRecord, column: &'static str) -> &'r str {
        self.index
            .get(column)
            .and_then(|&i| row.get(i))
            .unwrap_or_default()
    }

    fn record(&self, row: &StringRecord) -> std::result::Result<Record, RowError> {
        if row.len() != self.width {
            return Err(RowError::FieldCount {
                expected: self.width,
                found: row.len(),
            });
        }

        let casualties = int(CASUALTIES, self.get(row, CASUALTIES))?;
        let injured = int(INJURED, self.get(row, INJURED))?;
        let captured = int(CAPTURED, self.get(row, CAPTURED))?;
        let total_soldiers_casualties =
            Record::soldier_losses(casualties, injured, captured).ok_or(RowError::Overflow)?;

        Ok(Record {
            start: timestamp(START, self.get(row, START))?,
            end: timestamp(END, self.get(row, END))?,
            entry_date: date(ENTRY_DATE, self.get(row, ENTRY_DATE))?,
            country: text(self.get(row, COUNTRY)),
            event: text(self.get(row, EVENT)),
            oblast: text(self.get(row, OBLAST)),
            casualties,
            injured,
            captured,
            civilian_casualties: int(CIVILIAN_CASUALTIES, self.get(row, CIVILIAN_CASUALTIES))?,
            new_recruits: int(NEW_RECRUITS, self.get(row, NEW_RECRUITS))?,
            combat_intensity: float(COMBAT_INTENSITY, self.get(row, COMBAT_INTENSITY))?,
            territory_status: text(self.get(row, TERRITORY_STATUS)),
            percentage_occupied: float(PERCENTAGE_OCCUPIED, self.get(row, PERCENTAGE_OCCUPIED))?,
            area_occupied: float(AREA_OCCUPIED, self.get(row, AREA_OCCUPIED))?,
            total_soldiers_casualties,
        })
    }
}

fn invalid(column: &'static str, value: &str, expected: &'static str) -> RowError {
    RowError::Invalid {
        column,
        value: value.to_string(),
        expected,
    }
}

fn text(raw: &str) -> Option<String> {
    if raw.is_empty() {
        None
    } else {
        Some(raw.to_string())
    }
}

/// Only an absent cell counts as zero. A non-numeric value means the row does
/// not fit the column types, so the row is skipped instead of summed as 0.
fn int(column: &'static str, raw: &str) -> std::result::Result<i32, RowError> {
    if raw.is_empty() {
        return Ok(0);
    }
    if let Ok(v) = raw.parse::<i32>() {
        return Ok(v);
    }
    // Exports sometimes spell whole numbers as "3.0".
    match raw.parse::<f64>() {
        Ok(v) if v.fract() == 0.0 && v >= i32::MIN as f64 && v <= i32::MAX as f64 => Ok(v as i32),
        _ => Err(invalid(column, raw, "an integer")),
    }
}

fn float(column: &'static str, raw: &str) -> std::result::Result<f64, RowError> {
    if raw.is_empty() {
        return Ok(0.0);
    }
    match raw.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(invalid(column, raw, "a number")),
    }
}

fn timestamp(
    column: &'static str,
    raw: &str,
) -> std::result::Result<Option<NaiveDateTime>, RowError> {
    if raw.is_empty() {
        return Ok(None);
    }
    parse_timestamp(raw)
        .map(Some)
        .ok_or_else(|| invalid(column, raw, "a timestamp"))
}

fn date(column: &'static str, raw: &str) -> std::result::Result<Option<NaiveDate>, RowError> {
    if raw.is_empty() {
        return Ok(None);
    }
    NaiveDate::parse_from_str(raw, DATE_FORMAT)
        .ok()
        .or_else(|| parse_timestamp(raw).map(|ts| ts.date()))
        .map(Some)
        .ok_or_else(|| invalid(column, raw, "a date"))
}

/// Offsets are dropped and the wall-clock time kept, matching how Postgres
/// stores a zoned literal in a `TIMESTAMP` column.
fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.naive_local());
    }
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(raw, DATE_FORMAT)
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}
