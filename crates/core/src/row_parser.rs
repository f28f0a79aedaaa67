//! Tabular row parsing and per-row validation.
//!
//! Input convention: UTF-8 (a leading BOM is ignored), comma delimited,
//! RFC-4180 quoting, `\n` or `\r\n` line endings, one header row naming the
//! columns. Header names are matched case-insensitively with spaces and `-`
//! folded to `_`; unrecognized columns are ignored.
//!
//! A bad row never aborts parsing: [`parse_row`] returns an
//! [`ErrorLogEntry`] and the caller moves on. Only a header that lacks a
//! required column is fatal, via [`ColumnSchema::from_header`].

use chrono::{NaiveDate, NaiveTime};
use csv::StringRecord;

use crate::error::CoreError;
use crate::import_session::{ErrorLogEntry, RowErrorKind};
use crate::toll_record::NewTollRecord;

/// Accepted calendar date formats, tried in order.
pub const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d"];

/// Accepted time format (24h).
pub const TIME_FORMAT: &str = "%H:%M:%S";

/// Maximum characters of the raw row kept in an error log entry.
pub const MAX_RAW_DATA_CHARS: usize = 256;

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

// ── Columns ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    Date,
    Time,
    EntryPoint,
    ExitPoint,
    Amount,
    VehicleId,
    CardId,
    ExternalRef,
    ExternalRowId,
}

impl Column {
    pub const ALL: [Column; 9] = [
        Column::Date,
        Column::Time,
        Column::EntryPoint,
        Column::ExitPoint,
        Column::Amount,
        Column::VehicleId,
        Column::CardId,
        Column::ExternalRef,
        Column::ExternalRowId,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Date => "date",
            Self::Time => "time",
            Self::EntryPoint => "entry_point",
            Self::ExitPoint => "exit_point",
            Self::Amount => "amount",
            Self::VehicleId => "vehicle_id",
            Self::CardId => "card_id",
            Self::ExternalRef => "external_ref",
            Self::ExternalRowId => "external_row_id",
        }
    }

    fn aliases(self) -> &'static [&'static str] {
        match self {
            Self::Date => &["date", "usage_date"],
            Self::Time => &["time", "usage_time"],
            Self::EntryPoint => &["entry_point", "entry", "entry_point_id", "entry_ic"],
            Self::ExitPoint => &["exit_point", "exit", "exit_point_id", "exit_ic"],
            Self::Amount => &["amount", "toll_amount"],
            Self::VehicleId => &["vehicle_id", "vehicle", "vehicle_number"],
            Self::CardId => &["card_id", "card", "card_number", "etc_card_number"],
            Self::ExternalRef => &["external_ref", "reference_number", "ref"],
            Self::ExternalRowId => &["external_row_id", "row_id"],
        }
    }

    pub fn is_required(self) -> bool {
        !matches!(self, Self::ExternalRef | Self::ExternalRowId)
    }

    fn index(self) -> usize {
        self as usize
    }

    fn from_header_name(name: &str) -> Option<Column> {
        let normalized = normalize_header(name);
        Column::ALL
            .into_iter()
            .find(|c| c.aliases().contains(&normalized.as_str()))
    }
}

fn normalize_header(name: &str) -> String {
    name.trim()
        .trim_start_matches('\u{feff}')
        .to_lowercase()
        .chars()
        .map(|c| if c == ' ' || c == '-' { '_' } else { c })
        .collect()
}

/// Position of each recognized column within a row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSchema {
    positions: [Option<usize>; 9],
}

impl ColumnSchema {
    /// Resolve column positions from the header row.
    ///
    /// The first occurrence of a column wins. Missing required columns are
    /// reported together in one validation error.
    pub fn from_header(header: &StringRecord) -> Result<Self, CoreError> {
        let mut positions = [None; 9];
        for (pos, name) in header.iter().enumerate() {
            if let Some(column) = Column::from_header_name(name) {
                positions[column.index()].get_or_insert(pos);
            }
        }

        let missing: Vec<&str> = Column::ALL
            .into_iter()
            .filter(|c| c.is_required() && positions[c.index()].is_none())
            .map(Column::name)
            .collect();
        if !missing.is_empty() {
            return Err(CoreError::Validation(format!(
                "Header is missing required columns: {}",
                missing.join(", ")
            )));
        }

        Ok(Self { positions })
    }

    pub fn position(&self, column: Column) -> Option<usize> {
        self.positions[column.index()]
    }

    pub fn has(&self, column: Column) -> bool {
        self.position(column).is_some()
    }
}

// ── Raw records ──────────────────────────────────────────────────────

/// One record as read from the tabular input, before validation.
#[derive(Debug, Clone)]
pub enum RawRow {
    Record(StringRecord),
    /// The reader could not produce fields (e.g. invalid UTF-8).
    Malformed { raw: String, message: String },
}

/// Strip a leading UTF-8 byte-order mark.
pub fn strip_bom(bytes: &[u8]) -> &[u8] {
    bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes)
}

/// Read every non-blank record from a complete run of CSV bytes.
///
/// The header is returned like any other record; callers decide which
/// record is the header.
pub fn read_records(bytes: &[u8]) -> Vec<RawRow> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(bytes);

    let mut rows = Vec::new();
    for result in reader.byte_records() {
        match result {
            Ok(record) => match StringRecord::from_byte_record(record) {
                Ok(record) if is_blank(&record) => {}
                Ok(record) => rows.push(RawRow::Record(record)),
                Err(err) => {
                    let raw = err
                        .into_byte_record()
                        .iter()
                        .map(|f| String::from_utf8_lossy(f).into_owned())
                        .collect::<Vec<_>>()
                        .join(",");
                    rows.push(RawRow::Malformed {
                        raw: truncate_chars(&raw, MAX_RAW_DATA_CHARS),
                        message: "row is not valid UTF-8".into(),
                    });
                }
            },
            Err(err) => rows.push(RawRow::Malformed {
                raw: String::new(),
                message: format!("unreadable row: {}", describe_csv_error(&err)),
            }),
        }
    }
    rows
}

fn describe_csv_error(err: &csv::Error) -> String {
    match err.kind() {
        csv::ErrorKind::Utf8 { .. } => "invalid UTF-8".into(),
        csv::ErrorKind::UnequalLengths { .. } => "unexpected number of fields".into(),
        _ => "malformed CSV".into(),
    }
}

/// True when every field is empty after trimming.
pub fn is_blank(record: &StringRecord) -> bool {
    record.iter().all(|f| f.trim().is_empty())
}

/// Render a record for the error log: fields joined by `,`, truncated.
pub fn raw_snippet(record: &StringRecord) -> String {
    let joined = record.iter().collect::<Vec<_>>().join(",");
    truncate_chars(&joined, MAX_RAW_DATA_CHARS)
}

fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

// ── Row validation ───────────────────────────────────────────────────

/// Validate one data row into a candidate record.
///
/// `row_number` is the 1-based index among data rows.
pub fn parse_row(
    schema: &ColumnSchema,
    row_number: u64,
    record: &StringRecord,
) -> Result<NewTollRecord, ErrorLogEntry> {
    let row = RowContext {
        schema,
        record,
        row_number,
    };

    let date_raw = row.required(Column::Date)?;
    let date = parse_date(date_raw).ok_or_else(|| {
        row.error(
            RowErrorKind::InvalidDate,
            format!("date '{date_raw}' is not a calendar date (YYYY-MM-DD)"),
        )
    })?;

    let time_raw = row.required(Column::Time)?;
    let time = parse_time(time_raw).ok_or_else(|| {
        row.error(
            RowErrorKind::InvalidTime,
            format!("time '{time_raw}' is not a 24h HH:MM:SS time"),
        )
    })?;

    let entry_point = row.required(Column::EntryPoint)?;
    let exit_point = row.required(Column::ExitPoint)?;

    let amount_raw = row.required(Column::Amount)?;
    let amount = parse_amount(amount_raw).ok_or_else(|| {
        row.error(
            RowErrorKind::InvalidAmount,
            format!("amount '{amount_raw}' is not a non-negative integer"),
        )
    })?;

    let vehicle_id = row.required(Column::VehicleId)?;
    let card_id = row.required(Column::CardId)?;

    NewTollRecord::new(
        date,
        time,
        entry_point,
        exit_point,
        amount,
        vehicle_id,
        card_id,
        field(schema, record, Column::ExternalRef),
        field(schema, record, Column::ExternalRowId),
    )
    .map_err(|e| row.error(RowErrorKind::MalformedRow, e.to_string()))
}

struct RowContext<'a> {
    schema: &'a ColumnSchema,
    record: &'a StringRecord,
    row_number: u64,
}

impl<'a> RowContext<'a> {
    fn required(&self, column: Column) -> Result<&'a str, ErrorLogEntry> {
        field(self.schema, self.record, column).ok_or_else(|| {
            self.error(
                RowErrorKind::MissingField,
                format!("missing value for column '{}'", column.name()),
            )
        })
    }

    fn error(&self, kind: RowErrorKind, message: String) -> ErrorLogEntry {
        ErrorLogEntry {
            row_number: self.row_number,
            error_type: kind,
            error_message: message,
            raw_data: raw_snippet(self.record),
        }
    }
}

/// Trimmed, non-empty cell value for `column`.
fn field<'r>(schema: &ColumnSchema, record: &'r StringRecord, column: Column) -> Option<&'r str> {
    schema
        .position(column)
        .and_then(|pos| record.get(pos))
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(value, fmt).ok())
}

pub fn parse_time(value: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(value.trim(), TIME_FORMAT).ok()
}

/// Digits only: no sign, no separators, no decimals.
pub fn parse_amount(value: &str) -> Option<i64> {
    let value = value.trim();
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    value.parse::<i64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    const HEADER: &str = "date,time,entry_point,exit_point,amount,vehicle_id,card_id,external_ref";

    fn schema() -> ColumnSchema {
        ColumnSchema::from_header(&StringRecord::from(HEADER.split(',').collect::<Vec<_>>()))
            .unwrap()
    }

    fn row(line: &str) -> StringRecord {
        StringRecord::from(line.split(',').collect::<Vec<_>>())
    }

    #[test]
    fn header_aliases_and_case_are_accepted() {
        let header = row("Usage Date,TIME,Entry-IC,exit_ic,Toll Amount,Vehicle Number,ETC Card Number");
        let schema = ColumnSchema::from_header(&header).unwrap();
        assert_eq!(schema.position(Column::Date), Some(0));
        assert_eq!(schema.position(Column::CardId), Some(6));
        assert!(!schema.has(Column::ExternalRef));
    }

    #[test]
    fn header_missing_columns_lists_them() {
        let header = row("date,time,entry_point,vehicle_id");
        assert_matches!(
            ColumnSchema::from_header(&header),
            Err(CoreError::Validation(msg))
                if msg == "Header is missing required columns: exit_point, amount, card_id"
        );
    }

    #[test]
    fn valid_row_parses() {
        let rec = parse_row(
            &schema(),
            1,
            &row("2024/03/01,08:15:00,Tokyo,Yokohama,1320,V-1,C-1,R-9"),
        )
        .unwrap();
        assert_eq!(rec.date, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        assert_eq!(rec.amount, 1320);
        assert_eq!(rec.external_ref.as_deref(), Some("R-9"));
        assert_eq!(rec.external_row_id, None);
    }

    #[test]
    fn slash_and_dash_dates_hash_identically() {
        let a = parse_row(&schema(), 1, &row("2024/03/01,08:15:00,T,Y,1,V,C,")).unwrap();
        let b = parse_row(&schema(), 2, &row("2024-03-01, 08:15:00 ,T, Y,1,V,C,")).unwrap();
        assert_eq!(a.hash, b.hash);
    }

    #[test]
    fn non_numeric_amount_is_row_error() {
        let err = parse_row(&schema(), 4, &row("2024-03-01,08:15:00,T,Y,abc,V,C,")).unwrap_err();
        assert_eq!(err.row_number, 4);
        assert_eq!(err.error_type, RowErrorKind::InvalidAmount);
        assert_eq!(err.raw_data, "2024-03-01,08:15:00,T,Y,abc,V,C,");
    }

    #[test]
    fn negative_and_decimal_amounts_are_rejected() {
        assert_eq!(parse_amount("-5"), None);
        assert_eq!(parse_amount("1.5"), None);
        assert_eq!(parse_amount("1,200"), None);
        assert_eq!(parse_amount(" 42 "), Some(42));
    }

    #[test]
    fn bad_date_and_time_are_row_errors() {
        let err = parse_row(&schema(), 1, &row("2024-02-30,08:15:00,T,Y,1,V,C,")).unwrap_err();
        assert_eq!(err.error_type, RowErrorKind::InvalidDate);
        let err = parse_row(&schema(), 1, &row("2024-02-01,25:00:00,T,Y,1,V,C,")).unwrap_err();
        assert_eq!(err.error_type, RowErrorKind::InvalidTime);
    }

    #[test]
    fn short_row_reports_missing_field() {
        let err = parse_row(&schema(), 2, &row("2024-02-01,08:00:00,T")).unwrap_err();
        assert_eq!(err.error_type, RowErrorKind::MissingField);
        assert!(err.error_message.contains("exit_point"));
    }

    #[test]
    fn read_records_skips_blank_lines_and_bom() {
        let mut bytes = UTF8_BOM.to_vec();
        bytes.extend_from_slice(b"date,time\n\n , \n\"a,b\",c\r\n");
        let rows = read_records(strip_bom(&bytes));
        assert_eq!(rows.len(), 2);
        assert_matches!(&rows[1], RawRow::Record(r) if r.get(0) == Some("a,b"));
    }

    #[test]
    fn invalid_utf8_becomes_malformed_row() {
        let rows = read_records(b"ok,row\n\xff\xfe,x\n");
        assert_eq!(rows.len(), 2);
        assert_matches!(&rows[1], RawRow::Malformed { .. });
    }

    #[test]
    fn raw_snippet_is_truncated() {
        let long = "x".repeat(MAX_RAW_DATA_CHARS * 2);
        assert_eq!(raw_snippet(&row(&long)).chars().count(), MAX_RAW_DATA_CHARS);
    }
}
