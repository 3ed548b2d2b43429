// 📥 CSV Importer
// Positional format: Description,Amount,Category,Date,Notes(optional)
//
// Parsing never fails as a whole: every data row becomes either a valid
// candidate or a skipped row with a reason. Only the file-level entry point
// (`import_file`) reports user-facing errors.

use crate::expense::{NewExpense, DEFAULT_DESCRIPTION};
use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use csv::{ReaderBuilder, StringRecord, Trim};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info, warn};

/// Minimum number of positional fields a data row needs
pub const MIN_FIELDS: usize = 4;

/// Header + example rows shown to users as the expected format
pub const CSV_FORMAT_EXAMPLE: &str = "Description,Amount,Category,Date,Notes\n\
Coffee,4.50,Food,2024-01-15,Morning coffee\n\
Bus fare,2.75,Transport,2024-01-15,Work commute";

// ============================================================================
// ROW OUTCOMES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SkipReason {
    /// Row had fewer than `MIN_FIELDS` fields
    TooFewFields(usize),
    /// Amount missing, unparseable, zero or negative
    NonPositiveAmount,
    /// Tokenizer could not read the row
    Malformed(String),
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::TooFewFields(n) => {
                write!(f, "expected at least {} fields, found {}", MIN_FIELDS, n)
            }
            SkipReason::NonPositiveAmount => write!(f, "amount must be a positive number"),
            SkipReason::Malformed(msg) => write!(f, "malformed row: {}", msg),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RowOutcome {
    Valid { line: usize, expense: NewExpense },
    Skipped { line: usize, reason: SkipReason },
}

impl RowOutcome {
    /// 1-based line in the original text
    pub fn line(&self) -> usize {
        match self {
            RowOutcome::Valid { line, .. } | RowOutcome::Skipped { line, .. } => *line,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImportReport {
    pub rows: Vec<RowOutcome>,
}

impl ImportReport {
    pub fn expenses(&self) -> impl Iterator<Item = &NewExpense> {
        self.rows.iter().filter_map(|row| match row {
            RowOutcome::Valid { expense, .. } => Some(expense),
            RowOutcome::Skipped { .. } => None,
        })
    }

    pub fn into_expenses(self) -> Vec<NewExpense> {
        self.rows
            .into_iter()
            .filter_map(|row| match row {
                RowOutcome::Valid { expense, .. } => Some(expense),
                RowOutcome::Skipped { .. } => None,
            })
            .collect()
    }

    pub fn valid_count(&self) -> usize {
        self.expenses().count()
    }

    pub fn skipped_count(&self) -> usize {
        self.rows.len() - self.valid_count()
    }

    /// True when no valid expense was found
    pub fn is_empty(&self) -> bool {
        self.valid_count() == 0
    }
}

// ============================================================================
// PARSING
// ============================================================================

/// Parse raw CSV text, using the local clock for missing dates
pub fn parse(raw: &str) -> ImportReport {
    parse_at(raw, &Local::now())
}

/// Parse raw CSV text against an explicit "now".
///
/// Date-only values are read as midnight in the time zone of `now`, and
/// unparseable dates fall back to `now` itself.
pub fn parse_at<Tz: TimeZone>(raw: &str, now: &DateTime<Tz>) -> ImportReport {
    // Blank lines are dropped up front; keep original line numbers for reporting
    let lines: Vec<(usize, &str)> = raw
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| (i + 1, line))
        .collect();

    if lines.len() < 2 {
        debug!("CSV input has no data rows ({} non-blank lines)", lines.len());
        return ImportReport::default();
    }

    let mut report = ImportReport::default();

    // First non-blank line is the header; fields are positional
    for &(line, text) in &lines[1..] {
        let outcome = match split_fields(text) {
            Ok(record) => {
                let fields: Vec<&str> = record.iter().collect();
                parse_row(&fields, line, now)
            }
            Err(e) => RowOutcome::Skipped {
                line,
                reason: SkipReason::Malformed(e.to_string()),
            },
        };

        if let RowOutcome::Skipped { line, reason } = &outcome {
            warn!("Skipping CSV line {}: {}", line, reason);
        }
        report.rows.push(outcome);
    }

    debug!(
        "Parsed CSV: {} valid, {} skipped",
        report.valid_count(),
        report.skipped_count()
    );

    report
}

/// Tokenize one line on its own, so an unbalanced quote stays inside its row
fn split_fields(line: &str) -> Result<StringRecord, csv::Error> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(line.as_bytes());

    let mut record = StringRecord::new();
    reader.read_record(&mut record)?;
    Ok(record)
}

/// Turn the positional fields of one data row into an outcome
pub fn parse_row<Tz: TimeZone>(fields: &[&str], line: usize, now: &DateTime<Tz>) -> RowOutcome {
    if fields.len() < MIN_FIELDS {
        return RowOutcome::Skipped {
            line,
            reason: SkipReason::TooFewFields(fields.len()),
        };
    }

    let description = match fields[0].trim() {
        "" => DEFAULT_DESCRIPTION,
        d => d,
    };
    let amount = parse_amount(fields[1]).unwrap_or(0.0);
    let date = parse_date(fields[3], &now.timezone()).unwrap_or_else(|| now.with_timezone(&Utc));

    let mut expense = NewExpense::new(description, amount, fields[2], date);
    if let Some(notes) = fields.get(4) {
        expense = expense.with_notes(notes);
    }

    if expense.is_valid() {
        RowOutcome::Valid { line, expense }
    } else {
        RowOutcome::Skipped {
            line,
            reason: SkipReason::NonPositiveAmount,
        }
    }
}

/// Decimal amount, optionally prefixed with `$`; non-finite values are rejected
pub fn parse_amount(raw: &str) -> Option<f64> {
    let cleaned = raw.trim();
    let cleaned = cleaned.strip_prefix('$').unwrap_or(cleaned);

    cleaned
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|amount| amount.is_finite())
}

/// Parse the date formats we accept in import files and on the command line.
///
/// Values without an explicit offset are interpreted in `tz`.
pub fn parse_date<Tz: TimeZone>(raw: &str, tz: &Tz) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    const DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"];
    const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"];

    let naive = DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
                .map(|d| d.and_time(NaiveTime::MIN))
        })?;

    tz.from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
}

// ============================================================================
// FILE IMPORT
// ============================================================================

/// User-facing import failures; none of them touch the record set
#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("Please upload a CSV file")]
    UnsupportedFileType { file_name: String },
    #[error("Failed to read file")]
    Unreadable {
        file_name: String,
        #[source]
        source: std::io::Error,
    },
    #[error("No valid expenses found in the CSV file")]
    NoValidExpenses { skipped: usize },
}

/// Only `.csv` files are accepted (case-insensitive)
pub fn is_supported_file(file_path: &Path) -> bool {
    file_path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("csv"))
        .unwrap_or(false)
}

/// Read and parse an import file.
///
/// Returns the report only when it holds at least one valid expense.
pub fn import_file(file_path: &Path) -> Result<ImportReport, ImportError> {
    let file_name = file_path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("unknown")
        .to_string();

    if !is_supported_file(file_path) {
        warn!("Rejected import of {}: not a CSV file", file_name);
        return Err(ImportError::UnsupportedFileType { file_name });
    }

    let raw = std::fs::read_to_string(file_path).map_err(|source| {
        warn!("Failed to read {}: {}", file_path.display(), source);
        ImportError::Unreadable {
            file_name: file_name.clone(),
            source,
        }
    })?;

    let report = parse(&raw);
    if report.is_empty() {
        warn!("No valid expenses in {}", file_name);
        return Err(ImportError::NoValidExpenses {
            skipped: report.skipped_count(),
        });
    }

    info!(
        "Parsed {}: {} valid rows, {} skipped",
        file_name,
        report.valid_count(),
        report.skipped_count()
    );
    Ok(report)
}

// ============================================================================
// STATUS (for the presentation layer)
// ============================================================================

#[derive(Debug, Clone, PartialEq, Default)]
pub enum ImportStatus {
    #[default]
    Idle,
    Processing,
    Success(usize),
    Error(String),
}

impl ImportStatus {
    pub fn from_result(result: &Result<usize, ImportError>) -> Self {
        match result {
            Ok(n) => ImportStatus::Success(*n),
            Err(e) => ImportStatus::Error(e.to_string()),
        }
    }

    pub fn message(&self) -> String {
        match self {
            ImportStatus::Idle => String::new(),
            ImportStatus::Processing => "Processing file...".to_string(),
            ImportStatus::Success(_) => "Expenses uploaded successfully!".to_string(),
            ImportStatus::Error(msg) => msg.clone(),
        }
    }
}
