//! CSV ingestion reconciler.
//!
//! Reads the four categorized status exports and merges every row into the
//! store, keeping only the latest-timestamped record per card identifier.
//! Runs once at startup, before the service accepts requests; any failure
//! aborts startup.

use crate::models::{StatusRecord, StatusSource};
use crate::services::Database;
use anyhow::Context;
use chrono::NaiveDateTime;
use csv::StringRecord;
use service_core::error::AppError;
use std::path::Path;
use tracing::{info, instrument};

const ID_COLUMN: &str = "ID";
const CARD_ID_COLUMN: &str = "Card ID";
const TIMESTAMP_COLUMN: &str = "Timestamp";
const COMMENT_COLUMN: &str = "Comment";

/// Contact column names, in order of preference.
const PHONE_COLUMNS: [&str; 2] = ["User contact", "User Mobile"];

/// Load all four source files from `data_dir` into the store.
///
/// No partial-success tracking: the first error of any kind (missing file,
/// missing column, unparseable timestamp, store failure) fails the whole
/// load.
#[instrument(skip(db, data_dir))]
pub async fn load_sources(db: &Database, data_dir: &Path) -> Result<(), AppError> {
    for source in StatusSource::ALL {
        let path = data_dir.join(source.file_name());
        let rows = load_source(db, source, &path).await.map_err(|e| {
            AppError::InternalError(e.context("Failed to load CSV data into database"))
        })?;
        info!(source = source.as_str(), rows = rows, "Source ingested");
    }
    Ok(())
}

async fn load_source(
    db: &Database,
    source: StatusSource,
    path: &Path,
) -> Result<usize, anyhow::Error> {
    let mut reader =
        csv::Reader::from_path(path).with_context(|| format!("opening {}", path.display()))?;
    let headers = reader.headers()?.clone();

    let mut rows = 0;
    for row in reader.records() {
        let row = row?;
        let Some(record) = normalize_row(source, &headers, &row)? else {
            // Empty identifier marks end-of-data for this source.
            break;
        };
        db.merge_record(&record)
            .await
            .map_err(anyhow::Error::new)?;
        rows += 1;
    }

    Ok(rows)
}

/// Value of the named column in this row, located by header position.
fn column<'r>(headers: &StringRecord, row: &'r StringRecord, name: &str) -> Option<&'r str> {
    headers
        .iter()
        .position(|h| h == name)
        .and_then(|i| row.get(i))
}

/// Build a status record from one CSV row, or `None` when the row's `ID`
/// column is empty.
fn normalize_row(
    source: StatusSource,
    headers: &StringRecord,
    row: &StringRecord,
) -> Result<Option<StatusRecord>, anyhow::Error> {
    let id = column(headers, row, ID_COLUMN).unwrap_or_default();
    if id.is_empty() {
        return Ok(None);
    }

    let card_id = column(headers, row, CARD_ID_COLUMN)
        .with_context(|| format!("{}: missing {:?} column", source.as_str(), CARD_ID_COLUMN))?;

    // Exports disagree on the contact column name; quote characters inside
    // the value are data noise and get stripped.
    let phone = PHONE_COLUMNS
        .iter()
        .find_map(|name| column(headers, row, name))
        .with_context(|| format!("{}: no contact column in header", source.as_str()))?
        .replace('"', "");

    let raw_timestamp = column(headers, row, TIMESTAMP_COLUMN)
        .with_context(|| format!("{}: missing {:?} column", source.as_str(), TIMESTAMP_COLUMN))?;
    let timestamp = parse_timestamp(source, raw_timestamp)?;

    // Header presence drives the status override: sources that carry a
    // Comment column use its value as the status, even when empty.
    let status = match headers.iter().position(|h| h == COMMENT_COLUMN) {
        Some(i) => row.get(i).unwrap_or_default().to_string(),
        None => source.as_str().to_string(),
    };

    Ok(Some(StatusRecord {
        id: id.to_string(),
        card_id: card_id.to_string(),
        phone,
        timestamp,
        status,
    }))
}

/// Parse an event timestamp using the layout for its source.
fn parse_timestamp(source: StatusSource, raw: &str) -> Result<NaiveDateTime, anyhow::Error> {
    NaiveDateTime::parse_from_str(raw.trim(), source.timestamp_format())
        .with_context(|| format!("{}: bad timestamp {:?}", source.as_str(), raw))
}
