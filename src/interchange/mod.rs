// Text interchange: export store rows to CSV / Markdown / JSON and import them back

pub mod csv;
pub mod export;
pub mod import;
pub mod json;
pub mod markdown;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::state::{DataScope, DbConnection, DbError, DbResult};

/// A decoded record: column name to value
pub type Record = serde_json::Map<String, Value>;

/// Which entity an export or import addresses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    TestCases,
    Scenarios,
    DataSets,
    TestRuns,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::TestCases => "test_cases",
            EntityKind::Scenarios => "scenarios",
            EntityKind::DataSets => "data_sets",
            EntityKind::TestRuns => "test_runs",
        }
    }

    pub fn parse(s: &str) -> DbResult<Self> {
        match s {
            "test_cases" => Ok(EntityKind::TestCases),
            "scenarios" => Ok(EntityKind::Scenarios),
            "data_sets" => Ok(EntityKind::DataSets),
            "test_runs" => Ok(EntityKind::TestRuns),
            other => Err(DbError::Format(format!("unknown entity kind '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    Json,
    Csv,
    #[serde(alias = "markdown")]
    Md,
}

impl Format {
    pub fn as_str(&self) -> &'static str {
        match self {
            Format::Json => "json",
            Format::Csv => "csv",
            Format::Md => "md",
        }
    }

    pub fn parse(s: &str) -> DbResult<Self> {
        match s {
            "json" => Ok(Format::Json),
            "csv" => Ok(Format::Csv),
            "md" | "markdown" => Ok(Format::Md),
            other => Err(DbError::Format(format!("unknown format '{}'", other))),
        }
    }
}

/// Column-ordered rows ready for encoding
#[derive(Debug, Clone, PartialEq)]
pub struct RowSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

/// Text form of a stored value: null is empty, strings are unquoted
pub(crate) fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Map table rows (header first) to records; short rows pad with empty strings
pub(crate) fn records_from_table(mut table: Vec<Vec<String>>) -> Vec<Record> {
    if table.is_empty() {
        return Vec::new();
    }
    let header = table.remove(0);

    table
        .into_iter()
        .map(|row| {
            header
                .iter()
                .enumerate()
                .map(|(index, name)| {
                    let value = row.get(index).cloned().unwrap_or_default();
                    (name.clone(), Value::String(value))
                })
                .collect()
        })
        .collect()
}

pub fn encode(rows: &RowSet, format: Format) -> DbResult<String> {
    match format {
        Format::Json => json::encode(rows),
        Format::Csv => Ok(csv::encode(rows)),
        Format::Md => Ok(markdown::encode(rows)),
    }
}

pub fn decode(content: &str, format: Format) -> DbResult<Vec<Record>> {
    match format {
        Format::Json => json::decode(content),
        Format::Csv => Ok(records_from_table(csv::parse(content))),
        Format::Md => Ok(records_from_table(markdown::parse(content))),
    }
}

/// Export every row of `kind` (data sets optionally filtered by scope) as text
pub fn export_data(
    db: &DbConnection,
    kind: EntityKind,
    format: Format,
    scope: Option<DataScope>,
) -> DbResult<String> {
    let rows = export::project(db, kind, scope)?;
    log::info!(
        "Exporting {} {} rows as {}",
        rows.rows.len(),
        kind.as_str(),
        format.as_str()
    );
    encode(&rows, format)
}

/// Decode `content` and save every record as a new entity; returns the record count
pub fn import_data(
    db: &DbConnection,
    kind: EntityKind,
    format: Format,
    content: &str,
    scope_override: Option<DataScope>,
) -> DbResult<usize> {
    let records = decode(content, format)?;
    if records.is_empty() {
        return Ok(0);
    }

    let count = import::save_records(db, kind, &records, scope_override)?;
    log::info!(
        "Imported {} {} records from {}",
        count,
        kind.as_str(),
        format.as_str()
    );
    Ok(count)
}
