// Evidence attachments: physical files under the project plus their rows
use rusqlite::{params, OptionalExtension, Row};
use std::path::{Path, PathBuf};

use super::db::{new_id, timestamp, DbError, DbResult};
use super::session::ActiveStore;
use super::storage::{self, StorageError};
use super::models::Evidence;

const EVIDENCE_COLUMNS: &str =
    "id, run_case_id, file_name, stored_path, mime_type, size, created_at";

fn evidence_from_row(row: &Row) -> rusqlite::Result<Evidence> {
    Ok(Evidence {
        id: row.get(0)?,
        run_case_id: row.get(1)?,
        file_name: row.get(2)?,
        stored_path: row.get(3)?,
        mime_type: row.get(4)?,
        size: row.get(5)?,
        created_at: row.get(6)?,
    })
}

/// Copy `source` into the attachments directory and record it against a run case.
///
/// The copy happens first; if the row insert then fails the copied file is
/// removed again before the error is returned.
pub fn add_evidence(
    store: &ActiveStore,
    run_case_id: &str,
    source: &Path,
    file_name: &str,
    mime_type: &str,
    size: Option<i64>,
) -> DbResult<Evidence> {
    let id = new_id();
    let stored = storage::store_attachment(&store.root, &store.config, &id, file_name, source)
        .map_err(|e| match e {
            StorageError::SourceNotFound(path) => DbError::NotFound(path.display().to_string()),
            other => DbError::Storage(other),
        })?;

    let evidence = Evidence {
        id,
        run_case_id: run_case_id.to_string(),
        file_name: file_name.to_string(),
        stored_path: Some(stored.relative_path.clone()),
        mime_type: mime_type.to_string(),
        size: size.unwrap_or(stored.bytes as i64),
        created_at: timestamp(),
    };

    let inserted = {
        let conn = store.db.lock();
        conn.execute(
            "INSERT INTO evidence (id, run_case_id, file_name, stored_path, mime_type, size, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                evidence.id,
                evidence.run_case_id,
                evidence.file_name,
                evidence.stored_path,
                evidence.mime_type,
                evidence.size,
                evidence.created_at,
            ],
        )
    };

    if let Err(e) = inserted {
        if let Err(cleanup) = storage::remove_stored_file(&store.root, &stored.relative_path) {
            log::warn!(
                "Failed to remove orphaned evidence file {}: {}",
                stored.absolute_path.display(),
                cleanup
            );
        }
        return Err(e.into());
    }

    log::info!(
        "Attached evidence {} ({} bytes) to run case {}",
        evidence.file_name,
        evidence.size,
        run_case_id
    );
    Ok(evidence)
}

fn fetch_evidence(store: &ActiveStore, id: &str) -> DbResult<Option<Evidence>> {
    let conn = store.db.lock();
    Ok(conn
        .query_row(
            &format!("SELECT {} FROM evidence WHERE id = ?1", EVIDENCE_COLUMNS),
            [id],
            evidence_from_row,
        )
        .optional()?)
}

/// Delete the evidence file (when present) and then its row.
/// The row is deleted even if the file could not be removed.
pub fn remove_evidence(store: &ActiveStore, id: &str) -> DbResult<()> {
    let evidence = match fetch_evidence(store, id)? {
        Some(e) => e,
        None => return Ok(()),
    };

    if let Some(stored_path) = evidence.stored_path.as_deref() {
        if let Err(e) = storage::remove_stored_file(&store.root, stored_path) {
            log::warn!("Failed to delete evidence file {}: {}", stored_path, e);
        }
    }

    let conn = store.db.lock();
    conn.execute("DELETE FROM evidence WHERE id = ?1", params![id])?;
    log::debug!("Removed evidence {}", id);
    Ok(())
}

/// Absolute path of an evidence file, if the row and its stored path exist
pub fn get_evidence_path(store: &ActiveStore, id: &str) -> DbResult<Option<PathBuf>> {
    Ok(fetch_evidence(store, id)?
        .and_then(|e| e.stored_path)
        .filter(|p| !p.is_empty())
        .map(|p| storage::resolve_stored_path(&store.root, &p)))
}

/// Evidence attached to a run case, oldest first
pub fn list_evidence(store: &ActiveStore, run_case_id: &str) -> DbResult<Vec<Evidence>> {
    let conn = store.db.lock();
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM evidence WHERE run_case_id = ?1 ORDER BY created_at, rowid",
        EVIDENCE_COLUMNS
    ))?;
    let evidence = stmt
        .query_map([run_case_id], evidence_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(evidence)
}
