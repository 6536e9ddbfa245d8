// Test case, step and folder CRUD
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::db::{new_id, row_exists, timestamp, DbConnection, DbError, DbResult};
use super::models::{CaseFolder, StepInput, TestCase, TestCaseDetail, TestCaseInput, TestStep};
use super::scenarios::{insert_scenario_row, replace_scenario_cases};

const CASE_COLUMNS: &str = "id, title, objective, preconditions, priority, severity, tags, \
                            folder_id, created_at, updated_at";

fn case_from_row(row: &Row) -> rusqlite::Result<TestCase> {
    Ok(TestCase {
        id: row.get(0)?,
        title: row.get(1)?,
        objective: row.get(2)?,
        preconditions: row.get(3)?,
        priority: row.get(4)?,
        severity: row.get(5)?,
        tags: row.get(6)?,
        folder_id: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

// ==================== TEST CASES ====================

/// Create or update a test case, replacing its steps and data-set links in
/// the same transaction. Returns the case id.
pub fn save_test_case(db: &DbConnection, input: TestCaseInput) -> DbResult<String> {
    if input.title.trim().is_empty() {
        return Err(DbError::Validation("test case title is required".to_string()));
    }

    let mut conn = db.lock();
    let tx = conn.transaction()?;

    let existing = match input.id.as_deref() {
        Some(id) if row_exists(&tx, "test_cases", id)? => Some(id.to_string()),
        _ => None,
    };
    let created = existing.is_none();

    let id = match existing {
        Some(id) => {
            tx.execute(
                "UPDATE test_cases SET title = ?1, objective = ?2, preconditions = ?3, priority = ?4,
                        severity = ?5, tags = ?6, folder_id = ?7, updated_at = ?8
                 WHERE id = ?9",
                params![
                    input.title,
                    input.objective,
                    input.preconditions,
                    input.priority,
                    input.severity,
                    input.tags,
                    input.folder_id,
                    timestamp(),
                    id,
                ],
            )?;
            id
        }
        None => {
            let id = input.id.clone().unwrap_or_else(new_id);
            let now = timestamp();
            tx.execute(
                "INSERT INTO test_cases (id, title, objective, preconditions, priority, severity, tags,
                                         folder_id, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)",
                params![
                    id,
                    input.title,
                    input.objective,
                    input.preconditions,
                    input.priority,
                    input.severity,
                    input.tags,
                    input.folder_id,
                    now,
                ],
            )?;
            id
        }
    };

    replace_steps(&tx, &id, &input.steps)?;
    replace_case_data_links(&tx, &id, &input.data_set_ids)?;

    if created {
        on_case_created(&tx, &id, &input)?;
    }

    tx.commit()?;
    log::debug!("Saved test case {} (created: {})", id, created);
    Ok(id)
}

/// Post-create hook: every new case gets a one-case scenario so it can be run
/// on its own. Never invoked for updates.
pub(crate) fn on_case_created(
    conn: &Connection,
    case_id: &str,
    input: &TestCaseInput,
) -> DbResult<String> {
    let scenario_id = new_id();
    insert_scenario_row(
        conn,
        &scenario_id,
        &input.title,
        &input.objective,
        &input.preconditions,
    )?;
    replace_scenario_cases(conn, &scenario_id, &[case_id.to_string()])?;
    Ok(scenario_id)
}

/// Delete-then-insert the case's steps; blank steps are dropped and positions
/// stay dense from 1
fn replace_steps(conn: &Connection, case_id: &str, steps: &[StepInput]) -> DbResult<()> {
    conn.execute("DELETE FROM test_steps WHERE case_id = ?1", params![case_id])?;

    let mut stmt = conn.prepare(
        "INSERT INTO test_steps (id, case_id, position, action, expected)
         VALUES (?1, ?2, ?3, ?4, ?5)",
    )?;
    for (index, step) in steps.iter().filter(|s| !s.is_blank()).enumerate() {
        stmt.execute(params![
            new_id(),
            case_id,
            index as i64 + 1,
            step.action,
            step.expected
        ])?;
    }
    Ok(())
}

fn replace_case_data_links(
    conn: &Connection,
    case_id: &str,
    data_set_ids: &[String],
) -> DbResult<()> {
    conn.execute(
        "DELETE FROM data_links WHERE entity_type = 'case' AND entity_id = ?1",
        params![case_id],
    )?;

    let mut scope_stmt = conn.prepare("SELECT scope FROM data_sets WHERE id = ?1")?;
    let mut stmt = conn.prepare(
        "INSERT OR IGNORE INTO data_links (data_set_id, entity_type, entity_id)
         VALUES (?1, 'case', ?2)",
    )?;
    for data_set_id in data_set_ids {
        // Only case-scoped sets may target a case
        let scope: Option<String> = scope_stmt
            .query_row([data_set_id], |row| row.get(0))
            .optional()?;
        match scope.as_deref() {
            None => return Err(DbError::NotFound(format!("data set {}", data_set_id))),
            Some("case") => {}
            Some(other) => {
                return Err(DbError::Validation(format!(
                    "data set {} has scope '{}' and cannot be linked to a test case",
                    data_set_id, other
                )))
            }
        }
        stmt.execute(params![data_set_id, case_id])?;
    }
    Ok(())
}

pub(crate) fn case_steps(conn: &Connection, case_id: &str) -> DbResult<Vec<TestStep>> {
    let mut stmt = conn.prepare(
        "SELECT id, case_id, position, action, expected
         FROM test_steps WHERE case_id = ?1
         ORDER BY position",
    )?;
    let steps = stmt
        .query_map([case_id], |row| {
            Ok(TestStep {
                id: row.get(0)?,
                case_id: row.get(1)?,
                position: row.get(2)?,
                action: row.get(3)?,
                expected: row.get(4)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(steps)
}

/// Get a test case with its ordered steps and linked data-set ids
pub fn get_test_case(db: &DbConnection, id: &str) -> DbResult<Option<TestCaseDetail>> {
    let conn = db.lock();
    let case = conn
        .query_row(
            &format!("SELECT {} FROM test_cases WHERE id = ?1", CASE_COLUMNS),
            [id],
            case_from_row,
        )
        .optional()?;

    let case = match case {
        Some(c) => c,
        None => return Ok(None),
    };

    let steps = case_steps(&conn, id)?;

    let mut stmt = conn.prepare(
        "SELECT data_set_id FROM data_links
         WHERE entity_type = 'case' AND entity_id = ?1
         ORDER BY data_set_id",
    )?;
    let data_set_ids = stmt
        .query_map([id], |row| row.get(0))?
        .collect::<Result<Vec<String>, _>>()?;

    Ok(Some(TestCaseDetail {
        case,
        steps,
        data_set_ids,
    }))
}

/// List test cases, optionally only those in one folder
pub fn list_test_cases(db: &DbConnection, folder_id: Option<&str>) -> DbResult<Vec<TestCase>> {
    let conn = db.lock();
    let cases = match folder_id {
        Some(folder_id) => {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM test_cases WHERE folder_id = ?1 ORDER BY created_at, rowid",
                CASE_COLUMNS
            ))?;
            let rows = stmt
                .query_map([folder_id], case_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            rows
        }
        None => {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM test_cases ORDER BY created_at, rowid",
                CASE_COLUMNS
            ))?;
            let rows = stmt
                .query_map([], case_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            rows
        }
    };
    Ok(cases)
}

/// First case (oldest) whose title matches exactly
pub(crate) fn find_case_id_by_title(conn: &Connection, title: &str) -> DbResult<Option<String>> {
    Ok(conn
        .query_row(
            "SELECT id FROM test_cases WHERE title = ?1 ORDER BY created_at, rowid LIMIT 1",
            [title],
            |row| row.get(0),
        )
        .optional()?)
}

/// Delete a test case; steps, scenario links and run cases cascade
pub fn delete_test_case(db: &DbConnection, id: &str) -> DbResult<()> {
    let conn = db.lock();
    conn.execute("DELETE FROM test_cases WHERE id = ?1", params![id])?;
    log::debug!("Deleted test case {}", id);
    Ok(())
}

// ==================== FOLDERS ====================

fn folder_from_row(row: &Row) -> rusqlite::Result<CaseFolder> {
    Ok(CaseFolder {
        id: row.get(0)?,
        name: row.get(1)?,
        created_at: row.get(2)?,
        updated_at: row.get(3)?,
    })
}

/// Create a folder, or rename it when `id` names an existing one
pub fn save_folder(db: &DbConnection, id: Option<String>, name: &str) -> DbResult<CaseFolder> {
    if name.trim().is_empty() {
        return Err(DbError::Validation("folder name is required".to_string()));
    }

    let conn = db.lock();
    let now = timestamp();
    let id = match id {
        Some(id) if row_exists(&conn, "case_folders", &id)? => {
            conn.execute(
                "UPDATE case_folders SET name = ?1, updated_at = ?2 WHERE id = ?3",
                params![name, now, id],
            )?;
            id
        }
        id => {
            let id = id.unwrap_or_else(new_id);
            conn.execute(
                "INSERT INTO case_folders (id, name, created_at, updated_at) VALUES (?1, ?2, ?3, ?3)",
                params![id, name, now],
            )?;
            id
        }
    };

    let folder = conn.query_row(
        "SELECT id, name, created_at, updated_at FROM case_folders WHERE id = ?1",
        [&id],
        folder_from_row,
    )?;
    Ok(folder)
}

/// List folders by name
pub fn list_folders(db: &DbConnection) -> DbResult<Vec<CaseFolder>> {
    let conn = db.lock();
    let mut stmt = conn.prepare(
        "SELECT id, name, created_at, updated_at FROM case_folders ORDER BY name, created_at",
    )?;
    let folders = stmt
        .query_map([], folder_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(folders)
}

/// Delete a folder; member cases are detached, not deleted
pub fn delete_folder(db: &DbConnection, id: &str) -> DbResult<()> {
    let mut conn = db.lock();
    let tx = conn.transaction()?;
    let detached = tx.execute(
        "UPDATE test_cases SET folder_id = NULL WHERE folder_id = ?1",
        params![id],
    )?;
    tx.execute("DELETE FROM case_folders WHERE id = ?1", params![id])?;
    tx.commit()?;

    log::debug!("Deleted folder {} ({} cases detached)", id, detached);
    Ok(())
}
