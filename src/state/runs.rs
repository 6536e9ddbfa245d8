// Test run CRUD and per-case results
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::db::{
    new_id, normalize_timestamp, row_exists, timestamp, DbConnection, DbError, DbResult,
};
use super::models::{RunCase, RunCaseStatus, RunCaseUpdate, RunStatus, TestRun, TestRunDetail, TestRunInput};
use super::scenarios::scenario_case_ids;

const RUN_COLUMNS: &str = "id, name, environment, build_version, tester, status, started_at, \
                           finished_at, notes, created_at, updated_at";

const RUN_CASE_SELECT: &str = "SELECT rc.id, rc.run_id, rc.case_id, c.title, rc.status, \
                               rc.actual_result, rc.evidence_summary, rc.executed_at \
                               FROM run_cases rc LEFT JOIN test_cases c ON c.id = rc.case_id";

fn run_from_row(row: &Row) -> rusqlite::Result<TestRun> {
    Ok(TestRun {
        id: row.get(0)?,
        name: row.get(1)?,
        environment: row.get(2)?,
        build_version: row.get(3)?,
        tester: row.get(4)?,
        status: RunStatus::from_string(&row.get::<_, String>(5)?),
        started_at: row.get(6)?,
        finished_at: row.get(7)?,
        notes: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

fn run_case_from_row(row: &Row) -> rusqlite::Result<RunCase> {
    Ok(RunCase {
        id: row.get(0)?,
        run_id: row.get(1)?,
        case_id: row.get(2)?,
        case_title: row.get(3)?,
        status: RunCaseStatus::from_string(&row.get::<_, String>(4)?),
        actual_result: row.get(5)?,
        evidence_summary: row.get(6)?,
        executed_at: row.get(7)?,
    })
}

// ==================== RUNS ====================

/// Create or update a run; its scenario list is replaced wholesale.
/// Returns the run id.
pub fn save_run(db: &DbConnection, input: TestRunInput) -> DbResult<String> {
    let mut conn = db.lock();
    let tx = conn.transaction()?;

    let existing = match input.id.as_deref() {
        Some(id) if row_exists(&tx, "test_runs", id)? => Some(id.to_string()),
        _ => None,
    };

    let id = match existing {
        Some(id) => {
            tx.execute(
                "UPDATE test_runs SET name = ?1, environment = ?2, build_version = ?3, tester = ?4,
                        status = ?5, started_at = ?6, finished_at = ?7, notes = ?8, updated_at = ?9
                 WHERE id = ?10",
                params![
                    input.name,
                    input.environment,
                    input.build_version,
                    input.tester,
                    input.status.as_str(),
                    input.started_at,
                    input.finished_at,
                    input.notes,
                    timestamp(),
                    id,
                ],
            )?;
            id
        }
        None => {
            let id = input.id.clone().unwrap_or_else(new_id);
            tx.execute(
                "INSERT INTO test_runs (id, name, environment, build_version, tester, status,
                                        started_at, finished_at, notes, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10)",
                params![
                    id,
                    input.name,
                    input.environment,
                    input.build_version,
                    input.tester,
                    input.status.as_str(),
                    input.started_at,
                    input.finished_at,
                    input.notes,
                    timestamp(),
                ],
            )?;
            id
        }
    };

    tx.execute("DELETE FROM run_scenarios WHERE run_id = ?1", params![id])?;
    {
        let mut stmt = tx.prepare(
            "INSERT OR IGNORE INTO run_scenarios (run_id, scenario_id, position) VALUES (?1, ?2, ?3)",
        )?;
        for (index, scenario_id) in input.scenario_ids.iter().enumerate() {
            stmt.execute(params![id, scenario_id, index as i64 + 1])?;
        }
    }
    tx.commit()?;

    log::debug!("Saved run {} ({})", id, input.status.as_str());
    Ok(id)
}

/// Get a run with its scenarios and its cases, most recently executed first
pub fn get_run(db: &DbConnection, id: &str) -> DbResult<Option<TestRunDetail>> {
    let conn = db.lock();
    let run = conn
        .query_row(
            &format!("SELECT {} FROM test_runs WHERE id = ?1", RUN_COLUMNS),
            [id],
            run_from_row,
        )
        .optional()?;

    let run = match run {
        Some(r) => r,
        None => return Ok(None),
    };

    let mut stmt = conn.prepare(
        "SELECT scenario_id FROM run_scenarios WHERE run_id = ?1 ORDER BY position",
    )?;
    let scenario_ids = stmt
        .query_map([id], |row| row.get(0))?
        .collect::<Result<Vec<String>, _>>()?;

    let mut stmt = conn.prepare(&format!(
        "{} WHERE rc.run_id = ?1 ORDER BY rc.executed_at DESC, rc.rowid",
        RUN_CASE_SELECT
    ))?;
    let cases = stmt
        .query_map([id], run_case_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Some(TestRunDetail {
        run,
        scenario_ids,
        cases,
    }))
}

/// List all runs, newest first
pub fn list_runs(db: &DbConnection) -> DbResult<Vec<TestRun>> {
    let conn = db.lock();
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM test_runs ORDER BY created_at DESC, rowid DESC",
        RUN_COLUMNS
    ))?;
    let runs = stmt
        .query_map([], run_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(runs)
}

/// Delete a run; run cases and evidence rows cascade (evidence files stay on disk)
pub fn delete_run(db: &DbConnection, id: &str) -> DbResult<()> {
    let conn = db.lock();
    conn.execute("DELETE FROM test_runs WHERE id = ?1", params![id])?;
    log::debug!("Deleted run {}", id);
    Ok(())
}

// ==================== RUN CASES ====================

fn insert_run_case(conn: &Connection, run_id: &str, case_id: &str) -> DbResult<String> {
    let id = new_id();
    conn.execute(
        "INSERT INTO run_cases (id, run_id, case_id, status, actual_result, evidence_summary, executed_at)
         VALUES (?1, ?2, ?3, ?4, '', '', NULL)",
        params![id, run_id, case_id, RunCaseStatus::NotRun.as_str()],
    )?;
    Ok(id)
}

fn fetch_run_case(conn: &Connection, id: &str) -> DbResult<Option<RunCase>> {
    Ok(conn
        .query_row(
            &format!("{} WHERE rc.id = ?1", RUN_CASE_SELECT),
            [id],
            run_case_from_row,
        )
        .optional()?)
}

/// Add a case to a run with status `not_run` and empty results
pub fn add_run_case(db: &DbConnection, run_id: &str, case_id: &str) -> DbResult<RunCase> {
    let conn = db.lock();
    let id = insert_run_case(&conn, run_id, case_id)?;
    fetch_run_case(&conn, &id)?.ok_or_else(|| DbError::NotFound(format!("run case {}", id)))
}

/// Link a scenario to a run and append one `not_run` case per scenario case
pub fn add_scenario_to_run(
    db: &DbConnection,
    run_id: &str,
    scenario_id: &str,
) -> DbResult<Vec<RunCase>> {
    let mut conn = db.lock();
    let tx = conn.transaction()?;

    tx.execute(
        "INSERT OR IGNORE INTO run_scenarios (run_id, scenario_id, position)
         VALUES (?1, ?2, (SELECT COALESCE(MAX(position), 0) + 1 FROM run_scenarios WHERE run_id = ?1))",
        params![run_id, scenario_id],
    )?;

    let mut added = Vec::new();
    for case_id in scenario_case_ids(&tx, scenario_id)? {
        let id = insert_run_case(&tx, run_id, &case_id)?;
        if let Some(run_case) = fetch_run_case(&tx, &id)? {
            added.push(run_case);
        }
    }
    tx.commit()?;

    log::debug!(
        "Added scenario {} to run {} ({} cases)",
        scenario_id,
        run_id,
        added.len()
    );
    Ok(added)
}

/// Patch a run case in place. Setting a result status without an execution
/// time stamps the current time.
pub fn update_run_case(
    db: &DbConnection,
    id: &str,
    update: RunCaseUpdate,
) -> DbResult<Option<RunCase>> {
    let executed_at = match (&update.executed_at, update.status) {
        (Some(at), _) => Some(normalize_timestamp(at)?),
        (None, Some(status)) if status != RunCaseStatus::NotRun => Some(timestamp()),
        _ => None,
    };

    let mut conn = db.lock();
    let tx = conn.transaction()?;

    if let Some(status) = update.status {
        tx.execute(
            "UPDATE run_cases SET status = ?1 WHERE id = ?2",
            params![status.as_str(), id],
        )?;
    }

    if let Some(actual_result) = &update.actual_result {
        tx.execute(
            "UPDATE run_cases SET actual_result = ?1 WHERE id = ?2",
            params![actual_result, id],
        )?;
    }

    if let Some(evidence_summary) = &update.evidence_summary {
        tx.execute(
            "UPDATE run_cases SET evidence_summary = ?1 WHERE id = ?2",
            params![evidence_summary, id],
        )?;
    }

    if let Some(executed_at) = executed_at {
        tx.execute(
            "UPDATE run_cases SET executed_at = ?1 WHERE id = ?2",
            params![executed_at, id],
        )?;
    }

    let updated = fetch_run_case(&tx, id)?;
    tx.commit()?;
    Ok(updated)
}

/// Remove a run case; its evidence rows cascade, evidence files are left on disk
pub fn remove_run_case(db: &DbConnection, id: &str) -> DbResult<()> {
    let conn = db.lock();
    conn.execute("DELETE FROM run_cases WHERE id = ?1", params![id])?;
    log::debug!("Removed run case {}", id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::cases::save_test_case;
    use crate::state::db::open_in_memory;
    use crate::state::models::{ScenarioInput, TestCaseInput};
    use crate::state::scenarios::save_scenario;

    fn case(db: &DbConnection, title: &str) -> String {
        save_test_case(
            db,
            TestCaseInput {
                title: title.to_string(),
                ..Default::default()
            },
        )
        .unwrap()
    }

    fn run(db: &DbConnection, name: &str) -> String {
        save_run(
            db,
            TestRunInput {
                name: name.to_string(),
                ..Default::default()
            },
        )
        .unwrap()
    }

    #[test]
    fn test_save_and_update_run() {
        let db = open_in_memory().unwrap();
        let id = run(&db, "Nightly");

        save_run(
            &db,
            TestRunInput {
                id: Some(id.clone()),
                name: "Nightly".to_string(),
                status: RunStatus::Completed,
                tester: "qa".to_string(),
                ..Default::default()
            },
        )
        .unwrap();

        let detail = get_run(&db, &id).unwrap().unwrap();
        assert_eq!(detail.run.status, RunStatus::Completed);
        assert_eq!(detail.run.tester, "qa");
        assert_eq!(list_runs(&db).unwrap().len(), 1);
    }

    #[test]
    fn test_add_run_case_defaults() {
        let db = open_in_memory().unwrap();
        let case_id = case(&db, "Login");
        let run_id = run(&db, "Smoke");

        let run_case = add_run_case(&db, &run_id, &case_id).unwrap();
        assert_eq!(run_case.status, RunCaseStatus::NotRun);
        assert_eq!(run_case.case_title.as_deref(), Some("Login"));
        assert!(run_case.actual_result.is_empty());
        assert!(run_case.executed_at.is_none());
    }

    #[test]
    fn test_add_run_case_unknown_case() {
        let db = open_in_memory().unwrap();
        let run_id = run(&db, "Smoke");
        let result = add_run_case(&db, &run_id, "missing");
        assert!(matches!(result, Err(DbError::Integrity(_))));
    }

    #[test]
    fn test_update_run_case_patches_fields() {
        let db = open_in_memory().unwrap();
        let case_id = case(&db, "Login");
        let run_id = run(&db, "Smoke");
        let run_case = add_run_case(&db, &run_id, &case_id).unwrap();

        let updated = update_run_case(
            &db,
            &run_case.id,
            RunCaseUpdate {
                status: Some(RunCaseStatus::Fail),
                actual_result: Some("500 error".to_string()),
                ..Default::default()
            },
        )
        .unwrap()
        .unwrap();
        assert_eq!(updated.status, RunCaseStatus::Fail);
        assert_eq!(updated.actual_result, "500 error");
        assert!(updated.executed_at.is_some());

        let updated = update_run_case(
            &db,
            &run_case.id,
            RunCaseUpdate {
                evidence_summary: Some("see screenshot".to_string()),
                ..Default::default()
            },
        )
        .unwrap()
        .unwrap();
        assert_eq!(updated.status, RunCaseStatus::Fail);
        assert_eq!(updated.actual_result, "500 error");
        assert_eq!(updated.evidence_summary, "see screenshot");
    }

    #[test]
    fn test_run_cases_ordered_by_execution() {
        let db = open_in_memory().unwrap();
        let run_id = run(&db, "Regression");
        let first = add_run_case(&db, &run_id, &case(&db, "First")).unwrap();
        let second = add_run_case(&db, &run_id, &case(&db, "Second")).unwrap();
        let pending = add_run_case(&db, &run_id, &case(&db, "Pending")).unwrap();

        // Offsets differ but the stored times compare as instants
        for (run_case, at) in [
            (&first, "2024-01-02T09:00:00+01:00"),
            (&second, "2024-01-02T10:00:00Z"),
        ] {
            update_run_case(
                &db,
                &run_case.id,
                RunCaseUpdate {
                    status: Some(RunCaseStatus::Pass),
                    executed_at: Some(at.to_string()),
                    ..Default::default()
                },
            )
            .unwrap();
        }

        let ids: Vec<_> = get_run(&db, &run_id)
            .unwrap()
            .unwrap()
            .cases
            .into_iter()
            .map(|c| c.id)
            .collect();
        assert_eq!(ids, vec![second.id.clone(), first.id.clone(), pending.id]);

        let cases = get_run(&db, &run_id).unwrap().unwrap().cases;
        assert_eq!(
            cases[1].executed_at.as_deref(),
            Some("2024-01-02T08:00:00.000000Z")
        );

        let bad = update_run_case(
            &db,
            &first.id,
            RunCaseUpdate {
                executed_at: Some("last tuesday".to_string()),
                ..Default::default()
            },
        );
        assert!(matches!(bad, Err(DbError::Validation(_))));
    }

    #[test]
    fn test_remove_run_case() {
        let db = open_in_memory().unwrap();
        let run_id = run(&db, "Smoke");
        let run_case = add_run_case(&db, &run_id, &case(&db, "Login")).unwrap();

        remove_run_case(&db, &run_case.id).unwrap();
        assert!(get_run(&db, &run_id).unwrap().unwrap().cases.is_empty());
    }

    #[test]
    fn test_add_scenario_to_run() {
        let db = open_in_memory().unwrap();
        let a = case(&db, "A");
        let b = case(&db, "B");
        let scenario_id = save_scenario(
            &db,
            ScenarioInput {
                title: "Checkout".to_string(),
                case_ids: vec![a.clone(), b.clone()],
                ..Default::default()
            },
        )
        .unwrap();
        let run_id = run(&db, "Release");

        let added = add_scenario_to_run(&db, &run_id, &scenario_id).unwrap();
        let case_ids: Vec<_> = added.iter().map(|c| c.case_id.clone()).collect();
        assert_eq!(case_ids, vec![a, b]);

        let detail = get_run(&db, &run_id).unwrap().unwrap();
        assert_eq!(detail.scenario_ids, vec![scenario_id]);
        assert_eq!(detail.cases.len(), 2);
    }

    #[test]
    fn test_get_missing_run() {
        let db = open_in_memory().unwrap();
        assert!(get_run(&db, "nope").unwrap().is_none());
        assert!(update_run_case(&db, "nope", RunCaseUpdate::default())
            .unwrap()
            .is_none());
    }
}
