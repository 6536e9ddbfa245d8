// Scenario CRUD: ordered groups of test cases
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::db::{new_id, row_exists, timestamp, DbConnection, DbResult};
use super::models::{Scenario, ScenarioCaseRef, ScenarioDetail, ScenarioInput};

const SCENARIO_COLUMNS: &str =
    "id, title, objective, preconditions, created_at, updated_at";

fn scenario_from_row(row: &Row) -> rusqlite::Result<Scenario> {
    Ok(Scenario {
        id: row.get(0)?,
        title: row.get(1)?,
        objective: row.get(2)?,
        preconditions: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

/// Insert a scenario row with matching created/updated timestamps
pub(crate) fn insert_scenario_row(
    conn: &Connection,
    id: &str,
    title: &str,
    objective: &str,
    preconditions: &str,
) -> DbResult<()> {
    let now = timestamp();
    conn.execute(
        "INSERT INTO scenarios (id, title, objective, preconditions, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
        params![id, title, objective, preconditions, now],
    )?;
    Ok(())
}

/// Replace a scenario's case links with `case_ids`, positions 1..=n in order.
/// Repeated ids keep their first position.
pub(crate) fn replace_scenario_cases(
    conn: &Connection,
    scenario_id: &str,
    case_ids: &[String],
) -> DbResult<()> {
    conn.execute(
        "DELETE FROM scenario_cases WHERE scenario_id = ?1",
        params![scenario_id],
    )?;

    let mut stmt = conn.prepare(
        "INSERT INTO scenario_cases (scenario_id, case_id, position) VALUES (?1, ?2, ?3)",
    )?;
    let mut seen: Vec<&str> = Vec::with_capacity(case_ids.len());
    for case_id in case_ids {
        if seen.contains(&case_id.as_str()) {
            continue;
        }
        seen.push(case_id.as_str());
        stmt.execute(params![scenario_id, case_id, seen.len() as i64])?;
    }
    Ok(())
}

/// Ordered case ids of a scenario
pub(crate) fn scenario_case_ids(conn: &Connection, scenario_id: &str) -> DbResult<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT case_id FROM scenario_cases WHERE scenario_id = ?1 ORDER BY position",
    )?;
    let ids = stmt
        .query_map([scenario_id], |row| row.get(0))?
        .collect::<Result<Vec<String>, _>>()?;
    Ok(ids)
}

/// Create or update a scenario and replace its case list; returns the scenario id
pub fn save_scenario(db: &DbConnection, input: ScenarioInput) -> DbResult<String> {
    let mut conn = db.lock();
    let tx = conn.transaction()?;

    let existing = match input.id.as_deref() {
        Some(id) if row_exists(&tx, "scenarios", id)? => Some(id.to_string()),
        _ => None,
    };

    let id = match existing {
        Some(id) => {
            tx.execute(
                "UPDATE scenarios SET title = ?1, objective = ?2, preconditions = ?3, updated_at = ?4
                 WHERE id = ?5",
                params![
                    input.title,
                    input.objective,
                    input.preconditions,
                    timestamp(),
                    id
                ],
            )?;
            id
        }
        None => {
            let id = input.id.clone().unwrap_or_else(new_id);
            insert_scenario_row(&tx, &id, &input.title, &input.objective, &input.preconditions)?;
            id
        }
    };

    replace_scenario_cases(&tx, &id, &input.case_ids)?;
    tx.commit()?;

    log::debug!("Saved scenario {} with {} cases", id, input.case_ids.len());
    Ok(id)
}

/// Get a scenario with its ordered cases
pub fn get_scenario(db: &DbConnection, id: &str) -> DbResult<Option<ScenarioDetail>> {
    let conn = db.lock();
    let scenario = conn
        .query_row(
            &format!("SELECT {} FROM scenarios WHERE id = ?1", SCENARIO_COLUMNS),
            [id],
            scenario_from_row,
        )
        .optional()?;

    let scenario = match scenario {
        Some(s) => s,
        None => return Ok(None),
    };

    let mut stmt = conn.prepare(
        "SELECT sc.case_id, c.title, sc.position
         FROM scenario_cases sc
         JOIN test_cases c ON c.id = sc.case_id
         WHERE sc.scenario_id = ?1
         ORDER BY sc.position",
    )?;
    let cases = stmt
        .query_map([id], |row| {
            Ok(ScenarioCaseRef {
                case_id: row.get(0)?,
                title: row.get(1)?,
                position: row.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Some(ScenarioDetail { scenario, cases }))
}

/// List all scenarios, oldest first
pub fn list_scenarios(db: &DbConnection) -> DbResult<Vec<Scenario>> {
    let conn = db.lock();
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM scenarios ORDER BY created_at, rowid",
        SCENARIO_COLUMNS
    ))?;
    let scenarios = stmt
        .query_map([], scenario_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(scenarios)
}

/// Delete a scenario; its case links go with it
pub fn delete_scenario(db: &DbConnection, id: &str) -> DbResult<()> {
    let conn = db.lock();
    conn.execute("DELETE FROM scenarios WHERE id = ?1", params![id])?;
    log::debug!("Deleted scenario {}", id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::cases::save_test_case;
    use crate::state::db::{open_in_memory, DbError};
    use crate::state::models::TestCaseInput;

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

    #[test]
    fn test_save_and_get_scenario() {
        let db = open_in_memory().unwrap();
        let login = case(&db, "Login");
        let logout = case(&db, "Logout");

        let id = save_scenario(
            &db,
            ScenarioInput {
                title: "Session".to_string(),
                case_ids: vec![logout.clone(), login.clone()],
                ..Default::default()
            },
        )
        .unwrap();

        let detail = get_scenario(&db, &id).unwrap().unwrap();
        assert_eq!(detail.scenario.title, "Session");
        let titles: Vec<_> = detail.cases.iter().map(|c| c.title.as_str()).collect();
        assert_eq!(titles, vec!["Logout", "Login"]);
        let positions: Vec<_> = detail.cases.iter().map(|c| c.position).collect();
        assert_eq!(positions, vec![1, 2]);
    }

    #[test]
    fn test_links_replaced_on_save() {
        let db = open_in_memory().unwrap();
        let a = case(&db, "A");
        let b = case(&db, "B");

        let id = save_scenario(
            &db,
            ScenarioInput {
                title: "S".to_string(),
                case_ids: vec![a.clone(), b.clone()],
                ..Default::default()
            },
        )
        .unwrap();
        let created_at = get_scenario(&db, &id).unwrap().unwrap().scenario.created_at;

        save_scenario(
            &db,
            ScenarioInput {
                id: Some(id.clone()),
                title: "S2".to_string(),
                case_ids: vec![b.clone(), b.clone()],
                ..Default::default()
            },
        )
        .unwrap();

        let detail = get_scenario(&db, &id).unwrap().unwrap();
        assert_eq!(detail.scenario.title, "S2");
        assert_eq!(detail.scenario.created_at, created_at);
        assert_eq!(detail.cases.len(), 1);
        assert_eq!(detail.cases[0].case_id, b);
        assert_eq!(detail.cases[0].position, 1);
    }

    #[test]
    fn test_unknown_case_rolls_back() {
        let db = open_in_memory().unwrap();
        let before = list_scenarios(&db).unwrap().len();

        let result = save_scenario(
            &db,
            ScenarioInput {
                title: "Broken".to_string(),
                case_ids: vec!["no-such-case".to_string()],
                ..Default::default()
            },
        );

        assert!(matches!(result, Err(DbError::Integrity(_))));
        assert_eq!(list_scenarios(&db).unwrap().len(), before);
    }

    #[test]
    fn test_get_missing_scenario() {
        let db = open_in_memory().unwrap();
        assert!(get_scenario(&db, "missing").unwrap().is_none());
    }

    #[test]
    fn test_delete_scenario_keeps_cases() {
        let db = open_in_memory().unwrap();
        let a = case(&db, "A");
        let id = save_scenario(
            &db,
            ScenarioInput {
                title: "S".to_string(),
                case_ids: vec![a.clone()],
                ..Default::default()
            },
        )
        .unwrap();

        delete_scenario(&db, &id).unwrap();
        assert!(get_scenario(&db, &id).unwrap().is_none());
        assert!(crate::state::cases::get_test_case(&db, &a).unwrap().is_some());
    }
}
