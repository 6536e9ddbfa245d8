// Map decoded records onto repository saves. Every record becomes a new row.
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;

use super::{cell_text, EntityKind, Record};
use crate::state::cases::find_case_id_by_title;
use crate::state::db::{normalize_timestamp, row_exists};
use crate::state::{
    add_run_case, save_data_set, save_run, save_scenario, save_test_case, update_run_case,
    DataItemInput, DataScope, DataSetInput, DbConnection, DbResult, RunCaseStatus, RunCaseUpdate,
    RunStatus, ScenarioInput, StepInput, TestCaseInput, TestRunInput,
};

fn text(record: &Record, key: &str) -> String {
    record.get(key).map(cell_text).unwrap_or_default()
}

/// First non-empty text among `keys`
fn text_any(record: &Record, keys: &[&str]) -> String {
    keys.iter()
        .map(|key| text(record, key))
        .find(|value| !value.is_empty())
        .unwrap_or_default()
}

fn optional_text(record: &Record, key: &str) -> Option<String> {
    Some(text(record, key)).filter(|value| !value.is_empty())
}

/// A list given either as a JSON array or as a string holding one.
/// Anything unparseable yields an empty list.
fn nested_list<T: DeserializeOwned>(record: &Record, key: &str) -> Vec<T> {
    let parsed = match record.get(key) {
        Some(Value::Array(items)) => serde_json::from_value(Value::Array(items.clone())),
        Some(Value::String(s)) if !s.trim().is_empty() => serde_json::from_str(s),
        _ => return Vec::new(),
    };
    parsed.unwrap_or_default()
}

fn existing_id(db: &DbConnection, table: &str, id: Option<String>) -> DbResult<Option<String>> {
    match id {
        Some(id) if row_exists(&db.lock(), table, &id)? => Ok(Some(id)),
        _ => Ok(None),
    }
}

fn case_id_by_title(db: &DbConnection, title: &str) -> DbResult<Option<String>> {
    find_case_id_by_title(&db.lock(), title)
}

/// Save every record as a new entity of `kind`; returns how many were processed
pub fn save_records(
    db: &DbConnection,
    kind: EntityKind,
    records: &[Record],
    scope_override: Option<DataScope>,
) -> DbResult<usize> {
    match kind {
        EntityKind::TestCases => {
            for record in records {
                import_test_case(db, record)?;
            }
        }
        EntityKind::Scenarios => {
            for record in records {
                import_scenario(db, record)?;
            }
        }
        EntityKind::DataSets => {
            for record in records {
                import_data_set(db, record, scope_override)?;
            }
        }
        EntityKind::TestRuns => import_runs(db, records)?,
    }
    Ok(records.len())
}

fn import_test_case(db: &DbConnection, record: &Record) -> DbResult<String> {
    let folder_id = existing_id(db, "case_folders", optional_text(record, "folder_id"))?;
    let steps: Vec<StepInput> = nested_list(record, "steps");

    save_test_case(
        db,
        TestCaseInput {
            id: None,
            title: text(record, "title"),
            objective: text(record, "objective"),
            preconditions: text(record, "preconditions"),
            priority: text(record, "priority"),
            severity: text(record, "severity"),
            tags: text(record, "tags"),
            folder_id,
            steps,
            data_set_ids: Vec::new(),
        },
    )
}

fn import_scenario(db: &DbConnection, record: &Record) -> DbResult<String> {
    let mut case_ids = Vec::new();

    for id in nested_list::<String>(record, "case_ids") {
        if let Some(id) = existing_id(db, "test_cases", Some(id))? {
            case_ids.push(id);
        }
    }

    // Unmatched titles are dropped
    for title in nested_list::<String>(record, "case_titles") {
        if let Some(id) = case_id_by_title(db, &title)? {
            case_ids.push(id);
        }
    }

    save_scenario(
        db,
        ScenarioInput {
            id: None,
            title: text(record, "title"),
            objective: text(record, "objective"),
            preconditions: text(record, "preconditions"),
            case_ids,
        },
    )
}

fn import_data_set(
    db: &DbConnection,
    record: &Record,
    scope_override: Option<DataScope>,
) -> DbResult<String> {
    let scope = scope_override
        .or_else(|| DataScope::parse(&text(record, "scope")))
        .unwrap_or_default();

    save_data_set(
        db,
        DataSetInput {
            id: None,
            name: text(record, "name"),
            scope,
            description: text(record, "description"),
            items: nested_list::<DataItemInput>(record, "items"),
            links: Vec::new(),
        },
    )
}

/// Rows sharing a source `run_id` become one new run; each row with a
/// resolvable `case_title` adds a run case carrying its recorded result.
fn import_runs(db: &DbConnection, records: &[Record]) -> DbResult<()> {
    let mut created: HashMap<String, String> = HashMap::new();

    for record in records {
        let source_id = optional_text(record, "run_id");
        let run_id = match source_id.as_ref().and_then(|id| created.get(id)) {
            Some(run_id) => run_id.clone(),
            None => {
                let run_id = save_run(
                    db,
                    TestRunInput {
                        id: None,
                        name: text_any(record, &["run_name", "name"]),
                        environment: text(record, "environment"),
                        build_version: text(record, "build_version"),
                        tester: text(record, "tester"),
                        status: RunStatus::from_string(&text_any(record, &["run_status", "status"])),
                        started_at: optional_text(record, "started_at"),
                        finished_at: optional_text(record, "finished_at"),
                        notes: text(record, "notes"),
                        scenario_ids: Vec::new(),
                    },
                )?;
                if let Some(source_id) = source_id {
                    created.insert(source_id, run_id.clone());
                }
                run_id
            }
        };

        let case_id = match optional_text(record, "case_title") {
            Some(title) => case_id_by_title(db, &title)?,
            None => None,
        };
        if let Some(case_id) = case_id {
            let executed_at = optional_text(record, "executed_at").and_then(|at| {
                normalize_timestamp(&at)
                    .map_err(|e| log::warn!("Ignoring executed_at on import: {}", e))
                    .ok()
            });
            let run_case = add_run_case(db, &run_id, &case_id)?;
            update_run_case(
                db,
                &run_case.id,
                RunCaseUpdate {
                    status: Some(RunCaseStatus::from_string(&text(record, "case_status"))),
                    actual_result: Some(text(record, "actual_result")),
                    evidence_summary: Some(text(record, "evidence_summary")),
                    executed_at,
                },
            )?;
        }
    }

    Ok(())
}
