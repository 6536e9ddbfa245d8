// Fixed export projections, one per entity kind
use rusqlite::types::ValueRef;
use rusqlite::{params, Connection, Params};
use serde_json::{Number, Value};

use super::{EntityKind, RowSet};
use crate::state::{DataScope, DbConnection, DbResult};

const TEST_CASES_SQL: &str = "
    SELECT c.id, c.title, c.objective, c.preconditions, c.priority, c.severity, c.tags, c.folder_id,
           (SELECT json_group_array(json_object('action', s.action, 'expected', s.expected)
                                    ORDER BY s.position)
              FROM test_steps s WHERE s.case_id = c.id) AS steps,
           c.created_at, c.updated_at
    FROM test_cases c
    ORDER BY c.created_at, c.rowid";

const SCENARIOS_SQL: &str = "
    SELECT s.id, s.title, s.objective, s.preconditions,
           (SELECT json_group_array(c.title ORDER BY sc.position)
              FROM scenario_cases sc JOIN test_cases c ON c.id = sc.case_id
             WHERE sc.scenario_id = s.id) AS case_titles,
           s.created_at, s.updated_at
    FROM scenarios s
    ORDER BY s.created_at, s.rowid";

const DATA_SETS_SQL: &str = "
    SELECT d.id, d.name, d.scope, d.description,
           (SELECT json_group_array(json_object('label', i.label, 'value', i.value, 'note', i.note)
                                    ORDER BY i.sort_order)
              FROM data_items i WHERE i.data_set_id = d.id) AS items,
           d.created_at, d.updated_at
    FROM data_sets d
    WHERE ?1 IS NULL OR d.scope = ?1
    ORDER BY d.created_at, d.rowid";

// Runs without cases still yield one row, with null case fields
const TEST_RUNS_SQL: &str = "
    SELECT r.id AS run_id, r.name AS run_name, r.environment, r.build_version, r.tester,
           r.status AS run_status, r.started_at, r.finished_at, r.notes,
           rc.id AS run_case_id, rc.case_id, c.title AS case_title, rc.status AS case_status,
           rc.actual_result, rc.evidence_summary, rc.executed_at
    FROM test_runs r
    LEFT JOIN run_cases rc ON rc.run_id = r.id
    LEFT JOIN test_cases c ON c.id = rc.case_id
    ORDER BY r.created_at, r.rowid, rc.rowid";

fn json_value(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null),
        ValueRef::Text(t) | ValueRef::Blob(t) => {
            Value::String(String::from_utf8_lossy(t).into_owned())
        }
    }
}

fn query_rowset<P: Params>(conn: &Connection, sql: &str, params: P) -> DbResult<RowSet> {
    let mut stmt = conn.prepare(sql)?;
    let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
    let width = columns.len();

    let rows = stmt
        .query_map(params, |row| {
            (0..width)
                .map(|index| row.get_ref(index).map(json_value))
                .collect::<rusqlite::Result<Vec<_>>>()
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(RowSet { columns, rows })
}

/// Select the export projection for `kind`
pub fn project(db: &DbConnection, kind: EntityKind, scope: Option<DataScope>) -> DbResult<RowSet> {
    let conn = db.lock();
    match kind {
        EntityKind::TestCases => query_rowset(&conn, TEST_CASES_SQL, []),
        EntityKind::Scenarios => query_rowset(&conn, SCENARIOS_SQL, []),
        EntityKind::DataSets => {
            query_rowset(&conn, DATA_SETS_SQL, params![scope.map(|s| s.as_str())])
        }
        EntityKind::TestRuns => query_rowset(&conn, TEST_RUNS_SQL, []),
    }
}
