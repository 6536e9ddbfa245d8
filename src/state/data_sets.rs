// Data set CRUD: scoped bundles of labelled values
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::db::{new_id, row_exists, timestamp, DbConnection, DbError, DbResult};
use super::models::{
    DataItem, DataItemInput, DataLink, DataScope, DataSet, DataSetDetail, DataSetInput,
};

const DATA_SET_COLUMNS: &str = "id, name, scope, description, created_at, updated_at";

fn data_set_from_row(row: &Row) -> rusqlite::Result<DataSet> {
    Ok(DataSet {
        id: row.get(0)?,
        name: row.get(1)?,
        scope: DataScope::from_string(&row.get::<_, String>(2)?),
        description: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

/// Create or update a data set; items and links are replaced wholesale.
/// Returns the data set id.
pub fn save_data_set(db: &DbConnection, input: DataSetInput) -> DbResult<String> {
    let link_target = input.scope.link_target();
    if link_target.is_none() && !input.links.is_empty() {
        return Err(DbError::Validation(
            "common data sets cannot be linked to entities".to_string(),
        ));
    }

    let mut conn = db.lock();
    let tx = conn.transaction()?;

    let existing = match input.id.as_deref() {
        Some(id) if row_exists(&tx, "data_sets", id)? => Some(id.to_string()),
        _ => None,
    };

    let id = match existing {
        Some(id) => {
            tx.execute(
                "UPDATE data_sets SET name = ?1, scope = ?2, description = ?3, updated_at = ?4
                 WHERE id = ?5",
                params![
                    input.name,
                    input.scope.as_str(),
                    input.description,
                    timestamp(),
                    id
                ],
            )?;
            id
        }
        None => {
            let id = input.id.clone().unwrap_or_else(new_id);
            tx.execute(
                "INSERT INTO data_sets (id, name, scope, description, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
                params![
                    id,
                    input.name,
                    input.scope.as_str(),
                    input.description,
                    timestamp()
                ],
            )?;
            id
        }
    };

    replace_items(&tx, &id, &input.items)?;
    replace_links(&tx, &id, link_target, &input.links)?;
    tx.commit()?;

    log::debug!(
        "Saved data set {} ({} items, {} links)",
        id,
        input.items.len(),
        input.links.len()
    );
    Ok(id)
}

fn replace_items(conn: &Connection, data_set_id: &str, items: &[DataItemInput]) -> DbResult<()> {
    conn.execute(
        "DELETE FROM data_items WHERE data_set_id = ?1",
        params![data_set_id],
    )?;

    let mut stmt = conn.prepare(
        "INSERT INTO data_items (id, data_set_id, label, value, note, sort_order)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    )?;
    for (index, item) in items.iter().enumerate() {
        stmt.execute(params![
            new_id(),
            data_set_id,
            item.label,
            item.value,
            item.note,
            index as i64 + 1
        ])?;
    }
    Ok(())
}

fn replace_links(
    conn: &Connection,
    data_set_id: &str,
    entity_type: Option<&str>,
    entity_ids: &[String],
) -> DbResult<()> {
    conn.execute(
        "DELETE FROM data_links WHERE data_set_id = ?1",
        params![data_set_id],
    )?;

    let entity_type = match entity_type {
        Some(t) => t,
        None => return Ok(()),
    };

    // Duplicate links collapse onto the composite key
    let mut stmt = conn.prepare(
        "INSERT OR IGNORE INTO data_links (data_set_id, entity_type, entity_id)
         VALUES (?1, ?2, ?3)",
    )?;
    for entity_id in entity_ids {
        stmt.execute(params![data_set_id, entity_type, entity_id])?;
    }
    Ok(())
}

pub(crate) fn data_set_items(conn: &Connection, data_set_id: &str) -> DbResult<Vec<DataItem>> {
    let mut stmt = conn.prepare(
        "SELECT id, data_set_id, label, value, note, sort_order
         FROM data_items WHERE data_set_id = ?1
         ORDER BY sort_order",
    )?;
    let items = stmt
        .query_map([data_set_id], |row| {
            Ok(DataItem {
                id: row.get(0)?,
                data_set_id: row.get(1)?,
                label: row.get(2)?,
                value: row.get(3)?,
                note: row.get(4)?,
                sort_order: row.get(5)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(items)
}

/// Get a data set with its ordered items and links
pub fn get_data_set(db: &DbConnection, id: &str) -> DbResult<Option<DataSetDetail>> {
    let conn = db.lock();
    let data_set = conn
        .query_row(
            &format!("SELECT {} FROM data_sets WHERE id = ?1", DATA_SET_COLUMNS),
            [id],
            data_set_from_row,
        )
        .optional()?;

    let data_set = match data_set {
        Some(d) => d,
        None => return Ok(None),
    };

    let items = data_set_items(&conn, id)?;

    let mut stmt = conn.prepare(
        "SELECT data_set_id, entity_type, entity_id FROM data_links
         WHERE data_set_id = ?1
         ORDER BY entity_type, entity_id",
    )?;
    let links = stmt
        .query_map([id], |row| {
            Ok(DataLink {
                data_set_id: row.get(0)?,
                entity_type: row.get(1)?,
                entity_id: row.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Some(DataSetDetail {
        data_set,
        items,
        links,
    }))
}

/// List data sets by name, optionally restricted to one scope
pub fn list_data_sets(db: &DbConnection, scope: Option<DataScope>) -> DbResult<Vec<DataSet>> {
    let conn = db.lock();
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM data_sets
         WHERE ?1 IS NULL OR scope = ?1
         ORDER BY name, created_at",
        DATA_SET_COLUMNS
    ))?;
    let data_sets = stmt
        .query_map(params![scope.map(|s| s.as_str())], data_set_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(data_sets)
}

/// Delete a data set; its items cascade. Link rows carry no foreign key and
/// are left pointing at the removed set.
pub fn delete_data_set(db: &DbConnection, id: &str) -> DbResult<()> {
    let conn = db.lock();
    conn.execute("DELETE FROM data_sets WHERE id = ?1", params![id])?;
    log::debug!("Deleted data set {}", id);
    Ok(())
}
