// Project lifecycle: create/open a project directory and hold the active store
use rusqlite::{params, OptionalExtension};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::db::{open_db, timestamp, DbConnection, DbError, DbResult};
use super::models::ProjectInfo;
use crate::config::StoreConfig;

/// Handle to the currently open project
#[derive(Clone)]
pub struct ActiveStore {
    pub db: DbConnection,
    pub root: PathBuf,
    pub config: StoreConfig,
}

/// Owns the single active store. Opening another project replaces it.
pub struct Session {
    config: StoreConfig,
    active: Mutex<Option<ActiveStore>>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self::with_config(StoreConfig::default())
    }

    pub fn with_config(config: StoreConfig) -> Self {
        Self {
            config,
            active: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// The active store, or `NoActiveStore` before any project was opened
    pub fn active(&self) -> DbResult<ActiveStore> {
        self.active
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
            .ok_or(DbError::NoActiveStore)
    }

    pub fn db(&self) -> DbResult<DbConnection> {
        Ok(self.active()?.db)
    }

    pub fn is_open(&self) -> bool {
        self.active().is_ok()
    }

    fn activate(&self, store: ActiveStore) {
        *self
            .active
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(store);
    }

    /// Create a project directory (or reuse an existing one) and make it active
    pub fn create_project(&self, root: &Path, name: &str) -> DbResult<ProjectInfo> {
        fs::create_dir_all(root).map_err(|e| {
            DbError::NotFound(format!("cannot create {}: {}", root.display(), e))
        })?;
        fs::create_dir_all(root.join(&self.config.attachments_dir))?;

        let db = open_db(&root.join(&self.config.db_file_name))?;
        let now = timestamp();
        {
            let mut conn = db.lock();
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT OR IGNORE INTO meta (key, value) VALUES ('created_at', ?1)",
                params![now],
            )?;
            tx.execute(
                "INSERT OR REPLACE INTO meta (key, value) VALUES ('name', ?1)",
                params![name],
            )?;
            tx.execute(
                "INSERT OR REPLACE INTO meta (key, value) VALUES ('updated_at', ?1)",
                params![now],
            )?;
            tx.commit()?;
        }

        self.activate(ActiveStore {
            db,
            root: root.to_path_buf(),
            config: self.config.clone(),
        });
        log::info!("Created project '{}' at {}", name, root.display());

        self.get_project_info()
    }

    /// Open a project given its directory or the store file inside it
    pub fn open_project(&self, path: &Path) -> DbResult<ProjectInfo> {
        if !path.exists() {
            return Err(DbError::NotFound(path.display().to_string()));
        }

        let (root, db_path) = if path.is_dir() {
            (path.to_path_buf(), path.join(&self.config.db_file_name))
        } else {
            let root = path
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from("."));
            (root, path.to_path_buf())
        };

        if !db_path.is_file() {
            return Err(DbError::NotFound(db_path.display().to_string()));
        }

        let db = open_db(&db_path)?;
        self.activate(ActiveStore {
            db,
            root: root.clone(),
            config: self.config.clone(),
        });
        log::info!("Opened project at {}", root.display());

        self.get_project_info()
    }

    pub fn get_project_info(&self) -> DbResult<ProjectInfo> {
        let store = self.active()?;
        let conn = store.db.lock();
        let read = |key: &str| -> DbResult<String> {
            let value = conn
                .query_row("SELECT value FROM meta WHERE key = ?1", [key], |row| {
                    row.get::<_, String>(0)
                })
                .optional()?;
            Ok(value.unwrap_or_default())
        };

        Ok(ProjectInfo {
            name: read("name")?,
            created_at: read("created_at")?,
            updated_at: read("updated_at")?,
            root_path: store.root.to_string_lossy().to_string(),
        })
    }

    pub fn rename_project(&self, name: &str) -> DbResult<ProjectInfo> {
        let store = self.active()?;
        {
            let mut conn = store.db.lock();
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT OR REPLACE INTO meta (key, value) VALUES ('name', ?1)",
                params![name],
            )?;
            tx.execute(
                "INSERT OR REPLACE INTO meta (key, value) VALUES ('updated_at', ?1)",
                params![timestamp()],
            )?;
            tx.commit()?;
        }
        log::info!("Renamed project to '{}'", name);
        self.get_project_info()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_requires_active_store() {
        let session = Session::new();
        assert!(!session.is_open());
        assert!(matches!(session.db(), Err(DbError::NoActiveStore)));
        assert!(matches!(
            session.get_project_info(),
            Err(DbError::NoActiveStore)
        ));
    }

    #[test]
    fn test_create_project() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("qa");
        let session = Session::new();

        let info = session.create_project(&root, "Checkout QA").unwrap();
        assert_eq!(info.name, "Checkout QA");
        assert_eq!(info.created_at, info.updated_at);
        assert!(root.join("casebook.db").is_file());
        assert!(root.join("attachments").is_dir());
    }

    #[test]
    fn test_create_is_rerunnable() {
        let temp_dir = TempDir::new().unwrap();
        let session = Session::new();
        let first = session.create_project(temp_dir.path(), "One").unwrap();
        let second = session.create_project(temp_dir.path(), "Two").unwrap();
        assert_eq!(second.name, "Two");
        assert_eq!(second.created_at, first.created_at);
    }

    #[test]
    fn test_open_by_directory_or_file() {
        let temp_dir = TempDir::new().unwrap();
        Session::new()
            .create_project(temp_dir.path(), "Portable")
            .unwrap();

        let session = Session::new();
        let by_dir = session.open_project(temp_dir.path()).unwrap();
        assert_eq!(by_dir.name, "Portable");

        let by_file = session
            .open_project(&temp_dir.path().join("casebook.db"))
            .unwrap();
        assert_eq!(by_file.name, "Portable");
        assert_eq!(by_file.root_path, temp_dir.path().to_string_lossy());
    }

    #[test]
    fn test_open_missing() {
        let temp_dir = TempDir::new().unwrap();
        let session = Session::new();

        let missing_dir = session.open_project(&temp_dir.path().join("absent"));
        assert!(matches!(missing_dir, Err(DbError::NotFound(_))));

        // Directory exists but holds no store file
        let empty_dir = session.open_project(temp_dir.path());
        assert!(matches!(empty_dir, Err(DbError::NotFound(_))));
        assert!(!session.is_open());
    }

    #[test]
    fn test_open_replaces_active_store() {
        let temp_dir = TempDir::new().unwrap();
        let session = Session::new();
        session
            .create_project(&temp_dir.path().join("a"), "A")
            .unwrap();
        session
            .create_project(&temp_dir.path().join("b"), "B")
            .unwrap();
        session.open_project(&temp_dir.path().join("a")).unwrap();
        assert_eq!(session.get_project_info().unwrap().name, "A");
    }

    #[test]
    fn test_rename_project() {
        let temp_dir = TempDir::new().unwrap();
        let session = Session::new();
        session.create_project(temp_dir.path(), "Old").unwrap();
        let renamed = session.rename_project("New").unwrap();
        assert_eq!(renamed.name, "New");
        assert!(renamed.updated_at >= renamed.created_at);
    }
}
