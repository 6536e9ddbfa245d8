// Store layout configuration
use serde::{Deserialize, Serialize};

pub const DEFAULT_DB_FILE_NAME: &str = "casebook.db";
pub const DEFAULT_ATTACHMENTS_DIR: &str = "attachments";

/// Names of the files that make up a project directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// File name of the SQLite store inside the project root
    pub db_file_name: String,
    /// Directory (relative to the project root) holding evidence files
    pub attachments_dir: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_file_name: DEFAULT_DB_FILE_NAME.to_string(),
            attachments_dir: DEFAULT_ATTACHMENTS_DIR.to_string(),
        }
    }
}

impl StoreConfig {
    /// Parse a config from JSON, falling back to defaults for absent keys
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}
