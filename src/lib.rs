// Casebook - portable project store for test management
// Module declarations

pub mod commands;
pub mod config;
pub mod interchange;
pub mod state;

pub use config::StoreConfig;
pub use interchange::{export_data, import_data, EntityKind, Format};
pub use state::{DbError, DbResult, Session};

/// Install an `env_logger` backend for hosts that don't bring their own.
/// Safe to call more than once.
pub fn init_logging(level: log::LevelFilter) {
    let installed = env_logger::Builder::new()
        .filter_level(level)
        .format_timestamp_millis()
        .try_init()
        .is_ok();

    if installed {
        log::info!("Casebook logging initialized at {}", level);
    }
}
