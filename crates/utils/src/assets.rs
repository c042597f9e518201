use std::path::PathBuf;

use directories::ProjectDirs;

/// Directory holding the SQLite database and `config.json`.
///
/// Debug builds keep everything next to the workspace in `dev_assets` so a
/// development run never touches the real data directory.
pub fn asset_dir() -> PathBuf {
    let path = if cfg!(debug_assertions) {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../dev_assets")
    } else {
        ProjectDirs::from("com", "backoffice", "backoffice")
            .map(|dirs| dirs.data_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("./backoffice-data"))
    };

    if !path.exists() {
        if let Err(e) = std::fs::create_dir_all(&path) {
            tracing::warn!(path = %path.display(), error = %e, "Failed to create asset directory");
        }
    }

    path
}

pub fn config_path() -> PathBuf {
    asset_dir().join("config.json")
}

pub fn sqlite_path() -> PathBuf {
    asset_dir().join("db.sqlite")
}
