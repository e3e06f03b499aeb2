use std::path::PathBuf;

/// Directory where the server keeps its database and other local state.
pub fn asset_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("pinboard")
}

pub fn database_path() -> PathBuf {
    asset_dir().join("pinboard.db")
}
