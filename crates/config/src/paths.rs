//! Path utilities

use std::path::PathBuf;

/// Data directory (~/.tripcast)
pub fn data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".tripcast")
}

/// Config file location
pub fn config_path() -> PathBuf {
    data_dir().join("config.json")
}

/// Ensure directory exists
pub async fn ensure_dir(path: &PathBuf) -> std::io::Result<()> {
    tokio::fs::create_dir_all(path).await
}
