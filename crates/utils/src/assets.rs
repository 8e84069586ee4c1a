use std::path::PathBuf;

use directories::ProjectDirs;

/// Directory holding the default database file and uploaded logos.
///
/// Falls back to `./data` when the platform has no home directory
/// (containers running as a system user, for instance).
pub fn data_dir() -> PathBuf {
    let path = ProjectDirs::from("org", "donations", "donations-backend")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("data"));

    if !path.exists() {
        if let Err(e) = std::fs::create_dir_all(&path) {
            tracing::warn!(path = %path.display(), "Failed to create data directory: {}", e);
        }
    }

    path
}
