//! Filesystem helpers

use std::fs;
use std::path::Path;

use log::{error, info};

/// Check if a path exists
pub fn path_exists(path: &str) -> bool {
    Path::new(path).exists()
}

/// Ensure a directory exists, creating it (and parents) if necessary.
///
/// Returns true if the directory exists afterwards.
pub fn ensure_dir_exists(path: &Path) -> bool {
    if path.exists() && path.is_dir() {
        return true;
    }

    match fs::create_dir_all(path) {
        Ok(_) => {
            info!("Created directory: {}", path.display());
            true
        }
        Err(e) => {
            error!("Failed to create directory {}: {}", path.display(), e);
            false
        }
    }
}
