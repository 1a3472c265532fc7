use std::fs::{self, File};
use std::path::{Path, PathBuf};

use zip::ZipArchive;

use crate::app::models::PackageInfo;

/// Checks that `path` is a readable zip archive before any device sees it.
pub fn inspect_package(path: &Path) -> PackageInfo {
    let mut info = PackageInfo {
        path: path.to_string_lossy().to_string(),
        file_size_bytes: 0,
        error: None,
    };

    if !path.is_file() {
        info.error = Some(format!("File not found: {}", path.display()));
        return info;
    }

    if let Ok(metadata) = fs::metadata(path) {
        info.file_size_bytes = metadata.len();
    }

    match File::open(path) {
        Ok(file) => {
            if let Err(err) = ZipArchive::new(file) {
                info.error = Some(format!("Invalid APK: {err}"));
            }
        }
        Err(err) => {
            info.error = Some(format!("Failed to open APK: {err}"));
        }
    }

    info
}

/// Expands `~/` and anchors relative paths at `base`.
pub fn resolve_package_path(path: &str, base: &Path) -> PathBuf {
    let trimmed = path.trim();
    if let Some(rest) = trimmed.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    let candidate = PathBuf::from(trimmed);
    if candidate.is_absolute() {
        candidate
    } else {
        base.join(candidate)
    }
}
