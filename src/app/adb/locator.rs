use std::path::{Path, PathBuf};

use crate::app::config::AdbSettings;
use crate::app::error::AppError;

pub fn normalize_command_path(value: &str) -> String {
    let trimmed = value.trim();
    if let Some(inner) = trimmed
        .strip_prefix('"')
        .and_then(|candidate| candidate.strip_suffix('"'))
    {
        return inner.trim().to_string();
    }
    if let Some(inner) = trimmed
        .strip_prefix('\'')
        .and_then(|candidate| candidate.strip_suffix('\''))
    {
        return inner.trim().to_string();
    }
    trimmed.to_string()
}

/// Picks the adb executable for `os`.
///
/// An explicit `command_path` always wins. Otherwise `os` must have an entry in
/// `platform_binaries`; relative entries resolve against `resources_dir`. An OS
/// without an entry is unsupported, and that is reported before any command
/// runs.
pub fn resolve_adb_program(
    settings: &AdbSettings,
    os: &str,
    resources_dir: &Path,
    trace_id: &str,
) -> Result<String, AppError> {
    let explicit = normalize_command_path(&settings.command_path);
    if !explicit.is_empty() {
        return Ok(explicit);
    }
    let entry = settings
        .platform_binaries
        .get(os)
        .map(|value| normalize_command_path(value))
        .filter(|value| !value.is_empty())
        .ok_or_else(|| AppError::unsupported_platform(os, trace_id))?;
    let path = PathBuf::from(&entry);
    if path.is_absolute() || entry == "adb" {
        return Ok(entry);
    }
    Ok(resources_dir.join(path).to_string_lossy().to_string())
}

pub fn validate_adb_program(program: &str) -> Result<(), String> {
    if program.trim().is_empty() {
        return Err("ADB command is empty".to_string());
    }
    if program == "adb" {
        return Ok(());
    }
    let path = Path::new(program);
    if path.is_dir() {
        return Err("ADB path must point to an executable file".to_string());
    }
    if !path.exists() {
        return Err("ADB executable not found at the configured path".to_string());
    }
    Ok(())
}
