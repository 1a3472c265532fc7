use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::app::error::AppError;
use crate::app::models::OwnerKind;

pub const CONFIG_PATH_ENV: &str = "ADB_PROVISIONER_CONFIG_PATH";

pub const DEFAULT_ADMIN_COMPONENT: &str = "com.scdew.installer/.AppDeviceAdminReceiver";
pub const DEFAULT_LAUNCH_COMPONENT: &str = "com.scdew.workforce/.ui.MainActivity";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AdbSettings {
    /// Explicit adb executable. Wins over the per-platform lookup when set.
    pub command_path: String,
    /// Base directory for bundled binaries and packages. Empty means
    /// `resources/` next to the running executable.
    pub resources_dir: String,
    /// OS name (as reported by `std::env::consts::OS`) to adb binary path.
    pub platform_binaries: BTreeMap<String, String>,
}

impl Default for AdbSettings {
    fn default() -> Self {
        let mut platform_binaries = BTreeMap::new();
        platform_binaries.insert("macos".to_string(), "adb/mac/adb".to_string());
        platform_binaries.insert("windows".to_string(), "adb/win/adb.exe".to_string());
        Self {
            command_path: String::new(),
            resources_dir: String::new(),
            platform_binaries,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CommandSettings {
    pub command_timeout: i32,
    pub install_timeout: i32,
}

impl Default for CommandSettings {
    fn default() -> Self {
        Self {
            command_timeout: 30,
            install_timeout: 180,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ApkInstallSettings {
    pub replace_existing: bool,
    pub allow_downgrade: bool,
    pub grant_permissions: bool,
    pub extra_args: String,
}

impl Default for ApkInstallSettings {
    fn default() -> Self {
        Self {
            replace_existing: true,
            allow_downgrade: true,
            grant_permissions: true,
            extra_args: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ProvisioningSettings {
    pub helper_apk: String,
    pub app_apk: String,
    pub admin_component: String,
    pub owner_kind: OwnerKind,
    pub launch_component: String,
    pub launch_on_finish: bool,
}

impl Default for ProvisioningSettings {
    fn default() -> Self {
        Self {
            helper_apk: "apks/installer-release.apk".to_string(),
            app_apk: "apks/app-release.apk".to_string(),
            admin_component: DEFAULT_ADMIN_COMPONENT.to_string(),
            owner_kind: OwnerKind::Device,
            launch_component: DEFAULT_LAUNCH_COMPONENT.to_string(),
            launch_on_finish: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub adb: AdbSettings,
    #[serde(default)]
    pub command: CommandSettings,
    #[serde(default)]
    pub apk_install: ApkInstallSettings,
    #[serde(default)]
    pub provisioning: ProvisioningSettings,
    #[serde(default)]
    pub version: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            adb: AdbSettings::default(),
            command: CommandSettings::default(),
            apk_install: ApkInstallSettings::default(),
            provisioning: ProvisioningSettings::default(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl AppConfig {
    pub fn resources_dir(&self) -> PathBuf {
        let configured = self.adb.resources_dir.trim();
        if !configured.is_empty() {
            return PathBuf::from(configured);
        }
        std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(|dir| dir.join("resources")))
            .unwrap_or_else(|| PathBuf::from("resources"))
    }
}

fn home_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from("."))
}

pub fn config_path() -> PathBuf {
    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        return PathBuf::from(path);
    }
    home_dir().join(".adb_provisioner_config.json")
}

pub fn backup_config_path() -> PathBuf {
    let path = config_path();
    path.with_extension("backup.json")
}

pub fn load_config(trace_id: &str) -> Result<AppConfig, AppError> {
    load_config_from_path(&config_path(), trace_id)
}

pub fn save_config(config: &AppConfig, trace_id: &str) -> Result<(), AppError> {
    save_config_to_path(config, &config_path(), &backup_config_path(), trace_id)
}

pub fn load_config_from_path(path: &Path, trace_id: &str) -> Result<AppConfig, AppError> {
    if !path.exists() {
        return Ok(AppConfig::default());
    }
    let raw = fs::read_to_string(path)
        .map_err(|err| AppError::system(format!("Failed to read config: {err}"), trace_id))?;
    let config: AppConfig = serde_json::from_str(&raw)
        .map_err(|err| AppError::system(format!("Failed to parse config: {err}"), trace_id))?;
    Ok(validate_config(config))
}

pub fn save_config_to_path(
    config: &AppConfig,
    path: &Path,
    backup_path: &Path,
    trace_id: &str,
) -> Result<(), AppError> {
    if let Some(parent) = path.parent() {
        let _ = fs::create_dir_all(parent);
    }
    if path.exists() {
        let _ = fs::copy(path, backup_path);
    }
    let payload = serde_json::to_string_pretty(config)
        .map_err(|err| AppError::system(format!("Failed to serialize config: {err}"), trace_id))?;
    fs::write(path, payload)
        .map_err(|err| AppError::system(format!("Failed to write config: {err}"), trace_id))?;
    Ok(())
}

fn validate_config(mut config: AppConfig) -> AppConfig {
    let defaults = AppConfig::default();
    if config.command.command_timeout < 1 {
        config.command.command_timeout = defaults.command.command_timeout;
    }
    if config.command.install_timeout < config.command.command_timeout {
        config.command.install_timeout = defaults
            .command
            .install_timeout
            .max(config.command.command_timeout);
    }
    if config.provisioning.admin_component.trim().is_empty() {
        config.provisioning.admin_component = defaults.provisioning.admin_component;
    }
    if config.provisioning.launch_component.trim().is_empty() {
        config.provisioning.launch_component = defaults.provisioning.launch_component;
    }
    config
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_yields_defaults() {
        let tmp = TempDir::new().expect("tmp");
        let config =
            load_config_from_path(&tmp.path().join("absent.json"), "trace-1").expect("config");
        assert_eq!(config, AppConfig::default());
        assert!(config.adb.platform_binaries.contains_key("macos"));
        assert!(config.adb.platform_binaries.contains_key("windows"));
        assert!(!config.adb.platform_binaries.contains_key("linux"));
    }

    #[test]
    fn partial_file_fills_missing_sections() {
        let tmp = TempDir::new().expect("tmp");
        let path = tmp.path().join("config.json");
        fs::write(
            &path,
            r#"{ "adb": { "command_path": "/usr/bin/adb", "resources_dir": "", "platform_binaries": {} } }"#,
        )
        .expect("write");
        let config = load_config_from_path(&path, "trace-2").expect("config");
        assert_eq!(config.adb.command_path, "/usr/bin/adb");
        assert_eq!(config.command, CommandSettings::default());
        assert_eq!(config.provisioning.owner_kind, OwnerKind::Device);
    }

    #[test]
    fn unparseable_file_is_a_system_error() {
        let tmp = TempDir::new().expect("tmp");
        let path = tmp.path().join("config.json");
        fs::write(&path, "{ not json").expect("write");
        let err = load_config_from_path(&path, "trace-3").expect_err("err");
        assert_eq!(err.code, crate::app::error::ErrorCode::System);
        assert_eq!(err.trace_id, "trace-3");
    }

    #[test]
    fn clamps_invalid_values() {
        let mut config = AppConfig::default();
        config.command.command_timeout = 0;
        config.command.install_timeout = 5;
        config.provisioning.launch_component = "  ".to_string();
        let validated = validate_config(config);
        assert_eq!(validated.command.command_timeout, 30);
        assert_eq!(validated.command.install_timeout, 180);
        assert_eq!(validated.provisioning.launch_component, DEFAULT_LAUNCH_COMPONENT);
    }

    #[test]
    fn save_keeps_backup_of_previous_file() {
        let tmp = TempDir::new().expect("tmp");
        let path = tmp.path().join("config.json");
        let backup = tmp.path().join("config.backup.json");

        let mut config = AppConfig::default();
        save_config_to_path(&config, &path, &backup, "trace-4").expect("save");
        assert!(!backup.exists());

        config.command.command_timeout = 45;
        save_config_to_path(&config, &path, &backup, "trace-4").expect("save again");
        assert!(backup.exists());

        let reloaded = load_config_from_path(&path, "trace-4").expect("reload");
        assert_eq!(reloaded.command.command_timeout, 45);
        let previous = load_config_from_path(&backup, "trace-4").expect("backup");
        assert_eq!(previous.command.command_timeout, 30);
    }
}
