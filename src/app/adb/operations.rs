use std::time::Duration;

use crate::app::adb::client::AdbExecutor;
use crate::app::config::{ApkInstallSettings, CommandSettings};
use crate::app::error::AppError;
use crate::app::models::ProvisioningTarget;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallFlags {
    pub replace_existing: bool,
    pub grant_permissions: bool,
    pub allow_downgrade: bool,
    pub extra_args: Vec<String>,
}

impl From<&ApkInstallSettings> for InstallFlags {
    fn from(settings: &ApkInstallSettings) -> Self {
        Self {
            replace_existing: settings.replace_existing,
            grant_permissions: settings.grant_permissions,
            allow_downgrade: settings.allow_downgrade,
            extra_args: settings
                .extra_args
                .split_whitespace()
                .map(str::to_string)
                .collect(),
        }
    }
}

impl Default for InstallFlags {
    fn default() -> Self {
        Self::from(&ApkInstallSettings::default())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub command: Duration,
    pub install: Duration,
}

impl From<&CommandSettings> for Timeouts {
    fn from(settings: &CommandSettings) -> Self {
        Self {
            command: Duration::from_secs(settings.command_timeout.max(1) as u64),
            install: Duration::from_secs(settings.install_timeout.max(1) as u64),
        }
    }
}

fn shell_args(parts: &[&str]) -> Vec<String> {
    let mut args = vec!["shell".to_string()];
    args.extend(parts.iter().map(|part| part.to_string()));
    args
}

/// The remote operations a stage is built from. Each one is a single adb
/// invocation against one target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    InstallPackage { path: String, flags: InstallFlags },
    SetActiveAdmin { component: String },
    SetDeviceOwner { component: String },
    SetProfileOwner { component: String },
    LaunchApp { component: String },
    DisableDebugging,
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Self::InstallPackage { .. } => "install_package",
            Self::SetActiveAdmin { .. } => "set_active_admin",
            Self::SetDeviceOwner { .. } => "set_device_owner",
            Self::SetProfileOwner { .. } => "set_profile_owner",
            Self::LaunchApp { .. } => "launch_app",
            Self::DisableDebugging => "disable_debugging",
        }
    }

    pub fn args(&self) -> Vec<String> {
        match self {
            Self::InstallPackage { path, flags } => {
                let mut args = vec!["install".to_string()];
                if flags.replace_existing {
                    args.push("-r".to_string());
                }
                if flags.grant_permissions {
                    args.push("-g".to_string());
                }
                if flags.allow_downgrade {
                    args.push("-d".to_string());
                }
                args.extend(flags.extra_args.iter().cloned());
                args.push(path.clone());
                args
            }
            Self::SetActiveAdmin { component } => shell_args(&[
                "dpm",
                "set-active-admin",
                "--user",
                "current",
                component.as_str(),
            ]),
            Self::SetDeviceOwner { component } => shell_args(&[
                "dpm",
                "set-device-owner",
                "--user",
                "current",
                component.as_str(),
            ]),
            Self::SetProfileOwner { component } => shell_args(&[
                "dpm",
                "set-profile-owner",
                "--user",
                "current",
                component.as_str(),
            ]),
            Self::LaunchApp { component } => shell_args(&["am", "start", "-S", "-n", component.as_str()]),
            Self::DisableDebugging => shell_args(&["settings", "put", "global", "adb_enabled", "0"]),
        }
    }

    pub fn timeout(&self, timeouts: &Timeouts) -> Duration {
        match self {
            Self::InstallPackage { .. } => timeouts.install,
            _ => timeouts.command,
        }
    }

    pub fn run(
        &self,
        executor: &dyn AdbExecutor,
        target: &ProvisioningTarget,
        timeouts: &Timeouts,
        trace_id: &str,
    ) -> Result<String, AppError> {
        executor.execute(Some(target), &self.args(), self.timeout(timeouts), trace_id)
    }
}
