use std::time::Duration;

use tracing::{info, warn};
use uuid::Uuid;

use crate::app::adb::client::{AdbClient, AdbExecutor};
use crate::app::adb::locator::{resolve_adb_program, validate_adb_program};
use crate::app::adb::runner::run_command_with_timeout;
use crate::app::config::{config_path, load_config, save_config, AppConfig};
use crate::app::discovery::discover_devices;
use crate::app::error::AppError;
use crate::app::models::{
    AdbInfo, CommandResponse, DeviceRecord, ProvisioningTarget, Stage, StageReport,
};
use crate::app::state::AppState;
use crate::app::workflow::{run_provisioning, run_stage, StageParams};

pub fn resolve_trace_id(input: Option<String>) -> String {
    input
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

fn ensure_non_empty(value: &str, field: &str, trace_id: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::validation(format!("{field} is required"), trace_id));
    }
    Ok(())
}

fn command_timeout(config: &AppConfig) -> Duration {
    Duration::from_secs(config.command.command_timeout.max(1) as u64)
}

/// Resolves the adb executable for this host. Fails before any command runs
/// when the platform has no configured binary. A path that does not exist is
/// left to surface as a spawn failure on each command.
fn get_adb_program(config: &AppConfig, trace_id: &str) -> Result<String, AppError> {
    resolve_adb_program(
        &config.adb,
        std::env::consts::OS,
        &config.resources_dir(),
        trace_id,
    )
}

fn build_client(config: &AppConfig, trace_id: &str) -> Result<AdbClient, AppError> {
    get_adb_program(config, trace_id).map(AdbClient::new)
}

pub fn get_config(trace_id: Option<String>) -> Result<CommandResponse<AppConfig>, AppError> {
    let trace_id = resolve_trace_id(trace_id);
    let config = load_config(&trace_id)?;
    Ok(CommandResponse {
        trace_id,
        data: config,
    })
}

pub fn get_config_path(trace_id: Option<String>) -> CommandResponse<String> {
    CommandResponse {
        trace_id: resolve_trace_id(trace_id),
        data: config_path().to_string_lossy().to_string(),
    }
}

pub fn reset_config(trace_id: Option<String>) -> Result<CommandResponse<AppConfig>, AppError> {
    let trace_id = resolve_trace_id(trace_id);
    let config = AppConfig::default();
    save_config(&config, &trace_id)?;
    info!(trace_id = %trace_id, path = %config_path().display(), "config reset");
    Ok(CommandResponse {
        trace_id,
        data: config,
    })
}

pub fn check_adb(trace_id: Option<String>) -> Result<CommandResponse<AdbInfo>, AppError> {
    let trace_id = resolve_trace_id(trace_id);
    info!(trace_id = %trace_id, "check_adb");

    let config = load_config(&trace_id)?;
    let program = get_adb_program(&config, &trace_id)?;
    let data = check_adb_inner(program, &trace_id);
    Ok(CommandResponse { trace_id, data })
}

/// Runs `adb version` and reports whether the executable is usable.
pub(crate) fn check_adb_inner(program: String, trace_id: &str) -> AdbInfo {
    if let Err(message) = validate_adb_program(&program) {
        warn!(trace_id = %trace_id, error = %message, "adb validation failed");
        return AdbInfo {
            available: false,
            version_output: String::new(),
            command_path: program,
            error: Some(message),
        };
    }

    let args = vec!["version".to_string()];
    match run_command_with_timeout(&program, &args, Duration::from_secs(5), trace_id)
        .and_then(|output| output.into_payload(trace_id))
    {
        Ok(stdout) => AdbInfo {
            available: true,
            version_output: stdout.trim().to_string(),
            command_path: program,
            error: None,
        },
        Err(err) => {
            warn!(trace_id = %trace_id, code = %err.code, error = %err.error, "adb check failed");
            AdbInfo {
                available: false,
                version_output: String::new(),
                command_path: program,
                error: Some(err.error),
            }
        }
    }
}

pub fn list_devices(
    state: &AppState,
    trace_id: Option<String>,
) -> Result<CommandResponse<Vec<DeviceRecord>>, AppError> {
    let trace_id = resolve_trace_id(trace_id);
    let config = load_config(&trace_id)?;
    let client = build_client(&config, &trace_id)?;
    let devices = list_devices_inner(&client, &config, state, &trace_id)?;
    Ok(CommandResponse {
        trace_id,
        data: devices,
    })
}

pub fn run_stage_command(
    stage: Stage,
    target_ids: Vec<String>,
    state: &AppState,
    trace_id: Option<String>,
) -> Result<CommandResponse<StageReport>, AppError> {
    let trace_id = resolve_trace_id(trace_id);
    let config = load_config(&trace_id)?;
    let client = build_client(&config, &trace_id)?;
    let report = run_stage_inner(stage, target_ids, &client, &config, state, &trace_id)?;
    Ok(CommandResponse {
        trace_id,
        data: report,
    })
}

pub fn provision_devices(
    state: &AppState,
    trace_id: Option<String>,
) -> Result<CommandResponse<Vec<StageReport>>, AppError> {
    let trace_id = resolve_trace_id(trace_id);
    let config = load_config(&trace_id)?;
    let client = build_client(&config, &trace_id)?;
    let reports = provision_inner(&client, &config, state, &trace_id)?;
    Ok(CommandResponse {
        trace_id,
        data: reports,
    })
}

pub(crate) fn list_devices_inner(
    executor: &dyn AdbExecutor,
    config: &AppConfig,
    state: &AppState,
    trace_id: &str,
) -> Result<Vec<DeviceRecord>, AppError> {
    let devices = discover_devices(executor, command_timeout(config), trace_id)?;
    let mut workflow = state.workflow();
    workflow.apply_discovery(devices.clone(), trace_id);
    state.scheduler.retain_devices(
        workflow
            .targets
            .iter()
            .map(|target| target.transport_id.as_str()),
    );
    Ok(devices)
}

/// Explicit ids are used as given (enriched from the last scan when known).
/// Without ids the stage runs against the current targets, scanning first
/// when there are none.
fn resolve_targets(
    target_ids: Vec<String>,
    executor: &dyn AdbExecutor,
    config: &AppConfig,
    state: &AppState,
    trace_id: &str,
) -> Result<Vec<ProvisioningTarget>, AppError> {
    if !target_ids.is_empty() {
        let known = state.workflow().targets.clone();
        return target_ids
            .into_iter()
            .map(|id| {
                ensure_non_empty(&id, "target", trace_id)?;
                let id = id.trim().to_string();
                Ok(known
                    .iter()
                    .find(|target| target.transport_id == id)
                    .cloned()
                    .unwrap_or_else(|| ProvisioningTarget::new(id)))
            })
            .collect();
    }

    let current = state.workflow().targets.clone();
    if !current.is_empty() {
        return Ok(current);
    }
    list_devices_inner(executor, config, state, trace_id)?;
    let discovered = state.workflow().targets.clone();
    Ok(discovered)
}

pub(crate) fn run_stage_inner(
    stage: Stage,
    target_ids: Vec<String>,
    executor: &dyn AdbExecutor,
    config: &AppConfig,
    state: &AppState,
    trace_id: &str,
) -> Result<StageReport, AppError> {
    let targets = resolve_targets(target_ids, executor, config, state, trace_id)?;
    let params = StageParams::from_config(config);
    let report = run_stage(stage, &targets, &params, executor, &state.scheduler, trace_id);
    state.workflow().apply_report(&report);
    Ok(report)
}

pub(crate) fn provision_inner(
    executor: &dyn AdbExecutor,
    config: &AppConfig,
    state: &AppState,
    trace_id: &str,
) -> Result<Vec<StageReport>, AppError> {
    list_devices_inner(executor, config, state, trace_id)?;
    let targets = state.workflow().targets.clone();
    let params = StageParams::from_config(config);
    let reports = run_provisioning(&targets, &params, executor, &state.scheduler, trace_id);
    let mut workflow = state.workflow();
    for report in &reports {
        workflow.apply_report(report);
    }
    Ok(reports)
}

#[cfg(test)]
mod tests;
