use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Instant;

use chrono::Utc;
use tracing::{info, warn};

use crate::app::adb::apk::{inspect_package, resolve_package_path};
use crate::app::adb::client::AdbExecutor;
use crate::app::adb::operations::{InstallFlags, Operation, Timeouts};
use crate::app::config::AppConfig;
use crate::app::error::ErrorCode;
use crate::app::models::{
    OperationOutcome, OwnerKind, ProvisioningTarget, Stage, StageReport, StepResult,
};
use crate::app::scheduler::TaskScheduler;

/// Everything the stages need besides the targets themselves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageParams {
    pub helper_package: PathBuf,
    pub app_package: PathBuf,
    pub admin_component: String,
    pub owner_kind: OwnerKind,
    pub launch_component: String,
    pub launch_on_finish: bool,
    pub install_flags: InstallFlags,
    pub timeouts: Timeouts,
}

impl StageParams {
    pub fn from_config(config: &AppConfig) -> Self {
        let resources = config.resources_dir();
        let provisioning = &config.provisioning;
        Self {
            helper_package: resolve_package_path(&provisioning.helper_apk, &resources),
            app_package: resolve_package_path(&provisioning.app_apk, &resources),
            admin_component: provisioning.admin_component.clone(),
            owner_kind: provisioning.owner_kind,
            launch_component: provisioning.launch_component.clone(),
            launch_on_finish: provisioning.launch_on_finish,
            install_flags: InstallFlags::from(&config.apk_install),
            timeouts: Timeouts::from(&config.command),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedStep {
    pub operation: Operation,
    /// A failure is recorded but does not end the target's chain.
    pub tolerate_failure: bool,
}

impl PlannedStep {
    fn strict(operation: Operation) -> Self {
        Self {
            operation,
            tolerate_failure: false,
        }
    }

    fn tolerant(operation: Operation) -> Self {
        Self {
            operation,
            tolerate_failure: true,
        }
    }
}

/// The ordered operations `stage` issues against every target.
pub fn plan_stage(stage: Stage, params: &StageParams) -> Vec<PlannedStep> {
    match stage {
        Stage::Install => [&params.helper_package, &params.app_package]
            .into_iter()
            .map(|path| {
                PlannedStep::strict(Operation::InstallPackage {
                    path: path.to_string_lossy().to_string(),
                    flags: params.install_flags.clone(),
                })
            })
            .collect(),
        Stage::Admin => {
            let component = params.admin_component.clone();
            let owner = match params.owner_kind {
                OwnerKind::Device => Operation::SetDeviceOwner {
                    component: component.clone(),
                },
                OwnerKind::Profile => Operation::SetProfileOwner {
                    component: component.clone(),
                },
            };
            vec![
                PlannedStep::strict(Operation::SetActiveAdmin { component }),
                PlannedStep::tolerant(owner),
            ]
        }
        Stage::Finish => {
            let mut steps = Vec::new();
            if params.launch_on_finish {
                steps.push(PlannedStep::strict(Operation::LaunchApp {
                    component: params.launch_component.clone(),
                }));
            }
            steps.push(PlannedStep::strict(Operation::DisableDebugging));
            steps
        }
    }
}

fn failed_result(target: &ProvisioningTarget, message: String, code: ErrorCode) -> StepResult {
    StepResult {
        target: target.clone(),
        succeeded: false,
        output_or_error: message,
        error_code: Some(code),
        steps: Vec::new(),
    }
}

fn run_chain(
    target: &ProvisioningTarget,
    steps: &[PlannedStep],
    executor: &dyn AdbExecutor,
    scheduler: &TaskScheduler,
    timeouts: &Timeouts,
    trace_id: &str,
) -> StepResult {
    let lock = scheduler.device_lock(&target.transport_id);
    let _guard = match lock.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };

    let mut outcomes = Vec::with_capacity(steps.len());
    let mut last_output = String::new();
    for step in steps {
        let name = step.operation.name();
        match step.operation.run(executor, target, timeouts, trace_id) {
            Ok(output) => {
                last_output = output.trim().to_string();
                outcomes.push(OperationOutcome {
                    operation: name.to_string(),
                    succeeded: true,
                    tolerated: false,
                    output_or_error: last_output.clone(),
                });
            }
            Err(err) if step.tolerate_failure => {
                warn!(
                    trace_id = %trace_id,
                    transport_id = %target.transport_id,
                    operation = name,
                    error = %err.error,
                    "tolerating failed operation"
                );
                outcomes.push(OperationOutcome {
                    operation: name.to_string(),
                    succeeded: false,
                    tolerated: true,
                    output_or_error: err.error,
                });
            }
            Err(err) => {
                outcomes.push(OperationOutcome {
                    operation: name.to_string(),
                    succeeded: false,
                    tolerated: false,
                    output_or_error: err.error.clone(),
                });
                return StepResult {
                    target: target.clone(),
                    succeeded: false,
                    output_or_error: err.error,
                    error_code: Some(err.code),
                    steps: outcomes,
                };
            }
        }
    }

    StepResult {
        target: target.clone(),
        succeeded: true,
        output_or_error: last_output,
        error_code: None,
        steps: outcomes,
    }
}

fn unique_targets(targets: &[ProvisioningTarget]) -> Vec<&ProvisioningTarget> {
    let mut seen = std::collections::HashSet::new();
    targets
        .iter()
        .filter(|target| seen.insert(target.transport_id.as_str()))
        .collect()
}

fn check_packages(params: &StageParams) -> Result<(), String> {
    let errors: Vec<String> = [&params.helper_package, &params.app_package]
        .into_iter()
        .map(|path| inspect_package(path))
        .filter_map(|info| info.error)
        .collect();
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors.join("; "))
    }
}

/// Runs `stage` against every target at once and waits for all of them.
///
/// Each target's operations run in order on their own thread. A failing
/// target only ends its own chain: every target gets a result, and callers
/// that want all-or-nothing semantics check [`StageReport::first_failure`].
pub fn run_stage(
    stage: Stage,
    targets: &[ProvisioningTarget],
    params: &StageParams,
    executor: &dyn AdbExecutor,
    scheduler: &TaskScheduler,
    trace_id: &str,
) -> StageReport {
    let start = Instant::now();
    let started_at = Utc::now().to_rfc3339();
    let targets = unique_targets(targets);
    let mut report = StageReport {
        stage,
        trace_id: trace_id.to_string(),
        started_at,
        results: BTreeMap::new(),
        succeeded: 0,
        total: targets.len(),
        duration_seconds: 0.0,
    };
    if targets.is_empty() {
        info!(trace_id = %trace_id, stage = %stage, "no targets; nothing to do");
        return report;
    }

    info!(
        trace_id = %trace_id,
        stage = %stage,
        targets = targets.len(),
        "starting stage"
    );

    let package_error = match stage {
        Stage::Install => check_packages(params).err(),
        Stage::Admin | Stage::Finish => None,
    };
    let results: Vec<StepResult> = if let Some(message) = package_error {
        warn!(trace_id = %trace_id, error = %message, "package check failed; skipping adb");
        targets
            .iter()
            .map(|target| failed_result(target, message.clone(), ErrorCode::Validation))
            .collect()
    } else {
        let steps = plan_stage(stage, params);
        let timeouts = params.timeouts;
        std::thread::scope(|scope| {
            let handles: Vec<_> = targets
                .iter()
                .map(|&target| {
                    let steps = &steps;
                    let timeouts = &timeouts;
                    let handle = scope.spawn(move || {
                        run_chain(target, steps, executor, scheduler, timeouts, trace_id)
                    });
                    (target, handle)
                })
                .collect();
            handles
                .into_iter()
                .map(|(target, handle)| {
                    handle.join().unwrap_or_else(|_| {
                        failed_result(
                            target,
                            "Provisioning thread panicked".to_string(),
                            ErrorCode::System,
                        )
                    })
                })
                .collect()
        })
    };

    for result in results {
        if result.succeeded {
            report.succeeded += 1;
        }
        report
            .results
            .insert(result.target.transport_id.clone(), result);
    }
    report.duration_seconds = start.elapsed().as_secs_f64();

    info!(
        trace_id = %trace_id,
        stage = %stage,
        succeeded = report.succeeded,
        total = report.total,
        duration_seconds = report.duration_seconds,
        "stage finished"
    );
    report
}

/// Install, then admin, then finish. Each stage only sees the targets that
/// came through the previous one; stops early once none are left.
pub fn run_provisioning(
    targets: &[ProvisioningTarget],
    params: &StageParams,
    executor: &dyn AdbExecutor,
    scheduler: &TaskScheduler,
    trace_id: &str,
) -> Vec<StageReport> {
    let mut reports = Vec::with_capacity(Stage::ALL.len());
    let mut remaining = targets.to_vec();
    for stage in Stage::ALL {
        if remaining.is_empty() {
            break;
        }
        let report = run_stage(stage, &remaining, params, executor, scheduler, trace_id);
        remaining = report.succeeded_targets();
        reports.push(report);
    }
    reports
}
