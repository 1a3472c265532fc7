use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;

use crate::app::discovery::targets_from_records;
use crate::app::models::{DeviceRecord, ProvisioningTarget, Stage, StageReport};
use crate::app::scheduler::TaskScheduler;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStep {
    Discover,
    Install,
    Admin,
    Finish,
    Done,
}

/// Provisioning progress as plain data. Callers render it, feed it discovery
/// results and stage reports, and reset it; nothing else mutates it.
#[derive(Debug, Clone, Default, Serialize)]
pub struct WorkflowState {
    pub devices: Vec<DeviceRecord>,
    pub targets: Vec<ProvisioningTarget>,
    pub completed_stages: Vec<Stage>,
    pub last_summary: Option<String>,
}

impl WorkflowState {
    /// Replaces the device list. Progress from an earlier scan is discarded.
    pub fn apply_discovery(&mut self, devices: Vec<DeviceRecord>, trace_id: &str) {
        self.targets = targets_from_records(&devices, trace_id);
        self.last_summary = Some(format!(
            "Found {} devices ({} addressable)",
            devices.len(),
            self.targets.len()
        ));
        self.devices = devices;
        self.completed_stages.clear();
    }

    /// A stage counts as completed only when every known target succeeded in
    /// it. A run over a subset of the targets does not complete the stage.
    pub fn apply_report(&mut self, report: &StageReport) {
        self.last_summary = Some(report.summary());
        let covers_targets = self.targets.iter().all(|target| {
            report
                .results
                .get(&target.transport_id)
                .is_some_and(|result| result.succeeded)
        });
        if report.total > 0
            && report.all_succeeded()
            && covers_targets
            && !self.completed_stages.contains(&report.stage)
        {
            self.completed_stages.push(report.stage);
        }
    }

    pub fn current_step(&self) -> WorkflowStep {
        if self.targets.is_empty() {
            return WorkflowStep::Discover;
        }
        let next = Stage::ALL
            .into_iter()
            .find(|stage| !self.completed_stages.contains(stage));
        match next {
            Some(Stage::Install) => WorkflowStep::Install,
            Some(Stage::Admin) => WorkflowStep::Admin,
            Some(Stage::Finish) => WorkflowStep::Finish,
            None => WorkflowStep::Done,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

pub struct AppState {
    pub scheduler: Arc<TaskScheduler>,
    pub workflow: Mutex<WorkflowState>,
}

impl AppState {
    pub fn new() -> Self {
        Self {
            scheduler: Arc::new(TaskScheduler::new()),
            workflow: Mutex::new(WorkflowState::default()),
        }
    }

    pub fn workflow(&self) -> MutexGuard<'_, WorkflowState> {
        match self.workflow.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}
