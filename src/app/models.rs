use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::app::error::ErrorCode;

/// One line of `adb devices -l` output in the `device` state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeviceRecord {
    pub device_id: String,
    pub properties: BTreeMap<String, String>,
}

impl DeviceRecord {
    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    pub fn transport_id(&self) -> Option<&str> {
        self.property("transport_id")
    }

    pub fn model(&self) -> Option<&str> {
        self.property("model")
    }

    pub fn display_name(&self) -> String {
        match self.model() {
            Some(model) => format!("{model} (ID: {})", self.device_id),
            None => format!("Unknown Device (ID: {})", self.device_id),
        }
    }
}

/// Device handle passed to `adb -t`. Only `transport_id` addresses the device;
/// the other fields are carried for display.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProvisioningTarget {
    pub transport_id: String,
    pub device_id: Option<String>,
    pub model: Option<String>,
}

impl ProvisioningTarget {
    pub fn new(transport_id: impl Into<String>) -> Self {
        Self {
            transport_id: transport_id.into(),
            device_id: None,
            model: None,
        }
    }

    pub fn from_record(record: &DeviceRecord) -> Option<Self> {
        let transport_id = record.transport_id()?.trim();
        if transport_id.is_empty() {
            return None;
        }
        Some(Self {
            transport_id: transport_id.to_string(),
            device_id: Some(record.device_id.clone()),
            model: record.model().map(str::to_string),
        })
    }

    pub fn label(&self) -> String {
        match (&self.model, &self.device_id) {
            (Some(model), _) => format!("{model} (transport {})", self.transport_id),
            (None, Some(device_id)) => format!("{device_id} (transport {})", self.transport_id),
            (None, None) => format!("transport {}", self.transport_id),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Install,
    Admin,
    Finish,
}

impl Stage {
    pub const ALL: [Stage; 3] = [Stage::Install, Stage::Admin, Stage::Finish];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Install => "install",
            Self::Admin => "admin",
            Self::Finish => "finish",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stage {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "install" => Ok(Self::Install),
            "admin" => Ok(Self::Admin),
            "finish" => Ok(Self::Finish),
            other => Err(format!(
                "unknown stage '{other}' (expected install, admin or finish)"
            )),
        }
    }
}

/// Which `dpm set-*-owner` command the admin stage issues.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OwnerKind {
    Device,
    Profile,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct OperationOutcome {
    pub operation: String,
    pub succeeded: bool,
    /// Failed, but the stage treats the failure as non-fatal.
    pub tolerated: bool,
    pub output_or_error: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct StepResult {
    pub target: ProvisioningTarget,
    pub succeeded: bool,
    pub output_or_error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<ErrorCode>,
    pub steps: Vec<OperationOutcome>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StageReport {
    pub stage: Stage,
    pub trace_id: String,
    pub started_at: String,
    /// Keyed by transport id.
    pub results: BTreeMap<String, StepResult>,
    pub succeeded: usize,
    pub total: usize,
    pub duration_seconds: f64,
}

impl StageReport {
    pub fn all_succeeded(&self) -> bool {
        self.succeeded == self.total
    }

    pub fn first_failure(&self) -> Option<&StepResult> {
        self.results.values().find(|result| !result.succeeded)
    }

    pub fn succeeded_targets(&self) -> Vec<ProvisioningTarget> {
        self.results
            .values()
            .filter(|result| result.succeeded)
            .map(|result| result.target.clone())
            .collect()
    }

    pub fn summary(&self) -> String {
        format!(
            "{} succeeded on {} of {} devices",
            self.stage, self.succeeded, self.total
        )
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PackageInfo {
    pub path: String,
    pub file_size_bytes: u64,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AdbInfo {
    pub available: bool,
    pub version_output: String,
    pub command_path: String,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CommandResponse<T> {
    pub trace_id: String,
    pub data: T,
}
