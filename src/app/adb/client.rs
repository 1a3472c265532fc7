use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::app::adb::runner::run_command_with_timeout;
use crate::app::error::AppError;
use crate::app::models::ProvisioningTarget;

/// Issues one adb command and returns its stdout payload.
///
/// The workflow only talks to devices through this trait, so stages can run
/// against a fake in tests.
pub trait AdbExecutor: Sync {
    fn execute(
        &self,
        target: Option<&ProvisioningTarget>,
        args: &[String],
        timeout: Duration,
        trace_id: &str,
    ) -> Result<String, AppError>;
}

#[derive(Debug, Clone)]
pub struct AdbClient {
    program: String,
}

impl AdbClient {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

/// `[-t <transport>] <args...>`
pub fn command_args(target: Option<&ProvisioningTarget>, args: &[String]) -> Vec<String> {
    let mut full = Vec::with_capacity(args.len() + 2);
    if let Some(target) = target {
        full.push("-t".to_string());
        full.push(target.transport_id.clone());
    }
    full.extend(args.iter().cloned());
    full
}

impl AdbExecutor for AdbClient {
    fn execute(
        &self,
        target: Option<&ProvisioningTarget>,
        args: &[String],
        timeout: Duration,
        trace_id: &str,
    ) -> Result<String, AppError> {
        let full_args = command_args(target, args);
        info!(
            trace_id = %trace_id,
            program = %self.program,
            args = ?full_args,
            "executing adb"
        );
        let start = Instant::now();
        let result = run_command_with_timeout(&self.program, &full_args, timeout, trace_id)
            .and_then(|output| output.into_payload(trace_id));
        match &result {
            Ok(stdout) => debug!(
                trace_id = %trace_id,
                duration_ms = start.elapsed().as_millis() as u64,
                stdout = %stdout.trim(),
                "adb command finished"
            ),
            Err(err) => warn!(
                trace_id = %trace_id,
                code = %err.code,
                error = %err.error,
                "adb command failed"
            ),
        }
        result
    }
}
