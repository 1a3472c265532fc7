use std::time::Duration;

use tracing::{info, warn};

use crate::app::adb::client::AdbExecutor;
use crate::app::adb::parse::parse_device_list;
use crate::app::error::AppError;
use crate::app::models::{DeviceRecord, ProvisioningTarget};

/// Runs `adb devices -l` and parses the result. Every call is a fresh scan.
pub fn discover_devices(
    executor: &dyn AdbExecutor,
    timeout: Duration,
    trace_id: &str,
) -> Result<Vec<DeviceRecord>, AppError> {
    let args = vec!["devices".to_string(), "-l".to_string()];
    let output = executor.execute(None, &args, timeout, trace_id)?;
    let devices = parse_device_list(&output);
    info!(trace_id = %trace_id, count = devices.len(), "discovered devices");
    Ok(devices)
}

/// Maps records to addressable targets, dropping any without a transport id.
pub fn targets_from_records(records: &[DeviceRecord], trace_id: &str) -> Vec<ProvisioningTarget> {
    records
        .iter()
        .filter_map(|record| {
            let target = ProvisioningTarget::from_record(record);
            if target.is_none() {
                warn!(
                    trace_id = %trace_id,
                    device_id = %record.device_id,
                    "device has no transport_id; skipping"
                );
            }
            target
        })
        .collect()
}
