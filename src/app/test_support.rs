use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use tempfile::TempDir;
use zip::write::SimpleFileOptions;

use crate::app::adb::client::AdbExecutor;
use crate::app::error::AppError;
use crate::app::models::ProvisioningTarget;

type Rule = Box<dyn Fn(&str, &[String]) -> Option<AppError> + Send + Sync>;

/// Stands in for adb: records every call, answers `devices -l` with a fixed
/// listing and fails the device commands `rule` picks.
pub struct FakeAdb {
    calls: Mutex<Vec<(Option<String>, Vec<String>)>>,
    devices_output: String,
    rule: Rule,
}

impl FakeAdb {
    pub fn ok() -> Self {
        Self::failing(|_, _| None)
    }

    pub fn failing(
        rule: impl Fn(&str, &[String]) -> Option<AppError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            devices_output: "List of devices attached\n".to_string(),
            rule: Box::new(rule),
        }
    }

    pub fn with_devices(mut self, listing: &str) -> Self {
        self.devices_output = listing.to_string();
        self
    }

    pub fn calls(&self) -> Vec<(Option<String>, Vec<String>)> {
        self.calls.lock().expect("calls").clone()
    }

    pub fn calls_for(&self, transport_id: &str) -> Vec<Vec<String>> {
        self.calls()
            .into_iter()
            .filter(|(target, _)| target.as_deref() == Some(transport_id))
            .map(|(_, args)| args)
            .collect()
    }
}

impl AdbExecutor for FakeAdb {
    fn execute(
        &self,
        target: Option<&ProvisioningTarget>,
        args: &[String],
        _timeout: Duration,
        trace_id: &str,
    ) -> Result<String, AppError> {
        let transport = target.map(|t| t.transport_id.clone());
        self.calls
            .lock()
            .expect("calls")
            .push((transport.clone(), args.to_vec()));
        if transport.is_none() && args.first().map(String::as_str) == Some("devices") {
            return Ok(self.devices_output.clone());
        }
        std::thread::sleep(Duration::from_millis(5));
        match (self.rule)(transport.as_deref().unwrap_or(""), args) {
            Some(mut err) => {
                err.trace_id = trace_id.to_string();
                Err(err)
            }
            None => Ok("Success\n".to_string()),
        }
    }
}

pub fn write_apk(dir: &TempDir, name: &str) -> PathBuf {
    let path = dir.path().join(name);
    let file = std::fs::File::create(&path).expect("apk");
    let mut zip = zip::ZipWriter::new(file);
    zip.start_file("AndroidManifest.xml", SimpleFileOptions::default())
        .expect("entry");
    zip.write_all(b"<manifest/>").expect("write");
    zip.finish().expect("finish");
    path
}
