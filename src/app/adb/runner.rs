use std::io::Read;
use std::process::{Command, Stdio};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::app::error::AppError;

#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
}

/// How long output is still collected after the child exits.
const OUTPUT_GRACE: Duration = Duration::from_millis(500);

const DEVICE_UNAVAILABLE_MARKERS: [&str; 5] = [
    "no devices/emulators found",
    "device offline",
    "device unauthorized",
    "no device with transport id",
    "device not found",
];

impl CommandOutput {
    /// A command succeeded when it exited with 0 and wrote nothing to stderr.
    pub fn succeeded(&self) -> bool {
        self.exit_code == Some(0) && self.stderr.trim().is_empty()
    }

    /// Turns the output into its stdout payload or a classified failure.
    pub fn into_payload(self, trace_id: &str) -> Result<String, AppError> {
        if self.succeeded() {
            return Ok(self.stdout);
        }
        let message = if self.stderr.trim().is_empty() {
            match self.exit_code {
                Some(code) if self.stdout.trim().is_empty() => {
                    format!("adb exited with code {code}")
                }
                None if self.stdout.trim().is_empty() => "adb was terminated by a signal".to_string(),
                _ => self.stdout.trim().to_string(),
            }
        } else {
            self.stderr.trim().to_string()
        };
        let lower = message.to_lowercase();
        if DEVICE_UNAVAILABLE_MARKERS
            .iter()
            .any(|marker| lower.contains(marker))
        {
            Err(AppError::device_unavailable(message, trace_id))
        } else {
            Err(AppError::command(message, trace_id))
        }
    }
}

/// Output read so far by a drain thread.
type Captured = Arc<Mutex<Vec<u8>>>;

fn drain<R: Read + Send + 'static>(reader: R) -> (JoinHandle<()>, Captured) {
    let captured: Captured = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&captured);
    let handle = std::thread::spawn(move || {
        let mut reader = reader;
        let mut temp = [0u8; 4096];
        loop {
            match reader.read(&mut temp) {
                Ok(0) => break,
                Ok(count) => match sink.lock() {
                    Ok(mut buffer) => buffer.extend_from_slice(&temp[..count]),
                    Err(poisoned) => poisoned.into_inner().extend_from_slice(&temp[..count]),
                },
                Err(_) => break,
            }
        }
    });
    (handle, captured)
}

/// Waits for a drain thread until `deadline`, then takes whatever it read.
/// The pipe stays open past the child's exit when a grandchild inherited it.
fn collect(handle: JoinHandle<()>, captured: &Captured, deadline: Instant) -> String {
    while !handle.is_finished() && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(10));
    }
    if handle.is_finished() {
        let _ = handle.join();
    }
    let bytes = match captured.lock() {
        Ok(mut buffer) => std::mem::take(&mut *buffer),
        Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
    };
    String::from_utf8_lossy(&bytes).to_string()
}

pub fn run_command_with_timeout(
    program: &str,
    args: &[String],
    timeout: Duration,
    trace_id: &str,
) -> Result<CommandOutput, AppError> {
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|err| AppError::spawn(format!("Failed to spawn {program}: {err}"), trace_id))?;

    // Drain both pipes while waiting so a chatty child cannot block on a full
    // pipe buffer and trip the timeout.
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| AppError::system("Failed to capture stdout", trace_id))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| AppError::system("Failed to capture stderr", trace_id))?;

    let (stdout_handle, stdout_buffer) = drain(stdout);
    let (stderr_handle, stderr_buffer) = drain(stderr);

    let start = Instant::now();
    let exit_code = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status.code(),
            Ok(None) => {
                if start.elapsed() > timeout {
                    let _ = child.kill();
                    let _ = child.wait();
                    // A grandchild can still hold the pipes open; the drain
                    // threads are left to finish on their own.
                    drop(stdout_handle);
                    drop(stderr_handle);
                    return Err(AppError::timeout(
                        format!("Command timed out after {}s", timeout.as_secs_f64()),
                        trace_id,
                    ));
                }
                std::thread::sleep(Duration::from_millis(50));
            }
            Err(err) => {
                let _ = child.kill();
                drop(stdout_handle);
                drop(stderr_handle);
                return Err(AppError::system(
                    format!("Failed to poll command: {err}"),
                    trace_id,
                ));
            }
        }
    };

    let deadline = Instant::now() + OUTPUT_GRACE;
    Ok(CommandOutput {
        stdout: collect(stdout_handle, &stdout_buffer, deadline),
        stderr: collect(stderr_handle, &stderr_buffer, deadline),
        exit_code,
    })
}
