use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorCode {
    #[serde(rename = "ERR_VALIDATION")]
    Validation,
    #[serde(rename = "ERR_UNSUPPORTED_PLATFORM")]
    UnsupportedPlatform,
    #[serde(rename = "ERR_SPAWN")]
    Spawn,
    #[serde(rename = "ERR_COMMAND")]
    CommandFailed,
    #[serde(rename = "ERR_DEVICE_UNAVAILABLE")]
    DeviceUnavailable,
    #[serde(rename = "ERR_TIMEOUT")]
    Timeout,
    #[serde(rename = "ERR_SYSTEM")]
    System,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Validation => "ERR_VALIDATION",
            Self::UnsupportedPlatform => "ERR_UNSUPPORTED_PLATFORM",
            Self::Spawn => "ERR_SPAWN",
            Self::CommandFailed => "ERR_COMMAND",
            Self::DeviceUnavailable => "ERR_DEVICE_UNAVAILABLE",
            Self::Timeout => "ERR_TIMEOUT",
            Self::System => "ERR_SYSTEM",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AppError {
    pub error: String,
    pub code: ErrorCode,
    pub trace_id: String,
}

impl AppError {
    pub fn new(code: ErrorCode, message: impl Into<String>, trace_id: impl Into<String>) -> Self {
        Self {
            error: message.into(),
            code,
            trace_id: trace_id.into(),
        }
    }

    pub fn validation(message: impl Into<String>, trace_id: impl Into<String>) -> Self {
        Self::new(ErrorCode::Validation, message, trace_id)
    }

    pub fn unsupported_platform(os: &str, trace_id: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::UnsupportedPlatform,
            format!("Unsupported platform: {os}"),
            trace_id,
        )
    }

    pub fn spawn(message: impl Into<String>, trace_id: impl Into<String>) -> Self {
        Self::new(ErrorCode::Spawn, message, trace_id)
    }

    pub fn command(message: impl Into<String>, trace_id: impl Into<String>) -> Self {
        Self::new(ErrorCode::CommandFailed, message, trace_id)
    }

    pub fn device_unavailable(message: impl Into<String>, trace_id: impl Into<String>) -> Self {
        Self::new(ErrorCode::DeviceUnavailable, message, trace_id)
    }

    pub fn timeout(message: impl Into<String>, trace_id: impl Into<String>) -> Self {
        Self::new(ErrorCode::Timeout, message, trace_id)
    }

    pub fn system(message: impl Into<String>, trace_id: impl Into<String>) -> Self {
        Self::new(ErrorCode::System, message, trace_id)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.error, self.code)
    }
}

impl std::error::Error for AppError {}
