use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Severity of a progress event.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ProgressLevel {
    Info,
    Warn,
    Error,
}

/// A status update emitted by the package builder during a build.
///
/// Progress events are advisory: they are appended to the job's log trail and
/// checkpointed with the job, but never stored on their own.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProgressEvent {
    pub level: ProgressLevel,
    pub message: String,
}

impl ProgressEvent {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: ProgressLevel::Info,
            message: message.into(),
        }
    }

    pub fn warn(message: impl Into<String>) -> Self {
        Self {
            level: ProgressLevel::Warn,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: ProgressLevel::Error,
            message: message.into(),
        }
    }
}
