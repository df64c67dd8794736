//! Captured error events as structured by the reporting client.

use serde::{Deserialize, Serialize};

/// One entry of a stack trace. Either field may be missing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StackFrame {
    pub filename: Option<String>,
    pub function: Option<String>,
}

impl StackFrame {
    pub fn new(filename: impl Into<String>) -> Self {
        Self {
            filename: Some(filename.into()),
            function: None,
        }
    }

    pub fn with_function(mut self, function: impl Into<String>) -> Self {
        self.function = Some(function.into());
        self
    }
}

/// Exception description attached to a captured event.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExceptionInfo {
    /// Error-type tag (e.g. `"SyntaxError"`).
    #[serde(rename = "type")]
    pub error_type: Option<String>,
    /// Stack frames in unwind order: the innermost-unwound (oldest) frame
    /// is last, as the reporting client delivers them.
    #[serde(default)]
    pub frames: Vec<StackFrame>,
}

/// An error event captured by the reporting client, handed to the admission
/// filter before transmission.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CapturedEvent {
    pub exception: Option<ExceptionInfo>,
}

impl CapturedEvent {
    /// Event with an exception of the given type and frames.
    pub fn with_exception(error_type: impl Into<String>, frames: Vec<StackFrame>) -> Self {
        Self {
            exception: Some(ExceptionInfo {
                error_type: Some(error_type.into()),
                frames,
            }),
        }
    }
}

/// The original underlying error behind a captured event, probed through
/// explicit capabilities instead of reflection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OriginalError {
    /// Error carrying a machine-readable code (e.g. `"ENOSPC"`).
    Coded { code: String },
    /// Error carrying only a message.
    Message { message: String },
    /// Anything else, rendered to a string by the host.
    Opaque(String),
}

impl OriginalError {
    /// Text probe used by the admission filter: code is preferred over
    /// message, which is preferred over the raw rendering.
    pub fn probe_text(&self) -> &str {
        match self {
            OriginalError::Coded { code } => code,
            OriginalError::Message { message } => message,
            OriginalError::Opaque(raw) => raw,
        }
    }
}
