//! Event-admission filter: the per-event predicate.
//!
//! Installed as a synchronous hook invoked by the reporting client for every
//! captured error before transmission. The filter owns no mutable state
//! besides its statistics; the configured lists are immutable and the active
//! flag is written only by the host.

use crate::config::FilterLists;
use crate::event::{CapturedEvent, OriginalError, StackFrame};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Error-code substrings denoting host resource/environment failures.
/// These are never actionable via telemetry.
pub const RESOURCE_ERROR_CODES: [&str; 8] = [
    "EROFS",  // read-only filesystem
    "ENOSPC", // no disk space available
    "ENOMEM", // no memory available
    "EIO",    // I/O error
    "ENXIO",  // I/O error
    "EMFILE", // too many open files
    "ENFILE", // file table overflow
    "EBADF",  // bad file descriptor
];

/// Filename prefix of runtime-internal frames.
pub const RUNTIME_INTERNAL_PREFIX: &str = "internal/";

/// Function/filename prefix of module-loader frames.
pub const MODULE_LOADER_PREFIX: &str = "Module.";

/// Why an event was suppressed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DropReason {
    /// The plugin was marked inactive after registration.
    Inactive,
    /// The exception type matched the error blacklist.
    BlacklistedType { error_type: String },
    /// The underlying error denotes a host resource failure.
    HostResourceError { code: String },
    /// The error originated in a runtime-internal frame.
    RuntimeInternalFrame,
    /// No frame of the trace was whitelisted.
    NoWhitelistedFrame,
}

impl DropReason {
    pub fn description(&self) -> String {
        match self {
            DropReason::Inactive => "plugin is inactive".to_string(),
            DropReason::BlacklistedType { error_type } => {
                format!("error type is blacklisted: {error_type}")
            }
            DropReason::HostResourceError { code } => {
                format!("host resource error: {code}")
            }
            DropReason::RuntimeInternalFrame => {
                "error originated in a runtime-internal frame".to_string()
            }
            DropReason::NoWhitelistedFrame => {
                "no whitelisted frame in the stack trace".to_string()
            }
        }
    }

    /// Stable key for statistics buckets.
    fn stat_key(&self) -> &'static str {
        match self {
            DropReason::Inactive => "inactive",
            DropReason::BlacklistedType { .. } => "blacklisted_type",
            DropReason::HostResourceError { .. } => "host_resource_error",
            DropReason::RuntimeInternalFrame => "runtime_internal_frame",
            DropReason::NoWhitelistedFrame => "no_whitelisted_frame",
        }
    }
}

/// Outcome of the admission predicate for one event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterVerdict {
    /// Transmit the event unchanged.
    Forward,
    /// Suppress the event.
    Drop(DropReason),
}

impl FilterVerdict {
    pub fn allows(&self) -> bool {
        matches!(self, FilterVerdict::Forward)
    }
}

/// Lifecycle flag shared between host and filter. The host is the only
/// writer; the filter only reads.
#[derive(Debug)]
pub struct ActivationState {
    active: RwLock<bool>,
}

impl ActivationState {
    /// Starts active; the host clears the flag on shutdown or disposal.
    pub fn new() -> Self {
        Self {
            active: RwLock::new(true),
        }
    }

    pub fn is_active(&self) -> bool {
        *self.active.read()
    }

    pub fn set_active(&self, active: bool) {
        *self.active.write() = active;
    }
}

impl Default for ActivationState {
    fn default() -> Self {
        Self::new()
    }
}

/// Statistics about admission verdicts.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct AdmissionStats {
    pub total: u64,
    pub forwarded: u64,
    pub dropped: u64,
    /// Drop counts bucketed by reason.
    pub by_reason: HashMap<String, u64>,
}

impl AdmissionStats {
    pub fn record(&mut self, verdict: &FilterVerdict) {
        self.total += 1;
        match verdict {
            FilterVerdict::Forward => self.forwarded += 1,
            FilterVerdict::Drop(reason) => {
                self.dropped += 1;
                *self.by_reason.entry(reason.stat_key().to_string()).or_insert(0) += 1;
            }
        }
    }

    /// Percentage of events dropped.
    pub fn drop_rate(&self) -> f32 {
        if self.total == 0 {
            0.0
        } else {
            (self.dropped as f32 / self.total as f32) * 100.0
        }
    }
}

/// The per-event admission predicate.
#[derive(Debug)]
pub struct EventAdmissionFilter {
    lists: FilterLists,
    state: Arc<ActivationState>,
    stats: RwLock<AdmissionStats>,
}

impl EventAdmissionFilter {
    pub fn new(lists: FilterLists, state: Arc<ActivationState>) -> Self {
        Self {
            lists,
            state,
            stats: RwLock::new(AdmissionStats::default()),
        }
    }

    /// Decide whether an event may be transmitted. First matching
    /// suppression wins; unrecognized shapes fail open.
    pub fn verdict(
        &self,
        event: &CapturedEvent,
        original: Option<&OriginalError>,
    ) -> FilterVerdict {
        // Never transmit while the plugin is inactive.
        if !self.state.is_active() {
            return FilterVerdict::Drop(DropReason::Inactive);
        }

        let Some(exception) = event.exception.as_ref() else {
            return FilterVerdict::Forward;
        };

        if let Some(error_type) = exception.error_type.as_deref() {
            if self.lists.error_type_blacklisted(error_type) {
                return FilterVerdict::Drop(DropReason::BlacklistedType {
                    error_type: error_type.to_string(),
                });
            }
        }

        if let Some(text) = original.map(OriginalError::probe_text) {
            if let Some(code) = RESOURCE_ERROR_CODES.iter().copied().find(|c| text.contains(c)) {
                return FilterVerdict::Drop(DropReason::HostResourceError {
                    code: code.to_string(),
                });
            }
        }

        if let Some(last) = exception.frames.last() {
            // The last frame is the innermost-unwound (oldest) one; if it is
            // runtime-internal, the error originated outside user code.
            if last.filename.as_deref().is_some_and(|f| {
                f.starts_with(RUNTIME_INTERNAL_PREFIX) || f.starts_with(MODULE_LOADER_PREFIX)
            }) {
                return FilterVerdict::Drop(DropReason::RuntimeInternalFrame);
            }

            // The whole trace is scanned; at least one frame must be relevant.
            if !exception.frames.iter().any(|f| self.frame_whitelisted(f)) {
                return FilterVerdict::Drop(DropReason::NoWhitelistedFrame);
            }
        }

        FilterVerdict::Forward
    }

    /// A frame is whitelisted iff its function is not a module-loader entry,
    /// its filename is not runtime-internal, the filename contains at least
    /// one whitelist entry, and it contains no blacklist entry. Frames
    /// without a filename are not held against the event.
    fn frame_whitelisted(&self, frame: &StackFrame) -> bool {
        if frame
            .function
            .as_deref()
            .is_some_and(|f| f.starts_with(MODULE_LOADER_PREFIX))
        {
            return false;
        }
        if let Some(filename) = frame.filename.as_deref() {
            if filename.starts_with(RUNTIME_INTERNAL_PREFIX) {
                return false;
            }
            if !self.lists.whitelist_hit(filename) {
                return false;
            }
            if self.lists.blacklist_hit(filename) {
                return false;
            }
        }
        true
    }

    /// The hook entry point: returns the event unchanged to allow
    /// transmission, or `None` to suppress it.
    pub fn admit(
        &self,
        event: CapturedEvent,
        original: Option<&OriginalError>,
    ) -> Option<CapturedEvent> {
        let verdict = self.verdict(&event, original);
        self.stats.write().record(&verdict);
        match verdict {
            FilterVerdict::Forward => Some(event),
            FilterVerdict::Drop(reason) => {
                debug!("dropping captured event: {}", reason.description());
                None
            }
        }
    }

    pub fn lists(&self) -> &FilterLists {
        &self.lists
    }

    pub fn stats(&self) -> AdmissionStats {
        self.stats.read().clone()
    }

    /// Export statistics as JSON (for debugging and host dashboards).
    pub fn export_stats(&self) -> String {
        serde_json::json!({ "admission": self.stats() }).to_string()
    }
}
