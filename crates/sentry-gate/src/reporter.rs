//! Seam to the external reporting client.
//!
//! The client is an opaque collaborator: this crate configures it and
//! installs the admission filter, but never inspects its transport.

use crate::filter::EventAdmissionFilter;
use std::sync::Arc;

/// Initialization parameters for the reporting client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Release identifier, `"{package}@{version}"`.
    pub release: String,
    /// Reporting endpoint/credential string.
    pub dsn: String,
    /// Whether the client should deduplicate repeated events.
    pub dedupe: bool,
}

/// The external reporting client as consumed by the plugin.
pub trait ReportingClient {
    fn initialize(&mut self, config: ClientConfig);
    fn set_tag(&mut self, key: &str, value: &str);
    fn set_user(&mut self, id: &str);
    /// Install the per-event hook invoked before transmission.
    fn install_event_filter(&mut self, filter: Arc<EventAdmissionFilter>);
}

/// In-memory client that records every call. Serves as the test double and
/// as an offline client for hosts without a transport.
#[derive(Debug, Default)]
pub struct RecordingClient {
    pub config: Option<ClientConfig>,
    pub tags: Vec<(String, String)>,
    pub user: Option<String>,
    pub filter: Option<Arc<EventAdmissionFilter>>,
}

impl RecordingClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last value recorded for a tag key.
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

impl ReportingClient for RecordingClient {
    fn initialize(&mut self, config: ClientConfig) {
        self.config = Some(config);
    }

    fn set_tag(&mut self, key: &str, value: &str) {
        self.tags.push((key.to_string(), value.to_string()));
    }

    fn set_user(&mut self, id: &str) {
        self.user = Some(id.to_string());
    }

    fn install_event_filter(&mut self, filter: Arc<EventAdmissionFilter>) {
        self.filter = Some(filter);
    }
}
