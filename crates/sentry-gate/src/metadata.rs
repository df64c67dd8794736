//! Host metadata objects and the asynchronous lookup seam.
//!
//! The host exposes opaque key/value objects fetched by name
//! (`system.config`, `system.meta.uuid`, host identity objects). A fetch may
//! fail or return nothing; absence is a valid outcome, not an error.

use crate::{PluginError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// The `common` section of a host metadata object.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetaCommon {
    /// Explicit opt-out from data reporting.
    #[serde(default)]
    pub disable_data_reporting: bool,
    /// Name of the host this instance runs on.
    pub host: Option<String>,
    /// System-wide diagnostics setting (`"none"` disables statistics).
    pub diag: Option<String>,
    pub version: Option<String>,
    pub installed_version: Option<String>,
    pub installed_from: Option<String>,
}

/// The `native` section of a host metadata object.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetaNative {
    pub uuid: Option<String>,
}

/// An opaque host metadata object. Any section may be absent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetaObject {
    pub common: Option<MetaCommon>,
    pub native: Option<MetaNative>,
}

impl MetaObject {
    /// Whether this object carries the "disable data reporting" flag.
    pub fn reporting_disabled(&self) -> bool {
        self.common
            .as_ref()
            .map(|c| c.disable_data_reporting)
            .unwrap_or(false)
    }

    /// UUID string carried in the native section, if any.
    pub fn uuid(&self) -> Option<&str> {
        self.native.as_ref().and_then(|n| n.uuid.as_deref())
    }
}

/// Asynchronous object-lookup capability consumed from the host.
pub trait ObjectLookup {
    /// Fetch an object by name. `Ok(None)` means the object does not exist.
    fn fetch_object(
        &self,
        name: &str,
    ) -> impl std::future::Future<Output = Result<Option<MetaObject>>> + Send;
}

/// Fetch an object, treating lookup failure as "object absent".
///
/// Gate evaluation never escalates a lookup failure; the failed fetch is
/// logged at debug level and the check proceeds as if nothing was found.
pub async fn fetch_tolerant<L: ObjectLookup>(lookup: &L, name: &str) -> Option<MetaObject> {
    match lookup.fetch_object(name).await {
        Ok(obj) => obj,
        Err(err) => {
            debug!("lookup of {name} failed, treating as absent: {err}");
            None
        }
    }
}

/// In-memory, map-backed object lookup.
#[derive(Debug, Clone, Default)]
pub struct MemoryLookup {
    objects: HashMap<String, MetaObject>,
}

impl MemoryLookup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, object: MetaObject) {
        self.objects.insert(name.into(), object);
    }

    /// Builder-style insert.
    pub fn with_object(mut self, name: impl Into<String>, object: MetaObject) -> Self {
        self.insert(name, object);
        self
    }
}

impl ObjectLookup for MemoryLookup {
    async fn fetch_object(&self, name: &str) -> Result<Option<MetaObject>> {
        Ok(self.objects.get(name).cloned())
    }
}

/// Lookup that fails every fetch. Useful for exercising the
/// failure-tolerant paths of the gate.
#[derive(Debug, Clone, Copy, Default)]
pub struct FailingLookup;

impl ObjectLookup for FailingLookup {
    async fn fetch_object(&self, name: &str) -> Result<Option<MetaObject>> {
        Err(PluginError::Lookup(format!("no connection to object store ({name})")))
    }
}
