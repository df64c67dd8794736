//! Plugin configuration and filter-list normalization.
//!
//! The host supplies a [`PluginConfig`] once at startup; it is immutable for
//! the process lifetime. The admission filter never reads the raw config —
//! it consumes the normalized [`FilterLists`] produced here.

use serde::{Deserialize, Serialize};

/// Error type that is never worth transmitting, regardless of configuration.
const ALWAYS_BLACKLISTED_TYPE: &str = "SyntaxError";

/// Plugin configuration as supplied by the host from its config files.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PluginConfig {
    /// Whether error reporting is enabled at all.
    #[serde(default)]
    pub enabled: bool,
    /// Reporting endpoint/credential string. Required when enabled.
    #[serde(default)]
    pub dsn: String,
    /// Substrings a frame filename must contain to count as relevant.
    #[serde(default)]
    pub path_whitelist: Vec<String>,
    /// Substrings that exclude a frame even when whitelisted.
    #[serde(default)]
    pub path_blacklist: Vec<String>,
    /// Exception types that are dropped outright.
    #[serde(default)]
    pub error_blacklist: Vec<String>,
}

impl PluginConfig {
    /// Build the normalized lists consumed by the admission filter.
    ///
    /// `"SyntaxError"` is always present in the error blacklist, and the
    /// parent package name is appended to the path whitelist so the host
    /// application's own code is always considered relevant.
    pub fn filter_lists(&self, parent_package: Option<&str>) -> FilterLists {
        let mut path_whitelist = self.path_whitelist.clone();
        if let Some(name) = parent_package {
            if !name.is_empty() && !path_whitelist.iter().any(|p| p == name) {
                path_whitelist.push(name.to_string());
            }
        }

        let mut error_blacklist = self.error_blacklist.clone();
        if !error_blacklist.iter().any(|e| e == ALWAYS_BLACKLISTED_TYPE) {
            error_blacklist.push(ALWAYS_BLACKLISTED_TYPE.to_string());
        }

        FilterLists {
            path_whitelist,
            path_blacklist: self.path_blacklist.clone(),
            error_blacklist,
        }
    }
}

/// Normalized allow/deny lists, immutable after initialization.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilterLists {
    pub path_whitelist: Vec<String>,
    pub path_blacklist: Vec<String>,
    pub error_blacklist: Vec<String>,
}

impl FilterLists {
    /// Exact match against the error-type blacklist.
    pub fn error_type_blacklisted(&self, error_type: &str) -> bool {
        self.error_blacklist.iter().any(|e| e == error_type)
    }

    /// Whether the filename contains at least one whitelist entry.
    /// Empty entries never match.
    pub fn whitelist_hit(&self, filename: &str) -> bool {
        self.path_whitelist
            .iter()
            .any(|p| !p.is_empty() && filename.contains(p.as_str()))
    }

    /// Whether the filename contains any blacklist entry.
    pub fn blacklist_hit(&self, filename: &str) -> bool {
        self.path_blacklist
            .iter()
            .any(|p| !p.is_empty() && filename.contains(p.as_str()))
    }
}
