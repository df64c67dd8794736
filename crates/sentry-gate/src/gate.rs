//! Enablement gate: the startup decision procedure.
//!
//! A fixed, ordered sequence of opt-out checks decides whether telemetry is
//! activated for this process run. The first failing check wins and nothing
//! is re-evaluated. Checks against configuration and environment run before
//! any metadata fetch; each fetch is awaited in sequence and a failed fetch
//! counts as "object absent".

use crate::metadata::{fetch_tolerant, MetaObject, ObjectLookup};
use crate::{PluginConfig, PluginError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::info;

/// Environment variables recognized as continuous-integration signals.
pub const CI_ENV_VARS: [&str; 3] = ["TRAVIS", "APPVEYOR", "CI"];

/// Suffix stripped off the plugin namespace to derive the owning host object.
const PLUGIN_NAMESPACE_SUFFIX: &str = ".plugins.sentry";

const SYSTEM_CONFIG_OBJECT: &str = "system.config";
const SYSTEM_UUID_OBJECT: &str = "system.meta.uuid";

/// Diagnostics setting that disables statistics system-wide.
const DIAG_NONE: &str = "none";

/// What the plugin instance represents within the host.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PluginScope {
    /// A managed adapter component.
    #[default]
    Adapter,
    /// The top-level controller.
    Controller,
}

/// Snapshot of the process environment taken at gate construction.
#[derive(Debug, Clone, Default)]
pub struct EnvSnapshot {
    vars: HashMap<String, String>,
}

impl EnvSnapshot {
    /// Capture the live process environment.
    pub fn from_process() -> Self {
        Self {
            vars: std::env::vars().collect(),
        }
    }

    /// Empty snapshot, for deterministic tests and embedded hosts.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_var(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(name.into(), value.into());
        self
    }

    /// Whether any recognized CI indicator variable is set truthy.
    pub fn ci_detected(&self) -> bool {
        CI_ENV_VARS
            .iter()
            .any(|name| self.vars.get(*name).map(|v| is_truthy(v)).unwrap_or(false))
    }
}

/// Boolean-ish convention: set, non-empty, and not an explicit "off".
fn is_truthy(value: &str) -> bool {
    !value.is_empty() && value != "false" && value != "0"
}

/// Name and version of the parent package the plugin runs inside.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PackageInfo {
    pub name: String,
    pub version: String,
}

impl PackageInfo {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }
}

/// Host-provided settings used for identity tagging during registration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HostSettings {
    pub controller_version: Option<String>,
    pub runtime_version: Option<String>,
    pub objects_db_type: Option<String>,
    pub states_db_type: Option<String>,
}

/// Everything the gate needs besides the configuration and the lookup.
#[derive(Debug, Clone, Default)]
pub struct GateContext {
    pub scope: PluginScope,
    pub parent_package: PackageInfo,
    /// Resolved metadata of the parent package, if the host has it.
    pub parent_meta: Option<MetaObject>,
    /// Explicit namespace of the owning object, when the host provides one.
    pub parent_namespace: Option<String>,
    /// The plugin's own namespace (e.g. `system.host.pi.plugins.sentry`).
    pub plugin_namespace: String,
    pub settings: HostSettings,
    pub env: EnvSnapshot,
}

impl GateContext {
    /// Derive the owning object's name for the controller scope: prefer the
    /// explicit parent namespace, otherwise strip the plugin suffix off the
    /// plugin's own namespace.
    pub fn host_object_name(&self) -> Option<String> {
        if let Some(ns) = &self.parent_namespace {
            return Some(ns.clone());
        }
        self.plugin_namespace
            .find(PLUGIN_NAMESPACE_SUFFIX)
            .map(|pos| self.plugin_namespace[..pos].to_string())
    }

    fn parent_host(&self) -> Option<&str> {
        self.parent_meta
            .as_ref()
            .and_then(|m| m.common.as_ref())
            .and_then(|c| c.host.as_deref())
    }
}

/// A deliberate feature suppression: no user action required, semantically
/// different from a configuration error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SuppressReason {
    /// A CI system was detected; telemetry from automated runs is noise.
    CiEnvironment,
    /// The parent package opted out of data reporting.
    DisabledOnInstance,
    /// The owning host opted out of data reporting.
    DisabledOnHost,
    /// Statistics are disabled system-wide.
    StatisticsDisabled,
}

impl SuppressReason {
    pub fn description(&self) -> &'static str {
        match self {
            SuppressReason::CiEnvironment => "CI system detected",
            SuppressReason::DisabledOnInstance => "data reporting is disabled on this instance",
            SuppressReason::DisabledOnHost => "data reporting is disabled on the host",
            SuppressReason::StatisticsDisabled => {
                "sending of statistic data is disabled for the system"
            }
        }
    }
}

/// Successful activation outcome.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Activation {
    /// System UUID to use as reporting user identity, when the host has one.
    pub uuid: Option<String>,
}

/// Outcome of gate evaluation when the configuration itself was valid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GateDecision {
    Activated(Activation),
    Suppressed(SuppressReason),
}

impl GateDecision {
    pub fn is_activated(&self) -> bool {
        matches!(self, GateDecision::Activated(_))
    }
}

/// Gate decision together with when it was made; the gate's own telemetry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub decision: GateDecision,
    pub at: DateTime<Utc>,
}

impl DecisionRecord {
    pub fn new(decision: GateDecision) -> Self {
        Self {
            decision,
            at: Utc::now(),
        }
    }
}

/// The startup decision procedure.
pub struct EnablementGate;

impl EnablementGate {
    /// Evaluate the ordered opt-out chain.
    ///
    /// Configuration problems (disabled by user, missing dsn) are hard
    /// errors; deliberate suppressions come back as
    /// [`GateDecision::Suppressed`] so the host can tell them apart.
    pub async fn evaluate<L: ObjectLookup>(
        config: &PluginConfig,
        ctx: &GateContext,
        lookup: &L,
    ) -> Result<GateDecision> {
        if !config.enabled {
            info!("error reporting disabled by user");
            return Err(PluginError::DisabledByUser);
        }

        if config.dsn.trim().is_empty() {
            return Err(PluginError::MissingDsn);
        }

        if ctx.env.ci_detected() {
            return Self::suppress(SuppressReason::CiEnvironment);
        }

        if ctx
            .parent_meta
            .as_ref()
            .is_some_and(|m| m.reporting_disabled())
        {
            return Self::suppress(SuppressReason::DisabledOnInstance);
        }

        match ctx.scope {
            PluginScope::Adapter => {
                if let Some(host) = ctx.parent_host() {
                    let name = format!("system.host.{host}");
                    if Self::host_opted_out(lookup, &name).await {
                        return Self::suppress(SuppressReason::DisabledOnHost);
                    }
                }
            }
            PluginScope::Controller => {
                if let Some(name) = ctx.host_object_name() {
                    if Self::host_opted_out(lookup, &name).await {
                        return Self::suppress(SuppressReason::DisabledOnHost);
                    }
                }
            }
        }

        let system_config = fetch_tolerant(lookup, SYSTEM_CONFIG_OBJECT).await;
        let diag_allows = system_config
            .as_ref()
            .and_then(|o| o.common.as_ref())
            .map(|c| c.diag.as_deref() != Some(DIAG_NONE))
            .unwrap_or(false);
        if !diag_allows {
            return Self::suppress(SuppressReason::StatisticsDisabled);
        }

        // Absent UUID is not fatal: proceed without a user identity.
        let uuid = fetch_tolerant(lookup, SYSTEM_UUID_OBJECT)
            .await
            .and_then(|o| o.uuid().map(str::to_owned));

        Ok(GateDecision::Activated(Activation { uuid }))
    }

    async fn host_opted_out<L: ObjectLookup>(lookup: &L, name: &str) -> bool {
        fetch_tolerant(lookup, name)
            .await
            .is_some_and(|o| o.reporting_disabled())
    }

    fn suppress(reason: SuppressReason) -> Result<GateDecision> {
        info!("error reporting disabled for this process: {}", reason.description());
        Ok(GateDecision::Suppressed(reason))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{FailingLookup, MemoryLookup, MetaCommon, MetaNative};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Lookup wrapper that counts every fetch, to assert fetch ordering.
    struct CountingLookup {
        inner: MemoryLookup,
        fetches: AtomicUsize,
    }

    impl CountingLookup {
        fn new(inner: MemoryLookup) -> Self {
            Self {
                inner,
                fetches: AtomicUsize::new(0),
            }
        }

        fn count(&self) -> usize {
            self.fetches.load(Ordering::SeqCst)
        }
    }

    impl ObjectLookup for CountingLookup {
        async fn fetch_object(&self, name: &str) -> Result<Option<MetaObject>> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            self.inner.fetch_object(name).await
        }
    }

    fn enabled_config() -> PluginConfig {
        PluginConfig {
            enabled: true,
            dsn: "https://key@errors.example.com/7".to_string(),
            ..Default::default()
        }
    }

    fn system_config(diag: Option<&str>) -> MetaObject {
        MetaObject {
            common: Some(MetaCommon {
                diag: diag.map(str::to_owned),
                ..Default::default()
            }),
            native: None,
        }
    }

    fn uuid_object(uuid: &str) -> MetaObject {
        MetaObject {
            common: None,
            native: Some(MetaNative {
                uuid: Some(uuid.to_string()),
            }),
        }
    }

    fn opted_out_object() -> MetaObject {
        MetaObject {
            common: Some(MetaCommon {
                disable_data_reporting: true,
                ..Default::default()
            }),
            native: None,
        }
    }

    fn accepting_lookup() -> MemoryLookup {
        MemoryLookup::new()
            .with_object("system.config", system_config(Some("all")))
            .with_object("system.meta.uuid", uuid_object("abc-123"))
    }

    fn base_ctx() -> GateContext {
        GateContext {
            parent_package: PackageInfo::new("my-adapter", "1.2.3"),
            env: EnvSnapshot::empty(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn disabled_by_user_rejects_before_anything_else() {
        let config = PluginConfig {
            enabled: false,
            ..enabled_config()
        };
        let lookup = CountingLookup::new(accepting_lookup());
        // Even with CI set, "disabled by user" wins.
        let mut ctx = base_ctx();
        ctx.env = EnvSnapshot::empty().with_var("CI", "true");

        let err = EnablementGate::evaluate(&config, &ctx, &lookup)
            .await
            .unwrap_err();
        assert!(matches!(err, PluginError::DisabledByUser));
        assert_eq!(lookup.count(), 0);
    }

    #[tokio::test]
    async fn missing_dsn_rejects_before_any_fetch() {
        let config = PluginConfig {
            enabled: true,
            dsn: "  ".to_string(),
            ..Default::default()
        };
        let lookup = CountingLookup::new(accepting_lookup());

        let err = EnablementGate::evaluate(&config, &base_ctx(), &lookup)
            .await
            .unwrap_err();
        assert!(matches!(err, PluginError::MissingDsn));
        assert_eq!(lookup.count(), 0);
    }

    #[tokio::test]
    async fn ci_indicator_suppresses_before_any_fetch() {
        let lookup = CountingLookup::new(accepting_lookup());
        for var in CI_ENV_VARS {
            let mut ctx = base_ctx();
            ctx.env = EnvSnapshot::empty().with_var(var, "true");

            let decision = EnablementGate::evaluate(&enabled_config(), &ctx, &lookup)
                .await
                .unwrap();
            assert_eq!(
                decision,
                GateDecision::Suppressed(SuppressReason::CiEnvironment)
            );
        }
        assert_eq!(lookup.count(), 0);
    }

    #[tokio::test]
    async fn explicit_off_values_do_not_count_as_ci() {
        let mut ctx = base_ctx();
        ctx.env = EnvSnapshot::empty().with_var("CI", "false");

        let decision = EnablementGate::evaluate(&enabled_config(), &ctx, &accepting_lookup())
            .await
            .unwrap();
        assert!(decision.is_activated());
    }

    #[tokio::test]
    async fn instance_opt_out_suppresses() {
        let mut ctx = base_ctx();
        ctx.parent_meta = Some(opted_out_object());

        let decision = EnablementGate::evaluate(&enabled_config(), &ctx, &accepting_lookup())
            .await
            .unwrap();
        assert_eq!(
            decision,
            GateDecision::Suppressed(SuppressReason::DisabledOnInstance)
        );
    }

    #[tokio::test]
    async fn adapter_checks_named_host_object() {
        let lookup = accepting_lookup().with_object("system.host.pi", opted_out_object());
        let mut ctx = base_ctx();
        ctx.scope = PluginScope::Adapter;
        ctx.parent_meta = Some(MetaObject {
            common: Some(MetaCommon {
                host: Some("pi".to_string()),
                ..Default::default()
            }),
            native: None,
        });

        let decision = EnablementGate::evaluate(&enabled_config(), &ctx, &lookup)
            .await
            .unwrap();
        assert_eq!(
            decision,
            GateDecision::Suppressed(SuppressReason::DisabledOnHost)
        );
    }

    #[tokio::test]
    async fn adapter_tolerates_missing_host_object() {
        let mut ctx = base_ctx();
        ctx.scope = PluginScope::Adapter;
        ctx.parent_meta = Some(MetaObject {
            common: Some(MetaCommon {
                host: Some("gone".to_string()),
                ..Default::default()
            }),
            native: None,
        });

        // Host object missing entirely: flag treated as absent.
        let decision = EnablementGate::evaluate(&enabled_config(), &ctx, &accepting_lookup())
            .await
            .unwrap();
        assert!(decision.is_activated());
    }

    #[tokio::test]
    async fn controller_derives_host_from_plugin_namespace() {
        let lookup = accepting_lookup().with_object("system.host.pi", opted_out_object());
        let mut ctx = base_ctx();
        ctx.scope = PluginScope::Controller;
        ctx.plugin_namespace = "system.host.pi.plugins.sentry".to_string();

        let decision = EnablementGate::evaluate(&enabled_config(), &ctx, &lookup)
            .await
            .unwrap();
        assert_eq!(
            decision,
            GateDecision::Suppressed(SuppressReason::DisabledOnHost)
        );
    }

    #[tokio::test]
    async fn controller_prefers_explicit_parent_namespace() {
        let lookup = accepting_lookup()
            .with_object("system.host.explicit", opted_out_object())
            .with_object("system.host.derived", MetaObject::default());
        let mut ctx = base_ctx();
        ctx.scope = PluginScope::Controller;
        ctx.parent_namespace = Some("system.host.explicit".to_string());
        ctx.plugin_namespace = "system.host.derived.plugins.sentry".to_string();

        let decision = EnablementGate::evaluate(&enabled_config(), &ctx, &lookup)
            .await
            .unwrap();
        assert_eq!(
            decision,
            GateDecision::Suppressed(SuppressReason::DisabledOnHost)
        );
    }

    #[tokio::test]
    async fn missing_system_config_suppresses_statistics() {
        let lookup = MemoryLookup::new().with_object("system.meta.uuid", uuid_object("abc"));

        let decision = EnablementGate::evaluate(&enabled_config(), &base_ctx(), &lookup)
            .await
            .unwrap();
        assert_eq!(
            decision,
            GateDecision::Suppressed(SuppressReason::StatisticsDisabled)
        );
    }

    #[tokio::test]
    async fn diag_none_suppresses_statistics() {
        let lookup = MemoryLookup::new().with_object("system.config", system_config(Some("none")));

        let decision = EnablementGate::evaluate(&enabled_config(), &base_ctx(), &lookup)
            .await
            .unwrap();
        assert_eq!(
            decision,
            GateDecision::Suppressed(SuppressReason::StatisticsDisabled)
        );
    }

    #[tokio::test]
    async fn unset_diag_with_common_section_passes() {
        let lookup = MemoryLookup::new().with_object("system.config", system_config(None));

        let decision = EnablementGate::evaluate(&enabled_config(), &base_ctx(), &lookup)
            .await
            .unwrap();
        assert!(decision.is_activated());
    }

    #[tokio::test]
    async fn failing_lookup_still_reaches_a_decision() {
        let decision = EnablementGate::evaluate(&enabled_config(), &base_ctx(), &FailingLookup)
            .await
            .unwrap();
        // system.config unreachable counts as absent, so statistics are off.
        assert_eq!(
            decision,
            GateDecision::Suppressed(SuppressReason::StatisticsDisabled)
        );
    }

    #[tokio::test]
    async fn activation_carries_uuid_when_present() {
        let decision = EnablementGate::evaluate(&enabled_config(), &base_ctx(), &accepting_lookup())
            .await
            .unwrap();
        assert_eq!(
            decision,
            GateDecision::Activated(Activation {
                uuid: Some("abc-123".to_string())
            })
        );
    }

    #[tokio::test]
    async fn missing_uuid_is_not_fatal() {
        let lookup = MemoryLookup::new().with_object("system.config", system_config(Some("all")));

        let decision = EnablementGate::evaluate(&enabled_config(), &base_ctx(), &lookup)
            .await
            .unwrap();
        assert_eq!(decision, GateDecision::Activated(Activation { uuid: None }));
    }
}
