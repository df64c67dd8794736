//! Plugin facade combining gate, registration and admission filter.

use crate::filter::{ActivationState, EventAdmissionFilter};
use crate::gate::{
    DecisionRecord, EnablementGate, EnvSnapshot, GateContext, GateDecision, HostSettings,
    PackageInfo, PluginScope,
};
use crate::metadata::{MetaObject, ObjectLookup};
use crate::registration;
use crate::reporter::ReportingClient;
use crate::{PluginConfig, Result};
use std::sync::Arc;
use tracing::info;

/// The error-reporting plugin instance.
///
/// Lifecycle: the host constructs it, calls [`init`](SentryPlugin::init)
/// once, and — if the gate accepted — later clears the active flag on
/// shutdown. `really_enabled` is set exactly once, on successful activation.
pub struct SentryPlugin<C: ReportingClient> {
    config: PluginConfig,
    ctx: GateContext,
    client: C,
    state: Arc<ActivationState>,
    really_enabled: bool,
    filter: Option<Arc<EventAdmissionFilter>>,
    last_decision: Option<DecisionRecord>,
}

impl<C: ReportingClient> SentryPlugin<C> {
    pub fn new(config: PluginConfig, ctx: GateContext, client: C) -> Self {
        Self {
            config,
            ctx,
            client,
            state: Arc::new(ActivationState::new()),
            really_enabled: false,
            filter: None,
            last_decision: None,
        }
    }

    /// Run the enablement gate and, on acceptance, register the reporting
    /// client and install the admission filter.
    ///
    /// Configuration errors are returned as `Err`; deliberate suppressions
    /// as `Ok(GateDecision::Suppressed(..))`. The host decides whether a
    /// rejection disposes of this instance.
    pub async fn init<L: ObjectLookup>(&mut self, lookup: &L) -> Result<GateDecision> {
        let decision = EnablementGate::evaluate(&self.config, &self.ctx, lookup).await?;
        self.last_decision = Some(DecisionRecord::new(decision.clone()));

        if let GateDecision::Activated(activation) = &decision {
            self.really_enabled = true;
            let filter = registration::register(
                &mut self.client,
                &self.config,
                &self.ctx,
                activation.uuid.as_deref(),
                self.state.clone(),
            );
            self.filter = Some(filter);
            info!("error reporting active for this process");
        }

        Ok(decision)
    }

    /// Whether the gate accepted and registration ran.
    pub fn really_enabled(&self) -> bool {
        self.really_enabled
    }

    /// Host-owned lifecycle flag read by the admission filter.
    pub fn is_active(&self) -> bool {
        self.state.is_active()
    }

    pub fn set_active(&self, active: bool) {
        self.state.set_active(active);
    }

    /// The reporting-client handle, for ad hoc use by the host.
    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn client_mut(&mut self) -> &mut C {
        &mut self.client
    }

    /// The installed admission filter, once activated.
    pub fn filter(&self) -> Option<&Arc<EventAdmissionFilter>> {
        self.filter.as_ref()
    }

    /// The gate's decision for this run, with its timestamp.
    pub fn last_decision(&self) -> Option<&DecisionRecord> {
        self.last_decision.as_ref()
    }
}

/// Builder wiring host context into a [`SentryPlugin`].
pub struct SentryPluginBuilder {
    config: PluginConfig,
    scope: PluginScope,
    parent_package: PackageInfo,
    parent_meta: Option<MetaObject>,
    parent_namespace: Option<String>,
    plugin_namespace: String,
    settings: HostSettings,
    env: EnvSnapshot,
}

impl SentryPluginBuilder {
    pub fn new(config: PluginConfig) -> Self {
        Self {
            config,
            scope: PluginScope::Adapter,
            parent_package: PackageInfo::default(),
            parent_meta: None,
            parent_namespace: None,
            plugin_namespace: String::new(),
            settings: HostSettings::default(),
            env: EnvSnapshot::from_process(),
        }
    }

    pub fn scope(mut self, scope: PluginScope) -> Self {
        self.scope = scope;
        self
    }

    pub fn parent_package(mut self, name: impl Into<String>, version: impl Into<String>) -> Self {
        self.parent_package = PackageInfo::new(name, version);
        self
    }

    pub fn parent_meta(mut self, meta: MetaObject) -> Self {
        self.parent_meta = Some(meta);
        self
    }

    pub fn parent_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.parent_namespace = Some(namespace.into());
        self
    }

    pub fn plugin_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.plugin_namespace = namespace.into();
        self
    }

    pub fn settings(mut self, settings: HostSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Replace the captured environment (deterministic tests, embedded hosts).
    pub fn env(mut self, env: EnvSnapshot) -> Self {
        self.env = env;
        self
    }

    pub fn build<C: ReportingClient>(self, client: C) -> SentryPlugin<C> {
        let ctx = GateContext {
            scope: self.scope,
            parent_package: self.parent_package,
            parent_meta: self.parent_meta,
            parent_namespace: self.parent_namespace,
            plugin_namespace: self.plugin_namespace,
            settings: self.settings,
            env: self.env,
        };
        SentryPlugin::new(self.config, ctx, client)
    }
}
