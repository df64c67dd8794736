//! One-time registration of the reporting client after gate acceptance.
//!
//! Pure sequential configuration: release identifier, identity and
//! environment tags, reporting user, and the admission-filter hook. Tags are
//! set only when their values are known.

use crate::config::PluginConfig;
use crate::filter::{ActivationState, EventAdmissionFilter};
use crate::gate::GateContext;
use crate::reporter::{ClientConfig, ReportingClient};
use std::sync::Arc;
use tracing::info;

/// Version of this plugin, reported as its own tag.
pub const PLUGIN_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Configure the client and install the admission filter.
///
/// Returns the installed filter so the host can inspect its statistics.
pub fn register<C: ReportingClient>(
    client: &mut C,
    config: &PluginConfig,
    ctx: &GateContext,
    uuid: Option<&str>,
    state: Arc<ActivationState>,
) -> Arc<EventAdmissionFilter> {
    let release = format!("{}@{}", ctx.parent_package.name, ctx.parent_package.version);
    client.initialize(ClientConfig {
        release: release.clone(),
        dsn: config.dsn.clone(),
        dedupe: true,
    });

    if let Some(common) = ctx.parent_meta.as_ref().and_then(|m| m.common.as_ref()) {
        let version = common
            .installed_version
            .as_deref()
            .or(common.version.as_deref());
        if let Some(v) = version {
            client.set_tag("version", v);
        }
        match common.installed_from.as_deref() {
            Some(from) => client.set_tag("installedFrom", from),
            None => {
                if let Some(v) = version {
                    client.set_tag("installedFrom", v);
                }
            }
        }
    }

    if let Some(v) = ctx.settings.controller_version.as_deref() {
        client.set_tag("controllerVersion", v);
    }
    client.set_tag("osPlatform", std::env::consts::OS);
    if let Some(v) = ctx.settings.runtime_version.as_deref() {
        client.set_tag("runtimeVersion", v);
    }
    client.set_tag("plugin-sentry", PLUGIN_VERSION);
    if let Some(v) = ctx.settings.objects_db_type.as_deref() {
        client.set_tag("objectDBType", v);
    }
    if let Some(v) = ctx.settings.states_db_type.as_deref() {
        client.set_tag("statesDBType", v);
    }

    if let Some(id) = uuid {
        client.set_user(id);
    }

    let lists = config.filter_lists(Some(&ctx.parent_package.name));
    let filter = Arc::new(EventAdmissionFilter::new(lists, state));
    client.install_event_filter(filter.clone());

    info!("error reporting registered for {release}");
    filter
}
