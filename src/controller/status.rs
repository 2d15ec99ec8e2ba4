//! Status reporting to the addon resource and the hub binding object
//!
//! One internal lifecycle state, two sinks with different condition
//! vocabularies: the addon's own status carries the state name verbatim,
//! the binding object speaks Kubernetes condition conventions. The mapping
//! lives here so call sites never branch per sink.

use kube::api::{Api, Patch, PatchParams};
use kube::Client;
use serde_json::json;
use tracing::instrument;

use crate::config::OperatorConfig;
use crate::controller::FIELD_MANAGER;
use crate::crd::{
    ManagedClusterAddOn, ObservabilityAddon, StatusCondition, ADDON_NAME,
    MANAGED_CLUSTER_ADDON_NAME,
};
use crate::error::Result;

/// Lifecycle states reported upward
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AddonState {
    /// The cluster has no metrics backend to collect from
    NotSupported,
    /// The collector is deployed and current
    Ready,
    /// Deploying the collector failed
    Degraded,
    /// Metrics collection is switched off
    Disabled,
}

impl AddonState {
    pub fn as_str(&self) -> &'static str {
        match self {
            AddonState::NotSupported => "NotSupported",
            AddonState::Ready => "Ready",
            AddonState::Degraded => "Degraded",
            AddonState::Disabled => "Disabled",
        }
    }
}

/// Condition written onto the addon's own status for a given state.
pub fn addon_condition(state: AddonState) -> StatusCondition {
    let (reason, message) = match state {
        AddonState::Ready => ("Deployed", "Metrics collector deployed"),
        AddonState::Disabled => ("Disabled", "Metrics collection is disabled"),
        AddonState::Degraded => ("Degraded", "Metrics collector deployment failed"),
        AddonState::NotSupported => (
            "NotSupported",
            "No metrics backend service found on this cluster",
        ),
    };
    StatusCondition {
        type_: state.as_str().to_string(),
        status: "True".to_string(),
        last_transition_time: chrono::Utc::now().to_rfc3339(),
        reason: reason.to_string(),
        message: message.to_string(),
    }
}

/// Condition written onto the hub binding object for a given state,
/// following Kubernetes condition conventions.
pub fn binding_condition(state: AddonState) -> StatusCondition {
    let (type_, status, reason, message) = match state {
        AddonState::Ready => (
            "Available",
            "True",
            "Ready",
            "observability addon is available",
        ),
        AddonState::Degraded => (
            "Degraded",
            "True",
            "Degraded",
            "observability addon is degraded",
        ),
        AddonState::Disabled => (
            "Progressing",
            "False",
            "Disabled",
            "observability addon is disabled",
        ),
        AddonState::NotSupported => (
            "Available",
            "False",
            "NotSupported",
            "observability is not supported on this cluster",
        ),
    };
    StatusCondition {
        type_: type_.to_string(),
        status: status.to_string(),
        last_transition_time: chrono::Utc::now().to_rfc3339(),
        reason: reason.to_string(),
        message: message.to_string(),
    }
}

/// Insert or replace the same-type condition. The transition time is kept
/// when the status value did not change.
pub fn set_condition(conditions: &mut Vec<StatusCondition>, condition: StatusCondition) {
    if let Some(existing) = conditions.iter_mut().find(|c| c.type_ == condition.type_) {
        let previous_time = existing.last_transition_time.clone();
        let keep_time = existing.status == condition.status;
        *existing = condition;
        if keep_time {
            existing.last_transition_time = previous_time;
        }
    } else {
        conditions.push(condition);
    }
}

/// Publish the state to the addon's own status.
#[instrument(skip(client, config, addon))]
pub async fn report_addon_status(
    client: &Client,
    config: &OperatorConfig,
    addon: &ObservabilityAddon,
    state: AddonState,
) -> Result<()> {
    let api: Api<ObservabilityAddon> = Api::namespaced(client.clone(), &config.hub_namespace);
    let mut conditions = addon
        .status
        .as_ref()
        .map(|s| s.conditions.clone())
        .unwrap_or_default();
    set_condition(&mut conditions, addon_condition(state));

    let patch = json!({ "status": { "conditions": conditions } });
    api.patch_status(
        ADDON_NAME,
        &PatchParams::apply(FIELD_MANAGER),
        &Patch::Merge(&patch),
    )
    .await?;
    Ok(())
}

/// Publish the state to the hub binding object.
#[instrument(skip(client, config, binding))]
pub async fn report_binding_status(
    client: &Client,
    config: &OperatorConfig,
    binding: &ManagedClusterAddOn,
    state: AddonState,
) -> Result<()> {
    let api: Api<ManagedClusterAddOn> = Api::namespaced(client.clone(), &config.hub_namespace);
    let mut conditions = binding
        .status
        .as_ref()
        .map(|s| s.conditions.clone())
        .unwrap_or_default();
    set_condition(&mut conditions, binding_condition(state));

    let patch = json!({ "status": { "conditions": conditions } });
    api.patch_status(
        MANAGED_CLUSTER_ADDON_NAME,
        &PatchParams::apply(FIELD_MANAGER),
        &Patch::Merge(&patch),
    )
    .await?;
    Ok(())
}

/// Publish the state to both sinks.
pub async fn report(
    client: &Client,
    config: &OperatorConfig,
    addon: &ObservabilityAddon,
    binding: &ManagedClusterAddOn,
    state: AddonState,
) -> Result<()> {
    report_addon_status(client, config, addon, state).await?;
    report_binding_status(client, config, binding, state).await?;
    Ok(())
}
