//! Finalizer lifecycle for the ObservabilityAddon
//!
//! The cleanup marker guarantees this operator, not generic garbage
//! collection, tears down the collector resources: none of them are owned
//! by the addon through parent/child references. It also makes deletion
//! idempotent and resumable: the marker is only removed once every managed
//! resource is gone, so a failed teardown resumes on the next pass.

use kube::api::{Api, Patch, PatchParams};
use kube::{Client, ResourceExt};
use serde_json::json;
use tracing::{info, instrument};

use crate::config::OperatorConfig;
use crate::controller::{collector, supporting, FIELD_MANAGER};
use crate::crd::ObservabilityAddon;
use crate::error::Result;

/// Cleanup marker held on the addon while managed resources exist
pub const ADDON_FINALIZER: &str = "observability.open-cluster-management.io/addon-cleanup";

pub fn has_finalizer(addon: &ObservabilityAddon) -> bool {
    addon.finalizers().iter().any(|f| f == ADDON_FINALIZER)
}

pub fn is_being_deleted(addon: &ObservabilityAddon) -> bool {
    addon.metadata.deletion_timestamp.is_some()
}

/// Drive the finalizer state machine for one reconciliation pass.
///
/// Returns `true` when a deletion was fully handled; the caller must stop
/// reconciling this trigger.
#[instrument(skip(client, config, addon), fields(name = %addon.name_any()))]
pub async fn handle_finalization(
    client: &Client,
    config: &OperatorConfig,
    addon: &ObservabilityAddon,
) -> Result<bool> {
    if is_being_deleted(addon) && has_finalizer(addon) {
        // any failure aborts before the marker is removed, so a retry
        // resumes teardown instead of silently succeeding
        collector::delete_metrics_collector(client, config).await?;
        supporting::delete_cluster_role_binding(client, &config.namespace).await?;
        supporting::delete_ca_config_map(client, &config.namespace).await?;
        remove_finalizer(client, config, addon).await?;
        info!("Finalizer removed from addon after teardown");
        return Ok(true);
    }
    if !has_finalizer(addon) {
        add_finalizer(client, config, addon).await?;
        info!("Finalizer added to addon");
    }
    Ok(false)
}

async fn add_finalizer(
    client: &Client,
    config: &OperatorConfig,
    addon: &ObservabilityAddon,
) -> Result<()> {
    let mut finalizers: Vec<String> = addon.finalizers().to_vec();
    finalizers.push(ADDON_FINALIZER.to_string());
    patch_finalizers(client, config, addon, finalizers).await
}

async fn remove_finalizer(
    client: &Client,
    config: &OperatorConfig,
    addon: &ObservabilityAddon,
) -> Result<()> {
    let finalizers: Vec<String> = addon
        .finalizers()
        .iter()
        .filter(|f| f.as_str() != ADDON_FINALIZER)
        .cloned()
        .collect();
    patch_finalizers(client, config, addon, finalizers).await
}

async fn patch_finalizers(
    client: &Client,
    config: &OperatorConfig,
    addon: &ObservabilityAddon,
    finalizers: Vec<String>,
) -> Result<()> {
    let api: Api<ObservabilityAddon> =
        Api::namespaced(client.clone(), &config.hub_namespace);
    let patch = json!({
        "metadata": {
            "finalizers": finalizers
        }
    });
    api.patch(
        &addon.name_any(),
        &PatchParams::apply(FIELD_MANAGER),
        &Patch::Merge(&patch),
    )
    .await?;
    Ok(())
}
