//! Global observability configuration and the hub-side binding object

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::addon::{ObservabilityAddonSpec, StatusCondition};

/// Fixed name of the cluster-scoped global configuration object
pub const MCO_NAME: &str = "observability";

/// Fixed name of the binding object the hub observes this addon through
pub const MANAGED_CLUSTER_ADDON_NAME: &str = "observability-controller";

/// Global observability configuration. Cluster-scoped; its addon settings
/// drive the enable flag and scrape interval for the collector.
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "observability.open-cluster-management.io",
    version = "v1beta1",
    kind = "MultiClusterObservability",
    shortname = "mco"
)]
#[serde(rename_all = "camelCase")]
pub struct MultiClusterObservabilitySpec {
    /// Addon settings pushed down to every managed cluster
    #[serde(default)]
    pub observability_addon_spec: ObservabilityAddonSpec,
}

/// The remote control plane's view of this addon. Only its status
/// conditions are written here; the spec belongs to the hub.
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "addon.open-cluster-management.io",
    version = "v1alpha1",
    kind = "ManagedClusterAddOn",
    namespaced,
    status = "ManagedClusterAddOnStatus",
    shortname = "mca"
)]
#[serde(rename_all = "camelCase")]
pub struct ManagedClusterAddOnSpec {
    /// Namespace on the managed cluster the addon agent is installed into
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub install_namespace: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ManagedClusterAddOnStatus {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<StatusCondition>,
}
