//! Custom Resource Definitions for the observability addon
//!
//! Three kinds participate in reconciliation: the addon resource itself,
//! the cluster-scoped global configuration, and the hub-side binding
//! object that carries installation status back to the remote control
//! plane.

mod addon;
mod observability;


pub use addon::{
    ObservabilityAddon, ObservabilityAddonSpec, ObservabilityAddonStatus, StatusCondition,
    ADDON_NAME,
};
pub use observability::{
    ManagedClusterAddOn, ManagedClusterAddOnSpec, ManagedClusterAddOnStatus,
    MultiClusterObservability, MultiClusterObservabilitySpec, MANAGED_CLUSTER_ADDON_NAME, MCO_NAME,
};
