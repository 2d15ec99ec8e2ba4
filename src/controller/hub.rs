//! Hub connection info and cluster identity
//!
//! The hub secret is a hard dependency: without it the collector has no
//! destination. The cluster identifier is a soft dependency: clusters
//! predating the concept are supported with an empty identifier.

use k8s_openapi::api::core::v1::Secret;
use kube::api::{Api, DynamicObject, GroupVersionKind};
use kube::discovery::ApiResource;
use kube::Client;
use serde::Deserialize;
use tracing::{info, warn};

use crate::error::{Error, Result};

/// Fixed name of the hub connection secret
pub const HUB_INFO_SECRET_NAME: &str = "hub-info-secret";
const HUB_INFO_KEY: &str = "hub-info.yaml";

/// Connection details for the hub ingestion endpoint
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct HubInfo {
    /// Display name the hub knows this cluster by
    #[serde(rename = "cluster-name")]
    pub cluster_name: String,
    /// URL metrics are uploaded to
    pub endpoint: String,
}

/// Read and decode the hub connection secret. Any failure is propagated:
/// this is a hard dependency of reconciliation.
pub async fn read_hub_info(client: &Client, namespace: &str) -> Result<HubInfo> {
    let api: Api<Secret> = Api::namespaced(client.clone(), namespace);
    let secret = api.get(HUB_INFO_SECRET_NAME).await?;
    let data = secret
        .data
        .as_ref()
        .and_then(|d| d.get(HUB_INFO_KEY))
        .ok_or_else(|| {
            Error::ConfigError(format!(
                "secret {HUB_INFO_SECRET_NAME} has no {HUB_INFO_KEY} key"
            ))
        })?;
    Ok(serde_yaml::from_slice(&data.0)?)
}

/// Resolve the opaque cluster identifier from the ClusterVersion object.
///
/// Returns `None` when the cluster has no such concept; the caller
/// substitutes the hub display name and the legacy trust-bundle path. API
/// failures also degrade to `None` to keep reconciliation moving, but log
/// at warn so they stay distinguishable from genuine absence.
pub async fn resolve_cluster_id(client: &Client) -> Option<String> {
    let gvk = GroupVersionKind::gvk("config.openshift.io", "v1", "ClusterVersion");
    let ar = ApiResource::from_gvk(&gvk);
    let api: Api<DynamicObject> = Api::all_with(client.clone(), &ar);

    match api.get("version").await {
        Ok(cv) => cv
            .data
            .pointer("/spec/clusterID")
            .and_then(|v| v.as_str())
            .map(str::to_string),
        Err(kube::Error::Api(e)) if e.code == 404 => {
            info!("No ClusterVersion object; using empty cluster identifier");
            None
        }
        Err(e) => {
            warn!(
                "Failed to resolve cluster identifier, falling back to empty: {:?}",
                e
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hub_info_decodes_from_yaml() {
        let info: HubInfo = serde_yaml::from_str(
            "cluster-name: \"test-cluster\"\nendpoint: \"http://test-endpoint\"\n",
        )
        .unwrap();
        assert_eq!(info.cluster_name, "test-cluster");
        assert_eq!(info.endpoint, "http://test-endpoint");
    }

    #[test]
    fn test_hub_info_requires_both_keys() {
        let result: std::result::Result<HubInfo, _> =
            serde_yaml::from_str("cluster-name: \"only-name\"\n");
        assert!(result.is_err(), "endpoint must be present");
    }
}
