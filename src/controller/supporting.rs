//! Supporting resources for the collector
//!
//! The cluster role binding grants the collector's service account read
//! access to the in-cluster monitoring stack; the trust-bundle ConfigMap
//! receives its CA content from the service CA controller via the
//! inject-cabundle annotation. Both are created once and never updated.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::ConfigMap;
use k8s_openapi::api::rbac::v1::{ClusterRoleBinding, RoleRef, Subject};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::Api;
use kube::Client;
use tracing::{debug, info, instrument};

use crate::controller::sync::{self, DeleteOutcome, SyncOutcome};
use crate::controller::{OWNER_ANNOTATION_KEY, OWNER_ANNOTATION_VALUE};
use crate::error::Result;

/// Fixed name of the cluster-scoped role binding
pub const CLUSTER_ROLE_BINDING_NAME: &str = "metrics-collector-view";
/// Fixed name of the trust-bundle ConfigMap
pub const CA_CONFIG_MAP_NAME: &str = "metrics-collector-serving-certs-ca-bundle";

const CLUSTER_ROLE_NAME: &str = "cluster-monitoring-view";
const INJECT_CA_BUNDLE_ANNOTATION: &str = "service.alpha.openshift.io/inject-cabundle";

fn owner_annotations() -> BTreeMap<String, String> {
    BTreeMap::from([(
        OWNER_ANNOTATION_KEY.to_string(),
        OWNER_ANNOTATION_VALUE.to_string(),
    )])
}

pub(crate) fn build_cluster_role_binding(namespace: &str) -> ClusterRoleBinding {
    ClusterRoleBinding {
        metadata: ObjectMeta {
            name: Some(CLUSTER_ROLE_BINDING_NAME.to_string()),
            annotations: Some(owner_annotations()),
            ..Default::default()
        },
        role_ref: RoleRef {
            api_group: "rbac.authorization.k8s.io".to_string(),
            kind: "ClusterRole".to_string(),
            name: CLUSTER_ROLE_NAME.to_string(),
        },
        subjects: Some(vec![Subject {
            kind: "ServiceAccount".to_string(),
            name: "default".to_string(),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        }]),
    }
}

pub(crate) fn build_ca_config_map(namespace: &str) -> ConfigMap {
    let mut annotations = owner_annotations();
    annotations.insert(INJECT_CA_BUNDLE_ANNOTATION.to_string(), "true".to_string());

    ConfigMap {
        metadata: ObjectMeta {
            name: Some(CA_CONFIG_MAP_NAME.to_string()),
            namespace: Some(namespace.to_string()),
            annotations: Some(annotations),
            ..Default::default()
        },
        data: Some(BTreeMap::from([(
            "service-ca.crt".to_string(),
            String::new(),
        )])),
        ..Default::default()
    }
}

/// Ensure the cluster role binding exists. Present means done: the binding
/// is immutable once created.
#[instrument(skip(client))]
pub async fn ensure_cluster_role_binding(client: &Client, namespace: &str) -> Result<()> {
    let api: Api<ClusterRoleBinding> = Api::all(client.clone());
    let rb = build_cluster_role_binding(namespace);
    match sync::ensure_present(client, &api, namespace, CLUSTER_ROLE_BINDING_NAME, rb).await? {
        SyncOutcome::Created => info!("Created clusterrolebinding {}", CLUSTER_ROLE_BINDING_NAME),
        _ => debug!(
            "Clusterrolebinding {} already exists",
            CLUSTER_ROLE_BINDING_NAME
        ),
    }
    Ok(())
}

/// Ensure the trust-bundle ConfigMap exists; its contents are filled in by
/// the external trust-bundle controller.
#[instrument(skip(client))]
pub async fn ensure_ca_config_map(client: &Client, namespace: &str) -> Result<()> {
    let api: Api<ConfigMap> = Api::namespaced(client.clone(), namespace);
    let cm = build_ca_config_map(namespace);
    match sync::ensure_present(client, &api, namespace, CA_CONFIG_MAP_NAME, cm).await? {
        SyncOutcome::Created => info!("Created configmap {}", CA_CONFIG_MAP_NAME),
        _ => debug!("Configmap {} already exists", CA_CONFIG_MAP_NAME),
    }
    Ok(())
}

#[instrument(skip(client))]
pub async fn delete_cluster_role_binding(client: &Client, event_namespace: &str) -> Result<()> {
    let api: Api<ClusterRoleBinding> = Api::all(client.clone());
    match sync::delete(client, &api, event_namespace, CLUSTER_ROLE_BINDING_NAME).await? {
        DeleteOutcome::Deleted => info!("Deleted clusterrolebinding {}", CLUSTER_ROLE_BINDING_NAME),
        DeleteOutcome::AlreadyAbsent => {
            debug!("Clusterrolebinding {} already absent", CLUSTER_ROLE_BINDING_NAME);
        }
    }
    Ok(())
}

#[instrument(skip(client))]
pub async fn delete_ca_config_map(client: &Client, namespace: &str) -> Result<()> {
    let api: Api<ConfigMap> = Api::namespaced(client.clone(), namespace);
    match sync::delete(client, &api, namespace, CA_CONFIG_MAP_NAME).await? {
        DeleteOutcome::Deleted => info!("Deleted configmap {}", CA_CONFIG_MAP_NAME),
        DeleteOutcome::AlreadyAbsent => debug!("Configmap {} already absent", CA_CONFIG_MAP_NAME),
    }
    Ok(())
}
