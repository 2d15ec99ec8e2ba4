//! Metrics collector workload management
//!
//! Builds the desired collector Deployment from addon configuration, hub
//! connection info, the metrics allowlist and the cluster identifier, and
//! syncs it against the cluster. The builder is a pure function: identical
//! inputs always render a byte-identical command line, which is what makes
//! the workload diff meaningful.

use std::collections::BTreeMap;

use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{
    ConfigMapVolumeSource, Container, EnvVar, HostAlias, Pod, PodSpec, PodTemplateSpec,
    SecretVolumeSource, Volume, VolumeMount,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use kube::api::{Api, DeleteParams, ListParams};
use kube::{Client, ResourceExt};
use tracing::{debug, info, instrument};

use crate::config::OperatorConfig;
use crate::controller::allowlist::MetricsAllowlist;
use crate::controller::hub::HubInfo;
use crate::controller::supporting::CA_CONFIG_MAP_NAME;
use crate::controller::sync::{self, DeleteOutcome, SyncOutcome};
use crate::controller::{OWNER_ANNOTATION_KEY, OWNER_ANNOTATION_VALUE};
use crate::crd::ObservabilityAddonSpec;
use crate::error::Result;

/// Fixed name of the collector Deployment
pub const COLLECTOR_NAME: &str = "metrics-collector-deployment";
/// Fixed selector label on the collector pods
pub const SELECTOR_KEY: &str = "component";
pub const SELECTOR_VALUE: &str = "metrics-collector";

/// Secret holding the client certificate for mutual TLS towards the hub
pub const MTLS_CERT_SECRET: &str = "observability-managed-cluster-certs";

const CA_MOUNT_PATH: &str = "/etc/serving-certs-ca-bundle";
const CA_VOLUME_NAME: &str = "serving-certs-ca-bundle";
/// Service-account CA path used on clusters without a cluster identifier
const LEGACY_CA_FILE: &str = "//run/secrets/kubernetes.io/serviceaccount/service-ca.crt";
const TOKEN_FILE: &str = "/var/run/secrets/kubernetes.io/serviceaccount/token";
const MTLS_MOUNT_PATH: &str = "/tlscerts";
const LIMIT_BYTES: u64 = 1073741824;
const DEFAULT_INTERVAL: &str = "30s";

const UPSTREAM_PROM_URL: &str = "https://prometheus-k8s.openshift-monitoring.svc:9091";

// Development-cluster branch: a fixed identifier switches the pipeline to a
// plain-HTTP upstream and a host alias for the hub, so the whole flow can
// run against a local kind cluster.
const KIND_CLUSTER_ID: &str = "kind-cluster-id";
const KIND_UPSTREAM_PROM_URL: &str = "http://prometheus-k8s.openshift-monitoring.svc:9090";
const KIND_CLUSTER_HOST: &str = "observatorium.hub";
const KIND_CLUSTER_IP: &str = "172.17.0.2";

/// Inputs for the desired-state computation. Pure data, no I/O.
#[derive(Clone, Debug)]
pub struct CollectorParams<'a> {
    pub settings: &'a ObservabilityAddonSpec,
    pub hub: &'a HubInfo,
    pub allowlist: &'a MetricsAllowlist,
    /// Opaque cluster identifier; empty on clusters without the concept
    pub cluster_id: &'a str,
    pub replicas: i32,
}

fn selector_labels() -> BTreeMap<String, String> {
    BTreeMap::from([(SELECTOR_KEY.to_string(), SELECTOR_VALUE.to_string())])
}

/// Compute the complete desired collector Deployment.
pub fn build_deployment(config: &OperatorConfig, params: &CollectorParams<'_>) -> Deployment {
    let interval = if params.settings.interval > 0 {
        format!("{}s", params.settings.interval)
    } else {
        DEFAULT_INTERVAL.to_string()
    };

    let mut volumes = vec![Volume {
        name: MTLS_CERT_SECRET.to_string(),
        secret: Some(SecretVolumeSource {
            secret_name: Some(MTLS_CERT_SECRET.to_string()),
            ..Default::default()
        }),
        ..Default::default()
    }];
    let mut mounts = vec![VolumeMount {
        name: MTLS_CERT_SECRET.to_string(),
        mount_path: MTLS_MOUNT_PATH.to_string(),
        ..Default::default()
    }];

    let mut cluster_id = params.cluster_id.to_string();
    let ca_file;
    if cluster_id.is_empty() {
        // legacy clusters have no managed trust bundle; the display name
        // doubles as the identifier
        cluster_id = params.hub.cluster_name.clone();
        ca_file = LEGACY_CA_FILE.to_string();
    } else {
        ca_file = format!("{CA_MOUNT_PATH}/service-ca.crt");
        volumes.push(Volume {
            name: CA_VOLUME_NAME.to_string(),
            config_map: Some(ConfigMapVolumeSource {
                name: Some(CA_CONFIG_MAP_NAME.to_string()),
                ..Default::default()
            }),
            ..Default::default()
        });
        mounts.push(VolumeMount {
            name: CA_VOLUME_NAME.to_string(),
            mount_path: CA_MOUNT_PATH.to_string(),
            ..Default::default()
        });
    }

    let mut upstream = UPSTREAM_PROM_URL.to_string();
    let mut host_aliases: Vec<HostAlias> = Vec::new();
    if cluster_id == KIND_CLUSTER_ID {
        upstream = KIND_UPSTREAM_PROM_URL.to_string();
        host_aliases.push(HostAlias {
            ip: Some(KIND_CLUSTER_IP.to_string()),
            hostnames: Some(vec![KIND_CLUSTER_HOST.to_string()]),
        });
    }

    let mut command = vec![
        "/usr/bin/metrics-collector".to_string(),
        "--from=$(FROM)".to_string(),
        "--to-upload=$(TO)".to_string(),
        format!("--from-ca-file={ca_file}"),
        format!("--from-token-file={TOKEN_FILE}"),
        format!("--interval={interval}"),
        format!("--label=\"cluster={}\"", params.hub.cluster_name),
        format!("--label=\"clusterID={cluster_id}\""),
        format!("--limit-bytes={LIMIT_BYTES}"),
    ];
    for name in &params.allowlist.names {
        command.push(format!("--match={{__name__=\"{name}\"}}"));
    }
    for expr in &params.allowlist.matches {
        command.push(format!("--match={{{expr}}}"));
    }

    Deployment {
        metadata: ObjectMeta {
            name: Some(COLLECTOR_NAME.to_string()),
            namespace: Some(config.namespace.clone()),
            annotations: Some(BTreeMap::from([(
                OWNER_ANNOTATION_KEY.to_string(),
                OWNER_ANNOTATION_VALUE.to_string(),
            )])),
            ..Default::default()
        },
        spec: Some(DeploymentSpec {
            replicas: Some(params.replicas),
            selector: LabelSelector {
                match_labels: Some(selector_labels()),
                ..Default::default()
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(selector_labels()),
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    host_aliases: if host_aliases.is_empty() {
                        None
                    } else {
                        Some(host_aliases)
                    },
                    service_account_name: Some("default".to_string()),
                    containers: vec![Container {
                        name: "metrics-collector".to_string(),
                        image: Some(config.collector_image.clone()),
                        command: Some(command),
                        env: Some(vec![
                            EnvVar {
                                name: "FROM".to_string(),
                                value: Some(upstream),
                                ..Default::default()
                            },
                            EnvVar {
                                name: "TO".to_string(),
                                value: Some(params.hub.endpoint.clone()),
                                ..Default::default()
                            },
                        ]),
                        volume_mounts: Some(mounts),
                        image_pull_policy: Some("Always".to_string()),
                        ..Default::default()
                    }],
                    volumes: Some(volumes),
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        status: None,
    }
}

/// The fields this operator renders, extracted for change detection.
/// Comparing a projection instead of the raw spec keeps server-defaulted
/// fields (update strategy, probes, revision history, ...) from reporting
/// a permanent diff.
#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct CollectorProjection {
    replicas: Option<i32>,
    selector: Option<BTreeMap<String, String>>,
    template_labels: Option<BTreeMap<String, String>>,
    service_account: Option<String>,
    host_aliases: Vec<(Option<String>, Vec<String>)>,
    containers: Vec<ContainerProjection>,
    volumes: Vec<(String, Option<String>, Option<String>)>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct ContainerProjection {
    name: String,
    image: Option<String>,
    command: Vec<String>,
    env: Vec<(String, Option<String>)>,
    mounts: Vec<(String, String)>,
}

pub(crate) fn projection(deployment: &Deployment) -> CollectorProjection {
    let spec = match &deployment.spec {
        Some(spec) => spec,
        None => return CollectorProjection::default(),
    };
    let pod = spec.template.spec.as_ref();

    CollectorProjection {
        replicas: spec.replicas,
        selector: spec.selector.match_labels.clone(),
        template_labels: spec
            .template
            .metadata
            .as_ref()
            .and_then(|m| m.labels.clone()),
        service_account: pod.and_then(|p| p.service_account_name.clone()),
        host_aliases: pod
            .and_then(|p| p.host_aliases.as_ref())
            .map(|aliases| {
                aliases
                    .iter()
                    .map(|a| (a.ip.clone(), a.hostnames.clone().unwrap_or_default()))
                    .collect()
            })
            .unwrap_or_default(),
        containers: pod
            .map(|p| {
                p.containers
                    .iter()
                    .map(|c| ContainerProjection {
                        name: c.name.clone(),
                        image: c.image.clone(),
                        command: c.command.clone().unwrap_or_default(),
                        env: c
                            .env
                            .as_ref()
                            .map(|env| {
                                env.iter().map(|e| (e.name.clone(), e.value.clone())).collect()
                            })
                            .unwrap_or_default(),
                        mounts: c
                            .volume_mounts
                            .as_ref()
                            .map(|mounts| {
                                mounts
                                    .iter()
                                    .map(|m| (m.name.clone(), m.mount_path.clone()))
                                    .collect()
                            })
                            .unwrap_or_default(),
                    })
                    .collect()
            })
            .unwrap_or_default(),
        volumes: pod
            .and_then(|p| p.volumes.as_ref())
            .map(|volumes| {
                volumes
                    .iter()
                    .map(|v| {
                        (
                            v.name.clone(),
                            v.secret.as_ref().and_then(|s| s.secret_name.clone()),
                            v.config_map.as_ref().and_then(|c| c.name.clone()),
                        )
                    })
                    .collect()
            })
            .unwrap_or_default(),
    }
}

/// Whether the live collector already matches the desired one on every
/// field this operator renders.
pub fn specs_match(live: &Deployment, desired: &Deployment) -> bool {
    projection(live) == projection(desired)
}

/// Create or update the collector Deployment to match the desired state.
#[instrument(skip(client, config, params), fields(namespace = %config.namespace))]
pub async fn ensure_metrics_collector(
    client: &Client,
    config: &OperatorConfig,
    params: &CollectorParams<'_>,
) -> Result<SyncOutcome> {
    let api: Api<Deployment> = Api::namespaced(client.clone(), &config.namespace);
    let desired = build_deployment(config, params);
    let outcome = sync::ensure(
        client,
        &api,
        &config.namespace,
        COLLECTOR_NAME,
        desired,
        specs_match,
    )
    .await?;
    match outcome {
        SyncOutcome::Created => info!("Created metrics collector deployment"),
        SyncOutcome::Updated => info!("Updated metrics collector deployment"),
        SyncOutcome::Unchanged => debug!("Metrics collector deployment unchanged"),
    }
    Ok(outcome)
}

/// Delete the collector Deployment; absence is not an error.
#[instrument(skip(client, config))]
pub async fn delete_metrics_collector(client: &Client, config: &OperatorConfig) -> Result<()> {
    let api: Api<Deployment> = Api::namespaced(client.clone(), &config.namespace);
    match sync::delete(client, &api, &config.namespace, COLLECTOR_NAME).await? {
        DeleteOutcome::Deleted => info!("Deleted metrics collector deployment"),
        DeleteOutcome::AlreadyAbsent => debug!("Metrics collector deployment already absent"),
    }
    Ok(())
}

/// Delete all collector pods; the Deployment recreates them. A running
/// collector does not reload a replaced certificate file from disk, so
/// certificate rotation requires a restart.
#[instrument(skip(client))]
pub async fn restart_collector_pods(client: &Client, namespace: &str) -> Result<()> {
    let pods: Api<Pod> = Api::namespaced(client.clone(), namespace);
    let selector = format!("{SELECTOR_KEY}={SELECTOR_VALUE}");
    let list = pods.list(&ListParams::default().labels(&selector)).await?;
    for pod in list.items {
        let name = pod.name_any();
        pods.delete(&name, &DeleteParams::default()).await?;
        info!("Deleted collector pod {} to force restart", name);
    }
    Ok(())
}
