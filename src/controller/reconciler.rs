//! Reconciliation engine for the observability addon
//!
//! Every pass is stateless: the action to take is derived from the current
//! state of the cluster objects, never from memory of earlier passes, so a
//! crashed, repeated or out-of-order pass converges to the same result.
//! The derivation itself is the pure function [`decide`]; `reconcile`
//! gathers the observed state, calls it, and executes the chosen action.

use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Service;
use kube::api::Api;
use kube::Client;
use tracing::{info, instrument, warn};

use crate::config::OperatorConfig;
use crate::controller::collector::{self, CollectorParams, COLLECTOR_NAME, MTLS_CERT_SECRET};
use crate::controller::status::AddonState;
use crate::controller::{allowlist, finalizers, hub, status, supporting};
use crate::crd::{
    ManagedClusterAddOn, MultiClusterObservability, ObservabilityAddon, ADDON_NAME,
    MANAGED_CLUSTER_ADDON_NAME, MCO_NAME,
};
use crate::error::Result;

/// Service probed to detect a usable metrics backend
pub const PROM_SERVICE_NAME: &str = "prometheus-k8s";
pub const PROM_NAMESPACE: &str = "openshift-monitoring";

/// A reconciliation trigger: the object that changed. Regardless of which
/// object triggered the pass, reconciliation resolves to the same fixed
/// addon identity.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Trigger {
    pub namespace: String,
    pub name: String,
}

impl Trigger {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Whether this trigger was caused by the mutual-TLS certificate
    /// secret. The collector does not reload replaced certificate files,
    /// so such triggers force a pod restart.
    pub fn is_cert_secret(&self) -> bool {
        self.name == MTLS_CERT_SECRET
    }
}

/// Snapshot of the cluster state a decision is derived from
#[derive(Clone, Debug, Default)]
pub struct ObservedState {
    pub addon_present: bool,
    pub addon_deleting: bool,
    pub addon_has_finalizer: bool,
    pub binding_present: bool,
    /// Enable flag from the global configuration; `None` when the
    /// configuration object is absent
    pub config_enabled: Option<bool>,
    pub backend_present: bool,
    pub collector_present: bool,
}

/// What a reconciliation pass should do
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Action {
    NoOp,
    Install,
    Update,
    Disable,
    Teardown,
    ReportOnly(AddonState),
}

/// Derive the action for one pass from observed state alone.
pub fn decide(observed: &ObservedState) -> Action {
    if !observed.addon_present {
        return Action::NoOp;
    }
    if observed.addon_deleting && observed.addon_has_finalizer {
        return Action::Teardown;
    }
    if !observed.binding_present {
        return Action::NoOp;
    }
    let Some(enabled) = observed.config_enabled else {
        return Action::NoOp;
    };
    if !observed.backend_present {
        return Action::ReportOnly(AddonState::NotSupported);
    }
    if !enabled {
        return Action::Disable;
    }
    if observed.collector_present {
        Action::Update
    } else {
        Action::Install
    }
}

/// Desired replica count for an action that syncs the collector.
pub(crate) fn replicas_for(action: &Action) -> i32 {
    match action {
        Action::Disable => 0,
        _ => 1,
    }
}

/// Whether this pass must force-restart the collector pods.
pub(crate) fn should_restart(trigger: &Trigger, collector_present: bool) -> bool {
    trigger.is_cert_secret() && collector_present
}

/// Stateless reconciler; one instance serves every trigger.
pub struct Reconciler {
    client: Client,
    config: OperatorConfig,
}

impl Reconciler {
    pub fn new(client: Client, config: OperatorConfig) -> Self {
        Self { client, config }
    }

    /// Run one reconciliation pass. Idempotent: with no external change,
    /// a second pass performs no additional writes.
    #[instrument(skip(self, trigger), fields(namespace = %trigger.namespace, name = %trigger.name))]
    pub async fn reconcile(&self, trigger: &Trigger) -> Result<()> {
        info!("Reconciling observability addon");

        let addons: Api<ObservabilityAddon> =
            Api::namespaced(self.client.clone(), &self.config.hub_namespace);
        let addon = match addons.get(ADDON_NAME).await {
            Ok(addon) => addon,
            Err(kube::Error::Api(e)) if e.code == 404 => {
                info!("Addon resource not found; nothing to do");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        // finalizer lifecycle first: a handled deletion ends the pass
        if finalizers::handle_finalization(&self.client, &self.config, &addon).await? {
            return Ok(());
        }

        let bindings: Api<ManagedClusterAddOn> =
            Api::namespaced(self.client.clone(), &self.config.hub_namespace);
        let binding = match bindings.get(MANAGED_CLUSTER_ADDON_NAME).await {
            Ok(binding) => binding,
            Err(kube::Error::Api(e)) if e.code == 404 => {
                info!("Addon binding not found; not yet installed upstream");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        let configs: Api<MultiClusterObservability> = Api::all(self.client.clone());
        let global_config = match configs.get(MCO_NAME).await {
            Ok(config) => config,
            Err(kube::Error::Api(e)) if e.code == 404 => {
                info!("Global observability configuration not found");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        let observed = ObservedState {
            addon_present: true,
            addon_deleting: finalizers::is_being_deleted(&addon),
            addon_has_finalizer: finalizers::has_finalizer(&addon),
            binding_present: true,
            config_enabled: Some(
                global_config.spec.observability_addon_spec.enable_metrics,
            ),
            backend_present: self.backend_service_present().await?,
            collector_present: self.collector_present().await?,
        };

        match decide(&observed) {
            Action::NoOp | Action::Teardown => {
                // teardown is driven by the finalizer pass above
                Ok(())
            }
            Action::ReportOnly(state) => {
                info!("Reporting {} without touching resources", state.as_str());
                status::report(&self.client, &self.config, &addon, &binding, state).await
            }
            action => {
                self.sync_collector(
                    trigger,
                    &addon,
                    &binding,
                    &global_config,
                    &action,
                    observed.collector_present,
                )
                .await
            }
        }
    }

    /// Steps 5-9 of a pass that manages the collector: resolve inputs,
    /// provision supporting resources, sync the workload, restart pods on
    /// certificate rotation, and report the outcome.
    async fn sync_collector(
        &self,
        trigger: &Trigger,
        addon: &ObservabilityAddon,
        binding: &ManagedClusterAddOn,
        global_config: &MultiClusterObservability,
        action: &Action,
        collector_present: bool,
    ) -> Result<()> {
        let hub_info = hub::read_hub_info(&self.client, &self.config.namespace).await?;
        let cluster_id = hub::resolve_cluster_id(&self.client).await.unwrap_or_default();

        supporting::ensure_cluster_role_binding(&self.client, &self.config.namespace).await?;
        supporting::ensure_ca_config_map(&self.client, &self.config.namespace).await?;

        let allowlist = allowlist::load(&self.client, &self.config.namespace).await;
        let replicas = replicas_for(action);
        let params = CollectorParams {
            settings: &global_config.spec.observability_addon_spec,
            hub: &hub_info,
            allowlist: &allowlist,
            cluster_id: &cluster_id,
            replicas,
        };

        if let Err(e) = collector::ensure_metrics_collector(&self.client, &self.config, &params).await
        {
            if replicas > 0 {
                // surface the failure to the hub; the error still
                // propagates so the caller re-triggers
                if let Err(report_err) =
                    status::report_binding_status(&self.client, &self.config, binding, AddonState::Degraded)
                        .await
                {
                    warn!("Failed to report degraded status: {:?}", report_err);
                }
            }
            return Err(e);
        }

        if should_restart(trigger, collector_present) {
            collector::restart_collector_pods(&self.client, &self.config.namespace).await?;
        }

        let state = if replicas > 0 {
            AddonState::Ready
        } else {
            AddonState::Disabled
        };
        status::report(&self.client, &self.config, addon, binding, state).await
    }

    async fn backend_service_present(&self) -> Result<bool> {
        let services: Api<Service> = Api::namespaced(self.client.clone(), PROM_NAMESPACE);
        match services.get(PROM_SERVICE_NAME).await {
            Ok(_) => Ok(true),
            Err(kube::Error::Api(e)) if e.code == 404 => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn collector_present(&self) -> Result<bool> {
        let deployments: Api<Deployment> =
            Api::namespaced(self.client.clone(), &self.config.namespace);
        match deployments.get(COLLECTOR_NAME).await {
            Ok(_) => Ok(true),
            Err(kube::Error::Api(e)) if e.code == 404 => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}
