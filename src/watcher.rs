//! Trigger-producing watch loop
//!
//! Watches the addon resource, the global configuration and the
//! connectivity secrets, converts every observed change into a trigger and
//! re-invokes the reconciler serially. Delivery is at-least-once and the
//! reconciler is stateless and idempotent, so duplicate triggers are
//! harmless; failed passes are re-enqueued after a delay.

use std::sync::Arc;
use std::time::Duration;

use futures::TryStreamExt;
use k8s_openapi::api::core::v1::Secret;
use kube::api::Api;
use kube::runtime::watcher;
use kube::{Client, Resource, ResourceExt};
use serde::de::DeserializeOwned;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::config::OperatorConfig;
use crate::controller::collector::MTLS_CERT_SECRET;
use crate::controller::hub::HUB_INFO_SECRET_NAME;
use crate::controller::{Reconciler, Trigger};
use crate::crd::{MultiClusterObservability, ObservabilityAddon, ADDON_NAME, MCO_NAME};
use crate::error::Result;

const RETRY_DELAY_RETRIABLE: Duration = Duration::from_secs(15);
const RETRY_DELAY_FATAL: Duration = Duration::from_secs(60);
const WATCH_ERROR_BACKOFF: Duration = Duration::from_secs(5);
const TRIGGER_QUEUE_DEPTH: usize = 64;

/// Watches the reconciler's inputs and drives it, one trigger at a time.
pub struct Watcher {
    client: Client,
    config: OperatorConfig,
    reconciler: Arc<Reconciler>,
}

impl Watcher {
    pub fn new(client: Client, config: OperatorConfig, reconciler: Arc<Reconciler>) -> Self {
        Self {
            client,
            config,
            reconciler,
        }
    }

    /// Run the watch streams and the serial reconcile loop. Does not
    /// return in normal operation.
    pub async fn run(self) -> Result<()> {
        let (tx, mut rx) = mpsc::channel::<Trigger>(TRIGGER_QUEUE_DEPTH);

        let addons: Api<ObservabilityAddon> =
            Api::namespaced(self.client.clone(), &self.config.hub_namespace);
        tokio::spawn(forward_triggers(
            addons,
            |name| name == ADDON_NAME,
            tx.clone(),
        ));

        let configs: Api<MultiClusterObservability> = Api::all(self.client.clone());
        tokio::spawn(forward_triggers(
            configs,
            |name| name == MCO_NAME,
            tx.clone(),
        ));

        let secrets: Api<Secret> = Api::namespaced(self.client.clone(), &self.config.namespace);
        tokio::spawn(forward_triggers(
            secrets,
            |name| name == HUB_INFO_SECRET_NAME || name == MTLS_CERT_SECRET,
            tx.clone(),
        ));

        info!("Watching for addon, configuration and secret changes");

        let retry_tx = tx;
        while let Some(trigger) = rx.recv().await {
            if let Err(e) = self.reconciler.reconcile(&trigger).await {
                let delay = if e.is_retriable() {
                    RETRY_DELAY_RETRIABLE
                } else {
                    RETRY_DELAY_FATAL
                };
                error!(
                    "Reconcile failed for {}/{}: {}; retrying in {:?}",
                    trigger.namespace, trigger.name, e, delay
                );
                let tx = retry_tx.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    let _ = tx.send(trigger).await;
                });
            }
        }
        Ok(())
    }
}

/// Forward every change to an object of interest as a trigger.
async fn forward_triggers<K>(api: Api<K>, interest: fn(&str) -> bool, tx: mpsc::Sender<Trigger>)
where
    K: Resource + Clone + std::fmt::Debug + DeserializeOwned + Send + 'static,
{
    let mut stream = Box::pin(watcher(api, watcher::Config::default()));
    loop {
        match stream.try_next().await {
            Ok(Some(event)) => {
                let obj = match event {
                    watcher::Event::Apply(obj)
                    | watcher::Event::InitApply(obj)
                    | watcher::Event::Delete(obj) => obj,
                    watcher::Event::Init | watcher::Event::InitDone => continue,
                };
                let name = obj.name_any();
                if !interest(&name) {
                    continue;
                }
                let trigger = Trigger::new(obj.namespace().unwrap_or_default(), name);
                if tx.send(trigger).await.is_err() {
                    // reconcile loop is gone; stop watching
                    return;
                }
            }
            Ok(None) => return,
            Err(e) => {
                warn!("Watch stream error: {}; continuing", e);
                tokio::time::sleep(WATCH_ERROR_BACKOFF).await;
            }
        }
    }
}
