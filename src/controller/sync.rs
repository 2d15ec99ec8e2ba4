//! Generic resource diff & sync
//!
//! Fetch-compare-write discipline shared by the higher components: a
//! missing object is the "absent" branch, never an error; updates carry the
//! live object's resourceVersion forward so a conflicting concurrent write
//! loses cleanly and is retried on the next pass. Every effective
//! transition records an informational Event; no-ops stay silent.

use std::fmt::Debug;

use k8s_openapi::api::core::v1::{Event, ObjectReference};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, Time};
use kube::api::{Api, DeleteParams, PostParams};
use kube::{Client, Resource};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;

use crate::error::{Error, Result};

/// Result of an `ensure` pass over a single resource
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncOutcome {
    Created,
    Updated,
    Unchanged,
}

/// Result of a `delete` pass over a single resource
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    AlreadyAbsent,
}

/// Make the live object match `desired`.
///
/// `specs_match` decides whether the live object needs an update; callers
/// pass a projection comparison restricted to the fields they render, so
/// server-defaulted fields never report a spurious diff.
pub async fn ensure<K, F>(
    client: &Client,
    api: &Api<K>,
    event_namespace: &str,
    name: &str,
    mut desired: K,
    specs_match: F,
) -> Result<SyncOutcome>
where
    K: Resource<DynamicType = ()> + Clone + Debug + Serialize + DeserializeOwned,
    F: FnOnce(&K, &K) -> bool,
{
    let involved = desired.object_ref(&());
    match api.get(name).await {
        Ok(live) => {
            if specs_match(&live, &desired) {
                return Ok(SyncOutcome::Unchanged);
            }
            desired.meta_mut().resource_version = live.meta().resource_version.clone();
            api.replace(name, &PostParams::default(), &desired).await?;
            record_event(client, event_namespace, involved, "Updated").await;
            Ok(SyncOutcome::Updated)
        }
        Err(kube::Error::Api(e)) if e.code == 404 => {
            api.create(&PostParams::default(), &desired).await?;
            record_event(client, event_namespace, involved, "Created").await;
            Ok(SyncOutcome::Created)
        }
        Err(e) => Err(Error::KubeError(e)),
    }
}

/// Create the object if absent; a present object is left untouched.
/// This is the path for supporting resources that are immutable once
/// created and must never be reconciled back to a template.
pub async fn ensure_present<K>(
    client: &Client,
    api: &Api<K>,
    event_namespace: &str,
    name: &str,
    desired: K,
) -> Result<SyncOutcome>
where
    K: Resource<DynamicType = ()> + Clone + Debug + Serialize + DeserializeOwned,
{
    match api.get(name).await {
        Ok(_) => Ok(SyncOutcome::Unchanged),
        Err(kube::Error::Api(e)) if e.code == 404 => {
            let involved = desired.object_ref(&());
            api.create(&PostParams::default(), &desired).await?;
            record_event(client, event_namespace, involved, "Created").await;
            Ok(SyncOutcome::Created)
        }
        Err(e) => Err(Error::KubeError(e)),
    }
}

/// Delete the named object; already-absent is a defined outcome, not an
/// error.
pub async fn delete<K>(
    client: &Client,
    api: &Api<K>,
    event_namespace: &str,
    name: &str,
) -> Result<DeleteOutcome>
where
    K: Resource<DynamicType = ()> + Clone + Debug + DeserializeOwned,
{
    match api.get(name).await {
        Ok(live) => {
            let involved = live.object_ref(&());
            match api.delete(name, &DeleteParams::default()).await {
                Ok(_) => {
                    record_event(client, event_namespace, involved, "Deleted").await;
                    Ok(DeleteOutcome::Deleted)
                }
                // lost a race with another deleter; absent is still absent
                Err(kube::Error::Api(e)) if e.code == 404 => Ok(DeleteOutcome::AlreadyAbsent),
                Err(e) => Err(Error::KubeError(e)),
            }
        }
        Err(kube::Error::Api(e)) if e.code == 404 => Ok(DeleteOutcome::AlreadyAbsent),
        Err(e) => Err(Error::KubeError(e)),
    }
}

/// Record an informational Event for a create/update/delete transition.
/// Event delivery is operability, not correctness: failures are logged and
/// swallowed.
async fn record_event(client: &Client, namespace: &str, involved: ObjectReference, reason: &str) {
    let events: Api<Event> = Api::namespaced(client.clone(), namespace);
    let name = involved.name.clone().unwrap_or_default();
    let kind = involved.kind.clone().unwrap_or_default();
    let time = chrono::Utc::now();

    let event = Event {
        metadata: ObjectMeta {
            generate_name: Some(format!("{name}-event-")),
            ..Default::default()
        },
        type_: Some("Normal".to_string()),
        reason: Some(reason.to_string()),
        message: Some(format!("{reason} {kind} {name}")),
        involved_object: involved,
        first_timestamp: Some(Time(time)),
        last_timestamp: Some(Time(time)),
        count: Some(1),
        ..Default::default()
    };

    if let Err(e) = events.create(&PostParams::default(), &event).await {
        warn!("Failed to record {} event for {}: {:?}", reason, name, e);
    }
}
