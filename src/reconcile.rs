// Copyright (c) 2025 Evoke Authors
// SPDX-License-Identifier: MIT

//! Domain reconcilers for gateways and sensors.
//!
//! The worker loop treats reconciliation as an opaque callback behind the
//! [`Reconciler`] trait; this module provides the implementations for the two
//! managed resource kinds. Both follow the same shape: resolve the key, skip
//! objects outside the active configuration's namespace scope or tagged for
//! another controller instance, validate the spec, and report a lifecycle
//! phase through the status subresource.

use std::collections::BTreeMap;

use async_trait::async_trait;
use kube::api::{Patch, PatchParams};
use kube::{Api, Client, ResourceExt};
use serde_json::json;
use tracing::{debug, info};

use crate::config::ConfigHandle;
use crate::constants::INSTANCE_ID_ANNOTATION;
use crate::crd::{Gateway, ResourcePhase, Sensor};

/// Domain callback invoked by the worker loop for each dequeued key.
///
/// Implementations must be safe to call from several workers at once for
/// *different* keys; the queue guarantees one key is never processed twice
/// concurrently. Returning an error requeues the key with backoff.
#[async_trait]
pub trait Reconciler: Send + Sync {
    /// Drive the resource identified by `key` toward its desired state.
    async fn reconcile(&self, key: &str) -> anyhow::Result<()>;
}

/// Any `Fn(String) -> Future<Output = Result<()>>` closure is a reconciler.
#[async_trait]
impl<F, Fut> Reconciler for F
where
    F: Fn(String) -> Fut + Send + Sync,
    Fut: std::future::Future<Output = anyhow::Result<()>> + Send,
{
    async fn reconcile(&self, key: &str) -> anyhow::Result<()> {
        (self)(key.to_string()).await
    }
}

/// Split a reconciliation key into `(namespace, name)`.
///
/// Keys for namespaced objects are `namespace/name`; cluster-scoped keys are
/// the bare name.
#[must_use]
pub fn split_key(key: &str) -> (Option<&str>, &str) {
    match key.split_once('/') {
        Some((namespace, name)) => (Some(namespace), name),
        None => (None, key),
    }
}

/// Whether an object's instance-id annotation targets this controller.
///
/// An empty active instance id manages everything; otherwise the object must
/// carry the matching [`INSTANCE_ID_ANNOTATION`].
fn instance_matches(annotations: &BTreeMap<String, String>, instance_id: &str) -> bool {
    if instance_id.is_empty() {
        return true;
    }
    annotations.get(INSTANCE_ID_ANNOTATION).map(String::as_str) == Some(instance_id)
}

/// Patch a resource's status subresource to the given phase.
async fn patch_phase<K>(
    api: &Api<K>,
    name: &str,
    phase: ResourcePhase,
    message: Option<&str>,
) -> anyhow::Result<()>
where
    K: Clone + serde::de::DeserializeOwned + std::fmt::Debug,
{
    let patch = json!({
        "status": {
            "phase": phase,
            "message": message,
        }
    });
    api.patch_status(name, &PatchParams::default(), &Patch::Merge(&patch))
        .await?;
    Ok(())
}

/// Reconciler for [`Gateway`] resources.
pub struct GatewayReconciler {
    client: Client,
    config: ConfigHandle,
}

impl GatewayReconciler {
    /// Create a gateway reconciler sharing the controller's config slot.
    #[must_use]
    pub fn new(client: Client, config: ConfigHandle) -> Self {
        Self { client, config }
    }
}

#[async_trait]
impl Reconciler for GatewayReconciler {
    async fn reconcile(&self, key: &str) -> anyhow::Result<()> {
        let (namespace, name) = split_key(key);
        let Some(namespace) = namespace else {
            anyhow::bail!("gateway key '{key}' has no namespace");
        };

        let config = self.config.snapshot();
        if !config.namespace.is_empty() && config.namespace != namespace {
            debug!(key, scope = %config.namespace, "gateway outside namespace scope, skipping");
            return Ok(());
        }

        let api: Api<Gateway> = Api::namespaced(self.client.clone(), namespace);
        let Some(gateway) = api.get_opt(name).await? else {
            debug!(key, "gateway deleted before reconciliation");
            return Ok(());
        };

        if !instance_matches(gateway.annotations(), &config.instance_id) {
            debug!(key, "gateway managed by another instance, skipping");
            return Ok(());
        }

        let (phase, message) = if gateway.spec.r#type.trim().is_empty() {
            (ResourcePhase::Error, Some("gateway has no event-source type"))
        } else {
            (ResourcePhase::Active, None)
        };

        let current = gateway.status.as_ref().map(|status| status.phase);
        if current != Some(phase) {
            patch_phase(&api, name, phase, message).await?;
            info!(key, phase = ?phase, "gateway phase updated");
        }
        Ok(())
    }
}

/// Reconciler for [`Sensor`] resources.
pub struct SensorReconciler {
    client: Client,
    config: ConfigHandle,
}

impl SensorReconciler {
    /// Create a sensor reconciler sharing the controller's config slot.
    #[must_use]
    pub fn new(client: Client, config: ConfigHandle) -> Self {
        Self { client, config }
    }
}

#[async_trait]
impl Reconciler for SensorReconciler {
    async fn reconcile(&self, key: &str) -> anyhow::Result<()> {
        let (namespace, name) = split_key(key);
        let Some(namespace) = namespace else {
            anyhow::bail!("sensor key '{key}' has no namespace");
        };

        let config = self.config.snapshot();
        if !config.namespace.is_empty() && config.namespace != namespace {
            debug!(key, scope = %config.namespace, "sensor outside namespace scope, skipping");
            return Ok(());
        }

        let api: Api<Sensor> = Api::namespaced(self.client.clone(), namespace);
        let Some(sensor) = api.get_opt(name).await? else {
            debug!(key, "sensor deleted before reconciliation");
            return Ok(());
        };

        if !instance_matches(sensor.annotations(), &config.instance_id) {
            debug!(key, "sensor managed by another instance, skipping");
            return Ok(());
        }

        let (phase, message) = if sensor.spec.dependencies.is_empty() {
            (ResourcePhase::Error, Some("sensor has no event dependencies"))
        } else if sensor.spec.triggers.is_empty() {
            (ResourcePhase::Error, Some("sensor has no triggers"))
        } else {
            (ResourcePhase::Active, None)
        };

        let current = sensor.status.as_ref().map(|status| status.phase);
        if current != Some(phase) {
            patch_phase(&api, name, phase, message).await?;
            info!(key, phase = ?phase, "sensor phase updated");
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "reconcile_tests.rs"]
mod reconcile_tests;
