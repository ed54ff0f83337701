// Copyright (c) 2025 Evoke Authors
// SPDX-License-Identifier: MIT

//! External-store access for controller ConfigMaps.
//!
//! The configuration watcher talks to the cluster through the
//! [`ConfigMapStore`] trait so tests can substitute an in-memory fake. The
//! production implementation, [`KubeStore`], wraps a [`kube::Client`] and a
//! field-selector watch on the single named ConfigMap.

use std::collections::BTreeMap;

use anyhow::anyhow;
use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use k8s_openapi::api::core::v1::ConfigMap;
use kube::api::WatchParams;
use kube::core::WatchEvent;
use kube::{Api, Client};

/// The `data` section of a ConfigMap.
pub type ConfigMapData = BTreeMap<String, String>;

/// One event from a ConfigMap watch stream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConfigMapEvent {
    /// The object was created or modified; carries its current data.
    Applied(ConfigMapData),
    /// The object was deleted.
    Deleted,
}

/// Stream of watch events for a single ConfigMap.
pub type ConfigMapEventStream = BoxStream<'static, anyhow::Result<ConfigMapEvent>>;

/// Read and watch access to controller ConfigMaps.
///
/// A plain trait seam: the watcher never depends on a concrete client, so a
/// fake with scripted events stands in during tests.
#[async_trait]
pub trait ConfigMapStore: Send + Sync {
    /// Read the data of the named ConfigMap, `None` if it does not exist.
    async fn get_config_map(
        &self,
        namespace: &str,
        name: &str,
    ) -> anyhow::Result<Option<ConfigMapData>>;

    /// Open a watch on the named ConfigMap.
    ///
    /// # Errors
    ///
    /// Watch creation failures are surfaced as an error value, never as an
    /// absent stream.
    async fn watch_config_map(
        &self,
        namespace: &str,
        name: &str,
    ) -> anyhow::Result<ConfigMapEventStream>;
}

/// [`ConfigMapStore`] backed by the Kubernetes API.
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
}

impl KubeStore {
    /// Wrap a Kubernetes client.
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api(&self, namespace: &str) -> Api<ConfigMap> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

#[async_trait]
impl ConfigMapStore for KubeStore {
    async fn get_config_map(
        &self,
        namespace: &str,
        name: &str,
    ) -> anyhow::Result<Option<ConfigMapData>> {
        let config_map = self.api(namespace).get_opt(name).await?;
        Ok(config_map.map(|cm| cm.data.unwrap_or_default()))
    }

    async fn watch_config_map(
        &self,
        namespace: &str,
        name: &str,
    ) -> anyhow::Result<ConfigMapEventStream> {
        let params = WatchParams::default().fields(&format!("metadata.name={name}"));
        let stream = self.api(namespace).watch(&params, "0").await?;

        Ok(stream
            .filter_map(|event| async move {
                match event {
                    Ok(WatchEvent::Added(cm) | WatchEvent::Modified(cm)) => {
                        Some(Ok(ConfigMapEvent::Applied(cm.data.unwrap_or_default())))
                    }
                    Ok(WatchEvent::Deleted(_)) => Some(Ok(ConfigMapEvent::Deleted)),
                    Ok(WatchEvent::Bookmark(_)) => None,
                    Ok(WatchEvent::Error(status)) => Some(Err(anyhow!(
                        "configmap watch error {}: {}",
                        status.code,
                        status.message
                    ))),
                    Err(err) => Some(Err(err.into())),
                }
            })
            .boxed())
    }
}
