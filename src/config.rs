// Copyright (c) 2025 Evoke Authors
// SPDX-License-Identifier: MIT

//! Live controller configuration and the watch-driven resync path.
//!
//! Each controller process holds one [`ControllerConfig`] snapshot behind a
//! [`ConfigHandle`]. The configuration watcher is the only writer: it follows
//! the controller's ConfigMap, parses the payload under
//! [`CONTROLLER_CONFIG_MAP_KEY`](crate::constants::CONTROLLER_CONFIG_MAP_KEY),
//! filters updates by instance identity, and replaces the snapshot wholesale.
//! Workers read whatever snapshot is current at call time; a half-applied
//! configuration is never observable.
//!
//! Every failure mode on this path is fail-soft: a malformed or foreign
//! payload is logged and ignored, and the previous configuration stays
//! active.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::constants::{CONTROLLER_CONFIG_MAP_KEY, WATCH_RECONNECT_DELAY_SECS};
use crate::controller::Controller;
use crate::errors::ControllerError;
use crate::metrics;
use crate::store::{ConfigMapData, ConfigMapEvent, ConfigMapEventStream};

/// The active configuration of one controller process.
///
/// Deserialized from the YAML payload stored in the controller's ConfigMap.
/// Unknown fields are ignored; missing fields default to empty, and an empty
/// `namespace` means "no namespace restriction".
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerConfig {
    /// Namespace scope for managed objects; empty clears any restriction.
    #[serde(default)]
    pub namespace: String,

    /// Instance id this configuration targets; empty applies to any instance.
    #[serde(default, rename = "instanceID")]
    pub instance_id: String,
}

/// Shared-read, single-writer slot holding the active configuration.
///
/// Readers take a cloned snapshot; the configuration watcher replaces the
/// value wholesale. Cloning the handle shares the slot.
#[derive(Clone, Default)]
pub struct ConfigHandle {
    inner: Arc<RwLock<ControllerConfig>>,
}

impl ConfigHandle {
    /// Create a handle seeded with a bootstrap configuration.
    #[must_use]
    pub fn new(bootstrap: ControllerConfig) -> Self {
        Self {
            inner: Arc::new(RwLock::new(bootstrap)),
        }
    }

    /// A complete, internally consistent copy of the current configuration.
    #[must_use]
    pub fn snapshot(&self) -> ControllerConfig {
        self.inner.read().unwrap().clone()
    }

    /// Replace the configuration wholesale. Writer-side only.
    pub(crate) fn replace(&self, next: ControllerConfig) {
        *self.inner.write().unwrap() = next;
    }
}

/// Parse a raw configuration payload.
///
/// # Errors
///
/// Returns [`ControllerError::ConfigParse`] when the payload is not valid
/// YAML for [`ControllerConfig`].
pub fn parse_controller_config(raw: &str) -> Result<ControllerConfig, ControllerError> {
    Ok(serde_yaml::from_str(raw)?)
}

/// Connection state of the configuration watch loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum WatchState {
    /// A watch stream is open and events are being consumed.
    Connected,
    /// The stream closed or errored; a new watch is being established.
    Reconnecting,
    /// The cancellation token fired; the loop exits cleanly.
    Cancelled,
}

impl Controller {
    /// Whether a configuration payload targets this controller instance.
    ///
    /// An empty `instanceID` in the payload applies to any instance.
    fn applies_to_instance(&self, incoming: &ControllerConfig) -> bool {
        incoming.instance_id.is_empty() || incoming.instance_id == self.identity().instance_id
    }

    /// Apply the data of the controller's ConfigMap to the active configuration.
    ///
    /// The payload under [`CONTROLLER_CONFIG_MAP_KEY`] is parsed and, if it
    /// targets this instance, installed wholesale: an empty `namespace`
    /// field clears any prior restriction rather than being merged over.
    ///
    /// # Errors
    ///
    /// Returns an error when the data key is missing or the payload does not
    /// parse; the active configuration is left untouched in both cases.
    pub fn update_config(&self, data: &ConfigMapData) -> Result<(), ControllerError> {
        let raw = data
            .get(CONTROLLER_CONFIG_MAP_KEY)
            .ok_or_else(|| ControllerError::ConfigKeyMissing {
                name: self.identity().config_map.clone(),
                key: CONTROLLER_CONFIG_MAP_KEY,
            })?;
        let incoming = parse_controller_config(raw)?;

        if !self.applies_to_instance(&incoming) {
            debug!(
                controller = self.name(),
                instance_id = %incoming.instance_id,
                "ignoring configuration update for another instance"
            );
            metrics::record_config_resync(self.name(), "ignored");
            return Ok(());
        }

        info!(
            controller = self.name(),
            namespace = %incoming.namespace,
            instance_id = %incoming.instance_id,
            "applying controller configuration"
        );
        self.config_handle().replace(incoming);
        metrics::record_config_resync(self.name(), "applied");
        Ok(())
    }

    /// Re-read the controller's ConfigMap and apply it.
    ///
    /// Used once at startup so the process begins from the stored
    /// configuration rather than only its bootstrap defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the ConfigMap cannot be read, is absent, or its
    /// payload is invalid.
    pub async fn resync_config(&self) -> anyhow::Result<()> {
        let identity = self.identity();
        let data = self
            .store()
            .get_config_map(&identity.namespace, &identity.config_map)
            .await?
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "configmap '{}' not found in namespace '{}'",
                    identity.config_map,
                    identity.namespace
                )
            })?;
        self.update_config(&data)?;
        Ok(())
    }

    /// Open a new watch on the controller's ConfigMap.
    ///
    /// # Errors
    ///
    /// Watch creation failures are surfaced to the caller; this never yields
    /// an absent watcher.
    pub async fn new_config_map_watch(&self) -> anyhow::Result<ConfigMapEventStream> {
        let identity = self.identity();
        self.store()
            .watch_config_map(&identity.namespace, &identity.config_map)
            .await
    }

    /// Keep the active configuration fresh until `token` is cancelled.
    ///
    /// Runs the watch-reconnect state machine: consume events while
    /// connected, re-establish the watch when the server closes the stream,
    /// exit cleanly on cancellation. Parse and validation failures are
    /// logged and skipped; they never terminate the loop.
    ///
    /// # Errors
    ///
    /// Only the initial watch creation is fatal here; the owning process
    /// decides how to react. Re-connection failures later on are retried
    /// after a short delay.
    pub async fn watch_controller_config_map(
        &self,
        token: CancellationToken,
    ) -> anyhow::Result<()> {
        let mut state = WatchState::Reconnecting;
        let mut stream: Option<ConfigMapEventStream> = None;
        let mut first_attempt = true;

        loop {
            match state {
                WatchState::Cancelled => {
                    info!(controller = self.name(), "configuration watch cancelled");
                    return Ok(());
                }
                WatchState::Reconnecting => {
                    let watch = tokio::select! {
                        () = token.cancelled() => {
                            state = WatchState::Cancelled;
                            continue;
                        }
                        watch = self.new_config_map_watch() => watch,
                    };
                    match watch {
                        Ok(established) => {
                            debug!(
                                controller = self.name(),
                                config_map = %self.identity().config_map,
                                "configuration watch established"
                            );
                            first_attempt = false;
                            stream = Some(established);
                            state = WatchState::Connected;
                        }
                        Err(err) if first_attempt => return Err(err),
                        Err(err) => {
                            warn!(
                                controller = self.name(),
                                error = %err,
                                "failed to re-establish configuration watch"
                            );
                            tokio::select! {
                                () = token.cancelled() => state = WatchState::Cancelled,
                                () = tokio::time::sleep(Duration::from_secs(
                                    WATCH_RECONNECT_DELAY_SECS,
                                )) => {}
                            }
                        }
                    }
                }
                WatchState::Connected => {
                    let Some(active) = stream.as_mut() else {
                        state = WatchState::Reconnecting;
                        continue;
                    };
                    state = self.consume_watch(active, &token).await;
                    stream = None;
                }
            }
        }
    }

    /// Consume one watch stream until it ends, errors, or `token` fires.
    async fn consume_watch(
        &self,
        stream: &mut ConfigMapEventStream,
        token: &CancellationToken,
    ) -> WatchState {
        loop {
            let event = tokio::select! {
                () = token.cancelled() => return WatchState::Cancelled,
                event = stream.next() => event,
            };
            match event {
                Some(Ok(ConfigMapEvent::Applied(data))) => {
                    if let Err(err) = self.update_config(&data) {
                        warn!(
                            controller = self.name(),
                            error = %err,
                            "ignoring invalid configuration update"
                        );
                        metrics::record_config_resync(self.name(), "error");
                    }
                }
                Some(Ok(ConfigMapEvent::Deleted)) => {
                    debug!(
                        controller = self.name(),
                        "configuration object deleted, keeping last applied configuration"
                    );
                }
                Some(Err(err)) => {
                    warn!(
                        controller = self.name(),
                        error = %err,
                        "configuration watch stream error, reconnecting"
                    );
                    return WatchState::Reconnecting;
                }
                None => {
                    debug!(
                        controller = self.name(),
                        "configuration watch stream closed, reconnecting"
                    );
                    return WatchState::Reconnecting;
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod config_tests;
