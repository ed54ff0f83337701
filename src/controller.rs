// Copyright (c) 2025 Evoke Authors
// SPDX-License-Identifier: MIT

//! Controller state and the work-queue consumer loop.
//!
//! A [`Controller`] ties together one immutable [`ControllerIdentity`], the
//! live configuration slot, a [`WorkQueue`], the external store client, and
//! the domain [`Reconciler`]. Any number of identical workers may run
//! [`Controller::process_next_item`] concurrently; the queue's in-flight
//! tracking is what makes that safe, the loop itself holds no mutable state.

use std::sync::Arc;
use std::time::Instant;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::ConfigHandle;
use crate::errors::ControllerError;
use crate::metrics;
use crate::queue::WorkQueue;
use crate::reconcile::Reconciler;
use crate::retry::RetryPolicy;
use crate::store::ConfigMapStore;

/// Immutable identity of one controller process.
///
/// Locates the controller's ConfigMap and filters incoming configuration
/// updates; fixed for the process lifetime.
#[derive(Clone, Debug)]
pub struct ControllerIdentity {
    /// Namespace the controller and its ConfigMap live in
    pub namespace: String,
    /// Name of the controller's ConfigMap
    pub config_map: String,
    /// Instance id configuration updates must target to be applied
    pub instance_id: String,
}

/// One event-driven controller: queue, workers, and live configuration.
pub struct Controller {
    name: String,
    identity: ControllerIdentity,
    config: ConfigHandle,
    queue: Arc<WorkQueue>,
    store: Arc<dyn ConfigMapStore>,
    reconciler: Arc<dyn Reconciler>,
}

impl Controller {
    /// Assemble a controller.
    ///
    /// # Arguments
    /// * `name` - Short name used in logs and metric labels (e.g. `gateway-controller`)
    /// * `identity` - Immutable identity; locates and filters configuration
    /// * `config` - Shared active-configuration slot (clone it into reconcilers)
    /// * `policy` - Retry policy applied to failing keys
    /// * `store` - External store client for the configuration watcher
    /// * `reconciler` - Domain callback invoked per dequeued key
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        identity: ControllerIdentity,
        config: ConfigHandle,
        policy: RetryPolicy,
        store: Arc<dyn ConfigMapStore>,
        reconciler: Arc<dyn Reconciler>,
    ) -> Self {
        Self {
            name: name.into(),
            identity,
            config,
            queue: WorkQueue::new(policy),
            store,
            reconciler,
        }
    }

    /// Short name used in logs and metric labels.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The controller's immutable identity.
    #[must_use]
    pub fn identity(&self) -> &ControllerIdentity {
        &self.identity
    }

    /// The shared active-configuration slot.
    #[must_use]
    pub fn config_handle(&self) -> &ConfigHandle {
        &self.config
    }

    /// The controller's work queue; producers clone the [`Arc`].
    #[must_use]
    pub fn queue(&self) -> &Arc<WorkQueue> {
        &self.queue
    }

    /// The external store client.
    #[must_use]
    pub(crate) fn store(&self) -> &Arc<dyn ConfigMapStore> {
        &self.store
    }

    /// Apply the retry policy to a reconciliation outcome.
    ///
    /// Success clears the key's failure count. A failure with budget left is
    /// re-added with backoff and reported as `Ok`, recovering locally. A
    /// failure past the budget clears the key's retry state and returns
    /// [`ControllerError::ExceededMaxRequeues`]; the key will not be retried
    /// unless re-observed as a fresh event.
    ///
    /// # Errors
    ///
    /// Returns the terminal `exceeded max requeues` error once the key's
    /// retry budget is consumed.
    pub fn handle_err(
        &self,
        result: anyhow::Result<()>,
        key: &str,
    ) -> Result<(), ControllerError> {
        let Err(err) = result else {
            self.queue.forget(key);
            return Ok(());
        };

        let requeues = self.queue.num_requeues(key);
        if !self.queue.policy().retries_exhausted(requeues) {
            warn!(
                controller = %self.name,
                key,
                requeues,
                error = %err,
                "reconciliation failed, requeueing with backoff"
            );
            self.queue.add_rate_limited(key);
            return Ok(());
        }

        self.queue.forget(key);
        Err(ControllerError::ExceededMaxRequeues)
    }

    /// Pull one key, reconcile it, and apply the retry policy.
    ///
    /// Returns `false` when the queue reports shutdown, the worker's only
    /// termination path.
    pub async fn process_next_item(&self) -> bool {
        let Some(key) = self.queue.get().await else {
            return false;
        };
        metrics::set_queue_depth(&self.name, self.queue.len());

        let started = Instant::now();
        let result = self.reconciler.reconcile(&key).await;
        let failed = result.is_err();

        match self.handle_err(result, &key) {
            Ok(()) if failed => metrics::record_requeue(&self.name),
            Ok(()) => metrics::record_reconciliation_success(&self.name, started.elapsed()),
            Err(err) => {
                error!(controller = %self.name, key, error = %err, "giving up on key");
                metrics::record_reconciliation_error(&self.name, started.elapsed());
                metrics::record_dropped_key(&self.name);
            }
        }

        self.queue.done(&key);
        true
    }

    /// Spawn `count` identical workers draining this controller's queue.
    fn spawn_workers(self: &Arc<Self>, count: usize) -> Vec<JoinHandle<()>> {
        (0..count)
            .map(|worker| {
                let controller = Arc::clone(self);
                tokio::spawn(async move {
                    debug!(controller = %controller.name, worker, "worker started");
                    while controller.process_next_item().await {}
                    debug!(controller = %controller.name, worker, "worker stopped");
                })
            })
            .collect()
    }

    /// Run the controller until `token` is cancelled.
    ///
    /// Performs an initial configuration resync (fail-soft), starts the
    /// configuration watcher and `workers` queue consumers, then drains
    /// everything on cancellation: the queue is shut down cooperatively and
    /// in-flight reconciliations finish before workers exit.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration watcher fails before
    /// cancellation (e.g. the initial watch cannot be created).
    pub async fn run(
        self: &Arc<Self>,
        workers: usize,
        token: CancellationToken,
    ) -> anyhow::Result<()> {
        info!(
            controller = %self.name,
            namespace = %self.identity.namespace,
            config_map = %self.identity.config_map,
            instance_id = %self.identity.instance_id,
            workers,
            "starting controller"
        );

        if let Err(err) = self.resync_config().await {
            warn!(
                controller = %self.name,
                error = %err,
                "initial configuration resync failed, keeping bootstrap configuration"
            );
        }

        let mut watcher = {
            let controller = Arc::clone(self);
            let token = token.clone();
            tokio::spawn(async move { controller.watch_controller_config_map(token).await })
        };
        let worker_handles = self.spawn_workers(workers);

        let watch_result = tokio::select! {
            () = token.cancelled() => None,
            result = &mut watcher => Some(result),
        };

        self.queue.shut_down();
        for (worker, handle) in worker_handles.into_iter().enumerate() {
            if let Err(err) = handle.await {
                warn!(controller = %self.name, worker, error = %err, "worker task failed");
            }
        }

        match watch_result {
            None => {
                match watcher.await {
                    Ok(Ok(())) => {}
                    Ok(Err(err)) => warn!(
                        controller = %self.name,
                        error = %err,
                        "configuration watch ended with error during shutdown"
                    ),
                    Err(err) => warn!(
                        controller = %self.name,
                        error = %err,
                        "configuration watch task failed"
                    ),
                }
                info!(controller = %self.name, "controller stopped");
                Ok(())
            }
            Some(Ok(Ok(()))) => {
                anyhow::bail!("configuration watch exited unexpectedly")
            }
            Some(Ok(Err(err))) => Err(err),
            Some(Err(join_err)) => Err(join_err.into()),
        }
    }
}

#[cfg(test)]
#[path = "controller_tests.rs"]
mod controller_tests;
