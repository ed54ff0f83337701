// Copyright (c) 2025 Evoke Authors
// SPDX-License-Identifier: MIT

//! Bridge from resource watch events to the work queue.
//!
//! The event source's only obligation to the core is key derivation: every
//! add/update/delete notification for a watched object collapses into
//! `queue.add(object_key(obj))`. Deduplication, in-flight deferral, and retry
//! policy all live in the queue; the bridge stays stateless.

use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;

use futures::StreamExt;
use kube::runtime::watcher;
use kube::{Api, Resource, ResourceExt};
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::queue::WorkQueue;

/// Stable reconciliation key for a watched object.
///
/// `namespace/name` for namespaced objects, bare `name` otherwise. The same
/// object always yields the same key.
#[must_use]
pub fn object_key<K: ResourceExt>(obj: &K) -> String {
    match obj.namespace() {
        Some(namespace) => format!("{namespace}/{}", obj.name_any()),
        None => obj.name_any(),
    }
}

/// Translate one watcher event into queue adds.
fn enqueue_event<K: ResourceExt>(queue: &Arc<WorkQueue>, event: watcher::Event<K>) {
    match event {
        watcher::Event::Apply(obj) | watcher::Event::InitApply(obj) => {
            queue.add(&object_key(&obj));
        }
        watcher::Event::Delete(obj) => {
            queue.add(&object_key(&obj));
        }
        watcher::Event::Init | watcher::Event::InitDone => {}
    }
}

/// Feed a resource watch into `queue` until `token` is cancelled.
///
/// Watch errors are logged and the underlying watcher re-establishes itself;
/// the informer never terminates on a stream blip.
///
/// # Errors
///
/// Currently only returns `Ok`; the `Result` return keeps the surface
/// uniform with the other long-running tasks the process supervises.
pub async fn run_informer<K>(
    api: Api<K>,
    queue: Arc<WorkQueue>,
    token: CancellationToken,
) -> anyhow::Result<()>
where
    K: Resource + Clone + DeserializeOwned + Debug + Send + 'static,
    K::DynamicType: Hash + Eq + Clone,
{
    let mut stream = watcher(api, watcher::Config::default()).boxed();
    loop {
        let event = tokio::select! {
            () = token.cancelled() => {
                debug!("informer cancelled");
                return Ok(());
            }
            event = stream.next() => event,
        };
        match event {
            Some(Ok(event)) => enqueue_event(&queue, event),
            Some(Err(err)) => warn!(error = %err, "resource watch error, watcher will recover"),
            None => {
                debug!("resource watch stream ended");
                return Ok(());
            }
        }
    }
}

#[cfg(test)]
#[path = "informer_tests.rs"]
mod informer_tests;
