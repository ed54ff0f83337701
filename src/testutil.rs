// Copyright (c) 2025 Evoke Authors
// SPDX-License-Identifier: MIT

//! Shared fakes for unit tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use futures::StreamExt;
use tokio::sync::mpsc;

use crate::store::{ConfigMapData, ConfigMapEvent, ConfigMapEventStream, ConfigMapStore};

/// In-memory [`ConfigMapStore`] with scripted watch streams.
///
/// Each `watch_config_map` call hands back a fresh channel-backed stream and
/// stores the sender so the test can push events or end the stream by
/// dropping it.
#[derive(Default)]
pub(crate) struct FakeStore {
    data: Mutex<Option<ConfigMapData>>,
    senders: Mutex<VecDeque<mpsc::UnboundedSender<anyhow::Result<ConfigMapEvent>>>>,
    opened: AtomicUsize,
    fail_watch: AtomicBool,
}

impl FakeStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Set the data returned by `get_config_map`.
    pub(crate) fn set_data(&self, data: Option<ConfigMapData>) {
        *self.data.lock().unwrap() = data;
    }

    /// Make every subsequent `watch_config_map` call fail.
    pub(crate) fn fail_watches(&self, fail: bool) {
        self.fail_watch.store(fail, Ordering::SeqCst);
    }

    /// Number of watch streams handed out so far, including closed ones.
    pub(crate) fn watches_opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    /// Push an event into the most recently opened watch stream.
    pub(crate) fn push_event(&self, event: anyhow::Result<ConfigMapEvent>) {
        let senders = self.senders.lock().unwrap();
        senders
            .back()
            .expect("no watch stream open")
            .send(event)
            .expect("watch stream receiver dropped");
    }

    /// Close the most recent watch stream, simulating a server-side timeout.
    pub(crate) fn close_current_watch(&self) {
        let sender = self
            .senders
            .lock()
            .unwrap()
            .pop_back()
            .expect("no watch stream open");
        drop(sender);
    }
}

#[async_trait]
impl ConfigMapStore for FakeStore {
    async fn get_config_map(
        &self,
        _namespace: &str,
        _name: &str,
    ) -> anyhow::Result<Option<ConfigMapData>> {
        Ok(self.data.lock().unwrap().clone())
    }

    async fn watch_config_map(
        &self,
        _namespace: &str,
        _name: &str,
    ) -> anyhow::Result<ConfigMapEventStream> {
        if self.fail_watch.load(Ordering::SeqCst) {
            anyhow::bail!("watch refused by fake store");
        }
        let (tx, rx) = mpsc::unbounded_channel();
        self.senders.lock().unwrap().push_back(tx);
        self.opened.fetch_add(1, Ordering::SeqCst);
        let stream = futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|event| (event, rx))
        });
        Ok(stream.boxed())
    }
}

/// Build a ConfigMap data section holding the given payload under the
/// well-known controller-config key.
pub(crate) fn config_data(payload: &str) -> ConfigMapData {
    let mut data = ConfigMapData::new();
    data.insert(
        crate::constants::CONTROLLER_CONFIG_MAP_KEY.to_string(),
        payload.to_string(),
    );
    data
}
