// Copyright (c) 2025 Evoke Authors
// SPDX-License-Identifier: MIT

//! # Evoke - Event-Driven Gateway and Sensor Operator for Kubernetes
//!
//! Evoke is the reconciliation core of an event-driven Kubernetes operator:
//! it watches gateway and sensor objects, translates observed changes into
//! work-queue keys, and drives each key to convergence with bounded,
//! rate-limited retries.
//!
//! ## Overview
//!
//! This library provides:
//!
//! - A deduplicating, rate-limited [work queue](queue) with in-flight tracking
//! - A [retry policy](retry) with capped exponential backoff and a give-up budget
//! - The [controller](controller) worker loop driving domain [reconcilers](reconcile)
//! - Watch-driven [configuration hot-reload](config) filtered by instance identity
//! - Custom Resource Definitions for [gateways and sensors](crd)
//!
//! ## Modules
//!
//! - [`queue`] - Work queue holding reconciliation keys
//! - [`retry`] - Backoff curve and retry budget
//! - [`controller`] - Controller state and worker loop
//! - [`config`] - Active configuration and the resync watcher
//! - [`store`] - External-store trait and the Kubernetes implementation
//! - [`informer`] - Watch-event to queue-key bridge
//! - [`reconcile`] - Domain reconcilers for gateways and sensors
//! - [`crd`] - Custom Resource Definition types
//! - [`metrics`] - Prometheus metrics and the `/metrics` endpoint
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use evoke::config::{ConfigHandle, ControllerConfig};
//! use evoke::controller::{Controller, ControllerIdentity};
//! use evoke::retry::RetryPolicy;
//! use evoke::store::KubeStore;
//! use evoke::reconcile::GatewayReconciler;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let client = kube::Client::try_default().await?;
//! let config = ConfigHandle::new(ControllerConfig {
//!     namespace: "evoke-system".to_string(),
//!     instance_id: "evoke".to_string(),
//! });
//!
//! let controller = Arc::new(Controller::new(
//!     "gateway-controller",
//!     ControllerIdentity {
//!         namespace: "evoke-system".to_string(),
//!         config_map: "gateway-controller-configmap".to_string(),
//!         instance_id: "evoke".to_string(),
//!     },
//!     config.clone(),
//!     RetryPolicy::default(),
//!     Arc::new(KubeStore::new(client.clone())),
//!     Arc::new(GatewayReconciler::new(client, config)),
//! ));
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod constants;
pub mod controller;
pub mod crd;
pub mod errors;
pub mod informer;
pub mod metrics;
pub mod queue;
pub mod reconcile;
pub mod retry;
pub mod store;

#[cfg(test)]
pub(crate) mod testutil;
