// Copyright (c) 2025 Evoke Authors
// SPDX-License-Identifier: MIT

//! Custom Resource Definitions for event infrastructure.
//!
//! This module defines the two resource kinds Evoke manages declaratively:
//!
//! - [`Gateway`] - an event-source process that ingests external events and
//!   publishes them into the cluster
//! - [`Sensor`] - a set of event dependencies and the triggers to fire once
//!   those dependencies resolve
//!
//! Both kinds carry a status subresource with a lifecycle [`ResourcePhase`]
//! written by the reconcilers. Objects may be tagged with the
//! `evoke.dev/instance-id` annotation to pin them to one controller instance.
//!
//! # Example: Defining a Gateway
//!
//! ```rust,no_run
//! use evoke::crd::GatewaySpec;
//!
//! let spec = GatewaySpec {
//!     r#type: "webhook".to_string(),
//!     event_version: Some("1.0".to_string()),
//!     processor_port: Some(9330),
//! };
//! ```

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Lifecycle phase of a managed resource.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum ResourcePhase {
    /// Seen by a controller but not yet operational
    #[default]
    Pending,
    /// Validated and operational
    Active,
    /// Validation or operation failed; see the status message
    Error,
}

/// Specification of an event-source gateway.
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "evoke.dev",
    version = "v1alpha1",
    kind = "Gateway",
    namespaced,
    doc = "Gateway runs an event-source process that ingests events from an external system and publishes them for sensors to consume."
)]
#[kube(status = "GatewayStatus")]
#[serde(rename_all = "camelCase")]
pub struct GatewaySpec {
    /// Event-source type this gateway runs.
    ///
    /// Examples: "webhook", "calendar", "resource", "stream"
    pub r#type: String,

    /// Version of the events the gateway emits.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_version: Option<String>,

    /// Port the gateway's event processor listens on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(range(min = 1, max = 65535))]
    pub processor_port: Option<i32>,
}

/// Status of a [`Gateway`].
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GatewayStatus {
    /// Lifecycle phase
    #[serde(default)]
    pub phase: ResourcePhase,

    /// Human-readable detail for the current phase
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// One event stream a sensor waits on.
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct EventDependency {
    /// Unique name of the dependency within the sensor
    pub name: String,

    /// Name of the gateway that produces the event
    pub gateway_name: String,

    /// Event name within the gateway; defaults to all events
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_name: Option<String>,
}

/// An action fired once a sensor's dependencies resolve.
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Trigger {
    /// Unique name of the trigger within the sensor
    pub name: String,

    /// Free-form parameters passed to the trigger executor
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub parameters: BTreeMap<String, String>,
}

/// Specification of an event-triggered sensor.
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "evoke.dev",
    version = "v1alpha1",
    kind = "Sensor",
    namespaced,
    doc = "Sensor declares event dependencies and the triggers to fire once all dependencies are satisfied."
)]
#[kube(status = "SensorStatus")]
#[serde(rename_all = "camelCase")]
pub struct SensorSpec {
    /// Event streams this sensor waits on; must not be empty
    #[serde(default)]
    pub dependencies: Vec<EventDependency>,

    /// Actions fired once all dependencies resolve; must not be empty
    #[serde(default)]
    pub triggers: Vec<Trigger>,
}

/// Status of a [`Sensor`].
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SensorStatus {
    /// Lifecycle phase
    #[serde(default)]
    pub phase: ResourcePhase,

    /// Human-readable detail for the current phase
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}
