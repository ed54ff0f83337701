// Copyright (c) 2025 Evoke Authors
// SPDX-License-Identifier: MIT

//! Global constants for the Evoke operator.
//!
//! This module contains all numeric and string constants used throughout the codebase.
//! Constants are organized by category for easy maintenance.

// ============================================================================
// API Constants
// ============================================================================

/// API group for all Evoke CRDs
pub const API_GROUP: &str = "evoke.dev";

/// API version for all Evoke CRDs
pub const API_VERSION: &str = "v1alpha1";

/// Fully qualified API version (group/version)
pub const API_GROUP_VERSION: &str = "evoke.dev/v1alpha1";

/// Kind name for `Gateway` resource
pub const KIND_GATEWAY: &str = "Gateway";

/// Kind name for `Sensor` resource
pub const KIND_SENSOR: &str = "Sensor";

/// Annotation carrying the instance id a gateway or sensor is managed by
pub const INSTANCE_ID_ANNOTATION: &str = "evoke.dev/instance-id";

// ============================================================================
// Controller Configuration Constants
// ============================================================================

/// Default namespace the controllers and their ConfigMaps live in
pub const DEFAULT_CONTROLLER_NAMESPACE: &str = "evoke-system";

/// Default name of the gateway-controller ConfigMap
pub const DEFAULT_GATEWAY_CONFIG_MAP: &str = "gateway-controller-configmap";

/// Default name of the sensor-controller ConfigMap
pub const DEFAULT_SENSOR_CONFIG_MAP: &str = "sensor-controller-configmap";

/// Well-known ConfigMap data key holding the controller configuration payload
pub const CONTROLLER_CONFIG_MAP_KEY: &str = "controller-config";

/// Default instance id for a controller process
pub const DEFAULT_INSTANCE_ID: &str = "evoke";

/// Delay before re-establishing a closed configuration watch (1 second)
pub const WATCH_RECONNECT_DELAY_SECS: u64 = 1;

// ============================================================================
// Work Queue & Retry Constants
// ============================================================================

/// Maximum number of rate-limited requeues before a key is dropped
pub const MAX_RECONCILE_REQUEUES: u32 = 20;

/// Base delay for the per-key exponential backoff (5 milliseconds)
pub const RETRY_BASE_DELAY_MILLIS: u64 = 5;

/// Cap on the per-key exponential backoff (1000 seconds)
pub const RETRY_MAX_DELAY_SECS: u64 = 1000;

/// Default number of concurrent workers per controller
pub const DEFAULT_WORKER_COUNT: usize = 1;

// ============================================================================
// Runtime Constants
// ============================================================================

/// Number of worker threads for Tokio runtime
pub const TOKIO_WORKER_THREADS: usize = 4;

// ============================================================================
// Metrics Server Constants
// ============================================================================

/// Port for Prometheus metrics HTTP server
pub const METRICS_SERVER_PORT: u16 = 8080;

/// Path for Prometheus metrics endpoint
pub const METRICS_SERVER_PATH: &str = "/metrics";

/// Bind address for metrics HTTP server
pub const METRICS_SERVER_BIND_ADDRESS: &str = "0.0.0.0";
