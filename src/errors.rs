// Copyright (c) 2025 Evoke Authors
// SPDX-License-Identifier: MIT

//! Typed errors for the reconciliation core.
//!
//! Transient reconciliation failures stay inside the worker loop (logged,
//! requeued with backoff); the variants here are the outcomes that cross a
//! module boundary: giving up on a key, and the configuration-resync failure
//! modes that must leave the active configuration untouched.

use thiserror::Error;

/// Errors surfaced by the controller core.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// A key consumed its whole retry budget and was dropped from the queue.
    ///
    /// The display text is part of the public contract; operators alert on it.
    #[error("exceeded max requeues")]
    ExceededMaxRequeues,

    /// The controller ConfigMap exists but lacks the payload data key.
    #[error("configmap '{name}' does not have key '{key}'")]
    ConfigKeyMissing {
        /// Name of the ConfigMap that was read
        name: String,
        /// The well-known data key that was expected
        key: &'static str,
    },

    /// The configuration payload was present but could not be parsed.
    #[error("failed to parse controller configuration: {0}")]
    ConfigParse(#[from] serde_yaml::Error),
}

#[cfg(test)]
#[path = "errors_tests.rs"]
mod errors_tests;
