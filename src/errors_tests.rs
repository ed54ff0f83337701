// Copyright (c) 2025 Evoke Authors
// SPDX-License-Identifier: MIT

//! Unit tests for `errors.rs`

#[cfg(test)]
mod tests {
    use super::super::ControllerError;
    use crate::constants::CONTROLLER_CONFIG_MAP_KEY;

    /// Test the terminal error's exact display text
    #[test]
    fn test_exceeded_max_requeues_display() {
        let err = ControllerError::ExceededMaxRequeues;
        assert_eq!(err.to_string(), "exceeded max requeues");
    }

    /// Test the missing-key error names the ConfigMap and the key
    #[test]
    fn test_config_key_missing_display() {
        let err = ControllerError::ConfigKeyMissing {
            name: "gateway-controller-configmap".to_string(),
            key: CONTROLLER_CONFIG_MAP_KEY,
        };
        let message = err.to_string();
        assert!(message.contains("gateway-controller-configmap"));
        assert!(message.contains(CONTROLLER_CONFIG_MAP_KEY));
    }

    /// Test that YAML parse errors convert into ConfigParse
    #[test]
    fn test_config_parse_from_yaml_error() {
        let yaml_err =
            serde_yaml::from_str::<crate::config::ControllerConfig>("not-a-mapping").unwrap_err();
        let err = ControllerError::from(yaml_err);
        assert!(matches!(err, ControllerError::ConfigParse(_)));
        assert!(err.to_string().contains("failed to parse"));
    }
}
