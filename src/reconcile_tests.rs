// Copyright (c) 2025 Evoke Authors
// SPDX-License-Identifier: MIT

//! Unit tests for `reconcile.rs`

#[cfg(test)]
mod tests {
    use super::super::{instance_matches, split_key};
    use crate::constants::INSTANCE_ID_ANNOTATION;
    use std::collections::BTreeMap;

    fn annotations(instance_id: &str) -> BTreeMap<String, String> {
        let mut annotations = BTreeMap::new();
        annotations.insert(INSTANCE_ID_ANNOTATION.to_string(), instance_id.to_string());
        annotations
    }

    /// Test key splitting for namespaced and cluster-scoped keys
    #[test]
    fn test_split_key() {
        assert_eq!(split_key("default/webhook-gw"), (Some("default"), "webhook-gw"));
        assert_eq!(split_key("cluster-wide"), (None, "cluster-wide"));
        // Only the first separator splits; the rest belongs to the name.
        assert_eq!(split_key("ns/a/b"), (Some("ns"), "a/b"));
    }

    /// Test that an empty active instance id manages everything
    #[test]
    fn test_empty_instance_matches_all() {
        assert!(instance_matches(&BTreeMap::new(), ""));
        assert!(instance_matches(&annotations("someone-else"), ""));
    }

    /// Test the annotation match against the active instance id
    #[test]
    fn test_instance_annotation_match() {
        assert!(instance_matches(&annotations("evoke"), "evoke"));
        assert!(!instance_matches(&annotations("someone-else"), "evoke"));
    }

    /// Test that an object without the annotation is not matched
    #[test]
    fn test_missing_annotation_does_not_match() {
        assert!(!instance_matches(&BTreeMap::new(), "evoke"));
    }
}
