// Copyright (c) 2025 Evoke Authors
// SPDX-License-Identifier: MIT

//! Unit tests for `controller.rs`

#[cfg(test)]
mod tests {
    use super::super::{Controller, ControllerIdentity};
    use crate::config::{ConfigHandle, ControllerConfig};
    use crate::reconcile::Reconciler;
    use crate::retry::RetryPolicy;
    use crate::testutil::FakeStore;
    use std::sync::{Arc, Mutex};

    fn controller_with(reconciler: Arc<dyn Reconciler>) -> Arc<Controller> {
        Arc::new(Controller::new(
            "sensor-controller",
            ControllerIdentity {
                namespace: "evoke-system".to_string(),
                config_map: "sensor-controller-configmap".to_string(),
                instance_id: "evoke".to_string(),
            },
            ConfigHandle::new(ControllerConfig::default()),
            RetryPolicy::default(),
            Arc::new(FakeStore::new()),
            reconciler,
        ))
    }

    fn recording_controller() -> (Arc<Controller>, Arc<Mutex<Vec<String>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let recorder = {
            let seen = seen.clone();
            move |key: String| {
                let seen = seen.clone();
                async move {
                    seen.lock().unwrap().push(key);
                    Ok::<(), anyhow::Error>(())
                }
            }
        };
        (controller_with(Arc::new(recorder)), seen)
    }

    /// Test that a queued item is processed successfully
    #[tokio::test]
    async fn test_process_next_item_succeeds() {
        let (controller, seen) = recording_controller();

        controller.queue().add("hi");
        let processed = controller.process_next_item().await;

        assert!(processed, "item from queue must be processed");
        assert_eq!(seen.lock().unwrap().as_slice(), ["hi"]);
        assert_eq!(controller.queue().num_requeues("hi"), 0);
    }

    /// Test that a shut-down queue stops the worker
    #[tokio::test]
    async fn test_process_next_item_stops_on_shutdown() {
        let (controller, _seen) = recording_controller();

        controller.queue().add("hi");
        assert!(controller.process_next_item().await);

        controller.queue().shut_down();
        assert!(
            !controller.process_next_item().await,
            "queue shutdown must stop the worker"
        );
    }

    /// Test that a nil error resets the failure count and returns Ok
    #[tokio::test(start_paused = true)]
    async fn test_handle_err_nil_resets_failures() {
        let (controller, _seen) = recording_controller();

        controller.queue().add_rate_limited("hi");
        controller.queue().add_rate_limited("hi");
        assert_eq!(controller.queue().num_requeues("hi"), 2);

        let result = controller.handle_err(Ok(()), "hi");
        assert!(result.is_ok());
        assert_eq!(controller.queue().num_requeues("hi"), 0);
    }

    /// Test the terminal error after the retry budget is consumed
    #[tokio::test(start_paused = true)]
    async fn test_handle_err_exceeds_max_requeues() {
        let (controller, _seen) = recording_controller();

        controller.queue().add("bye");
        let mut last = Ok(());
        for _ in 0..21 {
            last = controller.handle_err(Err(anyhow::anyhow!("real error")), "bye");
        }

        let err = last.expect_err("21st failure must be terminal");
        assert_eq!(err.to_string(), "exceeded max requeues");
        assert_eq!(
            controller.queue().num_requeues("bye"),
            0,
            "terminal failure must clear retry state"
        );
    }

    /// Test that failures below the budget are not surfaced
    #[tokio::test(start_paused = true)]
    async fn test_handle_err_below_budget_is_ok() {
        let (controller, _seen) = recording_controller();

        for _ in 0..20 {
            let result = controller.handle_err(Err(anyhow::anyhow!("real error")), "bye");
            assert!(result.is_ok(), "failures within budget recover locally");
        }
        assert_eq!(controller.queue().num_requeues("bye"), 20);
    }

    /// Test that a failing key is backed off and reprocessed
    #[tokio::test(start_paused = true)]
    async fn test_failing_key_is_reprocessed_after_backoff() {
        let attempts = Arc::new(Mutex::new(0u32));
        let flaky = {
            let attempts = attempts.clone();
            move |_key: String| {
                let attempts = attempts.clone();
                async move {
                    let mut attempts = attempts.lock().unwrap();
                    *attempts += 1;
                    if *attempts == 1 {
                        anyhow::bail!("transient failure");
                    }
                    Ok(())
                }
            }
        };
        let controller = controller_with(Arc::new(flaky));

        controller.queue().add("default/flaky");
        assert!(controller.process_next_item().await, "first pass fails");
        assert!(
            controller.process_next_item().await,
            "second pass retries after backoff"
        );

        assert_eq!(*attempts.lock().unwrap(), 2);
        assert_eq!(
            controller.queue().num_requeues("default/flaky"),
            0,
            "success must forget the failure count"
        );
    }

    /// Test that a key past its budget is dropped, not requeued
    #[tokio::test(start_paused = true)]
    async fn test_exhausted_key_is_dropped() {
        let always_fail =
            |_key: String| async move { Err::<(), _>(anyhow::anyhow!("permanent failure")) };
        let controller = controller_with(Arc::new(always_fail));

        controller.queue().add("default/poison");
        // Budget of 20 requeues: 21 passes consume the key entirely.
        for _ in 0..21 {
            assert!(controller.process_next_item().await);
        }

        assert_eq!(controller.queue().len(), 0, "poison key must be dropped");
        assert_eq!(controller.queue().num_requeues("default/poison"), 0);

        controller.queue().shut_down();
        assert!(!controller.process_next_item().await);
    }
}
