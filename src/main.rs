// Copyright (c) 2025 Evoke Authors
// SPDX-License-Identifier: MIT

use anyhow::Result;
use clap::Parser;
use evoke::{
    config::{ConfigHandle, ControllerConfig},
    constants::{
        DEFAULT_CONTROLLER_NAMESPACE, DEFAULT_GATEWAY_CONFIG_MAP, DEFAULT_INSTANCE_ID,
        DEFAULT_SENSOR_CONFIG_MAP, DEFAULT_WORKER_COUNT, METRICS_SERVER_PORT,
        TOKIO_WORKER_THREADS,
    },
    controller::{Controller, ControllerIdentity},
    crd::{Gateway, Sensor},
    informer::run_informer,
    metrics,
    reconcile::{GatewayReconciler, SensorReconciler},
    retry::RetryPolicy,
    store::KubeStore,
};
use kube::{Api, Client};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Event-driven gateway and sensor operator for Kubernetes
#[derive(Parser, Debug)]
#[command(name = "evoke", version, about)]
struct Args {
    /// Namespace the controllers watch and where their ConfigMaps live
    #[arg(long, env = "EVOKE_NAMESPACE", default_value = DEFAULT_CONTROLLER_NAMESPACE)]
    namespace: String,

    /// Name of the gateway-controller ConfigMap
    #[arg(long, env = "GATEWAY_CONTROLLER_CONFIG_MAP", default_value = DEFAULT_GATEWAY_CONFIG_MAP)]
    gateway_configmap: String,

    /// Name of the sensor-controller ConfigMap
    #[arg(long, env = "SENSOR_CONTROLLER_CONFIG_MAP", default_value = DEFAULT_SENSOR_CONFIG_MAP)]
    sensor_configmap: String,

    /// Instance id configuration updates and objects must carry for this process
    #[arg(long, env = "EVOKE_INSTANCE_ID", default_value = DEFAULT_INSTANCE_ID)]
    instance_id: String,

    /// Number of concurrent workers per controller
    #[arg(long, env = "EVOKE_WORKERS", default_value_t = DEFAULT_WORKER_COUNT)]
    workers: usize,

    /// Port for the Prometheus metrics endpoint
    #[arg(long, env = "EVOKE_METRICS_PORT", default_value_t = METRICS_SERVER_PORT)]
    metrics_port: u16,
}

fn main() -> Result<()> {
    // Build Tokio runtime with custom thread names
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(TOKIO_WORKER_THREADS)
        .thread_name("evoke-controller")
        .enable_all()
        .build()?;

    runtime.block_on(async_main())
}

async fn async_main() -> Result<()> {
    // Initialize logging with custom format
    // Format: timestamp file:line LEVEL message
    //
    // Respects RUST_LOG environment variable if set, otherwise defaults to INFO level
    // Example: RUST_LOG=debug cargo run
    //
    // Respects RUST_LOG_FORMAT environment variable for output format
    // Example: RUST_LOG_FORMAT=json cargo run
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let log_format = std::env::var("RUST_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    match log_format.to_lowercase().as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .json()
                .init();
        }
        _ => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .with_ansi(true)
                .compact()
                .init();
        }
    }

    let args = Args::parse();

    info!("Starting Evoke operator");
    debug!(namespace = %args.namespace, instance_id = %args.instance_id, "parsed arguments");

    debug!("Initializing Kubernetes client");
    let client = Client::try_default().await?;
    let store = Arc::new(KubeStore::new(client.clone()));

    // Gateway controller
    let gateway_config = ConfigHandle::new(ControllerConfig {
        namespace: args.namespace.clone(),
        instance_id: args.instance_id.clone(),
    });
    let gateway_controller = Arc::new(Controller::new(
        "gateway-controller",
        ControllerIdentity {
            namespace: args.namespace.clone(),
            config_map: args.gateway_configmap.clone(),
            instance_id: args.instance_id.clone(),
        },
        gateway_config.clone(),
        RetryPolicy::default(),
        store.clone(),
        Arc::new(GatewayReconciler::new(client.clone(), gateway_config)),
    ));

    // Sensor controller
    let sensor_config = ConfigHandle::new(ControllerConfig {
        namespace: args.namespace.clone(),
        instance_id: args.instance_id.clone(),
    });
    let sensor_controller = Arc::new(Controller::new(
        "sensor-controller",
        ControllerIdentity {
            namespace: args.namespace.clone(),
            config_map: args.sensor_configmap.clone(),
            instance_id: args.instance_id.clone(),
        },
        sensor_config.clone(),
        RetryPolicy::default(),
        store,
        Arc::new(SensorReconciler::new(client.clone(), sensor_config)),
    ));

    let token = CancellationToken::new();

    let gateway_api: Api<Gateway> = Api::namespaced(client.clone(), &args.namespace);
    let sensor_api: Api<Sensor> = Api::namespaced(client.clone(), &args.namespace);

    let mut gateway_task = {
        let controller = Arc::clone(&gateway_controller);
        let token = token.clone();
        let workers = args.workers;
        tokio::spawn(async move { controller.run(workers, token).await })
    };
    let mut sensor_task = {
        let controller = Arc::clone(&sensor_controller);
        let token = token.clone();
        let workers = args.workers;
        tokio::spawn(async move { controller.run(workers, token).await })
    };
    let mut gateway_informer = tokio::spawn(run_informer(
        gateway_api,
        gateway_controller.queue().clone(),
        token.clone(),
    ));
    let mut sensor_informer = tokio::spawn(run_informer(
        sensor_api,
        sensor_controller.queue().clone(),
        token.clone(),
    ));
    let metrics_task = tokio::spawn(metrics::serve_metrics(args.metrics_port));

    info!("All controllers started");

    // Controllers and informers should never exit on their own - if one
    // does, log it and take the process down after draining the rest.
    tokio::select! {
        () = shutdown_signal() => {
            info!("Shutdown signal received, draining controllers");
        }
        result = &mut gateway_task => {
            error!("CRITICAL: gateway controller exited unexpectedly: {:?}", result);
            token.cancel();
            result??;
            anyhow::bail!("gateway controller exited unexpectedly without error");
        }
        result = &mut sensor_task => {
            error!("CRITICAL: sensor controller exited unexpectedly: {:?}", result);
            token.cancel();
            result??;
            anyhow::bail!("sensor controller exited unexpectedly without error");
        }
        result = &mut gateway_informer => {
            error!("CRITICAL: gateway informer exited unexpectedly: {:?}", result);
            token.cancel();
            result??;
            anyhow::bail!("gateway informer exited unexpectedly without error");
        }
        result = &mut sensor_informer => {
            error!("CRITICAL: sensor informer exited unexpectedly: {:?}", result);
            token.cancel();
            result??;
            anyhow::bail!("sensor informer exited unexpectedly without error");
        }
    }

    token.cancel();
    for (name, task) in [
        ("gateway-controller", gateway_task),
        ("sensor-controller", sensor_task),
        ("gateway-informer", gateway_informer),
        ("sensor-informer", sensor_informer),
    ] {
        match task.await {
            Ok(Ok(())) => debug!(task = name, "task drained"),
            Ok(Err(err)) => warn!(task = name, error = %err, "task ended with error"),
            Err(err) => warn!(task = name, error = %err, "task failed"),
        }
    }
    metrics_task.abort();

    info!("Evoke operator stopped");
    Ok(())
}

/// Resolve on SIGINT or, on Unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(err) => {
                warn!(error = %err, "failed to install SIGTERM handler");
                let _ = ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = ctrl_c.await;
    }
}
