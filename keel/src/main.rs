#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

mod args;

use args::Args;
use clap::Parser;
use keel_config::Config;
use keel_jobs::TaskRegistry;
use keel_server::Server;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = Config::load(&args.config)?;

    let telemetry = keel_telemetry::init(&config.telemetry, &config.server.environment, args.log_filter.as_deref())?;
    keel_server::install_panic_hook();

    tracing::info!(
        config_path = %args.config.display(),
        environment = %config.server.environment,
        tracing_enabled = telemetry.tracing_enabled(),
        "starting keel"
    );

    let registry = TaskRegistry::new();
    let task_types = registry.task_types().map(str::to_owned).collect::<Vec<_>>();
    let (jobs, workers) = keel_jobs::channel(&config.jobs, registry);
    tracing::info!(
        queues = ?jobs.queues().collect::<Vec<_>>(),
        task_types = ?task_types,
        "job workers configured"
    );

    let mut server = Server::new(&config, jobs)?;
    if let Some(listen) = args.listen {
        server = server.with_listen_address(listen);
    }
    let database = server.state().database.clone();

    let shutdown = CancellationToken::new();
    let workers = workers.start(shutdown.child_token());

    let signal = shutdown.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        signal.cancel();
    });

    let served = server.serve(shutdown.clone()).await;

    // stop workers even when the listener failed
    shutdown.cancel();
    workers.join().await;
    database.close().await;

    if let Err(e) = telemetry.force_flush() {
        tracing::warn!(error = %e, "failed to flush telemetry");
    }

    served?;
    tracing::info!("keel stopped");
    Ok(())
}

/// Wait for a shutdown signal (`SIGINT` or `SIGTERM`)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }

    tracing::info!("shutdown signal received");
}
