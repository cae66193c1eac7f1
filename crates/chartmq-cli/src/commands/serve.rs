//! Run the worker: reconcile, then consume and serve HTTP until signalled

use chartmq_kube::{HelmCli, PackageManager};
use chartmq_repo::RepositoryStore;
use chartmq_worker::{StartupReconciler, Worker};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;

use super::{codec, open_store};
use crate::config::Settings;
use crate::error::{CliError, Result};
use crate::http::{self, AppState};

pub async fn run(settings: &Settings) -> Result<()> {
    let codec = codec(settings);
    let store: Arc<dyn RepositoryStore> = Arc::new(open_store(settings)?);
    let manager: Arc<dyn PackageManager> = Arc::new(HelmCli::new(settings.helm.clone()));

    let report = StartupReconciler::new(Arc::clone(&store), codec.clone(), Arc::clone(&manager))
        .run()
        .await;
    if !report.is_clean() {
        tracing::warn!(
            skipped = report.skipped.len(),
            store_error = report.store_error.as_deref().unwrap_or(""),
            "startup reconciliation incomplete"
        );
    }

    let (tx, rx) = watch::channel(false);
    let shutdown = Arc::new(tx);
    tokio::spawn({
        let shutdown = Arc::clone(&shutdown);
        async move {
            wait_for_signal().await;
            tracing::info!("shutdown requested");
            shutdown.send_replace(true);
        }
    });

    let server = if settings.server.enabled {
        let address = settings.server.address();
        let listener = TcpListener::bind(&address).await?;
        tracing::info!(address = %address, "http server listening");

        let app = http::router(AppState::new(Arc::clone(&manager)));
        let mut stop = rx.clone();
        Some(tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = stop.wait_for(|stopping| *stopping).await;
                })
                .await
        }))
    } else {
        None
    };

    let worker = Worker::new(
        settings.broker.worker_settings(),
        manager,
        store,
        codec,
        settings.helm.work_dir.clone(),
    );
    let result = worker.run(rx).await;
    shutdown.send_replace(true);

    if let Some(server) = server {
        match server.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::error!(error = %e, "http server failed"),
            Err(e) => tracing::error!(error = %e, "http server task failed"),
        }
    }

    result.map_err(CliError::from)
}

async fn wait_for_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "cannot listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
