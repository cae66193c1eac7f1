//! Startup reconciliation
//!
//! The package manager's repository registry does not survive a restart of
//! the worker host, the store does. Before any consumer starts, every stored
//! repository is decrypted and registered again.

use chartmq_core::CredentialCodec;
use chartmq_kube::PackageManager;
use chartmq_repo::RepositoryStore;
use std::sync::Arc;

/// What a reconciliation pass did
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Repositories registered with the package manager
    pub registered: Vec<String>,
    /// `(repository, reason)` for every entry left out
    pub skipped: Vec<(String, String)>,
    /// Set when the store could not be listed at all
    pub store_error: Option<String>,
}

impl ReconcileReport {
    pub fn is_clean(&self) -> bool {
        self.skipped.is_empty() && self.store_error.is_none()
    }
}

/// Re-registers stored repositories
pub struct StartupReconciler {
    store: Arc<dyn RepositoryStore>,
    codec: CredentialCodec,
    manager: Arc<dyn PackageManager>,
}

impl StartupReconciler {
    pub fn new(
        store: Arc<dyn RepositoryStore>,
        codec: CredentialCodec,
        manager: Arc<dyn PackageManager>,
    ) -> Self {
        Self {
            store,
            codec,
            manager,
        }
    }

    /// Run one pass. Failures are logged and reported, never returned.
    pub async fn run(&self) -> ReconcileReport {
        let mut report = ReconcileReport::default();

        let entries = match self.store.list_all().await {
            Ok(entries) => entries,
            Err(e) => {
                tracing::error!(error = %e, "could not list stored repositories");
                report.store_error = Some(e.to_string());
                return report;
            }
        };

        for entry in entries {
            let spec = match entry.unseal(&self.codec) {
                Ok(spec) => spec,
                Err(e) => {
                    tracing::warn!(repository = %entry.name, error = %e, "skipping repository");
                    report.skipped.push((entry.name, e.to_string()));
                    continue;
                }
            };

            match self.manager.register_repository(&spec).await {
                Ok(()) => {
                    tracing::debug!(repository = %spec.name, "repository registered");
                    report.registered.push(spec.name);
                }
                Err(e) => {
                    tracing::warn!(repository = %spec.name, error = %e, "skipping repository");
                    report.skipped.push((spec.name, e.to_string()));
                }
            }
        }

        tracing::info!(
            registered = report.registered.len(),
            skipped = report.skipped.len(),
            "repositories reconciled"
        );
        report
    }
}
