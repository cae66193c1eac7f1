//! Message dispatch
//!
//! The dispatcher owns the handlers for every queue and decides how a
//! delivery is settled. It knows nothing about the broker connection, so the
//! handlers run the same way under a live consumer and in tests.

use chartmq_core::CredentialCodec;
use chartmq_kube::{KubeError, PackageManager, ReleaseOrchestrator};
use chartmq_repo::{RepositoryEntry, RepositoryStore};
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::Result;
use crate::messages::{self, InstallMessage, InstallResult};
use crate::publisher::ResultPublisher;
use crate::topology::QueueKind;

/// How a delivery is settled with the broker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Processed, successfully or with a handled failure
    Ack,
    /// Unusable payload, dropped without requeue
    Reject,
    /// Processing could not complete, redeliver
    Requeue,
}

/// Routes deliveries to their handlers
pub struct Dispatcher {
    manager: Arc<dyn PackageManager>,
    store: Arc<dyn RepositoryStore>,
    codec: CredentialCodec,
    orchestrator: ReleaseOrchestrator,
    publisher: Arc<dyn ResultPublisher>,
}

impl Dispatcher {
    pub fn new(
        manager: Arc<dyn PackageManager>,
        store: Arc<dyn RepositoryStore>,
        codec: CredentialCodec,
        publisher: Arc<dyn ResultPublisher>,
        work_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            orchestrator: ReleaseOrchestrator::new(Arc::clone(&manager), work_dir),
            manager,
            store,
            codec,
            publisher,
        }
    }

    /// Handle one delivery and decide how to settle it
    pub async fn dispatch(&self, kind: QueueKind, body: &[u8]) -> Disposition {
        let handled = match kind {
            QueueKind::Install => self.handle_install(body).await.map(|_| ()),
            QueueKind::AddRepository => self.handle_add_repository(body).await,
            QueueKind::DeleteRepository => self.handle_delete_repository(body).await,
            QueueKind::UpdateRepository => self.handle_update_repositories().await,
        };

        match handled {
            Ok(()) => Disposition::Ack,
            Err(e) if e.is_protocol() => {
                tracing::warn!(queue = %kind, error = %e, "discarding message");
                Disposition::Reject
            }
            Err(e) => {
                tracing::error!(queue = %kind, error = %e, "message processing failed, requeueing");
                Disposition::Requeue
            }
        }
    }

    /// Run an install request and publish its result
    ///
    /// Exactly one result is published per call, including for bodies that do
    /// not parse. Only a publish failure is returned as an error.
    pub async fn handle_install(&self, body: &[u8]) -> Result<InstallResult> {
        let result = match InstallMessage::parse(body) {
            Ok(message) => {
                let deployment_id = message.deployment_id;
                let request = message.into_request();
                tracing::info!(
                    deployment_id,
                    release = %request.release,
                    chart = %request.chart,
                    "install request received"
                );
                let outcome = self.orchestrator.run(&request).await;
                InstallResult::from_outcome(deployment_id, &outcome)
            }
            Err(e) => {
                let deployment_id = messages::salvage_deployment_id(body);
                tracing::warn!(deployment_id, error = %e, "malformed install request");
                InstallResult::failure(deployment_id, e.to_string())
            }
        };

        self.publisher.publish(&result).await?;
        Ok(result)
    }

    /// Store a repository and register it with the package manager
    pub async fn handle_add_repository(&self, body: &[u8]) -> Result<()> {
        let spec = messages::parse_repository(body)?;
        let entry = RepositoryEntry::seal(&spec, &self.codec)?;
        self.store.upsert(&entry).await?;

        match self.manager.register_repository(&spec).await {
            Ok(()) => tracing::info!(repository = %spec.name, url = %spec.url, "repository added"),
            Err(e) => tracing::error!(
                repository = %spec.name,
                error = %e,
                "repository stored but registration failed"
            ),
        }
        Ok(())
    }

    /// Forget a repository in the package manager and the store
    pub async fn handle_delete_repository(&self, body: &[u8]) -> Result<()> {
        let name = messages::parse_delete(body)?;

        match self.manager.remove_repository(&name).await {
            Ok(()) => {}
            Err(e @ KubeError::RepositoryNotFound { .. }) => {
                tracing::warn!(repository = %name, error = %e, "repository was not registered")
            }
            Err(e) => tracing::error!(repository = %name, error = %e, "repository removal failed"),
        }

        let removed = self.store.delete(&name).await?;
        tracing::info!(repository = %name, stored = removed, "repository deleted");
        Ok(())
    }

    /// Refresh every repository index
    pub async fn handle_update_repositories(&self) -> Result<()> {
        match self.manager.update_repositories().await {
            Ok(()) => tracing::info!("repository indexes updated"),
            Err(e) => tracing::error!(error = %e, "repository update failed"),
        }
        Ok(())
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher").finish_non_exhaustive()
    }
}
