//! chartmq kube - release orchestration against remote clusters
//!
//! This crate provides:
//! - **Package manager contract**: [`PackageManager`] with a helm v3 driver ([`HelmCli`])
//!   and an in-memory double ([`MockPackageManager`])
//! - **Cluster sessions**: per-request scratch directories holding the generated
//!   kubeconfig and values file, removed on drop
//! - **Chart resolution**: informal chart names to canonical `repo/chart` references
//! - **Release orchestration**: the install / upgrade / rollback state machine

pub mod actions;
pub mod error;
pub mod helm;
pub mod kubeconfig;
pub mod manager;
pub mod mock;
pub mod orchestrator;
pub mod release;
pub mod resolver;
pub mod session;

pub use actions::{InstallOptions, RollbackOptions, UpgradeOptions};
pub use error::{KubeError, Result};
pub use helm::{HelmCli, HelmConfig};
pub use kubeconfig::ClusterTarget;
pub use manager::{ChartMatch, PackageManager};
pub use mock::{MockPackageManager, OperationCounts};
pub use orchestrator::{DeployOutcome, DeployRequest, ReleaseOrchestrator, ReleasePhase};
pub use release::{ReleaseRevision, ReleaseStatus};
pub use resolver::{ANY_VERSION, ChartReference, ChartResolver};
pub use session::ClusterSession;
