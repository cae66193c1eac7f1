//! chartmq worker - the broker facing half of the orchestrator
//!
//! - [`topology`]: exchanges, queues and bindings declared at startup
//! - [`messages`]: wire payloads for install requests, results and repository events
//! - [`dispatcher`]: turns a raw delivery into a handler call and a settlement decision
//! - [`consumer`]: one consumption loop per queue, acknowledging after processing
//! - [`publisher`]: install results back onto the result queue
//! - [`reconcile`]: re-registers stored repositories before consumption starts
//! - [`worker`]: connects everything to a running broker

pub mod consumer;
pub mod dispatcher;
pub mod error;
pub mod messages;
pub mod publisher;
pub mod reconcile;
pub mod topology;
pub mod worker;

pub use dispatcher::{Disposition, Dispatcher};
pub use error::{Result, WorkerError};
pub use messages::{InstallMessage, InstallResult, UpgradeRequest};
pub use publisher::{AmqpResultPublisher, RecordingPublisher, ResultPublisher};
pub use reconcile::{ReconcileReport, StartupReconciler};
pub use topology::{QueueKind, QueueNames, TopologyReport};
pub use worker::{Worker, WorkerSettings};
