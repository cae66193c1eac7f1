//! Broker topology
//!
//! Three fan-out exchanges carry repository events to every replica. Each
//! replica declares its own exclusive queue per exchange, named with a random
//! suffix, so that every replica receives its own copy of a broadcast. Install
//! requests and results travel over two shared queues through the default
//! exchange.
//!
//! Declaration is best effort: a failure is logged and recorded in the
//! [`TopologyReport`], and startup continues.

use lapin::options::{ExchangeDeclareOptions, QueueBindOptions, QueueDeclareOptions};
use lapin::types::FieldTable;
use lapin::{Channel, Connection, ExchangeKind};
use rand::Rng;
use rand::distr::Alphanumeric;

pub const ADD_REPOSITORY_EXCHANGE: &str = "add.repository.fx";
pub const DELETE_REPOSITORY_EXCHANGE: &str = "del.repository.fx";
pub const UPDATE_REPOSITORY_EXCHANGE: &str = "update.repository.fx";

pub const DEFAULT_INSTALL_QUEUE: &str = "InstallQueue";
pub const DEFAULT_RESULT_QUEUE: &str = "ResultInstallQueue";

const ADD_REPOSITORY_QUEUE: &str = "RepositoriesQueue";
const DELETE_REPOSITORY_QUEUE: &str = "DeleteRepoQueue";
const UPDATE_REPOSITORY_QUEUE: &str = "UpdateRepoQueue";

const SUFFIX_LEN: usize = 12;

/// Queues this worker consumes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueueKind {
    Install,
    AddRepository,
    DeleteRepository,
    UpdateRepository,
}

impl QueueKind {
    pub const ALL: [QueueKind; 4] = [
        QueueKind::Install,
        QueueKind::AddRepository,
        QueueKind::DeleteRepository,
        QueueKind::UpdateRepository,
    ];
}

impl std::fmt::Display for QueueKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Install => "install",
            Self::AddRepository => "add-repository",
            Self::DeleteRepository => "delete-repository",
            Self::UpdateRepository => "update-repository",
        };
        f.write_str(name)
    }
}

/// One queue to declare, with its binding if any
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueSpec {
    pub name: String,
    pub exclusive: bool,
    /// Fan-out exchange the queue is bound to with an empty routing key
    pub exchange: Option<&'static str>,
}

/// Queue names for one worker instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueNames {
    pub install: String,
    pub result: String,
    pub add_repository: String,
    pub delete_repository: String,
    pub update_repository: String,
}

impl QueueNames {
    /// Shared queue names plus freshly suffixed broadcast queues
    pub fn generate(install: impl Into<String>, result: impl Into<String>) -> Self {
        Self {
            install: install.into(),
            result: result.into(),
            add_repository: suffixed(ADD_REPOSITORY_QUEUE),
            delete_repository: suffixed(DELETE_REPOSITORY_QUEUE),
            update_repository: suffixed(UPDATE_REPOSITORY_QUEUE),
        }
    }

    /// Queue consumed for `kind`
    pub fn queue_for(&self, kind: QueueKind) -> &str {
        match kind {
            QueueKind::Install => &self.install,
            QueueKind::AddRepository => &self.add_repository,
            QueueKind::DeleteRepository => &self.delete_repository,
            QueueKind::UpdateRepository => &self.update_repository,
        }
    }

    /// Every queue in declaration order
    pub fn specs(&self) -> Vec<QueueSpec> {
        vec![
            QueueSpec {
                name: self.install.clone(),
                exclusive: false,
                exchange: None,
            },
            QueueSpec {
                name: self.result.clone(),
                exclusive: false,
                exchange: None,
            },
            QueueSpec {
                name: self.add_repository.clone(),
                exclusive: true,
                exchange: Some(ADD_REPOSITORY_EXCHANGE),
            },
            QueueSpec {
                name: self.delete_repository.clone(),
                exclusive: true,
                exchange: Some(DELETE_REPOSITORY_EXCHANGE),
            },
            QueueSpec {
                name: self.update_repository.clone(),
                exclusive: true,
                exchange: Some(UPDATE_REPOSITORY_EXCHANGE),
            },
        ]
    }
}

impl Default for QueueNames {
    fn default() -> Self {
        Self::generate(DEFAULT_INSTALL_QUEUE, DEFAULT_RESULT_QUEUE)
    }
}

fn suffixed(base: &str) -> String {
    let suffix: String = rand::rng()
        .sample_iter(&Alphanumeric)
        .take(SUFFIX_LEN)
        .map(char::from)
        .collect();
    format!("{base}{suffix}")
}

/// What went wrong while declaring the topology
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TopologyReport {
    /// `(object, error)` for every failed declaration
    pub failures: Vec<(String, String)>,
}

impl TopologyReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// Whether anything named `object` failed to declare or bind
    pub fn failed(&self, object: &str) -> bool {
        self.failures.iter().any(|(name, _)| name == object)
    }

    fn record(&mut self, object: &str, error: impl std::fmt::Display) {
        tracing::error!(object = %object, error = %error, "failed to declare broker object");
        self.failures.push((object.to_string(), error.to_string()));
    }
}

/// Declare exchanges, queues and bindings
///
/// A failed declaration closes the channel it ran on, so a fresh channel is
/// opened before continuing.
pub async fn declare(connection: &Connection, names: &QueueNames) -> TopologyReport {
    let mut report = TopologyReport::default();
    let mut channel = match connection.create_channel().await {
        Ok(channel) => channel,
        Err(e) => {
            report.record("channel", e);
            return report;
        }
    };

    for exchange in [
        ADD_REPOSITORY_EXCHANGE,
        DELETE_REPOSITORY_EXCHANGE,
        UPDATE_REPOSITORY_EXCHANGE,
    ] {
        let options = ExchangeDeclareOptions {
            durable: false,
            auto_delete: true,
            ..ExchangeDeclareOptions::default()
        };
        let declared = channel
            .exchange_declare(exchange, ExchangeKind::Fanout, options, FieldTable::default())
            .await;
        if let Err(e) = declared {
            report.record(exchange, e);
            channel = match reopen(connection, &mut report).await {
                Some(channel) => channel,
                None => return report,
            };
        }
    }

    for spec in names.specs() {
        if let Err(e) = declare_queue(&channel, &spec).await {
            report.record(&spec.name, e);
            channel = match reopen(connection, &mut report).await {
                Some(channel) => channel,
                None => return report,
            };
            continue;
        }
        tracing::debug!(queue = %spec.name, exclusive = spec.exclusive, "queue declared");
    }

    if let Err(e) = channel.close(200, "topology declared").await {
        tracing::debug!(error = %e, "closing topology channel");
    }
    report
}

async fn declare_queue(channel: &Channel, spec: &QueueSpec) -> lapin::Result<()> {
    let options = QueueDeclareOptions {
        durable: false,
        auto_delete: false,
        exclusive: spec.exclusive,
        ..QueueDeclareOptions::default()
    };
    channel
        .queue_declare(&spec.name, options, FieldTable::default())
        .await?;

    if let Some(exchange) = spec.exchange {
        channel
            .queue_bind(
                &spec.name,
                exchange,
                "",
                QueueBindOptions::default(),
                FieldTable::default(),
            )
            .await?;
    }
    Ok(())
}

async fn reopen(connection: &Connection, report: &mut TopologyReport) -> Option<Channel> {
    match connection.create_channel().await {
        Ok(channel) => Some(channel),
        Err(e) => {
            report.record("channel", e);
            None
        }
    }
}
