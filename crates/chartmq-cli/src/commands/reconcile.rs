//! One-off reconciliation of stored repositories

use chartmq_kube::HelmCli;
use chartmq_worker::StartupReconciler;
use std::sync::Arc;

use super::{codec, open_store};
use crate::config::Settings;
use crate::error::{CliError, Result};

/// Register every stored repository with helm and print a summary
pub async fn run(settings: &Settings) -> Result<()> {
    let store = open_store(settings)?;
    let manager = HelmCli::new(settings.helm.clone());

    let report = StartupReconciler::new(Arc::new(store), codec(settings), Arc::new(manager))
        .run()
        .await;

    if let Some(message) = report.store_error {
        return Err(CliError::Store { message });
    }

    println!("reconciled {} repositories", report.registered.len());
    for name in &report.registered {
        println!("  registered {name}");
    }
    for (name, reason) in &report.skipped {
        println!("  skipped {name}: {reason}");
    }
    Ok(())
}
