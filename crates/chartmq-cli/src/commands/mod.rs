//! CLI commands

pub mod reconcile;
pub mod seal;
pub mod serve;

use chartmq_core::CredentialCodec;
use chartmq_repo::SqliteRepositoryStore;

use crate::config::Settings;
use crate::error::Result;

fn codec(settings: &Settings) -> CredentialCodec {
    CredentialCodec::new(&settings.app.passkey)
}

fn open_store(settings: &Settings) -> Result<SqliteRepositoryStore> {
    let store = match &settings.database.path {
        Some(path) => SqliteRepositoryStore::open_at(path)?,
        None => SqliteRepositoryStore::open()?,
    };
    Ok(store)
}
