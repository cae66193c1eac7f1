//! chartmq core library
//!
//! Shared building blocks for the message-driven release orchestrator:
//! override values, plaintext repository descriptors and the credential
//! codec used to keep repository passwords encrypted at rest.

pub mod crypto;
pub mod error;
pub mod repository;
pub mod values;

pub use crypto::CredentialCodec;
pub use error::{CoreError, Result};
pub use repository::RepositorySpec;
pub use values::{Values, parse_overrides};
