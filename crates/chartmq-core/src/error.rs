//! Core error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid override: {message}")]
    InvalidOverride { message: String },

    #[error("Invalid repository: {message}")]
    InvalidRepository { message: String },

    #[error("Encryption failed: {0}")]
    Encrypt(String),

    #[error("Decryption failed: {0}")]
    Decrypt(String),
}

pub type Result<T> = std::result::Result<T, CoreError>;
