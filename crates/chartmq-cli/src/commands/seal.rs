//! Encrypt a repository password for seeding the store by hand

use std::io::Read;

use super::codec;
use crate::config::Settings;
use crate::error::{CliError, Result};

/// Read a password from stdin and print its hex ciphertext
pub fn run(settings: &Settings) -> Result<()> {
    let mut input = String::new();
    std::io::stdin().read_to_string(&mut input)?;
    let password = input.trim_end_matches(['\r', '\n']);

    let sealed = codec(settings)
        .encrypt_to_hex(password)
        .map_err(|e| CliError::internal(e.to_string()))?;
    println!("{sealed}");
    Ok(())
}
