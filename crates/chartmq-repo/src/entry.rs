//! Persisted repository entry

use chartmq_core::{CredentialCodec, RepositorySpec};
use serde::{Deserialize, Serialize};

use crate::error::{RepoError, Result};

/// A chart repository as stored: password held as ciphertext
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryEntry {
    /// Unique repository name
    pub name: String,
    /// Index URL
    pub url: String,
    /// Basic auth user, empty when anonymous
    pub username: String,
    /// Hex of `nonce || ciphertext || tag`, the same text `chartmq seal` prints
    pub password: String,
}

impl RepositoryEntry {
    /// Encrypt the password of a plaintext repository for storage
    pub fn seal(spec: &RepositorySpec, codec: &CredentialCodec) -> Result<Self> {
        let password = codec
            .encrypt_to_hex(&spec.password)
            .map_err(|source| RepoError::Credential {
                name: spec.name.clone(),
                source,
            })?;

        Ok(Self {
            name: spec.name.clone(),
            url: spec.url.clone(),
            username: spec.username.clone(),
            password,
        })
    }

    /// Decrypt into a plaintext repository, fresh on every call
    pub fn unseal(&self, codec: &CredentialCodec) -> Result<RepositorySpec> {
        let password =
            codec
                .decrypt_hex(&self.password)
                .map_err(|source| RepoError::Credential {
                    name: self.name.clone(),
                    source,
                })?;

        Ok(RepositorySpec {
            name: self.name.clone(),
            url: self.url.clone(),
            username: self.username.clone(),
            password,
        })
    }
}

impl std::fmt::Debug for RepositoryEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RepositoryEntry")
            .field("name", &self.name)
            .field("url", &self.url)
            .field("username", &self.username)
            .field("password", &format_args!("<sealed>"))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seal_never_stores_plaintext() {
        let codec = CredentialCodec::new("passkey");
        let spec = RepositorySpec::new("private", "https://charts.example.com")
            .with_credentials("admin", "hunter2");

        let entry = RepositoryEntry::seal(&spec, &codec).unwrap();
        assert_eq!(entry.name, "private");
        assert_eq!(entry.username, "admin");
        assert!(!entry.password.contains("hunter2"));
        assert!(entry.password.chars().all(|c| c.is_ascii_hexdigit()));

        assert_eq!(entry.unseal(&codec).unwrap(), spec);
    }

    #[test]
    fn test_unseal_with_wrong_key_names_repository() {
        let spec = RepositorySpec::new("stable", "https://charts.example.com");
        let entry = RepositoryEntry::seal(&spec, &CredentialCodec::new("one")).unwrap();

        let err = entry.unseal(&CredentialCodec::new("two")).unwrap_err();
        assert!(matches!(err, RepoError::Credential { ref name, .. } if name == "stable"));
    }

    #[test]
    fn test_unseal_accepts_hand_sealed_hex() {
        let codec = CredentialCodec::new("passkey");
        let entry = RepositoryEntry {
            name: "private".to_string(),
            url: "https://charts.example.com".to_string(),
            username: "admin".to_string(),
            password: codec.encrypt_to_hex("hunter2").unwrap(),
        };

        assert_eq!(entry.unseal(&codec).unwrap().password, "hunter2");
    }
}
