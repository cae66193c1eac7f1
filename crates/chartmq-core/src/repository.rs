//! Plaintext chart repository descriptor
//!
//! A [`RepositorySpec`] is the in-flight form of a repository: it arrives on
//! the add-repository broadcast and is handed to the package manager for
//! registration. The password is only ever plaintext here; the store keeps
//! an encrypted copy.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{CoreError, Result};

/// Chart repository with plaintext credentials
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepositorySpec {
    pub name: String,
    pub url: String,
    pub username: String,
    pub password: String,
}

impl RepositorySpec {
    /// Create a repository without credentials
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            ..Default::default()
        }
    }

    /// Attach basic auth credentials
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = username.into();
        self.password = password.into();
        self
    }

    /// Whether the repository needs authentication
    pub fn has_credentials(&self) -> bool {
        !self.username.is_empty()
    }

    /// Check name, URL and credential pairing
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(CoreError::InvalidRepository {
                message: "repository name must not be empty".to_string(),
            });
        }
        if self.name.contains('/') {
            return Err(CoreError::InvalidRepository {
                message: format!("repository name '{}' must not contain '/'", self.name),
            });
        }

        Url::parse(&self.url).map_err(|e| CoreError::InvalidRepository {
            message: format!("invalid URL '{}': {}", self.url, e),
        })?;

        if !self.username.is_empty() && self.password.is_empty() {
            return Err(CoreError::InvalidRepository {
                message: format!("password must be set for user {:?}", self.username),
            });
        }

        Ok(())
    }
}

impl std::fmt::Debug for RepositorySpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RepositorySpec")
            .field("name", &self.name)
            .field("url", &self.url)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}
