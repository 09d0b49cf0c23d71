//! API credential loading.
//!
//! Credentials are read once and handed to a client explicitly; nothing in the crate
//! reads key files on its own. A missing API key is a [`CredentialError`] raised before
//! any request is made. The organization id is optional.

use crate::threadline::error::CredentialError;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Default file name of the API key inside a credentials directory.
pub const API_KEY_FILE: &str = "API_KEY.txt";
/// Default file name of the organization id inside a credentials directory.
pub const ORGANIZATION_FILE: &str = "ORGANIZATION_KEY.txt";

/// Provider credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    api_key: String,
    organization: Option<String>,
}

impl Credentials {
    /// Build credentials from values already in memory.
    pub fn new(api_key: impl Into<String>, organization: Option<String>) -> Self {
        Self {
            api_key: api_key.into(),
            organization,
        }
    }

    /// Read `API_KEY.txt` and, if present, `ORGANIZATION_KEY.txt` from `dir`.
    ///
    /// ```rust,no_run
    /// use threadline::Credentials;
    ///
    /// let credentials = Credentials::from_dir("./local")?;
    /// # Ok::<(), threadline::error::CredentialError>(())
    /// ```
    pub fn from_dir(dir: impl AsRef<Path>) -> Result<Self, CredentialError> {
        let dir = dir.as_ref();
        Self::from_files(dir.join(API_KEY_FILE), Some(dir.join(ORGANIZATION_FILE)))
    }

    /// Read the API key from `api_key_path` and the organization id from
    /// `organization_path`.
    ///
    /// The API key is required. A missing organization file only logs a warning, since
    /// personal keys work without one; an unreadable or empty one is still an error.
    pub fn from_files(
        api_key_path: impl AsRef<Path>,
        organization_path: Option<PathBuf>,
    ) -> Result<Self, CredentialError> {
        let api_key = read_secret(api_key_path.as_ref())?;

        let organization = match organization_path {
            Some(path) => match read_secret(&path) {
                Ok(org) => Some(org),
                Err(CredentialError::Missing { path }) => {
                    log::warn!(
                        "Credentials::from_files(...): no organization file at {}, continuing without one",
                        path.display()
                    );
                    None
                }
                Err(err) => return Err(err),
            },
            None => None,
        };

        Ok(Self {
            api_key,
            organization,
        })
    }

    /// Read `OPENAI_API_KEY` (required) and `OPENAI_ORG_ID` (optional).
    pub fn from_env() -> Result<Self, CredentialError> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| CredentialError::MissingEnv("OPENAI_API_KEY".into()))?;
        let organization = std::env::var("OPENAI_ORG_ID")
            .ok()
            .filter(|v| !v.trim().is_empty());

        Ok(Self::new(api_key.trim(), organization))
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn organization(&self) -> Option<&str> {
        self.organization.as_deref()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &"<redacted>")
            .field("organization", &self.organization)
            .finish()
    }
}

fn read_secret(path: &Path) -> Result<String, CredentialError> {
    let raw = fs::read_to_string(path).map_err(|source| match source.kind() {
        io::ErrorKind::NotFound => CredentialError::Missing {
            path: path.to_path_buf(),
        },
        _ => CredentialError::Unreadable {
            path: path.to_path_buf(),
            source,
        },
    })?;

    let value = raw.trim();
    if value.is_empty() {
        return Err(CredentialError::Empty {
            path: path.to_path_buf(),
        });
    }
    Ok(value.to_string())
}
