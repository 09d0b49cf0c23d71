//! Error types for every layer of threadline.
//!
//! Each layer owns its own enum so callers can branch on the failure that actually
//! happened: a missing credential is never confused with a provider rejection, and a
//! corrupt record in the config store is never confused with a lookup miss (misses are
//! `Ok(None)`, not errors).

use std::path::PathBuf;
use thiserror::Error;

/// Failures while loading API credentials.
#[derive(Error, Debug)]
pub enum CredentialError {
    /// The credential file does not exist.
    #[error("credential file not found: {}", path.display())]
    Missing { path: PathBuf },

    /// The credential file exists but holds nothing but whitespace.
    #[error("credential file is empty: {}", path.display())]
    Empty { path: PathBuf },

    /// The credential file could not be read.
    #[error("credential file {} could not be read: {source}", path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A required environment variable is unset or empty.
    #[error("environment variable {0} is not set")]
    MissingEnv(String),
}

/// Failures of the file-per-record config store.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Reading, writing or listing the store directory failed.
    #[error("store I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A record could not be serialized.
    #[error("failed to serialize record: {0}")]
    Serialize(#[source] serde_json::Error),

    /// A stored file exists but does not decode as the expected record.
    #[error("stored record {file} is corrupt: {source}")]
    Corrupt {
        file: String,
        #[source]
        source: serde_json::Error,
    },

    /// More than one stored record matches a key that must be unique.
    #[error("{kind} '{key}' is stored more than once: {files:?}")]
    Duplicate {
        kind: &'static str,
        key: String,
        files: Vec<String>,
    },
}

/// Failures talking to the provider.
#[derive(Error, Debug)]
pub enum ClientError {
    /// The request never produced an HTTP response.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The provider answered with a non-success status.
    #[error("provider returned {status}: {message}")]
    Api { status: u16, message: String },

    /// The response body was not the JSON shape we expected.
    #[error("could not decode provider response: {0}")]
    Decode(String),

    /// A local file that had to be sent could not be read.
    #[error("could not read {}: {source}", path.display())]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The response decoded but is missing something the caller needs.
    #[error("unexpected provider response: {0}")]
    UnexpectedResponse(String),
}

/// Failures of the conversation lifecycle manager.
#[derive(Error, Debug)]
pub enum LifecycleError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Client(#[from] ClientError),

    /// The caller cancelled while a run was being awaited.
    #[error("wait for run {run_id} was cancelled")]
    Cancelled { run_id: String },
}

/// Failures turning a document into images for a vision request.
#[derive(Error, Debug)]
pub enum DocumentError {
    /// The page renderer rejected the document.
    #[error("could not render {}: {message}", path.display())]
    Render { path: PathBuf, message: String },

    /// The page renderer succeeded but produced no images.
    #[error("rendering {} produced no pages", path.display())]
    NoPages { path: PathBuf },
}
