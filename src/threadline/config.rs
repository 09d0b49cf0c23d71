//! Configuration for threadline.
//!
//! Provides [`ThreadlineConfig`] for provider endpoints and the on-disk base directory,
//! and [`AppPaths`] for the per-application directory layout.
//! Users construct these manually; there is no configuration file format.
//!
//! # Example
//!
//! ```rust
//! use threadline::{AppPaths, ThreadlineConfig};
//! use std::path::PathBuf;
//!
//! let config = ThreadlineConfig {
//!     base_dir: PathBuf::from("/var/data/threadline"),
//!     ..ThreadlineConfig::default()
//! };
//!
//! let paths = config.app("review_resume");
//! assert_eq!(paths.config_dir(), PathBuf::from("/var/data/threadline/review_resume/config"));
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default REST endpoint of the provider.
pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";
/// Value sent in the `OpenAI-Beta` header on assistant, thread and run endpoints.
pub const DEFAULT_ASSISTANTS_BETA: &str = "assistants=v1";

/// Global configuration.
#[derive(Clone, Debug)]
pub struct ThreadlineConfig {
    /// Directory under which each application gets its own folder.
    pub base_dir: PathBuf,
    /// Base URL of the provider's REST API, without a trailing slash.
    pub api_base: String,
    /// `OpenAI-Beta` header value for the assistants family of endpoints.
    pub assistants_beta: String,
    /// Per-request timeout applied by the HTTP client.
    pub request_timeout: Duration,
}

impl Default for ThreadlineConfig {
    /// Points at `"./src"` in the current working directory and the public API.
    ///
    /// ```rust
    /// use threadline::ThreadlineConfig;
    /// use std::path::PathBuf;
    ///
    /// let config = ThreadlineConfig::default();
    /// assert_eq!(config.base_dir, PathBuf::from("src"));
    /// assert_eq!(config.api_base, "https://api.openai.com/v1");
    /// ```
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("src"),
            api_base: DEFAULT_API_BASE.to_string(),
            assistants_beta: DEFAULT_ASSISTANTS_BETA.to_string(),
            request_timeout: Duration::from_secs(120),
        }
    }
}

impl ThreadlineConfig {
    /// Directory layout for one application namespace.
    pub fn app(&self, application: &str) -> AppPaths {
        AppPaths::new(&self.base_dir, application)
    }
}

/// Directory layout of one application.
///
/// ```text
/// {base_dir}/{application}/
///   config/                 assistants, threads, uploaded-file associations
///   data/                   input files (uploads, images)
///   data/chat_messages/     message records
///   data/run_logs/          run records
///   data/results/           formatted chat completion results
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppPaths {
    application: String,
    root: PathBuf,
}

impl AppPaths {
    pub fn new(base_dir: impl AsRef<Path>, application: &str) -> Self {
        Self {
            application: application.to_string(),
            root: base_dir.as_ref().join(application),
        }
    }

    pub fn application(&self) -> &str {
        &self.application
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_dir(&self) -> PathBuf {
        self.root.join("config")
    }

    pub fn data_dir(&self) -> PathBuf {
        self.root.join("data")
    }

    pub fn messages_dir(&self) -> PathBuf {
        self.data_dir().join("chat_messages")
    }

    pub fn run_logs_dir(&self) -> PathBuf {
        self.data_dir().join("run_logs")
    }

    pub fn results_dir(&self) -> PathBuf {
        self.data_dir().join("results")
    }
}
