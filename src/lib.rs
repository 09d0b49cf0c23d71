//! # threadline
//!
//! threadline is a thin Rust client for an OpenAI-compatible provider that keeps a local,
//! file-per-record trail of every conversation resource it touches.
//!
//! The crate provides:
//!
//! * **Conversation lifecycle**: [`ConversationManager`] resolves or creates an assistant,
//!   a per-user thread and the files the assistant should read, posts a message, runs the
//!   thread and fetches the reply
//! * **Local records**: [`config_store::ConfigStore`] writes each assistant, thread,
//!   uploaded file, message and run to its own JSON file so later interactions reuse them
//! * **Provider access**: [`resource_client::ResourceClient`] is the seam between the
//!   lifecycle and the network, implemented over HTTP by [`clients::openai::OpenAIClient`]
//! * **Bounded waiting**: [`wait::WaitPolicy`] limits how long a run is polled, with
//!   optional backoff, a deadline and cancellation
//! * **One-shot completions**: JSON-mode chat in [`chat`], image prompts in [`vision`],
//!   and prompt size checks in [`tokens`]
//!
//! ## Getting Started
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use threadline::clients::openai::OpenAIClient;
//! use threadline::lifecycle::ConversationRequest;
//! use threadline::resource_client::AssistantSpec;
//! use threadline::wait::WaitPolicy;
//! use threadline::{ConversationManager, Credentials, ThreadlineConfig};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     threadline::init_logger();
//!
//!     let config = ThreadlineConfig::default();
//!     let credentials = Credentials::from_dir("./local")?;
//!     let client = Arc::new(OpenAIClient::new(credentials, &config));
//!     let manager = ConversationManager::new(client, config.app("sports_trivia"));
//!
//!     let request = ConversationRequest::new(
//!         AssistantSpec::new("Sports Guru", "You answer sports trivia in one sentence."),
//!         "1",
//!         "Who holds the NBA record for career points?",
//!     );
//!     let exchange = manager
//!         .ask(&request, &WaitPolicy::default(), &CancellationToken::new())
//!         .await?;
//!
//!     println!("run {} -> {:?}", exchange.outcome.run_id(), exchange.reply);
//!     Ok(())
//! }
//! ```
//!
//! On disk, each application gets its own folder under [`ThreadlineConfig::base_dir`];
//! see [`AppPaths`] for the layout.

use std::sync::Once;

static INIT_LOGGER: Once = Once::new();

/// Initialise the global [`env_logger`] subscriber exactly once.
///
/// Applications that install their own `log` backend simply never call this.
///
/// ```rust
/// threadline::init_logger();
/// log::info!("Logger is ready");
/// ```
pub fn init_logger() {
    INIT_LOGGER.call_once(|| {
        env_logger::init();
    });
}

// Import the top-level `threadline` module.
pub mod threadline;

// Re-exporting key items for easier external access.
pub use threadline::chat;
pub use threadline::clients;
pub use threadline::config::{AppPaths, ThreadlineConfig};
pub use threadline::config_store;
pub use threadline::credentials;
pub use threadline::credentials::Credentials;
pub use threadline::error;
pub use threadline::lifecycle;
pub use threadline::records;
pub use threadline::resource_client;
pub use threadline::tokens;
pub use threadline::vision;
pub use threadline::wait;
pub use threadline::ConversationManager;
