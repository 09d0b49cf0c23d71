// src/threadline/mod.rs

pub mod chat;
pub mod clients;
pub mod config;
pub mod config_store;
pub mod credentials;
pub mod error;
pub mod lifecycle;
pub mod records;
pub mod resource_client;
pub mod tokens;
pub mod vision;
pub mod wait;

// Exported here so callers can write threadline::ConversationManager instead of going
// through the lifecycle module.
pub use lifecycle::ConversationManager;
