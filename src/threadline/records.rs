//! Resource records.
//!
//! Two families of types live here:
//!
//! * **Provider records** ([`Assistant`], [`Thread`], [`FileObject`], [`AssistantFile`],
//!   [`ThreadMessage`], [`Run`]) are the normalized results of a
//!   [`ResourceClient`](crate::resource_client::ResourceClient) call.
//! * **Local records** ([`ThreadRecord`], [`UploadedFileRecord`], [`MessageRecord`],
//!   [`RunRecord`]) are what the lifecycle manager writes to the config store. They add
//!   the local context the provider does not keep for us, such as the owning user.
//!
//! [`Assistant`] is persisted as-is. Timestamps are unix seconds, as the provider
//! reports them.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Opaque key/value metadata attached to provider objects.
pub type Metadata = BTreeMap<String, String>;

/// Tool enabled on an assistant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ToolType {
    Retrieval,
    CodeInterpreter,
    FileSearch,
    Function,
    /// Any tool type this crate does not know by name.
    Other(String),
}

impl ToolType {
    pub fn as_str(&self) -> &str {
        match self {
            ToolType::Retrieval => "retrieval",
            ToolType::CodeInterpreter => "code_interpreter",
            ToolType::FileSearch => "file_search",
            ToolType::Function => "function",
            ToolType::Other(name) => name,
        }
    }
}

impl From<String> for ToolType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "retrieval" => ToolType::Retrieval,
            "code_interpreter" => ToolType::CodeInterpreter,
            "file_search" => ToolType::FileSearch,
            "function" => ToolType::Function,
            _ => ToolType::Other(value),
        }
    }
}

impl From<ToolType> for String {
    fn from(value: ToolType) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for ToolType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Author of a thread message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle status of a run, as reported by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Queued,
    InProgress,
    RequiresAction,
    Cancelling,
    Cancelled,
    Failed,
    Completed,
    Expired,
    Incomplete,
}

impl RunStatus {
    /// `true` while the provider is still working on the run without our help.
    ///
    /// `requires_action` is not pending: the run waits for tool outputs this crate never
    /// submits, so polling it further cannot make progress.
    pub fn is_pending(&self) -> bool {
        matches!(
            self,
            RunStatus::Queued | RunStatus::InProgress | RunStatus::Cancelling
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Queued => "queued",
            RunStatus::InProgress => "in_progress",
            RunStatus::RequiresAction => "requires_action",
            RunStatus::Cancelling => "cancelling",
            RunStatus::Cancelled => "cancelled",
            RunStatus::Failed => "failed",
            RunStatus::Completed => "completed",
            RunStatus::Expired => "expired",
            RunStatus::Incomplete => "incomplete",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named assistant registered with the provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assistant {
    pub id: String,
    pub name: String,
    pub instructions: String,
    pub model: String,
    pub tool_type: Option<ToolType>,
    #[serde(default)]
    pub metadata: Metadata,
    pub created_at: i64,
}

/// A conversation thread as returned by the provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Thread {
    pub id: String,
    pub created_at: i64,
    #[serde(default)]
    pub metadata: Metadata,
}

/// A file uploaded to the provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileObject {
    pub id: String,
    pub filename: String,
    pub purpose: String,
    pub bytes: u64,
    pub created_at: i64,
}

/// Association of an uploaded file with an assistant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssistantFile {
    pub id: String,
    pub assistant_id: String,
    pub created_at: i64,
}

/// One content part of a thread message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageContent {
    Text { value: String },
    ImageFile { file_id: String },
}

impl MessageContent {
    pub fn kind(&self) -> &'static str {
        match self {
            MessageContent::Text { .. } => "text",
            MessageContent::ImageFile { .. } => "image_file",
        }
    }

    /// Text carried by this part; image parts are represented by their file id.
    pub fn text(&self) -> &str {
        match self {
            MessageContent::Text { value } => value,
            MessageContent::ImageFile { file_id } => file_id,
        }
    }
}

/// A message on a thread as returned by the provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreadMessage {
    pub id: String,
    pub thread_id: String,
    pub role: MessageRole,
    pub content: Vec<MessageContent>,
    pub run_id: Option<String>,
    pub assistant_id: Option<String>,
    #[serde(default)]
    pub file_ids: Vec<String>,
    #[serde(default)]
    pub metadata: Metadata,
    pub created_at: i64,
}

/// Error payload the provider attaches to a failed run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunError {
    pub code: String,
    pub message: String,
}

/// A run as returned by the provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Run {
    pub id: String,
    pub thread_id: String,
    pub assistant_id: String,
    pub status: RunStatus,
    pub created_at: i64,
    pub started_at: Option<i64>,
    pub completed_at: Option<i64>,
    pub expires_at: Option<i64>,
    pub failed_at: Option<i64>,
    pub cancelled_at: Option<i64>,
    pub last_error: Option<RunError>,
}

/// Persisted thread, scoped to one assistant and one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreadRecord {
    pub id: String,
    pub created_at: i64,
    pub assistant_id: String,
    pub user_id: String,
    #[serde(default)]
    pub metadata: Metadata,
}

/// Persisted association between an assistant and a file it may read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadedFileRecord {
    pub id: String,
    pub assistant_id: String,
    pub original_file_name: String,
    pub created_at: i64,
}

/// Persisted message, sent or received.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageRecord {
    pub id: String,
    pub thread_id: String,
    pub run_id: Option<String>,
    pub user_id: String,
    pub role: MessageRole,
    pub response_type: String,
    pub response_text: String,
    pub created_at: i64,
}

impl MessageRecord {
    /// Flatten a provider message into a record owned by `user_id`.
    ///
    /// Text parts are joined with newlines; the type is the type of the first part.
    pub fn from_message(message: &ThreadMessage, user_id: &str) -> Self {
        let response_type = message
            .content
            .first()
            .map(|part| part.kind())
            .unwrap_or("text")
            .to_string();
        let response_text = message
            .content
            .iter()
            .map(MessageContent::text)
            .collect::<Vec<_>>()
            .join("\n");

        Self {
            id: message.id.clone(),
            thread_id: message.thread_id.clone(),
            run_id: message.run_id.clone(),
            user_id: user_id.to_string(),
            role: message.role,
            response_type,
            response_text,
            created_at: message.created_at,
        }
    }
}

/// Persisted final snapshot of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub id: String,
    pub thread_id: String,
    pub assistant_id: String,
    pub user_id: String,
    pub status: RunStatus,
    pub created_at: i64,
    pub started_at: Option<i64>,
    pub completed_at: Option<i64>,
    pub expires_at: Option<i64>,
    pub failed_at: Option<i64>,
    pub cancelled_at: Option<i64>,
    pub last_error: Option<RunError>,
}

impl RunRecord {
    /// Snapshot `run` as a record owned by `user_id`.
    pub fn from_run(run: &Run, user_id: &str) -> Self {
        Self {
            id: run.id.clone(),
            thread_id: run.thread_id.clone(),
            assistant_id: run.assistant_id.clone(),
            user_id: user_id.to_string(),
            status: run.status,
            created_at: run.created_at,
            started_at: run.started_at,
            completed_at: run.completed_at,
            expires_at: run.expires_at,
            failed_at: run.failed_at,
            cancelled_at: run.cancelled_at,
            last_error: run.last_error.clone(),
        }
    }
}
