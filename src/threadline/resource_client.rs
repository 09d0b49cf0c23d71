//! The provider-facing seam of the lifecycle manager.
//!
//! A [`ResourceClient`] turns one intent (create an assistant, post a message, fetch a
//! run, ...) into exactly one provider call and returns a normalized record from
//! [`crate::records`]. Implementations never retry; the caller decides what a failure
//! means. [`crate::clients::openai::OpenAIClient`] is the HTTP implementation, tests
//! substitute scripted stubs.

use crate::threadline::error::ClientError;
use crate::threadline::records::{
    Assistant, AssistantFile, FileObject, Metadata, MessageRole, Run, Thread, ThreadMessage,
    ToolType,
};
use async_trait::async_trait;
use std::path::PathBuf;

/// Default model for new assistants.
pub const DEFAULT_ASSISTANT_MODEL: &str = "gpt-4-1106-preview";

/// What an assistant should look like when it has to be created.
#[derive(Debug, Clone, PartialEq)]
pub struct AssistantSpec {
    /// Lookup key within an application.
    pub name: String,
    pub instructions: String,
    pub model: String,
    pub tool_type: Option<ToolType>,
    pub metadata: Metadata,
}

impl AssistantSpec {
    /// A retrieval assistant on [`DEFAULT_ASSISTANT_MODEL`].
    pub fn new(name: impl Into<String>, instructions: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            instructions: instructions.into(),
            model: DEFAULT_ASSISTANT_MODEL.to_string(),
            tool_type: Some(ToolType::Retrieval),
            metadata: Metadata::new(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_tool_type(mut self, tool_type: Option<ToolType>) -> Self {
        self.tool_type = tool_type;
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// A message to append to a thread.
#[derive(Debug, Clone, PartialEq)]
pub struct NewMessage {
    pub role: MessageRole,
    pub content: String,
    pub file_ids: Vec<String>,
    pub metadata: Metadata,
}

impl NewMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
            file_ids: Vec::new(),
            metadata: Metadata::new(),
        }
    }
}

/// A local file to upload.
#[derive(Debug, Clone, PartialEq)]
pub struct FileUpload {
    pub path: PathBuf,
    /// Name reported to the provider; defaults to the path's file name.
    pub file_name: String,
    pub purpose: String,
}

impl FileUpload {
    /// Upload `path` for use by assistants.
    pub fn for_assistants(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            path,
            file_name,
            purpose: "assistants".to_string(),
        }
    }
}

/// Outbound calls for assistants, threads, messages, runs and files.
#[async_trait]
pub trait ResourceClient: Send + Sync {
    async fn create_assistant(&self, spec: &AssistantSpec) -> Result<Assistant, ClientError>;

    async fn create_thread(&self, metadata: &Metadata) -> Result<Thread, ClientError>;

    async fn upload_file(&self, upload: &FileUpload) -> Result<FileObject, ClientError>;

    /// Make a previously uploaded file readable by an assistant.
    async fn create_assistant_file(
        &self,
        assistant_id: &str,
        file_id: &str,
    ) -> Result<AssistantFile, ClientError>;

    async fn create_message(
        &self,
        thread_id: &str,
        message: &NewMessage,
    ) -> Result<ThreadMessage, ClientError>;

    async fn create_run(&self, thread_id: &str, assistant_id: &str) -> Result<Run, ClientError>;

    async fn retrieve_run(&self, thread_id: &str, run_id: &str) -> Result<Run, ClientError>;

    /// Messages of a thread, newest first.
    async fn list_messages(&self, thread_id: &str) -> Result<Vec<ThreadMessage>, ClientError>;
}
