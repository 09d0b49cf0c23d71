//! The `OpenAIClient` struct speaks the OpenAI REST API: chat and vision completions, and
//! the assistants family (assistants, threads, messages, runs, files) through
//! [`ResourceClient`].
//!
//! # Example
//!
//! ```rust,no_run
//! use threadline::clients::openai::OpenAIClient;
//! use threadline::resource_client::{AssistantSpec, ResourceClient};
//! use threadline::{Credentials, ThreadlineConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let credentials = Credentials::from_dir("./local")?;
//!     let client = OpenAIClient::new(credentials, &ThreadlineConfig::default());
//!
//!     let assistant = client
//!         .create_assistant(&AssistantSpec::new("Sports Guru", "You answer sports trivia."))
//!         .await?;
//!     println!("created {}", assistant.id);
//!     Ok(())
//! }
//! ```
//!
//! # Note
//!
//! Assistant-family requests carry the `OpenAI-Beta` header configured in
//! [`ThreadlineConfig::assistants_beta`].

use crate::threadline::chat::{ChatCompletion, ChatRequest};
use crate::threadline::clients::common::{decode_response, get_shared_http_client};
use crate::threadline::config::ThreadlineConfig;
use crate::threadline::credentials::Credentials;
use crate::threadline::error::ClientError;
use crate::threadline::records::{
    Assistant, AssistantFile, FileObject, Metadata, MessageContent, MessageRole, Run, RunError,
    RunStatus, Thread, ThreadMessage, ToolType,
};
use crate::threadline::resource_client::{AssistantSpec, FileUpload, NewMessage, ResourceClient};
use crate::threadline::vision::VisionRequest;
use async_trait::async_trait;
use reqwest::Method;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

/// Client for OpenAI's REST API.
///
/// Holds the credentials and endpoint settings; the underlying connection pool is the
/// shared one from [`crate::clients::common`].
pub struct OpenAIClient {
    http: reqwest::Client,
    credentials: Credentials,
    api_base: String,
    assistants_beta: String,
    timeout: Duration,
}

impl OpenAIClient {
    pub fn new(credentials: Credentials, config: &ThreadlineConfig) -> Self {
        OpenAIClient {
            http: get_shared_http_client().clone(),
            credentials,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            assistants_beta: config.assistants_beta.clone(),
            timeout: config.request_timeout,
        }
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    /// Absolute URL of `path` under the configured base.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.api_base, path.trim_start_matches('/'))
    }

    fn request(&self, method: Method, path: &str, assistants_beta: bool) -> reqwest::RequestBuilder {
        let mut req = self
            .http
            .request(method, self.endpoint(path))
            .bearer_auth(self.credentials.api_key())
            .timeout(self.timeout);

        if let Some(org) = self.credentials.organization() {
            req = req.header("OpenAI-Organization", org);
        }
        if assistants_beta {
            req = req.header("OpenAI-Beta", self.assistants_beta.as_str());
        }
        req
    }

    /// System + user prompt completion in JSON output mode.
    pub async fn chat_completion(&self, request: &ChatRequest) -> Result<ChatCompletion, ClientError> {
        let response = self
            .request(Method::POST, "chat/completions", false)
            .json(&request.to_payload())
            .send()
            .await?;
        decode_response("OpenAIClient::chat_completion(...)", response).await
    }

    /// Completion over a prompt plus local images.
    pub async fn vision_completion(
        &self,
        request: &VisionRequest,
    ) -> Result<ChatCompletion, ClientError> {
        let payload = request.to_payload()?;
        let response = self
            .request(Method::POST, "chat/completions", false)
            .json(&payload)
            .send()
            .await?;
        decode_response("OpenAIClient::vision_completion(...)", response).await
    }
}

#[async_trait]
impl ResourceClient for OpenAIClient {
    async fn create_assistant(&self, spec: &AssistantSpec) -> Result<Assistant, ClientError> {
        let tools: Vec<_> = spec
            .tool_type
            .iter()
            .map(|tool| json!({ "type": tool.as_str() }))
            .collect();
        let payload = json!({
            "model": spec.model,
            "name": spec.name,
            "instructions": spec.instructions,
            "tools": tools,
            "metadata": spec.metadata,
        });

        let response = self
            .request(Method::POST, "assistants", true)
            .json(&payload)
            .send()
            .await?;
        let wire: AssistantObject =
            decode_response("OpenAIClient::create_assistant(...)", response).await?;
        Ok(wire.into())
    }

    async fn create_thread(&self, metadata: &Metadata) -> Result<Thread, ClientError> {
        let response = self
            .request(Method::POST, "threads", true)
            .json(&json!({ "metadata": metadata }))
            .send()
            .await?;
        let wire: ThreadObject =
            decode_response("OpenAIClient::create_thread(...)", response).await?;
        Ok(wire.into())
    }

    async fn upload_file(&self, upload: &FileUpload) -> Result<FileObject, ClientError> {
        let bytes = tokio::fs::read(&upload.path)
            .await
            .map_err(|source| ClientError::File {
                path: upload.path.clone(),
                source,
            })?;

        let form = reqwest::multipart::Form::new()
            .text("purpose", upload.purpose.clone())
            .part(
                "file",
                reqwest::multipart::Part::bytes(bytes).file_name(upload.file_name.clone()),
            );

        let response = self
            .request(Method::POST, "files", false)
            .multipart(form)
            .send()
            .await?;
        decode_response("OpenAIClient::upload_file(...)", response).await
    }

    async fn create_assistant_file(
        &self,
        assistant_id: &str,
        file_id: &str,
    ) -> Result<AssistantFile, ClientError> {
        let response = self
            .request(Method::POST, &format!("assistants/{}/files", assistant_id), true)
            .json(&json!({ "file_id": file_id }))
            .send()
            .await?;
        decode_response("OpenAIClient::create_assistant_file(...)", response).await
    }

    async fn create_message(
        &self,
        thread_id: &str,
        message: &NewMessage,
    ) -> Result<ThreadMessage, ClientError> {
        let mut payload = json!({
            "role": message.role.as_str(),
            "content": message.content,
            "metadata": message.metadata,
        });
        if !message.file_ids.is_empty() {
            payload["file_ids"] = json!(message.file_ids);
        }

        let response = self
            .request(Method::POST, &format!("threads/{}/messages", thread_id), true)
            .json(&payload)
            .send()
            .await?;
        let wire: MessageObject =
            decode_response("OpenAIClient::create_message(...)", response).await?;
        Ok(wire.into())
    }

    async fn create_run(&self, thread_id: &str, assistant_id: &str) -> Result<Run, ClientError> {
        let response = self
            .request(Method::POST, &format!("threads/{}/runs", thread_id), true)
            .json(&json!({ "assistant_id": assistant_id }))
            .send()
            .await?;
        let wire: RunObject = decode_response("OpenAIClient::create_run(...)", response).await?;
        Ok(wire.into())
    }

    async fn retrieve_run(&self, thread_id: &str, run_id: &str) -> Result<Run, ClientError> {
        let response = self
            .request(
                Method::GET,
                &format!("threads/{}/runs/{}", thread_id, run_id),
                true,
            )
            .send()
            .await?;
        let wire: RunObject = decode_response("OpenAIClient::retrieve_run(...)", response).await?;
        Ok(wire.into())
    }

    async fn list_messages(&self, thread_id: &str) -> Result<Vec<ThreadMessage>, ClientError> {
        let response = self
            .request(Method::GET, &format!("threads/{}/messages", thread_id), true)
            .query(&[("order", "desc")])
            .send()
            .await?;
        let list: ListObject<MessageObject> =
            decode_response("OpenAIClient::list_messages(...)", response).await?;
        Ok(list.data.into_iter().map(ThreadMessage::from).collect())
    }
}

// Wire shapes. Only the fields the crate uses are declared; everything else the provider
// sends is ignored.

#[derive(Deserialize)]
struct ListObject<T> {
    data: Vec<T>,
}

#[derive(Deserialize)]
struct ToolObject {
    #[serde(rename = "type")]
    tool_type: String,
}

#[derive(Deserialize)]
struct AssistantObject {
    id: String,
    created_at: i64,
    name: Option<String>,
    instructions: Option<String>,
    model: String,
    #[serde(default)]
    tools: Vec<ToolObject>,
    #[serde(default)]
    metadata: Option<Metadata>,
}

impl From<AssistantObject> for Assistant {
    fn from(wire: AssistantObject) -> Self {
        Assistant {
            id: wire.id,
            name: wire.name.unwrap_or_default(),
            instructions: wire.instructions.unwrap_or_default(),
            model: wire.model,
            tool_type: wire
                .tools
                .into_iter()
                .next()
                .map(|tool| ToolType::from(tool.tool_type)),
            metadata: wire.metadata.unwrap_or_default(),
            created_at: wire.created_at,
        }
    }
}

#[derive(Deserialize)]
struct ThreadObject {
    id: String,
    created_at: i64,
    #[serde(default)]
    metadata: Option<Metadata>,
}

impl From<ThreadObject> for Thread {
    fn from(wire: ThreadObject) -> Self {
        Thread {
            id: wire.id,
            created_at: wire.created_at,
            metadata: wire.metadata.unwrap_or_default(),
        }
    }
}

#[derive(Deserialize)]
struct TextBody {
    value: String,
}

#[derive(Deserialize)]
struct ImageFileBody {
    file_id: String,
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    Text { text: TextBody },
    ImageFile { image_file: ImageFileBody },
    #[serde(other)]
    Unsupported,
}

#[derive(Deserialize)]
struct MessageObject {
    id: String,
    thread_id: String,
    role: MessageRole,
    #[serde(default)]
    content: Vec<ContentPart>,
    run_id: Option<String>,
    assistant_id: Option<String>,
    #[serde(default)]
    file_ids: Vec<String>,
    #[serde(default)]
    metadata: Option<Metadata>,
    created_at: i64,
}

impl From<MessageObject> for ThreadMessage {
    fn from(wire: MessageObject) -> Self {
        let content = wire
            .content
            .into_iter()
            .filter_map(|part| match part {
                ContentPart::Text { text } => Some(MessageContent::Text { value: text.value }),
                ContentPart::ImageFile { image_file } => Some(MessageContent::ImageFile {
                    file_id: image_file.file_id,
                }),
                ContentPart::Unsupported => None,
            })
            .collect();

        ThreadMessage {
            id: wire.id,
            thread_id: wire.thread_id,
            role: wire.role,
            content,
            run_id: wire.run_id,
            assistant_id: wire.assistant_id,
            file_ids: wire.file_ids,
            metadata: wire.metadata.unwrap_or_default(),
            created_at: wire.created_at,
        }
    }
}

#[derive(Deserialize)]
struct RunObject {
    id: String,
    thread_id: String,
    assistant_id: String,
    status: RunStatus,
    created_at: i64,
    started_at: Option<i64>,
    completed_at: Option<i64>,
    expires_at: Option<i64>,
    failed_at: Option<i64>,
    cancelled_at: Option<i64>,
    last_error: Option<RunError>,
}

impl From<RunObject> for Run {
    fn from(wire: RunObject) -> Self {
        Run {
            id: wire.id,
            thread_id: wire.thread_id,
            assistant_id: wire.assistant_id,
            status: wire.status,
            created_at: wire.created_at,
            started_at: wire.started_at,
            completed_at: wire.completed_at,
            expires_at: wire.expires_at,
            failed_at: wire.failed_at,
            cancelled_at: wire.cancelled_at,
            last_error: wire.last_error,
        }
    }
}
