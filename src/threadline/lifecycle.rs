//! Conversation resource lifecycle.
//!
//! [`ConversationManager`] drives one user interaction through the provider's
//! assistant → thread → files → message → run → reply sequence. It reuses any resource
//! already recorded in the application's config store and records every resource it
//! creates, so a later interaction by the same user continues the same thread.
//!
//! ```text
//! NO_ASSISTANT -> ASSISTANT_READY -> THREAD_READY -> FILES_ATTACHED -> MESSAGE_POSTED
//!   -> RUN_QUEUED -> RUN_POLLING -> RUN_COMPLETE | RUN_FAILED | RUN_TIMED_OUT
//! ```
//!
//! Every step awaits the previous one; nothing runs in the background. Waiting for a run
//! is bounded by a [`WaitPolicy`] and can be abandoned through a [`CancellationToken`].
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use threadline::clients::openai::OpenAIClient;
//! use threadline::lifecycle::{ConversationManager, ConversationRequest, LatestReply};
//! use threadline::resource_client::AssistantSpec;
//! use threadline::wait::WaitPolicy;
//! use threadline::{Credentials, ThreadlineConfig};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ThreadlineConfig::default();
//!     let client = OpenAIClient::new(Credentials::from_dir("./local")?, &config);
//!     let manager = ConversationManager::new(Arc::new(client), config.app("review_resume"));
//!
//!     let request = ConversationRequest::new(
//!         AssistantSpec::new("Resume Helper", "You are an experienced recruiter."),
//!         "1",
//!         "Please review my resume.",
//!     )
//!     .with_files(vec!["resume.pdf".to_string()]);
//!
//!     let exchange = manager
//!         .ask(&request, &WaitPolicy::default(), &CancellationToken::new())
//!         .await?;
//!     if let Some(LatestReply::Ready(reply)) = exchange.reply {
//!         println!("{}", reply.response_text);
//!     }
//!     Ok(())
//! }
//! ```

use crate::threadline::config::AppPaths;
use crate::threadline::config_store::{sanitize_component, ConfigStore, RECORD_EXTENSION};
use crate::threadline::error::{LifecycleError, StoreError};
use crate::threadline::records::{
    Assistant, Metadata, MessageRecord, MessageRole, Run, RunRecord, RunStatus, ThreadRecord,
    UploadedFileRecord,
};
use crate::threadline::resource_client::{AssistantSpec, FileUpload, NewMessage, ResourceClient};
use crate::threadline::wait::{poll_until, WaitPolicy, WaitResult};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// File name prefix of assistant records.
pub const ASSISTANT_PREFIX: &str = "asst";
/// File name prefix of thread records.
pub const THREAD_PREFIX: &str = "thread";
/// File name prefix of uploaded-file records.
pub const FILE_PREFIX: &str = "file";

/// Thread metadata key holding the owning assistant.
pub const ASSISTANT_ID_METADATA_KEY: &str = "assistantId";
/// Thread metadata key holding the owning user.
pub const USER_ID_METADATA_KEY: &str = "userId";

/// How waiting for a run ended.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// The run completed; its final snapshot was recorded.
    Completed(RunRecord),
    /// The run reached another terminal status; its final snapshot was recorded.
    Failed(RunRecord),
    /// The wait budget ran out while the run was still pending. Nothing was recorded.
    TimedOut {
        run_id: String,
        attempts: u32,
        last_status: RunStatus,
    },
}

impl RunOutcome {
    /// Id of the run this outcome describes.
    pub fn run_id(&self) -> &str {
        match self {
            RunOutcome::Completed(record) | RunOutcome::Failed(record) => &record.id,
            RunOutcome::TimedOut { run_id, .. } => run_id,
        }
    }

    /// `true` only for [`RunOutcome::Completed`].
    pub fn is_completed(&self) -> bool {
        matches!(self, RunOutcome::Completed(_))
    }
}

/// The newest message of a thread, from the point of view of someone waiting for an
/// assistant reply.
#[derive(Debug, Clone, PartialEq)]
pub enum LatestReply {
    /// The newest message is from the assistant; it has been recorded.
    Ready(MessageRecord),
    /// The newest message is from someone else. Nothing was recorded.
    NotReady { role: MessageRole },
    /// The thread has no messages.
    Empty,
}

/// Everything needed for one interaction.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationRequest {
    pub assistant: AssistantSpec,
    pub user_id: String,
    /// Files under the application's `data/` directory the assistant should read.
    pub file_names: Vec<String>,
    pub message: String,
    pub metadata: Metadata,
}

impl ConversationRequest {
    pub fn new(
        assistant: AssistantSpec,
        user_id: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        ConversationRequest {
            assistant,
            user_id: user_id.into(),
            file_names: Vec::new(),
            message: message.into(),
            metadata: Metadata::new(),
        }
    }

    pub fn with_files(mut self, file_names: Vec<String>) -> Self {
        self.file_names = file_names;
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Summary of one completed [`ConversationManager::ask`].
#[derive(Debug, Clone, PartialEq)]
pub struct Exchange {
    pub assistant_id: String,
    pub thread_id: String,
    pub file_ids: Vec<String>,
    /// The user message that was posted.
    pub message: MessageRecord,
    pub outcome: RunOutcome,
    /// Only fetched when the run completed.
    pub reply: Option<LatestReply>,
}

/// Drives the resource lifecycle for one application.
pub struct ConversationManager {
    client: Arc<dyn ResourceClient>,
    paths: AppPaths,
    config: ConfigStore,
    messages: ConfigStore,
    run_logs: ConfigStore,
}

impl ConversationManager {
    pub fn new(client: Arc<dyn ResourceClient>, paths: AppPaths) -> Self {
        ConversationManager {
            config: ConfigStore::new(paths.config_dir()),
            messages: ConfigStore::new(paths.messages_dir()),
            run_logs: ConfigStore::new(paths.run_logs_dir()),
            client,
            paths,
        }
    }

    pub fn paths(&self) -> &AppPaths {
        &self.paths
    }

    /// Store of assistant, thread and uploaded-file records.
    pub fn config_store(&self) -> &ConfigStore {
        &self.config
    }

    pub fn message_store(&self) -> &ConfigStore {
        &self.messages
    }

    pub fn run_log_store(&self) -> &ConfigStore {
        &self.run_logs
    }

    /// The recorded assistant called `name`, if any.
    pub fn find_assistant(&self, name: &str) -> Result<Option<Assistant>, StoreError> {
        let suffix = suffix_of(&[name]);
        self.config.find_unique(
            "assistant",
            name,
            Some(ASSISTANT_PREFIX),
            Some(&suffix),
            |assistant: &Assistant| assistant.name == name,
        )
    }

    /// The recorded thread of `user_id` with `assistant_id`, if any.
    pub fn find_thread(
        &self,
        assistant_id: &str,
        user_id: &str,
    ) -> Result<Option<ThreadRecord>, StoreError> {
        let suffix = suffix_of(&[assistant_id, user_id]);
        self.config.find_unique(
            "thread",
            &format!("{}/{}", assistant_id, user_id),
            Some(THREAD_PREFIX),
            Some(&suffix),
            |thread: &ThreadRecord| thread.assistant_id == assistant_id && thread.user_id == user_id,
        )
    }

    /// The recorded upload of `file_name` for `assistant_id`, if any.
    pub fn find_uploaded_file(
        &self,
        assistant_id: &str,
        file_name: &str,
    ) -> Result<Option<UploadedFileRecord>, StoreError> {
        let suffix = suffix_of(&[assistant_id]);
        self.config.find_unique(
            "uploaded file",
            &format!("{}/{}", assistant_id, file_name),
            Some(FILE_PREFIX),
            Some(&suffix),
            |file: &UploadedFileRecord| {
                file.assistant_id == assistant_id && file.original_file_name == file_name
            },
        )
    }

    /// Assistant named `spec.name`, created and recorded if it does not exist yet.
    ///
    /// A store failure is returned without creating anything.
    pub async fn ensure_assistant(&self, spec: &AssistantSpec) -> Result<Assistant, LifecycleError> {
        if let Some(existing) = self.find_assistant(&spec.name)? {
            log::debug!(
                "ConversationManager::ensure_assistant(...): reusing {} for '{}'",
                existing.id,
                spec.name
            );
            return Ok(existing);
        }

        let mut assistant = self.client.create_assistant(spec).await.map_err(|err| {
            log::error!(
                "ConversationManager::ensure_assistant(...): create '{}' failed: {}",
                spec.name,
                err
            );
            err
        })?;
        // The record is keyed on the requested name; lookups never see the provider's.
        if assistant.name != spec.name {
            log::warn!(
                "ConversationManager::ensure_assistant(...): provider named {} '{}', recording it as '{}'",
                assistant.id,
                assistant.name,
                spec.name
            );
            assistant.name = spec.name.clone();
        }
        self.config
            .save(&assistant, &[&assistant.id, &assistant.name])?;
        log::info!(
            "ConversationManager::ensure_assistant(...): created assistant {} '{}' in {}",
            assistant.id,
            assistant.name,
            self.paths.application()
        );
        Ok(assistant)
    }

    /// Thread of `user_id` with `assistant_id`, created and recorded if needed.
    pub async fn ensure_thread(
        &self,
        assistant_id: &str,
        user_id: &str,
    ) -> Result<ThreadRecord, LifecycleError> {
        if let Some(existing) = self.find_thread(assistant_id, user_id)? {
            log::debug!(
                "ConversationManager::ensure_thread(...): reusing {} for user {}",
                existing.id,
                user_id
            );
            return Ok(existing);
        }

        let mut metadata = Metadata::new();
        metadata.insert(ASSISTANT_ID_METADATA_KEY.to_string(), assistant_id.to_string());
        metadata.insert(USER_ID_METADATA_KEY.to_string(), user_id.to_string());

        let thread = self.client.create_thread(&metadata).await?;
        let record = ThreadRecord {
            id: thread.id,
            created_at: thread.created_at,
            assistant_id: assistant_id.to_string(),
            user_id: user_id.to_string(),
            metadata: thread.metadata,
        };
        let created_at = record.created_at.to_string();
        self.config.save(
            &record,
            &[&record.id, &created_at, &record.assistant_id, &record.user_id],
        )?;
        log::info!(
            "ConversationManager::ensure_thread(...): created thread {} for assistant {} and user {}",
            record.id,
            assistant_id,
            user_id
        );
        Ok(record)
    }

    /// Ids of `file_names` as readable by `assistant_id`, in input order.
    ///
    /// Files not uploaded for this assistant before are read from the application's
    /// `data/` directory, uploaded, attached and recorded.
    pub async fn ensure_files(
        &self,
        assistant_id: &str,
        file_names: &[String],
    ) -> Result<Vec<String>, LifecycleError> {
        let mut file_ids = Vec::with_capacity(file_names.len());

        for file_name in file_names {
            if let Some(existing) = self.find_uploaded_file(assistant_id, file_name)? {
                log::debug!(
                    "ConversationManager::ensure_files(...): reusing {} for '{}'",
                    existing.id,
                    file_name
                );
                file_ids.push(existing.id);
                continue;
            }

            let upload = FileUpload::for_assistants(self.paths.data_dir().join(file_name));
            let file = self.client.upload_file(&upload).await?;
            self.client
                .create_assistant_file(assistant_id, &file.id)
                .await?;

            let record = UploadedFileRecord {
                id: file.id,
                assistant_id: assistant_id.to_string(),
                original_file_name: file_name.clone(),
                created_at: file.created_at,
            };
            self.config
                .save(&record, &[&record.id, &record.assistant_id])?;
            log::info!(
                "ConversationManager::ensure_files(...): attached '{}' as {} to assistant {}",
                file_name,
                record.id,
                assistant_id
            );
            file_ids.push(record.id);
        }

        Ok(file_ids)
    }

    /// Post a user message on `thread_id` and record it.
    pub async fn post_message(
        &self,
        thread_id: &str,
        user_id: &str,
        text: &str,
        file_ids: &[String],
        metadata: &Metadata,
    ) -> Result<MessageRecord, LifecycleError> {
        let message = NewMessage {
            file_ids: file_ids.to_vec(),
            metadata: metadata.clone(),
            ..NewMessage::user(text)
        };
        let posted = self.client.create_message(thread_id, &message).await?;
        let record = MessageRecord::from_message(&posted, user_id);
        self.save_message(&record)?;
        Ok(record)
    }

    /// Ask the provider to run `assistant_id` over `thread_id`.
    pub async fn start_run(&self, thread_id: &str, assistant_id: &str) -> Result<Run, LifecycleError> {
        let run = self.client.create_run(thread_id, assistant_id).await?;
        log::info!(
            "ConversationManager::start_run(...): run {} on thread {} is {}",
            run.id,
            thread_id,
            run.status
        );
        Ok(run)
    }

    /// Start a run and wait for it to leave the pending states.
    pub async fn run_thread(
        &self,
        thread_id: &str,
        assistant_id: &str,
        user_id: &str,
        policy: &WaitPolicy,
        cancel: &CancellationToken,
    ) -> Result<RunOutcome, LifecycleError> {
        let run = self.start_run(thread_id, assistant_id).await?;
        self.wait_for_run(&run, user_id, policy, cancel).await
    }

    /// Poll `run` until it is terminal, the policy is exhausted, or `cancel` fires.
    ///
    /// A terminal run is recorded exactly once. Timeouts and cancellation record nothing.
    pub async fn wait_for_run(
        &self,
        run: &Run,
        user_id: &str,
        policy: &WaitPolicy,
        cancel: &CancellationToken,
    ) -> Result<RunOutcome, LifecycleError> {
        let client = &self.client;
        let result = poll_until(
            policy,
            cancel,
            |attempt| async move {
                let current = client.retrieve_run(&run.thread_id, &run.id).await?;
                log::debug!(
                    "ConversationManager::wait_for_run(...): run {} is {} after attempt {}",
                    current.id,
                    current.status,
                    attempt
                );
                Ok::<_, LifecycleError>(current)
            },
            |current: &Run| !current.status.is_pending(),
        )
        .await?;

        match result {
            WaitResult::Done { value, .. } => {
                let record = RunRecord::from_run(&value, user_id);
                self.run_logs
                    .save(&record, &[&record.id, &record.thread_id, &record.user_id])?;
                if record.status == RunStatus::Completed {
                    log::info!(
                        "ConversationManager::wait_for_run(...): run {} completed",
                        record.id
                    );
                    Ok(RunOutcome::Completed(record))
                } else {
                    log::warn!(
                        "ConversationManager::wait_for_run(...): run {} ended as {}{}",
                        record.id,
                        record.status,
                        record
                            .last_error
                            .as_ref()
                            .map(|e| format!(" ({}: {})", e.code, e.message))
                            .unwrap_or_default()
                    );
                    Ok(RunOutcome::Failed(record))
                }
            }
            WaitResult::Exhausted { last, attempts } => {
                let last_status = last.map(|r| r.status).unwrap_or(run.status);
                log::warn!(
                    "ConversationManager::wait_for_run(...): run {} still {} after {} attempt(s)",
                    run.id,
                    last_status,
                    attempts
                );
                Ok(RunOutcome::TimedOut {
                    run_id: run.id.clone(),
                    attempts,
                    last_status,
                })
            }
            WaitResult::Cancelled { .. } => {
                log::info!(
                    "ConversationManager::wait_for_run(...): wait for run {} cancelled",
                    run.id
                );
                Err(LifecycleError::Cancelled {
                    run_id: run.id.clone(),
                })
            }
        }
    }

    /// The newest message of `thread_id`, recorded for `user_id` when the assistant
    /// wrote it.
    pub async fn latest_assistant_message(
        &self,
        thread_id: &str,
        user_id: &str,
    ) -> Result<LatestReply, LifecycleError> {
        let messages = self.client.list_messages(thread_id).await?;
        let Some(newest) = messages.first() else {
            log::warn!(
                "ConversationManager::latest_assistant_message(...): thread {} has no messages",
                thread_id
            );
            return Ok(LatestReply::Empty);
        };

        if newest.role != MessageRole::Assistant {
            log::warn!(
                "ConversationManager::latest_assistant_message(...): newest message {} on thread {} is from {}",
                newest.id,
                thread_id,
                newest.role
            );
            return Ok(LatestReply::NotReady { role: newest.role });
        }

        let record = MessageRecord::from_message(newest, user_id);
        self.save_message(&record)?;
        Ok(LatestReply::Ready(record))
    }

    /// One full interaction: resolve the assistant, thread and files, post the message,
    /// run the thread and, if the run completed, fetch the reply.
    pub async fn ask(
        &self,
        request: &ConversationRequest,
        policy: &WaitPolicy,
        cancel: &CancellationToken,
    ) -> Result<Exchange, LifecycleError> {
        let assistant = self.ensure_assistant(&request.assistant).await?;
        let thread = self.ensure_thread(&assistant.id, &request.user_id).await?;
        let file_ids = self.ensure_files(&assistant.id, &request.file_names).await?;

        let message = self
            .post_message(
                &thread.id,
                &request.user_id,
                &request.message,
                &file_ids,
                &request.metadata,
            )
            .await?;
        let outcome = self
            .run_thread(&thread.id, &assistant.id, &request.user_id, policy, cancel)
            .await?;

        let reply = if outcome.is_completed() {
            Some(
                self.latest_assistant_message(&thread.id, &request.user_id)
                    .await?,
            )
        } else {
            None
        };

        Ok(Exchange {
            assistant_id: assistant.id,
            thread_id: thread.id,
            file_ids,
            message,
            outcome,
            reply,
        })
    }

    fn save_message(&self, record: &MessageRecord) -> Result<(), StoreError> {
        self.messages.save(
            record,
            &[
                &record.id,
                &record.thread_id,
                &record.user_id,
                record.role.as_str(),
            ],
        )?;
        Ok(())
    }
}

/// `_{part}_{part}.json` with each part sanitized the way the store names files.
fn suffix_of(parts: &[&str]) -> String {
    let mut suffix = String::new();
    for part in parts {
        suffix.push('_');
        suffix.push_str(&sanitize_component(part));
    }
    suffix.push_str(RECORD_EXTENSION);
    suffix
}
