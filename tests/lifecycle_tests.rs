use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use threadline::error::{ClientError, LifecycleError, StoreError};
use threadline::lifecycle::{ConversationManager, ConversationRequest, LatestReply, RunOutcome};
use threadline::records::{
    Assistant, AssistantFile, FileObject, Metadata, MessageContent, MessageRecord, MessageRole,
    Run, RunRecord, RunStatus, Thread, ThreadMessage, ThreadRecord,
};
use threadline::resource_client::{AssistantSpec, FileUpload, NewMessage, ResourceClient};
use threadline::wait::WaitPolicy;
use threadline::AppPaths;
use tokio_util::sync::CancellationToken;

const APPLICATION: &str = "review_resume";

#[derive(Default)]
struct StubState {
    next_id: u32,
    assistants_created: u32,
    threads_created: u32,
    thread_metadata: Vec<Metadata>,
    uploads: Vec<String>,
    attachments: Vec<(String, String)>,
    runs_created: u32,
    retrieve_calls: u32,
    /// Statuses returned by successive `retrieve_run` calls; the last one repeats.
    run_script: VecDeque<RunStatus>,
    /// Assistant text appended to the thread when a run completes.
    reply_text: Option<String>,
    /// Answer `create_assistant` without echoing the requested name.
    blank_names: bool,
    /// Oldest first.
    messages: HashMap<String, Vec<ThreadMessage>>,
}

impl StubState {
    fn next(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }
}

/// Scripted in-memory provider.
#[derive(Default)]
struct StubClient {
    state: Mutex<StubState>,
}

impl StubClient {
    fn with_runs(statuses: &[RunStatus]) -> Self {
        let stub = StubClient::default();
        stub.state.lock().unwrap().run_script = statuses.iter().copied().collect();
        stub
    }

    fn replying(self, text: &str) -> Self {
        self.state.lock().unwrap().reply_text = Some(text.to_string());
        self
    }

    fn with_blank_names(self) -> Self {
        self.state.lock().unwrap().blank_names = true;
        self
    }

    fn push_message(&self, thread_id: &str, role: MessageRole, text: &str) -> String {
        let mut state = self.state.lock().unwrap();
        let n = state.next();
        let message = ThreadMessage {
            id: format!("msg_{}", n),
            thread_id: thread_id.to_string(),
            role,
            content: vec![MessageContent::Text {
                value: text.to_string(),
            }],
            run_id: None,
            assistant_id: None,
            file_ids: Vec::new(),
            metadata: Metadata::new(),
            created_at: 1_700_000_000 + n as i64,
        };
        let id = message.id.clone();
        state
            .messages
            .entry(thread_id.to_string())
            .or_default()
            .push(message);
        id
    }

    fn snapshot<T>(&self, read: impl FnOnce(&StubState) -> T) -> T {
        read(&self.state.lock().unwrap())
    }
}

#[async_trait]
impl ResourceClient for StubClient {
    async fn create_assistant(&self, spec: &AssistantSpec) -> Result<Assistant, ClientError> {
        let mut state = self.state.lock().unwrap();
        let n = state.next();
        state.assistants_created += 1;
        Ok(Assistant {
            id: format!("asst_{}", n),
            name: if state.blank_names {
                String::new()
            } else {
                spec.name.clone()
            },
            instructions: spec.instructions.clone(),
            model: spec.model.clone(),
            tool_type: spec.tool_type.clone(),
            metadata: spec.metadata.clone(),
            created_at: 1_700_000_000,
        })
    }

    async fn create_thread(&self, metadata: &Metadata) -> Result<Thread, ClientError> {
        let mut state = self.state.lock().unwrap();
        let n = state.next();
        state.threads_created += 1;
        state.thread_metadata.push(metadata.clone());
        Ok(Thread {
            id: format!("thread_{}", n),
            created_at: 1_700_000_000 + n as i64,
            metadata: metadata.clone(),
        })
    }

    async fn upload_file(&self, upload: &FileUpload) -> Result<FileObject, ClientError> {
        if !upload.path.is_file() {
            return Err(ClientError::File {
                path: upload.path.clone(),
                source: std::io::Error::from(std::io::ErrorKind::NotFound),
            });
        }
        let mut state = self.state.lock().unwrap();
        let n = state.next();
        state.uploads.push(upload.file_name.clone());
        Ok(FileObject {
            id: format!("file-{}", n),
            filename: upload.file_name.clone(),
            purpose: upload.purpose.clone(),
            bytes: 42,
            created_at: 1_700_000_000 + n as i64,
        })
    }

    async fn create_assistant_file(
        &self,
        assistant_id: &str,
        file_id: &str,
    ) -> Result<AssistantFile, ClientError> {
        let mut state = self.state.lock().unwrap();
        state
            .attachments
            .push((assistant_id.to_string(), file_id.to_string()));
        Ok(AssistantFile {
            id: file_id.to_string(),
            assistant_id: assistant_id.to_string(),
            created_at: 1_700_000_000,
        })
    }

    async fn create_message(
        &self,
        thread_id: &str,
        message: &NewMessage,
    ) -> Result<ThreadMessage, ClientError> {
        let id = self.push_message(thread_id, message.role, &message.content);
        let state = self.state.lock().unwrap();
        let mut posted = state.messages[thread_id]
            .iter()
            .find(|m| m.id == id)
            .cloned()
            .ok_or_else(|| ClientError::UnexpectedResponse(id.clone()))?;
        posted.file_ids = message.file_ids.clone();
        Ok(posted)
    }

    async fn create_run(&self, thread_id: &str, assistant_id: &str) -> Result<Run, ClientError> {
        let mut state = self.state.lock().unwrap();
        let n = state.next();
        state.runs_created += 1;
        Ok(run(&format!("run_{}", n), thread_id, assistant_id, RunStatus::Queued))
    }

    async fn retrieve_run(&self, thread_id: &str, run_id: &str) -> Result<Run, ClientError> {
        let status = {
            let mut state = self.state.lock().unwrap();
            state.retrieve_calls += 1;
            let next = if state.run_script.len() > 1 {
                state.run_script.pop_front()
            } else {
                state.run_script.front().copied()
            };
            next.unwrap_or(RunStatus::InProgress)
        };

        if status == RunStatus::Completed {
            let reply = self.state.lock().unwrap().reply_text.clone();
            if let Some(text) = reply {
                self.push_message(thread_id, MessageRole::Assistant, &text);
            }
        }
        Ok(run(run_id, thread_id, "asst_any", status))
    }

    async fn list_messages(&self, thread_id: &str) -> Result<Vec<ThreadMessage>, ClientError> {
        let state = self.state.lock().unwrap();
        let mut messages = state.messages.get(thread_id).cloned().unwrap_or_default();
        messages.reverse();
        Ok(messages)
    }
}

fn run(id: &str, thread_id: &str, assistant_id: &str, status: RunStatus) -> Run {
    Run {
        id: id.to_string(),
        thread_id: thread_id.to_string(),
        assistant_id: assistant_id.to_string(),
        status,
        created_at: 1_700_000_000,
        started_at: None,
        completed_at: (status == RunStatus::Completed).then_some(1_700_000_100),
        expires_at: None,
        failed_at: (status == RunStatus::Failed).then_some(1_700_000_100),
        cancelled_at: None,
        last_error: None,
    }
}

fn setup(stub: &Arc<StubClient>) -> (TempDir, ConversationManager) {
    let dir = TempDir::new().unwrap();
    let manager = ConversationManager::new(stub.clone(), AppPaths::new(dir.path(), APPLICATION));
    (dir, manager)
}

fn quick_policy(max_attempts: u32) -> WaitPolicy {
    WaitPolicy::new(Duration::from_millis(1), max_attempts)
}

fn resume_helper() -> AssistantSpec {
    AssistantSpec::new("Resume Helper", "You are an experienced recruiter.")
}

fn json_files(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = match fs::read_dir(dir) {
        Ok(entries) => entries
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .filter(|name| name.ends_with(".json"))
            .collect(),
        Err(_) => Vec::new(),
    };
    names.sort();
    names
}

#[tokio::test]
async fn test_ensure_assistant_creates_once() {
    let stub = Arc::new(StubClient::default());
    let (_dir, manager) = setup(&stub);

    let first = manager.ensure_assistant(&resume_helper()).await.unwrap();
    let second = manager.ensure_assistant(&resume_helper()).await.unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(first, second);
    assert_eq!(stub.snapshot(|s| s.assistants_created), 1);
    assert_eq!(
        json_files(&manager.paths().config_dir()),
        vec![format!("{}_Resume Helper.json", first.id)]
    );
}

#[tokio::test]
async fn test_assistant_is_recorded_under_the_requested_name() {
    let stub = Arc::new(StubClient::default().with_blank_names());
    let (_dir, manager) = setup(&stub);

    let first = manager.ensure_assistant(&resume_helper()).await.unwrap();
    let second = manager.ensure_assistant(&resume_helper()).await.unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(first.name, "Resume Helper");
    assert_eq!(stub.snapshot(|s| s.assistants_created), 1);
    assert_eq!(
        json_files(&manager.paths().config_dir()),
        vec![format!("{}_Resume Helper.json", first.id)]
    );
}

#[tokio::test]
async fn test_assistants_are_looked_up_by_exact_name() {
    let stub = Arc::new(StubClient::default());
    let (_dir, manager) = setup(&stub);

    let helper = manager.ensure_assistant(&resume_helper()).await.unwrap();
    let other = manager
        .ensure_assistant(&AssistantSpec::new("Helper", "Short name sharing a suffix."))
        .await
        .unwrap();

    assert_ne!(helper.id, other.id);
    assert_eq!(stub.snapshot(|s| s.assistants_created), 2);
}

#[tokio::test]
async fn test_ensure_thread_is_idempotent_per_user() {
    let stub = Arc::new(StubClient::default());
    let (_dir, manager) = setup(&stub);

    let first = manager.ensure_thread("asst_1", "1").await.unwrap();
    let again = manager.ensure_thread("asst_1", "1").await.unwrap();
    let other_user = manager.ensure_thread("asst_1", "2").await.unwrap();

    assert_eq!(first, again);
    assert_ne!(first.id, other_user.id);
    assert_eq!(stub.snapshot(|s| s.threads_created), 2);

    let metadata = stub.snapshot(|s| s.thread_metadata[0].clone());
    assert_eq!(metadata.get("assistantId").map(String::as_str), Some("asst_1"));
    assert_eq!(metadata.get("userId").map(String::as_str), Some("1"));

    let expected = format!("{}_{}_asst_1_1.json", first.id, first.created_at);
    assert!(json_files(&manager.paths().config_dir()).contains(&expected));
}

#[tokio::test]
async fn test_ensure_files_uploads_each_file_once() {
    let stub = Arc::new(StubClient::default());
    let (_dir, manager) = setup(&stub);
    let data_dir = manager.paths().data_dir();
    fs::create_dir_all(&data_dir).unwrap();
    fs::write(data_dir.join("resume.pdf"), b"%PDF-1.4").unwrap();
    fs::write(data_dir.join("cover.txt"), b"Dear hiring manager").unwrap();

    let names = vec!["resume.pdf".to_string(), "cover.txt".to_string()];
    let first = manager.ensure_files("asst_1", &names).await.unwrap();
    let second = manager.ensure_files("asst_1", &names).await.unwrap();

    assert_eq!(first.len(), 2);
    assert_eq!(first, second);
    assert_eq!(stub.snapshot(|s| s.uploads.clone()), names);
    assert_eq!(
        stub.snapshot(|s| s.attachments.clone()),
        vec![
            ("asst_1".to_string(), first[0].clone()),
            ("asst_1".to_string(), first[1].clone()),
        ]
    );

    // Another assistant gets its own upload of the same file.
    manager
        .ensure_files("asst_2", &names[..1])
        .await
        .unwrap();
    assert_eq!(stub.snapshot(|s| s.uploads.len()), 3);
}

#[tokio::test]
async fn test_missing_upload_is_a_client_error() {
    let stub = Arc::new(StubClient::default());
    let (_dir, manager) = setup(&stub);

    let err = manager
        .ensure_files("asst_1", &["nowhere.pdf".to_string()])
        .await
        .unwrap_err();

    assert!(matches!(err, LifecycleError::Client(ClientError::File { .. })));
    assert!(json_files(&manager.paths().config_dir()).is_empty());
}

#[tokio::test]
async fn test_run_completes_after_polling() {
    let stub = Arc::new(StubClient::with_runs(&[
        RunStatus::InProgress,
        RunStatus::InProgress,
        RunStatus::Completed,
    ]));
    let (_dir, manager) = setup(&stub);

    let outcome = manager
        .run_thread(
            "thread_1",
            "asst_1",
            "1",
            &quick_policy(3),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    let RunOutcome::Completed(record) = &outcome else {
        panic!("expected a completed run, got {:?}", outcome);
    };
    assert_eq!(record.status, RunStatus::Completed);
    assert_eq!(record.user_id, "1");
    assert_eq!(stub.snapshot(|s| s.retrieve_calls), 3);

    let logs = json_files(&manager.paths().run_logs_dir());
    assert_eq!(logs, vec![format!("{}_thread_1_1.json", record.id)]);
    let stored: RunRecord = manager.run_log_store().load(&logs[0]).unwrap();
    assert_eq!(&stored, record);
}

#[tokio::test]
async fn test_run_that_never_finishes_times_out_without_a_record() {
    let stub = Arc::new(StubClient::with_runs(&[RunStatus::InProgress]));
    let (_dir, manager) = setup(&stub);

    let outcome = manager
        .run_thread(
            "thread_1",
            "asst_1",
            "1",
            &quick_policy(2),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    match outcome {
        RunOutcome::TimedOut {
            attempts,
            last_status,
            ..
        } => {
            assert_eq!(attempts, 2);
            assert_eq!(last_status, RunStatus::InProgress);
        }
        other => panic!("expected a timeout, got {:?}", other),
    }
    assert!(json_files(&manager.paths().run_logs_dir()).is_empty());
}

#[tokio::test]
async fn test_failed_and_action_required_runs_are_terminal() {
    for status in [RunStatus::Failed, RunStatus::RequiresAction, RunStatus::Expired] {
        let stub = Arc::new(StubClient::with_runs(&[RunStatus::Queued, status]));
        let (_dir, manager) = setup(&stub);

        let outcome = manager
            .run_thread(
                "thread_1",
                "asst_1",
                "1",
                &quick_policy(5),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        match &outcome {
            RunOutcome::Failed(record) => assert_eq!(record.status, status),
            other => panic!("expected {} to fail the run, got {:?}", status, other),
        }
        assert_eq!(json_files(&manager.paths().run_logs_dir()).len(), 1);
    }
}

#[tokio::test]
async fn test_cancelled_wait_records_nothing() {
    let stub = Arc::new(StubClient::with_runs(&[RunStatus::Completed]));
    let (_dir, manager) = setup(&stub);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = manager
        .run_thread(
            "thread_1",
            "asst_1",
            "1",
            &WaitPolicy::new(Duration::from_secs(30), 5),
            &cancel,
        )
        .await
        .unwrap_err();

    assert!(matches!(err, LifecycleError::Cancelled { .. }));
    assert_eq!(stub.snapshot(|s| s.retrieve_calls), 0);
    assert!(json_files(&manager.paths().run_logs_dir()).is_empty());
}

#[tokio::test]
async fn test_latest_message_from_user_is_not_ready() {
    let stub = Arc::new(StubClient::default());
    let (_dir, manager) = setup(&stub);

    let posted = manager
        .post_message("thread_1", "1", "Any feedback?", &[], &Metadata::new())
        .await
        .unwrap();
    let reply = manager
        .latest_assistant_message("thread_1", "1")
        .await
        .unwrap();

    assert_eq!(
        reply,
        LatestReply::NotReady {
            role: MessageRole::User
        }
    );
    assert_eq!(
        json_files(&manager.paths().messages_dir()),
        vec![format!("{}_thread_1_1_user.json", posted.id)]
    );
}

#[tokio::test]
async fn test_latest_message_from_assistant_is_recorded() {
    let stub = Arc::new(StubClient::default());
    let (_dir, manager) = setup(&stub);
    stub.push_message("thread_1", MessageRole::User, "Any feedback?");
    let reply_id = stub.push_message("thread_1", MessageRole::Assistant, "Lead with impact.");

    let reply = manager
        .latest_assistant_message("thread_1", "1")
        .await
        .unwrap();

    let LatestReply::Ready(record) = reply else {
        panic!("expected a ready reply, got {:?}", reply);
    };
    assert_eq!(record.id, reply_id);
    assert_eq!(record.thread_id, "thread_1");
    assert_eq!(record.response_text, "Lead with impact.");
    assert_eq!(record.response_type, "text");

    let files = json_files(&manager.paths().messages_dir());
    assert_eq!(files, vec![format!("{}_thread_1_1_assistant.json", reply_id)]);
    let stored: MessageRecord = manager.message_store().load(&files[0]).unwrap();
    assert_eq!(stored, record);
}

#[tokio::test]
async fn test_empty_thread_has_no_reply() {
    let stub = Arc::new(StubClient::default());
    let (_dir, manager) = setup(&stub);

    let reply = manager
        .latest_assistant_message("thread_1", "1")
        .await
        .unwrap();

    assert_eq!(reply, LatestReply::Empty);
    assert!(json_files(&manager.paths().messages_dir()).is_empty());
}

#[tokio::test]
async fn test_resume_helper_conversation() {
    let stub = Arc::new(
        StubClient::with_runs(&[RunStatus::InProgress, RunStatus::Completed])
            .replying("Your resume is strong; quantify the results."),
    );
    let (_dir, manager) = setup(&stub);
    let data_dir = manager.paths().data_dir();
    fs::create_dir_all(&data_dir).unwrap();
    fs::write(data_dir.join("resume.pdf"), b"%PDF-1.4").unwrap();

    let request = ConversationRequest::new(resume_helper(), "1", "Please review my resume.")
        .with_files(vec!["resume.pdf".to_string()]);
    let exchange = manager
        .ask(&request, &quick_policy(5), &CancellationToken::new())
        .await
        .unwrap();

    assert!(exchange.outcome.is_completed());
    assert_eq!(exchange.file_ids.len(), 1);
    assert_eq!(exchange.message.role, MessageRole::User);
    match &exchange.reply {
        Some(LatestReply::Ready(reply)) => {
            assert_eq!(reply.thread_id, exchange.thread_id);
            assert_eq!(reply.user_id, "1");
            assert_eq!(
                reply.response_text,
                "Your resume is strong; quantify the results."
            );
        }
        other => panic!("expected a ready reply, got {:?}", other),
    }

    let messages = json_files(&manager.paths().messages_dir());
    let assistant_files: Vec<_> = messages
        .iter()
        .filter(|name| name.ends_with("_1_assistant.json"))
        .collect();
    assert_eq!(assistant_files.len(), 1);
    assert_eq!(messages.len(), 2);
    assert_eq!(json_files(&manager.paths().run_logs_dir()).len(), 1);

    // A follow-up reuses the assistant, thread and upload.
    let follow_up = ConversationRequest::new(resume_helper(), "1", "And the cover letter?")
        .with_files(vec!["resume.pdf".to_string()]);
    let second = manager
        .ask(&follow_up, &quick_policy(5), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(second.assistant_id, exchange.assistant_id);
    assert_eq!(second.thread_id, exchange.thread_id);
    assert_eq!(second.file_ids, exchange.file_ids);
    stub.snapshot(|s| {
        assert_eq!(s.assistants_created, 1);
        assert_eq!(s.threads_created, 1);
        assert_eq!(s.uploads.len(), 1);
        assert_eq!(s.runs_created, 2);
    });
}

#[tokio::test]
async fn test_timed_out_ask_has_no_reply() {
    let stub = Arc::new(StubClient::with_runs(&[RunStatus::Queued]).replying("too late"));
    let (_dir, manager) = setup(&stub);

    let request = ConversationRequest::new(resume_helper(), "1", "Hello?");
    let exchange = manager
        .ask(&request, &quick_policy(2), &CancellationToken::new())
        .await
        .unwrap();

    assert!(matches!(exchange.outcome, RunOutcome::TimedOut { .. }));
    assert!(exchange.reply.is_none());
    assert_eq!(json_files(&manager.paths().messages_dir()).len(), 1);
}

#[tokio::test]
async fn test_duplicate_thread_records_are_reported() {
    let stub = Arc::new(StubClient::default());
    let (_dir, manager) = setup(&stub);
    let store = manager.config_store();
    for (id, created_at) in [("thread_a", 1), ("thread_b", 2)] {
        let record = ThreadRecord {
            id: id.to_string(),
            created_at,
            assistant_id: "asst_1".to_string(),
            user_id: "1".to_string(),
            metadata: Metadata::new(),
        };
        let created = created_at.to_string();
        store
            .save(&record, &[id, &created, "asst_1", "1"])
            .unwrap();
    }

    let err = manager.ensure_thread("asst_1", "1").await.unwrap_err();

    match err {
        LifecycleError::Store(StoreError::Duplicate { kind, files, .. }) => {
            assert_eq!(kind, "thread");
            assert_eq!(files.len(), 2);
        }
        other => panic!("expected a duplicate error, got {:?}", other),
    }
    assert_eq!(stub.snapshot(|s| s.threads_created), 0);
}

#[tokio::test]
async fn test_corrupt_assistant_record_prevents_creation() {
    let stub = Arc::new(StubClient::default());
    let (_dir, manager) = setup(&stub);
    let config_dir = manager.paths().config_dir();
    fs::create_dir_all(&config_dir).unwrap();
    fs::write(config_dir.join("asst_9_Resume Helper.json"), b"{ not json").unwrap();

    let err = manager.ensure_assistant(&resume_helper()).await.unwrap_err();

    assert!(matches!(
        err,
        LifecycleError::Store(StoreError::Corrupt { .. })
    ));
    assert_eq!(stub.snapshot(|s| s.assistants_created), 0);
}
