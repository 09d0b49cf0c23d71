//! JSON-mode chat completions and their result files.
//!
//! A [`ChatRequest`] asks the model for a JSON object answer. The raw
//! [`ChatCompletion`] is flattened by [`format_chat_response`] into a
//! [`FormattedResponse`], which [`write_formatted_response`] stores as
//! `data/results/{model}_{created}.json`.
//!
//! # Example
//!
//! ```rust,no_run
//! use threadline::chat::{format_chat_response, write_formatted_response, ChatRequest};
//! use threadline::clients::openai::OpenAIClient;
//! use threadline::config_store::ConfigStore;
//! use threadline::{Credentials, ThreadlineConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ThreadlineConfig::default();
//!     let client = OpenAIClient::new(Credentials::from_dir("./local")?, &config);
//!
//!     let request = ChatRequest::new("You are a sports historian.", "Who won the 1998 World Cup?", "gpt-4-1106-preview");
//!     let completion = client.chat_completion(&request).await?;
//!     let formatted = format_chat_response(&completion, &request.system_prompt, &request.user_prompt)?;
//!
//!     let results = ConfigStore::new(config.app("sample_chat_app").results_dir());
//!     write_formatted_response(&results, &formatted)?;
//!     Ok(())
//! }
//! ```

use crate::threadline::config_store::ConfigStore;
use crate::threadline::error::{ClientError, StoreError};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::path::PathBuf;

/// Appended to every system prompt so the answer comes back as a single-line JSON object.
pub const JSON_OUTPUT_INSTRUCTION: &str = " #Output You will **ALWAYS** return your answer with keys in JSON format.  You will **NEVER** include linebreaks, indents, or extra formatting";

/// Format of [`FormattedResponse::date_time_formatted`] (UTC).
pub const DATE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A system + user prompt pair for one completion.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    pub system_prompt: String,
    pub user_prompt: String,
    pub model: String,
    pub temperature: f32,
}

impl ChatRequest {
    /// Request at temperature `1.0`.
    pub fn new(
        system_prompt: impl Into<String>,
        user_prompt: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        ChatRequest {
            system_prompt: system_prompt.into(),
            user_prompt: user_prompt.into(),
            model: model.into(),
            temperature: 1.0,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Request body for `POST /chat/completions`.
    pub fn to_payload(&self) -> Value {
        json!({
            "model": self.model,
            "temperature": self.temperature,
            "response_format": { "type": "json_object" },
            "messages": [
                {
                    "role": "system",
                    "content": format!("{}{}", self.system_prompt, JSON_OUTPUT_INSTRUCTION),
                },
                { "role": "user", "content": self.user_prompt },
            ],
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatCompletionMessage {
    pub role: String,
    pub content: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatChoice {
    #[serde(default)]
    pub index: u32,
    pub message: ChatCompletionMessage,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

/// Response of `POST /chat/completions`, shared by chat and vision requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatCompletion {
    pub id: String,
    /// Unix seconds.
    pub created: i64,
    pub model: String,
    pub choices: Vec<ChatChoice>,
    #[serde(default)]
    pub usage: Option<Usage>,
}

impl ChatCompletion {
    /// Content of the first choice.
    pub fn first_content(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|choice| choice.message.content.as_deref())
    }
}

/// A completion flattened for storage and later analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormattedResponse {
    pub answer: String,
    pub system_prompt: String,
    pub user_prompt: String,
    pub model: String,
    pub date_time_unix: i64,
    pub date_time_formatted: String,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

/// Flatten `completion` together with the prompts that produced it.
///
/// Line breaks are removed from the answer and a `"{  "` opener is collapsed to `"{"`.
/// A completion without a first choice is [`ClientError::UnexpectedResponse`].
pub fn format_chat_response(
    completion: &ChatCompletion,
    system_prompt: &str,
    user_prompt: &str,
) -> Result<FormattedResponse, ClientError> {
    let raw = completion.first_content().ok_or_else(|| {
        ClientError::UnexpectedResponse(format!("completion {} has no answer", completion.id))
    })?;
    let answer = raw.replace('\n', "").replace("{  ", "{");

    let date_time_formatted = chrono::DateTime::from_timestamp(completion.created, 0)
        .map(|dt| dt.format(DATE_TIME_FORMAT).to_string())
        .ok_or_else(|| {
            ClientError::UnexpectedResponse(format!(
                "completion {} has an invalid timestamp {}",
                completion.id, completion.created
            ))
        })?;
    let usage = completion.usage.unwrap_or_default();

    Ok(FormattedResponse {
        answer,
        system_prompt: system_prompt.to_string(),
        user_prompt: user_prompt.to_string(),
        model: completion.model.clone(),
        date_time_unix: completion.created,
        date_time_formatted,
        prompt_tokens: usage.prompt_tokens,
        completion_tokens: usage.completion_tokens,
        total_tokens: usage.total_tokens,
    })
}

/// Store `response` in `results` as `{model}_{date_time_unix}.json`.
pub fn write_formatted_response(
    results: &ConfigStore,
    response: &FormattedResponse,
) -> Result<PathBuf, StoreError> {
    let unix = response.date_time_unix.to_string();
    let path = results.save(response, &[&response.model, &unix])?;
    log::info!(
        "write_formatted_response(...): stored {} answer in {}",
        response.model,
        path.display()
    );
    Ok(path)
}
