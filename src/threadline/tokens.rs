//! Prompt size checks and the catalog of known chat models.
//!
//! Exact tokenization is model specific and left to a [`TokenCounter`] supplied by the
//! caller. [`EstimatingCounter`] is a cheap stand-in that is close enough to refuse
//! prompts that clearly cannot fit.

/// Tokens reserved on top of the user prompt for the chat message framing.
pub const MESSAGE_OVERHEAD_TOKENS: usize = 32;
/// Response size assumed when none is given.
pub const DEFAULT_AVERAGE_RESPONSE_TOKENS: usize = 1000;

/// Counts the tokens a model would see for a piece of text.
pub trait TokenCounter {
    fn count_tokens(&self, text: &str) -> usize;
}

/// Approximates one token per four bytes of text, never less than one.
#[derive(Debug, Clone, Copy, Default)]
pub struct EstimatingCounter;

impl TokenCounter for EstimatingCounter {
    fn count_tokens(&self, text: &str) -> usize {
        (text.len() / 4).max(1)
    }
}

/// Whether a prompt pair plus an average response fits under `max_token_limit`.
///
/// The user prompt is charged [`MESSAGE_OVERHEAD_TOKENS`] extra. A refusal is logged.
pub fn check_token_budget(
    counter: &dyn TokenCounter,
    system_prompt: &str,
    user_prompt: &str,
    max_token_limit: usize,
    average_response_tokens: usize,
) -> bool {
    let system_tokens = counter.count_tokens(system_prompt);
    let user_tokens = counter.count_tokens(user_prompt) + MESSAGE_OVERHEAD_TOKENS;
    let needed = system_tokens + user_tokens + average_response_tokens;

    if needed < max_token_limit {
        return true;
    }
    log::warn!(
        "check_token_budget(...): too many tokens to send ({} needed, limit {}); choose another model or shorten the prompts",
        needed,
        max_token_limit
    );
    false
}

/// Context size and price of a chat model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelInfo {
    pub name: &'static str,
    pub max_tokens_supported: usize,
    /// US dollars per thousand tokens.
    pub cost_per_1k_tokens: f64,
}

pub const LATEST_MODELS: &[ModelInfo] = &[
    ModelInfo {
        name: "gpt-3.5-turbo-1106",
        max_tokens_supported: 4096,
        cost_per_1k_tokens: 0.0030,
    },
    ModelInfo {
        name: "gpt-4-1106-preview",
        max_tokens_supported: 128_000,
        cost_per_1k_tokens: 0.04,
    },
];

pub const HISTORICAL_MODELS: &[ModelInfo] = &[
    ModelInfo {
        name: "gpt-3.5-turbo",
        max_tokens_supported: 4000,
        cost_per_1k_tokens: 0.0030,
    },
    ModelInfo {
        name: "gpt-4",
        max_tokens_supported: 16_000,
        cost_per_1k_tokens: 0.009,
    },
    ModelInfo {
        name: "gpt-4-32k",
        max_tokens_supported: 32_000,
        cost_per_1k_tokens: 0.18,
    },
];

/// Look `name` up in the latest catalog first, then the historical one.
pub fn find_model(name: &str) -> Option<&'static ModelInfo> {
    LATEST_MODELS
        .iter()
        .chain(HISTORICAL_MODELS.iter())
        .find(|model| model.name == name)
}
