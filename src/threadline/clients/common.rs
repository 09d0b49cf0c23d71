//! Plumbing shared by the provider clients: one pooled HTTP client for the whole process
//! and the mapping from raw HTTP responses to typed results.

use crate::threadline::error::ClientError;
use lazy_static::lazy_static;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;

lazy_static! {
    static ref SHARED_HTTP_CLIENT: reqwest::Client = build_http_client();
}

/// The process-wide HTTP client.
///
/// Cloning a `reqwest::Client` shares its connection pool, so every provider client built
/// from this one reuses TCP and TLS sessions.
pub fn get_shared_http_client() -> &'static reqwest::Client {
    &SHARED_HTTP_CLIENT
}

fn build_http_client() -> reqwest::Client {
    reqwest::ClientBuilder::new()
        .pool_idle_timeout(Some(Duration::from_secs(90)))
        .pool_max_idle_per_host(10)
        .tcp_keepalive(Some(Duration::from_secs(60)))
        .connect_timeout(Duration::from_secs(30))
        .build()
        .unwrap_or_else(|err| {
            log::error!(
                "threadline::clients::common::build_http_client(): falling back to default client: {}",
                err
            );
            reqwest::Client::new()
        })
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

/// Turn a provider response into `T`, or into the provider's own error message.
pub async fn decode_response<T: DeserializeOwned>(
    context: &str,
    response: reqwest::Response,
) -> Result<T, ClientError> {
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        let message = provider_error_message(&body);
        log::error!("{}: provider returned {}: {}", context, status.as_u16(), message);
        return Err(ClientError::Api {
            status: status.as_u16(),
            message,
        });
    }

    serde_json::from_str(&body).map_err(|err| {
        log::error!("{}: undecodable response body: {}", context, err);
        ClientError::Decode(format!("{}: {}", context, err))
    })
}

/// The `error.message` of a provider error body, or the raw body when it has none.
pub fn provider_error_message(body: &str) -> String {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => envelope.error.message,
        Err(_) if body.trim().is_empty() => "empty response body".to_string(),
        Err(_) => body.trim().to_string(),
    }
}
