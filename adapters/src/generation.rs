use async_trait::async_trait;
use cg_core::TextGenerator;
use config::UpstreamConfig;
use errors::UpstreamError;
use regex::Regex;
use reqwest::StatusCode;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use std::time::Duration;

static RETRY_DELAY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""retryDelay"\s*:\s*"(\d+(?:\.\d+)?)s""#).unwrap());

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: Vec<RequestPart<'a>>
}

#[derive(Debug, Serialize)]
struct RequestPart<'a> {
    text: &'a str
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>
}

/// Text-generation client for a `generateContent`-style HTTP endpoint.
///
/// One `generate` call is exactly one HTTP request. Rate limiting, server
/// errors, timeouts, connection failures and unreadable bodies are
/// transient; any other client error is fatal.
pub struct HttpTextGenerator {
    client: reqwest::Client,
    url: String,
    api_key: Option<String>,
    max_prompt_chars: usize
}

impl HttpTextGenerator {
    pub fn new(config: &UpstreamConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            url: format!(
                "{}/models/{}:generateContent",
                config.endpoint.trim_end_matches('/'),
                config.model
            ),
            api_key: config.api_key.clone(),
            max_prompt_chars: config.max_prompt_chars
        })
    }

    fn bound_prompt<'a>(&self, prompt: &'a str) -> &'a str {
        match prompt.char_indices().nth(self.max_prompt_chars) {
            Some((cut, _)) => {
                tracing::warn!(
                    max_chars = self.max_prompt_chars,
                    "Prompt exceeds upstream limit, truncating"
                );
                &prompt[..cut]
            }
            None => prompt
        }
    }
}

fn classify_status(status: StatusCode, headers: &HeaderMap, body: &str) -> UpstreamError {
    let reason = format!("{}: {}", status, body.chars().take(200).collect::<String>());
    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after_ms = retry_after_hint(headers, body);
        tracing::warn!(
            quota = quota_kind(body),
            retry_after_ms = ?retry_after_ms,
            "Upstream rate limit hit"
        );
        UpstreamError::rate_limited(reason, retry_after_ms)
    } else if status == StatusCode::REQUEST_TIMEOUT || status.is_server_error() {
        UpstreamError::transient(reason)
    } else {
        UpstreamError::fatal(reason)
    }
}

/// `Retry-After` in seconds, else the `retryDelay` of a Google-style
/// `RetryInfo` error detail.
fn retry_after_hint(headers: &HeaderMap, body: &str) -> Option<u64> {
    let from_header = headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(|secs| secs * 1_000);

    from_header.or_else(|| {
        RETRY_DELAY
            .captures(body)
            .and_then(|caps| caps[1].parse::<f64>().ok())
            .map(|secs| (secs * 1_000.0).ceil() as u64)
    })
}

fn quota_kind(body: &str) -> &'static str {
    let body = body.to_lowercase();
    if body.contains("requests per minute") || body.contains("rpm") {
        "requests_per_minute"
    } else if body.contains("requests per day") || body.contains("rpd") {
        "requests_per_day"
    } else if body.contains("tokens per minute") || body.contains("tpm") {
        "tokens_per_minute"
    } else {
        "unknown"
    }
}

fn classify_transport(err: &reqwest::Error) -> UpstreamError {
    if err.is_timeout() {
        UpstreamError::transient(format!("request timed out: {}", err))
    } else if err.is_connect() || err.is_request() {
        UpstreamError::transient(format!("connection failed: {}", err))
    } else if err.is_builder() {
        UpstreamError::fatal(format!("invalid request: {}", err))
    } else {
        UpstreamError::transient(err.to_string())
    }
}

fn extract_text(response: GenerateResponse) -> Result<String, UpstreamError> {
    if response.candidates.is_empty() {
        if let Some(reason) = response.prompt_feedback.and_then(|f| f.block_reason) {
            return Err(UpstreamError::fatal(format!("prompt blocked: {}", reason)));
        }
        return Err(UpstreamError::malformed("no candidates"));
    }

    let text: String = response
        .candidates
        .into_iter()
        .filter_map(|c| c.content)
        .flat_map(|c| c.parts)
        .filter_map(|p| p.text)
        .collect();

    if text.trim().is_empty() {
        return Err(UpstreamError::malformed("empty candidate text"));
    }
    Ok(text)
}

#[async_trait]
impl TextGenerator for HttpTextGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, UpstreamError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| UpstreamError::fatal("upstream API key not configured"))?;

        let request = GenerateRequest {
            contents: vec![Content {
                parts: vec![RequestPart {
                    text: self.bound_prompt(prompt)
                }]
            }]
        };

        let response = self
            .client
            .post(&self.url)
            .header("x-goog-api-key", api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| classify_transport(&e))?;

        let status = response.status();
        if !status.is_success() {
            let headers = response.headers().clone();
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = %status, "Upstream returned error status");
            return Err(classify_status(status, &headers, &body));
        }

        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|e| UpstreamError::malformed(e.to_string()))?;

        extract_text(body)
    }
}
