//! OpenRouter API client with SSE streaming
//!
//! Translates the provider's chat-completions stream into the internal
//! event vocabulary: Token*, then exactly one of Done or Failed. Provider
//! framing and transport errors never leak past this module.

use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::GatewayError;

const OPENROUTER_API_URL: &str = "https://openrouter.ai/api/v1/chat/completions";

/// Request timeout in seconds
const REQUEST_TIMEOUT_SECS: u64 = 120;
/// Max attempts while the stream has produced nothing yet
const MAX_RETRIES: u32 = 3;
/// Base delay for exponential backoff (ms)
const RETRY_BASE_DELAY_MS: u64 = 500;

/// Token counts as reported by the provider's final chunk. Zeros when the
/// provider omits usage; callers fall back to estimation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UsageCounts {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

/// Internal event vocabulary for one streaming call. Finite and one-shot:
/// Token* then exactly one terminal Done/Failed, unless the receiver is
/// dropped first.
#[derive(Debug)]
pub enum StreamEvent {
    Token(String),
    Done(UsageCounts),
    Failed(GatewayError),
}

/// Parameters for one upstream call.
#[derive(Debug, Clone)]
pub struct ChatParams {
    pub api_key: String,
    pub model: String,
    pub system_prompt: String,
    pub user_message: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// Start a streaming chat completion. Returns immediately; events arrive on
/// the channel from a spawned task. Dropping the receiver cancels the
/// upstream request promptly: the task stops consuming the body as soon as
/// a send fails.
pub fn stream_chat(params: ChatParams) -> mpsc::Receiver<StreamEvent> {
    let (tx, rx) = mpsc::channel(256);

    tokio::spawn(async move {
        let request = build_request(&params, true);
        let client = reqwest::Client::new();
        match drive_stream(&client, &params.api_key, &request, &tx).await {
            Ok(Some(usage)) => {
                let _ = tx.send(StreamEvent::Done(usage)).await;
            }
            Ok(None) => {
                // receiver dropped; nothing left to report
                tracing::debug!(model = %params.model, "stream cancelled by subscriber");
            }
            Err(e) => {
                let _ = tx.send(StreamEvent::Failed(e)).await;
            }
        }
    });

    rx
}

/// Non-streaming completion: collects the whole stream. Used by roster
/// generation, which needs a single JSON blob rather than live tokens.
pub async fn complete_simple(params: ChatParams) -> Result<String, GatewayError> {
    let mut rx = stream_chat(params);
    let mut response = String::new();

    while let Some(event) = rx.recv().await {
        match event {
            StreamEvent::Token(t) => response.push_str(&t),
            StreamEvent::Done(_) => break,
            StreamEvent::Failed(e) => return Err(e),
        }
    }

    Ok(response)
}

fn build_request(params: &ChatParams, stream: bool) -> ChatRequest {
    ChatRequest {
        model: params.model.clone(),
        messages: vec![
            ChatMessage {
                role: "system".into(),
                content: params.system_prompt.clone(),
            },
            ChatMessage {
                role: "user".into(),
                content: params.user_message.clone(),
            },
        ],
        stream,
        max_tokens: Some(params.max_tokens),
        temperature: Some(params.temperature),
        usage: Some(UsageRequest { include: true }),
    }
}

/// Run the stream with bounded retry. Retries only while no token has been
/// delivered; after partial output any failure is an interruption.
///
/// Ok(None) means the subscriber went away and the stream was abandoned.
async fn drive_stream(
    client: &reqwest::Client,
    api_key: &str,
    request: &ChatRequest,
    tx: &mpsc::Sender<StreamEvent>,
) -> Result<Option<UsageCounts>, GatewayError> {
    let mut last_error = None;

    for attempt in 0..MAX_RETRIES {
        if attempt > 0 {
            let delay = RETRY_BASE_DELAY_MS * (1 << (attempt - 1));
            tracing::debug!(attempt, delay_ms = delay, "retrying upstream request");
            tokio::time::sleep(std::time::Duration::from_millis(delay)).await;
        }

        match stream_attempt(client, api_key, request, tx).await {
            Ok(outcome) => return Ok(outcome),
            Err(e) => {
                if !e.is_retryable() {
                    return Err(e);
                }
                last_error = Some(e);
            }
        }
    }

    Err(last_error
        .unwrap_or_else(|| GatewayError::Unavailable("max retries exceeded".into())))
}

/// Single attempt. Classifies failures into the gateway taxonomy:
/// - connect/send errors and 429/5xx before any token -> Unavailable
/// - other non-success statuses -> Rejected
/// - body errors after partial delivery -> Interrupted
async fn stream_attempt(
    client: &reqwest::Client,
    api_key: &str,
    request: &ChatRequest,
    tx: &mpsc::Sender<StreamEvent>,
) -> Result<Option<UsageCounts>, GatewayError> {
    let response = client
        .post(OPENROUTER_API_URL)
        .header("Authorization", format!("Bearer {api_key}"))
        .header("Content-Type", "application/json")
        .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
        .json(request)
        .send()
        .await
        .map_err(|e| GatewayError::Unavailable(format!("failed to reach provider: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(classify_status(status.as_u16(), &body));
    }

    let mut usage = UsageCounts::default();
    let mut delivered = false;
    let mut bytes_stream = response.bytes_stream();

    // Buffer for incomplete SSE lines
    let mut buffer = String::new();

    while let Some(chunk) = bytes_stream.next().await {
        let chunk = match chunk {
            Ok(c) => c,
            Err(e) if delivered => {
                return Err(GatewayError::Interrupted(format!(
                    "stream dropped after partial output: {e}"
                )));
            }
            Err(e) => {
                return Err(GatewayError::Unavailable(format!("stream read error: {e}")));
            }
        };

        buffer.push_str(&String::from_utf8_lossy(&chunk));

        // Process complete lines
        while let Some(newline_pos) = buffer.find('\n') {
            let line = buffer[..newline_pos].trim().to_string();
            buffer = buffer[newline_pos + 1..].to_string();

            if line.is_empty() {
                continue;
            }

            let Some(data) = line.strip_prefix("data: ") else {
                continue;
            };
            if data == "[DONE]" {
                continue;
            }

            let Ok(parsed) = serde_json::from_str::<StreamChunk>(data) else {
                continue;
            };

            if let Some(content) = parsed
                .choices
                .first()
                .and_then(|c| c.delta.as_ref())
                .and_then(|d| d.content.as_ref())
            {
                if !content.is_empty() {
                    if tx.send(StreamEvent::Token(content.clone())).await.is_err() {
                        // Subscriber gone: drop the response to close the
                        // connection instead of buffering unread output.
                        return Ok(None);
                    }
                    delivered = true;
                }
            }

            if let Some(u) = parsed.usage {
                usage.prompt_tokens = u.prompt_tokens;
                usage.completion_tokens = u.completion_tokens;
            }
        }
    }

    Ok(Some(usage))
}

fn classify_status(status: u16, body: &str) -> GatewayError {
    let detail = format!("HTTP {status}: {}", truncate(body, 200));
    match status {
        429 | 500..=599 => GatewayError::Unavailable(detail),
        _ => GatewayError::Rejected(detail),
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

// ═══════════════════════════════════════════════════════════════
// API Types
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    usage: Option<UsageRequest>,
}

#[derive(Debug, Serialize)]
struct UsageRequest {
    include: bool,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    usage: Option<StreamUsage>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: Option<StreamDelta>,
}

#[derive(Debug, Deserialize)]
struct StreamDelta {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}
