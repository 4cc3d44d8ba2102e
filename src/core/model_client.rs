//! Remote text generation behind a narrow streaming interface.

use std::error::Error as StdError;
use std::fmt;
use std::pin::Pin;

use futures_util::{Stream, StreamExt};
use memchr::memchr;
use tracing::debug;

use crate::api::{Content, GenerateContentRequest, GenerateContentResponse, GenerationConfig};
use crate::core::message::{Message, Role};
use crate::utils::url::model_method_url;

pub const DEFAULT_MODEL: &str = "gemini-3-pro-preview";
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const DEFAULT_SYSTEM_INSTRUCTION: &str = "You are Gemini, a helpful and highly intelligent AI assistant developed by Google. You provide clear, accurate, and concise answers. Use markdown for formatting. For code blocks, always specify the language.";

/// Lazy, finite, one-shot sequence of non-empty text fragments.
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<String, StreamError>> + Send>>;

/// Anything that can turn a message history into a stream of reply text.
pub trait ModelClient: Send + Sync {
    /// `history` ends with the prompt to answer; everything before it is
    /// prior context.
    fn stream_chat(&self, history: &[Message]) -> FragmentStream;
}

#[derive(Debug)]
pub enum StreamError {
    /// There was no prompt to send.
    EmptyHistory,
    /// The request never produced a usable response body.
    Transport(reqwest::Error),
    /// The service answered with an error status or an error payload.
    Api {
        status: Option<u16>,
        message: String,
    },
    /// A streamed payload could not be understood.
    Decode(String),
}

impl StreamError {
    fn api(status: Option<u16>, body: &str) -> Self {
        StreamError::Api {
            status,
            message: format_api_error(body),
        }
    }
}

impl fmt::Display for StreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamError::EmptyHistory => write!(f, "no prompt to send"),
            StreamError::Transport(err) => write!(f, "request failed: {err}"),
            StreamError::Api {
                status: Some(status),
                message,
            } => write!(f, "API error (HTTP {status}): {message}"),
            StreamError::Api {
                status: None,
                message,
            } => write!(f, "API error: {message}"),
            StreamError::Decode(payload) => write!(f, "unreadable stream payload: {payload}"),
        }
    }
}

impl StdError for StreamError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            StreamError::Transport(err) => Some(err),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for StreamError {
    fn from(err: reqwest::Error) -> Self {
        StreamError::Transport(err)
    }
}

fn extract_error_summary(value: &serde_json::Value) -> Option<String> {
    let summary = value
        .pointer("/error/message")
        .and_then(|v| v.as_str())
        .map(str::to_owned)
        .or_else(|| {
            value.get("error").and_then(|v| match v {
                serde_json::Value::String(s) => Some(s.to_string()),
                _ => None,
            })
        })
        .or_else(|| {
            value
                .get("message")
                .and_then(|v| v.as_str().map(str::to_owned))
        });

    summary.map(|text| text.split_whitespace().collect::<Vec<_>>().join(" "))
}

/// One-line description of an error body, preferring the JSON `message`.
pub fn format_api_error(error_text: &str) -> String {
    let trimmed = error_text.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    // Gemini wraps SSE errors and plain HTTP errors the same way, sometimes
    // inside a one-element array.
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(trimmed) {
        let value = match value {
            serde_json::Value::Array(mut items) if items.len() == 1 => items.remove(0),
            other => other,
        };
        if let Some(summary) = extract_error_summary(&value).filter(|s| !s.is_empty()) {
            return summary;
        }
        return value.to_string();
    }

    trimmed.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[derive(Debug, PartialEq)]
enum SseLine {
    Fragment(String),
    Skip,
    Failed(String),
}

fn extract_data_payload(line: &str) -> Option<&str> {
    line.strip_prefix("data:").map(str::trim_start)
}

fn parse_sse_line(line: &str) -> SseLine {
    let Some(payload) = extract_data_payload(line.trim()) else {
        return SseLine::Skip;
    };
    if payload.trim().is_empty() {
        return SseLine::Skip;
    }

    let value = match serde_json::from_str::<serde_json::Value>(payload) {
        Ok(value) => value,
        Err(_) => return SseLine::Failed(payload.to_string()),
    };
    if value.get("error").is_some() {
        return SseLine::Failed(payload.to_string());
    }

    match serde_json::from_value::<GenerateContentResponse>(value) {
        Ok(response) => {
            let text = response.text();
            if text.is_empty() {
                SseLine::Skip
            } else {
                SseLine::Fragment(text)
            }
        }
        Err(_) => SseLine::Failed(payload.to_string()),
    }
}

fn classify_failure(payload: String) -> StreamError {
    match serde_json::from_str::<serde_json::Value>(&payload) {
        Ok(value) if value.get("error").is_some() => StreamError::api(
            value
                .pointer("/error/code")
                .and_then(|code| code.as_u64())
                .and_then(|code| u16::try_from(code).ok()),
            &payload,
        ),
        _ => StreamError::Decode(payload),
    }
}

/// Generation parameters sent with every request.
#[derive(Clone, Debug, PartialEq)]
pub struct ModelSettings {
    pub base_url: String,
    pub model: String,
    pub system_instruction: String,
    pub temperature: f32,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            system_instruction: DEFAULT_SYSTEM_INSTRUCTION.to_string(),
            temperature: DEFAULT_TEMPERATURE,
        }
    }
}

/// [`ModelClient`] backed by the Gemini streaming endpoint.
#[derive(Clone)]
pub struct GeminiClient {
    client: reqwest::Client,
    api_key: String,
    settings: ModelSettings,
}

impl GeminiClient {
    pub fn new(
        client: reqwest::Client,
        api_key: impl Into<String>,
        settings: ModelSettings,
    ) -> Self {
        Self {
            client,
            api_key: api_key.into(),
            settings,
        }
    }

    pub fn settings(&self) -> &ModelSettings {
        &self.settings
    }

    fn endpoint_url(&self) -> String {
        let url = model_method_url(
            &self.settings.base_url,
            &self.settings.model,
            "streamGenerateContent",
        );
        format!("{url}?alt=sse")
    }

    /// Prior messages become context; the last message is sent as the
    /// user's prompt.
    pub fn build_request(&self, history: &[Message]) -> Option<GenerateContentRequest> {
        let (prompt, context) = history.split_last()?;

        let mut contents: Vec<Content> = context
            .iter()
            .map(|message| Content::text(Some(message.role.as_str()), message.content.clone()))
            .collect();
        contents.push(Content::text(Some(Role::User.as_str()), prompt.content.clone()));

        Some(GenerateContentRequest {
            contents,
            system_instruction: Some(Content::text(None, self.settings.system_instruction.clone())),
            generation_config: GenerationConfig {
                temperature: self.settings.temperature,
            },
        })
    }
}

impl ModelClient for GeminiClient {
    fn stream_chat(&self, history: &[Message]) -> FragmentStream {
        let request = self.build_request(history);
        let client = self.client.clone();
        let url = self.endpoint_url();
        let api_key = self.api_key.clone();

        Box::pin(async_stream::stream! {
            let Some(request) = request else {
                yield Err(StreamError::EmptyHistory);
                return;
            };

            debug!(url = %url, turns = request.contents.len(), "opening generation stream");
            let response = match client
                .post(&url)
                .header("Content-Type", "application/json")
                .header("x-goog-api-key", api_key)
                .json(&request)
                .send()
                .await
            {
                Ok(response) => response,
                Err(err) => {
                    yield Err(StreamError::Transport(err));
                    return;
                }
            };

            if !response.status().is_success() {
                let status = response.status().as_u16();
                let body = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "<no body>".to_string());
                yield Err(StreamError::api(Some(status), &body));
                return;
            }

            let mut bytes = response.bytes_stream();
            let mut buffer: Vec<u8> = Vec::new();

            while let Some(chunk) = bytes.next().await {
                match chunk {
                    Ok(chunk_bytes) => buffer.extend_from_slice(&chunk_bytes),
                    Err(err) => {
                        yield Err(StreamError::Transport(err));
                        return;
                    }
                }

                while let Some(newline_pos) = memchr(b'\n', &buffer) {
                    let line_bytes: Vec<u8> = buffer.drain(..=newline_pos).collect();
                    let line = String::from_utf8_lossy(&line_bytes);
                    match parse_sse_line(&line) {
                        SseLine::Fragment(text) => yield Ok(text),
                        SseLine::Skip => {}
                        SseLine::Failed(payload) => {
                            yield Err(classify_failure(payload));
                            return;
                        }
                    }
                }
            }

            if !buffer.is_empty() {
                let line = String::from_utf8_lossy(&buffer).into_owned();
                match parse_sse_line(&line) {
                    SseLine::Fragment(text) => yield Ok(text),
                    SseLine::Skip => {}
                    SseLine::Failed(payload) => yield Err(classify_failure(payload)),
                }
            }
        })
    }
}
