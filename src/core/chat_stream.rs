//! Streaming adapter for chat completion APIs.
//!
//! [`ModelClient`] turns one request into a lazy, ordered [`FragmentStream`]
//! of text fragments. The HTTP implementation reads the provider's
//! server-sent events, buffering partial lines across network reads.

use std::fmt::Display;
use std::pin::Pin;

use async_trait::async_trait;
use futures_util::{stream, Stream, StreamExt};
use memchr::memchr;
use tracing::{debug, warn};

use crate::api::{ApiErrorResponse, ChatMessage, ChatRequest, ChatResponse};
use crate::core::message::Content;
use crate::utils::url::construct_api_url;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StreamError {
    /// The provider answered with a non-success status.
    #[error("{message}")]
    Status { status: u16, message: String },
    /// The provider reported an error inside the event stream.
    #[error("{0}")]
    Provider(String),
    /// The request could not be sent or the connection broke mid-stream.
    #[error("{0}")]
    Transport(String),
}

pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<String, StreamError>> + Send>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelRequest {
    pub system_instruction: String,
    pub history: Vec<Content>,
}

#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn stream(&self, request: ModelRequest) -> Result<FragmentStream, StreamError>;
}

/// Accumulates raw bytes and hands out complete, newline-terminated lines.
#[derive(Debug, Default)]
pub struct SseLineBuffer {
    buffer: Vec<u8>,
}

impl SseLineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Next complete line, without its terminator. Lines that are not valid
    /// UTF-8 are logged and dropped.
    pub fn next_line(&mut self) -> Option<String> {
        loop {
            let newline_pos = memchr(b'\n', &self.buffer)?;
            let line: Vec<u8> = self.buffer.drain(..=newline_pos).collect();
            match std::str::from_utf8(&line[..newline_pos]) {
                Ok(text) => return Some(text.trim().to_string()),
                Err(e) => warn!("invalid UTF-8 in stream: {e}"),
            }
        }
    }

    pub fn pending(&self) -> usize {
        self.buffer.len()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseEvent {
    Fragment(String),
    Error(String),
    Done,
    Skip,
}

fn extract_data_payload(line: &str) -> Option<&str> {
    line.strip_prefix("data:").map(str::trim_start)
}

pub fn parse_sse_line(line: &str) -> SseEvent {
    let Some(payload) = extract_data_payload(line) else {
        return SseEvent::Skip;
    };
    if payload == "[DONE]" {
        return SseEvent::Done;
    }
    if payload.trim().is_empty() {
        return SseEvent::Skip;
    }

    if let Ok(ApiErrorResponse {
        error: Some(error), ..
    }) = serde_json::from_str::<ApiErrorResponse>(payload)
    {
        return SseEvent::Error(
            error
                .message
                .unwrap_or_else(|| "The provider reported an error".to_string()),
        );
    }

    match serde_json::from_str::<ChatResponse>(payload) {
        Ok(response) => response
            .first_content()
            .map(|content| SseEvent::Fragment(content.to_string()))
            .unwrap_or(SseEvent::Skip),
        Err(e) => {
            warn!("skipping malformed stream event: {e}: {payload}");
            SseEvent::Skip
        }
    }
}

struct SseState<S> {
    bytes: S,
    lines: SseLineBuffer,
    finished: bool,
}

/// Decode a byte stream of server-sent events into text fragments.
pub fn fragments_from_bytes<S, B, E>(bytes: S) -> FragmentStream
where
    S: Stream<Item = Result<B, E>> + Send + Unpin + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Display + Send + 'static,
{
    let state = SseState {
        bytes,
        lines: SseLineBuffer::new(),
        finished: false,
    };

    Box::pin(stream::unfold(state, |mut state| async move {
        loop {
            if state.finished {
                return None;
            }

            while let Some(line) = state.lines.next_line() {
                match parse_sse_line(&line) {
                    SseEvent::Fragment(text) => return Some((Ok(text), state)),
                    SseEvent::Error(message) => {
                        state.finished = true;
                        return Some((Err(StreamError::Provider(message)), state));
                    }
                    SseEvent::Done => {
                        debug!("stream signalled completion");
                        return None;
                    }
                    SseEvent::Skip => {}
                }
            }

            match state.bytes.next().await {
                Some(Ok(chunk)) => state.lines.push(chunk.as_ref()),
                Some(Err(e)) => {
                    state.finished = true;
                    return Some((Err(StreamError::Transport(e.to_string())), state));
                }
                None => {
                    if state.lines.pending() > 0 {
                        debug!(
                            bytes = state.lines.pending(),
                            "discarding unterminated trailing line"
                        );
                    }
                    return None;
                }
            }
        }
    }))
}

/// Pull a human-readable message out of an error response body.
pub fn error_message_from_body(status: u16, body: &str) -> String {
    serde_json::from_str::<ApiErrorResponse>(body)
        .ok()
        .and_then(|response| response.error)
        .and_then(|error| error.message)
        .map(|message| message.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|message| !message.is_empty())
        .unwrap_or_else(|| format!("API request failed with status {status}"))
}

/// OpenAI-compatible `chat/completions` streaming client.
#[derive(Clone)]
pub struct OpenAiClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl OpenAiClient {
    pub fn new(
        client: reqwest::Client,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
            temperature: 1.0,
            max_tokens: 8192,
        }
    }

    pub fn with_sampling(mut self, temperature: f32, max_tokens: u32) -> Self {
        self.temperature = temperature;
        self.max_tokens = max_tokens;
        self
    }

    pub fn build_request(&self, request: &ModelRequest) -> ChatRequest {
        let mut messages = Vec::with_capacity(request.history.len() + 1);
        messages.push(ChatMessage::system(request.system_instruction.clone()));
        messages.extend(request.history.iter().map(ChatMessage::from_content));

        ChatRequest {
            model: self.model.clone(),
            messages,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            stream: true,
        }
    }
}

#[async_trait]
impl ModelClient for OpenAiClient {
    async fn stream(&self, request: ModelRequest) -> Result<FragmentStream, StreamError> {
        let chat_url = construct_api_url(&self.base_url, "chat/completions");
        let body = self.build_request(&request);
        debug!(
            model = %self.model,
            messages = body.messages.len(),
            "opening completion stream"
        );

        let response = self
            .client
            .post(chat_url)
            .header("Content-Type", "application/json")
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| StreamError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "<no body>".to_string());
            return Err(StreamError::Status {
                status: status.as_u16(),
                message: error_message_from_body(status.as_u16(), &error_text),
            });
        }

        Ok(fragments_from_bytes(Box::pin(response.bytes_stream())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::message::{Part, TranscriptRole};

    async fn collect(chunks: Vec<&'static str>) -> Vec<Result<String, StreamError>> {
        let bytes = stream::iter(
            chunks
                .into_iter()
                .map(|chunk| Ok::<_, std::io::Error>(chunk.as_bytes().to_vec())),
        );
        fragments_from_bytes(bytes).collect().await
    }

    #[test]
    fn line_buffer_waits_for_newline() {
        let mut buffer = SseLineBuffer::new();
        buffer.push(b"data: {\"a\"");
        assert!(buffer.next_line().is_none());
        buffer.push(b":1}\r\nda");
        assert_eq!(buffer.next_line().as_deref(), Some("data: {\"a\":1}"));
        assert!(buffer.next_line().is_none());
        assert_eq!(buffer.pending(), 2);
    }

    #[test]
    fn line_buffer_drops_invalid_utf8_lines() {
        let mut buffer = SseLineBuffer::new();
        buffer.push(&[0xff, 0xfe, b'\n']);
        buffer.push(b"ok\n");
        assert_eq!(buffer.next_line().as_deref(), Some("ok"));
    }

    #[test]
    fn parse_sse_line_handles_spacing_variants() {
        assert_eq!(
            parse_sse_line(r#"data: {"choices":[{"delta":{"content":"Hello"}}]}"#),
            SseEvent::Fragment("Hello".into())
        );
        assert_eq!(
            parse_sse_line(r#"data:{"choices":[{"delta":{"content":"World"}}]}"#),
            SseEvent::Fragment("World".into())
        );
        assert_eq!(parse_sse_line("data: [DONE]"), SseEvent::Done);
        assert_eq!(parse_sse_line("data:[DONE]"), SseEvent::Done);
        assert_eq!(parse_sse_line(": keep-alive"), SseEvent::Skip);
        assert_eq!(parse_sse_line(""), SseEvent::Skip);
    }

    #[test]
    fn parse_sse_line_skips_malformed_payloads() {
        assert_eq!(parse_sse_line("data: {not json"), SseEvent::Skip);
    }

    #[test]
    fn parse_sse_line_routes_provider_errors() {
        assert_eq!(
            parse_sse_line(r#"data: {"error":{"message":"internal server error"}}"#),
            SseEvent::Error("internal server error".into())
        );
    }

    #[tokio::test]
    async fn fragments_survive_split_reads() {
        let results = collect(vec![
            "data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\n\ndata: {\"choi",
            "ces\":[{\"delta\":{\"content\":\"lo\"}}]}\n",
            "data: [DONE]\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"ignored\"}}]}\n",
        ])
        .await;
        let fragments: Vec<String> = results.into_iter().map(Result::unwrap).collect();
        assert_eq!(fragments, vec!["Hel", "lo"]);
    }

    #[tokio::test]
    async fn malformed_event_does_not_end_stream() {
        let results = collect(vec![
            "data: {broken\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"ok\"}}]}\n",
        ])
        .await;
        assert_eq!(results, vec![Ok("ok".to_string())]);
    }

    #[tokio::test]
    async fn empty_stream_yields_nothing() {
        assert!(collect(vec![]).await.is_empty());
        assert!(collect(vec!["data: [DONE]\n"]).await.is_empty());
    }

    #[tokio::test]
    async fn transport_error_ends_stream() {
        let bytes = stream::iter(vec![
            Ok(b"data: {\"choices\":[{\"delta\":{\"content\":\"a\"}}]}\n".to_vec()),
            Err("connection reset"),
            Ok(b"data: {\"choices\":[{\"delta\":{\"content\":\"b\"}}]}\n".to_vec()),
        ]);
        let results: Vec<_> = fragments_from_bytes(bytes).collect().await;
        assert_eq!(
            results,
            vec![
                Ok("a".to_string()),
                Err(StreamError::Transport("connection reset".into()))
            ]
        );
    }

    #[test]
    fn error_body_message_is_extracted() {
        assert_eq!(
            error_message_from_body(401, r#"{"error":{"message":"API key not valid"}}"#),
            "API key not valid"
        );
        assert_eq!(
            error_message_from_body(502, "<html>bad gateway</html>"),
            "API request failed with status 502"
        );
    }

    #[test]
    fn request_puts_system_instruction_first() {
        let client = OpenAiClient::new(
            reqwest::Client::new(),
            "https://api.test.com/v1/",
            "key",
            "test-model",
        )
        .with_sampling(0.5, 100);
        let request = client.build_request(&ModelRequest {
            system_instruction: "Be precise.".into(),
            history: vec![Content {
                role: TranscriptRole::User,
                parts: vec![Part::Text("Hi".into())],
            }],
        });

        assert!(request.stream);
        assert_eq!(request.model, "test-model");
        assert_eq!(request.max_tokens, 100);
        assert_eq!(request.messages.len(), 2);
        assert_eq!(request.messages[0], ChatMessage::system("Be precise."));
        assert_eq!(request.messages[1].role, "user");
    }
}
