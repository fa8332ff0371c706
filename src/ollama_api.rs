// Handles communication with the Ollama chat API

use futures_util::StreamExt;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::AppConfig;
use crate::error::StreamError;
use crate::stream::{StreamClient, StreamEmitter};

#[derive(Deserialize)]
struct ChatChunk {
    #[serde(default)]
    message: Option<ChunkMessage>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize)]
struct ChunkMessage {
    #[serde(default)]
    content: String,
}

#[derive(Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<ModelTag>,
}

#[derive(Deserialize)]
struct ModelTag {
    name: String,
}

/// What one NDJSON line means for the stream.
#[derive(Debug, PartialEq, Eq)]
enum ChunkOutcome {
    Fragment(String),
    Done,
    Skip,
}

fn parse_chunk(line: &str) -> Result<ChunkOutcome, StreamError> {
    let chunk: ChatChunk = serde_json::from_str(line)
        .map_err(|e| StreamError::Backend(format!("malformed stream chunk: {}", e)))?;

    if let Some(error) = chunk.error {
        return Err(StreamError::Backend(error));
    }
    if chunk.done {
        return Ok(ChunkOutcome::Done);
    }
    match chunk.message {
        Some(message) if !message.content.is_empty() => Ok(ChunkOutcome::Fragment(message.content)),
        _ => Ok(ChunkOutcome::Skip),
    }
}

/// Splits a byte stream into lines. Bytes are held until a newline arrives so
/// a multi-byte character cut across network chunks decodes intact.
#[derive(Debug, Default)]
struct LineDecoder {
    buf: Vec<u8>,
}

impl LineDecoder {
    fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(bytes);
        let mut lines = Vec::new();
        while let Some(pos) = self.buf.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buf.drain(..=pos).collect();
            let text = String::from_utf8_lossy(&line);
            let text = text.trim();
            if !text.is_empty() {
                lines.push(text.to_string());
            }
        }
        lines
    }

    fn finish(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.buf);
        let text = String::from_utf8_lossy(&rest).trim().to_string();
        (!text.is_empty()).then_some(text)
    }
}

/// Streaming client for an Ollama server.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    http: Client,
    base_url: String,
    model: String,
}

impl OllamaClient {
    pub fn new(config: &AppConfig) -> Result<Self, StreamError> {
        let http = Client::builder()
            .connect_timeout(config.connect_timeout)
            .read_timeout(config.read_timeout)
            .build()
            .map_err(StreamError::from_reqwest)?;
        Ok(Self::with_http(http, &config.ollama_url, &config.model))
    }

    pub fn with_http(http: Client, base_url: &str, model: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub async fn list_models(&self) -> Result<Vec<String>, StreamError> {
        let response = self
            .http
            .get(format!("{}/api/tags", self.base_url))
            .send()
            .await
            .map_err(StreamError::from_reqwest)?;

        if !response.status().is_success() {
            return Err(StreamError::Backend(format!(
                "model listing failed with status: {}",
                response.status()
            )));
        }

        let tags: TagsResponse = response.json().await.map_err(StreamError::from_reqwest)?;
        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }

    async fn stream_chat(&self, question: String, emitter: &StreamEmitter) -> Result<(), StreamError> {
        let response = self
            .http
            .post(format!("{}/api/chat", self.base_url))
            .json(&serde_json::json!({
                "model": self.model,
                "messages": [{ "role": "user", "content": question }],
                "stream": true
            }))
            .send()
            .await
            .map_err(StreamError::from_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<ChatChunk>(&body)
                .ok()
                .and_then(|chunk| chunk.error)
                .unwrap_or(body);
            return Err(StreamError::Backend(format!("API call failed with status {}: {}", status, detail)));
        }

        let mut decoder = LineDecoder::default();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let bytes = chunk.map_err(StreamError::from_reqwest)?;
            for line in decoder.push(&bytes) {
                match parse_chunk(&line)? {
                    ChunkOutcome::Fragment(text) => emitter.fragment(text),
                    ChunkOutcome::Done => return Ok(()),
                    ChunkOutcome::Skip => {}
                }
            }
        }

        if let Some(line) = decoder.finish() {
            match parse_chunk(&line)? {
                ChunkOutcome::Fragment(text) => emitter.fragment(text),
                ChunkOutcome::Done => return Ok(()),
                ChunkOutcome::Skip => {}
            }
        }

        Err(StreamError::Transport("stream closed before completion".to_string()))
    }
}

impl StreamClient for OllamaClient {
    fn open(&self, question: &str, emitter: StreamEmitter) {
        let client = self.clone();
        let question = question.to_string();

        tokio::spawn(async move {
            let id = emitter.id();
            let cancellation_token = emitter.cancellation_token().clone();

            // Dropping the request future on cancel aborts the connection.
            let result = tokio::select! {
                biased;
                _ = cancellation_token.cancelled() => {
                    debug!(%id, "generation aborted");
                    return;
                }
                result = client.stream_chat(question, &emitter) => result,
            };

            match result {
                Ok(()) => {
                    debug!(%id, "generation stream completed");
                    emitter.complete();
                }
                Err(e) => {
                    warn!(%id, error = %e, "generation stream failed");
                    emitter.error(e);
                }
            }
        });
    }
}
