//! Vision-engine client abstraction.
//!
//! The pipeline talks to the model through `VisionClient`: submit a prompt
//! plus an image, get back a stream of text fragments. Accumulating the
//! answer is a plain fold over the stream (`collect_fragments`), so engines
//! stay testable with canned fragment sequences and no network.

use std::io::{BufRead, BufReader};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::types::ImagePayload;
use super::VisionError;

/// Fragments of a streamed model response, in arrival order.
pub type FragmentStream = Box<dyn Iterator<Item = Result<String, VisionError>> + Send>;

pub trait VisionClient: Send + Sync {
    /// Submit a prompt and image to the named model.
    fn submit(
        &self,
        model: &str,
        prompt: &str,
        image: &ImagePayload,
    ) -> Result<FragmentStream, VisionError>;

    /// Model names currently served by the engine.
    fn list_models(&self) -> Result<Vec<String>, VisionError>;
}

/// Concatenate all fragments of a streamed response in arrival order.
pub fn collect_fragments(stream: FragmentStream) -> Result<String, VisionError> {
    let mut output = String::new();
    for fragment in stream {
        output.push_str(&fragment?);
    }
    Ok(output)
}

// ──────────────────────────────────────────────
// OllamaVisionClient
// ──────────────────────────────────────────────

/// HTTP client for a local Ollama instance, streaming `/api/chat`.
///
/// Every request carries the configured timeout; a stalled stream surfaces
/// as `VisionError::Timeout` instead of hanging the invocation.
pub struct OllamaVisionClient {
    base_url: String,
    client: reqwest::blocking::Client,
    timeout_secs: u64,
}

impl OllamaVisionClient {
    pub fn new(base_url: &str, timeout_secs: u64) -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            timeout_secs,
        }
    }

    fn map_send_error(&self, e: reqwest::Error) -> VisionError {
        if e.is_connect() {
            VisionError::Connection(self.base_url.clone())
        } else if e.is_timeout() {
            VisionError::Timeout(self.timeout_secs)
        } else {
            VisionError::Http(e.to_string())
        }
    }
}

/// Request body for Ollama /api/chat
#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
    images: Vec<&'a str>,
}

/// One NDJSON chunk of a streamed /api/chat response.
#[derive(Deserialize)]
struct ChatChunk {
    #[serde(default)]
    message: Option<ChunkMessage>,
}

#[derive(Deserialize)]
struct ChunkMessage {
    content: String,
}

/// Response body from Ollama /api/tags
#[derive(Deserialize)]
struct TagsResponse {
    models: Vec<TagModel>,
}

#[derive(Deserialize)]
struct TagModel {
    name: String,
}

impl VisionClient for OllamaVisionClient {
    fn submit(
        &self,
        model: &str,
        prompt: &str,
        image: &ImagePayload,
    ) -> Result<FragmentStream, VisionError> {
        let url = format!("{}/api/chat", self.base_url);
        let body = ChatRequest {
            model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
                images: vec![image.base64.as_str()],
            }],
            stream: true,
        };

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .map_err(|e| self.map_send_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(VisionError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let timeout_secs = self.timeout_secs;
        let fragments = BufReader::new(response).lines().filter_map(move |line| {
            match line {
                Ok(line) if line.trim().is_empty() => None,
                Ok(line) => match serde_json::from_str::<ChatChunk>(&line) {
                    Ok(chunk) => chunk.message.map(|m| Ok(m.content)),
                    Err(e) => Some(Err(VisionError::Stream(e.to_string()))),
                },
                Err(e) if e.kind() == std::io::ErrorKind::TimedOut => {
                    Some(Err(VisionError::Timeout(timeout_secs)))
                }
                Err(e) => Some(Err(VisionError::Stream(e.to_string()))),
            }
        });

        Ok(Box::new(fragments))
    }

    fn list_models(&self) -> Result<Vec<String>, VisionError> {
        let url = format!("{}/api/tags", self.base_url);

        let response = self
            .client
            .get(&url)
            .send()
            .map_err(|e| self.map_send_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(VisionError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: TagsResponse = response
            .json()
            .map_err(|e| VisionError::Stream(e.to_string()))?;

        Ok(parsed.models.into_iter().map(|m| m.name).collect())
    }
}

// ──────────────────────────────────────────────
// MockVisionClient (testing)
// ──────────────────────────────────────────────

/// Mock vision client — replays configured fragments, counts submissions.
pub struct MockVisionClient {
    fragments: Vec<String>,
    models: Vec<String>,
    submits: std::sync::atomic::AtomicUsize,
}

impl MockVisionClient {
    pub fn new(fragments: &[&str]) -> Self {
        Self {
            fragments: fragments.iter().map(|f| f.to_string()).collect(),
            models: vec!["llava:latest".to_string()],
            submits: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    /// Single-fragment convenience constructor.
    pub fn with_response(response: &str) -> Self {
        Self::new(&[response])
    }

    pub fn with_models(mut self, models: Vec<String>) -> Self {
        self.models = models;
        self
    }

    /// How many times `submit` was called.
    pub fn submit_count(&self) -> usize {
        self.submits.load(std::sync::atomic::Ordering::SeqCst)
    }
}

impl VisionClient for MockVisionClient {
    fn submit(
        &self,
        _model: &str,
        _prompt: &str,
        _image: &ImagePayload,
    ) -> Result<FragmentStream, VisionError> {
        self.submits
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        let fragments: Vec<Result<String, VisionError>> =
            self.fragments.iter().cloned().map(Ok).collect();
        Ok(Box::new(fragments.into_iter()))
    }

    fn list_models(&self) -> Result<Vec<String>, VisionError> {
        Ok(self.models.clone())
    }
}
